//! Dispatcher tests: every registered name runs at a tiny scale

use gclab_experiments::{Context, EXPERIMENTS, ExperimentConfig, dispatch};
use std::time::Duration;

fn quick_config() -> ExperimentConfig {
    ExperimentConfig {
        scale: 0.001,
        settle: Duration::ZERO,
        pause_between: Duration::ZERO,
        allow_leaks: false,
        monitor_interval: Duration::from_millis(1),
        monitor_samples: 3,
        ..ExperimentConfig::default()
    }
}

fn run_named(name: &str) -> (bool, String) {
    let config = quick_config();
    let mut out = Vec::new();
    let ran = {
        let mut ctx = Context::with_fresh_heap(&config, &mut out);
        dispatch(name, &mut ctx).unwrap()
    };
    (ran, String::from_utf8(out).unwrap())
}

#[test]
fn test_every_experiment_runs() {
    for experiment in EXPERIMENTS.iter().filter(|e| e.name != "all") {
        let (ran, text) = run_named(experiment.name);
        assert!(ran, "{} did not run", experiment.name);
        assert!(
            text.starts_with(&format!("=== {} ===", experiment.label)),
            "{} printed no heading",
            experiment.name
        );
        assert!(text.lines().count() > 2, "{} printed nothing", experiment.name);
    }
}

#[test]
fn test_alias_runs_patterns() {
    let (ran, text) = run_named("alloc");
    assert!(ran);
    assert!(text.contains("long-lived"));
}

#[test]
fn test_all_runs_in_order() {
    let (ran, text) = run_named("all");
    assert!(ran);

    let selected: Vec<_> = EXPERIMENTS.iter().filter(|e| e.in_all).collect();
    let mut from = 0;
    for (i, experiment) in selected.iter().enumerate() {
        let marker = format!(">>> experiment {}/{}: {}", i + 1, selected.len(), experiment.label);
        let at = text[from..]
            .find(&marker)
            .unwrap_or_else(|| panic!("missing {marker}"));
        from += at + marker.len();
    }
    assert!(text.trim_end().ends_with("All experiments finished."));
}

#[test]
fn test_leak_is_skipped_without_opt_in() {
    let config = quick_config();
    let mut out = Vec::new();
    let mut ctx = Context::with_fresh_heap(&config, &mut out);
    dispatch("leak", &mut ctx).unwrap();

    assert_eq!(ctx.heap.workers().live(), 0);
    assert_eq!(ctx.heap.workers().spawned(), 0);
    drop(ctx);
    assert!(String::from_utf8(out).unwrap().contains("--allow-leaks"));
}

#[test]
fn test_unknown_name_prints_usage() {
    let (ran, text) = run_named("bogus");
    assert!(!ran);
    assert!(text.starts_with("unknown experiment: bogus"));
    assert!(text.contains("usage: gclab"));
    assert!(!text.contains("==="));
}

#[test]
fn test_records_are_tagged_with_experiment() {
    let config = quick_config();
    let mut out = Vec::new();
    let mut ctx = Context::with_fresh_heap(&config, &mut out);
    dispatch("gogc", &mut ctx).unwrap();

    let records = ctx.records();
    assert_eq!(records.len(), 5);
    assert!(records.iter().all(|r| r.experiment == "gogc"));
    assert_eq!(records[0].label, "percent=50");
    assert!(records[0].to_json()["result"]["allocations"].as_u64().unwrap() > 0);
}
