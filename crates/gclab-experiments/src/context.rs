//! Run configuration and the per-run context handed to workloads

use gclab_gc::{GcConfig, GcHeap, GcPercent};
use gclab_profiler::ExperimentResult;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

/// Knobs shared by every experiment in a run
#[derive(Debug, Clone)]
pub struct ExperimentConfig {
    /// Heap configuration, including the growth percentage
    pub gc: GcConfig,
    /// Multiplier for iteration counts and fixed holds
    pub scale: f64,
    /// Sleep between runs of a tuning sweep
    pub settle: Duration,
    /// Sleep between experiments when running `all`
    pub pause_between: Duration,
    /// Permit workloads that leave workers blocked forever
    pub allow_leaks: bool,
    /// Sampling interval of `monitor`
    pub monitor_interval: Duration,
    /// Samples taken by `monitor`
    pub monitor_samples: usize,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            gc: GcConfig::default(),
            scale: 1.0,
            settle: Duration::from_secs(1),
            pause_between: Duration::from_secs(3),
            allow_leaks: false,
            monitor_interval: Duration::from_millis(500),
            monitor_samples: 10,
        }
    }
}

/// One measured result kept for the optional JSON summary
#[derive(Debug, Clone)]
pub struct Record {
    /// Experiment that produced it
    pub experiment: &'static str,
    /// Row label inside the experiment
    pub label: String,
    /// The measurement
    pub result: ExperimentResult,
}

impl Record {
    /// One JSON object per record
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "experiment": self.experiment,
            "label": self.label,
            "result": self.result.to_json(),
        })
    }
}

/// Everything a workload may touch
pub struct Context<'a> {
    /// Heap the run allocates from
    pub heap: Arc<GcHeap>,
    /// Run configuration
    pub config: &'a ExperimentConfig,
    /// Report sink
    pub out: &'a mut dyn Write,
    pub(crate) current: &'static str,
    records: Vec<Record>,
}

impl<'a> Context<'a> {
    /// Context over `heap` writing to `out`
    pub fn new(heap: Arc<GcHeap>, config: &'a ExperimentConfig, out: &'a mut dyn Write) -> Self {
        Self {
            heap,
            config,
            out,
            current: "",
            records: Vec::new(),
        }
    }

    /// Context with a fresh heap built from `config.gc`
    pub fn with_fresh_heap(config: &'a ExperimentConfig, out: &'a mut dyn Write) -> Self {
        Self::new(GcHeap::with_config(config.gc.clone()), config, out)
    }

    /// `n` multiplied by the configured scale, never below 1
    pub fn scaled(&self, n: usize) -> usize {
        ((n as f64 * self.config.scale).round() as usize).max(1)
    }

    /// Fixed hold shortened by scales below 1
    pub fn scaled_hold(&self, hold: Duration) -> Duration {
        hold.mul_f64(self.config.scale.clamp(0.0, 1.0))
    }

    /// Sleep for a shortened fixed hold
    pub fn hold(&self, hold: Duration) {
        let hold = self.scaled_hold(hold);
        if !hold.is_zero() {
            std::thread::sleep(hold);
        }
    }

    /// Sleep between runs of a sweep
    pub fn settle(&self) {
        if !self.config.settle.is_zero() {
            std::thread::sleep(self.config.settle);
        }
    }

    /// Fresh heap that differs from the run's heap only in growth percentage
    pub fn heap_with(&self, gc_percent: GcPercent) -> Arc<GcHeap> {
        GcHeap::with_config(self.config.gc.with_gc_percent(gc_percent))
    }

    /// Keep a measurement for the JSON summary
    pub fn record(&mut self, label: impl Into<String>, result: &ExperimentResult) {
        self.records.push(Record {
            experiment: self.current,
            label: label.into(),
            result: result.clone(),
        });
    }

    /// Measurements kept so far
    pub fn records(&self) -> &[Record] {
        &self.records
    }
}
