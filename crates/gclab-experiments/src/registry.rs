//! Experiment registration table and dispatcher

use std::io::{self, Write};

use crate::context::Context;
use crate::error::Result;
use crate::workloads;

/// A named experiment
pub struct Experiment {
    /// Name used on the command line
    pub name: &'static str,
    /// Other accepted names
    pub aliases: &'static [&'static str],
    /// Heading printed when it runs
    pub label: &'static str,
    /// One-line description for the usage menu
    pub description: &'static str,
    /// Whether `all` runs it
    pub in_all: bool,
    /// The workload procedure
    pub run: fn(&mut Context<'_>) -> Result<()>,
}

impl Experiment {
    fn matches(&self, name: &str) -> bool {
        self.name == name || self.aliases.contains(&name)
    }
}

/// Every experiment, in menu order
pub static EXPERIMENTS: &[Experiment] = &[
    Experiment {
        name: "basic",
        aliases: &[],
        label: "Basic GC behaviour",
        description: "bulk allocation, forced collection, release",
        in_all: true,
        run: workloads::basic::run,
    },
    Experiment {
        name: "gogc",
        aliases: &[],
        label: "GC percent comparison",
        description: "same workload under different growth percentages",
        in_all: true,
        run: workloads::tuning::run,
    },
    Experiment {
        name: "pool",
        aliases: &[],
        label: "Buffer pool vs direct allocation",
        description: "allocation counts with and without reuse",
        in_all: true,
        run: workloads::pool::run,
    },
    Experiment {
        name: "patterns",
        aliases: &["alloc"],
        label: "Allocation patterns",
        description: "small, large and long-lived objects",
        in_all: true,
        run: workloads::patterns::run,
    },
    Experiment {
        name: "concurrent",
        aliases: &[],
        label: "Concurrent allocation",
        description: "parallel workers sharing a concurrent map",
        in_all: true,
        run: workloads::concurrent::run,
    },
    Experiment {
        name: "leak",
        aliases: &[],
        label: "Leak detection",
        description: "blocked workers (needs --allow-leaks) and slice retention",
        in_all: true,
        run: workloads::leak::run,
    },
    Experiment {
        name: "scale",
        aliases: &[],
        label: "Service-shaped tuning",
        description: "web requests, batch jobs, long connections",
        in_all: true,
        run: workloads::scale::run,
    },
    Experiment {
        name: "slice",
        aliases: &[],
        label: "Slice retention",
        description: "a short view keeping a large block alive",
        in_all: false,
        run: workloads::leak::run_slice,
    },
    Experiment {
        name: "monitor",
        aliases: &[],
        label: "Live monitor",
        description: "periodic heap samples under background churn",
        in_all: true,
        run: workloads::monitor::run,
    },
    Experiment {
        name: "all",
        aliases: &[],
        label: "All experiments",
        description: "everything above, one after another",
        in_all: false,
        run: run_all,
    },
];

/// Look up an experiment by name or alias
pub fn find(name: &str) -> Option<&'static Experiment> {
    EXPERIMENTS.iter().find(|e| e.matches(name))
}

/// Run the experiment called `name`.
///
/// Unknown names print the usage menu and run nothing. Returns whether an
/// experiment ran.
pub fn dispatch(name: &str, ctx: &mut Context<'_>) -> Result<bool> {
    match find(name) {
        Some(experiment) => {
            run_one(experiment, ctx)?;
            Ok(true)
        }
        None => {
            writeln!(ctx.out, "unknown experiment: {name}")?;
            writeln!(ctx.out)?;
            usage(ctx.out)?;
            Ok(false)
        }
    }
}

fn run_one(experiment: &'static Experiment, ctx: &mut Context<'_>) -> Result<()> {
    let outer = std::mem::replace(&mut ctx.current, experiment.name);
    tracing::info!(target: "gclab::experiments", name = experiment.name, "experiment starting");

    writeln!(ctx.out, "=== {} ===", experiment.label)?;
    let outcome = (experiment.run)(ctx);
    ctx.current = outer;
    outcome?;
    writeln!(ctx.out)?;

    tracing::info!(target: "gclab::experiments", name = experiment.name, "experiment finished");
    Ok(())
}

fn run_all(ctx: &mut Context<'_>) -> Result<()> {
    let selected: Vec<_> = EXPERIMENTS.iter().filter(|e| e.in_all).collect();
    let total = selected.len();
    writeln!(ctx.out, "Running all {total} experiments...")?;
    writeln!(ctx.out)?;

    for (i, experiment) in selected.into_iter().enumerate() {
        writeln!(ctx.out, ">>> experiment {}/{}: {}", i + 1, total, experiment.label)?;
        run_one(experiment, ctx)?;

        if i + 1 < total && !ctx.config.pause_between.is_zero() {
            writeln!(
                ctx.out,
                "waiting {} before the next experiment...",
                crate::report::ms(ctx.config.pause_between)
            )?;
            std::thread::sleep(ctx.config.pause_between);
            writeln!(ctx.out)?;
        }
    }

    writeln!(ctx.out, "All experiments finished.")?;
    Ok(())
}

/// Write the usage menu
pub fn usage(out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "gclab - garbage collector experiments")?;
    writeln!(out)?;
    writeln!(out, "usage: gclab [OPTIONS] [EXPERIMENT]")?;
    writeln!(out)?;
    writeln!(out, "experiments:")?;
    for experiment in EXPERIMENTS {
        let mut name = experiment.name.to_string();
        for alias in experiment.aliases {
            name.push('|');
            name.push_str(alias);
        }
        writeln!(out, "  {:<16} {}", name, experiment.description)?;
    }
    writeln!(out)?;
    writeln!(out, "example: gclab basic")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_by_alias() {
        assert_eq!(find("alloc").map(|e| e.name), Some("patterns"));
        assert_eq!(find("patterns").map(|e| e.name), Some("patterns"));
        assert!(find("bogus").is_none());
    }

    #[test]
    fn test_names_are_unique() {
        let mut names: Vec<&str> = EXPERIMENTS
            .iter()
            .flat_map(|e| std::iter::once(e.name).chain(e.aliases.iter().copied()))
            .collect();
        let count = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), count);
    }

    #[test]
    fn test_usage_lists_every_experiment() {
        let mut out = Vec::new();
        usage(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        for experiment in EXPERIMENTS {
            assert!(text.contains(experiment.name), "{} missing", experiment.name);
        }
        assert!(text.contains("patterns|alloc"));
    }
}
