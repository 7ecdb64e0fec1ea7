//! Configuration file parsing for gclab.toml.

use anyhow::{Context as _, bail};
use gclab_experiments::ExperimentConfig;
use gclab_gc::GcPercent;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the file's growth percentage
pub const GC_PERCENT_ENV: &str = "GCLAB_GC_PERCENT";

/// Main configuration structure.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Heap settings
    #[serde(default)]
    pub gc: GcSection,

    /// Experiment run settings
    #[serde(default)]
    pub experiments: ExperimentsSection,
}

/// `[gc]` section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GcSection {
    /// Growth percentage, an integer or `"off"`
    pub percent: Option<PercentSetting>,

    /// Heap size below which no automatic cycle starts
    pub min_heap: Option<usize>,

    /// Stack size of tracked workers
    pub worker_stack_size: Option<usize>,
}

/// Either spelling of a growth percentage
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PercentSetting {
    /// `percent = 200`
    Number(i64),
    /// `percent = "off"`
    Word(String),
}

impl PercentSetting {
    fn resolve(&self) -> anyhow::Result<GcPercent> {
        match self {
            PercentSetting::Number(n) => Ok(GcPercent::from(*n)),
            PercentSetting::Word(w) => Ok(w.parse()?),
        }
    }
}

/// `[experiments]` section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExperimentsSection {
    /// Iteration multiplier
    pub scale: Option<f64>,

    /// Sleep between runs of a sweep
    pub settle_ms: Option<u64>,

    /// Sleep between experiments of `all`
    pub pause_between_ms: Option<u64>,

    /// Allow workloads that leak blocked workers
    pub allow_leaks: Option<bool>,

    /// Sampling interval of `monitor`
    pub monitor_interval_ms: Option<u64>,

    /// Samples taken by `monitor`
    pub monitor_samples: Option<usize>,
}

/// Values given on the command line
#[derive(Debug, Default)]
pub struct Overrides {
    /// `--scale`
    pub scale: Option<f64>,
    /// `--allow-leaks`
    pub allow_leaks: bool,
}

/// Fully resolved run settings
#[derive(Debug)]
pub struct Settings {
    /// Configuration handed to every experiment
    pub experiments: ExperimentConfig,
    /// Where the growth percentage came from, `None` for the built-in default
    pub percent_source: Option<&'static str>,
}

impl Settings {
    /// Growth percentage as shown in the banner
    pub fn tuning_label(&self) -> String {
        let percent = self.experiments.gc.gc_percent;
        match self.percent_source {
            Some(source) => format!("{percent} ({source})"),
            None => format!("{percent} (default)"),
        }
    }
}

/// Load configuration from a file or search for default config files.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config_path = match path {
        Some(path) => {
            if !path.exists() {
                bail!("config file {} does not exist", path.display());
            }
            Some(path.to_path_buf())
        }
        None => find_config_file(),
    };

    match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let config: Config = toml::from_str(&content)
                .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path.display(), e))?;
            tracing::debug!(path = %path.display(), "loaded config");
            Ok(config)
        }
        None => Ok(Config::default()),
    }
}

/// Search for configuration file in the current directory and parent directories.
fn find_config_file() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    find_config_in_ancestors(&cwd)
}

fn find_config_in_ancestors(start: &Path) -> Option<PathBuf> {
    const CONFIG_NAMES: &[&str] = &["gclab.toml", ".gclabrc.toml"];

    let mut dir = Some(start);
    while let Some(current) = dir {
        for name in CONFIG_NAMES {
            let path = current.join(name);
            if path.exists() {
                return Some(path);
            }
        }
        dir = current.parent();
    }

    None
}

/// Merge defaults, the file, the environment value and CLI flags, in
/// increasing order of precedence.
pub fn resolve(
    config: &Config,
    env_percent: Option<String>,
    overrides: &Overrides,
) -> anyhow::Result<Settings> {
    let mut experiments = ExperimentConfig::default();
    let mut percent_source = None;

    if let Some(percent) = &config.gc.percent {
        experiments.gc.gc_percent = percent.resolve().context("invalid [gc] percent")?;
        percent_source = Some("config");
    }
    if let Some(min_heap) = config.gc.min_heap {
        experiments.gc.min_heap = min_heap;
    }
    if let Some(stack) = config.gc.worker_stack_size {
        experiments.gc.worker_stack_size = stack;
    }

    let section = &config.experiments;
    if let Some(scale) = section.scale {
        experiments.scale = scale;
    }
    if let Some(ms) = section.settle_ms {
        experiments.settle = Duration::from_millis(ms);
    }
    if let Some(ms) = section.pause_between_ms {
        experiments.pause_between = Duration::from_millis(ms);
    }
    if let Some(allow) = section.allow_leaks {
        experiments.allow_leaks = allow;
    }
    if let Some(ms) = section.monitor_interval_ms {
        experiments.monitor_interval = Duration::from_millis(ms);
    }
    if let Some(samples) = section.monitor_samples {
        experiments.monitor_samples = samples;
    }

    if let Some(raw) = env_percent.filter(|v| !v.trim().is_empty()) {
        experiments.gc.gc_percent = raw
            .parse()
            .with_context(|| format!("invalid {GC_PERCENT_ENV}"))?;
        percent_source = Some("env");
    }

    if let Some(scale) = overrides.scale {
        experiments.scale = scale;
    }
    if overrides.allow_leaks {
        experiments.allow_leaks = true;
    }

    validate(&experiments)?;
    Ok(Settings {
        experiments,
        percent_source,
    })
}

fn validate(config: &ExperimentConfig) -> anyhow::Result<()> {
    if !(config.scale.is_finite() && config.scale > 0.0) {
        bail!("scale must be a positive number, got {}", config.scale);
    }
    if config.monitor_interval.is_zero() {
        bail!("monitor_interval_ms must be greater than zero");
    }
    if config.gc.worker_stack_size < 16 * 1024 {
        bail!(
            "worker_stack_size must be at least 16384 bytes, got {}",
            config.gc.worker_stack_size
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let settings = resolve(&Config::default(), None, &Overrides::default()).unwrap();
        assert_eq!(settings.experiments.gc.gc_percent, GcPercent::DEFAULT);
        assert_eq!(settings.experiments.scale, 1.0);
        assert!(!settings.experiments.allow_leaks);
        assert_eq!(settings.tuning_label(), "100 (default)");
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[gc]
percent = 200
min_heap = 1048576

[experiments]
scale = 0.5
settle_ms = 0
allow_leaks = true
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let settings = resolve(&config, None, &Overrides::default()).unwrap();

        assert_eq!(settings.experiments.gc.gc_percent, GcPercent::Percent(200));
        assert_eq!(settings.experiments.gc.min_heap, 1024 * 1024);
        assert_eq!(settings.experiments.scale, 0.5);
        assert_eq!(settings.experiments.settle, Duration::ZERO);
        assert!(settings.experiments.allow_leaks);
        assert_eq!(settings.tuning_label(), "200 (config)");
    }

    #[test]
    fn test_percent_off_spelling() {
        let config: Config = toml::from_str("[gc]\npercent = \"off\"\n").unwrap();
        let settings = resolve(&config, None, &Overrides::default()).unwrap();
        assert_eq!(settings.experiments.gc.gc_percent, GcPercent::Off);

        let config: Config = toml::from_str("[gc]\npercent = -1\n").unwrap();
        let settings = resolve(&config, None, &Overrides::default()).unwrap();
        assert_eq!(settings.experiments.gc.gc_percent, GcPercent::Off);
    }

    #[test]
    fn test_precedence() {
        let config: Config =
            toml::from_str("[gc]\npercent = 200\n[experiments]\nscale = 0.5\n").unwrap();
        let overrides = Overrides {
            scale: Some(2.0),
            allow_leaks: true,
        };
        let settings = resolve(&config, Some("400".to_string()), &overrides).unwrap();

        assert_eq!(settings.experiments.gc.gc_percent, GcPercent::Percent(400));
        assert_eq!(settings.experiments.scale, 2.0);
        assert!(settings.experiments.allow_leaks);
        assert_eq!(settings.tuning_label(), "400 (env)");
    }

    #[test]
    fn test_blank_env_is_ignored() {
        let settings =
            resolve(&Config::default(), Some("  ".to_string()), &Overrides::default()).unwrap();
        assert_eq!(settings.percent_source, None);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = resolve(&Config::default(), Some("lots".to_string()), &Overrides::default());
        assert!(err.is_err());

        let config: Config = toml::from_str("[gc]\npercent = \"lots\"\n").unwrap();
        assert!(resolve(&config, None, &Overrides::default()).is_err());

        let overrides = Overrides {
            scale: Some(0.0),
            allow_leaks: false,
        };
        assert!(resolve(&Config::default(), None, &overrides).is_err());
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(toml::from_str::<Config>("[gc]\npercnt = 100\n").is_err());
    }

    #[test]
    fn test_load_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[experiments]\nmonitor_samples = 3").unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.experiments.monitor_samples, Some(3));
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn test_find_config_in_ancestors() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join(".gclabrc.toml"), "").unwrap();

        let found = find_config_in_ancestors(&nested).unwrap();
        assert_eq!(found, dir.path().join(".gclabrc.toml"));
    }
}
