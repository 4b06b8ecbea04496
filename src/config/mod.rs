//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{num::NonZeroU32, path::PathBuf, str::FromStr};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::store::{PropertyStore, PropertyValue};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "ctxcache";
const ENV_PREFIX: &str = "CTXCACHE";
const DEFAULT_PROBE_THREADS: u32 = 8;
const DEFAULT_PROBE_ITERATIONS: u32 = 1_000;
const DEFAULT_PROBE_VARIANTS: u32 = 4;

/// Command-line arguments for the ctxcache binary.
#[derive(Debug, Parser)]
#[command(name = "ctxcache", version, about = "Context cache diagnostics")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "CTXCACHE_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Resolve contexts from many threads and print cache statistics.
    Probe(ProbeArgs),
    /// Print the resolved settings and exit.
    Settings(SettingsArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ProbeArgs {
    #[command(flatten)]
    pub overrides: ProbeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct SettingsArgs {
    #[command(flatten)]
    pub overrides: ProbeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ProbeOverrides {
    /// Override the number of probe threads.
    #[arg(long = "threads", value_name = "COUNT")]
    pub threads: Option<u32>,

    /// Override the number of resolutions per thread.
    #[arg(long = "iterations", value_name = "COUNT")]
    pub iterations: Option<u32>,

    /// Override the number of distinct relevant configurations.
    #[arg(long = "variants", value_name = "COUNT")]
    pub variants: Option<u32>,

    /// Toggle full store comparison on cache hits.
    #[arg(
        long = "deep-match",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub deep_match: Option<bool>,

    /// Toggle forwarding of cache counters to the metrics facade.
    #[arg(
        long = "emit-metrics",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub emit_metrics: Option<bool>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Add a default property, e.g. `--set Probe.depth=3`. Repeatable.
    #[arg(long = "set", value_name = "NAME=VALUE")]
    pub set: Vec<String>,
}

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub cache: CacheSettings,
    pub logging: LoggingSettings,
    pub probe: ProbeSettings,
    /// Properties every probe context starts from.
    pub defaults: PropertyStore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    pub deep_match: bool,
    pub collect_stats: bool,
    pub emit_metrics: bool,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeSettings {
    pub threads: NonZeroU32,
    pub iterations: NonZeroU32,
    pub variants: NonZeroU32,
}

impl ProbeSettings {
    /// Distinct configurations a probe run builds.
    ///
    /// Each thread cycles through variants by iteration, so runs shorter than
    /// one cycle never reach the higher variants.
    pub fn expected_instances(&self) -> usize {
        self.iterations.min(self.variants).get() as usize
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Probe(args)) => raw.apply_probe_overrides(&args.overrides),
        Some(Command::Settings(args)) => raw.apply_probe_overrides(&args.overrides),
        None => raw.apply_probe_overrides(&ProbeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    cache: RawCacheSettings,
    logging: RawLoggingSettings,
    probe: RawProbeSettings,
    /// `Namespace.key=value` assignments.
    defaults: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    deep_match: Option<bool>,
    collect_stats: Option<bool>,
    emit_metrics: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawProbeSettings {
    threads: Option<u32>,
    iterations: Option<u32>,
    variants: Option<u32>,
}

impl RawSettings {
    fn apply_probe_overrides(&mut self, overrides: &ProbeOverrides) {
        if let Some(threads) = overrides.threads {
            self.probe.threads = Some(threads);
        }
        if let Some(iterations) = overrides.iterations {
            self.probe.iterations = Some(iterations);
        }
        if let Some(variants) = overrides.variants {
            self.probe.variants = Some(variants);
        }
        if let Some(deep_match) = overrides.deep_match {
            self.cache.deep_match = Some(deep_match);
        }
        if let Some(emit_metrics) = overrides.emit_metrics {
            self.cache.emit_metrics = Some(emit_metrics);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        self.defaults.extend(overrides.set.iter().cloned());
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            cache,
            logging,
            probe,
            defaults,
        } = raw;

        let cache = build_cache_settings(cache);
        let logging = build_logging_settings(logging)?;
        let probe = build_probe_settings(probe)?;
        let defaults = build_defaults(&defaults)?;

        Ok(Self {
            cache,
            logging,
            probe,
            defaults,
        })
    }
}

fn build_cache_settings(cache: RawCacheSettings) -> CacheSettings {
    CacheSettings {
        deep_match: cache.deep_match.unwrap_or(false),
        collect_stats: cache.collect_stats.unwrap_or(true),
        emit_metrics: cache.emit_metrics.unwrap_or(false),
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_probe_settings(probe: RawProbeSettings) -> Result<ProbeSettings, LoadError> {
    Ok(ProbeSettings {
        threads: non_zero_u32(
            probe.threads.unwrap_or(DEFAULT_PROBE_THREADS),
            "probe.threads",
        )?,
        iterations: non_zero_u32(
            probe.iterations.unwrap_or(DEFAULT_PROBE_ITERATIONS),
            "probe.iterations",
        )?,
        variants: non_zero_u32(
            probe.variants.unwrap_or(DEFAULT_PROBE_VARIANTS),
            "probe.variants",
        )?,
    })
}

fn build_defaults(assignments: &[String]) -> Result<PropertyStore, LoadError> {
    let mut builder = PropertyStore::builder();
    for assignment in assignments {
        let (name, value) = parse_assignment(assignment)
            .map_err(|reason| LoadError::invalid("defaults", reason))?;
        builder.set(name, value);
    }
    Ok(builder.build())
}

fn parse_assignment(assignment: &str) -> Result<(String, PropertyValue), String> {
    let (name, value) = assignment
        .split_once('=')
        .ok_or_else(|| format!("`{assignment}` is not of the form NAME=VALUE"))?;

    let name = name.trim();
    match name.split_once('.') {
        Some((namespace, key)) if !namespace.is_empty() && !key.is_empty() => {}
        _ => return Err(format!("`{name}` is not of the form Namespace.key")),
    }

    let value = value.trim();
    let value = match value {
        "true" => PropertyValue::Bool(true),
        "false" => PropertyValue::Bool(false),
        other => other
            .parse::<i64>()
            .map(PropertyValue::Int)
            .unwrap_or_else(|_| PropertyValue::from(other)),
    };

    Ok((name.to_string(), value))
}

fn non_zero_u32(value: u32, key: &'static str) -> Result<NonZeroU32, LoadError> {
    NonZeroU32::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}
