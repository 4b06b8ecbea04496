use std::{
    collections::HashSet,
    io::{self, Write},
    process,
    sync::Arc,
    thread,
};

use clap::Parser;
use ctxcache::{
    cache::{CacheConfig, ObjectCache, StatsReporter, TableReporter, TracingReporter},
    config::{self, CliArgs, Command, ProbeArgs, Settings},
    context::{Context, ContextBuilder, ContextSettings},
    error::{ConfigurationError, ContextError, CreateError, SessionError},
    store::PropertyStore,
    telemetry,
};
use mime_guess::{Mime, mime};
use thiserror::Error;
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

const PROBE_VARIANT: &str = "Probe.variant";
const PROBE_STRICT: &str = "Probe.strict";
const PROBE_DEPTH: &str = "Probe.depth";
const CALLER_THREAD: &str = "Caller.thread";
const DEFAULT_PROBE_DEPTH: u32 = 8;

#[derive(Debug, Error)]
enum AppError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] config::LoadError),
    #[error(transparent)]
    Telemetry(#[from] telemetry::TelemetryError),
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("failed to write report: {0}")]
    Io(#[from] io::Error),
    #[error("probe thread panicked")]
    ThreadPanicked,
    #[error("{variants} distinct configurations resolved to {instances} instances")]
    Divergence { variants: usize, instances: usize },
}

fn main() {
    if let Err(error) = run() {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

fn run() -> Result<(), AppError> {
    let cli_args = CliArgs::parse();
    let settings = config::load(&cli_args)?;

    let command = cli_args
        .command
        .unwrap_or(Command::Probe(ProbeArgs::default()));

    telemetry::init(&settings.logging)?;

    match command {
        Command::Probe(_) => run_probe(&settings),
        Command::Settings(_) => run_settings(&settings),
    }
}

fn run_settings(settings: &Settings) -> Result<(), AppError> {
    let mut out = io::stdout().lock();
    writeln!(out, "{settings:#?}")?;
    Ok(())
}

fn run_probe(settings: &Settings) -> Result<(), AppError> {
    let cache = Arc::new(ObjectCache::new(CacheConfig::from(&settings.cache)));
    let threads = settings.probe.threads.get();
    let iterations = settings.probe.iterations.get();
    let variants = settings.probe.variants.get();

    info!(
        threads,
        iterations,
        variants,
        deep_match = cache.is_deep_match(),
        "Starting context cache probe"
    );

    let results: Vec<Result<HashSet<usize>, AppError>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..threads)
            .map(|thread_index| {
                let cache = Arc::clone(&cache);
                let defaults = &settings.defaults;
                scope.spawn(move || {
                    probe_thread(&cache, defaults, thread_index, iterations, variants)
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|_| Err(AppError::ThreadPanicked))
            })
            .collect()
    });

    let mut instances = HashSet::new();
    for result in results {
        instances.extend(result?);
    }

    let expected = settings.probe.expected_instances();
    if instances.len() != expected {
        return Err(AppError::Divergence {
            variants: expected,
            instances: instances.len(),
        });
    }

    info!(
        instances = instances.len(),
        entries = cache.len(),
        "Context cache probe finished"
    );

    let sample = ContextBuilder::<ProbeContext>::from_store(&settings.defaults)
        .set(PROBE_VARIANT, 0)
        .cache(Arc::clone(&cache))
        .build()?;

    let mut out = io::stdout().lock();
    match cache.stats() {
        Some(stats) => {
            let rows = stats.dump();
            TracingReporter.report(&rows)?;
            TableReporter::new(&mut out).report(&rows)?;
        }
        None => info!("Stats collection disabled; no table to print"),
    }
    writeln!(out, "{}", sample.as_map())?;
    Ok(())
}

fn probe_thread(
    cache: &Arc<ObjectCache>,
    defaults: &PropertyStore,
    thread_index: u32,
    iterations: u32,
    variants: u32,
) -> Result<HashSet<usize>, AppError> {
    let mut seen = HashSet::new();
    for iteration in 0..iterations {
        let context = ContextBuilder::<ProbeContext>::from_store(defaults)
            .set(PROBE_VARIANT, i64::from(iteration % variants))
            .set(CALLER_THREAD, i64::from(thread_index))
            .cache(Arc::clone(cache))
            .build()?;

        context.create_session().write_to(io::sink(), |session, pipe| {
            let depth = session.property_or(PROBE_DEPTH, DEFAULT_PROBE_DEPTH)?;
            let rendered = session.context().render(depth);
            pipe.write_all(rendered.as_bytes())?;
            Ok(())
        })?;

        seen.insert(Arc::as_ptr(&context) as usize);
    }
    Ok(seen)
}

/// Stand-in for an expensive serializer-like context.
struct ProbeContext {
    store: PropertyStore,
    settings: ContextSettings,
    variant: i64,
    strict: bool,
}

impl ProbeContext {
    fn render(&self, depth: u32) -> String {
        let marker = if self.strict { '!' } else { '.' };
        format!(
            "{}{}",
            self.variant,
            std::iter::repeat_n(marker, depth as usize).collect::<String>()
        )
    }
}

impl Context for ProbeContext {
    const TYPE_NAME: &'static str = "Probe";

    fn lineage() -> &'static [&'static str] {
        &["Serializer"]
    }

    fn create(store: &PropertyStore) -> Result<Self, CreateError> {
        let depth = store.get_or(PROBE_DEPTH, DEFAULT_PROBE_DEPTH)?;
        if depth == 0 {
            return Err(
                ConfigurationError::invalid_value(PROBE_DEPTH, "must be greater than zero").into(),
            );
        }

        Ok(Self {
            store: store.clone(),
            settings: ContextSettings::from_store(store)?,
            variant: store.get_or(PROBE_VARIANT, 0)?,
            strict: store.get_or(PROBE_STRICT, false)?,
        })
    }

    fn property_store(&self) -> &PropertyStore {
        &self.store
    }

    fn settings(&self) -> &ContextSettings {
        &self.settings
    }

    fn default_media_type(&self) -> Mime {
        mime::TEXT_PLAIN
    }
}
