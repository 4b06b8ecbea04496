//! Lookup statistics.
//!
//! The object cache reports every resolution to a [`LookupRecorder`]. The
//! default recorder does nothing; [`CacheStats`] keeps per-type counters in
//! memory and [`MetricsRecorder`] forwards to the `metrics` facade. Reporting
//! is always triggered by the host through a [`StatsReporter`].

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use metrics::counter;
use serde::Serialize;
use tracing::info;

use super::lock::mutex_lock;
use crate::telemetry::{METRIC_CONTEXT_CREATE_TOTAL, METRIC_CONTEXT_HIT_TOTAL};

const SOURCE: &str = "cache::stats";

/// Receives one call per cache resolution.
pub trait LookupRecorder: Send + Sync {
    fn record_lookup(&self, type_name: &'static str, was_hit: bool);
}

/// Discards every lookup.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRecorder;

impl LookupRecorder for NoopRecorder {
    fn record_lookup(&self, _type_name: &'static str, _was_hit: bool) {}
}

/// Create and hit counts for one context type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LookupCounts {
    pub creates: u64,
    pub hits: u64,
}

impl LookupCounts {
    pub fn lookups(&self) -> u64 {
        self.creates + self.hits
    }
}

/// One row of a stats dump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeStats {
    pub type_name: &'static str,
    pub creates: u64,
    pub hits: u64,
}

/// In-memory per-type counters.
#[derive(Debug, Default)]
pub struct CacheStats {
    counts: Mutex<BTreeMap<&'static str, LookupCounts>>,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every type seen so far, ordered by type name.
    pub fn dump(&self) -> Vec<TypeStats> {
        mutex_lock(&self.counts, SOURCE, "dump")
            .iter()
            .map(|(type_name, counts)| TypeStats {
                type_name: *type_name,
                creates: counts.creates,
                hits: counts.hits,
            })
            .collect()
    }

    pub fn get(&self, type_name: &str) -> LookupCounts {
        mutex_lock(&self.counts, SOURCE, "get")
            .get(type_name)
            .copied()
            .unwrap_or_default()
    }

    pub fn totals(&self) -> LookupCounts {
        mutex_lock(&self.counts, SOURCE, "totals")
            .values()
            .fold(LookupCounts::default(), |acc, counts| LookupCounts {
                creates: acc.creates + counts.creates,
                hits: acc.hits + counts.hits,
            })
    }

    pub fn reset(&self) {
        mutex_lock(&self.counts, SOURCE, "reset").clear();
    }
}

impl LookupRecorder for CacheStats {
    fn record_lookup(&self, type_name: &'static str, was_hit: bool) {
        let mut counts = mutex_lock(&self.counts, SOURCE, "record_lookup");
        let entry = counts.entry(type_name).or_default();
        if was_hit {
            entry.hits += 1;
        } else {
            entry.creates += 1;
        }
    }
}

/// Forwards lookups to the global `metrics` recorder.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetricsRecorder;

impl LookupRecorder for MetricsRecorder {
    fn record_lookup(&self, type_name: &'static str, was_hit: bool) {
        if was_hit {
            counter!(METRIC_CONTEXT_HIT_TOTAL, "context_type" => type_name).increment(1);
        } else {
            counter!(METRIC_CONTEXT_CREATE_TOTAL, "context_type" => type_name).increment(1);
        }
    }
}

/// Forwards each lookup to several recorders in order.
#[derive(Default, Clone)]
pub struct FanoutRecorder {
    recorders: Vec<Arc<dyn LookupRecorder>>,
}

impl FanoutRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, recorder: Arc<dyn LookupRecorder>) -> Self {
        self.recorders.push(recorder);
        self
    }

    pub fn len(&self) -> usize {
        self.recorders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recorders.is_empty()
    }
}

impl LookupRecorder for FanoutRecorder {
    fn record_lookup(&self, type_name: &'static str, was_hit: bool) {
        for recorder in &self.recorders {
            recorder.record_lookup(type_name, was_hit);
        }
    }
}

/// Presents a stats dump somewhere.
pub trait StatsReporter {
    fn report(&mut self, rows: &[TypeStats]) -> io::Result<()>;
}

/// Logs one `info` event per row.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl StatsReporter for TracingReporter {
    fn report(&mut self, rows: &[TypeStats]) -> io::Result<()> {
        for row in rows {
            info!(
                context_type = row.type_name,
                creates = row.creates,
                hits = row.hits,
                "Context cache stats"
            );
        }
        Ok(())
    }
}

/// Writes an aligned text table with a totals line.
pub struct TableReporter<W> {
    out: W,
}

impl<W: Write> TableReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> StatsReporter for TableReporter<W> {
    fn report(&mut self, rows: &[TypeStats]) -> io::Result<()> {
        const HEADER: &str = "Context";
        const TOTAL: &str = "TOTAL";

        let width = rows
            .iter()
            .map(|row| row.type_name.len())
            .chain([HEADER.len(), TOTAL.len()])
            .max()
            .unwrap_or(HEADER.len());

        writeln!(self.out, "{HEADER:<width$}  {:>8}  {:>8}", "Creates", "Hits")?;
        let mut creates = 0;
        let mut hits = 0;
        for row in rows {
            writeln!(
                self.out,
                "{:<width$}  {:>8}  {:>8}",
                row.type_name, row.creates, row.hits
            )?;
            creates += row.creates;
            hits += row.hits;
        }
        writeln!(self.out, "{TOTAL:<width$}  {creates:>8}  {hits:>8}")?;
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_creates_and_hits_per_type() {
        let stats = CacheStats::new();
        stats.record_lookup("Serializer", false);
        stats.record_lookup("Serializer", true);
        stats.record_lookup("Serializer", true);
        stats.record_lookup("Parser", false);

        assert_eq!(
            stats.dump(),
            vec![
                TypeStats {
                    type_name: "Parser",
                    creates: 1,
                    hits: 0,
                },
                TypeStats {
                    type_name: "Serializer",
                    creates: 1,
                    hits: 2,
                },
            ]
        );
        assert_eq!(stats.totals().lookups(), 4);

        stats.reset();
        assert!(stats.dump().is_empty());
        assert_eq!(stats.get("Serializer"), LookupCounts::default());
    }

    #[test]
    fn fanout_reaches_every_recorder() {
        let first = Arc::new(CacheStats::new());
        let second = Arc::new(CacheStats::new());
        let fanout = FanoutRecorder::new()
            .with(first.clone())
            .with(second.clone())
            .with(Arc::new(NoopRecorder));

        fanout.record_lookup("Serializer", true);

        assert_eq!(fanout.len(), 3);
        assert_eq!(first.get("Serializer").hits, 1);
        assert_eq!(second.get("Serializer").hits, 1);
    }

    #[test]
    fn table_reporter_aligns_columns() {
        let rows = vec![
            TypeStats {
                type_name: "JsonSerializer",
                creates: 2,
                hits: 1,
            },
            TypeStats {
                type_name: "Parser",
                creates: 1,
                hits: 10,
            },
        ];

        let mut reporter = TableReporter::new(Vec::new());
        reporter.report(&rows).expect("writes to memory");
        let table = String::from_utf8(reporter.into_inner()).expect("utf8 output");

        let expected = "\
Context          Creates      Hits
JsonSerializer         2         1
Parser                 1        10
TOTAL                  3        11
";
        assert_eq!(table, expected);
    }

    #[test]
    fn stats_survive_poisoned_lock() {
        use std::panic::{AssertUnwindSafe, catch_unwind};

        let stats = CacheStats::new();
        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = stats.counts.lock().expect("lock should be acquired");
            panic!("poison stats lock");
        }));

        stats.record_lookup("Serializer", false);
        assert_eq!(stats.get("Serializer").creates, 1);
    }
}
