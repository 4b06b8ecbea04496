mod common;

use std::collections::HashMap;
use std::sync::Arc;

use common::{MAX_INDENT, Parser, serializer};
use ctxcache::cache::{CacheConfig, MetricsRecorder, ObjectCache};
use ctxcache::context::ContextBuilder;
use ctxcache::telemetry::{self, METRIC_CONTEXT_CREATE_TOTAL, METRIC_CONTEXT_HIT_TOTAL};
use metrics::Unit;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};
use serial_test::serial;

type CounterKey = (String, String);

fn counters(recorder: &DebuggingRecorder) -> HashMap<CounterKey, u64> {
    recorder
        .snapshotter()
        .snapshot()
        .into_vec()
        .into_iter()
        .filter_map(|(composite_key, _, _, value)| {
            let key = composite_key.key();
            let context_type = key
                .labels()
                .find(|label| label.key() == "context_type")
                .map(|label| label.value().to_string())?;
            match value {
                DebugValue::Counter(count) => Some(((key.name().to_string(), context_type), count)),
                _ => None,
            }
        })
        .collect()
}

#[test]
#[serial]
fn lookups_emit_labelled_counters() {
    let recorder = DebuggingRecorder::new();

    metrics::with_local_recorder(&recorder, || {
        let cache = Arc::new(ObjectCache::new(CacheConfig {
            emit_metrics: true,
            ..Default::default()
        }));

        for indent in [2, 2, 2, 4] {
            serializer(&cache)
                .set(MAX_INDENT, indent)
                .build()
                .expect("build serializer");
        }
        ContextBuilder::<Parser>::new()
            .cache(Arc::clone(&cache))
            .build()
            .expect("build parser");
    });

    let counters = counters(&recorder);
    let get = |name: &str, context_type: &str| {
        counters
            .get(&(name.to_string(), context_type.to_string()))
            .copied()
            .unwrap_or(0)
    };

    assert_eq!(get(METRIC_CONTEXT_CREATE_TOTAL, "JsonSerializer"), 2);
    assert_eq!(get(METRIC_CONTEXT_HIT_TOTAL, "JsonSerializer"), 2);
    assert_eq!(get(METRIC_CONTEXT_CREATE_TOTAL, "Parser"), 1);
    assert_eq!(get(METRIC_CONTEXT_HIT_TOTAL, "Parser"), 0);
}

#[test]
#[serial]
fn metrics_are_off_by_default() {
    let recorder = DebuggingRecorder::new();

    metrics::with_local_recorder(&recorder, || {
        let cache = Arc::new(ObjectCache::default());
        serializer(&cache).build().expect("build serializer");
        serializer(&cache).build().expect("build serializer");
    });

    assert!(counters(&recorder).is_empty());
}

#[test]
#[serial]
fn counters_are_described_with_units() {
    let recorder = DebuggingRecorder::new();

    metrics::with_local_recorder(&recorder, || {
        telemetry::describe_metrics();
        let cache = ObjectCache::builder()
            .recorder(Arc::new(MetricsRecorder))
            .build();
        ContextBuilder::<Parser>::new()
            .cache(Arc::new(cache))
            .build()
            .expect("build parser");
    });

    let units: HashMap<String, Option<Unit>> = recorder
        .snapshotter()
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, unit, _, _)| (composite_key.key().name().to_string(), unit))
        .collect();

    assert_eq!(units.get(METRIC_CONTEXT_CREATE_TOTAL), Some(&Some(Unit::Count)));
}
