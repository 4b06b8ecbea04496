mod common;

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use common::{JsonSerializer, MAX_INDENT, STRICT, isolated_cache, serializer};
use ctxcache::cache::ObjectCache;
use ctxcache::context::{Context, ContextBuilder};

const THREADS: usize = 8;
const ITERATIONS: usize = 200;
const VARIANTS: usize = 5;

#[test]
fn concurrent_builds_converge_per_configuration() {
    let cache = isolated_cache();
    let barrier = Barrier::new(THREADS);

    let pointers: Vec<Vec<(usize, usize)>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|thread_index| {
                let cache = &cache;
                let barrier = &barrier;
                scope.spawn(move || {
                    barrier.wait();
                    (0..ITERATIONS)
                        .map(|iteration| {
                            let variant = iteration % VARIANTS;
                            let context = serializer(cache)
                                .set(MAX_INDENT, variant as i64)
                                .set(STRICT, thread_index as i64 % 2 == 0)
                                .build()
                                .expect("build serializer");
                            assert_eq!(context.max_indent as usize, variant);
                            (variant, Arc::as_ptr(&context) as usize)
                        })
                        .collect()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| handle.join().expect("probe thread completes"))
            .collect()
    });

    let distinct: HashSet<(usize, usize)> = pointers.into_iter().flatten().collect();
    assert_eq!(distinct.len(), VARIANTS, "one instance per variant");

    let counts = cache
        .stats()
        .expect("stats enabled by default")
        .get(JsonSerializer::TYPE_NAME);
    assert_eq!(counts.creates, VARIANTS as u64);
    assert_eq!(counts.creates + counts.hits, (THREADS * ITERATIONS) as u64);
    assert_eq!(cache.entries_for::<JsonSerializer>(), VARIANTS);
}

#[test]
fn losing_candidates_are_discarded() {
    let cache = Arc::new(ObjectCache::default());
    let barrier = Barrier::new(THREADS);
    let constructions = AtomicUsize::new(0);

    let instances: Vec<Arc<JsonSerializer>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                scope.spawn(|| {
                    ContextBuilder::<JsonSerializer>::new()
                        .cache(Arc::clone(&cache))
                        .set(MAX_INDENT, 3)
                        .build_with(|store| {
                            constructions.fetch_add(1, Ordering::SeqCst);
                            barrier.wait();
                            JsonSerializer::create(store)
                        })
                        .expect("build serializer")
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| handle.join().expect("thread completes"))
            .collect()
    });

    assert_eq!(constructions.load(Ordering::SeqCst), THREADS);
    assert!(instances.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    assert_eq!(Arc::strong_count(&instances[0]), THREADS + 1);

    let counts = cache
        .stats()
        .expect("stats enabled by default")
        .get(JsonSerializer::TYPE_NAME);
    assert_eq!(counts.creates, 1);
    assert_eq!(counts.hits, (THREADS - 1) as u64);
}

#[test]
fn deep_match_holds_under_contention() {
    let cache = Arc::new(ObjectCache::builder().deep_match(true).build());

    thread::scope(|scope| {
        for thread_index in 0..THREADS {
            let cache = &cache;
            scope.spawn(move || {
                for variant in 0..VARIANTS {
                    serializer(cache)
                        .set(MAX_INDENT, variant as i64)
                        .set(STRICT, thread_index % 2 == 0)
                        .build()
                        .expect("irrelevant differences are not collisions");
                }
            });
        }
    });

    assert_eq!(cache.len(), VARIANTS);
}
