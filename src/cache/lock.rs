use std::sync::{Mutex, MutexGuard};

use tracing::warn;

/// Lock `lock`, recovering the guard if a panicking thread poisoned it.
///
/// Counters guarded this way stay usable; at worst they miss the increment
/// the panicking thread was making.
pub(crate) fn mutex_lock<'a, T>(
    lock: &'a Mutex<T>,
    target: &'static str,
    op: &'static str,
) -> MutexGuard<'a, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(
                op,
                target_module = target,
                lock_kind = "mutex.lock",
                result = "poisoned_recovered",
                hint = "counts may be stale after panic in another thread",
                "Recovered from poisoned stats lock"
            );
            poisoned.into_inner()
        }
    }
}
