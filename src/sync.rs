use std::sync::{Mutex, MutexGuard};

/// Acquire a mutex guard, intentionally ignoring poisoning.
///
/// Poisoning means another task panicked while holding the lock. The state
/// guarded in this crate (pending tables, export tables, port queues, object
/// properties) has no invariants spanning multiple fields, so the worst
/// outcome of continuing is a lost entry.
///
/// This also avoids propagating non-`Send` poison errors across async
/// boundaries.
pub(crate) fn lock_ignore_poison<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // ---
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
