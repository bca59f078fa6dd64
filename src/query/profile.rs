use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::OnceLock;

/// A snapshot of query evaluation counters.
///
/// Profiling is enabled via the `QUARRY_PROFILE` environment variable or
/// [`set_profiling`], and tracks how much work traversals perform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryProfileSnapshot {
    /// Number of traversals started over any query.
    pub traversals: u64,
    /// Elements drawn from single-pass cursors into replay buffers.
    pub source_draws: u64,
    /// Number of secondary lookups (key sets, join groups) materialised.
    pub memo_builds: u64,
    /// Elements materialised by buffering stages (sort, group, reverse).
    pub buffered_elements: u64,
}

#[derive(Default)]
struct QueryProfileCounters {
    traversals: AtomicU64,
    source_draws: AtomicU64,
    memo_builds: AtomicU64,
    buffered_elements: AtomicU64,
}

static PROFILE_ENABLED: OnceLock<AtomicBool> = OnceLock::new();
static PROFILE_COUNTERS: OnceLock<QueryProfileCounters> = OnceLock::new();

fn enabled_flag() -> &'static AtomicBool {
    PROFILE_ENABLED.get_or_init(|| AtomicBool::new(std::env::var_os("QUARRY_PROFILE").is_some()))
}

fn profiling_enabled() -> bool {
    enabled_flag().load(Ordering::Relaxed)
}

fn counters() -> Option<&'static QueryProfileCounters> {
    profiling_enabled().then(|| PROFILE_COUNTERS.get_or_init(QueryProfileCounters::default))
}

/// Turns profiling on or off for the whole process.
pub fn set_profiling(enabled: bool) {
    enabled_flag().store(enabled, Ordering::Relaxed);
}

pub(crate) enum QueryProfileKind {
    Traversal,
    SourceDraw,
    MemoBuild,
    Buffered,
}

pub(crate) fn record(kind: QueryProfileKind, amount: u64) {
    let Some(counters) = counters() else {
        return;
    };
    let slot = match kind {
        QueryProfileKind::Traversal => &counters.traversals,
        QueryProfileKind::SourceDraw => &counters.source_draws,
        QueryProfileKind::MemoBuild => &counters.memo_builds,
        QueryProfileKind::Buffered => &counters.buffered_elements,
    };
    slot.fetch_add(amount, Ordering::Relaxed);
}

/// Returns the current counter values (all zero when profiling never ran).
pub fn profile_snapshot() -> QueryProfileSnapshot {
    let Some(counters) = PROFILE_COUNTERS.get() else {
        return QueryProfileSnapshot::default();
    };
    QueryProfileSnapshot {
        traversals: counters.traversals.load(Ordering::Relaxed),
        source_draws: counters.source_draws.load(Ordering::Relaxed),
        memo_builds: counters.memo_builds.load(Ordering::Relaxed),
        buffered_elements: counters.buffered_elements.load(Ordering::Relaxed),
    }
}

/// Zeroes every counter.
pub fn reset_profile() {
    if let Some(counters) = PROFILE_COUNTERS.get() {
        counters.traversals.store(0, Ordering::Relaxed);
        counters.source_draws.store(0, Ordering::Relaxed);
        counters.memo_builds.store(0, Ordering::Relaxed);
        counters.buffered_elements.store(0, Ordering::Relaxed);
    }
}
