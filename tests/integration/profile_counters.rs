#![allow(missing_docs)]

//! Counters are process-global, so everything runs inside one test.

use quarry::query::{profile_snapshot, reset_profile, set_profiling, QueryProfileSnapshot};
use quarry::Queryable;

#[test]
fn counters_track_evaluation_work() {
    set_profiling(true);
    reset_profile();

    let q = Queryable::from_cursor(vec![5, 3, 8, 1]);
    assert_eq!(q.order_by(|x| *x).to_list(), vec![1, 3, 5, 8]);
    assert_eq!(q.count(), 4);
    assert_eq!(
        profile_snapshot(),
        QueryProfileSnapshot {
            traversals: 2,
            source_draws: 4,
            memo_builds: 0,
            buffered_elements: 4,
        }
    );

    reset_profile();
    let secondary = Queryable::new(vec![3, 8]);
    let common = q.intersect(&secondary);
    assert_eq!(common.to_list(), vec![3, 8]);
    assert_eq!(common.to_list(), vec![3, 8]);
    let snapshot = profile_snapshot();
    assert_eq!(snapshot.memo_builds, 1);
    // two primary traversals plus one for building the key set
    assert_eq!(snapshot.traversals, 3);
    assert_eq!(snapshot.source_draws, 0);

    reset_profile();
    let projected = Queryable::new(1..=3).select(|x| x * 2).reverse();
    assert_eq!(projected.to_list(), vec![6, 4, 2]);
    let snapshot = profile_snapshot();
    // the projected query traverses its parent once per traversal
    assert_eq!(snapshot.traversals, 2);
    assert_eq!(snapshot.buffered_elements, 3);

    set_profiling(false);
    reset_profile();
    assert_eq!(q.count(), 4);
    assert_eq!(profile_snapshot(), QueryProfileSnapshot::default());
}
