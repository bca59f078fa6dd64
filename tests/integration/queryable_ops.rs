#![allow(missing_docs)]

use std::cell::Cell;
use std::rc::Rc;

use quarry::{Error, Grouping, OperatorKind, Queryable};

fn counting_source(pulls: &Rc<Cell<usize>>) -> Queryable<u64> {
    let counter = Rc::clone(pulls);
    Queryable::from_cursor((1u64..).inspect(move |_| counter.set(counter.get() + 1)))
}

#[test]
fn where_keeps_matching_elements_in_order() {
    let q = Queryable::new(1..=10);
    assert_eq!(q.r#where(|x| x % 3 == 0).to_list(), vec![3, 6, 9]);
    assert_eq!(q.filter(|x| *x > 8).to_list(), vec![9, 10]);
    let odd_positions = Queryable::new(vec![5, 6, 7, 8]).where_indexed(|_, i| i % 2 == 1);
    assert_eq!(odd_positions.to_list(), vec![6, 8]);
}

#[test]
fn select_family() {
    let words = Queryable::new(vec!["ab", "c"]);
    assert_eq!(words.select(|w| w.len()).to_list(), vec![2, 1]);
    assert_eq!(
        words.select_indexed(|w, i| format!("{i}:{w}")).to_list(),
        vec!["0:ab", "1:c"]
    );
    assert_eq!(
        words.select_many(|w| w.chars().collect::<Vec<_>>()).to_list(),
        vec!['a', 'b', 'c']
    );
    assert_eq!(
        words
            .select_many_indexed(|w, i| vec![w; i + 1])
            .to_list(),
        vec!["ab", "c", "c"]
    );
    assert_eq!(
        words
            .select_many_with(|w| w.chars().collect::<Vec<_>>(), |w, c| format!("{w}/{c}"))
            .to_list(),
        vec!["ab/a", "ab/b", "c/c"]
    );
    assert_eq!(Queryable::new(vec![1u8, 2]).cast::<u32>().to_list(), vec![1u32, 2]);
}

#[test]
fn skip_take_and_while_variants() {
    let q = Queryable::new(1..=6);
    assert_eq!(q.skip(4).unwrap().to_list(), vec![5, 6]);
    assert_eq!(q.take(2).unwrap().to_list(), vec![1, 2]);
    assert!(q.take(0).unwrap().to_list().is_empty());
    assert_eq!(q.skip(10).unwrap().count(), 0);

    let bumpy = Queryable::new(vec![1, 2, 5, 1, 2]);
    assert_eq!(bumpy.skip_while(|x| *x < 3).to_list(), vec![5, 1, 2]);
    assert_eq!(bumpy.take_while(|x| *x < 3).to_list(), vec![1, 2]);
}

#[test]
fn negative_counts_are_contract_violations() {
    let q = Queryable::new(1..=3);
    let err = q.take(-1).unwrap_err();
    assert_eq!(err.code(), "ContractViolation");
    assert!(matches!(
        q.skip(-5),
        Err(Error::ContractViolation {
            operator: "skip",
            argument: "count",
            ..
        })
    ));
}

#[test]
fn take_never_over_pulls_an_unbounded_source() {
    let pulls = Rc::new(Cell::new(0));
    let q = counting_source(&pulls).take(5).unwrap();
    assert_eq!(pulls.get(), 0);
    assert_eq!(q.to_list(), vec![1, 2, 3, 4, 5]);
    assert_eq!(pulls.get(), 5);

    let pulls = Rc::new(Cell::new(0));
    let evens = counting_source(&pulls).r#where(|x| x % 2 == 0).select(|x| x * 10);
    assert_eq!(evens.first().unwrap(), 20);
    assert_eq!(pulls.get(), 2);
}

#[test]
fn concat_and_reverse() {
    let head = Queryable::new(1..=2);
    let joined = head.concat(&Queryable::new(vec![9, 8]));
    assert_eq!(joined.to_list(), vec![1, 2, 9, 8]);
    assert_eq!(joined.reverse().to_list(), vec![8, 9, 2, 1]);
    assert_eq!(joined.to_list(), vec![1, 2, 9, 8]);
}

#[test]
fn ordering_chain_primary_key_wins() {
    let q = Queryable::new((1..=10).rev());
    let by_parity = q.order_by(|x| x % 2).then_by(|x| *x).unwrap();
    assert_eq!(by_parity.to_list(), vec![2, 4, 6, 8, 10, 1, 3, 5, 7, 9]);

    let q = Queryable::new(1..=10);
    let desc = q.order_by(|x| x % 2).then_by_descending(|x| *x).unwrap();
    assert_eq!(desc.to_list(), vec![10, 8, 6, 4, 2, 9, 7, 5, 3, 1]);
}

#[test]
fn descending_primary_with_parity_tie_breaker() {
    // keys of the primary sort are unique, so the tie-breaker never applies
    let q = Queryable::new(1..=10)
        .order_by_descending(|x| *x)
        .then_by(|x| x % 2)
        .unwrap();
    assert_eq!(q.to_list(), vec![10, 9, 8, 7, 6, 5, 4, 3, 2, 1]);
}

#[test]
fn descending_sort_is_stable_among_equal_keys() {
    let rows = Queryable::new(vec![(1, 'a'), (2, 'b'), (1, 'c'), (2, 'd'), (3, 'e')]);
    let sorted = rows.order_by_descending(|r| r.0).select(|r| r.1);
    assert_eq!(sorted.to_list(), vec!['e', 'b', 'd', 'a', 'c']);
}

#[test]
fn then_by_after_non_sort_is_rejected() {
    let q = Queryable::new(1..=3);
    assert!(matches!(
        q.then_by(|x| *x),
        Err(Error::UnorderedChain { operator: "then_by" })
    ));
    assert!(matches!(
        q.order_by(|x| *x).take(2).unwrap().then_by_descending(|x| *x),
        Err(Error::UnorderedChain {
            operator: "then_by_descending"
        })
    ));
}

#[test]
fn group_by_variants() {
    let q = Queryable::new(1..=7);
    assert_eq!(
        q.group_by(|x| x % 3).to_list(),
        vec![
            Grouping::new(0, vec![3, 6]),
            Grouping::new(1, vec![1, 4, 7]),
            Grouping::new(2, vec![2, 5]),
        ]
    );
    let scaled = q.group_by_with(|x| x % 2, |x| x * 10).to_list();
    assert_eq!(scaled[0].elements(), &[20, 40, 60]);
    assert_eq!(*scaled[1].key(), 1);
    let sizes = q.group_by_result(|x| x % 2, |x| x, |k, v: Vec<i32>| (k, v.len()));
    assert_eq!(sizes.to_list(), vec![(0, 3), (1, 4)]);
}

#[test]
fn distinct_keeps_first_occurrence() {
    let already = Queryable::new(vec![1, 3, 5, 9, 10, 13, 7, 2]);
    assert_eq!(already.distinct().to_list(), vec![1, 3, 5, 9, 10, 13, 7, 2]);
    assert_eq!(Queryable::new(vec![1, 1, 1, 1, 1]).distinct().to_list(), vec![1]);
    let words = Queryable::new(vec!["aa", "b", "cc", "d", "eee"]);
    assert_eq!(words.distinct_by(|w| w.len()).to_list(), vec!["aa", "b", "eee"]);
}

#[test]
fn union_dedupes_across_both_sequences() {
    let a = Queryable::new(vec![1, 2, 3, 2]);
    let b = Queryable::new(vec![3, 4, 1, 5]);
    assert_eq!(a.union(&b).to_list(), vec![1, 2, 3, 4, 5]);
    let c = Queryable::new(vec![-1, 6]);
    assert_eq!(a.union_by(&c, |x: &i32| x.abs()).to_list(), vec![1, 2, 3, 6]);
}

#[test]
fn intersect_and_difference_partition_the_primary() {
    let a = Queryable::new(vec![1, 2, 2, 3, 4]);
    let b = Queryable::new(vec![2, 4, 6]);
    assert_eq!(a.intersect(&b).to_list(), vec![2, 4]);
    assert_eq!(a.difference(&b).to_list(), vec![1, 3]);
    assert_eq!(a.except_values(&b).to_list(), vec![1, 3]);

    let q = Queryable::new(1..=10);
    assert_eq!(
        q.difference_by(&Queryable::new(vec![1, 3, 5, 7, 9]), |x| x % 2).to_list(),
        vec![2, 4, 6, 8, 10]
    );
    assert_eq!(
        q.intersect_by(&Queryable::new(vec![7]), |x| x % 3).to_list(),
        vec![1]
    );
    assert!(q
        .except_values_by(&Queryable::new(vec![0, 1]), |x| x % 2)
        .is_empty());
}

#[test]
fn set_operations_key_each_side_separately() {
    let words = Queryable::new(vec!["fig", "kiwi", "pear", "banana", "plum"]);
    let lengths = Queryable::new(vec![4usize, 6]);
    let matching = words.intersect_by_keys(&lengths, |w: &&str| w.len(), |n: &usize| *n);
    assert_eq!(matching.to_list(), vec!["kiwi", "banana"]);
    assert_eq!(matching.to_list(), vec!["kiwi", "banana"]);
    assert_eq!(
        words
            .difference_by_keys(&Queryable::new(vec![6usize]), |w: &&str| w.len(), |n: &usize| *n)
            .to_list(),
        vec!["fig", "kiwi", "pear", "plum"]
    );

    let ones = Queryable::new(vec![1, 12]);
    let tens = Queryable::new(vec![25, 13, 30]);
    let merged = ones.union_by_keys(&tens, |x: &i32| x % 10, |x: &i32| x / 10);
    assert_eq!(merged.to_list(), vec![1, 12, 30]);
}

#[test]
fn join_matches_in_secondary_order() {
    let q = Queryable::new(1..=10);
    let pairs = q.join_pairs(&q, |x| *x, |x| x % 3);
    assert_eq!(
        pairs.to_list(),
        vec![(1, 1), (1, 4), (1, 7), (1, 10), (2, 2), (2, 5), (2, 8)]
    );
    let first_matches: Vec<i32> = pairs.r#where(|p| p.0 == 1).select(|p| p.1).to_list();
    assert_eq!(first_matches, vec![1, 4, 7, 10]);

    let sums = q.join(&q, |x| *x, |x| x % 3, |a, b| a + b).take(2).unwrap();
    assert_eq!(sums.to_list(), vec![2, 5]);
}

#[test]
fn group_join_emits_every_outer_element() {
    let outer = Queryable::new(vec!["a", "b", "c"]);
    let inner = Queryable::new(vec![("a", 1), ("c", 2), ("a", 3)]);
    let grouped = outer.group_join_pairs(&inner, |o| *o, |i| i.0);
    let counts: Vec<(&str, usize)> = grouped.select(|(o, ms)| (o, ms.len())).to_list();
    assert_eq!(counts, vec![("a", 2), ("b", 0), ("c", 1)]);

    let totals = outer.group_join(&inner, |o| *o, |i| i.0, |o, ms| {
        (o, ms.iter().map(|m| m.1).sum::<i32>())
    });
    assert_eq!(totals.to_list(), vec![("a", 4), ("b", 0), ("c", 2)]);
}

#[test]
fn zip_stops_at_shorter_sequence() {
    let a = Queryable::new(1..=5);
    let b = Queryable::new(vec!["x", "y"]);
    assert_eq!(a.zip_pairs(&b).to_list(), vec![(1, "x"), (2, "y")]);
    assert_eq!(
        a.zip(&a.skip(1).unwrap(), |x, y| x * y).to_list(),
        vec![2, 6, 12, 20]
    );
}

#[test]
fn default_if_empty() {
    let q = Queryable::new(1..=3);
    assert_eq!(q.r#where(|x| *x > 5).default_if_empty(0).to_list(), vec![0]);
    assert_eq!(q.default_if_empty(0).to_list(), vec![1, 2, 3]);
}

#[test]
fn explain_lists_stages_in_application_order() {
    let q = Queryable::new(1..=10)
        .r#where(|x| x % 2 == 0)
        .order_by_descending(|x| *x)
        .select(|x| x.to_string())
        .distinct()
        .take(3)
        .unwrap();
    assert_eq!(
        q.explain(),
        vec![
            OperatorKind::Filter,
            OperatorKind::SortDescending,
            OperatorKind::Project,
            OperatorKind::Distinct,
            OperatorKind::Take,
        ]
    );
    assert_eq!(q.to_list(), vec!["10", "8", "6"]);
}

#[test]
fn siblings_derived_from_one_parent_are_independent() {
    let base = Queryable::new(vec![3, 1, 2]);
    let sorted = base.order_by(|x| *x);
    let reversed = base.reverse();
    let then = sorted.then_by_descending(|x| -x).unwrap();
    assert_eq!(base.to_list(), vec![3, 1, 2]);
    assert_eq!(sorted.to_list(), vec![1, 2, 3]);
    assert_eq!(reversed.to_list(), vec![2, 1, 3]);
    assert_eq!(then.to_list(), vec![1, 2, 3]);
}
