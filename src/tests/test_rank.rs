use crate::cache::{cached, CacheStrategy};
use crate::rank::{top_similar, TopK};
use crate::tests::demo_trained;

#[test]
fn top_k_matches_a_full_sort() {
    let scores = [0.7, 0.1, 0.9, 0.3, 0.5, 0.2, 0.8];
    let mut top = TopK::new(3);
    for (node, &score) in scores.iter().enumerate() {
        top.insert(node, score);
    }
    let got = top.into_sorted();

    let mut full: Vec<(usize, f64)> = scores.iter().copied().enumerate().collect();
    full.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
    full.truncate(3);
    assert_eq!(got, full);
}

#[test]
fn top_k_zero_limit_stays_empty() {
    let mut top = TopK::new(0);
    top.insert(0, 1.0);
    top.insert(1, 2.0);
    assert!(top.is_empty());
    assert!(top.into_sorted().is_empty());
}

#[test]
fn top_k_ties_keep_insertion_order() {
    let mut top = TopK::new(4);
    top.insert(5, 1.0);
    top.insert(7, 1.0);
    top.insert(6, 0.5);
    top.insert(8, 1.0);
    assert_eq!(top.into_sorted(), vec![(6, 0.5), (5, 1.0), (7, 1.0), (8, 1.0)]);
}

#[test]
fn top_k_evicts_the_worst_entry() {
    let mut top = TopK::new(2);
    top.insert(0, 3.0);
    top.insert(1, 1.0);
    top.insert(2, 2.0);
    assert_eq!(top.len(), 2);
    assert_eq!(top.into_sorted(), vec![(1, 1.0), (2, 2.0)]);
}

#[test]
fn top_similar_skips_the_source_and_sorts_ascending() {
    let index = demo_trained(false).index;
    let ranked = top_similar(&mut &index, 0, 0..5, 10).unwrap();
    assert_eq!(ranked.len(), 4);
    assert!(ranked.iter().all(|&(node, _)| node != 0));
    for window in ranked.windows(2) {
        assert!(window[0].1.value <= window[1].1.value);
    }
    for &(node, score) in &ranked {
        assert_eq!(score, index.score(0, node).unwrap());
    }
}

#[test]
fn top_similar_honors_the_limit() {
    let index = demo_trained(false).index;
    let ranked = top_similar(&mut &index, 2, 0..5, 2).unwrap();
    assert_eq!(ranked.len(), 2);
}

#[test]
fn top_similar_works_through_a_cache() {
    let index = demo_trained(false).index;
    let direct = top_similar(&mut &index, 1, 0..5, 3).unwrap();
    let mut scorer = cached(&index, CacheStrategy::Dot).unwrap();
    let via_cache = top_similar(&mut *scorer, 1, 0..5, 3).unwrap();
    assert_eq!(direct, via_cache);
}

#[test]
fn top_similar_propagates_scoring_errors() {
    let index = demo_trained(false).index;
    assert!(top_similar(&mut &index, 0, [1, 42], 5).is_err());
}
