use approx::assert_relative_eq;
use sprs::TriMat;

use crate::error::SimError;
use crate::provider::Provider;
use crate::tests::{demo_provider, demo_trained, DEMO_K, DEMO_MU};
use crate::train::Trainer;

#[test]
fn rejects_degenerate_k() {
    let provider = demo_provider();
    let adj = provider.adjacency().unwrap();
    assert!(matches!(
        Trainer::new(DEMO_MU, 0).fit(adj),
        Err(SimError::InvalidK { k: 0, n: 5 })
    ));
    assert!(matches!(
        Trainer::new(DEMO_MU, 5).fit(adj),
        Err(SimError::InvalidK { k: 5, n: 5 })
    ));
    assert!(matches!(
        Trainer::new(DEMO_MU, 9).fit(adj),
        Err(SimError::InvalidK { k: 9, n: 5 })
    ));
}

#[test]
fn rejects_mu_outside_open_unit_interval() {
    let provider = demo_provider();
    let adj = provider.adjacency().unwrap();
    for mu in [0.0, 1.0, 1.5, -0.25] {
        assert!(matches!(
            Trainer::new(mu, DEMO_K).fit(adj),
            Err(SimError::InvalidMu(_))
        ));
    }
}

#[test]
fn rejects_directed_short_form() {
    let provider = demo_provider();
    let adj = provider.adjacency().unwrap();
    let result = Trainer::new(DEMO_MU, DEMO_K)
        .with_directed(true)
        .with_short_form(true)
        .fit(adj);
    assert!(matches!(result, Err(SimError::ShortFormUndirectedOnly)));
}

#[test]
fn rejects_empty_adjacency() {
    let adj = TriMat::<f64>::new((0, 0)).to_csr();
    assert!(matches!(
        Trainer::new(DEMO_MU, DEMO_K).fit(&adj),
        Err(SimError::EmptyGraph)
    ));
}

#[test]
fn undirected_long_form_shape_and_report() {
    crate::tests::init();
    let outcome = demo_trained(false);
    assert_eq!(outcome.index.len(), 5);
    assert_eq!(outcome.index.rank(), DEMO_K);
    assert!(!outcome.index.is_short());
    assert!(!outcome.index.is_complex());
    assert_eq!(outcome.report.kept.len(), DEMO_K);
    assert!(outcome.report.dropped.is_empty());
    assert!(!outcome.report.lossy());
    // Undirected eigenvalues are real
    for &(_, im) in &outcome.report.kept {
        assert_eq!(im, 0.0);
    }
}

#[test]
fn scores_are_symmetric_with_zero_self_distance() {
    let outcome = demo_trained(false);
    let index = &outcome.index;
    for a in 0..index.len() {
        assert_eq!(index.score(a, a).unwrap().value, 0.0);
        for b in 0..index.len() {
            let ab = index.score(a, b).unwrap();
            let ba = index.score(b, a).unwrap();
            assert_eq!(ab.value, ba.value, "score({a},{b}) != score({b},{a})");
            assert_eq!(ab.imag, 0.0);
            assert!(!ab.suspect);
        }
    }
}

#[test]
fn short_form_matches_long_form() {
    let long = demo_trained(false);
    let short = demo_trained(true);
    assert!(short.index.is_short());
    assert_eq!(short.index.len(), long.index.len());
    for a in 0..long.index.len() {
        for b in 0..long.index.len() {
            let lv = long.index.score(a, b).unwrap().value;
            let sv = short.index.score(a, b).unwrap().value;
            assert_relative_eq!(lv, sv, epsilon = 1e-8);
        }
    }
}

#[test]
fn zero_degree_node_embeds_at_origin() {
    crate::tests::init();
    // Node 1 never appears in an edge, so it has zero degree.
    let provider = crate::provider::OffsetProvider::from_edges(&[(0, 2), (2, 0)], 0).unwrap();
    let outcome = Trainer::new(DEMO_MU, 1).fit(provider.adjacency().unwrap()).unwrap();
    let index = &outcome.index;
    assert_eq!(index.len(), 3);
    let s = index.score(0, 1).unwrap();
    assert!(s.value.is_finite());
    // Origin embedding means the isolated node is equidistant from everything.
    assert_relative_eq!(
        index.score(0, 1).unwrap().value,
        index.dot(0, 0).unwrap().value,
        epsilon = 1e-12
    );
}

#[test]
fn fit_provider_binds_node_mapping() {
    let provider = demo_provider();
    let outcome = Trainer::new(DEMO_MU, DEMO_K).fit_provider(&provider).unwrap();
    let bound = &outcome.index;
    assert_eq!(bound.node_list(), provider.node_list());
    let by_id = bound.score("a", "b").unwrap();
    let by_index = bound.inner().score(0, 1).unwrap();
    assert_eq!(by_id, by_index);
}

#[test]
fn directed_training_on_symmetric_graph() {
    let provider = demo_provider();
    let outcome = Trainer::new(DEMO_MU, DEMO_K)
        .with_directed(true)
        .fit(provider.adjacency().unwrap())
        .unwrap();
    let index = &outcome.index;
    assert_eq!(index.len(), 5);
    assert!(!index.is_short());
    assert_eq!(index.rank(), outcome.report.kept.len());
    for a in 0..index.len() {
        assert_eq!(index.score(a, a).unwrap().value, 0.0);
        for b in 0..index.len() {
            let ab = index.score(a, b).unwrap();
            let ba = index.score(b, a).unwrap();
            assert_eq!(ab.value, ba.value);
            assert!(!ab.suspect);
        }
    }
}

#[test]
fn directed_training_keeps_conjugate_pairs() {
    crate::tests::init();
    // 3-cycle plus a weak pendant: spectrum is the cube roots of unity plus
    // zero, so the top-3 window holds a real eigenvalue and one full
    // conjugate pair.
    let mut triplets = TriMat::new((4, 4));
    triplets.add_triplet(0, 1, 1.0);
    triplets.add_triplet(1, 2, 1.0);
    triplets.add_triplet(2, 0, 1.0);
    triplets.add_triplet(3, 0, 1.0);
    let adj = triplets.to_csr();

    let outcome = Trainer::new(DEMO_MU, 3).with_directed(true).fit(&adj).unwrap();
    assert_eq!(outcome.report.kept.len(), 3);
    assert!(!outcome.report.lossy());
    assert!(outcome.index.is_complex());
    assert_eq!(outcome.report.kept.iter().filter(|&&(_, im)| im != 0.0).count(), 2);

    // Symmetrization must hold even with complex components in play.
    let index = &outcome.index;
    for a in 0..index.len() {
        for b in 0..index.len() {
            assert_eq!(index.score(a, b).unwrap().value, index.score(b, a).unwrap().value);
        }
    }
}

#[test]
fn resolvent_singularity_is_detected() {
    // Doubled edges give the two-node core eigenvalues +/-2; mu = 0.5 puts
    // the resolvent denominator at exactly zero for lambda = 2.
    let mut triplets = TriMat::new((3, 3));
    triplets.add_triplet(0, 1, 1.0);
    triplets.add_triplet(0, 1, 1.0);
    triplets.add_triplet(1, 0, 1.0);
    triplets.add_triplet(1, 0, 1.0);
    triplets.add_triplet(2, 0, 1.0);
    let adj = triplets.to_csr();

    let result = Trainer::new(0.5, 2).with_directed(true).fit(&adj);
    match result {
        Err(SimError::SingularRegularization { re, im, mu }) => {
            assert_relative_eq!(re, 2.0, epsilon = 1e-6);
            assert_relative_eq!(im, 0.0, epsilon = 1e-6);
            assert_relative_eq!(mu, 0.5);
        }
        _ => panic!("expected SingularRegularization"),
    }
}

#[test]
fn trainer_equality_is_configuration_equality() {
    let a = Trainer::new(DEMO_MU, DEMO_K);
    let b = Trainer::new(DEMO_MU, DEMO_K);
    assert_eq!(a, b);
    assert_ne!(a, Trainer::new(DEMO_MU, DEMO_K + 1));
    assert_ne!(a, Trainer::new(0.25, DEMO_K));
    assert_ne!(a, Trainer::new(DEMO_MU, DEMO_K).with_directed(true));
    assert_ne!(a, Trainer::new(DEMO_MU, DEMO_K).with_short_form(true));
}
