mod test_rank;
mod test_train;

use crate::provider::{EdgeListProvider, Provider};
use crate::train::{TrainOutcome, Trainer};

pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// 5-node demo graph, undirected (both directions listed). Interning order
/// assigns a=0, b=1, c=2, d=3, e=4.
pub const DEMO_EDGES: [(&str, &str); 8] = [
    ("a", "b"),
    ("a", "c"),
    ("a", "d"),
    ("d", "e"),
    ("b", "a"),
    ("c", "a"),
    ("d", "a"),
    ("e", "d"),
];

pub const DEMO_MU: f64 = 0.5;
pub const DEMO_K: usize = 2;

pub fn demo_provider() -> EdgeListProvider {
    EdgeListProvider::from_edges(DEMO_EDGES)
}

pub fn demo_trained(short_form: bool) -> TrainOutcome {
    let provider = demo_provider();
    Trainer::new(DEMO_MU, DEMO_K)
        .with_short_form(short_form)
        .fit(provider.adjacency().unwrap())
        .unwrap()
}
