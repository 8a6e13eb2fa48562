mod assigner;
mod greedy;
mod louvain;

use cohort_core::ResourceId;
use cohort_graph::{GraphState, Partition};
use thiserror::Error;

pub use assigner::TeamAssigner;
pub use greedy::GreedyModularityDetector;
pub use louvain::LouvainDetector;

/// Pluggable community-detection capability. Implementations must accept a
/// per-node initial membership seed, tolerate a zero-edge graph, and return
/// every node of the graph exactly once.
pub trait CommunityDetector {
    fn name(&self) -> &'static str;

    fn detect(&self, graph: &GraphState, seed: &Partition) -> Partition;
}

impl<D: CommunityDetector + ?Sized> CommunityDetector for Box<D> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn detect(&self, graph: &GraphState, seed: &Partition) -> Partition {
        (**self).detect(graph, seed)
    }
}

#[derive(Debug, Error)]
pub enum CommunityError {
    #[error("community detector '{detector}' left node {resource} without a community")]
    MissingAssignment {
        detector: &'static str,
        resource: ResourceId,
    },
    #[error("community detector '{detector}' assigned node {resource}, which is not in the graph")]
    ForeignAssignment {
        detector: &'static str,
        resource: ResourceId,
    },
}
