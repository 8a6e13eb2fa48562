use std::collections::BTreeMap;

use cohort_core::{CommunityId, ResourceId};
use cohort_graph::{GraphState, Partition};
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;

use crate::CommunityDetector;

const GAIN_EPSILON: f64 = 1e-12;

/// Seeded Louvain-style community detection: repeated local moving of nodes
/// to the neighboring community with the best modularity gain, starting
/// from the supplied membership. Nodes are visited in ascending id order
/// and ties never move a node, which keeps the result deterministic and
/// lets an already-optimal seed pass through unchanged.
pub struct LouvainDetector {
    max_passes: usize,
}

impl LouvainDetector {
    pub fn new() -> Self {
        Self { max_passes: 64 }
    }
}

impl Default for LouvainDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl CommunityDetector for LouvainDetector {
    fn name(&self) -> &'static str {
        "louvain"
    }

    fn detect(&self, graph: &GraphState, seed: &Partition) -> Partition {
        let nodes: Vec<ResourceId> = graph.nodes().iter().copied().collect();
        let (weighted, index_of) = build_weighted_graph(graph, &nodes);

        let total_weight: f64 = graph.edges().map(|(_, weight)| weight).sum();
        if total_weight <= 0.0 {
            return seeded_membership(&nodes, seed);
        }

        let strength: Vec<f64> = nodes
            .iter()
            .map(|node| {
                weighted
                    .edges(index_of[node])
                    .map(|edge| *edge.weight())
                    .sum()
            })
            .collect();

        let seeded = seeded_membership(&nodes, seed);
        let mut community: Vec<CommunityId> = nodes.iter().map(|node| seeded[node]).collect();
        let mut community_strength = BTreeMap::<CommunityId, f64>::new();
        for (index, &assignment) in community.iter().enumerate() {
            *community_strength.entry(assignment).or_insert(0.0) += strength[index];
        }

        let mut improved = true;
        let mut passes = 0;
        while improved && passes < self.max_passes {
            improved = false;
            passes += 1;

            for (index, &node) in nodes.iter().enumerate() {
                let node_index = index_of[&node];
                let own_strength = strength[index];
                let current = community[index];

                let mut neighbor_links = BTreeMap::<CommunityId, f64>::new();
                for edge in weighted.edges(node_index) {
                    let other = if edge.source() == node_index {
                        edge.target()
                    } else {
                        edge.source()
                    };
                    if other == node_index {
                        continue;
                    }
                    *neighbor_links
                        .entry(community[other.index()])
                        .or_insert(0.0) += *edge.weight();
                }

                // evaluate gains with the node detached from its community
                *community_strength.entry(current).or_insert(0.0) -= own_strength;

                let gain_of = |candidate: CommunityId, links: f64| {
                    let candidate_strength = community_strength
                        .get(&candidate)
                        .copied()
                        .unwrap_or(0.0);
                    links - candidate_strength * own_strength / (2.0 * total_weight)
                };

                let mut best = current;
                let mut best_gain = gain_of(
                    current,
                    neighbor_links.get(&current).copied().unwrap_or(0.0),
                );
                for (&candidate, &links) in &neighbor_links {
                    if candidate == current {
                        continue;
                    }
                    let gain = gain_of(candidate, links);
                    if gain > best_gain + GAIN_EPSILON {
                        best = candidate;
                        best_gain = gain;
                    }
                }

                if best != current {
                    community[index] = best;
                    improved = true;
                }
                *community_strength.entry(best).or_insert(0.0) += own_strength;
            }
        }

        nodes.into_iter().zip(community).collect()
    }
}

fn build_weighted_graph(
    graph: &GraphState,
    nodes: &[ResourceId],
) -> (UnGraph<ResourceId, f64>, BTreeMap<ResourceId, NodeIndex>) {
    let mut weighted = UnGraph::<ResourceId, f64>::default();
    let mut index_of = BTreeMap::new();
    for &node in nodes {
        index_of.insert(node, weighted.add_node(node));
    }
    for (pair, weight) in graph.edges() {
        weighted.add_edge(index_of[&pair.first()], index_of[&pair.second()], weight);
    }
    (weighted, index_of)
}

/// Complete the seed to the node set: unseeded nodes get fresh ids past the
/// seeded maximum.
fn seeded_membership(nodes: &[ResourceId], seed: &Partition) -> Partition {
    let mut next_fresh: CommunityId = seed.values().max().map(|&max| max + 1).unwrap_or_default();
    let mut membership = Partition::new();
    for &node in nodes {
        match seed.get(&node) {
            Some(&community) => {
                membership.insert(node, community);
            }
            None => {
                membership.insert(node, next_fresh);
                next_fresh += 1;
            }
        }
    }
    membership
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use cohort_core::{ResourcePair, Timestamp};

    use super::*;

    fn ts() -> Timestamp {
        NaiveDate::from_ymd_opt(2022, 3, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    /// Two tight triangles joined by one weak bridge.
    fn two_triangles() -> GraphState {
        let mut graph = GraphState::new(ts());
        for node in 1..=6 {
            graph.add_node(node);
        }
        for (a, b) in [(1, 2), (2, 3), (1, 3), (4, 5), (5, 6), (4, 6)] {
            graph.set_edge_weight(ResourcePair::new(a, b), 0.9);
        }
        graph.set_edge_weight(ResourcePair::new(3, 4), 0.05);
        graph
    }

    fn singleton_seed(graph: &GraphState) -> Partition {
        graph
            .nodes()
            .iter()
            .enumerate()
            .map(|(index, &node)| (node, index as CommunityId))
            .collect()
    }

    #[test]
    fn splits_two_triangles_into_two_communities() {
        let graph = two_triangles();
        let partition = LouvainDetector::new().detect(&graph, &singleton_seed(&graph));

        assert_eq!(partition[&1], partition[&2]);
        assert_eq!(partition[&2], partition[&3]);
        assert_eq!(partition[&4], partition[&5]);
        assert_eq!(partition[&5], partition[&6]);
        assert_ne!(partition[&1], partition[&4]);
    }

    #[test]
    fn an_optimal_seed_passes_through_unchanged() {
        let graph = two_triangles();
        let detector = LouvainDetector::new();
        let first = detector.detect(&graph, &singleton_seed(&graph));
        let second = detector.detect(&graph, &first);
        assert_eq!(first, second);
    }

    #[test]
    fn detection_is_deterministic() {
        let graph = two_triangles();
        let seed = singleton_seed(&graph);
        let detector = LouvainDetector::new();
        assert_eq!(detector.detect(&graph, &seed), detector.detect(&graph, &seed));
    }

    #[test]
    fn unseeded_nodes_receive_fresh_communities() {
        let mut graph = GraphState::new(ts());
        graph.add_node(1);
        graph.add_node(2);
        graph.set_edge_weight(ResourcePair::new(1, 2), 0.4);

        let seed = Partition::from([(1, 3)]);
        let partition = LouvainDetector::new().detect(&graph, &seed);
        // node 2 is seeded past the maximum, then pulled into 1's community
        assert_eq!(partition[&1], partition[&2]);
    }
}
