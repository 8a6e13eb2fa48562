use std::collections::BTreeMap;

use cohort_core::{CommunityId, ResourceId};
use cohort_graph::{GraphState, Partition};

use crate::CommunityDetector;

/// Clauset–Newman–Moore style greedy modularity detection: start from
/// singletons and keep merging the connected community pair with the best
/// modularity gain until no merge improves modularity. Deterministic, but
/// unlike the seeded detector it re-derives community ids on every call;
/// the initial membership only matters to algorithms that refine a seed.
pub struct GreedyModularityDetector {
    resolution: f64,
}

impl GreedyModularityDetector {
    pub fn new() -> Self {
        Self { resolution: 0.9 }
    }

    pub fn with_resolution(resolution: f64) -> Self {
        Self { resolution }
    }
}

impl Default for GreedyModularityDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl CommunityDetector for GreedyModularityDetector {
    fn name(&self) -> &'static str {
        "greedy_modularity"
    }

    fn detect(&self, graph: &GraphState, _seed: &Partition) -> Partition {
        let nodes: Vec<ResourceId> = graph.nodes().iter().copied().collect();
        let position: BTreeMap<ResourceId, usize> = nodes
            .iter()
            .enumerate()
            .map(|(index, &node)| (node, index))
            .collect();

        let total_weight: f64 = graph.edges().map(|(_, weight)| weight).sum();
        let mut membership: Vec<usize> = (0..nodes.len()).collect();
        if total_weight <= 0.0 {
            return renumber(&nodes, &membership);
        }

        let mut strength = vec![0.0f64; nodes.len()];
        for (pair, weight) in graph.edges() {
            strength[position[&pair.first()]] += weight;
            strength[position[&pair.second()]] += weight;
        }

        loop {
            // inter-community weight and total strength per community
            let mut between = BTreeMap::<(usize, usize), f64>::new();
            for (pair, weight) in graph.edges() {
                let a = membership[position[&pair.first()]];
                let b = membership[position[&pair.second()]];
                if a != b {
                    *between.entry((a.min(b), a.max(b))).or_insert(0.0) += weight;
                }
            }
            if between.is_empty() {
                break;
            }

            let mut community_strength = BTreeMap::<usize, f64>::new();
            for (index, &community) in membership.iter().enumerate() {
                *community_strength.entry(community).or_insert(0.0) += strength[index];
            }

            let mut best: Option<((usize, usize), f64)> = None;
            for (&(a, b), &weight) in &between {
                let gain = weight / total_weight
                    - self.resolution * community_strength[&a] * community_strength[&b]
                        / (2.0 * total_weight * total_weight);
                let better = match best {
                    Some((_, best_gain)) => gain > best_gain + f64::EPSILON,
                    None => true,
                };
                if better {
                    best = Some(((a, b), gain));
                }
            }

            match best {
                Some(((keep, absorb), gain)) if gain > 0.0 => {
                    for community in membership.iter_mut() {
                        if *community == absorb {
                            *community = keep;
                        }
                    }
                }
                _ => break,
            }
        }

        renumber(&nodes, &membership)
    }
}

/// Dense community ids in order of each community's smallest member.
fn renumber(nodes: &[ResourceId], membership: &[usize]) -> Partition {
    let mut dense = BTreeMap::<usize, CommunityId>::new();
    let mut next: CommunityId = 0;
    let mut partition = Partition::new();
    for (index, &node) in nodes.iter().enumerate() {
        let id = *dense.entry(membership[index]).or_insert_with(|| {
            let id = next;
            next += 1;
            id
        });
        partition.insert(node, id);
    }
    partition
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

    #[test]
    fn merges_tight_triangles_into_two_communities() {
        let graph = two_triangles();
        let partition = GreedyModularityDetector::new().detect(&graph, &Partition::new());

        assert_eq!(partition[&1], partition[&2]);
        assert_eq!(partition[&2], partition[&3]);
        assert_eq!(partition[&4], partition[&5]);
        assert_eq!(partition[&5], partition[&6]);
        assert_ne!(partition[&1], partition[&4]);
    }

    #[test]
    fn zero_edge_graph_yields_singletons() {
        let mut graph = GraphState::new(ts());
        for node in [3, 5, 8] {
            graph.add_node(node);
        }

        let partition = GreedyModularityDetector::new().detect(&graph, &Partition::new());
        assert_eq!(partition[&3], 0);
        assert_eq!(partition[&5], 1);
        assert_eq!(partition[&8], 2);
    }

    #[test]
    fn community_ids_are_dense_and_ordered_by_smallest_member() {
        let graph = two_triangles();
        let partition = GreedyModularityDetector::new().detect(&graph, &Partition::new());
        assert_eq!(partition[&1], 0);
        assert_eq!(partition[&4], 1);
    }
}
