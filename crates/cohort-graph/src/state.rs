use std::collections::{BTreeMap, BTreeSet};

use cohort_core::{CommunityId, ResourceId, ResourcePair, Timestamp};

/// Team assignment of one snapshot: node id to community id. Community ids
/// are dense non-negative integers, unique per node.
pub type Partition = BTreeMap<ResourceId, CommunityId>;

/// One materialized snapshot of the collaboration network: the node set,
/// the weighted edge set keyed by canonical resource pairs, the "as of"
/// timestamp, and optionally the team assignment added after community
/// detection. `clone()` is a full structural copy; a cloned snapshot shares
/// no mutable storage with its source, so history stays intact while the
/// successor snapshot is built.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphState {
    nodes: BTreeSet<ResourceId>,
    weights: BTreeMap<ResourcePair, f64>,
    timestamp: Timestamp,
    teams: Option<Partition>,
}

impl GraphState {
    pub fn new(timestamp: Timestamp) -> Self {
        Self {
            nodes: BTreeSet::new(),
            weights: BTreeMap::new(),
            timestamp,
            teams: None,
        }
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub(crate) fn set_timestamp(&mut self, timestamp: Timestamp) {
        self.timestamp = timestamp;
    }

    pub fn nodes(&self) -> &BTreeSet<ResourceId> {
        &self.nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains_node(&self, resource: ResourceId) -> bool {
        self.nodes.contains(&resource)
    }

    pub fn add_node(&mut self, resource: ResourceId) {
        self.nodes.insert(resource);
    }

    pub fn edges(&self) -> impl Iterator<Item = (ResourcePair, f64)> + '_ {
        self.weights.iter().map(|(pair, weight)| (*pair, *weight))
    }

    pub fn edge_count(&self) -> usize {
        self.weights.len()
    }

    pub fn has_edges(&self) -> bool {
        !self.weights.is_empty()
    }

    pub fn edge_weight(&self, pair: ResourcePair) -> Option<f64> {
        self.weights.get(&pair).copied()
    }

    pub fn set_edge_weight(&mut self, pair: ResourcePair, weight: f64) {
        self.weights.insert(pair, weight);
    }

    pub fn remove_edge(&mut self, pair: ResourcePair) -> Option<f64> {
        self.weights.remove(&pair)
    }

    pub fn neighbors(&self, resource: ResourceId) -> Vec<ResourceId> {
        self.weights
            .keys()
            .filter_map(|pair| pair.other(resource))
            .collect()
    }

    pub fn is_isolated(&self, resource: ResourceId) -> bool {
        !self.weights.keys().any(|pair| pair.contains(resource))
    }

    pub fn max_edge_weight(&self) -> f64 {
        self.weights.values().copied().fold(0.0, f64::max)
    }

    pub fn teams(&self) -> Option<&Partition> {
        self.teams.as_ref()
    }

    pub fn set_teams(&mut self, teams: Partition) {
        self.teams = Some(teams);
    }
}
