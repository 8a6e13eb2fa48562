use cohort_core::CommunityId;
use cohort_graph::{GraphState, Partition, TemporalGraph};
use tracing::debug;

use crate::{CommunityDetector, CommunityError};

/// Continuity wrapper around a pluggable community detector. The detector
/// sees a complete initial membership for every node (new nodes are seeded
/// into fresh communities), zero-edge graphs never reach the weighted
/// detection path, and isolated nodes are corrected into singleton
/// communities afterwards.
pub struct TeamAssigner<D: CommunityDetector> {
    detector: D,
}

impl<D: CommunityDetector> TeamAssigner<D> {
    pub fn new(detector: D) -> Self {
        Self { detector }
    }

    /// Annotate every snapshot with a team partition, threading each
    /// finalized partition into the next snapshot as the detection seed.
    pub fn assign(&self, temporal: &mut TemporalGraph) -> Result<(), CommunityError> {
        let mut previous = Partition::new();
        for snapshot in temporal.snapshots_mut() {
            let partition = self.assign_snapshot(snapshot, &previous)?;
            previous = partition.clone();
            snapshot.set_teams(partition);
        }
        Ok(())
    }

    fn assign_snapshot(
        &self,
        snapshot: &GraphState,
        previous: &Partition,
    ) -> Result<Partition, CommunityError> {
        let seed = seed_partition(snapshot, previous);

        let partition = if snapshot.has_edges() {
            let detected = self.detector.detect(snapshot, &seed);
            verify_cover(self.detector.name(), snapshot, &detected)?;
            detected
        } else {
            // nothing to optimize without edges; the seed already gives
            // every node a community and the isolation pass below splits
            // any shared ones
            seed
        };

        let corrected = isolate_singletons(snapshot, partition);
        debug!(
            timestamp = %snapshot.timestamp(),
            communities = distinct_communities(&corrected),
            "assigned teams"
        );
        Ok(corrected)
    }
}

/// Extend the previous partition to the current node set: nodes already
/// known keep their community, nodes appearing for the first time each get
/// a brand-new community id.
fn seed_partition(snapshot: &GraphState, previous: &Partition) -> Partition {
    let mut next_fresh = next_community_id(previous);
    let mut seed = Partition::new();
    for &node in snapshot.nodes() {
        match previous.get(&node) {
            Some(&community) => {
                seed.insert(node, community);
            }
            None => {
                seed.insert(node, next_fresh);
                next_fresh += 1;
            }
        }
    }
    seed
}

/// A node that lost all its edges keeps its seeded community through
/// detection; move every such node that still shares a community with
/// others into a fresh singleton.
fn isolate_singletons(snapshot: &GraphState, mut partition: Partition) -> Partition {
    let mut next_fresh = next_community_id(&partition);
    let isolated: Vec<_> = snapshot
        .nodes()
        .iter()
        .copied()
        .filter(|&node| snapshot.is_isolated(node))
        .collect();

    for node in isolated {
        let community = partition[&node];
        let members = partition
            .values()
            .filter(|&&other| other == community)
            .count();
        if members > 1 {
            partition.insert(node, next_fresh);
            next_fresh += 1;
        }
    }

    partition
}

fn verify_cover(
    detector: &'static str,
    snapshot: &GraphState,
    partition: &Partition,
) -> Result<(), CommunityError> {
    for &node in snapshot.nodes() {
        if !partition.contains_key(&node) {
            return Err(CommunityError::MissingAssignment {
                detector,
                resource: node,
            });
        }
    }
    for &node in partition.keys() {
        if !snapshot.contains_node(node) {
            return Err(CommunityError::ForeignAssignment {
                detector,
                resource: node,
            });
        }
    }
    Ok(())
}

fn next_community_id(partition: &Partition) -> CommunityId {
    partition
        .values()
        .max()
        .map(|&max| max + 1)
        .unwrap_or_default()
}

fn distinct_communities(partition: &Partition) -> usize {
    let mut ids: Vec<_> = partition.values().collect();
    ids.sort();
    ids.dedup();
    ids.len()
}
