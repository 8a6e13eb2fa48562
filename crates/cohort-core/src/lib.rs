use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

pub type ResourceId = u64;
pub type ObjectId = u64;
pub type CommunityId = u32;

/// Wall-clock instant of the activity logs. The logs carry no zone offset,
/// so all simulation time is naive local time.
pub type Timestamp = chrono::NaiveDateTime;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
    pub id: ObjectId,
    pub label: String,
}

/// Canonical unordered pair of resources. Construction normalizes the order
/// so the pair can serve as a map key regardless of how the log lists the
/// two resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourcePair {
    a: ResourceId,
    b: ResourceId,
}

impl ResourcePair {
    pub fn new(first: ResourceId, second: ResourceId) -> Self {
        if first <= second {
            Self { a: first, b: second }
        } else {
            Self { a: second, b: first }
        }
    }

    pub fn first(self) -> ResourceId {
        self.a
    }

    pub fn second(self) -> ResourceId {
        self.b
    }

    pub fn contains(self, resource: ResourceId) -> bool {
        self.a == resource || self.b == resource
    }

    /// The pair member that is not `resource`, if `resource` is a member.
    pub fn other(self, resource: ResourceId) -> Option<ResourceId> {
        if resource == self.a {
            Some(self.b)
        } else if resource == self.b {
            Some(self.a)
        } else {
            None
        }
    }
}

/// One mined collaboration window between a resource pair on a single
/// object. The window timestamps come from the session miner; the engine
/// collapses each window to an instantaneous event at its first timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollaborationSession {
    pub pair: ResourcePair,
    pub object: ObjectId,
    pub first: Timestamp,
    pub last: Timestamp,
    pub median: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkSession {
    pub resource: ResourceId,
    pub first: Timestamp,
    pub last: Timestamp,
    pub median: Timestamp,
}

/// Instantaneous collaboration between two resources. Multiple sessions of
/// the same pair at the same instant merge into one event carrying the
/// union of their object sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollaborationEvent {
    pub pair: ResourcePair,
    pub timestamp: Timestamp,
    pub objects: BTreeSet<ObjectId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkEvent {
    pub resource: ResourceId,
    pub timestamp: Timestamp,
}

/// Collapse collaboration sessions into instantaneous events, one per
/// (pair, instant), merging object sets. The result is ordered by
/// timestamp, then pair.
pub fn collapse_collaboration_sessions(sessions: &[CollaborationSession]) -> Vec<CollaborationEvent> {
    let mut merged = BTreeMap::<(Timestamp, ResourcePair), BTreeSet<ObjectId>>::new();
    for session in sessions {
        merged
            .entry((session.first, session.pair))
            .or_default()
            .insert(session.object);
    }

    merged
        .into_iter()
        .map(|((timestamp, pair), objects)| CollaborationEvent {
            pair,
            timestamp,
            objects,
        })
        .collect()
}

/// Collapse work sessions into instantaneous events at each session's first
/// timestamp, ordered by timestamp then resource.
pub fn collapse_work_sessions(sessions: &[WorkSession]) -> Vec<WorkEvent> {
    let mut events: Vec<WorkEvent> = sessions
        .iter()
        .map(|session| WorkEvent {
            resource: session.resource,
            timestamp: session.first,
        })
        .collect();
    events.sort_by_key(|event| (event.timestamp, event.resource));
    events
}
