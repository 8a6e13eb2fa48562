use std::fmt;

use cohort_core::{ResourceId, Timestamp};
use serde::Serialize;

use crate::matcher::Team;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// When a change happened: a single snapshot instant, or the expulsion-to-
/// expansion range of a reassignment that spans several snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeSpan {
    At(Timestamp),
    Between(Timestamp, Timestamp),
}

impl TimeSpan {
    /// First instant of the span, for chronological ordering.
    pub fn start(self) -> Timestamp {
        match self {
            Self::At(at) => at,
            Self::Between(start, _) => start,
        }
    }
}

impl fmt::Display for TimeSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::At(at) => write!(f, "{}", at.format(TIMESTAMP_FORMAT)),
            Self::Between(start, end) => write!(
                f,
                "{} - {}",
                start.format(TIMESTAMP_FORMAT),
                end.format(TIMESTAMP_FORMAT)
            ),
        }
    }
}

/// A resource new to the whole population.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecruitmentChange {
    pub timestamp: Timestamp,
    pub resource: ResourceId,
}

/// A resource entering an existing team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpansionChange {
    pub timestamp: Timestamp,
    pub resource: ResourceId,
    pub added_to: Team,
    pub resulting: Team,
    /// Index of the snapshot transition the change was observed on.
    pub transition: usize,
}

/// A resource leaving a team it belonged to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpulsionChange {
    pub timestamp: Timestamp,
    pub resource: ResourceId,
    pub removed_from: Team,
    pub resulting: Team,
    /// Index of the snapshot transition the change was observed on.
    pub transition: usize,
}

/// A team falling apart, its members scattering over other teams.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupDissolutionChange {
    pub timestamp: Timestamp,
    pub original: Team,
    pub destinations: Vec<Team>,
}

/// A team absorbed in its entirety by another team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupMergeChange {
    pub timestamp: Timestamp,
    pub original: Team,
    pub merged_with: Team,
    pub resulting: Team,
}

/// A team splitting into multiple smaller teams.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupPartitionChange {
    pub timestamp: Timestamp,
    pub original: Team,
    pub parts: Vec<Team>,
}

/// A resource moving from one team to another, either within a single
/// transition or via a stretch of snapshots in which it works alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReassignmentChange {
    pub span: TimeSpan,
    pub resource: ResourceId,
    pub reassigned_from: Team,
    pub reassigned_to: Team,
    pub resulting_origin: Option<Team>,
    pub original_destination: Option<Team>,
}

/// Tagged union over the seven change kinds, for unified export.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MembershipChange {
    Recruitment(RecruitmentChange),
    Expansion(ExpansionChange),
    Expulsion(ExpulsionChange),
    GroupDissolution(GroupDissolutionChange),
    GroupMerge(GroupMergeChange),
    GroupPartition(GroupPartitionChange),
    Reassignment(ReassignmentChange),
}

impl MembershipChange {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Recruitment(_) => "Recruitment",
            Self::Expansion(_) => "Expansion",
            Self::Expulsion(_) => "Expulsion",
            Self::GroupDissolution(_) => "Group Dissolution",
            Self::GroupMerge(_) => "Group Merge",
            Self::GroupPartition(_) => "Group Partition",
            Self::Reassignment(_) => "Reassignment",
        }
    }

    pub fn span(&self) -> TimeSpan {
        match self {
            Self::Recruitment(change) => TimeSpan::At(change.timestamp),
            Self::Expansion(change) => TimeSpan::At(change.timestamp),
            Self::Expulsion(change) => TimeSpan::At(change.timestamp),
            Self::GroupDissolution(change) => TimeSpan::At(change.timestamp),
            Self::GroupMerge(change) => TimeSpan::At(change.timestamp),
            Self::GroupPartition(change) => TimeSpan::At(change.timestamp),
            Self::Reassignment(change) => change.span,
        }
    }
}
