mod groups;
mod matcher;
mod membership;
mod record;
mod reassignment;

use chrono::Duration;
use cohort_config::GroupEventPolicy;
use cohort_core::{ResourceId, Timestamp};
use cohort_graph::TemporalGraph;
use thiserror::Error;

pub use groups::{detect_dissolutions, detect_merges, detect_partitions};
pub use matcher::{Team, TeamMatch, match_teams, match_transitions, teams_of};
pub use membership::{detect_expansions, detect_expulsions, detect_recruitments};
pub use reassignment::detect_reassignments;
pub use record::{
    ExpansionChange, ExpulsionChange, GroupDissolutionChange, GroupMergeChange,
    GroupPartitionChange, MembershipChange, ReassignmentChange, RecruitmentChange, TimeSpan,
};

#[derive(Debug, Error)]
pub enum ChangeError {
    #[error("snapshot at {timestamp} carries no team assignment; assign teams before mining changes")]
    MissingTeams { timestamp: Timestamp },
    #[error("resource {resource} should be resolvable in the team matches at {timestamp} but is not")]
    UnmatchedResource {
        resource: ResourceId,
        timestamp: Timestamp,
    },
}

/// All membership changes mined from one snapshot sequence.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct ChangeReport {
    pub recruitments: Vec<RecruitmentChange>,
    pub expansions: Vec<ExpansionChange>,
    pub expulsions: Vec<ExpulsionChange>,
    pub dissolutions: Vec<GroupDissolutionChange>,
    pub merges: Vec<GroupMergeChange>,
    pub partitions: Vec<GroupPartitionChange>,
    pub reassignments: Vec<ReassignmentChange>,
}

impl ChangeReport {
    pub fn total(&self) -> usize {
        self.recruitments.len()
            + self.expansions.len()
            + self.expulsions.len()
            + self.dissolutions.len()
            + self.merges.len()
            + self.partitions.len()
            + self.reassignments.len()
    }

    /// Every change as a tagged record.
    pub fn all_changes(&self) -> Vec<MembershipChange> {
        let mut changes = Vec::with_capacity(self.total());
        changes.extend(self.recruitments.iter().cloned().map(MembershipChange::Recruitment));
        changes.extend(self.expansions.iter().cloned().map(MembershipChange::Expansion));
        changes.extend(self.expulsions.iter().cloned().map(MembershipChange::Expulsion));
        changes.extend(
            self.dissolutions
                .iter()
                .cloned()
                .map(MembershipChange::GroupDissolution),
        );
        changes.extend(self.merges.iter().cloned().map(MembershipChange::GroupMerge));
        changes.extend(
            self.partitions
                .iter()
                .cloned()
                .map(MembershipChange::GroupPartition),
        );
        changes.extend(
            self.reassignments
                .iter()
                .cloned()
                .map(MembershipChange::Reassignment),
        );
        changes
    }
}

/// Match teams across every transition and run all seven classifiers.
/// Reassignment mining consumes the completed expansion and expulsion
/// results, so those run first.
pub fn detect_all(
    temporal: &TemporalGraph,
    policy: GroupEventPolicy,
    reassignment_window: Duration,
) -> Result<ChangeReport, ChangeError> {
    let matches = match_transitions(temporal)?;

    let recruitments = detect_recruitments(temporal);
    let expansions = detect_expansions(temporal, &matches);
    let expulsions = detect_expulsions(temporal, &matches);
    let dissolutions = detect_dissolutions(temporal, &matches);
    let merges = detect_merges(temporal, &matches, policy);
    let partitions = detect_partitions(temporal, &matches, policy);
    let reassignments =
        detect_reassignments(&matches, &expansions, &expulsions, reassignment_window)?;

    Ok(ChangeReport {
        recruitments,
        expansions,
        expulsions,
        dissolutions,
        merges,
        partitions,
        reassignments,
    })
}
