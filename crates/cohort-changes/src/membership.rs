use cohort_graph::TemporalGraph;
use tracing::info;

use crate::matcher::TeamMatch;
use crate::record::{ExpansionChange, ExpulsionChange, RecruitmentChange};

/// A resource appearing in the population for the first time. The first
/// snapshot is exempt: a run usually starts mid-history, so its initial
/// population is not treated as recruited.
pub fn detect_recruitments(temporal: &TemporalGraph) -> Vec<RecruitmentChange> {
    info!("detecting recruitment changes");
    let mut changes = Vec::new();

    for (previous, current) in temporal.transitions() {
        for &resource in current.nodes().difference(previous.nodes()) {
            changes.push(RecruitmentChange {
                timestamp: current.timestamp(),
                resource,
            });
        }
    }

    changes
}

/// A resource joining an existing team: present in the current side of a
/// match but not the previous side. A team appearing out of nowhere with
/// several members is the destination of a reassignment after recruitment,
/// not an expansion, and is deliberately not emitted here.
pub fn detect_expansions(
    temporal: &TemporalGraph,
    matches: &[Vec<TeamMatch>],
) -> Vec<ExpansionChange> {
    info!("detecting expansion changes");
    let mut changes = Vec::new();

    for (transition, (_, current)) in temporal.transitions().enumerate() {
        for team_match in &matches[transition] {
            let (Some(old_team), Some(new_team)) = (&team_match.previous, &team_match.current)
            else {
                continue;
            };
            for &resource in new_team.difference(old_team) {
                changes.push(ExpansionChange {
                    timestamp: current.timestamp(),
                    resource,
                    added_to: old_team.clone(),
                    resulting: new_team.clone(),
                    transition,
                });
            }
        }
    }

    changes
}

/// A resource leaving a team: present in the previous side of a match but
/// not the current side.
pub fn detect_expulsions(
    temporal: &TemporalGraph,
    matches: &[Vec<TeamMatch>],
) -> Vec<ExpulsionChange> {
    info!("detecting expulsion changes");
    let mut changes = Vec::new();

    for (transition, (_, current)) in temporal.transitions().enumerate() {
        for team_match in &matches[transition] {
            let (Some(old_team), Some(new_team)) = (&team_match.previous, &team_match.current)
            else {
                continue;
            };
            for &resource in old_team.difference(new_team) {
                changes.push(ExpulsionChange {
                    timestamp: current.timestamp(),
                    resource,
                    removed_from: old_team.clone(),
                    resulting: new_team.clone(),
                    transition,
                });
            }
        }
    }

    changes
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use cohort_core::{ResourceId, Timestamp};
    use cohort_graph::{GraphState, Partition};

    use super::*;
    use crate::matcher::{Team, match_transitions};

    fn ts(hour: u32) -> Timestamp {
        NaiveDate::from_ymd_opt(2022, 3, 1)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn team(members: &[ResourceId]) -> Team {
        members.iter().copied().collect()
    }

    /// Snapshot whose node set and teams come straight from a partition.
    fn snapshot(at: Timestamp, partition: &[(ResourceId, u32)]) -> GraphState {
        let mut graph = GraphState::new(at);
        let mut teams = Partition::new();
        for &(node, community) in partition {
            graph.add_node(node);
            teams.insert(node, community);
        }
        graph.set_teams(teams);
        graph
    }

    #[test]
    fn recruitment_skips_the_initial_population() {
        let temporal = TemporalGraph::new(vec![
            snapshot(ts(9), &[(1, 0), (2, 0)]),
            snapshot(ts(12), &[(1, 0), (2, 0), (3, 1)]),
        ]);

        let changes = detect_recruitments(&temporal);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].resource, 3);
        assert_eq!(changes[0].timestamp, ts(12));
    }

    #[test]
    fn expansion_lists_each_new_member() {
        let temporal = TemporalGraph::new(vec![
            snapshot(ts(9), &[(1, 0), (2, 0), (3, 1), (4, 1)]),
            snapshot(ts(12), &[(1, 0), (2, 0), (3, 0), (4, 1)]),
        ]);
        let matches = match_transitions(&temporal).expect("matches");

        let changes = detect_expansions(&temporal, &matches);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].resource, 3);
        assert_eq!(changes[0].added_to, team(&[1, 2]));
        assert_eq!(changes[0].resulting, team(&[1, 2, 3]));
        assert_eq!(changes[0].transition, 0);
    }

    #[test]
    fn appearing_multi_member_team_is_not_an_expansion() {
        let temporal = TemporalGraph::new(vec![
            snapshot(ts(9), &[(1, 0), (2, 0)]),
            snapshot(ts(12), &[(1, 0), (2, 0), (8, 3), (9, 3)]),
        ]);
        let matches = match_transitions(&temporal).expect("matches");

        assert!(detect_expansions(&temporal, &matches).is_empty());
    }

    #[test]
    fn expulsion_lists_each_departed_member() {
        let temporal = TemporalGraph::new(vec![
            snapshot(ts(9), &[(1, 0), (2, 0), (3, 0)]),
            snapshot(ts(12), &[(1, 0), (2, 0), (3, 1)]),
        ]);
        let matches = match_transitions(&temporal).expect("matches");

        let changes = detect_expulsions(&temporal, &matches);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].resource, 3);
        assert_eq!(changes[0].removed_from, team(&[1, 2, 3]));
        assert_eq!(changes[0].resulting, team(&[1, 2]));
    }
}
