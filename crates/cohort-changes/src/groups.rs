use std::collections::BTreeSet;

use cohort_config::GroupEventPolicy;
use cohort_graph::TemporalGraph;
use tracing::info;

use crate::matcher::{Team, TeamMatch};
use crate::record::{GroupDissolutionChange, GroupMergeChange, GroupPartitionChange};

/// A team reduced to a single original member, or gone entirely without a
/// clean merge: the group dissolved and its former members scattered.
pub fn detect_dissolutions(
    temporal: &TemporalGraph,
    matches: &[Vec<TeamMatch>],
) -> Vec<GroupDissolutionChange> {
    info!("detecting group dissolution changes");
    let mut changes = Vec::new();

    for (transition, (_, current)) in temporal.transitions().enumerate() {
        let transition_matches = &matches[transition];
        for team_match in transition_matches {
            let Some(old_team) = &team_match.previous else {
                continue;
            };
            if old_team.len() <= 1 {
                continue;
            }

            let dissolved = match &team_match.current {
                // only one original member is left in the matched remnant
                Some(new_team) => old_team.intersection(new_team).count() == 1,
                // the whole team vanished; a full absorption is a merge,
                // everything else is dissolution
                None => absorbing_match(old_team, transition_matches).is_none(),
            };

            if dissolved {
                changes.push(GroupDissolutionChange {
                    timestamp: current.timestamp(),
                    original: old_team.clone(),
                    destinations: destination_teams(old_team, transition_matches),
                });
            }
        }
    }

    changes
}

/// A team absorbed in its entirety by another team. The strict policy also
/// requires the absorbing team itself to be fully present in the result;
/// the lenient policy classifies the merge regardless of strays the
/// absorbing team picked up or lost.
pub fn detect_merges(
    temporal: &TemporalGraph,
    matches: &[Vec<TeamMatch>],
    policy: GroupEventPolicy,
) -> Vec<GroupMergeChange> {
    info!("detecting group merge changes");
    let mut changes = Vec::new();

    for (transition, (_, current)) in temporal.transitions().enumerate() {
        let transition_matches = &matches[transition];
        for team_match in transition_matches {
            let Some(old_team) = &team_match.previous else {
                continue;
            };
            if team_match.current.is_some() || old_team.len() <= 1 {
                continue;
            }

            let Some(host) = absorbing_match(old_team, transition_matches) else {
                continue;
            };
            let (Some(host_previous), Some(host_current)) = (&host.previous, &host.current) else {
                continue;
            };

            let clean = host_previous.is_subset(host_current);
            if clean || policy == GroupEventPolicy::Lenient {
                changes.push(GroupMergeChange {
                    timestamp: current.timestamp(),
                    original: old_team.clone(),
                    merged_with: host_previous.clone(),
                    resulting: host_current.clone(),
                });
            }
        }
    }

    changes
}

/// A team splitting into multiple teams: a freshly appeared multi-member
/// team that is a strict subset of some vanished original team whose other
/// members are fully covered by current teams. The lenient policy also
/// accepts splits whose remainder cannot be covered cleanly. One record is
/// emitted per (transition, original team).
pub fn detect_partitions(
    temporal: &TemporalGraph,
    matches: &[Vec<TeamMatch>],
    policy: GroupEventPolicy,
) -> Vec<GroupPartitionChange> {
    info!("detecting group partition changes");
    let mut changes = Vec::new();

    for (transition, (_, current)) in temporal.transitions().enumerate() {
        let transition_matches = &matches[transition];
        let mut recorded = BTreeSet::<Team>::new();

        for team_match in transition_matches {
            let Some(new_team) = &team_match.current else {
                continue;
            };
            if team_match.previous.is_some() || new_team.len() <= 1 {
                continue;
            }

            let original = transition_matches.iter().find_map(|candidate| {
                candidate
                    .previous
                    .as_ref()
                    .filter(|team| new_team.is_subset(team))
            });
            let Some(original) = original else {
                continue;
            };
            if recorded.contains(original) {
                continue;
            }

            if let Some(parts) = split_parts(original, new_team, transition_matches, policy) {
                recorded.insert(original.clone());
                changes.push(GroupPartitionChange {
                    timestamp: current.timestamp(),
                    original: original.clone(),
                    parts,
                });
            }
        }
    }

    changes
}

/// The first match whose current team contains the whole of `team`.
fn absorbing_match<'a>(team: &Team, matches: &'a [TeamMatch]) -> Option<&'a TeamMatch> {
    matches.iter().find(|candidate| {
        candidate
            .current
            .as_ref()
            .is_some_and(|current| team.is_subset(current))
    })
}

/// Current teams in which the members of `team` now reside, first-member
/// order, without duplicates.
fn destination_teams(team: &Team, matches: &[TeamMatch]) -> Vec<Team> {
    let mut destinations: Vec<Team> = Vec::new();
    for &member in team {
        let current = matches
            .iter()
            .find(|candidate| candidate.current_contains(member))
            .and_then(|candidate| candidate.current.clone());
        if let Some(current) = current
            && !destinations.contains(&current)
        {
            destinations.push(current);
        }
    }
    destinations
}

/// Cover `original` by `first_part` plus other current teams. Returns the
/// parts when the cover is exact; under the lenient policy an uncoverable
/// remainder is dropped instead of disqualifying the split.
fn split_parts(
    original: &Team,
    first_part: &Team,
    matches: &[TeamMatch],
    policy: GroupEventPolicy,
) -> Option<Vec<Team>> {
    let mut parts = vec![first_part.clone()];
    let mut remaining: Team = original.difference(first_part).copied().collect();

    while !remaining.is_empty() {
        let part = matches.iter().find_map(|candidate| {
            candidate
                .current
                .as_ref()
                .filter(|team| team.is_subset(&remaining))
        });
        match part {
            Some(part) => {
                remaining = remaining.difference(part).copied().collect();
                parts.push(part.clone());
            }
            None if policy == GroupEventPolicy::Lenient => break,
            None => return None,
        }
    }

    Some(parts)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use cohort_core::{ResourceId, Timestamp};
    use cohort_graph::{GraphState, Partition};

    use super::*;
    use crate::matcher::match_transitions;

    fn ts(hour: u32) -> Timestamp {
        NaiveDate::from_ymd_opt(2022, 3, 1)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn team(members: &[ResourceId]) -> Team {
        members.iter().copied().collect()
    }

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

    fn mine(
        first: &[(ResourceId, u32)],
        second: &[(ResourceId, u32)],
    ) -> (TemporalGraph, Vec<Vec<TeamMatch>>) {
        let temporal = TemporalGraph::new(vec![snapshot(ts(9), first), snapshot(ts(12), second)]);
        let matches = match_transitions(&temporal).expect("matches");
        (temporal, matches)
    }

    /// Two bare snapshots providing only the transition timestamps, for
    /// tests that construct their match list by hand.
    fn frame() -> TemporalGraph {
        TemporalGraph::new(vec![snapshot(ts(9), &[]), snapshot(ts(12), &[])])
    }

    fn pair(previous: Option<&[ResourceId]>, current: Option<&[ResourceId]>) -> TeamMatch {
        TeamMatch {
            previous: previous.map(team),
            current: current.map(team),
        }
    }

    #[test]
    fn scattered_team_with_one_survivor_dissolves() {
        // {1,2,3} falls apart: only 1 is left, 2 and 3 defect elsewhere
        let temporal = frame();
        let matches = vec![vec![
            pair(Some(&[1, 2, 3]), Some(&[1])),
            pair(Some(&[4, 5]), Some(&[2, 4, 5])),
            pair(Some(&[6, 7]), Some(&[3, 6, 7])),
        ]];

        let changes = detect_dissolutions(&temporal, &matches);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].timestamp, ts(12));
        assert_eq!(changes[0].original, team(&[1, 2, 3]));
        assert_eq!(
            changes[0].destinations,
            vec![team(&[1]), team(&[2, 4, 5]), team(&[3, 6, 7])]
        );
    }

    #[test]
    fn vanished_team_scattered_over_several_teams_dissolves() {
        let temporal = frame();
        let matches = vec![vec![
            pair(Some(&[1, 2]), None),
            pair(Some(&[4, 5]), Some(&[1, 4, 5])),
            pair(Some(&[6, 7]), Some(&[2, 6, 7])),
        ]];

        let changes = detect_dissolutions(&temporal, &matches);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].original, team(&[1, 2]));
        assert_eq!(
            changes[0].destinations,
            vec![team(&[1, 4, 5]), team(&[2, 6, 7])]
        );
    }

    #[test]
    fn full_absorption_fires_merge_and_not_dissolution() {
        // {1,2,3} is fully contained in {1,2,3,4}, whose own previous team
        // {4} is absorbed too
        let temporal = frame();
        let matches = vec![vec![
            pair(Some(&[1, 2, 3]), None),
            pair(Some(&[4]), Some(&[1, 2, 3, 4])),
        ]];

        assert!(detect_dissolutions(&temporal, &matches).is_empty());
        let merges = detect_merges(&temporal, &matches, GroupEventPolicy::Strict);
        assert_eq!(merges.len(), 1);
        assert_eq!(merges[0].original, team(&[1, 2, 3]));
        assert_eq!(merges[0].merged_with, team(&[4]));
        assert_eq!(merges[0].resulting, team(&[1, 2, 3, 4]));
    }

    #[test]
    fn merge_with_a_leaking_host_needs_the_lenient_policy() {
        // {1,2} is fully absorbed, but the host {4,5,6} loses 6 on the way
        let temporal = frame();
        let matches = vec![vec![
            pair(Some(&[1, 2]), None),
            pair(Some(&[4, 5, 6]), Some(&[1, 2, 4, 5])),
            pair(None, Some(&[6])),
        ]];

        assert!(detect_merges(&temporal, &matches, GroupEventPolicy::Strict).is_empty());
        let lenient = detect_merges(&temporal, &matches, GroupEventPolicy::Lenient);
        assert_eq!(lenient.len(), 1);
        assert_eq!(lenient[0].original, team(&[1, 2]));
        assert_eq!(lenient[0].merged_with, team(&[4, 5, 6]));
        assert_eq!(lenient[0].resulting, team(&[1, 2, 4, 5]));
    }

    #[test]
    fn clean_split_is_a_partition() {
        // {1,2,3,4} splits into {1,2} and {3,4}; the matcher keeps the
        // earliest equal-overlap remnant and leaves {3,4} unmatched
        let (temporal, matches) = mine(
            &[(1, 0), (2, 0), (3, 0), (4, 0)],
            &[(1, 0), (2, 0), (3, 1), (4, 1)],
        );

        let changes = detect_partitions(&temporal, &matches, GroupEventPolicy::Strict);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].original, team(&[1, 2, 3, 4]));
        assert_eq!(changes[0].parts, vec![team(&[3, 4]), team(&[1, 2])]);
    }

    #[test]
    fn three_way_split_emits_a_single_record() {
        let (temporal, matches) = mine(
            &[(1, 0), (2, 0), (3, 0), (4, 0), (5, 0), (6, 0)],
            &[(1, 0), (2, 0), (3, 1), (4, 1), (5, 2), (6, 2)],
        );

        let changes = detect_partitions(&temporal, &matches, GroupEventPolicy::Strict);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].original, team(&[1, 2, 3, 4, 5, 6]));
        assert_eq!(changes[0].parts.len(), 3);
    }

    #[test]
    fn mixed_split_is_dropped_unless_lenient() {
        // {1,2,3,4,5} sheds {3,4} cleanly, but 5 teams up with outsider 9,
        // so the remainder is not coverable by current teams
        let (temporal, matches) = mine(
            &[(1, 0), (2, 0), (3, 0), (4, 0), (5, 0), (9, 1)],
            &[(1, 0), (2, 0), (3, 1), (4, 1), (5, 2), (9, 2)],
        );

        assert!(detect_partitions(&temporal, &matches, GroupEventPolicy::Strict).is_empty());
        let lenient = detect_partitions(&temporal, &matches, GroupEventPolicy::Lenient);
        assert_eq!(lenient.len(), 1);
        assert_eq!(lenient[0].original, team(&[1, 2, 3, 4, 5]));
        assert_eq!(lenient[0].parts, vec![team(&[3, 4]), team(&[1, 2])]);
    }
}
