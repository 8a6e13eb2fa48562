use std::collections::{BTreeMap, BTreeSet};

use cohort_core::ResourceId;
use cohort_graph::{Partition, TemporalGraph};

use crate::ChangeError;

pub type Team = BTreeSet<ResourceId>;

/// One pairing between a team of the previous snapshot and its best-overlap
/// counterpart in the current snapshot. `None` on either side means the
/// team purely appeared or purely disappeared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamMatch {
    pub previous: Option<Team>,
    pub current: Option<Team>,
}

impl TeamMatch {
    pub fn previous_contains(&self, resource: ResourceId) -> bool {
        self.previous
            .as_ref()
            .is_some_and(|team| team.contains(&resource))
    }

    pub fn current_contains(&self, resource: ResourceId) -> bool {
        self.current
            .as_ref()
            .is_some_and(|team| team.contains(&resource))
    }
}

/// Transform a node→community partition into disjoint teams, ordered by
/// each team's smallest member id. The canonical order makes every
/// downstream "first found" scan deterministic.
pub fn teams_of(partition: &Partition) -> Vec<Team> {
    let mut by_community = BTreeMap::<_, Team>::new();
    for (&node, &community) in partition {
        by_community.entry(community).or_default().insert(node);
    }

    let mut teams: Vec<Team> = by_community.into_values().collect();
    teams.sort_by_key(|team| team.first().copied());
    teams
}

/// Pair the teams of two consecutive snapshots by maximum node overlap.
/// When several previous teams claim the same current team, the one with
/// the largest intersection keeps it and the matching is recomputed for the
/// rest; equal overlaps resolve to the candidate with the lowest minimum
/// member id. Teams without any counterpart pair with `None`.
pub fn match_teams(previous: &[Team], current: &[Team]) -> Vec<TeamMatch> {
    let mut open_previous: Vec<Team> = previous.to_vec();
    let mut open_current: Vec<Team> = current.to_vec();
    let mut matches = Vec::new();

    loop {
        let picks: Vec<Option<usize>> = open_previous
            .iter()
            .map(|team| best_overlap(team, &open_current))
            .collect();

        let Some(contested) = first_contested(&picks, open_current.len()) else {
            break;
        };

        // the claimant with the most members in common wins the contested
        // team; the losers return to the pool and pick again next round
        let mut winner = None;
        let mut winner_overlap = 0;
        for (index, pick) in picks.iter().enumerate() {
            if *pick != Some(contested) {
                continue;
            }
            let count = overlap(&open_previous[index], &open_current[contested]);
            if winner.is_none() || count > winner_overlap {
                winner = Some(index);
                winner_overlap = count;
            }
        }
        let Some(winner) = winner else {
            break;
        };

        matches.push(TeamMatch {
            previous: Some(open_previous.remove(winner)),
            current: Some(open_current.remove(contested)),
        });
    }

    // no contested picks remain; fix the rest of the pairings
    let picks: Vec<Option<usize>> = open_previous
        .iter()
        .map(|team| best_overlap(team, &open_current))
        .collect();
    let mut claimed = vec![false; open_current.len()];
    for (index, pick) in picks.iter().enumerate() {
        match pick {
            Some(current_index) => {
                claimed[*current_index] = true;
                matches.push(TeamMatch {
                    previous: Some(open_previous[index].clone()),
                    current: Some(open_current[*current_index].clone()),
                });
            }
            None => matches.push(TeamMatch {
                previous: Some(open_previous[index].clone()),
                current: None,
            }),
        }
    }
    for (index, team) in open_current.into_iter().enumerate() {
        if !claimed[index] {
            matches.push(TeamMatch {
                previous: None,
                current: Some(team),
            });
        }
    }

    matches
}

/// Team matches for every consecutive snapshot pair of the sequence.
pub fn match_transitions(temporal: &TemporalGraph) -> Result<Vec<Vec<TeamMatch>>, ChangeError> {
    let mut transitions = Vec::new();
    for (previous, current) in temporal.transitions() {
        let previous_teams = teams_of(previous.teams().ok_or(ChangeError::MissingTeams {
            timestamp: previous.timestamp(),
        })?);
        let current_teams = teams_of(current.teams().ok_or(ChangeError::MissingTeams {
            timestamp: current.timestamp(),
        })?);
        transitions.push(match_teams(&previous_teams, &current_teams));
    }
    Ok(transitions)
}

fn overlap(left: &Team, right: &Team) -> usize {
    left.intersection(right).count()
}

/// Index of the candidate with the largest non-zero overlap; candidates are
/// scanned in canonical order, so equal overlaps keep the earliest.
fn best_overlap(team: &Team, candidates: &[Team]) -> Option<usize> {
    let mut best: Option<(usize, usize)> = None;
    for (index, candidate) in candidates.iter().enumerate() {
        let count = overlap(team, candidate);
        if count > 0 && best.is_none_or(|(_, best_count)| count > best_count) {
            best = Some((index, count));
        }
    }
    best.map(|(index, _)| index)
}

fn first_contested(picks: &[Option<usize>], current_count: usize) -> Option<usize> {
    for current_index in 0..current_count {
        let claimants = picks
            .iter()
            .filter(|pick| **pick == Some(current_index))
            .count();
        if claimants > 1 {
            return Some(current_index);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn team(members: &[ResourceId]) -> Team {
        members.iter().copied().collect()
    }

    fn find<'a>(matches: &'a [TeamMatch], previous: &Team) -> &'a TeamMatch {
        matches
            .iter()
            .find(|candidate| candidate.previous.as_ref() == Some(previous))
            .expect("previous team must appear exactly once")
    }

    #[test]
    fn teams_are_grouped_and_canonically_ordered() {
        let partition = Partition::from([(5, 1), (1, 0), (2, 0), (9, 2), (3, 1)]);
        let teams = teams_of(&partition);
        assert_eq!(teams, vec![team(&[1, 2]), team(&[3, 5]), team(&[9])]);
    }

    #[test]
    fn stable_teams_match_one_to_one() {
        let previous = vec![team(&[1, 2]), team(&[3, 4])];
        let current = vec![team(&[1, 2]), team(&[3, 4])];
        let matches = match_teams(&previous, &current);

        assert_eq!(matches.len(), 2);
        assert_eq!(find(&matches, &team(&[1, 2])).current, Some(team(&[1, 2])));
        assert_eq!(find(&matches, &team(&[3, 4])).current, Some(team(&[3, 4])));
    }

    #[test]
    fn contested_team_goes_to_the_largest_overlap() {
        // both previous teams overlap {1, 2, 3, 4}, but the first overlaps more
        let previous = vec![team(&[1, 2, 3]), team(&[4, 5])];
        let current = vec![team(&[1, 2, 3, 4]), team(&[5])];
        let matches = match_teams(&previous, &current);

        assert_eq!(
            find(&matches, &team(&[1, 2, 3])).current,
            Some(team(&[1, 2, 3, 4]))
        );
        // the loser is recomputed and falls back to its next-best match
        assert_eq!(find(&matches, &team(&[4, 5])).current, Some(team(&[5])));
    }

    #[test]
    fn unmatched_teams_pair_with_none() {
        let previous = vec![team(&[1, 2]), team(&[7])];
        let current = vec![team(&[1, 2]), team(&[9])];
        let matches = match_teams(&previous, &current);

        assert_eq!(find(&matches, &team(&[7])).current, None);
        let appeared = matches
            .iter()
            .find(|candidate| candidate.previous.is_none())
            .expect("appearing team");
        assert_eq!(appeared.current, Some(team(&[9])));
    }

    #[test]
    fn equal_overlap_resolves_to_the_lowest_minimum_id() {
        let previous = vec![team(&[1, 2])];
        // both current teams keep exactly one member of the previous team
        let current = vec![team(&[1, 8]), team(&[2, 9])];
        let matches = match_teams(&previous, &current);

        assert_eq!(find(&matches, &team(&[1, 2])).current, Some(team(&[1, 8])));
    }

    #[test]
    fn every_node_is_conserved_exactly_once() {
        let previous = vec![team(&[1, 2, 3]), team(&[4, 5]), team(&[6])];
        let current = vec![team(&[1, 2]), team(&[3, 4, 5]), team(&[7, 8])];
        let matches = match_teams(&previous, &current);

        let mut previous_members: Vec<ResourceId> = matches
            .iter()
            .filter_map(|candidate| candidate.previous.as_ref())
            .flatten()
            .copied()
            .collect();
        previous_members.sort();
        assert_eq!(previous_members, vec![1, 2, 3, 4, 5, 6]);

        let mut current_members: Vec<ResourceId> = matches
            .iter()
            .filter_map(|candidate| candidate.current.as_ref())
            .flatten()
            .copied()
            .collect();
        current_members.sort();
        assert_eq!(current_members, vec![1, 2, 3, 4, 5, 7, 8]);
    }
}
