use chrono::Duration;
use cohort_core::ResourceId;
use tracing::info;

use crate::matcher::{Team, TeamMatch};
use crate::record::{ExpansionChange, ExpulsionChange, ReassignmentChange, TimeSpan};
use crate::ChangeError;

/// Correlate every expulsion with the first expansion of the same resource
/// inside the window. On the same transition this is an instantaneous
/// reassignment; across transitions the resource must trace an unbroken
/// solo chain between its departure and its new team.
pub fn detect_reassignments(
    matches: &[Vec<TeamMatch>],
    expansions: &[ExpansionChange],
    expulsions: &[ExpulsionChange],
    window: Duration,
) -> Result<Vec<ReassignmentChange>, ChangeError> {
    info!("detecting reassignment changes");
    let mut changes = Vec::new();

    for expulsion in expulsions {
        let Some(expansion) = first_expansion_within(expansions, expulsion, window) else {
            continue;
        };

        if expulsion.transition == expansion.transition {
            if let Some(change) = instantaneous(&matches[expulsion.transition], expulsion)? {
                changes.push(change);
            }
        } else if let Some(change) = spanning(matches, expulsion, expansion) {
            changes.push(change);
        }
    }

    Ok(changes)
}

/// The first expansion of the expelled resource at or after the expulsion,
/// no later than the window allows. Expansions arrive in transition order,
/// so the first hit is the earliest.
fn first_expansion_within<'a>(
    expansions: &'a [ExpansionChange],
    expulsion: &ExpulsionChange,
    window: Duration,
) -> Option<&'a ExpansionChange> {
    let deadline = expulsion.timestamp + window;
    expansions.iter().find(|expansion| {
        expansion.resource == expulsion.resource
            && expansion.timestamp >= expulsion.timestamp
            && expansion.timestamp <= deadline
    })
}

/// Departure and joining on the same transition. The origin team must have
/// had more than one member, and a full merge of the origin into the
/// destination is a group merge rather than a reassignment.
fn instantaneous(
    transition_matches: &[TeamMatch],
    expulsion: &ExpulsionChange,
) -> Result<Option<ReassignmentChange>, ChangeError> {
    let resource = expulsion.resource;
    let timestamp = expulsion.timestamp;
    let unmatched = ChangeError::UnmatchedResource {
        resource,
        timestamp,
    };

    let (origin_previous, origin_current) = transition_matches
        .iter()
        .find_map(|candidate| {
            let previous = candidate
                .previous
                .as_ref()
                .filter(|team| team.contains(&resource))?;
            Some((previous, candidate.current.as_ref()))
        })
        .ok_or(unmatched)?;
    let unmatched = ChangeError::UnmatchedResource {
        resource,
        timestamp,
    };
    let (destination_current, destination_previous) = transition_matches
        .iter()
        .find_map(|candidate| {
            let current = candidate
                .current
                .as_ref()
                .filter(|team| team.contains(&resource))?;
            Some((current, candidate.previous.as_ref()))
        })
        .ok_or(unmatched)?;

    if origin_previous.len() <= 1 {
        return Ok(None);
    }
    if origin_current.is_none() && fully_moved_into(origin_previous, destination_current) {
        return Ok(None);
    }

    Ok(Some(ReassignmentChange {
        span: TimeSpan::At(timestamp),
        resource,
        reassigned_from: origin_previous.clone(),
        reassigned_to: destination_current.clone(),
        resulting_origin: origin_current.cloned(),
        original_destination: destination_previous.cloned(),
    }))
}

/// Departure and joining several transitions apart. The resource must
/// appear alone right after the expulsion (`None` → `{r}`), stay alone
/// through every intermediate transition (`{r}` → `{r}`), and finally fold
/// into a team different from its origin (`{r}` → `None`). Any break in
/// the chain disqualifies the candidate.
fn spanning(
    matches: &[Vec<TeamMatch>],
    expulsion: &ExpulsionChange,
    expansion: &ExpansionChange,
) -> Option<ReassignmentChange> {
    let resource = expulsion.resource;
    let solo: Team = Team::from([resource]);
    let mut origin_remnant = Some(expulsion.resulting.clone());

    for transition in expulsion.transition..=expansion.transition {
        let transition_matches = &matches[transition];

        if transition == expulsion.transition {
            let destination = transition_matches
                .iter()
                .find(|candidate| candidate.current_contains(resource))?;
            if destination.previous.is_some() || destination.current.as_ref() != Some(&solo) {
                return None;
            }
        } else if transition == expansion.transition {
            let departure = transition_matches
                .iter()
                .find(|candidate| candidate.previous_contains(resource))?;
            if departure.previous.as_ref() != Some(&solo) || departure.current.is_some() {
                return None;
            }
            // landing back in the origin team is not a reassignment
            if origin_remnant.as_ref() == Some(&expansion.added_to) {
                return None;
            }
            return Some(ReassignmentChange {
                span: TimeSpan::Between(expulsion.timestamp, expansion.timestamp),
                resource,
                reassigned_from: expulsion.removed_from.clone(),
                reassigned_to: expansion.resulting.clone(),
                resulting_origin: Some(expulsion.resulting.clone()),
                original_destination: Some(expansion.added_to.clone()),
            });
        } else {
            let stable = transition_matches.iter().any(|candidate| {
                candidate.previous.as_ref() == Some(&solo)
                    && candidate.current.as_ref() == Some(&solo)
            });
            if !stable {
                return None;
            }

            // follow what is left of the origin team; if it disappears the
            // episode is a dissolution, not a reassignment
            origin_remnant = transition_matches
                .iter()
                .find(|candidate| candidate.previous == origin_remnant)
                .and_then(|candidate| candidate.current.clone());
            origin_remnant.as_ref()?;
        }
    }

    None
}

fn fully_moved_into(origin: &Team, destination: &Team) -> bool {
    origin.difference(destination).next().is_none()
}
