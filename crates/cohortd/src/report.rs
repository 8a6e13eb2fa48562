use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use cohort_changes::{ChangeReport, MembershipChange, Team};
use cohort_core::ResourceId;

/// Console listing, one block per change type.
pub fn print_report(report: &ChangeReport, out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "Recruitment events:")?;
    for change in &report.recruitments {
        writeln!(out, "Resource {} at {}", change.resource, change.timestamp)?;
    }

    writeln!(out, "Expansion events:")?;
    for change in &report.expansions {
        writeln!(
            out,
            "At {} resource {} added to group {} resulting in group {}",
            change.timestamp,
            change.resource,
            team_display(&change.added_to),
            team_display(&change.resulting)
        )?;
    }

    writeln!(out, "Expulsion events:")?;
    for change in &report.expulsions {
        writeln!(
            out,
            "At {} resource {} removed from group {} resulting in group {}",
            change.timestamp,
            change.resource,
            team_display(&change.removed_from),
            team_display(&change.resulting)
        )?;
    }

    writeln!(out, "Group dissolution events:")?;
    for change in &report.dissolutions {
        writeln!(
            out,
            "At {} group {} dissolved, its members resulting in the following groups: {}",
            change.timestamp,
            team_display(&change.original),
            teams_display(&change.destinations)
        )?;
    }

    writeln!(out, "Group merge events:")?;
    for change in &report.merges {
        writeln!(
            out,
            "At {} group {} merged with {} resulting in group {}",
            change.timestamp,
            team_display(&change.original),
            team_display(&change.merged_with),
            team_display(&change.resulting)
        )?;
    }

    writeln!(out, "Group partition events:")?;
    for change in &report.partitions {
        writeln!(
            out,
            "At {} group {} parted into subgroups {}",
            change.timestamp,
            team_display(&change.original),
            teams_display(&change.parts)
        )?;
    }

    writeln!(out, "Reassignment events:")?;
    for change in &report.reassignments {
        writeln!(
            out,
            "At {} resource {} reassigned from group {} to group {} resulting in {}",
            change.span,
            change.resource,
            team_display(&change.reassigned_from),
            optional_team_display(change.original_destination.as_ref()),
            team_display(&change.reassigned_to)
        )?;
    }

    Ok(())
}

/// `Timestamp;Change type;Details` CSV.
pub fn write_csv(report: &ChangeReport, path: &Path) -> Result<()> {
    let mut content = String::from("Timestamp;Change type;Details\n");
    for change in report.all_changes() {
        content.push_str(&format!(
            "{};{};{}\n",
            change.span(),
            change.kind(),
            details(&change)
        ));
    }
    fs::write(path, content)
        .with_context(|| format!("failed to write change report to {}", path.display()))
}

/// `Timestamp;Change type;Resource ID;Details` CSV, one row per involved
/// resource for group-level changes.
pub fn write_csv_by_resource(report: &ChangeReport, path: &Path) -> Result<()> {
    let mut content = String::from("Timestamp;Change type;Resource ID;Details\n");
    for change in report.all_changes() {
        for resource in involved_resources(&change) {
            content.push_str(&format!(
                "{};{};{};{}\n",
                change.span(),
                change.kind(),
                resource,
                details(&change)
            ));
        }
    }
    fs::write(path, content)
        .with_context(|| format!("failed to write change report to {}", path.display()))
}

/// The full report as JSON, for downstream tooling.
pub fn write_json(report: &ChangeReport, path: &Path) -> Result<()> {
    let content = serde_json::to_string_pretty(report)?;
    fs::write(path, content)
        .with_context(|| format!("failed to write JSON report to {}", path.display()))
}

fn details(change: &MembershipChange) -> String {
    match change {
        MembershipChange::Recruitment(change) => format!("Resource {}", change.resource),
        MembershipChange::Expansion(change) => format!(
            "resource {} added to group {} resulting in group {}",
            change.resource,
            team_display(&change.added_to),
            team_display(&change.resulting)
        ),
        MembershipChange::Expulsion(change) => format!(
            "resource {} removed from group {} resulting in group {}",
            change.resource,
            team_display(&change.removed_from),
            team_display(&change.resulting)
        ),
        MembershipChange::GroupDissolution(change) => format!(
            "group {} dissolved, its members resulting in the following groups: {}",
            team_display(&change.original),
            teams_display(&change.destinations)
        ),
        MembershipChange::GroupMerge(change) => format!(
            "group {} merged with {} resulting in group {}",
            team_display(&change.original),
            team_display(&change.merged_with),
            team_display(&change.resulting)
        ),
        MembershipChange::GroupPartition(change) => format!(
            "group {} parted into subgroups {}",
            team_display(&change.original),
            teams_display(&change.parts)
        ),
        MembershipChange::Reassignment(change) => format!(
            "resource {} reassigned from group {} to group {} resulting in {}",
            change.resource,
            team_display(&change.reassigned_from),
            optional_team_display(change.original_destination.as_ref()),
            team_display(&change.reassigned_to)
        ),
    }
}

fn involved_resources(change: &MembershipChange) -> Vec<ResourceId> {
    match change {
        MembershipChange::Recruitment(change) => vec![change.resource],
        MembershipChange::Expansion(change) => vec![change.resource],
        MembershipChange::Expulsion(change) => vec![change.resource],
        MembershipChange::GroupDissolution(change) => change.original.iter().copied().collect(),
        MembershipChange::GroupMerge(change) => change
            .original
            .iter()
            .chain(change.merged_with.iter())
            .copied()
            .collect(),
        MembershipChange::GroupPartition(change) => change.original.iter().copied().collect(),
        MembershipChange::Reassignment(change) => vec![change.resource],
    }
}

fn team_display(team: &Team) -> String {
    let members: Vec<String> = team.iter().map(ToString::to_string).collect();
    format!("{{{}}}", members.join(", "))
}

fn optional_team_display(team: Option<&Team>) -> String {
    match team {
        Some(team) => team_display(team),
        None => "{}".to_owned(),
    }
}

fn teams_display(teams: &[Team]) -> String {
    let rendered: Vec<String> = teams.iter().map(team_display).collect();
    format!("[{}]", rendered.join(", "))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use cohort_changes::{GroupMergeChange, RecruitmentChange};
    use cohort_core::Timestamp;

    use super::*;

    fn ts() -> Timestamp {
        NaiveDate::from_ymd_opt(2022, 3, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn sample_report() -> ChangeReport {
        ChangeReport {
            recruitments: vec![RecruitmentChange {
                timestamp: ts(),
                resource: 3,
            }],
            merges: vec![GroupMergeChange {
                timestamp: ts(),
                original: Team::from([1, 2]),
                merged_with: Team::from([4]),
                resulting: Team::from([1, 2, 4]),
            }],
            ..ChangeReport::default()
        }
    }

    #[test]
    fn csv_rows_carry_type_and_details() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("changes.csv");
        write_csv(&sample_report(), &path).expect("write");

        let content = std::fs::read_to_string(&path).expect("read");
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "Timestamp;Change type;Details");
        assert_eq!(lines[1], "2022-03-01 09:00:00;Recruitment;Resource 3");
        assert!(lines[2].contains("Group Merge"));
        assert!(lines[2].contains("group {1, 2} merged with {4} resulting in group {1, 2, 4}"));
    }

    #[test]
    fn per_resource_csv_expands_group_changes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("changes_by_id.csv");
        write_csv_by_resource(&sample_report(), &path).expect("write");

        let content = std::fs::read_to_string(&path).expect("read");
        // one recruitment row plus one merge row for each of 1, 2, and 4
        assert_eq!(content.lines().count(), 5);
        assert!(content.contains(";Group Merge;4;"));
    }

    #[test]
    fn console_report_lists_every_section() {
        let mut out = Vec::new();
        print_report(&sample_report(), &mut out).expect("print");
        let text = String::from_utf8(out).expect("utf8");
        assert!(text.contains("Recruitment events:"));
        assert!(text.contains("Reassignment events:"));
        assert!(text.contains("Resource 3 at 2022-03-01 09:00:00"));
    }
}
