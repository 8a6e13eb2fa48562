use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use cohort_core::{
    CollaborationEvent, CollaborationSession, ObjectId, ObjectRef, Resource, ResourceId,
    ResourcePair, Timestamp, WorkEvent, WorkSession, collapse_collaboration_sessions,
    collapse_work_sessions,
};
use thiserror::Error;
use tracing::warn;

const TIMESTAMP_FORMATS: [&str; 2] = ["%d/%m/%Y %H:%M:%S", "%d/%m/%Y, %H:%M:%S"];

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("{path}:{line}: expected {expected} ';'-separated fields, found {found}")]
    FieldCount {
        path: PathBuf,
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("{path}:{line}: invalid id '{value}'")]
    InvalidId {
        path: PathBuf,
        line: usize,
        value: String,
    },
    #[error("{path}:{line}: invalid timestamp '{value}'")]
    InvalidTimestamp {
        path: PathBuf,
        line: usize,
        value: String,
    },
    #[error("{path}:{line}: unknown resource id {id}")]
    UnknownResource {
        path: PathBuf,
        line: usize,
        id: ResourceId,
    },
    #[error("{path}:{line}: unknown object id {id}")]
    UnknownObject {
        path: PathBuf,
        line: usize,
        id: ObjectId,
    },
}

/// Everything the engine consumes, already collapsed into instantaneous
/// event lists.
#[derive(Debug, Clone, Default)]
pub struct IngestedData {
    pub resources: Vec<Resource>,
    pub objects: Vec<ObjectRef>,
    pub collaboration_events: Vec<CollaborationEvent>,
    pub work_events: Vec<WorkEvent>,
}

/// Parse the four activity logs. The work-session log is optional: without
/// it, first appearances fall back to collaboration events alone. Missing
/// or unreadable files degrade to empty lists with a warning; malformed
/// rows inside a readable file are hard errors.
pub fn load_all(
    resources_path: &Path,
    objects_path: &Path,
    collaboration_sessions_path: &Path,
    work_sessions_path: Option<&Path>,
) -> Result<IngestedData, IngestError> {
    let resources = parse_resources(resources_path)?;
    let objects = parse_objects(objects_path)?;
    let collaboration_sessions =
        parse_collaboration_sessions(collaboration_sessions_path, &resources, &objects)?;
    let work_sessions = match work_sessions_path {
        Some(path) => parse_work_sessions(path, &resources)?,
        None => {
            warn!(
                "no work session log provided; resource recruitment will be inferred from each \
                 resource's first collaboration event"
            );
            Vec::new()
        }
    };

    Ok(IngestedData {
        resources,
        objects,
        collaboration_events: collapse_collaboration_sessions(&collaboration_sessions),
        work_events: collapse_work_sessions(&work_sessions),
    })
}

/// `id;label` rows.
pub fn parse_resources(path: &Path) -> Result<Vec<Resource>, IngestError> {
    let mut resources = Vec::new();
    for (line, row) in read_rows(path) {
        let fields = split_fields(path, line, &row, 2)?;
        resources.push(Resource {
            id: parse_id(path, line, fields[0])?,
            label: fields[1].to_owned(),
        });
    }
    Ok(resources)
}

/// `id;label` rows.
pub fn parse_objects(path: &Path) -> Result<Vec<ObjectRef>, IngestError> {
    let mut objects = Vec::new();
    for (line, row) in read_rows(path) {
        let fields = split_fields(path, line, &row, 2)?;
        objects.push(ObjectRef {
            id: parse_id(path, line, fields[0])?,
            label: fields[1].to_owned(),
        });
    }
    Ok(objects)
}

/// `resource_id;label;resource_id;label;object_id;label;first;last;median`
/// rows. Both resources and the object must exist in their rosters.
pub fn parse_collaboration_sessions(
    path: &Path,
    resources: &[Resource],
    objects: &[ObjectRef],
) -> Result<Vec<CollaborationSession>, IngestError> {
    let resource_ids: BTreeSet<ResourceId> = resources.iter().map(|r| r.id).collect();
    let object_ids: BTreeSet<ObjectId> = objects.iter().map(|o| o.id).collect();

    let mut sessions = Vec::new();
    for (line, row) in read_rows(path) {
        let fields = split_fields(path, line, &row, 9)?;
        let first_resource = parse_id(path, line, fields[0])?;
        let second_resource = parse_id(path, line, fields[2])?;
        let object = parse_id(path, line, fields[4])?;

        for id in [first_resource, second_resource] {
            if !resource_ids.contains(&id) {
                return Err(IngestError::UnknownResource {
                    path: path.to_path_buf(),
                    line,
                    id,
                });
            }
        }
        if !object_ids.contains(&object) {
            return Err(IngestError::UnknownObject {
                path: path.to_path_buf(),
                line,
                id: object,
            });
        }

        sessions.push(CollaborationSession {
            pair: ResourcePair::new(first_resource, second_resource),
            object,
            first: parse_timestamp(path, line, fields[6])?,
            last: parse_timestamp(path, line, fields[7])?,
            median: parse_timestamp(path, line, fields[8])?,
        });
    }
    Ok(sessions)
}

/// `resource_id;label;first;last;median` rows.
pub fn parse_work_sessions(
    path: &Path,
    resources: &[Resource],
) -> Result<Vec<WorkSession>, IngestError> {
    let resource_ids: BTreeSet<ResourceId> = resources.iter().map(|r| r.id).collect();

    let mut sessions = Vec::new();
    for (line, row) in read_rows(path) {
        let fields = split_fields(path, line, &row, 5)?;
        let resource = parse_id(path, line, fields[0])?;
        if !resource_ids.contains(&resource) {
            return Err(IngestError::UnknownResource {
                path: path.to_path_buf(),
                line,
                id: resource,
            });
        }

        sessions.push(WorkSession {
            resource,
            first: parse_timestamp(path, line, fields[2])?,
            last: parse_timestamp(path, line, fields[3])?,
            median: parse_timestamp(path, line, fields[4])?,
        });
    }
    Ok(sessions)
}

/// Data rows of a `;`-delimited log with its header skipped, paired with
/// 1-based line numbers. An unreadable file degrades to no rows.
fn read_rows(path: &Path) -> Vec<(usize, String)> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(error) => {
            warn!(
                path = %path.display(),
                %error,
                "activity log is missing or unreadable; continuing with an empty list"
            );
            return Vec::new();
        }
    };

    content
        .lines()
        .enumerate()
        .skip(1)
        .filter(|(_, row)| !row.trim().is_empty())
        .map(|(index, row)| (index + 1, row.to_owned()))
        .collect()
}

fn split_fields<'a>(
    path: &Path,
    line: usize,
    row: &'a str,
    expected: usize,
) -> Result<Vec<&'a str>, IngestError> {
    let fields: Vec<&str> = row.split(';').map(str::trim).collect();
    if fields.len() != expected {
        return Err(IngestError::FieldCount {
            path: path.to_path_buf(),
            line,
            expected,
            found: fields.len(),
        });
    }
    Ok(fields)
}

fn parse_id(path: &Path, line: usize, value: &str) -> Result<u64, IngestError> {
    value.parse().map_err(|_| IngestError::InvalidId {
        path: path.to_path_buf(),
        line,
        value: value.to_owned(),
    })
}

fn parse_timestamp(path: &Path, line: usize, value: &str) -> Result<Timestamp, IngestError> {
    for format in TIMESTAMP_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(parsed);
        }
    }
    Err(IngestError::InvalidTimestamp {
        path: path.to_path_buf(),
        line,
        value: value.to_owned(),
    })
}
