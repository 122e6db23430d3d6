//! Target selection and record field edits for maintenance commands
//!
//! Maintenance operations run over existing entry directories under the
//! library root: either an explicit name list, everything, or everything
//! except the named entries.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::record::{self, RECORD_FILENAME};

/// One top-level edit applied to an entry's record file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldEdit {
    Add { key: String, value: String },
    Delete { key: String },
}

/// Resolves the entry directories a maintenance command should touch.
///
/// Empty `names` selects every entry (`--exclude` alone is a no-op and
/// warns). Named entries that do not exist are warned about and dropped.
/// A missing library root is an error: maintenance never creates it.
pub fn select_targets(base: &Path, names: &[String], exclude: bool) -> Result<Vec<PathBuf>> {
    if !base.is_dir() {
        bail!("library directory not found: {}", base.display());
    }

    let mut all_dirs = Vec::new();
    for entry in fs::read_dir(base).with_context(|| format!("Failed to list {}", base.display()))? {
        let entry = entry.with_context(|| format!("Failed to list {}", base.display()))?;
        if entry.path().is_dir() {
            all_dirs.push(entry.path());
        }
    }
    all_dirs.sort();

    if names.is_empty() {
        if exclude {
            warn!("--exclude without names has no effect, selecting every entry");
        } else {
            info!(count = all_dirs.len(), "No entries named, selecting every entry");
        }
        return Ok(all_dirs);
    }

    let wanted: HashSet<&str> = names.iter().map(String::as_str).collect();

    if exclude {
        info!(excluded = ?names, "Excluding named entries");
        return Ok(all_dirs
            .into_iter()
            .filter(|dir| !dir_name_matches(dir, &wanted))
            .collect());
    }

    let targets: Vec<PathBuf> = all_dirs
        .iter()
        .filter(|dir| dir_name_matches(dir, &wanted))
        .cloned()
        .collect();

    for name in names {
        if !targets
            .iter()
            .any(|dir| dir.file_name().is_some_and(|n| n.to_string_lossy() == *name))
        {
            warn!(name = %name, "Named entry directory not found");
        }
    }

    info!(count = targets.len(), "Selected named entries");
    Ok(targets)
}

fn dir_name_matches(dir: &Path, wanted: &HashSet<&str>) -> bool {
    dir.file_name()
        .map(|n| wanted.contains(n.to_string_lossy().as_ref()))
        .unwrap_or(false)
}

/// Applies one field edit to the entry's record file.
///
/// Works on the raw JSON object so it never disturbs keys it does not
/// touch. Already-correct adds and deletes of absent keys are no-ops that
/// count as success.
pub fn edit_record_field(dir: &Path, edit: &FieldEdit) -> Result<()> {
    let path = dir.join(RECORD_FILENAME);
    if !path.is_file() {
        bail!("no {} in {}", RECORD_FILENAME, dir.display());
    }

    let text = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let mut data: Map<String, Value> = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    let entry = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let changed = match edit {
        FieldEdit::Add { key, value } => {
            let new_value = Value::String(value.clone());
            if data.get(key) == Some(&new_value) {
                debug!(entry = %entry, key = %key, "Field already has that value");
                false
            } else {
                info!(entry = %entry, key = %key, value = %value, "Setting field");
                data.insert(key.clone(), new_value);
                true
            }
        }
        FieldEdit::Delete { key } => {
            if data.remove(key).is_some() {
                info!(entry = %entry, key = %key, "Deleting field");
                true
            } else {
                debug!(entry = %entry, key = %key, "Field not present, nothing to delete");
                false
            }
        }
    };

    if changed {
        record::persist_json(&path, &data)?;
        info!(entry = %entry, "Record updated");
    }
    Ok(())
}
