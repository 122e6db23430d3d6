//! Per-entry metadata record (`init.json`) and the non-destructive merge
//!
//! One record file lives in each entry directory. Syncs overwrite the
//! provider-owned fields and leave everything the user owns (`favorite`,
//! `lines`, watch position, unknown extra keys) untouched. The file is
//! assumed to have a single writer; concurrent invocations against the same
//! directory are unsupported.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

/// Name of the record file inside each entry directory.
pub const RECORD_FILENAME: &str = "init.json";

/// What a library entry is: a TV series or a film.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Tv,
    Movie,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Tv => "tv",
            MediaKind::Movie => "movie",
        }
    }
}

/// Watch progress, present only on TV entries. `total` is provider-owned
/// and refreshed on every sync; `current` belongs to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    #[serde(default)]
    pub current: u64,
    #[serde(default)]
    pub total: u64,
}

/// The persisted record. Unknown top-level keys land in `extra` and are
/// re-emitted verbatim, so manual additions to the file survive syncs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRecord {
    pub name: String,
    pub tmdb_id: u64,
    pub media_type: MediaKind,
    #[serde(default)]
    pub overview: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
    #[serde(default)]
    pub favorite: bool,
    #[serde(default)]
    pub lines: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Merges freshly fetched provider data into the record at `dir`.
///
/// Creates a fresh record when none exists or the existing file is not
/// syntactically a JSON object (logged and overwritten). Otherwise the merge
/// works key-by-key on the raw object: provider-owned fields are replaced
/// unconditionally, `favorite`, `lines`, unknown keys and `progress.current`
/// are carried through, and a type-malformed `progress` is reset on its own
/// without touching anything else. Switching kind away from TV drops
/// `progress`. Idempotent: repeating the call with identical inputs rewrites
/// identical bytes.
pub fn merge_record(
    dir: &Path,
    name: &str,
    tmdb_id: u64,
    kind: MediaKind,
    overview: &str,
    total_episodes: Option<u32>,
) -> Result<()> {
    let path = dir.join(RECORD_FILENAME);

    match read_record(&path) {
        Some(mut data) => {
            debug!(path = %path.display(), "Updating existing record");
            data.insert("name".to_string(), Value::String(name.to_string()));
            data.insert("tmdb_id".to_string(), Value::from(tmdb_id));
            data.insert(
                "media_type".to_string(),
                Value::String(kind.as_str().to_string()),
            );
            data.insert("overview".to_string(), Value::String(overview.to_string()));

            match kind {
                MediaKind::Tv => {
                    let prior = prior_progress(&path, &data);
                    let progress = Progress {
                        current: prior.as_ref().map(|p| p.current).unwrap_or(0),
                        total: total_episodes
                            .map(u64::from)
                            .or_else(|| prior.as_ref().map(|p| p.total))
                            .unwrap_or(0),
                    };
                    data.insert(
                        "progress".to_string(),
                        serde_json::to_value(progress).context("Failed to serialize progress")?,
                    );
                }
                MediaKind::Movie => {
                    if data.remove("progress").is_some() {
                        info!(path = %path.display(), "Entry is no longer a series, dropping progress");
                    }
                }
            }

            data.entry("favorite").or_insert(Value::Bool(false));
            data.entry("lines").or_insert(Value::Array(Vec::new()));

            persist_json(&path, &data)?;
        }
        None => {
            let record = MediaRecord {
                name: name.to_string(),
                tmdb_id,
                media_type: kind,
                overview: overview.to_string(),
                progress: match kind {
                    MediaKind::Tv => Some(Progress {
                        current: 0,
                        total: total_episodes.map(u64::from).unwrap_or(0),
                    }),
                    MediaKind::Movie => None,
                },
                favorite: false,
                lines: Vec::new(),
                extra: Map::new(),
            };
            persist_json(&path, &record)?;
        }
    }

    info!(name = %name, tmdb_id, kind = kind.as_str(), "Record written");
    Ok(())
}

/// Reads the record as a raw JSON object. Only syntax-level faults (and a
/// non-object top level) degrade to `None`; malformed individual fields are
/// the merge's problem, not grounds for a rebuild.
fn read_record(path: &Path) -> Option<Map<String, Value>> {
    if !path.is_file() {
        return None;
    }
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Could not read existing record, rebuilding");
            return None;
        }
    };
    match serde_json::from_str(&text) {
        Ok(Value::Object(map)) => Some(map),
        Ok(_) => {
            warn!(path = %path.display(), "Existing record is not a JSON object, rebuilding");
            None
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Existing record does not parse, rebuilding");
            None
        }
    }
}

/// Extracts the prior watch progress, resetting it when the value does not
/// have the expected shape.
fn prior_progress(path: &Path, data: &Map<String, Value>) -> Option<Progress> {
    let value = data.get("progress")?;
    match serde_json::from_value(value.clone()) {
        Ok(progress) => Some(progress),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Malformed progress field, resetting it");
            None
        }
    }
}

/// Reads the display name from the record, tolerating records that do not
/// parse into [`MediaRecord`] (only the `name` key is consulted).
pub fn display_name(dir: &Path) -> Option<String> {
    let path = dir.join(RECORD_FILENAME);
    let text = fs::read_to_string(&path).ok()?;
    let value: Value = match serde_json::from_str(&text) {
        Ok(value) => value,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Record does not parse, falling back to directory name");
            return None;
        }
    };
    value
        .get("name")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Writes pretty JSON through a temp file in the same directory, so an I/O
/// fault leaves whatever was there before untouched.
pub fn persist_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize record")?;
    let tmp = path.with_extension("json.tmp");
    if let Err(e) = fs::write(&tmp, json.as_bytes()) {
        let _ = fs::remove_file(&tmp);
        return Err(e).with_context(|| format!("Failed to write {}", tmp.display()));
    }
    fs::rename(&tmp, path).with_context(|| format!("Failed to move record into place at {}", path.display()))
}
