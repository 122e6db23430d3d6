//! Per-candidate acquisition: details, directory, record merge, images
//!
//! A details fetch failure is terminal for its candidate; everything after
//! that degrades per item. Image downloads are independent: one failing
//! never aborts the rest of the entry. A series and a film whose titles
//! sanitize to the same segment share one directory, and the record then
//! reflects whichever synced last; that collision is accepted, not
//! resolved.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::Local;
use tracing::{info, warn};

use super::record;
use super::sanitize::sanitize_name;
use super::tmdb::{ImageRef, MetadataSource, SearchCandidate};

/// The designated primary image, excluded from normalization.
pub const COVER_FILENAME: &str = "cover.jpg";

/// Upper bound on supplementary images fetched per entry.
pub const MAX_BACKDROPS: usize = 5;

/// Acquires one selected candidate into the library.
pub fn acquire(
    source: &dyn MetadataSource,
    library_root: &Path,
    candidate: &SearchCandidate,
) -> Result<()> {
    if candidate.name.is_empty() {
        bail!(
            "candidate {} ({}) has no usable name",
            candidate.id,
            candidate.kind.as_str()
        );
    }

    info!(
        name = %candidate.name,
        kind = candidate.kind.as_str(),
        id = candidate.id,
        "Processing candidate"
    );

    let details = source
        .details(candidate.kind, candidate.id)
        .with_context(|| {
            format!(
                "Failed to fetch details for '{}' (id {})",
                candidate.name, candidate.id
            )
        })?;

    let safe_name = sanitize_name(&candidate.name);
    let entry_dir = library_root.join(&safe_name);
    fs::create_dir_all(&entry_dir)
        .with_context(|| format!("Failed to create entry directory {}", entry_dir.display()))?;

    record::merge_record(
        &entry_dir,
        &candidate.name,
        candidate.id,
        candidate.kind,
        details.overview.as_deref().unwrap_or(""),
        details.number_of_episodes,
    )?;

    match details.poster_path.as_deref() {
        Some(poster_path) => download_cover(source, &entry_dir, poster_path),
        None => warn!(name = %candidate.name, "No poster available, skipping cover"),
    }

    download_backdrops(source, &entry_dir, &safe_name, &details.images.backdrops);

    info!(name = %candidate.name, "Candidate processed");
    Ok(())
}

/// Cover failure is non-fatal: the entry still counts as processed.
fn download_cover(source: &dyn MetadataSource, entry_dir: &Path, poster_path: &str) {
    let target = entry_dir.join(COVER_FILENAME);
    match fetch_to_file(source, poster_path, &target) {
        Ok(()) => info!(path = %target.display(), "Cover downloaded"),
        Err(e) => warn!(error = %e, poster = poster_path, "Failed to download cover, keeping entry"),
    }
}

/// Downloads up to [`MAX_BACKDROPS`] supplementary images. The filename
/// index is the 1-based position in the provider's list, so a skipped
/// reference leaves a gap rather than shifting later names.
fn download_backdrops(
    source: &dyn MetadataSource,
    entry_dir: &Path,
    safe_name: &str,
    backdrops: &[ImageRef],
) {
    if backdrops.is_empty() {
        warn!(dir = %entry_dir.display(), "No backdrops available");
        return;
    }

    let mut downloaded = 0usize;
    for (position, backdrop) in backdrops.iter().enumerate() {
        if downloaded >= MAX_BACKDROPS {
            info!(limit = MAX_BACKDROPS, "Backdrop limit reached");
            break;
        }

        let Some(file_path) = backdrop.file_path.as_deref() else {
            warn!(position = position + 1, "Backdrop entry has no file path, skipping");
            continue;
        };

        let timestamp = Local::now().format("%Y%m%d%H%M%S%6f");
        let filename = format!("{safe_name}-{timestamp}-{}.jpg", position + 1);
        let target = entry_dir.join(&filename);

        match fetch_to_file(source, file_path, &target) {
            Ok(()) => {
                downloaded += 1;
                info!(file = %filename, "Backdrop downloaded");
            }
            Err(e) => warn!(error = %e, file = %filename, "Failed to download backdrop, continuing"),
        }
    }

    info!(count = downloaded, dir = %entry_dir.display(), "Backdrop downloads finished");
}

fn fetch_to_file(source: &dyn MetadataSource, file_path: &str, target: &Path) -> Result<()> {
    let bytes = source
        .image(file_path)
        .with_context(|| format!("Failed to download image {file_path}"))?;
    fs::write(target, &bytes).with_context(|| format!("Failed to write {}", target.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::record::{MediaKind, RECORD_FILENAME};
    use crate::services::tmdb::{ImageCollection, MediaDetails, TmdbError};
    use reqwest::StatusCode;
    use std::collections::HashSet;
    use tempfile::TempDir;

    struct FakeSource {
        details: MediaDetails,
        broken_images: HashSet<&'static str>,
        fail_details: bool,
    }

    impl FakeSource {
        fn with_backdrops(refs: Vec<Option<&str>>) -> Self {
            Self {
                details: MediaDetails {
                    overview: Some("about".to_string()),
                    poster_path: Some("/poster.jpg".to_string()),
                    number_of_episodes: Some(10),
                    images: ImageCollection {
                        backdrops: refs
                            .into_iter()
                            .map(|p| ImageRef {
                                file_path: p.map(str::to_string),
                            })
                            .collect(),
                    },
                },
                broken_images: HashSet::new(),
                fail_details: false,
            }
        }
    }

    impl MetadataSource for FakeSource {
        fn search(
            &self,
            _kind: MediaKind,
            _query: &str,
        ) -> Result<Vec<SearchCandidate>, TmdbError> {
            unimplemented!("not used by acquisition tests")
        }

        fn details(&self, _kind: MediaKind, _id: u64) -> Result<MediaDetails, TmdbError> {
            if self.fail_details {
                return Err(TmdbError::Status(StatusCode::SERVICE_UNAVAILABLE));
            }
            Ok(self.details.clone())
        }

        fn image(&self, file_path: &str) -> Result<Vec<u8>, TmdbError> {
            if self.broken_images.contains(file_path) {
                return Err(TmdbError::Status(StatusCode::NOT_FOUND));
            }
            Ok(format!("bytes:{file_path}").into_bytes())
        }
    }

    fn tv_candidate(name: &str) -> SearchCandidate {
        SearchCandidate {
            id: 42,
            kind: MediaKind::Tv,
            name: name.to_string(),
            original_name: name.to_string(),
            release_date: None,
            overview: String::new(),
        }
    }

    fn entry_files(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_acquire_creates_directory_record_and_images() {
        let library = TempDir::new().unwrap();
        let source = FakeSource::with_backdrops(vec![Some("/b1.jpg"), Some("/b2.jpg")]);

        acquire(&source, library.path(), &tv_candidate("Show X")).unwrap();

        let entry = library.path().join("Show X");
        assert!(entry.is_dir());
        assert!(entry.join(RECORD_FILENAME).is_file());
        assert!(entry.join(COVER_FILENAME).is_file());

        let backdrops: Vec<String> = entry_files(&entry)
            .into_iter()
            .filter(|n| n.starts_with("Show X-"))
            .collect();
        assert_eq!(backdrops.len(), 2);
        assert!(backdrops[0].ends_with("-1.jpg"));
        assert!(backdrops[1].ends_with("-2.jpg"));
    }

    #[test]
    fn test_at_most_five_backdrops_from_seven_references() {
        let library = TempDir::new().unwrap();
        let refs = vec![
            Some("/b1.jpg"),
            Some("/b2.jpg"),
            Some("/b3.jpg"),
            Some("/b4.jpg"),
            Some("/b5.jpg"),
            Some("/b6.jpg"),
            Some("/b7.jpg"),
        ];
        let source = FakeSource::with_backdrops(refs);

        acquire(&source, library.path(), &tv_candidate("Show")).unwrap();

        let entry = library.path().join("Show");
        let backdrops: Vec<String> = entry_files(&entry)
            .into_iter()
            .filter(|n| n.starts_with("Show-"))
            .collect();
        assert_eq!(backdrops.len(), MAX_BACKDROPS);
    }

    #[test]
    fn test_missing_file_path_skipped_without_failing() {
        let library = TempDir::new().unwrap();
        let source = FakeSource::with_backdrops(vec![Some("/b1.jpg"), None, Some("/b3.jpg")]);

        acquire(&source, library.path(), &tv_candidate("Show")).unwrap();

        let entry = library.path().join("Show");
        let backdrops: Vec<String> = entry_files(&entry)
            .into_iter()
            .filter(|n| n.starts_with("Show-"))
            .collect();
        // Positions 1 and 3 downloaded; position 2 left a gap.
        assert_eq!(backdrops.len(), 2);
        assert!(backdrops[0].ends_with("-1.jpg"));
        assert!(backdrops[1].ends_with("-3.jpg"));
    }

    #[test]
    fn test_single_image_failure_does_not_abort_entry() {
        let library = TempDir::new().unwrap();
        let mut source = FakeSource::with_backdrops(vec![Some("/b1.jpg"), Some("/b2.jpg")]);
        source.broken_images.insert("/b1.jpg");
        source.broken_images.insert("/poster.jpg");

        acquire(&source, library.path(), &tv_candidate("Show")).unwrap();

        let entry = library.path().join("Show");
        assert!(!entry.join(COVER_FILENAME).exists());
        assert!(entry.join(RECORD_FILENAME).is_file());
        let backdrops: Vec<String> = entry_files(&entry)
            .into_iter()
            .filter(|n| n.starts_with("Show-"))
            .collect();
        assert_eq!(backdrops.len(), 1);
        assert!(backdrops[0].ends_with("-2.jpg"));
    }

    #[test]
    fn test_details_failure_is_terminal_and_leaves_no_entry() {
        let library = TempDir::new().unwrap();
        let mut source = FakeSource::with_backdrops(vec![]);
        source.fail_details = true;

        let result = acquire(&source, library.path(), &tv_candidate("Show"));
        assert!(result.is_err());
        assert!(!library.path().join("Show").exists());
    }

    #[test]
    fn test_nameless_candidate_is_rejected() {
        let library = TempDir::new().unwrap();
        let source = FakeSource::with_backdrops(vec![]);
        assert!(acquire(&source, library.path(), &tv_candidate("")).is_err());
    }
}
