//! TMDB (The Movie Database) API client for series/film metadata and images
//!
//! Base URL: https://api.themoviedb.org/3. Requires an API key.
//! The client is blocking end to end; the tool processes one request at a
//! time by design.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use super::record::MediaKind;
use crate::config::Config;

/// Faults a provider call can surface. Callers log these and degrade to
/// absent data; they never abort the process.
#[derive(Debug, Error)]
pub enum TmdbError {
    #[error("request to TMDB failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("TMDB responded with status {0}")]
    Status(StatusCode),
    #[error("failed to decode TMDB response: {0}")]
    Decode(#[source] reqwest::Error),
}

/// One search result, tagged with the kind it was queried as. Ephemeral:
/// produced by a search, consumed by selection and acquisition.
#[derive(Debug, Clone)]
pub struct SearchCandidate {
    pub id: u64,
    pub kind: MediaKind,
    /// Display title; empty when the provider sends neither a localized
    /// nor an original title.
    pub name: String,
    pub original_name: String,
    pub release_date: Option<String>,
    pub overview: String,
}

/// Full details for one entry, with appended image references.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaDetails {
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    /// Series only; films never carry this.
    pub number_of_episodes: Option<u32>,
    #[serde(default)]
    pub images: ImageCollection,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageCollection {
    #[serde(default)]
    pub backdrops: Vec<ImageRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageRef {
    pub file_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(default)]
    results: Vec<RawSearchResult>,
}

/// Raw search result. TV sends `name`/`original_name`/`first_air_date`,
/// films send `title`/`original_title`/`release_date`; the aliases unify
/// both shapes.
#[derive(Debug, Deserialize)]
struct RawSearchResult {
    id: u64,
    #[serde(alias = "title")]
    name: Option<String>,
    #[serde(alias = "original_title")]
    original_name: Option<String>,
    #[serde(alias = "release_date")]
    first_air_date: Option<String>,
    overview: Option<String>,
}

impl RawSearchResult {
    fn into_candidate(self, kind: MediaKind) -> SearchCandidate {
        let original_name = self.original_name.unwrap_or_default();
        SearchCandidate {
            id: self.id,
            kind,
            name: self.name.unwrap_or_else(|| original_name.clone()),
            original_name,
            release_date: self.first_air_date.filter(|d| !d.is_empty()),
            overview: self.overview.unwrap_or_default(),
        }
    }
}

/// Provider capability used by resolution and acquisition. Implemented by
/// [`TmdbClient`]; tests substitute in-memory sources.
pub trait MetadataSource {
    /// Searches one kind; results arrive in provider order.
    fn search(&self, kind: MediaKind, query: &str) -> Result<Vec<SearchCandidate>, TmdbError>;
    /// Fetches full details plus image references for one entry.
    fn details(&self, kind: MediaKind, id: u64) -> Result<MediaDetails, TmdbError>;
    /// Fetches raw image bytes for a provider-relative file path.
    fn image(&self, file_path: &str) -> Result<Vec<u8>, TmdbError>;
}

/// TMDB API client
pub struct TmdbClient {
    client: Client,
    image_client: Client,
    base_url: String,
    image_base_url: String,
    api_key: String,
    language: String,
}

impl TmdbClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .context("Failed to build HTTP client")?;
        // Image payloads are large; give them more headroom.
        let image_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build image HTTP client")?;

        Ok(Self {
            client,
            image_client,
            base_url: config.tmdb_base_url.clone(),
            image_base_url: config.tmdb_image_base_url.clone(),
            api_key: config.tmdb_api_key.clone(),
            language: config.tmdb_language.clone(),
        })
    }
}

impl MetadataSource for TmdbClient {
    fn search(&self, kind: MediaKind, query: &str) -> Result<Vec<SearchCandidate>, TmdbError> {
        info!(kind = kind.as_str(), query = %query, "Searching TMDB");

        let url = format!("{}/search/{}", self.base_url, kind.as_str());
        let response = self
            .client
            .get(&url)
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("query", query),
                ("language", self.language.as_str()),
            ])
            .send()?;

        if !response.status().is_success() {
            return Err(TmdbError::Status(response.status()));
        }

        let page: SearchPage = response.json().map_err(TmdbError::Decode)?;
        debug!(
            kind = kind.as_str(),
            count = page.results.len(),
            "TMDB search returned results"
        );

        Ok(page
            .results
            .into_iter()
            .map(|raw| raw.into_candidate(kind))
            .collect())
    }

    fn details(&self, kind: MediaKind, id: u64) -> Result<MediaDetails, TmdbError> {
        info!(kind = kind.as_str(), id, "Fetching TMDB details");

        let url = format!("{}/{}/{}", self.base_url, kind.as_str(), id);
        // include_image_language=en,null keeps text-free backdrops in the
        // appended image list alongside English ones.
        let response = self
            .client
            .get(&url)
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("language", self.language.as_str()),
                ("append_to_response", "images"),
                ("include_image_language", "en,null"),
            ])
            .send()?;

        if !response.status().is_success() {
            return Err(TmdbError::Status(response.status()));
        }

        let details: MediaDetails = response.json().map_err(TmdbError::Decode)?;
        debug!(
            backdrops = details.images.backdrops.len(),
            has_poster = details.poster_path.is_some(),
            "TMDB details fetched"
        );
        Ok(details)
    }

    fn image(&self, file_path: &str) -> Result<Vec<u8>, TmdbError> {
        let url = format!("{}{}", self.image_base_url, file_path);
        debug!(url = %url, "Downloading image");

        let response = self.image_client.get(&url).send()?;
        if !response.status().is_success() {
            return Err(TmdbError::Status(response.status()));
        }

        Ok(response.bytes()?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tv_search_result_parses() {
        let body = r#"{
            "page": 1,
            "results": [{
                "id": 1396,
                "name": "ブレイキング・バッド",
                "original_name": "Breaking Bad",
                "first_air_date": "2008-01-20",
                "overview": "A chemistry teacher...",
                "popularity": 123.4
            }]
        }"#;
        let page: SearchPage = serde_json::from_str(body).unwrap();
        let candidate = page
            .results
            .into_iter()
            .next()
            .unwrap()
            .into_candidate(MediaKind::Tv);
        assert_eq!(candidate.id, 1396);
        assert_eq!(candidate.kind, MediaKind::Tv);
        assert_eq!(candidate.name, "ブレイキング・バッド");
        assert_eq!(candidate.original_name, "Breaking Bad");
        assert_eq!(candidate.release_date.as_deref(), Some("2008-01-20"));
    }

    #[test]
    fn test_movie_search_result_uses_title_aliases() {
        let body = r#"{
            "results": [{
                "id": 603,
                "title": "The Matrix",
                "original_title": "The Matrix",
                "release_date": "1999-03-30",
                "overview": "Neo..."
            }]
        }"#;
        let page: SearchPage = serde_json::from_str(body).unwrap();
        let candidate = page
            .results
            .into_iter()
            .next()
            .unwrap()
            .into_candidate(MediaKind::Movie);
        assert_eq!(candidate.name, "The Matrix");
        assert_eq!(candidate.kind, MediaKind::Movie);
        assert_eq!(candidate.release_date.as_deref(), Some("1999-03-30"));
    }

    #[test]
    fn test_missing_name_falls_back_to_original_then_empty() {
        let body = r#"{"results": [{"id": 1, "original_name": "Orig"}, {"id": 2}]}"#;
        let page: SearchPage = serde_json::from_str(body).unwrap();
        let mut iter = page.results.into_iter();
        assert_eq!(iter.next().unwrap().into_candidate(MediaKind::Tv).name, "Orig");
        assert_eq!(iter.next().unwrap().into_candidate(MediaKind::Tv).name, "");
    }

    #[test]
    fn test_empty_release_date_is_dropped() {
        let body = r#"{"results": [{"id": 1, "name": "X", "first_air_date": ""}]}"#;
        let page: SearchPage = serde_json::from_str(body).unwrap();
        let candidate = page
            .results
            .into_iter()
            .next()
            .unwrap()
            .into_candidate(MediaKind::Tv);
        assert_eq!(candidate.release_date, None);
    }

    #[test]
    fn test_details_parse_with_appended_images() {
        let body = r#"{
            "overview": "About a show",
            "poster_path": "/poster.jpg",
            "number_of_episodes": 62,
            "images": {
                "backdrops": [
                    { "file_path": "/b1.jpg" },
                    { "file_path": null }
                ],
                "posters": []
            }
        }"#;
        let details: MediaDetails = serde_json::from_str(body).unwrap();
        assert_eq!(details.number_of_episodes, Some(62));
        assert_eq!(details.poster_path.as_deref(), Some("/poster.jpg"));
        assert_eq!(details.images.backdrops.len(), 2);
        assert_eq!(details.images.backdrops[1].file_path, None);
    }

    #[test]
    fn test_details_tolerate_missing_images_block() {
        let details: MediaDetails = serde_json::from_str(r#"{"overview": null}"#).unwrap();
        assert!(details.overview.is_none());
        assert!(details.images.backdrops.is_empty());
        assert!(details.number_of_episodes.is_none());
    }
}
