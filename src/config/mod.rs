//! Application configuration management

use std::env;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// TMDB API key; there is no degraded mode without it
    pub tmdb_api_key: String,

    /// Library root path holding one directory per entry
    pub library_path: String,

    /// TMDB API base URL
    pub tmdb_base_url: String,

    /// Base URL for original-size image downloads
    pub tmdb_image_base_url: String,

    /// Preferred language for titles and overviews
    pub tmdb_language: String,

    /// Path of the detailed log file
    pub log_file: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            tmdb_api_key: env::var("TMDB_API_KEY").context("TMDB_API_KEY is required")?,

            library_path: env::var("LIBRARY_PATH")
                .unwrap_or_else(|_| "./assets/tv_shows".to_string()),

            tmdb_base_url: env::var("TMDB_BASE_URL")
                .unwrap_or_else(|_| "https://api.themoviedb.org/3".to_string()),

            tmdb_image_base_url: env::var("TMDB_IMAGE_BASE_URL")
                .unwrap_or_else(|_| "https://image.tmdb.org/t/p/original".to_string()),

            tmdb_language: env::var("TMDB_LANGUAGE").unwrap_or_else(|_| "zh-CN".to_string()),

            log_file: env::var("LOG_FILE").unwrap_or_else(|_| "curator.log".to_string()),
        })
    }
}
