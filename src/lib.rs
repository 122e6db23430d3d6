//! Curator - file-system-backed media library kept in sync with TMDB
//!
//! Each library entry is one directory holding an `init.json` record, a
//! `cover.jpg`, and a bounded set of supplementary images. The binary in
//! `main.rs` wires these modules to the command line.

pub mod cli;
pub mod config;
pub mod services;
