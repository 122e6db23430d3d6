//! Turns a free-text query into a definite list of selected candidates
//!
//! Searches series first, falls back to films, then either auto-selects a
//! lone match or walks the user through an enumerated pick list. When
//! nothing matches, the user may retry with a replacement query; retries
//! run as a loop over a visited-query set so a repeated query terminates
//! instead of recursing forever.

use std::collections::HashSet;
use std::io::{self, BufRead, Write};

use tracing::{info, warn};

use super::record::MediaKind;
use super::tmdb::{MetadataSource, SearchCandidate};

/// Interactive input capability. Behind a trait so selection logic is
/// testable without a console.
pub trait Prompter {
    /// Shows `prompt` and reads one line. `None` means end of input.
    fn ask(&mut self, prompt: &str) -> Option<String>;
}

/// Reads answers from stdin, blocking until a line arrives.
pub struct ConsolePrompter;

impl Prompter for ConsolePrompter {
    fn ask(&mut self, prompt: &str) -> Option<String> {
        print!("{prompt}");
        let _ = io::stdout().flush();

        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => Some(line.trim().to_string()),
            Err(e) => {
                warn!(error = %e, "Failed to read from stdin");
                None
            }
        }
    }
}

/// Resolves one query to zero or more selected candidates.
///
/// Transport and parse faults during search are logged and treated as an
/// empty result set. End of input at any prompt behaves like a skip.
pub fn resolve(
    source: &dyn MetadataSource,
    prompter: &mut dyn Prompter,
    query: &str,
) -> Vec<SearchCandidate> {
    let mut visited: HashSet<String> = HashSet::new();
    let mut query = query.trim().to_string();

    loop {
        if !visited.insert(query.clone()) {
            warn!(query = %query, "Query already attempted, giving up");
            return Vec::new();
        }

        let candidates = search_series_then_films(source, &query);

        if candidates.is_empty() {
            warn!(query = %query, "No series or film matched");
            let retry = prompter
                .ask(&format!(
                    "Nothing found for '{query}'. Search again with a different name? (y/n): "
                ))
                .map(|answer| answer.eq_ignore_ascii_case("y"))
                .unwrap_or(false);
            if !retry {
                info!(query = %query, "Giving up on query");
                return Vec::new();
            }
            match prompter.ask("New name to search for: ") {
                Some(replacement) if !replacement.trim().is_empty() => {
                    info!(query = %replacement.trim(), "Retrying with replacement query");
                    query = replacement.trim().to_string();
                }
                _ => {
                    warn!("No replacement name entered, giving up");
                    return Vec::new();
                }
            }
            continue;
        }

        if candidates.len() == 1 {
            let only = &candidates[0];
            info!(
                name = %only.name,
                kind = only.kind.as_str(),
                id = only.id,
                "Single match, auto-selected"
            );
            return candidates;
        }

        return select_from_list(prompter, &query, candidates);
    }
}

/// Series results first; films are only consulted when no series matched.
fn search_series_then_films(source: &dyn MetadataSource, query: &str) -> Vec<SearchCandidate> {
    let mut candidates = match source.search(MediaKind::Tv, query) {
        Ok(results) => results,
        Err(e) => {
            warn!(query = %query, error = %e, "Series search failed");
            Vec::new()
        }
    };

    if candidates.is_empty() {
        info!(query = %query, "No series found, trying films");
        match source.search(MediaKind::Movie, query) {
            Ok(results) => candidates.extend(results),
            Err(e) => warn!(query = %query, error = %e, "Film search failed"),
        }
    }

    candidates
}

/// Presents the enumerated pick list and loops until the input is valid.
fn select_from_list(
    prompter: &mut dyn Prompter,
    query: &str,
    candidates: Vec<SearchCandidate>,
) -> Vec<SearchCandidate> {
    println!("\nMultiple results for '{query}':");
    for (i, candidate) in candidates.iter().enumerate() {
        let date = candidate.release_date.as_deref().unwrap_or("unknown date");
        let overview: String = candidate.overview.chars().take(50).collect();
        println!(
            "  {}. [{}] {} ({}) - {}...",
            i + 1,
            candidate.kind.as_str().to_uppercase(),
            candidate.name,
            date,
            overview
        );
    }

    let prompt = format!(
        "Pick numbers 1-{} (comma-separated), 'a' for all, or 's' to skip '{}': ",
        candidates.len(),
        query
    );

    loop {
        let input = match prompter.ask(&prompt) {
            Some(line) => line,
            None => {
                warn!(query = %query, "Input closed, skipping");
                return Vec::new();
            }
        };
        let input = input.trim();

        if input.eq_ignore_ascii_case("s") {
            info!(query = %query, "Skipped all results");
            return Vec::new();
        }
        if input.eq_ignore_ascii_case("a") {
            info!(query = %query, count = candidates.len(), "Selected all results");
            return candidates;
        }

        match parse_selection(input, candidates.len()) {
            Some(indices) => {
                info!(query = %query, count = indices.len(), "User selected results");
                return indices
                    .into_iter()
                    .map(|i| candidates[i].clone())
                    .collect();
            }
            None => {
                println!(
                    "Invalid selection, enter numbers 1-{} separated by commas.",
                    candidates.len()
                );
            }
        }
    }
}

/// Parses `"2,2,1"`-style input into 0-based indices, deduplicated in
/// first-occurrence order. Any malformed or out-of-range token rejects the
/// whole input.
fn parse_selection(input: &str, count: usize) -> Option<Vec<usize>> {
    let mut picked = Vec::new();
    for part in input.split(',') {
        let index: usize = part.trim().parse().ok()?;
        if index < 1 || index > count {
            return None;
        }
        if !picked.contains(&(index - 1)) {
            picked.push(index - 1);
        }
    }
    Some(picked)
}
