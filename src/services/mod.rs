//! Library synchronization services

pub mod acquire;
pub mod images;
pub mod library;
pub mod record;
pub mod resolver;
pub mod sanitize;
pub mod tmdb;

pub use acquire::{acquire, COVER_FILENAME, MAX_BACKDROPS};
pub use images::{normalize_images, NormalizeSummary};
pub use library::{edit_record_field, select_targets, FieldEdit};
pub use record::{merge_record, MediaKind, MediaRecord, Progress, RECORD_FILENAME};
pub use resolver::{resolve, ConsolePrompter, Prompter};
pub use sanitize::{sanitize_name, FALLBACK_NAME};
pub use tmdb::{MediaDetails, MetadataSource, SearchCandidate, TmdbClient, TmdbError};
