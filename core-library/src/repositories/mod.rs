//! Repository traits and SQLite implementations.
//!
//! Traits define the data-access surface the sync engine consumes; the
//! `Sqlite*` types implement them over a shared connection pool. All
//! operations return the crate-level `Result`.

pub mod episode;
pub mod filter;
pub mod folder;
pub mod podcast;
pub mod up_next;

pub use episode::{EpisodeRepository, SqliteEpisodeRepository};
pub use filter::{FilterRepository, SqliteFilterRepository};
pub use folder::{FolderRepository, SqliteFolderRepository};
pub use podcast::{PodcastRepository, SqlitePodcastRepository};
pub use up_next::{SqliteUpNextRepository, UpNextRepository};
