//! # Account Sync Engine
//!
//! Reconciles the local podcast library with the account sync service.
//!
//! ## Overview
//!
//! This module keeps every signed-in device convergent:
//! - Podcasts, episodes, filters and folders exchange through one incremental
//!   endpoint driven by per-field dirty timestamps
//! - The up-next queue syncs as an append-only change log
//! - Starred episodes and listening history run as their own stages with
//!   independent server watermarks
//! - Feed refresh keeps the local catalogue aligned without producing uploads
//!
//! ## Components
//!
//! - **Sync Coordinator** (`coordinator`): Runs the full pipeline, full sync on
//!   first run and incremental after
//! - **Merge Rules** (`merge`): Field-level conflict policy, including the
//!   currently-playing guards
//! - **Up-Next Sync** (`up_next`): Change-log upload and queue import, behind a
//!   pluggable wire codec
//! - **Starred Sync** (`starred`): Watermark plus replay-window processing
//! - **History Sync** (`history`): Interaction upload and chunked apply
//! - **Podcast Refresher** (`refresher`): Feed-driven catalogue maintenance
//! - **Importer** (`import`): On-demand materialisation of server-referenced
//!   podcasts and episodes

pub mod coordinator;
pub mod error;
pub mod history;
pub mod import;
pub mod merge;
pub mod refresher;
pub mod settings;
pub mod starred;
pub mod up_next;

pub use coordinator::{SyncCoordinator, SyncOutcome};
pub use error::{Result, SyncError};
pub use history::{HistorySync, HISTORY_CHUNK_SIZE};
pub use import::{EpisodeSeed, PodcastImporter};
pub use merge::{EpisodeMergeOutcome, PLAYED_UP_TO_TOLERANCE_SECS};
pub use refresher::{
    PodcastRefresher, ABSENT_EPISODE_RETENTION_MS, BACKDATE_ARCHIVE_THRESHOLD_MS,
};
pub use settings::SyncSettings;
pub use starred::{StarredSync, STARRED_REPLAY_WINDOW_MS};
pub use up_next::{JsonUpNextCodec, UpNextCodec, UpNextSync};
