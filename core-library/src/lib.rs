//! # Podcast Library
//!
//! Owns the canonical local podcast database and provides repository access
//! for the sync engine.
//!
//! ## Overview
//!
//! This crate manages:
//! - SQLite schema and embedded migrations
//! - Domain models with per-field dirty timestamps
//! - Repositories for podcasts, episodes, the up-next queue and change log,
//!   filters and folders

pub mod db;
pub mod error;
pub mod models;
pub mod repositories;

pub use db::{create_pool, create_test_pool, DatabaseConfig};
pub use error::{LibraryError, Result};
pub use models::{
    Episode, EpisodeFilter, EpisodeStatus, Folder, PlayingStatus, Podcast, SyncStatus,
    UpNextAction, UpNextChange,
};
