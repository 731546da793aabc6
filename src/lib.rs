//! PawMatch - Matching and rating engine for the PawMatch pet matching app
//!
//! This library implements the versioned rating ledger, the randomized
//! candidate feed and the mutual-match resolver behind the app's
//! pet-to-pet matching flow.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use crate::core::{EngineError, FeedLimits, MatchingEngine};
pub use crate::models::{
    CallerIdentity, MatchSummary, MatchingRecord, Pet, PetSummary, Rating, User,
};
pub use crate::services::{IdentityVerifier, SqliteStore, StoreError};
