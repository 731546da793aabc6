use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::core::feed::{self, FeedLimits};
use crate::core::resolver;
use crate::models::{
    CallerIdentity, MatchSummary, MatchedUser, MatchingRecord, PetSummary, Rating, User,
};
use crate::services::{SqliteStore, StoreError};

/// Failures surfaced by the engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("invalid target: {0}")]
    InvalidTarget(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("conflicting writes on the same rating, retries exhausted")]
    Conflict,

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Retries before a contended rating upsert surfaces as a conflict.
const UPSERT_RETRIES: u32 = 2;

/// The matching engine: the rating ledger, the candidate feed and the
/// match resolver over one entity store.
///
/// The engine holds no mutable state of its own; concurrent calls only
/// contend inside the store, on the ledger's unique key.
pub struct MatchingEngine {
    store: Arc<SqliteStore>,
    limits: FeedLimits,
}

impl MatchingEngine {
    pub fn new(store: Arc<SqliteStore>, limits: FeedLimits) -> Self {
        Self { store, limits }
    }

    /// Resolve the caller to an existing, active user.
    ///
    /// Every operation runs this first; deactivated accounts keep their
    /// rows but lose access.
    pub async fn authorize(&self, caller: CallerIdentity) -> Result<User, EngineError> {
        let user = self
            .store
            .get_user(caller.user_id)
            .await?
            .ok_or_else(|| EngineError::Unauthorized(format!("user {} not found", caller.user_id)))?;

        if !user.active {
            return Err(EngineError::Unauthorized(format!(
                "user {} is deactivated",
                user.id
            )));
        }

        Ok(user)
    }

    /// Record the caller's rating of another user's pet.
    ///
    /// The rating is keyed by the pet's current version: rating the same
    /// version again rewrites the existing record (last write wins),
    /// while rating after an edit starts a new record and keeps the old
    /// one as history.
    pub async fn submit_rating(
        &self,
        caller: CallerIdentity,
        pet_id: i64,
        rating: i64,
    ) -> Result<MatchingRecord, EngineError> {
        let rating =
            Rating::try_from(rating).map_err(|e| EngineError::Validation(e.to_string()))?;

        let user = self.authorize(caller).await?;

        let (pet, owner) = self
            .store
            .get_pet_with_owner(pet_id)
            .await?
            .ok_or_else(|| EngineError::InvalidTarget(format!("pet {} not found", pet_id)))?;

        if pet.user_id == user.id {
            return Err(EngineError::InvalidTarget(
                "cannot rate your own pet".to_string(),
            ));
        }
        if !pet.active {
            return Err(EngineError::InvalidTarget(format!(
                "pet {} is not active",
                pet_id
            )));
        }
        if !owner.active {
            return Err(EngineError::InvalidTarget(format!(
                "owner of pet {} is not active",
                pet_id
            )));
        }

        let version = pet.version();
        let mut attempts = 0;

        loop {
            match self
                .store
                .upsert_rating(user.id, pet.id, version, rating)
                .await
            {
                Ok(record) => {
                    tracing::debug!(
                        "Recorded rating: user {} -> pet {} @ {} ({:?})",
                        user.id,
                        pet.id,
                        version,
                        rating
                    );
                    return Ok(record);
                }
                Err(e) if e.is_busy() && attempts < UPSERT_RETRIES => {
                    attempts += 1;
                    tracing::warn!(
                        "Rating upsert contended for user {} pet {}, retry {}",
                        user.id,
                        pet.id,
                        attempts
                    );
                }
                Err(e) if e.is_busy() => return Err(EngineError::Conflict),
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Serve a randomized page of pets the caller has not yet rated at
    /// their current version.
    ///
    /// Editing a pet advances its version, which re-surfaces it to users
    /// whose rating is stamped with an older version. Each call shuffles
    /// independently; there is no cursor.
    pub async fn candidate_feed(
        &self,
        caller: CallerIdentity,
        limit: Option<u16>,
    ) -> Result<Vec<PetSummary>, EngineError> {
        let user = self.authorize(caller).await?;
        let limit = self.limits.clamp(limit);

        let mut pets = self.store.feed_candidates(user.id, limit).await?;
        feed::randomize(&mut pets, &mut rand::thread_rng());

        tracing::debug!(
            "Feed for user {}: {} candidates (limit {})",
            user.id,
            pets.len(),
            limit
        );

        Ok(pets)
    }

    /// Derive the caller's mutual matches from the ledger.
    ///
    /// Nothing is persisted; every call recomputes from the like records.
    /// Counterparties whose user row no longer resolves are skipped.
    pub async fn matches_for(
        &self,
        caller: CallerIdentity,
    ) -> Result<Vec<MatchSummary>, EngineError> {
        let me = self.authorize(caller).await?;

        let my_pet_ids = self.store.pet_ids_for_user(me.id).await?;
        let likes = self.store.relevant_likes(me.id, &my_pet_ids).await?;
        let resolved = resolver::resolve(me.id, &my_pet_ids, &likes);

        let other_ids: Vec<i64> = resolved.iter().map(|m| m.other_user_id).collect();
        let others: HashMap<i64, User> = self
            .store
            .get_users_by_ids(&other_ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        let matches: Vec<MatchSummary> = resolved
            .into_iter()
            .filter_map(|m| {
                let other = others.get(&m.other_user_id)?;
                Some(MatchSummary {
                    user_a: MatchedUser {
                        id: me.id,
                        name: me.display_name.clone(),
                    },
                    user_b: MatchedUser {
                        id: other.id,
                        name: other.display_name.clone(),
                    },
                    user_a_liked_pets: m.my_liked_pets,
                    user_b_liked_pets: m.their_liked_pets,
                    creation_time: m.creation_time.timestamp(),
                })
            })
            .collect();

        tracing::debug!("User {} has {} matches", me.id, matches.len());

        Ok(matches)
    }
}
