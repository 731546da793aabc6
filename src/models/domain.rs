use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A registered account. Accounts are deactivated rather than deleted so
/// that rating history stays referentially intact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub display_name: Option<String>,
    pub active: bool,
    /// Consulted by external rate limiting only, never by the engine.
    pub premium_expiration: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A pet profile, owned by exactly one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pet {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub profile_picture_id: Option<i64>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub modified_at: Option<DateTime<Utc>>,
}

impl Pet {
    /// The staleness watermark: the last edit time, or the creation time
    /// for a never-edited pet. Ratings snapshot this value.
    pub fn version(&self) -> DateTime<Utc> {
        self.modified_at.unwrap_or(self.created_at)
    }
}

/// A photo attached to a pet. Removed pictures keep their rows so older
/// references stay resolvable; read paths hide them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PetPicture {
    pub id: i64,
    pub pet_id: i64,
    pub url: String,
    pub active: bool,
    pub removed: bool,
    pub created_at: DateTime<Utc>,
}

/// A user's opinion of one version of another user's pet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Rating {
    Dislike,
    Neutral,
    Like,
}

impl Rating {
    pub fn is_like(self) -> bool {
        matches!(self, Rating::Like)
    }
}

impl From<Rating> for i64 {
    fn from(value: Rating) -> Self {
        match value {
            Rating::Dislike => -1,
            Rating::Neutral => 0,
            Rating::Like => 1,
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("rating must be -1 (dislike), 0 (neutral) or 1 (like), got {0}")]
pub struct InvalidRating(pub i64);

impl TryFrom<i64> for Rating {
    type Error = InvalidRating;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Rating::Dislike),
            0 => Ok(Rating::Neutral),
            1 => Ok(Rating::Like),
            other => Err(InvalidRating(other)),
        }
    }
}

/// One ledger row. The (user_id, pet_id, pet_version_time) triple is
/// unique: re-rating the same pet version rewrites `rating` in place,
/// while a version change starts a fresh row and keeps the old one as
/// history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingRecord {
    pub id: i64,
    pub user_id: i64,
    pub pet_id: i64,
    pub pet_version_time: DateTime<Utc>,
    pub rating: Rating,
    pub created_at: DateTime<Utc>,
    pub modified_at: Option<DateTime<Utc>>,
}

/// The authenticated caller, resolved from the bearer token by the HTTP
/// layer and passed explicitly into every engine operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerIdentity {
    pub user_id: i64,
}

impl CallerIdentity {
    pub fn new(user_id: i64) -> Self {
        Self { user_id }
    }
}

/// A picture as decorated onto feed and detail reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PictureSummary {
    pub id: i64,
    pub url: String,
    pub created_ts: i64,
}

/// A candidate pet as served in the matching feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PetSummary {
    pub id: i64,
    pub name: String,
    pub owner_id: i64,
    pub description: Option<String>,
    pub profile_image_id: Option<i64>,
    /// Empty string when the pet has no profile picture; feed clients
    /// expect a string here, not null.
    pub profile_image_url: String,
    pub images: Vec<PictureSummary>,
}

/// A pet joined with its picture decorations, as read from the store.
#[derive(Debug, Clone)]
pub struct PetWithImages {
    pub pet: Pet,
    pub profile_image_url: Option<String>,
    pub images: Vec<PictureSummary>,
}

/// A positive ledger row joined with the pet it rates, as consumed by
/// match resolution.
#[derive(Debug, Clone)]
pub struct LikeRow {
    pub rater_id: i64,
    pub pet_id: i64,
    pub pet_owner_id: i64,
    pub pet_name: String,
    pub pet_description: Option<String>,
    pub profile_image_id: Option<i64>,
    pub profile_image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A pet listed as evidence inside a match summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LikedPet {
    pub id: i64,
    pub name: String,
    pub owner_id: i64,
    pub description: Option<String>,
    pub profile_image_id: Option<i64>,
    pub profile_image_url: Option<String>,
}

/// One side of a match pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchedUser {
    pub id: i64,
    pub name: Option<String>,
}

/// A mutual-like relationship between two users, derived from the ledger
/// on every call and never persisted. `user_a` is always the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchSummary {
    pub user_a: MatchedUser,
    pub user_b: MatchedUser,
    pub user_a_liked_pets: Vec<LikedPet>,
    pub user_b_liked_pets: Vec<LikedPet>,
    /// Unix seconds of the most recent qualifying like between the pair.
    pub creation_time: i64,
}
