use serde::{Deserialize, Serialize};

use crate::models::domain::{MatchSummary, PetSummary, PictureSummary};

/// Response for POST /api/matching-records
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingResponse {
    pub message: String,
    pub id: i64,
}

/// Response for GET /api/pets/matching
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedResponse {
    pub pets: Vec<PetSummary>,
}

/// Response for GET /api/matches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchesResponse {
    pub matches: Vec<MatchSummary>,
}

/// Response for pet detail reads and edits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PetDetailResponse {
    pub id: i64,
    pub name: String,
    pub owner_id: i64,
    pub can_edit: bool,
    pub description: Option<String>,
    pub profile_image_id: Option<i64>,
    pub profile_image_url: Option<String>,
    pub images: Vec<PictureSummary>,
}

/// Response for POST /api/pets/new
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPetResponse {
    pub message: String,
    pub pet: CreatedPet,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedPet {
    pub id: i64,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}
