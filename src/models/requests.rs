use serde::{Deserialize, Serialize};
use validator::Validate;

/// Body for POST /api/matching-records
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubmitRatingRequest {
    pub pet_id: i64,
    /// -1 dislike, 0 neutral, 1 like
    #[validate(range(min = -1, max = 1))]
    pub rating: i64,
}

/// Body for POST /api/pets/new
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewPetRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
}

/// Body for POST /api/pets/{pet_id}; absent fields keep their value.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdatePetRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
}

/// Query for GET /api/pets/matching
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedQuery {
    pub limit: Option<u16>,
}
