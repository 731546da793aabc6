// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    CallerIdentity, InvalidRating, LikeRow, LikedPet, MatchSummary, MatchedUser, MatchingRecord,
    Pet, PetPicture, PetSummary, PetWithImages, PictureSummary, Rating, User,
};
pub use requests::{FeedQuery, NewPetRequest, SubmitRatingRequest, UpdatePetRequest};
pub use responses::{
    CreatedPet, ErrorResponse, FeedResponse, HealthResponse, MatchesResponse, NewPetResponse,
    PetDetailResponse, RatingResponse,
};
