// Service exports
pub mod identity;
pub mod store;

pub use identity::{Claims, IdentityError, IdentityVerifier};
pub use store::{SqliteStore, StoreError};
