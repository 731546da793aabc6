// Core engine exports
pub mod engine;
pub mod feed;
pub mod resolver;
pub mod version;

pub use engine::{EngineError, MatchingEngine};
pub use feed::FeedLimits;
pub use resolver::{resolve, ResolvedMatch};
