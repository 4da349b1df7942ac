//! Discussion Service
//!
//! Persists conversation trees through a [`DiscussionRepository`] and
//! serializes every load, mutate and save cycle per discussion.

pub mod config;
pub mod error;
pub mod locks;
pub mod repository;
pub mod service;

pub use config::ServiceConfig;
pub use error::{ErrorClass, Result, ServiceError};
pub use locks::{DiscussionGuard, DiscussionLocks};
pub use repository::{
    DiscussionRecord, DiscussionRepository, DiscussionSummary, FileDiscussionRepository,
    InMemoryDiscussionRepository,
};
pub use service::{CreatedDiscussion, DiscussionService, RetryContext};
