pub mod collections;
pub mod user;

// Re-export models for easy access
pub use collections::{AppCollections, CmsCollections, USER_COLLECTION};
pub use user::User;
