//! Core types and trait definitions for the roadwatch incident service.
//!
//! The domain model, the error taxonomy, the moderation rules and the store
//! abstraction that the engine drives. No HTTP or database dependencies.

pub mod clock;
pub mod error;
pub mod geo;
pub mod incident;
pub mod policy;
pub mod store;
pub mod user;

pub use error::{Error, ErrorKind, Result};
