//! orepass core — domain models, repository trait seams, and the
//! shared error taxonomy for the authentication/authorization core.

pub mod error;
pub mod models;
pub mod repository;

pub use error::{OrepassError, OrepassResult};
