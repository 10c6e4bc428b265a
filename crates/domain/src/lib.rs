//! postpilot domain crate
//!
//! This crate contains the core domain logic following hexagonal architecture:
//! - `model`: Domain entities and value objects
//! - `ports`: Trait definitions for external dependencies (adapters)
//! - `usecases`: Scheduling, post lifecycle, generation and analytics
//! - `policy`: Format constraints for generated content

pub mod model;
pub mod policy;
pub mod ports;
pub mod usecases;

#[cfg(test)]
pub(crate) mod testing;

pub use model::*;
pub use ports::*;
