//! In-crate scenario tests.
//!
//! # Test Structure
//!
//! - `helpers.rs`: recording systems, event recorders and log setup, shared
//!   with the unit tests of the other modules
//! - `integration.rs`: end-to-end flows through a [`Simulation`](crate::simulation::Simulation)
//! - `determinism.rs`: ordering guarantees that must not depend on
//!   registration or insertion order

pub(crate) mod helpers;
mod integration;
