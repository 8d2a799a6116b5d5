//! Session domain module.
//!
//! This module contains the session model and its lifecycle management.
//!
//! # Module Structure
//!
//! - `model`: Core session domain model (`Session`)
//! - `manager`: Session lifecycle management (`SessionManager`)

mod manager;
mod model;

// Re-export public API
pub use manager::SessionManager;
pub use model::Session;
