//! Domain services used by HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own session state, persistence, and outbound calls so
//! route handlers can stay focused on request translation.

pub mod board;
pub mod catalog;
pub mod persistence;
pub mod search;
pub mod templates;
