//! Shared types and models for the Dairy ERP platform
//!
//! This crate contains the domain types and the pure business rules shared
//! between the backend and the browser client (via WASM): quality
//! classification, production step monitoring, monthly collection summaries,
//! partner import reconciliation and the capability matrix.

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
