//! HTTP handlers

pub mod collection_summary;
pub mod health;
pub mod milk_collection;
pub mod partner;
pub mod production;
pub mod reference;
pub mod role;

pub use collection_summary::*;
pub use health::*;
pub use lab_test::*;
pub use milk_collection::*;
pub use partner::*;
pub use production::*;
pub use reference::*;
pub use role::*;
