//! Domain models for the Dairy ERP platform

mod collection;
mod import;
mod lab;
mod partner;
mod permission;
mod production;
mod summary;

pub use collection::*;
pub use import::*;
pub use lab::*;
pub use partner::*;
pub use permission::*;
pub use production::*;
pub use summary::*;
