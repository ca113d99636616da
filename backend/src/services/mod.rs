//! Business logic services for the Dairy ERP backend

pub mod audit;
pub mod collection_summary;
pub mod lab_test;
pub mod milk_collection;
pub mod partner;
pub mod partner_import;
pub mod production;
pub mod reference;
pub mod role;

pub use collection_summary::CollectionSummaryService;
pub use lab_test::LabTestService;
pub use milk_collection::MilkCollectionService;
pub use partner::PartnerService;
pub use partner_import::PartnerImportService;
pub use production::ProductionService;
pub use reference::ReferenceService;
pub use role::RoleService;
