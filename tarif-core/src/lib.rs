pub mod collaborator;
pub mod error;
pub mod models;
pub mod repository;

pub use collaborator::{
    AnonymousDirectory, AuditEntry, AuditSink, Availability, ProductAvailability, ProductCatalog,
    ProductInfo, TaxEngine, UserDirectory,
};
pub use error::{PricingError, PricingResult};
pub use models::UserSegment;
pub use repository::SegmentRepository;
