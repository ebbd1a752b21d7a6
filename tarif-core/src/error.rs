use uuid::Uuid;

/// Error taxonomy shared by every resolution and admin path.
///
/// Write-time failures surface as `Validation`; resolution failures are
/// `NotFound` / `Unavailable`; stale optimistic versions are `Conflict`.
/// `Config` covers structural corruption that should have been rejected at
/// write time (cycles, malformed condition trees) and is always a bug in the
/// data, not the request.
#[derive(Debug, thiserror::Error)]
pub enum PricingError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Product {product} not sellable in zone {zone}: {reason}")]
    Unavailable {
        product: Uuid,
        zone: Uuid,
        reason: String,
    },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cache error: {0}")]
    Cache(String),
}

pub type PricingResult<T> = Result<T, PricingError>;

impl PricingError {
    /// Cache failures never fail a quote; callers downgrade them to warnings.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, PricingError::Cache(_))
    }
}
