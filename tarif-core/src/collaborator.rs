use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PricingResult;

/// Catalog projection of a product, as far as pricing cares.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductInfo {
    pub product_id: Uuid,
    pub category: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Availability {
    pub is_sellable: bool,
    pub reason: Option<String>,
}

/// External product catalog. Category feeds COMBINATION condition matching.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn product_info(&self, product_id: Uuid) -> PricingResult<ProductInfo>;
}

/// External per-zone sellability check, consulted once per resolution.
#[async_trait]
pub trait ProductAvailability: Send + Sync {
    async fn availability(&self, product_id: Uuid, zone_id: Uuid) -> PricingResult<Availability>;
}

/// Maps an authenticated user to a segment. Resolution falls back to the
/// default segment when the directory has no answer.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn segment_of(&self, user_id: Uuid) -> PricingResult<Option<Uuid>>;
}

/// Post-processing tax hook. Tax computation itself is outside this core;
/// the quote records pre-tax amounts.
#[async_trait]
pub trait TaxEngine: Send + Sync {
    async fn with_tax(&self, amount: i64) -> PricingResult<i64>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub kind: String,
    pub payload: serde_json::Value,
    pub at: DateTime<Utc>,
}

/// Fire-and-forget audit log. Append failures must never fail a quote.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, entry: AuditEntry) -> PricingResult<()>;
}

/// Catalog stub: every product exists, category "GENERAL".
pub struct StaticCatalog;

#[async_trait]
impl ProductCatalog for StaticCatalog {
    async fn product_info(&self, product_id: Uuid) -> PricingResult<ProductInfo> {
        Ok(ProductInfo {
            product_id,
            category: "GENERAL".to_string(),
            is_active: true,
        })
    }
}

/// Availability stub that answers sellable everywhere.
pub struct AlwaysSellable;

#[async_trait]
impl ProductAvailability for AlwaysSellable {
    async fn availability(&self, _product_id: Uuid, _zone_id: Uuid) -> PricingResult<Availability> {
        Ok(Availability {
            is_sellable: true,
            reason: None,
        })
    }
}

/// Directory stub that recognizes no users; resolution falls through to
/// the default segment.
pub struct AnonymousDirectory;

#[async_trait]
impl UserDirectory for AnonymousDirectory {
    async fn segment_of(&self, _user_id: Uuid) -> PricingResult<Option<Uuid>> {
        Ok(None)
    }
}

/// Identity tax hook (pre-tax pass-through).
pub struct NoTax;

#[async_trait]
impl TaxEngine for NoTax {
    async fn with_tax(&self, amount: i64) -> PricingResult<i64> {
        Ok(amount)
    }
}

/// Audit sink that forwards entries to `tracing` instead of a real store.
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn append(&self, entry: AuditEntry) -> PricingResult<()> {
        tracing::info!(kind = %entry.kind, at = %entry.at, "audit: {}", entry.payload);
        Ok(())
    }
}
