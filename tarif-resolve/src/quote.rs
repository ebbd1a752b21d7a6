use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tarif_books::MatchRung;
use tarif_modifier::AppliedModifier;
use uuid::Uuid;

/// Where the buyer is. A pincode is resolved to a zone chain; a zone id
/// skips the mapping lookup and walks ancestors directly.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Location {
    Pincode(u32),
    Zone(Uuid),
}

/// Input to a single resolution. `requested_at` is the clock for modifier
/// validity windows; the resolver never reads wall time itself, so the same
/// context always yields the same quote.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveContext {
    pub product_id: Uuid,
    pub quantity: u32,
    pub location: Location,
    /// Explicit segment override; wins over the user directory lookup.
    pub segment_id: Option<Uuid>,
    /// Authenticated user, mapped to a segment through the directory when
    /// `segment_id` is absent.
    pub user_id: Option<Uuid>,
    pub requested_at: DateTime<Utc>,
}

/// One rung of the book chain a quote passed through.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookRef {
    pub book_id: Uuid,
    pub name: String,
    pub rung: MatchRung,
}

/// The priced result. Field names are a stable contract consumed by both
/// storefront and admin tooling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub product_id: Uuid,
    pub zone_id: Option<Uuid>,
    pub segment_id: Option<Uuid>,
    pub quantity: u32,
    pub unit_price: i64,
    pub subtotal: i64,
    pub currency: String,
    pub applied_modifiers: Vec<AppliedModifier>,
    pub resolved_book_chain: Vec<BookRef>,
    pub warnings: Vec<String>,
    pub resolved_at: DateTime<Utc>,
}

impl Quote {
    /// Storefront projection: warnings collapsed into a flag. Admin callers
    /// read the full `Quote`.
    pub fn storefront(&self) -> StorefrontQuote {
        StorefrontQuote {
            product_id: self.product_id,
            quantity: self.quantity,
            unit_price: self.unit_price,
            subtotal: self.subtotal,
            currency: self.currency.clone(),
            applied_modifiers: self.applied_modifiers.clone(),
            has_warnings: !self.warnings.is_empty(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorefrontQuote {
    pub product_id: Uuid,
    pub quantity: u32,
    pub unit_price: i64,
    pub subtotal: i64,
    pub currency: String,
    pub applied_modifiers: Vec<AppliedModifier>,
    pub has_warnings: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItem {
    pub product_id: Uuid,
    pub quantity: u32,
}

/// A batch shares one location/segment resolution across all items.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    pub location: Location,
    pub segment_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub requested_at: DateTime<Utc>,
    pub items: Vec<BatchItem>,
}
