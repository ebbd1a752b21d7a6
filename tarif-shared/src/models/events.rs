use uuid::Uuid;

/// Emitted after a quote is successfully resolved. Consumed by the audit
/// sink and downstream analytics.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct QuoteResolvedEvent {
    pub product_id: Uuid,
    pub zone_id: Option<Uuid>,
    pub segment_id: Option<Uuid>,
    pub quantity: u32,
    pub unit_price: i64,
    pub subtotal: i64,
    pub currency: String,
    pub applied_modifier_ids: Vec<Uuid>,
    pub warning_count: usize,
    pub timestamp: i64,
}

/// Emitted when an upstream price change cascade is resolved against a
/// child book override.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct ConflictResolvedEvent {
    pub child_book_id: Uuid,
    pub product_id: Uuid,
    pub strategy: String,
    pub old_price: i64,
    pub new_price: i64,
    pub resulting_price: i64,
    pub timestamp: i64,
}

/// Emitted when an admin write or manual flush drops cached quotes.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct CacheInvalidatedEvent {
    pub keys: Vec<String>,
    pub trigger: String,
    pub timestamp: i64,
}
