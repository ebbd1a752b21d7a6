use redis::AsyncCommands;
use tarif_core::{PricingError, PricingResult};
use tracing::info;
use uuid::Uuid;

/// Redis-backed cache for resolved quotes and zone chains.
///
/// Reads are best-effort: callers downgrade `Cache` errors to warnings and
/// recompute. Invalidation is synchronous inside the admin write path so a
/// committed write never races a stale read.
#[derive(Clone)]
pub struct ResolutionCache {
    client: redis::Client,
}

impl ResolutionCache {
    pub fn new(connection_string: &str) -> PricingResult<Self> {
        let client = redis::Client::open(connection_string)
            .map_err(|e| PricingError::Cache(e.to_string()))?;
        Ok(Self { client })
    }

    // pincode is part of the key: pincode-conditioned modifiers make two
    // pincodes in the same zone price differently
    fn quote_key(
        product: Uuid,
        zone: Option<Uuid>,
        segment: Option<Uuid>,
        pincode: Option<u32>,
        quantity: u32,
    ) -> String {
        format!(
            "quote:{}:{}:{}:{}:{}",
            product,
            zone.map(|z| z.to_string()).unwrap_or_else(|| "-".into()),
            segment.map(|s| s.to_string()).unwrap_or_else(|| "-".into()),
            pincode.map(|p| p.to_string()).unwrap_or_else(|| "-".into()),
            quantity
        )
    }

    fn zone_key(pincode: u32) -> String {
        format!("zonechain:{}", pincode)
    }

    async fn conn(&self) -> PricingResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| PricingError::Cache(e.to_string()))
    }

    pub async fn get_quote(
        &self,
        product: Uuid,
        zone: Option<Uuid>,
        segment: Option<Uuid>,
        pincode: Option<u32>,
        quantity: u32,
    ) -> PricingResult<Option<String>> {
        let mut conn = self.conn().await?;
        let key = Self::quote_key(product, zone, segment, pincode, quantity);
        conn.get(key)
            .await
            .map_err(|e| PricingError::Cache(e.to_string()))
    }

    pub async fn set_quote(
        &self,
        product: Uuid,
        zone: Option<Uuid>,
        segment: Option<Uuid>,
        pincode: Option<u32>,
        quantity: u32,
        quote_json: &str,
        ttl_seconds: u64,
    ) -> PricingResult<()> {
        let mut conn = self.conn().await?;
        let key = Self::quote_key(product, zone, segment, pincode, quantity);
        conn.set_ex::<_, _, ()>(key, quote_json, ttl_seconds)
            .await
            .map_err(|e| PricingError::Cache(e.to_string()))
    }

    pub async fn get_zone_chain(&self, pincode: u32) -> PricingResult<Option<String>> {
        let mut conn = self.conn().await?;
        conn.get(Self::zone_key(pincode))
            .await
            .map_err(|e| PricingError::Cache(e.to_string()))
    }

    pub async fn set_zone_chain(
        &self,
        pincode: u32,
        chain_json: &str,
        ttl_seconds: u64,
    ) -> PricingResult<()> {
        let mut conn = self.conn().await?;
        conn.set_ex::<_, _, ()>(Self::zone_key(pincode), chain_json, ttl_seconds)
            .await
            .map_err(|e| PricingError::Cache(e.to_string()))
    }

    /// Drop every cached quote for a product, synchronously. Called from the
    /// admin write path before the write returns.
    pub async fn invalidate_product(&self, product: Uuid) -> PricingResult<usize> {
        self.invalidate_pattern(&format!("quote:{}:*", product)).await
    }

    /// Drop all cached zone chains (zone/mapping writes).
    pub async fn invalidate_zones(&self) -> PricingResult<usize> {
        self.invalidate_pattern("zonechain:*").await
    }

    /// Drop every cached quote (book/modifier writes affect unknown sets).
    pub async fn invalidate_quotes(&self) -> PricingResult<usize> {
        self.invalidate_pattern("quote:*").await
    }

    async fn invalidate_pattern(&self, pattern: &str) -> PricingResult<usize> {
        let mut conn = self.conn().await?;
        let mut keys: Vec<String> = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await
                .map_err(|e| PricingError::Cache(e.to_string()))?;
            keys.extend(batch);
            cursor = next;
            if cursor == 0 {
                break;
            }
        }
        if !keys.is_empty() {
            conn.del::<_, ()>(keys.clone())
                .await
                .map_err(|e| PricingError::Cache(e.to_string()))?;
        }
        info!(pattern, dropped = keys.len(), "cache invalidated");
        Ok(keys.len())
    }
}
