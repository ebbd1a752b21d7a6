use async_trait::async_trait;
use tarif_core::PricingResult;
use uuid::Uuid;

use crate::zone::{GeoZone, GeoZoneMapping};

/// Repository trait for zone data access. Implementations serve read
/// replicas; writes go through the admin facade which validates first.
#[async_trait]
pub trait ZoneRepository: Send + Sync {
    async fn get_zone(&self, id: Uuid) -> PricingResult<Option<GeoZone>>;

    async fn list_zones(&self) -> PricingResult<Vec<GeoZone>>;

    async fn list_mappings(&self) -> PricingResult<Vec<GeoZoneMapping>>;

    async fn save_zone(&self, zone: &GeoZone) -> PricingResult<()>;

    async fn save_mapping(&self, mapping: &GeoZoneMapping) -> PricingResult<()>;
}
