use async_trait::async_trait;
use tarif_core::PricingResult;
use uuid::Uuid;

use crate::modifier::PriceModifier;

/// Repository trait for modifier access. Expired modifiers stay stored;
/// the engine filters them by validity window at resolve time.
#[async_trait]
pub trait ModifierRepository: Send + Sync {
    async fn get_modifier(&self, id: Uuid) -> PricingResult<Option<PriceModifier>>;

    async fn list_modifiers(&self) -> PricingResult<Vec<PriceModifier>>;

    async fn save_modifier(&self, modifier: &PriceModifier) -> PricingResult<()>;
}
