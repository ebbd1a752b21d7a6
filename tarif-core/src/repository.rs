use async_trait::async_trait;
use uuid::Uuid;

use crate::error::PricingResult;
use crate::models::UserSegment;

/// Repository trait for segment data access. Zone, book and modifier
/// repositories live next to their models in the domain crates.
#[async_trait]
pub trait SegmentRepository: Send + Sync {
    async fn get_segment(&self, id: Uuid) -> PricingResult<Option<UserSegment>>;

    async fn default_segment(&self) -> PricingResult<Option<UserSegment>>;

    async fn list_segments(&self) -> PricingResult<Vec<UserSegment>>;
}
