use async_trait::async_trait;
use tarif_core::PricingResult;
use uuid::Uuid;

use crate::book::{PriceBook, PriceBookEntry};

/// Repository trait for price book and entry access.
///
/// Writes are optimistic: callers pass the version they last read and the
/// store rejects the write with `Conflict` when the stored version moved.
#[async_trait]
pub trait BookRepository: Send + Sync {
    async fn get_book(&self, id: Uuid) -> PricingResult<Option<PriceBook>>;

    async fn list_books(&self) -> PricingResult<Vec<PriceBook>>;

    async fn save_book(&self, book: &PriceBook, expected_version: i64) -> PricingResult<()>;

    async fn get_entry(&self, book: Uuid, product: Uuid) -> PricingResult<Option<PriceBookEntry>>;

    async fn list_entries(&self) -> PricingResult<Vec<PriceBookEntry>>;

    async fn upsert_entry(&self, entry: &PriceBookEntry, expected_version: i64)
        -> PricingResult<()>;

    async fn delete_entry(&self, book: Uuid, product: Uuid) -> PricingResult<()>;

    /// Bump a book's version without other changes; returns the new version.
    async fn bump_book_version(&self, id: Uuid) -> PricingResult<i64>;
}
