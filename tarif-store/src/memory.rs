use std::collections::HashMap;

use async_trait::async_trait;
use tarif_books::{BookRepository, PriceBook, PriceBookEntry};
use tarif_core::{PricingError, PricingResult, SegmentRepository, UserSegment};
use tarif_geo::{GeoZone, GeoZoneMapping, ZoneRepository};
use tarif_modifier::{ModifierRepository, PriceModifier};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    zones: HashMap<Uuid, GeoZone>,
    mappings: Vec<GeoZoneMapping>,
    segments: HashMap<Uuid, UserSegment>,
    books: HashMap<Uuid, PriceBook>,
    entries: HashMap<(Uuid, Uuid), PriceBookEntry>,
    modifiers: HashMap<Uuid, PriceModifier>,
}

/// In-memory store implementing every repository trait. Versioned writes
/// are optimistic: pass `expected_version = 0` for inserts; a mismatch on
/// update is rejected with `Conflict` so the writer re-fetches and retries.
///
/// This is the read-replica snapshot the resolution core runs against;
/// a durable store slots in behind the same traits.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ZoneRepository for MemoryStore {
    async fn get_zone(&self, id: Uuid) -> PricingResult<Option<GeoZone>> {
        Ok(self.inner.read().await.zones.get(&id).cloned())
    }

    async fn list_zones(&self) -> PricingResult<Vec<GeoZone>> {
        Ok(self.inner.read().await.zones.values().cloned().collect())
    }

    async fn list_mappings(&self) -> PricingResult<Vec<GeoZoneMapping>> {
        Ok(self.inner.read().await.mappings.clone())
    }

    async fn save_zone(&self, zone: &GeoZone) -> PricingResult<()> {
        self.inner.write().await.zones.insert(zone.id, zone.clone());
        Ok(())
    }

    async fn save_mapping(&self, mapping: &GeoZoneMapping) -> PricingResult<()> {
        let mut inner = self.inner.write().await;
        inner.mappings.retain(|m| m.id != mapping.id);
        inner.mappings.push(mapping.clone());
        Ok(())
    }
}

#[async_trait]
impl SegmentRepository for MemoryStore {
    async fn get_segment(&self, id: Uuid) -> PricingResult<Option<UserSegment>> {
        Ok(self.inner.read().await.segments.get(&id).cloned())
    }

    async fn default_segment(&self) -> PricingResult<Option<UserSegment>> {
        Ok(self
            .inner
            .read()
            .await
            .segments
            .values()
            .find(|s| s.is_default)
            .cloned())
    }

    async fn list_segments(&self) -> PricingResult<Vec<UserSegment>> {
        Ok(self.inner.read().await.segments.values().cloned().collect())
    }
}

impl MemoryStore {
    /// Segments have no optimistic versioning; admin tooling owns them.
    pub async fn save_segment(&self, segment: &UserSegment) {
        self.inner
            .write()
            .await
            .segments
            .insert(segment.id, segment.clone());
    }
}

#[async_trait]
impl BookRepository for MemoryStore {
    async fn get_book(&self, id: Uuid) -> PricingResult<Option<PriceBook>> {
        Ok(self.inner.read().await.books.get(&id).cloned())
    }

    async fn list_books(&self) -> PricingResult<Vec<PriceBook>> {
        Ok(self.inner.read().await.books.values().cloned().collect())
    }

    async fn save_book(&self, book: &PriceBook, expected_version: i64) -> PricingResult<()> {
        let mut inner = self.inner.write().await;
        match inner.books.get(&book.id) {
            Some(stored) if stored.version != expected_version => {
                return Err(PricingError::Conflict(format!(
                    "book {} at version {}, write expected {}",
                    book.id, stored.version, expected_version
                )));
            }
            None if expected_version != 0 => {
                return Err(PricingError::Conflict(format!(
                    "book {} does not exist, write expected version {}",
                    book.id, expected_version
                )));
            }
            _ => {}
        }
        let mut next = book.clone();
        next.version = expected_version + 1;
        inner.books.insert(next.id, next);
        Ok(())
    }

    async fn get_entry(&self, book: Uuid, product: Uuid) -> PricingResult<Option<PriceBookEntry>> {
        Ok(self.inner.read().await.entries.get(&(book, product)).cloned())
    }

    async fn list_entries(&self) -> PricingResult<Vec<PriceBookEntry>> {
        Ok(self.inner.read().await.entries.values().cloned().collect())
    }

    async fn upsert_entry(
        &self,
        entry: &PriceBookEntry,
        expected_version: i64,
    ) -> PricingResult<()> {
        let mut inner = self.inner.write().await;
        let key = (entry.price_book, entry.product);
        match inner.entries.get(&key) {
            Some(stored) if stored.version != expected_version => {
                return Err(PricingError::Conflict(format!(
                    "entry ({}, {}) at version {}, write expected {}",
                    entry.price_book, entry.product, stored.version, expected_version
                )));
            }
            None if expected_version != 0 => {
                return Err(PricingError::Conflict(format!(
                    "entry ({}, {}) does not exist, write expected version {}",
                    entry.price_book, entry.product, expected_version
                )));
            }
            _ => {}
        }
        let mut next = entry.clone();
        next.version = expected_version + 1;
        inner.entries.insert(key, next);
        Ok(())
    }

    async fn delete_entry(&self, book: Uuid, product: Uuid) -> PricingResult<()> {
        self.inner.write().await.entries.remove(&(book, product));
        Ok(())
    }

    async fn bump_book_version(&self, id: Uuid) -> PricingResult<i64> {
        let mut inner = self.inner.write().await;
        let book = inner
            .books
            .get_mut(&id)
            .ok_or_else(|| PricingError::NotFound(format!("book {}", id)))?;
        book.version += 1;
        Ok(book.version)
    }
}

#[async_trait]
impl ModifierRepository for MemoryStore {
    async fn get_modifier(&self, id: Uuid) -> PricingResult<Option<PriceModifier>> {
        Ok(self.inner.read().await.modifiers.get(&id).cloned())
    }

    async fn list_modifiers(&self) -> PricingResult<Vec<PriceModifier>> {
        Ok(self.inner.read().await.modifiers.values().cloned().collect())
    }

    async fn save_modifier(&self, modifier: &PriceModifier) -> PricingResult<()> {
        self.inner
            .write()
            .await
            .modifiers
            .insert(modifier.id, modifier.clone());
        Ok(())
    }
}
