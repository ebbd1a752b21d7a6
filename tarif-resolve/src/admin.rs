use std::sync::Arc;

use tarif_books::{
    validate_parent, ConflictCheckRequest, ConflictService, ConflictStrategy, PriceBook,
    PriceBookEntry, PriceConflict, BookRepository,
};
use chrono::Utc;
use tarif_core::{AuditEntry, AuditSink, PricingError, PricingResult};
use tarif_shared::{CacheInvalidatedEvent, ConflictResolvedEvent};
use tarif_geo::{validate_mapping, validate_zone_parent, GeoZone, GeoZoneMapping, ZoneRepository};
use tarif_modifier::{
    test_conditions, validate_conditions, validate_modifier, ConditionNode, ConditionReport,
    ModifierRepository, PriceModifier,
};
use tarif_store::ResolutionCache;
use uuid::Uuid;

/// Admin-facing write surface. Every committed write invalidates the
/// affected cache keys before returning, so readers never see a stale
/// price after a write acknowledges.
pub struct AdminService {
    zones: Arc<dyn ZoneRepository>,
    books: Arc<dyn BookRepository>,
    modifiers: Arc<dyn ModifierRepository>,
    conflicts: ConflictService,
    audit: Arc<dyn AuditSink>,
    cache: Option<ResolutionCache>,
}

impl AdminService {
    pub fn new(
        zones: Arc<dyn ZoneRepository>,
        books: Arc<dyn BookRepository>,
        modifiers: Arc<dyn ModifierRepository>,
        audit: Arc<dyn AuditSink>,
        cache: Option<ResolutionCache>,
    ) -> Self {
        Self {
            zones,
            conflicts: ConflictService::new(Arc::clone(&books)),
            books,
            modifiers,
            audit,
            cache,
        }
    }

    pub async fn create_zone(&self, zone: &GeoZone) -> PricingResult<()> {
        let existing = self.zones.list_zones().await?;
        validate_zone_parent(&existing, zone.id, zone.parent_zone)?;
        self.zones.save_zone(zone).await?;
        self.drop_zone_cache().await;
        Ok(())
    }

    pub async fn create_mapping(&self, mapping: &GeoZoneMapping) -> PricingResult<()> {
        let existing = self.zones.list_mappings().await?;
        validate_mapping(&existing, mapping)?;
        self.zones.save_mapping(mapping).await?;
        self.drop_zone_cache().await;
        Ok(())
    }

    /// Create a book. Enforces the single-active-master rule and rejects
    /// parent cycles before anything is stored.
    pub async fn create_price_book(&self, book: &PriceBook) -> PricingResult<()> {
        let existing = self.books.list_books().await?;
        if book.is_master && book.is_active && existing.iter().any(|b| b.is_master && b.is_active) {
            return Err(PricingError::Validation(
                "an active master price book already exists".to_string(),
            ));
        }
        validate_parent(&existing, book.id, book.parent_book)?;
        self.books.save_book(book, 0).await?;
        self.drop_quote_cache().await;
        Ok(())
    }

    pub async fn update_price_book(&self, book: &PriceBook, expected_version: i64) -> PricingResult<()> {
        let existing = self.books.list_books().await?;
        validate_parent(&existing, book.id, book.parent_book)?;
        self.books.save_book(book, expected_version).await?;
        self.drop_quote_cache().await;
        Ok(())
    }

    /// Create an entry. Virtual books never carry stored entries.
    pub async fn create_price_entry(&self, entry: &PriceBookEntry) -> PricingResult<()> {
        let book = self
            .books
            .get_book(entry.price_book)
            .await?
            .ok_or_else(|| PricingError::NotFound(format!("book {}", entry.price_book)))?;
        if book.is_virtual {
            return Err(PricingError::Validation(format!(
                "book '{}' is virtual and cannot hold entries",
                book.name
            )));
        }
        if entry.base_price < 0 {
            return Err(PricingError::Validation("base_price must be >= 0".to_string()));
        }
        self.books.upsert_entry(entry, 0).await?;
        self.books.bump_book_version(book.id).await?;
        self.drop_product_cache(entry.product).await;
        Ok(())
    }

    /// Change a stored price. The caller is expected to have run
    /// `check_conflicts` first and resolved what it chose to.
    pub async fn update_entry_price(
        &self,
        book: Uuid,
        product: Uuid,
        new_price: i64,
        expected_version: i64,
    ) -> PricingResult<()> {
        let mut entry = self
            .books
            .get_entry(book, product)
            .await?
            .ok_or_else(|| PricingError::NotFound(format!("entry ({}, {})", book, product)))?;
        entry.base_price = new_price;
        self.books.upsert_entry(&entry, expected_version).await?;
        self.books.bump_book_version(book).await?;
        self.drop_product_cache(product).await;
        Ok(())
    }

    pub async fn create_modifier(&self, modifier: &PriceModifier) -> PricingResult<()> {
        validate_modifier(modifier)?;
        self.modifiers.save_modifier(modifier).await?;
        self.drop_quote_cache().await;
        Ok(())
    }

    pub async fn check_conflicts(
        &self,
        req: &ConflictCheckRequest,
    ) -> PricingResult<Vec<PriceConflict>> {
        self.conflicts.check_conflicts(req).await
    }

    pub async fn resolve_conflict(
        &self,
        strategy: ConflictStrategy,
        old_price: i64,
        new_price: i64,
        child_book: Uuid,
        product: Uuid,
    ) -> PricingResult<()> {
        self.conflicts
            .resolve_conflict(strategy, old_price, new_price, child_book, product)
            .await?;
        self.drop_product_cache(product).await;

        // with no override left (OVERWRITE), the child inherits the new price
        let resulting_price = self
            .books
            .get_entry(child_book, product)
            .await?
            .map(|e| e.base_price)
            .unwrap_or(new_price);
        self.emit(
            "conflict.resolved",
            serde_json::to_value(ConflictResolvedEvent {
                child_book_id: child_book,
                product_id: product,
                strategy: strategy_name(strategy).to_string(),
                old_price,
                new_price,
                resulting_price,
                timestamp: Utc::now().timestamp(),
            })
            .unwrap_or_default(),
        )
        .await;
        Ok(())
    }

    /// Drop every cached quote and zone chain.
    pub async fn invalidate_cache(&self) -> PricingResult<()> {
        if let Some(cache) = &self.cache {
            cache.invalidate_quotes().await?;
            cache.invalidate_zones().await?;
            self.emit(
                "cache.invalidated",
                serde_json::to_value(CacheInvalidatedEvent {
                    keys: vec!["quote:*".to_string(), "zonechain:*".to_string()],
                    trigger: "manual flush".to_string(),
                    timestamp: Utc::now().timestamp(),
                })
                .unwrap_or_default(),
            )
            .await;
        }
        Ok(())
    }

    /// Structural validation for admin tooling; pure, touches no state.
    pub fn validate_conditions(&self, conditions: &ConditionNode) -> ConditionReport {
        validate_conditions(conditions)
    }

    /// Dry-run a condition tree against an arbitrary context record.
    pub fn test_conditions(
        &self,
        conditions: &ConditionNode,
        context: &serde_json::Value,
    ) -> PricingResult<bool> {
        test_conditions(conditions, context)
            .map_err(|e| PricingError::Validation(e.to_string()))
    }

    /// Append an admin audit event; failures are logged, never propagated.
    async fn emit(&self, kind: &str, payload: serde_json::Value) {
        let entry = AuditEntry {
            kind: kind.to_string(),
            payload,
            at: Utc::now(),
        };
        if let Err(e) = self.audit.append(entry).await {
            tracing::warn!(error = %e, kind, "audit append failed");
        }
    }

    async fn drop_product_cache(&self, product: Uuid) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.invalidate_product(product).await {
                tracing::warn!(error = %e, %product, "cache invalidation failed");
            }
        }
    }

    async fn drop_quote_cache(&self) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.invalidate_quotes().await {
                tracing::warn!(error = %e, "cache invalidation failed");
            }
        }
    }

    async fn drop_zone_cache(&self) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.invalidate_zones().await {
                tracing::warn!(error = %e, "cache invalidation failed");
            }
            if let Err(e) = cache.invalidate_quotes().await {
                tracing::warn!(error = %e, "cache invalidation failed");
            }
        }
    }
}

fn strategy_name(strategy: ConflictStrategy) -> &'static str {
    match strategy {
        ConflictStrategy::Overwrite => "OVERWRITE",
        ConflictStrategy::Preserve => "PRESERVE",
        ConflictStrategy::Relative => "RELATIVE",
    }
}
