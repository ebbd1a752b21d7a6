use std::sync::Arc;

use chrono::{DateTime, Utc};
use tarif_books::{entry_for, BookIndex, BookRepository, MatchRung};
use tarif_core::{
    AuditEntry, AuditSink, PricingError, PricingResult, ProductAvailability, ProductCatalog,
    SegmentRepository, TaxEngine, UserDirectory,
};
use tarif_geo::{GeoZone, ZoneIndex, ZoneRepository};
use tarif_modifier::{ModifierContext, ModifierEngine, ModifierRepository};
use tarif_shared::QuoteResolvedEvent;
use tarif_store::ResolutionCache;
use uuid::Uuid;

use crate::quote::{BatchRequest, BookRef, Location, Quote, ResolveContext};

/// Read snapshot used for one resolution (or one batch). Loaded once, then
/// everything is pure in-memory computation.
pub(crate) struct Snapshot {
    pub zone_index: ZoneIndex,
    pub book_index: BookIndex,
    pub engine: ModifierEngine,
}

/// The public entry point: composes zone resolution, book selection, entry
/// resolution and the modifier engine into a priced quote.
#[derive(Clone)]
pub struct Resolver {
    zones: Arc<dyn ZoneRepository>,
    segments: Arc<dyn SegmentRepository>,
    books: Arc<dyn BookRepository>,
    modifiers: Arc<dyn ModifierRepository>,
    catalog: Arc<dyn ProductCatalog>,
    availability: Arc<dyn ProductAvailability>,
    directory: Arc<dyn UserDirectory>,
    tax: Arc<dyn TaxEngine>,
    audit: Arc<dyn AuditSink>,
    cache: Option<ResolutionCache>,
    quote_ttl_seconds: u64,
    zone_ttl_seconds: u64,
}

impl Resolver {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        zones: Arc<dyn ZoneRepository>,
        segments: Arc<dyn SegmentRepository>,
        books: Arc<dyn BookRepository>,
        modifiers: Arc<dyn ModifierRepository>,
        catalog: Arc<dyn ProductCatalog>,
        availability: Arc<dyn ProductAvailability>,
        directory: Arc<dyn UserDirectory>,
        tax: Arc<dyn TaxEngine>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            zones,
            segments,
            books,
            modifiers,
            catalog,
            availability,
            directory,
            tax,
            audit,
            cache: None,
            quote_ttl_seconds: 300,
            zone_ttl_seconds: 3600,
        }
    }

    pub fn with_cache(mut self, cache: ResolutionCache, quote_ttl: u64, zone_ttl: u64) -> Self {
        self.cache = Some(cache);
        self.quote_ttl_seconds = quote_ttl;
        self.zone_ttl_seconds = zone_ttl;
        self
    }

    pub(crate) async fn snapshot(&self) -> PricingResult<Snapshot> {
        let zone_index =
            ZoneIndex::build(self.zones.list_zones().await?, self.zones.list_mappings().await?)?;
        let book_index =
            BookIndex::build(self.books.list_books().await?, self.books.list_entries().await?)?;
        let engine = ModifierEngine::new(self.modifiers.list_modifiers().await?);
        Ok(Snapshot {
            zone_index,
            book_index,
            engine,
        })
    }

    /// Resolve a single quote. Missing zone or missing master entry is
    /// fatal; cache trouble and non-master layer misses degrade to
    /// warnings on the quote.
    pub async fn resolve(&self, ctx: &ResolveContext) -> PricingResult<Quote> {
        let snapshot = self.snapshot().await?;
        let mut warnings = Vec::new();

        let chain = self.zone_chain(&snapshot, ctx.location, &mut warnings).await?;
        let segment = self.effective_segment(ctx.segment_id, ctx.user_id).await?;
        let leaf_zone = chain.first().map(|z| z.id);
        let pincode = match ctx.location {
            Location::Pincode(p) => Some(p),
            Location::Zone(_) => None,
        };

        if let Some(cached) = self
            .cached_quote(ctx.product_id, leaf_zone, segment, pincode, ctx.quantity, &mut warnings)
            .await
        {
            tracing::debug!(product = %ctx.product_id, "quote served from cache");
            return Ok(cached);
        }

        let quote = self
            .price(
                &snapshot,
                &chain,
                segment,
                pincode,
                ctx.product_id,
                ctx.quantity,
                ctx.requested_at,
                warnings,
            )
            .await?;

        self.store_quote(&quote, leaf_zone, segment, pincode).await;
        self.audit_quote(&quote);
        Ok(quote)
    }

    /// Resolve many products for one (location, segment) in a single pass:
    /// the zone chain and segment are resolved once, then per-product work
    /// fans out concurrently over the shared snapshot.
    pub async fn batch_resolve(&self, req: &BatchRequest) -> PricingResult<Vec<PricingResult<Quote>>> {
        let snapshot = Arc::new(self.snapshot().await?);
        let mut shared_warnings = Vec::new();
        let chain =
            Arc::new(self.zone_chain(&snapshot, req.location, &mut shared_warnings).await?);
        let segment = self.effective_segment(req.segment_id, req.user_id).await?;
        let pincode = match req.location {
            Location::Pincode(p) => Some(p),
            Location::Zone(_) => None,
        };

        let mut handles = Vec::with_capacity(req.items.len());
        for item in &req.items {
            let this = self.clone();
            let snapshot = Arc::clone(&snapshot);
            let chain = Arc::clone(&chain);
            let warnings = shared_warnings.clone();
            let (product, quantity, at) = (item.product_id, item.quantity, req.requested_at);
            handles.push(tokio::spawn(async move {
                this.price(&snapshot, &chain, segment, pincode, product, quantity, at, warnings)
                    .await
            }));
        }

        let mut quotes = Vec::with_capacity(handles.len());
        for handle in handles {
            let result = handle
                .await
                .map_err(|e| PricingError::Config(format!("batch task failed: {}", e)))?;
            if let Ok(quote) = &result {
                self.audit_quote(quote);
            }
            quotes.push(result);
        }
        Ok(quotes)
    }

    async fn zone_chain(
        &self,
        snapshot: &Snapshot,
        location: Location,
        warnings: &mut Vec<String>,
    ) -> PricingResult<Vec<GeoZone>> {
        match location {
            Location::Zone(id) => snapshot.zone_index.ancestors_of(id),
            Location::Pincode(pincode) => {
                if let Some(cache) = &self.cache {
                    match cache.get_zone_chain(pincode).await {
                        Ok(Some(json)) => {
                            if let Ok(chain) = serde_json::from_str::<Vec<GeoZone>>(&json) {
                                return Ok(chain);
                            }
                            warnings.push("cached zone chain unreadable, recomputing".to_string());
                        }
                        Ok(None) => {}
                        Err(e) => warnings.push(format!("zone cache read failed: {}", e)),
                    }
                }
                let chain = snapshot.zone_index.resolve_path(pincode)?;
                if let Some(cache) = &self.cache {
                    let json = serde_json::to_string(&chain).unwrap_or_default();
                    if let Err(e) = cache.set_zone_chain(pincode, &json, self.zone_ttl_seconds).await
                    {
                        warnings.push(format!("zone cache write failed: {}", e));
                    }
                }
                Ok(chain)
            }
        }
    }

    /// Explicit segment wins; otherwise the user directory is consulted,
    /// then the default segment.
    async fn effective_segment(
        &self,
        requested: Option<Uuid>,
        user: Option<Uuid>,
    ) -> PricingResult<Option<Uuid>> {
        if let Some(id) = requested {
            return Ok(Some(id));
        }
        if let Some(user_id) = user {
            if let Some(segment) = self.directory.segment_of(user_id).await? {
                return Ok(Some(segment));
            }
        }
        Ok(self.segments.default_segment().await?.map(|s| s.id))
    }

    #[allow(clippy::too_many_arguments)]
    async fn price(
        &self,
        snapshot: &Snapshot,
        chain: &[GeoZone],
        segment: Option<Uuid>,
        pincode: Option<u32>,
        product: Uuid,
        quantity: u32,
        requested_at: DateTime<Utc>,
        mut warnings: Vec<String>,
    ) -> PricingResult<Quote> {
        if quantity == 0 {
            return Err(PricingError::Validation(
                "quantity must be at least 1".to_string(),
            ));
        }
        let matched = snapshot.book_index.applicable_book(chain, segment)?;
        let entry = entry_for(&snapshot.book_index, &matched.book, product)?;
        warnings.extend(entry.warnings.iter().cloned());

        let leaf_zone = chain
            .first()
            .map(|z| z.id)
            .ok_or_else(|| PricingError::NotFound("empty zone chain".to_string()))?;

        let info = self.catalog.product_info(product).await?;
        if !info.is_active {
            return Err(PricingError::Unavailable {
                product,
                zone: leaf_zone,
                reason: "product inactive".to_string(),
            });
        }
        let availability = self.availability.availability(product, leaf_zone).await?;
        if !availability.is_sellable {
            return Err(PricingError::Unavailable {
                product,
                zone: leaf_zone,
                reason: availability
                    .reason
                    .unwrap_or_else(|| "not sellable in zone".to_string()),
            });
        }

        let outcome = snapshot.engine.apply(
            entry.base_price,
            &ModifierContext {
                now: requested_at,
                quantity,
                zone_chain: chain.iter().map(|z| z.id).collect(),
                segment,
                product,
                category: Some(info.category),
                pincode,
            },
        );
        warnings.extend(outcome.warnings);

        // external post-processing hook; the quote stays pre-tax
        if let Err(e) = self.tax.with_tax(outcome.subtotal).await {
            warnings.push(format!("tax hook failed: {}", e));
        }

        let mut book_chain = vec![BookRef {
            book_id: matched.book.id,
            name: matched.book.name.clone(),
            rung: matched.rung,
        }];
        if entry.source_book != matched.book.id {
            if let Some(source) = snapshot.book_index.book(entry.source_book) {
                book_chain.push(BookRef {
                    book_id: source.id,
                    name: source.name.clone(),
                    rung: if source.is_master {
                        MatchRung::Master
                    } else {
                        matched.rung
                    },
                });
            }
        }

        tracing::info!(
            %product,
            quantity,
            unit_price = outcome.unit_price,
            subtotal = outcome.subtotal,
            book = %matched.book.name,
            modifiers = outcome.applied.len(),
            "quote resolved"
        );

        Ok(Quote {
            product_id: product,
            zone_id: Some(leaf_zone),
            segment_id: segment,
            quantity,
            unit_price: outcome.unit_price,
            subtotal: outcome.subtotal,
            currency: matched.book.currency.clone(),
            applied_modifiers: outcome.applied,
            resolved_book_chain: book_chain,
            warnings,
            resolved_at: requested_at,
        })
    }

    async fn cached_quote(
        &self,
        product: Uuid,
        zone: Option<Uuid>,
        segment: Option<Uuid>,
        pincode: Option<u32>,
        quantity: u32,
        warnings: &mut Vec<String>,
    ) -> Option<Quote> {
        let cache = self.cache.as_ref()?;
        match cache.get_quote(product, zone, segment, pincode, quantity).await {
            Ok(Some(json)) => serde_json::from_str(&json).ok(),
            Ok(None) => None,
            Err(e) => {
                warnings.push(format!("quote cache read failed: {}", e));
                None
            }
        }
    }

    async fn store_quote(
        &self,
        quote: &Quote,
        zone: Option<Uuid>,
        segment: Option<Uuid>,
        pincode: Option<u32>,
    ) {
        if let Some(cache) = &self.cache {
            let json = match serde_json::to_string(quote) {
                Ok(j) => j,
                Err(_) => return,
            };
            if let Err(e) = cache
                .set_quote(
                    quote.product_id,
                    zone,
                    segment,
                    pincode,
                    quote.quantity,
                    &json,
                    self.quote_ttl_seconds,
                )
                .await
            {
                tracing::warn!(error = %e, "quote cache write failed");
            }
        }
    }

    /// Append an audit event off the critical path. Failure is logged and
    /// never fails the quote.
    fn audit_quote(&self, quote: &Quote) {
        let event = QuoteResolvedEvent {
            product_id: quote.product_id,
            zone_id: quote.zone_id,
            segment_id: quote.segment_id,
            quantity: quote.quantity,
            unit_price: quote.unit_price,
            subtotal: quote.subtotal,
            currency: quote.currency.clone(),
            applied_modifier_ids: quote.applied_modifiers.iter().map(|a| a.modifier_id).collect(),
            warning_count: quote.warnings.len(),
            timestamp: quote.resolved_at.timestamp(),
        };
        let sink = Arc::clone(&self.audit);
        tokio::spawn(async move {
            let entry = AuditEntry {
                kind: "quote.resolved".to_string(),
                payload: serde_json::to_value(&event).unwrap_or_default(),
                at: Utc::now(),
            };
            if let Err(e) = sink.append(entry).await {
                tracing::warn!(error = %e, "audit append failed");
            }
        });
    }
}
