use tarif_core::{PricingError, PricingResult};
use uuid::Uuid;

use crate::book::{CalculationLogic, PriceBook, MAX_BOOK_DEPTH};
use crate::hierarchy::BookIndex;

/// The outcome of base-price resolution for (book, product).
#[derive(Debug, Clone)]
pub struct ResolvedEntry {
    pub base_price: i64,
    pub compare_at_price: Option<i64>,
    /// The book whose stored entry supplied the price.
    pub source_book: Uuid,
    /// Non-fatal layer misses, surfaced on the quote.
    pub warnings: Vec<String>,
}

/// Resolve the base price for a product under a book.
///
/// Physical books read their own entry, then fall back through the parent
/// chain and finally the master. Virtual books merge layers per
/// `calculation_logic`: an override entry at a more specific layer fully
/// replaces the master price; absence inherits from the next layer up.
/// A miss at a non-master layer is a warning; a miss at master is fatal.
pub fn entry_for(index: &BookIndex, book: &PriceBook, product: Uuid) -> PricingResult<ResolvedEntry> {
    if book.is_virtual {
        resolve_virtual(index, book, product)
    } else {
        resolve_physical(index, book, product)
    }
}

fn resolve_physical(
    index: &BookIndex,
    book: &PriceBook,
    product: Uuid,
) -> PricingResult<ResolvedEntry> {
    let mut warnings = Vec::new();
    let mut cursor = Some(book.id);
    let mut depth = 0usize;

    while let Some(id) = cursor {
        if depth > MAX_BOOK_DEPTH {
            return Err(PricingError::Config(format!(
                "parent chain of book {} exceeds depth {}",
                book.id, MAX_BOOK_DEPTH
            )));
        }
        let current = index
            .book(id)
            .ok_or_else(|| PricingError::Config(format!("book {} references missing book {}", book.id, id)))?;
        if let Some(entry) = index.entry(id, product) {
            return Ok(ResolvedEntry {
                base_price: entry.base_price,
                compare_at_price: entry.compare_at_price,
                source_book: id,
                warnings,
            });
        }
        warnings.push(format!(
            "no entry for product {} in book '{}', falling back",
            product, current.name
        ));
        cursor = current.parent_book;
        depth += 1;
    }

    // chain exhausted without reaching master explicitly
    let master = index.master();
    if let Some(entry) = index.entry(master.id, product) {
        return Ok(ResolvedEntry {
            base_price: entry.base_price,
            compare_at_price: entry.compare_at_price,
            source_book: master.id,
            warnings,
        });
    }
    Err(PricingError::NotFound(format!(
        "no master entry for product {}",
        product
    )))
}

fn resolve_virtual(
    index: &BookIndex,
    book: &PriceBook,
    product: Uuid,
) -> PricingResult<ResolvedEntry> {
    let mut warnings = Vec::new();

    for layer in layer_books(index, book) {
        if let Some(entry) = index.entry(layer.id, product) {
            return Ok(ResolvedEntry {
                base_price: entry.base_price,
                compare_at_price: entry.compare_at_price,
                source_book: layer.id,
                warnings,
            });
        }
        warnings.push(format!(
            "no entry for product {} in layer book '{}', inheriting",
            product, layer.name
        ));
    }

    let master = index.master();
    if let Some(entry) = index.entry(master.id, product) {
        return Ok(ResolvedEntry {
            base_price: entry.base_price,
            compare_at_price: entry.compare_at_price,
            source_book: master.id,
            warnings,
        });
    }
    Err(PricingError::NotFound(format!(
        "no master entry for product {}",
        product
    )))
}

/// Override layers for a virtual book, most specific first, master excluded
/// (master is the terminal fallback in the callers above).
pub(crate) fn layer_books(index: &BookIndex, book: &PriceBook) -> Vec<PriceBook> {
    let zone_seg = || physical_scoped(index, book.zone, book.segment);
    let zone_only = || book.zone.and_then(|_| physical_scoped(index, book.zone, None));
    let seg_only = || book.segment.and_then(|_| physical_scoped(index, None, book.segment));

    match book.calculation_logic {
        CalculationLogic::MasterOnly => Vec::new(),
        CalculationLogic::MasterPlusZone => zone_only().into_iter().collect(),
        CalculationLogic::MasterPlusSegment => seg_only().into_iter().collect(),
        CalculationLogic::MasterPlusBoth => {
            let mut layers = Vec::new();
            if book.zone.is_some() && book.segment.is_some() {
                layers.extend(zone_seg());
            }
            layers.extend(zone_only());
            layers.extend(seg_only());
            layers
        }
        CalculationLogic::Custom => {
            // every compatible physical override, highest priority first
            let mut candidates: Vec<PriceBook> = index
                .books()
                .filter(|b| {
                    b.is_active
                        && !b.is_master
                        && !b.is_virtual
                        && b.is_override
                        && (b.zone.is_none() || b.zone == book.zone)
                        && (b.segment.is_none() || b.segment == book.segment)
                })
                .cloned()
                .collect();
            candidates.sort_by(|a, b| {
                b.override_priority
                    .cmp(&a.override_priority)
                    .then(a.created_at.cmp(&b.created_at))
                    .then(a.id.cmp(&b.id))
            });
            candidates
        }
    }
}

/// Best physical (entry-bearing) book with exactly this scope.
fn physical_scoped(
    index: &BookIndex,
    zone: Option<Uuid>,
    segment: Option<Uuid>,
) -> Option<PriceBook> {
    index
        .books()
        .filter(|b| {
            b.is_active && !b.is_master && !b.is_virtual && b.zone == zone && b.segment == segment
        })
        .min_by(|a, b| {
            b.override_priority
                .cmp(&a.override_priority)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        })
        .cloned()
}
