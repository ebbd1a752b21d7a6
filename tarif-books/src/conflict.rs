use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tarif_core::{PricingError, PricingResult};
use uuid::Uuid;

use crate::book::{PriceBook, PriceBookEntry, MAX_BOOK_DEPTH};
use crate::entry::{entry_for, layer_books};
use crate::hierarchy::BookIndex;
use crate::repository::BookRepository;

/// How a child override reacts to an ancestor price change.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictStrategy {
    /// Discard the child override; the child inherits the new value.
    Overwrite,
    /// Leave the child override untouched.
    Preserve,
    /// Shift the child override by the additive delta (new - old).
    Relative,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictCheckRequest {
    pub zone_id: Option<Uuid>,
    pub segment_id: Option<Uuid>,
    pub product_id: Uuid,
    pub new_price: i64,
    /// The book whose entry is about to change.
    pub update_level: Uuid,
}

/// A downstream book whose observed price would silently change, or whose
/// override diverges further, if the upstream edit commits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceConflict {
    pub book_id: Uuid,
    pub book_name: String,
    pub current_price: i64,
    pub projected_price: i64,
    pub has_override: bool,
}

/// Pure strategy arithmetic. `None` means the override is removed so the
/// child inherits upstream. The delta is additive, never ratio-based, so an
/// old price of zero is not a special case.
pub fn apply_strategy(
    strategy: ConflictStrategy,
    old_price: i64,
    new_price: i64,
    current_override: i64,
) -> Option<i64> {
    match strategy {
        ConflictStrategy::Overwrite => None,
        ConflictStrategy::Preserve => Some(current_override),
        ConflictStrategy::Relative => {
            Some((current_override + (new_price - old_price)).max(0))
        }
    }
}

/// Detect conflicts against a read snapshot. Pure; the async service below
/// wraps it with repository access.
pub fn detect_conflicts(
    index: &BookIndex,
    req: &ConflictCheckRequest,
) -> PricingResult<Vec<PriceConflict>> {
    let update_book = index
        .book(req.update_level)
        .ok_or_else(|| PricingError::NotFound(format!("book {}", req.update_level)))?;

    // projected world: the edit applied
    let mut projected_books: Vec<PriceBook> = index.books().cloned().collect();
    let mut projected_entries: Vec<PriceBookEntry> = projected_books
        .iter()
        .filter_map(|b| index.entry(b.id, req.product_id).cloned())
        .collect();
    match projected_entries
        .iter_mut()
        .find(|e| e.price_book == req.update_level)
    {
        Some(e) => e.base_price = req.new_price,
        None => projected_entries.push(PriceBookEntry::new(
            req.update_level,
            req.product_id,
            req.new_price,
        )),
    }
    projected_books.sort_by_key(|b| b.id);
    let projected = BookIndex::build(projected_books, projected_entries)?;

    let mut conflicts = Vec::new();
    for book in index.books() {
        if book.id == req.update_level || !book.is_active {
            continue;
        }
        if !in_scope(book, req) || !inherits_from(index, book, update_book.id) {
            continue;
        }
        let current = match entry_for(index, book, req.product_id) {
            Ok(r) => r.base_price,
            Err(PricingError::NotFound(_)) => continue,
            Err(e) => return Err(e),
        };
        let projected_price = match entry_for(&projected, book, req.product_id) {
            Ok(r) => r.base_price,
            Err(PricingError::NotFound(_)) => continue,
            Err(e) => return Err(e),
        };
        let has_override = index.entry(book.id, req.product_id).is_some();

        let silently_changes = !has_override && projected_price != current;
        let diverges_further = has_override && current != req.new_price;
        if silently_changes || diverges_further {
            conflicts.push(PriceConflict {
                book_id: book.id,
                book_name: book.name.clone(),
                current_price: current,
                projected_price,
                has_override,
            });
        }
    }
    conflicts.sort_by(|a, b| a.book_name.cmp(&b.book_name).then(a.book_id.cmp(&b.book_id)));
    Ok(conflicts)
}

fn in_scope(book: &PriceBook, req: &ConflictCheckRequest) -> bool {
    let zone_ok = req.zone_id.is_none() || book.zone.is_none() || book.zone == req.zone_id;
    let seg_ok =
        req.segment_id.is_none() || book.segment.is_none() || book.segment == req.segment_id;
    zone_ok && seg_ok
}

/// Does `book` sit at or below `ancestor` in the resolution hierarchy?
/// Physical books inherit through their parent chain; virtual books inherit
/// through their merge layers; everything terminates at master.
fn inherits_from(index: &BookIndex, book: &PriceBook, ancestor: Uuid) -> bool {
    if book.id == ancestor || ancestor == index.master().id {
        return true;
    }
    if book.is_virtual {
        return layer_books(index, book).iter().any(|l| l.id == ancestor);
    }
    let mut cursor = book.parent_book;
    let mut depth = 0usize;
    while let Some(id) = cursor {
        if id == ancestor {
            return true;
        }
        depth += 1;
        if depth > MAX_BOOK_DEPTH {
            return false;
        }
        cursor = index.book(id).and_then(|b| b.parent_book);
    }
    false
}

/// Conflict detection and resolution over the repository. Every touched
/// book's version is bumped so concurrent writers see their reads go stale.
pub struct ConflictService {
    repo: Arc<dyn BookRepository>,
}

impl ConflictService {
    pub fn new(repo: Arc<dyn BookRepository>) -> Self {
        Self { repo }
    }

    pub async fn check_conflicts(
        &self,
        req: &ConflictCheckRequest,
    ) -> PricingResult<Vec<PriceConflict>> {
        let index = BookIndex::build(self.repo.list_books().await?, self.repo.list_entries().await?)?;
        detect_conflicts(&index, req)
    }

    /// Apply a strategy to one child book's override for `product`.
    pub async fn resolve_conflict(
        &self,
        strategy: ConflictStrategy,
        old_price: i64,
        new_price: i64,
        child_book: Uuid,
        product: Uuid,
    ) -> PricingResult<()> {
        let existing = self.repo.get_entry(child_book, product).await?;

        match existing {
            Some(entry) => {
                match apply_strategy(strategy, old_price, new_price, entry.base_price) {
                    None => {
                        self.repo.delete_entry(child_book, product).await?;
                        tracing::info!(book = %child_book, %product, "override discarded (OVERWRITE)");
                    }
                    Some(price) if price != entry.base_price => {
                        let mut updated = entry.clone();
                        updated.base_price = price;
                        self.repo.upsert_entry(&updated, entry.version).await?;
                        tracing::info!(
                            book = %child_book,
                            %product,
                            from = entry.base_price,
                            to = price,
                            "override shifted"
                        );
                    }
                    Some(_) => {}
                }
            }
            // no stored override: nothing to discard or shift
            None => {}
        }

        self.repo.bump_book_version(child_book).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::CalculationLogic;

    #[test]
    fn strategy_arithmetic_matches_the_contract() {
        // master 100.00 -> 120.00, child override at 90.00
        assert_eq!(apply_strategy(ConflictStrategy::Overwrite, 10000, 12000, 9000), None);
        assert_eq!(
            apply_strategy(ConflictStrategy::Preserve, 10000, 12000, 9000),
            Some(9000)
        );
        assert_eq!(
            apply_strategy(ConflictStrategy::Relative, 10000, 12000, 9000),
            Some(11000)
        );
    }

    #[test]
    fn relative_clamps_at_zero_and_survives_zero_old_price() {
        assert_eq!(apply_strategy(ConflictStrategy::Relative, 10000, 100, 500), Some(0));
        // old price of zero is fine because the delta is additive
        assert_eq!(apply_strategy(ConflictStrategy::Relative, 0, 2000, 500), Some(2500));
    }

    #[test]
    fn master_edit_flags_inheriting_and_overriding_books() {
        let product = Uuid::new_v4();
        let master = PriceBook::master("Master", "USD");
        let inheriting = PriceBook::scoped("Inheriting", None, None, master.id);
        let overriding = PriceBook::scoped("Overriding", None, None, master.id);
        let entries = vec![
            PriceBookEntry::new(master.id, product, 10000),
            PriceBookEntry::new(overriding.id, product, 9000),
        ];
        let index = BookIndex::build(
            vec![master.clone(), inheriting.clone(), overriding.clone()],
            entries,
        )
        .unwrap();

        let conflicts = detect_conflicts(
            &index,
            &ConflictCheckRequest {
                zone_id: None,
                segment_id: None,
                product_id: product,
                new_price: 12000,
                update_level: master.id,
            },
        )
        .unwrap();

        assert_eq!(conflicts.len(), 2);
        let inh = conflicts.iter().find(|c| c.book_id == inheriting.id).unwrap();
        assert!(!inh.has_override);
        assert_eq!(inh.current_price, 10000);
        assert_eq!(inh.projected_price, 12000);

        let ovr = conflicts.iter().find(|c| c.book_id == overriding.id).unwrap();
        assert!(ovr.has_override);
        assert_eq!(ovr.current_price, 9000);
        assert_eq!(ovr.projected_price, 9000);
    }

    #[test]
    fn edit_matching_the_override_is_not_a_conflict() {
        let product = Uuid::new_v4();
        let master = PriceBook::master("Master", "USD");
        let child = PriceBook::scoped("Child", None, None, master.id);
        let entries = vec![
            PriceBookEntry::new(master.id, product, 10000),
            PriceBookEntry::new(child.id, product, 12000),
        ];
        let index = BookIndex::build(vec![master.clone(), child], entries).unwrap();

        // new upstream price equals the child's override: converging, not diverging
        let conflicts = detect_conflicts(
            &index,
            &ConflictCheckRequest {
                zone_id: None,
                segment_id: None,
                product_id: product,
                new_price: 12000,
                update_level: master.id,
            },
        )
        .unwrap();
        assert!(conflicts.is_empty());
    }

    #[test]
    fn virtual_book_over_an_edited_layer_is_flagged() {
        let product = Uuid::new_v4();
        let zone = Uuid::new_v4();
        let master = PriceBook::master("Master", "USD");
        let zone_book = PriceBook::scoped("Zone", Some(zone), None, master.id);
        let vbook =
            PriceBook::virtual_book("Virtual", Some(zone), None, CalculationLogic::MasterPlusZone);
        let entries = vec![
            PriceBookEntry::new(master.id, product, 10000),
            PriceBookEntry::new(zone_book.id, product, 9000),
        ];
        let index = BookIndex::build(
            vec![master, zone_book.clone(), vbook.clone()],
            entries,
        )
        .unwrap();

        let conflicts = detect_conflicts(
            &index,
            &ConflictCheckRequest {
                zone_id: Some(zone),
                segment_id: None,
                product_id: product,
                new_price: 9500,
                update_level: zone_book.id,
            },
        )
        .unwrap();

        let v = conflicts.iter().find(|c| c.book_id == vbook.id).unwrap();
        assert!(!v.has_override);
        assert_eq!(v.current_price, 9000);
        assert_eq!(v.projected_price, 9500);
    }

    #[test]
    fn unrelated_sibling_zone_book_is_not_flagged() {
        let product = Uuid::new_v4();
        let zone_a = Uuid::new_v4();
        let zone_b = Uuid::new_v4();
        let master = PriceBook::master("Master", "USD");
        let book_a = PriceBook::scoped("A", Some(zone_a), None, master.id);
        let book_b = PriceBook::scoped("B", Some(zone_b), None, master.id);
        let entries = vec![
            PriceBookEntry::new(master.id, product, 10000),
            PriceBookEntry::new(book_a.id, product, 9000),
            PriceBookEntry::new(book_b.id, product, 8000),
        ];
        let index = BookIndex::build(vec![master, book_a.clone(), book_b.clone()], entries).unwrap();

        // editing A's entry: B neither inherits from A nor shares its scope
        let conflicts = detect_conflicts(
            &index,
            &ConflictCheckRequest {
                zone_id: Some(zone_a),
                segment_id: None,
                product_id: product,
                new_price: 9500,
                update_level: book_a.id,
            },
        )
        .unwrap();
        assert!(conflicts.iter().all(|c| c.book_id != book_b.id));
    }
}
