use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tarif_core::{PricingError, PricingResult};
use uuid::Uuid;

/// How a virtual book merges its override layers. Physical books ignore
/// this and resolve through their stored entries and parent chain.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CalculationLogic {
    MasterOnly,
    MasterPlusZone,
    MasterPlusSegment,
    MasterPlusBoth,
    Custom,
}

/// Bound on parent-book chains, enforced at write time.
pub const MAX_BOOK_DEPTH: usize = 8;

/// A price list, optionally scoped to a zone and/or segment. Virtual books
/// store no entries of their own; their prices are computed on demand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceBook {
    pub id: Uuid,
    pub name: String,
    pub currency: String,
    pub is_master: bool,
    pub parent_book: Option<Uuid>,
    pub zone: Option<Uuid>,
    pub segment: Option<Uuid>,
    pub is_virtual: bool,
    pub calculation_logic: CalculationLogic,
    pub override_priority: i32,
    pub is_override: bool,
    /// Bumped on every mutation; writers carry the version they read and
    /// stale writes are rejected with `Conflict`.
    pub version: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl PriceBook {
    pub fn master(name: &str, currency: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            currency: currency.to_string(),
            is_master: true,
            parent_book: None,
            zone: None,
            segment: None,
            is_virtual: false,
            calculation_logic: CalculationLogic::MasterOnly,
            override_priority: 0,
            is_override: false,
            version: 1,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    /// A physical override book scoped to a zone and/or segment.
    pub fn scoped(name: &str, zone: Option<Uuid>, segment: Option<Uuid>, parent: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            currency: "USD".to_string(),
            is_master: false,
            parent_book: Some(parent),
            zone,
            segment,
            is_virtual: false,
            calculation_logic: CalculationLogic::MasterOnly,
            override_priority: 0,
            is_override: true,
            version: 1,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    pub fn virtual_book(
        name: &str,
        zone: Option<Uuid>,
        segment: Option<Uuid>,
        logic: CalculationLogic,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            currency: "USD".to_string(),
            is_master: false,
            parent_book: None,
            zone,
            segment,
            is_virtual: true,
            calculation_logic: logic,
            override_priority: 0,
            is_override: false,
            version: 1,
            is_active: true,
            created_at: Utc::now(),
        }
    }
}

/// A stored price for (book, product). Unique per pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceBookEntry {
    pub id: Uuid,
    pub price_book: Uuid,
    pub product: Uuid,
    /// Minor units (cents).
    pub base_price: i64,
    pub compare_at_price: Option<i64>,
    pub version: i64,
}

impl PriceBookEntry {
    pub fn new(price_book: Uuid, product: Uuid, base_price: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            price_book,
            product,
            base_price,
            compare_at_price: None,
            version: 1,
        }
    }
}

/// Write-time guard: reject a `parent_book` assignment that would create a
/// cycle or exceed the depth bound. Resolution never re-checks.
pub fn validate_parent(
    books: &[PriceBook],
    book_id: Uuid,
    new_parent: Option<Uuid>,
) -> PricingResult<()> {
    let by_id: HashMap<Uuid, &PriceBook> = books.iter().map(|b| (b.id, b)).collect();
    let mut cursor = new_parent;
    let mut depth = 0usize;
    while let Some(id) = cursor {
        if id == book_id {
            return Err(PricingError::Validation(format!(
                "parent assignment would create a cycle through book {}",
                book_id
            )));
        }
        depth += 1;
        if depth >= MAX_BOOK_DEPTH {
            return Err(PricingError::Validation(format!(
                "parent chain exceeds depth {}",
                MAX_BOOK_DEPTH
            )));
        }
        cursor = by_id
            .get(&id)
            .ok_or_else(|| PricingError::Validation(format!("unknown parent book {}", id)))?
            .parent_book;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_cycle_is_rejected_at_write_time() {
        let master = PriceBook::master("Master", "USD");
        let child = PriceBook::scoped("Child", None, None, master.id);
        let books = vec![master.clone(), child.clone()];

        // master -> child closes the loop
        assert!(validate_parent(&books, master.id, Some(child.id)).is_err());
        // a fresh book under child is fine
        assert!(validate_parent(&books, Uuid::new_v4(), Some(child.id)).is_ok());
    }

    #[test]
    fn parent_depth_is_bounded() {
        let mut books = vec![PriceBook::master("Master", "USD")];
        for i in 0..MAX_BOOK_DEPTH {
            let parent = books.last().unwrap().id;
            books.push(PriceBook::scoped(&format!("L{}", i), None, None, parent));
        }
        let deepest = books.last().unwrap().id;
        assert!(validate_parent(&books, Uuid::new_v4(), Some(deepest)).is_err());
    }
}
