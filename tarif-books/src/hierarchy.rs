use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tarif_core::{PricingError, PricingResult};
use tarif_geo::GeoZone;
use uuid::Uuid;

use crate::book::{PriceBook, PriceBookEntry};

/// Which rung of the fallback ladder matched. Recorded on the quote so
/// callers can see why a book was chosen.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchRung {
    ZoneSegment,
    Zone,
    Segment,
    Master,
}

#[derive(Debug, Clone)]
pub struct BookMatch {
    pub book: PriceBook,
    pub rung: MatchRung,
}

/// Read snapshot of books + entries, indexed for resolution. Built once per
/// snapshot; resolution does no store round-trips.
pub struct BookIndex {
    books: HashMap<Uuid, PriceBook>,
    entries: HashMap<(Uuid, Uuid), PriceBookEntry>,
    master: Uuid,
}

impl BookIndex {
    /// Fails with `Config` unless exactly one active master book exists.
    pub fn build(books: Vec<PriceBook>, entries: Vec<PriceBookEntry>) -> PricingResult<Self> {
        let masters: Vec<Uuid> = books
            .iter()
            .filter(|b| b.is_master && b.is_active)
            .map(|b| b.id)
            .collect();
        let master = match masters.as_slice() {
            [one] => *one,
            [] => {
                return Err(PricingError::Config(
                    "no active master price book".to_string(),
                ))
            }
            many => {
                return Err(PricingError::Config(format!(
                    "{} active master price books, expected exactly one",
                    many.len()
                )))
            }
        };

        Ok(Self {
            books: books.into_iter().map(|b| (b.id, b)).collect(),
            entries: entries
                .into_iter()
                .map(|e| ((e.price_book, e.product), e))
                .collect(),
            master,
        })
    }

    pub fn master(&self) -> &PriceBook {
        &self.books[&self.master]
    }

    pub fn book(&self, id: Uuid) -> Option<&PriceBook> {
        self.books.get(&id)
    }

    pub fn books(&self) -> impl Iterator<Item = &PriceBook> {
        self.books.values()
    }

    pub fn entry(&self, book: Uuid, product: Uuid) -> Option<&PriceBookEntry> {
        self.entries.get(&(book, product))
    }

    /// Resolve which book prices a (zone chain, segment) pair.
    ///
    /// Precedence, most specific first: (zone, segment) walking the chain
    /// leaf to root, then zone-only the same way, then segment-only, then
    /// master. First hit wins. Competing books on the same rung are ordered
    /// by descending `override_priority`, then earliest creation, then id.
    pub fn applicable_book(
        &self,
        zone_chain: &[GeoZone],
        segment: Option<Uuid>,
    ) -> PricingResult<BookMatch> {
        if let Some(seg) = segment {
            for zone in zone_chain {
                if let Some(book) = self.scoped_book(Some(zone.id), Some(seg)) {
                    return Ok(BookMatch {
                        book,
                        rung: MatchRung::ZoneSegment,
                    });
                }
            }
        }
        for zone in zone_chain {
            if let Some(book) = self.scoped_book(Some(zone.id), None) {
                return Ok(BookMatch {
                    book,
                    rung: MatchRung::Zone,
                });
            }
        }
        if let Some(seg) = segment {
            if let Some(book) = self.scoped_book(None, Some(seg)) {
                return Ok(BookMatch {
                    book,
                    rung: MatchRung::Segment,
                });
            }
        }
        Ok(BookMatch {
            book: self.master().clone(),
            rung: MatchRung::Master,
        })
    }

    /// Best active non-master book with exactly this (zone, segment) scope.
    pub(crate) fn scoped_book(&self, zone: Option<Uuid>, segment: Option<Uuid>) -> Option<PriceBook> {
        self.books
            .values()
            .filter(|b| b.is_active && !b.is_master && b.zone == zone && b.segment == segment)
            .min_by(|a, b| {
                b.override_priority
                    .cmp(&a.override_priority)
                    .then(a.created_at.cmp(&b.created_at))
                    .then(a.id.cmp(&b.id))
            })
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::CalculationLogic;
    use tarif_geo::{GeoZone, ZoneLevel};

    struct Fixture {
        index: BookIndex,
        chain: Vec<GeoZone>,
        retail: Uuid,
        ny_retail_book: Uuid,
        ny_book: Uuid,
        retail_book: Uuid,
        master: Uuid,
    }

    fn fixture() -> Fixture {
        let us = GeoZone::new("United States", "US", ZoneLevel::Country, None);
        let ny = GeoZone::new("New York", "NY", ZoneLevel::State, Some(us.id));
        let nyc = GeoZone::new("New York City", "NYC", ZoneLevel::City, Some(ny.id));
        let retail = Uuid::new_v4();

        let master = PriceBook::master("Master", "USD");
        let ny_retail = PriceBook::scoped("NY Retail", Some(ny.id), Some(retail), master.id);
        let ny_book = PriceBook::scoped("NY", Some(ny.id), None, master.id);
        let retail_book = PriceBook::scoped("Retail", None, Some(retail), master.id);

        let fixture = Fixture {
            retail,
            ny_retail_book: ny_retail.id,
            ny_book: ny_book.id,
            retail_book: retail_book.id,
            master: master.id,
            chain: vec![nyc, ny, us],
            index: BookIndex::build(vec![master, ny_retail, ny_book, retail_book], vec![])
                .unwrap(),
        };
        fixture
    }

    #[test]
    fn exact_zone_segment_match_wins() {
        let f = fixture();
        let m = f.index.applicable_book(&f.chain, Some(f.retail)).unwrap();
        assert_eq!(m.book.id, f.ny_retail_book);
        assert_eq!(m.rung, MatchRung::ZoneSegment);
    }

    #[test]
    fn zone_only_beats_segment_only() {
        let f = fixture();
        let other_segment = Uuid::new_v4();
        let m = f.index.applicable_book(&f.chain, Some(other_segment)).unwrap();
        assert_eq!(m.book.id, f.ny_book);
        assert_eq!(m.rung, MatchRung::Zone);
    }

    #[test]
    fn segment_only_when_no_zone_book_covers_the_chain() {
        let f = fixture();
        let elsewhere = GeoZone::new("Texas", "TX", ZoneLevel::State, None);
        let m = f
            .index
            .applicable_book(&[elsewhere], Some(f.retail))
            .unwrap();
        assert_eq!(m.book.id, f.retail_book);
        assert_eq!(m.rung, MatchRung::Segment);
    }

    #[test]
    fn master_is_the_final_fallback() {
        let f = fixture();
        let elsewhere = GeoZone::new("Texas", "TX", ZoneLevel::State, None);
        let m = f.index.applicable_book(&[elsewhere], None).unwrap();
        assert_eq!(m.book.id, f.master);
        assert_eq!(m.rung, MatchRung::Master);
    }

    #[test]
    fn leaf_zone_book_beats_ancestor_zone_book() {
        let us = GeoZone::new("United States", "US", ZoneLevel::Country, None);
        let ny = GeoZone::new("New York", "NY", ZoneLevel::State, Some(us.id));
        let master = PriceBook::master("Master", "USD");
        let ny_book = PriceBook::scoped("NY", Some(ny.id), None, master.id);
        let us_book = PriceBook::scoped("US", Some(us.id), None, master.id);
        let index = BookIndex::build(vec![master, ny_book.clone(), us_book], vec![]).unwrap();

        let m = index.applicable_book(&[ny.clone(), us], None).unwrap();
        assert_eq!(m.book.id, ny_book.id);
    }

    #[test]
    fn build_requires_exactly_one_active_master() {
        let a = PriceBook::master("A", "USD");
        let b = PriceBook::master("B", "USD");
        assert!(matches!(
            BookIndex::build(vec![a.clone(), b], vec![]),
            Err(PricingError::Config(_))
        ));
        assert!(matches!(
            BookIndex::build(vec![], vec![]),
            Err(PricingError::Config(_))
        ));
        assert!(BookIndex::build(vec![a], vec![]).is_ok());
    }

    #[test]
    fn same_rung_tie_breaks_on_override_priority() {
        let ny = GeoZone::new("New York", "NY", ZoneLevel::State, None);
        let master = PriceBook::master("Master", "USD");
        let mut low = PriceBook::scoped("Low", Some(ny.id), None, master.id);
        low.override_priority = 1;
        let mut high = PriceBook::scoped("High", Some(ny.id), None, master.id);
        high.override_priority = 5;
        let index = BookIndex::build(vec![master, low, high.clone()], vec![]).unwrap();

        let m = index.applicable_book(&[ny], None).unwrap();
        assert_eq!(m.book.id, high.id);
    }

    #[test]
    fn virtual_books_participate_in_the_ladder() {
        let ny = GeoZone::new("New York", "NY", ZoneLevel::State, None);
        let master = PriceBook::master("Master", "USD");
        let vbook =
            PriceBook::virtual_book("NY Virtual", Some(ny.id), None, CalculationLogic::MasterPlusZone);
        let index = BookIndex::build(vec![master, vbook.clone()], vec![]).unwrap();

        let m = index.applicable_book(&[ny], None).unwrap();
        assert_eq!(m.book.id, vbook.id);
        assert!(m.book.is_virtual);
    }
}
