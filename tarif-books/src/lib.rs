pub mod book;
pub mod conflict;
pub mod entry;
pub mod hierarchy;
pub mod repository;

pub use book::{validate_parent, CalculationLogic, PriceBook, PriceBookEntry};
pub use conflict::{
    apply_strategy, detect_conflicts, ConflictCheckRequest, ConflictService, ConflictStrategy,
    PriceConflict,
};
pub use entry::{entry_for, ResolvedEntry};
pub use hierarchy::{BookIndex, BookMatch, MatchRung};
pub use repository::BookRepository;
