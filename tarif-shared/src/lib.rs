pub mod models;

pub use models::events::{CacheInvalidatedEvent, ConflictResolvedEvent, QuoteResolvedEvent};
