pub mod app_config;
pub mod cache;
pub mod memory;

pub use app_config::{CacheConfig, Config, ResolutionConfig};
pub use cache::ResolutionCache;
pub use memory::MemoryStore;
