pub mod admin;
pub mod quote;
pub mod resolver;

pub use admin::AdminService;
pub use quote::{BatchItem, BatchRequest, BookRef, Location, Quote, ResolveContext, StorefrontQuote};
pub use resolver::Resolver;
