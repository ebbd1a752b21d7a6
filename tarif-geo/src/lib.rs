pub mod index;
pub mod repository;
pub mod zone;

pub use index::{validate_mapping, validate_zone_parent, ZoneIndex};
pub use repository::ZoneRepository;
pub use zone::{GeoZone, GeoZoneMapping, ZoneLevel};
