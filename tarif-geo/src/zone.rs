use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Hierarchy levels, most specific last.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ZoneLevel {
    Country,
    State,
    City,
    Zip,
}

/// A geographic zone. Zones form a tree via `parent_zone`; cycle rejection
/// happens at write time so resolution can walk parents unguarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoZone {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub level: ZoneLevel,
    pub parent_zone: Option<Uuid>,
    pub currency: String,
    pub is_active: bool,
}

impl GeoZone {
    pub fn new(name: &str, code: &str, level: ZoneLevel, parent_zone: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            code: code.to_string(),
            level,
            parent_zone,
            currency: "USD".to_string(),
            is_active: true,
        }
    }
}

/// An inclusive pincode range mapped onto a zone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoZoneMapping {
    pub id: Uuid,
    pub geo_zone: Uuid,
    pub pincode_start: u32,
    pub pincode_end: u32,
    pub created_at: DateTime<Utc>,
}

impl GeoZoneMapping {
    pub fn new(geo_zone: Uuid, pincode_start: u32, pincode_end: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            geo_zone,
            pincode_start,
            pincode_end,
            created_at: Utc::now(),
        }
    }

    pub fn contains(&self, pincode: u32) -> bool {
        self.pincode_start <= pincode && pincode <= self.pincode_end
    }

    /// Range width, used for smallest-range-wins tie breaking.
    pub fn span(&self) -> u32 {
        self.pincode_end - self.pincode_start
    }
}
