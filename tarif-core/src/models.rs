use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A customer segment (RETAIL, WHOLESALE, ...). Segment-scoped books and
/// modifiers reference segments by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSegment {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub is_default: bool,
    pub pricing_tier: i32,
}

impl UserSegment {
    pub fn new(code: &str, name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            code: code.to_string(),
            name: name.to_string(),
            is_default: false,
            pricing_tier: 0,
        }
    }
}
