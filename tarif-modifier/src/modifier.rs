use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tarif_core::{PricingError, PricingResult};
use uuid::Uuid;

use crate::condition::{validate_conditions, ConditionNode};

/// What a modifier's scope is keyed on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModifierScope {
    Global,
    Zone,
    Segment,
    Product,
    Combination,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModifierType {
    PercentDec,
    PercentInc,
    FixedDec,
    FixedInc,
}

/// Which amount a modifier's delta is computed against.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppliesOn {
    /// Delta against the original, unvaried unit price.
    UnitPrice,
    /// Delta against the running amount after prior modifiers.
    Subtotal,
}

/// A discount/markup rule. Time-boxed via `valid_from`/`valid_to`, scoped
/// via `applies_to`, ordered via `priority`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceModifier {
    pub id: Uuid,
    pub name: String,
    pub applies_to: ModifierScope,
    pub modifier_type: ModifierType,
    /// Percent types read this as a percentage; fixed types as minor units.
    pub value: f64,
    pub geo_zone: Option<Uuid>,
    pub user_segment: Option<Uuid>,
    pub product: Option<Uuid>,
    pub conditions: Option<ConditionNode>,
    pub min_quantity: u32,
    /// `None` means no upper bound.
    pub max_quantity: Option<u32>,
    pub applies_on: AppliesOn,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub is_stackable: bool,
    pub priority: i32,
    pub created_at: DateTime<Utc>,
}

impl PriceModifier {
    pub fn new(name: &str, applies_to: ModifierScope, modifier_type: ModifierType, value: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            applies_to,
            modifier_type,
            value,
            geo_zone: None,
            user_segment: None,
            product: None,
            conditions: None,
            min_quantity: 1,
            max_quantity: None,
            applies_on: AppliesOn::Subtotal,
            valid_from: None,
            valid_to: None,
            is_active: true,
            is_stackable: true,
            priority: 0,
            created_at: Utc::now(),
        }
    }

    pub fn in_validity_window(&self, now: DateTime<Utc>) -> bool {
        if let Some(from) = self.valid_from {
            if now < from {
                return false;
            }
        }
        if let Some(to) = self.valid_to {
            if now > to {
                return false;
            }
        }
        true
    }

    pub fn quantity_in_window(&self, quantity: u32) -> bool {
        if quantity < self.min_quantity {
            return false;
        }
        match self.max_quantity {
            Some(max) => quantity <= max,
            None => true,
        }
    }

    /// Signed delta in minor units, computed against `reference`.
    pub fn delta(&self, reference: i64) -> i64 {
        match self.modifier_type {
            ModifierType::PercentDec => -((reference as f64 * self.value / 100.0).round() as i64),
            ModifierType::PercentInc => (reference as f64 * self.value / 100.0).round() as i64,
            ModifierType::FixedDec => -(self.value.round() as i64),
            ModifierType::FixedInc => self.value.round() as i64,
        }
    }
}

/// Write-time invariants, enforced before a modifier is saved.
pub fn validate_modifier(m: &PriceModifier) -> PricingResult<()> {
    match m.applies_to {
        ModifierScope::Zone if m.geo_zone.is_none() => {
            return Err(PricingError::Validation(format!(
                "ZONE modifier '{}' has no zone",
                m.name
            )));
        }
        ModifierScope::Segment if m.user_segment.is_none() => {
            return Err(PricingError::Validation(format!(
                "SEGMENT modifier '{}' has no segment",
                m.name
            )));
        }
        ModifierScope::Product if m.product.is_none() => {
            return Err(PricingError::Validation(format!(
                "PRODUCT modifier '{}' has no product",
                m.name
            )));
        }
        ModifierScope::Combination => match &m.conditions {
            None => {
                return Err(PricingError::Validation(format!(
                    "COMBINATION modifier '{}' has no condition tree",
                    m.name
                )));
            }
            Some(tree) => {
                let report = validate_conditions(tree);
                if !report.valid {
                    return Err(PricingError::Validation(format!(
                        "COMBINATION modifier '{}': {}",
                        m.name,
                        report.errors.join("; ")
                    )));
                }
            }
        },
        _ => {}
    }

    if m.min_quantity < 1 {
        return Err(PricingError::Validation(format!(
            "modifier '{}' min_quantity must be >= 1",
            m.name
        )));
    }
    if let Some(max) = m.max_quantity {
        if max < m.min_quantity {
            return Err(PricingError::Validation(format!(
                "modifier '{}' max_quantity {} below min_quantity {}",
                m.name, max, m.min_quantity
            )));
        }
    }
    if m.value < 0.0 {
        return Err(PricingError::Validation(format!(
            "modifier '{}' value must be non-negative",
            m.name
        )));
    }
    if let (Some(from), Some(to)) = (m.valid_from, m.valid_to) {
        if to < from {
            return Err(PricingError::Validation(format!(
                "modifier '{}' validity window inverted",
                m.name
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Op;
    use serde_json::json;

    #[test]
    fn quantity_window_is_inclusive() {
        let mut m = PriceModifier::new("Bulk", ModifierScope::Global, ModifierType::PercentDec, 5.0);
        m.min_quantity = 10;
        m.max_quantity = Some(50);

        assert!(!m.quantity_in_window(9));
        assert!(m.quantity_in_window(10));
        assert!(m.quantity_in_window(50));
        assert!(!m.quantity_in_window(51));
    }

    #[test]
    fn open_ended_validity_windows() {
        let m = PriceModifier::new("Any", ModifierScope::Global, ModifierType::PercentDec, 5.0);
        assert!(m.in_validity_window(Utc::now()));

        let mut boxed = m.clone();
        boxed.valid_from = Some(Utc::now() + chrono::Duration::days(1));
        assert!(!boxed.in_validity_window(Utc::now()));
        boxed.valid_from = Some(Utc::now() - chrono::Duration::days(2));
        boxed.valid_to = Some(Utc::now() - chrono::Duration::days(1));
        assert!(!boxed.in_validity_window(Utc::now()));
    }

    #[test]
    fn delta_math_per_type() {
        let pct_dec = PriceModifier::new("d", ModifierScope::Global, ModifierType::PercentDec, 10.0);
        assert_eq!(pct_dec.delta(10000), -1000);

        let pct_inc = PriceModifier::new("i", ModifierScope::Global, ModifierType::PercentInc, 15.0);
        assert_eq!(pct_inc.delta(10000), 1500);

        let fix_dec = PriceModifier::new("f", ModifierScope::Global, ModifierType::FixedDec, 250.0);
        assert_eq!(fix_dec.delta(10000), -250);

        let fix_inc = PriceModifier::new("g", ModifierScope::Global, ModifierType::FixedInc, 99.0);
        assert_eq!(fix_inc.delta(10000), 99);
    }

    #[test]
    fn scope_invariants_enforced_at_save() {
        let product_without_product =
            PriceModifier::new("p", ModifierScope::Product, ModifierType::PercentDec, 5.0);
        assert!(validate_modifier(&product_without_product).is_err());

        let combo_without_tree =
            PriceModifier::new("c", ModifierScope::Combination, ModifierType::PercentDec, 5.0);
        assert!(validate_modifier(&combo_without_tree).is_err());

        let mut combo_bad_tree = combo_without_tree.clone();
        combo_bad_tree.conditions = Some(ConditionNode::Leaf {
            field: "weather".into(),
            operator: Op::Equals,
            value: json!("sunny"),
        });
        assert!(validate_modifier(&combo_bad_tree).is_err());

        let mut combo_ok = combo_without_tree;
        combo_ok.conditions = Some(ConditionNode::Leaf {
            field: "quantity".into(),
            operator: Op::Gte,
            value: json!(5),
        });
        assert!(validate_modifier(&combo_ok).is_ok());
    }
}
