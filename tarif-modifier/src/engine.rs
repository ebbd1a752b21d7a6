use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::condition::test_conditions;
use crate::modifier::{AppliesOn, ModifierScope, ModifierType, PriceModifier};

/// Everything a modifier may match on. `now` comes in from the caller; the
/// engine itself never reads the clock, so identical contexts give
/// identical results.
#[derive(Debug, Clone)]
pub struct ModifierContext {
    pub now: DateTime<Utc>,
    pub quantity: u32,
    /// Leaf-to-root zone ids; a ZONE modifier matches any link of the chain.
    pub zone_chain: Vec<Uuid>,
    pub segment: Option<Uuid>,
    pub product: Uuid,
    pub category: Option<String>,
    pub pincode: Option<u32>,
}

impl ModifierContext {
    /// The record COMBINATION condition trees evaluate against.
    pub fn eval_record(&self) -> serde_json::Value {
        json!({
            "zone": self.zone_chain.first().map(|z| z.to_string()),
            "category": self.category,
            "segment": self.segment.map(|s| s.to_string()),
            "product": self.product.to_string(),
            "quantity": self.quantity,
            "pincode": self.pincode,
        })
    }
}

/// One line of the audit trail: a modifier that fired, with its incremental
/// effect on the running amount.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedModifier {
    pub modifier_id: Uuid,
    pub name: String,
    pub modifier_type: ModifierType,
    pub applies_on: AppliesOn,
    pub price_before: i64,
    pub price_after: i64,
    pub delta: i64,
}

#[derive(Debug, Clone)]
pub struct ModifierOutcome {
    /// Adjusted unit price (subtotal / quantity, rounded to the cent).
    pub unit_price: i64,
    /// Adjusted subtotal, clamped at zero.
    pub subtotal: i64,
    pub applied: Vec<AppliedModifier>,
    pub warnings: Vec<String>,
}

/// Selects, orders and applies price modifiers.
pub struct ModifierEngine {
    modifiers: Vec<PriceModifier>,
}

impl ModifierEngine {
    pub fn new(modifiers: Vec<PriceModifier>) -> Self {
        Self { modifiers }
    }

    /// Apply matching modifiers to `base_price` (unit, minor units) for
    /// `ctx.quantity` units. Callers reject `quantity == 0` before pricing.
    ///
    /// If any exclusive modifier matches, exactly one is applied: highest
    /// `priority`, ties broken by earliest creation. Otherwise stackables
    /// apply in ascending priority; `UNIT_PRICE` modifiers reference the
    /// original unit price, `SUBTOTAL` modifiers compound against the
    /// running amount. A modifier whose conditions cannot be evaluated is
    /// skipped with a warning; it never aborts the rest.
    pub fn apply(&self, base_price: i64, ctx: &ModifierContext) -> ModifierOutcome {
        let mut warnings = Vec::new();
        let candidates = self.select_candidates(ctx, &mut warnings);

        let (exclusive, stackable): (Vec<&PriceModifier>, Vec<&PriceModifier>) =
            candidates.into_iter().partition(|m| !m.is_stackable);

        let selected: Vec<&PriceModifier> = if let Some(winner) = exclusive
            .into_iter()
            .min_by(|a, b| {
                b.priority
                    .cmp(&a.priority)
                    .then(a.created_at.cmp(&b.created_at))
                    .then(a.id.cmp(&b.id))
            }) {
            tracing::debug!(modifier = %winner.name, "exclusive modifier suppresses stackables");
            vec![winner]
        } else {
            let mut ordered = stackable;
            ordered.sort_by(|a, b| {
                a.priority
                    .cmp(&b.priority)
                    .then(a.created_at.cmp(&b.created_at))
                    .then(a.id.cmp(&b.id))
            });
            ordered
        };

        let qty = i64::from(ctx.quantity);
        let original_unit = base_price;
        let mut running = base_price * qty;
        let mut applied = Vec::with_capacity(selected.len());

        for m in selected {
            let delta = match m.applies_on {
                AppliesOn::UnitPrice => m.delta(original_unit) * qty,
                AppliesOn::Subtotal => m.delta(running),
            };
            let before = running;
            running += delta;
            applied.push(AppliedModifier {
                modifier_id: m.id,
                name: m.name.clone(),
                modifier_type: m.modifier_type,
                applies_on: m.applies_on,
                price_before: before,
                price_after: running,
                delta,
            });
        }

        if running < 0 {
            warnings.push(format!(
                "price clamped at zero (was {} after modifiers)",
                running
            ));
            running = 0;
        }

        ModifierOutcome {
            unit_price: (running as f64 / qty as f64).round() as i64,
            subtotal: running,
            applied,
            warnings,
        }
    }

    fn select_candidates<'a>(
        &'a self,
        ctx: &ModifierContext,
        warnings: &mut Vec<String>,
    ) -> Vec<&'a PriceModifier> {
        let record = ctx.eval_record();
        let mut candidates = Vec::new();

        for m in &self.modifiers {
            if !m.is_active || !m.in_validity_window(ctx.now) || !m.quantity_in_window(ctx.quantity)
            {
                continue;
            }
            let matches = match m.applies_to {
                ModifierScope::Global => true,
                ModifierScope::Zone => m
                    .geo_zone
                    .map(|z| ctx.zone_chain.contains(&z))
                    .unwrap_or(false),
                ModifierScope::Segment => {
                    m.user_segment.is_some() && m.user_segment == ctx.segment
                }
                ModifierScope::Product => m.product == Some(ctx.product),
                ModifierScope::Combination => match &m.conditions {
                    Some(tree) => match test_conditions(tree, &record) {
                        Ok(hit) => hit,
                        Err(e) => {
                            tracing::warn!(modifier = %m.name, error = %e, "condition evaluation failed, skipping");
                            warnings.push(format!("modifier '{}' skipped: {}", m.name, e));
                            false
                        }
                    },
                    // should have been rejected at save time
                    None => {
                        warnings.push(format!(
                            "modifier '{}' skipped: COMBINATION without conditions",
                            m.name
                        ));
                        false
                    }
                },
            };
            if matches {
                candidates.push(m);
            }
        }
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{ConditionNode, Op};
    use chrono::Duration;

    fn ctx(quantity: u32, zone_chain: Vec<Uuid>) -> ModifierContext {
        ModifierContext {
            now: Utc::now(),
            quantity,
            zone_chain,
            segment: None,
            product: Uuid::new_v4(),
            category: Some("GENERAL".to_string()),
            pincode: None,
        }
    }

    fn pct_dec(name: &str, value: f64, priority: i32) -> PriceModifier {
        let mut m = PriceModifier::new(name, ModifierScope::Global, ModifierType::PercentDec, value);
        m.priority = priority;
        m
    }

    #[test]
    fn subtotal_modifiers_compound_sequentially() {
        // 10% then 20% on 100.00 -> 72.00, not 70.00
        let engine = ModifierEngine::new(vec![pct_dec("ten", 10.0, 1), pct_dec("twenty", 20.0, 2)]);
        let out = engine.apply(10000, &ctx(1, vec![]));
        assert_eq!(out.subtotal, 7200);
        assert_eq!(out.unit_price, 7200);
        assert_eq!(out.applied.len(), 2);
    }

    #[test]
    fn unit_price_modifiers_reference_the_original_unit() {
        let mut a = pct_dec("a", 10.0, 1);
        a.applies_on = AppliesOn::UnitPrice;
        let mut b = pct_dec("b", 10.0, 2);
        b.applies_on = AppliesOn::UnitPrice;
        let engine = ModifierEngine::new(vec![a, b]);

        // each takes 10% of the original 100.00: 80.00, not 81.00
        let out = engine.apply(10000, &ctx(1, vec![]));
        assert_eq!(out.subtotal, 8000);
    }

    #[test]
    fn stackables_apply_in_ascending_priority() {
        let engine = ModifierEngine::new(vec![pct_dec("second", 15.0, 2), pct_dec("first", 10.0, 1)]);
        let out = engine.apply(10000, &ctx(1, vec![]));
        assert_eq!(out.applied[0].name, "first");
        assert_eq!(out.applied[1].name, "second");
        // 100 * 0.9 * 0.85 = 76.50
        assert_eq!(out.subtotal, 7650);
    }

    #[test]
    fn exclusive_suppresses_all_stackables() {
        let mut exclusive = pct_dec("exclusive", 5.0, 0);
        exclusive.is_stackable = false;
        let engine = ModifierEngine::new(vec![pct_dec("stack", 50.0, 10), exclusive]);

        let out = engine.apply(10000, &ctx(1, vec![]));
        assert_eq!(out.applied.len(), 1);
        assert_eq!(out.applied[0].name, "exclusive");
        assert_eq!(out.subtotal, 9500);
    }

    #[test]
    fn exclusive_picks_highest_priority_then_earliest_creation() {
        let mut low = pct_dec("low", 5.0, 1);
        low.is_stackable = false;
        let mut high = pct_dec("high", 10.0, 9);
        high.is_stackable = false;
        let mut older = pct_dec("older", 20.0, 9);
        older.is_stackable = false;
        older.created_at = Utc::now() - Duration::days(10);

        let engine = ModifierEngine::new(vec![low, high, older]);
        let out = engine.apply(10000, &ctx(1, vec![]));
        assert_eq!(out.applied.len(), 1);
        // priority 9 beats 1; among the two nines, the older one wins
        assert_eq!(out.applied[0].name, "older");
    }

    #[test]
    fn quantity_window_gates_candidacy() {
        let mut bulk = pct_dec("bulk", 10.0, 1);
        bulk.min_quantity = 10;
        bulk.max_quantity = Some(50);
        let engine = ModifierEngine::new(vec![bulk]);

        assert!(engine.apply(10000, &ctx(9, vec![])).applied.is_empty());
        assert_eq!(engine.apply(10000, &ctx(10, vec![])).applied.len(), 1);
        assert_eq!(engine.apply(10000, &ctx(50, vec![])).applied.len(), 1);
        assert!(engine.apply(10000, &ctx(51, vec![])).applied.is_empty());
    }

    #[test]
    fn zone_modifier_matches_self_and_descendants() {
        let us = Uuid::new_v4();
        let ny = Uuid::new_v4();
        let nyc = Uuid::new_v4();
        let mut m = PriceModifier::new("NY deal", ModifierScope::Zone, ModifierType::PercentDec, 10.0);
        m.geo_zone = Some(ny);
        let engine = ModifierEngine::new(vec![m]);

        // context in NYC, chain [NYC, NY, US]: NY modifier applies
        let out = engine.apply(10000, &ctx(1, vec![nyc, ny, us]));
        assert_eq!(out.applied.len(), 1);

        // context in a different state: no match
        let out = engine.apply(10000, &ctx(1, vec![Uuid::new_v4(), us]));
        assert!(out.applied.is_empty());
    }

    #[test]
    fn expired_and_future_modifiers_are_not_candidates() {
        let mut expired = pct_dec("expired", 10.0, 1);
        expired.valid_to = Some(Utc::now() - Duration::days(1));
        let mut future = pct_dec("future", 10.0, 1);
        future.valid_from = Some(Utc::now() + Duration::days(1));
        let engine = ModifierEngine::new(vec![expired, future]);

        assert!(engine.apply(10000, &ctx(1, vec![])).applied.is_empty());
    }

    #[test]
    fn malformed_condition_skips_with_warning_and_others_still_apply() {
        let mut broken = PriceModifier::new(
            "broken",
            ModifierScope::Combination,
            ModifierType::PercentDec,
            50.0,
        );
        broken.conditions = Some(ConditionNode::Leaf {
            field: "weather".into(),
            operator: Op::Equals,
            value: serde_json::json!("sunny"),
        });
        let engine = ModifierEngine::new(vec![broken, pct_dec("good", 10.0, 1)]);

        let out = engine.apply(10000, &ctx(1, vec![]));
        assert_eq!(out.applied.len(), 1);
        assert_eq!(out.applied[0].name, "good");
        assert_eq!(out.subtotal, 9000);
        assert_eq!(out.warnings.len(), 1);
        assert!(out.warnings[0].contains("broken"));
    }

    #[test]
    fn combination_tree_matches_on_the_context_record() {
        let mut combo = PriceModifier::new(
            "bulk apparel",
            ModifierScope::Combination,
            ModifierType::PercentDec,
            10.0,
        );
        combo.conditions = Some(ConditionNode::All(vec![
            ConditionNode::Leaf {
                field: "category".into(),
                operator: Op::Equals,
                value: serde_json::json!("GENERAL"),
            },
            ConditionNode::Leaf {
                field: "quantity".into(),
                operator: Op::Gte,
                value: serde_json::json!(5),
            },
        ]));
        let engine = ModifierEngine::new(vec![combo]);

        assert_eq!(engine.apply(10000, &ctx(5, vec![])).applied.len(), 1);
        assert!(engine.apply(10000, &ctx(4, vec![])).applied.is_empty());
    }

    #[test]
    fn final_price_is_clamped_at_zero_with_a_warning() {
        let big = PriceModifier::new("huge", ModifierScope::Global, ModifierType::FixedDec, 99999.0);
        let engine = ModifierEngine::new(vec![big]);

        let out = engine.apply(10000, &ctx(1, vec![]));
        assert_eq!(out.subtotal, 0);
        assert!(out.warnings.iter().any(|w| w.contains("clamped")));
    }

    #[test]
    fn quantity_scales_the_subtotal() {
        let engine = ModifierEngine::new(vec![pct_dec("ten", 10.0, 1)]);
        let out = engine.apply(10000, &ctx(3, vec![]));
        // 300.00 - 10% = 270.00, unit 90.00
        assert_eq!(out.subtotal, 27000);
        assert_eq!(out.unit_price, 9000);
    }

    #[test]
    fn identical_inputs_give_identical_outcomes() {
        let mods = vec![pct_dec("a", 10.0, 1), pct_dec("b", 15.0, 2)];
        let engine = ModifierEngine::new(mods);
        let fixed = ctx(2, vec![]);

        let one = engine.apply(10000, &fixed);
        let two = engine.apply(10000, &fixed);
        assert_eq!(one.subtotal, two.subtotal);
        assert_eq!(
            one.applied.iter().map(|a| a.modifier_id).collect::<Vec<_>>(),
            two.applied.iter().map(|a| a.modifier_id).collect::<Vec<_>>()
        );
    }
}
