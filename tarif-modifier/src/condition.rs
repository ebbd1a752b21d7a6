use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Leaf operators. `In` expects an array value; `Gte`/`Lte` expect numbers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Op {
    Equals,
    NotEquals,
    In,
    Gte,
    Lte,
}

/// Condition expression tree for COMBINATION modifiers. Admin tooling stores
/// these as JSON blobs; they deserialize straight into this AST.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConditionNode {
    All(Vec<ConditionNode>),
    Any(Vec<ConditionNode>),
    Leaf {
        field: String,
        operator: Op,
        value: Value,
    },
}

/// Fields a condition may reference. Unknown fields fail validation at save
/// time and evaluation at resolve time.
pub const KNOWN_FIELDS: &[&str] = &["zone", "category", "segment", "product", "quantity", "pincode"];

/// Structural validation outcome, returned to admin callers verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Runtime evaluation failure. The engine skips the owning modifier with a
/// warning instead of aborting the resolution.
#[derive(Debug, thiserror::Error)]
pub enum ConditionError {
    #[error("unknown condition field '{0}'")]
    UnknownField(String),

    #[error("malformed condition value: {0}")]
    Malformed(String),
}

/// Structural well-formedness check, run at modifier-save time so malformed
/// trees never reach resolution. Side-effect free; collects every problem
/// rather than stopping at the first.
pub fn validate_conditions(node: &ConditionNode) -> ConditionReport {
    let mut errors = Vec::new();
    walk(node, &mut errors);
    ConditionReport {
        valid: errors.is_empty(),
        errors,
    }
}

fn walk(node: &ConditionNode, errors: &mut Vec<String>) {
    match node {
        ConditionNode::All(children) | ConditionNode::Any(children) => {
            if children.is_empty() {
                errors.push("empty AND/OR branch".to_string());
            }
            for child in children {
                walk(child, errors);
            }
        }
        ConditionNode::Leaf {
            field,
            operator,
            value,
        } => {
            if !KNOWN_FIELDS.contains(&field.as_str()) {
                errors.push(format!("unknown field '{}'", field));
            }
            match operator {
                Op::In => {
                    if !value.is_array() {
                        errors.push(format!("IN on '{}' requires an array value", field));
                    }
                }
                Op::Gte | Op::Lte => {
                    if !value.is_number() {
                        errors.push(format!("{:?} on '{}' requires a numeric value", operator, field));
                    }
                }
                Op::Equals | Op::NotEquals => {
                    if value.is_object() || value.is_null() {
                        errors.push(format!("EQUALS on '{}' requires a scalar value", field));
                    }
                }
            }
        }
    }
}

/// Pure evaluation against a context record. Strictly separate from
/// `validate_conditions`; a tree that escaped validation malformed surfaces
/// here as an `Err`, never a panic.
pub fn test_conditions(node: &ConditionNode, ctx: &Value) -> Result<bool, ConditionError> {
    match node {
        ConditionNode::All(children) => {
            for child in children {
                if !test_conditions(child, ctx)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        ConditionNode::Any(children) => {
            for child in children {
                if test_conditions(child, ctx)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        ConditionNode::Leaf {
            field,
            operator,
            value,
        } => {
            let actual = match ctx.get(field) {
                Some(v) if !v.is_null() => v,
                _ => return Err(ConditionError::UnknownField(field.clone())),
            };
            eval_leaf(field, *operator, value, actual)
        }
    }
}

fn eval_leaf(field: &str, op: Op, expected: &Value, actual: &Value) -> Result<bool, ConditionError> {
    match op {
        Op::Equals => Ok(values_equal(expected, actual)),
        Op::NotEquals => Ok(!values_equal(expected, actual)),
        Op::In => {
            let options = expected.as_array().ok_or_else(|| {
                ConditionError::Malformed(format!("IN on '{}' without array value", field))
            })?;
            Ok(options.iter().any(|v| values_equal(v, actual)))
        }
        Op::Gte | Op::Lte => {
            let (a, b) = match (actual.as_f64(), expected.as_f64()) {
                (Some(a), Some(b)) => (a, b),
                _ => {
                    return Err(ConditionError::Malformed(format!(
                        "{:?} on '{}' needs numeric operands",
                        op, field
                    )))
                }
            };
            Ok(if op == Op::Gte { a >= b } else { a <= b })
        }
    }
}

// numeric values compare numerically so 5 == 5.0
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}
