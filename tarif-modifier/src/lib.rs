pub mod condition;
pub mod engine;
pub mod modifier;
pub mod repository;

pub use condition::{
    test_conditions, validate_conditions, ConditionError, ConditionNode, ConditionReport, Op,
};
pub use engine::{AppliedModifier, ModifierContext, ModifierEngine, ModifierOutcome};
pub use modifier::{validate_modifier, AppliesOn, ModifierScope, ModifierType, PriceModifier};
pub use repository::ModifierRepository;
