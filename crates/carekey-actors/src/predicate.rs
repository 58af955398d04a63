//! Closed predicate language for guardrail conditions.
//!
//! Conditions are data, a small tree of tagged variants evaluated against
//! a flat field map. Predicates referencing an absent field evaluate to
//! false, so a condition never passes on missing information.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A value in the evaluation context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// A string field.
    Str(String),
    /// A numeric field.
    Num(f64),
    /// A boolean field.
    Bool(bool),
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Num(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Num(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// Named fields a predicate can inspect.
#[derive(Debug, Clone, Default)]
pub struct PredicateContext {
    fields: BTreeMap<String, Value>,
}

impl PredicateContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field.
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Look up a field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

/// A condition over a [`PredicateContext`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", content = "args", rename_all = "snake_case")]
pub enum Predicate {
    /// String field contains a substring (case-insensitive).
    Contains {
        /// Field to inspect.
        field: String,
        /// Substring to look for.
        needle: String,
    },
    /// Field equals a value exactly.
    Equals {
        /// Field to inspect.
        field: String,
        /// Expected value.
        value: Value,
    },
    /// Numeric field is strictly greater.
    GreaterThan {
        /// Field to inspect.
        field: String,
        /// Threshold.
        value: f64,
    },
    /// Numeric field is strictly smaller.
    LessThan {
        /// Field to inspect.
        field: String,
        /// Threshold.
        value: f64,
    },
    /// All sub-predicates hold.
    All(Vec<Predicate>),
    /// At least one sub-predicate holds.
    Any(Vec<Predicate>),
    /// The sub-predicate does not hold.
    Not(Box<Predicate>),
}

impl Predicate {
    /// Evaluate against a context. Missing fields make the leaf false.
    pub fn evaluate(&self, ctx: &PredicateContext) -> bool {
        match self {
            Predicate::Contains { field, needle } => match ctx.get(field) {
                Some(Value::Str(s)) => s.to_lowercase().contains(&needle.to_lowercase()),
                _ => false,
            },
            Predicate::Equals { field, value } => ctx.get(field) == Some(value),
            Predicate::GreaterThan { field, value } => match ctx.get(field) {
                Some(Value::Num(n)) => n > value,
                _ => false,
            },
            Predicate::LessThan { field, value } => match ctx.get(field) {
                Some(Value::Num(n)) => n < value,
                _ => false,
            },
            Predicate::All(preds) => preds.iter().all(|p| p.evaluate(ctx)),
            Predicate::Any(preds) => preds.iter().any(|p| p.evaluate(ctx)),
            Predicate::Not(pred) => !pred.evaluate(ctx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_is_case_insensitive() {
        let ctx = PredicateContext::new().set("action", "Delete ALL records");
        let pred = Predicate::Contains {
            field: "action".into(),
            needle: "delete all".into(),
        };
        assert!(pred.evaluate(&ctx));
    }

    #[test]
    fn test_missing_field_is_false() {
        let ctx = PredicateContext::new();
        let pred = Predicate::Contains {
            field: "action".into(),
            needle: "x".into(),
        };
        assert!(!pred.evaluate(&ctx));

        let gt = Predicate::GreaterThan {
            field: "count".into(),
            value: 0.0,
        };
        assert!(!gt.evaluate(&ctx));
    }

    #[test]
    fn test_numeric_comparisons() {
        let ctx = PredicateContext::new().set("records", 12.0);
        assert!(Predicate::GreaterThan {
            field: "records".into(),
            value: 10.0
        }
        .evaluate(&ctx));
        assert!(!Predicate::LessThan {
            field: "records".into(),
            value: 10.0
        }
        .evaluate(&ctx));
    }

    #[test]
    fn test_combinators() {
        let ctx = PredicateContext::new()
            .set("action", "bulk export")
            .set("records", 500.0);

        let pred = Predicate::All(vec![
            Predicate::Contains {
                field: "action".into(),
                needle: "export".into(),
            },
            Predicate::GreaterThan {
                field: "records".into(),
                value: 100.0,
            },
        ]);
        assert!(pred.evaluate(&ctx));

        let negated = Predicate::Not(Box::new(pred));
        assert!(!negated.evaluate(&ctx));
    }

    #[test]
    fn test_not_on_missing_field_is_true() {
        // Not(missing) flips the fail-closed leaf; combinators must wrap
        // leaves with that in mind.
        let ctx = PredicateContext::new();
        let pred = Predicate::Not(Box::new(Predicate::Equals {
            field: "flag".into(),
            value: Value::Bool(true),
        }));
        assert!(pred.evaluate(&ctx));
    }

    #[test]
    fn test_serde_tagged_form() {
        let pred = Predicate::Any(vec![Predicate::Equals {
            field: "role".into(),
            value: Value::Str("admin".into()),
        }]);
        let json = serde_json::to_string(&pred).unwrap();
        assert!(json.contains("\"op\":\"any\""));
        let back: Predicate = serde_json::from_str(&json).unwrap();
        let ctx = PredicateContext::new().set("role", "admin");
        assert!(back.evaluate(&ctx));
    }

    #[test]
    fn test_serde_nested_combinators_round_trip() {
        let pred = Predicate::Not(Box::new(Predicate::All(vec![
            Predicate::Contains {
                field: "action".into(),
                needle: "export".into(),
            },
            Predicate::Any(vec![Predicate::GreaterThan {
                field: "records".into(),
                value: 100.0,
            }]),
        ])));
        let json = serde_json::to_string(&pred).unwrap();
        let back: Predicate = serde_json::from_str(&json).unwrap();

        let ctx = PredicateContext::new()
            .set("action", "bulk export")
            .set("records", 500.0);
        assert!(!back.evaluate(&ctx));
    }
}
