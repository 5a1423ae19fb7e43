//! Recursive shape nodes shared by tool parameter/return schemas (§3) and the
//! return-schema registry's observed-shape lattice (§4.6).
//!
//! A [`Shape`] describes either a declared parameter/return type or an
//! observed one learned by walking live JSON values. Both uses share one
//! representation so the CodeGen sub-agent's doc generator can treat a
//! declared schema and an observed schema identically.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A primitive JSON type, as named in §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveType {
    String,
    Integer,
    Number,
    Boolean,
    Null,
}

impl PrimitiveType {
    pub fn of(value: &Value) -> Option<Self> {
        match value {
            Value::String(_) => Some(Self::String),
            Value::Bool(_) => Some(Self::Boolean),
            Value::Null => Some(Self::Null),
            Value::Number(n) => {
                if n.is_i64() || n.is_u64() {
                    Some(Self::Integer)
                } else {
                    Some(Self::Number)
                }
            }
            _ => None,
        }
    }
}

/// A recursive shape node (§3 Parameter & Return Schema).
///
/// `optional` and `description` are carried on every variant rather than as a
/// wrapper, so a merged `Object` field can widen `optional` in place without
/// rebuilding the enclosing shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Shape {
    Primitive {
        r#type: PrimitiveType,
        optional: bool,
        description: Option<String>,
    },
    Object {
        fields: BTreeMap<String, Shape>,
        optional: bool,
        description: Option<String>,
    },
    Array {
        item_shape: Box<Shape>,
        optional: bool,
        description: Option<String>,
    },
    Union {
        variants: Vec<Shape>,
        optional: bool,
        description: Option<String>,
    },
    Unknown {
        optional: bool,
        description: Option<String>,
    },
}

impl Shape {
    pub fn optional(&self) -> bool {
        match self {
            Shape::Primitive { optional, .. }
            | Shape::Object { optional, .. }
            | Shape::Array { optional, .. }
            | Shape::Union { optional, .. }
            | Shape::Unknown { optional, .. } => *optional,
        }
    }

    pub fn set_optional(&mut self, value: bool) {
        match self {
            Shape::Primitive { optional, .. }
            | Shape::Object { optional, .. }
            | Shape::Array { optional, .. }
            | Shape::Union { optional, .. }
            | Shape::Unknown { optional, .. } => *optional = value,
        }
    }

    fn primitive(t: PrimitiveType) -> Self {
        Shape::Primitive {
            r#type: t,
            optional: false,
            description: None,
        }
    }

    /// Walk a live JSON value and produce the shape that describes it,
    /// recursing up to `max_depth` levels (§4.6: "recursion bounded at depth
    /// 8 to avoid unbounded unfolding"). Beyond the bound, a value collapses
    /// to [`Shape::Unknown`] rather than erroring.
    pub fn observe(value: &Value, max_depth: usize) -> Self {
        if max_depth == 0 {
            return Shape::Unknown {
                optional: false,
                description: None,
            };
        }
        match value {
            Value::Object(map) => {
                let fields = map
                    .iter()
                    .map(|(k, v)| (k.clone(), Shape::observe(v, max_depth - 1)))
                    .collect();
                Shape::Object {
                    fields,
                    optional: false,
                    description: None,
                }
            }
            Value::Array(items) => {
                let item_shape = items
                    .iter()
                    .map(|v| Shape::observe(v, max_depth - 1))
                    .fold(None, |acc: Option<Shape>, next| match acc {
                        None => Some(next),
                        Some(prev) => Some(prev.merge(&next)),
                    })
                    .unwrap_or(Shape::Unknown {
                        optional: false,
                        description: None,
                    });
                Shape::Array {
                    item_shape: Box::new(item_shape),
                    optional: false,
                    description: None,
                }
            }
            other => match PrimitiveType::of(other) {
                Some(t) => Shape::primitive(t),
                None => Shape::Unknown {
                    optional: false,
                    description: None,
                },
            },
        }
    }

    /// Commutative, associative union-merge (§4.6, §9 "observer-style
    /// accumulation" design note): new primitive types widen into a union,
    /// new object fields are added as optional, array item shapes
    /// union-merge, and unions flatten/widen rather than nest. Merging a
    /// shape into itself is a no-op (§8 idempotency property).
    pub fn merge(&self, other: &Shape) -> Shape {
        use Shape::*;
        match (self, other) {
            (Unknown { .. }, other) => other.clone(),
            (this, Unknown { .. }) => this.clone(),
            (Primitive { r#type: a, .. }, Primitive { r#type: b, .. }) if a == b => {
                Primitive {
                    r#type: *a,
                    optional: self.optional() || other.optional(),
                    description: self.description_of().or(other.description_of()),
                }
            }
            (
                Object {
                    fields: a,
                    optional: oa,
                    description: da,
                },
                Object {
                    fields: b,
                    optional: ob,
                    description: db,
                },
            ) => {
                let mut merged: BTreeMap<String, Shape> = BTreeMap::new();
                for (key, shape) in a {
                    merged.insert(key.clone(), shape.clone());
                }
                for (key, shape) in b {
                    merged
                        .entry(key.clone())
                        .and_modify(|existing| *existing = existing.merge(shape))
                        .or_insert_with(|| {
                            let mut widened = shape.clone();
                            widened.set_optional(true);
                            widened
                        });
                }
                // A field present in `a` but absent from `b` (or vice versa)
                // becomes optional: it was not observed on every sample.
                for key in a.keys() {
                    if !b.contains_key(key) {
                        if let Some(field) = merged.get_mut(key) {
                            field.set_optional(true);
                        }
                    }
                }
                for key in b.keys() {
                    if !a.contains_key(key) {
                        if let Some(field) = merged.get_mut(key) {
                            field.set_optional(true);
                        }
                    }
                }
                Object {
                    fields: merged,
                    optional: *oa || *ob,
                    description: da.clone().or_else(|| db.clone()),
                }
            }
            (
                Array {
                    item_shape: a,
                    optional: oa,
                    description: da,
                },
                Array {
                    item_shape: b,
                    optional: ob,
                    description: db,
                },
            ) => Array {
                item_shape: Box::new(a.merge(b)),
                optional: *oa || *ob,
                description: da.clone().or_else(|| db.clone()),
            },
            (this, other) if this == other => this.clone(),
            (this, other) => {
                let mut variants = this.flatten_union();
                for candidate in other.flatten_union() {
                    if !variants.contains(&candidate) {
                        variants.push(candidate);
                    }
                }
                Union {
                    optional: this.optional() || other.optional(),
                    description: this.description_of().or(other.description_of()),
                    variants,
                }
            }
        }
    }

    fn flatten_union(&self) -> Vec<Shape> {
        match self {
            Shape::Union { variants, .. } => variants.clone(),
            other => vec![other.clone_without_modifiers()],
        }
    }

    fn clone_without_modifiers(&self) -> Shape {
        let mut clone = self.clone();
        clone.set_optional(false);
        clone
    }

    fn description_of(&self) -> Option<String> {
        match self {
            Shape::Primitive { description, .. }
            | Shape::Object { description, .. }
            | Shape::Array { description, .. }
            | Shape::Union { description, .. }
            | Shape::Unknown { description, .. } => description.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn observes_primitive_and_object() {
        let shape = Shape::observe(&json!({"title": "a", "score": 0.9}), 8);
        match shape {
            Shape::Object { fields, .. } => {
                assert!(matches!(
                    fields.get("title"),
                    Some(Shape::Primitive {
                        r#type: PrimitiveType::String,
                        ..
                    })
                ));
                assert!(matches!(
                    fields.get("score"),
                    Some(Shape::Primitive {
                        r#type: PrimitiveType::Number,
                        ..
                    })
                ));
            }
            other => panic!("expected object, got {other:?}"),
        }
    }

    #[test]
    fn merging_same_value_is_idempotent() {
        let a = Shape::observe(&json!({"hits": [{"title": "x"}]}), 8);
        let merged = a.merge(&a);
        assert_eq!(merged, a);
    }

    #[test]
    fn scenario_5_union_merge_of_two_tool_returns() {
        let first = Shape::observe(&json!({"hits": [{"title": "a", "score": 0.9}]}), 8);
        let second = Shape::observe(&json!({"hits": [{"title": "b"}], "latency_ms": 12}), 8);
        let merged = first.merge(&second);
        let Shape::Object { fields, .. } = merged else {
            panic!("expected object");
        };
        assert!(fields.get("latency_ms").unwrap().optional());
        let Shape::Array { item_shape, .. } = fields.get("hits").unwrap() else {
            panic!("expected array");
        };
        let Shape::Object { fields: item_fields, .. } = item_shape.as_ref() else {
            panic!("expected object item shape");
        };
        assert!(!item_fields.get("title").unwrap().optional());
        assert!(item_fields.get("score").unwrap().optional());
    }

    #[test]
    fn recursion_truncates_at_bound() {
        let mut value = json!("leaf");
        for _ in 0..12 {
            value = json!({"nested": value});
        }
        // depth 8 must not panic or stack overflow on a deeply nested value.
        let shape = Shape::observe(&value, 8);
        let mut current = &shape;
        let mut depth = 0;
        loop {
            match current {
                Shape::Object { fields, .. } if fields.contains_key("nested") => {
                    current = fields.get("nested").unwrap();
                    depth += 1;
                }
                _ => break,
            }
        }
        assert!(depth <= 8);
    }
}
