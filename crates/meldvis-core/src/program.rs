//! Program metadata: predicate descriptors, rule text and tuples.

use serde::{Deserialize, Serialize};

use crate::ids::RuntimeNodeId;

/// Declared type of a predicate argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldType {
    Int,
    Float,
    Node,
    String,
    ListInt,
}

/// One entry of the runtime's predicate table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredicateDescriptor {
    pub name: String,
    #[serde(default)]
    pub is_linear: bool,
    #[serde(default)]
    pub field_types: Vec<FieldType>,
    /// First field names the node a relationship edge points to.
    #[serde(default)]
    pub is_routing_predicate: bool,
    /// Routing in the opposite direction. Such facts are never drawn.
    #[serde(default)]
    pub is_reverse_routing_predicate: bool,
}

/// A single argument value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<FieldValue>),
}

impl FieldValue {
    /// Read the value as a node reference, if it is a non-negative int.
    pub fn as_node(&self) -> Option<RuntimeNodeId> {
        match self {
            FieldValue::Int(n) if *n >= 0 => Some(RuntimeNodeId(*n as u64)),
            _ => None,
        }
    }

    fn render(&self, ty: Option<FieldType>, out: &mut String) {
        use std::fmt::Write;

        match (self, ty) {
            (FieldValue::Int(n), Some(FieldType::Node)) => {
                let _ = write!(out, "@{n}");
            }
            (FieldValue::Int(n), _) => {
                let _ = write!(out, "{n}");
            }
            (FieldValue::Float(x), _) => {
                let _ = write!(out, "{x}");
            }
            (FieldValue::Text(s), _) => {
                let _ = write!(out, "{s:?}");
            }
            (FieldValue::List(items), _) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.render(None, out);
                }
                out.push(']');
            }
        }
    }
}

/// A fact as reported by the runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tuple {
    pub predicate_id: usize,
    #[serde(default)]
    pub fields: Vec<FieldValue>,
}

impl Tuple {
    pub fn new(predicate_id: usize, fields: Vec<FieldValue>) -> Self {
        Self { predicate_id, fields }
    }

    /// Deterministic identity of this fact: predicate plus serialized
    /// arguments. Two derivations of the same fact share a fingerprint.
    pub fn fingerprint(&self) -> String {
        let args = serde_json::to_string(&self.fields).unwrap_or_default();
        format!("{}:{}", self.predicate_id, args)
    }

    /// The node named by the first field (the routing destination).
    pub fn destination(&self) -> Option<RuntimeNodeId> {
        self.fields.first().and_then(FieldValue::as_node)
    }
}

/// A tuple waiting in a node's work queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedTuple {
    pub tuple: Tuple,
    #[serde(default)]
    pub to_delete: bool,
}

/// Predicate and rule tables of the running program.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Program {
    predicates: Vec<PredicateDescriptor>,
    rules: Vec<String>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_predicates(&mut self, predicates: Vec<PredicateDescriptor>) {
        self.predicates = predicates;
    }

    pub fn set_rules(&mut self, rules: Vec<String>) {
        self.rules = rules;
    }

    pub fn predicate(&self, id: usize) -> Option<&PredicateDescriptor> {
        self.predicates.get(id)
    }

    pub fn rule(&self, id: usize) -> Option<&str> {
        self.rules.get(id).map(String::as_str)
    }

    pub fn predicates(&self) -> &[PredicateDescriptor] {
        &self.predicates
    }

    pub fn rules(&self) -> &[String] {
        &self.rules
    }

    pub fn clear(&mut self) {
        self.predicates.clear();
        self.rules.clear();
    }

    /// Whether the tuple draws an edge from its owner to its destination.
    /// Only plain routing predicates do; reverse routing and unknown
    /// predicates never do.
    pub fn draws_edge(&self, tuple: &Tuple) -> bool {
        self.predicate(tuple.predicate_id)
            .is_some_and(|p| p.is_routing_predicate && !p.is_reverse_routing_predicate)
    }

    /// `name(arg, ...)`, with node-typed arguments printed as `@id`.
    pub fn format_tuple(&self, tuple: &Tuple) -> String {
        let pred = self.predicate(tuple.predicate_id);
        let mut out = match pred {
            Some(p) => p.name.clone(),
            None => format!("#{}", tuple.predicate_id),
        };
        out.push('(');
        for (i, field) in tuple.fields.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            let ty = pred.and_then(|p| p.field_types.get(i).copied());
            field.render(ty, &mut out);
        }
        out.push(')');
        out
    }
}
