use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use tracing::warn;

use super::node::Schema;
use super::patch::VersionedSchema;
use super::pointer::resolve_pointer;
use super::version::Version;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// A base schema with its applicable patches folded in, compiled once.
///
/// Every local `$ref` found anywhere in the raw schema is resolved and
/// compiled up front, so reference lookups during validation are map hits
/// and a cyclic reference is just a key that points back at itself.
#[derive(Debug)]
pub struct EffectiveSchema {
    id: u64,
    raw: Value,
    root: Schema,
    refs: HashMap<String, Schema>,
}

impl EffectiveSchema {
    pub fn compile(raw: Value) -> Self {
        let mut targets = Vec::new();
        collect_refs(&raw, &mut targets);

        let mut refs = HashMap::new();
        for reference in targets {
            if refs.contains_key(&reference) {
                continue;
            }
            match resolve_pointer(&raw, &reference) {
                Some(target) => {
                    refs.insert(reference, Schema::compile(target));
                }
                None => warn!(reference = %reference, "unresolved $ref; constraint skipped"),
            }
        }

        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            root: Schema::compile(&raw),
            raw,
            refs,
        }
    }

    pub fn from_versioned(schema: &VersionedSchema, version: Option<&Version>) -> Self {
        Self::compile(schema.resolve(version))
    }

    /// Unique per compilation; two compilations of equal schemas differ.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn root(&self) -> &Schema {
        &self.root
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn resolve_ref(&self, reference: &str) -> Option<&Schema> {
        self.refs.get(reference)
    }

    /// Follow `$ref` chains from `schema` to the first schema without one.
    /// Gives up after `limit` hops, and on unresolved references.
    pub fn deref<'s>(&'s self, mut schema: &'s Schema, limit: usize) -> Option<&'s Schema> {
        for _ in 0..=limit {
            match schema.as_node().and_then(|node| node.reference.as_deref()) {
                Some(reference) => schema = self.resolve_ref(reference)?,
                None => return Some(schema),
            }
        }
        None
    }
}

fn collect_refs(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(reference)) = map.get("$ref") {
                out.push(reference.clone());
            }
            for child in map.values() {
                collect_refs(child, out);
            }
        }
        Value::Array(list) => list.iter().for_each(|child| collect_refs(child, out)),
        _ => {}
    }
}
