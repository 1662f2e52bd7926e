//! Normalized in-memory cache.
//!
//! Results are split into entities keyed by `Type:id`; every field is stored
//! under its name plus canonical arguments, and nested entities become
//! `{"__ref": id}` links. Reads rebuild a result by following the same
//! selection set, so two queries touching the same entity observe each
//! other's writes.
//!
//! ```ignore
//! let mut cache = InMemoryCache::new(FragmentMatcher::new());
//! let op = Operation::new("{ user(id: 1) { __typename id name } }");
//! cache.write_query(&op, &json!({ "user": { "__typename": "User", "id": 1, "name": "Ada" } }))?;
//! assert_eq!(cache.read_field("User:1", "name"), Some(&json!("Ada")));
//! ```

mod fragment_matcher;
mod selector;
mod snapshot;

use std::collections::HashMap;

use async_graphql_parser::types::{OperationType, SelectionSet};
use graphlink_net::graphql::Operation;
use serde_json::{Map, Value};
use thiserror::Error;

pub use self::fragment_matcher::FragmentMatcher;
use self::selector::Selector;
pub use self::snapshot::{CacheSnapshot, SNAPSHOT_GLOBAL};
use crate::logging::targets;

/// Entity id of the query root.
pub const ROOT_QUERY: &str = "ROOT_QUERY";
/// Entity id of the mutation root.
pub const ROOT_MUTATION: &str = "ROOT_MUTATION";
/// Entity id of the subscription root.
pub const ROOT_SUBSCRIPTION: &str = "ROOT_SUBSCRIPTION";

const REF_KEY: &str = "__ref";
const TYPENAME: &str = "__typename";

/// Errors raised while reading or writing the cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The operation's document does not parse.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// The document holds no operation to execute.
    #[error("no operation{}", .0.as_ref().map(|name| format!(" named {name}")).unwrap_or_default())]
    NoOperation(Option<String>),

    /// A fragment spread names a fragment the document does not define.
    #[error("unknown fragment: {0}")]
    UnknownFragment(String),

    /// Result data is not a JSON object.
    #[error("result data must be an object")]
    InvalidData,

    /// JSON conversion failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

type Entity = Map<String, Value>;

/// A normalized store of GraphQL results.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    store: HashMap<String, Entity>,
    matcher: FragmentMatcher,
}

impl InMemoryCache {
    /// An empty cache using `matcher` for fragment type conditions.
    pub fn new(matcher: FragmentMatcher) -> Self {
        Self {
            store: HashMap::new(),
            matcher,
        }
    }

    /// The fragment matcher.
    pub fn fragment_matcher(&self) -> &FragmentMatcher {
        &self.matcher
    }

    /// Normalize `data`, the result of `operation`, into the store under
    /// the root entity of the operation's kind.
    pub fn write_query(&mut self, operation: &Operation, data: &Value) -> Result<(), CacheError> {
        let Value::Object(data) = data else {
            return Err(CacheError::InvalidData);
        };
        let (definition_ty, selector, set) = prepare(operation, &self.matcher)?;
        let (root, typename) = root_of(definition_ty);

        let fields = normalize_fields(&mut self.store, &selector, set, Some(typename), data)?;
        merge_entity(&mut self.store, root, fields);

        tracing::trace!(target: targets::CACHE, root, entities = self.store.len(), "wrote result");
        Ok(())
    }

    /// Rebuild the result of `operation` from the store.
    ///
    /// Returns `Ok(None)` when any selected field is missing.
    pub fn read_query(&self, operation: &Operation) -> Result<Option<Value>, CacheError> {
        let (definition_ty, selector, set) = prepare(operation, &self.matcher)?;
        let (root, typename) = root_of(definition_ty);

        let empty = Entity::new();
        let entity = self.store.get(root).unwrap_or(&empty);
        let result = read_fields(&self.store, &selector, set, Some(typename), entity)?;

        if result.is_none() {
            tracing::trace!(target: targets::CACHE, root, "cache miss");
        }
        Ok(result.map(Value::Object))
    }

    /// One stored field of one entity.
    pub fn read_field(&self, entity_id: &str, field_key: &str) -> Option<&Value> {
        self.store.get(entity_id)?.get(field_key)
    }

    /// All stored fields of one entity.
    pub fn entity(&self, entity_id: &str) -> Option<&Map<String, Value>> {
        self.store.get(entity_id)
    }

    /// Merge `snapshot` into the store, field by field.
    pub fn restore(&mut self, snapshot: CacheSnapshot) {
        let count = snapshot.len();
        for (id, fields) in snapshot {
            merge_entity(&mut self.store, &id, fields);
        }
        tracing::debug!(target: targets::CACHE, entities = count, "restored snapshot");
    }

    /// The whole store as a snapshot.
    pub fn extract(&self) -> CacheSnapshot {
        self.store
            .iter()
            .map(|(id, fields)| (id.clone(), fields.clone()))
            .collect()
    }

    /// Remove every entity.
    pub fn reset(&mut self) {
        self.store.clear();
    }

    /// Number of stored entities, roots included.
    pub fn entity_count(&self) -> usize {
        self.store.len()
    }
}

fn prepare<'a>(
    operation: &'a Operation,
    matcher: &'a FragmentMatcher,
) -> Result<(OperationType, Selector<'a>, &'a SelectionSet), CacheError> {
    let document = operation.document().ok_or_else(|| {
        let message = async_graphql_parser::parse_query(&operation.query)
            .err()
            .map(|err| err.to_string())
            .unwrap_or_default();
        CacheError::InvalidDocument(message)
    })?;
    let definition = operation
        .main_definition()
        .ok_or_else(|| CacheError::NoOperation(operation.operation_name.clone()))?;

    let selector = Selector::new(document, definition, operation.variables_object(), matcher)?;
    Ok((definition.ty, selector, &definition.selection_set.node))
}

fn root_of(ty: OperationType) -> (&'static str, &'static str) {
    match ty {
        OperationType::Query => (ROOT_QUERY, "Query"),
        OperationType::Mutation => (ROOT_MUTATION, "Mutation"),
        OperationType::Subscription => (ROOT_SUBSCRIPTION, "Subscription"),
    }
}

/// `Type:id` for objects carrying a typename and an `id` or `_id`.
fn identify(object: &Entity) -> Option<String> {
    let typename = object.get(TYPENAME)?.as_str()?;
    let id = object.get("id").or_else(|| object.get("_id"))?;
    match id {
        Value::String(id) => Some(format!("{typename}:{id}")),
        Value::Number(id) => Some(format!("{typename}:{id}")),
        _ => None,
    }
}

fn typename_of<'v>(object: &'v Entity, fallback: Option<&'v str>) -> Option<&'v str> {
    object
        .get(TYPENAME)
        .and_then(Value::as_str)
        .or(fallback)
}

fn reference_id(value: &Value) -> Option<&str> {
    match value {
        Value::Object(object) if object.len() == 1 => object.get(REF_KEY)?.as_str(),
        _ => None,
    }
}

fn normalize_fields<'a>(
    store: &mut HashMap<String, Entity>,
    selector: &Selector<'a>,
    set: &'a SelectionSet,
    typename: Option<&str>,
    data: &Entity,
) -> Result<Entity, CacheError> {
    let typename = typename_of(data, typename);
    let mut fields = Entity::new();

    for field in selector.collect_fields(set, typename)? {
        let Some(value) = data.get(field.response_key().node.as_str()) else {
            continue;
        };
        let key = selector.field_key(field)?;
        let value = normalize_value(store, selector, &field.selection_set.node, value)?;
        merge_field(&mut fields, key, value);
    }
    Ok(fields)
}

fn normalize_value<'a>(
    store: &mut HashMap<String, Entity>,
    selector: &Selector<'a>,
    set: &'a SelectionSet,
    value: &Value,
) -> Result<Value, CacheError> {
    if set.items.is_empty() {
        return Ok(value.clone());
    }
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| normalize_value(store, selector, set, item))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(object) => {
            let fields = normalize_fields(store, selector, set, None, object)?;
            match identify(object) {
                Some(id) => {
                    merge_entity(store, &id, fields);
                    let mut reference = Entity::new();
                    reference.insert(REF_KEY.to_string(), Value::String(id));
                    Ok(Value::Object(reference))
                }
                None => Ok(Value::Object(fields)),
            }
        }
        other => Ok(other.clone()),
    }
}

fn merge_entity(store: &mut HashMap<String, Entity>, id: &str, fields: Entity) {
    let entity = store.entry(id.to_string()).or_default();
    for (key, value) in fields {
        merge_field(entity, key, value);
    }
}

/// Store `value` under `key`. Two inline objects are merged key by key;
/// anything else replaces the stored value.
fn merge_field(entity: &mut Entity, key: String, value: Value) {
    if let Value::Object(incoming) = &value
        && !incoming.contains_key(REF_KEY)
        && let Some(Value::Object(existing)) = entity.get_mut(&key)
        && !existing.contains_key(REF_KEY)
    {
        if let Value::Object(incoming) = value {
            for (key, value) in incoming {
                merge_field(existing, key, value);
            }
        }
        return;
    }
    entity.insert(key, value);
}

fn read_fields<'a>(
    store: &HashMap<String, Entity>,
    selector: &Selector<'a>,
    set: &'a SelectionSet,
    typename: Option<&str>,
    entity: &Entity,
) -> Result<Option<Entity>, CacheError> {
    let typename = typename_of(entity, typename);
    let mut result = Entity::new();

    for field in selector.collect_fields(set, typename)? {
        let key = selector.field_key(field)?;
        let value = match entity.get(&key) {
            Some(stored) => read_value(store, selector, &field.selection_set.node, stored)?,
            None => None,
        };
        let Some(value) = value else {
            return Ok(None);
        };
        merge_field(&mut result, field.response_key().node.to_string(), value);
    }
    Ok(Some(result))
}

fn read_value<'a>(
    store: &HashMap<String, Entity>,
    selector: &Selector<'a>,
    set: &'a SelectionSet,
    value: &Value,
) -> Result<Option<Value>, CacheError> {
    if set.items.is_empty() {
        return Ok(Some(value.clone()));
    }
    if let Some(id) = reference_id(value) {
        let Some(entity) = store.get(id) else {
            return Ok(None);
        };
        return Ok(read_fields(store, selector, set, None, entity)?.map(Value::Object));
    }
    match value {
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match read_value(store, selector, set, item)? {
                    Some(item) => out.push(item),
                    None => return Ok(None),
                }
            }
            Ok(Some(Value::Array(out)))
        }
        Value::Object(object) => {
            Ok(read_fields(store, selector, set, None, object)?.map(Value::Object))
        }
        other => Ok(Some(other.clone())),
    }
}
