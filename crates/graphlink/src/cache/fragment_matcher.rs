//! Type-condition matching for fragments on unions and interfaces.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;
use serde_json::Value;

use super::CacheError;

/// Decides whether an object of some concrete type satisfies a fragment's
/// type condition.
///
/// A concrete type matches a condition naming the same type, or naming a
/// union or interface that lists it among its possible types. The possible
/// types come from a schema introspection result:
///
/// ```ignore
/// let matcher = FragmentMatcher::from_introspection(&serde_json::json!({
///     "__schema": { "types": [
///         { "kind": "UNION", "name": "SearchResult",
///           "possibleTypes": [{ "name": "User" }, { "name": "Repository" }] }
///     ] }
/// }))?;
/// assert!(matcher.matches(Some("User"), Some("SearchResult")));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FragmentMatcher {
    possible_types: HashMap<String, HashSet<String>>,
}

#[derive(Deserialize)]
struct Introspection {
    #[serde(rename = "__schema")]
    schema: Schema,
}

#[derive(Deserialize)]
struct Schema {
    types: Vec<IntrospectedType>,
}

#[derive(Deserialize)]
struct IntrospectedType {
    name: String,
    #[serde(default, rename = "possibleTypes")]
    possible_types: Option<Vec<NamedType>>,
}

#[derive(Deserialize)]
struct NamedType {
    name: String,
}

impl FragmentMatcher {
    /// A matcher that only knows exact type names.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a matcher from an introspection result, either bare
    /// (`{"__schema": ...}`) or wrapped in a response (`{"data": {"__schema": ...}}`).
    pub fn from_introspection(result: &Value) -> Result<Self, CacheError> {
        let result = result.get("data").unwrap_or(result);
        let introspection = Introspection::deserialize(result)?;

        let possible_types = introspection
            .schema
            .types
            .into_iter()
            .filter_map(|ty| {
                let members = ty.possible_types?;
                Some((ty.name, members.into_iter().map(|member| member.name).collect()))
            })
            .collect();

        Ok(Self { possible_types })
    }

    /// Declare `members` as the possible types of `abstract_type`.
    pub fn with_possible_types<I, S>(mut self, abstract_type: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.possible_types
            .entry(abstract_type.into())
            .or_default()
            .extend(members.into_iter().map(Into::into));
        self
    }

    /// The possible types of `abstract_type`, if it is a known union or
    /// interface.
    pub fn possible_types(&self, abstract_type: &str) -> Option<&HashSet<String>> {
        self.possible_types.get(abstract_type)
    }

    /// Whether an object of type `typename` satisfies `condition`.
    ///
    /// Fragments without a condition always apply. An object whose type is
    /// unknown is assumed to match.
    pub fn matches(&self, typename: Option<&str>, condition: Option<&str>) -> bool {
        let (Some(typename), Some(condition)) = (typename, condition) else {
            return true;
        };
        typename == condition
            || self
                .possible_types
                .get(condition)
                .is_some_and(|members| members.contains(typename))
    }

    /// Whether no abstract types are known.
    pub fn is_empty(&self) -> bool {
        self.possible_types.is_empty()
    }
}
