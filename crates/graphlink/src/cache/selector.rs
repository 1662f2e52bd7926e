//! Walking an operation's selection sets against concrete objects.

use std::collections::{BTreeMap, HashSet};

use async_graphql_parser::Positioned;
use async_graphql_parser::types::{
    Directive, ExecutableDocument, Field, OperationDefinition, Selection, SelectionSet,
};
use async_graphql_value::{ConstValue, Value as GraphQLValue};
use serde_json::{Map, Value};

use super::{CacheError, FragmentMatcher};

/// A document, its resolved variables and the fragment matcher, bundled for
/// one read or write.
pub(crate) struct Selector<'a> {
    document: &'a ExecutableDocument,
    variables: Map<String, Value>,
    matcher: &'a FragmentMatcher,
}

impl<'a> Selector<'a> {
    /// Variables are the definition's defaults overlaid with `provided`.
    pub(crate) fn new(
        document: &'a ExecutableDocument,
        definition: &'a OperationDefinition,
        provided: Map<String, Value>,
        matcher: &'a FragmentMatcher,
    ) -> Result<Self, CacheError> {
        let mut variables = Map::new();
        for variable in &definition.variable_definitions {
            if let Some(default) = &variable.node.default_value {
                variables.insert(
                    variable.node.name.node.to_string(),
                    default.node.clone().into_json()?,
                );
            }
        }
        variables.extend(provided);

        Ok(Self {
            document,
            variables,
            matcher,
        })
    }

    /// The store key of `field`: its name, followed by its arguments as
    /// canonical JSON when it has any.
    ///
    /// Arguments bound to an unset variable are left out.
    pub(crate) fn field_key(&self, field: &Field) -> Result<String, CacheError> {
        let mut arguments = BTreeMap::new();
        for (name, value) in &field.arguments {
            if let Some(value) = self.argument(&value.node)? {
                arguments.insert(name.node.as_str(), canonical(value));
            }
        }

        let name = field.name.node.as_str();
        if arguments.is_empty() {
            Ok(name.to_string())
        } else {
            Ok(format!("{name}({})", serde_json::to_string(&arguments)?))
        }
    }

    /// Flatten `set` into the fields that apply to an object of `typename`.
    ///
    /// Inline fragments and fragment spreads are expanded when the matcher
    /// accepts their type condition; `@skip` and `@include` are honored.
    pub(crate) fn collect_fields(
        &self,
        set: &'a SelectionSet,
        typename: Option<&str>,
    ) -> Result<Vec<&'a Field>, CacheError> {
        let mut fields = Vec::new();
        let mut expanding = HashSet::new();
        self.collect_into(set, typename, &mut fields, &mut expanding)?;
        Ok(fields)
    }

    fn collect_into(
        &self,
        set: &'a SelectionSet,
        typename: Option<&str>,
        fields: &mut Vec<&'a Field>,
        expanding: &mut HashSet<&'a str>,
    ) -> Result<(), CacheError> {
        for selection in &set.items {
            match &selection.node {
                Selection::Field(field) => {
                    if self.included(&field.node.directives)? {
                        fields.push(&field.node);
                    }
                }
                Selection::InlineFragment(fragment) => {
                    let condition = fragment
                        .node
                        .type_condition
                        .as_ref()
                        .map(|condition| condition.node.on.node.as_str());
                    if self.included(&fragment.node.directives)?
                        && self.matcher.matches(typename, condition)
                    {
                        self.collect_into(
                            &fragment.node.selection_set.node,
                            typename,
                            fields,
                            expanding,
                        )?;
                    }
                }
                Selection::FragmentSpread(spread) => {
                    let name = spread.node.fragment_name.node.as_str();
                    let fragment = self
                        .document
                        .fragments
                        .get(name)
                        .ok_or_else(|| CacheError::UnknownFragment(name.to_string()))?;
                    let condition = fragment.node.type_condition.node.on.node.as_str();

                    if !self.included(&spread.node.directives)?
                        || !self.matcher.matches(typename, Some(condition))
                        || !expanding.insert(name)
                    {
                        continue;
                    }
                    let result = self.collect_into(
                        &fragment.node.selection_set.node,
                        typename,
                        fields,
                        expanding,
                    );
                    expanding.remove(name);
                    result?;
                }
            }
        }
        Ok(())
    }

    fn included(&self, directives: &[Positioned<Directive>]) -> Result<bool, CacheError> {
        for directive in directives {
            let expected = match directive.node.name.node.as_str() {
                "skip" => false,
                "include" => true,
                _ => continue,
            };
            let condition = match directive.node.get_argument("if") {
                Some(value) => self.argument(&value.node)?,
                None => None,
            };
            if condition.and_then(|value| value.as_bool()) != Some(expected) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Resolve an argument value to JSON. A bare variable that is not set
    /// resolves to `None`; unset variables nested in lists or objects become
    /// `null`.
    fn argument(&self, value: &GraphQLValue) -> Result<Option<Value>, CacheError> {
        if let GraphQLValue::Variable(name) = value {
            return Ok(self.variables.get(name.as_str()).cloned());
        }

        let constant = value.clone().into_const_with(|name| {
            self.variables
                .get(name.as_str())
                .cloned()
                .map_or(Ok(ConstValue::Null), ConstValue::from_json)
        })?;
        Ok(Some(constant.into_json()?))
    }
}

/// Rebuild objects with their keys in sorted order.
fn canonical(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> = map
                .into_iter()
                .map(|(key, value)| (key, canonical(value)))
                .collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonical).collect()),
        other => other,
    }
}
