//! C4: Request Transform Pipeline (§4.4).
//!
//! A sub-request is built as a [`PlanSelectionSet`] — an owned, easily-
//! rewritten tree, simpler than a live `apollo_compiler` executable AST and
//! scoped to exactly what a transform needs to rewrite. The incoming
//! executor's field nodes (out of scope, §1) are expected to arrive already
//! in this shape; transforms rewrite it in place, and the pipeline prints the
//! final tree to GraphQL text for the wire.

mod add_arguments_as_variables;
mod add_selection_sets;
mod add_typename;
mod expand_abstract_types;
mod filter_to_schema;
mod wrap_concrete_types;

pub use add_arguments_as_variables::AddArgumentsAsVariables;
pub use add_selection_sets::AddSelectionSets;
pub use add_typename::AddTypename;
pub use expand_abstract_types::ExpandAbstractTypes;
pub use filter_to_schema::FilterToSchema;
pub use wrap_concrete_types::WrapConcreteTypes;

use std::any::Any;
use std::fmt::Write as _;

use apollo_compiler::ast::Value;
use apollo_compiler::validation::Valid;
use apollo_compiler::{Name, Node, Schema};
use indexmap::IndexMap;
use serde_json_bytes::{Map as JsonMap, Value as JsonValue};

use crate::delegation::DelegationContext;
use crate::subschema::Request;

/// One field selection in a [`PlanSelectionSet`] (§4.4 built-ins operate on
/// this tree).
#[derive(Debug, Clone, PartialEq)]
pub struct PlanField {
    pub alias: Option<Name>,
    pub name: Name,
    pub arguments: Vec<(Name, Node<Value>)>,
    pub selection_set: PlanSelectionSet,
}

impl PlanField {
    pub fn response_key(&self) -> &Name {
        self.alias.as_ref().unwrap_or(&self.name)
    }
}

/// One inline-fragment selection (fragment spreads are always pre-expanded
/// into these at the boundary, matching the teacher's
/// `FragmentSpreadNormalizationOption::InlineFragmentSpread` default).
#[derive(Debug, Clone, PartialEq)]
pub struct PlanInlineFragment {
    pub type_condition: Option<Name>,
    pub selection_set: PlanSelectionSet,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlanSelection {
    Field(PlanField),
    InlineFragment(PlanInlineFragment),
}

/// An owned, rewritable selection set, scoped to a parent type (§4.4).
#[derive(Debug, Clone, PartialEq)]
pub struct PlanSelectionSet {
    pub type_name: Name,
    pub selections: Vec<PlanSelection>,
}

impl PlanSelectionSet {
    pub fn empty(type_name: Name) -> Self {
        Self {
            type_name,
            selections: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }

    /// Union-by-printed-form merge (§9 Open Question b): a field/fragment is
    /// considered "the same" as one already present if it prints identically,
    /// and its nested selection set is recursively merged rather than
    /// duplicated.
    pub fn merge(&mut self, other: &PlanSelectionSet) {
        for selection in &other.selections {
            match selection {
                PlanSelection::Field(field) => {
                    if let Some(PlanSelection::Field(existing)) = self.selections.iter_mut().find(|s| {
                        matches!(s, PlanSelection::Field(f) if f.response_key() == field.response_key() && f.arguments == field.arguments)
                    }) {
                        existing.selection_set.merge(&field.selection_set);
                    } else {
                        self.selections.push(PlanSelection::Field(field.clone()));
                    }
                }
                PlanSelection::InlineFragment(frag) => {
                    if let Some(PlanSelection::InlineFragment(existing)) = self.selections.iter_mut().find(|s| {
                        matches!(s, PlanSelection::InlineFragment(f) if f.type_condition == frag.type_condition)
                    }) {
                        existing.selection_set.merge(&frag.selection_set);
                    } else {
                        self.selections.push(PlanSelection::InlineFragment(frag.clone()));
                    }
                }
            }
        }
    }

    pub fn has_typename(&self) -> bool {
        self.selections
            .iter()
            .any(|s| matches!(s, PlanSelection::Field(f) if f.name.as_str() == "__typename"))
    }
}

/// GraphQL-text printer for a [`PlanSelectionSet`], used once at the end of
/// the pipeline to hand the executor a document string (§6 `Request`).
pub fn print_selection_set(set: &PlanSelectionSet, out: &mut String) {
    out.push_str("{ ");
    for selection in &set.selections {
        match selection {
            PlanSelection::Field(field) => {
                if let Some(alias) = &field.alias {
                    let _ = write!(out, "{alias}: ");
                }
                out.push_str(field.name.as_str());
                if !field.arguments.is_empty() {
                    out.push('(');
                    for (i, (name, value)) in field.arguments.iter().enumerate() {
                        if i > 0 {
                            out.push_str(", ");
                        }
                        let _ = write!(out, "{name}: {value}");
                    }
                    out.push(')');
                }
                if !field.selection_set.is_empty() {
                    out.push(' ');
                    print_selection_set(&field.selection_set, out);
                }
                out.push(' ');
            }
            PlanSelection::InlineFragment(frag) => {
                out.push_str("... ");
                if let Some(cond) = &frag.type_condition {
                    let _ = write!(out, "on {cond} ");
                }
                print_selection_set(&frag.selection_set, out);
            }
        }
    }
    out.push('}');
}

pub fn print_operation(operation_type: &str, variable_defs: &str, set: &PlanSelectionSet) -> String {
    let mut out = String::new();
    out.push_str(operation_type);
    out.push(' ');
    if !variable_defs.is_empty() {
        let _ = write!(out, "({variable_defs}) ");
    }
    print_selection_set(set, &mut out);
    out
}

/// Per-request scratch space one [`Transform`] may use to carry state from
/// `transform_request` to `transform_result` (§4.4: "private per-request
/// transformation-context object").
#[derive(Default)]
pub struct TransformContext {
    slots: IndexMap<&'static str, Box<dyn Any + Send>>,
}

impl TransformContext {
    pub fn set<T: Any + Send>(&mut self, key: &'static str, value: T) {
        self.slots.insert(key, Box::new(value));
    }

    pub fn get<T: Any + Send>(&self, key: &'static str) -> Option<&T> {
        self.slots.get(key).and_then(|v| v.downcast_ref())
    }
}

/// A capability interface (§9 "replace deep inheritance with a capability
/// interface"): a transform is a value implementing whichever hooks it needs,
/// not a forced subclass of a base `Transform` type.
pub trait Transform: Send + Sync {
    fn transform_schema(&self, _schema: &mut Schema) {}

    fn transform_request(
        &self,
        request: PlanSelectionSet,
        _target_schema: &Valid<Schema>,
        _delegation_context: &DelegationContext<'_>,
        _transform_context: &mut TransformContext,
    ) -> PlanSelectionSet {
        request
    }

    fn transform_result(
        &self,
        result: JsonValue,
        _delegation_context: &DelegationContext<'_>,
        _transform_context: &mut TransformContext,
    ) -> JsonValue {
        result
    }
}

/// Applies request transforms left-to-right, matching `reduce` in §4.4.
pub fn apply_request_transforms(
    transforms: &[Box<dyn Transform>],
    mut set: PlanSelectionSet,
    target_schema: &Valid<Schema>,
    delegation_context: &DelegationContext<'_>,
    contexts: &mut Vec<TransformContext>,
) -> PlanSelectionSet {
    contexts.clear();
    for transform in transforms {
        let mut ctx = TransformContext::default();
        set = transform.transform_request(set, target_schema, delegation_context, &mut ctx);
        contexts.push(ctx);
    }
    set
}

/// Applies result transforms right-to-left, matching `reduceRight` in §4.4 —
/// each transform sees its own additions on the way back, since `contexts` was
/// populated in the same left-to-right order as the request pass.
pub fn apply_result_transforms(
    transforms: &[Box<dyn Transform>],
    mut result: JsonValue,
    delegation_context: &DelegationContext<'_>,
    contexts: &mut [TransformContext],
) -> JsonValue {
    for (transform, ctx) in transforms.iter().zip(contexts.iter_mut()).rev() {
        result = transform.transform_result(result, delegation_context, ctx);
    }
    result
}

pub fn variables_to_json(variables: &IndexMap<Name, JsonValue>) -> JsonMap<String, JsonValue> {
    variables.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

/// Builds the [`Request`] the delegator finally hands to an executor, after
/// every transform has run (§4.4, §4.5 step 2).
pub fn build_request(
    operation_type: &str,
    set: &PlanSelectionSet,
    variable_defs: &str,
    variables: JsonMap<String, JsonValue>,
    operation_name: Option<String>,
) -> Request {
    Request {
        document: print_operation(operation_type, variable_defs, set),
        operation_name,
        variables,
    }
}

pub fn schema_has_type(schema: &Valid<Schema>, name: &Name) -> bool {
    schema.types.contains_key(name)
}
