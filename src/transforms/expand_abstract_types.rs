//! `ExpandAbstractTypes` (§4.4): rewrites inline fragments whose type
//! condition is an interface or union into one explicit fragment per concrete
//! implementation the *target* subschema actually knows about, since the
//! composed schema's abstract type may have implementations spread across
//! subschemas that don't all exist in any one of them.

use apollo_compiler::schema::ExtendedType;
use apollo_compiler::validation::Valid;
use apollo_compiler::Schema;

use crate::delegation::DelegationContext;
use crate::transforms::{PlanInlineFragment, PlanSelection, PlanSelectionSet, Transform, TransformContext};

pub struct ExpandAbstractTypes;

fn implementations_in_target<'a>(schema: &'a Schema, type_name: &str) -> Option<Vec<apollo_compiler::Name>> {
    match schema.types.get(type_name)? {
        ExtendedType::Interface(_) => Some(
            schema
                .types
                .iter()
                .filter_map(|(name, ty)| match ty {
                    ExtendedType::Object(o) if o.implements_interfaces.iter().any(|i| i.as_str() == type_name) => {
                        Some(name.clone())
                    }
                    _ => None,
                })
                .collect(),
        ),
        ExtendedType::Union(u) => Some(u.members.iter().map(|m| m.name.clone()).collect()),
        _ => None,
    }
}

fn expand(set: &mut PlanSelectionSet, schema: &Schema) {
    let mut expanded = Vec::with_capacity(set.selections.len());
    for selection in set.selections.drain(..) {
        match selection {
            PlanSelection::InlineFragment(mut frag) => {
                expand(&mut frag.selection_set, schema);
                match frag
                    .type_condition
                    .as_ref()
                    .and_then(|t| implementations_in_target(schema, t.as_str()))
                {
                    Some(members) if schema.types.get(frag.type_condition.as_ref().unwrap().as_str()).is_some() => {
                        for member in members {
                            if schema.types.contains_key(&member) {
                                expanded.push(PlanSelection::InlineFragment(PlanInlineFragment {
                                    type_condition: Some(member),
                                    selection_set: frag.selection_set.clone(),
                                }));
                            }
                        }
                    }
                    _ => expanded.push(PlanSelection::InlineFragment(frag)),
                }
            }
            PlanSelection::Field(mut field) => {
                expand(&mut field.selection_set, schema);
                expanded.push(PlanSelection::Field(field));
            }
        }
    }
    set.selections = expanded;
}

impl Transform for ExpandAbstractTypes {
    fn transform_request(
        &self,
        mut request: PlanSelectionSet,
        target_schema: &Valid<Schema>,
        _delegation_context: &DelegationContext<'_>,
        _transform_context: &mut TransformContext,
    ) -> PlanSelectionSet {
        expand(&mut request, target_schema);
        request
    }
}
