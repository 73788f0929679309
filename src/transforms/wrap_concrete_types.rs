//! `WrapConcreteTypes` (§4.4): when a field declared on an abstract type
//! resolves, in this request, to a concrete runtime type, its selections are
//! wrapped in an inline fragment on that concrete type plus a `__typename`
//! companion — otherwise a plain selection set erases which concrete type the
//! caller actually meant, and the target subschema may reject fields that
//! don't exist on the abstract type itself.

use apollo_compiler::schema::ExtendedType;
use apollo_compiler::validation::Valid;
use apollo_compiler::{Name, Schema};

use crate::delegation::DelegationContext;
use crate::transforms::{PlanField, PlanInlineFragment, PlanSelection, PlanSelectionSet, Transform, TransformContext};

pub struct WrapConcreteTypes;

fn is_abstract(schema: &Schema, name: &str) -> bool {
    matches!(
        schema.types.get(name),
        Some(ExtendedType::Interface(_)) | Some(ExtendedType::Union(_))
    )
}

fn is_object(schema: &Schema, name: &str) -> bool {
    matches!(schema.types.get(name), Some(ExtendedType::Object(_)))
}

fn wrap(set: &mut PlanSelectionSet, schema: &Schema, parent_is_abstract: bool) {
    for selection in &mut set.selections {
        if let PlanSelection::Field(field) = selection {
            let child = &mut field.selection_set;
            let child_is_object = is_object(schema, child.type_name.as_str());
            if parent_is_abstract && child_is_object && !child.selections.is_empty() {
                let already_wrapped = child.selections.len() == 1
                    && matches!(&child.selections[0], PlanSelection::InlineFragment(_));
                if !already_wrapped {
                    let inner_selections = std::mem::take(&mut child.selections);
                    let type_name = child.type_name.clone();
                    child.selections = vec![
                        PlanSelection::Field(PlanField {
                            alias: None,
                            name: Name::new_unchecked("__typename"),
                            arguments: Vec::new(),
                            selection_set: PlanSelectionSet::empty(type_name.clone()),
                        }),
                        PlanSelection::InlineFragment(PlanInlineFragment {
                            type_condition: Some(type_name.clone()),
                            selection_set: PlanSelectionSet {
                                type_name,
                                selections: inner_selections,
                            },
                        }),
                    ];
                }
            }
            let child_is_abstract = is_abstract(schema, child.type_name.as_str());
            wrap(child, schema, child_is_abstract);
        }
    }
}

impl Transform for WrapConcreteTypes {
    fn transform_request(
        &self,
        mut request: PlanSelectionSet,
        target_schema: &Valid<Schema>,
        _delegation_context: &DelegationContext<'_>,
        _transform_context: &mut TransformContext,
    ) -> PlanSelectionSet {
        let root_is_abstract = is_abstract(target_schema, request.type_name.as_str());
        wrap(&mut request, target_schema, root_is_abstract);
        request
    }
}
