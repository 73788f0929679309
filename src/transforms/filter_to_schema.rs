//! `FilterToSchema` (§4.4): the last request-side transform. Drops any field
//! or fragment not present in the target subschema, and any selection set
//! that becomes empty as a result (a composite-type field with zero
//! surviving sub-selections is invalid GraphQL and must be dropped entirely,
//! not sent as `{}`).

use apollo_compiler::schema::ExtendedType;
use apollo_compiler::validation::Valid;
use apollo_compiler::Schema;

use crate::delegation::DelegationContext;
use crate::transforms::{PlanSelection, PlanSelectionSet, Transform, TransformContext};

pub struct FilterToSchema;

fn field_exists(schema: &Schema, type_name: &str, field_name: &str) -> bool {
    if field_name == "__typename" {
        return true;
    }
    match schema.types.get(type_name) {
        Some(ExtendedType::Object(o)) => o.fields.contains_key(field_name),
        Some(ExtendedType::Interface(i)) => i.fields.contains_key(field_name),
        _ => false,
    }
}

fn is_leaf(schema: &Schema, type_name: &str) -> bool {
    matches!(
        schema.types.get(type_name),
        Some(ExtendedType::Scalar(_)) | Some(ExtendedType::Enum(_)) | None
    )
}

fn filter(set: &mut PlanSelectionSet, schema: &Schema) {
    let mut kept = Vec::with_capacity(set.selections.len());
    for mut selection in set.selections.drain(..) {
        match &mut selection {
            PlanSelection::Field(field) => {
                if !field_exists(schema, set.type_name.as_str(), field.name.as_str()) {
                    continue;
                }
                filter(&mut field.selection_set, schema);
                let child_type_is_leaf = is_leaf(schema, field.selection_set.type_name.as_str());
                if !child_type_is_leaf && field.selection_set.is_empty() {
                    continue;
                }
                kept.push(selection);
            }
            PlanSelection::InlineFragment(frag) => {
                if let Some(cond) = &frag.type_condition {
                    if !schema.types.contains_key(cond) {
                        continue;
                    }
                }
                filter(&mut frag.selection_set, schema);
                if frag.selection_set.is_empty() {
                    continue;
                }
                kept.push(selection);
            }
        }
    }
    set.selections = kept;
}

impl Transform for FilterToSchema {
    fn transform_request(
        &self,
        mut request: PlanSelectionSet,
        target_schema: &Valid<Schema>,
        _delegation_context: &DelegationContext<'_>,
        _transform_context: &mut TransformContext,
    ) -> PlanSelectionSet {
        filter(&mut request, target_schema);
        request
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transforms::{PlanField, PlanSelectionSet};
    use apollo_compiler::Name;

    #[test]
    fn drops_fields_absent_from_target_schema() {
        let schema = Schema::parse_and_validate("type Query { a: Int } schema { query: Query }", "t.graphql").unwrap();
        let mut set = PlanSelectionSet {
            type_name: Name::new_unchecked("Query"),
            selections: vec![
                PlanSelection::Field(PlanField {
                    alias: None,
                    name: Name::new_unchecked("a"),
                    arguments: Vec::new(),
                    selection_set: PlanSelectionSet::empty(Name::new_unchecked("Int")),
                }),
                PlanSelection::Field(PlanField {
                    alias: None,
                    name: Name::new_unchecked("b"),
                    arguments: Vec::new(),
                    selection_set: PlanSelectionSet::empty(Name::new_unchecked("Int")),
                }),
            ],
        };
        filter(&mut set, &schema);
        assert_eq!(set.selections.len(), 1);
    }
}
