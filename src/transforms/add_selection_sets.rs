//! `AddSelectionSets` (§4.4): merges the stitching index's required selection
//! set (key fields, `@computed` dependencies) into the outgoing request, so
//! the target subschema always receives enough of its own type's fields to
//! resolve the entry point it's being asked to serve.

use apollo_compiler::validation::Valid;
use apollo_compiler::Schema;

use crate::delegation::DelegationContext;
use crate::transforms::{PlanSelectionSet, Transform, TransformContext};

pub struct AddSelectionSets;

impl Transform for AddSelectionSets {
    fn transform_request(
        &self,
        mut request: PlanSelectionSet,
        _target_schema: &Valid<Schema>,
        delegation_context: &DelegationContext<'_>,
        _transform_context: &mut TransformContext,
    ) -> PlanSelectionSet {
        let Some(required) = &delegation_context.required_selection_set else {
            return request;
        };
        for selection in &mut request.selections {
            if let crate::transforms::PlanSelection::Field(field) = selection {
                if field.name == delegation_context.field_name {
                    field.selection_set.merge(required);
                }
            }
        }
        request
    }
}
