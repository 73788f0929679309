//! `AddArgumentsAsVariables` (§4.4): lifts the extra arguments carried on a
//! [`DelegationContext`] (e.g. a merged type's key value) into GraphQL
//! variables on the outgoing root field, rather than inlining them as literal
//! argument values.

use apollo_compiler::ast::Value;
use apollo_compiler::validation::Valid;
use apollo_compiler::{Name, Node, Schema};

use crate::delegation::DelegationContext;
use crate::transforms::{PlanSelection, PlanSelectionSet, Transform, TransformContext};

pub struct AddArgumentsAsVariables;

impl Transform for AddArgumentsAsVariables {
    fn transform_request(
        &self,
        mut request: PlanSelectionSet,
        _target_schema: &Valid<Schema>,
        delegation_context: &DelegationContext<'_>,
        _transform_context: &mut TransformContext,
    ) -> PlanSelectionSet {
        if delegation_context.args.is_empty() {
            return request;
        }
        for selection in &mut request.selections {
            if let PlanSelection::Field(field) = selection {
                if field.name == delegation_context.field_name {
                    for (key, _) in delegation_context.args.iter() {
                        let var_name = Name::new_unchecked(key);
                        field
                            .arguments
                            .push((var_name.clone(), Node::new(Value::Variable(var_name))));
                    }
                }
            }
        }
        request
    }
}
