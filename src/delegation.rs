//! C5: Delegator (§4.5).
//!
//! The single place that turns "I need this selection set served by that
//! subschema" into a sub-request, runs it through the transform pipeline, and
//! returns an annotated [`ExternalObject`].

use apollo_compiler::Name;
use serde_json_bytes::{Map as JsonMap, Value as JsonValue};
use tracing::{debug, warn};

use crate::error::{PathSegment, SingleStitchError, StitchError};
use crate::external_object::annotate;
use crate::external_object::ExternalObject;
use crate::receiver::Receiver;
use crate::stitching_info::StitchedSchema;
use crate::subschema::{ExecutorResponse, SubschemaError};
use crate::transforms::{apply_request_transforms, apply_result_transforms, build_request, PlanSelectionSet, TransformContext};

/// Immutable per-delegation record (§3 `DelegationContext`). Built fresh for
/// every call into [`delegate`]; nothing here outlives one delegation.
pub struct DelegationContext<'a> {
    pub subschema: usize,
    pub operation_type: &'a str,
    pub field_name: Name,
    pub args: JsonMap<String, JsonValue>,
    pub return_type: Name,
    /// If true, the caller (the planner, stitching together a round) wants
    /// the raw sub-result without an extra layer of type merging applied on
    /// top — used when delegating for a key fetch rather than a full field
    /// resolve (§3 `skipTypeMerging`).
    pub skip_type_merging: bool,
    /// The union of selection sets [`crate::stitching_info::MergedTypeInfo`]
    /// says this subschema needs before it can serve the requested fields —
    /// merged into the outgoing request by [`crate::transforms::AddSelectionSets`]
    /// (§4.2 `MergedTypeConfig.selectionSet`/`fields[f].selectionSet`).
    pub required_selection_set: Option<PlanSelectionSet>,
}

fn relocate_errors(errors: Vec<SubschemaError>, delegation_path: &[PathSegment]) -> (Vec<SingleStitchError>, Vec<SingleStitchError>) {
    let mut pathed = Vec::new();
    let mut unpathed = Vec::new();
    for error in errors {
        match error.path {
            Some(mut path) => {
                let mut full_path = delegation_path.to_vec();
                full_path.append(&mut path);
                pathed.push(SingleStitchError::SubschemaFieldError {
                    message: error.message,
                    path: full_path,
                    extensions: error.extensions,
                });
            }
            None => unpathed.push(SingleStitchError::UnpathedError {
                message: error.message,
                extensions: error.extensions,
            }),
        }
    }
    (pathed, unpathed)
}

/// Runs one delegation (§4.5 steps 1-6): build the request, transform it,
/// execute, transform the result back, and annotate it.
pub async fn delegate(
    stitched: &StitchedSchema,
    delegation_context: &DelegationContext<'_>,
    selection_set: PlanSelectionSet,
    variables: JsonMap<String, JsonValue>,
    variable_defs: &str,
    delegation_path: &[PathSegment],
) -> ExternalObject {
    let subschema = stitched.subschema(delegation_context.subschema);

    debug!(
        subschema = %subschema.name,
        field = %delegation_context.field_name,
        selections = selection_set.selections.len(),
        "delegating"
    );

    let mut root = PlanSelectionSet::empty(Name::new_unchecked(delegation_context.operation_type));
    let field_selection = crate::transforms::PlanField {
        alias: None,
        name: delegation_context.field_name.clone(),
        arguments: Vec::new(),
        selection_set,
    };
    root.selections.push(crate::transforms::PlanSelection::Field(field_selection));

    let mut contexts: Vec<TransformContext> = Vec::new();
    let transformed = apply_request_transforms(
        &subschema.transforms,
        root,
        &subschema.transformed_schema,
        delegation_context,
        &mut contexts,
    );

    let request = build_request(
        delegation_context.operation_type,
        &transformed,
        variable_defs,
        variables,
        None,
    );

    let response = subschema.executor.execute(request).await;

    match response {
        Ok(ExecutorResponse::Single(result)) => {
            let (pathed, unpathed) = relocate_errors(result.errors, delegation_path);
            if !pathed.is_empty() {
                for error in &pathed {
                    warn!(%error, "subschema field error");
                }
            }
            let data = result.data.unwrap_or(JsonValue::Null);
            let transformed_result = apply_result_transforms(
                &subschema.transforms,
                data,
                delegation_context,
                &mut contexts,
            );
            let mut ext = annotate(transformed_result, unpathed, delegation_context.subschema);
            ext.pathed_errors = pathed;
            ext
        }
        Ok(ExecutorResponse::Stream(stream)) => {
            let mut receiver = Receiver::new(stream, delegation_context.subschema);
            let (initial, _) = receiver.initial_result().await;
            let (pathed, unpathed2) = relocate_errors(initial.errors, delegation_path);
            if !pathed.is_empty() {
                for error in &pathed {
                    warn!(%error, "subschema field error");
                }
            }
            let data = initial.data.unwrap_or(JsonValue::Null);
            let transformed_result = apply_result_transforms(
                &subschema.transforms,
                data,
                delegation_context,
                &mut contexts,
            );
            let mut ext = annotate(transformed_result, unpathed2, delegation_context.subschema);
            ext.pathed_errors = pathed;
            ext.receiver = Some(receiver);
            ext
        }
        Err(err) => {
            let message = transport_error_message(err);
            warn!(subschema = %subschema.name, %message, "delegation transport error");
            annotate(
                JsonValue::Null,
                vec![SingleStitchError::DelegationTransportError {
                    subschema: subschema.name.clone(),
                    message,
                    path: delegation_path.to_vec(),
                }],
                delegation_context.subschema,
            )
        }
    }
}

fn transport_error_message(err: StitchError) -> String {
    err.to_string()
}
