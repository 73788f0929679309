//! C9: Default Merged Resolver (§4.9).
//!
//! The resolver installed on every field of a merged or proxied type. Short-
//! circuits when the parent already carries the requested field's data;
//! otherwise routes through the per-parent [`crate::batch_loader`] into the
//! [`crate::planner`].

use std::sync::Arc;

use apollo_compiler::Name;
use serde_json_bytes::Value as JsonValue;

use crate::batch_loader::{parent_key, BatchLoaderRegistry};
use crate::error::{PathSegment, SingleStitchError};
use crate::external_object::ExternalObject;
use crate::receiver::Receiver;
use crate::stitching_info::StitchedSchema;

/// What resolving one field on a merged type ultimately yields, once any
/// located error has been relocated to this field's own path (§7
/// `UnpathedError`, invariant 4).
pub enum ResolvedField {
    Value(JsonValue),
    Error(SingleStitchError),
}

/// Converts a subschema's wire-form value for `response_key` into the value
/// the outer executor should see, lifting a located error at this path if the
/// value is null and one is pending (§4.9 `resolveExternalValue`).
pub fn resolve_external_value(
    parent: &ExternalObject,
    response_key: &str,
    path: &[PathSegment],
) -> ResolvedField {
    let value = parent
        .data
        .as_object()
        .and_then(|m| m.get(response_key))
        .cloned()
        .unwrap_or(JsonValue::Null);

    if value.is_null() {
        if let Some(error) = parent.take_unpathed_error() {
            let mut field_path = path.to_vec();
            field_path.push(PathSegment::Field(response_key.to_string()));
            return ResolvedField::Error(error.relocate(field_path));
        }
    }
    ResolvedField::Value(value)
}

/// Resolves `response_key` on `parent` for a merged type (§4.9 algorithm):
///
/// 1. If the parent already has the key, return it (transformed) immediately.
/// 2. Else if there's a receiver and the field belongs to the source
///    subschema's own schema, ask the receiver for it.
/// 3. Else delegate to the batch loader, which will invoke the planner.
pub async fn resolve_merged_field(
    stitched: &Arc<StitchedSchema>,
    loaders: &BatchLoaderRegistry,
    type_name: &Name,
    parent: Arc<ExternalObject>,
    response_key: Name,
    path: &[PathSegment],
) -> ResolvedField {
    if parent.data.as_object().map(|m| m.contains_key(response_key.as_str())).unwrap_or(false) {
        return resolve_external_value(&parent, response_key.as_str(), path);
    }

    if let Some(receiver) = parent.receiver.clone() {
        let mut deferred_path = path.to_vec();
        deferred_path.push(PathSegment::Field(response_key.to_string()));
        if let Some(value) = receiver_lookup(&receiver, &deferred_path).await {
            return ResolvedField::Value(value);
        }
    }

    let Some(merged_type_info) = stitched.merged_types.get(type_name) else {
        return ResolvedField::Value(JsonValue::Null);
    };

    let source_subschemas = vec![parent.object_subschema];
    let target_subschemas: Vec<usize> = merged_type_info
        .target_subschemas
        .get(&parent.object_subschema)
        .cloned()
        .unwrap_or_default();

    let stitched = stitched.clone();
    let type_name_owned = type_name.clone();
    let key = parent_key(&parent);
    let parent_for_dispatch = (*parent).clone();

    let merged = loaders
        .load(key, response_key.clone(), move |fields| {
            Box::pin(async move {
                let merged_type_info = stitched.merged_types.get(&type_name_owned).expect("merged type info present");
                crate::planner::plan_and_execute(
                    &stitched,
                    merged_type_info,
                    parent_for_dispatch,
                    fields,
                    source_subschemas,
                    target_subschemas,
                )
                .await
            })
        })
        .await;

    resolve_external_value(&merged, response_key.as_str(), path)
}

async fn receiver_lookup(receiver: &Receiver, path: &[PathSegment]) -> Option<JsonValue> {
    receiver.request(path.to_vec()).await
}
