//! C6: External Object Annotation (§4.6, §3 `ExternalObject`).
//!
//! A parent value returned by a delegated sub-execution, tagged with enough
//! provenance that [`crate::planner`] and [`crate::resolver`] can decide which
//! subschema to ask for a field that isn't present yet.

use std::sync::Mutex;

use apollo_compiler::Name;
use indexmap::IndexMap;
use serde_json_bytes::{ByteString, Value as JsonValue};

use crate::error::{PathSegment, SingleStitchError};
use crate::receiver::Receiver;
use crate::transforms::PlanSelectionSet;

/// A parent object carrying the three hidden annotations described in §3:
/// origin subschema, per-field provenance, and unpathed errors. Constructed
/// exclusively by [`annotate`] and mutated exclusively by [`merge_external`],
/// matching the single-writer discipline described in §5 "Shared state".
#[derive(Debug)]
pub struct ExternalObject {
    pub data: JsonValue,
    pub object_subschema: usize,
    pub field_subschema_map: IndexMap<Name, usize>,
    /// Errors that already carry their own correct path (§7 kind 3,
    /// `SubschemaFieldError`) -- passed through unchanged rather than
    /// relocated to whichever field a resolver next happens to read
    /// (invariant 4 only governs genuinely unpathed errors).
    pub pathed_errors: Vec<SingleStitchError>,
    /// Errors with no path yet (§7 kind 4, `UnpathedError`). Shared via
    /// [`crate::batch_loader`] as `Arc<ExternalObject>` across sibling field
    /// resolves, so relocating one requires removing it from here through a
    /// lock rather than merely peeking at it -- see [`Self::take_unpathed_error`].
    unpathed_errors: Mutex<Vec<SingleStitchError>>,
    pub receiver: Option<Receiver>,
}

impl Clone for ExternalObject {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            object_subschema: self.object_subschema,
            field_subschema_map: self.field_subschema_map.clone(),
            pathed_errors: self.pathed_errors.clone(),
            unpathed_errors: Mutex::new(lock(&self.unpathed_errors).clone()),
            receiver: self.receiver.clone(),
        }
    }
}

fn lock(mutex: &Mutex<Vec<SingleStitchError>>) -> std::sync::MutexGuard<'_, Vec<SingleStitchError>> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ExternalObject {
    /// Removes and returns the first still-pending unpathed error, if any
    /// (§4.9 "first field read" relocates *an* error, not every subsequent
    /// null read of the same parent -- invariant 4). Once taken, it is gone
    /// from this parent for good.
    pub fn take_unpathed_error(&self) -> Option<SingleStitchError> {
        let mut errors = lock(&self.unpathed_errors);
        if errors.is_empty() {
            None
        } else {
            Some(errors.remove(0))
        }
    }

    fn push_unpathed(&self, error: SingleStitchError) {
        lock(&self.unpathed_errors).push(error);
    }

    fn append_unpathed(&self, other: &ExternalObject) {
        let mut taken = std::mem::take(&mut *lock(&other.unpathed_errors));
        lock(&self.unpathed_errors).append(&mut taken);
    }
}

/// Constructs a fresh [`ExternalObject`] from one subschema's sub-result
/// (§4.6 `annotate`). `unpathed_errors` are expected to genuinely lack a path
/// (§4.5 step 6 has already relocated anything that had one into a caller-set
/// [`ExternalObject::pathed_errors`]); invariant 4 holds for these from
/// construction.
pub fn annotate(data: JsonValue, unpathed_errors: Vec<SingleStitchError>, subschema: usize) -> ExternalObject {
    ExternalObject {
        data,
        object_subschema: subschema,
        field_subschema_map: IndexMap::new(),
        pathed_errors: Vec::new(),
        unpathed_errors: Mutex::new(unpathed_errors),
        receiver: None,
    }
}

/// Type test mirroring the source's presence-of-hidden-property check: in
/// this statically typed port the tag is simply the variant itself, so this
/// exists only to keep call sites readable at the boundary with untyped
/// `JsonValue` trees coming back from an executor.
pub fn is_external_object(value: &JsonValue) -> bool {
    value.is_object()
}

/// Synthesizes the "null result" substituted for a source that errored or
/// returned null, so every response key named by `selection_set` gets an
/// explicit null, plus -- when `error` is given -- its own copy of `error`
/// relocated to that key's path (§4.6 `mergeExternal`: "every response key
/// ... carries the relocated error or null").
fn null_result(
    selection_set: &PlanSelectionSet,
    path: &[PathSegment],
    error: Option<&SingleStitchError>,
) -> (JsonValue, Vec<SingleStitchError>) {
    let mut map = serde_json_bytes::Map::new();
    let mut relocated = Vec::new();
    for selection in &selection_set.selections {
        if let crate::transforms::PlanSelection::Field(field) = selection {
            let response_key = field.response_key().to_string();
            if let Some(error) = error {
                let mut field_path = path.to_vec();
                field_path.push(PathSegment::Field(response_key.clone()));
                relocated.push(SingleStitchError::SubschemaFieldError {
                    message: error.to_string(),
                    path: field_path,
                    extensions: None,
                });
            }
            map.insert(ByteString::from(response_key), JsonValue::Null);
        }
    }
    (JsonValue::Object(map), relocated)
}

/// Sets every key present in `synthesized` on `target.data` (without
/// overwriting a key the target already has) and records `subschema` as that
/// key's provenance, so a field that was explicitly nulled is still
/// distinguishable from one that was never attempted (invariant 3).
fn apply_null_result(target: &mut ExternalObject, synthesized: &JsonValue, subschema: usize) {
    let inserted_keys: Vec<ByteString> = match (&mut target.data, synthesized) {
        (JsonValue::Object(target_map), JsonValue::Object(source_map)) => source_map
            .iter()
            .map(|(key, value)| {
                target_map.entry(key.clone()).or_insert_with(|| value.clone());
                key.clone()
            })
            .collect(),
        _ => Vec::new(),
    };
    for key in inserted_keys {
        target
            .field_subschema_map
            .entry(Name::new_unchecked(key.as_str()))
            .or_insert(subschema);
    }
}

/// C6's merge primitive (§4.6). Folds zero or more sources — each either an
/// [`ExternalObject`] or a captured error representing a failed/absent
/// sub-request — into `target`, rebuilding `field_subschema_map` and
/// concatenating `unpathed_errors`/`pathed_errors` per the rules in §4.6.
pub fn merge_external(
    path: &[PathSegment],
    mut target: ExternalObject,
    sources: Vec<Result<ExternalObject, SingleStitchError>>,
    selection_sets: &[PlanSelectionSet],
) -> ExternalObject {
    for (i, source) in sources.into_iter().enumerate() {
        let selection_set = selection_sets.get(i);
        match source {
            Ok(mut ext) => {
                if ext.data.is_null() {
                    if let Some(selection_set) = selection_set {
                        let (synthesized, _) = null_result(selection_set, path, None);
                        apply_null_result(&mut target, &synthesized, ext.object_subschema);
                    }
                } else {
                    if let (JsonValue::Object(target_map), JsonValue::Object(source_map)) =
                        (&mut target.data, &ext.data)
                    {
                        for (key, value) in source_map.iter() {
                            target_map.insert(key.clone(), value.clone());
                        }
                    }
                    for (key, _) in ext.data.as_object().into_iter().flat_map(|m| m.iter()) {
                        let provenance = ext
                            .field_subschema_map
                            .get(&Name::new_unchecked(key.as_str()))
                            .copied()
                            .unwrap_or(ext.object_subschema);
                        target
                            .field_subschema_map
                            .insert(Name::new_unchecked(key.as_str()), provenance);
                    }
                }
                target.append_unpathed(&ext);
                target.pathed_errors.append(&mut ext.pathed_errors);
                if ext.receiver.is_some() {
                    target.receiver = ext.receiver;
                }
            }
            Err(error) => {
                if let Some(selection_set) = selection_set {
                    let (synthesized, relocated) = null_result(selection_set, path, Some(&error));
                    let origin = target.object_subschema;
                    apply_null_result(&mut target, &synthesized, origin);
                    target.pathed_errors.extend(relocated);
                } else if error.path().is_some() {
                    target.pathed_errors.push(error);
                } else {
                    target.push_unpathed(error);
                }
            }
        }
    }
    target
}
