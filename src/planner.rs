//! C7: Merged-Parent Planner (§4.7).
//!
//! Given a parent already partially materialized by one or more source
//! subschemas and a set of field names still needed, decides which target
//! subschemas can be asked for which fields right now (round N), delegates to
//! all of them concurrently, merges the results into a new parent, and
//! recurses for whatever remains unsatisfied.

use std::collections::HashSet;

use apollo_compiler::Name;
use futures::future::join_all;
use indexmap::IndexMap;
use tracing::warn;

use crate::delegation::{delegate, DelegationContext};
use crate::error::{PathSegment, SingleStitchError};
use crate::external_object::{merge_external, ExternalObject};
use crate::stitching_info::{MergedTypeInfo, StitchedSchema};
use crate::subschema::EntryPoint;
use crate::transforms::PlanSelectionSet;

/// Output of [`sort_subschemas_by_proxiability`] (§4.7 Step A).
pub struct Proxiability {
    pub proxiable: Vec<usize>,
    pub non_proxiable: Vec<usize>,
}

/// A subschema `target` is proxiable from `sources` if every field its own
/// key/computed-field dependency names is already present, recursively, in
/// the union of what the source subschemas' transformed schemas expose for
/// this type (§4.7 Step A). Memoized per [`StitchedSchema::proxiability_cache`]
/// since the same (type, sources, targets) triple recurs across sibling
/// fields of one request and across independent requests against the same
/// composed schema.
pub fn sort_subschemas_by_proxiability(
    merged_type_info: &MergedTypeInfo,
    stitched: &StitchedSchema,
    source_subschemas: &[usize],
    target_subschemas: &[usize],
) -> Proxiability {
    let mut sources_key = source_subschemas.to_vec();
    sources_key.sort_unstable();
    let mut targets_key = target_subschemas.to_vec();
    targets_key.sort_unstable();
    let cache_key = (merged_type_info.type_name.clone(), sources_key, targets_key);

    let (proxiable, non_proxiable) = stitched
        .proxiability_cache
        .get_or_insert_with(cache_key, || compute_proxiability(merged_type_info, stitched, source_subschemas, target_subschemas));
    Proxiability { proxiable, non_proxiable }
}

fn compute_proxiability(
    merged_type_info: &MergedTypeInfo,
    stitched: &StitchedSchema,
    source_subschemas: &[usize],
    target_subschemas: &[usize],
) -> (Vec<usize>, Vec<usize>) {
    let mut proxiable = Vec::new();
    let mut non_proxiable = Vec::new();

    for &target in target_subschemas {
        let satisfied = match merged_type_info.selection_sets.get(&target) {
            None => true,
            Some(selection_set) => selection_satisfied(stitched, &merged_type_info.type_name, selection_set, source_subschemas),
        };
        if satisfied {
            proxiable.push(target);
        } else {
            non_proxiable.push(target);
        }
    }

    (proxiable, non_proxiable)
}

/// True if every top-level field named in `selection_set` is already exposed,
/// for `type_name`, by at least one of `source_subschemas`'s transformed
/// schemas -- the shared test behind both the type-level key dependency
/// (§4.7 Step A) and the field-level `@computed` dependency (below).
fn selection_satisfied(
    stitched: &StitchedSchema,
    type_name: &Name,
    selection_set: &apollo_compiler::validation::Valid<apollo_compiler::executable::SelectionSet>,
    source_subschemas: &[usize],
) -> bool {
    selection_set.selections.iter().all(|selection| {
        let crate::transforms::PlanSelection::Field(field) = selection else {
            return true;
        };
        source_subschemas.iter().any(|&source| {
            stitched.subschemas[source]
                .transformed_schema
                .types
                .get(type_name)
                .map(|ty| type_has_field(ty, field.name.as_str()))
                .unwrap_or(false)
        })
    })
}

/// Whether `owner`'s `@computed` dependency for `field` (if any) is already
/// satisfied by `source_subschemas` (§4.7 Step A doc: "every field's own
/// key/computed-field dependency names is already present"). A field with no
/// recorded dependency is always satisfied.
fn field_dependency_satisfied(
    stitched: &StitchedSchema,
    merged_type_info: &MergedTypeInfo,
    owner: usize,
    field: &Name,
    source_subschemas: &[usize],
) -> bool {
    merged_type_info
        .field_selection_sets
        .get(&owner)
        .and_then(|per_field| per_field.get(field))
        .map(|selection_set| selection_satisfied(stitched, &merged_type_info.type_name, selection_set, source_subschemas))
        .unwrap_or(true)
}

fn type_has_field(ty: &apollo_compiler::schema::ExtendedType, field_name: &str) -> bool {
    match ty {
        apollo_compiler::schema::ExtendedType::Object(o) => o.fields.contains_key(field_name),
        apollo_compiler::schema::ExtendedType::Interface(i) => i.fields.contains_key(field_name),
        _ => false,
    }
}

/// Output of [`build_delegation_plan`] (§4.7 Step B).
pub struct DelegationPlan {
    pub delegation_map: IndexMap<usize, Vec<Name>>,
    pub proxiable_field_nodes: Vec<Name>,
    pub unproxiable_field_nodes: Vec<Name>,
    /// Subschemas that were proxiable at the type level but held back a field
    /// solely for an unmet `@computed` dependency -- kept separate from
    /// [`Proxiability::non_proxiable`] so the caller can still offer them as a
    /// target in the next round once that dependency is satisfied.
    pub dependency_blocked_owners: Vec<usize>,
}

/// Assigns each requested field to a proxiable subschema, preferring a
/// subschema already targeted earlier in this same round so that a batch of
/// sibling fields collapses into as few sub-requests as possible (§4.7
/// "Prefer a subschema already targeted in this round"). A subschema that is
/// type-level proxiable but whose `@computed` dependency for this particular
/// field isn't met yet is treated as unavailable for that field only.
pub fn build_delegation_plan(
    stitched: &StitchedSchema,
    merged_type_info: &MergedTypeInfo,
    proxiable: &[usize],
    field_names: &[Name],
    source_subschemas: &[usize],
) -> DelegationPlan {
    let proxiable_set: HashSet<usize> = proxiable.iter().copied().collect();
    let mut delegation_map: IndexMap<usize, Vec<Name>> = IndexMap::new();
    let mut proxiable_field_nodes = Vec::new();
    let mut unproxiable_field_nodes = Vec::new();
    let mut dependency_blocked_owners = Vec::new();

    let eligible = |owner: usize, field: &Name| {
        proxiable_set.contains(&owner) && field_dependency_satisfied(stitched, merged_type_info, owner, field, source_subschemas)
    };

    for field in field_names {
        if field.as_str() == "__typename" {
            continue;
        }
        if let Some(&owner) = merged_type_info.unique_fields.get(field) {
            if eligible(owner, field) {
                delegation_map.entry(owner).or_default().push(field.clone());
                proxiable_field_nodes.push(field.clone());
            } else {
                if proxiable_set.contains(&owner) {
                    dependency_blocked_owners.push(owner);
                }
                unproxiable_field_nodes.push(field.clone());
            }
            continue;
        }
        if let Some(owners) = merged_type_info.non_unique_fields.get(field) {
            let already_targeted = owners.iter().find(|&&o| delegation_map.contains_key(&o) && eligible(o, field));
            let chosen = already_targeted.copied().or_else(|| owners.iter().copied().find(|&o| eligible(o, field)));
            match chosen {
                Some(subschema) => {
                    delegation_map.entry(subschema).or_default().push(field.clone());
                    proxiable_field_nodes.push(field.clone());
                }
                None => {
                    dependency_blocked_owners.extend(owners.iter().copied().filter(|&o| proxiable_set.contains(&o)));
                    unproxiable_field_nodes.push(field.clone());
                }
            }
            continue;
        }
        // Field unknown to the stitching index entirely (not served by any
        // subschema contributing to this merged type): always unproxiable.
        unproxiable_field_nodes.push(field.clone());
    }

    DelegationPlan {
        delegation_map,
        proxiable_field_nodes,
        unproxiable_field_nodes,
        dependency_blocked_owners,
    }
}

fn selection_set_for(field_names: &[Name], type_name: Name) -> PlanSelectionSet {
    PlanSelectionSet {
        type_name,
        selections: field_names
            .iter()
            .map(|name| {
                crate::transforms::PlanSelection::Field(crate::transforms::PlanField {
                    alias: None,
                    name: name.clone(),
                    arguments: Vec::new(),
                    selection_set: PlanSelectionSet::empty(Name::new_unchecked("Unknown")),
                })
            })
            .collect(),
    }
}

/// Plans and executes however many rounds are needed to satisfy `field_names`
/// on `parent`, recursing per §4.7's round-execution algorithm. Terminates
/// because each recursive call's `target_subschemas` strictly shrinks
/// (invariant 5): the non-proxiable set from this round becomes the new
/// target set, and a round that finds no newly-proxiable subschema simply
/// stops recursing.
pub async fn plan_and_execute(
    stitched: &StitchedSchema,
    merged_type_info: &MergedTypeInfo,
    parent: ExternalObject,
    field_names: Vec<Name>,
    source_subschemas: Vec<usize>,
    target_subschemas: Vec<usize>,
) -> ExternalObject {
    if target_subschemas.is_empty() || field_names.is_empty() {
        return parent;
    }

    let proxiability = sort_subschemas_by_proxiability(merged_type_info, stitched, &source_subschemas, &target_subschemas);
    let plan = build_delegation_plan(stitched, merged_type_info, &proxiability.proxiable, &field_names, &source_subschemas);

    if plan.delegation_map.is_empty() {
        for field in &plan.unproxiable_field_nodes {
            warn!(
                type_name = %merged_type_info.type_name,
                response_key = %field,
                "planner dead end"
            );
        }
        return parent;
    }

    // Each target subschema keys on its *own* `@key` selection set (§3
    // `MergedTypeConfig.selectionSet` is per-subschema), so the value handed
    // to its entry point must come from that subschema's own first key field,
    // not an arbitrary "first iterated" one shared across every target
    // (§4.7 "each target subschema has its own selectionSets[S]/key").
    let key_value_for = |subschema: usize| -> Option<serde_json_bytes::Value> {
        parent.data.as_object().and_then(|m| {
            merged_type_info
                .selection_sets
                .get(&subschema)
                .and_then(|ss| ss.selections.first())
                .and_then(|s| match s {
                    crate::transforms::PlanSelection::Field(f) => m.get(f.name.as_str()),
                    _ => None,
                })
                .cloned()
        })
    };

    let futures = plan.delegation_map.iter().map(|(&subschema, fields)| {
        let required_selection_set = merged_type_info.selection_sets.get(&subschema).map(|ss| {
            PlanSelectionSet {
                type_name: merged_type_info.type_name.clone(),
                selections: ss.selections.clone(),
            }
        });
        let entry_point = stitched.subschemas[subschema].merge.get(&merged_type_info.type_name).and_then(|c| c.entry_point.clone());
        let selection_set = selection_set_for(fields, merged_type_info.type_name.clone());
        let key_value = key_value_for(subschema);
        async move {
            // An entry-point delegation calls a *root* field (e.g.
            // `userById(id: ...)`), so the executor's response nests the
            // type's fields one level down, under that field's response key
            // -- unlike a passive delegation, whose response already is the
            // type's fields. Track the key to unwrap once the result is back.
            let mut is_batch = false;
            let (field_name, args, variable_defs, entry_point_field) = match entry_point {
                Some(EntryPoint::Single { field_name, args_from_key }) => {
                    let mut args = serde_json_bytes::Map::new();
                    if args_from_key {
                        if let Some(v) = key_value {
                            args.insert("key".to_string(), v);
                        }
                    }
                    let unwrap_key = field_name.clone();
                    (field_name, args, String::new(), Some(unwrap_key))
                }
                Some(EntryPoint::Batch { field_name, args_from_keys, .. }) => {
                    is_batch = true;
                    // A batch entry point (e.g. `usersByIds(ids: [ID!]!)`) takes a
                    // *list* of key values under `argsFromKeys`, even though a single
                    // round here only ever resolves one parent's key (§4.11 `@merge(key:
                    // ..., argsFromKeys: ...)`; true cross-parent coalescing would need
                    // the batch loader to key on type identity rather than per-parent --
                    // not something this planner's round structure does today).
                    let mut args = serde_json_bytes::Map::new();
                    if let Some(v) = key_value {
                        args.insert(args_from_keys, serde_json_bytes::Value::Array(vec![v]));
                    }
                    let unwrap_key = field_name.clone();
                    (field_name, args, String::new(), Some(unwrap_key))
                }
                None => (merged_type_info.type_name.clone(), serde_json_bytes::Map::new(), String::new(), None),
            };
            let delegation_context = DelegationContext {
                subschema,
                operation_type: "query",
                field_name,
                args: args.clone(),
                return_type: merged_type_info.type_name.clone(),
                skip_type_merging: false,
                required_selection_set,
            };
            let path: Vec<PathSegment> = Vec::new();
            let mut result = delegate(stitched, &delegation_context, selection_set, args, &variable_defs, &path).await;
            if let Some(entry_field) = entry_point_field {
                let mut unwrapped = result
                    .data
                    .as_object()
                    .and_then(|m| m.get(entry_field.as_str()))
                    .cloned()
                    .unwrap_or(serde_json_bytes::Value::Null);
                // A batch entry point returns a list matched positionally to the
                // `argsFromKeys` list we sent; since exactly one key went out this
                // round, the result we want is that list's sole element.
                if is_batch {
                    unwrapped = unwrapped
                        .as_array()
                        .and_then(|items| items.first())
                        .cloned()
                        .unwrap_or(serde_json_bytes::Value::Null);
                }
                result.data = unwrapped;
            }
            (subschema, result)
        }
    });

    let round_results = join_all(futures).await;

    let selection_sets_by_index: Vec<PlanSelectionSet> = round_results
        .iter()
        .map(|(subschema, _)| {
            merged_type_info
                .selection_sets
                .get(subschema)
                .map(|ss| PlanSelectionSet {
                    type_name: merged_type_info.type_name.clone(),
                    selections: ss.selections.clone(),
                })
                .unwrap_or_else(|| PlanSelectionSet::empty(merged_type_info.type_name.clone()))
        })
        .collect();

    let sources: Vec<Result<ExternalObject, SingleStitchError>> = round_results.into_iter().map(|(_, r)| Ok(r)).collect();

    let merged_parent = merge_external(&[], parent, sources, &selection_sets_by_index);

    let new_sources: Vec<usize> = source_subschemas
        .into_iter()
        .chain(plan.delegation_map.keys().copied())
        .collect();

    // A subschema held back only because one field's `@computed` dependency
    // wasn't met yet (`dependency_blocked_owners`) stays a candidate target
    // for the next round -- its dependency may be satisfied now that
    // `new_sources` has grown (§4.7: "mark unproxiable" is per-field, not
    // per-subschema, so the subschema itself must still be offered again).
    let mut next_targets = proxiability.non_proxiable;
    for owner in plan.dependency_blocked_owners {
        if !new_sources.contains(&owner) && !next_targets.contains(&owner) {
            next_targets.push(owner);
        }
    }

    Box::pin(plan_and_execute(
        stitched,
        merged_type_info,
        merged_parent,
        plan.unproxiable_field_nodes,
        new_sources,
        next_targets,
    ))
    .await
}
