//! C2: Type Merger (§4.2).
//!
//! For every name in the [`crate::candidate::CandidateRegistry`], decides
//! whether to merge all candidates into one type or choose a single winner,
//! then folds the result into one `apollo_compiler::Schema`.

mod types;

use apollo_compiler::schema::ExtendedType;
use apollo_compiler::{Name, Schema};
use indexmap::IndexMap;

use crate::candidate::{CandidateRegistry, TypeCandidate};
use crate::config::{is_root_name, TypeConflictInfo};
use crate::error::StitchErrors;
use crate::subschema::Subschema;

/// What `on_type_conflict` returns: which of the two candidates should win.
pub enum ConflictResolution {
    Left,
    Right,
}

/// True if this name should be merged (as opposed to chosen between), given
/// the config's predicate plus the engine's own non-negotiable rules: root
/// operation type names always merge, as does any type name already carrying
/// per-subschema `merge` configuration (§4.2 "Merge if").
fn should_merge(name: &str, candidates: &[TypeCandidate<'_>], predicate: &dyn Fn(&str, &[&Subschema]) -> bool) -> bool {
    if is_root_name(name) {
        return true;
    }
    let subschemas: Vec<&Subschema> = candidates.iter().filter_map(|c| c.subschema).collect();
    if subschemas
        .iter()
        .any(|s| s.merge.contains_key(&apollo_compiler::ast::NamedType::new_unchecked(name)))
    {
        return true;
    }
    // Specified scalars are never merged across candidates; each subschema's
    // own definition is structurally identical anyway.
    if matches!(name, "String" | "Int" | "Float" | "Boolean" | "ID") {
        return false;
    }
    predicate(name, &subschemas)
}

/// Resolves a multi-candidate "choose" conflict down to one candidate,
/// consulting `on_type_conflict` if supplied, else defaulting to last-write-
/// wins (§4.2 "Otherwise choose").
fn choose<'a>(
    type_name: &str,
    candidates: Vec<TypeCandidate<'a>>,
    on_conflict: Option<&dyn Fn(TypeCandidate<'_>, TypeCandidate<'_>, TypeConflictInfo<'_>) -> ConflictResolution>,
) -> TypeCandidate<'a> {
    let Some(on_conflict) = on_conflict else {
        return candidates.into_iter().last().expect("at least one candidate");
    };
    let mut iter = candidates.into_iter();
    let mut winner = iter.next().expect("at least one candidate");
    for next in iter {
        let info = TypeConflictInfo {
            type_name,
            left_subschema: winner.subschema.map(|s| s.name.as_str()),
            right_subschema: next.subschema.map(|s| s.name.as_str()),
        };
        let left = TypeCandidate {
            ty: winner.ty.clone(),
            subschema: winner.subschema,
        };
        let right = TypeCandidate {
            ty: next.ty.clone(),
            subschema: next.subschema,
        };
        winner = match on_conflict(left, right, info) {
            ConflictResolution::Left => winner,
            ConflictResolution::Right => next,
        };
    }
    winner
}

/// Runs C2 over every candidate group, producing the final `typeName ->
/// ExtendedType` map used to build the composed `Schema` (§4.2 "rewireTypes").
pub fn merge_candidates(
    registry: &CandidateRegistry<'_>,
    _subschemas: &[Subschema],
    merge_predicate: &dyn Fn(&str, &[&Subschema]) -> bool,
    on_type_conflict: Option<&dyn Fn(TypeCandidate<'_>, TypeCandidate<'_>, TypeConflictInfo<'_>) -> ConflictResolution>,
) -> Result<IndexMap<Name, ExtendedType>, StitchErrors> {
    let mut out = IndexMap::new();
    let mut errors = Vec::new();

    for (name, candidates) in registry.candidates.iter() {
        if candidates.is_empty() {
            continue;
        }
        let merge = candidates.len() > 1 && should_merge(name.as_str(), candidates, merge_predicate);

        let merged = if merge {
            let kind = std::mem::discriminant(&candidates[0].ty);
            if candidates.iter().any(|c| std::mem::discriminant(&c.ty) != kind) {
                errors.push(crate::error::SingleStitchError::ConflictingCanonicalDeclaration {
                    type_name: name.to_string(),
                });
                continue;
            }
            match merge_same_kind(name.as_str(), candidates) {
                Ok(ty) => ty,
                Err(mut e) => {
                    errors.append(&mut e.causes);
                    continue;
                }
            }
        } else {
            choose(name.as_str(), candidates.clone(), on_type_conflict).ty
        };

        out.insert(name.clone(), merged);
    }

    if !errors.is_empty() {
        return Err(StitchErrors::new(errors));
    }
    Ok(out)
}

fn merge_same_kind(type_name: &str, candidates: &[TypeCandidate<'_>]) -> Result<ExtendedType, StitchErrors> {
    Ok(match &candidates[0].ty {
        ExtendedType::Object(_) => ExtendedType::Object(types::merge_object_types(type_name, candidates)?),
        ExtendedType::Interface(_) => ExtendedType::Interface(types::merge_interface_types(type_name, candidates)?),
        ExtendedType::Union(_) => ExtendedType::Union(types::merge_union_types(type_name, candidates)?),
        ExtendedType::Enum(_) => ExtendedType::Enum(types::merge_enum_types(type_name, candidates)?),
        ExtendedType::InputObject(_) => ExtendedType::InputObject(types::merge_input_object_types(type_name, candidates)?),
        ExtendedType::Scalar(_) => ExtendedType::Scalar(types::merge_scalar_types(type_name, candidates)?),
    })
}

/// Rebuilds a composed `Schema` from a merged type map. `base` supplies the
/// schema's root-operation definition and any other bookkeeping
/// `apollo-compiler` tracks outside of `types`/`directive_definitions` — the
/// first subschema's transformed schema is used for this, then its type and
/// directive maps are fully replaced with the merged ones. Since every
/// subschema in a stitching setup shares the same global type names for
/// anything it wants merged (unlike supergraph composition, which renames),
/// no reference rewriting is needed here beyond that replacement — hence this
/// is far simpler than the source engine's `rewireTypes` (§9 design notes).
pub fn assemble_schema(
    base: &Schema,
    types: IndexMap<Name, ExtendedType>,
    directives: IndexMap<Name, apollo_compiler::ast::DirectiveDefinition>,
) -> Result<Schema, StitchErrors> {
    let mut schema = base.clone();
    schema.directive_definitions.clear();
    for (name, def) in directives {
        schema.directive_definitions.insert(name, apollo_compiler::Node::new(def));
    }
    schema.types.clear();
    for (name, ty) in types {
        schema.types.insert(name, ty);
    }
    Ok(schema)
}
