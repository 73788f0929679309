//! C3: Stitching Index (§4.3).
//!
//! Compiles the immutable, process-wide [`StitchingInfo`] that every
//! delegation during query execution consults: which subschemas can serve
//! which fields of a merged type, what selection set each needs as input, and
//! the resolver that actually fetches from it.

use apollo_compiler::ast::NamedType;
use apollo_compiler::executable::SelectionSet;
use apollo_compiler::schema::ExtendedType;
use apollo_compiler::validation::Valid;
use apollo_compiler::{Name, Schema};
use indexmap::{IndexMap, IndexSet};

use crate::config::is_root_name;
use crate::error::StitchErrors;
use crate::memo::PlanningCache;
use crate::merge::assemble_schema;
use crate::subschema::Subschema;

/// Per-merged-type compiled routing table (§3 `StitchingInfo.mergedTypes[T]`).
pub struct MergedTypeInfo {
    pub type_name: NamedType,
    /// For each subschema that serves this type, every *other* subschema that
    /// also serves it (invariant 2: never includes the source itself).
    pub target_subschemas: IndexMap<usize, Vec<usize>>,
    /// Key selection set each subschema needs supplied before it can be asked
    /// for this type.
    pub selection_sets: IndexMap<usize, Valid<SelectionSet>>,
    /// Per-subschema, per-field selection sets for `@computed` fields.
    pub field_selection_sets: IndexMap<usize, IndexMap<Name, Valid<SelectionSet>>>,
    /// Fields served by exactly one subschema.
    pub unique_fields: IndexMap<Name, usize>,
    /// Fields served by more than one subschema.
    pub non_unique_fields: IndexMap<Name, Vec<usize>>,
}

/// The compiled output of composition (§3, §6): a schema ready to be served
/// plus the routing table every delegation consults. `subschemas` is indexed
/// by position; [`MergedTypeInfo`] and [`crate::delegation::DelegationContext`]
/// refer to subschemas by that index rather than by reference, so the whole
/// thing can be handed to resolvers without lifetime gymnastics.
pub struct StitchedSchema {
    pub schema: Schema,
    pub subschemas: Vec<Subschema>,
    pub merged_types: IndexMap<NamedType, MergedTypeInfo>,
    /// Memoizes [`crate::planner::sort_subschemas_by_proxiability`] (§5
    /// "Memoization"), keyed on the inputs that actually determine its
    /// result: the type name plus the source/target subschema sets. Those
    /// sets repeat often across sibling fields and across rounds of the same
    /// request, and never change meaning for the lifetime of one composed
    /// schema.
    pub proxiability_cache: PlanningCache<(Vec<usize>, Vec<usize>)>,
}

impl StitchedSchema {
    pub fn subschema(&self, index: usize) -> &Subschema {
        &self.subschemas[index]
    }
}

fn composite_type_names(ty: &ExtendedType) -> bool {
    matches!(ty, ExtendedType::Object(_) | ExtendedType::Interface(_) | ExtendedType::Union(_))
}

/// Builds [`StitchedSchema`] from the merged type map produced by C2.
pub fn compile_stitching_info(
    subschemas: Vec<Subschema>,
    merged_type_map: IndexMap<Name, ExtendedType>,
    directives: IndexMap<Name, apollo_compiler::ast::DirectiveDefinition>,
) -> Result<StitchedSchema, StitchErrors> {
    let base = &subschemas
        .first()
        .expect("stitch_schemas requires at least one subschema")
        .transformed_schema;
    let schema = assemble_schema(base, merged_type_map.clone(), directives)?;

    let mut merged_types = IndexMap::new();

    for (type_name, ty) in merged_type_map.iter() {
        if !composite_type_names(ty) && !is_root_name(type_name.as_str()) {
            continue;
        }

        let serving: Vec<usize> = subschemas
            .iter()
            .enumerate()
            .filter(|(_, s)| s.transformed_schema.types.contains_key(type_name))
            .map(|(i, _)| i)
            .collect();
        if serving.len() < 2 && !is_root_name(type_name.as_str()) {
            // Not actually contested across subschemas; no routing needed.
            continue;
        }

        let mut target_subschemas = IndexMap::new();
        for &s in &serving {
            target_subschemas.insert(s, serving.iter().copied().filter(|&t| t != s).collect());
        }

        let mut selection_sets = IndexMap::new();
        let mut field_selection_sets = IndexMap::new();
        for &s in &serving {
            if let Some(cfg) = subschemas[s].merge.get(type_name) {
                if let Some(ss) = &cfg.selection_set {
                    selection_sets.insert(s, ss.clone());
                }
                let mut per_field = IndexMap::new();
                for (field_name, field_cfg) in cfg.fields.iter() {
                    if let Some(ss) = &field_cfg.selection_set {
                        per_field.insert(field_name.clone(), ss.clone());
                    }
                }
                if !per_field.is_empty() {
                    field_selection_sets.insert(s, per_field);
                }
            }
        }

        let mut field_owners: IndexMap<Name, IndexSet<usize>> = IndexMap::new();
        for &s in &serving {
            let fields = fields_of(&subschemas[s].transformed_schema, type_name);
            for field_name in fields {
                field_owners.entry(field_name).or_default().insert(s);
            }
        }

        let mut unique_fields = IndexMap::new();
        let mut non_unique_fields = IndexMap::new();
        for (field_name, owners) in field_owners {
            if owners.len() == 1 {
                unique_fields.insert(field_name, owners.into_iter().next().unwrap());
            } else {
                non_unique_fields.insert(field_name, owners.into_iter().collect());
            }
        }

        merged_types.insert(
            type_name.clone(),
            MergedTypeInfo {
                type_name: type_name.clone(),
                target_subschemas,
                selection_sets,
                field_selection_sets,
                unique_fields,
                non_unique_fields,
            },
        );
    }

    Ok(StitchedSchema {
        schema,
        subschemas,
        merged_types,
        proxiability_cache: PlanningCache::new(256),
    })
}

fn fields_of(schema: &Schema, type_name: &NamedType) -> Vec<Name> {
    match schema.types.get(type_name) {
        Some(ExtendedType::Object(o)) => o.fields.keys().cloned().collect(),
        Some(ExtendedType::Interface(i)) => i.fields.keys().cloned().collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_type_names_excludes_scalars() {
        let scalar = ExtendedType::Scalar(apollo_compiler::Node::new(apollo_compiler::schema::ScalarType {
            description: None,
            name: Name::new_unchecked("ID"),
            directives: Default::default(),
        }));
        assert!(!composite_type_names(&scalar));
    }
}
