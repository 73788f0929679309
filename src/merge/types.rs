//! Field-level and type-level merge rules used by [`super::merge_candidates`]
//! (§4.2). One function per GraphQL type kind, each following the same shape:
//! start from the canonical candidate (or the first one, if none is marked
//! canonical), then fold every other candidate's fields/members/values into it.

use apollo_compiler::schema::{
    Component, EnumType, EnumValueDefinition, InputObjectType, InputValueDefinition,
    InterfaceType, ObjectType, ScalarType, UnionType,
};
use apollo_compiler::Node;
use indexmap::IndexMap;

use crate::candidate::TypeCandidate;
use crate::error::{SingleStitchError, StitchErrors};

/// Picks the candidate that should drive description/directives/default-value
/// conflicts (§4.2 "canonical wins"); falls back to the last candidate, matching
/// the rest of the engine's last-write-wins default for unannotated conflicts.
fn canonical_index(candidates: &[TypeCandidate<'_>], type_name: &str) -> Result<usize, StitchErrors> {
    let canonical: Vec<usize> = candidates
        .iter()
        .enumerate()
        .filter_map(|(i, c)| {
            c.subschema
                .and_then(|s| s.merge.get(&apollo_compiler::ast::NamedType::new_unchecked(type_name)))
                .filter(|cfg| cfg.canonical)
                .map(|_| i)
        })
        .collect();
    match canonical.len() {
        0 => Ok(candidates.len() - 1),
        1 => Ok(canonical[0]),
        _ => Err(StitchErrors::new(vec![
            SingleStitchError::ConflictingCanonicalDeclaration {
                type_name: type_name.to_owned(),
            },
        ])),
    }
}

pub fn merge_object_types(
    type_name: &str,
    candidates: &[TypeCandidate<'_>],
) -> Result<Node<ObjectType>, StitchErrors> {
    let objects: Vec<&Node<ObjectType>> = candidates
        .iter()
        .filter_map(|c| match &c.ty {
            apollo_compiler::schema::ExtendedType::Object(o) => Some(o),
            _ => None,
        })
        .collect();
    let canonical_idx = canonical_index(candidates, type_name)?.min(objects.len() - 1);
    let canonical = &objects[canonical_idx];

    let mut fields: IndexMap<_, _> = IndexMap::new();
    // Canonical's field definitions are inserted first so a same-named field
    // defined differently by another source loses the conflict (§4.2
    // "canonical wins ... on conflict").
    for (name, field) in canonical.fields.iter() {
        fields.insert(name.clone(), field.clone());
    }
    let mut implements_interfaces = canonical.implements_interfaces.clone();
    for object in &objects {
        for (name, field) in object.fields.iter() {
            fields.entry(name.clone()).or_insert_with(|| field.clone());
        }
        implements_interfaces.extend(object.implements_interfaces.iter().cloned());
    }

    Ok(Node::new(ObjectType {
        description: canonical.description.clone(),
        name: canonical.name.clone(),
        implements_interfaces,
        directives: canonical.directives.clone(),
        fields,
    }))
}

pub fn merge_interface_types(
    type_name: &str,
    candidates: &[TypeCandidate<'_>],
) -> Result<Node<InterfaceType>, StitchErrors> {
    let interfaces: Vec<&Node<InterfaceType>> = candidates
        .iter()
        .filter_map(|c| match &c.ty {
            apollo_compiler::schema::ExtendedType::Interface(i) => Some(i),
            _ => None,
        })
        .collect();
    let canonical_idx = canonical_index(candidates, type_name)?.min(interfaces.len() - 1);
    let canonical = &interfaces[canonical_idx];

    let mut fields: IndexMap<_, Component<apollo_compiler::ast::FieldDefinition>> = IndexMap::new();
    for (name, field) in canonical.fields.iter() {
        fields.insert(name.clone(), field.clone());
    }
    let mut implements_interfaces = canonical.implements_interfaces.clone();
    for interface in &interfaces {
        for (name, field) in interface.fields.iter() {
            fields.entry(name.clone()).or_insert_with(|| field.clone());
        }
        implements_interfaces.extend(interface.implements_interfaces.iter().cloned());
    }

    Ok(Node::new(InterfaceType {
        description: canonical.description.clone(),
        name: canonical.name.clone(),
        implements_interfaces,
        directives: canonical.directives.clone(),
        fields,
    }))
}

pub fn merge_union_types(
    type_name: &str,
    candidates: &[TypeCandidate<'_>],
) -> Result<Node<UnionType>, StitchErrors> {
    let unions: Vec<&Node<UnionType>> = candidates
        .iter()
        .filter_map(|c| match &c.ty {
            apollo_compiler::schema::ExtendedType::Union(u) => Some(u),
            _ => None,
        })
        .collect();
    let canonical = &unions[canonical_index(candidates, type_name)?.min(unions.len() - 1)];

    let mut members = canonical.members.clone();
    for union_ in &unions {
        members.extend(union_.members.iter().cloned());
    }

    Ok(Node::new(UnionType {
        description: canonical.description.clone(),
        name: canonical.name.clone(),
        directives: canonical.directives.clone(),
        members,
    }))
}

pub fn merge_enum_types(
    type_name: &str,
    candidates: &[TypeCandidate<'_>],
) -> Result<Node<EnumType>, StitchErrors> {
    let enums: Vec<&Node<EnumType>> = candidates
        .iter()
        .filter_map(|c| match &c.ty {
            apollo_compiler::schema::ExtendedType::Enum(e) => Some(e),
            _ => None,
        })
        .collect();
    let canonical = &enums[canonical_index(candidates, type_name)?.min(enums.len() - 1)];

    let mut values: IndexMap<_, Component<EnumValueDefinition>> = IndexMap::new();
    for enum_ in &enums {
        for (name, value) in enum_.values.iter() {
            values.entry(name.clone()).or_insert_with(|| value.clone());
        }
    }

    Ok(Node::new(EnumType {
        description: canonical.description.clone(),
        name: canonical.name.clone(),
        directives: canonical.directives.clone(),
        values,
    }))
}

pub fn merge_input_object_types(
    type_name: &str,
    candidates: &[TypeCandidate<'_>],
) -> Result<Node<InputObjectType>, StitchErrors> {
    let inputs: Vec<&Node<InputObjectType>> = candidates
        .iter()
        .filter_map(|c| match &c.ty {
            apollo_compiler::schema::ExtendedType::InputObject(i) => Some(i),
            _ => None,
        })
        .collect();
    let canonical = &inputs[canonical_index(candidates, type_name)?.min(inputs.len() - 1)];

    let mut fields: IndexMap<_, Component<InputValueDefinition>> = IndexMap::new();
    for input in &inputs {
        for (name, field) in input.fields.iter() {
            fields.entry(name.clone()).or_insert_with(|| field.clone());
        }
    }

    Ok(Node::new(InputObjectType {
        description: canonical.description.clone(),
        name: canonical.name.clone(),
        directives: canonical.directives.clone(),
        fields,
    }))
}

/// Scalars can't meaningfully merge field-by-field (invariant 1: a scalar's
/// identity is preserved from its canonical subschema); we just pick one.
pub fn merge_scalar_types(
    type_name: &str,
    candidates: &[TypeCandidate<'_>],
) -> Result<Node<ScalarType>, StitchErrors> {
    let scalars: Vec<&Node<ScalarType>> = candidates
        .iter()
        .filter_map(|c| match &c.ty {
            apollo_compiler::schema::ExtendedType::Scalar(s) => Some(s),
            _ => None,
        })
        .collect();
    let idx = canonical_index(candidates, type_name)?.min(scalars.len() - 1);
    Ok(scalars[idx].clone())
}
