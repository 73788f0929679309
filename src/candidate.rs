//! C1: Type Candidate Registry (§4.1).
//!
//! Collects every named type contributed by every subschema (plus any
//! user-supplied extension types) and groups them by name, so [`crate::merge`]
//! can decide, per name, whether to merge or choose among the candidates.

use apollo_compiler::ast::NamedType;
use apollo_compiler::schema::ExtendedType;
use apollo_compiler::Schema;
use indexmap::IndexMap;

use crate::error::{SingleStitchError, StitchErrors};
use crate::subschema::Subschema;

/// One subschema's contribution of a type under some name.
#[derive(Clone)]
pub struct TypeCandidate<'a> {
    pub ty: ExtendedType,
    pub subschema: Option<&'a Subschema>,
}

/// `typeName -> [candidate]`, plus the directives accumulated across every
/// candidate schema (§4.1: "directive definitions are merged into a single
/// map").
pub struct CandidateRegistry<'a> {
    pub candidates: IndexMap<NamedType, Vec<TypeCandidate<'a>>>,
    pub directives: IndexMap<apollo_compiler::Name, apollo_compiler::ast::DirectiveDefinition>,
}

/// Introspection types are never candidates: they are synthesized by the
/// executor that ultimately serves the composed schema, not by any subschema.
fn is_introspection_type(name: &str) -> bool {
    name.starts_with("__")
}

/// True if `schema` carries an explicit `schema { ... }` definition (a
/// description, directives, or root operation types renamed away from the
/// GraphQL defaults) rather than relying on the implicit `Query`/`Mutation`/
/// `Subscription` convention. Composing more than one of these is ambiguous:
/// each is a claim to be *the* schema definition of the composed schema
/// (§4.1 "duplicate schema-definition blocks throw").
fn has_explicit_schema_definition(schema: &Schema) -> bool {
    let def = &schema.schema_definition;
    def.description.is_some()
        || !def.directives.is_empty()
        || def.query.as_ref().is_some_and(|n| n.as_str() != "Query")
        || def.mutation.as_ref().is_some_and(|n| n.as_str() != "Mutation")
        || def.subscription.as_ref().is_some_and(|n| n.as_str() != "Subscription")
}

/// Builds the registry described by §4.1, from every subschema plus any
/// extension types/directives supplied directly in [`crate::config::StitchSchemasConfig`].
pub fn build_candidate_registry<'a>(
    subschemas: &'a [Subschema],
    extension_types: Option<&Schema>,
    merge_directives: bool,
) -> Result<CandidateRegistry<'a>, StitchErrors> {
    let mut candidates: IndexMap<NamedType, Vec<TypeCandidate<'a>>> = IndexMap::new();
    let mut directives = IndexMap::new();
    let mut explicit_schema_defs = Vec::new();

    for subschema in subschemas {
        for (name, ty) in subschema.transformed_schema.types.iter() {
            if is_introspection_type(name.as_str()) {
                continue;
            }
            candidates
                .entry(name.clone())
                .or_default()
                .push(TypeCandidate {
                    ty: ty.clone(),
                    subschema: Some(subschema),
                });
        }

        for (name, def) in subschema.transformed_schema.directive_definitions.iter() {
            if merge_directives {
                // Accumulate: later subschemas don't overwrite earlier definitions,
                // but the first-seen definition is kept as the canonical shape.
                directives.entry(name.clone()).or_insert_with(|| (**def).clone());
            } else {
                // Last write wins.
                directives.insert(name.clone(), (**def).clone());
            }
        }

        if has_explicit_schema_definition(&subschema.transformed_schema) {
            explicit_schema_defs.push(subschema.name.clone());
        }
    }

    if let Some(extra) = extension_types {
        for (name, ty) in extra.types.iter() {
            if is_introspection_type(name.as_str()) {
                continue;
            }
            candidates
                .entry(name.clone())
                .or_default()
                .push(TypeCandidate {
                    ty: ty.clone(),
                    subschema: None,
                });
        }
        for (name, def) in extra.directive_definitions.iter() {
            directives.entry(name.clone()).or_insert_with(|| (**def).clone());
        }

        if has_explicit_schema_definition(extra) {
            explicit_schema_defs.push("<extension types>".to_owned());
        }
    }

    if explicit_schema_defs.len() > 1 {
        return Err(StitchErrors::new(
            explicit_schema_defs
                .into_iter()
                .map(|type_name| SingleStitchError::DuplicateSchemaDefinition { type_name })
                .collect(),
        ));
    }

    Ok(CandidateRegistry {
        candidates,
        directives,
    })
}

#[cfg(test)]
mod tests {
    use apollo_compiler::Schema;
    use async_trait::async_trait;

    use crate::config::{stitch_schemas, StitchSchemasConfig};
    use crate::error::{SingleStitchError, StitchError};
    use crate::subschema::{ExecutionResult, Executor, ExecutorResponse, Request, SubschemaConfig};

    struct EmptyExecutor;
    #[async_trait]
    impl Executor for EmptyExecutor {
        async fn execute(&self, _request: Request) -> Result<ExecutorResponse, StitchError> {
            Ok(ExecutorResponse::Single(ExecutionResult::default()))
        }
    }

    fn subschema_config(name: &str, sdl: &str) -> SubschemaConfig {
        SubschemaConfig {
            name: name.to_owned(),
            schema: Schema::parse_and_validate(sdl, format!("{name}.graphql")).unwrap(),
            executor: Box::new(EmptyExecutor),
            transforms: Vec::new(),
            merge: Default::default(),
            batch: false,
        }
    }

    /// §4.1 "duplicate schema-definition blocks throw": two subschemas that
    /// each explicitly rename a root operation type must fail composition
    /// rather than silently picking one.
    #[test]
    fn rejects_duplicate_explicit_schema_definitions() {
        let config = StitchSchemasConfig {
            subschemas: vec![
                subschema_config(
                    "A",
                    "schema { query: RootA } type RootA { a: String } type Other { id: ID! }",
                ),
                subschema_config(
                    "B",
                    "schema { query: RootB } type RootB { b: String } type Other2 { id: ID! }",
                ),
            ],
            ..Default::default()
        };

        let err = stitch_schemas(config).expect_err("duplicate schema-definition blocks should be rejected");
        assert!(err
            .causes
            .iter()
            .any(|c| matches!(c, SingleStitchError::DuplicateSchemaDefinition { .. })));
    }

    /// A single explicit `schema { ... }` block (the common case of a
    /// renamed root type) is fine on its own.
    #[test]
    fn allows_single_explicit_schema_definition() {
        let config = StitchSchemasConfig {
            subschemas: vec![
                subschema_config("A", "schema { query: RootA } type RootA { a: String }"),
                subschema_config("B", "type Query { b: String }"),
            ],
            ..Default::default()
        };

        stitch_schemas(config).expect("a single explicit schema definition should compose fine");
    }
}
