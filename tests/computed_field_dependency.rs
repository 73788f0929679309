//! §8 scenario 3: computed field dependency. B's `User.fullName` is
//! `@computed(selectionSet: "{ firstName lastName }")`, sourced from A.
//! Resolving `fullName` on a `User` that A already produced should delegate
//! to B with the dependency already satisfied (A's transformed schema already
//! exposes `firstName`/`lastName`), not get stuck waiting for another round.

use std::sync::Arc;

use apollo_compiler::executable::FieldSet;
use apollo_compiler::validation::Valid;
use apollo_compiler::Name;
use async_trait::async_trait;
use indexmap::IndexMap;

use graphql_stitch::batch_loader::BatchLoaderRegistry;
use graphql_stitch::external_object::annotate;
use graphql_stitch::resolver::{resolve_merged_field, ResolvedField};
use graphql_stitch::subschema::ExecutionResult;
use graphql_stitch::{
    stitch_schemas, EntryPoint, Executor, ExecutorResponse, MergedFieldConfig, MergedTypeConfig, Request, StitchError,
    StitchSchemasConfig, SubschemaConfig,
};

use crate::common::{jobj, jstr, parse};

struct NeverCalled;
#[async_trait]
impl Executor for NeverCalled {
    async fn execute(&self, _request: Request) -> Result<ExecutorResponse, StitchError> {
        panic!("subschema A should not be re-queried -- it already supplied firstName/lastName")
    }
}

struct SubschemaBExecutor;
#[async_trait]
impl Executor for SubschemaBExecutor {
    async fn execute(&self, _request: Request) -> Result<ExecutorResponse, StitchError> {
        Ok(ExecutorResponse::Single(ExecutionResult {
            data: Some(jobj(vec![(
                "userById",
                jobj(vec![("id", jstr("1")), ("fullName", jstr("Ada Lovelace"))]),
            )])),
            errors: Vec::new(),
        }))
    }
}

#[tokio::test]
async fn resolves_computed_field_once_its_dependency_is_already_satisfied() {
    let schema_a = parse(
        "type Query { userById(id: ID!): User! } type User { id: ID! firstName: String! lastName: String! }",
        "a.graphql",
    );
    let schema_b = parse(
        "type Query { userById(id: ID!): User! } type User { id: ID! fullName: String! }",
        "b.graphql",
    );

    let key_selection_set = FieldSet::parse_and_validate(&schema_b, Name::new_unchecked("User"), "{ id }", "key.graphql")
        .expect("key selection set should parse against subschema B");
    let computed_selection_set = FieldSet::parse_and_validate(
        &schema_b,
        Name::new_unchecked("User"),
        "{ firstName lastName }",
        "computed.graphql",
    )
    .expect("computed selection set should parse against subschema B");

    let mut fields = IndexMap::new();
    fields.insert(
        Name::new_unchecked("fullName"),
        MergedFieldConfig {
            selection_set: Some(Valid::assume_valid(computed_selection_set.into_inner().selection_set)),
            computed: true,
            canonical: false,
        },
    );

    let mut merge_b = IndexMap::new();
    merge_b.insert(
        Name::new_unchecked("User"),
        MergedTypeConfig {
            selection_set: Some(Valid::assume_valid(key_selection_set.into_inner().selection_set)),
            fields,
            entry_point: Some(EntryPoint::Single {
                field_name: Name::new_unchecked("userById"),
                args_from_key: true,
            }),
            canonical: false,
        },
    );

    let config = StitchSchemasConfig {
        subschemas: vec![
            SubschemaConfig {
                name: "A".to_owned(),
                schema: schema_a,
                executor: Box::new(NeverCalled),
                transforms: Vec::new(),
                merge: Default::default(),
                batch: false,
            },
            SubschemaConfig {
                name: "B".to_owned(),
                schema: schema_b,
                executor: Box::new(SubschemaBExecutor),
                transforms: Vec::new(),
                merge: merge_b,
                batch: false,
            },
        ],
        ..Default::default()
    };

    let stitched = Arc::new(stitch_schemas(config).expect("composition should succeed"));
    let parent = Arc::new(annotate(
        jobj(vec![
            ("id", jstr("1")),
            ("firstName", jstr("Ada")),
            ("lastName", jstr("Lovelace")),
        ]),
        Vec::new(),
        0,
    ));
    let loaders = BatchLoaderRegistry::new();

    let resolved = resolve_merged_field(
        &stitched,
        &loaders,
        &Name::new_unchecked("User"),
        parent,
        Name::new_unchecked("fullName"),
        &[],
    )
    .await;

    match resolved {
        ResolvedField::Value(value) => assert_eq!(value, jstr("Ada Lovelace")),
        ResolvedField::Error(e) => panic!("expected a value, got error: {e}"),
    }
}
