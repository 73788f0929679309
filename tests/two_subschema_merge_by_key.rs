//! §8 scenario 2: two-subschema merge by key. A serves `User.id`/`User.name`;
//! B serves `User.id`/`User.email` behind a `userById(id: ID!)` entry point
//! keyed on `{ id }`. Resolving `email` on a `User` that A already produced
//! should delegate exactly once to B and merge the result back in.

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
    stitch_schemas, EntryPoint, Executor, ExecutorResponse, MergedTypeConfig, Request, StitchError,
    StitchSchemasConfig, SubschemaConfig,
};

use crate::common::{jobj, jstr, parse};

struct NeverCalled;
#[async_trait]
impl Executor for NeverCalled {
    async fn execute(&self, _request: Request) -> Result<ExecutorResponse, StitchError> {
        panic!("subschema A should not be re-queried once its data is already on the parent")
    }
}

struct SubschemaBExecutor;
#[async_trait]
impl Executor for SubschemaBExecutor {
    async fn execute(&self, _request: Request) -> Result<ExecutorResponse, StitchError> {
        Ok(ExecutorResponse::Single(ExecutionResult {
            data: Some(jobj(vec![(
                "userById",
                jobj(vec![("id", jstr("1")), ("email", jstr("a@x"))]),
            )])),
            errors: Vec::new(),
        }))
    }
}

#[tokio::test]
async fn resolves_email_by_delegating_to_the_owning_subschema() {
    let schema_a = parse("type Query { userById(id: ID!): User! } type User { id: ID! name: String! }", "a.graphql");
    let schema_b = parse("type Query { userById(id: ID!): User! } type User { id: ID! email: String! }", "b.graphql");

    let key_selection_set = FieldSet::parse_and_validate(&schema_b, Name::new_unchecked("User"), "{ id }", "key.graphql")
        .expect("key selection set should parse against subschema B");

    let mut merge_b = IndexMap::new();
    merge_b.insert(
        Name::new_unchecked("User"),
        MergedTypeConfig {
            selection_set: Some(Valid::assume_valid(key_selection_set.into_inner().selection_set)),
            entry_point: Some(EntryPoint::Single {
                field_name: Name::new_unchecked("userById"),
                args_from_key: true,
            }),
            ..Default::default()
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
    assert!(stitched.merged_types.contains_key(&Name::new_unchecked("User")));

    let parent = Arc::new(annotate(jobj(vec![("id", jstr("1")), ("name", jstr("Ada"))]), Vec::new(), 0));
    let loaders = BatchLoaderRegistry::new();

    let resolved = resolve_merged_field(
        &stitched,
        &loaders,
        &Name::new_unchecked("User"),
        parent,
        Name::new_unchecked("email"),
        &[],
    )
    .await;

    match resolved {
        ResolvedField::Value(value) => assert_eq!(value, jstr("a@x")),
        ResolvedField::Error(e) => panic!("expected a value, got error: {e}"),
    }
}
