//! §8 scenario 6: planner dead end. `User.score` is served only by subschema
//! C, whose `@key` requires `email` -- a field that neither the current
//! source (A) nor any subschema reachable from it supplies. `score` should
//! resolve to null with no error (it's nullable), and no subschema should
//! actually be queried, since the planner never finds a proxiable round for
//! it at all (§4.7 "the planner recurses only if delegationMap is
//! non-empty").

use std::sync::Arc;

use apollo_compiler::executable::FieldSet;
use apollo_compiler::validation::Valid;
use apollo_compiler::Name;
use async_trait::async_trait;
use indexmap::IndexMap;

use graphql_stitch::batch_loader::BatchLoaderRegistry;
use graphql_stitch::external_object::annotate;
use graphql_stitch::resolver::{resolve_merged_field, ResolvedField};
use graphql_stitch::{
    stitch_schemas, Executor, ExecutorResponse, MergedTypeConfig, Request, StitchError, StitchSchemasConfig,
    SubschemaConfig,
};

use crate::common::{jobj, jstr, parse};

struct NeverCalled(&'static str);
#[async_trait]
impl Executor for NeverCalled {
    async fn execute(&self, _request: Request) -> Result<ExecutorResponse, StitchError> {
        panic!("subschema {} should never be queried: no route to it exists from the current source", self.0)
    }
}

#[tokio::test]
async fn unreachable_merged_field_resolves_to_null_without_querying_anyone() {
    let schema_a = parse(
        "type Query { userById(id: ID!): User! } type User { id: ID! name: String! }",
        "a.graphql",
    );
    let schema_b = parse(
        "type Query { userById(id: ID!): User! } type User { id: ID! email: String! }",
        "b.graphql",
    );
    let schema_c = parse(
        "type Query { userByEmail(email: String!): User! } type User { id: ID! score: Int! }",
        "c.graphql",
    );

    let key_b = FieldSet::parse_and_validate(&schema_b, Name::new_unchecked("User"), "{ id }", "key_b.graphql")
        .expect("B's key should parse");
    let key_c = FieldSet::parse_and_validate(&schema_c, Name::new_unchecked("User"), "{ email }", "key_c.graphql")
        .expect("C's key should parse");

    let mut merge_b = IndexMap::new();
    merge_b.insert(
        Name::new_unchecked("User"),
        MergedTypeConfig {
            selection_set: Some(Valid::assume_valid(key_b.into_inner().selection_set)),
            ..Default::default()
        },
    );
    let mut merge_c = IndexMap::new();
    merge_c.insert(
        Name::new_unchecked("User"),
        MergedTypeConfig {
            selection_set: Some(Valid::assume_valid(key_c.into_inner().selection_set)),
            ..Default::default()
        },
    );

    let config = StitchSchemasConfig {
        subschemas: vec![
            SubschemaConfig {
                name: "A".to_owned(),
                schema: schema_a,
                executor: Box::new(NeverCalled("A")),
                transforms: Vec::new(),
                merge: Default::default(),
                batch: false,
            },
            SubschemaConfig {
                name: "B".to_owned(),
                schema: schema_b,
                executor: Box::new(NeverCalled("B")),
                transforms: Vec::new(),
                merge: merge_b,
                batch: false,
            },
            SubschemaConfig {
                name: "C".to_owned(),
                schema: schema_c,
                executor: Box::new(NeverCalled("C")),
                transforms: Vec::new(),
                merge: merge_c,
                batch: false,
            },
        ],
        ..Default::default()
    };

    let stitched = Arc::new(stitch_schemas(config).expect("composition should succeed"));
    let parent = Arc::new(annotate(jobj(vec![("id", jstr("1")), ("name", jstr("Ada"))]), Vec::new(), 0));
    let loaders = BatchLoaderRegistry::new();

    let resolved = resolve_merged_field(
        &stitched,
        &loaders,
        &Name::new_unchecked("User"),
        parent,
        Name::new_unchecked("score"),
        &[],
    )
    .await;

    match resolved {
        ResolvedField::Value(value) => assert!(value.is_null(), "expected null, got {value:?}"),
        ResolvedField::Error(e) => panic!("a nullable dead-end field should resolve to null, not an error: {e}"),
    }
}
