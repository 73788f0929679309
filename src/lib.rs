#![allow(dead_code)] // TODO: This is fine while we're iterating, but should be removed later.

//! Core type-merging delegation engine for a schema-stitching gateway (§1-§2).
//!
//! Composes a single schema out of several independent subschemas
//! ([`config::stitch_schemas`], C1-C3), then at query time decomposes
//! incoming operations, delegates to the subschemas that own each field
//! ([`delegation`], C5), and merges results back together across a common
//! key ([`planner`], C7). The underlying query-language parser/executor,
//! network transports, and schema-loading from files/URLs are out of scope
//! (§1) -- this crate only defines the [`subschema::Executor`] contract they
//! must satisfy.

pub mod batch_loader;
pub mod candidate;
pub mod config;
pub mod delegation;
pub mod directives;
pub mod error;
pub mod external_object;
pub mod memo;
pub mod merge;
pub mod planner;
pub mod receiver;
pub mod resolver;
pub mod stitching_info;
pub mod subschema;
pub mod transforms;

pub use crate::config::{stitch_schemas, MergeTypesOption, StitchSchemasConfig, TypeConflictInfo};
pub use crate::directives::stitching_directives_transform;
pub use crate::error::{StitchError, StitchErrors, StitchResult};
pub use crate::external_object::ExternalObject;
pub use crate::stitching_info::StitchedSchema;
pub use crate::subschema::{
    EntryPoint, Executor, ExecutorResponse, MergedFieldConfig, MergedTypeConfig, Patch, Request, Subschema,
    SubschemaConfig, SubschemaError,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subschema::ExecutionResult;
    use apollo_compiler::Schema;
    use async_trait::async_trait;

    struct EmptyExecutor;
    #[async_trait]
    impl Executor for EmptyExecutor {
        async fn execute(&self, _request: Request) -> Result<ExecutorResponse, StitchError> {
            Ok(ExecutorResponse::Single(ExecutionResult::default()))
        }
    }

    /// Single-subschema passthrough (§8 scenario 1): composing one subschema
    /// on its own should produce a schema containing exactly its own types,
    /// with no merged types at all (nothing is contested).
    #[test]
    fn composes_single_subschema_passthrough() {
        let schema = Schema::parse_and_validate(
            "type Query { viewer: User! } type User { id: ID! name: String! }",
            "a.graphql",
        )
        .unwrap();

        let config = StitchSchemasConfig {
            subschemas: vec![SubschemaConfig {
                name: "A".to_owned(),
                schema,
                executor: Box::new(EmptyExecutor),
                transforms: Vec::new(),
                merge: Default::default(),
                batch: false,
            }],
            ..Default::default()
        };

        let stitched = stitch_schemas(config).expect("composition should succeed");
        let user = apollo_compiler::ast::NamedType::new_unchecked("User");
        let query = apollo_compiler::ast::NamedType::new_unchecked("Query");
        assert!(stitched.schema.types.contains_key(&user));
        assert!(stitched.schema.types.contains_key(&query));
        // A single-source type isn't contested, so it shouldn't get a routing
        // table entry (stitching_info only tracks merged/root types).
        assert!(!stitched.merged_types.contains_key(&user));
    }
}
