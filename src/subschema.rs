//! Subschema configuration: the consumer-authored description of one executable
//! schema that participates in a stitched gateway (data model §3, external
//! interfaces §6 of the design).

use std::fmt;
use std::pin::Pin;

use apollo_compiler::ast::NamedType;
use apollo_compiler::executable::SelectionSet;
use apollo_compiler::validation::Valid;
use apollo_compiler::{Name, Schema};
use async_trait::async_trait;
use futures::Stream;
use indexmap::IndexMap;
use serde_json_bytes::{Map as JsonMap, Value as JsonValue};

use crate::error::StitchError;
use crate::transforms::Transform;

/// A request sent to a subschema's executor (§3 `Request`, §6 executor contract).
#[derive(Debug, Clone)]
pub struct Request {
    pub document: String,
    pub operation_name: Option<String>,
    pub variables: JsonMap<String, JsonValue>,
}

/// A GraphQL-shaped error as returned by a subschema (§6 error shape). `path` is
/// `None` for unpathed errors (data model invariant 4).
#[derive(Debug, Clone)]
pub struct SubschemaError {
    pub message: String,
    pub path: Option<Vec<crate::error::PathSegment>>,
    pub extensions: Option<JsonValue>,
}

/// The synchronous result of executing a [`Request`] against a subschema.
#[derive(Debug, Clone, Default)]
pub struct ExecutionResult {
    pub data: Option<JsonValue>,
    pub errors: Vec<SubschemaError>,
}

/// One incremental delivery payload for `@defer`/streamed execution (§4.10, §6).
#[derive(Debug, Clone)]
pub struct Patch {
    pub data: Option<JsonValue>,
    pub path: Vec<crate::error::PathSegment>,
    pub label: Option<String>,
    pub errors: Vec<SubschemaError>,
    pub has_next: bool,
}

/// What an executor hands back: either a single result, or a stream whose first
/// item is the initial result and subsequent items are [`Patch`]es (§6).
pub enum ExecutorResponse {
    Single(ExecutionResult),
    Stream(Pin<Box<dyn Stream<Item = Patch> + Send>>),
}

/// The contract a subschema must fulfil to be delegated to (§6 "Executor
/// contract"). Implemented by the transport layer, which is out of scope for
/// this crate (§1).
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, request: Request) -> Result<ExecutorResponse, StitchError>;
}

impl fmt::Debug for dyn Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("dyn Executor")
    }
}

/// Per-field configuration within a [`MergedTypeConfig`] (§3). Only fields that
/// are either computed or that require their own selection set carry an entry
/// here; everything else is implicitly "just proxy the field".
#[derive(Debug, Clone, Default)]
pub struct MergedFieldConfig {
    /// Selection set this subschema needs on the *source* object before it can
    /// compute this field (§4.2's `@computed`).
    pub selection_set: Option<Valid<SelectionSet>>,
    pub computed: bool,
    /// This subschema is the canonical owner of this field's SDL-level
    /// definition (§4.2, §4.11 `@canonical` on a field).
    pub canonical: bool,
}

/// How a merged type's entry point accepts its keys (§3, §4.11 `@merge`).
#[derive(Debug, Clone)]
pub enum EntryPoint {
    /// Single-object fetch: `fieldName(args: ...): T`.
    Single { field_name: Name, args_from_key: bool },
    /// Batched fetch: `fieldName(keys: [KeyScalar!]!): [T]!`. `key` names the
    /// field that supplies an individual key value, and results are matched
    /// back to inputs positionally.
    Batch {
        field_name: Name,
        key: String,
        args_from_keys: String,
    },
}

/// Per-subschema, per-type merge configuration (§3 `MergedTypeConfig`).
#[derive(Debug, Clone)]
pub struct MergedTypeConfig {
    /// Selection set this subschema requires to be supplied as input before it
    /// can serve this type at all (the `@key` selection set, §4.11).
    pub selection_set: Option<Valid<SelectionSet>>,
    pub fields: IndexMap<Name, MergedFieldConfig>,
    pub entry_point: Option<EntryPoint>,
    /// If set, this subschema is considered the canonical owner of this type's
    /// SDL-level definition during merging (§4.2, §4.11 `@canonical`).
    pub canonical: bool,
}

impl Default for MergedTypeConfig {
    fn default() -> Self {
        Self {
            selection_set: None,
            fields: IndexMap::new(),
            entry_point: None,
            canonical: false,
        }
    }
}

/// The consumer-authored configuration for one subschema (§6 "Subschema
/// config"). Consumed by [`crate::config::stitch_schemas`].
pub struct SubschemaConfig {
    pub name: String,
    pub schema: Valid<Schema>,
    pub executor: Box<dyn Executor>,
    pub transforms: Vec<Box<dyn Transform>>,
    pub merge: IndexMap<NamedType, MergedTypeConfig>,
    /// If true, merged-type entry points with a `Batch` [`EntryPoint`] are
    /// actually invoked in batches by the [`crate::batch_loader`]; if false,
    /// every key is fetched with its own `Single` round-trip.
    pub batch: bool,
}

impl fmt::Debug for SubschemaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubschemaConfig")
            .field("name", &self.name)
            .field("merge", &self.merge.keys().collect::<Vec<_>>())
            .field("batch", &self.batch)
            .finish()
    }
}

/// A subschema after composition: the original config, plus the schema as
/// rewritten by its own [`Transform::transform_schema`] hooks (§3 `Subschema`,
/// §4.4).
pub struct Subschema {
    pub name: String,
    pub schema: Valid<Schema>,
    pub transformed_schema: Valid<Schema>,
    pub transforms: Vec<Box<dyn Transform>>,
    pub merge: IndexMap<NamedType, MergedTypeConfig>,
    pub executor: Box<dyn Executor>,
    pub batch: bool,
}

impl fmt::Debug for Subschema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subschema").field("name", &self.name).finish()
    }
}

impl PartialEq for Subschema {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}
impl Eq for Subschema {}

impl std::hash::Hash for Subschema {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        (self as *const Subschema).hash(state)
    }
}
