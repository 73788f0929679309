//! Top-level composition entry point (§6 "Composition API") and its config
//! object. Field-level documentation density here deliberately matches
//! [`crate`]'s own `QueryPlannerConfig`-style config structs: every public
//! field explains its default and the trade-off it encodes.

use apollo_compiler::Schema;
use indexmap::IndexMap;
use tracing::{debug, info};

use crate::candidate::{build_candidate_registry, TypeCandidate};
use crate::error::StitchErrors;
use crate::merge::{merge_candidates, ConflictResolution};
use crate::stitching_info::{compile_stitching_info, StitchedSchema};
use crate::subschema::{Subschema, SubschemaConfig};
use crate::transforms::Transform;

/// Controls which type names get merged across subschemas versus simply
/// chosen (§4.2).
pub enum MergeTypesOption {
    /// Merge every type name that appears in more than one subschema, except
    /// specified scalars (the engine's default behavior).
    All,
    /// Never merge; always choose via `on_type_conflict`.
    None,
    /// Merge exactly these type names, in addition to every operation root
    /// name and any name already present in a subschema's `merge` map.
    Named(Vec<String>),
    /// Merge iff this predicate returns true for the type name.
    Predicate(Box<dyn Fn(&str) -> bool + Send + Sync>),
}

impl Default for MergeTypesOption {
    fn default() -> Self {
        MergeTypesOption::All
    }
}

/// Information handed to [`StitchSchemasConfig::on_type_conflict`] describing
/// which two candidates collided and why (§4.2, §6).
pub struct TypeConflictInfo<'a> {
    pub type_name: &'a str,
    pub left_subschema: Option<&'a str>,
    pub right_subschema: Option<&'a str>,
}

/// Configuration for [`stitch_schemas`] (§6 "Composition API").
pub struct StitchSchemasConfig {
    /// The subschemas being stitched together. Order matters only as a
    /// tie-break: later subschemas win "choose" conflicts and last-write-wins
    /// directive merges (§4.1, §4.2), unless `on_type_conflict` is set.
    pub subschemas: Vec<SubschemaConfig>,

    /// Additional type definitions contributed directly by the gateway
    /// (not sourced from any subschema), e.g. types that only exist to tie
    /// subschemas together.
    pub extension_types: Option<Schema>,

    /// Governs which colliding type names are merged rather than chosen
    /// between. Defaults to [`MergeTypesOption::All`].
    pub merge_types: MergeTypesOption,

    /// If true, directive *definitions* with the same name across subschemas
    /// are kept as distinct entries rather than the last one overwriting all
    /// earlier ones (§4.1). Most gateways leave this false.
    pub merge_directives: bool,

    /// Tie-breaker invoked whenever a type name is chosen (not merged) and
    /// more than one subschema defines it. Receiving `None` means "use the
    /// engine's default: the last subschema wins" (§4.2, §6).
    pub on_type_conflict:
        Option<Box<dyn Fn(TypeCandidate<'_>, TypeCandidate<'_>, TypeConflictInfo<'_>) -> ConflictResolution>>,

    /// Rewrites applied to each [`SubschemaConfig`] before composition, e.g.
    /// the directive-driven config compiler (C11, §4.11) turning `@key`/
    /// `@merge`/`@computed`/`@canonical` into `merge` entries.
    pub subschema_config_transforms: Vec<Box<dyn Fn(SubschemaConfig) -> Result<SubschemaConfig, StitchErrors>>>,
}

impl Default for StitchSchemasConfig {
    fn default() -> Self {
        Self {
            subschemas: Vec::new(),
            extension_types: None,
            merge_types: MergeTypesOption::default(),
            merge_directives: false,
            on_type_conflict: None,
            subschema_config_transforms: Vec::new(),
        }
    }
}

/// Runs a subschema's own request/result transforms over its schema once, up
/// front, producing [`Subschema::transformed_schema`] (§3, §4.4
/// `transformSchema`).
fn build_subschema(config: SubschemaConfig) -> Subschema {
    let mut transformed = (*config.schema).clone();
    for transform in &config.transforms {
        transform.transform_schema(&mut transformed);
    }
    Subschema {
        name: config.name,
        schema: config.schema.clone(),
        transformed_schema: apollo_compiler::validation::Valid::assume_valid(transformed),
        transforms: config.transforms,
        merge: config.merge,
        executor: config.executor,
        batch: config.batch,
    }
}

/// The sole composition entry point (§6). Builds the candidate registry (C1),
/// merges or chooses every type name (C2), compiles the stitching index and
/// installs proxying resolvers (C3), and returns the composed, query-ready
/// [`StitchedSchema`].
pub fn stitch_schemas(config: StitchSchemasConfig) -> Result<StitchedSchema, StitchErrors> {
    info!(subschema_count = config.subschemas.len(), "composing stitched schema");

    let mut subschema_configs = config.subschemas;
    for transform in &config.subschema_config_transforms {
        let mut next = Vec::with_capacity(subschema_configs.len());
        for sc in subschema_configs {
            next.push(transform(sc)?);
        }
        subschema_configs = next;
    }

    let subschemas: Vec<Subschema> = subschema_configs.into_iter().map(build_subschema).collect();

    let registry = build_candidate_registry(
        &subschemas,
        config.extension_types.as_ref(),
        config.merge_directives,
    )?;

    debug!(type_count = registry.candidates.len(), "collected type candidates");

    let merge_predicate: Box<dyn Fn(&str, &[&Subschema]) -> bool> = match config.merge_types {
        MergeTypesOption::All => Box::new(|_name: &str, _: &[&Subschema]| true),
        MergeTypesOption::None => Box::new(|name: &str, _: &[&Subschema]| is_root_name(name)),
        MergeTypesOption::Named(names) => {
            Box::new(move |name: &str, _: &[&Subschema]| is_root_name(name) || names.iter().any(|n| n == name))
        }
        MergeTypesOption::Predicate(p) => Box::new(move |name: &str, _: &[&Subschema]| is_root_name(name) || p(name)),
    };

    let merged_type_map = merge_candidates(&registry, &subschemas, merge_predicate.as_ref(), config.on_type_conflict.as_deref())?;

    let stitched = compile_stitching_info(subschemas, merged_type_map, registry.directives)?;

    info!(merged_type_count = stitched.schema.types.len(), "stitched schema composed");
    Ok(stitched)
}

pub(crate) fn is_root_name(name: &str) -> bool {
    matches!(name, "Query" | "Mutation" | "Subscription")
}

/// Convenience used by tests and by [`crate::directives`]: parses a schema
/// string with `apollo-compiler` and validates it, wrapping parse failures in
/// [`crate::error::StitchError`].
pub fn parse_schema(source: &str, name: &str) -> Result<apollo_compiler::validation::Valid<Schema>, crate::error::StitchError> {
    Schema::parse_and_validate(source, name).map_err(|e| crate::error::StitchError::Parse(e.to_string()))
}
