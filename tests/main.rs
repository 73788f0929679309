// Integration tests are modules of tests/main.rs.

mod common;

mod abstract_type_spread_expansion;
mod computed_field_dependency;
mod deferred_stream;
mod planner_dead_end;
mod two_subschema_merge_by_key;
