//! `AddTypename` (§4.4): ensures every selection set that selects at least
//! one field also selects `__typename`, so the receiving side can always tell
//! which concrete type it got back — needed by [`super::ExpandAbstractTypes`]
//! downstream and by the default merged resolver (C9) when reassembling
//! abstract-type results.

use apollo_compiler::validation::Valid;
use apollo_compiler::{Name, Schema};

use crate::delegation::DelegationContext;
use crate::transforms::{PlanField, PlanSelection, PlanSelectionSet, Transform, TransformContext};

pub struct AddTypename;

fn add_typename_recursive(set: &mut PlanSelectionSet) {
    if !set.selections.is_empty() && !set.has_typename() {
        set.selections.push(PlanSelection::Field(PlanField {
            alias: None,
            name: Name::new_unchecked("__typename"),
            arguments: Vec::new(),
            selection_set: PlanSelectionSet::empty(set.type_name.clone()),
        }));
    }
    for selection in &mut set.selections {
        match selection {
            PlanSelection::Field(field) => add_typename_recursive(&mut field.selection_set),
            PlanSelection::InlineFragment(frag) => add_typename_recursive(&mut frag.selection_set),
        }
    }
}

impl Transform for AddTypename {
    fn transform_request(
        &self,
        mut request: PlanSelectionSet,
        _target_schema: &Valid<Schema>,
        _delegation_context: &DelegationContext<'_>,
        _transform_context: &mut TransformContext,
    ) -> PlanSelectionSet {
        add_typename_recursive(&mut request);
        request
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adds_typename_once_per_nonempty_selection_set() {
        let mut set = PlanSelectionSet {
            type_name: Name::new_unchecked("User"),
            selections: vec![PlanSelection::Field(PlanField {
                alias: None,
                name: Name::new_unchecked("id"),
                arguments: Vec::new(),
                selection_set: PlanSelectionSet::empty(Name::new_unchecked("ID")),
            })],
        };
        add_typename_recursive(&mut set);
        assert!(set.has_typename());
        add_typename_recursive(&mut set);
        let typename_count = set
            .selections
            .iter()
            .filter(|s| matches!(s, PlanSelection::Field(f) if f.name.as_str() == "__typename"))
            .count();
        assert_eq!(typename_count, 1);
    }
}
