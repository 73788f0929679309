//! §8 scenario 4: abstract type spread expansion. A composed query against
//! `interface Book { id }` (implementations `TextBook`, `ColoringBook`) must
//! reach the target subschema as fragments referring only to the concrete
//! types that subschema actually implements -- unknown implementations are
//! stripped, never sent.

use apollo_compiler::Name;

use graphql_stitch::delegation::DelegationContext;
use graphql_stitch::transforms::{
    ExpandAbstractTypes, FilterToSchema, PlanField, PlanInlineFragment, PlanSelection, PlanSelectionSet, Transform,
    TransformContext,
};

use crate::common::parse;

fn dummy_context() -> DelegationContext<'static> {
    DelegationContext {
        subschema: 0,
        operation_type: "query",
        field_name: Name::new_unchecked("book"),
        args: Default::default(),
        return_type: Name::new_unchecked("Book"),
        skip_type_merging: false,
        required_selection_set: None,
    }
}

fn fragment_types(set: &PlanSelectionSet) -> Vec<String> {
    set.selections
        .iter()
        .filter_map(|s| match s {
            PlanSelection::InlineFragment(f) => f.type_condition.as_ref().map(|t| t.to_string()),
            _ => None,
        })
        .collect()
}

#[test]
fn expands_interface_level_spread_into_every_known_implementation() {
    let full_schema = parse(
        "interface Book { id: ID! } \
         type TextBook implements Book { id: ID! text: String! } \
         type ColoringBook implements Book { id: ID! crayons: Int! } \
         type Query { book: Book! }",
        "full.graphql",
    );

    let set = PlanSelectionSet {
        type_name: Name::new_unchecked("Book"),
        selections: vec![
            PlanSelection::Field(PlanField {
                alias: None,
                name: Name::new_unchecked("id"),
                arguments: Vec::new(),
                selection_set: PlanSelectionSet::empty(Name::new_unchecked("ID")),
            }),
            PlanSelection::InlineFragment(PlanInlineFragment {
                type_condition: Some(Name::new_unchecked("Book")),
                selection_set: PlanSelectionSet {
                    type_name: Name::new_unchecked("Book"),
                    selections: vec![PlanSelection::Field(PlanField {
                        alias: None,
                        name: Name::new_unchecked("id"),
                        arguments: Vec::new(),
                        selection_set: PlanSelectionSet::empty(Name::new_unchecked("ID")),
                    })],
                },
            }),
        ],
    };

    let dctx = dummy_context();
    let mut ctx = TransformContext::default();
    let expanded = ExpandAbstractTypes.transform_request(set, &full_schema, &dctx, &mut ctx);

    let mut types = fragment_types(&expanded);
    types.sort();
    assert_eq!(types, vec!["ColoringBook".to_owned(), "TextBook".to_owned()]);
}

#[test]
fn filter_to_schema_strips_fragments_on_implementations_the_target_does_not_know() {
    // Target subschema only implements ColoringBook; TextBook doesn't exist there at all.
    let narrow_schema = parse(
        "interface Book { id: ID! } \
         type ColoringBook implements Book { id: ID! crayons: Int! } \
         type Query { book: Book! }",
        "narrow.graphql",
    );

    let set = PlanSelectionSet {
        type_name: Name::new_unchecked("Book"),
        selections: vec![
            PlanSelection::Field(PlanField {
                alias: None,
                name: Name::new_unchecked("id"),
                arguments: Vec::new(),
                selection_set: PlanSelectionSet::empty(Name::new_unchecked("ID")),
            }),
            PlanSelection::InlineFragment(PlanInlineFragment {
                type_condition: Some(Name::new_unchecked("TextBook")),
                selection_set: PlanSelectionSet {
                    type_name: Name::new_unchecked("TextBook"),
                    selections: vec![PlanSelection::Field(PlanField {
                        alias: None,
                        name: Name::new_unchecked("text"),
                        arguments: Vec::new(),
                        selection_set: PlanSelectionSet::empty(Name::new_unchecked("String")),
                    })],
                },
            }),
            PlanSelection::InlineFragment(PlanInlineFragment {
                type_condition: Some(Name::new_unchecked("ColoringBook")),
                selection_set: PlanSelectionSet {
                    type_name: Name::new_unchecked("ColoringBook"),
                    selections: vec![PlanSelection::Field(PlanField {
                        alias: None,
                        name: Name::new_unchecked("crayons"),
                        arguments: Vec::new(),
                        selection_set: PlanSelectionSet::empty(Name::new_unchecked("Int")),
                    })],
                },
            }),
        ],
    };

    let dctx = dummy_context();
    let mut ctx = TransformContext::default();
    let filtered = ExpandAbstractTypes.transform_request(set, &narrow_schema, &dctx, &mut ctx);
    let mut ctx2 = TransformContext::default();
    let filtered = FilterToSchema.transform_request(filtered, &narrow_schema, &dctx, &mut ctx2);

    let types = fragment_types(&filtered);
    assert_eq!(types, vec!["ColoringBook".to_owned()], "the TextBook fragment must not survive, since the target never implements it");
}
