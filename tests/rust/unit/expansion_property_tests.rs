//! Unit tests for row expansion properties
//!
//! One type statement per entity, identifier determinism and distinctness,
//! idempotent rendering, and omission of empty values.

#[cfg(test)]
mod expansion_property_tests {
    use serde_json::json;

    use tablegraph::datum::Datum;
    use tablegraph::row::Header;
    use tablegraph::template::{PropertyTypeIndex, TemplateSpec};
    use tablegraph::triples::{
        render_statements, DeterministicIds, RowContext, RowExpansion, Statement, TemplateExpander,
    };
    use tablegraph::vocabulary::{Vocabulary, RDF_TYPE};

    const TYPE_PREDICATE: &str = "<http://www.w3.org/1999/02/22-rdf-syntax-ns#type>";

    fn person_spec() -> TemplateSpec {
        TemplateSpec::from_json_value(json!({
            "TEMPLATE": [["Person", {"GENSYM": "p1", "name": ["http://schema.localhost/name"]}]]
        }))
        .unwrap()
    }

    fn alice_row() -> (Header, Vec<Datum>) {
        (
            Header::new(["id", "name", "created"]),
            vec![
                Datum::from("42"),
                Datum::from("Alice"),
                Datum::from("2021-01-01T00:00:00"),
            ],
        )
    }

    fn expand_with(
        spec: &TemplateSpec,
        header: &Header,
        row: &[Datum],
        mode: DeterministicIds,
        file_name: &str,
    ) -> RowExpansion {
        let types = PropertyTypeIndex::empty();
        let vocab = Vocabulary::default();
        let ctx = RowContext {
            file_name,
            row_index: 0,
        };
        TemplateExpander::new(&types, &vocab, mode)
            .expand_row(spec, header, row, &ctx)
            .unwrap()
    }

    fn type_statements(expansion: &RowExpansion) -> Vec<&Statement> {
        expansion
            .statements
            .iter()
            .filter(|s| s.predicate == TYPE_PREDICATE)
            .collect()
    }

    /// Per-call mode: one type statement plus one name statement
    #[test]
    fn test_alice_per_call() {
        let (header, row) = alice_row();
        let out = expand_with(&person_spec(), &header, &row, DeterministicIds::None, "people_0.nt");

        assert_eq!(out.statements.len(), 2);
        assert_eq!(type_statements(&out).len(), 1);
        assert_eq!(format!("<{}>", RDF_TYPE), TYPE_PREDICATE);
        assert_eq!(out.statements[1].predicate, "<http://schema.localhost/name>");
        assert_eq!(out.statements[1].object, "\"Alice\"");
        assert_eq!(out.statements[0].subject, out.statements[1].subject);
    }

    /// Global mode: the same inputs give the same subject on every run
    #[test]
    fn test_alice_global_is_stable() {
        let (header, row) = alice_row();
        let spec = person_spec();
        let subjects: Vec<String> = (0..3)
            .map(|_| {
                expand_with(&spec, &header, &row, DeterministicIds::Global, "people_0.nt").statements[0]
                    .subject
                    .clone()
            })
            .collect();
        assert_eq!(subjects[0], subjects[1]);
        assert_eq!(subjects[1], subjects[2]);

        // Global scope ignores the file name
        let other_file = expand_with(&spec, &header, &row, DeterministicIds::Global, "other_3.nt");
        assert_eq!(other_file.statements[0].subject, subjects[0]);
    }

    /// Differing dependency content gives differing identifiers
    #[test]
    fn test_distinct_inputs_give_distinct_ids() {
        let spec = person_spec();
        let header = Header::new(["name"]);
        let names = ["Alice", "Bob", "alice", "Alice ", ""];
        let mut subjects: Vec<String> = names
            .iter()
            .map(|name| {
                expand_with(&spec, &header, &[Datum::from(*name)], DeterministicIds::Global, "f").statements[0]
                    .subject
                    .clone()
            })
            .collect();
        subjects.sort();
        subjects.dedup();
        assert_eq!(subjects.len(), names.len());
    }

    /// File scope salts identifiers with the file name
    #[test]
    fn test_file_scope_distinguishes_files() {
        let (header, row) = alice_row();
        let spec = person_spec();
        let a = expand_with(&spec, &header, &row, DeterministicIds::File, "a_0.nt");
        let b = expand_with(&spec, &header, &row, DeterministicIds::File, "b_0.nt");
        assert_ne!(a.statements[0].subject, b.statements[0].subject);
    }

    /// Every instantiated entity gets exactly one type statement
    #[test]
    fn test_one_type_statement_per_entity() {
        let spec = TemplateSpec::from_json_value(json!({
            "TEMPLATE": [
                ["Person", {"GENSYM": "p1", "name": ["name"], "GENSYM_a1": ["address"]}],
                ["AddressLocation", {"GENSYM": "a1", "city": ["locationCity"]}],
                ["Account", {"GENSYM": "acct", "GENSYM_p1": ["owner"]}]
            ]
        }))
        .unwrap();
        let header = Header::new(["name", "city"]);
        let row = vec![Datum::from("Alice"), Datum::from("Paris")];

        for mode in [DeterministicIds::None, DeterministicIds::File, DeterministicIds::Global] {
            let out = expand_with(&spec, &header, &row, mode, "f");
            let types = type_statements(&out);
            assert_eq!(types.len(), 3);
            let mut subjects: Vec<&str> = types.iter().map(|s| s.subject.as_str()).collect();
            subjects.sort();
            subjects.dedup();
            assert_eq!(subjects.len(), 3);
        }
    }

    /// A 3-element iteration source gives 3 nested expansions in order
    #[test]
    fn test_three_element_iteration() {
        let spec = TemplateSpec::from_json_value(json!({
            "TEMPLATE": [["Person", {"GENSYM": "p1", "SUBTEMPLATE_kids.GENSYM_kid": ["hasChild"]}]],
            "SUBTEMPLATES": {
                "kids": {
                    "TEMPLATE": [["Child", {"GENSYM": "kid", "kid": ["name"]}]],
                    "ITERABLE": [["kids", "kid"]]
                }
            }
        }))
        .unwrap();
        let header = Header::new(["kids"]);
        let row = vec![Datum::List(vec![
            Datum::from("Ann"),
            Datum::from("Ben"),
            Datum::from("Cy"),
        ])];

        let out = expand_with(&spec, &header, &row, DeterministicIds::None, "f");
        let child_types: Vec<&Statement> = type_statements(&out)
            .into_iter()
            .filter(|s| s.object == "<http://schema.localhost/Child>")
            .collect();
        assert_eq!(child_types.len(), 3);

        let names: Vec<&str> = out
            .statements
            .iter()
            .filter(|s| s.predicate == "<http://schema.localhost/name>")
            .map(|s| s.object.as_str())
            .collect();
        assert_eq!(names, vec!["\"Ann\"", "\"Ben\"", "\"Cy\""]);
    }

    /// Missing and empty fields never produce a statement
    #[test]
    fn test_empty_fields_are_omitted() {
        let spec = TemplateSpec::from_json_value(json!({
            "TEMPLATE": [["Person", {"GENSYM": "p1", "name": ["name"], "email": ["email"], "phone": ["phone"]}]]
        }))
        .unwrap();
        let header = Header::new(["name", "email"]);
        let row = vec![Datum::from(""), Datum::Null];

        let out = expand_with(&spec, &header, &row, DeterministicIds::None, "f");
        assert_eq!(out.statements.len(), 1);
        assert!(out.statements.iter().all(|s| s.object != "\"\""));
    }

    /// Rendering the same statements twice is byte-identical
    #[test]
    fn test_rendering_is_idempotent() {
        let (header, row) = alice_row();
        let out = expand_with(&person_spec(), &header, &row, DeterministicIds::Global, "f");
        let first = render_statements(&out.statements);
        let second = render_statements(&out.statements);
        assert_eq!(first, second);
        assert_eq!(first.lines().count(), 2);
        assert!(first.lines().all(|line| line.ends_with(" .")));
    }
}
