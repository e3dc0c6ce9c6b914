//! Unit tests for binding resolution through template loading
//!
//! Unknown functions and mismatched DATA blocks must stop template loading.

#[cfg(test)]
mod binding_catalog_tests {
    use serde_json::json;

    use tablegraph::binding::{registered_functions, Binding, BindingError};
    use tablegraph::template::{TemplateError, TemplateSpec};

    #[test]
    fn test_catalog_is_complete() {
        let functions = registered_functions();
        for name in [
            "GeoJSONFromLatLon",
            "GeoJSONFromCombinedLatLon",
            "GeoJSONFromCombinedLonLat",
            "GeoJSONHexFromCombinedLatLon",
            "GeoJSONHexFromCombinedLonLat",
            "DeterministicUUID",
            "Echo",
            "CombineColumns",
            "SplitColumn",
            "SplitIndex",
            "TernaryBool",
            "Replace",
            "ProperCase",
            "UpCase",
            "DownCase",
            "Concatenate",
            "OffsetDate",
            "UnixTimestamp",
            "ObjectTemplate",
        ] {
            assert!(functions.contains(&name), "missing binding function {}", name);
        }
    }

    /// An unknown function name is fatal, never skipped
    #[test]
    fn test_unknown_function_is_fatal() {
        let result = TemplateSpec::from_json_value(json!({
            "TEMPLATE": [["Person", {"GENSYM": "p1", "BIND_x": ["x"]}]],
            "BIND": {"BIND_x": {"FUNCTION": "Reverse", "DATA": {"Column": "name"}}}
        }));
        match result {
            Err(TemplateError::Binding(BindingError::UnknownFunction { function, .. })) => {
                assert_eq!(function, "Reverse")
            }
            other => panic!("expected an unknown function error, got {:?}", other),
        }

        assert!(matches!(
            Binding::resolve("BIND_x", "Reverse", json!({})),
            Err(BindingError::UnknownFunction { .. })
        ));
    }

    /// A DATA block that does not fit the function is fatal too
    #[test]
    fn test_mismatched_data_is_fatal() {
        let result = TemplateSpec::from_json_value(json!({
            "TEMPLATE": [["Person", {"GENSYM": "p1"}]],
            "BIND": {"BIND_x": {"FUNCTION": "SplitColumn", "DATA": {"Column": "name"}}}
        }));
        assert!(matches!(
            result,
            Err(TemplateError::Binding(BindingError::InvalidData { .. }))
        ));
    }

    /// Unknown functions inside subtemplates are caught as well
    #[test]
    fn test_unknown_function_in_subtemplate() {
        let result = TemplateSpec::from_json_value(json!({
            "TEMPLATE": [["Person", {"GENSYM": "p1", "SUBTEMPLATE_s.GENSYM_c": ["has"]}]],
            "SUBTEMPLATES": {
                "s": {
                    "TEMPLATE": [["Child", {"GENSYM": "c"}]],
                    "BIND": {"BIND_y": {"FUNCTION": "Nope", "DATA": {}}},
                    "ITERABLE": [["kids", "kid"]]
                }
            }
        }));
        assert!(matches!(
            result,
            Err(TemplateError::Binding(BindingError::UnknownFunction { .. }))
        ));
    }
}
