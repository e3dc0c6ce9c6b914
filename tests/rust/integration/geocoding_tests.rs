//! Integration tests for geocoding enrichment through the pipeline

#[cfg(test)]
mod geocoding_tests {
    use std::cell::RefCell;
    use std::fs;
    use std::rc::Rc;

    use serde_json::json;
    use tempfile::TempDir;

    use tablegraph::config::{FileJob, RunConfig};
    use tablegraph::pipeline::Pipeline;
    use tablegraph::triples::{AddressQuery, GeocodeError, GeocodeResponse, Geocoder};

    /// Answers every query with a fixed response and records the queries
    struct FixedGeocoder {
        response: GeocodeResponse,
        queries: Rc<RefCell<Vec<AddressQuery>>>,
    }

    impl FixedGeocoder {
        fn boxed(response: GeocodeResponse) -> (Box<dyn Geocoder>, Rc<RefCell<Vec<AddressQuery>>>) {
            let queries = Rc::new(RefCell::new(Vec::new()));
            let geocoder = FixedGeocoder {
                response,
                queries: Rc::clone(&queries),
            };
            (Box::new(geocoder), queries)
        }
    }

    impl Geocoder for FixedGeocoder {
        fn search(&self, query: &AddressQuery) -> Result<GeocodeResponse, GeocodeError> {
            self.queries.borrow_mut().push(query.clone());
            Ok(self.response.clone())
        }
    }

    fn response(place_rank: i64) -> GeocodeResponse {
        serde_json::from_value(json!({
            "features": [{
                "properties": {
                    "place_rank": place_rank,
                    "display_name": "10 Downing Street, London",
                    "address": {"road": "Downing Street", "house_number": "10", "city": "London", "postcode": "SW1A 2AA"}
                },
                "geometry": {"type": "Point", "coordinates": [-0.1276, 51.5034]}
            }]
        }))
        .unwrap()
    }

    fn setup() -> (TempDir, RunConfig) {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("sites.csv"),
            "number,street,city\n10,Downing Street,London\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("sites.json"),
            json!({
                "TEMPLATE": [["AddressLocation", {
                    "GENSYM": "a1",
                    "number": ["locationStreetNumberText"],
                    "street": ["locationStreet"],
                    "city": ["locationCity"]
                }]],
                "OPTIONS": {"GEOLOOKUP": true}
            })
            .to_string(),
        )
        .unwrap();

        let path = |name: &str| dir.path().join(name).to_string_lossy().into_owned();
        let config = RunConfig {
            files: vec![FileJob {
                file: path("sites.csv"),
                spec: path("sites.json"),
            }],
            output_dir: path("out"),
            ..Default::default()
        };
        (dir, config)
    }

    #[test]
    fn test_confident_match_adds_missing_address_parts() {
        let (_dir, config) = setup();
        let (geocoder, queries) = FixedGeocoder::boxed(response(30));
        let report = Pipeline::new(&config)
            .unwrap()
            .with_geocoder(Some(geocoder))
            .run()
            .unwrap();
        let text = fs::read_to_string(&report.files[0].chunks[0].path).unwrap();

        assert_eq!(
            queries.borrow().as_slice(),
            &[AddressQuery::Structured(vec![
                ("street", "10 Downing Street".to_string()),
                ("city", "London".to_string()),
            ])]
        );
        // The row's own city wins over the geocoded one
        assert_eq!(text.matches("locationCity>").count(), 1);
        assert!(text.contains("<http://schema.localhost/locationPostalCode> \"SW1A 2AA\" ."));
        assert!(text.contains("<http://schema.localhost/locationAddressFullText>"));
        assert!(text.contains("^^<http://schema.localhost/GeoJSON> ."));
    }

    #[test]
    fn test_low_rank_match_is_ignored() {
        let (_dir, config) = setup();
        let (geocoder, queries) = FixedGeocoder::boxed(response(12));
        let report = Pipeline::new(&config)
            .unwrap()
            .with_geocoder(Some(geocoder))
            .run()
            .unwrap();

        let chunk = &report.files[0].chunks[0];
        assert_eq!(chunk.statements, 4);
        assert_eq!(chunk.diagnostics, 1);
        assert_eq!(queries.borrow().len(), 1);
    }
}
