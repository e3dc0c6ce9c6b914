//! Integration tests for the CSV → N-Triples pipeline

#[cfg(test)]
mod pipeline_tests {
    use std::fs;
    use std::path::{Path, PathBuf};

    use serde_json::json;
    use tempfile::TempDir;

    use tablegraph::config::{FileJob, RunConfig};
    use tablegraph::pipeline::Pipeline;
    use tablegraph::triples::DeterministicIds;

    const PEOPLE_CSV: &str = "\u{feff}id,name,pets,age\n\
                              1,Alice,Rex;Tom,34\n\
                              ,,,\n\
                              2,Bob,,41\n\
                              3,\"Carol\nAnn\",Kit,29\n";

    fn people_spec() -> serde_json::Value {
        json!({
            "TEMPLATE": [
                ["Person", {
                    "GENSYM": "p1",
                    "id": ["identifier"],
                    "name": ["name"],
                    "age": ["age"],
                    "SUBTEMPLATE_pets.GENSYM_pet": ["hasPet"]
                }]
            ],
            "SUBTEMPLATES": {
                "pets": {
                    "TEMPLATE": [["Pet", {"GENSYM": "pet", "pet": ["name"], "GENSYM_p1": ["owner"]}]],
                    "ITERABLE": [["BIND_pets", "pet"]]
                }
            },
            "BIND": {
                "BIND_pets": {"FUNCTION": "SplitColumn", "DATA": {"Column": "pets", "Delimiter": ";"}}
            }
        })
    }

    struct Workspace {
        dir: TempDir,
    }

    impl Workspace {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            fs::write(dir.path().join("people.csv"), PEOPLE_CSV).unwrap();
            fs::write(dir.path().join("people.json"), people_spec().to_string()).unwrap();
            Workspace { dir }
        }

        fn path(&self, name: &str) -> String {
            self.dir.path().join(name).to_string_lossy().into_owned()
        }

        fn config(&self, output: &str, chunk_size: usize, mode: DeterministicIds) -> RunConfig {
            RunConfig {
                files: vec![FileJob {
                    file: self.path("people.csv"),
                    spec: self.path("people.json"),
                }],
                output_dir: self.path(output),
                chunk_size,
                deterministic_ids: mode,
                ..Default::default()
            }
        }
    }

    fn run(config: &RunConfig) -> tablegraph::pipeline::PipelineReport {
        Pipeline::new(config)
            .unwrap()
            .with_geocoder(None)
            .run()
            .unwrap()
    }

    fn read(path: &Path) -> String {
        fs::read_to_string(path).unwrap()
    }

    #[test]
    fn test_converts_all_rows_into_one_chunk() {
        let ws = Workspace::new();
        let report = run(&ws.config("out", 100, DeterministicIds::None));

        assert_eq!(report.files.len(), 1);
        let chunks = &report.files[0].chunks;
        assert_eq!(chunks.len(), 1);
        // The all-empty row is skipped
        assert_eq!(chunks[0].rows, 3);
        assert_eq!(chunks[0].path, PathBuf::from(ws.path("out/people_0.nt")));

        let text = read(&chunks[0].path);
        assert_eq!(text.lines().count(), chunks[0].statements);
        assert!(text.lines().all(|l| l.ends_with(" .")));
        assert_eq!(
            text.matches("<http://schema.localhost/Person>").count(),
            3,
            "one type statement per person"
        );
        assert_eq!(text.matches("<http://schema.localhost/Pet>").count(), 3);
        // Embedded line breaks are flattened
        assert!(text.contains("\"Carol Ann\""));
        // The BOM does not end up in the first column name
        assert_eq!(text.matches("<http://schema.localhost/identifier>").count(), 3);
        assert_eq!(report.files[0].unreadable_rows, 0);
    }

    #[test]
    fn test_chunking() {
        let ws = Workspace::new();
        let report = run(&ws.config("out", 2, DeterministicIds::None));
        let chunks = &report.files[0].chunks;
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].rows, 2);
        assert_eq!(chunks[1].rows, 1);
        assert!(chunks[1].path.ends_with("people_1.nt"));
        assert_eq!(report.total_rows(), 3);
    }

    #[test]
    fn test_deterministic_runs_are_reproducible() {
        let ws = Workspace::new();
        let first = run(&ws.config("first", 100, DeterministicIds::Global));
        let second = run(&ws.config("second", 100, DeterministicIds::Global));

        let a = &first.files[0].chunks[0];
        let b = &second.files[0].chunks[0];
        assert_eq!(a.sha256, b.sha256);
        assert_eq!(read(&a.path), read(&b.path));
        assert_eq!(a.sha256.len(), 64);
    }

    #[test]
    fn test_random_ids_differ_between_runs() {
        let ws = Workspace::new();
        let first = run(&ws.config("first", 100, DeterministicIds::None));
        let second = run(&ws.config("second", 100, DeterministicIds::None));
        assert_ne!(first.files[0].chunks[0].sha256, second.files[0].chunks[0].sha256);
    }

    #[test]
    fn test_declared_types_from_schema() {
        let ws = Workspace::new();
        let schema = json!({
            "@graph": [{
                "@id": "http://schema.localhost/age",
                "http://schema.localhost/rangeIncludes": {"@id": "http://schema.localhost/Integer"}
            }]
        });
        fs::write(ws.dir.path().join("schema.jsonld"), schema.to_string()).unwrap();

        let mut config = ws.config("out", 100, DeterministicIds::None);
        config.schema = Some(ws.path("schema.jsonld"));
        let report = run(&config);

        let text = read(&report.files[0].chunks[0].path);
        assert!(text.contains("\"34\"^^<http://www.w3.org/2001/XMLSchema#integer>"));
    }

    #[test]
    fn test_missing_inputs_are_skipped() {
        let ws = Workspace::new();
        let mut config = ws.config("out", 100, DeterministicIds::None);
        config.files.push(FileJob {
            file: ws.path("absent.csv"),
            spec: ws.path("people.json"),
        });
        config.files.push(FileJob {
            file: ws.path("people.csv"),
            spec: ws.path("absent.json"),
        });

        let report = run(&config);
        assert_eq!(report.files.len(), 1);
        assert_eq!(report.skipped_jobs.len(), 2);
    }

    #[test]
    fn test_unknown_binding_stops_the_run() {
        let ws = Workspace::new();
        fs::write(
            ws.dir.path().join("people.json"),
            json!({
                "TEMPLATE": [["Person", {"GENSYM": "p1"}]],
                "BIND": {"BIND_x": {"FUNCTION": "Mystery", "DATA": {}}}
            })
            .to_string(),
        )
        .unwrap();

        let config = ws.config("out", 100, DeterministicIds::None);
        let err = Pipeline::new(&config).unwrap().with_geocoder(None).run().unwrap_err();
        assert!(format!("{:#}", err).contains("Mystery"));
    }

    #[test]
    fn test_gensym_cycle_stops_the_run() {
        let ws = Workspace::new();
        fs::write(
            ws.dir.path().join("people.json"),
            json!({
                "TEMPLATE": [
                    ["A", {"GENSYM": "a", "GENSYM_b": ["next"]}],
                    ["B", {"GENSYM": "b", "GENSYM_a": ["next"]}]
                ]
            })
            .to_string(),
        )
        .unwrap();

        let config = ws.config("out", 100, DeterministicIds::Global);
        let err = Pipeline::new(&config).unwrap().with_geocoder(None).run().unwrap_err();
        assert!(format!("{:#}", err).contains("Circular gensym dependency"));
    }
}
