use std::path::Path;

use camino::Utf8PathBuf;
use serde_json::json;

use metagenscope_cli::catalog::{Catalog, FileSource, RepositorySource, SampleSource};
use metagenscope_cli::repository::DirectoryRepository;

fn write(path: &Path, content: &str) -> Utf8PathBuf {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
    Utf8PathBuf::from_path_buf(path.to_path_buf()).unwrap()
}

/// sample → result type → roles, ignoring where the files live.
fn shape(catalog: &Catalog) -> Vec<(String, Vec<(String, Vec<String>)>)> {
    let mut shape = catalog
        .samples()
        .map(|(sample, results)| {
            let mut results = results
                .iter()
                .map(|(result_type, schema)| {
                    let mut roles = schema.keys().cloned().collect::<Vec<_>>();
                    roles.sort();
                    (result_type.clone(), roles)
                })
                .collect::<Vec<_>>();
            results.sort();
            (sample.clone(), results)
        })
        .collect::<Vec<_>>();
    shape.sort();
    shape
}

#[test]
fn file_and_repository_sources_agree() {
    let dir = tempfile::tempdir().unwrap();
    let flat = dir.path().join("flat");
    let repo = dir.path().join("repo");

    let files = vec![
        write(&flat.join("s1.read_stats.json"), "{}"),
        write(&flat.join("s1.humann2_functional_profiling.path_abunds"), ""),
        write(&flat.join("s1.humann2_functional_profiling.path_cov"), ""),
        write(&flat.join("s2.microbe_census.stats"), ""),
    ];
    write(&repo.join("s1/read_stats/json.json"), "{}");
    write(&repo.join("s1/humann2_functional_profiling/path_abunds.tsv"), "");
    write(&repo.join("s1/humann2_functional_profiling/path_cov.tsv"), "");
    write(&repo.join("s2/microbe_census/stats.txt"), "");

    let from_files = FileSource::new(files).catalog().unwrap();
    let repository = DirectoryRepository::new(Utf8PathBuf::from_path_buf(repo).unwrap());
    let from_repo = RepositorySource::new(repository, Vec::new())
        .catalog()
        .unwrap();

    assert_eq!(shape(&from_files), shape(&from_repo));
    assert_eq!(from_files.len(), 2);
    assert_eq!(from_files.result_count(), 3);
}

#[test]
fn repository_source_skips_unsupported_types() {
    let dir = tempfile::tempdir().unwrap();
    write(&dir.path().join("s1/read_stats/json.json"), "{}");
    write(&dir.path().join("s1/macrobe_abundance/tbl.csv"), "");
    write(&dir.path().join("s2/macrobe_abundance/tbl.csv"), "");

    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    let source = RepositorySource::new(
        DirectoryRepository::new(root),
        vec!["macrobe_abundance".to_string()],
    );
    let catalog = source.catalog().unwrap();

    assert_eq!(catalog.len(), 2);
    assert_eq!(catalog.result_count(), 1);
    assert!(catalog.get("s1").unwrap().contains_key("read_stats"));
    assert!(catalog.get("s2").unwrap().is_empty());
}

#[test]
fn repository_metadata_comes_from_sample_directories() {
    let dir = tempfile::tempdir().unwrap();
    write(&dir.path().join("s1/read_stats/json.json"), "{}");
    write(&dir.path().join("s1/metadata.json"), r#"{"site": "gut", "depth": 3}"#);
    write(&dir.path().join("s2/read_stats/json.json"), "{}");

    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    let metadata = RepositorySource::new(DirectoryRepository::new(root), Vec::new())
        .metadata()
        .unwrap();

    assert_eq!(metadata.len(), 1);
    assert_eq!(json!(metadata["s1"]), json!({"site": "gut", "depth": 3}));
}
