use std::path::Path;
use std::sync::Mutex;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use serde_json::{Map, Value, json};

use metagenscope_cli::catalog::{Catalog, FileSource, SampleMetadata, SampleSource};
use metagenscope_cli::client::MgsClient;
use metagenscope_cli::domain::{OutcomeKind, UploadOutcome};
use metagenscope_cli::error::MgsError;
use metagenscope_cli::uploader::{PARALLEL_WORKERS, SampleErrorPolicy, UploadOptions, Uploader};

#[derive(Default)]
struct MockClient {
    posts: Mutex<Vec<(String, Value)>>,
    failing_sample: Option<String>,
    failing_endpoint_suffix: Option<String>,
}

impl MockClient {
    fn failing_sample(name: &str) -> Self {
        Self {
            failing_sample: Some(name.to_string()),
            ..Self::default()
        }
    }

    fn failing_uploads(suffix: &str) -> Self {
        Self {
            failing_endpoint_suffix: Some(suffix.to_string()),
            ..Self::default()
        }
    }

    fn result_posts(&self) -> Vec<(String, Value)> {
        self.posts
            .lock()
            .unwrap()
            .iter()
            .filter(|(endpoint, _)| {
                endpoint.starts_with("/api/v1/samples/") && endpoint != "/api/v1/samples/metadata"
            })
            .cloned()
            .collect()
    }
}

impl MgsClient for MockClient {
    fn post(&self, endpoint: &str, payload: &Value) -> Result<Value, MgsError> {
        self.posts
            .lock()
            .unwrap()
            .push((endpoint.to_string(), payload.clone()));
        match endpoint {
            "/api/v1/sample_groups" => Ok(json!({"data": {"sample_group": {"uuid": "group-uuid"}}})),
            "/api/v1/samples" => {
                let name = payload["name"].as_str().unwrap_or_default();
                if self.failing_sample.as_deref() == Some(name) {
                    return Err(MgsError::Status {
                        status: 409,
                        message: format!("sample {name} already exists"),
                    });
                }
                Ok(json!({"data": {"sample": {"uuid": format!("uuid-{name}")}}}))
            }
            _ => {
                if let Some(suffix) = &self.failing_endpoint_suffix {
                    if endpoint.ends_with(suffix.as_str()) {
                        return Err(MgsError::Http("connection reset".to_string()));
                    }
                }
                Ok(json!({"data": {}}))
            }
        }
    }

    fn get(&self, endpoint: &str) -> Result<Value, MgsError> {
        Err(MgsError::Http(format!("unexpected lookup {endpoint}")))
    }
}

const CENSUS: &str = "average_genome_size:\t70513906.6967\ntotal_bases:\t1709470396\ngenome_equivalents:\t24.2430249022\n";
const BROKEN_CENSUS: &str = "average_genome_size:\t70513906.6967\ngenome_equivalents:\t24.2430249022\n";

fn write(dir: &Path, name: &str, content: &str) -> Utf8PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    Utf8PathBuf::from_path_buf(path).unwrap()
}

/// Two samples with read stats and a census each; s2's census lacks total_bases.
fn two_sample_catalog(dir: &Path) -> Catalog {
    let files = vec![
        write(dir, "s1.read_stats.json", r#"{"num_reads": 100}"#),
        write(dir, "s1.microbe_census.stats", CENSUS),
        write(dir, "s2.read_stats.json", r#"{"num_reads": 200}"#),
        write(dir, "s2.microbe_census.stats", BROKEN_CENSUS),
    ];
    FileSource::new(files).catalog().unwrap()
}

fn errors(outcomes: &[UploadOutcome]) -> Vec<&UploadOutcome> {
    outcomes.iter().filter(|outcome| outcome.is_error()).collect()
}

#[test]
fn one_failing_parser_yields_one_error_outcome() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = two_sample_catalog(dir.path());

    let mut uploader = Uploader::new(MockClient::default());
    let outcomes = uploader
        .upload_all_results(None, &catalog, &SampleMetadata::new())
        .unwrap();

    assert_eq!(outcomes.len(), 4);
    let errors = errors(&outcomes);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].sample_name, "s2");
    assert_eq!(errors[0].result_type, "microbe_census");
    assert_eq!(errors[0].sample_uuid.as_deref(), Some("uuid-s2"));
    assert!(errors[0].exception.as_deref().unwrap().contains("total_bases"));

    let posts = uploader.client().result_posts();
    assert_eq!(posts.len(), 3);
    let (endpoint, payload) = &posts[0];
    assert_eq!(endpoint, "/api/v1/samples/uuid-s1/read_stats");
    assert_eq!(payload["result_name"], "s1::read_stats");
    assert_eq!(payload["tool_name"], "read_stats");
    assert_eq!(payload["data"]["num_reads"], 100);
}

#[test]
fn parallel_upload_matches_sequential_outcomes() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = two_sample_catalog(dir.path());

    let mut sequential = Uploader::new(MockClient::default());
    let expected = sequential
        .upload_all_results(Some("group-uuid"), &catalog, &SampleMetadata::new())
        .unwrap();

    let options = UploadOptions {
        workers: PARALLEL_WORKERS,
        ..UploadOptions::default()
    };
    let mut parallel = Uploader::with_options(MockClient::default(), options);
    let outcomes = parallel
        .upload_all_results(Some("group-uuid"), &catalog, &SampleMetadata::new())
        .unwrap();

    assert_eq!(outcomes, expected);
    assert_eq!(parallel.client().result_posts().len(), 3);
}

#[test]
fn created_groups_receive_every_sample() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = two_sample_catalog(dir.path());

    let mut uploader = Uploader::new(MockClient::default());
    uploader
        .upload_all_results(None, &catalog, &SampleMetadata::new())
        .unwrap();

    let posts = uploader.client().posts.lock().unwrap().clone();
    let (endpoint, payload) = &posts[0];
    assert_eq!(endpoint, "/api/v1/sample_groups");
    assert!(payload["name"].as_str().unwrap().starts_with("upload_group_"));

    let sample_posts = posts
        .iter()
        .filter(|(endpoint, _)| endpoint == "/api/v1/samples")
        .collect::<Vec<_>>();
    assert_eq!(sample_posts.len(), 2);
    for (_, payload) in sample_posts {
        assert_eq!(payload["sample_group_uuid"], "group-uuid");
    }
}

#[test]
fn metadata_is_attached_per_sample() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = two_sample_catalog(dir.path());
    let mut attributes = Map::new();
    attributes.insert("site".to_string(), json!("gut"));
    let metadata = SampleMetadata::from([("s1".to_string(), attributes)]);

    let mut uploader = Uploader::new(MockClient::default());
    uploader
        .upload_all_results(Some("group-uuid"), &catalog, &metadata)
        .unwrap();

    let posts = uploader.client().posts.lock().unwrap().clone();
    let created = posts
        .iter()
        .filter(|(endpoint, _)| endpoint == "/api/v1/samples")
        .map(|(_, payload)| payload.clone())
        .collect::<Vec<_>>();
    assert_eq!(created[0]["metadata"], json!({"site": "gut"}));
    assert_eq!(created[1]["metadata"], json!({}));
}

#[test]
fn abort_policy_stops_on_sample_creation_failure() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = two_sample_catalog(dir.path());

    let mut uploader = Uploader::new(MockClient::failing_sample("s1"));
    let err = uploader
        .upload_all_results(Some("group-uuid"), &catalog, &SampleMetadata::new())
        .unwrap_err();
    assert_matches!(err, MgsError::Status { status: 409, .. });
    assert!(uploader.client().result_posts().is_empty());
}

#[test]
fn record_policy_marks_every_result_of_the_failed_sample() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = two_sample_catalog(dir.path());
    let options = UploadOptions {
        on_sample_error: SampleErrorPolicy::Record,
        ..UploadOptions::default()
    };

    let mut uploader = Uploader::with_options(MockClient::failing_sample("s1"), options);
    let outcomes = uploader
        .upload_all_results(Some("group-uuid"), &catalog, &SampleMetadata::new())
        .unwrap();

    assert_eq!(outcomes.len(), 4);
    let s1 = outcomes
        .iter()
        .filter(|outcome| outcome.sample_name == "s1")
        .collect::<Vec<_>>();
    assert_eq!(s1.len(), 2);
    for outcome in s1 {
        assert_eq!(outcome.kind, OutcomeKind::Error);
        assert_eq!(outcome.sample_uuid, None);
        assert!(outcome.exception.as_deref().unwrap().contains("already exists"));
    }
    assert_eq!(errors(&outcomes).len(), 3);
}

#[test]
fn transport_failure_becomes_an_error_outcome() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = two_sample_catalog(dir.path());

    let mut uploader = Uploader::new(MockClient::failing_uploads("/read_stats"));
    let outcomes = uploader
        .upload_all_results(Some("group-uuid"), &catalog, &SampleMetadata::new())
        .unwrap();

    let failed = errors(&outcomes)
        .into_iter()
        .map(|outcome| (outcome.sample_name.as_str(), outcome.result_type.as_str()))
        .collect::<Vec<_>>();
    assert_eq!(
        failed,
        vec![
            ("s1", "read_stats"),
            ("s2", "read_stats"),
            ("s2", "microbe_census"),
        ]
    );
    let s1_stats = &outcomes[0];
    assert!(s1_stats.exception.as_deref().unwrap().contains("connection reset"));
}

#[test]
fn empty_catalog_uploads_nothing() {
    let mut uploader = Uploader::new(MockClient::default());
    let outcomes = uploader
        .upload_all_results(Some("group-uuid"), &Catalog::new(), &SampleMetadata::new())
        .unwrap();
    assert!(outcomes.is_empty());
    assert!(uploader.client().posts.lock().unwrap().is_empty());
}
