use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::dispatch::Schema;
use crate::error::MgsError;
use crate::repository::Repository;

/// Result type → file role → path for a single sample.
pub type SampleResults = IndexMap<String, Schema>;

/// Sample name → metadata attached when the sample is created remotely.
pub type SampleMetadata = IndexMap<String, Map<String, Value>>;

/// A result file tagged with the sample, result type and role it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultFile {
    pub path: Utf8PathBuf,
    pub sample_name: String,
    pub result_type: String,
    pub role: String,
}

impl ResultFile {
    /// Derives the tags from a `<sample>.<result_type>.<role>[...]` base name.
    pub fn from_path(path: impl Into<Utf8PathBuf>) -> Result<Self, MgsError> {
        let path = path.into();
        let file_name = path
            .file_name()
            .ok_or_else(|| MgsError::InvalidResultFileName(path.to_string()))?;
        let mut components = file_name.split('.');
        let (Some(sample_name), Some(result_type), Some(role)) =
            (components.next(), components.next(), components.next())
        else {
            return Err(MgsError::InvalidResultFileName(path.to_string()));
        };
        if sample_name.is_empty() || result_type.is_empty() || role.is_empty() {
            return Err(MgsError::InvalidResultFileName(path.to_string()));
        }

        Ok(Self {
            sample_name: sample_name.to_string(),
            result_type: result_type.to_string(),
            role: role.to_string(),
            path,
        })
    }
}

/// Sample name → result type → file role → path, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Catalog {
    samples: IndexMap<String, SampleResults>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, file: ResultFile) {
        self.samples
            .entry(file.sample_name)
            .or_default()
            .entry(file.result_type)
            .or_default()
            .insert(file.role, file.path.into_std_path_buf());
    }

    /// Registers a sample with no results yet; existing entries are kept.
    pub fn insert_sample(&mut self, sample_name: &str) -> &mut SampleResults {
        self.samples.entry(sample_name.to_string()).or_default()
    }

    pub fn get(&self, sample_name: &str) -> Option<&SampleResults> {
        self.samples.get(sample_name)
    }

    pub fn samples(&self) -> impl Iterator<Item = (&String, &SampleResults)> {
        self.samples.iter()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn result_count(&self) -> usize {
        self.samples.values().map(IndexMap::len).sum()
    }
}

impl fmt::Display for Catalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (sample, results) in &self.samples {
            writeln!(f, "{sample}")?;
            for (result_type, schema) in results {
                let roles = schema.keys().map(String::as_str).collect::<Vec<_>>();
                writeln!(f, "  {result_type}: {}", roles.join(", "))?;
            }
        }
        Ok(())
    }
}

/// Anything that can enumerate result files grouped by sample.
pub trait SampleSource {
    fn catalog(&self) -> Result<Catalog, MgsError>;

    fn metadata(&self) -> Result<SampleMetadata, MgsError> {
        Ok(SampleMetadata::new())
    }
}

/// Result files named on the command line.
#[derive(Debug, Clone)]
pub struct FileSource {
    files: Vec<Utf8PathBuf>,
}

impl FileSource {
    pub fn new(files: Vec<Utf8PathBuf>) -> Self {
        Self { files }
    }
}

impl SampleSource for FileSource {
    fn catalog(&self) -> Result<Catalog, MgsError> {
        let mut catalog = Catalog::new();
        for path in &self.files {
            let file = ResultFile::from_path(path.clone())?;
            debug!(
                sample = %file.sample_name,
                result_type = %file.result_type,
                role = %file.role,
                "cataloged result file"
            );
            catalog.insert(file);
        }
        Ok(catalog)
    }
}

/// Samples recorded in a structured local repository.
pub struct RepositorySource<R: Repository> {
    repository: R,
    unsupported: Vec<String>,
}

impl<R: Repository> RepositorySource<R> {
    pub fn new(repository: R, unsupported: Vec<String>) -> Self {
        Self {
            repository,
            unsupported,
        }
    }

    fn is_supported(&self, result_type: &str) -> bool {
        !self.unsupported.iter().any(|item| item == result_type)
    }
}

impl<R: Repository> SampleSource for RepositorySource<R> {
    fn catalog(&self) -> Result<Catalog, MgsError> {
        let mut catalog = Catalog::new();
        for sample in self.repository.samples()? {
            catalog.insert_sample(&sample.name);
            for result in sample.results {
                if !self.is_supported(&result.result_type) {
                    debug!(
                        sample = %sample.name,
                        result_type = %result.result_type,
                        "skipping unsupported result type"
                    );
                    continue;
                }
                for (role, path) in result.files {
                    catalog.insert(ResultFile {
                        path,
                        sample_name: sample.name.clone(),
                        result_type: result.result_type.clone(),
                        role,
                    });
                }
            }
        }
        Ok(catalog)
    }

    fn metadata(&self) -> Result<SampleMetadata, MgsError> {
        Ok(self
            .repository
            .samples()?
            .into_iter()
            .filter(|sample| !sample.metadata.is_empty())
            .map(|sample| (sample.name, sample.metadata))
            .collect())
    }
}

pub fn is_result_file_name(path: &Utf8Path) -> bool {
    ResultFile::from_path(path.to_path_buf()).is_ok()
}
