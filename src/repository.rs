use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde_json::{Map, Value};

use crate::error::MgsError;

pub const METADATA_FILE: &str = "metadata.json";

#[derive(Debug, Clone, PartialEq)]
pub struct RepoSample {
    pub name: String,
    pub metadata: Map<String, Value>,
    pub results: Vec<RepoResult>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RepoResult {
    pub result_type: String,
    /// (role, path) pairs.
    pub files: Vec<(String, Utf8PathBuf)>,
}

pub trait Repository {
    fn samples(&self) -> Result<Vec<RepoSample>, MgsError>;
}

/// Repository laid out as `<root>/<sample>/<result_type>/<role>[.ext]`, with an
/// optional `<root>/<sample>/metadata.json` object per sample.
#[derive(Debug, Clone)]
pub struct DirectoryRepository {
    root: Utf8PathBuf,
}

impl DirectoryRepository {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn read_sample(&self, name: String, dir: &Utf8Path) -> Result<RepoSample, MgsError> {
        let metadata = read_metadata(&dir.join(METADATA_FILE))?;
        let mut results = Vec::new();
        for (result_type, result_dir) in sorted_entries(dir, EntryKind::Dir)? {
            let files = sorted_entries(&result_dir, EntryKind::File)?
                .into_iter()
                .map(|(file_name, path)| (role_from_file_name(&file_name), path))
                .collect();
            results.push(RepoResult { result_type, files });
        }
        Ok(RepoSample {
            name,
            metadata,
            results,
        })
    }
}

impl Repository for DirectoryRepository {
    fn samples(&self) -> Result<Vec<RepoSample>, MgsError> {
        if !self.root.as_std_path().is_dir() {
            return Err(MgsError::Filesystem(format!(
                "repository not found: {}",
                self.root
            )));
        }
        sorted_entries(&self.root, EntryKind::Dir)?
            .into_iter()
            .map(|(name, dir)| self.read_sample(name, &dir))
            .collect()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    Dir,
    File,
}

fn sorted_entries(dir: &Utf8Path, kind: EntryKind) -> Result<Vec<(String, Utf8PathBuf)>, MgsError> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir.as_std_path())
        .map_err(|err| MgsError::Filesystem(format!("read {dir}: {err}")))?
    {
        let entry = entry.map_err(|err| MgsError::Filesystem(err.to_string()))?;
        let Ok(path) = Utf8PathBuf::from_path_buf(entry.path()) else {
            continue;
        };
        let Some(name) = path.file_name().map(str::to_string) else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        let matches = match kind {
            EntryKind::Dir => path.as_std_path().is_dir(),
            EntryKind::File => path.as_std_path().is_file() && name != METADATA_FILE,
        };
        if matches {
            entries.push((name, path));
        }
    }
    entries.sort();
    Ok(entries)
}

fn role_from_file_name(file_name: &str) -> String {
    file_name
        .split_once('.')
        .map(|(role, _)| role)
        .unwrap_or(file_name)
        .to_string()
}

fn read_metadata(path: &Utf8Path) -> Result<Map<String, Value>, MgsError> {
    if !path.as_std_path().is_file() {
        return Ok(Map::new());
    }
    let content = fs::read_to_string(path.as_std_path())
        .map_err(|err| MgsError::Filesystem(format!("read {path}: {err}")))?;
    match serde_json::from_str(&content) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(MgsError::MetadataParse(format!(
            "{path}: expected a JSON object"
        ))),
        Err(err) => Err(MgsError::MetadataParse(format!("{path}: {err}"))),
    }
}
