use std::collections::HashMap;

use chrono::Local;
use clap::ValueEnum;
use rayon::ThreadPool;
use rayon::prelude::*;
use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

use crate::catalog::{Catalog, SampleMetadata};
use crate::client::{MgsClient, response_str};
use crate::dispatch::{self, Schema};
use crate::domain::UploadOutcome;
use crate::error::MgsError;
use crate::parsers::ParsedResult;

/// Worker count used when result uploads run in parallel.
pub const PARALLEL_WORKERS: usize = 5;

/// What happens to a sample's results when the sample itself cannot be created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum SampleErrorPolicy {
    /// Stop the batch and return the error.
    #[default]
    Abort,
    /// Record one error outcome per result type and move on.
    Record,
}

#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub workers: usize,
    pub on_sample_error: SampleErrorPolicy,
    /// Only use sample UUIDs created by this uploader instead of asking the server.
    pub strict: bool,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            workers: 1,
            on_sample_error: SampleErrorPolicy::Abort,
            strict: true,
        }
    }
}

#[derive(Debug, Serialize)]
struct ToolResultPayload<'a> {
    result_name: String,
    tool_name: &'a str,
    data: ParsedResult,
}

pub struct Uploader<C: MgsClient> {
    client: C,
    options: UploadOptions,
    group_uuid: Option<String>,
    created_group: Option<String>,
    sample_uuids: HashMap<String, String>,
}

impl<C: MgsClient> Uploader<C> {
    pub fn new(client: C) -> Self {
        Self::with_options(client, UploadOptions::default())
    }

    pub fn with_options(client: C, options: UploadOptions) -> Self {
        Self {
            client,
            options,
            group_uuid: None,
            created_group: None,
            sample_uuids: HashMap::new(),
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Name of the group [`Uploader::resolve_group`] created, if it created one.
    pub fn created_group_name(&self) -> Option<&str> {
        self.created_group.as_deref()
    }

    pub fn create_sample_group(&self, group_name: &str) -> Result<String, MgsError> {
        let response = self
            .client
            .post("/api/v1/sample_groups", &json!({ "name": group_name }))?;
        response_str(&response, "/data/sample_group/uuid")
    }

    /// Creates a sample under `group_uuid` and remembers its UUID.
    pub fn create_sample(
        &mut self,
        sample_name: &str,
        group_uuid: &str,
        metadata: Option<&Map<String, Value>>,
    ) -> Result<String, MgsError> {
        let metadata = metadata.cloned().unwrap_or_default();
        let payload = json!({
            "name": sample_name,
            "sample_group_uuid": group_uuid,
            "metadata": metadata,
        });
        let response = self.client.post("/api/v1/samples", &payload)?;
        let sample_uuid = response_str(&response, "/data/sample/uuid")?;
        self.sample_uuids
            .insert(sample_name.to_string(), sample_uuid.clone());
        Ok(sample_uuid)
    }

    /// UUID of a sample, from this session's cache or, when not strict, the server.
    pub fn sample_uuid(&self, sample_name: &str) -> Result<String, MgsError> {
        if let Some(uuid) = self.sample_uuids.get(sample_name) {
            return Ok(uuid.clone());
        }
        if self.options.strict {
            return Err(MgsError::UnknownSample(sample_name.to_string()));
        }
        self.lookup_sample_uuid(sample_name)
            .map(|(_, sample_uuid)| sample_uuid)
    }

    pub fn upload_sample_result(
        &self,
        sample_uuid: &str,
        result_type: &str,
        payload: &Value,
    ) -> Result<Value, MgsError> {
        self.client
            .post(&format!("/api/v1/samples/{sample_uuid}/{result_type}"), payload)
    }

    /// Returns (name, uuid) as reported by the server.
    pub fn lookup_sample_uuid(&self, sample_name: &str) -> Result<(String, String), MgsError> {
        let response = self
            .client
            .get(&format!("/api/v1/samples/getid/{sample_name}"))?;
        Ok((
            response_str(&response, "/data/sample_name")?,
            response_str(&response, "/data/sample_uuid")?,
        ))
    }

    pub fn lookup_group_uuid(&self, group_name: &str) -> Result<(String, String), MgsError> {
        let response = self
            .client
            .get(&format!("/api/v1/sample_groups/getid/{group_name}"))?;
        Ok((
            response_str(&response, "/data/sample_group_name")?,
            response_str(&response, "/data/sample_group_uuid")?,
        ))
    }

    pub fn run_group_middleware(&self, group_uuid: &str) -> Result<Value, MgsError> {
        self.client.post(
            &format!("/api/v1/sample_groups/{group_uuid}/middleware"),
            &json!({}),
        )
    }

    pub fn run_sample_middleware(&self, sample_name: &str) -> Result<Value, MgsError> {
        let (_, sample_uuid) = self.lookup_sample_uuid(sample_name)?;
        debug!(sample = sample_name, %sample_uuid, "resolved sample");
        self.client.post(
            &format!("/api/v1/samples/{sample_uuid}/middleware"),
            &json!({}),
        )
    }

    pub fn upload_metadata(
        &self,
        sample_name: &str,
        metadata: &Map<String, Value>,
    ) -> Result<Value, MgsError> {
        let payload = json!({
            "sample_name": sample_name,
            "metadata": metadata,
        });
        self.client.post("/api/v1/samples/metadata", &payload)
    }

    /// Uses `group_uuid` when given, otherwise creates a timestamped group.
    /// The first resolved group is reused for the lifetime of the uploader.
    pub fn resolve_group(&mut self, group_uuid: Option<&str>) -> Result<String, MgsError> {
        if let Some(uuid) = &self.group_uuid {
            return Ok(uuid.clone());
        }
        let uuid = match group_uuid {
            Some(uuid) => uuid.to_string(),
            None => {
                let group_name = format!(
                    "upload_group_{}",
                    Local::now().format("%Y-%m-%dT%H:%M:%S%.6f")
                );
                let uuid = self.create_sample_group(&group_name)?;
                info!(group = %group_name, %uuid, "group created");
                self.created_group = Some(group_name);
                uuid
            }
        };
        self.group_uuid = Some(uuid.clone());
        Ok(uuid)
    }

    /// Creates every sample in `catalog` and uploads each of its results.
    ///
    /// Result failures become error outcomes; sample-creation failures follow
    /// [`UploadOptions::on_sample_error`].
    pub fn upload_all_results(
        &mut self,
        group_uuid: Option<&str>,
        catalog: &Catalog,
        metadata: &SampleMetadata,
    ) -> Result<Vec<UploadOutcome>, MgsError> {
        let group_uuid = self.resolve_group(group_uuid)?;
        let pool = self.worker_pool()?;

        let mut outcomes = Vec::with_capacity(catalog.result_count());
        for (sample_name, results) in catalog.samples() {
            if let Err(err) = self.create_sample(sample_name, &group_uuid, metadata.get(sample_name))
            {
                match self.options.on_sample_error {
                    SampleErrorPolicy::Abort => return Err(err),
                    SampleErrorPolicy::Record => {
                        warn!(sample = %sample_name, error = %err, "could not create sample");
                        let message = err.to_string();
                        outcomes.extend(results.keys().map(|result_type| {
                            UploadOutcome::error(sample_name, None, result_type, &message)
                        }));
                        continue;
                    }
                }
            }

            let pending = results.iter().collect::<Vec<_>>();
            let sample_outcomes = match &pool {
                Some(pool) => pool.install(|| {
                    pending
                        .par_iter()
                        .map(|(result_type, schema)| {
                            self.upload_result(sample_name, result_type, schema)
                        })
                        .collect::<Vec<_>>()
                }),
                None => pending
                    .iter()
                    .map(|(result_type, schema)| {
                        self.upload_result(sample_name, result_type, schema)
                    })
                    .collect(),
            };
            outcomes.extend(sample_outcomes);
        }
        Ok(outcomes)
    }

    fn worker_pool(&self) -> Result<Option<ThreadPool>, MgsError> {
        if self.options.workers <= 1 {
            return Ok(None);
        }
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.workers)
            .thread_name(|index| format!("mgs-upload-{index}"))
            .build()
            .map(Some)
            .map_err(|err| MgsError::WorkerPool(err.to_string()))
    }

    fn upload_result(&self, sample_name: &str, result_type: &str, schema: &Schema) -> UploadOutcome {
        let sample_uuid = match self.sample_uuid(sample_name) {
            Ok(uuid) => uuid,
            Err(err) => return UploadOutcome::error(sample_name, None, result_type, err),
        };
        match self.parse_and_upload(sample_name, &sample_uuid, result_type, schema) {
            Ok(()) => {
                info!(sample = %sample_name, %result_type, "uploaded result");
                UploadOutcome::success(sample_name, Some(&sample_uuid), result_type)
            }
            Err(err) => {
                warn!(sample = %sample_name, %result_type, error = %err, "result upload failed");
                UploadOutcome::error(sample_name, Some(&sample_uuid), result_type, err)
            }
        }
    }

    fn parse_and_upload(
        &self,
        sample_name: &str,
        sample_uuid: &str,
        result_type: &str,
        schema: &Schema,
    ) -> Result<(), MgsError> {
        let data = dispatch::parse_schema(result_type, schema)?;
        let payload = ToolResultPayload {
            result_name: format!("{sample_name}::{result_type}"),
            tool_name: result_type,
            data,
        };
        let payload =
            serde_json::to_value(&payload).map_err(|err| MgsError::Json(err.to_string()))?;
        self.upload_sample_result(sample_uuid, result_type, &payload)?;
        Ok(())
    }
}
