use std::path::Path;

use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use tracing::error;

use super::envelope::error_message;
use super::envelope::Envelope;
use super::envelope::ResponseStatus;
use super::CloudStatus;
use crate::params::generate_key;
use crate::params::Query;
use crate::DatasetRef;
use crate::Error;
use crate::GlmParams;
use crate::HttpConfig;
use crate::JobHandle;
use crate::JobKind;
use crate::JobParams;
use crate::JobResult;
use crate::JobStatus;
use crate::JobStatusSource;
use crate::NodeEndpoint;
use crate::ParseParams;
use crate::RemoteError;
use crate::Result;
use crate::RfParams;
use crate::SystemError;

/// JSON API client bound to one node.
///
/// Cheap to clone: the underlying connection pool is shared. No call retries;
/// transport and service failures surface as [`RemoteError`].
#[derive(Debug, Clone)]
pub struct NodeClient {
    http: reqwest::Client,
    endpoint: NodeEndpoint,
    base_url: String,
}

impl NodeClient {
    pub fn new(
        endpoint: NodeEndpoint,
        config: &HttpConfig,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()
            .map_err(|source| RemoteError::Connection {
                url: endpoint.base_url(),
                source,
            })?;
        Ok(Self::with_http(endpoint, http))
    }

    /// Client sharing an existing connection pool
    pub fn with_http(
        endpoint: NodeEndpoint,
        http: reqwest::Client,
    ) -> Self {
        let base_url = endpoint.base_url();
        Self {
            http,
            endpoint,
            base_url,
        }
    }

    pub fn endpoint(&self) -> &NodeEndpoint {
        &self.endpoint
    }

    /// Membership view of this node (`Cloud.json`)
    pub async fn get_cloud(&self) -> Result<CloudStatus> {
        let envelope = self.get("Cloud", &[]).await?;
        decode_body("Cloud", envelope.body)
    }

    /// Uploads a local file as a raw dataset keyed by its file name
    ///
    /// # Errors
    /// - [`SystemError::Io`] when the file cannot be read
    /// - [`RemoteError::MissingField`] when the reply carries no key
    pub async fn upload_file(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<DatasetRef> {
        let path = path.as_ref();
        let key = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| SystemError::NotFound(path.to_path_buf()))?
            .to_string();
        let bytes = tokio::fs::read(path).await.map_err(SystemError::Io)?;
        debug!(?path, %key, size = bytes.len(), "uploading");

        let builder = self
            .http
            .post(self.url("PostFile"))
            .query(&[("key", key.as_str())])
            .body(bytes);
        let envelope = self.send("PostFile", builder).await?;
        let key = envelope.require_str("PostFile", &["key", "keyHref"])?;
        Ok(DatasetRef::new(key))
    }

    /// Starts parsing a raw dataset; the handle's key is the parsed data key
    pub async fn parse(
        &self,
        source: &DatasetRef,
        params: &ParseParams,
    ) -> Result<JobHandle> {
        params.validate()?;
        let destination = params.destination_for(source);
        let query = params.to_query(source);
        let envelope = self.get("Parse", &query).await?;
        job_from_start(JobKind::Parse, "Parse", destination, query, envelope)
    }

    /// Starts a Random Forest; the handle's key is the model key
    pub async fn start_rf(
        &self,
        data: &DatasetRef,
        params: &RfParams,
    ) -> Result<JobHandle> {
        params.validate()?;
        let model_key = params.model_key.clone().unwrap_or_else(|| generate_key("rf"));
        let query = params.to_query(data, &model_key);
        let envelope = self.get("RF", &query).await?;
        job_from_start(JobKind::RandomForest, "RF", model_key, query, envelope)
    }

    /// Starts a GLM. The service usually answers synchronously, in which case
    /// the handle already holds the result.
    pub async fn start_glm(
        &self,
        data: &DatasetRef,
        params: &GlmParams,
    ) -> Result<JobHandle> {
        params.validate()?;
        let query = params.to_query(data);
        let envelope = self.get("GLM", &query).await?;
        let key = envelope
            .body
            .get("key")
            .and_then(Value::as_str)
            .unwrap_or(data.key())
            .to_string();
        job_from_start(JobKind::Glm, "GLM", key, query, envelope)
    }

    pub async fn start_job(
        &self,
        data: &DatasetRef,
        params: &JobParams,
    ) -> Result<JobHandle> {
        match params {
            JobParams::Parse(p) => self.parse(data, p).await,
            JobParams::RandomForest(p) => self.start_rf(data, p).await,
            JobParams::Glm(p) => self.start_glm(data, p).await,
        }
    }

    /// One status observation of `job`.
    ///
    /// An error reported by the status request is the job's failure, not a
    /// transport problem, so it maps to [`JobStatus::Failed`].
    pub async fn job_status(
        &self,
        job: &JobHandle,
    ) -> Result<JobStatus> {
        if let Some(result) = job.result() {
            return Ok(JobStatus::Succeeded(result.clone()));
        }

        let envelope = match self.get(job.status_request(), job.status_args()).await {
            Ok(envelope) => envelope,
            Err(Error::Remote(RemoteError::Service { message, .. })) => {
                return Ok(JobStatus::Failed(message));
            }
            Err(e) => return Err(e),
        };

        let status = match envelope.status() {
            ResponseStatus::Poll => match envelope.progress() {
                (0, _) => JobStatus::Pending,
                (progress, total) => JobStatus::Running { progress, total },
            },
            ResponseStatus::Done | ResponseStatus::Redirect => {
                JobStatus::Succeeded(JobResult::new(envelope.body))
            }
            ResponseStatus::Error => JobStatus::Failed("service reported error status".to_string()),
        };
        debug!(key = job.key(), ?status, "[:NodeClient:job_status]");
        Ok(status)
    }

    fn url(
        &self,
        request: &str,
    ) -> String {
        format!("{}/{}.json", self.base_url, request)
    }

    async fn get(
        &self,
        request: &str,
        query: &[(String, String)],
    ) -> Result<Envelope> {
        let builder = self.http.get(self.url(request)).query(query);
        self.send(request, builder).await
    }

    async fn send(
        &self,
        request: &str,
        builder: RequestBuilder,
    ) -> Result<Envelope> {
        let url = self.url(request);
        debug!(%url, "[:NodeClient:send]");

        let response = builder.send().await.map_err(|source| RemoteError::Connection {
            url: url.clone(),
            source,
        })?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(|source| RemoteError::Connection {
            url: url.clone(),
            source,
        })?;

        if !status.is_success() {
            let message = serde_json::from_slice::<Value>(&bytes)
                .ok()
                .and_then(|body| error_message(&body))
                .unwrap_or_else(|| String::from_utf8_lossy(&bytes).trim().to_string());
            error!(%url, status = status.as_u16(), %message, "[:NodeClient:send] request rejected");
            return Err(RemoteError::Http {
                request: request.to_string(),
                status: status.as_u16(),
                message,
            }
            .into());
        }

        let body: Value = serde_json::from_slice(&bytes).map_err(|source| RemoteError::Decode {
            request: request.to_string(),
            source,
        })?;
        Envelope::decode(request, body)
    }
}

#[async_trait]
impl JobStatusSource for NodeClient {
    async fn job_status(
        &self,
        job: &JobHandle,
    ) -> Result<JobStatus> {
        NodeClient::job_status(self, job).await
    }
}

/// Turns the reply of a start request into a handle
fn job_from_start(
    kind: JobKind,
    request: &str,
    key: String,
    query: Query,
    envelope: Envelope,
) -> Result<JobHandle> {
    let handle = match envelope.status() {
        ResponseStatus::Done => JobHandle::completed(kind, key, JobResult::new(envelope.body)),
        ResponseStatus::Redirect => {
            let (status_request, args) = envelope.redirect().ok_or_else(|| RemoteError::MissingField {
                request: request.to_string(),
                field: "response.redirect_request".to_string(),
            })?;
            JobHandle::new(kind, key, status_request, args)
        }
        ResponseStatus::Poll => JobHandle::new(kind, key, request, query),
        ResponseStatus::Error => {
            return Err(RemoteError::Service {
                request: request.to_string(),
                message: "service reported error status".to_string(),
            }
            .into())
        }
    };
    debug!(kind = kind.as_str(), key = handle.key(), state = ?handle.state(), "job started");
    Ok(handle)
}

fn decode_body<T: for<'de> Deserialize<'de>>(
    request: &str,
    body: Value,
) -> Result<T> {
    serde_json::from_value(body).map_err(|source| {
        RemoteError::Decode {
            request: request.to_string(),
            source,
        }
        .into()
    })
}
