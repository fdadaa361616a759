//! HTTP implementation of the analysis backend.

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use spendwise_analysis::{BackendError, JobHandle, JobStatus, JobStatusBackend};
use spendwise_core::{ExpenseId, ExpenseRecord};

use crate::config::BackendConfig;

/// Submits analysis jobs to `POST {base}/{analysis_path}` and polls
/// `GET {base}/{analysis_path}/{job_id}` for `{"complete": bool}`.
#[derive(Debug, Clone)]
pub struct HttpJobStatusBackend {
    client: reqwest::Client,
    config: BackendConfig,
}

#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    expense_ids: Vec<&'a ExpenseId>,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    job_id: String,
}

impl HttpJobStatusBackend {
    pub fn new(config: BackendConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    pub fn with_client(client: reqwest::Client, config: BackendConfig) -> Self {
        Self { client, config }
    }

    fn jobs_url(&self) -> String {
        format!("{}/{}", self.config.base_url, self.config.analysis_path)
    }

    /// `{jobs_url}/{job_id}` with the handle escaped as a single path segment.
    fn job_url(&self, handle: &JobHandle) -> Result<Url, BackendError> {
        let mut url = Url::parse(&self.jobs_url())
            .map_err(|e| BackendError::Internal(format!("invalid analysis endpoint: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| BackendError::Internal("analysis endpoint cannot carry a path".into()))?
            .pop_if_empty()
            .push(handle.as_str());
        Ok(url)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.config.api_key)
            .bearer_auth(self.config.bearer())
    }
}

async fn send_json<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T, BackendError> {
    let response = builder
        .send()
        .await
        .map_err(|e| BackendError::Network(e.to_string()))?;
    decode(response).await
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
    let status = response.status();
    let body = response
        .bytes()
        .await
        .map_err(|e| BackendError::Network(e.to_string()))?;

    if !status.is_success() {
        return Err(BackendError::Status {
            status: status.as_u16(),
            body: String::from_utf8_lossy(&body).into_owned(),
        });
    }
    serde_json::from_slice(&body).map_err(|e| BackendError::Decode(e.to_string()))
}

#[async_trait]
impl JobStatusBackend for HttpJobStatusBackend {
    async fn submit(&self, expenses: &[ExpenseRecord]) -> Result<JobHandle, BackendError> {
        let request = SubmitRequest {
            expense_ids: expenses.iter().map(|e| &e.id).collect(),
        };
        let response: SubmitResponse =
            send_json(self.authorized(self.client.post(self.jobs_url())).json(&request)).await?;
        Ok(JobHandle(response.job_id))
    }

    async fn query_job_status(
        &self,
        handle: &JobHandle,
        attempt: u32,
    ) -> Result<JobStatus, BackendError> {
        let url = self.job_url(handle)?;
        let status: JobStatus = send_json(
            self.authorized(self.client.get(url))
                .query(&[("attempt", attempt)]),
        )
        .await?;
        tracing::trace!(job = %handle, attempt, complete = status.complete, "job status");
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_url_escapes_the_handle() {
        let config = BackendConfig::new("http://localhost:54321/", "key");
        let backend = HttpJobStatusBackend::new(config);
        let url = backend.job_url(&JobHandle("a/b?c d".to_string())).unwrap();

        assert_eq!(
            url.as_str(),
            "http://localhost:54321/functions/v1/analysis-jobs/a%2Fb%3Fc%20d"
        );
        assert_eq!(url.query(), None);
    }
}
