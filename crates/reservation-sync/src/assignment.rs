//! Hand-off of newly created tasks to the auto-assignment service.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::AssignmentConfig;
use crate::error::AssignmentError;
use crate::retry::{RetryError, RetryPolicy};

/// External service that assigns cleaners to tasks.
#[async_trait]
pub trait AssignmentService: Send + Sync {
    /// Ask the service to assign the given tasks. Called once per run.
    async fn assign(&self, task_ids: &[String]) -> Result<(), RetryError<AssignmentError>>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AssignRequest<'a> {
    task_ids: &'a [String],
}

/// Auto-assignment over HTTP: `POST {url}` with `{"taskIds": [...]}`.
#[derive(Debug, Clone)]
pub struct HttpAssignmentClient {
    client: Client,
    config: AssignmentConfig,
    retry: RetryPolicy,
}

impl HttpAssignmentClient {
    /// Create a new assignment client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: AssignmentConfig, retry: RetryPolicy) -> Result<Self, AssignmentError> {
        let client = Client::builder().timeout(retry.timeout).build()?;
        Ok(Self {
            client,
            config,
            retry,
        })
    }

    async fn post(&self, task_ids: &[String]) -> Result<(), AssignmentError> {
        let mut request = self
            .client
            .post(&self.config.url)
            .json(&AssignRequest { task_ids });
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AssignmentError::Api {
                status: status.as_u16(),
                message,
            });
        }

        debug!(status = %status, "Assignment service accepted batch");
        Ok(())
    }
}

#[async_trait]
impl AssignmentService for HttpAssignmentClient {
    async fn assign(&self, task_ids: &[String]) -> Result<(), RetryError<AssignmentError>> {
        self.retry
            .execute("auto-assignment", || self.post(task_ids))
            .await?;
        info!(count = task_ids.len(), "Requested auto-assignment");
        Ok(())
    }
}
