//! REST transport over reqwest.
//!
//! Maps the wire protocol onto [`TaskTransport`]: `GET /tasks` (optionally
//! with `page`/`limit` query parameters), `GET/PUT/DELETE /tasks/{id}`, and
//! `POST /tasks`. Every request is bounded by the configured timeout and
//! races its cancellation token.

use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use tasklane_model::task::{NewTask, Task, TaskPatch};

use crate::config::ApiConfig;

use super::{TaskTransport, TransportError};

/// HTTP implementation of [`TaskTransport`].
pub struct HttpTransport {
    base_url: String,
    client: reqwest::Client,
}

impl HttpTransport {
    /// Creates a transport for the given API configuration.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Network`] if the underlying client cannot
    /// be constructed.
    pub fn new(config: &ApiConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn tasks_url(&self) -> String {
        format!("{}/tasks", self.base_url)
    }

    fn task_url(&self, id: &str) -> String {
        format!("{}/tasks/{id}", self.base_url)
    }

    /// Sends a request, racing the cancellation token, and checks status.
    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response, TransportError> {
        let response = tokio::select! {
            () = cancel.cancelled() => return Err(TransportError::Cancelled),
            result = request.send() => result.map_err(from_reqwest)?,
        };
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Http {
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    /// Reads and decodes the body, racing the cancellation token so a
    /// cancel landing mid-body is honored promptly, not at the timeout.
    async fn decode<T: DeserializeOwned>(
        response: reqwest::Response,
        cancel: &CancellationToken,
    ) -> Result<T, TransportError> {
        let body = tokio::select! {
            () = cancel.cancelled() => return Err(TransportError::Cancelled),
            result = response.text() => result.map_err(from_reqwest)?,
        };
        serde_json::from_str(&body).map_err(TransportError::InvalidBody)
    }
}

fn from_reqwest(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Network(err.to_string())
    }
}

impl TaskTransport for HttpTransport {
    async fn fetch_all(&self, cancel: &CancellationToken) -> Result<Vec<Task>, TransportError> {
        let response = self.send(self.client.get(self.tasks_url()), cancel).await?;
        Self::decode(response, cancel).await
    }

    async fn fetch_page(
        &self,
        page: u32,
        limit: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<Task>, TransportError> {
        let request = self
            .client
            .get(self.tasks_url())
            .query(&[("page", page.to_string()), ("limit", limit.to_string())]);
        let response = self.send(request, cancel).await?;
        Self::decode(response, cancel).await
    }

    async fn fetch_by_id(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<Task, TransportError> {
        let response = self.send(self.client.get(self.task_url(id)), cancel).await?;
        Self::decode(response, cancel).await
    }

    async fn create(
        &self,
        task: &NewTask,
        cancel: &CancellationToken,
    ) -> Result<Task, TransportError> {
        let request = self.client.post(self.tasks_url()).json(task);
        let response = self.send(request, cancel).await?;
        Self::decode(response, cancel).await
    }

    async fn update(
        &self,
        id: &str,
        patch: &TaskPatch,
        cancel: &CancellationToken,
    ) -> Result<Task, TransportError> {
        let request = self.client.put(self.task_url(id)).json(patch);
        let response = self.send(request, cancel).await?;
        Self::decode(response, cancel).await
    }

    async fn delete(&self, id: &str, cancel: &CancellationToken) -> Result<(), TransportError> {
        self.send(self.client.delete(self.task_url(id)), cancel)
            .await?;
        Ok(())
    }
}
