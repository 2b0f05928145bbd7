//! REST implementation of the remote backend.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};

use fieldops_offline::{BackendError, Payload, Record, RemoteBackend};

/// Remote backend speaking plain REST over HTTP:
/// `POST /{collection}`, `PATCH /{collection}/{id}`, `DELETE /{collection}/{id}`.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpBackend {
    pub fn new(base_url: Url) -> Self {
        Self {
            client: Client::new(),
            base_url,
            token: None,
        }
    }

    pub fn with_token(base_url: Url, token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..Self::new(base_url)
        }
    }

    fn url(&self, collection: &str, id: Option<&str>) -> Result<Url, BackendError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| BackendError::permanent(format!("invalid base url {}", self.base_url)))?;
            segments.pop_if_empty().push(collection);
            if let Some(id) = id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let req = self.client.request(method, url);
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send(&self, req: RequestBuilder) -> Result<reqwest::Response, BackendError> {
        req.send()
            .await
            .map_err(|e| BackendError::transient(format!("request failed: {e}")))
    }

    async fn error_for(resp: reqwest::Response) -> BackendError {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        BackendError::from_status(status.as_u16(), &body)
    }

    async fn send_checked(&self, req: RequestBuilder) -> Result<reqwest::Response, BackendError> {
        let resp = self.send(req).await?;
        if resp.status().is_success() {
            Ok(resp)
        } else {
            Err(Self::error_for(resp).await)
        }
    }

    /// Decode a record from a successful response.
    ///
    /// The write already happened, so an unreadable body must not turn into a retry.
    async fn record(resp: reqwest::Response) -> Record {
        let bytes = match resp.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read backend response body");
                return Record::Null;
            }
        };
        if bytes.is_empty() {
            return Record::Null;
        }
        serde_json::from_slice(&bytes).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "backend returned a non-JSON body");
            Record::Null
        })
    }
}

#[async_trait]
impl RemoteBackend for HttpBackend {
    async fn insert(&self, collection: &str, record: &Payload) -> Result<Record, BackendError> {
        let url = self.url(collection, None)?;
        let resp = self.send_checked(self.request(Method::POST, url).json(record)).await?;
        Ok(Self::record(resp).await)
    }

    async fn update_by_id(
        &self,
        collection: &str,
        id: &str,
        patch: &Payload,
    ) -> Result<Record, BackendError> {
        let url = self.url(collection, Some(id))?;
        let resp = self.send_checked(self.request(Method::PATCH, url).json(patch)).await?;
        Ok(Self::record(resp).await)
    }

    async fn delete_by_id(&self, collection: &str, id: &str) -> Result<(), BackendError> {
        let url = self.url(collection, Some(id))?;
        let resp = self.send(self.request(Method::DELETE, url)).await?;
        match resp.status() {
            status if status.is_success() => Ok(()),
            // Already gone, e.g. a delete retried after its response was lost.
            StatusCode::NOT_FOUND => {
                tracing::debug!(collection, id, "delete target already absent");
                Ok(())
            }
            _ => Err(Self::error_for(resp).await),
        }
    }
}
