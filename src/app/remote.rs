use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize};

use crate::pages::Category;

use super::{backend::*, errors::TransportError};

/// Longest response body kept in a status error
const MAX_ERROR_BODY: usize = 200;

/// HTTP client for the remote index service.
pub struct HttpBackend {
    remote_addr: String,
    client: reqwest::Client,
    health_timeout: Duration,
}

impl HttpBackend {
    pub fn new(
        addr: &str,
        request_timeout: Duration,
        health_timeout: Duration,
    ) -> Result<HttpBackend, TransportError> {
        let remote_addr = addr.strip_suffix('/').unwrap_or(addr).to_string();
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;

        Ok(HttpBackend {
            remote_addr,
            client,
            health_timeout,
        })
    }

    pub fn addr(&self) -> &str {
        &self.remote_addr
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        log::debug!("GET {}{}", self.remote_addr, url);
        self.client.get(format!("{}{}", self.remote_addr, url))
    }

    fn post(&self, url: &str) -> reqwest::RequestBuilder {
        log::debug!("POST {}{}", self.remote_addr, url);
        self.client.post(format!("{}{}", self.remote_addr, url))
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
enum WebResponse<T> {
    Error { error: String },
    Data(T),
}

async fn handle_response<T>(response: reqwest::Response) -> Result<T, TransportError>
where
    T: DeserializeOwned,
{
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        return Err(TransportError::Status {
            status: status.as_u16(),
            body: text.chars().take(MAX_ERROR_BODY).collect(),
        });
    }

    let web_response = serde_json::from_str::<WebResponse<T>>(&text).map_err(|err| {
        log::error!("{err}. tried to parse: {text:?}");
        TransportError::Decode(err.to_string())
    })?;

    match web_response {
        WebResponse::Data(data) => Ok(data),
        WebResponse::Error { error } => Err(TransportError::Remote(error)),
    }
}

#[async_trait]
impl RemoteBackend for HttpBackend {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, TransportError> {
        let resp = self.post("/embed").json(&EmbedRequest { texts }).send().await?;
        let data: EmbedResponse = handle_response(resp).await?;

        if data.embeddings.len() != texts.len() {
            return Err(TransportError::Decode(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                data.embeddings.len()
            )));
        }

        log::debug!(
            "remote returned {} embeddings (dimension {})",
            data.embeddings.len(),
            data.dimension
        );
        Ok(data.embeddings)
    }

    async fn add(
        &self,
        embeddings: &[Vec<f32>],
        metadata: &[ChunkMetadata],
    ) -> Result<AddResponse, TransportError> {
        let resp = self
            .post("/add")
            .json(&AddRequest {
                embeddings,
                metadata,
            })
            .send()
            .await?;

        handle_response(resp).await
    }

    async fn search(
        &self,
        query: &str,
        k: usize,
        category: Option<Category>,
    ) -> Result<Vec<SearchHit>, TransportError> {
        let resp = self
            .post("/search")
            .json(&SearchRequest { query, k, category })
            .send()
            .await?;

        let data: SearchResponse = handle_response(resp).await?;
        Ok(data.results)
    }

    async fn compare(&self, query: &str) -> Result<Vec<Product>, TransportError> {
        let resp = self
            .post("/compare")
            .json(&CompareRequest { query })
            .send()
            .await?;

        let data: CompareResponse = handle_response(resp).await?;
        Ok(data.products)
    }

    async fn stats(&self) -> Result<Stats, TransportError> {
        let resp = self.get("/stats").send().await?;
        handle_response(resp).await
    }

    async fn health(&self) -> Result<Health, TransportError> {
        let resp = self
            .get("/health")
            .timeout(self.health_timeout)
            .send()
            .await?;
        handle_response(resp).await
    }
}
