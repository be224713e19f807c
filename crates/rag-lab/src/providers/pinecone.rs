//! Pinecone serverless vector store over the REST API
//!
//! Control-plane calls (describe/create index) go to `api.pinecone.io`;
//! data-plane calls go to the per-index host, which is cached once known.

use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::{Client, Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::{Duration, Instant};

use crate::config::PineconeConfig;
use crate::error::{Error, Result};
use crate::types::record::rank_hits;
use crate::types::{IndexHandle, SearchHit, SimilarityMetric, VectorRecord};

use super::retry::RetryPolicy;
use super::vector_store::{VectorBackend, VectorStoreProvider};

const BACKEND: &str = "pinecone";
const TEXT_KEY: &str = "text";
const READY_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Pinecone index provider
pub struct PineconeVectorStore {
    client: Client,
    api_key: String,
    control_plane_url: String,
    api_version: String,
    cloud: String,
    region: String,
    namespace: String,
    batch_size: usize,
    ready_timeout: Duration,
    retry: RetryPolicy,
    /// index name -> data-plane host
    hosts: DashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct IndexDescription {
    dimension: usize,
    host: String,
    #[serde(default)]
    status: IndexStatus,
}

#[derive(Debug, Default, Deserialize)]
struct IndexStatus {
    #[serde(default)]
    ready: bool,
    #[serde(default)]
    state: String,
}

#[derive(Serialize)]
struct CreateIndexRequest<'a> {
    name: &'a str,
    dimension: usize,
    metric: &'a str,
    spec: IndexSpec<'a>,
}

#[derive(Serialize)]
struct IndexSpec<'a> {
    serverless: ServerlessSpec<'a>,
}

#[derive(Serialize)]
struct ServerlessSpec<'a> {
    cloud: &'a str,
    region: &'a str,
}

#[derive(Serialize)]
struct PineconeVector<'a> {
    id: &'a str,
    values: &'a [f32],
    metadata: Map<String, Value>,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: Vec<PineconeVector<'a>>,
    namespace: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    namespace: &'a str,
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
struct QueryMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<Map<String, Value>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteRequest<'a> {
    delete_all: bool,
    namespace: &'a str,
}

/// Successful or tolerated (404/409) reply
struct ApiReply {
    status: StatusCode,
    body: Value,
}

impl ApiReply {
    fn parse<T: serde::de::DeserializeOwned>(self) -> Result<T> {
        Ok(serde_json::from_value(self.body)?)
    }
}

impl PineconeVectorStore {
    /// Create the provider; the API key is resolved from config or environment
    pub fn connect(config: &PineconeConfig, retry: RetryPolicy) -> Result<Self> {
        let api_key = config.resolve_api_key()?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key,
            control_plane_url: config.control_plane_url.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
            cloud: config.cloud.clone(),
            region: config.region.clone(),
            namespace: config.namespace.clone(),
            batch_size: config.batch_size.clamp(1, 100),
            ready_timeout: Duration::from_secs(config.ready_timeout_secs),
            retry,
            hosts: DashMap::new(),
        })
    }

    /// Send a JSON request with retry; 404 and 409 are returned, not raised
    async fn call(&self, label: &str, method: Method, url: &str, body: Option<Value>) -> Result<ApiReply> {
        let method = &method;
        let body = body.as_ref();

        self.retry
            .run(label, move || async move {
                let mut request = self
                    .client
                    .request(method.clone(), url)
                    .header("Api-Key", &self.api_key)
                    .header("X-Pinecone-API-Version", &self.api_version);
                if let Some(body) = body {
                    request = request.json(body);
                }

                let response = request.send().await.map_err(transport_error)?;
                let status = response.status();
                let text = response.text().await.map_err(transport_error)?;

                if status.is_success() || status == StatusCode::NOT_FOUND || status == StatusCode::CONFLICT {
                    let body = if text.trim().is_empty() || !status.is_success() {
                        Value::Null
                    } else {
                        serde_json::from_str(&text)?
                    };
                    return Ok(ApiReply { status, body });
                }

                Err(status_error(status, &text))
            })
            .await
    }

    async fn describe_index(&self, name: &str) -> Result<Option<IndexDescription>> {
        let url = format!("{}/indexes/{}", self.control_plane_url, name);
        let reply = self.call("pinecone describe", Method::GET, &url, None).await?;
        if reply.status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(reply.parse()?))
    }

    async fn create_index(&self, name: &str, dimension: usize, metric: SimilarityMetric) -> Result<()> {
        let url = format!("{}/indexes", self.control_plane_url);
        let request = CreateIndexRequest {
            name,
            dimension,
            metric: metric.as_str(),
            spec: IndexSpec {
                serverless: ServerlessSpec {
                    cloud: &self.cloud,
                    region: &self.region,
                },
            },
        };
        let reply = self
            .call("pinecone create", Method::POST, &url, Some(serde_json::to_value(&request)?))
            .await?;
        if reply.status == StatusCode::CONFLICT {
            tracing::debug!("Pinecone index {} created concurrently", name);
        }
        Ok(())
    }

    /// Poll until the index reports ready
    async fn wait_ready(&self, name: &str) -> Result<IndexDescription> {
        let started = Instant::now();
        loop {
            match self.describe_index(name).await? {
                Some(desc) if desc.status.ready => return Ok(desc),
                Some(desc) => tracing::debug!("Pinecone index {} is {}", name, desc.status.state),
                None => tracing::debug!("Pinecone index {} not visible yet", name),
            }
            if started.elapsed() >= self.ready_timeout {
                return Err(Error::unavailable(
                    BACKEND,
                    format!("index {} not ready after {:?}", name, self.ready_timeout),
                ));
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
    }

    /// Data-plane host for an index
    async fn host_for(&self, index: &IndexHandle) -> Result<String> {
        if let Some(endpoint) = &index.endpoint {
            return Ok(endpoint.clone());
        }
        if let Some(host) = self.hosts.get(&index.name) {
            return Ok(host.clone());
        }
        let desc = self
            .describe_index(&index.name)
            .await?
            .ok_or_else(|| Error::index_not_found(BACKEND, index.name.as_str()))?;
        self.hosts.insert(index.name.clone(), desc.host.clone());
        Ok(desc.host)
    }
}

fn transport_error(e: reqwest::Error) -> Error {
    if e.is_timeout() || e.is_connect() {
        Error::unavailable(BACKEND, e.to_string())
    } else {
        Error::Http(e)
    }
}

fn status_error(status: StatusCode, body: &str) -> Error {
    let message = format!("HTTP {} - {}", status, body);
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        Error::unavailable(BACKEND, message)
    } else {
        Error::vector_db(format!("Pinecone request failed: {}", message))
    }
}

/// Data-plane URL; hosts are reported without a scheme
fn data_url(host: &str, path: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        format!("{}{}", host, path)
    } else {
        format!("https://{}{}", host, path)
    }
}

/// Metadata persisted with a vector: the chunk text plus provenance
fn record_metadata(record: &VectorRecord) -> Map<String, Value> {
    let mut metadata: Map<String, Value> = record
        .metadata
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();
    metadata.insert(TEXT_KEY.to_string(), Value::String(record.text.clone()));
    metadata
}

fn match_to_hit(m: QueryMatch) -> SearchHit {
    let text = m
        .metadata
        .as_ref()
        .and_then(|md| md.get(TEXT_KEY))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    SearchHit {
        id: m.id,
        text,
        score: m.score,
    }
}

#[async_trait]
impl VectorStoreProvider for PineconeVectorStore {
    async fn initialize_index(
        &self,
        name: &str,
        dimension: usize,
        metric: SimilarityMetric,
    ) -> Result<IndexHandle> {
        let desc = match self.describe_index(name).await? {
            Some(desc) => {
                if desc.dimension != dimension {
                    return Err(Error::DimensionMismatch {
                        expected: desc.dimension,
                        actual: dimension,
                    });
                }
                if desc.status.ready {
                    desc
                } else {
                    self.wait_ready(name).await?
                }
            }
            None => {
                tracing::info!("Creating Pinecone index {} ({} dims)", name, dimension);
                self.create_index(name, dimension, metric).await?;
                self.wait_ready(name).await?
            }
        };

        self.hosts.insert(name.to_string(), desc.host.clone());
        Ok(IndexHandle::new(name, dimension, metric).with_endpoint(desc.host))
    }

    async fn upsert(&self, index: &IndexHandle, records: &[VectorRecord]) -> Result<usize> {
        index.check_records(records)?;
        if records.is_empty() {
            return Ok(0);
        }

        let url = data_url(&self.host_for(index).await?, "/vectors/upsert");
        let total = records.len();
        let mut written = 0usize;

        for (b, batch) in records.chunks(self.batch_size).enumerate() {
            let request = UpsertRequest {
                vectors: batch
                    .iter()
                    .map(|r| PineconeVector {
                        id: &r.id,
                        values: &r.vector,
                        metadata: record_metadata(r),
                    })
                    .collect(),
                namespace: &self.namespace,
            };
            let body = serde_json::to_value(&request)?;

            let reply = self
                .call("pinecone upsert", Method::POST, &url, Some(body))
                .await
                .map_err(|e| Error::upload(BACKEND, total - written, total, e.to_string()))?;
            if reply.status == StatusCode::NOT_FOUND {
                return Err(Error::index_not_found(BACKEND, index.name.as_str()));
            }

            let upserted = reply.parse::<UpsertResponse>()?.upserted_count;
            if upserted != batch.len() {
                return Err(Error::upload(
                    BACKEND,
                    total - written - upserted.min(batch.len()),
                    total,
                    format!("batch {} upserted {} of {}", b, upserted, batch.len()),
                ));
            }

            written += upserted;
            tracing::debug!("Pinecone batch {} stored ({}/{})", b, written, total);
        }

        Ok(written)
    }

    async fn query(&self, index: &IndexHandle, vector: &[f32], top_k: usize) -> Result<Vec<SearchHit>> {
        index.check_dimension(vector)?;
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let url = data_url(&self.host_for(index).await?, "/query");
        let request = QueryRequest {
            namespace: &self.namespace,
            vector,
            top_k,
            include_metadata: true,
            include_values: false,
        };

        let reply = self
            .call("pinecone query", Method::POST, &url, Some(serde_json::to_value(&request)?))
            .await?;
        if reply.status == StatusCode::NOT_FOUND {
            return Err(Error::index_not_found(BACKEND, index.name.as_str()));
        }

        let response: QueryResponse = reply.parse()?;
        let hits = response.matches.into_iter().map(match_to_hit).collect();
        Ok(rank_hits(hits, top_k))
    }

    async fn clear(&self, index: &IndexHandle) -> Result<()> {
        let url = data_url(&self.host_for(index).await?, "/vectors/delete");
        let request = DeleteRequest {
            delete_all: true,
            namespace: &self.namespace,
        };

        let reply = self
            .call("pinecone delete", Method::POST, &url, Some(serde_json::to_value(&request)?))
            .await?;
        if reply.status == StatusCode::NOT_FOUND {
            tracing::debug!("Pinecone namespace already empty for {}", index.name);
        } else {
            tracing::info!("Cleared Pinecone index {}", index.name);
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/indexes", self.control_plane_url);
        match self.call("pinecone list", Method::GET, &url, None).await {
            Ok(reply) => Ok(reply.status.is_success()),
            Err(_) => Ok(false),
        }
    }

    fn backend(&self) -> VectorBackend {
        VectorBackend::Pinecone
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::record::SOURCE_KEY;

    #[test]
    fn test_data_url_adds_scheme() {
        assert_eq!(
            data_url("ds4300-abc.svc.aped-4627.pinecone.io", "/query"),
            "https://ds4300-abc.svc.aped-4627.pinecone.io/query"
        );
        assert_eq!(data_url("http://localhost:5081/", "/query"), "http://localhost:5081/query");
    }

    #[test]
    fn test_record_metadata_carries_text_and_source() {
        let record = VectorRecord::new("doc_3", vec![0.0; 2], "Redis was created in 2009").with_source("redis.pdf");
        let metadata = record_metadata(&record);
        assert_eq!(metadata[TEXT_KEY], "Redis was created in 2009");
        assert_eq!(metadata[SOURCE_KEY], "redis.pdf");
    }

    #[test]
    fn test_upsert_request_shape() {
        let record = VectorRecord::new("doc_0", vec![0.5, 0.25], "t");
        let request = UpsertRequest {
            vectors: vec![PineconeVector {
                id: &record.id,
                values: &record.vector,
                metadata: record_metadata(&record),
            }],
            namespace: "",
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["vectors"][0]["id"], "doc_0");
        assert_eq!(json["vectors"][0]["values"][1], 0.25);
        assert_eq!(json["namespace"], "");
    }

    #[test]
    fn test_query_response_to_hits() {
        let body = r#"{
            "matches": [
                {"id": "doc_1", "score": 0.41, "metadata": {"text": "Pinecone is managed"}},
                {"id": "doc_0", "score": 0.93, "metadata": {"text": "Redis was created in 2009", "source": "a.pdf"}},
                {"id": "doc_2", "score": 0.10}
            ],
            "namespace": ""
        }"#;
        let response: QueryResponse = serde_json::from_str(body).unwrap();
        let hits = rank_hits(response.matches.into_iter().map(match_to_hit).collect(), 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "doc_0");
        assert_eq!(hits[0].text, "Redis was created in 2009");
    }

    #[test]
    fn test_empty_query_response() {
        let response: QueryResponse = serde_json::from_str(r#"{"namespace": ""}"#).unwrap();
        assert!(response.matches.is_empty());
    }

    #[test]
    fn test_index_description_parsing() {
        let body = r#"{
            "name": "ds4300",
            "metric": "cosine",
            "dimension": 384,
            "host": "ds4300-abc.svc.aped-4627.pinecone.io",
            "spec": {"serverless": {"cloud": "aws", "region": "us-east-1"}},
            "status": {"ready": true, "state": "Ready"}
        }"#;
        let desc: IndexDescription = serde_json::from_str(body).unwrap();
        assert_eq!(desc.dimension, 384);
        assert!(desc.status.ready);
        let upserted: UpsertResponse = serde_json::from_str(r#"{"upsertedCount": 100}"#).unwrap();
        assert_eq!(upserted.upserted_count, 100);
    }

    #[test]
    fn test_status_errors_classified() {
        assert!(status_error(StatusCode::TOO_MANY_REQUESTS, "").is_retryable());
        assert!(status_error(StatusCode::SERVICE_UNAVAILABLE, "").is_retryable());
        assert!(matches!(
            status_error(StatusCode::BAD_REQUEST, "dimension mismatch"),
            Error::VectorDb(_)
        ));
    }

    #[tokio::test]
    #[ignore = "requires PINECONE_API_KEY and creates a serverless index"]
    async fn test_live_round_trip() {
        let store = PineconeVectorStore::connect(&PineconeConfig::default(), RetryPolicy::default()).unwrap();
        let handle = store
            .initialize_index("rag-lab-test", 3, SimilarityMetric::Cosine)
            .await
            .unwrap();
        store.clear(&handle).await.unwrap();
        store
            .upsert(&handle, &[VectorRecord::new("doc_0", vec![1.0, 0.0, 0.0], "Redis was created in 2009")])
            .await
            .unwrap();
        // serverless writes are eventually consistent
        tokio::time::sleep(Duration::from_secs(10)).await;
        let hits = store.query(&handle, &[1.0, 0.0, 0.0], 1).await.unwrap();
        assert_eq!(hits[0].text, "Redis was created in 2009");
    }
}
