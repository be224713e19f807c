//! Redis Stack vector store (RediSearch vector fields)
//!
//! Records are hashes under the `<index>:` key prefix with the embedding
//! packed as little-endian f32 bytes. Search is a KNN `FT.SEARCH` with
//! `DIALECT 2`; clearing deletes the hashes and keeps the index definition.

use ::redis::aio::MultiplexedConnection;
use ::redis::{from_redis_value, Client, RedisResult, Value};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

use crate::config::RedisConfig;
use crate::error::{Error, Result};
use crate::types::record::rank_hits;
use crate::types::{IndexHandle, SearchHit, SimilarityMetric, VectorRecord};

use super::retry::RetryPolicy;
use super::vector_store::{VectorBackend, VectorStoreProvider};

const BACKEND: &str = "redis";
const VECTOR_FIELD: &str = "embedding";
const DISTANCE_FIELD: &str = "vector_distance";
const SCAN_COUNT: usize = 500;

/// Redis vector store over one multiplexed connection
pub struct RedisVectorStore {
    conn: MultiplexedConnection,
    batch_size: usize,
    timeout: Duration,
}

impl RedisVectorStore {
    /// Connect, retrying transient failures
    pub async fn connect(config: &RedisConfig, retry: RetryPolicy) -> Result<Self> {
        let client = Client::open(config.url.as_str())?;
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = &client;

        let conn = retry
            .run("redis connect", move || async move {
                match tokio::time::timeout(timeout, client.get_multiplexed_async_connection()).await {
                    Ok(conn) => Ok(conn?),
                    Err(_) => Err(Error::unavailable(BACKEND, "connect timed out")),
                }
            })
            .await?;

        tracing::info!("Connected to Redis at {}", config.url);

        Ok(Self {
            conn,
            batch_size: config.batch_size.max(1),
            timeout,
        })
    }

    async fn timed<T>(&self, op: &str, fut: impl Future<Output = RedisResult<T>>) -> Result<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(Error::unavailable(
                BACKEND,
                format!("{} timed out after {:?}", op, self.timeout),
            )),
        }
    }

    /// `FT.INFO`, or `None` when the index does not exist
    async fn index_info(&self, name: &str) -> Result<Option<Value>> {
        let mut conn = self.conn.clone();
        let cmd = ::redis::cmd("FT.INFO").arg(name).to_owned();
        match self.timed("FT.INFO", cmd.query_async(&mut conn)).await {
            Ok(info) => Ok(Some(info)),
            Err(Error::Redis(e)) if is_unknown_index(&e.to_string()) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn require_index(&self, name: &str) -> Result<()> {
        match self.index_info(name).await? {
            Some(_) => Ok(()),
            None => Err(Error::index_not_found(BACKEND, name)),
        }
    }
}

fn key_prefix(index: &str) -> String {
    format!("{}:", index)
}

/// Redis reports a missing index as "Unknown index name" or "no such index"
fn is_unknown_index(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("unknown index") || message.contains("no such index")
}

/// Pack a vector as little-endian f32 bytes
fn pack_f32_le(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn distance_metric(metric: SimilarityMetric) -> &'static str {
    match metric {
        SimilarityMetric::Cosine => "COSINE",
    }
}

/// Arguments of `FT.CREATE` for an index of `dimension` FLOAT32 vectors
fn create_index_args(name: &str, dimension: usize, metric: SimilarityMetric) -> Vec<String> {
    let prefix = key_prefix(name);
    let dim = dimension.to_string();
    [
        name,
        "ON",
        "HASH",
        "PREFIX",
        "1",
        prefix.as_str(),
        "SCHEMA",
        "text",
        "TEXT",
        "source",
        "TEXT",
        "metadata",
        "TEXT",
        VECTOR_FIELD,
        "VECTOR",
        "FLAT",
        "6",
        "TYPE",
        "FLOAT32",
        "DIM",
        dim.as_str(),
        "DISTANCE_METRIC",
        distance_metric(metric),
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Find the vector dimension in an `FT.INFO` reply
fn index_dimension(info: &Value) -> Option<usize> {
    match info {
        Value::Array(items) | Value::Set(items) => {
            let mut iter = items.iter().peekable();
            while let Some(item) = iter.next() {
                if value_str(item).is_some_and(|s| s.eq_ignore_ascii_case("dim")) {
                    if let Some(dim) = iter.peek().and_then(|v| value_usize(v)) {
                        return Some(dim);
                    }
                }
                if let Some(dim) = index_dimension(item) {
                    return Some(dim);
                }
            }
            None
        }
        Value::Map(pairs) => pairs.iter().find_map(|(k, v)| {
            if value_str(k).is_some_and(|s| s.eq_ignore_ascii_case("dim")) {
                value_usize(v)
            } else {
                index_dimension(v)
            }
        }),
        _ => None,
    }
}

fn value_str(value: &Value) -> Option<String> {
    match value {
        Value::BulkString(_) | Value::SimpleString(_) => from_redis_value(value).ok(),
        _ => None,
    }
}

fn value_usize(value: &Value) -> Option<usize> {
    match value {
        Value::Int(n) => usize::try_from(*n).ok(),
        other => value_str(other).and_then(|s| s.parse().ok()),
    }
}

/// Turn an `FT.SEARCH` reply into hits, stripping the key prefix from ids
fn parse_search_reply(reply: &Value, prefix: &str) -> Result<Vec<SearchHit>> {
    let items = match reply {
        Value::Array(items) => items,
        other => return Err(Error::vector_db(format!("unexpected FT.SEARCH reply: {:?}", other))),
    };

    let mut hits = Vec::new();
    let mut iter = items.iter().skip(1);
    while let Some(key) = iter.next() {
        let key: String = from_redis_value(key)?;
        let fields = match iter.next() {
            Some(Value::Array(fields)) => fields,
            other => {
                return Err(Error::vector_db(format!(
                    "missing fields for {} in FT.SEARCH reply: {:?}",
                    key, other
                )))
            }
        };

        let mut text = String::new();
        let mut distance = None;
        for pair in fields.chunks(2) {
            if let [name, value] = pair {
                let name: String = from_redis_value(name)?;
                match name.as_str() {
                    "text" => text = from_redis_value(value)?,
                    DISTANCE_FIELD => {
                        let raw: String = from_redis_value(value)?;
                        let parsed = raw
                            .parse::<f32>()
                            .map_err(|e| Error::vector_db(format!("bad distance '{}': {}", raw, e)))?;
                        distance = Some(parsed);
                    }
                    _ => {}
                }
            }
        }

        hits.push(SearchHit {
            id: key.strip_prefix(prefix).unwrap_or(&key).to_string(),
            text,
            score: 1.0 - distance.unwrap_or(1.0),
        });
    }

    Ok(hits)
}

#[async_trait]
impl VectorStoreProvider for RedisVectorStore {
    async fn initialize_index(
        &self,
        name: &str,
        dimension: usize,
        metric: SimilarityMetric,
    ) -> Result<IndexHandle> {
        if let Some(info) = self.index_info(name).await? {
            if let Some(existing) = index_dimension(&info) {
                if existing != dimension {
                    return Err(Error::DimensionMismatch {
                        expected: existing,
                        actual: dimension,
                    });
                }
            }
            tracing::debug!("Reusing Redis index {}", name);
            return Ok(IndexHandle::new(name, dimension, metric));
        }

        let mut conn = self.conn.clone();
        let cmd = ::redis::cmd("FT.CREATE")
            .arg(create_index_args(name, dimension, metric))
            .to_owned();
        let _: Value = self.timed("FT.CREATE", cmd.query_async(&mut conn)).await?;

        tracing::info!("Created Redis index {} ({} dims)", name, dimension);
        Ok(IndexHandle::new(name, dimension, metric))
    }

    async fn upsert(&self, index: &IndexHandle, records: &[VectorRecord]) -> Result<usize> {
        index.check_records(records)?;
        if records.is_empty() {
            return Ok(0);
        }

        let prefix = key_prefix(&index.name);
        let total = records.len();
        let mut written = 0usize;
        let mut conn = self.conn.clone();

        for (b, batch) in records.chunks(self.batch_size).enumerate() {
            let mut pipe = ::redis::pipe();
            for record in batch {
                let metadata = serde_json::to_string(&record.metadata)?;
                pipe.cmd("HSET")
                    .arg(format!("{}{}", prefix, record.id))
                    .arg("text")
                    .arg(&record.text)
                    .arg("source")
                    .arg(record.source().unwrap_or_default())
                    .arg("metadata")
                    .arg(metadata)
                    .arg(VECTOR_FIELD)
                    .arg(pack_f32_le(&record.vector).as_slice());
            }

            let replies: Vec<Value> = self
                .timed("HSET pipeline", pipe.query_async(&mut conn))
                .await
                .map_err(|e| Error::upload(BACKEND, total - written, total, e.to_string()))?;

            let failed = replies
                .iter()
                .filter(|reply| matches!(reply, Value::ServerError(_)))
                .count();
            if failed > 0 {
                return Err(Error::upload(
                    BACKEND,
                    total - written,
                    total,
                    format!("{} commands rejected in batch {}", failed, b),
                ));
            }

            written += batch.len();
            tracing::debug!("Redis batch {} stored ({}/{})", b, written, total);
        }

        Ok(written)
    }

    async fn query(&self, index: &IndexHandle, vector: &[f32], top_k: usize) -> Result<Vec<SearchHit>> {
        index.check_dimension(vector)?;
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let knn = format!("*=>[KNN {} @{} $vec AS {}]", top_k, VECTOR_FIELD, DISTANCE_FIELD);
        let cmd = ::redis::cmd("FT.SEARCH")
            .arg(&index.name)
            .arg(knn)
            .arg("PARAMS")
            .arg(2)
            .arg("vec")
            .arg(pack_f32_le(vector).as_slice())
            .arg("SORTBY")
            .arg(DISTANCE_FIELD)
            .arg("RETURN")
            .arg(2)
            .arg("text")
            .arg(DISTANCE_FIELD)
            .arg("LIMIT")
            .arg(0)
            .arg(top_k)
            .arg("DIALECT")
            .arg(2)
            .to_owned();

        let mut conn = self.conn.clone();
        let reply: Value = match self.timed("FT.SEARCH", cmd.query_async(&mut conn)).await {
            Ok(reply) => reply,
            Err(Error::Redis(e)) if is_unknown_index(&e.to_string()) => {
                return Err(Error::index_not_found(BACKEND, index.name.as_str()))
            }
            Err(e) => return Err(e),
        };

        let hits = parse_search_reply(&reply, &key_prefix(&index.name))?;
        Ok(rank_hits(hits, top_k))
    }

    async fn clear(&self, index: &IndexHandle) -> Result<()> {
        self.require_index(&index.name).await?;

        let pattern = format!("{}*", key_prefix(&index.name));
        let mut conn = self.conn.clone();
        let mut cursor: u64 = 0;
        let mut deleted = 0usize;

        loop {
            let cmd = ::redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .to_owned();
            let (next, keys): (u64, Vec<String>) = self.timed("SCAN", cmd.query_async(&mut conn)).await?;

            if !keys.is_empty() {
                let del = ::redis::cmd("DEL").arg(&keys).to_owned();
                let removed: usize = self.timed("DEL", del.query_async(&mut conn)).await?;
                deleted += removed;
            }

            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        tracing::info!("Cleared Redis index {} ({} keys removed)", index.name, deleted);
        Ok(())
    }

    async fn health_check(&self) -> Result<bool> {
        let mut conn = self.conn.clone();
        let cmd = ::redis::cmd("PING");
        let reply: Result<String> = self.timed("PING", cmd.query_async(&mut conn)).await;
        Ok(matches!(reply, Ok(pong) if pong == "PONG"))
    }

    fn backend(&self) -> VectorBackend {
        VectorBackend::Redis
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bulk(s: &str) -> Value {
        Value::BulkString(s.as_bytes().to_vec())
    }

    fn unpack_f32_le(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect()
    }

    #[test]
    fn test_pack_round_trip_is_bit_exact() {
        let vector = vec![0.1f32, -2.5, 1e-7, f32::MAX];
        let packed = pack_f32_le(&vector);
        assert_eq!(packed.len(), 16);
        assert_eq!(&packed[4..8], &(-2.5f32).to_le_bytes());
        assert_eq!(unpack_f32_le(&packed), vector);
    }

    #[test]
    fn test_create_args_carry_dimension_and_prefix() {
        let args = create_index_args("ds4300", 768, SimilarityMetric::Cosine);
        assert_eq!(args[0], "ds4300");
        assert_eq!(args[5], "ds4300:");
        let dim = args.iter().position(|a| a == "DIM").unwrap();
        assert_eq!(args[dim + 1], "768");
        assert_eq!(args.last().unwrap(), "COSINE");
    }

    #[test]
    fn test_source_field_is_full_text() {
        let args = create_index_args("ds4300", 384, SimilarityMetric::Cosine);
        let source = args.iter().position(|a| a == "source").unwrap();
        assert_eq!(args[source + 1], "TEXT");
        assert!(!args.iter().any(|a| a == "TAG"));
    }

    #[test]
    fn test_parse_search_reply() {
        let reply = Value::Array(vec![
            Value::Int(2),
            bulk("ds4300:doc_0"),
            Value::Array(vec![
                bulk("vector_distance"),
                bulk("0.25"),
                bulk("text"),
                bulk("Redis was created in 2009"),
            ]),
            bulk("ds4300:doc_1"),
            Value::Array(vec![bulk("text"), bulk("Pinecone"), bulk("vector_distance"), bulk("0.9")]),
        ]);
        let hits = parse_search_reply(&reply, "ds4300:").unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "doc_0");
        assert_eq!(hits[0].text, "Redis was created in 2009");
        assert!((hits[0].score - 0.75).abs() < 1e-6);
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn test_empty_search_reply() {
        let reply = Value::Array(vec![Value::Int(0)]);
        assert!(parse_search_reply(&reply, "ds4300:").unwrap().is_empty());
    }

    #[test]
    fn test_index_dimension_from_info() {
        let info = Value::Array(vec![
            bulk("index_name"),
            bulk("ds4300"),
            bulk("attributes"),
            Value::Array(vec![Value::Array(vec![
                bulk("identifier"),
                bulk("embedding"),
                bulk("type"),
                bulk("VECTOR"),
                bulk("dim"),
                Value::Int(768),
                bulk("distance_metric"),
                bulk("COSINE"),
            ])]),
        ]);
        assert_eq!(index_dimension(&info), Some(768));
        assert_eq!(index_dimension(&Value::Array(vec![bulk("index_name")])), None);
    }

    #[test]
    fn test_unknown_index_detection() {
        assert!(is_unknown_index("Unknown Index name"));
        assert!(is_unknown_index("ds4300: no such index"));
        assert!(!is_unknown_index("WRONGTYPE Operation against a key"));
    }

    #[tokio::test]
    #[ignore = "requires a Redis Stack server at REDIS_URL"]
    async fn test_live_round_trip() {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
        let config = RedisConfig {
            url,
            ..Default::default()
        };
        let store = RedisVectorStore::connect(&config, RetryPolicy::none()).await.unwrap();
        let handle = store
            .initialize_index("rag-lab-test", 3, SimilarityMetric::Cosine)
            .await
            .unwrap();
        store.clear(&handle).await.unwrap();
        store
            .upsert(
                &handle,
                &[
                    VectorRecord::new("doc_0", vec![1.0, 0.0, 0.0], "Redis was created in 2009"),
                    VectorRecord::new("doc_1", vec![0.0, 1.0, 0.0], "Pinecone"),
                ],
            )
            .await
            .unwrap();
        let hits = store.query(&handle, &[1.0, 0.0, 0.0], 1).await.unwrap();
        assert_eq!(hits[0].text, "Redis was created in 2009");

        store.clear(&handle).await.unwrap();
        assert!(store.query(&handle, &[1.0, 0.0, 0.0], 5).await.unwrap().is_empty());
    }
}
