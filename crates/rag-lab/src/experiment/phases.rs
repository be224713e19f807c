//! Backend phases: a connected store paired with its embedding model

use std::sync::Arc;

use crate::config::{BackendPlan, LabConfig};
use crate::error::Result;
use crate::generation::OllamaClient;
use crate::providers::{
    EmbeddingModel, EmbeddingProvider, HashingEmbedder, LlmProvider, LocalVectorStore, OllamaEmbedder, OllamaLlm,
    PineconeVectorStore, RedisVectorStore, VectorBackend, VectorStoreProvider,
};

/// One backend of the sweep with the embedder that populates it
#[derive(Clone)]
pub struct BackendPhase {
    pub plan: BackendPlan,
    pub store: Arc<dyn VectorStoreProvider>,
    pub embedder: Arc<dyn EmbeddingProvider>,
}

impl BackendPhase {
    pub fn new(store: Arc<dyn VectorStoreProvider>, embedder: Arc<dyn EmbeddingProvider>, model: EmbeddingModel) -> Self {
        Self {
            plan: BackendPlan::new(store.backend(), model),
            store,
            embedder,
        }
    }
}

/// Open the store for `backend`
pub async fn connect_store(backend: VectorBackend, config: &LabConfig) -> Result<Arc<dyn VectorStoreProvider>> {
    let store: Arc<dyn VectorStoreProvider> = match backend {
        VectorBackend::Local => Arc::new(LocalVectorStore::open(&config.vector_db.local.path)?),
        VectorBackend::Redis => Arc::new(RedisVectorStore::connect(&config.vector_db.redis, config.retry_policy()).await?),
        VectorBackend::Pinecone => Arc::new(PineconeVectorStore::connect(
            &config.vector_db.pinecone,
            config.retry_policy(),
        )?),
    };
    Ok(store)
}

/// Build the embedder for `model`
pub async fn build_embedder(model: EmbeddingModel, config: &LabConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    if !model.is_remote() {
        return Ok(Arc::new(HashingEmbedder::new(config.embeddings.hashing_dimensions)?));
    }
    let client = Arc::new(OllamaClient::for_embeddings(config)?);
    Ok(Arc::new(
        OllamaEmbedder::connect(client, model, config.embeddings.batch_size).await?,
    ))
}

/// Connect every configured backend
///
/// A backend that cannot be reached or fails its health check, or whose
/// embedding model cannot be loaded, is logged and left out; the sweep
/// continues with the rest.
pub async fn connect_phases(config: &LabConfig) -> Vec<BackendPhase> {
    let mut phases = Vec::with_capacity(config.experiment.backends.len());

    for plan in &config.experiment.backends {
        let store = match connect_store(plan.backend, config).await {
            Ok(store) => store,
            Err(e) => {
                tracing::error!("Skipping {}: failed to connect: {}", plan.backend, e);
                continue;
            }
        };

        match store.health_check().await {
            Ok(true) => {}
            Ok(false) => {
                tracing::error!("Skipping {}: health check failed", plan.backend);
                continue;
            }
            Err(e) => {
                tracing::error!("Skipping {}: health check errored: {}", plan.backend, e);
                continue;
            }
        }

        let embedder = match build_embedder(plan.embedding_model, config).await {
            Ok(embedder) => embedder,
            Err(e) => {
                tracing::error!(
                    "Skipping {}: embedding model {} unavailable: {}",
                    plan.backend,
                    plan.embedding_model,
                    e
                );
                continue;
            }
        };

        phases.push(BackendPhase {
            plan: *plan,
            store,
            embedder,
        });
    }

    phases
}

/// One language model per configured name, sharing a single client
pub fn build_llms(config: &LabConfig) -> Result<Vec<Arc<dyn LlmProvider>>> {
    let client = Arc::new(OllamaClient::from_config(&config.llm)?);
    Ok(config
        .experiment
        .llm_models
        .iter()
        .map(|model| Arc::new(OllamaLlm::from_client(Arc::clone(&client), model.clone())) as Arc<dyn LlmProvider>)
        .collect())
}

/// Keep the models that answer a health check
///
/// An unreachable model is reported once here instead of once per run.
pub async fn check_llms(llms: Vec<Arc<dyn LlmProvider>>) -> Vec<Arc<dyn LlmProvider>> {
    let mut healthy = Vec::with_capacity(llms.len());
    for llm in llms {
        match llm.health_check().await {
            Ok(true) => healthy.push(llm),
            Ok(false) => tracing::error!("Skipping {} ({}): not reachable", llm.model(), llm.name()),
            Err(e) => tracing::error!("Skipping {} ({}): health check errored: {}", llm.model(), llm.name(), e),
        }
    }
    healthy
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct StubLlm {
        model: &'static str,
        healthy: bool,
    }

    #[async_trait]
    impl LlmProvider for StubLlm {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            Ok(String::new())
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(self.healthy)
        }

        fn name(&self) -> &str {
            "stub"
        }

        fn model(&self) -> &str {
            self.model
        }
    }

    #[tokio::test]
    async fn test_unhealthy_llms_are_dropped() {
        let llms: Vec<Arc<dyn LlmProvider>> = vec![
            Arc::new(StubLlm { model: "llama3.2", healthy: true }),
            Arc::new(StubLlm { model: "mistral", healthy: false }),
        ];
        let kept = check_llms(llms).await;
        let models: Vec<&str> = kept.iter().map(|l| l.model()).collect();
        assert_eq!(models, ["llama3.2"]);
    }

    #[tokio::test]
    async fn test_unreachable_ollama_drops_every_llm() {
        let mut config = LabConfig::default();
        config.llm.base_url = "http://127.0.0.1:1".to_string();
        config.llm.timeout_secs = 1;
        let llms = build_llms(&config).unwrap();
        assert_eq!(llms.len(), 2);
        assert!(check_llms(llms).await.is_empty());
    }

    #[tokio::test]
    async fn test_hashing_embedder_needs_no_server() {
        let mut config = LabConfig::default();
        config.embeddings.hashing_dimensions = 64;
        let embedder = build_embedder(EmbeddingModel::Hashing, &config).await.unwrap();
        assert_eq!(embedder.dimensions(), 64);
        assert_eq!(embedder.model(), "hashing");
    }

    #[tokio::test]
    async fn test_local_phase_connects() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = LabConfig::default();
        config.vector_db.local.path = dir.path().join("vectors.redb");
        config.experiment.backends = vec![BackendPlan::new(VectorBackend::Local, EmbeddingModel::Hashing)];

        let phases = connect_phases(&config).await;
        assert_eq!(phases.len(), 1);
        assert_eq!(phases[0].store.backend(), VectorBackend::Local);
        assert_eq!(phases[0].plan.embedding_model, EmbeddingModel::Hashing);
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = LabConfig::default();
        config.llm.max_retries = 0;
        config.vector_db.local.path = dir.path().join("vectors.redb");
        config.vector_db.redis.url = "redis://127.0.0.1:1".to_string();
        config.vector_db.redis.timeout_secs = 1;
        config.experiment.backends = vec![
            BackendPlan::new(VectorBackend::Redis, EmbeddingModel::Hashing),
            BackendPlan::new(VectorBackend::Local, EmbeddingModel::Hashing),
        ];

        let phases = connect_phases(&config).await;
        assert_eq!(phases.len(), 1);
        assert_eq!(phases[0].plan.backend, VectorBackend::Local);
    }

    #[test]
    fn test_one_llm_per_model_name() {
        let config = LabConfig::default();
        let llms = build_llms(&config).unwrap();
        let models: Vec<&str> = llms.iter().map(|l| l.model()).collect();
        assert_eq!(models, ["llama3.2", "mistral"]);
    }
}
