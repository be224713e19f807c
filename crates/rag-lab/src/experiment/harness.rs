//! Configuration sweep: every backend phase crossed with the plan's axes

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::config::LabConfig;
use crate::error::{Error, Result};
use crate::ingestion::IngestPipeline;
use crate::providers::LlmProvider;
use crate::retrieval::answer;
use crate::types::{Document, IndexHandle, PipelineRun, RunFailure, RunStage, SimilarityMetric};

use super::memory::MemoryProbe;
use super::phases::BackendPhase;
use super::plan::{GridPoint, SweepPlan};
use super::report::{ReportMode, ReportWriter};

/// Everything a sweep produced
#[derive(Debug, Clone, Default)]
pub struct SweepOutcome {
    /// Completed runs, in execution order
    pub runs: Vec<PipelineRun>,
    /// Runs that failed, with the stage they failed at
    pub failures: Vec<RunFailure>,
}

impl SweepOutcome {
    pub fn attempted(&self) -> usize {
        self.runs.len() + self.failures.len()
    }
}

/// Runs the configuration grid and writes the report
///
/// Runs execute one at a time. Within a phase the order is
/// model → chunk size → overlap → prompt → question, and the index is
/// cleared whenever the overlap or chunk size moves on, so no run queries
/// chunks left behind by a different chunking.
pub struct ExperimentHarness {
    plan: SweepPlan,
    llms: Vec<Arc<dyn LlmProvider>>,
    report_path: PathBuf,
    track_memory: bool,
}

impl ExperimentHarness {
    pub fn new(plan: SweepPlan, llms: Vec<Arc<dyn LlmProvider>>, report_path: impl Into<PathBuf>) -> Self {
        Self {
            plan,
            llms,
            report_path: report_path.into(),
            track_memory: true,
        }
    }

    pub fn from_config(config: &LabConfig, llms: Vec<Arc<dyn LlmProvider>>) -> Self {
        Self::new(
            SweepPlan::from_config(&config.experiment),
            llms,
            config.experiment.report_path.clone(),
        )
        .with_memory_tracking(config.experiment.track_memory)
    }

    pub fn with_memory_tracking(mut self, enabled: bool) -> Self {
        self.track_memory = enabled;
        self
    }

    pub fn plan(&self) -> &SweepPlan {
        &self.plan
    }

    pub fn report_path(&self) -> &Path {
        &self.report_path
    }

    /// Total runs the sweep will attempt over `phases`
    pub fn planned_runs(&self, phases: &[BackendPhase]) -> usize {
        phases.len() * self.llms.len() * self.plan.runs_per_model()
    }

    /// Run the sweep over `phases`
    ///
    /// A failing run is recorded and the sweep moves on. The only errors
    /// returned are failures to write the report.
    pub async fn run(&self, documents: &[Document], phases: &[BackendPhase]) -> Result<SweepOutcome> {
        let mut outcome = SweepOutcome::default();
        if phases.is_empty() {
            tracing::warn!("No vector store backends available; nothing to run");
            return Ok(outcome);
        }

        let total = self.planned_runs(phases);
        tracing::info!(
            "Starting sweep: {} runs over {} backends, {} documents",
            total,
            phases.len(),
            documents.len()
        );

        for (i, phase) in phases.iter().enumerate() {
            let mode = if i == 0 { ReportMode::Create } else { ReportMode::Append };
            let mut report = ReportWriter::open(&self.report_path, mode)?;
            self.run_phase(documents, phase, &mut report, &mut outcome, total).await?;
            tracing::info!(
                "Finished {} phase: {} rows in {}",
                phase.plan.backend,
                report.rows_written(),
                report.path().display()
            );
        }

        tracing::info!(
            "Sweep complete: {} runs succeeded, {} failed",
            outcome.runs.len(),
            outcome.failures.len()
        );
        Ok(outcome)
    }

    async fn run_phase(
        &self,
        documents: &[Document],
        phase: &BackendPhase,
        report: &mut ReportWriter,
        outcome: &mut SweepOutcome,
        total: usize,
    ) -> Result<()> {
        let plan = &self.plan;
        let embedding_model = phase.embedder.model();
        let database = phase.store.backend();

        let mut phase_error = self.reset(phase).await.err().map(|e| {
            tracing::error!("Failed to reset {} index {}: {}", database, plan.index_name, e);
            e.to_string()
        });

        for llm in &self.llms {
            for &chunk_size in &plan.chunk_sizes {
                for &overlap in &plan.overlaps {
                    for prompt in &plan.prompts {
                        for question in &plan.questions {
                            let point = GridPoint {
                                embedding_model,
                                database,
                                llm_model: llm.model(),
                                chunk_size,
                                overlap,
                                prompt,
                                question,
                            };

                            if let Some(message) = &phase_error {
                                outcome.failures.push(RunFailure {
                                    config: point.to_config(),
                                    stage: RunStage::Reset,
                                    message: message.clone(),
                                });
                                continue;
                            }

                            tracing::info!("Run {}/{}: {}", outcome.attempted() + 1, total, point.to_config());

                            match self.run_one(documents, phase, llm.as_ref(), &point).await {
                                Ok(run) => {
                                    report.write(&run)?;
                                    outcome.runs.push(run);
                                }
                                Err((stage, e)) => {
                                    let config = point.to_config();
                                    tracing::error!("Error in {} during {}: {}", config, stage, e);
                                    outcome.failures.push(RunFailure {
                                        config,
                                        stage,
                                        message: e.to_string(),
                                    });
                                }
                            }
                        }
                    }
                    self.reset_at_boundary(phase, &mut phase_error).await;
                }
                self.reset_at_boundary(phase, &mut phase_error).await;
            }
        }

        Ok(())
    }

    async fn reset_at_boundary(&self, phase: &BackendPhase, phase_error: &mut Option<String>) {
        if phase_error.is_some() {
            return;
        }
        if let Err(e) = self.reset(phase).await {
            tracing::error!(
                "Failed to clear {} index {}; skipping the rest of this backend: {}",
                phase.store.name(),
                self.plan.index_name,
                e
            );
            *phase_error = Some(e.to_string());
        }
    }

    /// Make sure the index exists and holds no records
    async fn reset(&self, phase: &BackendPhase) -> Result<IndexHandle> {
        let handle = phase
            .store
            .initialize_index(&self.plan.index_name, phase.embedder.dimensions(), SimilarityMetric::Cosine)
            .await?;
        phase.store.clear(&handle).await?;
        tracing::debug!("Cleared {} index {}", phase.store.name(), handle.name);
        Ok(handle)
    }

    async fn run_one(
        &self,
        documents: &[Document],
        phase: &BackendPhase,
        llm: &dyn LlmProvider,
        point: &GridPoint<'_>,
    ) -> std::result::Result<PipelineRun, (RunStage, Error)> {
        let mut probe = MemoryProbe::start(self.track_memory);

        let pipeline = IngestPipeline::new(point.chunk_size, point.overlap).map_err(|e| (RunStage::Ingest, e))?;
        let embedded = pipeline
            .embed_documents(documents, phase.embedder.as_ref())
            .await
            .map_err(|e| (RunStage::Ingest, e))?
            .ok_or_else(|| {
                (
                    RunStage::Ingest,
                    Error::NoData(format!("{} documents produced no chunks", documents.len())),
                )
            })?;
        probe.sample();

        let (handle, stats) = pipeline
            .upload(embedded, phase.store.as_ref(), &self.plan.index_name)
            .await
            .map_err(|e| (RunStage::Ingest, e))?;
        probe.sample();

        let query_start = Instant::now();
        let reply = answer(
            &handle,
            phase.store.as_ref(),
            phase.embedder.as_ref(),
            point.question,
            point.prompt,
            llm,
            self.plan.top_k,
        )
        .await
        .map_err(|e| (RunStage::Retrieve, e))?;
        let query_time = query_start.elapsed();
        probe.sample();

        Ok(PipelineRun {
            config: point.to_config(),
            embedding_time: stats.embed_time,
            upload_time: stats.upload_time,
            query_time,
            memory_usage_mb: probe.delta_mb(),
            num_chunks: stats.chunk_count,
            answer: reply.text,
            score: None,
        })
    }
}
