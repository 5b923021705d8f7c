//! Runtime orchestrator for parallel staging.
//!
//! The orchestrator runs one staging request at a time per call. It implements:
//! - Parallel fan-out to the T, N and M classifiers via tokio::join!
//! - A per-classifier timeout
//! - Cooperative cancellation checked before fan-out and at the join barrier
//! - Deterministic fan-in through the Stage Compiler and Result Assembler

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

use tnm_core::{
    route_tumor, ClassificationRequest, Classifier, ClinicalFindings, Component,
    MetastasisClassifier, NodeClassifier, ResultAssembler, StageCompiler, StagingError,
    StagingResult, TumorClassifier, TumorRouting,
};

use crate::config::{ConfigError, RuntimeConfig};
use crate::source::FindingsSource;

/// Errors from the runtime orchestrator.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Staging failed: {0}")]
    Staging(#[from] StagingError),

    #[error("{component}-Classifier timed out after {timeout:?}")]
    Timeout {
        component: Component,
        timeout: Duration,
    },

    #[error("Fetching findings for '{report_id}' timed out after {timeout:?}")]
    SourceTimeout {
        report_id: String,
        timeout: Duration,
    },

    #[error("Findings source failed for '{report_id}': {message}")]
    Source { report_id: String, message: String },

    #[error("{component}-Classifier task failed: {message}")]
    Join {
        component: Component,
        message: String,
    },

    #[error("Staging request cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Shared cancellation signal for one or more staging requests.
///
/// Cancelling discards in-flight classifier results; the classifiers
/// themselves are never interrupted.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Result from a runtime staging request.
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeResult {
    /// The staging result
    pub result: StagingResult,

    /// When staging completed
    pub staged_at: DateTime<Utc>,

    /// Wall-clock time spent staging
    pub elapsed: Duration,
}

/// One entry of a batch run, in input order.
#[derive(Debug)]
pub struct BatchOutcome {
    pub report_id: String,
    pub outcome: Result<RuntimeResult, RuntimeError>,
}

/// The staging orchestrator.
///
/// # Architecture
/// - Parallel fan-out: T, N and M run concurrently on the blocking pool
/// - Join barrier: the compiler waits for all three results
/// - Deterministic fan-in: identical findings give identical results
pub struct StagingOrchestrator {
    config: RuntimeConfig,
    tumor: Arc<TumorClassifier>,
    nodes: Arc<NodeClassifier>,
    metastasis: Arc<MetastasisClassifier>,
    compiler: StageCompiler,
    assembler: ResultAssembler,
}

impl StagingOrchestrator {
    /// Create a new orchestrator.
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            tumor: Arc::new(TumorClassifier::new()),
            nodes: Arc::new(NodeClassifier::new()),
            metastasis: Arc::new(MetastasisClassifier::new()),
            compiler: StageCompiler::new(),
            assembler: ResultAssembler::new(),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Stage one findings record.
    pub async fn stage(&self, findings: ClinicalFindings) -> Result<RuntimeResult, RuntimeError> {
        self.stage_with_cancel(findings, &CancellationFlag::new())
            .await
    }

    /// Stage one findings record, honoring a cancellation flag.
    ///
    /// # Execution Flow
    /// 1. Validate findings and resolve tumor routing
    /// 2. Fan-out: T, N and M in parallel, each under the classifier timeout
    /// 3. Join barrier: discard everything if cancelled
    /// 4. Fan-in: compile and assemble (deterministic)
    pub async fn stage_with_cancel(
        &self,
        findings: ClinicalFindings,
        cancel: &CancellationFlag,
    ) -> Result<RuntimeResult, RuntimeError> {
        let started = Instant::now();

        if cancel.is_cancelled() {
            return Err(RuntimeError::Cancelled);
        }

        findings.validate().map_err(StagingError::from)?;
        let routing = route_tumor(findings.tumor.as_ref()).map_err(StagingError::from)?;

        let findings = Arc::new(findings);
        let routing = Arc::new(routing);

        // Fan-out: parallel classification
        let (tumor, nodes, metastasis) = tokio::join!(
            self.run_classifier(self.tumor.clone(), findings.clone(), routing.clone()),
            self.run_classifier(self.nodes.clone(), findings.clone(), routing.clone()),
            self.run_classifier(self.metastasis.clone(), findings.clone(), routing.clone()),
        );

        // Join barrier
        if cancel.is_cancelled() {
            info!(report_id = ?findings.report_id, "Staging cancelled, discarding classifier results");
            return Err(RuntimeError::Cancelled);
        }

        let (tumor, nodes, metastasis) = (tumor?, nodes?, metastasis?);

        // Fan-in: deterministic compilation
        let compiled = self.compiler.compile(&tumor.stage, &nodes, &metastasis)?;
        let result = self
            .assembler
            .assemble(&findings, tumor, nodes, metastasis, compiled);

        match &result.overall {
            tnm_core::StageOutcome::Indeterminate { reasons } => warn!(
                report_id = ?result.report_id,
                tnm = %result.prefixed_tnm,
                reasons = ?reasons,
                "Overall stage indeterminate"
            ),
            tnm_core::StageOutcome::Staged { stage } => info!(
                report_id = ?result.report_id,
                tnm = %result.prefixed_tnm,
                stage = %stage,
                "Staging complete"
            ),
        }

        Ok(RuntimeResult {
            result,
            staged_at: Utc::now(),
            elapsed: started.elapsed(),
        })
    }

    /// Fetch findings from a source, then stage them.
    pub async fn stage_from_source(
        &self,
        source: &dyn FindingsSource,
        report_id: &str,
    ) -> Result<RuntimeResult, RuntimeError> {
        self.stage_from_source_with_cancel(source, report_id, &CancellationFlag::new())
            .await
    }

    /// Fetch findings from a source under the source timeout, then stage them.
    pub async fn stage_from_source_with_cancel(
        &self,
        source: &dyn FindingsSource,
        report_id: &str,
        cancel: &CancellationFlag,
    ) -> Result<RuntimeResult, RuntimeError> {
        if cancel.is_cancelled() {
            return Err(RuntimeError::Cancelled);
        }

        let timeout = self.config.source_timeout;
        let findings = match tokio::time::timeout(timeout, source.fetch(report_id)).await {
            Ok(Ok(findings)) => findings,
            Ok(Err(e)) => {
                warn!(source = source.name(), report_id, error = %e, "Findings source failed");
                return Err(RuntimeError::Source {
                    report_id: report_id.to_string(),
                    message: format!("{:#}", e),
                });
            }
            Err(_) => {
                warn!(source = source.name(), report_id, timeout = ?timeout, "Findings source timed out");
                return Err(RuntimeError::SourceTimeout {
                    report_id: report_id.to_string(),
                    timeout,
                });
            }
        };

        self.stage_with_cancel(findings, cancel).await
    }

    /// Stage independent reports concurrently.
    ///
    /// At most `max_concurrent_reports` run at once. One failing report does
    /// not affect the others. Outcomes are returned in input order.
    pub async fn stage_batch<I>(
        &self,
        source: &dyn FindingsSource,
        report_ids: I,
        cancel: &CancellationFlag,
    ) -> Vec<BatchOutcome>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let ids: Vec<String> = report_ids
            .into_iter()
            .map(|id| id.as_ref().to_string())
            .collect();
        let limit = self.config.max_concurrent_reports.max(1);

        let mut outcomes: Vec<(usize, BatchOutcome)> = stream::iter(ids.into_iter().enumerate())
            .map(|(index, report_id)| async move {
                let outcome = self
                    .stage_from_source_with_cancel(source, &report_id, cancel)
                    .await;
                (index, BatchOutcome { report_id, outcome })
            })
            .buffer_unordered(limit)
            .collect()
            .await;

        outcomes.sort_by_key(|(index, _)| *index);
        outcomes.into_iter().map(|(_, outcome)| outcome).collect()
    }

    /// Run a single classifier on the blocking pool with a timeout.
    async fn run_classifier<C>(
        &self,
        classifier: Arc<C>,
        findings: Arc<ClinicalFindings>,
        routing: Arc<TumorRouting>,
    ) -> Result<C::Output, RuntimeError>
    where
        C: Classifier + 'static,
        C::Output: Send + 'static,
    {
        let component = classifier.component();
        let timeout = self.config.classifier_timeout;
        debug!(component = %component, question = classifier.question(), "Running classifier");

        let task = tokio::task::spawn_blocking(move || {
            let request = ClassificationRequest {
                findings: &findings,
                routing: &routing,
            };
            classifier.classify(&request)
        });

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(output)) => output.map_err(RuntimeError::from),
            Ok(Err(e)) => {
                warn!(component = %component, error = %e, "Classifier task failed");
                Err(RuntimeError::Join {
                    component,
                    message: e.to_string(),
                })
            }
            Err(_) => {
                warn!(component = %component, timeout = ?timeout, "Classifier timed out");
                Err(RuntimeError::Timeout { component, timeout })
            }
        }
    }
}

impl Default for StagingOrchestrator {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}
