//! # tnm-runtime
//!
//! Async orchestration for the TNM staging engine.
//!
//! The staging rules live in `tnm-core` and are fully synchronous. This crate
//! adds what a service needs around them:
//! - Parallel T/N/M classification with a per-classifier timeout
//! - Cooperative cancellation of in-flight requests
//! - Bounded concurrent staging of independent reports
//! - Findings sources (files, memory) behind an async trait
//! - YAML configuration with `TNM_*` environment overrides
//!
//! ## Important
//!
//! The runtime never changes a staging decision. For the same findings,
//! `StagingOrchestrator::stage` returns the same `StagingResult` as
//! `tnm_core::stage`.
//!
//! ## Example
//!
//! ```rust,ignore
//! use tnm_runtime::{init_tracing, FileFindingsSource, RuntimeConfig, StagingOrchestrator};
//!
//! let config = RuntimeConfig::from_yaml_file("runtime.yaml")?.with_env_overrides()?;
//! init_tracing(&config);
//!
//! let orchestrator = StagingOrchestrator::new(config);
//! let source = FileFindingsSource::new("reports/");
//! let result = orchestrator.stage_from_source(&source, "CT-2041").await?;
//!
//! println!("{}", result.result.summary);
//! ```

pub mod config;
pub mod orchestrator;
pub mod source;
pub mod telemetry;

pub use config::{ConfigError, RuntimeConfig};
pub use orchestrator::{
    BatchOutcome, CancellationFlag, RuntimeError, RuntimeResult, StagingOrchestrator,
};
pub use source::{FileFindingsSource, FindingsSource, InMemoryFindingsSource};
pub use telemetry::{env_filter, init_tracing};
