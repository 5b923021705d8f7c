//! # tnm-core
//!
//! Deterministic TNM-9 staging engine for lung cancer.
//!
//! This crate turns a structured clinical findings record into a staging
//! result, answering:
//! - How large and how locally invasive is the primary tumor? (T)
//! - Which regional lymph node stations are involved? (N)
//! - Has the disease spread, and to how many organ systems? (M)
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: Same findings always produce byte-identical output
//! 2. **Rule-based**: All classification is explicit decision tables
//! 3. **Traceable**: Every definite category cites the findings behind it
//! 4. **Explicit uncertainty**: TX/NX surface as an indeterminate stage, never a guess
//!
//! ## Example
//!
//! ```rust,ignore
//! use tnm_core::{stage, ClinicalFindings, StageOutcome};
//!
//! let findings = ClinicalFindings::from_yaml_file("report.yaml")?;
//! let result = stage(&findings)?;
//!
//! match &result.overall {
//!     StageOutcome::Staged { stage } => println!("{}: {}", result.prefixed_tnm, stage),
//!     StageOutcome::Indeterminate { reasons } => println!("Indeterminate: {:?}", reasons),
//! }
//! ```

pub mod assembler;
pub mod classifiers;
pub mod compiler;
pub mod evidence;
pub mod findings;
pub mod types;

// Re-export main types at crate root
pub use assembler::ResultAssembler;
pub use classifiers::{
    classify_metastasis, classify_nodes, classify_tumor, route_tumor, ClassificationRequest,
    Classifier, MetastasisClassifier, NodeClassifier, TumorClassification, TumorClassifier,
    TumorRouting,
};
pub use compiler::{compile_stage, tnm_string, CompiledStage, StageCompiler};
pub use evidence::{Evidence, EvidenceSource};
pub use findings::{ClinicalFindings, FindingsError, ValidationError};
pub use types::{
    Classification, Component, Confidence, IndeterminateComponent, Laterality, MCategory, MStage,
    NCategory, NStage, OverallStage, StageOutcome, StagingPrefix, StagingResult, TCategory,
    TStage,
};

use thiserror::Error;
use tracing::debug;

/// Errors that can occur during staging
#[derive(Error, Debug)]
pub enum StagingError {
    #[error("Invalid findings: {0}")]
    Validation(#[from] ValidationError),

    #[error("Findings error: {0}")]
    Findings(#[from] FindingsError),

    /// A produced (T, N, M) triple is missing from the stage-grouping tables
    #[error("Stage-grouping table has no entry for {tnm}")]
    Configuration { tnm: String },

    /// A non-baseline category was produced without supporting evidence
    #[error("Classification {category} produced without supporting evidence")]
    UnsupportedClassification { category: String },
}

/// Stage a findings record.
///
/// This is the main entry point for staging.
///
/// # Returns
///
/// A `StagingResult` containing:
/// - `tnm`: The compiled TNM string
/// - `overall`: The stage group, or indeterminate with reasons
/// - `tumor`, `nodes`, `metastasis`: Each category with its evidence
/// - `indeterminate`: Which components could not be assessed and why
pub fn stage(findings: &ClinicalFindings) -> Result<StagingResult, StagingError> {
    findings.validate()?;

    let routing = route_tumor(findings.tumor.as_ref())?;
    let request = ClassificationRequest {
        findings,
        routing: &routing,
    };

    // Fan-out: the classifiers are independent once routing is known
    let tumor = TumorClassifier::new().classify(&request)?;
    let nodes = NodeClassifier::new().classify(&request)?;
    let metastasis = MetastasisClassifier::new().classify(&request)?;

    // Join barrier: compile once all three are in
    let compiled = StageCompiler::new().compile(&tumor.stage, &nodes, &metastasis)?;
    let result = ResultAssembler::new().assemble(findings, tumor, nodes, metastasis, compiled);

    debug!(
        report_id = ?result.report_id,
        tnm = %result.prefixed_tnm,
        overall = %result.overall,
        "Staging complete"
    );

    Ok(result)
}

/// Parse a YAML findings document and stage it.
pub fn stage_yaml(yaml: &str) -> Result<StagingResult, StagingError> {
    let findings = ClinicalFindings::from_yaml(yaml)?;
    stage(&findings)
}

/// Parse a JSON findings document and stage it.
pub fn stage_json(json: &str) -> Result<StagingResult, StagingError> {
    let findings = ClinicalFindings::from_json(json)?;
    stage(&findings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_right_upper_lobe_with_hilar_node() {
        let yaml = r#"
report_id: "CT-001"
tumor:
  lobe: right_upper
  primary:
    greatest_dimension_mm: 42
    density: solid
nodes:
  assessment: performed
  stations:
    - station: "10R"
      status: pathologic
"#;

        let result = stage_yaml(yaml).unwrap();

        assert_eq!(result.tnm, "T2bN1M0");
        assert_eq!(result.overall_stage(), Some(OverallStage::IIB));
    }

    #[test]
    fn test_two_mediastinal_stations() {
        let yaml = r#"
tumor:
  laterality: right
  primary:
    greatest_dimension_mm: 35
    density: solid
nodes:
  assessment: performed
  stations:
    - station: "4R"
      status: fdg_avid
    - station: "2R"
      status: fdg_avid
"#;

        let result = stage_yaml(yaml).unwrap();

        assert_eq!(result.nodes.category, NCategory::N2b);
        assert_eq!(result.tnm, "T2aN2bM0");
        assert_eq!(result.overall_stage(), Some(OverallStage::IIIB));
        assert_eq!(result.prefixed_tnm, "cT2aN2bM0");
    }

    #[test]
    fn test_missing_size_is_indeterminate() {
        let yaml = r#"
tumor:
  laterality: left
nodes:
  assessment: performed
"#;

        let result = stage_yaml(yaml).unwrap();

        assert!(result.is_indeterminate());
        assert_eq!(result.tumor.stage.category, TCategory::TX);
        assert_eq!(result.indeterminate.len(), 1);
        assert_eq!(result.indeterminate[0].component, Component::Tumor);
    }

    #[test]
    fn test_validation_error_aborts_staging() {
        let findings = ClinicalFindings {
            tumor: Some(findings::TumorRecord {
                primary: findings::Lesion {
                    greatest_dimension_mm: Some(f64::NAN),
                    ..Default::default()
                },
                ..Default::default()
            }),
            ..Default::default()
        };

        assert!(matches!(
            stage(&findings),
            Err(StagingError::Validation(ValidationError::InvalidMeasurement { .. }))
        ));
    }

    #[test]
    fn test_staging_is_idempotent() {
        let yaml = r#"
tumor:
  lobe: left_lower
  primary:
    greatest_dimension_mm: 28
    solid_component_mm: 12
    density: part_solid
nodes:
  assessment: performed
  stations:
    - station: "5"
      status: involved
metastasis:
  sites:
    - site: "T8 vertebral body"
      organ_system: skeletal
"#;

        let findings = ClinicalFindings::from_yaml(yaml).unwrap();
        let first = serde_json::to_string(&stage(&findings).unwrap()).unwrap();
        let second = serde_json::to_string(&stage(&findings).unwrap()).unwrap();

        assert_eq!(first, second);
    }
}
