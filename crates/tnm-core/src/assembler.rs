//! Result Assembler: packages the classifications and the compiled stage.
//!
//! The assembler adds no staging logic. It records which components are
//! indeterminate, takes the weakest component confidence, and writes a
//! deterministic summary. No timestamps are added so repeated runs over the
//! same findings serialize identically.

use crate::classifiers::TumorClassification;
use crate::compiler::CompiledStage;
use crate::findings::ClinicalFindings;
use crate::types::{
    Component, Confidence, IndeterminateComponent, MStage, NStage, StageOutcome, StagingResult,
};

/// The Result Assembler.
pub struct ResultAssembler;

impl ResultAssembler {
    pub fn new() -> Self {
        Self
    }

    /// Assemble the final staging record.
    ///
    /// # Arguments
    ///
    /// * `findings` - The findings record (for report metadata)
    /// * `tumor`, `nodes`, `metastasis` - The three classifications
    /// * `compiled` - The Stage Compiler output
    pub fn assemble(
        &self,
        findings: &ClinicalFindings,
        tumor: TumorClassification,
        nodes: NStage,
        metastasis: MStage,
        compiled: CompiledStage,
    ) -> StagingResult {
        let mut indeterminate = Vec::new();
        if let Some(reason) = &tumor.stage.indeterminate_reason {
            indeterminate.push(IndeterminateComponent {
                component: Component::Tumor,
                reason: reason.clone(),
            });
        }
        if let Some(reason) = &nodes.indeterminate_reason {
            indeterminate.push(IndeterminateComponent {
                component: Component::Nodes,
                reason: reason.clone(),
            });
        }

        let confidence = if compiled.outcome.is_indeterminate() {
            Confidence::Low
        } else {
            [
                tumor.stage.confidence,
                nodes.confidence,
                metastasis.confidence,
            ]
            .into_iter()
            .min()
            .unwrap_or(Confidence::Low)
        };

        let prefixed_tnm = format!("{}{}", findings.prefix, compiled.tnm);
        let cited = tumor.stage.evidence.len() + nodes.evidence.len() + metastasis.evidence.len();
        let summary = self.build_summary(&prefixed_tnm, &compiled.outcome, &indeterminate, cited);

        StagingResult {
            report_id: findings.report_id.clone(),
            patient_id: findings.patient_id.clone(),
            prefix: findings.prefix,
            tnm: compiled.tnm,
            prefixed_tnm,
            overall: compiled.outcome,
            tumor,
            nodes,
            metastasis,
            indeterminate,
            confidence,
            summary,
        }
    }

    /// Build a human-readable summary.
    fn build_summary(
        &self,
        prefixed_tnm: &str,
        outcome: &StageOutcome,
        indeterminate: &[IndeterminateComponent],
        cited: usize,
    ) -> String {
        let mut summary = match outcome {
            StageOutcome::Staged { stage } => format!("{} corresponds to {}. ", prefixed_tnm, stage),
            StageOutcome::Indeterminate { reasons } => format!(
                "{}: overall stage indeterminate ({}). ",
                prefixed_tnm,
                reasons.join("; ")
            ),
        };

        for component in indeterminate {
            summary.push_str(&format!("{}: {}. ", component.component, component.reason));
        }

        summary.push_str(&format!("{} findings cited.", cited));
        summary
    }
}

impl Default for ResultAssembler {
    fn default() -> Self {
        Self::new()
    }
}
