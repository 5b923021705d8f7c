//! The T, N and M classifiers.
//!
//! Each classifier answers one question about the findings. They share no
//! mutable state and read the same immutable record; the only value passed
//! between them is the [`TumorRouting`] computed on the T side.

mod metastasis;
mod nodes;
mod tumor;

pub use metastasis::{classify_metastasis, MetastasisClassifier};
pub use nodes::{classify_nodes, station_category, NodalClass, NodeClassifier};
pub use tumor::{classify_tumor, route_tumor, TumorClassification, TumorClassifier, TumorRouting};

use crate::findings::ClinicalFindings;
use crate::types::Component;
use crate::StagingError;

/// Everything a classifier may read.
#[derive(Debug, Clone, Copy)]
pub struct ClassificationRequest<'a> {
    pub findings: &'a ClinicalFindings,
    pub routing: &'a TumorRouting,
}

/// Trait for the staging classifiers.
///
/// Implementations are pure: the same request always yields the same output.
pub trait Classifier: Send + Sync {
    type Output;

    /// The component this classifier produces.
    fn component(&self) -> Component;

    /// The question this classifier answers.
    fn question(&self) -> &'static str {
        self.component().question()
    }

    fn classify(&self, request: &ClassificationRequest<'_>) -> Result<Self::Output, StagingError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_classifier_answers_its_own_question() {
        assert_eq!(TumorClassifier::new().component(), Component::Tumor);
        assert_eq!(NodeClassifier::new().component(), Component::Nodes);
        assert_eq!(MetastasisClassifier::new().component(), Component::Metastasis);
        assert!(NodeClassifier::new().question().contains("lymph node"));
        assert_eq!(
            TumorClassifier::new().question(),
            Component::Tumor.question()
        );
    }
}
