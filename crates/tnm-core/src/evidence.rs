//! Evidence linking for staging classifications.
//!
//! Every definite T, N or M category must be supported by evidence that
//! points at the findings it was derived from, carrying the upstream quote
//! when the extraction stage resolved one.

use serde::{Deserialize, Serialize};

/// The findings section a piece of evidence was drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceSource {
    Tumor,
    Nodes,
    Metastasis,
}

/// A piece of evidence supporting a classification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Evidence {
    /// What this evidence supports
    pub claim: String,

    /// Where the evidence comes from
    pub source: EvidenceSource,

    /// Pointer to the field in the findings record (e.g., "nodes.stations[1]")
    pub pointer: String,

    /// Verbatim report text resolved by the extraction stage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote: Option<String>,

    /// Evidence that could not be fully interpreted
    #[serde(default, skip_serializing_if = "is_false")]
    pub uncertain: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl Evidence {
    fn new(claim: impl Into<String>, source: EvidenceSource, pointer: impl Into<String>) -> Self {
        Self {
            claim: claim.into(),
            source,
            pointer: pointer.into(),
            quote: None,
            uncertain: false,
        }
    }

    /// Create evidence from the tumor record.
    pub fn from_tumor(claim: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(claim, EvidenceSource::Tumor, format!("tumor.{}", path.into()))
    }

    /// Create evidence from a node station entry.
    pub fn from_station(claim: impl Into<String>, index: usize) -> Self {
        Self::new(claim, EvidenceSource::Nodes, format!("nodes.stations[{}]", index))
    }

    /// Create evidence from the node record as a whole.
    pub fn from_nodes(claim: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(claim, EvidenceSource::Nodes, format!("nodes.{}", path.into()))
    }

    /// Create evidence from the metastasis record.
    pub fn from_metastasis(claim: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(
            claim,
            EvidenceSource::Metastasis,
            format!("metastasis.{}", path.into()),
        )
    }

    /// Attach the upstream quote, if any.
    pub fn with_quote(mut self, quote: Option<&str>) -> Self {
        self.quote = quote.map(str::to_string);
        self
    }

    /// Flag this evidence as uncertain.
    pub fn uncertain(mut self) -> Self {
        self.uncertain = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evidence_from_tumor() {
        let evidence = Evidence::from_tumor("Tumor measures 42 mm", "primary.greatest_dimension_mm");
        assert_eq!(evidence.source, EvidenceSource::Tumor);
        assert_eq!(evidence.pointer, "tumor.primary.greatest_dimension_mm");
        assert!(!evidence.uncertain);
    }

    #[test]
    fn test_evidence_from_station() {
        let evidence = Evidence::from_station("Station 4R FDG-avid", 2);
        assert_eq!(evidence.source, EvidenceSource::Nodes);
        assert_eq!(evidence.pointer, "nodes.stations[2]");
    }

    #[test]
    fn test_quote_and_uncertain_flag() {
        let evidence = Evidence::from_metastasis("Lesion of unknown origin", "sites[0]")
            .with_quote(Some("indeterminate hypodense lesion"))
            .uncertain();

        assert_eq!(evidence.quote.as_deref(), Some("indeterminate hypodense lesion"));
        assert!(evidence.uncertain);
    }

    #[test]
    fn test_certain_evidence_omits_flag_when_serialized() {
        let evidence = Evidence::from_tumor("Visceral pleural invasion", "primary.invasion");
        let json = serde_json::to_value(&evidence).unwrap();
        assert!(json.get("uncertain").is_none());
        assert!(json.get("quote").is_none());
    }
}
