//! Core staging types: categories, classifications and the staging result.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::classifiers::TumorClassification;
use crate::evidence::Evidence;
use crate::findings::ValidationError;
use crate::StagingError;

/// Side of the chest the primary tumor arises in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Laterality {
    Left,
    Right,
}

impl Laterality {
    pub fn opposite(self) -> Self {
        match self {
            Laterality::Left => Laterality::Right,
            Laterality::Right => Laterality::Left,
        }
    }

    /// Side qualifier used in IASLC station ids.
    pub fn side_code(self) -> char {
        match self {
            Laterality::Left => 'L',
            Laterality::Right => 'R',
        }
    }
}

impl fmt::Display for Laterality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Laterality::Left => write!(f, "left"),
            Laterality::Right => write!(f, "right"),
        }
    }
}

impl FromStr for Laterality {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" | "l" => Ok(Laterality::Left),
            "right" | "r" => Ok(Laterality::Right),
            _ => Err(ValidationError::InvalidLaterality(s.to_string())),
        }
    }
}

/// The three staging components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    Tumor,
    Nodes,
    Metastasis,
}

impl Component {
    /// The question each classifier answers.
    pub fn question(&self) -> &'static str {
        match self {
            Component::Tumor => "How large and how locally invasive is the primary tumor?",
            Component::Nodes => "Which regional lymph node stations are involved, and on which side?",
            Component::Metastasis => "Has the disease spread beyond the primary lung, and to how many organ systems?",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Tumor => write!(f, "T"),
            Component::Nodes => write!(f, "N"),
            Component::Metastasis => write!(f, "M"),
        }
    }
}

/// Behavior shared by the T, N and M category enumerations.
pub trait Category: Copy + Eq + fmt::Display {
    /// The explicit "no disease" value (T0, N0, M0).
    fn is_baseline(&self) -> bool;

    /// The explicit "cannot be assessed" value (TX, NX).
    fn is_indeterminate(&self) -> bool;
}

/// Primary tumor category.
///
/// Variants are declared in ascending order of extent so that `max` yields
/// the more advanced category. `TX` sorts lowest and never takes part in a
/// comparison between definite categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TCategory {
    TX,
    T0,
    Tis,
    T1mi,
    T1a,
    T1b,
    T1c,
    T2a,
    T2b,
    T3,
    T4,
}

impl fmt::Display for TCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl Category for TCategory {
    fn is_baseline(&self) -> bool {
        *self == TCategory::T0
    }

    fn is_indeterminate(&self) -> bool {
        *self == TCategory::TX
    }
}

/// Regional lymph node category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NCategory {
    NX,
    N0,
    N1,
    N2a,
    N2b,
    N3,
}

impl fmt::Display for NCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl Category for NCategory {
    fn is_baseline(&self) -> bool {
        *self == NCategory::N0
    }

    fn is_indeterminate(&self) -> bool {
        *self == NCategory::NX
    }
}

/// Distant metastasis category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MCategory {
    M0,
    M1a,
    M1b,
    M1c1,
    M1c2,
}

impl fmt::Display for MCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl Category for MCategory {
    fn is_baseline(&self) -> bool {
        *self == MCategory::M0
    }

    fn is_indeterminate(&self) -> bool {
        false
    }
}

/// How well-supported a classification is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confidence::Low => write!(f, "low"),
            Confidence::Medium => write!(f, "medium"),
            Confidence::High => write!(f, "high"),
        }
    }
}

/// A T, N or M category together with the evidence that justified it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification<C> {
    pub category: C,

    pub evidence: Vec<Evidence>,

    /// Why the category could not be determined (TX/NX only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indeterminate_reason: Option<String>,

    pub confidence: Confidence,
}

impl<C: Category> Classification<C> {
    /// Build a definite classification.
    ///
    /// Fails when a category other than the baseline is produced without
    /// any supporting evidence. Confidence drops to medium when any
    /// supporting item is flagged uncertain.
    pub fn supported(category: C, evidence: Vec<Evidence>) -> Result<Self, StagingError> {
        if category.is_indeterminate() {
            return Err(StagingError::UnsupportedClassification {
                category: category.to_string(),
            });
        }
        if evidence.is_empty() && !category.is_baseline() {
            return Err(StagingError::UnsupportedClassification {
                category: category.to_string(),
            });
        }

        let confidence = if evidence.iter().any(|e| e.uncertain) {
            Confidence::Medium
        } else {
            Confidence::High
        };

        Ok(Self {
            category,
            evidence,
            indeterminate_reason: None,
            confidence,
        })
    }

    /// Build an indeterminate classification (TX/NX).
    pub fn indeterminate(category: C, reason: impl Into<String>) -> Self {
        debug_assert!(category.is_indeterminate());
        Self {
            category,
            evidence: Vec::new(),
            indeterminate_reason: Some(reason.into()),
            confidence: Confidence::Low,
        }
    }

    pub fn is_indeterminate(&self) -> bool {
        self.category.is_indeterminate()
    }
}

pub type TStage = Classification<TCategory>;
pub type NStage = Classification<NCategory>;
pub type MStage = Classification<MCategory>;

/// Overall prognostic stage group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OverallStage {
    #[serde(rename = "Stage 0")]
    Stage0,
    #[serde(rename = "Stage IA1")]
    IA1,
    #[serde(rename = "Stage IA2")]
    IA2,
    #[serde(rename = "Stage IA3")]
    IA3,
    #[serde(rename = "Stage IB")]
    IB,
    #[serde(rename = "Stage IIA")]
    IIA,
    #[serde(rename = "Stage IIB")]
    IIB,
    #[serde(rename = "Stage IIIA")]
    IIIA,
    #[serde(rename = "Stage IIIB")]
    IIIB,
    #[serde(rename = "Stage IIIC")]
    IIIC,
    #[serde(rename = "Stage IVA")]
    IVA,
    #[serde(rename = "Stage IVB")]
    IVB,
}

impl OverallStage {
    fn group(&self) -> &'static str {
        match self {
            OverallStage::Stage0 => "0",
            OverallStage::IA1 => "IA1",
            OverallStage::IA2 => "IA2",
            OverallStage::IA3 => "IA3",
            OverallStage::IB => "IB",
            OverallStage::IIA => "IIA",
            OverallStage::IIB => "IIB",
            OverallStage::IIIA => "IIIA",
            OverallStage::IIIB => "IIIB",
            OverallStage::IIIC => "IIIC",
            OverallStage::IVA => "IVA",
            OverallStage::IVB => "IVB",
        }
    }
}

impl fmt::Display for OverallStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Stage {}", self.group())
    }
}

/// Result of compiling a (T, N, M) triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageOutcome {
    Staged { stage: OverallStage },
    Indeterminate { reasons: Vec<String> },
}

impl StageOutcome {
    pub fn stage(&self) -> Option<OverallStage> {
        match self {
            StageOutcome::Staged { stage } => Some(*stage),
            StageOutcome::Indeterminate { .. } => None,
        }
    }

    pub fn is_indeterminate(&self) -> bool {
        matches!(self, StageOutcome::Indeterminate { .. })
    }
}

impl fmt::Display for StageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageOutcome::Staged { stage } => write!(f, "{}", stage),
            StageOutcome::Indeterminate { .. } => write!(f, "Indeterminate"),
        }
    }
}

/// Staging context prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StagingPrefix {
    /// Clinical (imaging-based)
    #[default]
    #[serde(rename = "c")]
    Clinical,
    /// Pathologic
    #[serde(rename = "p")]
    Pathologic,
    /// Clinical, after neoadjuvant therapy
    #[serde(rename = "yc")]
    PostTherapyClinical,
    /// Pathologic, after neoadjuvant therapy
    #[serde(rename = "yp")]
    PostTherapyPathologic,
}

impl fmt::Display for StagingPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            StagingPrefix::Clinical => "c",
            StagingPrefix::Pathologic => "p",
            StagingPrefix::PostTherapyClinical => "yc",
            StagingPrefix::PostTherapyPathologic => "yp",
        };
        f.write_str(code)
    }
}

/// A component that could not be classified definitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndeterminateComponent {
    pub component: Component,
    pub reason: String,
}

/// The final staging record for one report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagingResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,

    pub prefix: StagingPrefix,

    /// Combined TNM string (e.g., "T2aN1M0")
    pub tnm: String,

    /// TNM string with the staging prefix (e.g., "cT2aN1M0")
    pub prefixed_tnm: String,

    pub overall: StageOutcome,

    pub tumor: TumorClassification,

    pub nodes: NStage,

    pub metastasis: MStage,

    /// Components that are indeterminate, with the reason
    pub indeterminate: Vec<IndeterminateComponent>,

    /// Weakest component confidence
    pub confidence: Confidence,

    pub summary: String,
}

impl StagingResult {
    pub fn overall_stage(&self) -> Option<OverallStage> {
        self.overall.stage()
    }

    pub fn is_indeterminate(&self) -> bool {
        self.overall.is_indeterminate()
    }
}
