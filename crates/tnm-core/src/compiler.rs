//! Stage Compiler: maps a (T, N, M) triple to an overall stage group.
//!
//! The compiler applies fixed rules over the TNM-9 stage-grouping tables:
//! 1. Any M1 category → Stage IVA (M1a, M1b) or IVB (M1c1, M1c2)
//! 2. Else TX or NX → Indeterminate, never a best-effort stage
//! 3. Else → the M0 table cell for (T, N)
//!
//! A triple the tables do not cover is a table defect and fails loudly.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{
    Category, MCategory, MStage, NCategory, NStage, OverallStage, StageOutcome, TCategory, TStage,
};
use crate::StagingError;

/// A cell of the M0 stage-grouping table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StageCell {
    Group(OverallStage),
    /// The standard defines no group for this combination
    Undefined,
}

use self::StageCell::{Group, Undefined};
use crate::types::OverallStage as S;

/// Column order of [`M0_TABLE`].
const N_COLUMNS: [NCategory; 5] = [
    NCategory::N0,
    NCategory::N1,
    NCategory::N2a,
    NCategory::N2b,
    NCategory::N3,
];

#[rustfmt::skip]
const M0_TABLE: &[(TCategory, [StageCell; 5])] = &[
    //                 N0               N1               N2a               N2b               N3
    (TCategory::T0,   [Undefined,       Undefined,       Undefined,        Undefined,        Undefined]),
    (TCategory::Tis,  [Group(S::Stage0), Undefined,      Undefined,        Undefined,        Undefined]),
    (TCategory::T1mi, [Group(S::IA1),   Group(S::IIA),   Group(S::IIB),    Group(S::IIIA),   Group(S::IIIB)]),
    (TCategory::T1a,  [Group(S::IA1),   Group(S::IIA),   Group(S::IIB),    Group(S::IIIA),   Group(S::IIIB)]),
    (TCategory::T1b,  [Group(S::IA2),   Group(S::IIA),   Group(S::IIB),    Group(S::IIIA),   Group(S::IIIB)]),
    (TCategory::T1c,  [Group(S::IA3),   Group(S::IIA),   Group(S::IIB),    Group(S::IIIA),   Group(S::IIIB)]),
    (TCategory::T2a,  [Group(S::IB),    Group(S::IIB),   Group(S::IIIA),   Group(S::IIIB),   Group(S::IIIB)]),
    (TCategory::T2b,  [Group(S::IIA),   Group(S::IIB),   Group(S::IIIA),   Group(S::IIIB),   Group(S::IIIB)]),
    (TCategory::T3,   [Group(S::IIB),   Group(S::IIIA),  Group(S::IIIA),   Group(S::IIIB),   Group(S::IIIC)]),
    (TCategory::T4,   [Group(S::IIIA),  Group(S::IIIA),  Group(S::IIIB),   Group(S::IIIB),   Group(S::IIIC)]),
];

const M1_TABLE: &[(MCategory, OverallStage)] = &[
    (MCategory::M1a, S::IVA),
    (MCategory::M1b, S::IVA),
    (MCategory::M1c1, S::IVB),
    (MCategory::M1c2, S::IVB),
];

fn lookup_m0(t: TCategory, n: NCategory) -> Option<StageCell> {
    let column = N_COLUMNS.iter().position(|c| *c == n)?;
    M0_TABLE
        .iter()
        .find(|(row, _)| *row == t)
        .map(|(_, cells)| cells[column])
}

fn lookup_m1(m: MCategory) -> Option<OverallStage> {
    M1_TABLE
        .iter()
        .find(|(row, _)| *row == m)
        .map(|(_, stage)| *stage)
}

/// The compiled TNM string (e.g., "T2aN1M0").
pub fn tnm_string(t: TCategory, n: NCategory, m: MCategory) -> String {
    format!("{}{}{}", t, n, m)
}

/// Compile a (T, N, M) triple into an overall stage outcome.
///
/// Pure: identical inputs always yield identical outcomes.
pub fn compile_stage(
    t: TCategory,
    n: NCategory,
    m: MCategory,
) -> Result<StageOutcome, StagingError> {
    let tnm = tnm_string(t, n, m);

    if !m.is_baseline() {
        let stage = lookup_m1(m).ok_or(StagingError::Configuration { tnm })?;
        return Ok(StageOutcome::Staged { stage });
    }

    let mut reasons = Vec::new();
    if t.is_indeterminate() {
        reasons.push("TX: primary tumor cannot be assessed".to_string());
    }
    if n.is_indeterminate() {
        reasons.push("NX: regional lymph nodes cannot be assessed".to_string());
    }
    if !reasons.is_empty() {
        return Ok(StageOutcome::Indeterminate { reasons });
    }

    match lookup_m0(t, n) {
        Some(Group(stage)) => Ok(StageOutcome::Staged { stage }),
        Some(Undefined) => Ok(StageOutcome::Indeterminate {
            reasons: vec![format!("No stage group is defined for {}", tnm)],
        }),
        None => Err(StagingError::Configuration { tnm }),
    }
}

/// Output of the Stage Compiler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledStage {
    pub tnm: String,
    pub outcome: StageOutcome,
}

/// The Stage Compiler: join barrier over the three classifications.
pub struct StageCompiler;

impl StageCompiler {
    pub fn new() -> Self {
        Self
    }

    pub fn compile(
        &self,
        tumor: &TStage,
        nodes: &NStage,
        metastasis: &MStage,
    ) -> Result<CompiledStage, StagingError> {
        let tnm = tnm_string(tumor.category, nodes.category, metastasis.category);
        let outcome = compile_stage(tumor.category, nodes.category, metastasis.category)?;

        debug!(tnm = %tnm, outcome = %outcome, "Stage compiled");

        Ok(CompiledStage { tnm, outcome })
    }
}

impl Default for StageCompiler {
    fn default() -> Self {
        Self::new()
    }
}
