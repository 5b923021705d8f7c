//! M-Classifier
//!
//! **Question**: Has the disease spread beyond the primary lung, and to how
//! many organ systems?
//!
//! Intrathoracic spread (malignant effusions, pleural or pericardial
//! nodules, contralateral lung nodules) is M1a. Extrathoracic spread is
//! counted per organ system: one lesion in one system is M1b, several
//! lesions in one system M1c1, two or more systems M1c2.

use std::collections::BTreeMap;
use tracing::debug;

use super::{ClassificationRequest, Classifier};
use crate::evidence::Evidence;
use crate::findings::{EffusionKind, MetastasisRecord, OrganSystem};
use crate::types::{Classification, Component, MCategory, MStage};
use crate::StagingError;

/// Classify distant metastasis.
///
/// `contralateral_nodules` is the evidence routed from the T side.
pub fn classify_metastasis(
    record: &MetastasisRecord,
    contralateral_nodules: &[Evidence],
) -> Result<MStage, StagingError> {
    record.validate()?;

    let mut intrathoracic: Vec<Evidence> = contralateral_nodules.to_vec();

    for (i, effusion) in record.effusions.iter().enumerate() {
        if !effusion.malignant {
            continue;
        }
        let kind = match effusion.kind {
            EffusionKind::Pleural => "pleural",
            EffusionKind::Pericardial => "pericardial",
        };
        intrathoracic.push(
            Evidence::from_metastasis(
                format!("Malignant {} effusion: M1a", kind),
                format!("effusions[{}]", i),
            )
            .with_quote(effusion.quote.as_deref()),
        );
    }

    let mut systems: BTreeMap<OrganSystem, u32> = BTreeMap::new();
    let mut extrathoracic: Vec<Evidence> = Vec::new();
    let mut unplaced: Vec<Evidence> = Vec::new();

    for (i, site) in record.sites.iter().enumerate() {
        let path = format!("sites[{}]", i);
        match site.organ_system {
            Some(system) if system.is_intrathoracic() => {
                intrathoracic.push(
                    Evidence::from_metastasis(
                        format!("{} ({}): M1a", site.site, system.label()),
                        path,
                    )
                    .with_quote(site.quote.as_deref()),
                );
            }
            Some(system) => {
                *systems.entry(system).or_insert(0) += site.count;
                let lesions = if site.count == 1 {
                    "1 lesion".to_string()
                } else {
                    format!("{} lesions", site.count)
                };
                extrathoracic.push(
                    Evidence::from_metastasis(
                        format!("{} ({}): {}", site.site, system.label(), lesions),
                        path,
                    )
                    .with_quote(site.quote.as_deref()),
                );
            }
            None => {
                unplaced.push(
                    Evidence::from_metastasis(
                        format!(
                            "{}: distant lesion of undetermined organ system, not counted",
                            site.site
                        ),
                        path,
                    )
                    .with_quote(site.quote.as_deref())
                    .uncertain(),
                );
            }
        }
    }

    let lesion_total: u32 = systems.values().sum();
    let extrathoracic_category = match systems.len() {
        0 if unplaced.is_empty() => None,
        0 => Some(MCategory::M1b),
        1 if lesion_total > 1 => Some(MCategory::M1c1),
        1 => Some(MCategory::M1b),
        _ => Some(MCategory::M1c2),
    };

    let stage = match extrathoracic_category {
        Some(category) => {
            let mut evidence = Vec::new();
            if !systems.is_empty() {
                let labels: Vec<&str> = systems.keys().map(|s| s.label()).collect();
                evidence.push(Evidence::from_metastasis(
                    format!(
                        "Extrathoracic metastases: {} lesion(s) in {} organ system(s) ({}): {}",
                        lesion_total,
                        systems.len(),
                        labels.join(", "),
                        category
                    ),
                    "sites",
                ));
            }
            evidence.extend(extrathoracic);
            evidence.extend(unplaced);
            Classification::supported(category, evidence)?
        }
        None if !intrathoracic.is_empty() => {
            Classification::supported(MCategory::M1a, intrathoracic)?
        }
        None => Classification::supported(MCategory::M0, vec![])?,
    };

    debug!(
        category = %stage.category,
        organ_systems = systems.len(),
        evidence = stage.evidence.len(),
        "M-Classifier complete"
    );

    Ok(stage)
}

/// The M-Classifier.
pub struct MetastasisClassifier;

impl MetastasisClassifier {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MetastasisClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier for MetastasisClassifier {
    type Output = MStage;

    fn component(&self) -> Component {
        Component::Metastasis
    }

    fn classify(&self, request: &ClassificationRequest<'_>) -> Result<Self::Output, StagingError> {
        classify_metastasis(
            &request.findings.metastasis,
            &request.routing.contralateral_nodules,
        )
    }
}
