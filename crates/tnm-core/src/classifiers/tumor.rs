//! T-Classifier
//!
//! **Question**: How large and how locally invasive is the primary tumor?
//!
//! Size and qualitative descriptors are categorized independently and the
//! higher of the two wins. Multifocal patterns decide which lesion is sized
//! and where separate nodules are routed; contralateral nodules never count
//! toward T and are handed to the M-Classifier through [`TumorRouting`].

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ClassificationRequest, Classifier};
use crate::evidence::Evidence;
use crate::findings::{
    AtelectasisExtent, InvadedStructure, Lesion, Multifocality, NoduleLocation, TumorRecord,
    ValidationError,
};
use crate::types::{Classification, Component, Laterality, TCategory, TStage};
use crate::StagingError;

/// Values the T side hands to the N and M classifiers.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TumorRouting {
    pub laterality: Option<Laterality>,

    /// Contralateral separate nodules, staged as M1a
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contralateral_nodules: Vec<Evidence>,
}

/// Output of the T-Classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TumorClassification {
    pub stage: TStage,

    pub laterality: Option<Laterality>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contralateral_nodules: Vec<Evidence>,

    /// One T per primary when synchronous primaries are reported
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub primaries: Vec<TStage>,

    /// Lesion count when T comes from the dominant ground-glass lesion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiplicity: Option<u32>,
}

/// Resolve tumor laterality and route contralateral nodules to M.
///
/// The T-Classifier calls this itself; callers that fan the classifiers out
/// in parallel call it first to obtain the values N and M depend on.
pub fn route_tumor(tumor: Option<&TumorRecord>) -> Result<TumorRouting, ValidationError> {
    let Some(tumor) = tumor else {
        return Ok(TumorRouting::default());
    };

    let laterality = tumor.resolved_laterality()?;

    let mut contralateral_nodules = Vec::new();
    if tumor.multifocality.routes_nodules()
        && tumor
            .separate_nodules
            .contains(&NoduleLocation::ContralateralLobe)
    {
        contralateral_nodules.push(
            Evidence::from_tumor(
                "Separate tumor nodule(s) in the contralateral lung",
                "separate_nodules",
            )
            .with_quote(tumor.nodule_quote.as_deref()),
        );
    }

    Ok(TumorRouting {
        laterality,
        contralateral_nodules,
    })
}

/// Classify the primary tumor.
///
/// `None` means no primary tumor was described (T0). Missing measurements
/// never fail; they produce TX. Malformed measurements are rejected.
pub fn classify_tumor(tumor: Option<&TumorRecord>) -> Result<TumorClassification, StagingError> {
    if let Some(tumor) = tumor {
        tumor.validate()?;
    }
    let routing = route_tumor(tumor)?;

    let Some(tumor) = tumor else {
        debug!("No primary tumor described");
        return Ok(TumorClassification {
            stage: Classification::supported(TCategory::T0, vec![])?,
            laterality: None,
            contralateral_nodules: vec![],
            primaries: vec![],
            multiplicity: None,
        });
    };

    let mut primaries = Vec::new();
    let mut multiplicity = None;

    let stage = match tumor.multifocality {
        Multifocality::SynchronousPrimaries => {
            for (path, lesion) in tumor.lesions() {
                primaries.push(stage_lesion(lesion, &path, None, vec![])?);
            }
            highest_primary(&primaries)
        }
        Multifocality::MultifocalGroundGlass => {
            let count = tumor
                .lesion_count
                .unwrap_or(1 + tumor.additional_lesions.len() as u32);
            multiplicity = Some(count);

            let (path, dominant) = dominant_lesion(tumor);
            let note = Evidence::from_tumor(
                format!(
                    "{} ground-glass/lepidic lesions; T assigned from the dominant lesion ({})",
                    count, path
                ),
                "multifocality",
            );
            stage_lesion(dominant, &path, None, vec![note])?
        }
        Multifocality::Solitary
        | Multifocality::SeparateNodules
        | Multifocality::DiffusePneumonic => {
            stage_lesion(&tumor.primary, "primary", Some(tumor), vec![])?
        }
    };

    debug!(
        category = %stage.category,
        evidence = stage.evidence.len(),
        pattern = ?tumor.multifocality,
        "T-Classifier complete"
    );

    Ok(TumorClassification {
        stage,
        laterality: routing.laterality,
        contralateral_nodules: routing.contralateral_nodules,
        primaries,
        multiplicity,
    })
}

/// Size band for a solid lesion (or a solid component).
pub fn solid_size_category(mm: f64) -> TCategory {
    if mm <= 10.0 {
        TCategory::T1a
    } else if mm <= 20.0 {
        TCategory::T1b
    } else if mm <= 30.0 {
        TCategory::T1c
    } else if mm <= 40.0 {
        TCategory::T2a
    } else if mm <= 50.0 {
        TCategory::T2b
    } else if mm <= 70.0 {
        TCategory::T3
    } else {
        TCategory::T4
    }
}

/// Size band for a ground-glass or part-solid lesion.
pub fn subsolid_size_category(total_mm: f64, solid_mm: f64) -> TCategory {
    if total_mm <= 30.0 {
        if solid_mm <= 0.0 {
            TCategory::Tis
        } else if solid_mm <= 5.0 {
            TCategory::T1mi
        } else {
            solid_size_category(solid_mm)
        }
    } else {
        // Lesions over 30 mm are at least T1a whatever the solid component.
        solid_size_category(solid_mm).max(TCategory::T1a)
    }
}

fn invasion_category(structure: InvadedStructure) -> TCategory {
    match structure {
        InvadedStructure::VisceralPleura
        | InvadedStructure::AdjacentLobe
        | InvadedStructure::MainBronchus => TCategory::T2a,
        InvadedStructure::ParietalPleura
        | InvadedStructure::ChestWall
        | InvadedStructure::PhrenicNerve
        | InvadedStructure::ParietalPericardium
        | InvadedStructure::AzygosVein => TCategory::T3,
        InvadedStructure::Diaphragm
        | InvadedStructure::Mediastinum
        | InvadedStructure::Heart
        | InvadedStructure::GreatVessels
        | InvadedStructure::Trachea
        | InvadedStructure::Carina
        | InvadedStructure::RecurrentLaryngealNerve
        | InvadedStructure::Esophagus
        | InvadedStructure::VertebralBody
        | InvadedStructure::BrachialPlexus => TCategory::T4,
    }
}

fn atelectasis_category(extent: AtelectasisExtent) -> Option<TCategory> {
    match extent {
        AtelectasisExtent::Partial => None,
        AtelectasisExtent::ExtendsToHilum | AtelectasisExtent::WholeLung => Some(TCategory::T2a),
    }
}

fn size_category(lesion: &Lesion, path: &str) -> Option<(TCategory, Evidence)> {
    let total = lesion.greatest_dimension_mm?;
    let pointer = format!("{}.greatest_dimension_mm", path);

    let (category, claim) = match lesion.subsolid_component() {
        Some(solid) => {
            let category = subsolid_size_category(total, solid);
            let claim = format!(
                "Subsolid lesion measures {} mm with a {} mm solid component: {}",
                total, solid, category
            );
            (category, claim)
        }
        None => {
            let category = solid_size_category(total);
            (category, format!("Tumor measures {} mm: {}", total, category))
        }
    };

    Some((
        category,
        Evidence::from_tumor(claim, pointer).with_quote(lesion.quote.as_deref()),
    ))
}

fn feature_categories(
    lesion: &Lesion,
    path: &str,
    nodules: Option<&TumorRecord>,
) -> Vec<(TCategory, Evidence)> {
    let mut features = Vec::new();

    for structure in &lesion.invasion {
        let category = invasion_category(*structure);
        features.push((
            category,
            Evidence::from_tumor(
                format!("Invasion of the {}: {}", structure.label(), category),
                format!("{}.invasion", path),
            )
            .with_quote(lesion.quote.as_deref()),
        ));
    }

    if let Some(extent) = lesion.atelectasis {
        if let Some(category) = atelectasis_category(extent) {
            features.push((
                category,
                Evidence::from_tumor(
                    format!(
                        "Atelectasis/obstructive pneumonitis {}: {}",
                        extent.label(),
                        category
                    ),
                    format!("{}.atelectasis", path),
                )
                .with_quote(lesion.quote.as_deref()),
            ));
        }
    }

    if let Some(tumor) = nodules.filter(|t| t.multifocality.routes_nodules()) {
        let kind = match tumor.multifocality {
            Multifocality::DiffusePneumonic => "Pneumonic-type involvement",
            _ => "Separate tumor nodule(s)",
        };
        for location in &tumor.separate_nodules {
            let (category, place) = match location {
                NoduleLocation::SameLobe => (TCategory::T3, "in the same lobe"),
                NoduleLocation::DifferentIpsilateralLobe => {
                    (TCategory::T4, "in a different ipsilateral lobe")
                }
                NoduleLocation::ContralateralLobe => continue,
            };
            features.push((
                category,
                Evidence::from_tumor(
                    format!("{} {}: {}", kind, place, category),
                    "separate_nodules",
                )
                .with_quote(tumor.nodule_quote.as_deref()),
            ));
        }
    }

    features
}

/// Stage one lesion: the maximum of its size band and its features.
fn stage_lesion(
    lesion: &Lesion,
    path: &str,
    nodules: Option<&TumorRecord>,
    context: Vec<Evidence>,
) -> Result<TStage, StagingError> {
    let size = size_category(lesion, path);
    let features = feature_categories(lesion, path, nodules);

    let category = size
        .iter()
        .map(|(category, _)| *category)
        .chain(features.iter().map(|(category, _)| *category))
        .max();

    let Some(category) = category else {
        debug!(path, "Lesion has no size or qualitative descriptor");
        return Ok(Classification::indeterminate(
            TCategory::TX,
            "Tumor size not reported and no qualitative T descriptor present",
        ));
    };

    let size_missing = size.is_none();
    let mut evidence: Vec<Evidence> = size.into_iter().map(|(_, e)| e).collect();
    evidence.extend(
        features
            .into_iter()
            .filter(|(c, _)| *c == category)
            .map(|(_, e)| e),
    );

    if size_missing && category < TCategory::T4 {
        evidence.push(
            Evidence::from_tumor(
                format!("Greatest dimension not reported; {} is a lower bound", category),
                format!("{}.greatest_dimension_mm", path),
            )
            .uncertain(),
        );
    }
    evidence.extend(context);

    Classification::supported(category, evidence)
}

fn highest_primary(primaries: &[TStage]) -> TStage {
    primaries
        .iter()
        .filter(|stage| !stage.is_indeterminate())
        .fold(None::<&TStage>, |best, stage| match best {
            Some(best) if best.category >= stage.category => Some(best),
            _ => Some(stage),
        })
        .cloned()
        .unwrap_or_else(|| {
            Classification::indeterminate(TCategory::TX, "No synchronous primary could be assessed")
        })
}

/// Most solid, then largest, lesion; the primary wins ties.
fn dominant_lesion(tumor: &TumorRecord) -> (String, &Lesion) {
    fn dominance(lesion: &Lesion) -> (f64, f64) {
        let total = lesion.greatest_dimension_mm.unwrap_or(0.0);
        let solid = lesion.subsolid_component().unwrap_or(total);
        (solid, total)
    }

    tumor
        .lesions()
        .skip(1)
        .fold(("primary".to_string(), &tumor.primary), |best, candidate| {
            if dominance(candidate.1) > dominance(best.1) {
                candidate
            } else {
                best
            }
        })
}

/// The T-Classifier.
pub struct TumorClassifier;

impl TumorClassifier {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TumorClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier for TumorClassifier {
    type Output = TumorClassification;

    fn component(&self) -> Component {
        Component::Tumor
    }

    fn classify(&self, request: &ClassificationRequest<'_>) -> Result<Self::Output, StagingError> {
        classify_tumor(request.findings.tumor.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::findings::{LesionDensity, Lobe};
    use crate::types::Confidence;

    fn solid_tumor(mm: f64) -> TumorRecord {
        TumorRecord {
            lobe: Some(Lobe::RightUpper),
            primary: Lesion {
                greatest_dimension_mm: Some(mm),
                density: Some(LesionDensity::Solid),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn subsolid_tumor(total: f64, solid: f64) -> TumorRecord {
        TumorRecord {
            laterality: Some(Laterality::Left),
            primary: Lesion {
                greatest_dimension_mm: Some(total),
                solid_component_mm: Some(solid),
                density: Some(LesionDensity::PartSolid),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn t_of(tumor: &TumorRecord) -> TCategory {
        classify_tumor(Some(tumor)).unwrap().stage.category
    }

    #[test]
    fn test_no_tumor_is_t0() {
        let result = classify_tumor(None).unwrap();
        assert_eq!(result.stage.category, TCategory::T0);
        assert_eq!(result.laterality, None);
    }

    #[test]
    fn test_empty_record_is_tx_with_reason() {
        let result = classify_tumor(Some(&TumorRecord::default())).unwrap();
        assert_eq!(result.stage.category, TCategory::TX);
        assert!(result.stage.evidence.is_empty());
        assert!(result.stage.indeterminate_reason.is_some());
    }

    #[test]
    fn test_solid_size_bands() {
        assert_eq!(t_of(&solid_tumor(8.0)), TCategory::T1a);
        assert_eq!(t_of(&solid_tumor(10.0)), TCategory::T1a);
        assert_eq!(t_of(&solid_tumor(15.0)), TCategory::T1b);
        assert_eq!(t_of(&solid_tumor(30.0)), TCategory::T1c);
        assert_eq!(t_of(&solid_tumor(38.0)), TCategory::T2a);
        assert_eq!(t_of(&solid_tumor(42.0)), TCategory::T2b);
        assert_eq!(t_of(&solid_tumor(65.0)), TCategory::T3);
        assert_eq!(t_of(&solid_tumor(71.0)), TCategory::T4);
    }

    #[test]
    fn test_laterality_comes_from_lobe() {
        let result = classify_tumor(Some(&solid_tumor(25.0))).unwrap();
        assert_eq!(result.laterality, Some(Laterality::Right));
    }

    #[test]
    fn test_subsolid_small_solid_component_is_t1mi() {
        assert_eq!(t_of(&subsolid_tumor(25.0, 4.0)), TCategory::T1mi);
    }

    #[test]
    fn test_subsolid_over_30mm_has_t1a_floor() {
        assert_eq!(t_of(&subsolid_tumor(35.0, 4.0)), TCategory::T1a);
    }

    #[test]
    fn test_subsolid_solid_component_bands_override_floor() {
        assert_eq!(t_of(&subsolid_tumor(35.0, 15.0)), TCategory::T1b);
        assert_eq!(t_of(&subsolid_tumor(40.0, 25.0)), TCategory::T1c);
        assert_eq!(t_of(&subsolid_tumor(28.0, 8.0)), TCategory::T1a);
    }

    #[test]
    fn test_pure_ground_glass_up_to_30mm_is_tis() {
        let tumor = TumorRecord {
            laterality: Some(Laterality::Right),
            primary: Lesion {
                greatest_dimension_mm: Some(22.0),
                density: Some(LesionDensity::GroundGlass),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(t_of(&tumor), TCategory::Tis);
    }

    #[test]
    fn test_visceral_pleural_invasion_promotes_small_tumor() {
        let mut tumor = solid_tumor(18.0);
        tumor.primary.invasion.insert(InvadedStructure::VisceralPleura);
        assert_eq!(t_of(&tumor), TCategory::T2a);
    }

    #[test]
    fn test_size_wins_when_higher_than_feature() {
        let mut tumor = solid_tumor(45.0);
        tumor.primary.invasion.insert(InvadedStructure::MainBronchus);

        let result = classify_tumor(Some(&tumor)).unwrap();
        assert_eq!(result.stage.category, TCategory::T2b);
        // Only the size evidence justifies T2b
        assert_eq!(result.stage.evidence.len(), 1);
    }

    #[test]
    fn test_invasion_and_size_take_maximum_not_sum() {
        let mut tumor = solid_tumor(38.0);
        tumor.primary.invasion.insert(InvadedStructure::ChestWall);
        tumor.primary.invasion.insert(InvadedStructure::VisceralPleura);
        assert_eq!(t_of(&tumor), TCategory::T3);
    }

    #[test]
    fn test_t4_invasion() {
        let mut tumor = solid_tumor(22.0);
        tumor.primary.invasion.insert(InvadedStructure::Carina);
        assert_eq!(t_of(&tumor), TCategory::T4);
    }

    #[test]
    fn test_atelectasis_to_hilum_is_t2a() {
        let mut tumor = solid_tumor(12.0);
        tumor.primary.atelectasis = Some(AtelectasisExtent::ExtendsToHilum);
        assert_eq!(t_of(&tumor), TCategory::T2a);

        tumor.primary.atelectasis = Some(AtelectasisExtent::Partial);
        assert_eq!(t_of(&tumor), TCategory::T1b);
    }

    #[test]
    fn test_whole_lung_atelectasis_claim() {
        let mut tumor = solid_tumor(12.0);
        tumor.primary.atelectasis = Some(AtelectasisExtent::WholeLung);

        let stage = classify_tumor(Some(&tumor)).unwrap().stage;
        assert_eq!(stage.category, TCategory::T2a);
        assert!(stage.evidence.iter().any(|e| e.claim
            == "Atelectasis/obstructive pneumonitis involving the whole lung: T2a"));
    }

    #[test]
    fn test_feature_without_size_is_lower_bound() {
        let tumor = TumorRecord {
            laterality: Some(Laterality::Right),
            primary: Lesion {
                invasion: [InvadedStructure::VisceralPleura].into_iter().collect(),
                ..Default::default()
            },
            ..Default::default()
        };

        let result = classify_tumor(Some(&tumor)).unwrap();
        assert_eq!(result.stage.category, TCategory::T2a);
        assert_eq!(result.stage.confidence, Confidence::Medium);
        assert!(result.stage.evidence.iter().any(|e| e.uncertain));
    }

    #[test]
    fn test_same_lobe_nodule_is_t3() {
        let mut tumor = solid_tumor(18.0);
        tumor.multifocality = Multifocality::SeparateNodules;
        tumor.separate_nodules.insert(NoduleLocation::SameLobe);
        assert_eq!(t_of(&tumor), TCategory::T3);
    }

    #[test]
    fn test_ipsilateral_different_lobe_nodule_is_t4() {
        let mut tumor = solid_tumor(18.0);
        tumor.multifocality = Multifocality::SeparateNodules;
        tumor.separate_nodules.insert(NoduleLocation::SameLobe);
        tumor
            .separate_nodules
            .insert(NoduleLocation::DifferentIpsilateralLobe);
        assert_eq!(t_of(&tumor), TCategory::T4);
    }

    #[test]
    fn test_contralateral_nodule_routed_to_m_not_t() {
        let mut tumor = solid_tumor(18.0);
        tumor.multifocality = Multifocality::SeparateNodules;
        tumor.separate_nodules.insert(NoduleLocation::ContralateralLobe);

        let result = classify_tumor(Some(&tumor)).unwrap();
        assert_eq!(result.stage.category, TCategory::T1b);
        assert_eq!(result.contralateral_nodules.len(), 1);

        let routing = route_tumor(Some(&tumor)).unwrap();
        assert_eq!(routing.contralateral_nodules, result.contralateral_nodules);
    }

    #[test]
    fn test_diffuse_pneumonic_pattern() {
        let mut tumor = solid_tumor(25.0);
        tumor.multifocality = Multifocality::DiffusePneumonic;
        tumor.separate_nodules.insert(NoduleLocation::SameLobe);
        let result = classify_tumor(Some(&tumor)).unwrap();
        assert_eq!(result.stage.category, TCategory::T3);
        assert!(result.stage.evidence[1].claim.starts_with("Pneumonic-type"));
    }

    #[test]
    fn test_synchronous_primaries_staged_independently() {
        let mut tumor = solid_tumor(18.0);
        tumor.multifocality = Multifocality::SynchronousPrimaries;
        tumor.additional_lesions.push(Lesion {
            lobe: Some(Lobe::LeftLower),
            greatest_dimension_mm: Some(36.0),
            ..Default::default()
        });
        // Nodule locations do not feed T for separate primaries
        tumor.separate_nodules.insert(NoduleLocation::ContralateralLobe);

        let result = classify_tumor(Some(&tumor)).unwrap();
        let categories: Vec<TCategory> = result.primaries.iter().map(|s| s.category).collect();
        assert_eq!(categories, vec![TCategory::T1b, TCategory::T2a]);
        assert_eq!(result.stage.category, TCategory::T2a);
        assert!(result.contralateral_nodules.is_empty());
    }

    #[test]
    fn test_multifocal_ground_glass_uses_dominant_lesion() {
        let tumor = TumorRecord {
            laterality: Some(Laterality::Right),
            multifocality: Multifocality::MultifocalGroundGlass,
            lesion_count: Some(4),
            primary: Lesion {
                greatest_dimension_mm: Some(24.0),
                density: Some(LesionDensity::GroundGlass),
                ..Default::default()
            },
            additional_lesions: vec![Lesion {
                greatest_dimension_mm: Some(18.0),
                solid_component_mm: Some(12.0),
                density: Some(LesionDensity::PartSolid),
                ..Default::default()
            }],
            ..Default::default()
        };

        let result = classify_tumor(Some(&tumor)).unwrap();
        assert_eq!(result.stage.category, TCategory::T1b);
        assert_eq!(result.multiplicity, Some(4));
        assert!(result.primaries.is_empty());
        assert_eq!(
            result.stage.evidence[0].pointer,
            "tumor.additional_lesions[0].greatest_dimension_mm"
        );
    }

    #[test]
    fn test_negative_dimension_is_validation_error() {
        let tumor = solid_tumor(-3.0);
        assert!(matches!(
            classify_tumor(Some(&tumor)),
            Err(StagingError::Validation(ValidationError::InvalidMeasurement { .. }))
        ));
    }

    #[test]
    fn test_lobe_laterality_conflict_is_validation_error() {
        let mut tumor = solid_tumor(20.0);
        tumor.laterality = Some(Laterality::Left);
        assert!(matches!(
            classify_tumor(Some(&tumor)),
            Err(StagingError::Validation(ValidationError::LobeLateralityMismatch { .. }))
        ));
    }
}
