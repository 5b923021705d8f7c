//! Findings model and parsing from YAML/JSON.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::Path;

use super::error::{FindingsError, ValidationError};
use super::schema::validate_findings_schema;
use super::station::StationId;
use crate::types::{Laterality, StagingPrefix};

/// Pulmonary lobe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lobe {
    RightUpper,
    RightMiddle,
    RightLower,
    LeftUpper,
    LeftLower,
}

impl Lobe {
    pub fn laterality(&self) -> Laterality {
        match self {
            Lobe::RightUpper | Lobe::RightMiddle | Lobe::RightLower => Laterality::Right,
            Lobe::LeftUpper | Lobe::LeftLower => Laterality::Left,
        }
    }
}

impl fmt::Display for Lobe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Lobe::RightUpper => "right upper lobe",
            Lobe::RightMiddle => "right middle lobe",
            Lobe::RightLower => "right lower lobe",
            Lobe::LeftUpper => "left upper lobe",
            Lobe::LeftLower => "left lower lobe",
        };
        f.write_str(name)
    }
}

/// CT attenuation of a lesion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LesionDensity {
    Solid,
    PartSolid,
    GroundGlass,
}

/// Structures the primary tumor invades or involves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvadedStructure {
    VisceralPleura,
    AdjacentLobe,
    MainBronchus,
    ParietalPleura,
    ChestWall,
    PhrenicNerve,
    ParietalPericardium,
    AzygosVein,
    Diaphragm,
    Mediastinum,
    Heart,
    GreatVessels,
    Trachea,
    Carina,
    RecurrentLaryngealNerve,
    Esophagus,
    VertebralBody,
    BrachialPlexus,
}

impl InvadedStructure {
    pub fn label(&self) -> &'static str {
        match self {
            InvadedStructure::VisceralPleura => "visceral pleura",
            InvadedStructure::AdjacentLobe => "adjacent lobe",
            InvadedStructure::MainBronchus => "main bronchus",
            InvadedStructure::ParietalPleura => "parietal pleura",
            InvadedStructure::ChestWall => "chest wall",
            InvadedStructure::PhrenicNerve => "phrenic nerve",
            InvadedStructure::ParietalPericardium => "parietal pericardium",
            InvadedStructure::AzygosVein => "azygos vein",
            InvadedStructure::Diaphragm => "diaphragm",
            InvadedStructure::Mediastinum => "mediastinum",
            InvadedStructure::Heart => "heart",
            InvadedStructure::GreatVessels => "great vessels",
            InvadedStructure::Trachea => "trachea",
            InvadedStructure::Carina => "carina",
            InvadedStructure::RecurrentLaryngealNerve => "recurrent laryngeal nerve",
            InvadedStructure::Esophagus => "esophagus",
            InvadedStructure::VertebralBody => "vertebral body",
            InvadedStructure::BrachialPlexus => "brachial plexus",
        }
    }
}

/// Extent of associated atelectasis or obstructive pneumonitis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AtelectasisExtent {
    /// Confined, not reaching the hilum
    Partial,
    ExtendsToHilum,
    WholeLung,
}

impl AtelectasisExtent {
    pub fn label(&self) -> &'static str {
        match self {
            AtelectasisExtent::Partial => "confined, not reaching the hilum",
            AtelectasisExtent::ExtendsToHilum => "extending to the hilum",
            AtelectasisExtent::WholeLung => "involving the whole lung",
        }
    }
}

/// Location of a separate tumor nodule relative to the primary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoduleLocation {
    SameLobe,
    DifferentIpsilateralLobe,
    ContralateralLobe,
}

/// Pattern of multiple pulmonary lesions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Multifocality {
    /// A single primary lesion
    #[default]
    #[serde(rename = "none")]
    Solitary,
    SynchronousPrimaries,
    SeparateNodules,
    MultifocalGroundGlass,
    DiffusePneumonic,
}

impl Multifocality {
    /// Whether separate-nodule locations feed T (same/ipsilateral) and M
    /// (contralateral) for this pattern.
    pub fn routes_nodules(&self) -> bool {
        matches!(
            self,
            Multifocality::Solitary | Multifocality::SeparateNodules | Multifocality::DiffusePneumonic
        )
    }
}

/// A single pulmonary lesion.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Lesion {
    #[serde(default)]
    pub lobe: Option<Lobe>,

    /// Greatest dimension of the whole lesion, in millimeters
    #[serde(default)]
    pub greatest_dimension_mm: Option<f64>,

    /// Greatest dimension of the solid component, in millimeters
    #[serde(default)]
    pub solid_component_mm: Option<f64>,

    #[serde(default)]
    pub density: Option<LesionDensity>,

    #[serde(default)]
    pub invasion: BTreeSet<InvadedStructure>,

    #[serde(default)]
    pub atelectasis: Option<AtelectasisExtent>,

    #[serde(default)]
    pub quote: Option<String>,
}

impl Lesion {
    /// Ground-glass or part-solid lesion sized by its solid component.
    ///
    /// A pure ground-glass lesion has an implied solid component of zero.
    pub fn subsolid_component(&self) -> Option<f64> {
        match self.density {
            Some(LesionDensity::GroundGlass) => Some(self.solid_component_mm.unwrap_or(0.0)),
            Some(LesionDensity::PartSolid) => self.solid_component_mm,
            _ => None,
        }
    }

    fn validate(&self, path: &str) -> Result<(), ValidationError> {
        if let Some(total) = self.greatest_dimension_mm {
            let field = format!("{}.greatest_dimension_mm", path);
            check_measurement(&field, total)?;
            if total == 0.0 {
                return Err(ValidationError::ZeroDimension { field });
            }
        }

        if let Some(solid) = self.solid_component_mm {
            check_measurement(&format!("{}.solid_component_mm", path), solid)?;
            if let Some(total) = self.greatest_dimension_mm {
                if solid > total {
                    return Err(ValidationError::SolidExceedsTotal {
                        field: path.to_string(),
                        solid,
                        total,
                    });
                }
            }
        }

        Ok(())
    }
}

/// Tumor section of the findings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TumorRecord {
    #[serde(default)]
    pub laterality: Option<Laterality>,

    #[serde(default)]
    pub lobe: Option<Lobe>,

    /// The primary (or dominant reported) lesion
    #[serde(default)]
    pub primary: Lesion,

    #[serde(default)]
    pub separate_nodules: BTreeSet<NoduleLocation>,

    #[serde(default)]
    pub nodule_quote: Option<String>,

    #[serde(default)]
    pub multifocality: Multifocality,

    /// Total number of lesions reported
    #[serde(default)]
    pub lesion_count: Option<u32>,

    /// Other primaries or ground-glass foci
    #[serde(default)]
    pub additional_lesions: Vec<Lesion>,
}

impl TumorRecord {
    /// Tumor laterality from the explicit field or the lobe.
    ///
    /// Fails when the sources disagree.
    pub fn resolved_laterality(&self) -> Result<Option<Laterality>, ValidationError> {
        let mut resolved = self.laterality;

        for lobe in [self.lobe, self.primary.lobe].into_iter().flatten() {
            match resolved {
                Some(laterality) if laterality != lobe.laterality() => {
                    return Err(ValidationError::LobeLateralityMismatch { lobe, laterality });
                }
                _ => resolved = Some(lobe.laterality()),
            }
        }

        Ok(resolved)
    }

    /// The primary followed by any additional lesions, with their paths.
    pub fn lesions(&self) -> impl Iterator<Item = (String, &Lesion)> + '_ {
        std::iter::once(("primary".to_string(), &self.primary)).chain(
            self.additional_lesions
                .iter()
                .enumerate()
                .map(|(i, lesion)| (format!("additional_lesions[{}]", i), lesion)),
        )
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        for (path, lesion) in self.lesions() {
            lesion.validate(&format!("tumor.{}", path))?;
        }

        if self.lesion_count == Some(0) {
            return Err(ValidationError::ZeroCount {
                field: "tumor.lesion_count".to_string(),
            });
        }

        self.resolved_laterality()?;
        Ok(())
    }
}

/// Whether nodal staging was performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeAssessment {
    Performed,
    #[default]
    NotPerformed,
    Inconclusive,
}

/// Node position relative to the primary tumor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeLaterality {
    Ipsilateral,
    Contralateral,
    Midline,
}

impl fmt::Display for NodeLaterality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeLaterality::Ipsilateral => "ipsilateral",
            NodeLaterality::Contralateral => "contralateral",
            NodeLaterality::Midline => "midline",
        };
        f.write_str(name)
    }
}

/// What the report says about a station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Involved,
    FdgAvid,
    Pathologic,
    /// Named without any positivity marker
    #[default]
    Mentioned,
}

impl NodeStatus {
    pub fn is_positive(&self) -> bool {
        !matches!(self, NodeStatus::Mentioned)
    }
}

/// A lymph node station entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeStation {
    pub station: StationId,

    #[serde(default)]
    pub laterality: Option<NodeLaterality>,

    #[serde(default)]
    pub status: NodeStatus,

    #[serde(default)]
    pub short_axis_mm: Option<f64>,

    #[serde(default)]
    pub suv_max: Option<f64>,

    #[serde(default)]
    pub quote: Option<String>,
}

/// Node section of the findings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeRecord {
    #[serde(default)]
    pub assessment: NodeAssessment,

    #[serde(default)]
    pub stations: Vec<NodeStation>,
}

impl NodeRecord {
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (i, entry) in self.stations.iter().enumerate() {
            if let Some(size) = entry.short_axis_mm {
                check_measurement(&format!("nodes.stations[{}].short_axis_mm", i), size)?;
            }
            if let Some(suv) = entry.suv_max {
                check_measurement(&format!("nodes.stations[{}].suv_max", i), suv)?;
            }
        }
        Ok(())
    }
}

/// Organ system of a metastatic site.
///
/// An organ system is counted as one unit however many sites it holds;
/// paired organs count once for both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrganSystem {
    Pleura,
    Pericardium,
    Skeletal,
    Liver,
    Adrenal,
    CentralNervousSystem,
    Kidney,
    DistantLymphNodes,
    Peritoneum,
    Spleen,
    Pancreas,
    SoftTissue,
    Skin,
    Gastrointestinal,
}

impl OrganSystem {
    /// Pleural and pericardial disease stays within the thorax (M1a).
    pub fn is_intrathoracic(&self) -> bool {
        matches!(self, OrganSystem::Pleura | OrganSystem::Pericardium)
    }

    pub fn label(&self) -> &'static str {
        match self {
            OrganSystem::Pleura => "pleura",
            OrganSystem::Pericardium => "pericardium",
            OrganSystem::Skeletal => "skeletal system",
            OrganSystem::Liver => "liver",
            OrganSystem::Adrenal => "adrenal glands",
            OrganSystem::CentralNervousSystem => "central nervous system",
            OrganSystem::Kidney => "kidneys",
            OrganSystem::DistantLymphNodes => "distant lymph nodes",
            OrganSystem::Peritoneum => "peritoneum",
            OrganSystem::Spleen => "spleen",
            OrganSystem::Pancreas => "pancreas",
            OrganSystem::SoftTissue => "soft tissue",
            OrganSystem::Skin => "skin",
            OrganSystem::Gastrointestinal => "gastrointestinal tract",
        }
    }
}

/// A metastatic site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetastaticSite {
    /// Site as described (e.g., "T8 vertebral body")
    pub site: String,

    /// `None` when the organ system cannot be determined
    #[serde(default)]
    pub organ_system: Option<OrganSystem>,

    #[serde(default)]
    pub laterality: Option<Laterality>,

    /// Number of lesions at this site
    #[serde(default = "default_site_count")]
    pub count: u32,

    #[serde(default)]
    pub quote: Option<String>,
}

fn default_site_count() -> u32 {
    1
}

/// Pleural or pericardial effusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffusionKind {
    Pleural,
    Pericardial,
}

/// An effusion and whether it is malignant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Effusion {
    pub kind: EffusionKind,

    #[serde(default)]
    pub laterality: Option<Laterality>,

    #[serde(default)]
    pub malignant: bool,

    #[serde(default)]
    pub quote: Option<String>,
}

/// Metastasis section of the findings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetastasisRecord {
    #[serde(default)]
    pub sites: Vec<MetastaticSite>,

    #[serde(default)]
    pub effusions: Vec<Effusion>,
}

impl MetastasisRecord {
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (i, site) in self.sites.iter().enumerate() {
            if site.count == 0 {
                return Err(ValidationError::ZeroCount {
                    field: format!("metastasis.sites[{}].count", i),
                });
            }
        }
        Ok(())
    }
}

/// Structured clinical findings for one report.
///
/// Produced by the extraction stage and read-only to every classifier.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClinicalFindings {
    #[serde(default)]
    pub report_id: Option<String>,

    #[serde(default)]
    pub patient_id: Option<String>,

    #[serde(default)]
    pub prefix: StagingPrefix,

    /// `None` when no primary tumor is described
    #[serde(default)]
    pub tumor: Option<TumorRecord>,

    #[serde(default)]
    pub nodes: NodeRecord,

    #[serde(default)]
    pub metastasis: MetastasisRecord,
}

impl ClinicalFindings {
    /// Parse findings from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, FindingsError> {
        let value: serde_json::Value = serde_yaml::from_str(yaml)?;
        Self::from_value(value)
    }

    /// Parse findings from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, FindingsError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Parse findings from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, FindingsError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse findings from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, FindingsError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Check the document against the schema, deserialize, then validate.
    pub fn from_value(value: serde_json::Value) -> Result<Self, FindingsError> {
        validate_findings_schema(&value).map_err(FindingsError::SchemaError)?;
        let findings: ClinicalFindings = serde_json::from_value(value)?;
        findings.validate()?;
        Ok(findings)
    }

    /// Reject malformed or internally inconsistent findings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(tumor) = &self.tumor {
            tumor.validate()?;
        }
        self.nodes.validate()?;
        self.metastasis.validate()?;
        Ok(())
    }
}

fn check_measurement(field: &str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ValidationError::InvalidMeasurement {
            field: field.to_string(),
            value,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_FINDINGS: &str = r#"
report_id: "PET-2024-0117"
tumor:
  lobe: right_upper
  primary:
    greatest_dimension_mm: 42
    density: solid
    quote: "spiculated mass in the right upper lobe measuring 42 mm"
nodes:
  assessment: performed
  stations:
    - station: "10R"
      status: fdg_avid
      suv_max: 6.1
metastasis: {}
"#;

    #[test]
    fn test_parse_valid_findings() {
        let findings = ClinicalFindings::from_yaml(VALID_FINDINGS).unwrap();
        let tumor = findings.tumor.as_ref().unwrap();

        assert_eq!(findings.report_id.as_deref(), Some("PET-2024-0117"));
        assert_eq!(tumor.primary.greatest_dimension_mm, Some(42.0));
        assert_eq!(tumor.resolved_laterality().unwrap(), Some(Laterality::Right));
        assert_eq!(findings.nodes.stations[0].station.to_string(), "10R");
        assert_eq!(findings.prefix, StagingPrefix::Clinical);
    }

    #[test]
    fn test_negative_dimension_rejected() {
        let yaml = r#"
tumor:
  primary:
    greatest_dimension_mm: -4
"#;
        let result = ClinicalFindings::from_yaml(yaml);
        assert!(result.is_err());
    }

    #[test]
    fn test_negative_dimension_rejected_by_semantic_validation() {
        let findings = ClinicalFindings {
            tumor: Some(TumorRecord {
                primary: Lesion {
                    greatest_dimension_mm: Some(-4.0),
                    ..Default::default()
                },
                ..Default::default()
            }),
            ..Default::default()
        };

        assert!(matches!(
            findings.validate(),
            Err(ValidationError::InvalidMeasurement { .. })
        ));
    }

    #[test]
    fn test_solid_component_larger_than_lesion_rejected() {
        let yaml = r#"
tumor:
  primary:
    greatest_dimension_mm: 12
    solid_component_mm: 18
    density: part_solid
"#;
        let result = ClinicalFindings::from_yaml(yaml);
        assert!(matches!(
            result,
            Err(FindingsError::Validation(ValidationError::SolidExceedsTotal { .. }))
        ));
    }

    #[test]
    fn test_lobe_laterality_mismatch_rejected() {
        let yaml = r#"
tumor:
  laterality: left
  lobe: right_lower
  primary:
    greatest_dimension_mm: 20
"#;
        let result = ClinicalFindings::from_yaml(yaml);
        assert!(matches!(
            result,
            Err(FindingsError::Validation(ValidationError::LobeLateralityMismatch { .. }))
        ));
    }

    #[test]
    fn test_malformed_laterality_rejected() {
        let yaml = r#"
tumor:
  laterality: center
  primary:
    greatest_dimension_mm: 20
"#;
        assert!(ClinicalFindings::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_zero_site_count_rejected() {
        let record = MetastasisRecord {
            sites: vec![MetastaticSite {
                site: "liver".to_string(),
                organ_system: Some(OrganSystem::Liver),
                laterality: None,
                count: 0,
                quote: None,
            }],
            effusions: vec![],
        };
        assert!(matches!(
            record.validate(),
            Err(ValidationError::ZeroCount { .. })
        ));
    }

    #[test]
    fn test_pure_ground_glass_has_zero_solid_component() {
        let lesion = Lesion {
            greatest_dimension_mm: Some(18.0),
            density: Some(LesionDensity::GroundGlass),
            ..Default::default()
        };
        assert_eq!(lesion.subsolid_component(), Some(0.0));

        let part_solid_without_measure = Lesion {
            density: Some(LesionDensity::PartSolid),
            ..lesion
        };
        assert_eq!(part_solid_without_measure.subsolid_component(), None);
    }

    #[test]
    fn test_multifocality_none_keyword() {
        let pattern: Multifocality = serde_json::from_str("\"none\"").unwrap();
        assert_eq!(pattern, Multifocality::Solitary);
        assert!(pattern.routes_nodules());
        assert!(!Multifocality::MultifocalGroundGlass.routes_nodules());
    }

    #[test]
    fn test_json_findings() {
        let json = r#"{
            "tumor": { "laterality": "left", "primary": { "greatest_dimension_mm": 9.5 } },
            "nodes": { "assessment": "performed" }
        }"#;
        let findings = ClinicalFindings::from_json(json).unwrap();
        assert_eq!(findings.nodes.assessment, NodeAssessment::Performed);
        assert!(findings.metastasis.sites.is_empty());
    }
}
