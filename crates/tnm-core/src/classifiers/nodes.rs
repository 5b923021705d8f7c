//! N-Classifier
//!
//! **Question**: Which regional lymph node stations are involved, and on
//! which side?
//!
//! Station mapping depends on tumor laterality, so this classifier reads
//! the laterality resolved on the T side. Only positive stations count.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

use super::{ClassificationRequest, Classifier};
use crate::evidence::Evidence;
use crate::findings::{
    NodeAssessment, NodeLaterality, NodeRecord, NodeStation, NodeStatus, StationId,
    StationZone, ValidationError,
};
use crate::types::{Classification, Component, Laterality, NCategory, NStage};
use crate::StagingError;

/// Nodal class of a single station relative to the tumor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodalClass {
    /// Ipsilateral hilar/intrapulmonary
    N1,
    /// Ipsilateral mediastinal or subcarinal
    N2,
    /// Contralateral or supraclavicular
    N3,
}

impl fmt::Display for NodalClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// IASLC station map, keyed by canonical station id.
const RIGHT_TUMOR_STATIONS: &[(&str, NodalClass)] = &[
    ("1", NodalClass::N3),
    ("1R", NodalClass::N3),
    ("1L", NodalClass::N3),
    ("2R", NodalClass::N2),
    ("3A", NodalClass::N2),
    ("3AR", NodalClass::N2),
    ("3P", NodalClass::N2),
    ("3PR", NodalClass::N2),
    ("4R", NodalClass::N2),
    ("7", NodalClass::N2),
    ("8R", NodalClass::N2),
    ("9R", NodalClass::N2),
    ("2L", NodalClass::N3),
    ("3AL", NodalClass::N3),
    ("3PL", NodalClass::N3),
    ("4L", NodalClass::N3),
    ("5", NodalClass::N3),
    ("6", NodalClass::N3),
    ("8L", NodalClass::N3),
    ("9L", NodalClass::N3),
    ("10L", NodalClass::N3),
    ("11L", NodalClass::N3),
    ("12L", NodalClass::N3),
    ("13L", NodalClass::N3),
    ("14L", NodalClass::N3),
    ("10R", NodalClass::N1),
    ("11R", NodalClass::N1),
    ("12R", NodalClass::N1),
    ("13R", NodalClass::N1),
    ("14R", NodalClass::N1),
];

const LEFT_TUMOR_STATIONS: &[(&str, NodalClass)] = &[
    ("1", NodalClass::N3),
    ("1R", NodalClass::N3),
    ("1L", NodalClass::N3),
    ("2L", NodalClass::N2),
    ("3A", NodalClass::N2),
    ("3AL", NodalClass::N2),
    ("3P", NodalClass::N2),
    ("3PL", NodalClass::N2),
    ("4L", NodalClass::N2),
    ("5", NodalClass::N2),
    ("6", NodalClass::N2),
    ("7", NodalClass::N2),
    ("8L", NodalClass::N2),
    ("9L", NodalClass::N2),
    ("2R", NodalClass::N3),
    ("3AR", NodalClass::N3),
    ("3PR", NodalClass::N3),
    ("4R", NodalClass::N3),
    ("8R", NodalClass::N3),
    ("9R", NodalClass::N3),
    ("10R", NodalClass::N3),
    ("11R", NodalClass::N3),
    ("12R", NodalClass::N3),
    ("13R", NodalClass::N3),
    ("14R", NodalClass::N3),
    ("10L", NodalClass::N1),
    ("11L", NodalClass::N1),
    ("12L", NodalClass::N1),
    ("13L", NodalClass::N1),
    ("14L", NodalClass::N1),
];

/// Nodal class of a station for a tumor on the given side.
///
/// `None` when the station needs a side qualifier it does not carry.
pub fn station_category(station: &StationId, tumor: Laterality) -> Option<NodalClass> {
    let table = match tumor {
        Laterality::Right => RIGHT_TUMOR_STATIONS,
        Laterality::Left => LEFT_TUMOR_STATIONS,
    };
    let key = station.to_string();
    table
        .iter()
        .find(|(id, _)| *id == key)
        .map(|(_, class)| *class)
}

/// Side a station sits on without an explicit qualifier.
///
/// Stations 5 and 6 lie beside the aortic arch on the left.
fn anatomic_side(station: &StationId) -> Option<Laterality> {
    station.side().or_else(|| {
        matches!(station.level(), 5 | 6).then_some(Laterality::Left)
    })
}

/// Apply the declared laterality to a station entry.
fn resolve_station(entry: &NodeStation, tumor: Laterality) -> Result<StationId, ValidationError> {
    let station = &entry.station;

    if station.requires_side() {
        return match entry.laterality {
            Some(NodeLaterality::Ipsilateral) => Ok(station.with_side(tumor)),
            Some(NodeLaterality::Contralateral) => Ok(station.with_side(tumor.opposite())),
            Some(NodeLaterality::Midline) => Err(ValidationError::MidlineStation(station.to_string())),
            None => Err(ValidationError::MissingStationLaterality(station.to_string())),
        };
    }

    match (anatomic_side(station), entry.laterality) {
        (Some(side), Some(declared)) if declared != NodeLaterality::Midline => {
            let expected = if side == tumor {
                NodeLaterality::Ipsilateral
            } else {
                NodeLaterality::Contralateral
            };
            if declared != expected {
                return Err(ValidationError::StationLateralityConflict {
                    station: station.to_string(),
                    declared,
                    expected,
                    tumor,
                });
            }
            Ok(station.clone())
        }
        (Some(_), Some(NodeLaterality::Midline)) if station.side().is_some() => {
            Err(ValidationError::MidlineStation(station.to_string()))
        }
        // 3A/3P are N2 unless placed on the contralateral side.
        (None, Some(NodeLaterality::Ipsilateral)) if station.level() == 3 => {
            Ok(station.with_side(tumor))
        }
        (None, Some(NodeLaterality::Contralateral)) if station.level() == 3 => {
            Ok(station.with_side(tumor.opposite()))
        }
        _ => Ok(station.clone()),
    }
}

/// Nodal class of a station entry when the tumor side is unknown.
///
/// `Ok(None)` when the class depends on the tumor side.
fn side_independent_class(entry: &NodeStation) -> Result<Option<NodalClass>, ValidationError> {
    let station = &entry.station;

    if station.zone() == StationZone::Supraclavicular {
        return Ok(Some(NodalClass::N3));
    }

    match entry.laterality {
        Some(NodeLaterality::Contralateral) => Ok(Some(NodalClass::N3)),
        Some(NodeLaterality::Ipsilateral) => Ok(Some(match station.zone() {
            StationZone::Hilar => NodalClass::N1,
            _ => NodalClass::N2,
        })),
        Some(NodeLaterality::Midline) if station.requires_side() || station.side().is_some() => {
            Err(ValidationError::MidlineStation(station.to_string()))
        }
        // Unsided 3A/3P and subcarinal 7 are N2 for either tumor side.
        _ if station.side().is_none() && matches!(station.level(), 3 | 7) => {
            Ok(Some(NodalClass::N2))
        }
        _ => Ok(None),
    }
}

fn station_claim(station: &StationId, entry: &NodeStation, class: NodalClass) -> String {
    let status = match entry.status {
        NodeStatus::Involved => "involved",
        NodeStatus::FdgAvid => "FDG-avid",
        NodeStatus::Pathologic => "pathologic",
        NodeStatus::Mentioned => "mentioned",
    };

    let mut details = Vec::new();
    if let Some(suv) = entry.suv_max {
        details.push(format!("SUVmax {}", suv));
    }
    if let Some(size) = entry.short_axis_mm {
        details.push(format!("short axis {} mm", size));
    }

    if details.is_empty() {
        format!("Station {} {}: {}", station, status, class)
    } else {
        format!("Station {} {} ({}): {}", station, status, details.join(", "), class)
    }
}

/// A positive station with its nodal class and the evidence citing it.
struct StationHit {
    class: NodalClass,
    station: StationId,
    evidence: Evidence,
}

fn station_hit(
    station: StationId,
    entry: &NodeStation,
    index: usize,
    class: NodalClass,
) -> StationHit {
    let evidence = Evidence::from_station(station_claim(&station, entry, class), index)
        .with_quote(entry.quote.as_deref());
    StationHit {
        class,
        station,
        evidence,
    }
}

/// N category from classified stations, with the evidence for the highest class.
///
/// Stations are counted once per anatomic station: `3A` and `3AR` for a right
/// tumor are the same station.
fn categorize(hits: Vec<StationHit>) -> Option<(NCategory, NodalClass, Vec<Evidence>)> {
    let highest = hits.iter().map(|hit| hit.class).max()?;

    let distinct: BTreeSet<(NodalClass, StationId)> = hits
        .iter()
        .map(|hit| (hit.class, hit.station.unsided()))
        .collect();

    let category = match highest {
        NodalClass::N3 => NCategory::N3,
        NodalClass::N2 => {
            let n2_stations = distinct
                .iter()
                .filter(|(class, _)| *class == NodalClass::N2)
                .count();
            if n2_stations > 1 {
                NCategory::N2b
            } else {
                NCategory::N2a
            }
        }
        NodalClass::N1 => NCategory::N1,
    };

    let evidence = hits
        .into_iter()
        .filter(|hit| hit.class == highest)
        .map(|hit| hit.evidence)
        .collect();

    Some((category, highest, evidence))
}

/// Classify regional lymph nodes.
///
/// `laterality` is the tumor side resolved by the T-Classifier.
pub fn classify_nodes(
    record: &NodeRecord,
    laterality: Option<Laterality>,
) -> Result<NStage, StagingError> {
    record.validate()?;

    let positives: Vec<(usize, &NodeStation)> = record
        .stations
        .iter()
        .enumerate()
        .filter(|(_, entry)| entry.status.is_positive())
        .collect();

    if positives.is_empty() {
        return Ok(match record.assessment {
            NodeAssessment::Performed => Classification::supported(
                NCategory::N0,
                vec![Evidence::from_nodes(
                    "Nodal staging performed; no involved station reported",
                    "assessment",
                )],
            )?,
            NodeAssessment::NotPerformed => {
                Classification::indeterminate(NCategory::NX, "Nodal assessment not performed")
            }
            NodeAssessment::Inconclusive => {
                Classification::indeterminate(NCategory::NX, "Nodal assessment inconclusive")
            }
        });
    }

    let Some(tumor) = laterality else {
        return classify_without_tumor_side(&positives);
    };

    let mut hits = Vec::with_capacity(positives.len());
    for (index, entry) in positives {
        let station = resolve_station(entry, tumor)?;
        let class = station_category(&station, tumor)
            .ok_or_else(|| ValidationError::UnknownStation(station.to_string()))?;
        hits.push(station_hit(station, entry, index, class));
    }

    let stations = hits.len();
    let Some((category, _, evidence)) = categorize(hits) else {
        return Ok(Classification::indeterminate(
            NCategory::NX,
            "No involved station could be classified",
        ));
    };

    debug!(
        category = %category,
        stations,
        tumor = %tumor,
        "N-Classifier complete"
    );

    Classification::supported(category, evidence)
}

/// Classify positive stations when the tumor side is unknown.
///
/// Stations whose class does not depend on the tumor side are staged
/// directly. Any other station leaves N indeterminate unless the known
/// stations already reach N3.
fn classify_without_tumor_side(
    positives: &[(usize, &NodeStation)],
) -> Result<NStage, StagingError> {
    let mut hits = Vec::new();
    let mut unresolved = Vec::new();

    for (index, entry) in positives {
        match side_independent_class(entry)? {
            Some(class) => hits.push(station_hit(entry.station.clone(), entry, *index, class)),
            None => unresolved.push(entry.station.to_string()),
        }
    }

    let known = categorize(hits);

    debug!(
        category = ?known.as_ref().map(|(category, _, _)| *category),
        unresolved = unresolved.len(),
        "N-Classifier complete without tumor side"
    );

    match known {
        Some((category, NodalClass::N3, evidence)) => Classification::supported(category, evidence),
        Some((category, _, evidence)) if unresolved.is_empty() => {
            Classification::supported(category, evidence)
        }
        _ => Ok(Classification::indeterminate(
            NCategory::NX,
            format!(
                "Tumor laterality unknown; station(s) {} cannot be assigned a side",
                unresolved.join(", ")
            ),
        )),
    }
}

/// The N-Classifier.
pub struct NodeClassifier;

impl NodeClassifier {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NodeClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier for NodeClassifier {
    type Output = NStage;

    fn component(&self) -> Component {
        Component::Nodes
    }

    fn classify(&self, request: &ClassificationRequest<'_>) -> Result<Self::Output, StagingError> {
        classify_nodes(&request.findings.nodes, request.routing.laterality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn station(id: &str) -> NodeStation {
        NodeStation {
            station: id.parse().unwrap(),
            laterality: None,
            status: NodeStatus::FdgAvid,
            short_axis_mm: None,
            suv_max: None,
            quote: None,
        }
    }

    fn declared(id: &str, laterality: NodeLaterality) -> NodeStation {
        NodeStation {
            laterality: Some(laterality),
            ..station(id)
        }
    }

    fn performed(stations: Vec<NodeStation>) -> NodeRecord {
        NodeRecord {
            assessment: NodeAssessment::Performed,
            stations,
        }
    }

    fn n_of(stations: Vec<NodeStation>, tumor: Laterality) -> NCategory {
        classify_nodes(&performed(stations), Some(tumor))
            .unwrap()
            .category
    }

    #[test]
    fn test_ipsilateral_hilar_is_n1() {
        assert_eq!(n_of(vec![station("10R")], Laterality::Right), NCategory::N1);
        assert_eq!(n_of(vec![station("11L")], Laterality::Left), NCategory::N1);
    }

    #[test]
    fn test_single_mediastinal_station_is_n2a() {
        assert_eq!(n_of(vec![station("4R")], Laterality::Right), NCategory::N2a);
        assert_eq!(n_of(vec![station("7")], Laterality::Left), NCategory::N2a);
    }

    #[test]
    fn test_multiple_mediastinal_stations_are_n2b() {
        let result = classify_nodes(
            &performed(vec![station("4R"), station("2R"), station("10R")]),
            Some(Laterality::Right),
        )
        .unwrap();
        assert_eq!(result.category, NCategory::N2b);
        // Only the N2 stations justify N2b
        assert_eq!(result.evidence.len(), 2);
        assert_eq!(result.evidence[0].pointer, "nodes.stations[0]");
    }

    #[test]
    fn test_repeated_station_counts_once() {
        assert_eq!(
            n_of(vec![station("4R"), station("4r")], Laterality::Right),
            NCategory::N2a
        );
    }

    #[test]
    fn test_contralateral_mediastinal_is_n3() {
        assert_eq!(n_of(vec![station("4L")], Laterality::Right), NCategory::N3);
        assert_eq!(n_of(vec![station("2R")], Laterality::Left), NCategory::N3);
    }

    #[test]
    fn test_supraclavicular_is_n3_either_side() {
        assert_eq!(n_of(vec![station("1")], Laterality::Right), NCategory::N3);
        assert_eq!(n_of(vec![station("1L")], Laterality::Left), NCategory::N3);
    }

    #[test]
    fn test_aortopulmonary_stations_follow_tumor_side() {
        assert_eq!(n_of(vec![station("5")], Laterality::Left), NCategory::N2a);
        assert_eq!(n_of(vec![station("6")], Laterality::Right), NCategory::N3);
    }

    #[test]
    fn test_unsided_station_uses_declared_laterality() {
        assert_eq!(
            n_of(vec![declared("11", NodeLaterality::Ipsilateral)], Laterality::Right),
            NCategory::N1
        );
        assert_eq!(
            n_of(vec![declared("4", NodeLaterality::Contralateral)], Laterality::Right),
            NCategory::N3
        );
        assert_eq!(
            n_of(vec![declared("3A", NodeLaterality::Contralateral)], Laterality::Left),
            NCategory::N3
        );
    }

    #[test]
    fn test_unsided_station_without_laterality_fails() {
        let result = classify_nodes(&performed(vec![station("10")]), Some(Laterality::Left));
        assert!(matches!(
            result,
            Err(StagingError::Validation(ValidationError::MissingStationLaterality(_)))
        ));
    }

    #[test]
    fn test_declared_laterality_conflict_fails() {
        let result = classify_nodes(
            &performed(vec![declared("4R", NodeLaterality::Contralateral)]),
            Some(Laterality::Right),
        );
        assert!(matches!(
            result,
            Err(StagingError::Validation(ValidationError::StationLateralityConflict { .. }))
        ));
    }

    #[test]
    fn test_midline_sided_station_fails() {
        let result = classify_nodes(
            &performed(vec![declared("4R", NodeLaterality::Midline)]),
            Some(Laterality::Right),
        );
        assert!(matches!(
            result,
            Err(StagingError::Validation(ValidationError::MidlineStation(_)))
        ));
    }

    #[test]
    fn test_mentioned_stations_are_ignored() {
        let mut mentioned = station("4L");
        mentioned.status = NodeStatus::Mentioned;
        assert_eq!(
            n_of(vec![mentioned, station("10R")], Laterality::Right),
            NCategory::N1
        );
    }

    #[test]
    fn test_no_positive_station_after_assessment_is_n0() {
        let result = classify_nodes(&performed(vec![]), Some(Laterality::Right)).unwrap();
        assert_eq!(result.category, NCategory::N0);
        assert!(!result.evidence.is_empty());
    }

    #[test]
    fn test_no_assessment_is_nx() {
        let result = classify_nodes(&NodeRecord::default(), Some(Laterality::Right)).unwrap();
        assert_eq!(result.category, NCategory::NX);
        assert_eq!(
            result.indeterminate_reason.as_deref(),
            Some("Nodal assessment not performed")
        );

        let inconclusive = NodeRecord {
            assessment: NodeAssessment::Inconclusive,
            stations: vec![],
        };
        let result = classify_nodes(&inconclusive, None).unwrap();
        assert_eq!(result.category, NCategory::NX);
    }

    #[test]
    fn test_unknown_tumor_side() {
        let result = classify_nodes(&performed(vec![station("4R")]), None).unwrap();
        assert_eq!(result.category, NCategory::NX);

        let result =
            classify_nodes(&performed(vec![station("4R"), station("1R")]), None).unwrap();
        assert_eq!(result.category, NCategory::N3);
        assert_eq!(result.evidence.len(), 1);
    }

    #[test]
    fn test_side_independent_stations_without_tumor_side() {
        let n_unknown = |stations| classify_nodes(&performed(stations), None).unwrap();

        let subcarinal = n_unknown(vec![station("7")]);
        assert_eq!(subcarinal.category, NCategory::N2a);
        assert_eq!(subcarinal.evidence.len(), 1);

        assert_eq!(
            n_unknown(vec![station("3A"), station("7")]).category,
            NCategory::N2b
        );
        assert_eq!(
            n_unknown(vec![declared("10L", NodeLaterality::Contralateral)]).category,
            NCategory::N3
        );
        assert_eq!(
            n_unknown(vec![declared("11", NodeLaterality::Ipsilateral)]).category,
            NCategory::N1
        );
    }

    #[test]
    fn test_side_dependent_station_leaves_n_open() {
        // 4R could be N2 or N3, so N2a from station 7 is not final.
        let result =
            classify_nodes(&performed(vec![station("7"), station("4R")]), None).unwrap();
        assert_eq!(result.category, NCategory::NX);
        assert_eq!(
            result.indeterminate_reason.as_deref(),
            Some("Tumor laterality unknown; station(s) 4R cannot be assigned a side")
        );

        // Nothing can exceed N3.
        let result = classify_nodes(
            &performed(vec![declared("4L", NodeLaterality::Contralateral), station("10R")]),
            None,
        )
        .unwrap();
        assert_eq!(result.category, NCategory::N3);
    }

    #[test]
    fn test_station_three_counts_once_whatever_its_qualifier() {
        assert_eq!(
            n_of(
                vec![station("3A"), declared("3A", NodeLaterality::Ipsilateral)],
                Laterality::Right
            ),
            NCategory::N2a
        );
        assert_eq!(
            n_of(vec![station("3A"), station("3AR")], Laterality::Right),
            NCategory::N2a
        );
        // Anterior and posterior compartments are distinct stations.
        assert_eq!(
            n_of(vec![station("3A"), station("3P")], Laterality::Left),
            NCategory::N2b
        );
    }

    #[test]
    fn test_contralateral_hilar_is_n3() {
        let result =
            classify_nodes(&performed(vec![station("10L")]), Some(Laterality::Right)).unwrap();
        assert_eq!(result.category, NCategory::N3);
        assert_eq!(result.evidence[0].claim, "Station 10L FDG-avid: N3");
    }

    #[test]
    fn test_aortopulmonary_declaration_must_match_tumor_side() {
        let result = classify_nodes(
            &performed(vec![declared("5", NodeLaterality::Contralateral)]),
            Some(Laterality::Left),
        );
        assert!(matches!(
            result,
            Err(StagingError::Validation(ValidationError::StationLateralityConflict { .. }))
        ));
        assert_eq!(
            n_of(vec![declared("6", NodeLaterality::Contralateral)], Laterality::Right),
            NCategory::N3
        );
    }

    #[test]
    fn test_claim_includes_measurements() {
        let mut entry = station("4R");
        entry.suv_max = Some(8.2);
        entry.short_axis_mm = Some(15.0);
        let result = classify_nodes(&performed(vec![entry]), Some(Laterality::Right)).unwrap();
        assert_eq!(
            result.evidence[0].claim,
            "Station 4R FDG-avid (SUVmax 8.2, short axis 15 mm): N2"
        );
    }

    #[test]
    fn test_every_sided_station_is_mapped() {
        for level in 1..=14u8 {
            for suffix in ["", "R", "L", "AR", "AL", "PR", "PL", "A", "P"] {
                let Ok(id) = format!("{}{}", level, suffix).parse::<StationId>() else {
                    continue;
                };
                if id.requires_side() {
                    continue;
                }
                assert!(station_category(&id, Laterality::Right).is_some(), "{}", id);
                assert!(station_category(&id, Laterality::Left).is_some(), "{}", id);
            }
        }
    }
}
