//! IASLC lymph node station identifiers.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::ValidationError;
use crate::types::Laterality;

lazy_static! {
    /// Level 1-14, an optional anterior/posterior qualifier, an optional side.
    static ref STATION_PATTERN: Regex = Regex::new(
        r"^(?P<level>1[0-4]|[1-9])(?P<sub>[AP])?(?P<side>[RL])?$"
    ).unwrap();
}

/// Anatomic zone of a station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StationZone {
    /// Level 1: low cervical, supraclavicular and sternal notch
    Supraclavicular,
    /// Levels 2-9: mediastinal and subcarinal
    Mediastinal,
    /// Levels 10-14: hilar, interlobar, lobar, segmental, subsegmental
    Hilar,
}

/// A parsed, canonical IASLC station id such as `4R`, `7`, `3AL` or `11`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StationId {
    level: u8,
    sub: Option<char>,
    side: Option<Laterality>,
}

impl StationId {
    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn side(&self) -> Option<Laterality> {
        self.side
    }

    pub fn zone(&self) -> StationZone {
        match self.level {
            1 => StationZone::Supraclavicular,
            2..=9 => StationZone::Mediastinal,
            _ => StationZone::Hilar,
        }
    }

    /// Whether a side must be supplied before the station can be mapped.
    ///
    /// Level 1 is N3 on either side, 3A/3P are N2 unless sided, 5 and 6 sit
    /// beside the aortic arch on the left, and 7 is subcarinal.
    pub fn requires_side(&self) -> bool {
        self.side.is_none() && !matches!(self.level, 1 | 3 | 5 | 6 | 7)
    }

    /// The same station with any side qualifier removed.
    pub fn unsided(&self) -> Self {
        Self {
            side: None,
            ..self.clone()
        }
    }

    /// The same station with the given side qualifier applied.
    pub fn with_side(&self, side: Laterality) -> Self {
        Self {
            side: Some(side),
            ..self.clone()
        }
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.level)?;
        if let Some(sub) = self.sub {
            write!(f, "{}", sub)?;
        }
        if let Some(side) = self.side {
            write!(f, "{}", side.side_code())?;
        }
        Ok(())
    }
}

impl FromStr for StationId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        let caps = STATION_PATTERN
            .captures(&normalized)
            .ok_or_else(|| ValidationError::UnknownStation(s.to_string()))?;

        let level: u8 = caps["level"]
            .parse()
            .map_err(|_| ValidationError::UnknownStation(s.to_string()))?;
        let sub = caps.name("sub").and_then(|m| m.as_str().chars().next());
        let side = caps.name("side").map(|m| match m.as_str() {
            "L" => Laterality::Left,
            _ => Laterality::Right,
        });

        // Only station 3 is split into anterior and posterior compartments.
        if sub.is_some() != (level == 3) {
            return Err(ValidationError::UnknownStation(s.to_string()));
        }
        // 5, 6 and 7 carry no side qualifier.
        if side.is_some() && matches!(level, 5 | 6 | 7) {
            return Err(ValidationError::UnknownStation(s.to_string()));
        }

        Ok(Self { level, sub, side })
    }
}

impl TryFrom<String> for StationId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StationId> for String {
    fn from(value: StationId) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sided_station() {
        let station: StationId = "4R".parse().unwrap();
        assert_eq!(station.level(), 4);
        assert_eq!(station.side(), Some(Laterality::Right));
        assert_eq!(station.zone(), StationZone::Mediastinal);
    }

    #[test]
    fn test_parse_normalizes_case_and_whitespace() {
        let station: StationId = " 10l ".parse().unwrap();
        assert_eq!(station.to_string(), "10L");
        assert_eq!(station.zone(), StationZone::Hilar);
    }

    #[test]
    fn test_parse_station_three_compartments() {
        assert_eq!("3a".parse::<StationId>().unwrap().to_string(), "3A");
        assert_eq!("3PR".parse::<StationId>().unwrap().to_string(), "3PR");
        assert!("3".parse::<StationId>().is_err());
        assert!("4A".parse::<StationId>().is_err());
    }

    #[test]
    fn test_rejects_unknown_stations() {
        assert!("15".parse::<StationId>().is_err());
        assert!("0".parse::<StationId>().is_err());
        assert!("7R".parse::<StationId>().is_err());
        assert!("paratracheal".parse::<StationId>().is_err());
    }

    #[test]
    fn test_unsided_hilar_station() {
        let station: StationId = "11".parse().unwrap();
        assert_eq!(station.side(), None);
        assert!(station.requires_side());
        assert!(!"7".parse::<StationId>().unwrap().requires_side());
        assert_eq!(station.with_side(Laterality::Left).to_string(), "11L");
    }

    #[test]
    fn test_unsided_drops_only_the_side() {
        let station: StationId = "3AR".parse().unwrap();
        assert_eq!(station.unsided().to_string(), "3A");
        assert_eq!(station.unsided(), "3A".parse().unwrap());
    }

    #[test]
    fn test_station_serde_uses_canonical_string() {
        let station: StationId = serde_json::from_str("\"2r\"").unwrap();
        assert_eq!(serde_json::to_value(&station).unwrap(), "2R");
        assert!(serde_json::from_str::<StationId>("\"16\"").is_err());
    }
}
