//! Errors raised while loading and validating findings.

use thiserror::Error;

use super::parser::{Lobe, NodeLaterality};
use crate::types::Laterality;

/// Malformed or internally inconsistent findings.
///
/// These abort the staging request before any classifier runs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{field} must be a finite, non-negative measurement (got {value})")]
    InvalidMeasurement { field: String, value: f64 },

    #[error("{field} must be greater than zero")]
    ZeroDimension { field: String },

    #[error("{field}: solid component ({solid} mm) exceeds greatest dimension ({total} mm)")]
    SolidExceedsTotal { field: String, solid: f64, total: f64 },

    #[error("Invalid laterality '{0}': expected 'left' or 'right'")]
    InvalidLaterality(String),

    #[error("Lobe {lobe} contradicts {laterality} tumor laterality")]
    LobeLateralityMismatch { lobe: Lobe, laterality: Laterality },

    #[error("Unknown IASLC station '{0}'")]
    UnknownStation(String),

    #[error("Station {station} is declared {declared} but is {expected} to a {tumor} tumor")]
    StationLateralityConflict {
        station: String,
        declared: NodeLaterality,
        expected: NodeLaterality,
        tumor: Laterality,
    },

    #[error("Station {0} has no side qualifier and no declared laterality")]
    MissingStationLaterality(String),

    #[error("Station {0} cannot be midline")]
    MidlineStation(String),

    #[error("{field} must be at least 1")]
    ZeroCount { field: String },
}

/// Errors that can occur when loading a findings document.
#[derive(Error, Debug)]
pub enum FindingsError {
    #[error("Failed to read findings file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Findings do not match schema: {}", .0.join("; "))]
    SchemaError(Vec<String>),

    #[error("Findings validation failed: {0}")]
    Validation(#[from] ValidationError),
}
