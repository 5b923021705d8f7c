//! Clinical findings: the structured input record.
//!
//! Findings are produced by the upstream extraction stage, checked against
//! a JSON Schema, then validated for internal consistency before any
//! classifier sees them.

mod error;
mod parser;
mod schema;
mod station;

pub use error::{FindingsError, ValidationError};
pub use parser::{
    AtelectasisExtent, ClinicalFindings, Effusion, EffusionKind, InvadedStructure, Lesion,
    LesionDensity, Lobe, MetastasisRecord, MetastaticSite, Multifocality, NodeAssessment,
    NodeLaterality, NodeRecord, NodeStation, NodeStatus, NoduleLocation, OrganSystem, TumorRecord,
};
pub use schema::validate_findings_schema;
pub use station::{StationId, StationZone};
