mod filter;
mod payload;
mod policy;
pub mod precedence;
mod risk;
mod severity;
mod validation;

pub use filter::{Filter, FilterKind};
pub use payload::{DatasetPayload, DatasetShape, ShapeError};
pub(crate) use payload::kind_name;
pub use policy::{GateAction, GateDecision, Policy};
pub use risk::{RiskItem, extend_unique_cves};
pub use severity::Severity;
pub use validation::{
    FixCategory, FixTelemetry, Issue, IssueCode, IssueLevel, Stats, ValidationResult,
};
