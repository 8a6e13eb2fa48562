mod scheduler;
mod state;
mod tie;

use cohort_core::{ResourceId, ResourcePair, Timestamp};
use thiserror::Error;

pub use scheduler::{SnapshotScheduler, TemporalGraph, first_appearances};
pub use state::{GraphState, Partition};
pub use tie::TieStrengthModel;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("time step must be positive, got {0} minutes")]
    NonPositiveTimeStep(f64),
    #[error(
        "half-life is only defined for a decay value of 0.5, got {0}; \
         either set decay to 0.5 or provide explicit scale and threshold values"
    )]
    UndefinedHalfLife(f64),
    #[error(
        "period of total decay ({period_steps} steps) must be larger than \
         the period of stability ({offset_steps} steps)"
    )]
    OffsetBeyondDecayPeriod {
        offset_steps: f64,
        period_steps: f64,
    },
    #[error("edge between resources {} and {} should exist at {at} but does not", pair.first(), pair.second())]
    MissingEdge { pair: ResourcePair, at: Timestamp },
    #[error("resource {resource} interacts at {at} but never appeared as a node; is the run window missing its pop-up?")]
    MissingNode { resource: ResourceId, at: Timestamp },
    #[error(
        "resource {resource} has no work or collaboration activity and therefore no appearance time"
    )]
    MissingAppearance { resource: ResourceId },
}
