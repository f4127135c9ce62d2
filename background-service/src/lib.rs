pub mod controller;
pub mod scheduler;

pub use controller::{
    CandidateOutcome, Collaborators, CycleReport, EngagementController, EngagementPolicy,
    SkipReason,
};
pub use scheduler::{CycleRunner, CycleScheduler, SchedulerState, StopHandle};
