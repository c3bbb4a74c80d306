//! Admission control
//!
//! The pure decision functions (priority classification, waitlist ranking,
//! swap selection) plus the transactional controller that orchestrates them.
//! The pure functions only ever see data read inside the controller's active
//! transaction; they perform no I/O themselves.

pub mod controller;
pub mod priority;
pub mod ranker;
pub mod swap;

pub use controller::{AdmissionController, AdmissionOutcome};
pub use priority::{is_prioritized, PriorityProfile, STRIKE_VETO_THRESHOLD};
pub use ranker::{position_of, rank_waitlist, RankedEntry};
pub use swap::find_swap_target;
