//! Appointment slot allocation and the appointment lifecycle.
//!
//! Rules are pure functions over a [`SchedulingConfig`](crate::config::SchedulingConfig) and the
//! injected clock; the service composes them with the repositories, which enforce the
//! (agent, start) and one-pending-per-applicant constraints atomically.

pub mod allocator;
pub mod domain;
pub mod repository;
pub mod router;
pub mod rules;
pub mod service;

#[cfg(test)]
mod tests;

pub use allocator::{AgentSelectionPolicy, SlotAllocator};
pub use domain::{Appointment, AppointmentId, AppointmentStatus, AppointmentView};
pub use repository::AppointmentRepository;
pub use router::scheduling_router;
pub use rules::{days_until_start, validate_slot, SlotViolation};
pub use service::{LeadTimeOperation, SchedulingError, SchedulingService};
