//! Alert and incident lifecycles.
//!
//! Both are finite state machines whose states are persisted on the entity.
//! Writes are last-write-wins; a failed write leaves the stored entity as it
//! was. Standard actions always follow the transition table. Direct status
//! writes follow the configured [`TransitionPolicy`].

pub mod alert;
pub mod incident;

pub use alert::{AlertAction, AlertLifecycle, NewAlert};
pub use incident::{IncidentLifecycle, NewIncident};
pub use watchpost_core::config::TransitionPolicy;
