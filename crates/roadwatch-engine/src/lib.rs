//! The incident lifecycle and moderation engine.
//!
//! [`Engine`] decides whether a report creates or attaches, whether an
//! interaction is accepted, and when an incident retires on negative reports.
//! [`Scheduler`] retires stale incidents on a timer. Both publish through a
//! best-effort [`Notifier`] onto a [`MessageBus`].

pub mod bus;
pub mod config;
pub mod event;
pub mod lifecycle;
pub mod notifier;
pub mod scheduler;

pub use bus::{BusError, MessageBus};
pub use config::EngineConfig;
pub use lifecycle::{Engine, InteractOutcome, ReportOutcome};
pub use notifier::Notifier;
pub use scheduler::Scheduler;
