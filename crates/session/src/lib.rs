//! Attendance sessions for rollcall.
//!
//! [`SessionController`] owns one session per requester, drives the
//! NO_SESSION -> AWAITING_MODE -> ACTIVE state machine, applies matcher
//! output to the session's working snapshot and exports every committed
//! change. Every transition is recorded through the [`audit`] log.

pub mod apply;
pub mod audit;
pub mod controller;

pub use apply::apply_plan;
pub use audit::{AuditEntry, AuditEvent, AuditLogger, AuditOutcome, AuditSink, JsonLinesSink, TracingSink};
pub use controller::SessionController;
