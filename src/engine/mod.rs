/// Site access policy engine
///
/// This module decides, at any instant, whether access to a named site
/// is permitted:
/// - Recurring weekday/weekend blocking schedules
/// - Per-site weekly time budgets, advanced as sessions end
/// - At most one tracked session per site, auto-closed by a guard timer
/// - Time-limited educational override grants
/// - An administrator-triggered emergency block

pub mod clock;
pub mod config;
pub mod enforce;
pub mod overrides;
pub mod policy;
pub mod session;
pub mod site;
pub mod usage;

pub use config::{ConfigPatch, PolicyConfig};
pub use enforce::{EnforcementSink, NotifySink};
pub use policy::{BlockReason, Decision, PolicyEngine};
pub use site::canonical_site;
