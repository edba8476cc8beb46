pub mod counters;
pub mod line_protocol;
pub mod reporter;
pub mod system;

pub use counters::{AuthOutcome, CounterSet, CounterSnapshot, HttpVerb, LatencyKind};
pub use reporter::{Reporter, ReporterConfig};
pub use system::HostSampler;
