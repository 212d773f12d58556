pub mod dashboard;

// One screen: CPU meters and per-core bars, RAM/swap gauges, and an optional
// process panel, with a help overlay on '?'.

pub use dashboard::{Dashboard, ViewState};
