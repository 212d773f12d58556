/// Default tuning for monitors and the consumer side
///
/// Values follow what the dashboard needs for a smooth sparkline at a
/// 60-second window without hammering the OS counters.

use std::time::Duration;

/// Application name used for the config directory and log file
pub const APP_NAME: &str = "pulsemon";

/// Environment variable holding the tracing filter
pub const LOG_ENV: &str = "PULSEMON_LOG";

pub const DEFAULT_CPU_INTERVAL: Duration = Duration::from_millis(200);
pub const DEFAULT_CPU_SMOOTHING: Duration = Duration::from_secs(1);
pub const DEFAULT_MEMORY_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_PROCESS_INTERVAL: Duration = Duration::from_millis(200);

/// Points kept for sparklines (60s of CPU history at the default interval)
pub const DEFAULT_HISTORY_LENGTH: usize = 300;

/// Snapshots buffered between two polls before the oldest is dropped
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// How often the UI drains the channels
pub const DEFAULT_POLL_CADENCE: Duration = Duration::from_millis(100);
