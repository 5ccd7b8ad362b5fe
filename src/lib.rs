// Library surface for headless/integration tests and reuse.
// Keep this lean to avoid coupling to bin-only types in main.rs.
pub mod config;
pub mod delay;
pub mod error;
pub mod metrics;
pub mod report;
pub mod runtime;
pub mod session;
pub mod submit;
pub mod trial;

/// Tick granularity of the app loop; bounds how late a stimulus onset can
/// be observed after its deadline.
pub const TICK_RATE_MS: u64 = 50;
