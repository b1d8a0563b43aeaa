//! Process-wide logging setup shared by every binary and test harness.

/// Initialize tracing with the default settings.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(&tracing::LogSettings::from_env());
}

/// Tracing configuration (filters, output format).
pub mod tracing;
