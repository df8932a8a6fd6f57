//! ## Logging Configuration
//!
//! This module sets up logging automatically at program startup using the `ctor` crate.
//! Logging behavior is controlled by the `DEBUG_FEATURE_PRUNE` environment variable:
//!
//! - **Disabled** (default): If the variable is unset, empty, or explicitly set to `"0"` or `"false"`,
//!   no subscriber is installed and the `tracing` events emitted by selectors and pipelines are discarded.
//! - **Enabled**: Any other value installs a formatting subscriber with a maximum level of `DEBUG`.
//!
//! ### Usage Example
//!
//! ```sh
//! export DEBUG_FEATURE_PRUNE=true
//! ```

use ctor::ctor;
use tracing::Level;

fn logging_disabled(value: Option<&str>) -> bool {
    value.map_or(true, |v| v == "0" || v == "false" || v.is_empty())
}

#[ctor]
fn set_debug_level() {
    let value = std::env::var("DEBUG_FEATURE_PRUNE").ok();
    if !logging_disabled(value.as_deref()) {
        // A host binary may already own the global subscriber.
        let _ = tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::logging_disabled;

    #[test]
    fn test_logging_toggle_values() {
        assert!(logging_disabled(None));
        assert!(logging_disabled(Some("")));
        assert!(logging_disabled(Some("0")));
        assert!(logging_disabled(Some("false")));
        assert!(!logging_disabled(Some("1")));
        assert!(!logging_disabled(Some("true")));
    }
}
