//! Subscriber installation for hosts
//!
//! A host calls [`init`] once at startup. `RUST_LOG` overrides the profile's
//! default filter when set.

use std::sync::Once;
use tracing_subscriber::{util::SubscriberInitExt, EnvFilter};

/// Output profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Human-readable lines, debug level for the fieldrev crates
    Development,
    /// JSON lines, info level
    Production,
    /// Registry only; pair with `init_test_capture()`
    Test,
}

impl Profile {
    /// Filter used when `RUST_LOG` is unset
    pub fn default_directives(&self) -> &'static str {
        match self {
            Profile::Development => "fieldrev_core=debug,fieldrev_store=debug,fieldrev_engine=debug",
            Profile::Production => "fieldrev_core=info,fieldrev_store=info,fieldrev_engine=info",
            Profile::Test => "off",
        }
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.default_directives()))
    }
}

static INIT: Once = Once::new();

/// Install the global subscriber for `profile`
///
/// Only the first call has an effect. If the host already installed its own
/// subscriber, that one is kept.
///
/// # Example
///
/// ```
/// use fieldrev_core::logging_facility::{init, Profile};
///
/// init(Profile::Development);
/// ```
pub fn init(profile: Profile) {
    INIT.call_once(|| {
        let installed = match profile {
            Profile::Development => tracing_subscriber::fmt()
                .with_env_filter(profile.filter())
                .finish()
                .try_init(),
            Profile::Production => tracing_subscriber::fmt()
                .json()
                .with_env_filter(profile.filter())
                .finish()
                .try_init(),
            Profile::Test => tracing_subscriber::registry().try_init(),
        };
        if installed.is_err() {
            tracing::debug!(profile = ?profile, "Global subscriber already set, kept");
        }
    });
}
