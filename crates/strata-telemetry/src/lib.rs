//! Strata Telemetry - logging setup shared by the Strata binaries.
//!
//! # Example
//!
//! ```rust,no_run
//! use strata_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), strata_telemetry::TelemetryError> {
//! let config = LogConfig::from_verbosity(2)
//!     .with_format(LogFormat::Pretty)
//!     .with_directive("strata_config::merge=trace")
//!     .with_env_directives();
//!
//! setup_logging(&config)?;
//! tracing::info!("logging ready");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{LOG_ENV, LogConfig, LogFormat, setup_logging};
