//! Fault Taxonomy
//!
//! Faults fall into four categories with different blast radii:
//!
//! - **Transient input faults** (unreadable frame, empty detection) are
//!   absorbed where they occur: the tick proceeds as "no target". They
//!   never surface as error values.
//! - **Device faults** ([`crate::backend::BackendError`]) are reported
//!   by the dispatcher and survived; reconnection is external.
//! - **Config faults** ([`crate::config::ConfigError`]) are rejected at
//!   the load/swap boundary; the previous snapshot stays active.
//! - **Fatal faults** ([`PipelineError::Fatal`]) are the only category
//!   allowed to take the pipeline down, and the shutdown path still
//!   releases held buttons on the way out.

use thiserror::Error;

use crate::config::ConfigError;

/// Top-level pipeline fault.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A configuration was rejected at a boundary
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An unrecoverable internal fault
    #[error("fatal pipeline fault: {0}")]
    Fatal(String),
}
