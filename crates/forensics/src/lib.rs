//! Path ownership classification.
//!
//! Classifiers ("CSI processors") each claim jurisdiction over one or
//! more area types. The [`JurisdictionResolver`] asks them in turn which
//! area owns a path; jurisdictions are disjoint, so a second match is a
//! configuration defect and never a tie to break.
//!
//! The resolver never suspends: it works on an already computed
//! [`AreaSnapshot`](reclaim_core::AreaSnapshot).

pub mod csi;
pub mod resolver;

pub use csi::{default_processors, CsiProcessor, PrefixCsi, SdcardCsi};
pub use resolver::JurisdictionResolver;

use std::path::PathBuf;

/// Errors raised while classifying paths.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ForensicsError {
    #[error("Path {} is claimed by more than one processor: {}", .path.display(), .processors.join(", "))]
    ClassificationConflict {
        path: PathBuf,
        processors: Vec<String>,
    },
}
