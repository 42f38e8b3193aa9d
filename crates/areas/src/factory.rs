//! Area discovery strategies.
//!
//! Defines [`AreaFactory`], the trait every discovery module implements,
//! and [`StaticAreaFactory`], which serves a fixed table of areas.

use async_trait::async_trait;
use reclaim_core::{Area, AreaFlag, AreaType, CoreError};

/// Error raised by a factory during one recomputation pass.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct FactoryError(pub String);

impl From<CoreError> for FactoryError {
    fn from(err: CoreError) -> Self {
        Self(err.to_string())
    }
}

impl From<std::io::Error> for FactoryError {
    fn from(err: std::io::Error) -> Self {
        Self(format!("I/O error: {err}"))
    }
}

/// A discovery strategy producing zero or more areas for the running
/// device.
///
/// Factories hold no state between passes. They may suspend (platform
/// I/O) and are invoked concurrently within one pass.
#[async_trait]
pub trait AreaFactory: Send + Sync {
    /// Short name used in logs and error reports.
    fn name(&self) -> &str;

    /// Produce the areas this factory knows about.
    async fn build(&self) -> Result<Vec<Area>, FactoryError>;
}

// ---------------------------------------------------------------------------
// StaticAreaFactory
// ---------------------------------------------------------------------------

/// Serves a fixed table of areas.
#[derive(Debug, Clone, Default)]
pub struct StaticAreaFactory {
    areas: Vec<Area>,
}

impl StaticAreaFactory {
    /// Serve `areas` as given.
    pub fn new(areas: Vec<Area>) -> Self {
        Self { areas }
    }

    /// Parse a `TYPE=/abs/path[,TYPE=/abs/path...]` table.
    ///
    /// A `!` suffix on the type marks the area [`AreaFlag::Blacklisted`].
    /// Blank entries are ignored.
    pub fn parse(table: &str) -> Result<Self, CoreError> {
        let mut areas = Vec::new();
        for entry in table.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (raw_type, path) = entry.split_once('=').ok_or_else(|| {
                CoreError::Validation(format!("Area entry '{entry}' must look like TYPE=/path"))
            })?;

            let raw_type = raw_type.trim();
            let (raw_type, blacklisted) = match raw_type.strip_suffix('!') {
                Some(stripped) => (stripped, true),
                None => (raw_type, false),
            };

            let mut area = Area::new(raw_type.parse::<AreaType>()?, path.trim())?;
            if blacklisted {
                area = area.with_flag(AreaFlag::Blacklisted);
            }
            areas.push(area);
        }
        Ok(Self { areas })
    }

    /// The configured table.
    pub fn areas(&self) -> &[Area] {
        &self.areas
    }
}

#[async_trait]
impl AreaFactory for StaticAreaFactory {
    fn name(&self) -> &str {
        "static"
    }

    async fn build(&self) -> Result<Vec<Area>, FactoryError> {
        Ok(self.areas.clone())
    }
}
