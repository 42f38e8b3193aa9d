//! Ownership records produced by path classification.

use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use std::sync::Arc;

use serde::Serialize;

use crate::area::Area;

/// The result of resolving one path to the area that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AreaInfo {
    /// Owning area, shared with the snapshot that produced it.
    pub area: Arc<Area>,
    /// The classified path.
    pub target_path: PathBuf,
    /// Area path plus separator; stripping it from `target_path` yields
    /// the relative path.
    pub prefix: String,
    /// Advisory: exclude from automated deletion.
    pub is_protected: bool,
}

impl AreaInfo {
    /// Build an ownership record, or `None` when `target` does not lie
    /// strictly below `area`.
    pub fn new(area: Arc<Area>, target: &Path, is_protected: bool) -> Option<Self> {
        if !area.contains(target) {
            return None;
        }
        let prefix = area_prefix(area.path());
        Some(Self {
            area,
            target_path: target.to_path_buf(),
            prefix,
            is_protected,
        })
    }

    /// `target_path` with the area prefix removed.
    pub fn relative_path(&self) -> &Path {
        self.target_path
            .strip_prefix(self.area.path())
            .unwrap_or(&self.target_path)
    }

    /// Components of the relative path as strings.
    pub fn segments(&self) -> Vec<String> {
        self.relative_path()
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect()
    }
}

fn area_prefix(path: &Path) -> String {
    let mut prefix = path.to_string_lossy().into_owned();
    if !prefix.ends_with(MAIN_SEPARATOR) {
        prefix.push(MAIN_SEPARATOR);
    }
    prefix
}
