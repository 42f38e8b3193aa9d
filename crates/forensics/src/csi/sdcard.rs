//! Shared-storage root processor.
//!
//! The sdcard root contains other areas (`Android/data`, `Android/obb`,
//! `Android/media`). Paths inside those belong to their own processors,
//! so this one steps aside for them to keep jurisdictions disjoint.

use std::path::Path;

use reclaim_core::{AreaInfo, AreaSnapshot, AreaType};

use super::{CsiProcessor, PrefixCsi};

#[derive(Debug, Clone)]
pub struct SdcardCsi {
    inner: PrefixCsi,
}

impl SdcardCsi {
    /// Processor for the shared storage root.
    pub fn new() -> Self {
        Self {
            inner: PrefixCsi::new(AreaType::Sdcard).with_protected("Android"),
        }
    }
}

impl Default for SdcardCsi {
    fn default() -> Self {
        Self::new()
    }
}

impl CsiProcessor for SdcardCsi {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn has_jurisdiction(&self, area_type: AreaType) -> bool {
        self.inner.has_jurisdiction(area_type)
    }

    fn identify_area(&self, target: &Path, snapshot: &AreaSnapshot) -> Option<AreaInfo> {
        let in_nested_area = snapshot
            .areas()
            .iter()
            .filter(|a| a.area_type() != AreaType::Sdcard)
            .any(|a| target.starts_with(a.path()));
        if in_nested_area {
            return None;
        }
        self.inner.identify_area(target, snapshot)
    }
}
