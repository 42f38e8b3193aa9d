//! Classifier trait and the standard processor registry.

pub mod prefix;
pub mod sdcard;

pub use prefix::PrefixCsi;
pub use sdcard::SdcardCsi;

use std::path::Path;
use std::sync::Arc;

use reclaim_core::{AreaInfo, AreaSnapshot, AreaType};

/// A classifier owning one or more area types.
///
/// Implementations must only claim paths inside areas whose type they
/// have jurisdiction over.
pub trait CsiProcessor: Send + Sync {
    /// Short name used in logs and conflict reports.
    fn name(&self) -> &str;

    /// Whether this processor owns areas of `area_type`.
    fn has_jurisdiction(&self, area_type: AreaType) -> bool;

    /// Resolve `target` against the areas of `snapshot` this processor
    /// owns.
    fn identify_area(&self, target: &Path, snapshot: &AreaSnapshot) -> Option<AreaInfo>;
}

/// One processor per [`AreaType`].
///
/// `Sdcard` gets the nesting-aware [`SdcardCsi`]. The public storage
/// roots protect their `.nomedia` marker and the system data areas
/// protect the `users` registry.
pub fn default_processors() -> Vec<Arc<dyn CsiProcessor>> {
    AreaType::ALL
        .iter()
        .map(|&area_type| -> Arc<dyn CsiProcessor> {
            match area_type {
                AreaType::Sdcard => Arc::new(SdcardCsi::new()),
                AreaType::PublicData | AreaType::PublicObb | AreaType::PublicMedia => {
                    Arc::new(PrefixCsi::new(area_type).with_protected(".nomedia"))
                }
                AreaType::DataSystem | AreaType::DataSystemCe | AreaType::DataSystemDe => {
                    Arc::new(PrefixCsi::new(area_type).with_protected("users"))
                }
                other => Arc::new(PrefixCsi::new(other)),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_covers_every_type_exactly_once() {
        let processors = default_processors();
        for area_type in AreaType::ALL {
            let owners = processors
                .iter()
                .filter(|p| p.has_jurisdiction(area_type))
                .count();
            assert_eq!(owners, 1, "{area_type} must have exactly one owner");
        }
    }
}
