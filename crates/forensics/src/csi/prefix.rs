//! Prefix-matching processor for a single area type.

use std::path::{Path, PathBuf};

use reclaim_core::{AreaFlag, AreaInfo, AreaSnapshot, AreaType};

use super::CsiProcessor;

/// Claims paths lying below any area of one type.
///
/// A path is protected when its area carries [`AreaFlag::Blacklisted`]
/// or when its relative path starts with one of the configured protected
/// prefixes. If more than one area of the type contains the path
/// (nested areas of the same type) nothing is claimed. A path inside a
/// deeper area of another type (`/system/app` within `/system`) belongs
/// to that area's processor.
#[derive(Debug, Clone)]
pub struct PrefixCsi {
    name: String,
    area_type: AreaType,
    protected: Vec<PathBuf>,
}

impl PrefixCsi {
    /// Processor for areas of `area_type`.
    pub fn new(area_type: AreaType) -> Self {
        Self {
            name: format!("csi.{}", area_type.as_str().to_ascii_lowercase()),
            area_type,
            protected: Vec::new(),
        }
    }

    /// Mark paths whose relative path starts with `relative` protected.
    pub fn with_protected(mut self, relative: impl Into<PathBuf>) -> Self {
        self.protected.push(relative.into());
        self
    }

    /// The single area type this processor owns.
    pub fn area_type(&self) -> AreaType {
        self.area_type
    }

    fn is_protected_relative(&self, relative: &Path) -> bool {
        self.protected.iter().any(|p| relative.starts_with(p))
    }
}

impl CsiProcessor for PrefixCsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn has_jurisdiction(&self, area_type: AreaType) -> bool {
        area_type == self.area_type
    }

    fn identify_area(&self, target: &Path, snapshot: &AreaSnapshot) -> Option<AreaInfo> {
        let mut owners = snapshot.of_type(self.area_type).filter(|a| a.contains(target));
        let owner = owners.next()?;
        if owners.next().is_some() {
            tracing::warn!(
                processor = %self.name,
                path = %target.display(),
                "Path lies in nested areas of the same type, not claiming it",
            );
            return None;
        }

        let in_deeper_area = snapshot.areas().iter().any(|a| {
            a.area_type() != self.area_type
                && a.path() != owner.path()
                && a.path().starts_with(owner.path())
                && target.starts_with(a.path())
        });
        if in_deeper_area {
            return None;
        }

        let relative = target.strip_prefix(owner.path()).ok()?;
        let is_protected =
            owner.has_flag(AreaFlag::Blacklisted) || self.is_protected_relative(relative);
        AreaInfo::new(owner.clone(), target, is_protected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reclaim_core::Area;

    fn snapshot(areas: Vec<Area>) -> AreaSnapshot {
        AreaSnapshot::from_areas(0, areas)
    }

    #[test]
    fn claims_paths_below_own_type() {
        let csi = PrefixCsi::new(AreaType::DataSystemCe);
        let snap = snapshot(vec![
            Area::new(AreaType::DataSystemCe, "/data/system_ce/0").unwrap(),
            Area::new(AreaType::DataSystemDe, "/data/system_de/0").unwrap(),
        ]);

        let info = csi
            .identify_area(Path::new("/data/system_ce/0/shortcut_service/x.xml"), &snap)
            .unwrap();
        assert_eq!(info.area.area_type(), AreaType::DataSystemCe);
        assert_eq!(info.prefix, "/data/system_ce/0/");
        assert!(!info.is_protected);

        assert!(csi
            .identify_area(Path::new("/data/system_de/0/x"), &snap)
            .is_none());
    }

    #[test]
    fn blacklisted_area_marks_protected() {
        let csi = PrefixCsi::new(AreaType::PrivateData);
        let snap = snapshot(vec![Area::new(AreaType::PrivateData, "/data/data")
            .unwrap()
            .with_flag(AreaFlag::Blacklisted)]);

        let info = csi
            .identify_area(Path::new("/data/data/com.example/cache"), &snap)
            .unwrap();
        assert!(info.is_protected);
    }

    #[test]
    fn protected_relative_prefix() {
        let csi = PrefixCsi::new(AreaType::PublicData).with_protected(".nomedia");
        let snap = snapshot(vec![Area::new(
            AreaType::PublicData,
            "/storage/emulated/0/Android/data",
        )
        .unwrap()]);

        let nomedia = csi
            .identify_area(Path::new("/storage/emulated/0/Android/data/.nomedia"), &snap)
            .unwrap();
        assert!(nomedia.is_protected);

        let app = csi
            .identify_area(Path::new("/storage/emulated/0/Android/data/com.example"), &snap)
            .unwrap();
        assert!(!app.is_protected);
    }

    #[test]
    fn steps_aside_for_deeper_area_of_other_type() {
        let csi = PrefixCsi::new(AreaType::System);
        let snap = snapshot(vec![
            Area::new(AreaType::System, "/system").unwrap(),
            Area::new(AreaType::SystemApp, "/system/app").unwrap(),
        ]);

        assert!(csi
            .identify_area(Path::new("/system/app/Foo/Foo.apk"), &snap)
            .is_none());
        assert!(csi
            .identify_area(Path::new("/system/framework/x.jar"), &snap)
            .is_some());
    }

    #[test]
    fn nested_areas_of_same_type_are_not_claimed() {
        let csi = PrefixCsi::new(AreaType::PrivateData);
        let snap = snapshot(vec![
            Area::new(AreaType::PrivateData, "/data/user").unwrap(),
            Area::new(AreaType::PrivateData, "/data/user/0").unwrap(),
        ]);

        assert!(csi
            .identify_area(Path::new("/data/user/0/com.example"), &snap)
            .is_none());
        assert!(csi
            .identify_area(Path::new("/data/user/10/com.example"), &snap)
            .is_some());
    }
}
