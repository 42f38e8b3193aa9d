//! Typed storage locations.
//!
//! An [`Area`] is immutable once built. Its identity is the pair
//! `(area_type, path)`; flags and the user handle are metadata.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// AreaType
// ---------------------------------------------------------------------------

/// The kind of storage location an [`Area`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AreaType {
    /// Shared external storage root (`/storage/emulated/0`).
    Sdcard,
    /// `Android/data` on shared storage.
    PublicData,
    /// `Android/obb` on shared storage.
    PublicObb,
    /// `Android/media` on shared storage.
    PublicMedia,
    /// Per-app private storage (`/data/data`, `/data/user/N`).
    PrivateData,
    /// Installed app packages (`/data/app`).
    AppApp,
    /// Forward-locked app packages (`/data/app-private`).
    AppAppPrivate,
    AppAsec,
    AppLib,
    DataSystem,
    DataSystemCe,
    DataSystemDe,
    DownloadCache,
    DalvikDex,
    DalvikProfile,
    System,
    SystemApp,
    SystemPrivApp,
    Oem,
    Vendor,
    /// Adoptable/portable secondary storage.
    Portable,
}

impl AreaType {
    pub const ALL: [AreaType; 21] = [
        AreaType::Sdcard,
        AreaType::PublicData,
        AreaType::PublicObb,
        AreaType::PublicMedia,
        AreaType::PrivateData,
        AreaType::AppApp,
        AreaType::AppAppPrivate,
        AreaType::AppAsec,
        AreaType::AppLib,
        AreaType::DataSystem,
        AreaType::DataSystemCe,
        AreaType::DataSystemDe,
        AreaType::DownloadCache,
        AreaType::DalvikDex,
        AreaType::DalvikProfile,
        AreaType::System,
        AreaType::SystemApp,
        AreaType::SystemPrivApp,
        AreaType::Oem,
        AreaType::Vendor,
        AreaType::Portable,
    ];

    /// Canonical SCREAMING_SNAKE name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sdcard => "SDCARD",
            Self::PublicData => "PUBLIC_DATA",
            Self::PublicObb => "PUBLIC_OBB",
            Self::PublicMedia => "PUBLIC_MEDIA",
            Self::PrivateData => "PRIVATE_DATA",
            Self::AppApp => "APP_APP",
            Self::AppAppPrivate => "APP_APP_PRIVATE",
            Self::AppAsec => "APP_ASEC",
            Self::AppLib => "APP_LIB",
            Self::DataSystem => "DATA_SYSTEM",
            Self::DataSystemCe => "DATA_SYSTEM_CE",
            Self::DataSystemDe => "DATA_SYSTEM_DE",
            Self::DownloadCache => "DOWNLOAD_CACHE",
            Self::DalvikDex => "DALVIK_DEX",
            Self::DalvikProfile => "DALVIK_PROFILE",
            Self::System => "SYSTEM",
            Self::SystemApp => "SYSTEM_APP",
            Self::SystemPrivApp => "SYSTEM_PRIV_APP",
            Self::Oem => "OEM",
            Self::Vendor => "VENDOR",
            Self::Portable => "PORTABLE",
        }
    }
}

impl fmt::Display for AreaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AreaType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| CoreError::UnknownVariant {
                kind: "area type",
                value: wanted.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// AreaFlag
// ---------------------------------------------------------------------------

/// Opaque metadata attached to an area by its factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaFlag {
    /// The primary instance of its type (e.g. the built-in sdcard).
    Primary,
    /// Backed by an emulated (FUSE/sdcardfs) filesystem.
    Emulated,
    /// Excluded from automated deletion.
    Blacklisted,
}

// ---------------------------------------------------------------------------
// Area
// ---------------------------------------------------------------------------

/// A logical, typed storage location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Area {
    area_type: AreaType,
    path: PathBuf,
    flags: BTreeSet<AreaFlag>,
    user_handle: Option<u32>,
}

impl Area {
    /// Build an area, normalizing `path`.
    ///
    /// The path must be absolute and must not contain `..` components.
    /// Trailing and repeated separators are removed.
    pub fn new(area_type: AreaType, path: impl AsRef<Path>) -> Result<Self, CoreError> {
        Ok(Self {
            area_type,
            path: normalize_path(path.as_ref())?,
            flags: BTreeSet::new(),
            user_handle: None,
        })
    }

    /// Add `flag` to the area.
    pub fn with_flag(mut self, flag: AreaFlag) -> Self {
        self.flags.insert(flag);
        self
    }

    /// Scope the area to one user profile.
    pub fn with_user(mut self, user_handle: u32) -> Self {
        self.user_handle = Some(user_handle);
        self
    }

    /// The kind of storage location.
    pub fn area_type(&self) -> AreaType {
        self.area_type
    }

    /// Normalized absolute path of the area root.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flags attached at discovery time.
    pub fn flags(&self) -> &BTreeSet<AreaFlag> {
        &self.flags
    }

    /// Whether `flag` is set.
    pub fn has_flag(&self, flag: AreaFlag) -> bool {
        self.flags.contains(&flag)
    }

    /// Owning user profile, if the area is per-user.
    pub fn user_handle(&self) -> Option<u32> {
        self.user_handle
    }

    /// The identity of this area inside a snapshot.
    pub fn key(&self) -> (AreaType, &Path) {
        (self.area_type, &self.path)
    }

    /// Whether `target` lies strictly below this area.
    ///
    /// Matching is component-wise, so `/data/app-private` does not
    /// contain `/data/app-private-extra`. The area root itself is not
    /// contained in the area.
    pub fn contains(&self, target: &Path) -> bool {
        target != self.path && target.starts_with(&self.path)
    }
}

impl fmt::Display for Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.area_type, self.path.display())
    }
}

fn normalize_path(path: &Path) -> Result<PathBuf, CoreError> {
    if path.as_os_str().is_empty() {
        return Err(CoreError::Validation("Area path must not be empty".into()));
    }
    if !path.has_root() {
        return Err(CoreError::Validation(format!(
            "Area path must be absolute: {}",
            path.display()
        )));
    }

    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(CoreError::Validation(format!(
                    "Area path must not contain '..': {}",
                    path.display()
                )));
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    Ok(normalized)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn trailing_separators_are_stripped() {
        let area = Area::new(AreaType::PrivateData, "/data/data///").unwrap();
        assert_eq!(area.path(), Path::new("/data/data"));
    }

    #[test]
    fn repeated_separators_collapse() {
        let area = Area::new(AreaType::AppApp, "/data//app/./").unwrap();
        assert_eq!(area.path(), Path::new("/data/app"));
    }

    #[test]
    fn root_stays_root() {
        let area = Area::new(AreaType::System, "/").unwrap();
        assert_eq!(area.path(), Path::new("/"));
    }

    #[test]
    fn relative_path_rejected() {
        assert_matches!(
            Area::new(AreaType::Sdcard, "storage/emulated/0"),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn empty_path_rejected() {
        assert_matches!(Area::new(AreaType::Sdcard, ""), Err(CoreError::Validation(_)));
    }

    #[test]
    fn parent_components_rejected() {
        assert_matches!(
            Area::new(AreaType::Sdcard, "/storage/../data"),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn contains_respects_component_boundary() {
        let area = Area::new(AreaType::AppAppPrivate, "/data/app-private").unwrap();
        assert!(area.contains(Path::new("/data/app-private/cache/file.tmp")));
        assert!(!area.contains(Path::new("/data/app-private-other/x")));
        assert!(!area.contains(Path::new("/data/app-private")));
    }

    #[test]
    fn area_type_parses_case_insensitively() {
        assert_eq!("data_system_ce".parse::<AreaType>().unwrap(), AreaType::DataSystemCe);
        assert_eq!("SDCARD".parse::<AreaType>().unwrap(), AreaType::Sdcard);
        assert_matches!(
            "FLOPPY".parse::<AreaType>(),
            Err(CoreError::UnknownVariant { kind: "area type", .. })
        );
    }

    #[test]
    fn area_type_display_matches_serde_spelling() {
        for area_type in AreaType::ALL {
            let json = serde_json::to_value(area_type).unwrap();
            assert_eq!(json, serde_json::Value::String(area_type.to_string()));
        }
    }

    #[test]
    fn flags_do_not_change_key() {
        let plain = Area::new(AreaType::Sdcard, "/storage/emulated/0").unwrap();
        let flagged = plain.clone().with_flag(AreaFlag::Primary).with_user(0);
        assert_eq!(plain.key(), flagged.key());
        assert!(flagged.has_flag(AreaFlag::Primary));
        assert_eq!(flagged.user_handle(), Some(0));
    }
}
