//! Integration tests for path classification.
//!
//! Verifies prefix-boundary handling, jurisdiction exclusivity over a
//! realistic device layout, and the fail-safe path for overlapping
//! processors.

use std::path::Path;
use std::sync::Arc;

use assert_matches::assert_matches;
use reclaim_core::{Area, AreaFlag, AreaSnapshot, AreaType};
use reclaim_forensics::{
    default_processors, CsiProcessor, ForensicsError, JurisdictionResolver, PrefixCsi,
};

fn device_snapshot() -> AreaSnapshot {
    let areas = [
        (AreaType::Sdcard, "/storage/emulated/0"),
        (AreaType::PublicData, "/storage/emulated/0/Android/data"),
        (AreaType::PublicObb, "/storage/emulated/0/Android/obb"),
        (AreaType::PublicMedia, "/storage/emulated/0/Android/media"),
        (AreaType::PrivateData, "/data/user/0"),
        (AreaType::AppApp, "/data/app"),
        (AreaType::AppAppPrivate, "/data/app-private"),
        (AreaType::AppLib, "/data/app-lib"),
        (AreaType::DataSystem, "/data/system"),
        (AreaType::DataSystemCe, "/data/system_ce/0"),
        (AreaType::DataSystemDe, "/data/system_de/0"),
        (AreaType::DalvikDex, "/data/dalvik-cache"),
        (AreaType::DownloadCache, "/cache"),
        (AreaType::System, "/system"),
        (AreaType::SystemApp, "/system/app"),
        (AreaType::SystemPrivApp, "/system/priv-app"),
        (AreaType::Vendor, "/vendor"),
    ];
    AreaSnapshot::from_areas(
        1,
        areas
            .into_iter()
            .map(|(t, p)| Area::new(t, p).expect("valid test area")),
    )
}

// ---------------------------------------------------------------------------
// Test: classification correctness
// ---------------------------------------------------------------------------

#[test]
fn classifies_with_prefix_and_relative_suffix() {
    let resolver = JurisdictionResolver::new(default_processors());
    let snapshot = AreaSnapshot::from_areas(
        0,
        vec![Area::new(AreaType::AppAppPrivate, "/data/app-private").unwrap()],
    );

    let info = resolver
        .identify(Path::new("/data/app-private/cache/file.tmp"), &snapshot)
        .expect("path lies in the private app area");

    assert_eq!(info.area.area_type(), AreaType::AppAppPrivate);
    assert_eq!(info.prefix, "/data/app-private/");
    assert_eq!(info.relative_path(), Path::new("cache/file.tmp"));
    assert!(!info.is_protected);

    assert!(resolver
        .identify(Path::new("/data/app-private-other/x"), &snapshot)
        .is_none());
}

#[test]
fn unknown_locations_are_unclaimed() {
    let resolver = JurisdictionResolver::new(default_processors());
    let snapshot = device_snapshot();

    assert!(resolver.identify(Path::new("/proc/self/maps"), &snapshot).is_none());
    assert!(resolver.identify(Path::new("/data/system_ce/0"), &snapshot).is_none());
}

#[test]
fn parent_dir_segments_are_never_claimed() {
    let resolver = JurisdictionResolver::new(default_processors());
    let snapshot = device_snapshot();

    for raw in [
        "/data/app-private/../../system/framework/x.jar",
        "/data/app-private/cache/../file.tmp",
        "/storage/emulated/0/../../../vendor/lib/libfoo.so",
    ] {
        let target = Path::new(raw);
        assert!(resolver.identify(target, &snapshot).is_none(), "{raw}");
        assert_matches!(resolver.identify_checked(target, &snapshot), Ok(None));
    }

    // Plain `.` segments are harmless and still resolve.
    let info = resolver
        .identify(Path::new("/data/app-private/./cache/file.tmp"), &snapshot)
        .expect("path lies in the private app area");
    assert_eq!(info.relative_path(), Path::new("cache/file.tmp"));
}

#[test]
fn nested_public_areas_resolve_to_their_own_type() {
    let resolver = JurisdictionResolver::new(default_processors());
    let snapshot = device_snapshot();

    let data = resolver
        .identify(Path::new("/storage/emulated/0/Android/data/com.example/cache"), &snapshot)
        .unwrap();
    assert_eq!(data.area.area_type(), AreaType::PublicData);
    assert_eq!(data.segments(), vec!["com.example", "cache"]);

    let download = resolver
        .identify(Path::new("/storage/emulated/0/Download/a.apk"), &snapshot)
        .unwrap();
    assert_eq!(download.area.area_type(), AreaType::Sdcard);
}

#[test]
fn nested_area_roots_stay_unowned() {
    let resolver = JurisdictionResolver::new(default_processors());
    let snapshot = device_snapshot();

    for root in [
        "/storage/emulated/0/Android/obb",
        "/storage/emulated/0/Android/data",
        "/system/app",
    ] {
        assert!(resolver.identify(Path::new(root), &snapshot).is_none(), "{root}");
    }
}

#[test]
fn blacklisted_area_yields_protected_record() {
    let resolver = JurisdictionResolver::new(default_processors());
    let snapshot = AreaSnapshot::from_areas(
        0,
        vec![Area::new(AreaType::Vendor, "/vendor")
            .unwrap()
            .with_flag(AreaFlag::Blacklisted)],
    );

    let info = resolver
        .identify(Path::new("/vendor/lib/libfoo.so"), &snapshot)
        .unwrap();
    assert!(info.is_protected);
}

// ---------------------------------------------------------------------------
// Test: jurisdiction exclusivity
// ---------------------------------------------------------------------------

/// With the standard registry no path of a realistic layout is claimed by
/// more than one processor.
#[test]
fn at_most_one_processor_matches_any_path() {
    let processors = default_processors();
    let snapshot = device_snapshot();

    let probes = [
        "/storage/emulated/0/DCIM/x.jpg",
        "/storage/emulated/0/Android/data/a/b",
        "/storage/emulated/0/Android/obb/a.obb",
        "/storage/emulated/0/Android/media/a",
        "/storage/emulated/0/Android/other",
        "/data/user/0/com.example/cache/x",
        "/data/app/com.example-1/base.apk",
        "/data/app-private/x",
        "/data/app-lib/com.example/libx.so",
        "/data/system/packages.xml",
        "/data/system_ce/0/recent_tasks/1.xml",
        "/data/system_de/0/x",
        "/data/dalvik-cache/arm64/x.dex",
        "/cache/recovery/last_log",
        "/system/app/Foo/Foo.apk",
        "/system/priv-app/Bar/Bar.apk",
        "/system/framework/x.jar",
        "/vendor/etc/x",
    ];

    for probe in probes {
        let claims: Vec<&str> = processors
            .iter()
            .filter(|p| p.identify_area(Path::new(probe), &snapshot).is_some())
            .map(|p| p.name())
            .collect();
        assert!(claims.len() <= 1, "{probe} claimed by {claims:?}");
    }
}

/// Two processors with the same jurisdiction trigger the conflict
/// fail-safe instead of an arbitrary pick.
#[test]
fn overlapping_processors_fail_safe() {
    let processors: Vec<Arc<dyn CsiProcessor>> = vec![
        Arc::new(PrefixCsi::new(AreaType::DataSystemCe)),
        Arc::new(PrefixCsi::new(AreaType::DataSystemCe).with_protected("users")),
    ];
    let resolver = JurisdictionResolver::new(processors);
    let snapshot = device_snapshot();
    let path = Path::new("/data/system_ce/0/recent_tasks/1.xml");

    assert!(resolver.identify(path, &snapshot).is_none());
    assert_matches!(
        resolver.identify_checked(path, &snapshot),
        Err(ForensicsError::ClassificationConflict { processors, .. }) if processors.len() == 2
    );
}

/// Paths outside the overlapping jurisdiction still resolve normally.
#[test]
fn conflict_is_scoped_to_contested_paths() {
    let mut processors = default_processors();
    processors.push(Arc::new(PrefixCsi::new(AreaType::Vendor)));
    let resolver = JurisdictionResolver::new(processors);
    let snapshot = device_snapshot();

    assert!(resolver.identify(Path::new("/vendor/etc/x"), &snapshot).is_none());
    assert_matches!(
        resolver.identify_checked(Path::new("/data/system/packages.xml"), &snapshot),
        Ok(Some(info)) if info.area.area_type() == AreaType::DataSystem
    );
}
