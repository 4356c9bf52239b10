//! Resolution driven by the `installations` config category

use std::path::PathBuf;

use farm_core::config::CATEGORY_INSTALLATIONS;
use farm_core::MemoryConfigStore;
use install_resolver::{platform_default, InstallationResolver, StaticDiscovery};
use serde_json::json;

#[test]
fn test_config_listed_versions_resolve() {
    let store = MemoryConfigStore::new().with(
        CATEGORY_INSTALLATIONS,
        "Python",
        json!({ "2.7": "/opt/py27", "3.7": "/opt/py37", "3.10": "/opt/py310" }),
    );
    let resolver = InstallationResolver::new(
        "Python",
        StaticDiscovery::from_config(&store, "Python").unwrap(),
    );

    assert_eq!(resolver.resolve(Some("3.9")), Some(PathBuf::from("/opt/py310")));
    assert_eq!(resolver.resolve(Some("2.7")), Some(PathBuf::from("/opt/py27")));
    assert_eq!(resolver.resolve(None), Some(PathBuf::from("/opt/py310")));
}

#[cfg(not(target_os = "windows"))]
#[test]
fn test_platform_default_without_config_is_empty() {
    let store = MemoryConfigStore::new();
    let resolver = InstallationResolver::new("Python", platform_default(&store, "Python").unwrap());
    assert_eq!(resolver.resolve(None), None);
}
