//! Replay catalog
//!
//! The built-in battery covers the addon, category, game and minecraft
//! endpoints of the CurseForge v2 API. A different catalog can be loaded from
//! a YAML or JSON file with the same entry shape.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;

use crate::models::TestDefinition;

/// On-disk catalog layout
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CatalogFile {
    pub tests: Vec<TestDefinition>,
}

/// The built-in catalog, in execution order
pub fn builtin() -> Vec<TestDefinition> {
    vec![
        // Addon
        TestDefinition::get("Get Addons Database Timestamp", "addon/timestamp"),
        TestDefinition::get(
            "Addon Search",
            format!(
                "addon/search?categoryId={}&gameId={}&gameVersion={}&index={}&pageSize={}&searchFilter={}&sectionId={}&sort={}",
                0, 432, "1.12.2", 0, 25, "ultimate", 4471, 0
            ),
        ),
        TestDefinition::get("Get Addon Info", format!("addon/{}", 310806)),
        TestDefinition::post("Get Multiple Addons", "addon", json!([310806, 304026])),
        TestDefinition::post(
            "Get Featured Addons",
            "addon/featured",
            json!({
                "GameId": 432,
                "addonIds": [],
                "featuredCount": 6,
                "popularCount": 14,
                "updatedCount": 14
            }),
        ),
        TestDefinition::post("Get Addon by Fingerprint", "fingerprint", json!([3028671922u64])),
        TestDefinition::get("Get Addon Description", format!("addon/{}/description", 310806)),
        TestDefinition::get(
            "Get Addon File Changelog",
            format!("addon/{}/file/{}/changelog", 310806, 2657461),
        ),
        TestDefinition::get(
            "Get Addon File Download URL",
            format!("addon/{}/file/{}/download-url", 296062, 2724357),
        ),
        TestDefinition::get(
            "Get Addon File Information",
            format!("addon/{}/file/{}", 310806, 2657461),
        ),
        TestDefinition::get("Get Addon Files", format!("addon/{}/files", 304026)),
        // Category
        TestDefinition::get("Get Category Info", format!("category/{}", 423)),
        TestDefinition::get("Get Category List", "category"),
        TestDefinition::get("Get Category Section Info", format!("category/section/{}", 6)),
        TestDefinition::get("Get Category Timestamp", "category/timestamp"),
        // Game
        TestDefinition::get("Get Game Info", format!("game/{}", 432)),
        TestDefinition::get("Get Games List", "game"),
        TestDefinition::get("Get Addon-Supported Games List", "game?supportsAddons"),
        // Minecraft
        TestDefinition::get("Get Minecraft Version Info", format!("minecraft/version/{}", "1.12.2")),
        TestDefinition::get("Get Minecraft Version List", "minecraft/version"),
        TestDefinition::get("Get Minecraft Version Timestamp", "minecraft/version/timestamp"),
        TestDefinition::get("Get Modloaders for Version", "minecraft/modloader?version=1.12.2"),
        TestDefinition::get(
            "Get Modloader Info",
            format!("minecraft/modloader/{}", "forge-12.17.0.1980"),
        ),
        TestDefinition::get("Get Modloader List", "minecraft/modloader"),
        TestDefinition::get("Get Modloader Timestamp", "minecraft/modloader/timestamp"),
    ]
}

/// Load a catalog file, picking the format from the extension
pub fn load(path: impl AsRef<Path>) -> Result<Vec<TestDefinition>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read catalog file: {}", path.display()))?;

    let catalog: CatalogFile = if is_yaml_file(path) {
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML catalog: {}", path.display()))?
    } else {
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON catalog: {}", path.display()))?
    };

    if catalog.tests.is_empty() {
        anyhow::bail!("Catalog {} defines no tests", path.display());
    }
    Ok(catalog.tests)
}

/// Keep entries whose name contains `needle` (case-insensitive), preserving order
pub fn filter(catalog: Vec<TestDefinition>, needle: &str) -> Vec<TestDefinition> {
    let needle = needle.to_lowercase();
    catalog
        .into_iter()
        .filter(|t| t.name.to_lowercase().contains(&needle))
        .collect()
}

fn is_yaml_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "yaml" || e == "yml")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Method;
    use tempfile::tempdir;

    #[test]
    fn test_builtin_catalog() {
        let catalog = builtin();
        assert_eq!(catalog.len(), 25);
        assert_eq!(catalog[0].path, "addon/timestamp");
        assert_eq!(catalog[24].name, "Get Modloader Timestamp");

        let posts: Vec<_> = catalog.iter().filter(|t| t.method == Method::POST).collect();
        assert_eq!(posts.len(), 3);
        assert!(posts.iter().all(|t| t.has_payload()));
    }

    #[test]
    fn test_builtin_search_query() {
        let search = &builtin()[1];
        assert_eq!(
            search.path,
            "addon/search?categoryId=0&gameId=432&gameVersion=1.12.2&index=0&pageSize=25&searchFilter=ultimate&sectionId=4471&sort=0"
        );
    }

    #[test]
    fn test_filter_preserves_order() {
        let filtered = filter(builtin(), "timestamp");
        let names: Vec<_> = filtered.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Get Addons Database Timestamp",
                "Get Category Timestamp",
                "Get Minecraft Version Timestamp",
                "Get Modloader Timestamp",
            ]
        );
    }

    #[test]
    fn test_load_yaml_catalog() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("catalog.yaml");
        std::fs::write(
            &path,
            "tests:\n  - name: Ping\n    path: ping\n  - name: Create\n    method: POST\n    path: items\n    payload: {\"a\": 1}\n",
        )
        .unwrap();

        let catalog = load(&path).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog[1].method, Method::POST);
        assert_eq!(catalog[1].payload, Some(json!({"a": 1})));
    }

    #[test]
    fn test_load_json_catalog_roundtrips_builtin() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        let file = CatalogFile { tests: builtin() };
        std::fs::write(&path, serde_json::to_string_pretty(&file).unwrap()).unwrap();

        assert_eq!(load(&path).unwrap(), builtin());
    }

    #[test]
    fn test_load_empty_catalog_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.json");
        std::fs::write(&path, r#"{"tests": []}"#).unwrap();

        assert!(load(&path).is_err());
    }
}
