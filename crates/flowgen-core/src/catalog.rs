//! Read-only feature catalog: per-archetype core and advanced features.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{flowgen_dir, CatalogError, FeatureCategory, FeatureDetail, FeatureRef};

const BUNDLED_CATALOG: &str = include_str!("../data/catalog.json");

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ArchetypeFeatures {
    #[serde(default)]
    pub core: IndexMap<String, FeatureDetail>,
    #[serde(default)]
    pub advanced: IndexMap<String, FeatureDetail>,
}

impl ArchetypeFeatures {
    pub fn get(&self, category: FeatureCategory, key: &str) -> Option<&FeatureDetail> {
        match category {
            FeatureCategory::Core => self.core.get(key),
            FeatureCategory::Advanced => self.advanced.get(key),
        }
    }

    /// All features in catalog order, core first.
    pub fn iter(&self) -> impl Iterator<Item = (FeatureCategory, &str, &FeatureDetail)> {
        let core = self
            .core
            .iter()
            .map(|(k, f)| (FeatureCategory::Core, k.as_str(), f));
        let advanced = self
            .advanced
            .iter()
            .map(|(k, f)| (FeatureCategory::Advanced, k.as_str(), f));
        core.chain(advanced)
    }
}

/// Archetype name → features. Key order follows the source file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct FeatureCatalog {
    archetypes: IndexMap<String, ArchetypeFeatures>,
}

impl FeatureCatalog {
    /// The catalog shipped with the crate.
    pub fn bundled() -> Result<Self, CatalogError> {
        Self::from_json(BUNDLED_CATALOG)
    }

    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let raw = fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    /// `~/.flowgen/catalog.json` when present, otherwise the bundled catalog.
    pub fn load_default() -> Result<Self, CatalogError> {
        let path = flowgen_dir().join("catalog.json");
        if path.exists() {
            log::info!(path = path.display().to_string(); "Loading feature catalog");
            Self::load(&path)
        } else {
            log::debug!("Using bundled feature catalog");
            Self::bundled()
        }
    }

    pub fn archetypes(&self) -> impl Iterator<Item = &str> {
        self.archetypes.keys().map(|k| k.as_str())
    }

    pub fn archetype(&self, name: &str) -> Option<&ArchetypeFeatures> {
        self.archetypes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.archetypes.contains_key(name)
    }

    pub fn resolve(&self, archetype: &str, feature: &FeatureRef) -> Option<&FeatureDetail> {
        let category = feature.category?;
        self.archetype(archetype)?.get(category, &feature.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Priority;

    #[test]
    fn bundled_catalog_has_all_archetypes() {
        let catalog = FeatureCatalog::bundled().unwrap();
        let names: Vec<&str> = catalog.archetypes().collect();
        assert_eq!(names, ["ecommerce", "blog", "portfolio", "saas", "landing"]);
    }

    #[test]
    fn bundled_catalog_keeps_file_order() {
        let catalog = FeatureCatalog::bundled().unwrap();
        let ecommerce = catalog.archetype("ecommerce").unwrap();
        let first = ecommerce.iter().next().unwrap();
        assert_eq!(first.0, FeatureCategory::Core);
        assert_eq!(first.1, "productCatalog");
        assert_eq!(first.2.priority, Priority::Required);
    }

    #[test]
    fn resolve_respects_category() {
        let catalog = FeatureCatalog::bundled().unwrap();
        let core = FeatureRef::parse("core:shoppingCart");
        assert_eq!(
            catalog.resolve("ecommerce", &core).map(|f| f.name.as_str()),
            Some("Shopping Cart")
        );

        let wrong_category = FeatureRef::parse("advanced:shoppingCart");
        assert!(catalog.resolve("ecommerce", &wrong_category).is_none());

        let unknown = FeatureRef::parse("other:shoppingCart");
        assert!(catalog.resolve("ecommerce", &unknown).is_none());
        assert!(catalog.resolve("marketplace", &core).is_none());
    }

    #[test]
    fn custom_catalog_parses_minimal_entries() {
        let catalog = FeatureCatalog::from_json(
            r#"{"kiosk":{"core":{"menu":{"name":"Menu","priority":"optional","complexity":"low"}}}}"#,
        )
        .unwrap();
        let menu = catalog
            .resolve("kiosk", &FeatureRef::new(FeatureCategory::Core, "menu"))
            .unwrap();
        assert!(menu.components.is_empty());
        assert!(catalog.archetype("kiosk").unwrap().advanced.is_empty());
    }

    #[test]
    fn malformed_catalog_is_a_parse_error() {
        let err = FeatureCatalog::from_json("{\"kiosk\": 3}").unwrap_err();
        assert!(matches!(err, CatalogError::Parse(_)));
    }
}
