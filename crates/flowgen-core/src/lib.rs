pub mod catalog;
pub mod error;
pub mod fallback;
pub mod render;
pub mod rules;
pub mod sanitize;

pub use catalog::{ArchetypeFeatures, FeatureCatalog};
pub use error::CatalogError;
pub use fallback::synthesize_fallback;
pub use render::RenderConfig;
pub use sanitize::sanitize;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::PathBuf;

// --- Catalog types ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Priority {
    Required,
    Recommended,
    Optional,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Required => "required",
            Priority::Recommended => "recommended",
            Priority::Optional => "optional",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

impl Complexity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Complexity::Low => "low",
            Complexity::Medium => "medium",
            Complexity::High => "high",
        }
    }
}

/// One selectable feature of an archetype, as stored in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeatureDetail {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub priority: Priority,
    pub complexity: Complexity,
    #[serde(default)]
    pub components: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data_models: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub integrations: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pages: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum FeatureCategory {
    Core,
    Advanced,
}

impl FeatureCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureCategory::Core => "core",
            FeatureCategory::Advanced => "advanced",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "core" => Some(FeatureCategory::Core),
            "advanced" => Some(FeatureCategory::Advanced),
            _ => None,
        }
    }
}

/// A selected feature, parsed from the wire form `"category:key"`.
///
/// Unknown categories are kept as `None` so the selection still counts
/// toward the fallback diagram, but such entries never resolve in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeatureRef {
    pub category: Option<FeatureCategory>,
    pub key: String,
}

impl FeatureRef {
    pub fn new(category: FeatureCategory, key: impl Into<String>) -> Self {
        Self {
            category: Some(category),
            key: key.into(),
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw.split_once(':') {
            Some((category, key)) => Self {
                category: FeatureCategory::parse(category.trim()),
                key: key.trim().to_string(),
            },
            None => Self {
                category: None,
                key: String::new(),
            },
        }
    }

    pub fn parse_all<S: AsRef<str>>(raw: &[S]) -> Vec<Self> {
        raw.iter().map(|s| Self::parse(s.as_ref())).collect()
    }
}

impl fmt::Display for FeatureRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let category = self.category.map(|c| c.as_str()).unwrap_or("unknown");
        write!(f, "{}:{}", category, self.key)
    }
}

// --- Request types ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, schemars::JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Variant {
    #[default]
    FeatureOverview,
    UserFlow,
    DataFlow,
    PageStructure,
    ComponentHierarchy,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::FeatureOverview => "feature-overview",
            Variant::UserFlow => "user-flow",
            Variant::DataFlow => "data-flow",
            Variant::PageStructure => "page-structure",
            Variant::ComponentHierarchy => "component-hierarchy",
        }
    }

    /// Which optional feature details the prompt shows when the caller
    /// leaves the corresponding flag unset.
    pub fn content_preset(&self) -> ContentFlags {
        match self {
            Variant::FeatureOverview | Variant::UserFlow | Variant::ComponentHierarchy => {
                ContentFlags {
                    components: true,
                    data_models: false,
                    pages: false,
                }
            }
            Variant::DataFlow => ContentFlags {
                components: false,
                data_models: true,
                pages: false,
            },
            Variant::PageStructure => ContentFlags {
                components: false,
                data_models: false,
                pages: true,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    #[default]
    Th,
}

impl Language {
    pub fn display_name(&self) -> &'static str {
        match self {
            Language::En => "English",
            Language::Th => "Thai",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentFlags {
    pub components: bool,
    pub data_models: bool,
    pub pages: bool,
}

impl ContentFlags {
    /// Fill unset flags from the variant preset.
    pub fn resolve(
        variant: Variant,
        components: Option<bool>,
        data_models: Option<bool>,
        pages: Option<bool>,
    ) -> Self {
        let preset = variant.content_preset();
        Self {
            components: components.unwrap_or(preset.components),
            data_models: data_models.unwrap_or(preset.data_models),
            pages: pages.unwrap_or(preset.pages),
        }
    }
}

pub const DEFAULT_MAX_DEPTH: u32 = 2;

/// Everything the prompt builder and the fallback synthesizer need for one
/// diagram. Built once per request and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagramRequest {
    archetype: String,
    features: Vec<FeatureRef>,
    variant: Variant,
    language: Language,
    max_depth: u32,
    content: ContentFlags,
}

impl DiagramRequest {
    pub fn new(archetype: impl Into<String>, features: Vec<FeatureRef>) -> Self {
        let variant = Variant::default();
        Self {
            archetype: archetype.into(),
            features,
            variant,
            language: Language::default(),
            max_depth: DEFAULT_MAX_DEPTH,
            content: variant.content_preset(),
        }
    }

    /// Switching variant also resets the content flags to that variant's preset.
    pub fn with_variant(mut self, variant: Variant) -> Self {
        self.variant = variant;
        self.content = variant.content_preset();
        self
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_content(mut self, content: ContentFlags) -> Self {
        self.content = content;
        self
    }

    pub fn archetype(&self) -> &str {
        &self.archetype
    }

    pub fn features(&self) -> &[FeatureRef] {
        &self.features
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    pub fn content(&self) -> ContentFlags {
        self.content
    }
}

// --- Storage ---

/// Resolve the flowgen data directory (~/.flowgen/).
pub fn flowgen_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".flowgen")
}

// --- AI Settings ---

pub const DEFAULT_PROVIDER: &str = "google";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-lite";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AiSettings {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_provider() -> String {
    DEFAULT_PROVIDER.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_max_tokens() -> u32 {
    16384
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            api_key: String::new(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl AiSettings {
    /// Fill an empty API key from the environment (`FLOWGEN_API_KEY`, then
    /// `GEMINI_API_KEY`). A key stored in settings always wins.
    pub fn with_env_overrides(self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if !self.api_key.is_empty() {
            return self;
        }
        let api_key = ["FLOWGEN_API_KEY", "GEMINI_API_KEY"]
            .iter()
            .filter_map(|name| lookup(name))
            .find(|v| !v.trim().is_empty())
            .unwrap_or_default();
        Self { api_key, ..self }
    }
}

fn settings_path() -> PathBuf {
    flowgen_dir().join("settings.json")
}

/// Read settings from disk, falling back to defaults, then apply environment overrides.
pub fn read_settings() -> AiSettings {
    let path = settings_path();
    let stored = if path.exists() {
        fs::read_to_string(&path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_else(|| {
                log::warn!(path = path.display().to_string(); "Ignoring unreadable settings file");
                AiSettings::default()
            })
    } else {
        AiSettings::default()
    };
    stored.with_env_overrides(|name| std::env::var(name).ok())
}

pub fn ai_configured(settings: &AiSettings) -> bool {
    !settings.provider.is_empty()
        && !settings.model.is_empty()
        && (settings.provider == "ollama" || !settings.api_key.is_empty())
}
