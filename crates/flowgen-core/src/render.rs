//! Renderer settings handed to the client together with the diagram source.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Default,
    Dark,
    Forest,
    Neutral,
    Base,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SecurityLevel {
    Strict,
    #[default]
    Loose,
    Antiscript,
    Sandbox,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum Curve {
    #[default]
    Basis,
    Linear,
    Cardinal,
    Step,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FlowchartRenderConfig {
    pub use_max_width: bool,
    pub html_labels: bool,
    pub curve: Curve,
}

impl Default for FlowchartRenderConfig {
    fn default() -> Self {
        Self {
            use_max_width: true,
            html_labels: true,
            curve: Curve::default(),
        }
    }
}

/// Explicit, per-call renderer configuration. Rendering is never started on
/// page load; the client renders when the diagram arrives.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RenderConfig {
    pub start_on_load: bool,
    pub theme: Theme,
    pub security_level: SecurityLevel,
    pub flowchart: FlowchartRenderConfig,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            start_on_load: false,
            theme: Theme::default(),
            security_level: SecurityLevel::default(),
            flowchart: FlowchartRenderConfig::default(),
        }
    }
}

impl RenderConfig {
    pub fn with_theme(self, theme: Theme) -> Self {
        Self { theme, ..self }
    }
}
