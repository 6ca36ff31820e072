pub mod engine;
mod error;
pub mod prompt;
pub mod recover;

pub use engine::{LlmEngine, TextGenerator};
pub use error::{FlowchartError, GenerateError};
pub use prompt::build_prompt;
pub use recover::{recover, RecoveryOutcome, Stage, StageResult};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use flowgen_core::{ContentFlags, DiagramRequest, FeatureCatalog, FeatureRef, Language, Variant};

// --- Model output ---

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FlowchartNode {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FlowchartEdge {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

/// The JSON envelope the prompt asks the model to return. `mermaid_code`
/// always holds the sanitized diagram once recovered.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FlowchartOutput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(alias = "diagram")]
    pub mermaid_code: String,
    #[serde(default)]
    pub nodes: Vec<FlowchartNode>,
    #[serde(default)]
    pub edges: Vec<FlowchartEdge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

// --- Request / response ---

#[derive(Debug, Clone, Default, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FlowchartRequest {
    /// Archetype name from the feature catalog, e.g. "ecommerce".
    #[serde(default)]
    pub archetype: String,
    /// Features as "category:key", e.g. "core:shoppingCart".
    #[serde(default)]
    pub selected_features: Vec<String>,
    #[serde(default)]
    pub variant: Option<Variant>,
    #[serde(default)]
    pub language: Option<Language>,
    #[serde(default)]
    pub include_components: Option<bool>,
    #[serde(default)]
    pub include_data_models: Option<bool>,
    #[serde(default)]
    pub include_pages: Option<bool>,
}

impl FlowchartRequest {
    /// Validate against the catalog and build the diagram request.
    pub fn to_diagram_request(&self, catalog: &FeatureCatalog) -> Result<DiagramRequest, FlowchartError> {
        let archetype = self.archetype.trim();
        if archetype.is_empty() {
            return Err(FlowchartError::InvalidRequest(
                "Archetype is required".to_string(),
            ));
        }
        if !catalog.contains(archetype) {
            return Err(FlowchartError::InvalidRequest(format!(
                "Unknown archetype: {archetype}"
            )));
        }
        if self.selected_features.is_empty() {
            return Err(FlowchartError::InvalidRequest(
                "At least one feature must be selected".to_string(),
            ));
        }

        let variant = self.variant.unwrap_or_default();
        let content = ContentFlags::resolve(
            variant,
            self.include_components,
            self.include_data_models,
            self.include_pages,
        );
        Ok(
            DiagramRequest::new(archetype, FeatureRef::parse_all(&self.selected_features))
                .with_variant(variant)
                .with_language(self.language.unwrap_or_default())
                .with_content(content),
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FlowchartResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagram_source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured_output: Option<FlowchartOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FlowchartResponse {
    pub fn from_outcome(outcome: RecoveryOutcome) -> Self {
        let diagram = outcome.diagram().to_string();
        let error = outcome.note().map(str::to_string);
        Self {
            success: true,
            diagram_source: Some(diagram),
            structured_output: outcome.into_output(),
            error,
        }
    }

    pub fn failure(err: &FlowchartError) -> Self {
        Self {
            success: false,
            error: Some(err.to_string()),
            ..Self::default()
        }
    }
}

/// Run the whole pipeline for one request: prompt, one model call, recovery.
///
/// Model failures never surface as errors; they produce a fallback diagram
/// with a warning in `error`. Only invalid requests are rejected.
pub async fn generate_flowchart(
    catalog: &FeatureCatalog,
    generator: &dyn TextGenerator,
    request: &FlowchartRequest,
) -> Result<FlowchartResponse, FlowchartError> {
    let diagram_request = request.to_diagram_request(catalog)?;
    let prompt = build_prompt(&diagram_request, catalog);

    log::info!(
        archetype = diagram_request.archetype(),
        variant = diagram_request.variant().as_str(),
        features = diagram_request.features().len();
        "Generating flowchart"
    );

    let outcome = match generator.generate(&prompt).await {
        Ok(raw) => {
            log::debug!(bytes = raw.len(); "Model responded");
            recover(&raw, &diagram_request, catalog)
        }
        Err(e) => recover::fallback(
            &diagram_request,
            catalog,
            recover::model_failure_note(&e.to_string()),
        ),
    };

    Ok(FlowchartResponse::from_outcome(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> FeatureCatalog {
        FeatureCatalog::bundled().unwrap()
    }

    #[test]
    fn request_deserializes_from_camel_case() {
        let req: FlowchartRequest = serde_json::from_str(
            r#"{"archetype":"blog","selectedFeatures":["core:search"],"variant":"data-flow","language":"en","includePages":true}"#,
        )
        .unwrap();
        let diagram = req.to_diagram_request(&catalog()).unwrap();
        assert_eq!(diagram.variant(), Variant::DataFlow);
        assert_eq!(diagram.language(), Language::En);
        assert!(diagram.content().data_models);
        assert!(diagram.content().pages);
        assert!(!diagram.content().components);
    }

    #[test]
    fn invalid_requests_are_rejected_with_400() {
        let catalog = catalog();
        let cases = [
            (FlowchartRequest::default(), "Archetype is required"),
            (
                FlowchartRequest {
                    archetype: "marketplace".into(),
                    selected_features: vec!["core:search".into()],
                    ..Default::default()
                },
                "Unknown archetype: marketplace",
            ),
            (
                FlowchartRequest {
                    archetype: "blog".into(),
                    ..Default::default()
                },
                "At least one feature must be selected",
            ),
        ];
        for (req, message) in cases {
            let err = req.to_diagram_request(&catalog).unwrap_err();
            assert_eq!(err.status_code(), 400);
            assert_eq!(err.to_string(), message);
        }
    }

    #[test]
    fn structured_output_accepts_diagram_alias() {
        let out: FlowchartOutput =
            serde_json::from_str(r#"{"diagram":"flowchart TD","nodes":[{"id":"A","type":"start"}]}"#).unwrap();
        assert_eq!(out.mermaid_code, "flowchart TD");
        assert_eq!(out.nodes[0].kind, "start");
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["mermaidCode"], "flowchart TD");
    }

    #[test]
    fn failure_response_carries_message() {
        let resp = FlowchartResponse::failure(&FlowchartError::Unexpected("boom".into()));
        assert!(!resp.success);
        assert_eq!(
            serde_json::to_value(&resp).unwrap(),
            serde_json::json!({"success": false, "error": "boom"})
        );
    }
}
