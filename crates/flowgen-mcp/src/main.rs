use std::sync::Arc;

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use serde::Deserialize;

use flowgen_core::render::Theme;
use flowgen_core::{
    ai_configured, read_settings, rules, sanitize, synthesize_fallback, FeatureCatalog, FeatureRef,
    RenderConfig,
};
use flowgen_generate::{
    build_prompt, generate_flowchart, FlowchartError, FlowchartRequest, FlowchartResponse,
    LlmEngine,
};

// --- Tool parameters ---

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct ListFeaturesRequest {
    /// Archetype name, e.g. "ecommerce"
    archetype: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct SanitizeRequest {
    /// Flowchart source to repair, possibly wrapped in fences or prose
    source: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
struct FallbackRequest {
    archetype: String,
    /// Features as "category:key"
    #[serde(default)]
    selected_features: Vec<String>,
}

#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
struct RenderConfigRequest {
    /// Renderer theme; defaults to "default"
    #[serde(default)]
    theme: Option<Theme>,
}

// --- Server ---

#[derive(Clone)]
pub struct FlowgenServer {
    tool_router: ToolRouter<Self>,
    catalog: Arc<FeatureCatalog>,
    engine: Arc<LlmEngine>,
}

#[tool_router]
impl FlowgenServer {
    pub fn new(catalog: FeatureCatalog, engine: LlmEngine) -> Self {
        Self {
            tool_router: Self::tool_router(),
            catalog: Arc::new(catalog),
            engine: Arc::new(engine),
        }
    }

    #[tool(description = "List the website archetypes known to the feature catalog")]
    fn list_archetypes(&self) -> Result<CallToolResult, McpError> {
        let names: Vec<&str> = self.catalog.archetypes().collect();
        Ok(CallToolResult::success(vec![Content::text(names.join("\n"))]))
    }

    #[tool(
        description = "List the selectable features of an archetype, one per line as `category:key - Name [priority, complexity]`. Pass the `category:key` part to the other tools."
    )]
    fn list_features(
        &self,
        Parameters(req): Parameters<ListFeaturesRequest>,
    ) -> Result<CallToolResult, McpError> {
        let Some(features) = self.catalog.archetype(&req.archetype) else {
            return Ok(CallToolResult::error(vec![Content::text(format!(
                "Unknown archetype: {}",
                req.archetype
            ))]));
        };
        let lines: Vec<String> = features
            .iter()
            .map(|(category, key, f)| {
                format!(
                    "{}:{} - {} [{}, {}]",
                    category.as_str(),
                    key,
                    f.name,
                    f.priority.as_str(),
                    f.complexity.as_str()
                )
            })
            .collect();
        Ok(CallToolResult::success(vec![Content::text(lines.join("\n"))]))
    }

    #[tool(description = "Build the generation prompt for a request without calling a model")]
    fn build_prompt(
        &self,
        Parameters(req): Parameters<FlowchartRequest>,
    ) -> Result<CallToolResult, McpError> {
        match req.to_diagram_request(&self.catalog) {
            Ok(request) => Ok(CallToolResult::success(vec![Content::text(build_prompt(
                &request,
                &self.catalog,
            ))])),
            Err(e) => Ok(error_result(&e)),
        }
    }

    #[tool(
        description = "Generate a Mermaid flowchart for the selected features. Returns {success, diagramSource, structuredOutput?, error?}. When the model fails or its reply cannot be parsed, a simple fallback diagram is returned with a warning in `error`."
    )]
    async fn generate_flowchart(
        &self,
        Parameters(req): Parameters<FlowchartRequest>,
    ) -> Result<CallToolResult, McpError> {
        match generate_flowchart(&self.catalog, self.engine.as_ref(), &req).await {
            Ok(resp) => Ok(json_result(&resp)),
            Err(e) => Ok(error_result(&e)),
        }
    }

    #[tool(description = "Repair flowchart source: strip fences and prose, rename reserved words, quote labels")]
    fn sanitize_diagram(
        &self,
        Parameters(req): Parameters<SanitizeRequest>,
    ) -> Result<CallToolResult, McpError> {
        Ok(CallToolResult::success(vec![Content::text(sanitize(&req.source))]))
    }

    #[tool(description = "Build the simple start-to-end fallback flowchart for a feature selection without calling a model")]
    fn fallback_diagram(
        &self,
        Parameters(req): Parameters<FallbackRequest>,
    ) -> Result<CallToolResult, McpError> {
        let features = FeatureRef::parse_all(&req.selected_features);
        Ok(CallToolResult::success(vec![Content::text(synthesize_fallback(
            &req.archetype,
            &features,
            &self.catalog,
        ))]))
    }

    #[tool(description = "Get the flowchart syntax rules every generated diagram must follow, with a valid example")]
    fn get_syntax_rules(&self) -> Result<CallToolResult, McpError> {
        Ok(CallToolResult::success(vec![Content::text(format!(
            "{}\n\n## Example\n{}",
            rules::SYNTAX_RULES,
            rules::EXAMPLE
        ))]))
    }

    #[tool(description = "Get the renderer configuration to pass along with a diagram")]
    fn get_render_config(
        &self,
        Parameters(req): Parameters<RenderConfigRequest>,
    ) -> Result<CallToolResult, McpError> {
        let config = RenderConfig::default().with_theme(req.theme.unwrap_or_default());
        Ok(json_result(&config))
    }
}

#[tool_handler]
impl ServerHandler for FlowgenServer {
    fn get_info(&self) -> ServerInfo {
        let instructions = format!(
            "{}\n\n## Flowchart Syntax Rules\n{}",
            INSTRUCTIONS,
            rules::SYNTAX_RULES
        );
        ServerInfo {
            instructions: Some(instructions.into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

// --- Helpers ---

fn json_result<T: serde::Serialize>(value: &T) -> CallToolResult {
    match serde_json::to_string_pretty(value) {
        Ok(json) => CallToolResult::success(vec![Content::text(json)]),
        Err(e) => error_result(&FlowchartError::from(e)),
    }
}

fn error_result(err: &FlowchartError) -> CallToolResult {
    log::warn!(status = err.status_code(); "{err}");
    let body = serde_json::json!({
        "status": err.status_code(),
        "response": FlowchartResponse::failure(err),
    });
    CallToolResult::error(vec![Content::text(body.to_string())])
}

const INSTRUCTIONS: &str = r#"flowgen turns a website archetype plus a selection of features into a Mermaid flowchart.

## Workflow
1. Call `list_archetypes`, then `list_features` for the chosen archetype.
2. Call `generate_flowchart` with `archetype` and `selectedFeatures` (each "category:key").
   Optional: `variant` (feature-overview, user-flow, data-flow, page-structure, component-hierarchy),
   `language` (en, th), `includeComponents`, `includeDataModels`, `includePages`.
3. Render `diagramSource` with the configuration from `get_render_config`.

A reply with `success: true` and a non-empty `error` used the fallback diagram.
Use `sanitize_diagram` on any hand-edited flowchart before rendering it."#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    let catalog = FeatureCatalog::load_default()?;
    let settings = read_settings();
    if !ai_configured(&settings) {
        log::warn!(provider = settings.provider.as_str(); "AI is not configured; every flowchart will use the fallback diagram");
    }

    let service = FlowgenServer::new(catalog, LlmEngine::new(settings))
        .serve(rmcp::transport::io::stdio())
        .await
        .inspect_err(|e| log::error!("MCP server error: {e}"))?;
    service.waiting().await?;
    Ok(())
}
