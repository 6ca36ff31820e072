use std::sync::Mutex;

use async_trait::async_trait;

use flowgen_core::rules::END_CLASS_DEF;
use flowgen_core::{sanitize, FeatureCatalog};
use flowgen_generate::{generate_flowchart, FlowchartRequest, GenerateError, TextGenerator};

/// Returns a canned reply and remembers the prompt it was given.
struct Canned {
    reply: Result<String, String>,
    prompts: Mutex<Vec<String>>,
}

impl Canned {
    fn ok(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn failing(reason: &str) -> Self {
        Self {
            reply: Err(reason.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl TextGenerator for Canned {
    async fn generate(&self, prompt: &str) -> Result<String, GenerateError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.reply.clone().map_err(GenerateError::Chat)
    }
}

fn catalog() -> FeatureCatalog {
    FeatureCatalog::bundled().unwrap()
}

fn request(features: &[&str]) -> FlowchartRequest {
    FlowchartRequest {
        archetype: "ecommerce".to_string(),
        selected_features: features.iter().map(|f| f.to_string()).collect(),
        ..Default::default()
    }
}

#[tokio::test]
async fn structured_reply_yields_sanitized_diagram_and_metadata() {
    let reply = "```json\n{\"title\":\"ร้านค้า\",\"diagram\":\"flowchart TD\\nA-->End\"}\n```";
    let generator = Canned::ok(reply);

    let resp = generate_flowchart(&catalog(), &generator, &request(&["core:checkout"]))
        .await
        .unwrap();

    let expected = format!("flowchart TD\nA-->EndNode\n    {END_CLASS_DEF}");
    assert!(resp.success);
    assert_eq!(resp.diagram_source.as_deref(), Some(expected.as_str()));
    let output = resp.structured_output.unwrap();
    assert_eq!(output.title, "ร้านค้า");
    assert_eq!(output.mermaid_code, expected);
    assert_eq!(resp.error, None);
    assert_eq!(generator.calls(), 1);
}

#[tokio::test]
async fn prompt_reflects_request() {
    let generator = Canned::ok("{}");
    let mut req = request(&["core:checkout", "advanced:shipping"]);
    req.language = Some(flowgen_core::Language::En);

    generate_flowchart(&catalog(), &generator, &req).await.unwrap();

    let prompts = generator.prompts.lock().unwrap();
    assert!(prompts[0].contains("### Core Features (1)"));
    assert!(prompts[0].contains("### Advanced Features (1)"));
    assert!(prompts[0].contains("Title in English"));
}

#[tokio::test]
async fn model_failure_falls_back_with_warning() {
    let generator = Canned::failing("quota exceeded");

    let resp = generate_flowchart(
        &catalog(),
        &generator,
        &request(&["core:productCatalog", "advanced:multiCurrency"]),
    )
    .await
    .unwrap();

    assert!(resp.success);
    assert_eq!(
        resp.error.as_deref(),
        Some("Used fallback flowchart due to AI error: chat: quota exceeded")
    );
    assert!(resp.structured_output.is_none());
    let diagram = resp.diagram_source.unwrap();
    assert!(diagram.contains("productCatalog[\"Product Catalog\"]:::required"));
    assert!(diagram.contains("multiCurrency[\"Multi Currency\"]:::recommended"));
    assert_eq!(sanitize(&diagram), diagram);
}

#[tokio::test]
async fn unparseable_reply_falls_back_with_note() {
    let generator = Canned::ok("Sorry, I can only describe diagrams in prose.");

    let resp = generate_flowchart(&catalog(), &generator, &request(&["core:search"]))
        .await
        .unwrap();

    assert!(resp.success);
    assert_eq!(
        resp.error.as_deref(),
        Some("Used fallback flowchart - original AI response could not be parsed")
    );
    assert!(resp.diagram_source.unwrap().contains("StartNode --> search"));
}

#[tokio::test]
async fn embedded_block_is_used_when_envelope_lacks_diagram() {
    let reply = "{\"title\":\"x\"}\n```mermaid\nflowchart LR\n    Cart[Shopping Cart] --> end\n```";
    let generator = Canned::ok(reply);

    let resp = generate_flowchart(&catalog(), &generator, &request(&["core:shoppingCart"]))
        .await
        .unwrap();

    assert_eq!(
        resp.diagram_source.as_deref(),
        Some(format!("flowchart LR\n    Cart[\"Shopping Cart\"] --> EndNode\n    {END_CLASS_DEF}").as_str())
    );
    assert!(resp.structured_output.is_none());
    assert_eq!(resp.error, None);
}

#[tokio::test]
async fn invalid_request_never_calls_the_model() {
    let generator = Canned::ok("unused");
    let err = generate_flowchart(&catalog(), &generator, &request(&[]))
        .await
        .unwrap_err();

    assert_eq!(err.status_code(), 400);
    assert_eq!(generator.calls(), 0);
}
