use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use flowgen_core::{sanitize, synthesize_fallback, DiagramRequest, FeatureCatalog};

use crate::{FlowchartEdge, FlowchartNode, FlowchartOutput};

lazy_static! {
    static ref JSON_FENCE: Regex = Regex::new(r"(?is)```json\s*(.*?)\s*```").unwrap();
    static ref MERMAID_FENCE: Regex = Regex::new(r"(?is)```mermaid\s*(.*?)\s*```").unwrap();
    static ref DECLARATION: Regex =
        Regex::new(r"(?i)\b(?:flowchart|graph)[ \t]+(?:TD|TB|LR|RL|BT)\b").unwrap();
}

pub const PARSE_FAILURE_NOTE: &str =
    "Used fallback flowchart - original AI response could not be parsed";

pub fn model_failure_note(reason: &str) -> String {
    format!("Used fallback flowchart due to AI error: {reason}")
}

/// Result of one recovery stage.
#[derive(Debug, Clone, PartialEq)]
pub enum StageResult<T> {
    Ok(T),
    /// The stage found nothing usable.
    Empty,
    /// The stage found something but could not use it.
    Error(String),
}

impl<T> StageResult<T> {
    /// Keep a success, otherwise run the next stage.
    pub fn or_else(self, next: impl FnOnce() -> StageResult<T>) -> StageResult<T> {
        match self {
            StageResult::Ok(_) => self,
            StageResult::Empty | StageResult::Error(_) => next(),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> StageResult<U> {
        match self {
            StageResult::Ok(v) => StageResult::Ok(f(v)),
            StageResult::Empty => StageResult::Empty,
            StageResult::Error(e) => StageResult::Error(e),
        }
    }

    fn describe(&self) -> String {
        match self {
            StageResult::Ok(_) => "ok".to_string(),
            StageResult::Empty => "empty".to_string(),
            StageResult::Error(e) => format!("error: {e}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Structured,
    Embedded,
    Heuristic,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Structured => "structured",
            Stage::Embedded => "embedded",
            Stage::Heuristic => "heuristic",
        }
    }
}

/// Where the final diagram came from.
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryOutcome {
    /// A JSON envelope with a usable diagram field.
    Structured(FlowchartOutput),
    /// A diagram cut out of free text.
    Extracted { stage: Stage, diagram: String },
    /// Synthesized without the model's help.
    Fallback { diagram: String, note: String },
}

impl RecoveryOutcome {
    pub fn diagram(&self) -> &str {
        match self {
            RecoveryOutcome::Structured(output) => &output.mermaid_code,
            RecoveryOutcome::Extracted { diagram, .. } | RecoveryOutcome::Fallback { diagram, .. } => {
                diagram
            }
        }
    }

    pub fn note(&self) -> Option<&str> {
        match self {
            RecoveryOutcome::Fallback { note, .. } => Some(note),
            _ => None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, RecoveryOutcome::Fallback { .. })
    }

    pub fn into_output(self) -> Option<FlowchartOutput> {
        match self {
            RecoveryOutcome::Structured(output) => Some(output),
            _ => None,
        }
    }
}

/// Fallback diagram for `request`, tagged with `note`.
pub fn fallback(request: &DiagramRequest, catalog: &FeatureCatalog, note: String) -> RecoveryOutcome {
    log::warn!(archetype = request.archetype(); "{note}");
    RecoveryOutcome::Fallback {
        diagram: synthesize_fallback(request.archetype(), request.features(), catalog),
        note,
    }
}

/// Recover a diagram from raw model output. Stages run in order and the
/// first one that yields a non-empty sanitized diagram wins; if none does,
/// the fallback diagram for `request` is returned.
pub fn recover(raw: &str, request: &DiagramRequest, catalog: &FeatureCatalog) -> RecoveryOutcome {
    let stages: [(Stage, fn(&str) -> StageResult<RecoveryOutcome>); 3] = [
        (Stage::Structured, |raw| structured_stage(raw).map(RecoveryOutcome::Structured)),
        (Stage::Embedded, |raw| {
            embedded_stage(raw).map(|diagram| RecoveryOutcome::Extracted {
                stage: Stage::Embedded,
                diagram,
            })
        }),
        (Stage::Heuristic, |raw| {
            heuristic_stage(raw).map(|diagram| RecoveryOutcome::Extracted {
                stage: Stage::Heuristic,
                diagram,
            })
        }),
    ];

    let result = stages
        .iter()
        .fold(StageResult::Empty, |acc, (stage, run)| {
            acc.or_else(|| {
                let result = run(raw);
                log::debug!(stage = stage.as_str(), result = result.describe(); "Recovery stage finished");
                result
            })
        });

    match result {
        StageResult::Ok(outcome) => outcome,
        StageResult::Empty | StageResult::Error(_) => {
            fallback(request, catalog, PARSE_FAILURE_NOTE.to_string())
        }
    }
}

/// Sanitize a candidate; empty output does not count.
fn accept(candidate: &str) -> StageResult<String> {
    let diagram = sanitize(candidate);
    if diagram.is_empty() {
        StageResult::Empty
    } else {
        StageResult::Ok(diagram)
    }
}

// --- Stage A ---

fn parse_envelope(raw: &str) -> Option<Value> {
    let body = JSON_FENCE
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(raw)
        .trim();

    if let Ok(value) = serde_json::from_str::<Value>(body) {
        return Some(value);
    }

    // Outermost {...} slice.
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&raw[start..=end]).ok()
}

fn string_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Parse the JSON envelope. Fields other than the diagram are read leniently:
/// a malformed `nodes` list is dropped, not fatal.
pub fn structured_stage(raw: &str) -> StageResult<FlowchartOutput> {
    let Some(envelope) = parse_envelope(raw) else {
        return StageResult::Empty;
    };
    if !envelope.is_object() {
        return StageResult::Error("response JSON is not an object".to_string());
    }

    let diagram = ["mermaidCode", "diagram"]
        .iter()
        .find_map(|key| envelope.get(*key).and_then(Value::as_str))
        .filter(|d| !d.trim().is_empty());
    let Some(diagram) = diagram else {
        return StageResult::Error("no mermaidCode in response".to_string());
    };

    let mermaid_code = match accept(diagram) {
        StageResult::Ok(d) => d,
        StageResult::Empty => return StageResult::Empty,
        StageResult::Error(e) => return StageResult::Error(e),
    };

    let nodes: Vec<FlowchartNode> = envelope
        .get("nodes")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default();
    let edges: Vec<FlowchartEdge> = envelope
        .get("edges")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default();

    StageResult::Ok(FlowchartOutput {
        title: string_field(&envelope, "title"),
        description: string_field(&envelope, "description"),
        mermaid_code,
        nodes,
        edges,
        metadata: envelope.get("metadata").cloned(),
    })
}

// --- Stage B ---

pub fn embedded_stage(raw: &str) -> StageResult<String> {
    match MERMAID_FENCE.captures(raw).and_then(|c| c.get(1)) {
        Some(m) => accept(m.as_str()),
        None => StageResult::Empty,
    }
}

// --- Stage C ---

pub fn heuristic_stage(raw: &str) -> StageResult<String> {
    let Some(m) = DECLARATION.find(raw) else {
        return StageResult::Empty;
    };
    let rest = &raw[m.start()..];

    if raw[..m.start()].ends_with('"') {
        return accept(&json_string_prefix(rest));
    }

    let end = rest.find("```").unwrap_or(rest.len());
    accept(rest[..end].trim())
}

/// Text up to the first unescaped `"`, with JSON escapes decoded.
fn json_string_prefix(text: &str) -> String {
    let mut escaped = false;
    let mut end = text.len();
    for (i, c) in text.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '"' => {
                end = i;
                break;
            }
            _ => {}
        }
    }
    let literal = &text[..end];
    serde_json::from_str::<String>(&format!("\"{literal}\"")).unwrap_or_else(|_| literal.to_string())
}
