use std::collections::HashSet;

use flowgen_core::fallback::safe_id;
use flowgen_core::rules::{EXAMPLE, RESERVED_WORDS, SYNTAX_RULES};
use flowgen_core::{
    ContentFlags, DiagramRequest, FeatureCatalog, FeatureCategory, FeatureDetail, Variant,
};

const MAX_COMPONENTS: usize = 5;
const MAX_DATA_MODELS: usize = 3;
const MAX_PAGES: usize = 5;
const MAX_INTEGRATIONS: usize = 3;

/// Selected features that resolve in the catalog, deduplicated by first
/// occurrence and split into core and advanced.
fn selected_features<'a>(
    request: &DiagramRequest,
    catalog: &'a FeatureCatalog,
) -> (Vec<(&'a str, &'a FeatureDetail)>, Vec<(&'a str, &'a FeatureDetail)>) {
    let mut seen = HashSet::new();
    let mut core = Vec::new();
    let mut advanced = Vec::new();

    let Some(archetype) = catalog.archetype(request.archetype()) else {
        return (core, advanced);
    };

    for feature in request.features() {
        let Some(category) = feature.category else {
            continue;
        };
        if !seen.insert((category, feature.key.as_str())) {
            continue;
        }
        let Some((key, detail)) = archetype
            .iter()
            .find(|(c, k, _)| *c == category && *k == feature.key)
            .map(|(_, k, d)| (k, d))
        else {
            continue;
        };
        match category {
            FeatureCategory::Core => core.push((key, detail)),
            FeatureCategory::Advanced => advanced.push((key, detail)),
        }
    }
    (core, advanced)
}

/// `A, B, C...` with at most `cap` items shown.
fn capped_list<S: AsRef<str>>(items: &[S], cap: usize) -> String {
    let shown: Vec<&str> = items.iter().take(cap).map(|s| s.as_ref()).collect();
    let mut out = shown.join(", ");
    if items.len() > cap {
        out.push_str("...");
    }
    out
}

/// `Product { id, name }` -> `Product`.
fn model_name(model: &str) -> &str {
    model.split('{').next().unwrap_or(model).trim()
}

fn format_feature(out: &mut String, key: &str, feature: &FeatureDetail, content: ContentFlags) {
    out.push_str("\n### ");
    out.push_str(&feature.name);
    out.push_str(" (ID: ");
    out.push_str(&safe_id(key, 0));
    out.push_str(")\n- Description: ");
    out.push_str(&feature.description);
    out.push_str("\n- Priority: ");
    out.push_str(feature.priority.as_str());
    out.push_str("\n- Complexity: ");
    out.push_str(feature.complexity.as_str());

    if content.components && !feature.components.is_empty() {
        out.push_str("\n- Components: ");
        out.push_str(&capped_list(&feature.components, MAX_COMPONENTS));
    }

    if !feature.data_models.is_empty() {
        if content.data_models {
            let names: Vec<&str> = feature.data_models.iter().map(|m| model_name(m)).collect();
            out.push_str("\n- Data Models: ");
            out.push_str(&capped_list(&names, MAX_DATA_MODELS));
        } else {
            out.push_str(&format!("\n- Data Models: {} models", feature.data_models.len()));
        }
    }

    if !feature.pages.is_empty() {
        if content.pages {
            out.push_str("\n- Pages: ");
            out.push_str(&capped_list(&feature.pages, MAX_PAGES));
        } else {
            out.push_str(&format!("\n- Pages: {} pages", feature.pages.len()));
        }
    }

    if !feature.integrations.is_empty() {
        out.push_str("\n- Integrations: ");
        out.push_str(&capped_list(&feature.integrations, MAX_INTEGRATIONS));
    }
    out.push('\n');
}

fn variant_instructions(variant: Variant, archetype: &str, feature_count: usize) -> String {
    match variant {
        Variant::FeatureOverview => format!(
            "Create a SIMPLE flowchart showing the main features and their relationships.\n\
- Show only the main {feature_count} features as nodes\n\
- Connect features that depend on each other\n\
- Use StartNode and EndNode as the entry and exit nodes\n\
- Keep it simple - maximum 15-20 nodes total"
        ),
        Variant::UserFlow => format!(
            "Create a user journey flowchart for the {archetype} website.\n\
- Start with user entry\n\
- Show main decision points\n\
- Include key features as processes\n\
- End with conversion/completion"
        ),
        Variant::DataFlow => "Create a data flow diagram.\n\
- Show main data entities as database nodes\n\
- Connect with data operations\n\
- Keep simple - focus on main flows"
            .to_string(),
        Variant::ComponentHierarchy => "Create a component hierarchy.\n\
- Show main components grouped by feature\n\
- Use subgraphs for grouping\n\
- Keep depth to 2 levels"
            .to_string(),
        Variant::PageStructure => "Create a page/route structure.\n\
- Show main pages as nodes\n\
- Connect with navigation flows\n\
- Group by feature area"
            .to_string(),
    }
}

/// Build the generation prompt for one diagram request.
///
/// Pure: the same request and catalog always produce the same bytes.
pub fn build_prompt(request: &DiagramRequest, catalog: &FeatureCatalog) -> String {
    let (core, advanced) = selected_features(request, catalog);
    let archetype = request.archetype();
    let content = request.content();

    let mut out = String::with_capacity(4096);
    out.push_str(
        "You are a Mermaid diagram expert. Generate a SIMPLE, VALID Mermaid flowchart.\n\n\
## CRITICAL MERMAID SYNTAX RULES (MUST FOLLOW):\n\n",
    );
    out.push_str(SYNTAX_RULES);

    out.push_str("\n\n## Task\nGenerate a ");
    out.push_str(request.variant().as_str());
    out.push_str(" flowchart for a **");
    out.push_str(&archetype.to_uppercase());
    out.push_str("** website.\n\n");
    out.push_str(&variant_instructions(
        request.variant(),
        archetype,
        core.len() + advanced.len(),
    ));

    out.push_str("\n\n## Selected Features\n");
    for (title, features) in [("Core", &core), ("Advanced", &advanced)] {
        if features.is_empty() {
            continue;
        }
        out.push_str(&format!("\n### {title} Features ({})\n", features.len()));
        for (key, detail) in features.iter() {
            format_feature(&mut out, key, detail, content);
        }
    }

    out.push_str(&format!(
        r#"
## Output Requirements

Return ONLY valid JSON with this structure:
{{
  "title": "Title in {language}",
  "description": "Brief description",
  "mermaidCode": "VALID Mermaid code as a single string with \n for newlines",
  "nodes": [{{"id": "NodeId", "label": "Label", "type": "process"}}],
  "edges": [{{"from": "Node1", "to": "Node2"}}],
  "metadata": {{"websiteType": "{archetype}", "featureCategory": "all", "totalNodes": 10, "totalEdges": 9}}
}}

"#,
        language = request.language().display_name(),
    ));

    out.push_str("## VALID Mermaid Example (FOLLOW THIS PATTERN):\n\n");
    out.push_str(EXAMPLE);

    let reserved = RESERVED_WORDS
        .iter()
        .map(|w| format!("\"{w}\""))
        .collect::<Vec<_>>()
        .join(" or ");
    out.push_str(&format!(
        "\n\n## CRITICAL:\n\
- NEVER use {reserved} (in any casing) as a node ID or class name - they are Mermaid reserved keywords!\n\
- Use \"StartNode\" / \"EndNode\" as IDs and \"startNode\" / \"endNode\" as class names instead\n\n\
## Important:\n\
- Keep the flowchart SIMPLE (max {depth} levels deep)\n\
- Use ONLY the node IDs I provided (alphanumeric)\n\
- ALWAYS quote labels that contain spaces or non-English characters\n\
- The mermaidCode MUST render without errors\n\n\
Generate now:",
        depth = request.max_depth(),
    ));

    out
}
