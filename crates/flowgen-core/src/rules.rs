//! Flowchart DSL rules. Single source of truth for the generation prompt,
//! the sanitizer and the fallback synthesizer.

/// Words the grammar reserves that models keep using as node ids or class names.
pub const RESERVED_WORDS: [&str; 2] = ["start", "end"];

/// Keywords a synthesized node id must never collide with (compared case-insensitively).
pub const KEYWORDS: [&str; 12] = [
    "start",
    "end",
    "graph",
    "flowchart",
    "subgraph",
    "direction",
    "class",
    "classDef",
    "style",
    "linkStyle",
    "click",
    "default",
];

pub const DIRECTIONS: [&str; 5] = ["TD", "TB", "LR", "RL", "BT"];

pub const START_NODE_ID: &str = "StartNode";
pub const END_NODE_ID: &str = "EndNode";
pub const START_CLASS: &str = "startNode";
pub const END_CLASS: &str = "endNode";
pub const REQUIRED_CLASS: &str = "required";
pub const RECOMMENDED_CLASS: &str = "recommended";

pub const REQUIRED_CLASS_DEF: &str =
    "classDef required fill:#10b981,stroke:#059669,stroke-width:2px,color:#fff";
pub const RECOMMENDED_CLASS_DEF: &str =
    "classDef recommended fill:#3b82f6,stroke:#2563eb,stroke-width:1px,color:#fff";
pub const START_CLASS_DEF: &str =
    "classDef startNode fill:#8b5cf6,stroke:#7c3aed,stroke-width:2px,color:#fff";
pub const END_CLASS_DEF: &str =
    "classDef endNode fill:#ef4444,stroke:#dc2626,stroke-width:2px,color:#fff";

/// Statement indentation used in every diagram this crate emits.
pub const INDENT: &str = "    ";

/// Canonical node id for a reserved word, if `word` is one.
pub fn reserved_node_id(word: &str) -> Option<&'static str> {
    if word.eq_ignore_ascii_case("start") {
        Some(START_NODE_ID)
    } else if word.eq_ignore_ascii_case("end") {
        Some(END_NODE_ID)
    } else {
        None
    }
}

/// Canonical class name for a reserved word, if `word` is one.
pub fn reserved_class(word: &str) -> Option<&'static str> {
    if word.eq_ignore_ascii_case("start") {
        Some(START_CLASS)
    } else if word.eq_ignore_ascii_case("end") {
        Some(END_CLASS)
    } else {
        None
    }
}

pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(word))
}

pub const SYNTAX_RULES: &str = r#"1. **Node IDs**: Use ONLY alphanumeric characters and underscores. NO spaces, NO hyphens, NO special characters.
   - GOOD: Auth, UserDashboard, API_Integration
   - BAD: user-auth, API Integration, ระบบ

2. **Labels with spaces or special characters**: ALWAYS use double quotes.
   - GOOD: Auth["User Authentication"]
   - GOOD: StartNode(["เริ่มต้น"])
   - BAD: Auth[User Authentication]
   - BAD: StartNode([เริ่มต้น])

3. **Non-Latin text (e.g. Thai)**: ALWAYS wrap in double quotes.
   - GOOD: A["ระบบยืนยันตัว"]
   - BAD: A[ระบบยืนยันตัว]

4. **Subgraph labels**: Use quotes for labels.
   - GOOD: subgraph Core["Core Features"]
   - BAD: subgraph Core[Core Features]

5. **No nested quotes**: Don't use double quotes inside quoted labels.

6. **Route labels**: Quote labels that begin with a slash.
   - GOOD: Login["/login"]
   - BAD: Login[/login]

7. **classDef syntax**: Must be on separate lines at the end.

8. **Reserved words**: NEVER use "end" or "start" (any casing) as a node ID or class name.
   Use "EndNode" / "StartNode" for IDs and "endNode" / "startNode" for classes."#;

pub const EXAMPLE: &str = "\
flowchart TD
    StartNode([\"Start\"]):::startNode
    Auth[\"Authentication\"]:::required
    Dashboard[\"Dashboard\"]:::required
    Settings[\"Settings\"]:::recommended
    EndNode([\"End\"]):::endNode

    StartNode --> Auth
    Auth --> Dashboard
    Dashboard --> Settings
    Settings --> EndNode

    classDef required fill:#10b981,stroke:#059669,stroke-width:2px,color:#fff
    classDef recommended fill:#3b82f6,stroke:#2563eb,stroke-width:1px,color:#fff
    classDef startNode fill:#8b5cf6,stroke:#7c3aed,stroke-width:2px,color:#fff
    classDef endNode fill:#ef4444,stroke:#dc2626,stroke-width:2px,color:#fff";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_words_map_case_insensitively() {
        assert_eq!(reserved_node_id("END"), Some(END_NODE_ID));
        assert_eq!(reserved_node_id("Start"), Some(START_NODE_ID));
        assert_eq!(reserved_class("end"), Some(END_CLASS));
        assert_eq!(reserved_node_id("ending"), None);
    }

    #[test]
    fn example_is_already_clean() {
        assert_eq!(crate::sanitize(EXAMPLE), EXAMPLE);
    }

    #[test]
    fn class_defs_use_canonical_names() {
        assert!(START_CLASS_DEF.starts_with(&format!("classDef {START_CLASS} ")));
        assert!(END_CLASS_DEF.starts_with(&format!("classDef {END_CLASS} ")));
        assert!(EXAMPLE.contains(REQUIRED_CLASS_DEF));
        assert!(EXAMPLE.contains(RECOMMENDED_CLASS_DEF));
    }
}
