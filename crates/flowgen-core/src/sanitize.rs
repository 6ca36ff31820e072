//! Deterministic repair of flowchart DSL text from an untrusted source.
//!
//! The sanitizer is an ordered list of pure `&str -> String` rules folded
//! over the input. Later rules assume the normalization done by earlier ones,
//! so the order of [`PIPELINE`] is part of the contract. No rule panics and a
//! rule that matches nothing returns its input unchanged.

use std::ops::Range;

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::rules::{
    reserved_class, reserved_node_id, DIRECTIONS, END_CLASS_DEF, INDENT, START_CLASS_DEF,
};

pub type Rule = fn(&str) -> String;

/// Rules in application order.
pub const PIPELINE: [(&str, Rule); 10] = [
    ("unescape_newlines", unescape_newlines),
    ("strip_fences", strip_fences),
    ("drop_preamble", drop_preamble),
    ("rename_reserved", rename_reserved),
    ("quote_labels", quote_labels),
    ("quote_path_labels", quote_path_labels),
    ("fix_nested_quotes", fix_nested_quotes),
    ("normalize_whitespace", normalize_whitespace),
    ("declare_terminal_classes", declare_terminal_classes),
    ("trim", trim),
];

/// Upper bound on pipeline passes while waiting for the output to settle.
const MAX_PASSES: usize = 4;

lazy_static! {
    static ref FENCE: Regex =
        Regex::new(r"(?i)```[ \t]*(?:mermaid|json|markdown|md|text)?[ \t]*\r?\n?").unwrap();
    static ref DECLARATION: Regex = Regex::new(&format!(
        r"(?i)\b(?:flowchart|graph)[ \t]+(?:{})\b",
        DIRECTIONS.join("|")
    ))
    .unwrap();
    static ref CLASS_REF: Regex = Regex::new(r"(?i):::(start|end)\b").unwrap();
    static ref NODE_BEFORE: Regex =
        Regex::new(r"(?i)\b(start|end)([ \t]*(?:<?--|<?==|-\.|&|:::)|[\[\(\{>])").unwrap();
    static ref NODE_AFTER: Regex = Regex::new(
        r"(?i)((?:<-->|-->|==>|-\.->|---|===|-\.-|--[xo]|&)(?:[ \t]*\|[^|\n]*\|)?[ \t]*)(start|end)\b"
    )
    .unwrap();
    static ref LONE_START: Regex = Regex::new(r"(?i)^([ \t]*)(start)[ \t]*;?[ \t]*$").unwrap();
    static ref EDGE_TEXT: Regex = Regex::new(
        r"(?:^|[^-=.<])(?:--|==|-\.)([ \t]+[^ \t\n][^\n]*?)[ \t]*(?:-->|==>|\.->|---|===)"
    )
    .unwrap();
    static ref CLASS_DEF_STMT: Regex = Regex::new(r"^([ \t]*classDef[ \t]+)([\w,]+)").unwrap();
    static ref CLASS_STMT: Regex =
        Regex::new(r"^([ \t]*class[ \t]+)([\w,]+)([ \t]+)([\w,]+)").unwrap();
    static ref STYLE_STMT: Regex = Regex::new(r"(?i)^([ \t]*style[ \t]+)(start|end)\b").unwrap();
    static ref BLANK_RUN: Regex = Regex::new(r"\n(?:[ \t]*\n){2,}").unwrap();
    static ref START_TOKEN: Regex = Regex::new(r"\b[Ss]tartNode\b").unwrap();
    static ref END_TOKEN: Regex = Regex::new(r"\b[Ee]ndNode\b").unwrap();
    static ref START_DECL: Regex = Regex::new(r"(?m)^[ \t]*classDef[ \t]+[\w,]*\bstartNode\b").unwrap();
    static ref END_DECL: Regex = Regex::new(r"(?m)^[ \t]*classDef[ \t]+[\w,]*\bendNode\b").unwrap();
}

/// Sanitize candidate diagram text.
///
/// The pipeline is re-applied until the output stops changing, which makes
/// `sanitize(sanitize(x)) == sanitize(x)` hold even when one rule's rewrite
/// exposes work for an earlier rule.
pub fn sanitize(input: &str) -> String {
    let mut current = apply_pipeline(input);
    for _ in 1..MAX_PASSES {
        let next = apply_pipeline(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

fn apply_pipeline(input: &str) -> String {
    PIPELINE
        .iter()
        .fold(input.to_string(), |text, (_, rule)| rule(&text))
}

// --- Rules ---

/// Turn literal `\n` sequences (a JSON escape the model left in) into newlines.
pub fn unescape_newlines(text: &str) -> String {
    text.replace("\\n", "\n")
}

pub fn strip_fences(text: &str) -> String {
    FENCE.replace_all(text, "").into_owned()
}

/// Cut everything before the first `flowchart <dir>` declaration when it is
/// preceded by anything other than whitespace.
pub fn drop_preamble(text: &str) -> String {
    match DECLARATION.find(text) {
        Some(m) if !text[..m.start()].trim().is_empty() => text[m.start()..].to_string(),
        _ => text.to_string(),
    }
}

/// Rename `start` / `end` where the grammar would read them as keywords.
pub fn rename_reserved(text: &str) -> String {
    map_lines(text, |line| {
        let trimmed = line.trim_start();
        if trimmed.starts_with("%%") {
            line.to_string()
        } else if starts_with_word(trimmed, "classDef") {
            CLASS_DEF_STMT
                .replace(line, |caps: &Captures| {
                    format!("{}{}", &caps[1], rename_list(&caps[2], reserved_class))
                })
                .into_owned()
        } else if starts_with_word(trimmed, "class") {
            CLASS_STMT
                .replace(line, |caps: &Captures| {
                    format!(
                        "{}{}{}{}",
                        &caps[1],
                        rename_list(&caps[2], reserved_node_id),
                        &caps[3],
                        rename_list(&caps[4], reserved_class)
                    )
                })
                .into_owned()
        } else if starts_with_word(trimmed, "style") {
            STYLE_STMT
                .replace(line, |caps: &Captures| {
                    format!("{}{}", &caps[1], node_id(&caps[2]))
                })
                .into_owned()
        } else {
            rename_in_statement(line, starts_with_word(trimmed, "subgraph"))
        }
    })
}

type Rename = fn(&str) -> &str;

/// Rename reserved words in a node or edge statement. Matching runs on a
/// masked copy of the line so label text is never mistaken for an id.
fn rename_in_statement(line: &str, subgraph: bool) -> String {
    let passes: [(&Regex, usize, Rename); 4] = [
        (&*CLASS_REF, 1, class_name),
        (&*NODE_BEFORE, 1, node_id),
        (&*NODE_AFTER, 2, node_id),
        (&*LONE_START, 2, node_id),
    ];
    passes
        .into_iter()
        .fold(line.to_string(), |line, (pattern, group, rename)| {
            let masked = mask(&line, &label_ranges(&line, subgraph));
            let mut out = String::with_capacity(line.len() + 8);
            let mut last = 0;
            for word in pattern.captures_iter(&masked).filter_map(|c| c.get(group)) {
                out.push_str(&line[last..word.start()]);
                out.push_str(rename(&line[word.range()]));
                last = word.end();
            }
            out.push_str(&line[last..]);
            out
        })
}

/// Byte ranges holding label text: quoted strings, shape bodies,
/// `|edge labels|` and old-style `-- edge text -->`.
fn label_ranges(line: &str, subgraph: bool) -> Vec<Range<usize>> {
    let mut ranges: Vec<Range<usize>> = scan_line(line, subgraph)
        .into_iter()
        .map(|(_, range)| range)
        .collect();
    let masked = mask(line, &ranges);
    ranges.extend(
        EDGE_TEXT
            .captures_iter(&masked)
            .filter_map(|c| c.get(1))
            .map(|m| m.range()),
    );
    ranges
}

const MASK: char = '\u{1}';

/// Replace every byte inside `ranges` with [`MASK`], keeping offsets intact.
fn mask(line: &str, ranges: &[Range<usize>]) -> String {
    let mut out = String::with_capacity(line.len());
    for (i, c) in line.char_indices() {
        if ranges.iter().any(|r| r.contains(&i)) {
            out.extend(std::iter::repeat(MASK).take(c.len_utf8()));
        } else {
            out.push(c);
        }
    }
    out
}

/// Quote labels holding whitespace or non-ASCII text. Already quoted labels
/// are left alone so a label is never quoted twice; a label that only opens
/// with a quote is re-quoted whole.
pub fn quote_labels(text: &str) -> String {
    rewrite_labels(text, |_, label| {
        if quoted_inner(label).is_some() {
            None
        } else if label.starts_with('"') {
            Some(format!("\"{}\"", label.replace('"', "'")))
        } else if needs_quotes(label) {
            Some(format!("\"{label}\""))
        } else {
            None
        }
    })
}

/// `A[/login]` reads as a parallelogram opener; quote it into a plain label.
pub fn quote_path_labels(text: &str) -> String {
    rewrite_labels(text, |shape, label| {
        if shape.open == "[" && label.starts_with('/') {
            Some(format!("\"{label}\""))
        } else {
            None
        }
    })
}

/// Inside quoted labels, turn nested double quotes into single quotes.
pub fn fix_nested_quotes(text: &str) -> String {
    rewrite_labels(text, |_, label| {
        let inner = quoted_inner(label)?;
        if inner.contains('"') {
            Some(format!("\"{}\"", inner.replace('"', "'")))
        } else {
            None
        }
    })
}

pub fn normalize_whitespace(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    BLANK_RUN.replace_all(&text, "\n\n").into_owned()
}

/// Declare `startNode` / `endNode` when the renamed tokens are used but the
/// model never declared the class.
pub fn declare_terminal_classes(text: &str) -> String {
    let missing: Vec<&str> = [
        (&*START_TOKEN, &*START_DECL, START_CLASS_DEF),
        (&*END_TOKEN, &*END_DECL, END_CLASS_DEF),
    ]
    .into_iter()
    .filter(|(token, decl, _)| token.is_match(text) && !decl.is_match(text))
    .map(|(_, _, line)| line)
    .collect();

    if missing.is_empty() {
        return text.to_string();
    }

    let mut out = text.trim_end().to_string();
    for line in missing {
        out.push('\n');
        out.push_str(INDENT);
        out.push_str(line);
    }
    out
}

pub fn trim(text: &str) -> String {
    text.trim().to_string()
}

// --- Reserved-word helpers ---

fn node_id(word: &str) -> &str {
    reserved_node_id(word).unwrap_or(word)
}

fn class_name(word: &str) -> &str {
    reserved_class(word).unwrap_or(word)
}

fn rename_list(list: &str, rename: fn(&str) -> Option<&'static str>) -> String {
    list.split(',')
        .map(|name| rename(name).unwrap_or(name))
        .collect::<Vec<_>>()
        .join(",")
}

fn starts_with_word(line: &str, word: &str) -> bool {
    line.strip_prefix(word)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with([' ', '\t']))
}

fn map_lines(text: &str, f: impl Fn(&str) -> String) -> String {
    text.split('\n').map(f).collect::<Vec<_>>().join("\n")
}

// --- Label scanning ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shape {
    pub open: &'static str,
    pub close: &'static str,
}

/// Node shapes, longest opener first so `([` wins over `(`.
const SHAPES: [Shape; 9] = [
    Shape { open: "([", close: "])" },
    Shape { open: "[[", close: "]]" },
    Shape { open: "[(", close: ")]" },
    Shape { open: "((", close: "))" },
    Shape { open: "{{", close: "}}" },
    Shape { open: "[", close: "]" },
    Shape { open: "(", close: ")" },
    Shape { open: "{", close: "}" },
    Shape { open: ">", close: "]" },
];

/// Statements whose brackets are not node labels.
const NON_NODE_STATEMENTS: [&str; 6] = ["%%", "classDef", "class", "style", "linkStyle", "click"];

/// Node ids are any run of letters, digits, `_` or other non-ASCII text.
fn is_ident_char(c: char) -> bool {
    c == '_' || c.is_alphanumeric() || !(c.is_ascii() || c.is_whitespace())
}

fn needs_quotes(label: &str) -> bool {
    !label.is_ascii() || label.trim().contains(char::is_whitespace)
}

fn quoted_inner(label: &str) -> Option<&str> {
    if label.len() >= 2 && label.starts_with('"') && label.ends_with('"') {
        Some(&label[1..label.len() - 1])
    } else {
        None
    }
}

/// Rewrite every node (and subgraph) label in `text`. `rewrite` returns the
/// replacement label, or `None` to keep the label unchanged.
fn rewrite_labels(text: &str, rewrite: impl Fn(Shape, &str) -> Option<String>) -> String {
    map_lines(text, |line| {
        let trimmed = line.trim_start();
        let skip = NON_NODE_STATEMENTS.iter().any(|kw| {
            if *kw == "%%" {
                trimmed.starts_with(kw)
            } else {
                starts_with_word(trimmed, kw)
            }
        });
        if skip {
            line.to_string()
        } else {
            rewrite_line_labels(line, starts_with_word(trimmed, "subgraph"), &rewrite)
        }
    })
}

fn rewrite_line_labels(
    line: &str,
    subgraph: bool,
    rewrite: &impl Fn(Shape, &str) -> Option<String>,
) -> String {
    let mut out = String::with_capacity(line.len() + 8);
    let mut last = 0;
    for (shape, range) in scan_line(line, subgraph) {
        let Some(shape) = shape else { continue };
        if let Some(new_label) = rewrite(shape, &line[range.clone()]) {
            out.push_str(&line[last..range.start]);
            out.push_str(&new_label);
            last = range.end;
        }
    }
    out.push_str(&line[last..]);
    out
}

/// Find the text spans of one line: shape bodies (with their shape), and
/// the insides of quoted strings and `|edge labels|` outside any shape
/// (with `None`). Ranges exclude the delimiters.
fn scan_line(line: &str, subgraph: bool) -> Vec<(Option<Shape>, Range<usize>)> {
    let mut spans = Vec::new();
    let mut i = 0;

    while let Some(c) = line[i..].chars().next() {
        if c == '"' || c == '|' {
            let start = i + 1;
            let end = line[start..].find(c).map_or(line.len(), |n| start + n);
            spans.push((None, start..end));
            i = (end + 1).min(line.len());
            continue;
        }

        if !is_ident_char(c) {
            i += c.len_utf8();
            continue;
        }

        i += line[i..]
            .find(|ch: char| !is_ident_char(ch))
            .unwrap_or(line.len() - i);

        // `subgraph Core [Core Features]` allows a gap before the label.
        let gap = if subgraph {
            let rest = &line[i..];
            rest.len() - rest.trim_start_matches([' ', '\t']).len()
        } else {
            0
        };
        if let Some((shape, label, consumed)) = match_shape(&line[i + gap..]) {
            let start = i + gap + shape.open.len();
            spans.push((Some(shape), start..start + label.len()));
            i += gap + consumed;
        }
    }
    spans
}

/// Match a shape at the start of `s`; returns the shape, its raw label and
/// the number of bytes consumed including both delimiters.
fn match_shape(s: &str) -> Option<(Shape, &str, usize)> {
    SHAPES.iter().find_map(|&shape| {
        let body = s.strip_prefix(shape.open)?;
        let quoted_end = if body.starts_with('"') {
            let closing = format!("\"{}", shape.close);
            body[1..].find(&closing).map(|i| i + 2)
        } else {
            None
        };
        let end = quoted_end.or_else(|| body.find(shape.close))?;
        Some((shape, &body[..end], shape.open.len() + end + shape.close.len()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn unescapes_literal_newlines() {
        assert_eq!(unescape_newlines("flowchart TD\\nA-->B"), "flowchart TD\nA-->B");
    }

    #[test]
    fn strips_fences_with_language_tags() {
        let text = "```mermaid\nflowchart TD\n    A --> B\n```";
        assert_eq!(strip_fences(text), "flowchart TD\n    A --> B\n");
        assert_eq!(strip_fences("```json\n{}\n```"), "{}\n");
    }

    #[test]
    fn drops_preamble_before_declaration() {
        let text = "Here is your diagram:\nflowchart LR\n    A --> B";
        assert_eq!(drop_preamble(text), "flowchart LR\n    A --> B");
        assert_eq!(drop_preamble("  flowchart TD\nA"), "  flowchart TD\nA");
        assert_eq!(drop_preamble("no diagram here"), "no diagram here");
    }

    #[test]
    fn renames_reserved_class_references_and_declarations() {
        let text = "A:::end\nB:::Start\nclassDef end fill:#f00\nclassDef start,required fill:#0f0";
        assert_eq!(
            rename_reserved(text),
            "A:::endNode\nB:::startNode\nclassDef endNode fill:#f00\nclassDef startNode,required fill:#0f0"
        );
    }

    #[test]
    fn renames_reserved_node_ids_on_both_sides_of_edges() {
        assert_eq!(rename_reserved("start --> A"), "StartNode --> A");
        assert_eq!(rename_reserved("A-->End"), "A-->EndNode");
        assert_eq!(rename_reserved("A -->|done| end"), "A -->|done| EndNode");
        assert_eq!(rename_reserved("START-.->A"), "StartNode-.->A");
        assert_eq!(rename_reserved("End([\"End\"])"), "EndNode([\"End\"])");
        assert_eq!(rename_reserved("end[Finish]"), "EndNode[Finish]");
    }

    #[test]
    fn renames_in_class_and_style_statements() {
        assert_eq!(rename_reserved("    class End,A end"), "    class EndNode,A endNode");
        assert_eq!(rename_reserved("style start fill:#fff"), "style StartNode fill:#fff");
    }

    #[test]
    fn rename_leaves_longer_identifiers_and_subgraph_end_alone() {
        let text = "subgraph Core\n    weekend --> endpoint\n    EndNode --> StartNode\nend";
        assert_eq!(rename_reserved(text), text);
    }

    #[test]
    fn rename_never_touches_quoted_text() {
        let text = "A[\"go to end(now)\"] --> B[\"start --> here\"]";
        assert_eq!(rename_reserved(text), text);
    }

    #[test]
    fn rename_leaves_label_text_alone() {
        for text in [
            "A[Login & Start] --> B",
            "A[Press Start(now)]",
            "A-- start -->B",
            "A -->|go to end(now)| B",
            "subgraph S [Start here]",
        ] {
            assert_eq!(rename_reserved(text), text);
        }
        assert_eq!(rename_reserved("start-- go -->end"), "StartNode-- go -->EndNode");
        assert_eq!(rename_reserved("end[Start(x)] --> B"), "EndNode[Start(x)] --> B");
    }

    #[test]
    fn label_words_do_not_trigger_terminal_classes() {
        assert_eq!(
            sanitize("flowchart TD\nA[Login & Start] --> B"),
            "flowchart TD\nA[\"Login & Start\"] --> B"
        );
    }

    #[test]
    fn renames_lone_start_but_not_lone_end() {
        assert_eq!(rename_reserved("A --> B\n    start"), "A --> B\n    StartNode");
        assert_eq!(rename_reserved("Start;"), "StartNode;");
        assert_eq!(rename_reserved("subgraph S\n    A\nend"), "subgraph S\n    A\nend");
    }

    #[test]
    fn quotes_labels_after_non_ascii_ids() {
        assert_eq!(
            sanitize("flowchart TD\nระบบ[ข้อมูล ลูกค้า] --> B"),
            "flowchart TD\nระบบ[\"ข้อมูล ลูกค้า\"] --> B"
        );
    }

    #[test]
    fn requotes_partially_quoted_labels() {
        assert_eq!(quote_labels("A[\"x\" y]"), "A[\"'x' y\"]");
        assert_eq!(quote_labels("B(\"open)"), "B(\"'open\")");
        assert_eq!(sanitize("flowchart TD\nA[\"x\" y] --> B"), "flowchart TD\nA[\"'x' y\"] --> B");
    }

    #[test]
    fn quotes_labels_with_spaces_or_non_ascii() {
        assert_eq!(quote_labels("A[สวัสดี]"), "A[\"สวัสดี\"]");
        assert_eq!(quote_labels("    Auth[User Login] --> B"), "    Auth[\"User Login\"] --> B");
        assert_eq!(quote_labels("S([เริ่มต้น])"), "S([\"เริ่มต้น\"])");
        assert_eq!(quote_labels("D{Is valid?}"), "D{\"Is valid?\"}");
        assert_eq!(quote_labels("H{{Two words}}"), "H{{\"Two words\"}}");
        assert_eq!(quote_labels("Db[(Main DB)]"), "Db[(\"Main DB\")]");
        assert_eq!(quote_labels("F>Flag it]"), "F>\"Flag it\"]");
    }

    #[test]
    fn quote_labels_skips_plain_and_quoted_labels() {
        let text = "A[Auth] --> B[\"Already quoted\"]\nC(Single)";
        assert_eq!(quote_labels(text), text);
    }

    #[test]
    fn quotes_subgraph_labels_with_gap() {
        assert_eq!(
            quote_labels("subgraph Core [Core Features]"),
            "subgraph Core [\"Core Features\"]"
        );
        assert_eq!(
            quote_labels("subgraph Core[ระบบหลัก]"),
            "subgraph Core[\"ระบบหลัก\"]"
        );
    }

    #[test]
    fn quote_labels_ignores_edge_labels_and_style_lines() {
        let text = "A -->|go to (the) end| B\nstyle A fill:#fff";
        assert_eq!(quote_labels(text), text);
    }

    #[test]
    fn quotes_path_labels() {
        assert_eq!(quote_path_labels("Login[/login]"), "Login[\"/login\"]");
        assert_eq!(quote_path_labels("P[\"/posts\"]"), "P[\"/posts\"]");
    }

    #[test]
    fn replaces_nested_quotes_inside_labels() {
        assert_eq!(fix_nested_quotes("A[\"a\"b\"c\"]"), "A[\"a'b'c\"]");
        assert_eq!(fix_nested_quotes("A([\"say \"hi\"\"])"), "A([\"say 'hi'\"])");
    }

    #[test]
    fn nested_quote_fix_skips_class_lines() {
        let text = "classDef x content:\"a\"b\"\"";
        assert_eq!(fix_nested_quotes(text), text);
    }

    #[test]
    fn normalizes_line_endings_and_blank_runs() {
        assert_eq!(normalize_whitespace("A\r\nB\rC"), "A\nB\nC");
        assert_eq!(normalize_whitespace("A\n\n\n\nB"), "A\n\nB");
        assert_eq!(normalize_whitespace("A\n  \n\t\n\nB"), "A\n\nB");
        assert_eq!(normalize_whitespace("A\n\nB"), "A\n\nB");
    }

    #[test]
    fn declares_missing_terminal_classes() {
        let text = "flowchart TD\n    A --> EndNode\n";
        assert_eq!(
            declare_terminal_classes(text),
            format!("flowchart TD\n    A --> EndNode\n    {END_CLASS_DEF}")
        );

        let declared = format!("flowchart TD\n    A:::startNode\n    {START_CLASS_DEF}");
        assert_eq!(declare_terminal_classes(&declared), declared);
        assert_eq!(declare_terminal_classes("flowchart TD\nA-->B"), "flowchart TD\nA-->B");
    }

    #[test]
    fn scenario_thai_label_is_quoted() {
        assert_eq!(sanitize("flowchart TD\nA[สวัสดี]"), "flowchart TD\nA[\"สวัสดี\"]");
    }

    #[test]
    fn scenario_nested_quotes_become_single_quotes() {
        assert_eq!(sanitize("flowchart TD\nA[\"a\"b\"c\"]"), "flowchart TD\nA[\"a'b'c\"]");
    }

    #[test]
    fn full_pipeline_repairs_a_typical_response() {
        let raw = "Sure! Here it is:\n```mermaid\nflowchart TD\\n    Start([เริ่มต้น]):::start\\n    Start --> Cart[Shopping Cart]\\n    Cart --> Pay[/checkout]\\n    Pay --> End\\n\\n\\n\\n    classDef start fill:#8b5cf6\\n```";
        let expected = format!(
            "flowchart TD\n    StartNode([\"เริ่มต้น\"]):::startNode\n    StartNode --> Cart[\"Shopping Cart\"]\n    Cart --> Pay[\"/checkout\"]\n    Pay --> EndNode\n\n    classDef startNode fill:#8b5cf6\n    {END_CLASS_DEF}"
        );
        assert_eq!(sanitize(raw), expected);
    }

    #[test]
    fn sanitize_of_empty_or_prose_input_does_not_panic() {
        assert_eq!(sanitize(""), "");
        assert_eq!(sanitize("   \n\n "), "");
        assert_eq!(sanitize("I cannot draw that."), "I cannot draw that.");
        assert_eq!(sanitize("A[\"unterminated"), "A[\"unterminated");
    }

    // ===================
    // Properties
    // ===================

    fn fragment() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("flowchart TD".to_string()),
            Just("graph LR".to_string()),
            Just("```mermaid".to_string()),
            Just("```".to_string()),
            Just("".to_string()),
            Just("   ".to_string()),
            Just("end".to_string()),
            Just("subgraph Core[Core Features]".to_string()),
            Just("classDef end fill:#f00".to_string()),
            Just("classDef startNode fill:#0f0".to_string()),
            Just("class A,End start".to_string()),
            Just("style End fill:#fff".to_string()),
            Just("%% comment with end[x]".to_string()),
            Just("A[\"a\"b\"c\"]".to_string()),
            Just("Login[/login]".to_string()),
            Just("A -->|yes| End".to_string()),
            Just("Start([เริ่ม]) --> B{Is it?}".to_string()),
            "[A-Z][a-z]{0,5}".prop_map(|id| format!("{id}[{id} label] --> end")),
            "[a-z]{1,6}".prop_map(|w| format!("start --> {w}:::end")),
            "[ก-๙ a-z]{1,8}".prop_map(|l| format!("N[{l}]")),
            "[a-z\" ]{1,8}".prop_map(|l| format!("Q[\"{l}\"]")),
        ]
    }

    fn diagram_text() -> impl Strategy<Value = String> {
        (
            proptest::collection::vec(fragment(), 0..12),
            prop_oneof![Just("\n"), Just("\r\n"), Just("\\n")],
            prop_oneof![Just(""), Just("Here you go:\n"), Just("  ")],
        )
            .prop_map(|(lines, sep, preamble)| format!("{preamble}{}", lines.join(sep)))
    }

    fn unquoted_labels(text: &str) -> Vec<String> {
        let found = std::cell::RefCell::new(Vec::new());
        rewrite_labels(text, |_, label| {
            if !label.starts_with('"') {
                found.borrow_mut().push(label.to_string());
            }
            None
        });
        found.into_inner()
    }

    proptest! {
        #[test]
        fn sanitize_is_idempotent(text in diagram_text()) {
            let once = sanitize(&text);
            prop_assert_eq!(sanitize(&once), once);
        }

        #[test]
        fn sanitize_is_idempotent_on_arbitrary_text(text in "\\PC{0,80}") {
            let once = sanitize(&text);
            prop_assert_eq!(sanitize(&once), once);
        }

        #[test]
        fn reserved_words_never_survive_as_ids_or_classes(
            word in prop_oneof![Just("start"), Just("end"), Just("Start"), Just("END")],
            other in "[A-Z][a-z]{0,5}",
        ) {
            let text = format!(
                "flowchart TD\n{word}[Go] --> {other}\n{other} --> {word}\n{other}:::{word}\nclassDef {word} fill:#fff"
            );
            let out = sanitize(&text);
            let standalone = Regex::new(r"(?i)(^|[^\w])(start|end)([^\w]|$)").unwrap();
            for line in out.lines() {
                prop_assert!(!standalone.is_match(line), "reserved word left in {:?}", line);
            }
        }

        #[test]
        fn labels_needing_quotes_are_quoted_exactly_once(
            id in "[A-Za-zก-ฮ][a-z0-9ก-ฮ]{0,4}",
            label in "[a-zก-๙]{1,6}( [a-zก-๙]{1,6}){0,2}",
        ) {
            prop_assume!(reserved_node_id(&id).is_none());
            let text = format!("flowchart TD\n    {id}[{label}] --> M([{label}])");
            let out = sanitize(&text);
            if needs_quotes(&label) {
                prop_assert!(unquoted_labels(&out).is_empty());
                let quoted = format!("\"{label}\"");
                prop_assert_eq!(out.matches(&quoted).count(), 2);
                let double = format!("\"\"{label}");
                prop_assert!(!out.contains(&double));
            } else {
                prop_assert_eq!(out, text.trim().to_string());
            }
        }
    }
}
