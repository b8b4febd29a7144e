//! Text normalization helpers shared by the parser and the controller

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref LATEX_PAREN: Regex = Regex::new(r"(?s)\\\((.*?)\\\)").unwrap();
    static ref LATEX_BRACKET: Regex = Regex::new(r"(?s)\\\[(.*?)\\\]").unwrap();
    static ref ANSI_ESCAPE: Regex = Regex::new(r"\x1b\[[0-9;]*[a-zA-Z]").unwrap();
}

/// Strip ANSI color/control sequences (Python tracebacks arrive colorized).
pub fn clean_ansi(text: &str) -> String {
    ANSI_ESCAPE.replace_all(text, "").into_owned()
}

/// Rewrite LaTeX `\(...\)` and `\[...\]` delimiters to dollar-delimited form.
///
/// Downstream renderers only understand the `$$...$$` display style, while the
/// model freely mixes all three.
pub fn replace_latex_format(s: &str) -> String {
    // "$$" is an escaped literal "$" in replacement syntax
    let s = LATEX_PAREN.replace_all(s, "$$$$${1}$$$$");
    LATEX_BRACKET.replace_all(&s, "$$$$${1}$$$$").into_owned()
}

/// Middle-truncate long output, keeping roughly the first and last
/// `segment_len` characters on line boundaries, joined by an ellipsis marker.
///
/// Used to keep sandbox error tracebacks within LLM context limits. Output at
/// or under `max_len` is returned unchanged.
pub fn truncate_middle(output: &str, max_len: usize, segment_len: usize) -> String {
    if output.len() <= max_len {
        return output.to_string();
    }

    let rows: Vec<&str> = output.split('\n').collect();

    let mut top = Vec::new();
    let mut length = 0;
    for row in &rows {
        if length + row.len() > segment_len {
            break;
        }
        top.push(*row);
        length += row.len();
    }

    let mut bottom = Vec::new();
    let mut length = 0;
    for row in rows.iter().rev() {
        if length + row.len() > segment_len {
            break;
        }
        bottom.insert(0, *row);
        length += row.len();
    }

    let mut joined = top;
    joined.push("......");
    joined.extend(bottom);
    joined.join("\n")
}

/// True if the text contains any CJK unified ideograph.
///
/// Used to auto-select the CN locale when the caller does not force one.
pub fn contains_chinese(input: &str) -> bool {
    input.chars().any(|c| ('\u{4e00}'..='\u{9fff}').contains(&c))
}
