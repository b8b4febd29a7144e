//! Output parser for raw LLM text
//!
//! Turns one completion into either a final answer, an executable action, or a
//! classified parse failure. The matching is literal-substring and regex based
//! by necessity: the "Thought/Action/Action Input/Observation" template is the
//! de facto wire protocol with the model, so the strings here must stay in
//! lockstep with the prompt templates.

use lazy_static::lazy_static;
use regex::Regex;

use super::messages::Locale;
use super::protocol::ScratchpadEntry;
use super::text::replace_latex_format;

/// Phrases that signal a final answer, checked in order (case-sensitive).
pub const FINAL_ANSWER_INDICATORS: &[&str] =
    &["Final Answer:", "[END]", "The final Answer", "final answer"];

/// Markers at which the completion is truncated: the model has started
/// hallucinating the next turn past this point. English-only by design; the CN
/// prompt cadence still uses the English keywords.
pub const STOP_WORDS: &[&str] = &["Observation:"];

pub const CODE_BLOCK_START_TAG: &str = "```python";
pub const CODE_BLOCK_TAG: &str = "```";

lazy_static! {
    // Each pattern has two branches: the fenced Action/Action Input form and a
    // triple-quoted fallback some models emit instead.
    static ref ACTION_PYTHON: Regex = Regex::new(
        r"(?s)(.*?)\n?Action:\s*(.*?)\n?Action\s*Input:\s*```python\n(.*?)```(.*?)$|(?s)(.*?)\n?'''(\w+)\n?(.*?)\n?'''(.*?)$"
    )
    .unwrap();
    static ref ACTION_PY: Regex = Regex::new(
        r"(?s)(.*?)\n?Action:\s*(.*?)\n?Action\s*Input:\s*```py\n(.*?)```(.*?)$|(?s)(.*?)\n?'''(\w+)\n?(.*?)\n?'''(.*?)$"
    )
    .unwrap();
    static ref ACTION_LABEL: Regex = Regex::new(r"Action\s*:").unwrap();
    static ref ACTION_INPUT_LABEL: Regex = Regex::new(r"Action\s*Input\s*:").unwrap();
}

/// Classified failure to interpret a completion, checked in priority order.
#[derive(Debug, Clone)]
pub enum ParseError {
    MissingAction(String),
    MissingActionInput(String),
    UnrecognizedFormat(String),
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::MissingAction(out) => {
                write!(f, "Missing 'Action' in LLM output: `{}`", out)
            }
            ParseError::MissingActionInput(out) => {
                write!(f, "Missing 'Action Input' in LLM output: `{}`", out)
            }
            ParseError::UnrecognizedFormat(out) => {
                write!(f, "Unrecognized LLM output format: `{}`", out)
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// Parse one completion into a Finish or an Action.
///
/// Only the `Action` and `Finish` scratchpad variants are ever produced here;
/// observations are created by the controller after tool dispatch.
pub fn parse(llm_output: &str, locale: Locale) -> Result<ScratchpadEntry, ParseError> {
    let mut llm_output = llm_output;
    for stop_word in STOP_WORDS {
        if let Some(idx) = llm_output.find(stop_word) {
            llm_output = llm_output[..idx].trim_end();
            break;
        }
    }

    // Final answer short-circuits everything else
    for indicator in FINAL_ANSWER_INDICATORS {
        if llm_output.contains(indicator) {
            let formatted: String = llm_output.split(indicator).collect();
            let formatted = replace_latex_format(formatted.trim());
            return Ok(ScratchpadEntry::Finish {
                raw_output: llm_output.to_string(),
                formatted_output: formatted,
            });
        }
    }

    let captures = ACTION_PYTHON
        .captures(llm_output)
        .or_else(|| ACTION_PY.captures(llm_output));

    if let Some(caps) = captures {
        // Groups 1-3 for the fenced branch, 5-7 for the triple-quote fallback
        let group = |a: usize, b: usize| {
            caps.get(a)
                .or_else(|| caps.get(b))
                .map(|m| m.as_str().trim())
                .unwrap_or("")
        };
        let context = group(1, 5);
        let tool_name = group(2, 6);
        let tool_input = group(3, 7);

        let code_block = format_code_block(tool_input);
        let formatted = format!("{}\n{}\n{}\n", context, locale.tool_input_prefix(), code_block);
        let formatted = replace_latex_format(&formatted);

        return Ok(ScratchpadEntry::Action {
            raw_output: llm_output.to_string(),
            formatted_output: formatted,
            tool_name: tool_name.to_string(),
            tool_input: code_block,
        });
    }

    // Neither a final answer nor an action: classify what is missing
    if !ACTION_LABEL.is_match(llm_output) {
        Err(ParseError::MissingAction(llm_output.to_string()))
    } else if !ACTION_INPUT_LABEL.is_match(llm_output) {
        Err(ParseError::MissingActionInput(llm_output.to_string()))
    } else {
        Err(ParseError::UnrecognizedFormat(llm_output.to_string()))
    }
}

/// Normalize extracted code into a canonical ```` ```python ```` fence.
///
/// Idempotent: re-wrapping already-canonical output returns it unchanged.
pub fn format_code_block(tool_input: &str) -> String {
    let stripped = tool_input.trim();

    if stripped.starts_with(CODE_BLOCK_START_TAG) && stripped.ends_with(CODE_BLOCK_TAG) {
        if !stripped.starts_with(&format!("{}\n", CODE_BLOCK_START_TAG)) {
            format!(
                "{}\n{}\n",
                CODE_BLOCK_START_TAG,
                &stripped[CODE_BLOCK_START_TAG.len()..]
            )
        } else {
            stripped.to_string()
        }
    } else if stripped.starts_with(CODE_BLOCK_TAG)
        && !stripped.starts_with(CODE_BLOCK_START_TAG)
        && stripped.ends_with(CODE_BLOCK_TAG)
    {
        format!("{}\n{}\n", CODE_BLOCK_START_TAG, &stripped[CODE_BLOCK_TAG.len()..])
    } else {
        format!("{}\n{}\n{}\n", CODE_BLOCK_START_TAG, stripped, CODE_BLOCK_TAG)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_final_answer_indicator_returns_finish() {
        for indicator in FINAL_ANSWER_INDICATORS {
            let output = format!("Thought: done\n{} the mean is 4.2", indicator);
            let step = parse(&output, Locale::En).unwrap();
            assert!(step.is_finish(), "indicator {:?} not detected", indicator);
        }
    }

    #[test]
    fn test_finish_removes_indicator_and_normalizes_latex() {
        let output = r"Final Answer: the mean is \(42\)";
        let step = parse(output, Locale::En).unwrap();
        match step {
            ScratchpadEntry::Finish { formatted_output, .. } => {
                assert_eq!(formatted_output, "the mean is $$42$$");
            }
            other => panic!("expected Finish, got {:?}", other),
        }
    }

    #[test]
    fn test_action_with_python_fence() {
        let output = "Thought: I should load the data\nAction: python_code_sandbox\nAction Input: ```python\nprint(1 + 1)\n```";
        let step = parse(output, Locale::En).unwrap();
        match step {
            ScratchpadEntry::Action { tool_name, tool_input, formatted_output, .. } => {
                assert_eq!(tool_name, "python_code_sandbox");
                assert_eq!(tool_input, "```python\nprint(1 + 1)\n```\n");
                assert!(formatted_output.contains("Thought: I should load the data"));
                assert!(formatted_output.contains(Locale::En.tool_input_prefix()));
            }
            other => panic!("expected Action, got {:?}", other),
        }
    }

    #[test]
    fn test_action_with_py_fence() {
        let output = "Action: sandbox\nAction Input: ```py\nx = 5\n```";
        let step = parse(output, Locale::En).unwrap();
        match step {
            ScratchpadEntry::Action { tool_input, .. } => {
                assert_eq!(tool_input, "```python\nx = 5\n```\n");
            }
            other => panic!("expected Action, got {:?}", other),
        }
    }

    #[test]
    fn test_action_empty_context() {
        let output = "Action: sandbox\nAction Input: ```python\npass\n```";
        let step = parse(output, Locale::En).unwrap();
        match step {
            ScratchpadEntry::Action { formatted_output, .. } => {
                assert!(formatted_output.starts_with('\n'));
            }
            other => panic!("expected Action, got {:?}", other),
        }
    }

    #[test]
    fn test_triple_quote_fallback() {
        let output = "'''python\nprint('hi')\n'''";
        let step = parse(output, Locale::En).unwrap();
        match step {
            ScratchpadEntry::Action { tool_name, tool_input, .. } => {
                assert_eq!(tool_name, "python");
                assert!(tool_input.contains("print('hi')"));
            }
            other => panic!("expected Action, got {:?}", other),
        }
    }

    #[test]
    fn test_stop_word_truncates_hallucinated_turn() {
        let output = "Action: sandbox\nAction Input: ```python\nprint(9)\n```\nObservation: 9\nThought: next";
        let step = parse(output, Locale::En).unwrap();
        match step {
            ScratchpadEntry::Action { raw_output, .. } => {
                assert!(!raw_output.contains("Observation:"));
            }
            other => panic!("expected Action, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_action_classified_first() {
        let err = parse("I will just think about it.", Locale::En).unwrap_err();
        assert!(matches!(err, ParseError::MissingAction(_)));
    }

    #[test]
    fn test_missing_action_input_classified_second() {
        let err = parse("Action: sandbox\nno input follows", Locale::En).unwrap_err();
        assert!(matches!(err, ParseError::MissingActionInput(_)));
    }

    #[test]
    fn test_unrecognized_format_classified_last() {
        // Both labels present but the fence is malformed (never closed)
        let err = parse("Action: sandbox\nAction Input: ```python\nx = 1", Locale::En).unwrap_err();
        assert!(matches!(err, ParseError::UnrecognizedFormat(_)));
    }

    #[test]
    fn test_format_code_block_wraps_bare_code() {
        assert_eq!(format_code_block("x = 1"), "```python\nx = 1\n```\n");
    }

    #[test]
    fn test_format_code_block_idempotent() {
        let once = format_code_block("print('x')");
        let twice = format_code_block(&once);
        assert_eq!(format_code_block(&twice), twice);
    }

    #[test]
    fn test_format_code_block_inline_fence_normalized() {
        // Tag present but without a newline after it
        let formatted = format_code_block("```pythonx = 1\n```");
        assert!(formatted.starts_with("```python\n"));
        assert!(formatted.ends_with("\n"));
    }
}
