//! Prompt composition
//!
//! A `PromptTemplate` carries the template text, its declared input variables,
//! and keyword overrides for the scratchpad cadence. Placeholder validity is
//! checked once at construction; `format` only checks that every declared
//! variable was supplied.

use std::collections::HashMap;

use super::protocol::ScratchpadEntry;

pub const OBSERVATION_KEY: &str = "Observation";
pub const THOUGHT_KEY: &str = "Thought";
pub const FINAL_ANSWER_KEY: &str = "FinalAnswer";

pub const DEFAULT_OBSERVATION: &str = "Observation:";
pub const DEFAULT_THOUGHT: &str = "Thought:";
pub const DEFAULT_FINAL_ANSWER: &str = "Final Answer:";

const ZERO_SHOT_REACT_TEMPLATE: &str = "Answer the following questions as best you can.\
You have access to the following tools:\n\
{tool_description}.\n\
Use the following format:\n\n\
Question: the input question you must answer\n\
Thought: you should always think about what to do\n\n\
Action: the action to take, should be one of [{tool_names}]\n\n\
Action Input:\n```python\n[the input to the action]\n```\n\
Observation: the result of the action\n\n\
... (this Thought/Action/Action Input/Observation can repeat N times)\n\
Thought: I now know the final answer\n\
Final Answer: the final answer to the original input question\n\
If you have any files outputted write them to \"./\"\n\
Do not use things like plot.show() as it will not work instead write them out \"./\"\n\
Begin!\n\n\
Question: {instruction}\nThought:\n\
{agent_scratchpad}\n";

const SIMPLE_REACT_TEMPLATE: &str = "{instruction} \n{agent_scratchpad}";

/// Error raised for template misconfiguration or missing format inputs.
#[derive(Debug)]
pub enum PromptError {
    /// The template references a placeholder not declared as an input variable.
    InvalidTemplate(String),
    /// `format` was called without one or more declared variables.
    MissingVariables(Vec<String>),
}

impl std::fmt::Display for PromptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PromptError::InvalidTemplate(msg) => {
                write!(f, "Invalid prompt template; check for mismatched or missing input parameters: {}", msg)
            }
            PromptError::MissingVariables(keys) => {
                write!(f, "Missing keys in prompt template: {}", keys.join(", "))
            }
        }
    }
}

impl std::error::Error for PromptError {}

/// A validated prompt template.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    name: String,
    template: String,
    input_variables: Vec<String>,
    keywords: HashMap<String, String>,
}

impl PromptTemplate {
    /// Build a template, validating that every `{placeholder}` in the text is
    /// covered by `input_variables`. `{{` and `}}` are literal braces.
    pub fn new(
        name: impl Into<String>,
        template: impl Into<String>,
        input_variables: Vec<String>,
        keywords: HashMap<String, String>,
    ) -> Result<Self, PromptError> {
        let template = template.into();
        for placeholder in placeholders(&template)? {
            if !input_variables.iter().any(|v| v == &placeholder) {
                return Err(PromptError::InvalidTemplate(format!(
                    "undeclared placeholder `{}`",
                    placeholder
                )));
            }
        }
        Ok(Self {
            name: name.into(),
            template,
            input_variables,
            keywords,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn input_variables(&self) -> &[String] {
        &self.input_variables
    }

    fn keyword(&self, key: &str, default: &'static str) -> String {
        self.keywords.get(key).cloned().unwrap_or_else(|| default.to_string())
    }

    /// Substitute every declared variable into the template. Every declared
    /// variable must be present in `vars`; unknown supplied keys are ignored.
    pub fn format(&self, vars: &HashMap<&str, String>) -> Result<String, PromptError> {
        let missing: Vec<String> = self
            .input_variables
            .iter()
            .filter(|v| !vars.contains_key(v.as_str()))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(PromptError::MissingVariables(missing));
        }

        let mut out = self.template.clone();
        for var in &self.input_variables {
            let value = &vars[var.as_str()];
            out = out.replace(&format!("{{{}}}", var), value);
        }
        Ok(out.replace("{{", "{").replace("}}", "}"))
    }

    /// Reconstruct the scratchpad text that lets the model continue its own
    /// prior reasoning: each Action contributes its raw text, each Observation
    /// an "Observation:" block followed by a "Thought:" continuation cue.
    pub fn construct_scratchpad(&self, intermediate_steps: &[ScratchpadEntry]) -> String {
        let mut thoughts = String::new();
        for step in intermediate_steps {
            match step {
                ScratchpadEntry::Action { raw_output, .. } => {
                    thoughts.push_str(raw_output);
                }
                ScratchpadEntry::Observation { formatted_output, .. } => {
                    thoughts.push_str(&format!(
                        "\n{}\n{}\n\n{}\n",
                        self.keyword(OBSERVATION_KEY, DEFAULT_OBSERVATION),
                        formatted_output,
                        self.keyword(THOUGHT_KEY, DEFAULT_THOUGHT),
                    ));
                }
                ScratchpadEntry::Finish { .. } => {}
            }
        }
        thoughts
    }

    /// The zero-shot template spelling out the full ReAct cadence.
    pub fn zero_shot_react() -> Self {
        let mut keywords = HashMap::new();
        keywords.insert(OBSERVATION_KEY.to_string(), DEFAULT_OBSERVATION.to_string());
        keywords.insert(THOUGHT_KEY.to_string(), DEFAULT_THOUGHT.to_string());
        keywords.insert(FINAL_ANSWER_KEY.to_string(), DEFAULT_FINAL_ANSWER.to_string());
        // Built-in templates are known-valid
        Self::new(
            "ZeroShotReactPrompt",
            ZERO_SHOT_REACT_TEMPLATE,
            vec![
                "instruction".to_string(),
                "agent_scratchpad".to_string(),
                "tool_names".to_string(),
                "tool_description".to_string(),
            ],
            keywords,
        )
        .expect("built-in template is valid")
    }

    /// Minimal template for models fine-tuned on the bare cadence.
    pub fn simple_react() -> Self {
        let mut keywords = HashMap::new();
        keywords.insert(OBSERVATION_KEY.to_string(), "[EOS]Observation:".to_string());
        keywords.insert(THOUGHT_KEY.to_string(), "[SEP]".to_string());
        keywords.insert(FINAL_ANSWER_KEY.to_string(), "[END]".to_string());
        Self::new(
            "SimpleReactPrompt",
            SIMPLE_REACT_TEMPLATE,
            vec!["instruction".to_string(), "agent_scratchpad".to_string()],
            keywords,
        )
        .expect("built-in template is valid")
    }
}

/// Collect `{name}` placeholders, treating `{{`/`}}` as literal braces.
fn placeholders(template: &str) -> Result<Vec<String>, PromptError> {
    let mut names = Vec::new();
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' => {
                if chars.peek() == Some(&'{') {
                    chars.next();
                    continue;
                }
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) => name.push(ch),
                        None => {
                            return Err(PromptError::InvalidTemplate(
                                "unterminated placeholder".to_string(),
                            ))
                        }
                    }
                }
                names.push(name);
            }
            '}' => {
                if chars.peek() == Some(&'}') {
                    chars.next();
                }
            }
            _ => {}
        }
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&'static str, &str)]) -> HashMap<&'static str, String> {
        pairs.iter().map(|(k, v)| (*k, v.to_string())).collect()
    }

    #[test]
    fn test_builtin_templates_construct() {
        let zero = PromptTemplate::zero_shot_react();
        assert_eq!(zero.name(), "ZeroShotReactPrompt");
        assert_eq!(zero.input_variables().len(), 4);

        let simple = PromptTemplate::simple_react();
        assert_eq!(simple.input_variables().len(), 2);
    }

    #[test]
    fn test_format_substitutes_all_variables() {
        let template = PromptTemplate::zero_shot_react();
        let prompt = template
            .format(&vars(&[
                ("instruction", "compute the mean"),
                ("agent_scratchpad", ""),
                ("tool_names", "python_code_sandbox"),
                ("tool_description", "runs python"),
            ]))
            .unwrap();
        assert!(prompt.contains("Question: compute the mean"));
        assert!(prompt.contains("[python_code_sandbox]"));
        assert!(!prompt.contains("{instruction}"));
    }

    #[test]
    fn test_format_missing_variable_errors() {
        let template = PromptTemplate::simple_react();
        let err = template.format(&vars(&[("instruction", "hi")])).unwrap_err();
        match err {
            PromptError::MissingVariables(keys) => assert_eq!(keys, vec!["agent_scratchpad"]),
            other => panic!("expected MissingVariables, got {:?}", other),
        }
    }

    #[test]
    fn test_format_ignores_unknown_keys() {
        let template = PromptTemplate::simple_react();
        let prompt = template
            .format(&vars(&[
                ("instruction", "hi"),
                ("agent_scratchpad", ""),
                ("extra", "ignored"),
            ]))
            .unwrap();
        assert!(prompt.starts_with("hi "));
    }

    #[test]
    fn test_undeclared_placeholder_rejected_at_construction() {
        let err = PromptTemplate::new(
            "bad",
            "{instruction} {typo}",
            vec!["instruction".to_string()],
            HashMap::new(),
        )
        .unwrap_err();
        assert!(matches!(err, PromptError::InvalidTemplate(_)));
    }

    #[test]
    fn test_scratchpad_cadence() {
        let template = PromptTemplate::zero_shot_react();
        let steps = vec![
            ScratchpadEntry::Action {
                raw_output: "Thought: run it\nAction: sandbox\nAction Input: ```python\nprint(1)\n```".to_string(),
                formatted_output: String::new(),
                tool_name: "sandbox".to_string(),
                tool_input: "```python\nprint(1)\n```\n".to_string(),
            },
            ScratchpadEntry::Observation {
                raw_output: "1".to_string(),
                formatted_output: "1".to_string(),
                tool_name: "sandbox".to_string(),
            },
        ];
        let scratchpad = template.construct_scratchpad(&steps);
        assert!(scratchpad.starts_with("Thought: run it"));
        assert!(scratchpad.contains("\nObservation:\n1\n\nThought:\n"));
    }

    #[test]
    fn test_simple_react_keyword_overrides() {
        let template = PromptTemplate::simple_react();
        let steps = vec![ScratchpadEntry::Observation {
            raw_output: "out".to_string(),
            formatted_output: "out".to_string(),
            tool_name: "sandbox".to_string(),
        }];
        let scratchpad = template.construct_scratchpad(&steps);
        assert!(scratchpad.contains("[EOS]Observation:"));
        assert!(scratchpad.contains("[SEP]"));
    }
}
