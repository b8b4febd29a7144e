//! Locale-dependent templated text
//!
//! The CN/EN flag only selects prefix and failure strings; parsing logic is
//! locale-invariant. These strings are part of the prompt protocol the model
//! is conditioned on, so they must not be reworded casually.

pub const TOOL_INPUT_PREFIX_EN: &str =
    "[SYSTEM NOTIFICATION] We need to execute with python sandbox with the following code:";
pub const TOOL_INPUT_PREFIX_CN: &str = "【系统提示】 执行如下代码: ";

pub const OBSERVATION_PREFIX_EN: &str =
    "[SYSTEM NOTIFICATION] Running the above tool with the following response: ";
pub const OBSERVATION_PREFIX_CN: &str = "【系统提示】 代码执行结果为: ";

pub const AGENT_FAILED_EN: &str =
    "[SYSTEM NOTIFICATION] Sorry Agent unable to answer this question due to LLM fail.\n";
pub const AGENT_FAILED_CN: &str = "【系统提示】 对不起，模型暂时无法回答这个问题.\n";

/// Language of the templated text injected around model output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    En,
    Cn,
}

impl Locale {
    pub fn tool_input_prefix(&self) -> &'static str {
        match self {
            Locale::En => TOOL_INPUT_PREFIX_EN,
            Locale::Cn => TOOL_INPUT_PREFIX_CN,
        }
    }

    pub fn observation_prefix(&self) -> &'static str {
        match self {
            Locale::En => OBSERVATION_PREFIX_EN,
            Locale::Cn => OBSERVATION_PREFIX_CN,
        }
    }

    pub fn agent_failed(&self) -> &'static str {
        match self {
            Locale::En => AGENT_FAILED_EN,
            Locale::Cn => AGENT_FAILED_CN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locale_selects_prefixes() {
        assert!(Locale::En.observation_prefix().starts_with("[SYSTEM NOTIFICATION]"));
        assert!(Locale::Cn.observation_prefix().starts_with("【系统提示】"));
        assert_ne!(Locale::En.agent_failed(), Locale::Cn.agent_failed());
    }

    #[test]
    fn test_default_locale_is_english() {
        assert_eq!(Locale::default(), Locale::En);
    }
}
