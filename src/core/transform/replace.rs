use super::{SourceFile, StepOutcome, TransformResult, TransformStep};
use crate::core::config::RewriteRule;
use crate::core::error::AppError;
use async_trait::async_trait;
use regex::{NoExpand, Regex, RegexBuilder};

/// Find/replace over text content. Every match is replaced.
#[derive(Debug, Clone)]
pub struct ReplaceStep {
    regex: Regex,
    replacement: String,
    expand: bool,
}

impl ReplaceStep {
    /// Regex pattern; `$1` / `${name}` in the replacement refer to captures.
    pub fn new(pattern: &str, replacement: impl Into<String>) -> Result<Self, AppError> {
        Self::build(pattern, replacement.into(), false, true)
    }

    pub fn case_insensitive(
        pattern: &str,
        replacement: impl Into<String>,
    ) -> Result<Self, AppError> {
        Self::build(pattern, replacement.into(), true, true)
    }

    /// Plain text search; neither side is interpreted.
    pub fn literal(find: &str, replacement: impl Into<String>) -> Result<Self, AppError> {
        Self::build(&regex::escape(find), replacement.into(), false, false)
    }

    pub fn from_rule(rule: &RewriteRule) -> Result<Self, AppError> {
        if rule.literal {
            let pattern = regex::escape(&rule.pattern);
            Self::build(&pattern, rule.replacement.clone(), rule.case_insensitive, false)
        } else {
            Self::build(
                &rule.pattern,
                rule.replacement.clone(),
                rule.case_insensitive,
                true,
            )
        }
    }

    fn build(
        pattern: &str,
        replacement: String,
        case_insensitive: bool,
        expand: bool,
    ) -> Result<Self, AppError> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(case_insensitive)
            .build()
            .map_err(|err| {
                AppError::config(format!("invalid rewrite pattern '{}': {}", pattern, err))
                    .with_code("BLD-CONFIG-020")
            })?;
        Ok(Self {
            regex,
            replacement,
            expand,
        })
    }

    /// Apply the rewrite to a string.
    pub fn rewrite<'a>(&self, text: &'a str) -> std::borrow::Cow<'a, str> {
        if self.expand {
            self.regex.replace_all(text, self.replacement.as_str())
        } else {
            self.regex
                .replace_all(text, NoExpand(self.replacement.as_str()))
        }
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }
}

#[async_trait]
impl TransformStep for ReplaceStep {
    fn name(&self) -> &'static str {
        "replace"
    }

    async fn apply(&self, file: &SourceFile) -> Result<StepOutcome, AppError> {
        let rewritten = self.rewrite(file.text()?);
        Ok(StepOutcome::Emit(TransformResult::new(
            rewritten.into_owned(),
        )))
    }
}
