#![allow(clippy::result_large_err)]

use super::{BuildConfig, RewriteRule};
use crate::core::error::AppError;
use crate::core::transform::ReplaceStep;

pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate configuration rules
    pub fn validate(config: &BuildConfig) -> Result<(), AppError> {
        if config.build.concurrency == 0 {
            return Err(AppError::config("build.concurrency must be at least 1")
                .with_code("BLD-CONFIG-010"));
        }

        let extension = config.paths.template_extension.trim();
        if extension.is_empty() || extension.starts_with('.') {
            return Err(AppError::config(
                "paths.template_extension must be a non-empty extension without a leading dot",
            )
            .with_code("BLD-CONFIG-012"));
        }

        if config.watch.patterns.iter().all(|p| p.starts_with('!')) {
            return Err(AppError::config(
                "watch.patterns must contain at least one include pattern",
            )
            .with_code("BLD-CONFIG-013"));
        }

        validate_rule("rewrite.stylesheet", &config.rewrite.stylesheet)?;
        validate_rule("rewrite.relative", &config.rewrite.relative)?;

        for (name, decl) in &config.tasks {
            match (&decl.series, &decl.parallel) {
                (Some(_), Some(_)) | (None, None) => {
                    return Err(AppError::config(format!(
                        "task '{}' must declare exactly one of series or parallel",
                        name
                    ))
                    .with_code("BLD-CONFIG-014"));
                }
                (Some(children), None) | (None, Some(children)) if children.is_empty() => {
                    return Err(AppError::config(format!("task '{}' has no children", name))
                        .with_code("BLD-CONFIG-014"));
                }
                _ => {}
            }
        }

        Ok(())
    }
}

fn validate_rule(label: &str, rule: &RewriteRule) -> Result<(), AppError> {
    if rule.pattern.is_empty() {
        return Err(
            AppError::config(format!("{}.pattern cannot be empty", label)).with_code("BLD-CONFIG-015")
        );
    }
    ReplaceStep::from_rule(rule)
        .map(|_| ())
        .map_err(|err| err.with_context("rule", label))
}
