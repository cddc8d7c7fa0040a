//! Built-in email build tasks.
//!
//! | task           | sources                               | destination      |
//! |----------------|---------------------------------------|------------------|
//! | `sass`         | `<sass>/**/*.scss`                    | `<styles>`       |
//! | `prebcp`       | `<components>/**/*.<ext>`             | `<views>/components` |
//! | `cpcss`        | `<styles>/**/*.css`                   | `<views>/styles` |
//! | `cpimages`     | `<images>/.*`, `<images>/*`           | `<views>/images` |
//! | `cpimagesdist` | `<images>/*.svg`, `<images>/*.jpeg`   | `<dist>/images`  |
//! | `prebuild`     | `<emails>/**/*.<ext>`                 | `<views>`        |
//! | `build`        | `<emails>/**/*.<ext>`                 | `<dist>`         |
//!
//! Composites: `pb = sass -> (prebcp | cpcss | cpimages) -> prebuild`,
//! `teste = sass -> build`, `rebuild = sass -> build -> cpimagesdist`.

#![allow(clippy::result_large_err)]

use super::{TaskNode, TaskRegistryBuilder};
use crate::core::environment::BuildEnvironment;
use crate::core::error::AppError;
use crate::core::pipeline::PipelineSpec;
use crate::core::transform::{
    CopyStep, RenameStep, RenderStep, ReplaceStep, StylesheetStep,
};
use std::path::Path;

pub const SASS: &str = "sass";
pub const PREBCP: &str = "prebcp";
pub const CPCSS: &str = "cpcss";
pub const CPIMAGES: &str = "cpimages";
pub const CPIMAGESDIST: &str = "cpimagesdist";
pub const PREBUILD: &str = "prebuild";
pub const BUILD: &str = "build";
pub const PB: &str = "pb";
pub const TESTE: &str = "teste";
pub const REBUILD: &str = "rebuild";

/// Register every built-in task against the environment's layout and
/// compilers.
pub fn register_builtins(
    builder: TaskRegistryBuilder,
    env: &BuildEnvironment,
) -> Result<TaskRegistryBuilder, AppError> {
    let paths = &env.config().paths;
    let ext = paths.template_extension.as_str();
    let stylesheet_rule = ReplaceStep::from_rule(&env.config().rewrite.stylesheet)?;
    let relative_rule = ReplaceStep::from_rule(&env.config().rewrite.relative)?;
    let render = RenderStep::new(env.templates(), env.context());

    let sass = PipelineSpec::new(SASS, [glob(&paths.sass, "**/*.scss")], &paths.styles)
        .pipe(StylesheetStep::new(env.stylesheets()));

    let prebcp = PipelineSpec::new(
        PREBCP,
        [glob(&paths.components, &format!("**/*.{}", ext))],
        paths.views.join("components"),
    )
    .pipe(stylesheet_rule.clone());

    let cpcss = PipelineSpec::new(
        CPCSS,
        [glob(&paths.styles, "**/*.css")],
        paths.views.join("styles"),
    )
    .pipe(CopyStep);

    let cpimages = PipelineSpec::new(
        CPIMAGES,
        [glob(&paths.images, ".*"), glob(&paths.images, "*")],
        paths.views.join("images"),
    )
    .pipe(CopyStep);

    let cpimagesdist = PipelineSpec::new(
        CPIMAGESDIST,
        [glob(&paths.images, "*.svg"), glob(&paths.images, "*.jpeg")],
        paths.dist.join("images"),
    )
    .pipe(CopyStep);

    let prebuild = PipelineSpec::new(
        PREBUILD,
        [glob(&paths.emails, &format!("**/*.{}", ext))],
        &paths.views,
    )
    .pipe(stylesheet_rule.clone())
    .pipe(relative_rule)
    .pipe(render.clone())
    .pipe(RenameStep::flatten().with_extension("html"));

    let build = PipelineSpec::new(
        BUILD,
        [glob(&paths.emails, &format!("**/*.{}", ext))],
        &paths.dist,
    )
    .pipe(stylesheet_rule)
    .pipe(render)
    .pipe(RenameStep::flatten().with_extension("html"));

    Ok(builder
        .register_described(SASS, "compile stylesheets to css", TaskNode::pipeline(sass))
        .register_described(
            PREBCP,
            "copy components into views with stylesheet references rewritten",
            TaskNode::pipeline(prebcp),
        )
        .register_described(CPCSS, "copy compiled css into views", TaskNode::pipeline(cpcss))
        .register_described(CPIMAGES, "copy images into views", TaskNode::pipeline(cpimages))
        .register_described(
            CPIMAGESDIST,
            "copy svg and jpeg images into dist",
            TaskNode::pipeline(cpimagesdist),
        )
        .register_described(
            PREBUILD,
            "render emails into views",
            TaskNode::pipeline(prebuild),
        )
        .register_described(BUILD, "render emails into dist", TaskNode::pipeline(build))
        .register_described(
            PB,
            "sass, then components, css and images in parallel, then prebuild",
            TaskNode::series([
                TaskNode::task(SASS),
                TaskNode::parallel([
                    TaskNode::task(PREBCP),
                    TaskNode::task(CPCSS),
                    TaskNode::task(CPIMAGES),
                ]),
                TaskNode::task(PREBUILD),
            ]),
        )
        .register_described(
            TESTE,
            "sass, then build",
            TaskNode::series([TaskNode::task(SASS), TaskNode::task(BUILD)]),
        )
        .register_described(
            REBUILD,
            "sass, build, then copy dist images",
            TaskNode::series([
                TaskNode::task(SASS),
                TaskNode::task(BUILD),
                TaskNode::task(CPIMAGESDIST),
            ]),
        ))
}

/// Join a configured directory and a glob suffix into a `/`-separated pattern.
fn glob(dir: &Path, suffix: &str) -> String {
    let base = dir.to_string_lossy().replace('\\', "/");
    let base = base.trim_end_matches('/');
    if base.is_empty() || base == "." {
        suffix.to_string()
    } else {
        format!("{}/{}", base, suffix)
    }
}
