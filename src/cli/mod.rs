pub mod args;
pub mod commands;

pub use args::{RunArgs, TasksArgs, WatchArgs};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{name} {version}\n\
{about-with-newline}\n\
USAGE:\n    {usage}\n\
\nOPTIONS:\n{options}\n\
BUILD COMMANDS:\n{subcommands}\n";

#[derive(Parser, Debug)]
#[command(name = "mailsmith")]
#[command(version = crate::VERSION)]
#[command(about = "Build HTML email templates from templates, stylesheets and images")]
#[command(help_template = HELP_TEMPLATE)]
#[command(
    after_long_help = "Typical flow: `mailsmith pb` to pre-build views, `mailsmith watch` while editing, `mailsmith teste` for dist output."
)]
pub struct Args {
    /// Project root containing src/ and mailsmith.toml (default: current directory)
    #[arg(long, global = true, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Path to config file (default: {root}/mailsmith.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Args {
    /// Project root the command operates on.
    pub fn project_root(&self) -> std::io::Result<PathBuf> {
        match &self.root {
            Some(root) => Ok(root.clone()),
            None => std::env::current_dir(),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(
        about = "Compile stylesheets to css",
        long_about = "Sass compiles every src/sass/**/*.scss file (partials excluded) into src/styles.",
        after_help = "Example:\n    mailsmith sass"
    )]
    Sass,
    #[command(
        about = "Pre-build components into views/components",
        long_about = "Prebcp copies component templates into views/components with stylesheet references rewritten to compiled css."
    )]
    Prebcp,
    #[command(about = "Copy compiled css into views/styles")]
    Cpcss,
    #[command(about = "Copy images into views/images")]
    Cpimages,
    #[command(
        about = "Pre-build views",
        long_about = "Pb runs sass, then prebcp, cpcss and cpimages in parallel, then renders emails into views.",
        after_help = "Example:\n    mailsmith pb --root ./newsletter"
    )]
    Pb,
    #[command(
        about = "Build dist for testing",
        long_about = "Teste runs sass and then renders every email into dist as flat .html files."
    )]
    Teste,
    #[command(
        about = "Build, serve and rebuild on change",
        long_about = "Watch runs an initial build, starts the live-reload preview server on dist and re-runs the build whenever a file under src changes.",
        after_help = "Example:\n    mailsmith watch --port 3000"
    )]
    Watch(WatchArgs),
    #[command(
        about = "Run any registered task",
        long_about = "Run executes a built-in task or a composite declared under [tasks] in mailsmith.toml.",
        after_help = "Example:\n    mailsmith run cpimagesdist"
    )]
    Run(RunArgs),
    #[command(
        about = "List registered tasks",
        after_help = "Example:\n    mailsmith tasks --dot | dot -Tsvg > tasks.svg"
    )]
    Tasks(TasksArgs),
}

impl Command {
    /// Task run by the fixed build commands.
    pub fn builtin_task(&self) -> Option<&'static str> {
        use crate::core::tasks::builtin;
        match self {
            Command::Sass => Some(builtin::SASS),
            Command::Prebcp => Some(builtin::PREBCP),
            Command::Cpcss => Some(builtin::CPCSS),
            Command::Cpimages => Some(builtin::CPIMAGES),
            Command::Pb => Some(builtin::PB),
            Command::Teste => Some(builtin::TESTE),
            Command::Watch(_) | Command::Run(_) | Command::Tasks(_) => None,
        }
    }
}

pub async fn run(args: Args) -> crate::Result<()> {
    match &args.command {
        Command::Watch(watch_args) => commands::watch(&args, watch_args).await,
        Command::Run(run_args) => commands::run_task(&args, &run_args.task).await,
        Command::Tasks(tasks_args) => commands::tasks(&args, tasks_args).await,
        fixed => {
            let task = fixed
                .builtin_task()
                .ok_or_else(|| anyhow::anyhow!("command has no associated task"))?;
            commands::run_task(&args, task).await
        }
    }
}
