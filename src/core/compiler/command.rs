use super::{CompilerError, StylesheetCompiler};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Stylesheet compiler that pipes the source through an external program,
/// e.g. `sass --stdin`. The program runs in the source file's directory so
/// relative imports resolve.
#[derive(Debug, Clone)]
pub struct CommandCompiler {
    program: String,
    args: Vec<String>,
}

impl CommandCompiler {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Split a whitespace-separated command line. Returns `None` for an
    /// empty command.
    pub fn parse(command_line: &str) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect()))
    }

    fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait]
impl StylesheetCompiler for CommandCompiler {
    fn name(&self) -> &'static str {
        "command"
    }

    async fn compile(&self, source: &str, origin: &Path) -> Result<String, CompilerError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(parent) = origin.parent().filter(|p| !p.as_os_str().is_empty()) {
            command.current_dir(parent);
        }

        tracing::debug!(cmd = %self.display(), origin = %origin.display(), "running stylesheet compiler");
        let mut child = command.spawn().map_err(|source| CompilerError::Spawn {
            command: self.display(),
            source,
        })?;

        // Feed stdin while draining stdout and stderr; the compiler may emit
        // output before it has consumed all of its input.
        let stdin = child.stdin.take();
        let feed = async move {
            if let Some(mut stdin) = stdin {
                stdin.write_all(source.as_bytes()).await?;
            }
            Ok::<(), std::io::Error>(())
        };
        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        let output = output.map_err(|source| CompilerError::Spawn {
            command: self.display(),
            source,
        })?;

        // A compiler that exits early closes its stdin; its exit status
        // carries the real diagnostic.
        if let Err(source) = fed {
            if source.kind() != std::io::ErrorKind::BrokenPipe {
                return Err(CompilerError::Spawn {
                    command: self.display(),
                    source,
                });
            }
        }

        if !output.status.success() {
            return Err(CompilerError::Process {
                command: self.display(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        String::from_utf8(output.stdout).map_err(|_| CompilerError::Encoding)
    }
}
