//! Argv-based command description, executed without a shell

use std::ffi::OsString;
use std::path::PathBuf;
use tokio::process::Command as TokioCommand;

/// Specification for a runner command to execute.
///
/// Descriptor commands are token lists, not shell strings: the first token is
/// the program and the rest are passed as discrete arguments. No shell is
/// involved at any point.
///
/// # Example
///
/// ```rust
/// use steprun_runner::CommandSpec;
/// use std::ffi::OsString;
///
/// let cmd = CommandSpec::from_tokens(&["ruby".to_string(), "run.rb".to_string()])
///     .unwrap()
///     .cwd("/plugins/ruby/1.2.0");
///
/// assert_eq!(cmd.program, OsString::from("ruby"));
/// assert_eq!(cmd.args, vec![OsString::from("run.rb")]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// The program to execute
    pub program: OsString,
    /// Arguments as discrete elements
    pub args: Vec<OsString>,
    /// Optional working directory
    pub cwd: Option<PathBuf>,
    /// Exact child environment, in order. `None` inherits the parent's.
    pub env: Option<Vec<(OsString, OsString)>>,
}

impl CommandSpec {
    #[must_use]
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: None,
        }
    }

    /// Build a command from descriptor tokens. Returns `None` for an empty list.
    #[must_use]
    pub fn from_tokens(tokens: &[String]) -> Option<Self> {
        let (program, args) = tokens.split_first()?;
        Some(Self::new(program).args(args))
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Replace the child environment with exactly these entries.
    #[must_use]
    pub fn exact_env(mut self, env: Vec<(OsString, OsString)>) -> Self {
        self.env = Some(env);
        self
    }

    /// Program and arguments joined for log and error messages
    #[must_use]
    pub fn display(&self) -> String {
        std::iter::once(&self.program)
            .chain(&self.args)
            .map(|part| part.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Convert to a [`tokio::process::Command`].
    ///
    /// Stdio is left at the tokio defaults; callers configure piping.
    #[must_use]
    pub fn to_tokio_command(&self) -> TokioCommand {
        let mut cmd = TokioCommand::new(&self.program);
        cmd.args(&self.args);

        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }

        if let Some(env) = &self.env {
            cmd.env_clear();
            cmd.envs(env.iter().map(|(k, v)| (k, v)));
        }

        cmd
    }
}
