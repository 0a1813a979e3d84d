//! Event command templates.
//!
//! A template is a command line split shell-style into argv (single quotes,
//! double quotes and backslash escapes are honored; no expansion happens).
//! Each argument may contain placeholders that are replaced per event:
//!
//! | placeholder  | value                                  |
//! |--------------|----------------------------------------|
//! | `{category}` | `branch` or `tag`                      |
//! | `{event}`    | `created`, `moved` or `deleted`        |
//! | `{name}`     | ref name, e.g. `feature/login`         |
//! | `{path}`     | destination directory of the checkout  |
//! | `{old}`      | previous commit or the absent marker   |
//! | `{new}`      | new commit or the absent marker        |
//!
//! A template without any placeholder receives the context as trailing
//! positional arguments `category event name path old new`.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Result, RolloutError};
use crate::event::ChangeEvent;

const PLACEHOLDERS: [&str; 6] = ["category", "event", "name", "path", "old", "new"];

/// A parsed event command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    raw: String,
    argv: Vec<String>,
    positional: bool,
}

impl CommandTemplate {
    /// Parses a command line.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for an empty command or unbalanced quotes.
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        let argv = split_command_line(&raw)?;
        if argv.is_empty() {
            return Err(RolloutError::invalid_config("event command is empty"));
        }

        let positional = !argv.iter().any(|arg| {
            PLACEHOLDERS
                .iter()
                .any(|key| arg.contains(&format!("{{{key}}}")))
        });

        Ok(Self {
            raw,
            argv,
            positional,
        })
    }

    /// The command line as configured.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The program (first argv element).
    pub fn program(&self) -> &str {
        &self.argv[0]
    }

    /// Builds the concrete invocation for one event.
    pub fn invocation(&self, context: &EventContext) -> CommandInvocation {
        let pairs = context.pairs();
        let mut argv: Vec<String> = self.argv.iter().map(|arg| substitute(arg, &pairs)).collect();
        if self.positional {
            argv.extend(pairs.iter().map(|(_, value)| value.clone()));
        }

        let env = pairs
            .iter()
            .map(|(key, value)| (env_name(key), value.clone()))
            .collect();

        CommandInvocation {
            argv,
            env,
            working_dir: context.working_dir.clone(),
        }
    }
}

impl fmt::Display for CommandTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Replaces every `{key}` of `arg` in one left-to-right pass.
///
/// Substituted values are copied verbatim and never scanned again.
fn substitute(arg: &str, pairs: &[(&'static str, String)]) -> String {
    let mut out = String::with_capacity(arg.len());
    let mut rest = arg;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let candidate = &rest[open + 1..];
        let value = candidate.find('}').and_then(|close| {
            let key = &candidate[..close];
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, value)| (value, close))
        });
        match value {
            Some((value, close)) => {
                out.push_str(value);
                rest = &candidate[close + 1..];
            },
            None => {
                out.push('{');
                rest = candidate;
            },
        }
    }
    out.push_str(rest);
    out
}

fn env_name(key: &str) -> String {
    match key {
        "name" => "GITROLLOUT_REF".to_string(),
        other => format!("GITROLLOUT_{}", other.to_ascii_uppercase()),
    }
}

/// Everything a command learns about the event it is run for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventContext {
    category: String,
    event: String,
    name: String,
    path: PathBuf,
    old: String,
    new: String,
    working_dir: PathBuf,
}

impl EventContext {
    /// Builds the context for `event`, checked out (or removed) at `destination`.
    ///
    /// `working_dir` is where the command is started.
    pub fn new(event: &ChangeEvent, destination: &Path, working_dir: &Path) -> Self {
        Self {
            category: event.category().as_str().to_string(),
            event: event.kind().as_str().to_string(),
            name: event.name().to_string(),
            path: destination.to_path_buf(),
            old: event.old_or_absent().to_string(),
            new: event.new_or_absent().to_string(),
            working_dir: working_dir.to_path_buf(),
        }
    }

    fn pairs(&self) -> [(&'static str, String); 6] {
        [
            ("category", self.category.clone()),
            ("event", self.event.clone()),
            ("name", self.name.clone()),
            ("path", self.path.display().to_string()),
            ("old", self.old.clone()),
            ("new", self.new.clone()),
        ]
    }
}

/// A fully rendered command, ready for a process runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    /// Program followed by its arguments.
    pub argv: Vec<String>,
    /// Extra environment variables.
    pub env: Vec<(String, String)>,
    /// Directory the process starts in.
    pub working_dir: PathBuf,
}

impl CommandInvocation {
    /// The program to execute.
    pub fn program(&self) -> &str {
        &self.argv[0]
    }

    /// Arguments after the program.
    pub fn args(&self) -> &[String] {
        &self.argv[1..]
    }
}

fn split_command_line(line: &str) -> Result<Vec<String>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Quote {
        None,
        Single,
        Double,
    }

    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_arg = false;
    let mut quote = Quote::None;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Quote::Single, '\'') => quote = Quote::None,
            (Quote::Single, c) => current.push(c),
            (Quote::Double, '"') => quote = Quote::None,
            (Quote::Double, '\\') => match chars.next() {
                Some(next @ ('"' | '\\')) => current.push(next),
                Some(next) => {
                    current.push('\\');
                    current.push(next);
                },
                None => return Err(RolloutError::invalid_config("trailing backslash in command")),
            },
            (Quote::Double, c) => current.push(c),
            (Quote::None, '\'') => {
                quote = Quote::Single;
                in_arg = true;
            },
            (Quote::None, '"') => {
                quote = Quote::Double;
                in_arg = true;
            },
            (Quote::None, '\\') => match chars.next() {
                Some(next) => {
                    current.push(next);
                    in_arg = true;
                },
                None => return Err(RolloutError::invalid_config("trailing backslash in command")),
            },
            (Quote::None, c) if c.is_whitespace() => {
                if in_arg {
                    args.push(std::mem::take(&mut current));
                    in_arg = false;
                }
            },
            (Quote::None, c) => {
                current.push(c);
                in_arg = true;
            },
        }
    }

    if quote != Quote::None {
        return Err(RolloutError::invalid_config(format!(
            "unbalanced quotes in command: {line}"
        )));
    }
    if in_arg {
        args.push(current);
    }
    Ok(args)
}
