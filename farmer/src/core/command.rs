//! Operator command grammar.
//!
//! Every line from the console or the control bridge goes through
//! [`parse_command`]. Anything that does not parse is reported as a
//! [`CommandError`] so the dispatcher can log and drop it in one place.

use std::fmt;
use std::time::Duration;

use crate::core::goals::GoalSet;
use crate::core::types::Strategy;

/// Parameters for a profile created in one line (`add <token> [strategy] [delay]`).
#[derive(Debug, Clone, PartialEq)]
pub struct AddArgs {
    pub token: String,
    pub strategy: Option<Strategy>,
    pub delay: Option<Duration>,
}

/// A parsed operator command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Create a profile; `None` opens the interactive prompt.
    Add(Option<AddArgs>),
    Pause(u32),
    Resume(u32),
    Stop(u32),
    Mode { id: u32, strategy: Strategy },
    Targets { id: u32, goals: GoalSet },
    /// `api on`: start the HTTP control bridge.
    EnableBridge,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    Empty,
    Unknown(String),
    Malformed { command: String, detail: String },
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Empty => f.write_str("empty command"),
            CommandError::Unknown(word) => write!(f, "unknown command '{word}'"),
            CommandError::Malformed { command, detail } => {
                write!(f, "malformed '{command}' command: {detail}")
            }
        }
    }
}

impl std::error::Error for CommandError {}

/// Parse one command line.
pub fn parse_command(line: &str) -> Result<Command, CommandError> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let Some((&head, args)) = parts.split_first() else {
        return Err(CommandError::Empty);
    };
    match head.to_ascii_lowercase().as_str() {
        "quit" | "exit" => Ok(Command::Quit),
        "add" => parse_add(args),
        "pause" => Ok(Command::Pause(parse_id("pause", args)?)),
        "resume" => Ok(Command::Resume(parse_id("resume", args)?)),
        "stop" => Ok(Command::Stop(parse_id("stop", args)?)),
        "mode" => {
            let id = parse_id("mode", args)?;
            let name = args
                .get(1)
                .ok_or_else(|| malformed("mode", "missing strategy"))?;
            let strategy = Strategy::from_name(name)
                .ok_or_else(|| malformed("mode", format!("unknown strategy '{name}'")))?;
            Ok(Command::Mode { id, strategy })
        }
        "targets" => {
            let id = parse_id("targets", args)?;
            let goals = parse_goals(&args[1..])?;
            Ok(Command::Targets { id, goals })
        }
        "api" => match args.first() {
            Some(arg) if arg.eq_ignore_ascii_case("on") => Ok(Command::EnableBridge),
            _ => Err(malformed("api", "expected 'api on'")),
        },
        other => Err(CommandError::Unknown(other.to_string())),
    }
}

/// Parse a delay answer in seconds; empty input means "use the default".
pub fn parse_delay(raw: &str) -> Option<Duration> {
    let secs: f64 = raw.trim().parse().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Some(Duration::from_millis((secs * 1000.0).round() as u64))
}

fn parse_add(args: &[&str]) -> Result<Command, CommandError> {
    let Some(token) = args.first() else {
        return Ok(Command::Add(None));
    };
    // Unknown strategy names fall back to the default at add time.
    let strategy = args.get(1).and_then(|name| Strategy::from_name(name));
    let delay = match args.get(2) {
        Some(raw) => {
            Some(parse_delay(raw).ok_or_else(|| malformed("add", format!("bad delay '{raw}'")))?)
        }
        None => None,
    };
    Ok(Command::Add(Some(AddArgs {
        token: (*token).to_string(),
        strategy,
        delay,
    })))
}

fn parse_id(command: &str, args: &[&str]) -> Result<u32, CommandError> {
    let raw = args
        .first()
        .ok_or_else(|| malformed(command, "missing profile id"))?;
    raw.parse()
        .map_err(|_| malformed(command, format!("bad profile id '{raw}'")))
}

// Unrecognized keys are skipped; a recognized key with a bad value rejects the line.
fn parse_goals(fields: &[&str]) -> Result<GoalSet, CommandError> {
    let mut goals = GoalSet::default();
    for field in fields {
        let (slot, raw) = if let Some(raw) = field.strip_prefix("xp=") {
            (&mut goals.experience, raw)
        } else if let Some(raw) = field.strip_prefix("gems=") {
            (&mut goals.currency, raw)
        } else if let Some(raw) = field.strip_prefix("streak+=") {
            (&mut goals.streak, raw)
        } else {
            continue;
        };
        let value = raw
            .parse()
            .map_err(|_| malformed("targets", format!("bad value in '{field}'")))?;
        *slot = Some(value);
    }
    Ok(goals)
}

fn malformed(command: &str, detail: impl Into<String>) -> CommandError {
    CommandError::Malformed {
        command: command.to_string(),
        detail: detail.into(),
    }
}
