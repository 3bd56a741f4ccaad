//! Console input: the startup prompt and the stdin reader thread.

use std::io::{self, BufRead, Write};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use farmer::core::command::parse_delay;
use farmer::core::types::Strategy;
use farmer::dispatcher::CommandSender;
use farmer::orchestrator::NewProfile;
use tracing::debug;

/// Ask for the startup profiles: a count (unless given), then token,
/// strategy and delay for each. Bad answers fall back to defaults.
pub fn startup_profiles<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    count: Option<u32>,
    base_delay: Duration,
) -> Result<Vec<NewProfile>> {
    let count = match count {
        Some(count) => count,
        None => ask(input, output, "Number of profiles:")?
            .parse()
            .unwrap_or(1),
    };
    let default_delay = base_delay.as_secs_f64();
    let mut profiles = Vec::new();
    for n in 1..=count {
        let token = ask(input, output, &format!("Profile {n} JWT token:"))?;
        let strategy_answer = ask(
            input,
            output,
            "Strategy (xp/gem/streak_farm/streak_repair/combo) [xp]:",
        )?;
        let strategy = Strategy::from_name(&strategy_answer).unwrap_or(Strategy::ExperienceFarm);
        let delay = parse_delay(&ask(input, output, &format!("Delay (s) [{default_delay}]:"))?);
        profiles.push(NewProfile {
            label: Some(format!("profile{n}")),
            token,
            strategy: Some(strategy),
            delay,
            ..NewProfile::default()
        });
    }
    Ok(profiles)
}

// End of input reads as an empty answer.
fn ask<R: BufRead, W: Write>(input: &mut R, output: &mut W, prompt: &str) -> Result<String> {
    write!(output, "{prompt} ").context("write prompt")?;
    output.flush().context("flush prompt")?;
    let mut line = String::new();
    input.read_line(&mut line).context("read answer")?;
    Ok(line.trim().to_string())
}

/// Forward stdin lines to the command queue from a dedicated thread.
///
/// The thread ends at end of input or once the queue is closed.
pub fn spawn_stdin_reader(sender: CommandSender) -> Result<()> {
    thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else {
                    break;
                };
                if !sender.send(line.trim()) {
                    break;
                }
            }
            debug!("stdin reader finished");
        })
        .context("spawn stdin reader")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn startup_prompt_collects_each_profile() {
        let mut input = Cursor::new("2\ntok-a\ngems\n1.5\ntok-b\nturbo\n\n");
        let mut output = Vec::new();

        let profiles =
            startup_profiles(&mut input, &mut output, None, Duration::from_millis(800)).expect("prompt");

        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles[0].label.as_deref(), Some("profile1"));
        assert_eq!(profiles[0].token, "tok-a");
        assert_eq!(profiles[0].strategy, Some(Strategy::CurrencyFarm));
        assert_eq!(profiles[0].delay, Some(Duration::from_millis(1500)));
        assert_eq!(profiles[1].strategy, Some(Strategy::ExperienceFarm));
        assert_eq!(profiles[1].delay, None);
        let shown = String::from_utf8(output).expect("utf8");
        assert!(shown.contains("Delay (s) [0.8]:"));
    }

    #[test]
    fn count_override_skips_the_question() {
        let mut input = Cursor::new("tok\nxp\n0.9\n");
        let mut output = Vec::new();

        let profiles =
            startup_profiles(&mut input, &mut output, Some(1), Duration::from_millis(800)).expect("prompt");

        assert_eq!(profiles.len(), 1);
        assert!(!String::from_utf8(output).expect("utf8").contains("Number of profiles"));
    }

    #[test]
    fn garbage_count_means_one_profile() {
        let mut input = Cursor::new("many\ntok\n\n\n");
        let mut output = Vec::new();

        let profiles =
            startup_profiles(&mut input, &mut output, None, Duration::from_millis(800)).expect("prompt");

        assert_eq!(profiles.len(), 1);
    }
}
