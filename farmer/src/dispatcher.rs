//! Command queue and dispatcher.
//!
//! Console input and the control bridge both push raw lines into one
//! unbounded queue, each tagged with its [`Origin`]. The front end drains it
//! between redraws and hands each line to the [`Dispatcher`], which parses it
//! and applies it to the live profiles in order. Lines that do not parse or
//! name an unknown profile are logged and dropped.
//!
//! Only console lines can answer the interactive `add` prompt; bridge lines
//! are always read as commands.

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info};

use crate::core::command::{AddArgs, Command, parse_command, parse_delay};
use crate::core::types::{StopCause, Strategy};
use crate::io::transport::Connector;
use crate::orchestrator::{NewProfile, Orchestrator};
use crate::profile::Profile;

pub const TOKEN_PROMPT: &str = "JWT token:";
pub const STRATEGY_PROMPT: &str = "Strategy (xp/gem/streak_farm/streak_repair/combo) [xp]:";

/// Where a queued line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Console,
    Bridge,
}

/// One line waiting in the command queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedLine {
    pub origin: Origin,
    pub line: String,
}

/// Producer half of the command queue. Cheap to clone; `send` never blocks,
/// so it is safe to call from the stdin reader thread.
#[derive(Debug, Clone)]
pub struct CommandSender {
    tx: UnboundedSender<QueuedLine>,
    origin: Origin,
}

impl CommandSender {
    /// Enqueue one line. Returns `false` once the queue is closed.
    pub fn send(&self, line: impl Into<String>) -> bool {
        self.tx
            .send(QueuedLine {
                origin: self.origin,
                line: line.into(),
            })
            .is_ok()
    }

    /// A sender into the same queue whose lines carry `origin`.
    pub fn with_origin(&self, origin: Origin) -> Self {
        Self {
            tx: self.tx.clone(),
            origin,
        }
    }
}

/// Consumer half of the command queue; exactly one owner.
#[derive(Debug)]
pub struct CommandQueue {
    rx: UnboundedReceiver<QueuedLine>,
}

impl CommandQueue {
    /// Take every line queued so far without waiting.
    pub fn drain(&mut self) -> Vec<QueuedLine> {
        let mut lines = Vec::new();
        while let Ok(line) = self.rx.try_recv() {
            lines.push(line);
        }
        lines
    }

    /// Stop accepting new lines. Already queued lines can still be drained.
    pub fn close(&mut self) {
        self.rx.close();
    }
}

/// A new queue. The returned sender tags its lines as console input.
pub fn command_queue() -> (CommandSender, CommandQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        CommandSender {
            tx,
            origin: Origin::Console,
        },
        CommandQueue { rx },
    )
}

/// What the front end should do after a line was dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Applied,
    /// The `add` prompt wants its next answer; show this text.
    Prompt(String),
    /// Logged and dropped.
    Ignored,
    EnableBridge,
    Quit,
}

#[derive(Debug)]
enum AddPrompt {
    Token,
    Strategy { token: String },
    Delay { token: String, strategy: Strategy },
}

/// Applies parsed commands to an orchestrator's profiles.
#[derive(Debug, Default)]
pub struct Dispatcher {
    add_prompt: Option<AddPrompt>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while the `add` prompt is collecting answers.
    pub fn is_prompting(&self) -> bool {
        self.add_prompt.is_some()
    }

    /// Dispatch one console line.
    pub fn dispatch<C: Connector>(&mut self, line: &str, orchestrator: &mut Orchestrator<C>) -> Dispatch {
        self.dispatch_from(Origin::Console, line, orchestrator)
    }

    pub fn dispatch_queued<C: Connector>(
        &mut self,
        queued: &QueuedLine,
        orchestrator: &mut Orchestrator<C>,
    ) -> Dispatch {
        self.dispatch_from(queued.origin, &queued.line, orchestrator)
    }

    pub fn dispatch_from<C: Connector>(
        &mut self,
        origin: Origin,
        line: &str,
        orchestrator: &mut Orchestrator<C>,
    ) -> Dispatch {
        let step = match origin {
            Origin::Console => self.add_prompt.take(),
            Origin::Bridge => None,
        };
        if let Some(step) = step {
            return self.answer(step, line.trim(), orchestrator);
        }
        let command = match parse_command(line) {
            Ok(command) => command,
            Err(err) => {
                debug!(err = %err, ?origin, "ignoring command");
                return Dispatch::Ignored;
            }
        };
        if origin == Origin::Bridge && matches!(command, Command::Add(None)) {
            debug!("interactive add is console-only; use 'add <token> [strategy] [delay]'");
            return Dispatch::Ignored;
        }
        self.apply(command, orchestrator)
    }

    fn apply<C: Connector>(&mut self, command: Command, orchestrator: &mut Orchestrator<C>) -> Dispatch {
        match command {
            Command::Add(None) => {
                self.add_prompt = Some(AddPrompt::Token);
                Dispatch::Prompt(TOKEN_PROMPT.to_string())
            }
            Command::Add(Some(AddArgs {
                token,
                strategy,
                delay,
            })) => {
                orchestrator.add_profile(NewProfile {
                    token,
                    strategy,
                    delay,
                    ..NewProfile::default()
                });
                Dispatch::Applied
            }
            Command::Pause(id) => with_profile(orchestrator, id, |profile| profile.pause()),
            Command::Resume(id) => with_profile(orchestrator, id, |profile| profile.resume()),
            Command::Stop(id) => {
                with_profile(orchestrator, id, |profile| profile.stop(StopCause::Command))
            }
            Command::Mode { id, strategy } => with_profile(orchestrator, id, |profile| {
                profile.set_strategy(strategy);
                true
            }),
            Command::Targets { id, goals } => with_profile(orchestrator, id, |profile| {
                profile.set_goals(&goals);
                true
            }),
            Command::EnableBridge => Dispatch::EnableBridge,
            Command::Quit => {
                info!("quit requested");
                orchestrator.stop_all();
                Dispatch::Quit
            }
        }
    }

    fn answer<C: Connector>(
        &mut self,
        step: AddPrompt,
        answer: &str,
        orchestrator: &mut Orchestrator<C>,
    ) -> Dispatch {
        match step {
            AddPrompt::Token => {
                self.add_prompt = Some(AddPrompt::Strategy {
                    token: answer.to_string(),
                });
                Dispatch::Prompt(STRATEGY_PROMPT.to_string())
            }
            AddPrompt::Strategy { token } => {
                let strategy = Strategy::from_name(answer).unwrap_or_else(|| {
                    if !answer.is_empty() {
                        debug!(answer, "unknown strategy; using xp");
                    }
                    Strategy::ExperienceFarm
                });
                self.add_prompt = Some(AddPrompt::Delay { token, strategy });
                let default = orchestrator.settings().base_delay.as_secs_f64();
                Dispatch::Prompt(format!("Delay (s) [{default}]:"))
            }
            AddPrompt::Delay { token, strategy } => {
                orchestrator.add_profile(NewProfile {
                    token,
                    strategy: Some(strategy),
                    delay: parse_delay(answer),
                    ..NewProfile::default()
                });
                Dispatch::Applied
            }
        }
    }
}

fn with_profile<C: Connector>(
    orchestrator: &Orchestrator<C>,
    id: u32,
    apply: impl FnOnce(&Profile) -> bool,
) -> Dispatch {
    let Some(profile) = orchestrator.profile(id) else {
        debug!(id, "ignoring command for unknown profile");
        return Dispatch::Ignored;
    };
    if apply(profile.as_ref()) {
        Dispatch::Applied
    } else {
        debug!(id, "command had no effect");
        Dispatch::Ignored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::core::goals::GoalSet;
    use crate::core::types::RunState;
    use crate::io::config::FarmConfig;
    use crate::orchestrator::EngineSettings;
    use crate::test_support::{FakeConnector, FakeService, fake_token};

    fn orchestrator(connector: FakeConnector) -> Orchestrator<FakeConnector> {
        let mut settings = EngineSettings::from_config(&FarmConfig::default());
        settings.pacing.jitter = Duration::ZERO;
        Orchestrator::new(connector, settings)
    }

    #[test]
    fn queue_preserves_order() {
        let (sender, mut queue) = command_queue();
        let bridge = sender.with_origin(Origin::Bridge);
        assert!(sender.send("pause 1"));
        assert!(bridge.send("resume 1"));
        assert_eq!(
            queue.drain(),
            vec![
                QueuedLine {
                    origin: Origin::Console,
                    line: "pause 1".to_string(),
                },
                QueuedLine {
                    origin: Origin::Bridge,
                    line: "resume 1".to_string(),
                },
            ]
        );
        assert!(queue.drain().is_empty());
        queue.close();
        assert!(!sender.send("quit"));
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_ids_and_garbage_are_ignored() {
        let mut orchestrator = orchestrator(FakeConnector::new());
        let mut dispatcher = Dispatcher::new();

        assert_eq!(dispatcher.dispatch("pause 9", &mut orchestrator), Dispatch::Ignored);
        assert_eq!(dispatcher.dispatch("mode 1 turbo", &mut orchestrator), Dispatch::Ignored);
        assert_eq!(dispatcher.dispatch("frobnicate", &mut orchestrator), Dispatch::Ignored);
        assert_eq!(dispatcher.dispatch("", &mut orchestrator), Dispatch::Ignored);
        assert!(orchestrator.profiles().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn add_prompt_collects_three_answers() {
        let connector = FakeConnector::new();
        let token = fake_token("11");
        connector.register(&token, FakeService::new(0, 0, 0));
        let mut orchestrator = orchestrator(connector);
        let mut dispatcher = Dispatcher::new();

        assert_eq!(
            dispatcher.dispatch("add", &mut orchestrator),
            Dispatch::Prompt(TOKEN_PROMPT.to_string())
        );
        assert_eq!(
            dispatcher.dispatch(&token, &mut orchestrator),
            Dispatch::Prompt(STRATEGY_PROMPT.to_string())
        );
        assert_eq!(
            dispatcher.dispatch("turbo", &mut orchestrator),
            Dispatch::Prompt("Delay (s) [0.8]:".to_string())
        );
        assert!(dispatcher.is_prompting());
        assert_eq!(dispatcher.dispatch("0.1", &mut orchestrator), Dispatch::Applied);
        assert!(!dispatcher.is_prompting());

        let profile = orchestrator.profile(1).expect("profile");
        assert_eq!(profile.label(), "profile1");
        assert_eq!(profile.strategy(), Strategy::ExperienceFarm);
        assert_eq!(profile.delay(), Duration::from_millis(400));
        orchestrator.shutdown(Duration::from_secs(5)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn bridge_lines_run_as_commands_while_prompt_is_open() {
        let connector = FakeConnector::new();
        let running = fake_token("13");
        let added = fake_token("14");
        connector.register(&running, FakeService::new(0, 0, 0));
        connector.register(&added, FakeService::new(0, 0, 0));
        let mut orchestrator = orchestrator(connector);
        let mut dispatcher = Dispatcher::new();
        dispatcher.dispatch(&format!("add {running} xp"), &mut orchestrator);
        let profile = orchestrator.profile(1).expect("profile");

        assert_eq!(
            dispatcher.dispatch("add", &mut orchestrator),
            Dispatch::Prompt(TOKEN_PROMPT.to_string())
        );
        assert_eq!(
            dispatcher.dispatch_from(Origin::Bridge, "pause 1", &mut orchestrator),
            Dispatch::Applied
        );
        assert!(dispatcher.is_prompting());
        assert_eq!(
            dispatcher.dispatch(&added, &mut orchestrator),
            Dispatch::Prompt(STRATEGY_PROMPT.to_string())
        );
        assert_eq!(
            dispatcher.dispatch_from(Origin::Bridge, "stop 1", &mut orchestrator),
            Dispatch::Applied
        );
        dispatcher.dispatch("gem", &mut orchestrator);
        assert_eq!(dispatcher.dispatch("0.8", &mut orchestrator), Dispatch::Applied);

        assert_eq!(profile.run_state(), RunState::Stopped);
        assert_eq!(profile.stop_cause(), Some(StopCause::Command));
        let second = orchestrator.profile(2).expect("second profile");
        assert_eq!(second.strategy(), Strategy::CurrencyFarm);
        assert!(orchestrator.profile(3).is_none());
        orchestrator.shutdown(Duration::from_secs(5)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn bridge_cannot_open_the_add_prompt() {
        let mut orchestrator = orchestrator(FakeConnector::new());
        let mut dispatcher = Dispatcher::new();

        assert_eq!(
            dispatcher.dispatch_from(Origin::Bridge, "add", &mut orchestrator),
            Dispatch::Ignored
        );
        assert!(!dispatcher.is_prompting());
        assert_eq!(dispatcher.dispatch("pause 1", &mut orchestrator), Dispatch::Ignored);
        assert!(orchestrator.profiles().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn commands_mutate_only_control_flags() {
        let connector = FakeConnector::new();
        let token = fake_token("12");
        connector.register(&token, FakeService::new(0, 0, 0));
        let mut orchestrator = orchestrator(connector);
        let mut dispatcher = Dispatcher::new();

        let line = format!("add {token} gem 2");
        assert_eq!(dispatcher.dispatch(&line, &mut orchestrator), Dispatch::Applied);
        let profile = orchestrator.profile(1).expect("profile");
        assert_eq!(profile.delay(), Duration::from_secs(2));

        dispatcher.dispatch("mode 1 streak_farm", &mut orchestrator);
        dispatcher.dispatch("targets 1 xp=100 streak+=3", &mut orchestrator);
        assert_eq!(dispatcher.dispatch("pause 1", &mut orchestrator), Dispatch::Applied);
        assert_eq!(dispatcher.dispatch("pause 1", &mut orchestrator), Dispatch::Ignored);

        assert_eq!(profile.strategy(), Strategy::StreakFarm);
        assert_eq!(
            profile.goals(),
            GoalSet {
                experience: Some(100),
                currency: None,
                streak: Some(3),
            }
        );
        assert!(profile.is_paused());

        assert_eq!(dispatcher.dispatch("stop 1", &mut orchestrator), Dispatch::Applied);
        assert_eq!(profile.run_state(), RunState::Stopped);
        assert_eq!(dispatcher.dispatch("resume 1", &mut orchestrator), Dispatch::Ignored);
        orchestrator.shutdown(Duration::from_secs(5)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn quit_stops_everything() {
        let connector = FakeConnector::new();
        let mut orchestrator = orchestrator(connector);
        let mut dispatcher = Dispatcher::new();
        dispatcher.dispatch(&format!("add {}", fake_token("1")), &mut orchestrator);
        dispatcher.dispatch(&format!("add {}", fake_token("2")), &mut orchestrator);

        assert_eq!(dispatcher.dispatch("quit", &mut orchestrator), Dispatch::Quit);
        assert!(orchestrator.profiles().iter().all(|profile| profile.is_stopped()));
        assert_eq!(dispatcher.dispatch("api on", &mut orchestrator), Dispatch::EnableBridge);
        orchestrator.shutdown(Duration::from_secs(5)).await;
    }
}
