//! Playback controller: which player actions are valid right now.

use std::num::NonZeroU32;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::protocol::PlayerAction;

/// Delay between a step completing and the automatic advance in continuous
/// mode.
pub const DEFAULT_STEP_PACING: Duration = Duration::from_millis(200);

/// Current state of the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    /// No runtime connection
    Disconnected,
    /// Connected, waiting for `init`
    AwaitingProgram,
    /// Connected, no program running
    Idle,
    /// A step is executing
    Running,
    /// A step finished; waiting for the user
    StepReady,
    /// The program finished; waiting for the user to acknowledge
    Terminating,
    /// Termination acknowledged
    Terminated,
}

/// User-issued player commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum PlayerCommand {
    /// Run one step.
    Advance,
    /// Run steps continuously.
    Play,
    /// Run `steps` steps.
    Jump { steps: NonZeroU32 },
    /// Leave continuous mode.
    Stop,
    /// Acknowledge termination.
    Terminate,
}

impl PlayerCommand {
    pub fn name(&self) -> &'static str {
        match self {
            PlayerCommand::Advance => "advance",
            PlayerCommand::Play => "play",
            PlayerCommand::Jump { .. } => "jump",
            PlayerCommand::Stop => "stop",
            PlayerCommand::Terminate => "terminate",
        }
    }
}

/// Result of issuing a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Invalid in the current state; nothing changed.
    Rejected,
    /// State changed, nothing to send.
    Accepted,
    /// State changed and this action must go to the runtime.
    Send(PlayerAction),
}

/// State machine gating player actions, kept in sync with step and
/// termination events from the runtime.
#[derive(Debug)]
pub struct PlaybackController {
    state: PlaybackState,
    continuous: bool,
    pacing: Duration,
    pending_advance: Option<Instant>,
    /// `step_done` events still owed by the runtime for the last request.
    remaining_steps: u32,
}

impl Default for PlaybackController {
    fn default() -> Self {
        Self::new(DEFAULT_STEP_PACING)
    }
}

impl PlaybackController {
    pub fn new(pacing: Duration) -> Self {
        Self {
            state: PlaybackState::Disconnected,
            continuous: false,
            pacing,
            pending_advance: None,
            remaining_steps: 0,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_continuous(&self) -> bool {
        self.continuous
    }

    /// Steps the runtime still has to report before the player is ready.
    pub fn remaining_steps(&self) -> u32 {
        self.remaining_steps
    }

    /// Enter `Running`, expecting `steps` more `step_done` events.
    fn run(&mut self, steps: u32) {
        self.remaining_steps = steps;
        self.transition(PlaybackState::Running);
    }

    fn transition(&mut self, to: PlaybackState) {
        if self.state != to {
            tracing::debug!(from = ?self.state, ?to, "playback transition");
            self.state = to;
        }
    }

    /// Connection established.
    pub fn on_open(&mut self) {
        if self.state == PlaybackState::Disconnected {
            self.transition(PlaybackState::AwaitingProgram);
        }
    }

    /// Connection lost.
    pub fn on_close(&mut self) {
        self.continuous = false;
        self.remaining_steps = 0;
        self.transition(PlaybackState::Disconnected);
    }

    /// `init`: tells whether a program is already running.
    pub fn on_init(&mut self, running: bool) {
        match (self.state, running) {
            (PlaybackState::AwaitingProgram, false) => self.transition(PlaybackState::Idle),
            (PlaybackState::AwaitingProgram | PlaybackState::Idle, true) => self.run(1),
            _ => {}
        }
    }

    /// `program_running`.
    pub fn on_program_running(&mut self) {
        if matches!(
            self.state,
            PlaybackState::AwaitingProgram | PlaybackState::Idle | PlaybackState::Terminated
        ) {
            self.run(1);
        }
    }

    /// `program_stopped`.
    pub fn on_program_stopped(&mut self) {
        if self.state != PlaybackState::Disconnected {
            self.continuous = false;
            self.remaining_steps = 0;
            self.transition(PlaybackState::Idle);
        }
    }

    /// `step_done`. The player becomes ready only once every step of the
    /// last advance or jump has been reported. In continuous mode that
    /// schedules exactly one advance after the pacing delay.
    pub fn on_step_done(&mut self, now: Instant) {
        if self.state != PlaybackState::Running {
            return;
        }
        self.remaining_steps = self.remaining_steps.saturating_sub(1);
        if self.remaining_steps > 0 {
            tracing::trace!(remaining = self.remaining_steps, "jump in progress");
            return;
        }
        self.transition(PlaybackState::StepReady);
        if self.continuous {
            self.pending_advance = Some(now + self.pacing);
        }
    }

    /// `program_termination`.
    pub fn on_termination(&mut self) {
        if matches!(self.state, PlaybackState::Running | PlaybackState::StepReady) {
            self.continuous = false;
            self.remaining_steps = 0;
            self.transition(PlaybackState::Terminating);
        }
    }

    /// Fire the paced advance once it is due. The continuous flag is checked
    /// here, so a stop issued after scheduling sends nothing.
    pub fn poll(&mut self, now: Instant) -> Option<PlayerAction> {
        let due = self.pending_advance.filter(|at| *at <= now)?;
        tracing::trace!(?due, "paced advance due");
        self.pending_advance = None;
        if self.continuous && self.state == PlaybackState::StepReady {
            self.run(1);
            Some(PlayerAction::Advance)
        } else {
            None
        }
    }

    /// Whether a paced advance is waiting.
    pub fn has_pending_advance(&self) -> bool {
        self.pending_advance.is_some()
    }

    /// Whether `command` would be accepted in the current state.
    pub fn allowed(&self, command: PlayerCommand) -> bool {
        match command {
            PlayerCommand::Advance | PlayerCommand::Jump { .. } => {
                self.state == PlaybackState::StepReady
            }
            PlayerCommand::Play => {
                !self.continuous
                    && matches!(self.state, PlaybackState::Running | PlaybackState::StepReady)
            }
            PlayerCommand::Stop => {
                self.continuous
                    && matches!(self.state, PlaybackState::Running | PlaybackState::StepReady)
            }
            PlayerCommand::Terminate => self.state == PlaybackState::Terminating,
        }
    }

    /// Names of the commands currently accepted.
    pub fn available(&self) -> Vec<&'static str> {
        let one = NonZeroU32::MIN;
        [
            PlayerCommand::Advance,
            PlayerCommand::Play,
            PlayerCommand::Jump { steps: one },
            PlayerCommand::Stop,
            PlayerCommand::Terminate,
        ]
        .into_iter()
        .filter(|c| self.allowed(*c))
        .map(|c| c.name())
        .collect()
    }

    /// Apply a user command. Invalid commands are no-ops.
    pub fn request(&mut self, command: PlayerCommand) -> CommandOutcome {
        if !self.allowed(command) {
            tracing::debug!(command = command.name(), state = ?self.state, "command rejected");
            return CommandOutcome::Rejected;
        }

        match command {
            PlayerCommand::Advance => {
                self.run(1);
                CommandOutcome::Send(PlayerAction::Advance)
            }
            PlayerCommand::Jump { steps } => {
                self.run(steps.get());
                CommandOutcome::Send(PlayerAction::Jump { steps })
            }
            PlayerCommand::Play => {
                self.continuous = true;
                if self.state == PlaybackState::StepReady {
                    self.run(1);
                    CommandOutcome::Send(PlayerAction::Advance)
                } else {
                    CommandOutcome::Accepted
                }
            }
            PlayerCommand::Stop => {
                self.continuous = false;
                CommandOutcome::Accepted
            }
            PlayerCommand::Terminate => {
                self.transition(PlaybackState::Terminated);
                CommandOutcome::Send(PlayerAction::Terminate)
            }
        }
    }
}

/// Playback status for sending to presentation clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaybackStatus {
    pub state: PlaybackState,
    pub continuous: bool,
    pub available: Vec<&'static str>,
}

impl From<&PlaybackController> for PlaybackStatus {
    fn from(controller: &PlaybackController) -> Self {
        Self {
            state: controller.state,
            continuous: controller.continuous,
            available: controller.available(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running() -> PlaybackController {
        let mut pb = PlaybackController::default();
        pb.on_open();
        pb.on_init(false);
        pb.on_program_running();
        pb
    }

    #[test]
    fn starts_disconnected() {
        let pb = PlaybackController::default();
        assert_eq!(pb.state(), PlaybackState::Disconnected);
        assert!(pb.available().is_empty());
    }

    #[test]
    fn init_without_program_goes_idle() {
        let mut pb = PlaybackController::default();
        pb.on_open();
        assert_eq!(pb.state(), PlaybackState::AwaitingProgram);
        pb.on_init(false);
        assert_eq!(pb.state(), PlaybackState::Idle);
    }

    #[test]
    fn init_with_program_runs() {
        let mut pb = PlaybackController::default();
        pb.on_open();
        pb.on_init(true);
        assert_eq!(pb.state(), PlaybackState::Running);
    }

    #[test]
    fn step_cycle() {
        let mut pb = running();
        assert_eq!(pb.state(), PlaybackState::Running);
        pb.on_step_done(Instant::now());
        assert_eq!(pb.state(), PlaybackState::StepReady);
        assert_eq!(pb.request(PlayerCommand::Advance), CommandOutcome::Send(PlayerAction::Advance));
        assert_eq!(pb.state(), PlaybackState::Running);
    }

    #[test]
    fn advance_while_running_is_rejected() {
        let mut pb = running();
        assert_eq!(pb.request(PlayerCommand::Advance), CommandOutcome::Rejected);
        assert_eq!(pb.state(), PlaybackState::Running);
    }

    #[test]
    fn jump_sends_step_count() {
        let mut pb = running();
        pb.on_step_done(Instant::now());
        let steps = NonZeroU32::new(10).unwrap();
        assert_eq!(
            pb.request(PlayerCommand::Jump { steps }),
            CommandOutcome::Send(PlayerAction::Jump { steps })
        );
        assert_eq!(pb.state(), PlaybackState::Running);
    }

    #[test]
    fn jump_waits_for_every_step() {
        let mut pb = PlaybackController::default();
        pb.on_open();
        pb.on_init(true);
        pb.on_step_done(Instant::now());
        let steps = NonZeroU32::new(3).unwrap();
        pb.request(PlayerCommand::Jump { steps });
        assert_eq!(pb.remaining_steps(), 3);

        for left in [2, 1] {
            pb.on_step_done(Instant::now());
            assert_eq!(pb.state(), PlaybackState::Running);
            assert_eq!(pb.remaining_steps(), left);
            assert_eq!(pb.request(PlayerCommand::Advance), CommandOutcome::Rejected);
        }
        pb.on_step_done(Instant::now());
        assert_eq!(pb.state(), PlaybackState::StepReady);
        assert_eq!(pb.request(PlayerCommand::Advance), CommandOutcome::Send(PlayerAction::Advance));
    }

    #[test]
    fn continuous_jump_paces_after_last_step() {
        let mut pb = running();
        let t0 = Instant::now();
        pb.on_step_done(t0);
        pb.request(PlayerCommand::Jump { steps: NonZeroU32::new(2).unwrap() });
        pb.request(PlayerCommand::Play);
        pb.on_step_done(t0);
        assert!(!pb.has_pending_advance());
        pb.on_step_done(t0);
        assert!(pb.has_pending_advance());
        assert_eq!(pb.poll(t0 + DEFAULT_STEP_PACING), Some(PlayerAction::Advance));
        assert_eq!(pb.remaining_steps(), 1);
    }

    #[test]
    fn termination_leaves_only_terminate() {
        let mut pb = running();
        pb.on_step_done(Instant::now());
        pb.on_termination();
        assert_eq!(pb.state(), PlaybackState::Terminating);
        assert_eq!(pb.available(), vec!["terminate"]);

        assert_eq!(pb.request(PlayerCommand::Advance), CommandOutcome::Rejected);
        assert_eq!(pb.state(), PlaybackState::Terminating);

        assert_eq!(
            pb.request(PlayerCommand::Terminate),
            CommandOutcome::Send(PlayerAction::Terminate)
        );
        assert_eq!(pb.state(), PlaybackState::Terminated);
    }

    #[test]
    fn continuous_mode_paces_advances() {
        let mut pb = running();
        let t0 = Instant::now();
        assert_eq!(pb.request(PlayerCommand::Play), CommandOutcome::Accepted);
        assert!(pb.is_continuous());

        pb.on_step_done(t0);
        assert_eq!(pb.state(), PlaybackState::StepReady);
        assert_eq!(pb.poll(t0 + Duration::from_millis(100)), None);
        assert_eq!(pb.poll(t0 + DEFAULT_STEP_PACING), Some(PlayerAction::Advance));
        assert_eq!(pb.state(), PlaybackState::Running);
        assert!(!pb.has_pending_advance());
    }

    #[test]
    fn play_from_step_ready_advances_at_once() {
        let mut pb = running();
        pb.on_step_done(Instant::now());
        assert_eq!(pb.request(PlayerCommand::Play), CommandOutcome::Send(PlayerAction::Advance));
        assert_eq!(pb.state(), PlaybackState::Running);
    }

    #[test]
    fn stop_cancels_scheduled_advance() {
        let mut pb = running();
        let t0 = Instant::now();
        pb.request(PlayerCommand::Play);
        pb.on_step_done(t0);
        assert!(pb.has_pending_advance());
        assert_eq!(pb.request(PlayerCommand::Stop), CommandOutcome::Accepted);

        // The scheduled advance still comes due but sends nothing.
        assert_eq!(pb.poll(t0 + DEFAULT_STEP_PACING), None);
        assert_eq!(pb.state(), PlaybackState::StepReady);
        assert!(!pb.has_pending_advance());
    }

    #[test]
    fn disconnect_from_any_state() {
        let mut pb = running();
        pb.request(PlayerCommand::Play);
        pb.on_close();
        assert_eq!(pb.state(), PlaybackState::Disconnected);
        assert!(!pb.is_continuous());
        pb.on_open();
        assert_eq!(pb.state(), PlaybackState::AwaitingProgram);
    }

    #[test]
    fn new_program_after_termination() {
        let mut pb = running();
        pb.on_termination();
        pb.request(PlayerCommand::Terminate);
        pb.on_program_running();
        assert_eq!(pb.state(), PlaybackState::Running);
    }

    #[test]
    fn status_conversion() {
        let mut pb = running();
        pb.on_step_done(Instant::now());
        let status = PlaybackStatus::from(&pb);
        assert_eq!(status.state, PlaybackState::StepReady);
        assert_eq!(status.available, vec!["advance", "play", "jump"]);
    }
}
