//! Agent-vs-agent turn orchestration
//!
//! Agent 1 plays the user seat (`player_conversation`), agent 2 the opponent
//! seat (`conversation`). Turns alternate with a cancellable pacing delay;
//! the text an agent produced is relayed to the other agent as a user
//! message.

use super::session::{GameSession, SessionError};
use super::traits::{ChatClient, GameStore};
use super::TurnOutcome;
use crate::config::RuntimeConfig;
use crate::game::{GameMode, Side};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Agent play is not running")]
    NotRunning,
    #[error("A turn is already in flight")]
    TurnOutstanding,
    #[error("Automated play requires an agent-vs-agent game")]
    WrongMode,
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Why automated play stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    GameOver,
    TransportError,
    TurnLimit,
    Stopped,
}

/// What the orchestrator does after a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep {
    Schedule { seat: Side, delay: Duration },
    Stop(StopReason),
}

/// Turn bookkeeping for one automated game
#[derive(Debug, Clone)]
pub struct AgentTurnContext {
    current_turn: Side,
    running: bool,
    outstanding: bool,
    turns_taken: u32,
    agent1_model: String,
    agent2_model: String,
}

impl AgentTurnContext {
    pub fn new(agent1_model: impl Into<String>, agent2_model: impl Into<String>) -> Self {
        Self {
            current_turn: Side::User,
            running: true,
            outstanding: false,
            turns_taken: 0,
            agent1_model: agent1_model.into(),
            agent2_model: agent2_model.into(),
        }
    }

    /// Seat whose turn is next (or in flight)
    pub fn current_turn(&self) -> Side {
        self.current_turn
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn turns_taken(&self) -> u32 {
        self.turns_taken
    }

    pub fn model_for(&self, seat: Side) -> &str {
        match seat {
            Side::User => &self.agent1_model,
            Side::Opponent => &self.agent2_model,
        }
    }

    /// Claim the next turn. Refused while stopped or while a turn is in
    /// flight.
    pub fn begin_turn(&mut self) -> Result<Side, OrchestratorError> {
        if !self.running {
            return Err(OrchestratorError::NotRunning);
        }
        if self.outstanding {
            return Err(OrchestratorError::TurnOutstanding);
        }
        self.outstanding = true;
        Ok(self.current_turn)
    }

    /// Record a finished turn and decide what comes next.
    pub fn after_turn(&mut self, outcome: &TurnOutcome, pacing: Duration, max_turns: u32) -> NextStep {
        self.outstanding = false;
        self.turns_taken += 1;

        let reason = match outcome {
            _ if !self.running => StopReason::Stopped,
            TurnOutcome::GameOver { .. } => StopReason::GameOver,
            TurnOutcome::TransportFailed { .. } => StopReason::TransportError,
            TurnOutcome::Finished { .. } | TurnOutcome::ContinuationLimit { .. } => {
                if self.turns_taken >= max_turns {
                    StopReason::TurnLimit
                } else {
                    self.current_turn = self.current_turn.other();
                    return NextStep::Schedule {
                        seat: self.current_turn,
                        delay: pacing,
                    };
                }
            }
        };
        self.running = false;
        NextStep::Stop(reason)
    }

    /// Stop scheduling. A turn already in flight still completes.
    pub fn stop(&mut self) {
        self.running = false;
    }

    fn abort(&mut self) {
        self.running = false;
        self.outstanding = false;
    }
}

/// Stops an orchestrator from another task
#[derive(Debug, Clone)]
pub struct OrchestratorHandle {
    cancel: CancellationToken,
}

impl OrchestratorHandle {
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Drives both seats of an agent-vs-agent game
pub struct TurnOrchestrator<S: GameStore> {
    session: GameSession<S>,
    agent1: Arc<dyn ChatClient>,
    agent2: Arc<dyn ChatClient>,
    context: AgentTurnContext,
    pacing: Duration,
    max_agent_turns: u32,
    cancel: CancellationToken,
}

impl<S: GameStore> TurnOrchestrator<S> {
    pub fn new(
        session: GameSession<S>,
        agent1: Arc<dyn ChatClient>,
        agent2: Arc<dyn ChatClient>,
        config: &RuntimeConfig,
    ) -> Result<Self, OrchestratorError> {
        if session.mode() != GameMode::AiVsAi {
            return Err(OrchestratorError::WrongMode);
        }
        let context = AgentTurnContext::new(agent1.model_id(), agent2.model_id());
        Ok(Self {
            session: session.with_max_continuations(config.max_continuations),
            agent1,
            agent2,
            context,
            pacing: config.agent_pacing,
            max_agent_turns: config.max_agent_turns,
            cancel: CancellationToken::new(),
        })
    }

    pub fn handle(&self) -> OrchestratorHandle {
        OrchestratorHandle {
            cancel: self.cancel.clone(),
        }
    }

    pub fn context(&self) -> &AgentTurnContext {
        &self.context
    }

    pub fn session(&self) -> &GameSession<S> {
        &self.session
    }

    pub fn into_session(self) -> GameSession<S> {
        self.session
    }

    /// Run the current seat's turn and relay its text to the other seat if
    /// play continues.
    pub async fn run_next_turn(&mut self) -> Result<NextStep, OrchestratorError> {
        if self.cancel.is_cancelled() {
            self.context.stop();
        }
        if self.session.state().is_completed() {
            self.context.abort();
            return Ok(NextStep::Stop(StopReason::GameOver));
        }

        let seat = self.context.begin_turn()?;
        let client = match seat {
            Side::User => Arc::clone(&self.agent1),
            Side::Opponent => Arc::clone(&self.agent2),
        };
        tracing::info!(
            game_id = %self.session.game_id(),
            agent = agent_label(seat),
            model = client.model_id(),
            turn = self.context.turns_taken + 1,
            "Agent turn started"
        );

        let outcome = match self.session.run_turn(seat, client.as_ref()).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.context.abort();
                return Err(e.into());
            }
        };

        if self.cancel.is_cancelled() {
            self.context.stop();
        }
        let step = self
            .context
            .after_turn(&outcome, self.pacing, self.max_agent_turns);

        if let NextStep::Schedule { seat: next, .. } = step {
            let text = outcome.text();
            if !text.is_empty() {
                self.session.relay_message(next, text).await?;
            }
        }

        tracing::info!(
            game_id = %self.session.game_id(),
            agent = agent_label(seat),
            ?step,
            "Agent turn finished"
        );
        Ok(step)
    }

    /// Alternate turns until the game ends, a transport error occurs, the
    /// turn cap is reached, or the handle is stopped.
    pub async fn run(&mut self) -> Result<StopReason, OrchestratorError> {
        tracing::info!(
            game_id = %self.session.game_id(),
            agent1 = %self.context.agent1_model,
            agent2 = %self.context.agent2_model,
            "Agent play started"
        );

        let reason = loop {
            let step = match self.run_next_turn().await {
                Ok(step) => step,
                Err(OrchestratorError::NotRunning) => break StopReason::Stopped,
                Err(e) => {
                    tracing::error!(game_id = %self.session.game_id(), error = %e, "Agent play aborted");
                    return Err(e);
                }
            };
            match step {
                NextStep::Stop(reason) => break reason,
                NextStep::Schedule { delay, .. } => {
                    tokio::select! {
                        () = self.cancel.cancelled() => {
                            self.context.stop();
                            break StopReason::Stopped;
                        }
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        };

        tracing::info!(
            game_id = %self.session.game_id(),
            ?reason,
            turns = self.context.turns_taken,
            "Agent play stopped"
        );
        Ok(reason)
    }
}

fn agent_label(seat: Side) -> &'static str {
    match seat {
        Side::User => "agent1",
        Side::Opponent => "agent2",
    }
}
