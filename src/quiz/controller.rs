use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, info, warn};

use crate::quiz::provider::QuestionProvider;
use crate::quiz::session::{Advance, Delivery, Phase, RoundToken, Session};
use crate::quiz::{Difficulty, Question, TOTAL_ROUNDS};

pub type ViewResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

pub const FEEDBACK_DELAY: Duration = Duration::from_secs(2);

const ERROR_TEXT: &str = "Erro na transmissão. Por favor, tente novamente.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    Correct,
    Incorrect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionMark {
    pub index: usize,
    pub mark: Mark,
}

/// What the game shows. Implementations only draw; they never call back.
#[async_trait]
pub trait GameView: Send + Sync {
    async fn show_start(&self) -> ViewResult;
    async fn show_loading(&self) -> ViewResult;
    async fn render_question(&self, round: u32, question: &Question, token: RoundToken)
        -> ViewResult;
    /// Marks answered options. Marked questions no longer accept a selection.
    async fn mark_options(&self, question: &Question, marks: &[OptionMark]) -> ViewResult;
    async fn update_score(&self, score: u32) -> ViewResult;
    async fn show_error(&self, message: &str) -> ViewResult;
    async fn show_game_over(&self, score: u32, total: u32) -> ViewResult;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEvent {
    Started,
    Correct,
    Incorrect,
    Finished,
}

pub trait GameListener: Send + Sync {
    fn notify(&self, event: GameEvent);
}

/// Drives a [`Session`] through its rounds.
///
/// The session is borrowed mutably for the whole of each operation, so a
/// session never has more than one fetch or feedback pause going on.
pub struct GameController<V, L> {
    provider: Arc<dyn QuestionProvider>,
    view: V,
    listener: L,
    feedback_delay: Duration,
}

impl<V: GameView, L: GameListener> GameController<V, L> {
    pub fn new(provider: Arc<dyn QuestionProvider>, view: V, listener: L) -> Self {
        Self {
            provider,
            view,
            listener,
            feedback_delay: FEEDBACK_DELAY,
        }
    }

    pub fn with_feedback_delay(mut self, delay: Duration) -> Self {
        self.feedback_delay = delay;
        self
    }

    pub async fn show_start(&self) -> ViewResult {
        self.view.show_start().await
    }

    pub async fn select_difficulty(
        &self,
        session: &mut Session,
        difficulty: Difficulty,
    ) -> ViewResult {
        let token = match session.start(difficulty) {
            Ok(token) => token,
            Err(rejected) => {
                debug!("Ignoring difficulty {difficulty}: {rejected}");
                return Ok(());
            }
        };
        info!("New session at difficulty {difficulty}");

        self.listener.notify(GameEvent::Started);
        carry_on("score", self.view.update_score(session.score()).await);
        self.load(session, token).await
    }

    pub async fn select_option(
        &self,
        session: &mut Session,
        token: RoundToken,
        index: usize,
    ) -> ViewResult {
        let question = match session.phase() {
            Phase::AwaitingAnswer { question, .. } => question.clone(),
            _ => {
                debug!("Ignoring option {index} for round {token}: no question on screen");
                return Ok(());
            }
        };
        let verdict = match session.answer(token, index) {
            Ok(verdict) => verdict,
            Err(rejected) => {
                debug!("Ignoring option {index} for round {token}: {rejected}");
                return Ok(());
            }
        };
        debug!(
            "Round {} of {TOTAL_ROUNDS}: picked {index}, answer was `{}`",
            verdict.rounds_completed,
            question.correct_option()
        );

        if verdict.is_correct() {
            let marks = [OptionMark {
                index: verdict.selected,
                mark: Mark::Correct,
            }];
            carry_on("marks", self.view.mark_options(&question, &marks).await);
            carry_on("score", self.view.update_score(verdict.score).await);
            self.listener.notify(GameEvent::Correct);
        } else {
            let marks = [
                OptionMark {
                    index: verdict.selected,
                    mark: Mark::Incorrect,
                },
                OptionMark {
                    index: verdict.correct_index,
                    mark: Mark::Correct,
                },
            ];
            carry_on("marks", self.view.mark_options(&question, &marks).await);
            self.listener.notify(GameEvent::Incorrect);
        }

        tokio::time::sleep(self.feedback_delay).await;

        match session.advance(token) {
            Ok(Advance::NextRound(next)) => self.load(session, next).await,
            Ok(Advance::Finished { score, total }) => {
                info!("Session finished with {score} of {total}");
                self.listener.notify(GameEvent::Finished);
                self.view.show_game_over(score, total).await
            }
            Err(rejected) => {
                debug!("Round {token} moved on during feedback: {rejected}");
                Ok(())
            }
        }
    }

    pub async fn retry(&self, session: &mut Session) -> ViewResult {
        match session.retry() {
            Ok(token) => self.load(session, token).await,
            Err(rejected) => {
                debug!("Ignoring retry: {rejected}");
                Ok(())
            }
        }
    }

    pub async fn play_again(&self, session: &mut Session) -> ViewResult {
        match session.play_again() {
            Ok(()) => self.view.show_start().await,
            Err(rejected) => {
                debug!("Ignoring play again: {rejected}");
                Ok(())
            }
        }
    }

    /// Abandons any running game and goes back to the start screen.
    pub async fn quit(&self, session: &mut Session) -> ViewResult {
        session.abandon();
        self.view.show_start().await
    }

    async fn load(&self, session: &mut Session, token: RoundToken) -> ViewResult {
        carry_on("loading", self.view.show_loading().await);
        let result = self.provider.fetch(session.difficulty()).await;

        match session.deliver(token, result) {
            Ok(Delivery::Question(question)) => {
                let drawn = self
                    .view
                    .render_question(session.current_round(), &question, token)
                    .await;
                let Err(err) = drawn else {
                    return Ok(());
                };
                // Unanswerable without its buttons, so offer a retry instead
                error!("Could not show round {token}: {err}");
                if let Err(rejected) = session.stall(token, err.to_string()) {
                    debug!("Round {token} moved on while drawing: {rejected}");
                    return Err(err);
                }
                self.view.show_error(ERROR_TEXT).await?;
                Err(err)
            }
            Ok(Delivery::Failed(reason)) => {
                error!("Error fetching question: {reason}");
                self.view.show_error(ERROR_TEXT).await
            }
            Err(rejected) => {
                debug!("Discarding fetch for round {token}: {rejected}");
                Ok(())
            }
        }
    }
}

/// Logs a failed draw in the middle of a transition, which then keeps going.
fn carry_on(what: &str, drawn: ViewResult) {
    if let Err(err) = drawn {
        warn!("Could not draw {what}: {err}");
    }
}
