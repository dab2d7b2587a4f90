//! Per-chat game state and its transitions.
//!
//! Every transition either applies completely or is [`Rejected`] without
//! touching the session, so stale or duplicated input is always a no-op.

use std::fmt;

use thiserror::Error;

use crate::quiz::provider::ProviderError;
use crate::quiz::{Difficulty, Question, OPTION_COUNT, TOTAL_ROUNDS};

/// Identifies one fetch/answer round. Input carrying any other token is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct RoundToken(u64);

impl RoundToken {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for RoundToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Phase {
    #[default]
    Start,
    Loading {
        token: RoundToken,
        error: Option<String>,
    },
    AwaitingAnswer {
        token: RoundToken,
        question: Question,
    },
    Scoring {
        token: RoundToken,
        question: Question,
        selected: usize,
    },
    GameOver,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Rejected {
    #[error("not allowed while {0}")]
    WrongPhase(&'static str),
    #[error("round {0} is no longer current")]
    StaleRound(RoundToken),
    #[error("option {0} does not exist")]
    NoSuchOption(usize),
    #[error("all {} rounds are already answered", TOTAL_ROUNDS)]
    RoundsExhausted,
}

/// Result of handing a fetch result to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Question(Question),
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub selected: usize,
    pub correct_index: usize,
    pub score: u32,
    pub rounds_completed: u32,
}

impl Verdict {
    pub fn is_correct(&self) -> bool {
        self.selected == self.correct_index
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    NextRound(RoundToken),
    Finished { score: u32, total: u32 },
}

/// One play-through, from difficulty selection to game over.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Session {
    score: u32,
    rounds_completed: u32,
    difficulty: Difficulty,
    phase: Phase,
    generation: u64,
}

impl Session {
    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn rounds_completed(&self) -> u32 {
        self.rounds_completed
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    /// 1-based number of the round currently being fetched or answered.
    pub fn current_round(&self) -> u32 {
        (self.rounds_completed + 1).min(TOTAL_ROUNDS)
    }

    pub fn awaiting_answer(&self) -> bool {
        matches!(self.phase, Phase::AwaitingAnswer { .. }) && self.rounds_completed < TOTAL_ROUNDS
    }

    pub fn start(&mut self, difficulty: Difficulty) -> Result<RoundToken, Rejected> {
        if !matches!(self.phase, Phase::Start) {
            return Err(Rejected::WrongPhase(self.phase_name()));
        }
        self.score = 0;
        self.rounds_completed = 0;
        self.difficulty = difficulty;
        Ok(self.begin_loading())
    }

    pub fn deliver(
        &mut self,
        token: RoundToken,
        result: Result<Question, ProviderError>,
    ) -> Result<Delivery, Rejected> {
        match &self.phase {
            Phase::Loading { token: current, error: None } if *current == token => {}
            Phase::Loading { token: current, .. } if *current == token => {
                return Err(Rejected::StaleRound(token));
            }
            Phase::Loading { .. }
            | Phase::AwaitingAnswer { .. }
            | Phase::Scoring { .. } => return Err(Rejected::StaleRound(token)),
            _ => return Err(Rejected::WrongPhase(self.phase_name())),
        }

        match result {
            Ok(question) => {
                self.phase = Phase::AwaitingAnswer {
                    token,
                    question: question.clone(),
                };
                Ok(Delivery::Question(question))
            }
            Err(err) => {
                let reason = err.to_string();
                self.phase = Phase::Loading {
                    token,
                    error: Some(reason.clone()),
                };
                Ok(Delivery::Failed(reason))
            }
        }
    }

    pub fn answer(&mut self, token: RoundToken, index: usize) -> Result<Verdict, Rejected> {
        let question = match &self.phase {
            Phase::AwaitingAnswer { token: current, question } if *current == token => question,
            Phase::AwaitingAnswer { .. } => return Err(Rejected::StaleRound(token)),
            _ => return Err(Rejected::WrongPhase(self.phase_name())),
        };
        if index >= OPTION_COUNT {
            return Err(Rejected::NoSuchOption(index));
        }
        if self.rounds_completed >= TOTAL_ROUNDS {
            return Err(Rejected::RoundsExhausted);
        }

        let question = question.clone();
        if question.is_correct(index) {
            self.score += 1;
        }
        self.rounds_completed += 1;

        let verdict = Verdict {
            selected: index,
            correct_index: question.correct_index(),
            score: self.score,
            rounds_completed: self.rounds_completed,
        };
        self.phase = Phase::Scoring {
            token,
            question,
            selected: index,
        };
        Ok(verdict)
    }

    pub fn advance(&mut self, token: RoundToken) -> Result<Advance, Rejected> {
        match &self.phase {
            Phase::Scoring { token: current, .. } if *current == token => {}
            Phase::Scoring { .. } => return Err(Rejected::StaleRound(token)),
            _ => return Err(Rejected::WrongPhase(self.phase_name())),
        }

        if self.rounds_completed >= TOTAL_ROUNDS {
            self.phase = Phase::GameOver;
            Ok(Advance::Finished {
                score: self.score,
                total: TOTAL_ROUNDS,
            })
        } else {
            Ok(Advance::NextRound(self.begin_loading()))
        }
    }

    /// Takes back a delivered question that never reached the player, leaving
    /// the round stalled as if its fetch had failed.
    pub fn stall(&mut self, token: RoundToken, reason: String) -> Result<(), Rejected> {
        match &self.phase {
            Phase::AwaitingAnswer { token: current, .. } if *current == token => {}
            Phase::AwaitingAnswer { .. } => return Err(Rejected::StaleRound(token)),
            _ => return Err(Rejected::WrongPhase(self.phase_name())),
        }
        self.phase = Phase::Loading {
            token,
            error: Some(reason),
        };
        Ok(())
    }

    /// Re-issues the fetch of a round whose previous fetch failed.
    pub fn retry(&mut self) -> Result<RoundToken, Rejected> {
        if !matches!(self.phase, Phase::Loading { error: Some(_), .. }) {
            return Err(Rejected::WrongPhase(self.phase_name()));
        }
        Ok(self.begin_loading())
    }

    pub fn play_again(&mut self) -> Result<(), Rejected> {
        if !matches!(self.phase, Phase::GameOver) {
            return Err(Rejected::WrongPhase(self.phase_name()));
        }
        self.phase = Phase::Start;
        Ok(())
    }

    /// Leaves whatever is going on and returns to the start screen.
    pub fn abandon(&mut self) {
        self.generation += 1;
        self.phase = Phase::Start;
    }

    fn begin_loading(&mut self) -> RoundToken {
        self.generation += 1;
        let token = RoundToken(self.generation);
        self.phase = Phase::Loading { token, error: None };
        token
    }

    fn phase_name(&self) -> &'static str {
        match self.phase {
            Phase::Start => "on the start screen",
            Phase::Loading { error: None, .. } => "loading a question",
            Phase::Loading { error: Some(_), .. } => "stalled on a failed fetch",
            Phase::AwaitingAnswer { .. } => "awaiting an answer",
            Phase::Scoring { .. } => "showing feedback",
            Phase::GameOver => "the game is over",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::tests::question;

    fn loaded(session: &mut Session, correct: usize) -> RoundToken {
        let token = match session.phase() {
            Phase::Loading { token, .. } => *token,
            other => panic!("expected loading, got {other:?}"),
        };
        session.deliver(token, Ok(question(correct))).unwrap();
        token
    }

    #[test]
    fn start_resets_counters_and_loads() {
        let mut session = Session::default();
        let token = session.start(Difficulty::Hard).unwrap();

        assert_eq!(session.score(), 0);
        assert_eq!(session.rounds_completed(), 0);
        assert_eq!(session.difficulty(), Difficulty::Hard);
        assert_eq!(session.phase(), &Phase::Loading { token, error: None });
        assert!(!session.awaiting_answer());
    }

    #[test]
    fn correct_answer_scores_and_wrong_one_does_not() {
        let mut session = Session::default();
        session.start(Difficulty::Medium).unwrap();

        let token = loaded(&mut session, 1);
        assert!(session.awaiting_answer());
        let verdict = session.answer(token, 1).unwrap();
        assert!(verdict.is_correct());
        assert_eq!((session.score(), session.rounds_completed()), (1, 1));

        let Advance::NextRound(_) = session.advance(token).unwrap() else {
            panic!("game ended early");
        };
        let token = loaded(&mut session, 1);
        let verdict = session.answer(token, 3).unwrap();
        assert!(!verdict.is_correct());
        assert_eq!(verdict.correct_index, 1);
        assert_eq!((session.score(), session.rounds_completed()), (1, 2));
    }

    #[test]
    fn second_answer_is_ignored() {
        let mut session = Session::default();
        session.start(Difficulty::Easy).unwrap();
        let token = loaded(&mut session, 0);

        session.answer(token, 0).unwrap();
        let before = session.clone();
        assert_eq!(
            session.answer(token, 0),
            Err(Rejected::WrongPhase("showing feedback"))
        );
        assert_eq!(session, before);
    }

    #[test]
    fn answer_while_loading_is_ignored() {
        let mut session = Session::default();
        let token = session.start(Difficulty::Easy).unwrap();
        let before = session.clone();

        assert!(session.answer(token, 0).is_err());
        assert_eq!(session, before);
    }

    #[test]
    fn out_of_range_option_is_rejected() {
        let mut session = Session::default();
        session.start(Difficulty::Easy).unwrap();
        let token = loaded(&mut session, 0);

        assert_eq!(session.answer(token, 4), Err(Rejected::NoSuchOption(4)));
        assert!(session.awaiting_answer());
    }

    #[test]
    fn stale_tokens_have_no_effect() {
        let mut session = Session::default();
        let first = session.start(Difficulty::Medium).unwrap();
        session.abandon();
        assert_eq!(session.phase(), &Phase::Start);

        // a late delivery for the abandoned round
        assert!(session.deliver(first, Ok(question(0))).is_err());
        assert_eq!(session.phase(), &Phase::Start);

        let second = session.start(Difficulty::Medium).unwrap();
        assert_ne!(first, second);
        assert_eq!(
            session.deliver(first, Ok(question(0))),
            Err(Rejected::StaleRound(first))
        );
        let token = loaded(&mut session, 0);
        assert_eq!(token, second);
        assert_eq!(session.answer(first, 0), Err(Rejected::StaleRound(first)));
        assert_eq!(session.score(), 0);
    }

    #[test]
    fn failed_fetch_stalls_until_retry() {
        let mut session = Session::default();
        let token = session.start(Difficulty::Medium).unwrap();
        assert!(session.retry().is_err());

        let delivery = session
            .deliver(token, Err(ProviderError::EmptyResponse))
            .unwrap();
        assert!(matches!(delivery, Delivery::Failed(_)));
        assert!(!session.awaiting_answer());
        // the failed round cannot be delivered twice
        assert!(session.deliver(token, Ok(question(0))).is_err());

        let retried = session.retry().unwrap();
        assert_ne!(retried, token);
        assert_eq!(session.phase(), &Phase::Loading { token: retried, error: None });
        assert_eq!((session.score(), session.rounds_completed()), (0, 0));
    }

    #[test]
    fn undelivered_question_can_be_retried() {
        let mut session = Session::default();
        session.start(Difficulty::Medium).unwrap();
        let token = loaded(&mut session, 0);

        assert_eq!(
            session.stall(RoundToken::new(99), "gone".to_string()),
            Err(Rejected::StaleRound(RoundToken::new(99)))
        );
        session.stall(token, "gone".to_string()).unwrap();
        assert_eq!(
            session.phase(),
            &Phase::Loading {
                token,
                error: Some("gone".to_string())
            }
        );
        assert_eq!(session.answer(token, 0), Err(Rejected::WrongPhase("stalled on a failed fetch")));

        let retried = session.retry().unwrap();
        assert_ne!(retried, token);
        assert_eq!((session.score(), session.rounds_completed()), (0, 0));
    }

    #[test]
    fn five_rounds_end_the_game() {
        let mut session = Session::default();
        session.start(Difficulty::Medium).unwrap();

        for round in 1..=TOTAL_ROUNDS {
            assert_eq!(session.current_round(), round);
            let token = loaded(&mut session, 2);
            session.answer(token, if round == 1 { 2 } else { 0 }).unwrap();
            match session.advance(token).unwrap() {
                Advance::NextRound(_) => assert!(round < TOTAL_ROUNDS),
                Advance::Finished { score, total } => {
                    assert_eq!(round, TOTAL_ROUNDS);
                    assert_eq!((score, total), (1, 5));
                }
            }
        }

        assert_eq!(session.phase(), &Phase::GameOver);
        assert!(!session.awaiting_answer());
        assert!(session.retry().is_err());
        assert!(session.start(Difficulty::Easy).is_err());

        session.play_again().unwrap();
        assert_eq!(session.phase(), &Phase::Start);
        assert_eq!((session.score(), session.rounds_completed()), (1, 5));

        session.start(Difficulty::Easy).unwrap();
        assert_eq!((session.score(), session.rounds_completed()), (0, 0));
    }

    #[test]
    fn play_again_only_after_game_over() {
        let mut session = Session::default();
        assert!(session.play_again().is_err());
        session.start(Difficulty::Medium).unwrap();
        assert!(session.play_again().is_err());
    }

    #[test]
    fn session_survives_serialization() {
        let mut session = Session::default();
        session.start(Difficulty::Hard).unwrap();
        loaded(&mut session, 3);

        let json = serde_json::to_string(&session).unwrap();
        let back: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(back, session);
    }
}
