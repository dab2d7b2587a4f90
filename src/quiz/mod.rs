pub mod controller;
pub mod cues;
pub mod provider;
pub mod session;

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Rounds played in every session.
pub const TOTAL_ROUNDS: u32 = 5;
/// Every question carries exactly this many options.
pub const OPTION_COUNT: usize = 4;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    /// Label shown to the player and interpolated into the generation prompt.
    pub fn label(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Fácil",
            Difficulty::Medium => "Médio",
            Difficulty::Hard => "Difícil",
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown difficulty `{0}`")]
pub struct UnknownDifficulty(String);

impl FromStr for Difficulty {
    type Err = UnknownDifficulty;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Difficulty::ALL
            .into_iter()
            .find(|d| d.code() == s || d.label() == s)
            .ok_or_else(|| UnknownDifficulty(s.to_string()))
    }
}

/// A generated multiple-choice problem.
///
/// Only constructed through [`Question::try_from`] on a [`RawQuestion`], so a
/// value of this type always has a prompt, four distinct options and an
/// in-range answer index. The text is kept exactly as generated.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "RawQuestion", into = "RawQuestion")]
pub struct Question {
    prompt: String,
    options: [String; OPTION_COUNT],
    correct_index: usize,
}

impl Question {
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn options(&self) -> &[String; OPTION_COUNT] {
        &self.options
    }

    pub fn correct_index(&self) -> usize {
        self.correct_index
    }

    pub fn correct_option(&self) -> &str {
        &self.options[self.correct_index]
    }

    pub fn is_correct(&self, index: usize) -> bool {
        index == self.correct_index
    }
}

/// Question payload exactly as the generation service returns it.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer_index: i64,
}

/// Ways a raw payload can break the question contract.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContractViolation {
    #[error("expected {n} options, got {0}", n = OPTION_COUNT)]
    OptionCount(usize),
    #[error("correct answer index {0} is outside 0..{n}", n = OPTION_COUNT)]
    IndexOutOfRange(i64),
    #[error("question text is blank")]
    BlankPrompt,
    #[error("option {0} is blank")]
    BlankOption(usize),
    #[error("option `{0}` appears more than once")]
    DuplicateOption(String),
}

impl TryFrom<RawQuestion> for Question {
    type Error = ContractViolation;

    fn try_from(raw: RawQuestion) -> Result<Self, Self::Error> {
        if raw.question.trim().is_empty() {
            return Err(ContractViolation::BlankPrompt);
        }

        let count = raw.options.len();
        let options: [String; OPTION_COUNT] = raw
            .options
            .try_into()
            .map_err(|_| ContractViolation::OptionCount(count))?;

        let trimmed = options.each_ref().map(|option| option.trim());
        for (i, option) in trimmed.iter().enumerate() {
            if option.is_empty() {
                return Err(ContractViolation::BlankOption(i));
            }
            if trimmed[..i].contains(option) {
                return Err(ContractViolation::DuplicateOption(option.to_string()));
            }
        }

        let correct_index = usize::try_from(raw.correct_answer_index)
            .ok()
            .filter(|i| *i < OPTION_COUNT)
            .ok_or(ContractViolation::IndexOutOfRange(raw.correct_answer_index))?;

        Ok(Self {
            prompt: raw.question,
            options,
            correct_index,
        })
    }
}

impl From<Question> for RawQuestion {
    fn from(question: Question) -> Self {
        Self {
            question: question.prompt,
            options: question.options.into(),
            correct_answer_index: question.correct_index as i64,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn raw(options: &[&str], correct: i64) -> RawQuestion {
        RawQuestion {
            question: "A nave percorre 120 km em 3 minutos. Qual a velocidade por minuto?"
                .to_string(),
            options: options.iter().map(|o| o.to_string()).collect(),
            correct_answer_index: correct,
        }
    }

    pub(crate) fn question(correct: usize) -> Question {
        Question::try_from(raw(&["20 km", "30 km", "40 km", "60 km"], correct as i64))
            .expect("valid question")
    }

    #[test]
    fn valid_payload_is_echoed() {
        let q = Question::try_from(raw(&["20 km", "30 km", "40 km", "60 km"], 2)).unwrap();
        assert_eq!(
            q.prompt(),
            "A nave percorre 120 km em 3 minutos. Qual a velocidade por minuto?"
        );
        assert_eq!(q.options(), &["20 km", "30 km", "40 km", "60 km"].map(String::from));
        assert_eq!(q.correct_index(), 2);
        assert_eq!(q.correct_option(), "40 km");
        assert!(q.is_correct(2));
        assert!(!q.is_correct(0));
    }

    #[test]
    fn three_or_five_options_are_rejected_not_padded() {
        let err = Question::try_from(raw(&["1", "2", "3"], 0)).unwrap_err();
        assert_eq!(err, ContractViolation::OptionCount(3));

        let err = Question::try_from(raw(&["1", "2", "3", "4", "5"], 0)).unwrap_err();
        assert_eq!(err, ContractViolation::OptionCount(5));
    }

    #[test]
    fn index_must_fall_inside_options() {
        for bad in [-1, 4, 17] {
            let err = Question::try_from(raw(&["1", "2", "3", "4"], bad)).unwrap_err();
            assert_eq!(err, ContractViolation::IndexOutOfRange(bad));
        }
        for good in 0..4 {
            assert!(Question::try_from(raw(&["1", "2", "3", "4"], good)).is_ok());
        }
    }

    #[test]
    fn blank_and_duplicate_options_are_rejected() {
        let err = Question::try_from(raw(&["1", " ", "3", "4"], 0)).unwrap_err();
        assert_eq!(err, ContractViolation::BlankOption(1));

        let err = Question::try_from(raw(&["1", "2", "2 ", "4"], 0)).unwrap_err();
        assert_eq!(err, ContractViolation::DuplicateOption("2".to_string()));

        let mut blank = raw(&["1", "2", "3", "4"], 0);
        blank.question = "   ".to_string();
        assert_eq!(
            Question::try_from(blank).unwrap_err(),
            ContractViolation::BlankPrompt
        );
    }

    #[test]
    fn padded_text_is_kept_as_generated() {
        let mut padded = raw(&[" 4 ", "5", "6", "7\n"], 0);
        padded.question = "  Quanto é 2+2?\n".to_string();
        let q = Question::try_from(padded).unwrap();

        assert_eq!(q.prompt(), "  Quanto é 2+2?\n");
        assert_eq!(q.options(), &[" 4 ", "5", "6", "7\n"].map(String::from));
        assert_eq!(q.correct_option(), " 4 ");
    }

    #[test]
    fn stored_question_is_validated_on_load() {
        let q = question(3);
        let json = serde_json::to_string(&q).unwrap();
        assert!(json.contains("\"correctAnswerIndex\":3"));
        assert_eq!(serde_json::from_str::<Question>(&json).unwrap(), q);

        let tampered = json.replace("\"correctAnswerIndex\":3", "\"correctAnswerIndex\":9");
        assert!(serde_json::from_str::<Question>(&tampered).is_err());
    }

    #[test]
    fn contract_messages_name_the_expected_count() {
        assert_eq!(
            ContractViolation::OptionCount(3).to_string(),
            "expected 4 options, got 3"
        );
        assert_eq!(
            ContractViolation::IndexOutOfRange(7).to_string(),
            "correct answer index 7 is outside 0..4"
        );
    }

    #[test]
    fn difficulty_round_trips_through_code_and_label() {
        for d in Difficulty::ALL {
            assert_eq!(d.code().parse::<Difficulty>(), Ok(d));
            assert_eq!(d.label().parse::<Difficulty>(), Ok(d));
        }
        assert_eq!(Difficulty::default(), Difficulty::Medium);
        assert_eq!(Difficulty::Medium.to_string(), "Médio");
        assert!("extreme".parse::<Difficulty>().is_err());
    }
}
