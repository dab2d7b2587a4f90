use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use teloxide::{
    dispatching::{dialogue::InMemStorage, UpdateHandler},
    prelude::*,
    types::{ChatAction, InlineKeyboardButton, InlineKeyboardMarkup, InputFile, MessageId},
    utils::command::BotCommands,
};

use crate::config::Config;
use crate::quiz::controller::{GameController, GameView, Mark, OptionMark, ViewResult};
use crate::quiz::cues::{AudioPlaybackError, Cue, CueBoard, CueChannels, CueOutput, MutedCues};
use crate::quiz::provider::QuestionProvider;
use crate::quiz::session::{Phase, RoundToken, Session};
use crate::quiz::{Difficulty, Question, TOTAL_ROUNDS};

pub type QuizDialogue = Dialogue<Session, InMemStorage<Session>>;
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;
pub type HandlerResult = Result<(), HandlerError>;

const GREETING_TEXT: &str = "Olá, cadete! Bem-vindo à Academia Espacial de Matemática.";
const START_TEXT: &str = "Escolha a dificuldade da missão:";
const LOADING_TEXT: &str = "Gerando transmissão...";
const HINT_TEXT: &str = "Use os botões da mensagem para responder.";
const RESTART_TEXT: &str = "Use os botões acima ou /start para recomeçar.";
const RETRY_BUTTON: &str = "Tentar novamente";
const PLAY_AGAIN_BUTTON: &str = "Jogar novamente";

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Comandos disponíveis:")]
pub enum Command {
    #[command(description = "volta à tela inicial e escolhe a dificuldade.")]
    Start,
    #[command(description = "mostra esta mensagem.")]
    Help,
}

/// What an inline button asks for, as carried in its callback data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Difficulty(Difficulty),
    Answer { token: RoundToken, index: usize },
    Retry,
    PlayAgain,
    /// Buttons of an answered question.
    Noop,
}

impl Action {
    pub fn encode(&self) -> String {
        match self {
            Action::Difficulty(difficulty) => format!("difficulty:{}", difficulty.code()),
            Action::Answer { token, index } => format!("answer:{token}:{index}"),
            Action::Retry => "retry".to_string(),
            Action::PlayAgain => "again".to_string(),
            Action::Noop => "noop".to_string(),
        }
    }

    pub fn parse(data: &str) -> Option<Self> {
        let mut parts = data.split(':');
        let action = match (parts.next()?, parts.next(), parts.next()) {
            ("difficulty", Some(code), None) => Action::Difficulty(code.parse().ok()?),
            ("answer", Some(token), Some(index)) => Action::Answer {
                token: RoundToken::new(token.parse().ok()?),
                index: index.parse().ok()?,
            },
            ("retry", None, None) => Action::Retry,
            ("again", None, None) => Action::PlayAgain,
            ("noop", None, None) => Action::Noop,
            _ => return None,
        };
        parts.next().is_none().then_some(action)
    }
}

fn button(text: impl Into<String>, action: Action) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(text, action.encode())
}

pub fn difficulty_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![Difficulty::ALL
        .iter()
        .map(|d| button(d.label(), Action::Difficulty(*d)))
        .collect::<Vec<_>>()])
}

pub fn options_keyboard(question: &Question, token: RoundToken) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(
        question
            .options()
            .iter()
            .enumerate()
            .map(|(index, option)| vec![button(option.as_str(), Action::Answer { token, index })])
            .collect::<Vec<_>>(),
    )
}

/// The options again, with marks and without working buttons.
pub fn marked_keyboard(question: &Question, marks: &[OptionMark]) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(
        question
            .options()
            .iter()
            .enumerate()
            .map(|(index, option)| {
                let text = match marks.iter().find(|m| m.index == index).map(|m| m.mark) {
                    Some(Mark::Correct) => format!("✅ {option}"),
                    Some(Mark::Incorrect) => format!("❌ {option}"),
                    None => option.clone(),
                };
                vec![button(text, Action::Noop)]
            })
            .collect::<Vec<_>>(),
    )
}

/// Draws the game into one chat.
pub struct TelegramView {
    bot: Bot,
    chat_id: ChatId,
    /// Message holding the question being answered, when the update came from its buttons.
    question_message: Option<MessageId>,
}

#[async_trait]
impl GameView for TelegramView {
    async fn show_start(&self) -> ViewResult {
        self.bot
            .send_message(self.chat_id, START_TEXT)
            .reply_markup(difficulty_keyboard())
            .await?;
        Ok(())
    }

    async fn show_loading(&self) -> ViewResult {
        // Not worth failing the round over
        let _ = self
            .bot
            .send_chat_action(self.chat_id, ChatAction::Typing)
            .await;
        self.bot.send_message(self.chat_id, LOADING_TEXT).await?;
        Ok(())
    }

    async fn render_question(
        &self,
        round: u32,
        question: &Question,
        token: RoundToken,
    ) -> ViewResult {
        let text = format!(
            "Pergunta {round} de {TOTAL_ROUNDS}\n\n{}",
            question.prompt()
        );
        self.bot
            .send_message(self.chat_id, text)
            .reply_markup(options_keyboard(question, token))
            .await?;
        Ok(())
    }

    async fn mark_options(&self, question: &Question, marks: &[OptionMark]) -> ViewResult {
        let keyboard = marked_keyboard(question, marks);
        match self.question_message {
            Some(message_id) => {
                self.bot
                    .edit_message_reply_markup(self.chat_id, message_id)
                    .reply_markup(keyboard)
                    .await?;
            }
            None => {
                self.bot
                    .send_message(self.chat_id, question.prompt())
                    .reply_markup(keyboard)
                    .await?;
            }
        }
        Ok(())
    }

    async fn update_score(&self, score: u32) -> ViewResult {
        self.bot
            .send_message(self.chat_id, format!("PONTUAÇÃO: {score}"))
            .await?;
        Ok(())
    }

    async fn show_error(&self, message: &str) -> ViewResult {
        self.bot
            .send_message(self.chat_id, message)
            .reply_markup(InlineKeyboardMarkup::new(vec![vec![button(
                RETRY_BUTTON,
                Action::Retry,
            )]]))
            .await?;
        Ok(())
    }

    async fn show_game_over(&self, score: u32, total: u32) -> ViewResult {
        self.bot
            .send_message(
                self.chat_id,
                format!("Sua pontuação final é {score} de {total}"),
            )
            .reply_markup(InlineKeyboardMarkup::new(vec![vec![button(
                PLAY_AGAIN_BUTTON,
                Action::PlayAgain,
            )]]))
            .await?;
        Ok(())
    }
}

/// Sends cue clips as voice messages.
pub struct VoiceCues {
    bot: Bot,
    chat_id: ChatId,
    sounds_dir: Option<PathBuf>,
    channels: Arc<CueChannels<(ChatId, Cue)>>,
}

impl CueOutput for VoiceCues {
    fn play(&self, cue: Cue) {
        let Some(dir) = &self.sounds_dir else {
            MutedCues.play(cue);
            return;
        };

        let bot = self.bot.clone();
        let chat_id = self.chat_id;
        let path = dir.join(cue.file_name());
        self.channels.restart((chat_id, cue), async move {
            if let Err(err) = send_clip(&bot, chat_id, path).await {
                warn!("Audio playback error: {err}");
            }
        });
    }
}

async fn send_clip(bot: &Bot, chat_id: ChatId, path: PathBuf) -> Result<(), AudioPlaybackError> {
    if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
        return Err(AudioPlaybackError::MissingClip(path));
    }
    bot.send_voice(chat_id, InputFile::file(path))
        .await
        .map_err(|err| AudioPlaybackError::Delivery(err.to_string()))?;
    Ok(())
}

/// Everything the handlers share across chats.
pub struct QuizBot {
    provider: Arc<dyn QuestionProvider>,
    feedback_delay: Duration,
    sounds_dir: Option<PathBuf>,
    channels: Arc<CueChannels<(ChatId, Cue)>>,
}

impl QuizBot {
    pub fn new(provider: Arc<dyn QuestionProvider>, config: &Config) -> Self {
        Self {
            provider,
            feedback_delay: config.feedback_delay,
            sounds_dir: config.sounds_dir.clone(),
            channels: Arc::new(CueChannels::new()),
        }
    }

    fn controller(
        &self,
        bot: Bot,
        chat_id: ChatId,
        question_message: Option<MessageId>,
    ) -> GameController<TelegramView, CueBoard<VoiceCues>> {
        let cues = VoiceCues {
            bot: bot.clone(),
            chat_id,
            sounds_dir: self.sounds_dir.clone(),
            channels: self.channels.clone(),
        };
        let view = TelegramView {
            bot,
            chat_id,
            question_message,
        };
        GameController::new(self.provider.clone(), view, CueBoard::new(cues))
            .with_feedback_delay(self.feedback_delay)
    }
}

pub fn schema() -> UpdateHandler<HandlerError> {
    let messages = Update::filter_message()
        .enter_dialogue::<Message, InMemStorage<Session>, Session>()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(command_handler),
        )
        .branch(dptree::endpoint(text_handler));

    let callbacks = Update::filter_callback_query()
        .enter_dialogue::<CallbackQuery, InMemStorage<Session>, Session>()
        .endpoint(callback_handler);

    dptree::entry().branch(messages).branch(callbacks)
}

async fn command_handler(
    bot: Bot,
    dialogue: QuizDialogue,
    mut session: Session,
    app: Arc<QuizBot>,
    msg: Message,
    cmd: Command,
) -> HandlerResult {
    match cmd {
        Command::Start => {
            info!("Chat {} opened the start screen", msg.chat.id);
            bot.send_message(msg.chat.id, GREETING_TEXT).await?;
            let outcome = app
                .controller(bot, msg.chat.id, None)
                .quit(&mut session)
                .await;
            dialogue.update(session).await?;
            outcome
        }
        Command::Help => {
            bot.send_message(msg.chat.id, Command::descriptions().to_string())
                .await?;
            Ok(())
        }
    }
}

async fn text_handler(
    bot: Bot,
    session: Session,
    app: Arc<QuizBot>,
    msg: Message,
) -> HandlerResult {
    let hint = match session.phase() {
        Phase::Start => return app.controller(bot, msg.chat.id, None).show_start().await,
        _ if session.awaiting_answer() => HINT_TEXT,
        _ => RESTART_TEXT,
    };
    bot.send_message(msg.chat.id, hint).await?;
    Ok(())
}

async fn callback_handler(
    bot: Bot,
    dialogue: QuizDialogue,
    mut session: Session,
    app: Arc<QuizBot>,
    q: CallbackQuery,
) -> HandlerResult {
    let Some(message) = q.message.as_ref() else {
        let _ = bot.answer_callback_query(q.id.clone()).await;
        return Ok(());
    };
    let outcome = on_tap(
        &app,
        bot,
        &mut session,
        &q.id,
        (message.chat.id, message.id),
        q.data.as_deref(),
    )
    .await;

    // Keep the counters even when drawing failed halfway
    dialogue.update(session).await?;
    outcome
}

/// Applies one button tap to the session.
async fn on_tap(
    app: &QuizBot,
    bot: Bot,
    session: &mut Session,
    query_id: &str,
    (chat_id, message_id): (ChatId, MessageId),
    data: Option<&str>,
) -> HandlerResult {
    // Stops the button spinner. Too old a query fails here, but the tap still counts
    let _ = bot.answer_callback_query(query_id).await;

    let Some(action) = data.and_then(Action::parse) else {
        debug!("Ignoring unknown callback data {data:?}");
        return Ok(());
    };

    let controller = app.controller(bot, chat_id, Some(message_id));
    match action {
        Action::Difficulty(difficulty) => controller.select_difficulty(session, difficulty).await,
        Action::Answer { token, index } => controller.select_option(session, token, index).await,
        Action::Retry => controller.retry(session).await,
        Action::PlayAgain => controller.play_again(session).await,
        Action::Noop => Ok(()),
    }
}
