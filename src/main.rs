mod config;
mod quiz;
mod telegram;

use std::sync::Arc;

use dotenv::dotenv;
use log::{error, info, warn};
use teloxide::{dispatching::dialogue::InMemStorage, prelude::*, utils::command::BotCommands};

use config::Config;
use quiz::provider::GeminiProvider;
use quiz::session::Session;
use telegram::{Command, QuizBot};

#[tokio::main]
async fn main() {
    // A .env file is optional; the real environment wins either way
    dotenv().ok();
    pretty_env_logger::init();
    info!("Starting cadet math bot...");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("Configuration error: {err}");
            std::process::exit(1);
        }
    };

    let provider = match GeminiProvider::new(config.provider.clone()) {
        Ok(provider) => provider,
        Err(err) => {
            error!("Unable to set up the question provider: {err}");
            std::process::exit(1);
        }
    };
    info!(
        "Questions come from {} ({} rounds per game)",
        config.provider.model,
        quiz::TOTAL_ROUNDS
    );
    if config.sounds_dir.is_none() {
        info!("QUIZ_SOUNDS_DIR is not set, feedback cues will only be logged");
    }

    let bot = Bot::new(config.telegram_token.clone());
    if let Err(err) = bot.set_my_commands(Command::bot_commands()).await {
        warn!("Could not register bot commands: {err}");
    }

    let app = Arc::new(QuizBot::new(Arc::new(provider), &config));

    Dispatcher::builder(bot, telegram::schema())
        .dependencies(dptree::deps![InMemStorage::<Session>::new(), app])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}
