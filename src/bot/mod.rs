pub mod commands;
pub mod handler;

use crate::whisper::{Operator, UserId, WhisperService};
use poise::serenity_prelude::{self as serenity, FullEvent, GatewayIntents};
use std::sync::Arc;
use tracing::{error, info};

/// Custom id prefix of reveal buttons, followed by the whisper id
pub const REVEAL_PREFIX: &str = "reveal:";
/// Custom id of the "Delete My Whispers" button
pub const DELETE_MINE_ID: &str = "delete_mine";

/// Shared data accessible in all commands
#[derive(Debug)]
pub struct Data {
    pub service: Arc<WhisperService>,
    pub operators: Vec<UserId>,
}

impl Data {
    /// Operator token for `user`, if they are listed in `discord.operators`.
    pub fn operator_for(&self, user: UserId) -> Option<Operator> {
        self.operators
            .contains(&user)
            .then(Operator::assume_verified)
    }
}

type Error = Box<dyn std::error::Error + Send + Sync>;

/// Event handler for Discord events
async fn event_handler(
    ctx: &serenity::Context,
    event: &FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        FullEvent::Ready { data_about_bot } => {
            info!("Bot is ready! Logged in as {}", data_about_bot.user.name);
        }
        FullEvent::InteractionCreate {
            interaction: serenity::Interaction::Component(component),
        } => {
            handler::handle_component(ctx, component, data).await;
        }
        _ => {}
    }
    Ok(())
}

/// Create and configure the Discord bot framework
pub fn create_framework(
    service: Arc<WhisperService>,
    operators: Vec<UserId>,
) -> poise::Framework<Data, Error> {
    poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: commands::all_commands(),
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            on_error: |error| {
                Box::pin(async move {
                    match error {
                        poise::FrameworkError::Command { error, ctx, .. } => {
                            error!("Command error: {}", error);
                            let _ = ctx
                                .send(
                                    poise::CreateReply::default()
                                        .content("Something went wrong, please try again.")
                                        .ephemeral(true),
                                )
                                .await;
                        }
                        poise::FrameworkError::Setup { error, .. } => {
                            error!("Setup error: {}", error);
                        }
                        err => {
                            error!("Framework error: {:?}", err);
                        }
                    }
                })
            },
            ..Default::default()
        })
        .setup(|ctx, _ready, framework| {
            Box::pin(async move {
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                info!(
                    "Registered {} slash commands globally",
                    framework.options().commands.len()
                );
                Ok(Data { service, operators })
            })
        })
        .build()
}

/// Run the Discord bot until the gateway connection ends.
pub async fn start_bot_with_token(
    service: Arc<WhisperService>,
    operators: Vec<UserId>,
    token: &str,
) -> Result<(), Error> {
    if token.is_empty() {
        return Err("Discord token is empty".into());
    }

    let intents = GatewayIntents::GUILDS;
    let framework = create_framework(service, operators);

    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await?;

    info!("Starting Discord bot...");
    client.start().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WhisperConfig;
    use crate::whisper::WhisperStore;

    #[test]
    fn test_operator_for() {
        let data = Data {
            service: Arc::new(WhisperService::new(
                Arc::new(WhisperStore::in_memory()),
                WhisperConfig::default(),
            )),
            operators: vec![UserId(42)],
        };

        assert!(data.operator_for(UserId(42)).is_some());
        assert!(data.operator_for(UserId(7)).is_none());
    }
}
