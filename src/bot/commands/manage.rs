use crate::bot::handler::{delete_mine_button, delete_text, list_text};
use crate::bot::Data;
use crate::whisper::UserId;
use chrono::Utc;
use poise::serenity_prelude as serenity;

type Error = Box<dyn std::error::Error + Send + Sync>;
type Context<'a> = poise::Context<'a, Data, Error>;

/// List the whispers you have sent that are still stored
#[poise::command(slash_command)]
pub async fn mywhispers(ctx: Context<'_>) -> Result<(), Error> {
    let sender = UserId(ctx.author().id.get());
    let summaries = ctx.data().service.list_mine(sender).await;

    let mut reply = poise::CreateReply::default()
        .content(list_text(&summaries))
        .ephemeral(true);

    if !summaries.is_empty() {
        reply = reply.components(vec![serenity::CreateActionRow::Buttons(vec![
            delete_mine_button(),
        ])]);
    }

    ctx.send(reply).await?;
    Ok(())
}

/// Delete every whisper you have sent
#[poise::command(slash_command)]
pub async fn deletemine(ctx: Context<'_>) -> Result<(), Error> {
    let sender = UserId(ctx.author().id.get());
    let removed = ctx.data().service.delete_mine(sender).await;

    ctx.send(
        poise::CreateReply::default()
            .content(delete_text(removed, Utc::now()))
            .ephemeral(true),
    )
    .await?;
    Ok(())
}
