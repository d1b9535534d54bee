use crate::bot::Data;
use crate::whisper::{Operator, UserId};
use tracing::{error, warn};

type Error = Box<dyn std::error::Error + Send + Sync>;
type Context<'a> = poise::Context<'a, Data, Error>;

async fn reply(ctx: Context<'_>, text: impl Into<String>) -> Result<(), Error> {
    ctx.send(
        poise::CreateReply::default()
            .content(text.into())
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

/// Operator token for the invoking user, or a refusal sent back to them.
async fn require_operator(ctx: Context<'_>) -> Result<Option<Operator>, Error> {
    let user = UserId(ctx.author().id.get());
    match ctx.data().operator_for(user) {
        Some(operator) => Ok(Some(operator)),
        None => {
            warn!(%user, command = %ctx.command().name, "Maintenance command refused");
            reply(ctx, "This command is reserved for the bot operator.").await?;
            Ok(None)
        }
    }
}

/// Save all whispers to durable storage now
#[poise::command(slash_command)]
pub async fn checkpoint(ctx: Context<'_>) -> Result<(), Error> {
    let Some(operator) = require_operator(ctx).await? else {
        return Ok(());
    };

    match ctx.data().service.checkpoint(&operator).await {
        Ok(count) => reply(ctx, format!("Saved {} whispers.", count)).await,
        Err(e) => {
            error!("Checkpoint failed: {}", e);
            reply(
                ctx,
                format!("Checkpoint failed: {}. Whispers are still in memory; try again.", e),
            )
            .await
        }
    }
}

/// Delete every stored whisper
#[poise::command(slash_command)]
pub async fn reset(ctx: Context<'_>) -> Result<(), Error> {
    let Some(operator) = require_operator(ctx).await? else {
        return Ok(());
    };

    let removed = ctx.data().service.reset(&operator).await;
    reply(ctx, format!("Purged {} whispers.", removed)).await
}
