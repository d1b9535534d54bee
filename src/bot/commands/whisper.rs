use crate::bot::handler::reveal_button;
use crate::bot::Data;
use crate::error::AppError;
use crate::whisper::UserId;
use poise::serenity_prelude as serenity;
use tracing::info;

type Error = Box<dyn std::error::Error + Send + Sync>;
type Context<'a> = poise::Context<'a, Data, Error>;

/// Send a whisper that only its addressee (or whoever opens it first) can read
#[poise::command(slash_command)]
pub async fn whisper(
    ctx: Context<'_>,
    #[description = "The secret text"] text: String,
    #[description = "Who may read it; leave empty for whoever opens it first"] to: Option<
        serenity::User,
    >,
) -> Result<(), Error> {
    let sender = UserId(ctx.author().id.get());
    let target_raw = to
        .as_ref()
        .map(|user| user.id.get().to_string())
        .unwrap_or_default();

    let id = match ctx
        .data()
        .service
        .create_whisper(sender, &target_raw, &text)
        .await
    {
        Ok(id) => id,
        Err(AppError::InvalidWhisper(reason)) => {
            ctx.send(
                poise::CreateReply::default()
                    .content(format!("Could not send the whisper: {}", reason))
                    .ephemeral(true),
            )
            .await?;
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    info!(whisper_id = %id, %sender, open = to.is_none(), "Whisper posted");

    let announcement = match &to {
        Some(user) => format!("🔒 A whisper for <@{}>", user.id),
        None => "🔒 A whisper for whoever opens it first".to_string(),
    };

    ctx.send(
        poise::CreateReply::default()
            .content(announcement)
            .components(vec![serenity::CreateActionRow::Buttons(vec![
                reveal_button(&id),
            ])]),
    )
    .await?;

    Ok(())
}
