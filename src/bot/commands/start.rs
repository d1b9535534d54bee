use crate::bot::Data;

type Error = Box<dyn std::error::Error + Send + Sync>;
type Context<'a> = poise::Context<'a, Data, Error>;

const HELP_TEXT: &str = "Send secret messages in a channel that only one person can read.\n\n\
    • `/whisper text:<secret> to:@user` only that user can open it\n\
    • `/whisper text:<secret>` the first person to open it becomes its only reader\n\
    • `/mywhispers` lists what you have sent, `/deletemine` removes it all";

/// How to use the whisper bot
#[poise::command(slash_command)]
pub async fn start(ctx: Context<'_>) -> Result<(), Error> {
    ctx.send(
        poise::CreateReply::default()
            .content(HELP_TEXT)
            .ephemeral(true),
    )
    .await?;
    Ok(())
}
