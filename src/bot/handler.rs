use crate::bot::{Data, DELETE_MINE_ID, REVEAL_PREFIX};
use crate::whisper::{Decision, Requester, UserId, WhisperId, WhisperSummary};
use chrono::{DateTime, Utc};
use poise::serenity_prelude::{self as serenity, ComponentInteraction, Context};
use tracing::{debug, error};

/// Shown for every outcome except a successful reveal, so a requester cannot
/// tell deleted, claimed and never-existing whispers apart.
pub const UNAVAILABLE_TEXT: &str = "This whisper is unavailable to you.";

/// Handle a button press on a whisper or on the "my whispers" panel
pub async fn handle_component(ctx: &Context, component: &ComponentInteraction, data: &Data) {
    let custom_id = component.data.custom_id.as_str();
    let user_id = UserId(component.user.id.get());

    let content = if let Some(raw_id) = custom_id.strip_prefix(REVEAL_PREFIX) {
        let requester = requester_from(&component.user);
        let decision = data
            .service
            .reveal_whisper(&requester, &WhisperId::from(raw_id))
            .await;
        reveal_text(decision)
    } else if custom_id == DELETE_MINE_ID {
        let removed = data.service.delete_mine(user_id).await;
        delete_text(removed, Utc::now())
    } else {
        debug!(custom_id, "Ignoring unknown component");
        return;
    };

    let response = serenity::CreateInteractionResponse::Message(
        serenity::CreateInteractionResponseMessage::new()
            .content(content)
            .ephemeral(true),
    );

    if let Err(e) = component.create_response(&ctx.http, response).await {
        error!("Failed to answer component interaction: {}", e);
    }
}

/// Identity of a Discord user as seen by the access rules
pub fn requester_from(user: &serenity::User) -> Requester {
    Requester::new(UserId(user.id.get())).with_handle(user.name.clone())
}

pub fn reveal_text(decision: Decision) -> String {
    match decision {
        Decision::Revealed(body) => body.expose().to_string(),
        _ => UNAVAILABLE_TEXT.to_string(),
    }
}

pub fn delete_text(removed: usize, at: DateTime<Utc>) -> String {
    if removed == 0 {
        "You don't have any whispers".to_string()
    } else {
        format!(
            "Removed {} whispers at {}",
            removed,
            at.format("%Y-%m-%d %H:%M:%S UTC")
        )
    }
}

pub fn list_text(summaries: &[WhisperSummary]) -> String {
    if summaries.is_empty() {
        return "You don't have any whispers".to_string();
    }

    let mut text = format!("You have {} whispers", summaries.len());
    for summary in summaries {
        text.push_str(&format!(
            "\n• `{}` sent <t:{}:R>",
            summary.id,
            summary.created_at.timestamp()
        ));
    }
    text
}

pub fn reveal_button(id: &WhisperId) -> serenity::CreateButton {
    serenity::CreateButton::new(format!("{}{}", REVEAL_PREFIX, id))
        .label("🔓 Show whisper")
        .style(serenity::ButtonStyle::Primary)
}

pub fn delete_mine_button() -> serenity::CreateButton {
    serenity::CreateButton::new(DELETE_MINE_ID)
        .label("🗑 Delete My Whispers")
        .style(serenity::ButtonStyle::Danger)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::whisper::WhisperBody;
    use chrono::TimeZone;

    #[test]
    fn test_reveal_text_is_uniform_for_failures() {
        assert_eq!(reveal_text(Decision::Revealed(WhisperBody::new("hi"))), "hi");
        for decision in [
            Decision::DeniedNotOwner,
            Decision::DeniedAlreadyClaimed,
            Decision::NotFound,
        ] {
            assert_eq!(reveal_text(decision), UNAVAILABLE_TEXT);
        }
    }

    #[test]
    fn test_delete_text() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        assert_eq!(delete_text(0, at), "You don't have any whispers");
        assert_eq!(delete_text(3, at), "Removed 3 whispers at 2024-05-01 12:30:00 UTC");
    }

    #[test]
    fn test_list_text() {
        assert_eq!(list_text(&[]), "You don't have any whispers");

        let summaries = vec![WhisperSummary {
            id: WhisperId::from("abc"),
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
        }];
        let text = list_text(&summaries);
        assert!(text.starts_with("You have 1 whispers"));
        assert!(text.contains("`abc`"));
        assert!(text.contains("<t:1714521600:R>"));
    }
}
