//! Thin wrappers around the Discord calls the enforcement path needs.
//! Callers decide how to react to failures; nothing here retries.

use anyhow::Result;
use poise::serenity_prelude as serenity;
use std::time::Duration;

/// Discord rejects communication timeouts longer than 28 days.
const MAX_TIMEOUT_SECS: i64 = 28 * 24 * 60 * 60;

pub async fn timeout_member(
    ctx: &serenity::Context,
    guild_id: serenity::GuildId,
    user_id: serenity::UserId,
    duration: Duration,
) -> Result<()> {
    let secs = (duration.as_secs() as i64).min(MAX_TIMEOUT_SECS);
    let until = serenity::Timestamp::from_unix_timestamp(chrono::Utc::now().timestamp() + secs)?;

    guild_id
        .edit_member(
            &ctx.http,
            user_id,
            serenity::EditMember::new().disable_communication_until_datetime(until),
        )
        .await?;
    Ok(())
}

pub async fn kick_member(
    ctx: &serenity::Context,
    guild_id: serenity::GuildId,
    user_id: serenity::UserId,
    reason: &str,
) -> Result<()> {
    guild_id.kick_with_reason(&ctx.http, user_id, reason).await?;
    Ok(())
}

pub async fn delete_message(ctx: &serenity::Context, message: &serenity::Message) -> Result<()> {
    message.delete(&ctx.http).await?;
    Ok(())
}

/// Posts a short notice and removes it after `ttl`. The delete runs in a
/// background task so the caller never waits on it.
pub async fn send_transient_notice(
    ctx: &serenity::Context,
    channel_id: serenity::ChannelId,
    text: impl Into<String>,
    ttl: Duration,
) -> Result<()> {
    let notice = channel_id.say(&ctx.http, text.into()).await?;
    let http = ctx.http.clone();

    tokio::spawn(async move {
        tokio::time::sleep(ttl).await;
        if let Err(e) = notice.delete(&http).await {
            tracing::debug!("Failed to delete transient notice: {}", e);
        }
    });
    Ok(())
}
