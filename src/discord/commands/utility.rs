// Channel housekeeping commands.

use crate::discord::logging::{send_audit, AuditEvent};
use crate::discord::moderation::enforcer;
use crate::discord::{Data, Error};
use poise::serenity_prelude as serenity;
use std::time::Duration;

type Context<'a> = poise::Context<'a, Data, Error>;

const CONFIRM_TTL: Duration = Duration::from_secs(4);

/// Bulk-delete recent messages in the current channel.
#[poise::command(prefix_command, guild_only, check = "crate::discord::require_moderator")]
pub async fn clear(
    ctx: Context<'_>,
    #[description = "How many messages to delete (1-100)"] count: Option<u64>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;

    let requested = count.unwrap_or(10).clamp(1, 100);
    let http = &ctx.serenity_context().http;
    let channel_id = ctx.channel_id();

    // Drop the invoking message first so it does not count against the batch.
    if let poise::Context::Prefix(prefix) = ctx {
        if let Err(e) = prefix.msg.delete(http).await {
            tracing::debug!("Failed to delete the invoking message: {}", e);
        }
    }

    let messages = channel_id
        .messages(http, serenity::GetMessages::new().limit(requested as u8))
        .await?;

    // Bulk deletion rejects messages older than 14 days; keep a margin.
    let cutoff = chrono::Utc::now().timestamp() - (14 * 24 * 60 * 60 - 60);
    let deletable: Vec<serenity::MessageId> = messages
        .iter()
        .filter(|message| message.timestamp.unix_timestamp() > cutoff)
        .map(|message| message.id)
        .collect();

    let deleted = deletable.len() as u64;
    match deletable.len() {
        0 => {}
        1 => channel_id.delete_message(http, deletable[0]).await?,
        _ => channel_id.delete_messages(http, deletable).await?,
    }

    let confirmation = format!("🧹 Deleted {} messages.", deleted);
    if let Err(e) =
        enforcer::send_transient_notice(ctx.serenity_context(), channel_id, confirmation, CONFIRM_TTL)
            .await
    {
        tracing::warn!("Failed to post clear confirmation: {}", e);
    }

    send_audit(
        &ctx.serenity_context().http,
        &ctx.data().config,
        AuditEvent::MessagesCleared {
            guild_id: guild_id.get(),
            channel_id: channel_id.get(),
            moderator_id: ctx.author().id.get(),
            requested,
            deleted,
        },
    )
    .await;

    Ok(())
}

/// Repeat a message as the bot, dropping the invocation.
#[poise::command(prefix_command, guild_only, check = "crate::discord::require_moderator")]
pub async fn say(
    ctx: Context<'_>,
    #[rest]
    #[description = "Text to send"]
    text: String,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;

    let text = text.trim().to_string();
    if text.is_empty() {
        ctx.say("❌ Usage: `say <text>`").await?;
        return Ok(());
    }

    let http = &ctx.serenity_context().http;
    if let poise::Context::Prefix(prefix) = ctx {
        if let Err(e) = prefix.msg.delete(http).await {
            tracing::debug!("Failed to delete the invoking message: {}", e);
        }
    }

    ctx.channel_id().say(http, text).await?;

    send_audit(
        http,
        &ctx.data().config,
        AuditEvent::Announcement {
            guild_id: guild_id.get(),
            channel_id: ctx.channel_id().get(),
            moderator_id: ctx.author().id.get(),
        },
    )
    .await;

    Ok(())
}
