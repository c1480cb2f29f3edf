// Reaction giveaways with a timed draw.

use crate::discord::logging::{send_audit, AuditEvent};
use crate::discord::{BotConfig, Data, Error};
use poise::serenity_prelude as serenity;
use rand::seq::SliceRandom;
use std::sync::Arc;
use std::time::Duration;

type Context<'a> = poise::Context<'a, Data, Error>;

const GIVEAWAY_EMOJI: &str = "🎉";

/// Entries are drawn from the first page of reactors, the API maximum.
const ENTRANT_PAGE_SIZE: u8 = 100;

/// One week, in minutes.
const MAX_DURATION_MINUTES: u64 = 10080;

/// Start a reaction giveaway that draws a winner when the timer runs out.
#[poise::command(prefix_command, guild_only, check = "crate::discord::require_moderator")]
pub async fn giveaway(
    ctx: Context<'_>,
    #[description = "Duration in minutes (1-10080)"] minutes: u64,
    #[rest]
    #[description = "Prize"]
    prize: String,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;

    if !(1..=MAX_DURATION_MINUTES).contains(&minutes) {
        ctx.say(format!(
            "❌ Duration must be between 1 and {} minutes.",
            MAX_DURATION_MINUTES
        ))
        .await?;
        return Ok(());
    }

    let prize = prize.trim().to_string();
    if prize.is_empty() {
        ctx.say("❌ Usage: `giveaway <minutes> <prize>`").await?;
        return Ok(());
    }

    let ends_at = chrono::Utc::now().timestamp() + (minutes * 60) as i64;
    let embed = serenity::CreateEmbed::new()
        .title("🎉 Giveaway!")
        .description(format!(
            "**Prize:** {}\nReact with {} to enter!\nEnds <t:{}:R>",
            prize, GIVEAWAY_EMOJI, ends_at
        ))
        .color(0xF1C40F);

    let http = &ctx.serenity_context().http;
    let message = ctx
        .channel_id()
        .send_message(http, serenity::CreateMessage::new().embed(embed))
        .await?;
    message
        .react(
            http,
            serenity::ReactionType::Unicode(GIVEAWAY_EMOJI.to_string()),
        )
        .await?;

    send_audit(
        http,
        &ctx.data().config,
        AuditEvent::GiveawayStarted {
            guild_id: guild_id.get(),
            channel_id: ctx.channel_id().get(),
            host_id: ctx.author().id.get(),
            prize: prize.clone(),
            minutes,
        },
    )
    .await;

    let http = ctx.serenity_context().http.clone();
    let config = ctx.data().config.clone();
    let channel_id = ctx.channel_id();
    let message_id = message.id;
    let guild = guild_id.get();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(minutes * 60)).await;
        if let Err(e) =
            finish_giveaway(&http, &config, guild, channel_id, message_id, &prize).await
        {
            tracing::warn!("Giveaway draw in {} failed: {}", channel_id, e);
        }
    });

    Ok(())
}

/// Draws and announces the winner once the timer ends. Bot reactions never
/// count as entries.
async fn finish_giveaway(
    http: &Arc<serenity::Http>,
    config: &BotConfig,
    guild_id: u64,
    channel_id: serenity::ChannelId,
    message_id: serenity::MessageId,
    prize: &str,
) -> anyhow::Result<()> {
    let reaction = serenity::ReactionType::Unicode(GIVEAWAY_EMOJI.to_string());
    let users = channel_id
        .reaction_users(
            http,
            message_id,
            reaction,
            Some(ENTRANT_PAGE_SIZE),
            None::<serenity::UserId>,
        )
        .await?;

    let entrants: Vec<serenity::User> = users.into_iter().filter(|user| !user.bot).collect();
    let entrant_count = entrants.len() as u64;

    let winner = {
        let mut rng = rand::thread_rng();
        entrants.choose(&mut rng).cloned()
    };

    let announce = match &winner {
        Some(user) => format!(
            "🎉 Congratulations <@{}>! You won **{}**!",
            user.id, prize
        ),
        None => format!(
            "🎉 The giveaway for **{}** ended with no valid entries.",
            prize
        ),
    };
    channel_id.say(http, announce).await?;

    send_audit(
        http,
        config,
        AuditEvent::GiveawayEnded {
            guild_id,
            channel_id: channel_id.get(),
            prize: prize.to_string(),
            winner_id: winner.map(|user| user.id.get()),
            entrants: entrant_count,
        },
    )
    .await;

    Ok(())
}
