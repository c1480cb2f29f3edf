use crate::discord::BotConfig;
use poise::serenity_prelude::{self as serenity, CreateEmbed, CreateEmbedFooter};

/// Everything the bot reports to the audit channel. One variant per
/// enforcement or mutating command.
#[derive(Debug, Clone)]
pub enum AuditEvent {
    MemberJoined {
        guild_id: u64,
        user_id: u64,
        created_at_unix: i64,
        /// None when no auto-role is configured, otherwise whether the
        /// grant went through.
        auto_role: Option<bool>,
    },
    AutomatedAccountKicked {
        guild_id: u64,
        user_id: u64,
        enforced: bool,
    },
    RaidResponse {
        guild_id: u64,
        user_id: u64,
        /// Human-readable action, e.g. "timed out for 10 minutes".
        action: String,
        enforced: bool,
    },
    LinkBlocked {
        guild_id: u64,
        channel_id: u64,
        author_id: u64,
        excerpt: String,
    },
    FloodTimedOut {
        guild_id: u64,
        channel_id: u64,
        author_id: u64,
        minutes: u32,
        enforced: bool,
    },
    MessagesCleared {
        guild_id: u64,
        channel_id: u64,
        moderator_id: u64,
        requested: u64,
        deleted: u64,
    },
    Announcement {
        guild_id: u64,
        channel_id: u64,
        moderator_id: u64,
    },
    TicketPanelPosted {
        guild_id: u64,
        channel_id: u64,
        moderator_id: u64,
        /// Number of selectable categories on the menu.
        categories: u64,
    },
    TicketOpened {
        guild_id: u64,
        channel_id: u64,
        owner_id: u64,
        category_label: String,
    },
    TicketRenamed {
        guild_id: u64,
        channel_id: u64,
        renamed_by: u64,
        new_name: String,
    },
    TicketClosed {
        guild_id: u64,
        channel_name: String,
        closed_by: u64,
    },
    GiveawayStarted {
        guild_id: u64,
        channel_id: u64,
        host_id: u64,
        prize: String,
        minutes: u64,
    },
    GiveawayEnded {
        guild_id: u64,
        channel_id: u64,
        prize: String,
        winner_id: Option<u64>,
        entrants: u64,
    },
    PolicyChanged {
        guild_id: u64,
        moderator_id: u64,
        /// Human-readable summary, e.g. "enabled antiLink".
        change: String,
    },
    MassRoleUpdate {
        guild_id: u64,
        moderator_id: u64,
        role_id: u64,
        /// "add" or "remove".
        action: String,
        updated: u64,
        skipped: u64,
        failed: u64,
    },
}

pub fn format_audit_event(event: &AuditEvent) -> CreateEmbed {
    match event {
        AuditEvent::MemberJoined {
            guild_id,
            user_id,
            created_at_unix,
            auto_role,
        } => {
            let mut embed = CreateEmbed::default()
                .title("Member Joined")
                .description(format!("<@{}> has joined the server.", user_id))
                .color(serenity::Color::from_rgb(0, 255, 0)) // Green
                .field(
                    "Account Created",
                    format!("<t:{}:R>", created_at_unix),
                    false,
                )
                .footer(CreateEmbedFooter::new(format!("Guild ID: {}", guild_id)))
                .timestamp(serenity::Timestamp::now());

            if let Some(granted) = auto_role {
                let status = if *granted { "Granted" } else { "Failed" };
                embed = embed.field("Auto Role", status, false);
            }
            embed
        }

        AuditEvent::AutomatedAccountKicked {
            guild_id,
            user_id,
            enforced,
        } => CreateEmbed::default()
            .title("Bot Account Kicked")
            .description(format!(
                "<@{}> was flagged as an automated account.",
                user_id
            ))
            .color(serenity::Color::RED)
            .field("Rule", "Anti-bot", false)
            .field("Action Applied", enforced_label(*enforced), false)
            .footer(CreateEmbedFooter::new(format!("Guild ID: {}", guild_id)))
            .timestamp(serenity::Timestamp::now()),

        AuditEvent::RaidResponse {
            guild_id,
            user_id,
            action,
            enforced,
        } => CreateEmbed::default()
            .title("Join Surge Detected")
            .description(format!(
                "<@{}> joined during a surge and was {}.",
                user_id, action
            ))
            .color(serenity::Color::RED)
            .field("Rule", "Anti-raid", false)
            .field("Action Applied", enforced_label(*enforced), false)
            .footer(CreateEmbedFooter::new(format!("Guild ID: {}", guild_id)))
            .timestamp(serenity::Timestamp::now()),

        AuditEvent::LinkBlocked {
            guild_id,
            channel_id,
            author_id,
            excerpt,
        } => {
            let excerpt_display = if excerpt.is_empty() {
                "*No content*"
            } else {
                excerpt.as_str()
            };

            CreateEmbed::default()
                .title("Link Message Deleted")
                .description(excerpt_display)
                .color(serenity::Color::from_rgb(255, 165, 0)) // Orange
                .field("Author", format!("<@{}> (`{}`)", author_id, author_id), false)
                .field("Channel", format!("<#{}>", channel_id), false)
                .field("Rule", "Anti-link", false)
                .footer(CreateEmbedFooter::new(format!("Guild ID: {}", guild_id)))
                .timestamp(serenity::Timestamp::now())
        }

        AuditEvent::FloodTimedOut {
            guild_id,
            channel_id,
            author_id,
            minutes,
            enforced,
        } => CreateEmbed::default()
            .title("Message Flood Timed Out")
            .description(format!(
                "<@{}> was timed out for {} minutes.",
                author_id, minutes
            ))
            .color(serenity::Color::RED)
            .field("Channel", format!("<#{}>", channel_id), false)
            .field("Rule", "Anti-spam", false)
            .field("Action Applied", enforced_label(*enforced), false)
            .footer(CreateEmbedFooter::new(format!("Guild ID: {}", guild_id)))
            .timestamp(serenity::Timestamp::now()),

        AuditEvent::MessagesCleared {
            guild_id,
            channel_id,
            moderator_id,
            requested,
            deleted,
        } => CreateEmbed::default()
            .title("Messages Cleared")
            .description(format!(
                "<@{}> cleared messages in <#{}>.",
                moderator_id, channel_id
            ))
            .color(serenity::Color::from_rgb(255, 165, 0)) // Orange
            .field("Requested", requested.to_string(), false)
            .field("Deleted", deleted.to_string(), false)
            .footer(CreateEmbedFooter::new(format!("Guild ID: {}", guild_id)))
            .timestamp(serenity::Timestamp::now()),

        AuditEvent::Announcement {
            guild_id,
            channel_id,
            moderator_id,
        } => CreateEmbed::default()
            .title("Announcement Relayed")
            .description(format!(
                "<@{}> sent an announcement in <#{}>.",
                moderator_id, channel_id
            ))
            .color(serenity::Color::BLURPLE)
            .footer(CreateEmbedFooter::new(format!("Guild ID: {}", guild_id)))
            .timestamp(serenity::Timestamp::now()),

        AuditEvent::TicketPanelPosted {
            guild_id,
            channel_id,
            moderator_id,
            categories,
        } => CreateEmbed::default()
            .title("Ticket Panel Posted")
            .description(format!(
                "<@{}> posted a ticket panel in <#{}>.",
                moderator_id, channel_id
            ))
            .color(serenity::Color::BLUE)
            .field("Categories", categories.to_string(), false)
            .footer(CreateEmbedFooter::new(format!("Guild ID: {}", guild_id)))
            .timestamp(serenity::Timestamp::now()),

        AuditEvent::TicketOpened {
            guild_id,
            channel_id,
            owner_id,
            category_label,
        } => CreateEmbed::default()
            .title("Ticket Opened")
            .description(format!(
                "<@{}> opened a ticket in <#{}>.",
                owner_id, channel_id
            ))
            .color(serenity::Color::BLUE)
            .field("Category", category_label.clone(), false)
            .footer(CreateEmbedFooter::new(format!("Guild ID: {}", guild_id)))
            .timestamp(serenity::Timestamp::now()),

        AuditEvent::TicketRenamed {
            guild_id,
            channel_id,
            renamed_by,
            new_name,
        } => CreateEmbed::default()
            .title("Ticket Renamed")
            .description(format!(
                "<@{}> renamed the ticket <#{}>.",
                renamed_by, channel_id
            ))
            .color(serenity::Color::BLUE)
            .field("New Name", format!("`{}`", new_name), false)
            .footer(CreateEmbedFooter::new(format!("Guild ID: {}", guild_id)))
            .timestamp(serenity::Timestamp::now()),

        AuditEvent::TicketClosed {
            guild_id,
            channel_name,
            closed_by,
        } => CreateEmbed::default()
            .title("Ticket Closed")
            .description(format!(
                "<@{}> closed the ticket `{}`.",
                closed_by, channel_name
            ))
            .color(serenity::Color::BLUE)
            .footer(CreateEmbedFooter::new(format!("Guild ID: {}", guild_id)))
            .timestamp(serenity::Timestamp::now()),

        AuditEvent::GiveawayStarted {
            guild_id,
            channel_id,
            host_id,
            prize,
            minutes,
        } => CreateEmbed::default()
            .title("Giveaway Started")
            .description(format!(
                "<@{}> started a giveaway in <#{}>.",
                host_id, channel_id
            ))
            .color(serenity::Color::GOLD)
            .field("Prize", prize.clone(), false)
            .field("Duration", format!("{} minutes", minutes), false)
            .footer(CreateEmbedFooter::new(format!("Guild ID: {}", guild_id)))
            .timestamp(serenity::Timestamp::now()),

        AuditEvent::GiveawayEnded {
            guild_id,
            channel_id,
            prize,
            winner_id,
            entrants,
        } => {
            let winner_display = match winner_id {
                Some(id) => format!("<@{}>", id),
                None => "No valid entries".to_string(),
            };

            CreateEmbed::default()
                .title("Giveaway Ended")
                .description(format!("The giveaway in <#{}> has ended.", channel_id))
                .color(serenity::Color::GOLD)
                .field("Prize", prize.clone(), false)
                .field("Winner", winner_display, false)
                .field("Entrants", entrants.to_string(), false)
                .footer(CreateEmbedFooter::new(format!("Guild ID: {}", guild_id)))
                .timestamp(serenity::Timestamp::now())
        }

        AuditEvent::PolicyChanged {
            guild_id,
            moderator_id,
            change,
        } => CreateEmbed::default()
            .title("Protection Settings Changed")
            .description(format!("<@{}> {}.", moderator_id, change))
            .color(serenity::Color::BLURPLE)
            .footer(CreateEmbedFooter::new(format!("Guild ID: {}", guild_id)))
            .timestamp(serenity::Timestamp::now()),

        AuditEvent::MassRoleUpdate {
            guild_id,
            moderator_id,
            role_id,
            action,
            updated,
            skipped,
            failed,
        } => CreateEmbed::default()
            .title("Mass Role Update")
            .description(format!(
                "<@{}> ran a bulk role {} for <@&{}>.",
                moderator_id, action, role_id
            ))
            .color(serenity::Color::BLURPLE)
            .field("Updated", updated.to_string(), false)
            .field("Skipped", skipped.to_string(), false)
            .field("Failed", failed.to_string(), false)
            .footer(CreateEmbedFooter::new(format!("Guild ID: {}", guild_id)))
            .timestamp(serenity::Timestamp::now()),
    }
}

fn enforced_label(enforced: bool) -> &'static str {
    if enforced {
        "Yes"
    } else {
        "Failed (check the bot's permissions)"
    }
}

/// Posts an audit embed to the configured log channel. A missing channel
/// configuration disables the audit log; send failures are logged and
/// swallowed so enforcement never depends on the log channel.
pub async fn send_audit(http: &serenity::Http, config: &BotConfig, event: AuditEvent) {
    let Some(channel_id) = config.log_channel_id else {
        return;
    };

    let embed = format_audit_event(&event);
    let channel = serenity::ChannelId::new(channel_id);

    if let Err(e) = channel
        .send_message(http, serenity::CreateMessage::new().embed(embed))
        .await
    {
        tracing::warn!("Failed to send audit entry to channel {}: {}", channel_id, e);
    }
}
