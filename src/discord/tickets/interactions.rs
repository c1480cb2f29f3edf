use crate::core::tickets::{can_manage_ticket, parse_ticket_identity, ticket_channel_name};
use crate::discord::logging::{send_audit, AuditEvent};
use crate::discord::{member_guild_permissions, member_is_moderator, Data};
use anyhow::Result;
use poise::serenity_prelude::{self as serenity, Context, CreateEmbed};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Component ids baked into the panel and the welcome message. Stable so
/// panels posted before a restart keep working.
pub const TICKET_MENU_ID: &str = "ticket_category_menu";
pub const TICKET_CLOSE_ID: &str = "ticket_close_btn";

const CLOSE_DELAY: Duration = Duration::from_secs(5);

/// Routes component interactions to the ticket flows. Everything else is
/// ignored.
pub async fn handle_component(
    ctx: &Context,
    data: &Data,
    interaction: &serenity::Interaction,
) -> Result<()> {
    let serenity::Interaction::Component(component) = interaction else {
        return Ok(());
    };

    match component.data.custom_id.as_str() {
        TICKET_MENU_ID => open_ticket_from_menu(ctx, data, component).await,
        TICKET_CLOSE_ID => close_ticket_from_button(ctx, data, component).await,
        _ => Ok(()),
    }
}

async fn open_ticket_from_menu(
    ctx: &Context,
    data: &Data,
    component: &serenity::ComponentInteraction,
) -> Result<()> {
    let Some(guild_id) = component.guild_id else {
        return Ok(());
    };

    let selected = match &component.data.kind {
        serenity::ComponentInteractionDataKind::StringSelect { values } => values.first().cloned(),
        _ => None,
    };
    let Some(category_key) = selected else {
        return Ok(());
    };

    let user_id = component.user.id;

    // One open ticket per member. The cache covers the common case; fall
    // back to the API when the guild is not cached.
    let cached_scan = guild_id
        .to_guild_cached(&ctx.cache)
        .map(|guild| open_ticket_in(&guild.channels, user_id.get()));
    let existing = match cached_scan {
        Some(found) => found,
        None => open_ticket_in(&guild_id.channels(&ctx.http).await?, user_id.get()),
    };

    if let Some(open_channel) = existing {
        respond_ephemeral(
            ctx,
            component,
            &format!("❌ You already have an open ticket: <#{}>", open_channel),
        )
        .await?;
        return Ok(());
    }

    let Some(category) = data.tickets.category(&category_key).cloned() else {
        respond_ephemeral(
            ctx,
            component,
            "❌ That ticket category is not available anymore.",
        )
        .await?;
        return Ok(());
    };

    let category_ok = category.category_channel_id != 0
        && matches!(
            ctx.http
                .get_channel(serenity::ChannelId::new(category.category_channel_id))
                .await,
            Ok(serenity::Channel::Guild(parent)) if parent.kind == serenity::ChannelType::Category
        );
    if !category_ok {
        respond_ephemeral(
            ctx,
            component,
            "❌ The category for these tickets is missing. Ask an admin to check the ticket setup.",
        )
        .await?;
        return Ok(());
    }

    let bot_id = ctx.cache.current_user().id;
    let everyone = serenity::RoleId::new(guild_id.get());
    let overwrites = vec![
        serenity::PermissionOverwrite {
            allow: serenity::Permissions::empty(),
            deny: serenity::Permissions::VIEW_CHANNEL,
            kind: serenity::PermissionOverwriteType::Role(everyone),
        },
        serenity::PermissionOverwrite {
            allow: serenity::Permissions::VIEW_CHANNEL
                | serenity::Permissions::SEND_MESSAGES
                | serenity::Permissions::READ_MESSAGE_HISTORY
                | serenity::Permissions::ATTACH_FILES,
            deny: serenity::Permissions::empty(),
            kind: serenity::PermissionOverwriteType::Member(user_id),
        },
        serenity::PermissionOverwrite {
            allow: serenity::Permissions::VIEW_CHANNEL
                | serenity::Permissions::SEND_MESSAGES
                | serenity::Permissions::READ_MESSAGE_HISTORY
                | serenity::Permissions::MANAGE_CHANNELS
                | serenity::Permissions::MANAGE_MESSAGES,
            deny: serenity::Permissions::empty(),
            kind: serenity::PermissionOverwriteType::Member(bot_id),
        },
    ];

    let builder = serenity::CreateChannel::new(ticket_channel_name(user_id.get(), None))
        .kind(serenity::ChannelType::Text)
        .category(serenity::ChannelId::new(category.category_channel_id))
        .permissions(overwrites);

    let channel = match guild_id.create_channel(&ctx.http, builder).await {
        Ok(channel) => channel,
        Err(e) => {
            tracing::warn!("Failed to create ticket channel: {}", e);
            respond_ephemeral(
                ctx,
                component,
                "❌ I could not create the ticket channel. Check my permissions.",
            )
            .await?;
            return Ok(());
        }
    };

    let welcome = CreateEmbed::default()
        .title(format!("{} {}", category.emoji, category.label))
        .description(format!(
            "Welcome <@{}>! Describe your issue and a staff member will reply shortly.",
            user_id
        ))
        .color(serenity::Color::BLUE);
    let close_row = serenity::CreateActionRow::Buttons(vec![serenity::CreateButton::new(
        TICKET_CLOSE_ID,
    )
    .label("🔒 Close Ticket")
    .style(serenity::ButtonStyle::Danger)]);

    if let Err(e) = channel
        .id
        .send_message(
            &ctx.http,
            serenity::CreateMessage::new()
                .content(format!("<@{}>", user_id))
                .embed(welcome)
                .components(vec![close_row]),
        )
        .await
    {
        tracing::warn!("Failed to post ticket welcome message: {}", e);
    }

    respond_ephemeral(
        ctx,
        component,
        &format!("🎫 Your ticket is ready: <#{}>", channel.id),
    )
    .await?;

    send_audit(
        &ctx.http,
        &data.config,
        AuditEvent::TicketOpened {
            guild_id: guild_id.get(),
            channel_id: channel.id.get(),
            owner_id: user_id.get(),
            category_label: category.label.clone(),
        },
    )
    .await;

    Ok(())
}

async fn close_ticket_from_button(
    ctx: &Context,
    data: &Data,
    component: &serenity::ComponentInteraction,
) -> Result<()> {
    let Some(guild_id) = component.guild_id else {
        return Ok(());
    };

    let cached_name = guild_id.to_guild_cached(&ctx.cache).and_then(|guild| {
        guild
            .channels
            .get(&component.channel_id)
            .map(|channel| channel.name.clone())
    });
    let channel_name = match cached_name {
        Some(name) => name,
        None => match component.channel_id.to_channel(&ctx.http).await {
            Ok(serenity::Channel::Guild(channel)) => channel.name,
            _ => return Ok(()),
        },
    };

    let Some(ticket) = parse_ticket_identity(&channel_name) else {
        respond_ephemeral(ctx, component, "❌ This is not a ticket channel.").await?;
        return Ok(());
    };

    let caller_is_moderator = component
        .member
        .as_ref()
        .map(|member| {
            member_is_moderator(member_guild_permissions(ctx, guild_id, member))
        })
        .unwrap_or(false);

    if !can_manage_ticket(&ticket, component.user.id.get(), caller_is_moderator) {
        respond_ephemeral(
            ctx,
            component,
            "❌ Only the ticket owner or a moderator can close this ticket.",
        )
        .await?;
        return Ok(());
    }

    if !schedule_ticket_teardown(
        ctx,
        data,
        guild_id.get(),
        component.channel_id,
        &channel_name,
        component.user.id.get(),
    )
    .await
    {
        respond_ephemeral(ctx, component, "🔒 This ticket is already closing.").await?;
        return Ok(());
    }

    component
        .create_response(
            &ctx.http,
            serenity::CreateInteractionResponse::Message(
                serenity::CreateInteractionResponseMessage::new()
                    .content("🔒 This ticket will close in 5 seconds."),
            ),
        )
        .await?;

    Ok(())
}

/// Starts the delayed teardown for a ticket channel. Returns false when a
/// close is already in flight. Replying to the user is the caller's job.
pub async fn schedule_ticket_teardown(
    ctx: &Context,
    data: &Data,
    guild_id: u64,
    channel_id: serenity::ChannelId,
    channel_name: &str,
    closed_by: u64,
) -> bool {
    if !data.tickets.begin_close(channel_id.get()) {
        return false;
    }

    send_audit(
        &ctx.http,
        &data.config,
        AuditEvent::TicketClosed {
            guild_id,
            channel_name: channel_name.to_string(),
            closed_by,
        },
    )
    .await;

    let http = ctx.http.clone();
    let tickets = Arc::clone(&data.tickets);
    tokio::spawn(async move {
        tokio::time::sleep(CLOSE_DELAY).await;
        if let Err(e) = channel_id.delete(&http).await {
            tracing::warn!("Failed to delete ticket channel {}: {}", channel_id, e);
        }
        tickets.finish_close(channel_id.get());
    });

    true
}

fn open_ticket_in(
    channels: &HashMap<serenity::ChannelId, serenity::GuildChannel>,
    user_id: u64,
) -> Option<serenity::ChannelId> {
    channels
        .values()
        .find(|channel| {
            parse_ticket_identity(&channel.name)
                .is_some_and(|ticket| ticket.owner_id == user_id)
        })
        .map(|channel| channel.id)
}

async fn respond_ephemeral(
    ctx: &Context,
    component: &serenity::ComponentInteraction,
    text: &str,
) -> Result<()> {
    component
        .create_response(
            &ctx.http,
            serenity::CreateInteractionResponse::Message(
                serenity::CreateInteractionResponseMessage::new()
                    .content(text)
                    .ephemeral(true),
            ),
        )
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guild_channel(id: u64, name: &str) -> serenity::GuildChannel {
        let mut channel = serenity::GuildChannel::default();
        channel.id = serenity::ChannelId::new(id);
        channel.name = name.to_string();
        channel
    }

    fn channel_map(
        channels: Vec<serenity::GuildChannel>,
    ) -> HashMap<serenity::ChannelId, serenity::GuildChannel> {
        channels.into_iter().map(|c| (c.id, c)).collect()
    }

    #[test]
    fn duplicate_scan_matches_the_exact_owner_only() {
        let channels = channel_map(vec![
            guild_channel(1, "general"),
            guild_channel(2, "ticket-421"),
            guild_channel(3, "ticket-42-billing"),
        ]);

        // A renamed ticket still counts, and owner 42 does not collide with
        // the prefix-sharing owner 421.
        assert_eq!(
            open_ticket_in(&channels, 42),
            Some(serenity::ChannelId::new(3))
        );
        assert_eq!(
            open_ticket_in(&channels, 421),
            Some(serenity::ChannelId::new(2))
        );
        assert_eq!(open_ticket_in(&channels, 7), None);
    }
}
