// Ticket panel and in-channel ticket management commands.

use crate::core::tickets::{
    can_manage_ticket, parse_ticket_identity, sanitize_label, ticket_channel_name,
};
use crate::discord::logging::{send_audit, AuditEvent};
use crate::discord::tickets::{schedule_ticket_teardown, TICKET_MENU_ID};
use crate::discord::{member_is_moderator, Data, Error};
use poise::serenity_prelude as serenity;

type Context<'a> = poise::Context<'a, Data, Error>;

/// Post the ticket panel with the category select menu.
#[poise::command(prefix_command, guild_only, check = "crate::discord::require_moderator")]
pub async fn ticketpanel(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;

    let options: Vec<serenity::CreateSelectMenuOption> = ctx
        .data()
        .tickets
        .catalog()
        .iter()
        .map(|category| {
            serenity::CreateSelectMenuOption::new(category.label.clone(), category.key.clone())
                .emoji(serenity::ReactionType::Unicode(category.emoji.clone()))
        })
        .collect();

    if options.is_empty() {
        ctx.say("❌ No ticket categories are configured.").await?;
        return Ok(());
    }

    let category_count = options.len() as u64;
    let menu = serenity::CreateSelectMenu::new(
        TICKET_MENU_ID,
        serenity::CreateSelectMenuKind::String { options },
    )
    .placeholder("Choose a ticket category");

    let embed = serenity::CreateEmbed::new()
        .title("🎫 Support Tickets")
        .description("Pick a category below to open a private channel with the staff.")
        .color(0x5865F2);

    ctx.channel_id()
        .send_message(
            &ctx.serenity_context().http,
            serenity::CreateMessage::new()
                .embed(embed)
                .components(vec![serenity::CreateActionRow::SelectMenu(menu)]),
        )
        .await?;

    send_audit(
        &ctx.serenity_context().http,
        &ctx.data().config,
        AuditEvent::TicketPanelPosted {
            guild_id: guild_id.get(),
            channel_id: ctx.channel_id().get(),
            moderator_id: ctx.author().id.get(),
            categories: category_count,
        },
    )
    .await;

    Ok(())
}

/// Rename the current ticket channel.
#[poise::command(prefix_command, guild_only)]
pub async fn rename(
    ctx: Context<'_>,
    #[rest]
    #[description = "New ticket name"]
    new_label: String,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;

    let Some(channel_name) = current_channel_name(&ctx).await else {
        return Ok(());
    };
    let Some(ticket) = parse_ticket_identity(&channel_name) else {
        ctx.say("❌ This command only works inside a ticket channel.")
            .await?;
        return Ok(());
    };

    let is_moderator = caller_is_moderator(&ctx).await;
    if !can_manage_ticket(&ticket, ctx.author().id.get(), is_moderator) {
        ctx.say("❌ Only the ticket owner or a moderator can rename this ticket.")
            .await?;
        return Ok(());
    }

    let label = sanitize_label(&new_label);
    if label.is_empty() {
        ctx.say("❌ That name has no usable characters.").await?;
        return Ok(());
    }

    let new_name = ticket_channel_name(ticket.owner_id, Some(&label));
    if let Err(e) = ctx
        .channel_id()
        .edit(
            &ctx.serenity_context().http,
            serenity::EditChannel::new().name(&new_name),
        )
        .await
    {
        tracing::warn!("Failed to rename ticket channel {}: {}", ctx.channel_id(), e);
        ctx.say("❌ I could not rename the channel. Check my permissions.")
            .await?;
        return Ok(());
    }

    ctx.say(format!("✏️ Ticket renamed to `{}`.", new_name)).await?;

    send_audit(
        &ctx.serenity_context().http,
        &ctx.data().config,
        AuditEvent::TicketRenamed {
            guild_id: guild_id.get(),
            channel_id: ctx.channel_id().get(),
            renamed_by: ctx.author().id.get(),
            new_name,
        },
    )
    .await;

    Ok(())
}

/// Close the current ticket channel.
#[poise::command(prefix_command, guild_only)]
pub async fn close(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;

    let Some(channel_name) = current_channel_name(&ctx).await else {
        return Ok(());
    };
    let Some(ticket) = parse_ticket_identity(&channel_name) else {
        ctx.say("❌ This command only works inside a ticket channel.")
            .await?;
        return Ok(());
    };

    let is_moderator = caller_is_moderator(&ctx).await;
    if !can_manage_ticket(&ticket, ctx.author().id.get(), is_moderator) {
        ctx.say("❌ Only the ticket owner or a moderator can close this ticket.")
            .await?;
        return Ok(());
    }

    let scheduled = schedule_ticket_teardown(
        ctx.serenity_context(),
        ctx.data(),
        guild_id.get(),
        ctx.channel_id(),
        &channel_name,
        ctx.author().id.get(),
    )
    .await;

    if scheduled {
        ctx.say("🔒 This ticket will close in 5 seconds.").await?;
    } else {
        ctx.say("🔒 This ticket is already closing.").await?;
    }

    Ok(())
}

/// The invoking channel's name, from the cache when possible.
async fn current_channel_name(ctx: &Context<'_>) -> Option<String> {
    let cached = ctx.guild().and_then(|guild| {
        guild
            .channels
            .get(&ctx.channel_id())
            .map(|channel| channel.name.clone())
    });
    if cached.is_some() {
        return cached;
    }

    match ctx.channel_id().to_channel(ctx.serenity_context()).await {
        Ok(serenity::Channel::Guild(channel)) => Some(channel.name),
        _ => None,
    }
}

async fn caller_is_moderator(ctx: &Context<'_>) -> bool {
    let Some(member) = ctx.author_member().await else {
        return false;
    };
    let Some(guild) = ctx.guild() else {
        return false;
    };
    member_is_moderator(guild.member_permissions(&member))
}
