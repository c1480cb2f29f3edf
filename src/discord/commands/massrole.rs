// Bulk role assignment across the whole member list.

use crate::discord::logging::{send_audit, AuditEvent};
use crate::discord::{Data, Error};
use poise::serenity_prelude as serenity;
use std::time::Duration;

type Context<'a> = poise::Context<'a, Data, Error>;

const PAGE_SIZE: u64 = 1000;

/// 1200ms pause every 10 writes keeps under the role-update rate limit.
const PACE_DELAY: Duration = Duration::from_millis(1200);

/// Give or take a role for every member of the server.
#[poise::command(
    prefix_command,
    guild_only,
    check = "crate::discord::require_moderator",
    subcommands("add", "remove")
)]
pub async fn massrole(ctx: Context<'_>) -> Result<(), Error> {
    ctx.say("Usage: `massrole add @role` or `massrole remove @role`")
        .await?;
    Ok(())
}

/// Give a role to every member who does not have it.
#[poise::command(prefix_command, guild_only, check = "crate::discord::require_moderator")]
pub async fn add(
    ctx: Context<'_>,
    #[description = "Role to hand out"] role: serenity::Role,
) -> Result<(), Error> {
    apply_mass_role(ctx, role, true).await
}

/// Take a role from every member who has it.
#[poise::command(prefix_command, guild_only, check = "crate::discord::require_moderator")]
pub async fn remove(
    ctx: Context<'_>,
    #[description = "Role to take away"] role: serenity::Role,
) -> Result<(), Error> {
    apply_mass_role(ctx, role, false).await
}

async fn apply_mass_role(ctx: Context<'_>, role: serenity::Role, grant: bool) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;

    if role.managed {
        ctx.say("❌ That role belongs to an integration and cannot be assigned.")
            .await?;
        return Ok(());
    }

    let bot_id = ctx.serenity_context().cache.current_user().id;
    let bot_member = guild_id.member(ctx.serenity_context(), bot_id).await?;
    let can_edit = match ctx.guild() {
        Some(guild) => {
            let highest = bot_member
                .roles
                .iter()
                .filter_map(|role_id| guild.roles.get(role_id))
                .map(|r| r.position)
                .max()
                .unwrap_or(0);
            guild.owner_id == bot_id || highest > role.position
        }
        None => false,
    };
    if !can_edit {
        ctx.say(format!(
            "❌ I cannot manage **{}**. Move my role above it and try again.",
            role.name
        ))
        .await?;
        return Ok(());
    }

    let reply = ctx
        .say(format!(
            "⏳ Updating **{}** for every member... this may take a while.",
            role.name
        ))
        .await?;

    let http = &ctx.serenity_context().http;
    let mut updated = 0u64;
    let mut skipped = 0u64;
    let mut failed = 0u64;
    let mut operations = 0u64;
    let mut after: Option<u64> = None;

    loop {
        let batch = http.get_guild_members(guild_id, Some(PAGE_SIZE), after).await?;
        if batch.is_empty() {
            break;
        }
        after = batch.last().map(|member| member.user.id.get());

        for member in &batch {
            if member.user.bot {
                skipped += 1;
                continue;
            }
            let has_role = member.roles.contains(&role.id);
            if grant == has_role {
                skipped += 1;
                continue;
            }

            let result = if grant {
                member.add_role(http, role.id).await
            } else {
                member.remove_role(http, role.id).await
            };
            match result {
                Ok(()) => updated += 1,
                Err(e) => {
                    tracing::debug!("Role update failed for {}: {}", member.user.id, e);
                    failed += 1;
                }
            }

            operations += 1;
            if operations % 10 == 0 {
                tokio::time::sleep(PACE_DELAY).await;
            }
        }

        if (batch.len() as u64) < PAGE_SIZE {
            break;
        }
    }

    let action = if grant { "added to" } else { "removed from" };
    reply
        .edit(
            ctx,
            poise::CreateReply::default().content(format!(
                "✅ **{}** {} **{}** members ({} skipped, {} failed).",
                role.name, action, updated, skipped, failed
            )),
        )
        .await?;

    send_audit(
        http,
        &ctx.data().config,
        AuditEvent::MassRoleUpdate {
            guild_id: guild_id.get(),
            moderator_id: ctx.author().id.get(),
            role_id: role.id.get(),
            action: if grant { "add" } else { "remove" }.to_string(),
            updated,
            skipped,
            failed,
        },
    )
    .await;

    Ok(())
}
