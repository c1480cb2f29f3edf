// Protection toggles and exemption lists.

use crate::core::policy::ProtectFeature;
use crate::discord::logging::{send_audit, AuditEvent};
use crate::discord::{Data, Error};
use poise::serenity_prelude as serenity;

type Context<'a> = poise::Context<'a, Data, Error>;

/// Turn a protection on or off.
#[poise::command(prefix_command, guild_only, check = "crate::discord::require_moderator")]
pub async fn protect(
    ctx: Context<'_>,
    #[description = "Protection to toggle"] feature: String,
    #[description = "on or off"] state: String,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;

    let parsed: ProtectFeature = match feature.parse() {
        Ok(parsed) => parsed,
        Err(_) => {
            let names = ProtectFeature::ALL
                .iter()
                .map(|f| format!("`{}`", f))
                .collect::<Vec<_>>()
                .join(", ");
            ctx.say(format!("❌ Unknown protection `{}`. Available: {}", feature, names))
                .await?;
            return Ok(());
        }
    };

    let enabled = match state.to_lowercase().as_str() {
        "on" => true,
        "off" => false,
        _ => {
            ctx.say("❌ The state must be `on` or `off`.").await?;
            return Ok(());
        }
    };

    ctx.data()
        .policies
        .set_feature(guild_id.get(), parsed, enabled)
        .await?;

    let verb = if enabled { "enabled" } else { "disabled" };
    ctx.say(format!("🛡️ `{}` is now **{}**.", parsed, verb)).await?;

    send_audit(
        &ctx.serenity_context().http,
        &ctx.data().config,
        AuditEvent::PolicyChanged {
            guild_id: guild_id.get(),
            moderator_id: ctx.author().id.get(),
            change: format!("{} `{}`", verb, parsed),
        },
    )
    .await;

    Ok(())
}

/// Allow links matching a domain to pass the link filter.
#[poise::command(prefix_command, guild_only, check = "crate::discord::require_moderator")]
pub async fn whitelist(
    ctx: Context<'_>,
    #[rest]
    #[description = "Domain to allow"]
    domain: String,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;

    let entry = domain.trim().to_lowercase();
    if entry.is_empty() {
        ctx.say("❌ Usage: `whitelist <domain>`").await?;
        return Ok(());
    }

    let added = ctx
        .data()
        .policies
        .add_link_whitelist(guild_id.get(), entry.clone())
        .await?;

    if added {
        ctx.say(format!("✅ `{}` added to the link whitelist.", entry))
            .await?;
        send_audit(
            &ctx.serenity_context().http,
            &ctx.data().config,
            AuditEvent::PolicyChanged {
                guild_id: guild_id.get(),
                moderator_id: ctx.author().id.get(),
                change: format!("added `{}` to the link whitelist", entry),
            },
        )
        .await;
    } else {
        ctx.say(format!("ℹ️ `{}` is already whitelisted.", entry))
            .await?;
    }

    Ok(())
}

/// Manage who is exempt from the protections.
#[poise::command(
    prefix_command,
    guild_only,
    check = "crate::discord::require_moderator",
    subcommands("adduser", "deluser", "addrole", "delrole", "list")
)]
pub async fn wl(ctx: Context<'_>) -> Result<(), Error> {
    ctx.say(
        "Usage: `wl adduser @user`, `wl deluser @user`, `wl addrole @role`, \
         `wl delrole @role`, `wl list`",
    )
    .await?;
    Ok(())
}

/// Exempt a member from the protections.
#[poise::command(prefix_command, guild_only, check = "crate::discord::require_moderator")]
pub async fn adduser(
    ctx: Context<'_>,
    #[description = "Member to exempt"] user: serenity::User,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;

    let added = ctx
        .data()
        .policies
        .add_bypass_user(guild_id.get(), user.id.get())
        .await?;

    if added {
        ctx.say(format!("✅ <@{}> is now exempt from the protections.", user.id))
            .await?;
        audit_exemption_change(
            ctx,
            guild_id.get(),
            format!("added <@{}> to the bypass list", user.id),
        )
        .await;
    } else {
        ctx.say(format!("ℹ️ <@{}> is already exempt.", user.id)).await?;
    }

    Ok(())
}

/// Remove a member's exemption.
#[poise::command(prefix_command, guild_only, check = "crate::discord::require_moderator")]
pub async fn deluser(
    ctx: Context<'_>,
    #[description = "Member to stop exempting"] user: serenity::User,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;

    let removed = ctx
        .data()
        .policies
        .remove_bypass_user(guild_id.get(), user.id.get())
        .await?;

    if removed {
        ctx.say(format!("✅ <@{}> is no longer exempt.", user.id)).await?;
        audit_exemption_change(
            ctx,
            guild_id.get(),
            format!("removed <@{}> from the bypass list", user.id),
        )
        .await;
    } else {
        ctx.say(format!("ℹ️ <@{}> was not exempt.", user.id)).await?;
    }

    Ok(())
}

/// Exempt every member holding a role from the protections.
#[poise::command(prefix_command, guild_only, check = "crate::discord::require_moderator")]
pub async fn addrole(
    ctx: Context<'_>,
    #[description = "Role to exempt"] role: serenity::Role,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;

    let added = ctx
        .data()
        .policies
        .add_bypass_role(guild_id.get(), role.id.get())
        .await?;

    if added {
        ctx.say(format!("✅ <@&{}> is now exempt from the protections.", role.id))
            .await?;
        audit_exemption_change(
            ctx,
            guild_id.get(),
            format!("added <@&{}> to the bypass list", role.id),
        )
        .await;
    } else {
        ctx.say(format!("ℹ️ <@&{}> is already exempt.", role.id)).await?;
    }

    Ok(())
}

/// Remove a role's exemption.
#[poise::command(prefix_command, guild_only, check = "crate::discord::require_moderator")]
pub async fn delrole(
    ctx: Context<'_>,
    #[description = "Role to stop exempting"] role: serenity::Role,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;

    let removed = ctx
        .data()
        .policies
        .remove_bypass_role(guild_id.get(), role.id.get())
        .await?;

    if removed {
        ctx.say(format!("✅ <@&{}> is no longer exempt.", role.id)).await?;
        audit_exemption_change(
            ctx,
            guild_id.get(),
            format!("removed <@&{}> from the bypass list", role.id),
        )
        .await;
    } else {
        ctx.say(format!("ℹ️ <@&{}> was not exempt.", role.id)).await?;
    }

    Ok(())
}

/// Show the exemption lists and the link whitelist.
#[poise::command(prefix_command, guild_only, check = "crate::discord::require_moderator")]
pub async fn list(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;

    let policy = ctx.data().policies.get(guild_id.get()).await?;

    let users = if policy.bypass_user_ids.is_empty() {
        "None".to_string()
    } else {
        policy
            .bypass_user_ids
            .iter()
            .map(|id| format!("<@{}>", id))
            .collect::<Vec<_>>()
            .join(", ")
    };
    let roles = if policy.bypass_role_ids.is_empty() {
        "None".to_string()
    } else {
        policy
            .bypass_role_ids
            .iter()
            .map(|id| format!("<@&{}>", id))
            .collect::<Vec<_>>()
            .join(", ")
    };
    let domains = if policy.link_whitelist.is_empty() {
        "None".to_string()
    } else {
        policy
            .link_whitelist
            .iter()
            .map(|domain| format!("`{}`", domain))
            .collect::<Vec<_>>()
            .join(", ")
    };

    let embed = serenity::CreateEmbed::new()
        .title("🛡️ Protection Exemptions")
        .color(0x5865F2)
        .field("Exempt Users", users, false)
        .field("Exempt Roles", roles, false)
        .field("Whitelisted Links", domains, false);

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

async fn audit_exemption_change(ctx: Context<'_>, guild_id: u64, change: String) {
    send_audit(
        &ctx.serenity_context().http,
        &ctx.data().config,
        AuditEvent::PolicyChanged {
            guild_id,
            moderator_id: ctx.author().id.get(),
            change,
        },
    )
    .await;
}
