// The command reference embed.

use crate::discord::{Data, Error};
use poise::serenity_prelude as serenity;

type Context<'a> = poise::Context<'a, Data, Error>;

/// Show every command plus the current protection states.
#[poise::command(prefix_command, guild_only)]
pub async fn help(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;

    let policy = ctx.data().policies.get(guild_id.get()).await?;
    let prefix = ctx.data().config.command_prefix.clone();

    let state = |enabled: bool| if enabled { "✅" } else { "❌" };
    let protections = format!(
        "{} antiLink • {} antiSpam • {} antiRaid • {} antiBot",
        state(policy.anti_link),
        state(policy.anti_spam),
        state(policy.anti_raid),
        state(policy.anti_bot),
    );

    let moderation = format!(
        "`{p}protect <feature> <on|off>` - toggle a protection\n\
         `{p}whitelist <domain>` - allow a link domain\n\
         `{p}wl <adduser|deluser|addrole|delrole|list>` - manage exemptions\n\
         `{p}clear [count]` - bulk delete messages\n\
         `{p}say <text>` - speak as the bot\n\
         `{p}massrole <add|remove> <role>` - bulk role update",
        p = prefix
    );
    let tickets = format!(
        "`{p}ticketpanel` - post the ticket panel\n\
         `{p}rename <name>` - rename the current ticket\n\
         `{p}close` - close the current ticket",
        p = prefix
    );
    let giveaways = format!(
        "`{p}giveaway <minutes> <prize>` - start a reaction giveaway",
        p = prefix
    );

    let embed = serenity::CreateEmbed::new()
        .title("🤖 Command Reference")
        .color(0x5865F2)
        .field("Current Protections", protections, false)
        .field("Moderation", moderation, false)
        .field("Tickets", tickets, false)
        .field("Giveaways", giveaways, false)
        .footer(serenity::CreateEmbedFooter::new(
            "Moderator commands need a mod-grade permission.",
        ));

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}
