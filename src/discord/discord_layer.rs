// Discord layer - commands and event handlers.

use crate::core::moderation::AbuseDetector;
use crate::core::policy::PolicyService;
use crate::core::tickets::TicketService;
use crate::infra::policy::JsonPolicyStore;
use poise::serenity_prelude as serenity;
use std::sync::Arc;

#[path = "commands/command_catalog.rs"]
pub mod commands;

#[path = "logging/audit_log.rs"]
pub mod logging;

#[path = "moderation/mod.rs"]
pub mod moderation;

#[path = "tickets/interactions.rs"]
pub mod tickets;

/// Runtime settings read from the environment at startup.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub command_prefix: String,
    /// Channel receiving audit embeds. None disables the audit log.
    pub log_channel_id: Option<u64>,
    /// Role granted to every joining member. None disables the grant.
    pub auto_role_id: Option<u64>,
}

impl BotConfig {
    pub fn from_env() -> Self {
        let command_prefix =
            std::env::var("COMMAND_PREFIX").unwrap_or_else(|_| "+".to_string());
        let log_channel_id = std::env::var("LOG_CHANNEL_ID")
            .ok()
            .and_then(|v| v.parse().ok());
        let auto_role_id = std::env::var("AUTO_ROLE_ID")
            .ok()
            .and_then(|v| v.parse().ok());

        Self {
            command_prefix,
            log_channel_id,
            auto_role_id,
        }
    }
}

/// Shared state injected into every command and event handler.
pub struct Data {
    pub detector: Arc<AbuseDetector<JsonPolicyStore>>,
    pub policies: Arc<PolicyService<JsonPolicyStore>>,
    pub tickets: Arc<TicketService>,
    pub config: BotConfig,
}

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;

/// Moderator gate: any one of the four mod-grade permissions suffices.
pub fn member_is_moderator(permissions: serenity::Permissions) -> bool {
    permissions.administrator()
        || permissions.manage_guild()
        || permissions.moderate_members()
        || permissions.manage_messages()
}

/// The caller's guild-level permissions, resolved from the cache. Empty when
/// the guild is not cached.
pub fn member_guild_permissions(
    ctx: &serenity::Context,
    guild_id: serenity::GuildId,
    member: &serenity::Member,
) -> serenity::Permissions {
    guild_id
        .to_guild_cached(&ctx.cache)
        .map(|guild| guild.member_permissions(member))
        .unwrap_or_else(serenity::Permissions::empty)
}

/// Command check for the moderator-only commands.
pub async fn require_moderator(ctx: Context<'_>) -> Result<bool, Error> {
    let Some(member) = ctx.author_member().await else {
        return Ok(false);
    };
    let permissions = {
        let Some(guild) = ctx.guild() else {
            return Ok(false);
        };
        guild.member_permissions(&member)
    };
    Ok(member_is_moderator(permissions))
}
