use crate::core::moderation::{AbuseEvent, PunitiveAction, TriggeredRule, Verdict};
use crate::discord::logging::{send_audit, AuditEvent};
use crate::discord::moderation::enforcer;
use crate::discord::{member_guild_permissions, member_is_moderator, Data};
use anyhow::Result;
use poise::serenity_prelude::{self as serenity, Context};
use std::time::{Duration, Instant};

const LINK_NOTICE_TTL: Duration = Duration::from_secs(4);
const FLOOD_NOTICE_TTL: Duration = Duration::from_secs(5);

/// Audit excerpts keep the start of the offending message, in characters.
const EXCERPT_CHARS: usize = 180;

/// Screens a guild message and applies whatever the detector decided.
/// Bots and DMs are never screened.
pub async fn handle_message(ctx: &Context, data: &Data, msg: &serenity::Message) -> Result<()> {
    if msg.author.bot {
        return Ok(());
    }

    let guild_id = match msg.guild_id {
        Some(id) => id,
        None => return Ok(()),
    };

    let (author_is_privileged, author_role_ids) =
        author_privilege(ctx, guild_id, msg.author.id).await;

    let event = AbuseEvent::MessageSent {
        guild_id: guild_id.get(),
        author_id: msg.author.id.get(),
        text: msg.content.clone(),
        author_is_privileged,
        author_role_ids,
    };

    let verdict = data.detector.record(&event, Instant::now()).await?;

    match verdict {
        Verdict::Allow => {}

        Verdict::Punish {
            rule: TriggeredRule::LinkFilter,
            ..
        } => {
            if let Err(e) = enforcer::delete_message(ctx, msg).await {
                tracing::warn!("Failed to delete link message {}: {}", msg.id, e);
            }

            let notice = format!("🔗 <@{}>, links are not allowed here.", msg.author.id);
            if let Err(e) =
                enforcer::send_transient_notice(ctx, msg.channel_id, notice, LINK_NOTICE_TTL).await
            {
                tracing::warn!("Failed to post link notice: {}", e);
            }

            let excerpt: String = msg.content.chars().take(EXCERPT_CHARS).collect();
            send_audit(
                &ctx.http,
                &data.config,
                AuditEvent::LinkBlocked {
                    guild_id: guild_id.get(),
                    channel_id: msg.channel_id.get(),
                    author_id: msg.author.id.get(),
                    excerpt,
                },
            )
            .await;
        }

        Verdict::Punish {
            rule: TriggeredRule::MessageFlood,
            action: PunitiveAction::Timeout(duration),
        } => {
            let enforced =
                match enforcer::timeout_member(ctx, guild_id, msg.author.id, duration).await {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::warn!("Failed to time out {}: {}", msg.author.id, e);
                        false
                    }
                };

            let notice = format!("⛔ <@{}> has been timed out for spamming.", msg.author.id);
            if let Err(e) =
                enforcer::send_transient_notice(ctx, msg.channel_id, notice, FLOOD_NOTICE_TTL).await
            {
                tracing::warn!("Failed to post flood notice: {}", e);
            }

            send_audit(
                &ctx.http,
                &data.config,
                AuditEvent::FloodTimedOut {
                    guild_id: guild_id.get(),
                    channel_id: msg.channel_id.get(),
                    author_id: msg.author.id.get(),
                    minutes: (duration.as_secs() / 60) as u32,
                    enforced,
                },
            )
            .await;
        }

        Verdict::Punish { rule, action } => {
            tracing::warn!(?rule, ?action, "Unhandled message verdict");
        }
    }

    Ok(())
}

/// Records a join, grants the auto-role, and applies the join verdict.
pub async fn handle_member_join(
    ctx: &Context,
    data: &Data,
    member: &serenity::Member,
) -> Result<()> {
    let bot_id = ctx.cache.current_user().id;
    if member.user.id == bot_id {
        return Ok(());
    }

    let guild_id = member.guild_id;
    let user_id = member.user.id;

    let auto_role = match data.config.auto_role_id {
        Some(role_id) => {
            let granted = match member.add_role(&ctx.http, serenity::RoleId::new(role_id)).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!("Failed to grant auto-role to {}: {}", user_id, e);
                    false
                }
            };
            Some(granted)
        }
        None => None,
    };

    send_audit(
        &ctx.http,
        &data.config,
        AuditEvent::MemberJoined {
            guild_id: guild_id.get(),
            user_id: user_id.get(),
            created_at_unix: member.user.created_at().unix_timestamp(),
            auto_role,
        },
    )
    .await;

    let event = AbuseEvent::MemberJoined {
        guild_id: guild_id.get(),
        member_id: user_id.get(),
        is_automated_account: member.user.bot,
    };

    let verdict = data.detector.record(&event, Instant::now()).await?;

    match verdict {
        Verdict::Allow => {}

        Verdict::Punish {
            rule: TriggeredRule::AutomatedAccount,
            ..
        } => {
            let enforced =
                match enforcer::kick_member(ctx, guild_id, user_id, "Anti-bot protection").await {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::warn!("Failed to kick bot account {}: {}", user_id, e);
                        false
                    }
                };

            send_audit(
                &ctx.http,
                &data.config,
                AuditEvent::AutomatedAccountKicked {
                    guild_id: guild_id.get(),
                    user_id: user_id.get(),
                    enforced,
                },
            )
            .await;
        }

        Verdict::Punish {
            rule: TriggeredRule::JoinFlood,
            action,
        } => {
            let (action_text, result) = match action {
                PunitiveAction::Timeout(duration) => (
                    format!("timed out for {} minutes", duration.as_secs() / 60),
                    enforcer::timeout_member(ctx, guild_id, user_id, duration).await,
                ),
                PunitiveAction::Kick => (
                    "kicked".to_string(),
                    enforcer::kick_member(ctx, guild_id, user_id, "Anti-raid protection").await,
                ),
                PunitiveAction::DeleteAndWarn => {
                    tracing::warn!("Unexpected join verdict action");
                    return Ok(());
                }
            };

            let enforced = match result {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!("Failed to apply raid response to {}: {}", user_id, e);
                    false
                }
            };

            send_audit(
                &ctx.http,
                &data.config,
                AuditEvent::RaidResponse {
                    guild_id: guild_id.get(),
                    user_id: user_id.get(),
                    action: action_text,
                    enforced,
                },
            )
            .await;
        }

        Verdict::Punish { rule, action } => {
            tracing::warn!(?rule, ?action, "Unhandled join verdict");
        }
    }

    Ok(())
}

/// Resolves whether the author holds a mod-grade permission, plus their role
/// ids for the bypass lists. Unresolvable members screen as unprivileged.
async fn author_privilege(
    ctx: &Context,
    guild_id: serenity::GuildId,
    user_id: serenity::UserId,
) -> (bool, Vec<u64>) {
    match guild_id.member(ctx, user_id).await {
        Ok(member) => {
            let permissions = member_guild_permissions(ctx, guild_id, &member);
            let roles = member.roles.iter().map(|r| r.get()).collect();
            (member_is_moderator(permissions), roles)
        }
        Err(e) => {
            tracing::debug!("Could not resolve member {}: {}", user_id, e);
            (false, Vec::new())
        }
    }
}
