// This is the entry point of the Discord bot.
//
// **Architecture Overview:**
// - `core/` = Business logic (platform-agnostic)
// - `infra/` = Implementations of core traits (persistence)
// - `discord/` = Discord-specific adapters (commands, events)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Set up the Discord framework
// 4. Register commands and event handlers

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "discord/discord_layer.rs"]
mod discord;
#[path = "infra/infra_layer.rs"]
mod infra;

use crate::core::moderation::AbuseDetector;
use crate::core::policy::PolicyService;
use crate::core::tickets::{TicketCatalog, TicketService};
use crate::discord::moderation::events as moderation_events;
use crate::discord::tickets as ticket_interactions;
use crate::discord::{BotConfig, Data, Error};
use crate::infra::policy::JsonPolicyStore;
use poise::serenity_prelude as serenity;

/// How often idle rate-window state is swept out of memory.
const SWEEP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(5 * 60);

/// Event handler for non-command Discord events.
/// This is where messages and joins get screened.
async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::Message { new_message } => {
            if let Err(e) = moderation_events::handle_message(ctx, data, new_message).await {
                tracing::error!("Error screening message: {}", e);
            }
        }
        serenity::FullEvent::GuildMemberAddition { new_member } => {
            if let Err(e) = moderation_events::handle_member_join(ctx, data, new_member).await {
                tracing::error!("Error handling member join: {}", e);
            }
        }
        serenity::FullEvent::InteractionCreate { interaction } => {
            if let Err(e) = ticket_interactions::handle_component(ctx, data, interaction).await {
                tracing::error!("Error handling component interaction: {}", e);
            }
        }
        _ => {}
    }

    Ok(())
}

/// Central handler for command failures. Everything unmatched falls back to
/// the poise default.
async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            tracing::error!("Command `{}` failed: {}", ctx.command().name, error);
            let _ = ctx.say("❌ Something went wrong running that command.").await;
        }
        poise::FrameworkError::CommandCheckFailed { ctx, .. } => {
            let _ = ctx.say("❌ You do not have permission to do that.").await;
        }
        poise::FrameworkError::UnknownCommand {
            ctx, msg, prefix, ..
        } => {
            let _ = msg
                .reply(ctx, format!("❌ Unknown command. Try `{}help`.", prefix))
                .await;
        }
        other => {
            if let Err(e) = poise::builtins::on_error(other).await {
                tracing::error!("Error while handling error: {}", e);
            }
        }
    }
}

#[tokio::main]
async fn main() {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt::init();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    // Get Discord bot token from environment
    let token = std::env::var("DISCORD_TOKEN").expect(
        "Missing DISCORD_TOKEN environment variable! Create a .env file with your bot token.",
    );

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // Create our services with their dependencies.
    // This is the "composition root" where we wire everything together.

    use std::sync::Arc;

    let config = BotConfig::from_env();
    tracing::info!(
        prefix = %config.command_prefix,
        audit_log = config.log_channel_id.is_some(),
        auto_role = config.auto_role_id.is_some(),
        "Configuration loaded"
    );
    if config.log_channel_id.is_none() {
        tracing::warn!("LOG_CHANNEL_ID not set; the audit log is disabled");
    }

    // Guild policies live in one JSON file next to the binary by default.
    let policy_path =
        std::env::var("GUILD_POLICY_FILE").unwrap_or_else(|_| "guild_policies.json".to_string());
    let policies = Arc::new(PolicyService::new(JsonPolicyStore::new(&policy_path)));

    let detector = Arc::new(AbuseDetector::new(Arc::clone(&policies)));

    // Ticket categories come from an optional JSON catalog file. Without one
    // the panel reports that no categories are configured.
    let catalog = match std::env::var("TICKET_CATALOG_FILE") {
        Ok(path) => match TicketCatalog::load(&path) {
            Ok(catalog) => catalog,
            Err(e) => {
                tracing::warn!("Failed to load ticket catalog from {}: {}", path, e);
                TicketCatalog::default()
            }
        },
        Err(_) => TicketCatalog::default(),
    };
    let tickets = Arc::new(TicketService::new(catalog));

    // Create the data structure that will be shared across all commands
    let prefix = config.command_prefix.clone();
    let data = Data {
        detector: Arc::clone(&detector),
        policies: Arc::clone(&policies),
        tickets: Arc::clone(&tickets),
        config,
    };

    // ========================================================================
    // DISCORD FRAMEWORK SETUP
    // ========================================================================
    // Configure the poise framework with our commands and settings.

    let intents = serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT // Required to read message content
        | serenity::GatewayIntents::GUILDS
        | serenity::GatewayIntents::GUILD_MEMBERS;

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            // Register all our commands here
            commands: vec![
                discord::commands::giveaway::giveaway(),
                discord::commands::help::help(),
                discord::commands::massrole::massrole(),
                discord::commands::moderation::protect(),
                discord::commands::moderation::whitelist(),
                discord::commands::moderation::wl(),
                discord::commands::tickets::close(),
                discord::commands::tickets::rename(),
                discord::commands::tickets::ticketpanel(),
                discord::commands::utility::clear(),
                discord::commands::utility::say(),
            ],
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some(prefix),
                case_insensitive_commands: true,
                ..Default::default()
            },
            on_error: |error| Box::pin(on_error(error)),
            // Event handler for messages and other events
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            ..Default::default()
        })
        .setup(|_ctx, ready, _framework| {
            Box::pin(async move {
                println!("🤖 Bot is starting up...");
                println!("✅ Logged in as {}", ready.user.name);

                // Sweep idle rate windows so per-author state does not grow
                // with every member and guild ever seen.
                let detector = Arc::clone(&data.detector);
                tokio::spawn(async move {
                    use std::time::Instant;
                    use tokio::time::sleep;

                    loop {
                        sleep(SWEEP_INTERVAL).await;
                        let (message_keys, join_keys) = detector.sweep_idle(Instant::now()).await;
                        tracing::debug!(message_keys, join_keys, "Swept idle rate windows");
                    }
                });

                Ok(data)
            })
        })
        .build();

    // Create the client and start the bot
    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await
        .expect("Error creating client");

    client.start().await.expect("Error running bot");
}
