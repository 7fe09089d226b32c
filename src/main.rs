use anyhow::Result;
use clap::Parser;
use dotenv::dotenv;
use poise::serenity_prelude as serenity;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Discord chat bot that gates commands behind allow-list verification
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Register slash commands in this guild only (faster for testing)
    #[arg(long)]
    guild_id: Option<u64>,

    /// Directory holding persisted state (defaults to $STATE_PATH or ./state)
    #[arg(long)]
    state_path: Option<PathBuf>,
}

mod collaborators;
mod commands;
mod config;
mod error;
mod events;
mod messages;
mod router;
mod services;
mod state;

use collaborators::MediaTrigger;
use commands::{help, ping};
use config::{
    DiscordConfig, ObsConfig, OpenAiConfig, RouterConfig, SafeBrowsingConfig, SheetsConfig,
    TwitchConfig,
};
use error::BotError;
use events::{handle_message, run_twitch};
use router::{Collaborators, Router};
use services::{
    DiscordTransport, ObsMediaTrigger, OpenAiCompletion, SafeBrowsingChecker, SheetsAllowList,
    TwitchIrc,
};
use state::JsonVerificationStore;

const COOLDOWN_PRUNE_INTERVAL: std::time::Duration = std::time::Duration::from_secs(600);

type Error = Box<dyn std::error::Error + Send + Sync>;
type Context<'a> = poise::Context<'a, Data, Error>;

/// Shared application state
pub struct Data {
    pub router: Arc<Router>,
    pub transport: Arc<DiscordTransport>,
}

async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    if let serenity::FullEvent::Message { new_message } = event {
        if let Err(e) = handle_message(ctx, new_message, data).await {
            error!("Failed to handle message: {}", e);
        }
    }
    Ok(())
}

/// Log the application id encoded in the first segment of a bot token
fn log_bot_id(token: &str) {
    use base64::Engine;

    let Some(bot_id_b64) = token.split('.').next() else {
        return;
    };
    // Discord tokens use URL-safe base64 without padding
    let decoded = base64::engine::general_purpose::STANDARD_NO_PAD
        .decode(bot_id_b64)
        .or_else(|_| base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(bot_id_b64));
    if let Some(id_str) = decoded.ok().and_then(|d| String::from_utf8(d).ok()) {
        info!(
            "Bot ID: {} (enable the MESSAGE_CONTENT intent at https://discord.com/developers/applications/{}/bot)",
            id_str, id_str
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();

    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_level(true),
        )
        .with(tracing_subscriber::filter::LevelFilter::INFO)
        .init();

    // Configuration errors are fatal before anything connects
    let discord_config = DiscordConfig::from_env();
    let twitch_config = TwitchConfig::from_env()?;
    if discord_config.is_none() && twitch_config.is_none() {
        return Err(BotError::ConfigMissing {
            key: "DISCORD_TOKEN or TWITCH_USER".to_string(),
        }
        .into());
    }
    let mut router_config = RouterConfig::from_env()?;
    let openai_config = OpenAiConfig::from_env()?;
    let safe_browsing_config = SafeBrowsingConfig::from_env()?;
    let sheets_config = SheetsConfig::from_env()?;
    let obs_config = ObsConfig::from_env()?;

    if let Some(twitch) = &twitch_config {
        router_config = router_config.with_bot_identity(&twitch.username);
    }

    info!(
        "Router: marker '{}', cooldown {}ms, reminder cooldown {}ms, verification {}",
        router_config.command_marker,
        router_config.cooldown_ms,
        router_config.reminder_cooldown_ms,
        if router_config.verification_enabled { "enabled" } else { "disabled" },
    );

    // Load state
    let state_path = args.state_path.unwrap_or_else(|| {
        std::env::var("STATE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("state"))
    });
    let verified_path = std::env::var("VERIFIED_USERS_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| state_path.join("verified_users.json"));
    info!("Loading verified users...");
    let verification_store = Arc::new(JsonVerificationStore::open(verified_path).await?);

    let media: Option<Arc<dyn MediaTrigger>> = match obs_config {
        Some(config) => {
            info!(
                "Media trigger: OBS source '{}', assets from {}",
                config.media_source,
                config.media_dir.display()
            );
            Some(Arc::new(ObsMediaTrigger::new(config)))
        }
        None => {
            warn!("OBS_HOST not set, media playback disabled");
            None
        }
    };

    let collaborators = Collaborators {
        verification_store,
        allow_list: Arc::new(SheetsAllowList::new(sheets_config)?),
        url_safety: Arc::new(SafeBrowsingChecker::new(safe_browsing_config)?),
        completion: Arc::new(OpenAiCompletion::from_config(openai_config).await?),
        media,
    };

    // One router for every platform, so cooldowns and locks are shared
    let router = Arc::new(Router::new(router_config, collaborators));

    // Cooldown maps only grow otherwise
    let prune_router = router.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(COOLDOWN_PRUNE_INTERVAL);
        loop {
            interval.tick().await;
            prune_router.prune_cooldowns(chrono::Utc::now().timestamp_millis());
        }
    });

    let twitch_task = twitch_config.map(|config| {
        info!("Starting Twitch chat for {}", config.channels.join(", "));
        let (irc, transport) = TwitchIrc::new(config);
        tokio::spawn(run_twitch(irc, transport, router.clone()))
    });

    match discord_config {
        Some(discord_config) => run_discord(discord_config, router, args.guild_id).await?,
        None => {
            if let Some(task) = twitch_task {
                task.await??;
            }
        }
    }
    warn!("Bot ended.");

    Ok(())
}

async fn run_discord(
    discord_config: DiscordConfig,
    router: Arc<Router>,
    target_guild_id: Option<u64>,
) -> Result<()> {
    log_bot_id(&discord_config.token);

    // Build framework
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![ping(), help()],
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            on_error: |error| {
                Box::pin(async move {
                    match error {
                        poise::FrameworkError::Command { error, ctx, .. } => {
                            error!("Error in command '{}': {}", ctx.command().qualified_name, error);
                            let _ = ctx.say(format!("An error occurred: {}", error)).await;
                        }
                        other => {
                            error!("Other framework error: {}", other);
                        }
                    }
                })
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            let router = router.clone();

            Box::pin(async move {
                info!("Bot logged in as: {}", ready.user.name);

                if let Some(gid) = target_guild_id {
                    let guild_id = serenity::GuildId::new(gid);
                    info!("Registering commands to guild: {}", guild_id);
                    if let Err(e) = poise::builtins::register_in_guild(
                        ctx,
                        &framework.options().commands,
                        guild_id,
                    )
                    .await
                    {
                        error!("Failed to register commands for guild {}: {}", guild_id, e);
                    }
                } else {
                    info!("Registering commands globally...");
                    if let Err(e) =
                        poise::builtins::register_globally(ctx, &framework.options().commands).await
                    {
                        error!("Failed to register commands globally: {}", e);
                    }
                }

                Ok(Data {
                    router,
                    transport: Arc::new(DiscordTransport::new(ctx.http.clone())),
                })
            })
        })
        .build();

    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::MESSAGE_CONTENT;

    let mut client = serenity::ClientBuilder::new(discord_config.token, intents)
        .framework(framework)
        .await?;

    info!("Starting Discord bot...");
    if let Err(e) = client.start().await {
        let err_str = e.to_string();
        if err_str.contains("Disallowed") || err_str.contains("intents") {
            error!("Failed to start bot: {}", e);
            error!("Enable the MESSAGE_CONTENT privileged intent in the Discord Developer Portal");
            return Err(anyhow::anyhow!(
                "Disallowed gateway intents: MESSAGE_CONTENT must be enabled"
            ));
        }
        return Err(e.into());
    }

    Ok(())
}
