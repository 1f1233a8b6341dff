mod config;
mod content;
mod context;
mod event;
mod handler;
mod health;
mod helper;
mod logging;
mod music;
mod plugin;
mod poll;
mod reminder;
mod store;
mod warning;

use music::{player::Player, transport::SongbirdTransport};
use serenity::{all::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let cfg = crate::config::Config::load().await?;
    let token = cfg.discord_token()?.to_string();
    let store = Arc::new(crate::store::Store::open(cfg.storage.data_dir.as_deref())?);
    log_internal!("Storing documents in {}", store.dir().display());

    let http_client = reqwest::Client::new();
    let songbird = Songbird::serenity();
    let transport = Arc::new(SongbirdTransport::new(songbird.clone(), http_client.clone()));
    let (player, completions) = Player::new(transport);
    let player = Arc::new(player);
    tokio::spawn(player.clone().run(completions));

    let shutdown = CancellationToken::new();
    let tasks = handler::Tasks::default();

    // The health check is independent of the bot; failing to bind it is not fatal.
    match health::bind(&cfg.health.bind).await {
        Ok(listener) => {
            let shutdown = shutdown.clone();
            tasks.lock().await.spawn(async move {
                if let Err(e) = health::serve(listener, shutdown).await {
                    tracing::error!("{:#}", e);
                }
            });
        }
        Err(e) => tracing::error!("{:#}", e),
    }

    let handler = handler::Handler::new(
        cfg,
        store,
        player,
        http_client,
        shutdown.clone(),
        tasks.clone(),
    );

    // Things we want discord to tell us about.
    let intents = GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::DIRECT_MESSAGE_REACTIONS
        | GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::GUILD_MESSAGE_REACTIONS
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::MESSAGE_CONTENT;

    let mut client = Client::builder(&token, intents)
        .event_handler(handler)
        .register_songbird_with(songbird)
        .await?;

    let shard_manager = client.shard_manager.clone();
    let ctrl_c_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Could not listen for Ctrl-C: {}", e);
            return;
        }
        log_internal!("Shutting down");
        ctrl_c_shutdown.cancel();
        shard_manager.shutdown_all().await;
    });

    let result = client.start().await;

    // Let the sweeper finish its tick and the health server drain.
    shutdown.cancel();
    let mut tasks = tasks.lock().await;
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            tracing::error!("Background task failed: {}", e);
        }
    }

    result.map_err(Into::into)
}
