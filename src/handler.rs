use crate::{
    config::Config,
    context::Context,
    event::Event,
    music::player::Player,
    reminder::{DiscordReminderDispatch, Sweeper},
    store::Store,
};
use serenity::all::{Interaction, Message, Reaction, Ready, VoiceState};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{
    sync::{Mutex, RwLock},
    task::JoinSet,
};
use tokio_util::sync::CancellationToken;

/// Background tasks that are waited for at shutdown.
pub type Tasks = Arc<Mutex<JoinSet<()>>>;

/// Discord event handler
pub struct Handler {
    cfg: RwLock<Config>,
    store: Arc<Store>,
    player: Arc<Player>,
    http_client: reqwest::Client,
    shutdown: CancellationToken,
    tasks: Tasks,
    sweeper_started: AtomicBool,
}

impl<'a> Handler {
    pub fn new(
        cfg: Config,
        store: Arc<Store>,
        player: Arc<Player>,
        http_client: reqwest::Client,
        shutdown: CancellationToken,
        tasks: Tasks,
    ) -> Self {
        Self {
            cfg: RwLock::new(cfg),
            store,
            player,
            http_client,
            shutdown,
            tasks,
            sweeper_started: AtomicBool::new(false),
        }
    }

    fn ctx(&'a self, discord_ctx: &'a serenity::all::Context) -> Context<'a> {
        Context {
            cfg: &self.cfg,
            store: &self.store,
            player: &self.player,
            http_client: &self.http_client,
            cache: &discord_ctx.cache,
            http: &discord_ctx.http,
            cache_http: discord_ctx,
        }
    }

    // Ready fires again on every reconnect; only the first one gets to start the sweeper.
    fn claim_sweeper(&self) -> bool {
        !self.sweeper_started.swap(true, Ordering::SeqCst)
    }

    async fn start_sweeper(&self, discord_ctx: &serenity::all::Context) {
        if !self.claim_sweeper() {
            return;
        }

        let period = self.cfg.read().await.reminders.sweep_interval_seconds.max(1);
        let dispatch = Arc::new(DiscordReminderDispatch::new(discord_ctx.http.clone()));
        let sweeper = Sweeper::new(self.store.clone(), dispatch, Duration::from_secs(period));
        self.tasks
            .lock()
            .await
            .spawn(sweeper.run(self.shutdown.clone()));
    }
}

#[serenity::async_trait]
impl serenity::all::EventHandler for Handler {
    async fn ready(&self, discord_ctx: serenity::all::Context, ready: Ready) {
        self.start_sweeper(&discord_ctx).await;
        Event::Ready(ready).handle(self.ctx(&discord_ctx)).await;
    }

    async fn message(&self, discord_ctx: serenity::all::Context, msg: Message) {
        Event::Message(msg).handle(self.ctx(&discord_ctx)).await;
    }

    async fn interaction_create(
        &self,
        discord_ctx: serenity::all::Context,
        interaction: Interaction,
    ) {
        Event::Interaction(interaction)
            .handle(self.ctx(&discord_ctx))
            .await;
    }

    async fn voice_state_update(
        &self,
        discord_ctx: serenity::all::Context,
        old: Option<VoiceState>,
        new: VoiceState,
    ) {
        Event::VoiceStateUpdate { old, new }
            .handle(self.ctx(&discord_ctx))
            .await;
    }

    async fn reaction_add(&self, discord_ctx: serenity::all::Context, reaction: Reaction) {
        Event::ReactionAdd(reaction)
            .handle(self.ctx(&discord_ctx))
            .await;
    }
}
