#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use csbot_core::prelude::*;
use csbot_core::testing::RecordingTransport;
use csbot_core::{MessageData, PluginSource};

pub const NICK: &str = "csbot";
pub const ALAN: &str = "alan!~alan@example.com";

pub fn bot(sources: impl IntoIterator<Item = PluginSource>) -> (Arc<Bot>, Arc<RecordingTransport>) {
    let transport = RecordingTransport::new();
    let mut config = ConfigStore::with_defaults();
    config.set_default("nickname", NICK);
    let bot = Bot::builder(transport.clone())
        .config(config)
        .catalog(PluginCatalog::from_sources(sources).unwrap())
        .build();
    (bot, transport)
}

pub fn message(channel: &str, text: &str) -> EventPayload {
    EventPayload::Message(MessageData {
        user: ALAN.into(),
        channel: channel.into(),
        message: text.into(),
    })
}

pub fn joined(channel: &str) -> EventPayload {
    EventPayload::Joined {
        channel: channel.into(),
    }
}

// ─── Alpha: a couple of commands and hooks ───────────────────────────────────

pub struct Alpha;

impl Alpha {
    async fn ping(self: Arc<Self>, cmd: CommandEvent) -> HandlerResult {
        cmd.reply("pong").await?;
        Ok(())
    }

    async fn echo(self: Arc<Self>, cmd: CommandEvent) -> HandlerResult {
        let args = cmd.args().await?;
        cmd.reply(args.join("|")).await?;
        Ok(())
    }

    async fn on_message(self: Arc<Self>, _event: Event) -> HandlerResult {
        Ok(())
    }
}

#[async_trait]
impl Plugin for Alpha {
    fn name() -> &'static str {
        "Alpha"
    }

    fn declare(features: &mut PluginFeatures<Self>) -> RegistryResult<()> {
        features
            .command("ping", Self::ping)?
            .command("echo", Self::echo)?
            .command("shared", Self::ping)?;
        features
            .hook(EventKind::Message, Self::on_message)
            .hook(EventKind::Message, Self::on_message);
        Ok(())
    }

    fn create(_ctx: PluginContext) -> Self {
        Alpha
    }
}

// ─── Beta: collides with Alpha on `shared` ───────────────────────────────────

pub struct Beta;

impl Beta {
    async fn beta(self: Arc<Self>, cmd: CommandEvent) -> HandlerResult {
        cmd.reply("beta").await?;
        Ok(())
    }

    async fn on_joined(self: Arc<Self>, _event: Event) -> HandlerResult {
        Ok(())
    }
}

#[async_trait]
impl Plugin for Beta {
    fn name() -> &'static str {
        "beta"
    }

    fn declare(features: &mut PluginFeatures<Self>) -> RegistryResult<()> {
        features
            .command("beta", Self::beta)?
            .command("shared", Self::beta)?;
        features.hook(EventKind::Joined, Self::on_joined);
        Ok(())
    }

    fn create(_ctx: PluginContext) -> Self {
        Beta
    }
}

// ─── Recorder: logs joined channels and posts follow-up events ───────────────

/// Messages `log` with the channel of every `joined` event. Joining `#1`
/// posts `#2` and `#3`; joining `#2` posts `#4`.
pub struct Recorder {
    ctx: PluginContext,
}

impl Recorder {
    async fn on_joined(self: Arc<Self>, event: Event) -> HandlerResult {
        let EventPayload::Joined { channel } = event.payload() else {
            return Ok(());
        };
        event.transport().msg("log", channel).await?;

        match channel.as_str() {
            "#1" => {
                self.ctx.post(joined("#2")).await;
                self.ctx.post(joined("#3")).await;
            }
            "#2" => self.ctx.post(joined("#4")).await,
            _ => {}
        }
        Ok(())
    }
}

#[async_trait]
impl Plugin for Recorder {
    fn name() -> &'static str {
        "recorder"
    }

    fn declare(features: &mut PluginFeatures<Self>) -> RegistryResult<()> {
        features.hook(EventKind::Joined, Self::on_joined);
        Ok(())
    }

    fn create(ctx: PluginContext) -> Self {
        Recorder { ctx }
    }
}

// ─── Faulty: hooks that fail ─────────────────────────────────────────────────

pub struct Faulty;

impl Faulty {
    async fn fail(self: Arc<Self>, _event: Event) -> HandlerResult {
        Err("hook failed on purpose".into())
    }

    async fn explode(self: Arc<Self>, _event: Event) -> HandlerResult {
        panic!("hook panicked on purpose")
    }

    async fn broken(self: Arc<Self>, _cmd: CommandEvent) -> HandlerResult {
        panic!("command panicked on purpose")
    }
}

#[async_trait]
impl Plugin for Faulty {
    fn name() -> &'static str {
        "faulty"
    }

    fn declare(features: &mut PluginFeatures<Self>) -> RegistryResult<()> {
        features.command("broken", Self::broken)?;
        features
            .hook(EventKind::Joined, Self::fail)
            .hook(EventKind::Joined, Self::explode);
        Ok(())
    }

    fn create(_ctx: PluginContext) -> Self {
        Faulty
    }
}

// ─── Counter: per-instance state ─────────────────────────────────────────────

pub struct Counter {
    count: AtomicUsize,
}

impl Counter {
    async fn count(self: Arc<Self>, cmd: CommandEvent) -> HandlerResult {
        let n = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        cmd.reply(n.to_string()).await?;
        Ok(())
    }
}

#[async_trait]
impl Plugin for Counter {
    fn name() -> &'static str {
        "counter"
    }

    fn declare(features: &mut PluginFeatures<Self>) -> RegistryResult<()> {
        features.command("count", Self::count)?;
        Ok(())
    }

    fn create(_ctx: PluginContext) -> Self {
        Counter {
            count: AtomicUsize::new(0),
        }
    }
}
