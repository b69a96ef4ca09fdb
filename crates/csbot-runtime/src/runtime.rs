//! Process orchestration.
//!
//! The transport feeds notifications into an [`Inbound`] channel; the
//! runtime pumps them into the [`Bot`] one at a time until the channel closes
//! or the process is asked to stop, then unloads every plugin and saves the
//! key-value store.
//!
//! ```rust,ignore
//! use csbot_runtime::{BotRuntime, inbound_channel};
//!
//! let (tx, rx) = inbound_channel();
//! let runtime = BotRuntime::builder()
//!     .config_file("csbot.toml")
//!     .start(transport)
//!     .await?;
//! spawn_transport(tx);
//! runtime.run(rx).await?;
//! ```

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use csbot_core::{
    Bot, BoxedTransport, EventPayload, KeyValueStore, PluginCatalog, TransportError,
    TransportResult,
};
use tokio::signal;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, info, warn};

use crate::config::{ConfigLoader, CsbotConfig};
use crate::error::RuntimeResult;
use crate::logging;

/// Buffered notifications between the transport and the bot.
pub const INBOUND_CAPACITY: usize = 256;

/// Receiving half of the transport-to-bot channel.
pub type Inbound = mpsc::Receiver<EventPayload>;

/// Sending half of the transport-to-bot channel.
pub type InboundSender = mpsc::Sender<EventPayload>;

/// Creates the channel a transport delivers notifications through.
pub fn inbound_channel() -> (InboundSender, Inbound) {
    mpsc::channel(INBOUND_CAPACITY)
}

/// Feeds a network answer back into the inbound channel from a transport
/// method.
///
/// Transport methods run inside the loop that drains the channel, so this
/// never waits for room: when the channel is full the payload is sent from a
/// spawned task.
pub fn deliver(inbound: &mpsc::WeakSender<EventPayload>, payload: EventPayload) -> TransportResult<()> {
    let sender = inbound.upgrade().ok_or(TransportError::NotConnected)?;
    match sender.try_send(payload) {
        Ok(()) => Ok(()),
        Err(TrySendError::Full(payload)) => {
            debug!(event = %payload.kind(), "Inbound channel full, delivering later");
            tokio::spawn(async move {
                if let Err(e) = sender.send(payload).await {
                    warn!(error = %e, "Inbound channel closed before delivery");
                }
            });
            Ok(())
        }
        Err(TrySendError::Closed(_)) => Err(TransportError::SendFailed("inbound channel closed".into())),
    }
}

/// A started bot together with the configuration it was built from.
pub struct BotRuntime {
    config: CsbotConfig,
    bot: Arc<Bot>,
}

impl BotRuntime {
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Starts a bot with every plugin registered in the binary.
    pub async fn from_config(config: CsbotConfig, transport: BoxedTransport) -> RuntimeResult<Self> {
        let catalog = PluginCatalog::discover()?;
        Self::with_catalog(config, catalog, transport).await
    }

    /// Starts a bot that can load only the plugins in `catalog`.
    ///
    /// Loads the key-value store, builds the bot and loads the plugins the
    /// `plugins` option enables. A plugin that fails to load is logged and
    /// skipped.
    pub async fn with_catalog(
        config: CsbotConfig,
        catalog: PluginCatalog,
        transport: BoxedTransport,
    ) -> RuntimeResult<Self> {
        logging::init_from_config(&config.logging);

        let store = KeyValueStore::load(&config.storage.path).await?;
        let bot = Bot::builder(transport)
            .config(config.to_store())
            .store(store)
            .catalog(catalog)
            .build();

        let loaded = bot.load_enabled().await;
        info!(
            nickname = %bot.nickname(),
            plugins = ?loaded,
            "Bot started"
        );
        Ok(Self { config, bot })
    }

    pub fn config(&self) -> &CsbotConfig {
        &self.config
    }

    pub fn bot(&self) -> &Arc<Bot> {
        &self.bot
    }

    /// Runs until the inbound channel closes or Ctrl+C/SIGTERM arrives.
    pub async fn run(&self, inbound: Inbound) -> RuntimeResult<()> {
        self.run_until(inbound, wait_for_shutdown()).await
    }

    /// Runs until the inbound channel closes or `shutdown` completes.
    pub async fn run_until<F>(&self, mut inbound: Inbound, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        info!("csbot is now running");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                payload = inbound.recv() => match payload {
                    Some(payload) => {
                        debug!(event = %payload.kind(), "Received notification");
                        self.bot.notify(payload).await;
                    }
                    None => {
                        info!("Inbound channel closed, shutting down");
                        break;
                    }
                },
                () = &mut shutdown => break,
            }
        }

        self.stop().await
    }

    /// Unloads all plugins and saves the key-value store.
    pub async fn stop(&self) -> RuntimeResult<()> {
        info!("Stopping csbot");
        if let Err(e) = self.bot.shutdown().await {
            error!(error = %e, "Failed to save key-value store");
            return Err(e.into());
        }
        info!("csbot stopped");
        Ok(())
    }
}

async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
                return;
            }
            Err(e) => warn!(error = %e, "Failed to register SIGTERM handler"),
        }
    }

    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => error!(error = %e, "Failed to listen for Ctrl+C"),
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Loads configuration, then starts a [`BotRuntime`].
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    catalog: Option<PluginCatalog>,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new(),
            catalog: None,
        }
    }

    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    pub fn merge(mut self, config: CsbotConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Restricts the plugins available to the bot.
    pub fn catalog(mut self, catalog: PluginCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub async fn start(self, transport: BoxedTransport) -> RuntimeResult<BotRuntime> {
        let config = self.config_loader.load()?;
        match self.catalog {
            Some(catalog) => BotRuntime::with_catalog(config, catalog, transport).await,
            None => BotRuntime::from_config(config, transport).await,
        }
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use csbot_core::prelude::*;
    use csbot_core::testing::{Outbound, RecordingTransport};
    use csbot_core::{MessageData, PluginSource};

    use super::*;

    struct Greeter {
        ctx: PluginContext,
    }

    impl Greeter {
        async fn greet(self: Arc<Self>, cmd: CommandEvent) -> HandlerResult {
            let greeting = self.ctx.cfg("greeting")?;
            self.ctx.kv_set("last", cmd.nick())?;
            cmd.reply(greeting).await?;
            Ok(())
        }
    }

    #[async_trait]
    impl Plugin for Greeter {
        fn name() -> &'static str {
            "greeter"
        }

        fn declare(features: &mut PluginFeatures<Self>) -> RegistryResult<()> {
            features.command("greet", Self::greet)?;
            Ok(())
        }

        fn create(ctx: PluginContext) -> Self {
            Greeter { ctx }
        }
    }

    fn write_config(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("csbot.toml");
        let data = dir.join("csbot.data.json");
        std::fs::write(
            &path,
            format!(
                "[default]\nnickname = \"csbot\"\nchannels = [\"#a\", \"#b\"]\n\n\
                 [plugins.greeter]\ngreeting = \"hello\"\n\n\
                 [storage]\npath = {:?}\n",
                data.display().to_string()
            ),
        )
        .unwrap();
        path
    }

    #[tokio::test]
    async fn test_runs_until_inbound_closes_then_saves() {
        let dir = tempfile::tempdir().unwrap();
        let transport = RecordingTransport::new();
        let runtime = BotRuntime::builder()
            .without_env()
            .config_file(write_config(dir.path()))
            .catalog(PluginCatalog::from_sources([PluginSource::of::<Greeter>()]).unwrap())
            .start(transport.clone())
            .await
            .unwrap();
        assert_eq!(runtime.bot().loaded_plugins(), vec!["greeter"]);

        let (tx, rx) = inbound_channel();
        tx.send(EventPayload::SignedOn).await.unwrap();
        tx.send(EventPayload::Message(MessageData {
            user: "alan!~alan@example.com".into(),
            channel: "#a".into(),
            message: "!greet".into(),
        }))
        .await
        .unwrap();
        drop(tx);

        runtime.run_until(rx, std::future::pending()).await.unwrap();

        assert_eq!(
            transport.sent(),
            vec![
                Outbound::Join("#a".into()),
                Outbound::Join("#b".into()),
                Outbound::msg("#a", "alan: hello"),
            ]
        );
        assert!(runtime.bot().loaded_plugins().is_empty());

        let saved = KeyValueStore::load(&runtime.config().storage.path).await.unwrap();
        assert_eq!(saved.get("greeter", "last").unwrap(), "alan");
    }

    /// Answers every join with a `joined` notification, like a server would.
    struct AnsweringTransport {
        inbound: mpsc::WeakSender<EventPayload>,
        joins: AtomicUsize,
    }

    #[async_trait]
    impl csbot_core::Transport for AnsweringTransport {
        async fn msg(&self, _target: &str, _message: &str) -> TransportResult<()> {
            Ok(())
        }

        async fn join(&self, channel: &str) -> TransportResult<()> {
            self.joins.fetch_add(1, Ordering::SeqCst);
            deliver(
                &self.inbound,
                EventPayload::Joined {
                    channel: channel.to_string(),
                },
            )
        }

        async fn leave(&self, _channel: &str) -> TransportResult<()> {
            Ok(())
        }

        async fn identify(&self, _nick: &str) -> TransportResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_answers_into_a_full_channel_do_not_stall_the_loop() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = inbound_channel();
        let transport = Arc::new(AnsweringTransport {
            inbound: tx.downgrade(),
            joins: AtomicUsize::new(0),
        });
        let runtime = BotRuntime::builder()
            .without_env()
            .config_file(write_config(dir.path()))
            .catalog(PluginCatalog::empty())
            .start(transport.clone())
            .await
            .unwrap();

        for _ in 0..INBOUND_CAPACITY {
            tx.send(EventPayload::SignedOn).await.unwrap();
        }

        // Every sign-on joins #a and #b, and every join is answered.
        let expected = INBOUND_CAPACITY as u64 * 3;
        let bot = runtime.bot().clone();
        let all_processed = async move {
            while bot.stats().events < expected {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };

        tokio::time::timeout(Duration::from_secs(10), runtime.run_until(rx, all_processed))
            .await
            .expect("run loop stalled")
            .unwrap();
        assert_eq!(transport.joins.load(Ordering::SeqCst), INBOUND_CAPACITY * 2);
        drop(tx);
    }

    #[tokio::test]
    async fn test_deliver_never_waits_for_room() {
        let (tx, mut rx) = mpsc::channel(1);
        tx.send(EventPayload::Connected).await.unwrap();

        deliver(&tx.downgrade(), EventPayload::SignedOn).unwrap();

        assert!(matches!(rx.recv().await, Some(EventPayload::Connected)));
        assert!(matches!(rx.recv().await, Some(EventPayload::SignedOn)));

        let weak = tx.downgrade();
        drop(tx);
        assert!(matches!(
            deliver(&weak, EventPayload::SignedOn),
            Err(TransportError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_shutdown_future_stops_the_loop() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = BotRuntime::builder()
            .without_env()
            .config_file(write_config(dir.path()))
            .catalog(PluginCatalog::empty())
            .start(RecordingTransport::new())
            .await
            .unwrap();

        let (_tx, rx) = inbound_channel();
        runtime.run_until(rx, async {}).await.unwrap();
    }
}
