use std::sync::Arc;

use csbot_core::prelude::*;
use tracing::info;

#[derive(Debug, Clone, Copy)]
enum Action {
    Load,
    Unload,
    Reload,
}

/// Chat commands for managing plugins at runtime.
pub struct Admin {
    ctx: PluginContext,
}

impl Admin {
    async fn list(self: Arc<Self>, cmd: CommandEvent) -> HandlerResult {
        let Some(bot) = self.ctx.bot() else {
            return Ok(());
        };
        cmd.reply(format!("loaded: {}", bot.loaded_plugins().join(", ")))
            .await?;
        cmd.reply(format!("available: {}", bot.plugins().available().join(", ")))
            .await?;
        Ok(())
    }

    async fn load(self: Arc<Self>, cmd: CommandEvent) -> HandlerResult {
        self.run(cmd, Action::Load).await
    }

    async fn unload(self: Arc<Self>, cmd: CommandEvent) -> HandlerResult {
        self.run(cmd, Action::Unload).await
    }

    async fn reload(self: Arc<Self>, cmd: CommandEvent) -> HandlerResult {
        self.run(cmd, Action::Reload).await
    }

    async fn run(&self, cmd: CommandEvent, action: Action) -> HandlerResult {
        let Some(bot) = self.ctx.bot() else {
            return Ok(());
        };
        let Ok(args) = cmd.args().await else {
            return Ok(());
        };
        let Some(name) = args.first() else {
            cmd.error("You need to tell me which plugin!").await?;
            return Ok(());
        };

        let (result, done) = match action {
            Action::Load => (bot.load_plugin(name).await, "loaded"),
            Action::Unload => (bot.unload_plugin(name).await, "unloaded"),
            Action::Reload => (bot.reload_plugin(name).await, "reloaded"),
        };
        match result {
            Ok(()) => {
                info!(plugin = %name, user = %cmd.user(), ?action, "Plugin {done} on request");
                cmd.reply(format!("{name} {done}")).await?;
            }
            Err(e) => cmd.error(e).await?,
        }
        Ok(())
    }
}

#[async_trait]
impl Plugin for Admin {
    fn name() -> &'static str {
        "plugins"
    }

    fn declare(features: &mut PluginFeatures<Self>) -> RegistryResult<()> {
        features
            .command("plugins.list", Self::list)?
            .command("plugins.load", Self::load)?
            .command("plugins.unload", Self::unload)?
            .command("plugins.reload", Self::reload)?;
        Ok(())
    }

    fn create(ctx: PluginContext) -> Self {
        Admin { ctx }
    }
}

#[cfg(test)]
mod tests {
    use csbot_core::PluginSource;
    use csbot_core::testing::Outbound;

    use super::*;
    use crate::Example;
    use crate::testutil::{NICK, bot, message};

    fn admin_bot() -> (Arc<Bot>, Arc<csbot_core::testing::RecordingTransport>) {
        bot(
            ConfigStore::with_defaults(),
            [PluginSource::of::<Admin>(), PluginSource::of::<Example>()],
        )
    }

    #[tokio::test]
    async fn test_load_and_unload_from_chat() {
        let (bot, transport) = admin_bot();
        bot.load_plugin("plugins").await.unwrap();

        bot.notify(message("alan", NICK, "plugins.load Example")).await;
        assert_eq!(bot.loaded_plugins(), vec!["plugins", "example"]);
        bot.notify(message("alan", NICK, "plugins.list")).await;
        bot.notify(message("alan", NICK, "plugins.unload example")).await;
        assert_eq!(bot.loaded_plugins(), vec!["plugins"]);

        assert_eq!(
            transport.sent(),
            vec![
                Outbound::msg("alan", "Example loaded"),
                Outbound::msg("alan", "loaded: plugins, example"),
                Outbound::msg("alan", "available: example, plugins"),
                Outbound::msg("alan", "example unloaded"),
            ]
        );
    }

    #[tokio::test]
    async fn test_lifecycle_errors_are_reported() {
        let (bot, transport) = admin_bot();
        bot.load_plugin("plugins").await.unwrap();

        bot.notify(message("alan", NICK, "plugins.reload example")).await;
        bot.notify(message("alan", NICK, "plugins.load plugins")).await;
        bot.notify(message("alan", NICK, "plugins.load")).await;

        let sent = transport.messages();
        assert_eq!(sent.len(), 3);
        assert!(sent.iter().all(|(_, text)| text.starts_with("Error: ")));
        assert_eq!(sent[2].1, "Error: You need to tell me which plugin!");
    }

    #[tokio::test]
    async fn test_reload_replaces_running_instance() {
        let (bot, transport) = admin_bot();
        bot.load_plugin("plugins").await.unwrap();
        bot.load_plugin("example").await.unwrap();

        bot.notify(message("alan", NICK, "plugins.reload example")).await;

        assert_eq!(bot.loaded_plugins(), vec!["plugins", "example"]);
        assert_eq!(transport.sent(), vec![Outbound::msg("alan", "example reloaded")]);
    }
}
