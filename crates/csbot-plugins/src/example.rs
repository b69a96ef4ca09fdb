use std::sync::Arc;

use csbot_core::prelude::*;
use tracing::debug;

/// Demonstrates commands, options and hooks.
pub struct Example {
    ctx: PluginContext,
}

impl Example {
    async fn test(self: Arc<Self>, cmd: CommandEvent) -> HandlerResult {
        let Ok(args) = cmd.args().await else {
            return Ok(());
        };
        cmd.reply(format!(
            "test invoked: {}, {}, {:?}, {}",
            cmd.user(),
            cmd.channel(),
            args,
            cmd.raw_args().trim_start()
        ))
        .await?;
        Ok(())
    }

    async fn cfg(self: Arc<Self>, cmd: CommandEvent) -> HandlerResult {
        let Ok(args) = cmd.args().await else {
            return Ok(());
        };
        let Some(key) = args.first() else {
            cmd.error("You need to tell me what to look for!").await?;
            return Ok(());
        };

        match self.ctx.cfg(key) {
            Ok(value) => cmd.reply(format!("{key} = {value}")).await?,
            Err(_) => cmd.error(format!("I don't know a {key}")).await?,
        }
        Ok(())
    }

    async fn on_message(self: Arc<Self>, event: Event) -> HandlerResult {
        if let Some(msg) = event.message() {
            debug!(channel = %msg.channel, ">>> {}", msg.message);
        }
        Ok(())
    }

    async fn on_action(self: Arc<Self>, event: Event) -> HandlerResult {
        if let Some(msg) = event.message() {
            debug!(channel = %msg.channel, "* {}", msg.message);
        }
        Ok(())
    }
}

#[async_trait]
impl Plugin for Example {
    fn name() -> &'static str {
        "example"
    }

    fn declare(features: &mut PluginFeatures<Self>) -> RegistryResult<()> {
        features
            .command("test", Self::test)?
            .command("cfg", Self::cfg)?;
        features
            .hook(EventKind::Message, Self::on_message)
            .hook(EventKind::Action, Self::on_action);
        Ok(())
    }

    fn create(ctx: PluginContext) -> Self {
        Example { ctx }
    }
}

#[cfg(test)]
mod tests {
    use csbot_core::PluginSource;
    use csbot_core::testing::Outbound;

    use super::*;
    use crate::testutil::{NICK, bot, message};

    #[tokio::test]
    async fn test_reports_parsed_invocation() {
        let (bot, transport) = bot(ConfigStore::with_defaults(), [PluginSource::of::<Example>()]);
        bot.load_plugin("example").await.unwrap();

        bot.notify(message("alan", "#cs-york", "!test foo  \"bar baz\""))
            .await;

        assert_eq!(
            transport.sent(),
            vec![Outbound::msg(
                "#cs-york",
                "alan: test invoked: alan!~alan@example.com, #cs-york, [\"foo\", \"bar baz\"], foo  \"bar baz\""
            )]
        );
    }

    #[tokio::test]
    async fn test_cfg_falls_back_to_default_section() {
        let mut config = ConfigStore::with_defaults();
        config.set("example", "greeting", "hello");
        let (bot, transport) = bot(config, [PluginSource::of::<Example>()]);
        bot.load_plugin("example").await.unwrap();

        bot.notify(message("alan", NICK, "cfg greeting")).await;
        bot.notify(message("alan", NICK, "cfg port")).await;
        bot.notify(message("alan", NICK, "cfg colour")).await;
        bot.notify(message("alan", NICK, "cfg")).await;

        assert_eq!(
            transport.sent(),
            vec![
                Outbound::msg("alan", "greeting = hello"),
                Outbound::msg("alan", "port = 6667"),
                Outbound::msg("alan", "Error: I don't know a colour"),
                Outbound::msg("alan", "Error: You need to tell me what to look for!"),
            ]
        );
    }
}
