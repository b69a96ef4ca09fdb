use std::sync::Arc;

use csbot_core::Cancelled;
use csbot_core::prelude::*;
use csbot_core::transport::nick;
use tracing::{debug, warn};

/// Checks which account a nick is identified to.
///
/// Concurrent checks of the same nick share one identify request; every
/// waiting invocation is answered when the network replies.
pub struct Auth {
    pending: CorrelationTable<String, Option<String>>,
}

impl Auth {
    async fn check(self: Arc<Self>, cmd: CommandEvent) -> HandlerResult {
        let Ok(args) = cmd.args().await else {
            return Ok(());
        };
        let Some(target) = args.first().cloned() else {
            cmd.error("You need to tell me who to check!").await?;
            return Ok(());
        };

        let key = target.to_lowercase();
        let pending = self.pending.attach(key.clone());
        if pending.needs_request() {
            debug!(nick = %target, "Requesting identification");
            if let Err(e) = cmd.transport().identify(&target).await {
                warn!(nick = %target, error = %e, "Identification request failed");
                self.pending.cancel(&key);
            }
        }

        // Every waiter of a failed request, this one included, sees `Cancelled`.
        tokio::spawn(async move {
            let sent = match pending.resolved().await {
                Ok(Some(account)) => {
                    cmd.reply(format!("{target} is identified to account {account}"))
                        .await
                }
                Ok(None) => cmd.reply(format!("{target} is not identified")).await,
                Err(Cancelled) => cmd.error(format!("Could not check {target}")).await,
            };
            if let Err(e) = sent {
                warn!(nick = %target, error = %e, "Failed to report identification");
            }
        });
        Ok(())
    }

    async fn on_identified(self: Arc<Self>, event: Event) -> HandlerResult {
        let EventPayload::UserIdentified { user, account } = event.payload() else {
            return Ok(());
        };
        let waiters = self.pending.resolve(&nick(user).to_lowercase(), account.clone());
        debug!(nick = %user, account = ?account, waiters, "Identification resolved");
        Ok(())
    }
}

#[async_trait]
impl Plugin for Auth {
    fn name() -> &'static str {
        "auth"
    }

    fn declare(features: &mut PluginFeatures<Self>) -> RegistryResult<()> {
        features.command("auth.check", Self::check)?;
        features.hook(EventKind::UserIdentified, Self::on_identified);
        Ok(())
    }

    fn create(_ctx: PluginContext) -> Self {
        Auth {
            pending: CorrelationTable::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use csbot_core::PluginSource;
    use csbot_core::testing::Outbound;

    use super::*;
    use crate::testutil::{NICK, bot, message, wait_for_sent};

    fn identified(user: &str, account: Option<&str>) -> EventPayload {
        EventPayload::UserIdentified {
            user: user.into(),
            account: account.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_concurrent_checks_share_one_request() {
        let (bot, transport) = bot(ConfigStore::with_defaults(), [PluginSource::of::<Auth>()]);
        bot.load_plugin("auth").await.unwrap();

        bot.notify(message("alan", "#cs-york", "!auth.check Bob")).await;
        bot.notify(message("carol", NICK, "auth.check bob")).await;
        assert_eq!(transport.sent(), vec![Outbound::Identify("Bob".into())]);

        bot.notify(identified("bob", Some("bobby"))).await;
        wait_for_sent(&transport, 3).await;

        let mut replies = transport.sent().split_off(1);
        replies.sort_by_key(|o| format!("{o:?}"));
        assert_eq!(
            replies,
            vec![
                Outbound::msg("#cs-york", "alan: Bob is identified to account bobby"),
                Outbound::msg("carol", "bob is identified to account bobby"),
            ]
        );
    }

    #[tokio::test]
    async fn test_each_round_issues_a_new_request() {
        let (bot, transport) = bot(ConfigStore::with_defaults(), [PluginSource::of::<Auth>()]);
        bot.load_plugin("auth").await.unwrap();

        bot.notify(message("alan", NICK, "auth.check bob")).await;
        bot.notify(identified("bob", None)).await;
        wait_for_sent(&transport, 2).await;

        bot.notify(message("alan", NICK, "auth.check bob")).await;
        assert_eq!(
            transport.sent(),
            vec![
                Outbound::Identify("bob".into()),
                Outbound::msg("alan", "bob is not identified"),
                Outbound::Identify("bob".into()),
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_request_is_reported_to_the_waiter() {
        let (bot, transport) = bot(ConfigStore::with_defaults(), [PluginSource::of::<Auth>()]);
        bot.load_plugin("auth").await.unwrap();

        transport.refuse_identify(true);
        bot.notify(message("alan", NICK, "auth.check bob")).await;
        wait_for_sent(&transport, 1).await;
        assert_eq!(
            transport.sent(),
            vec![Outbound::msg("alan", "Error: Could not check bob")]
        );

        // The failed key is cleared, so the next check asks again.
        transport.refuse_identify(false);
        bot.notify(message("alan", NICK, "auth.check bob")).await;
        assert_eq!(transport.sent()[1], Outbound::Identify("bob".into()));
    }

    #[tokio::test]
    async fn test_unrequested_answers_are_ignored() {
        let (bot, transport) = bot(ConfigStore::with_defaults(), [PluginSource::of::<Auth>()]);
        bot.load_plugin("auth").await.unwrap();

        bot.notify(identified("dave", Some("dave"))).await;
        bot.notify(message("alan", NICK, "auth.check")).await;

        assert_eq!(
            transport.sent(),
            vec![Outbound::msg("alan", "Error: You need to tell me who to check!")]
        );
    }
}
