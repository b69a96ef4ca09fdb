//! Command parsing and the [`CommandEvent`] handed to command handlers.
//!
//! A chat line becomes a command when:
//!
//! - in a channel, it starts with the configured prefix (`!test foo`), or with
//!   the bot's nick immediately followed by one of `, : ; .`
//!   (`csyorkbot, test foo`), which marks the command as *direct*;
//! - in a private chat, always; private commands are always direct.
//!
//! The first whitespace-delimited token is the command name and the rest of
//! the line is kept verbatim as the raw argument tail. The tail is tokenized
//! shell-style the first time [`CommandEvent::args`] is called.

mod split;

pub use split::shell_split;

use std::fmt;
use std::sync::OnceLock;

use tracing::warn;

use crate::error::{CommandError, TransportResult};
use crate::event::MessageData;
use crate::transport::{BoxedTransport, is_channel, nick};

/// Characters that may follow the bot's nick to address it directly.
pub const ADDRESS_SEPARATORS: [char; 4] = [',', ':', ';', '.'];

/// A command parsed from a chat line, before it is bound to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    /// The command name, without any trigger characters.
    pub command: String,
    /// Whether the bot was addressed by nick or in private chat.
    pub direct: bool,
    /// Everything after the command name, verbatim.
    pub raw_args: String,
}

/// Attempts to parse a command out of `message`.
///
/// Returns `None` when the line is not a command.
pub fn parse_command(channel: &str, message: &str, prefix: &str, nickname: &str) -> Option<ParsedCommand> {
    let (text, direct) = if is_channel(channel) {
        if !prefix.is_empty()
            && let Some(rest) = message.strip_prefix(prefix)
        {
            (rest, false)
        } else if let Some(rest) = message.strip_prefix(nickname)
            && rest.starts_with(ADDRESS_SEPARATORS)
        {
            (rest.trim_start_matches(ADDRESS_SEPARATORS), true)
        } else {
            return None;
        }
    } else {
        (message, true)
    };

    let text = text.trim_start();
    if text.is_empty() {
        return None;
    }

    let split_at = text.find(char::is_whitespace).unwrap_or(text.len());
    let (command, raw_args) = text.split_at(split_at);

    Some(ParsedCommand {
        command: command.to_string(),
        direct,
        raw_args: raw_args.to_string(),
    })
}

// ============================================================================
// CommandEvent
// ============================================================================

/// A command invocation, as seen by a command handler.
#[derive(Clone)]
pub struct CommandEvent {
    user: String,
    channel: String,
    command: String,
    direct: bool,
    raw_args: String,
    args: OnceLock<Vec<String>>,
    transport: BoxedTransport,
}

impl CommandEvent {
    /// Builds a command event from an already parsed command.
    pub fn new(
        user: impl Into<String>,
        channel: impl Into<String>,
        parsed: ParsedCommand,
        transport: BoxedTransport,
    ) -> Self {
        Self {
            user: user.into(),
            channel: channel.into(),
            command: parsed.command,
            direct: parsed.direct,
            raw_args: parsed.raw_args,
            args: OnceLock::new(),
            transport,
        }
    }

    /// Attempts to create a command event from a received message.
    pub fn from_message(
        message: &MessageData,
        prefix: &str,
        nickname: &str,
        transport: BoxedTransport,
    ) -> Option<Self> {
        let parsed = parse_command(&message.channel, &message.message, prefix, nickname)?;
        Some(Self::new(&message.user, &message.channel, parsed, transport))
    }

    /// Full user string of the invoking user.
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Nick of the invoking user.
    pub fn nick(&self) -> &str {
        nick(&self.user)
    }

    /// Channel the command was received on (the bot's nick in private chat).
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Whether the command arrived in a private chat.
    pub fn is_private(&self) -> bool {
        !is_channel(&self.channel)
    }

    /// The command name.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Whether the bot was addressed directly (by nick or in private chat).
    pub fn is_direct(&self) -> bool {
        self.direct
    }

    /// The argument tail, exactly as received.
    pub fn raw_args(&self) -> &str {
        &self.raw_args
    }

    /// The transport to reply through.
    pub fn transport(&self) -> &BoxedTransport {
        &self.transport
    }

    /// The argument list, tokenized shell-style on first access.
    ///
    /// If the tail has unmatched quotation marks the invoking user is told so
    /// (see [`error`](Self::error)) and the error is returned, letting the
    /// handler bail out with `?`.
    pub async fn args(&self) -> Result<&[String], CommandError> {
        if let Some(args) = self.args.get() {
            return Ok(args);
        }

        match shell_split(&self.raw_args) {
            Ok(args) => Ok(self.args.get_or_init(|| args)),
            Err(e) => {
                if let Err(send_err) = self.error(&e).await {
                    warn!(error = %send_err, "Failed to report argument error");
                }
                Err(e)
            }
        }
    }

    /// Sends a reply.
    ///
    /// In private chat the user is messaged directly; in a channel the reply
    /// goes to the channel, addressed to the user by nick.
    pub async fn reply(&self, message: impl AsRef<str>) -> TransportResult<()> {
        self.send_reply(message.as_ref(), false).await
    }

    /// Sends a reply that is suppressed in channels unless the command was
    /// direct.
    pub async fn reply_verbose(&self, message: impl AsRef<str>) -> TransportResult<()> {
        self.send_reply(message.as_ref(), true).await
    }

    /// Logs `err` and reports it to the user as `Error: <err>`.
    ///
    /// The report is only visible when the command was direct, so prefix
    /// collisions in busy channels do not produce noise.
    pub async fn error(&self, err: impl fmt::Display) -> TransportResult<()> {
        let message = err.to_string();
        warn!(
            command = %self.command,
            user = %self.user,
            channel = %self.channel,
            direct = self.direct,
            "{message}"
        );
        self.reply_verbose(format!("Error: {message}")).await
    }

    async fn send_reply(&self, message: &str, verbose: bool) -> TransportResult<()> {
        if self.is_private() {
            self.transport.msg(self.nick(), message).await
        } else if self.direct || !verbose {
            let addressed = format!("{}: {}", self.nick(), message);
            self.transport.msg(&self.channel, &addressed).await
        } else {
            Ok(())
        }
    }
}

impl fmt::Debug for CommandEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandEvent")
            .field("user", &self.user)
            .field("channel", &self.channel)
            .field("command", &self.command)
            .field("direct", &self.direct)
            .field("raw_args", &self.raw_args)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::testing::{Outbound, RecordingTransport};

    const NICK: &str = "csbot";

    fn parse(channel: &str, message: &str) -> Option<ParsedCommand> {
        parse_command(channel, message, "!", NICK)
    }

    #[test]
    fn test_prefix_command_in_channel() {
        let cmd = parse("#cs-york", "!test foo bar").unwrap();
        assert_eq!(cmd.command, "test");
        assert_eq!(cmd.raw_args, " foo bar");
        assert!(!cmd.direct);
    }

    #[test]
    fn test_addressed_command_in_channel() {
        let cmd = parse("#cs-york", "csbot, test foo").unwrap();
        assert_eq!(cmd.command, "test");
        assert_eq!(cmd.raw_args, " foo");
        assert!(cmd.direct);

        let cmd = parse("#cs-york", "csbot:;test").unwrap();
        assert_eq!(cmd.command, "test");
        assert_eq!(cmd.raw_args, "");
    }

    #[test]
    fn test_nick_without_separator_is_not_a_command() {
        assert_eq!(parse("#cs-york", "csbot is great"), None);
        assert_eq!(parse("#cs-york", "csbotty, test"), None);
        assert_eq!(parse("#cs-york", "hello there"), None);
    }

    #[test]
    fn test_private_chat_is_always_direct() {
        let cmd = parse(NICK, "test foo").unwrap();
        assert_eq!(cmd.command, "test");
        assert!(cmd.direct);

        // The prefix is not stripped in private chat.
        let cmd = parse(NICK, "!test").unwrap();
        assert_eq!(cmd.command, "!test");
    }

    #[test]
    fn test_empty_commands_are_ignored() {
        assert_eq!(parse("#cs-york", "!"), None);
        assert_eq!(parse("#cs-york", "!   "), None);
        assert_eq!(parse("#cs-york", "csbot, "), None);
        assert_eq!(parse(NICK, "  \t "), None);
    }

    #[test]
    fn test_raw_tail_is_verbatim() {
        let cmd = parse("#cs-york", "!echo   spaced  out  ").unwrap();
        assert_eq!(cmd.command, "echo");
        assert_eq!(cmd.raw_args, "   spaced  out  ");
    }

    fn event(channel: &str, message: &str, transport: &Arc<RecordingTransport>) -> CommandEvent {
        let data = MessageData {
            user: "alan!~alan@example.com".into(),
            channel: channel.into(),
            message: message.into(),
        };
        CommandEvent::from_message(&data, "!", NICK, transport.clone()).unwrap()
    }

    #[tokio::test]
    async fn test_args_are_tokenized_lazily() {
        let transport = RecordingTransport::new();
        let cmd = event("#cs-york", r#"!test foo "bar baz""#, &transport);
        assert_eq!(cmd.args().await.unwrap(), ["foo", "bar baz"]);
        // Cached on second access.
        assert_eq!(cmd.args().await.unwrap().len(), 2);
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_unmatched_quote_notifies_direct_user() {
        let transport = RecordingTransport::new();
        let cmd = event(NICK, r#"test "foo"#, &transport);
        assert_eq!(cmd.args().await, Err(CommandError::UnmatchedQuote));
        assert_eq!(
            transport.sent(),
            vec![Outbound::msg("alan", "Error: Unmatched quotation marks")]
        );
    }

    #[tokio::test]
    async fn test_errors_are_suppressed_for_indirect_commands() {
        let transport = RecordingTransport::new();
        let cmd = event("#cs-york", r#"!test "foo"#, &transport);
        assert!(cmd.args().await.is_err());
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_reply_addresses_user_in_channel() {
        let transport = RecordingTransport::new();
        let cmd = event("#cs-york", "!test", &transport);
        cmd.reply("hi").await.unwrap();
        cmd.reply_verbose("hidden").await.unwrap();
        assert_eq!(transport.sent(), vec![Outbound::msg("#cs-york", "alan: hi")]);
    }
}
