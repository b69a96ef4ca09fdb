//! The outbound side of the chat-network transport.
//!
//! The transport itself (connection, framing, reconnects) lives outside the
//! core. The core only needs a handle it can issue outbound actions through,
//! which is what [`Transport`] describes. Every [`Event`](crate::Event)
//! carries a [`BoxedTransport`] so handlers can reply without reaching back
//! into the bot.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::TransportResult;

/// Outbound actions the core can request from the transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `message` to a channel or nick.
    async fn msg(&self, target: &str, message: &str) -> TransportResult<()>;

    /// Joins `channel`.
    async fn join(&self, channel: &str) -> TransportResult<()>;

    /// Leaves `channel`.
    async fn leave(&self, channel: &str) -> TransportResult<()>;

    /// Asks the network which account `nick` is identified to.
    ///
    /// The answer arrives later as a
    /// [`UserIdentified`](crate::EventPayload::UserIdentified) notification.
    async fn identify(&self, nick: &str) -> TransportResult<()>;
}

/// A shared transport handle.
pub type BoxedTransport = Arc<dyn Transport>;

/// Gets the nick from a user string.
///
/// ```
/// assert_eq!(csbot_core::transport::nick("csyorkbot!~csbot@example.com"), "csyorkbot");
/// ```
pub fn nick(user: &str) -> &str {
    user.split_once('!').map_or(user, |(nick, _)| nick)
}

/// Gets the username from a user string, or `None` if it has no `~user@` part.
///
/// ```
/// assert_eq!(csbot_core::transport::username("csyorkbot!~csbot@example.com"), Some("csbot"));
/// ```
pub fn username(user: &str) -> Option<&str> {
    let (rest, _) = user.rsplit_once('@')?;
    rest.rsplit_once('~').map(|(_, name)| name)
}

/// Gets the hostname from a user string.
///
/// ```
/// assert_eq!(csbot_core::transport::host("csyorkbot!~csbot@example.com"), Some("example.com"));
/// ```
pub fn host(user: &str) -> Option<&str> {
    user.rsplit_once('@').map(|(_, host)| host)
}

/// Checks whether `target` names a channel rather than a private chat.
pub fn is_channel(target: &str) -> bool {
    target.starts_with('#')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_string_parts() {
        let user = "csyorkbot!~csbot@example.com";
        assert_eq!(nick(user), "csyorkbot");
        assert_eq!(username(user), Some("csbot"));
        assert_eq!(host(user), Some("example.com"));
    }

    #[test]
    fn test_bare_nick() {
        assert_eq!(nick("alan"), "alan");
        assert_eq!(username("alan"), None);
        assert_eq!(host("alan"), None);
    }

    #[test]
    fn test_is_channel() {
        assert!(is_channel("#cs-york"));
        assert!(!is_channel("csyorkbot"));
    }
}
