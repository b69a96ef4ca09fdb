//! Typed events flowing through the dispatcher.
//!
//! The transport delivers [`EventPayload`]s; the [`Bot`](crate::Bot) wraps
//! each one in an [`Event`] that also carries the transport handle and the
//! time the notification was received. Hooks are registered per
//! [`EventKind`].

use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;

use crate::command::CommandEvent;
use crate::transport::BoxedTransport;

// ============================================================================
// Event Kind
// ============================================================================

/// Classification of events; also the hook names plugins register against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    /// The transport connected.
    Connected,
    /// The transport lost its connection.
    Disconnected,
    /// Registration with the network completed.
    SignedOn,
    /// A message arrived in a channel or private chat.
    Message,
    /// A notice arrived.
    Notice,
    /// An action (`/me`) arrived.
    Action,
    /// The bot joined a channel.
    Joined,
    /// The bot left a channel.
    Left,
    /// Another user joined a channel.
    UserJoined,
    /// Another user left a channel.
    UserLeft,
    /// Another user quit the network.
    UserQuit,
    /// The full membership list of a channel arrived.
    Names,
    /// The network answered an identify request.
    UserIdentified,
    /// A command was parsed from a message.
    Command,
}

impl EventKind {
    /// Every kind, in declaration order.
    pub const ALL: [EventKind; 14] = [
        Self::Connected,
        Self::Disconnected,
        Self::SignedOn,
        Self::Message,
        Self::Notice,
        Self::Action,
        Self::Joined,
        Self::Left,
        Self::UserJoined,
        Self::UserLeft,
        Self::UserQuit,
        Self::Names,
        Self::UserIdentified,
        Self::Command,
    ];

    /// Returns the hook name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::SignedOn => "signed_on",
            Self::Message => "message",
            Self::Notice => "notice",
            Self::Action => "action",
            Self::Joined => "joined",
            Self::Left => "left",
            Self::UserJoined => "user_joined",
            Self::UserLeft => "user_left",
            Self::UserQuit => "user_quit",
            Self::Names => "names",
            Self::UserIdentified => "user_identified",
            Self::Command => "command",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name an [`EventKind`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event kind '{0}'")]
pub struct UnknownEventKind(pub String);

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == lowered)
            .ok_or_else(|| UnknownEventKind(s.to_string()))
    }
}

// ============================================================================
// Payloads
// ============================================================================

/// A message, notice or action received from a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageData {
    /// Full user string of the sender (`nick!~user@host`).
    pub user: String,
    /// Channel the message was sent to; the bot's nick for private chats.
    pub channel: String,
    /// Message contents.
    pub message: String,
}

/// Kind-specific data of an [`Event`].
#[derive(Debug, Clone)]
pub enum EventPayload {
    /// The transport connected.
    Connected,
    /// The transport lost its connection.
    Disconnected {
        /// Reason given by the transport, if any.
        reason: Option<String>,
    },
    /// Registration with the network completed.
    SignedOn,
    /// A message arrived.
    Message(MessageData),
    /// A notice arrived.
    Notice(MessageData),
    /// An action arrived.
    Action(MessageData),
    /// The bot joined `channel`.
    Joined {
        /// The channel.
        channel: String,
    },
    /// The bot left `channel`.
    Left {
        /// The channel.
        channel: String,
    },
    /// `user` joined `channel`.
    UserJoined {
        /// Full user string.
        user: String,
        /// The channel.
        channel: String,
    },
    /// `user` left `channel`.
    UserLeft {
        /// Full user string.
        user: String,
        /// The channel.
        channel: String,
    },
    /// `user` quit the network.
    UserQuit {
        /// Full user string.
        user: String,
        /// Quit message.
        message: String,
    },
    /// Membership list of `channel`.
    Names {
        /// The channel.
        channel: String,
        /// Nicks present in the channel.
        names: Vec<String>,
    },
    /// Answer to an identify request.
    UserIdentified {
        /// Nick that was asked about.
        user: String,
        /// Account the nick is identified to, or `None`.
        account: Option<String>,
    },
    /// A command parsed from a message.
    Command(CommandEvent),
}

impl EventPayload {
    /// Returns the kind of this payload.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Connected => EventKind::Connected,
            Self::Disconnected { .. } => EventKind::Disconnected,
            Self::SignedOn => EventKind::SignedOn,
            Self::Message(_) => EventKind::Message,
            Self::Notice(_) => EventKind::Notice,
            Self::Action(_) => EventKind::Action,
            Self::Joined { .. } => EventKind::Joined,
            Self::Left { .. } => EventKind::Left,
            Self::UserJoined { .. } => EventKind::UserJoined,
            Self::UserLeft { .. } => EventKind::UserLeft,
            Self::UserQuit { .. } => EventKind::UserQuit,
            Self::Names { .. } => EventKind::Names,
            Self::UserIdentified { .. } => EventKind::UserIdentified,
            Self::Command(_) => EventKind::Command,
        }
    }
}

// ============================================================================
// Event
// ============================================================================

/// An event queued on the dispatcher.
///
/// Cloning is cheap enough to hand every hook its own copy.
#[derive(Clone)]
pub struct Event {
    payload: EventPayload,
    transport: BoxedTransport,
    received_at: SystemTime,
}

impl Event {
    /// Wraps `payload`, stamping it with the current time.
    pub fn new(payload: EventPayload, transport: BoxedTransport) -> Self {
        Self {
            payload,
            transport,
            received_at: SystemTime::now(),
        }
    }

    /// Returns the kind of this event.
    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    /// Returns the kind-specific data.
    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    /// Returns the transport the event arrived on.
    pub fn transport(&self) -> &BoxedTransport {
        &self.transport
    }

    /// Returns when the underlying notification was received.
    pub fn received_at(&self) -> SystemTime {
        self.received_at
    }

    /// Returns the message data for message, notice and action events.
    pub fn message(&self) -> Option<&MessageData> {
        match &self.payload {
            EventPayload::Message(m) | EventPayload::Notice(m) | EventPayload::Action(m) => {
                Some(m)
            }
            _ => None,
        }
    }

    /// Returns the command for command events.
    pub fn command(&self) -> Option<&CommandEvent> {
        match &self.payload {
            EventPayload::Command(cmd) => Some(cmd),
            _ => None,
        }
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("kind", &self.kind())
            .field("payload", &self.payload)
            .finish()
    }
}
