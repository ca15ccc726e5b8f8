//! Gateway intents: the event categories requested at IDENTIFY time.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProtoError;

/// Bitmask of requested gateway intents.
///
/// Bits 12 through 14 are reserved and never set by this type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u64", into = "u64")]
pub struct Intents(u64);

impl Intents {
    /// Guild lifecycle events.
    pub const GUILDS: Self = Self(1 << 0);
    /// Guild member events.
    pub const MEMBERS: Self = Self(1 << 1);
    /// Ban events.
    pub const BANS: Self = Self(1 << 2);
    /// Emoji and sticker events.
    pub const EMOJIS: Self = Self(1 << 3);
    /// Integration events.
    pub const INTEGRATIONS: Self = Self(1 << 4);
    /// Webhook events.
    pub const WEBHOOKS: Self = Self(1 << 5);
    /// Invite events.
    pub const INVITES: Self = Self(1 << 6);
    /// Voice state events.
    pub const VOICE_STATES: Self = Self(1 << 7);
    /// Presence events.
    pub const PRESENCES: Self = Self(1 << 8);
    /// Guild message events.
    pub const MESSAGES: Self = Self(1 << 9);
    /// Guild message reaction events.
    pub const REACTIONS: Self = Self(1 << 10);
    /// Typing events.
    pub const TYPING: Self = Self(1 << 11);
    /// Access to message content.
    pub const MESSAGE_CONTENT: Self = Self(1 << 15);

    const NAMED: [(&'static str, Self); 13] = [
        ("guilds", Self::GUILDS),
        ("members", Self::MEMBERS),
        ("bans", Self::BANS),
        ("emojis", Self::EMOJIS),
        ("integrations", Self::INTEGRATIONS),
        ("webhooks", Self::WEBHOOKS),
        ("invites", Self::INVITES),
        ("voice_states", Self::VOICE_STATES),
        ("presences", Self::PRESENCES),
        ("messages", Self::MESSAGES),
        ("reactions", Self::REACTIONS),
        ("typing", Self::TYPING),
        ("message_content", Self::MESSAGE_CONTENT),
    ];

    /// No intents.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Every known intent.
    #[must_use]
    pub const fn all() -> Self {
        let mut bits = 0;
        let mut i = 0;
        while i < Self::NAMED.len() {
            bits |= Self::NAMED[i].1.0;
            i += 1;
        }
        Self(bits)
    }

    /// The raw bitmask sent on the wire.
    #[must_use]
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Build from raw bits, dropping anything that is not a known intent.
    #[must_use]
    pub const fn from_bits_truncate(bits: u64) -> Self {
        Self(bits & Self::all().0)
    }

    /// Whether every intent in `other` is also set here.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether no intent is set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Parse a list of intent names such as `["messages", "message_content"]`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtoError::UnknownIntent`] for the first unrecognised name.
    pub fn from_names<I, S>(names: I) -> Result<Self, ProtoError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .try_fold(Self::empty(), |acc, name| Ok(acc | name.as_ref().parse::<Self>()?))
    }

    /// Names of the intents that are set, in bit order.
    pub fn names(self) -> impl Iterator<Item = &'static str> {
        Self::NAMED
            .into_iter()
            .filter(move |(_, flag)| self.contains(*flag))
            .map(|(name, _)| name)
    }
}

impl From<u64> for Intents {
    fn from(bits: u64) -> Self {
        Self::from_bits_truncate(bits)
    }
}

impl From<Intents> for u64 {
    fn from(intents: Intents) -> Self {
        intents.0
    }
}

/// Guild messages only.
impl Default for Intents {
    fn default() -> Self {
        Self::MESSAGES
    }
}

impl FromStr for Intents {
    type Err = ProtoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::NAMED
            .iter()
            .find(|(name, _)| *name == wanted)
            .map(|(_, flag)| *flag)
            .ok_or_else(|| ProtoError::UnknownIntent(s.to_string()))
    }
}

impl BitOr for Intents {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Intents {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for Intents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Intents")
            .field(&self.names().collect::<Vec<_>>())
            .finish()
    }
}
