//! Channel declarations: role, length limit, style and applicability.

use crate::models::{Activity, Channel, RequestContext};
use std::collections::BTreeMap;

/// How a channel relates to the monitored person.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelRole {
    /// Always reachable, used at every urgency.
    PrimaryPersonal,
    /// Worn on the body, added from `elevated`.
    SecondaryPersonal,
    /// Part of the home, used when attended (`high`) or always (`critical`).
    Ambient,
}

/// Per-channel style transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStyle {
    /// Urgency tag prefix for non-standard urgencies.
    Tagged,
    /// Short form, truncated with an ellipsis.
    Truncate,
    /// Attention prefix on every message.
    AlertPrefix(&'static str),
    /// Spoken attention cue from `high`.
    Spoken,
}

/// Declared constraints of one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelSpec {
    /// The channel.
    pub channel: Channel,
    /// Role.
    pub role: ChannelRole,
    /// Maximum rendered length, in characters.
    pub max_len: usize,
    /// Style transform.
    pub style: RenderStyle,
}

impl ChannelSpec {
    /// Whether the context marks this channel as currently attended.
    ///
    /// A device is attended when it is listed as active, or when the detected
    /// activity implies it (watching TV attends the display, cooking attends the
    /// appliance display).
    #[must_use]
    pub fn is_attended(&self, ctx: &RequestContext) -> bool {
        if ctx.active_devices.contains(&self.channel) {
            return true;
        }
        matches!(
            (self.channel, ctx.activity),
            (Channel::Display, Some(Activity::WatchingTv))
                | (Channel::ApplianceDisplay, Some(Activity::Cooking))
        )
    }

    /// Whether the channel is personal (primary or secondary).
    #[must_use]
    pub const fn is_personal(&self) -> bool {
        matches!(
            self.role,
            ChannelRole::PrimaryPersonal | ChannelRole::SecondaryPersonal
        )
    }
}

/// The set of known channels and their declared constraints.
#[derive(Debug, Clone)]
pub struct ChannelCatalog {
    specs: BTreeMap<Channel, ChannelSpec>,
}

impl Default for ChannelCatalog {
    fn default() -> Self {
        let specs = [
            ChannelSpec {
                channel: Channel::Phone,
                role: ChannelRole::PrimaryPersonal,
                max_len: 480,
                style: RenderStyle::Tagged,
            },
            ChannelSpec {
                channel: Channel::Wearable,
                role: ChannelRole::SecondaryPersonal,
                max_len: 50,
                style: RenderStyle::Truncate,
            },
            ChannelSpec {
                channel: Channel::Display,
                role: ChannelRole::Ambient,
                max_len: 200,
                style: RenderStyle::AlertPrefix("ALERT: "),
            },
            ChannelSpec {
                channel: Channel::ApplianceDisplay,
                role: ChannelRole::Ambient,
                max_len: 80,
                style: RenderStyle::AlertPrefix("KITCHEN ALERT: "),
            },
            ChannelSpec {
                channel: Channel::AmbientSpeaker,
                role: ChannelRole::Ambient,
                max_len: 300,
                style: RenderStyle::Spoken,
            },
        ];
        Self {
            specs: specs.into_iter().map(|s| (s.channel, s)).collect(),
        }
    }
}

impl ChannelCatalog {
    /// Default catalog with per-channel length overrides applied.
    #[must_use]
    pub fn with_max_lengths(overrides: &BTreeMap<Channel, usize>) -> Self {
        let mut catalog = Self::default();
        for (channel, max_len) in overrides {
            if let Some(spec) = catalog.specs.get_mut(channel) {
                spec.max_len = *max_len;
            }
        }
        catalog
    }

    /// Declared constraints of a channel.
    #[must_use]
    pub fn spec(&self, channel: Channel) -> Option<&ChannelSpec> {
        self.specs.get(&channel)
    }

    /// All declared channels, in channel order.
    pub fn iter(&self) -> impl Iterator<Item = &ChannelSpec> {
        self.specs.values()
    }
}
