//! Channel selection and per-channel message formatting.
//!
//! ```text
//! (message, urgency, recipient, context)
//!        │
//!        ├─► select_for ─► {channels}
//!        └─► format (per channel) ─► Notification
//! ```

mod channels;
mod formatter;
mod selector;

pub use channels::{ChannelCatalog, ChannelRole, ChannelSpec, RenderStyle};
pub use formatter::format;
pub use selector::{select, select_for};

use crate::models::{Notification, Recipient, RequestContext, Urgency};
use chrono::Utc;

/// Builds an immutable notification: selects channels, renders each.
#[must_use]
pub fn render(
    catalog: &ChannelCatalog,
    message: &str,
    recipient: Recipient,
    urgency: Urgency,
    ctx: &RequestContext,
) -> Notification {
    let rendered = select_for(catalog, &recipient, urgency, ctx)
        .into_iter()
        .filter_map(|channel| {
            catalog
                .spec(channel)
                .map(|spec| (channel, format(message, spec, urgency)))
        })
        .collect();

    Notification {
        id: uuid::Uuid::now_v7().to_string(),
        recipient,
        urgency,
        rendered,
        created_at: Utc::now(),
    }
}
