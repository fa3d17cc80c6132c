//! Inbound event filter.
//!
//! Decides, for every event the session delivers, whether it is forwarded to
//! the relay bus, turned into a join/leave notice, or dropped. The checks run
//! in a fixed order and the first one that matches decides.

use crate::event::{self, LoopMarker, NativeEvent};
use chatrelay_core::{Event, Message};

/// Filter settings taken from configuration.
#[derive(Debug, Clone, Default)]
pub struct FilterOptions {
    /// Drop join/leave notices instead of forwarding them.
    pub no_send_join_part: bool,
    /// Drop edit notifications.
    pub edit_disable: bool,
}

/// Why an event was not forwarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    JoinLeaveSuppressed,
    EditDisabled,
    NoPost,
    OwnMessage,
    BotAccount,
    HasReactions,
    ForeignTeam,
    UnhandledEvent,
}

/// Outcome of classifying one event.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Translate the event and forward it.
    Forward,
    /// Forward this synthesized join/leave notice instead of the event.
    JoinLeave(Message),
    /// Do nothing.
    Drop(DropReason),
}

/// The ordered predicate chain.
///
/// Team scope and bot username are captured at connect time and never
/// change afterwards.
#[derive(Debug, Clone)]
pub struct InboundFilter {
    options: FilterOptions,
    marker: LoopMarker,
    team_id: String,
    bot_username: String,
    account: String,
}

impl InboundFilter {
    /// Create a filter for a connected session.
    pub fn new(
        options: FilterOptions,
        marker: LoopMarker,
        team_id: impl Into<String>,
        bot_username: impl Into<String>,
        account: impl Into<String>,
    ) -> Self {
        Self {
            options,
            marker,
            team_id: team_id.into(),
            bot_username: bot_username.into(),
            account: account.into(),
        }
    }

    /// Team the adapter is scoped to.
    pub fn team_id(&self) -> &str {
        &self.team_id
    }

    /// Classify an event.
    pub fn classify(&self, ev: &dyn NativeEvent) -> Verdict {
        // 1. join/leave notices
        if event::is_join_leave(ev.post_type()) {
            if self.options.no_send_join_part {
                return Verdict::Drop(DropReason::JoinLeaveSuppressed);
            }
            let notice = Message::new("system", ev.text(), ev.channel())
                .with_account(self.account.clone())
                .with_event(Event::JoinLeave);
            return Verdict::JoinLeave(notice);
        }

        // 2. edits, when disabled
        if ev.event_kind() == event::EVENT_POST_EDITED && self.options.edit_disable {
            return Verdict::Drop(DropReason::EditDisabled);
        }

        // 3. non-post events
        let Some(post) = ev.post() else {
            return Verdict::Drop(DropReason::NoPost);
        };

        // 4. our own output echoed back
        if self.marker.is_present(post.props) {
            return Verdict::Drop(DropReason::OwnMessage);
        }

        // 5. anything sent with the bot's credentials, once the bot is known
        if !self.bot_username.is_empty() && ev.username() == self.bot_username {
            return Verdict::Drop(DropReason::BotAccount);
        }

        // 6. reactions cannot be correlated with the original post yet
        if post.has_reactions {
            return Verdict::Drop(DropReason::HasReactions);
        }

        // 7. other teams
        if ev.team_id() != Some(self.team_id.as_str()) {
            return Verdict::Drop(DropReason::ForeignTeam);
        }

        // 8. only posts, edits and deletes
        if !matches!(
            ev.event_kind(),
            event::EVENT_POSTED | event::EVENT_POST_EDITED | event::EVENT_POST_DELETED
        ) {
            return Verdict::Drop(DropReason::UnhandledEvent);
        }

        Verdict::Forward
    }
}
