//! Deciding whether a message is addressed to the bot.
//!
//! Runs before any command matching. Only message events pass through here;
//! lifecycle and error events never reach it.

use herald_core::{BotIdentity, MessageEvent};

/// Why a message is, or is not, routed to the command router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    /// Sent by the bot itself. Never routed.
    FromSelf,
    /// A direct message to the bot.
    Direct,
    /// The text contains the bot's mention token.
    Mentioned,
    /// Neither direct nor mentioning the bot.
    NotAddressed,
}

impl Eligibility {
    /// Returns `true` if the message should be handed to the router.
    pub fn is_routable(self) -> bool {
        matches!(self, Self::Direct | Self::Mentioned)
    }
}

/// Classifies a message's eligibility for command routing.
///
/// A direct message that opens with the mention token counts as
/// [`Eligibility::Mentioned`], so the router strips the token before matching.
pub fn eligibility(msg: &MessageEvent, bot: &BotIdentity) -> Eligibility {
    if msg.sender == bot.user_id {
        return Eligibility::FromSelf;
    }

    let token = bot.mention_token();
    if msg.text.trim_start().starts_with(&token) {
        return Eligibility::Mentioned;
    }
    if msg.is_direct() {
        return Eligibility::Direct;
    }
    if msg.text.contains(&token) {
        return Eligibility::Mentioned;
    }

    Eligibility::NotAddressed
}

/// Returns `true` if the message should be routed to commands.
pub fn should_route(msg: &MessageEvent, bot: &BotIdentity) -> bool {
    eligibility(msg, bot).is_routable()
}

/// Removes a leading mention token, plus any `:`/`,` and whitespace after it.
///
/// Text that does not open with the mention is returned unchanged.
pub fn strip_mention<'a>(text: &'a str, bot: &BotIdentity) -> &'a str {
    match text.trim_start().strip_prefix(&bot.mention_token()) {
        Some(rest) => rest.trim_start_matches(|c: char| c == ':' || c == ',' || c.is_whitespace()),
        None => text,
    }
}
