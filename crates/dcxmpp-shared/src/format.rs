//! Attribution formatting and nick validation.
//!
//! Every relayed message is prefixed with the sender's nick and the network
//! it came from, so readers on either side can tell who said what.

use crate::constants::MAX_NICK_LEN;

/// Text relayed from a DC group: `"{nick}[dc]:\n{text}"`.
pub fn dc_attribution(nick: &str, text: &str) -> String {
    format!("{nick}[dc]:\n{text}")
}

/// Text relayed from an XMPP room: `"{nick}[xmpp]:\n{body}"`.
pub fn xmpp_attribution(nick: &str, body: &str) -> String {
    format!("{nick}[xmpp]:\n{body}")
}

/// A nick is 1 to 30 ASCII letters or digits.
pub fn is_valid_nick(nick: &str) -> bool {
    !nick.is_empty()
        && nick.len() <= MAX_NICK_LEN
        && nick.bytes().all(|b| b.is_ascii_alphanumeric())
}
