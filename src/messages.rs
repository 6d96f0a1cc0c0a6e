//! Custom message-type tags used by the swap protocol family.
//!
//! Tags live in the odd custom-message range so channel peers that do not
//! speak the protocol ignore them. The transport routes inbound messages by
//! the lowercase hex rendering of the tag, which is what
//! [`to_hex_string`] produces and what handlers receive back.

pub const MESSAGE_TYPE_POLL: u32 = 0xa465;
pub const MESSAGE_TYPE_REQUEST_POLL: u32 = 0xa467;

/// Renders a message-type tag the way the transport keys handlers.
pub fn to_hex_string(message_type: u32) -> String {
    format!("{message_type:x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_tags_are_lowercase_and_stable() {
        assert_eq!(to_hex_string(MESSAGE_TYPE_POLL), "a465");
        assert_eq!(to_hex_string(MESSAGE_TYPE_REQUEST_POLL), "a467");
    }
}
