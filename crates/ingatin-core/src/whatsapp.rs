// SPDX-FileCopyrightText: 2026 Ingat-In Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp number normalization and `wa.me` link generation.
//!
//! Numbers are stored as messaging addresses (`62…@s.whatsapp.net`) because
//! that is what the bot writes; the dashboard accepts local (`08…`) or
//! international (`62…`) input and strips the suffix again for display.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use tracing::debug;

use crate::error::IngatinError;

/// Indonesian country calling code.
pub const COUNTRY_CODE: &str = "62";

/// Suffix of a WhatsApp user address.
pub const WHATSAPP_SUFFIX: &str = "@s.whatsapp.net";

const WA_ME_BASE: &str = "https://wa.me/";

/// Characters `encodeURIComponent` leaves untouched.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Normalizes user input into the stored messaging-address form.
///
/// A leading `0` is replaced by the country code, the country code is
/// prefixed when absent, and the WhatsApp suffix is appended when absent.
/// Whitespace, dashes, and a leading `+` are dropped first.
pub fn format_number(input: &str) -> Result<String, IngatinError> {
    let cleaned: String = input
        .trim()
        .trim_start_matches('+')
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();

    if cleaned.is_empty() {
        debug!(input, "rejected phone number without digits");
        return Err(IngatinError::Validation(
            "please enter a phone number".to_string(),
        ));
    }

    let mut formatted = if let Some(rest) = cleaned.strip_prefix('0') {
        format!("{COUNTRY_CODE}{rest}")
    } else if cleaned.starts_with(COUNTRY_CODE) {
        cleaned
    } else {
        format!("{COUNTRY_CODE}{cleaned}")
    };

    if !formatted.contains(WHATSAPP_SUFFIX) {
        formatted.push_str(WHATSAPP_SUFFIX);
    }

    debug!(input, number = %formatted, "phone number normalized");
    Ok(formatted)
}

/// Strips the messaging suffix for display.
pub fn display_number(stored: &str) -> String {
    stored.replace(WHATSAPP_SUFFIX, "")
}

/// Builds a `https://wa.me/<digits>[?text=<message>]` link.
///
/// Every non-digit is removed from `number`; `text` is percent-encoded the
/// way browsers encode a URI component.
pub fn generate_whatsapp_link(number: &str, text: Option<&str>) -> String {
    let digits: String = number.chars().filter(char::is_ascii_digit).collect();
    let base = format!("{WA_ME_BASE}{digits}");
    match text {
        Some(text) if !text.is_empty() => {
            format!("{base}?text={}", utf8_percent_encode(text, URI_COMPONENT))
        }
        _ => base,
    }
}

/// Bot number with its leading `0` replaced by the country code.
pub fn bot_number_with_country_code(bot_number: &str) -> String {
    let local = bot_number.strip_prefix('0').unwrap_or(bot_number);
    format!("{COUNTRY_CODE}{local}")
}

/// Link to the configured attendance bot, optionally with a pre-filled message.
pub fn generate_bot_whatsapp_link(bot_number: &str, text: Option<&str>) -> String {
    generate_whatsapp_link(&bot_number_with_country_code(bot_number), text)
}
