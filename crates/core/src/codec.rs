//! Stored email bodies are `base64(urlencode(html))`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{CampaignError, CampaignResult};

/// Encode raw HTML the way email templates are stored.
pub fn encode_html(html: &str) -> String {
    STANDARD.encode(urlencoding::encode(html).as_bytes())
}

/// Recover raw HTML: base64 decode first, then URL-unescape.
///
/// Unescaping uses query semantics: `+` is a space and every `%` must be
/// followed by two hex digits. Unescaped bytes must form valid UTF-8, so
/// Latin-1 escapes such as `%E9` are a decode failure.
pub fn decode_html(encoded: &str) -> CampaignResult<String> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| CampaignError::ContentDecode(format!("base64: {e}")))?;
    let escaped = String::from_utf8(bytes)
        .map_err(|e| CampaignError::ContentDecode(format!("utf-8: {e}")))?;

    validate_escapes(&escaped)?;

    let spaced = escaped.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|html| html.into_owned())
        .map_err(|e| CampaignError::ContentDecode(format!("url unescape: {e}")))
}

fn validate_escapes(s: &str) -> CampaignResult<()> {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes.len() > i + 2
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit();
            if !valid {
                let end = (i + 3).min(bytes.len());
                return Err(CampaignError::ContentDecode(format!(
                    "url unescape: invalid escape {:?}",
                    String::from_utf8_lossy(&bytes[i..end])
                )));
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    Ok(())
}
