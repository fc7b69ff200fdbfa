//! Text Preparation
//!
//! Turns raw secondary-stream payloads into strings the rasterizer can
//! consume, and provides the pull-side text sources used when the text
//! input is not connected.

use crate::config::OverlayConfig;
use crate::stream::{TextFormat, TextPayload};
use crate::time::{ClockTime, MSECOND, SECOND};
use std::borrow::Cow;

/// Placeholder written over each invalid UTF-8 sequence
pub const INVALID_UTF8_PLACEHOLDER: char = '*';

/// Decode `bytes` as UTF-8, replacing every invalid sequence with
/// [`INVALID_UTF8_PLACEHOLDER`].
///
/// Returns `Cow::Borrowed` when the input is already valid.
pub fn sanitize_utf8(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => {
            log::warn!("received invalid UTF-8, replacing invalid sequences");
            let mut out = String::with_capacity(bytes.len());
            let mut rest = bytes;
            loop {
                match std::str::from_utf8(rest) {
                    Ok(valid) => {
                        out.push_str(valid);
                        break;
                    }
                    Err(e) => {
                        let (valid, after) = rest.split_at(e.valid_up_to());
                        out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                        out.push(INVALID_UTF8_PLACEHOLDER);
                        let skip = e.error_len().unwrap_or(after.len());
                        rest = &after[skip..];
                    }
                }
            }
            Cow::Owned(out)
        }
    }
}

/// Escape the markup-significant characters of plain text
pub fn escape_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\'' => out.push_str("&apos;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Prepare a text payload for rendering.
///
/// Invalid UTF-8 is patched, plain text is escaped and trailing line
/// breaks are removed. An empty result renders as a single space so the
/// frame still carries an (empty looking) overlay.
pub fn prepare_payload(payload: &TextPayload) -> String {
    let text = sanitize_utf8(&payload.bytes);
    let marked_up = match payload.format {
        TextFormat::Markup => text.into_owned(),
        TextFormat::Utf8 => escape_markup(&text),
    };
    let trimmed = marked_up.trim_end_matches(['\n', '\r']);
    if trimmed.is_empty() {
        log::debug!("no text to render (empty payload)");
        " ".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Replace characters the layout can not place with spaces
pub fn normalize_whitespace(text: &str) -> String {
    text.replace(['\r', '\t'], " ")
}

/// Source of text for frames when no text input is connected
pub trait TextProvider: Send + Sync {
    /// Text for the frame at `pts` (running time `running_time`).
    ///
    /// The result is markup; an empty string means "no overlay".
    fn text_for(
        &self,
        pts: ClockTime,
        running_time: Option<ClockTime>,
        config: &OverlayConfig,
    ) -> String;
}

/// Renders the configured default text, which is markup
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticText;

impl TextProvider for StaticText {
    fn text_for(
        &self,
        _pts: ClockTime,
        _running_time: Option<ClockTime>,
        config: &OverlayConfig,
    ) -> String {
        config.text.clone()
    }
}

/// Renders the running time of each frame as `H:MM:SS.mmm`, prefixed by
/// the configured text
#[derive(Debug, Clone, Copy, Default)]
pub struct RunningTimeText;

impl RunningTimeText {
    /// Format a running time as `H:MM:SS.mmm`
    pub fn format(t: ClockTime) -> String {
        format!(
            "{}:{:02}:{:02}.{:03}",
            t / (3600 * SECOND),
            (t / (60 * SECOND)) % 60,
            (t / SECOND) % 60,
            (t % SECOND) / MSECOND
        )
    }
}

impl TextProvider for RunningTimeText {
    fn text_for(
        &self,
        pts: ClockTime,
        running_time: Option<ClockTime>,
        config: &OverlayConfig,
    ) -> String {
        let clock = Self::format(running_time.unwrap_or(pts));
        if config.text.is_empty() {
            clock
        } else {
            format!("{} {}", config.text, clock)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_valid_is_borrowed() {
        assert!(matches!(sanitize_utf8(b"hello"), Cow::Borrowed("hello")));
    }

    #[test]
    fn test_sanitize_invalid_runs() {
        assert_eq!(sanitize_utf8(b"a\xffb"), "a*b");
        assert_eq!(sanitize_utf8(b"\xff\xfeok"), "**ok");
        // Truncated multi-byte sequence at the end
        assert_eq!(sanitize_utf8(b"ok\xe2\x82"), "ok*");
    }

    #[test]
    fn test_escape_markup() {
        assert_eq!(
            escape_markup(r#"<b>"Tom" & 'Jerry'</b>"#),
            "&lt;b&gt;&quot;Tom&quot; &amp; &apos;Jerry&apos;&lt;/b&gt;"
        );
    }

    #[test]
    fn test_prepare_plain_and_markup() {
        assert_eq!(prepare_payload(&TextPayload::plain("a<b\r\n")), "a&lt;b");
        assert_eq!(
            prepare_payload(&TextPayload::markup("<i>x</i>\n")),
            "<i>x</i>"
        );
    }

    #[test]
    fn test_prepare_empty_renders_space() {
        assert_eq!(prepare_payload(&TextPayload::plain("")), " ");
        assert_eq!(prepare_payload(&TextPayload::plain("\n\n")), " ");
    }

    #[test]
    fn test_prepare_malformed_text() {
        let payload = TextPayload::from_bytes(b"caf\xe9".to_vec(), TextFormat::Utf8);
        assert_eq!(prepare_payload(&payload), "caf*");
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("a\tb\rc"), "a b c");
    }

    #[test]
    fn test_static_text_provider() {
        let config = OverlayConfig {
            text: "<b>bold</b> &amp; plain".into(),
            ..OverlayConfig::default()
        };
        assert_eq!(
            StaticText.text_for(0, None, &config),
            "<b>bold</b> &amp; plain"
        );
    }

    #[test]
    fn test_running_time_provider() {
        let config = OverlayConfig::default();
        let t = 61 * SECOND + 250 * MSECOND;
        assert_eq!(RunningTimeText.text_for(0, Some(t), &config), "0:01:01.250");

        let prefixed = OverlayConfig {
            text: "<i>T</i>".into(),
            ..OverlayConfig::default()
        };
        assert_eq!(
            RunningTimeText.text_for(2 * SECOND, None, &prefixed),
            "<i>T</i> 0:00:02.000"
        );
    }
}
