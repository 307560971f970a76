//! # ESC/POS to Markup Translation
//!
//! The spooler backend hands documents to a generic OS print pipeline that
//! understands markup, not thermal control codes. Clients, however, often
//! send payloads with embedded ESC/POS styling (they were written for the
//! thermal backend). This module degrades those payloads gracefully:
//!
//! | ESC/POS sequence | Markup equivalent |
//! |------------------|-------------------|
//! | `1B 40` (INIT) | removed |
//! | `1B 61 01` (ALIGN_CENTER) | `<div>` with centered text |
//! | `1B 61 00` (ALIGN_LEFT) | close any open block, open left-aligned `<div>` |
//! | `1B 45 01` / `1B 45 00` (BOLD) | `<strong>` / `</strong>` |
//! | `1D 21 11` / `1D 21 00` (SIZE) | 16pt `<span>` / `</span>` |
//! | `1D 56 41 10` (CUT) | removed |
//! | other control bytes | removed |
//! | newline | `<br>` |
//!
//! ## Idempotence
//!
//! [`translate`] maps control bytes to markup and never rewrites text that
//! is already free of control bytes, so applying it twice yields the same
//! result as applying it once. The payload is intentionally not
//! entity-escaped: escaping `&` or `<` would break that property, and the
//! rendered document is only ever fed to the local print pipeline.

use crate::protocol::commands::{ESC, GS, LF};

/// Opening tag emitted for ALIGN_CENTER.
const DIV_CENTER: &str = "<div style=\"text-align:center\">";

/// Opening tag emitted for ALIGN_LEFT.
const DIV_LEFT: &str = "<div style=\"text-align:left\">";

/// Translate embedded ESC/POS control bytes into equivalent markup.
///
/// Unknown control bytes are stripped rather than passed through; a
/// generic printer would render them as tofu or worse. Newlines survive
/// as `<br>`.
///
/// ## Example
///
/// ```
/// use remito::protocol::markup;
///
/// let markup = markup::translate("\u{1B}\u{45}\u{01}TOTAL\u{1B}\u{45}\u{00} $13.75");
/// assert_eq!(markup, "<strong>TOTAL</strong> $13.75");
/// ```
pub fn translate(text: &str) -> String {
    let esc = ESC as char;
    let gs = GS as char;

    let mut out = translate_alignment(text)
        // Initialize printer: no visual equivalent
        .replace(&format!("{esc}@"), "")
        // Bold
        .replace(&format!("{esc}E\u{1}"), "<strong>")
        .replace(&format!("{esc}E\u{0}"), "</strong>")
        // Glyph size
        .replace(&format!("{gs}!\u{11}"), "<span style=\"font-size:16pt\">")
        .replace(&format!("{gs}!\u{0}"), "</span>")
        // Paper cut: no visual equivalent
        .replace(&format!("{gs}VA\u{10}"), "");

    // Strip any remaining non-printable control bytes, preserving newlines
    // for the <br> conversion below.
    out.retain(|c| c == LF as char || !c.is_control());
    out.replace('\n', "<br>")
}

/// Convert alignment sequences into `<div>` blocks.
///
/// Tracks whether a block is currently open: a close tag is only emitted
/// before opening the next block, so ALIGN_LEFT with no preceding
/// ALIGN_CENTER never produces a stray `</div>`. A block still open at the
/// end of the payload is closed.
fn translate_alignment(text: &str) -> String {
    let esc = ESC as char;
    let center_seq = format!("{esc}a\u{1}");
    let left_seq = format!("{esc}a\u{0}");

    let mut out = String::with_capacity(text.len());
    let mut div_open = false;
    let mut rest = text;

    loop {
        let (pos, seq, tag) = match (rest.find(&center_seq), rest.find(&left_seq)) {
            (None, None) => break,
            (Some(c), Some(l)) if l < c => (l, &left_seq, DIV_LEFT),
            (Some(c), _) => (c, &center_seq, DIV_CENTER),
            (None, Some(l)) => (l, &left_seq, DIV_LEFT),
        };

        out.push_str(&rest[..pos]);
        if div_open {
            out.push_str("</div>");
        }
        out.push_str(tag);
        div_open = true;
        rest = &rest[pos + seq.len()..];
    }

    out.push_str(rest);
    if div_open {
        out.push_str("</div>");
    }
    out
}

/// Wrap translated text in the minimal receipt document template.
///
/// The template mirrors thermal output on a generic printer: monospace
/// font, 58mm body width (standard thermal receipt paper), no margins.
pub fn render_document(text: &str) -> String {
    let body = translate(text);

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <style>
        body {{
            font-family: 'Courier New', monospace;
            font-size: 10pt;
            padding: 0;
            margin: 0;
            width: 58mm;
        }}
        pre {{
            white-space: pre-wrap;
            margin: 0;
            font-family: 'Courier New', monospace;
        }}
    </style>
</head>
<body>
<pre>{body}</pre>
</body>
</html>
"#
    )
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plain_text_unchanged() {
        assert_eq!(translate("Hello World"), "Hello World");
    }

    #[test]
    fn test_newlines_become_breaks() {
        assert_eq!(translate("line 1\nline 2"), "line 1<br>line 2");
    }

    #[test]
    fn test_init_stripped() {
        assert_eq!(translate("\u{1B}\u{40}receipt"), "receipt");
    }

    #[test]
    fn test_bold_translated() {
        assert_eq!(
            translate("\u{1B}\u{45}\u{01}TOTAL\u{1B}\u{45}\u{00}"),
            "<strong>TOTAL</strong>"
        );
    }

    #[test]
    fn test_center_translated_and_balanced() {
        // Center with no explicit return to left: div must still be closed.
        assert_eq!(
            translate("\u{1B}\u{61}\u{01}HEADER"),
            "<div style=\"text-align:center\">HEADER</div>"
        );
    }

    #[test]
    fn test_center_then_left() {
        assert_eq!(
            translate("\u{1B}\u{61}\u{01}HEADER\u{1B}\u{61}\u{00}body"),
            "<div style=\"text-align:center\">HEADER</div><div style=\"text-align:left\">body</div>"
        );
    }

    #[test]
    fn test_left_without_center_has_no_stray_close() {
        assert_eq!(
            translate("\u{1B}\u{61}\u{00}body"),
            "<div style=\"text-align:left\">body</div>"
        );
    }

    #[test]
    fn test_large_text_translated() {
        assert_eq!(
            translate("\u{1D}\u{21}\u{11}BIG\u{1D}\u{21}\u{00}"),
            "<span style=\"font-size:16pt\">BIG</span>"
        );
    }

    #[test]
    fn test_cut_stripped() {
        assert_eq!(translate("end\u{1D}\u{56}\u{41}\u{10}"), "end");
    }

    #[test]
    fn test_unknown_control_bytes_stripped() {
        // BEL and DEL have no markup equivalent and must not pass through.
        assert_eq!(translate("a\u{07}b\u{7F}c"), "abc");
    }

    #[test]
    fn test_idempotent_on_plain_text() {
        let input = "TRAIN TICKET\n---------\nTOTAL: $13.75";
        let once = translate(input);
        let twice = translate(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_idempotent_after_first_pass() {
        // A styled payload is control-free after one pass; a second pass
        // must leave the generated markup alone.
        let input = "\u{1B}\u{61}\u{01}\u{1B}\u{45}\u{01}RECEIPT\u{1B}\u{45}\u{00}\nitems";
        let once = translate(input);
        assert_eq!(translate(&once), once);
    }

    #[test]
    fn test_document_template() {
        let doc = render_document("hello");
        assert!(doc.starts_with("<!DOCTYPE html>"));
        assert!(doc.contains("<pre>hello</pre>"));
        assert!(doc.contains("width: 58mm"));
        assert!(doc.contains("monospace"));
    }

    #[test]
    fn test_document_translates_body() {
        let doc = render_document("\u{1B}\u{45}\u{01}x\u{1B}\u{45}\u{00}");
        assert!(doc.contains("<pre><strong>x</strong></pre>"));
    }
}
