use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::Snippet;

// End tags match without regard to case, so `</SCRIPT>` closes too
static STYLE_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</(style)").expect("valid style pattern"));
static SCRIPT_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</(script)").expect("valid script pattern"));

/// Escape text for use inside an HTML element or attribute
fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Keep a closing tag inside embedded css/js from ending the element early
fn guard_raw_text(text: &str, end_tag: &Regex) -> String {
    end_tag.replace_all(text, r"<\/$1").into_owned()
}

/// Compose a standalone page: the markup in the body, the style in the head
/// and the script at the end of the body.
pub fn render_document(snippet: &Snippet) -> String {
    let mut page = String::new();
    page.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    page.push_str("  <meta charset=\"UTF-8\">\n");
    page.push_str("  <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n");
    page.push_str(&format!("  <title>{}</title>\n", escape_html(&snippet.name)));
    page.push_str(&format!(
        "  <style>\n{}\n  </style>\n",
        guard_raw_text(&snippet.css, &STYLE_END)
    ));
    page.push_str("</head>\n<body>\n");
    page.push_str(&snippet.html);
    page.push('\n');
    if !snippet.js.is_empty() {
        page.push_str(&format!(
            "<script>\n{}\n</script>\n",
            guard_raw_text(&snippet.js, &SCRIPT_END)
        ));
    }
    page.push_str("</body>\n</html>\n");
    page
}
