//! Tag-text extraction from HTML fragments

use scraper::{ElementRef, Selector};

/// Collects the text of every `<p>` under `element`, one line per paragraph
///
/// Paragraphs consisting of a single space are layout filler and are skipped.
pub fn paragraph_text(element: ElementRef<'_>) -> String {
    collect_lines(element, "p")
}

/// Collects comment bodies (`div.comments span.comment-copy`), one per line
pub fn comment_text(element: ElementRef<'_>) -> String {
    collect_lines(element, "div.comments span.comment-copy")
}

/// Concatenated text content of an element, trimmed
pub fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Decodes HTML entities such as `&amp;` and `&#39;`
pub fn unescape_html(text: &str) -> String {
    html_escape::decode_html_entities(text).into_owned()
}

fn collect_lines(element: ElementRef<'_>, css: &str) -> String {
    let Ok(selector) = Selector::parse(css) else {
        return String::new();
    };
    let mut out = String::new();
    for node in element.select(&selector) {
        let text: String = node.text().collect();
        if text == " " {
            continue;
        }
        out.push_str(&text);
        out.push('\n');
    }
    out
}
