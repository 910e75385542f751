use std::sync::LazyLock;

use regex::Regex;

use crate::model::Span;

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)https?://[^\s<>]+").unwrap());

const TRAILING_PUNCT: &[char] = &[')', '.', ',', ';'];

/// Split free text into plain spans and link spans. Every absolute http(s) URL
/// becomes a `Span::Link` showing `label`; trailing `).,;` stay as text.
pub fn link_spans(text: &str, label: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut pending = String::new();
    let mut last = 0;

    for m in URL_RE.find_iter(text) {
        pending.push_str(&text[last..m.start()]);
        last = m.end();

        let raw = m.as_str();
        let url = raw.trim_end_matches(TRAILING_PUNCT);
        // `http://.` and the like: nothing left after the scheme
        if url.len() <= url.find("://").map_or(0, |i| i + 3) {
            pending.push_str(raw);
            continue;
        }

        if !pending.is_empty() {
            spans.push(Span::Text(std::mem::take(&mut pending)));
        }
        spans.push(Span::Link {
            url: url.to_string(),
            label: label.to_string(),
        });
        pending.push_str(&raw[url.len()..]);
    }
    pending.push_str(&text[last..]);
    if !pending.is_empty() {
        spans.push(Span::Text(pending));
    }
    spans
}

/// Escape `& < > " '` for the block markup.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Markup for a span sequence: escaped text, links as `<a href="…">label</a>`.
pub fn to_markup(spans: &[Span]) -> String {
    spans
        .iter()
        .map(|span| match span {
            Span::Text(t) => escape(t),
            Span::Link { url, label } => {
                format!(r#"<a href="{}" color="blue">{}</a>"#, escape(url), escape(label))
            }
        })
        .collect()
}

/// Linked and escaped markup for raw text.
pub fn linkify(text: &str, label: &str) -> String {
    to_markup(&link_spans(text, label))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LABEL: &str = "click here to access";

    fn unescape(s: &str) -> String {
        s.replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&#x27;", "'")
            .replace("&amp;", "&")
    }

    fn plain_text(spans: &[Span]) -> String {
        spans
            .iter()
            .filter_map(|s| match s {
                Span::Text(t) => Some(t.as_str()),
                Span::Link { .. } => None,
            })
            .collect()
    }

    #[test]
    fn replaces_url_with_label() {
        let spans = link_spans("Visit https://example.com/page for info", LABEL);
        assert_eq!(
            spans,
            vec![
                Span::Text("Visit ".into()),
                Span::Link {
                    url: "https://example.com/page".into(),
                    label: LABEL.into()
                },
                Span::Text(" for info".into()),
            ]
        );
    }

    #[test]
    fn trailing_punctuation_reattached_as_text() {
        let spans = link_spans("(see http://a.org/x).", LABEL);
        assert_eq!(
            spans,
            vec![
                Span::Text("(see ".into()),
                Span::Link {
                    url: "http://a.org/x".into(),
                    label: LABEL.into()
                },
                Span::Text(").".into()),
            ]
        );
    }

    #[test]
    fn scheme_is_case_insensitive_and_stops_at_angle_bracket() {
        let spans = link_spans("HTTPS://Example.com<b>", LABEL);
        assert_eq!(
            spans[0],
            Span::Link {
                url: "HTTPS://Example.com".into(),
                label: LABEL.into()
            }
        );
        assert_eq!(spans[1], Span::Text("<b>".into()));
    }

    #[test]
    fn multiple_urls_left_to_right() {
        let text = "a http://one.io, b https://two.io/p?q=1&r=2; c";
        let spans = link_spans(text, LABEL);
        let urls: Vec<&str> = spans
            .iter()
            .filter_map(|s| match s {
                Span::Link { url, .. } => Some(url.as_str()),
                Span::Text(_) => None,
            })
            .collect();
        assert_eq!(urls, ["http://one.io", "https://two.io/p?q=1&r=2"]);
        assert_eq!(plain_text(&spans), "a , b ; c");

        let markup = to_markup(&spans);
        assert_eq!(markup.matches(LABEL).count(), 2);
        assert!(markup.contains("q=1&amp;r=2"));
    }

    #[test]
    fn non_link_text_survives_escaping() {
        let text = r#"Tom & "Jerry" <3 it's https://x.y/z done"#;
        let spans = link_spans(text, LABEL);
        let escaped: String = spans
            .iter()
            .filter_map(|s| match s {
                Span::Text(t) => Some(escape(t)),
                Span::Link { .. } => None,
            })
            .collect();
        assert!(!escaped.contains('"'));
        assert_eq!(unescape(&escaped), r#"Tom & "Jerry" <3 it's  done"#);
    }

    #[test]
    fn plain_text_is_unchanged() {
        let text = "Nothing special here, just words";
        assert_eq!(linkify(text, LABEL), text);
        assert_eq!(escape(text), text);
    }

    #[test]
    fn bare_scheme_is_not_a_link() {
        assert_eq!(link_spans("see http://.", LABEL), vec![Span::Text("see http://.".into())]);
    }
}
