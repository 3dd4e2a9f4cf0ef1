use std::fmt;

use scraper::{Html, Node};
use serde::{Deserialize, Serialize};

use crate::engine::{Engine, FrameScope};
use crate::error::Result;

use super::session::Session;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Html,
    Text,
}

impl ViewMode {
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "html" => Some(ViewMode::Html),
            "text" => Some(ViewMode::Text),
            _ => None,
        }
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewMode::Html => f.write_str("html"),
            ViewMode::Text => f.write_str("text"),
        }
    }
}

/// Turns serialized HTML into terminal text for `text` mode.
pub trait Formatter: Send + Sync {
    fn format(&self, html: &str) -> String;
}

/// Drops script/style content and prints one trimmed line per text node.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextFormatter;

const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

impl Formatter for PlainTextFormatter {
    fn format(&self, html: &str) -> String {
        let document = Html::parse_document(html);
        let mut lines = Vec::new();

        for node in document.tree.root().descendants() {
            let Node::Text(text) = node.value() else {
                continue;
            };
            let hidden = node.ancestors().any(|ancestor| {
                matches!(ancestor.value(), Node::Element(el) if SKIPPED_ELEMENTS.contains(&el.name()))
            });
            if hidden {
                continue;
            }
            for line in text.lines() {
                let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
                if !collapsed.is_empty() {
                    lines.push(collapsed);
                }
            }
        }

        lines.join("\n")
    }
}

/// A page rendering ready for the terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub url: String,
    /// Set when a child frame is active
    pub frame: Option<String>,
    pub mode: ViewMode,
    /// At most `max_chars` characters
    pub body: String,
    /// Characters cut from the end of the body
    pub clipped: usize,
}

impl Rendered {
    pub fn is_truncated(&self) -> bool {
        self.clipped > 0
    }
}

/// Cut `text` to `max_chars` characters; returns how many were dropped.
pub fn truncate(mut text: String, max_chars: usize) -> (String, usize) {
    match text.char_indices().nth(max_chars) {
        Some((offset, _)) => {
            let clipped = text[offset..].chars().count();
            text.truncate(offset);
            (text, clipped)
        }
        None => (text, 0),
    }
}

pub struct Renderer {
    max_chars: usize,
    formatter: Box<dyn Formatter>,
}

impl Renderer {
    pub fn new(max_chars: usize) -> Self {
        Self::with_formatter(max_chars, Box::new(PlainTextFormatter))
    }

    pub fn with_formatter(max_chars: usize, formatter: Box<dyn Formatter>) -> Self {
        Self {
            max_chars,
            formatter,
        }
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    pub async fn render<E: Engine + ?Sized>(
        &self,
        engine: &mut E,
        session: &Session,
    ) -> Result<Rendered> {
        let html = engine.serialize_dom(&session.active_frame).await?;
        let url = engine.current_url().await?;

        let body = match session.view_mode {
            ViewMode::Html => html,
            ViewMode::Text => self.formatter.format(&html),
        };
        let (body, clipped) = truncate(body, self.max_chars);

        let frame = match &session.active_frame {
            FrameScope::Main => None,
            child => Some(child.to_string()),
        };

        Ok(Rendered {
            url,
            frame,
            mode: session.view_mode,
            body,
            clipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_bound() {
        let (body, clipped) = truncate("héllo wörld".to_string(), 5);
        assert_eq!(body, "héllo");
        assert_eq!(clipped, 6);
        assert_eq!(body.chars().count(), 5);
    }

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(truncate("abc".to_string(), 3), ("abc".to_string(), 0));
        assert_eq!(truncate(String::new(), 0), (String::new(), 0));
    }

    #[test]
    fn zero_bound_clips_everything() {
        assert_eq!(truncate("abc".to_string(), 0), (String::new(), 3));
    }

    #[test]
    fn text_formatter_drops_scripts_and_blank_lines() {
        let html = r#"<html><head><title>T</title><style>p { color: red }</style>
            <script>var x = 1;</script></head>
            <body>
              <h1>  Hello   there </h1>
              <noscript>enable js</noscript>
              <p>First line
                 second line</p>
            </body></html>"#;

        let text = PlainTextFormatter.format(html);
        assert_eq!(text, "T\nHello there\nFirst line\nsecond line");
    }

    #[test]
    fn view_mode_parses_lowercase_only() {
        assert_eq!(ViewMode::parse("text"), Some(ViewMode::Text));
        assert_eq!(ViewMode::parse("xml"), None);
        assert_eq!(ViewMode::Html.to_string(), "html");
    }
}
