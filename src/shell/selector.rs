use std::fmt;

use serde::Serialize;

use crate::engine::{ElementSummary, ElementTarget, Engine, FrameScope};
use crate::error::{ConsoleError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectorKind {
    Css,
    Xpath,
}

/// A user selector, classified once at parse time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorSpec {
    pub kind: SelectorKind,
    /// Expression handed to the engine, with any `css=`/`xpath=` prefix removed
    pub expression: String,
    /// Text as typed, used in messages
    pub raw: String,
    pub nth: Option<usize>,
}

impl SelectorSpec {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let (kind, expression) = classify(raw);
        Self {
            kind,
            expression: expression.to_string(),
            raw: raw.to_string(),
            nth: None,
        }
    }

    pub fn with_nth(mut self, nth: usize) -> Self {
        self.nth = Some(nth);
        self
    }

    pub fn index(&self) -> usize {
        self.nth.unwrap_or(0)
    }
}

impl fmt::Display for SelectorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.nth {
            Some(nth) => write!(f, "{} [{}]", self.raw, nth),
            None => f.write_str(&self.raw),
        }
    }
}

/// Decide between path-query (XPath) and structural (CSS) syntax.
///
/// Explicit `xpath=`/`css=` prefixes win. Otherwise an expression is a path
/// query when it starts with `//`, `./` or `..`, or with `(` followed by a
/// `/` or `.` (`(//button)[1]`). Anything else is CSS. Note that a bare `/html`
/// is treated as CSS; use `xpath=/html` for absolute single-slash paths.
pub fn classify(raw: &str) -> (SelectorKind, &str) {
    if let Some(rest) = raw.strip_prefix("xpath=") {
        return (SelectorKind::Xpath, rest);
    }
    if let Some(rest) = raw.strip_prefix("css=") {
        return (SelectorKind::Css, rest);
    }

    let body = raw.trim_start_matches('(').trim_start();
    let starts_path = |s: &str| s.starts_with("//") || s.starts_with("./") || s.starts_with("..");

    let grouped = raw.starts_with('(') && (body.starts_with('/') || body.starts_with('.'));

    if starts_path(raw) || grouped {
        (SelectorKind::Xpath, raw)
    } else {
        (SelectorKind::Css, raw)
    }
}

/// Resolve a selector's nth match (0-based) to an element target.
pub async fn resolve<E: Engine + ?Sized>(
    engine: &mut E,
    scope: &FrameScope,
    selector: &SelectorSpec,
) -> Result<ElementTarget> {
    let index = selector.index();
    let matches = engine.query(scope, selector, index.saturating_add(1)).await?;

    if matches.len() <= index {
        return Err(ConsoleError::ElementNotFound(match matches.len() {
            0 => format!("{} matched nothing in {}", selector.raw, scope),
            n => format!(
                "{} matched {} element(s) in {}, index {} requested",
                selector.raw, n, scope, index
            ),
        }));
    }

    Ok(ElementTarget {
        scope: scope.clone(),
        selector: selector.clone(),
        index,
    })
}

/// All matches up to `limit`, for display. No match is an empty list.
pub async fn list<E: Engine + ?Sized>(
    engine: &mut E,
    scope: &FrameScope,
    selector: &SelectorSpec,
    limit: usize,
) -> Result<Vec<ElementSummary>> {
    engine.query(scope, selector, limit).await
}
