use std::fmt;

use crate::engine::{FrameInfo, FrameScope};
use crate::error::{ConsoleError, Result};

/// How `useframe` names a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameReference {
    Index(usize),
    Name(String),
    UrlContains(String),
}

impl FrameReference {
    pub fn parse(arg: &str) -> Result<Self> {
        let arg = arg.trim();
        if let Some(name) = arg.strip_prefix("name=") {
            return Ok(FrameReference::Name(name.to_string()));
        }
        if let Some(fragment) = arg.strip_prefix("url=") {
            if fragment.is_empty() {
                return Err(ConsoleError::InvalidArgument {
                    command: "useframe",
                    reason: "url= needs a substring".to_string(),
                });
            }
            return Ok(FrameReference::UrlContains(fragment.to_string()));
        }
        arg.parse::<usize>()
            .map(FrameReference::Index)
            .map_err(|_| ConsoleError::InvalidArgument {
                command: "useframe",
                reason: format!("expected <index>, name=<name> or url=<substring>, got '{arg}'"),
            })
    }

    /// Find the referenced frame in `frames`, which must be in registry order.
    pub fn resolve<'a>(&self, frames: &'a [FrameInfo]) -> Result<&'a FrameInfo> {
        let found = match self {
            FrameReference::Index(index) => frames.iter().find(|f| f.index == *index),
            FrameReference::Name(name) => frames.iter().find(|f| f.name == *name),
            FrameReference::UrlContains(fragment) => {
                frames.iter().find(|f| f.url.contains(fragment.as_str()))
            }
        };
        found.ok_or_else(|| ConsoleError::FrameNotFound(self.to_string()))
    }
}

impl fmt::Display for FrameReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameReference::Index(index) => write!(f, "{index}"),
            FrameReference::Name(name) => write!(f, "name={name}"),
            FrameReference::UrlContains(fragment) => write!(f, "url={fragment}"),
        }
    }
}

/// Scope for a resolved frame; index 0 is the main frame.
pub fn scope_for(frame: &FrameInfo) -> FrameScope {
    if frame.index == 0 {
        FrameScope::Main
    } else {
        FrameScope::Child(frame.clone())
    }
}

/// One line per frame, the active one starred.
pub fn describe(frames: &[FrameInfo], active: &FrameScope) -> Vec<String> {
    frames
        .iter()
        .map(|frame| {
            let marker = if active.is(frame) { '*' } else { ' ' };
            let name = if frame.name.is_empty() {
                "-"
            } else {
                frame.name.as_str()
            };
            format!("{marker} [{}] {name}  {}", frame.index, frame.url)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::FrameId;

    fn frames() -> Vec<FrameInfo> {
        vec![
            FrameInfo {
                index: 0,
                id: FrameId("MAIN".to_string()),
                name: String::new(),
                url: "https://example.com/".to_string(),
            },
            FrameInfo {
                index: 1,
                id: FrameId("F1".to_string()),
                name: "ads".to_string(),
                url: "https://ads.example.net/slot".to_string(),
            },
            FrameInfo {
                index: 2,
                id: FrameId("F2".to_string()),
                name: "login".to_string(),
                url: "https://auth.example.com/embed".to_string(),
            },
        ]
    }

    #[test]
    fn parses_the_three_forms() {
        assert_eq!(FrameReference::parse("2").unwrap(), FrameReference::Index(2));
        assert_eq!(
            FrameReference::parse("name=login").unwrap(),
            FrameReference::Name("login".to_string())
        );
        assert_eq!(
            FrameReference::parse("url=auth").unwrap(),
            FrameReference::UrlContains("auth".to_string())
        );
    }

    #[test]
    fn rejects_bare_words_and_empty_url() {
        assert!(FrameReference::parse("login").is_err());
        assert!(FrameReference::parse("-1").is_err());
        assert!(FrameReference::parse("url=").is_err());
    }

    #[test]
    fn name_match_is_exact() {
        let frames = frames();
        assert!(FrameReference::Name("log".to_string()).resolve(&frames).is_err());
        let found = FrameReference::Name("login".to_string())
            .resolve(&frames)
            .unwrap();
        assert_eq!(found.index, 2);
    }

    #[test]
    fn url_match_takes_first_containing_frame() {
        let frames = frames();
        let found = FrameReference::UrlContains("example".to_string())
            .resolve(&frames)
            .unwrap();
        assert_eq!(found.index, 0);
    }

    #[test]
    fn missing_frame_is_not_found() {
        let err = FrameReference::Index(7).resolve(&frames()).unwrap_err();
        assert!(matches!(err, ConsoleError::FrameNotFound(ref r) if r == "7"));
    }

    #[test]
    fn index_zero_maps_to_main_scope() {
        let frames = frames();
        assert_eq!(scope_for(&frames[0]), FrameScope::Main);
        assert!(matches!(scope_for(&frames[1]), FrameScope::Child(ref f) if f.name == "ads"));
    }

    #[test]
    fn describe_stars_active_frame() {
        let frames = frames();
        let lines = describe(&frames, &FrameScope::Child(frames[2].clone()));
        assert!(lines[2].starts_with('*'));
        assert!(lines[0].starts_with(' '));
        assert!(lines[0].contains("[0] -"));
    }

    #[test]
    fn star_follows_the_frame_when_indexes_shift() {
        let mut frames = frames();
        let active = FrameScope::Child(frames[2].clone());

        // The ads frame is removed, so login moves up to index 1
        frames.remove(1);
        frames[1].index = 1;

        let lines = describe(&frames, &active);
        assert_eq!(lines[1], "* [1] login  https://auth.example.com/embed");
        assert!(lines[0].starts_with(' '));
    }
}
