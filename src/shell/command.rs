//! Line parser: one input line to one typed [`Command`].

use std::time::Duration;

use crate::error::{ConsoleError, Result};

use super::frames::FrameReference;
use super::render::ViewMode;
use super::selector::SelectorSpec;

/// Element state awaited by `waitfor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitState {
    Attached,
    Detached,
    Visible,
    Hidden,
}

impl WaitState {
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "attached" => Some(WaitState::Attached),
            "detached" => Some(WaitState::Detached),
            "visible" => Some(WaitState::Visible),
            "hidden" => Some(WaitState::Hidden),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WaitState::Attached => "attached",
            WaitState::Detached => "detached",
            WaitState::Visible => "visible",
            WaitState::Hidden => "hidden",
        }
    }

    /// Whether a check of the first match satisfies this state.
    pub fn is_satisfied(&self, attached: bool, visible: bool) -> bool {
        match self {
            WaitState::Attached => attached,
            WaitState::Detached => !attached,
            WaitState::Visible => attached && visible,
            WaitState::Hidden => !attached || !visible,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Goto {
        url: String,
    },
    Back,
    Forward,
    Reload,
    /// The selector always carries an index here, 0 when none was given
    Click {
        selector: SelectorSpec,
    },
    Type {
        selector: SelectorSpec,
        text: String,
    },
    Fill {
        selector: SelectorSpec,
        text: String,
    },
    Select {
        selector: SelectorSpec,
        value: String,
    },
    /// `selector` is `None` for a page-level key press
    Press {
        selector: Option<SelectorSpec>,
        key: String,
    },
    WaitFor {
        selector: SelectorSpec,
        state: WaitState,
        timeout: Option<Duration>,
    },
    List {
        selector: SelectorSpec,
        limit: Option<usize>,
    },
    Eval {
        script: String,
    },
    View {
        mode: Option<ViewMode>,
    },
    Wait {
        duration: Duration,
    },
    Title,
    Url,
    Frames,
    UseFrame {
        reference: FrameReference,
    },
    UseMainFrame,
    Help,
    Exit,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Goto { .. } => "goto",
            Command::Back => "back",
            Command::Forward => "forward",
            Command::Reload => "reload",
            Command::Click { .. } => "click",
            Command::Type { .. } => "type",
            Command::Fill { .. } => "fill",
            Command::Select { .. } => "select",
            Command::Press { .. } => "press",
            Command::WaitFor { .. } => "waitfor",
            Command::List { .. } => "list",
            Command::Eval { .. } => "eval",
            Command::View { .. } => "view",
            Command::Wait { .. } => "wait",
            Command::Title => "title",
            Command::Url => "url",
            Command::Frames => "frames",
            Command::UseFrame { .. } => "useframe",
            Command::UseMainFrame => "usemainframe",
            Command::Help => "help",
            Command::Exit => "exit",
        }
    }

    /// Commands after which the page is worth rendering again.
    pub fn affects_page(&self) -> bool {
        !matches!(
            self,
            Command::List { .. }
                | Command::Title
                | Command::Url
                | Command::Frames
                | Command::Help
                | Command::Exit
        )
    }
}

const USAGE_GOTO: &str = "goto <url>";
const USAGE_CLICK: &str = "click <selector> [nth]";
const USAGE_TYPE: &str = "type <selector> <text>";
const USAGE_FILL: &str = "fill <selector> <text>";
const USAGE_SELECT: &str = "select <selector> <value>";
const USAGE_PRESS: &str = "press <key> | press <selector> <key>";
const USAGE_WAITFOR: &str = "waitfor <selector> [attached|detached|visible|hidden] [timeout-ms]";
const USAGE_LIST: &str = "list <selector> [limit]";
const USAGE_EVAL: &str = "eval <js>";
const USAGE_VIEW: &str = "view [html|text]";
const USAGE_WAIT: &str = "wait <ms>";
const USAGE_USEFRAME: &str = "useframe <index> | useframe name=<name> | useframe url=<substring>";

pub const HELP: &str = "\
Commands:
  goto <url>                  navigate (bare domains get https://)
  back | forward | reload     history navigation
  click <selector> [nth]      click the nth match (0-based, default 0)
  type <selector> <text>      clear a field and type into it
  fill <selector> <text>      set a field's value directly
  select <selector> <value>   choose an option by value or label
  press <key>                 press a key on the page
  press <selector> <key>      press a key on an element
  waitfor <selector> [state] [ms]
                              wait until attached|detached|visible|hidden
  list <selector> [limit]     show matches with their indices
  eval <js>                   evaluate JavaScript in the active frame
  view [html|text]            show or switch the render mode
  wait <ms>                   sleep
  title | url                 page title / current URL
  frames                      list frames (* marks the active one)
  useframe <index>|name=<x>|url=<x>
                              run DOM commands inside a frame
  usemainframe                back to the main frame
  help                        this text
  exit                        quit

Selectors:
  CSS:   a#login, button.submit, input[name=\"q\"]
  XPath: //a[contains(., 'Next')], (//button)[1], xpath=/html/body
  Quote selectors that contain spaces when more arguments follow.";

/// Parse one input line. Blank lines yield `Ok(None)`.
pub fn parse(line: &str) -> Result<Option<Command>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (name, rest) = match line.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (line, ""),
    };

    let command = match name.to_ascii_lowercase().as_str() {
        "goto" => {
            if rest.is_empty() {
                return Err(ConsoleError::Usage(USAGE_GOTO));
            }
            Command::Goto { url: unquote(rest) }
        }
        "back" => no_args(rest, Command::Back)?,
        "forward" => no_args(rest, Command::Forward)?,
        "reload" => no_args(rest, Command::Reload)?,
        "click" => {
            let args = Args::new(rest)?;
            let (selector, nth) = args
                .with_trailing_index()
                .ok_or(ConsoleError::Usage(USAGE_CLICK))?;
            Command::Click {
                selector: SelectorSpec::parse(&selector).with_nth(nth.unwrap_or(0)),
            }
        }
        "type" => {
            let (selector, text) =
                selector_and_rest(rest)?.ok_or(ConsoleError::Usage(USAGE_TYPE))?;
            Command::Type { selector, text }
        }
        "fill" => {
            let (selector, text) =
                selector_and_rest(rest)?.ok_or(ConsoleError::Usage(USAGE_FILL))?;
            Command::Fill { selector, text }
        }
        "select" => {
            let (selector, value) =
                selector_and_rest(rest)?.ok_or(ConsoleError::Usage(USAGE_SELECT))?;
            Command::Select { selector, value }
        }
        "press" => parse_press(Args::new(rest)?)?,
        "waitfor" => parse_waitfor(Args::new(rest)?)?,
        "list" => {
            let (selector, limit) = Args::new(rest)?
                .with_trailing_index()
                .ok_or(ConsoleError::Usage(USAGE_LIST))?;
            if limit == Some(0) {
                return Err(ConsoleError::InvalidArgument {
                    command: "list",
                    reason: "limit must be at least 1".to_string(),
                });
            }
            Command::List {
                selector: SelectorSpec::parse(&selector),
                limit,
            }
        }
        "eval" => {
            if rest.is_empty() {
                return Err(ConsoleError::Usage(USAGE_EVAL));
            }
            // Free-form: passed through untokenized
            Command::Eval {
                script: rest.to_string(),
            }
        }
        "view" => {
            let args = Args::new(rest)?;
            match args.len() {
                0 => Command::View { mode: None },
                1 => {
                    let token = args.text(0);
                    let mode = ViewMode::parse(token).ok_or_else(|| {
                        ConsoleError::InvalidArgument {
                            command: "view",
                            reason: format!("unknown mode '{token}', expected html or text"),
                        }
                    })?;
                    Command::View { mode: Some(mode) }
                }
                _ => return Err(ConsoleError::Usage(USAGE_VIEW)),
            }
        }
        "wait" => {
            let args = Args::new(rest)?;
            if args.len() != 1 {
                return Err(ConsoleError::Usage(USAGE_WAIT));
            }
            let ms = parse_index(args.text(0)).ok_or_else(|| ConsoleError::InvalidArgument {
                command: "wait",
                reason: format!("'{}' is not a number of milliseconds", args.text(0)),
            })?;
            Command::Wait {
                duration: Duration::from_millis(ms as u64),
            }
        }
        "title" => no_args(rest, Command::Title)?,
        "url" => no_args(rest, Command::Url)?,
        "frames" => no_args(rest, Command::Frames)?,
        "useframe" => {
            let args = Args::new(rest)?;
            if args.len() != 1 {
                return Err(ConsoleError::Usage(USAGE_USEFRAME));
            }
            Command::UseFrame {
                reference: FrameReference::parse(args.text(0))?,
            }
        }
        "usemainframe" => no_args(rest, Command::UseMainFrame)?,
        "help" | "h" | "?" => Command::Help,
        "exit" | "quit" | ":q" => no_args(rest, Command::Exit)?,
        _ => return Err(ConsoleError::UnknownCommand(name.to_string())),
    };

    Ok(Some(command))
}

fn no_args(rest: &str, command: Command) -> Result<Command> {
    if rest.is_empty() {
        Ok(command)
    } else {
        Err(ConsoleError::InvalidArgument {
            command: command.name(),
            reason: format!("takes no arguments, got '{rest}'"),
        })
    }
}

fn parse_press(args: Args<'_>) -> Result<Command> {
    match args.len() {
        0 => Err(ConsoleError::Usage(USAGE_PRESS)),
        1 => Ok(Command::Press {
            selector: None,
            key: args.text(0).to_string(),
        }),
        n => Ok(Command::Press {
            selector: Some(SelectorSpec::parse(&args.span(0, n - 2))),
            key: args.text(n - 1).to_string(),
        }),
    }
}

fn parse_waitfor(args: Args<'_>) -> Result<Command> {
    if args.is_empty() || args.len() > 3 {
        return Err(ConsoleError::Usage(USAGE_WAITFOR));
    }
    let selector = SelectorSpec::parse(args.text(0));
    let mut state = WaitState::Visible;
    let mut timeout = None;

    if args.len() >= 2 {
        let token = args.text(1);
        if let Some(parsed) = WaitState::parse(token) {
            state = parsed;
        } else if let Some(ms) = parse_index(token) {
            if args.len() == 3 {
                return Err(ConsoleError::Usage(USAGE_WAITFOR));
            }
            timeout = Some(Duration::from_millis(ms as u64));
        } else {
            return Err(ConsoleError::InvalidArgument {
                command: "waitfor",
                reason: format!(
                    "'{token}' is neither a state (attached, detached, visible, hidden) nor a timeout in ms"
                ),
            });
        }
    }

    if args.len() == 3 {
        let token = args.text(2);
        let ms = parse_index(token).ok_or_else(|| ConsoleError::InvalidArgument {
            command: "waitfor",
            reason: format!("'{token}' is not a timeout in ms"),
        })?;
        timeout = Some(Duration::from_millis(ms as u64));
    }

    Ok(Command::WaitFor {
        selector,
        state,
        timeout,
    })
}

/// Plain non-negative decimal; rejects signs and whitespace.
fn parse_index(token: &str) -> Option<usize> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}

struct Token {
    text: String,
    start: usize,
    end: usize,
}

/// Read the token starting at or after byte `from`, returning it and the
/// offset just past it.
///
/// A token that starts with a quote runs to the matching quote and loses the
/// quotes (`\"` escapes inside). Quotes inside an unquoted token group
/// verbatim, so `input[name="first name"]` stays one token, quotes intact.
fn read_token(src: &str, from: usize) -> Result<Option<(Token, usize)>> {
    let bytes = src.as_bytes();
    let mut i = from;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    if i >= bytes.len() {
        return Ok(None);
    }

    let start = i;
    let quote = bytes[i];
    if quote == b'"' || quote == b'\'' {
        let mut text = String::new();
        let mut j = i + 1;
        while j < bytes.len() {
            if bytes[j] == b'\\' && j + 1 < bytes.len() && bytes[j + 1] == quote {
                text.push(quote as char);
                j += 2;
                continue;
            }
            if bytes[j] == quote {
                let token = Token {
                    text,
                    start,
                    end: j + 1,
                };
                return Ok(Some((token, j + 1)));
            }
            let ch_len = utf8_len(bytes[j]);
            text.push_str(&src[j..j + ch_len]);
            j += ch_len;
        }
        return Err(ConsoleError::UnterminatedQuote);
    }

    let mut j = i;
    while j < bytes.len() && !bytes[j].is_ascii_whitespace() {
        if bytes[j] == b'"' || bytes[j] == b'\'' {
            let close = src[j + 1..]
                .find(bytes[j] as char)
                .ok_or(ConsoleError::UnterminatedQuote)?;
            j += close + 2;
        } else {
            j += 1;
        }
    }
    let token = Token {
        text: src[start..j].to_string(),
        start,
        end: j,
    };
    Ok(Some((token, j)))
}

/// Unquote text that is exactly one quoted token; anything else, such as
/// `"a" and "b"`, stays as typed.
fn unquote(text: &str) -> String {
    let text = text.trim();
    if text.starts_with(['"', '\'']) {
        if let Ok(Some((token, end))) = read_token(text, 0) {
            if end == text.len() {
                return token.text;
            }
        }
    }
    text.to_string()
}

/// `<selector> <free text>`: one selector token, then the rest of the line
/// untokenized so apostrophes in the text need no quoting.
fn selector_and_rest(src: &str) -> Result<Option<(SelectorSpec, String)>> {
    let Some((selector, next)) = read_token(src, 0)? else {
        return Ok(None);
    };
    let rest = src[next..].trim();
    if rest.is_empty() {
        return Ok(None);
    }
    Ok(Some((SelectorSpec::parse(&selector.text), unquote(rest))))
}

/// Whitespace-separated arguments, see [`read_token`].
struct Args<'a> {
    src: &'a str,
    tokens: Vec<Token>,
}

impl<'a> Args<'a> {
    fn new(src: &'a str) -> Result<Self> {
        let mut tokens = Vec::new();
        let mut at = 0;
        while let Some((token, next)) = read_token(src, at)? {
            tokens.push(token);
            at = next;
        }
        Ok(Self { src, tokens })
    }

    fn len(&self) -> usize {
        self.tokens.len()
    }

    fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    fn text(&self, i: usize) -> &str {
        &self.tokens[i].text
    }

    /// Tokens `first..=last` as typed; a lone token is unquoted.
    fn span(&self, first: usize, last: usize) -> String {
        if first == last {
            self.tokens[first].text.clone()
        } else {
            self.src[self.tokens[first].start..self.tokens[last].end].to_string()
        }
    }

    /// `<selector...> [n]`: a final plain integer is split off when at least
    /// one other token precedes it.
    fn with_trailing_index(&self) -> Option<(String, Option<usize>)> {
        match self.len() {
            0 => None,
            1 => Some((self.span(0, 0), None)),
            n => match parse_index(self.text(n - 1)) {
                Some(index) => Some((self.span(0, n - 2), Some(index))),
                None => Some((self.span(0, n - 1), None)),
            },
        }
    }
}

fn utf8_len(first_byte: u8) -> usize {
    match first_byte {
        b if b < 0x80 => 1,
        b if b >= 0xF0 => 4,
        b if b >= 0xE0 => 3,
        _ => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::selector::SelectorKind;

    fn parsed(line: &str) -> Command {
        parse(line).unwrap().unwrap()
    }

    #[test]
    fn blank_line_is_a_no_op() {
        assert!(parse("").unwrap().is_none());
        assert!(parse("   \t ").unwrap().is_none());
    }

    #[test]
    fn unknown_command_names_the_token() {
        let err = parse("frobnicate now").unwrap_err();
        assert!(matches!(err, ConsoleError::UnknownCommand(ref t) if t == "frobnicate"));
    }

    #[test]
    fn names_are_case_insensitive_with_aliases() {
        assert_eq!(parsed("BACK"), Command::Back);
        assert_eq!(parsed("quit"), Command::Exit);
        assert_eq!(parsed(":q"), Command::Exit);
        assert_eq!(parsed("?"), Command::Help);
    }

    #[test]
    fn goto_keeps_raw_url() {
        assert_eq!(
            parsed("goto example.com/search?q=a b"),
            Command::Goto {
                url: "example.com/search?q=a b".to_string()
            }
        );
        assert!(matches!(parse("goto"), Err(ConsoleError::Usage(_))));
    }

    #[test]
    fn click_defaults_to_index_zero() {
        match parsed("click a.next") {
            Command::Click { selector } => {
                assert_eq!(selector.raw, "a.next");
                assert_eq!(selector.nth, Some(0));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn click_takes_trailing_index() {
        match parsed("click div > a 2") {
            Command::Click { selector } => {
                assert_eq!(selector.raw, "div > a");
                assert_eq!(selector.nth, Some(2));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn click_negative_number_stays_in_selector() {
        match parsed("click li -1") {
            Command::Click { selector } => {
                assert_eq!(selector.raw, "li -1");
                assert_eq!(selector.nth, Some(0));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn click_classifies_xpath() {
        match parsed("click (//button)[1] 1") {
            Command::Click { selector } => {
                assert_eq!(selector.kind, SelectorKind::Xpath);
                assert_eq!(selector.index(), 1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn selector_commands_require_arguments() {
        for line in ["click", "type", "type #q", "fill #q", "select sel", "list", "waitfor", "press"] {
            assert!(
                matches!(parse(line), Err(ConsoleError::Usage(_))),
                "{line}"
            );
        }
    }

    #[test]
    fn type_keeps_free_text() {
        assert_eq!(
            parsed("type input[name=\"q\"] hello   world"),
            Command::Type {
                selector: SelectorSpec::parse("input[name=\"q\"]"),
                text: "hello   world".to_string(),
            }
        );
    }

    #[test]
    fn free_text_may_contain_apostrophes() {
        assert_eq!(
            parsed("type textarea don't stop"),
            Command::Type {
                selector: SelectorSpec::parse("textarea"),
                text: "don't stop".to_string(),
            }
        );
    }

    #[test]
    fn quoted_arguments_are_unquoted() {
        assert_eq!(
            parsed("fill \"form input.name\" 'Ada Lovelace'"),
            Command::Fill {
                selector: SelectorSpec::parse("form input.name"),
                text: "Ada Lovelace".to_string(),
            }
        );
    }

    #[test]
    fn separately_quoted_words_stay_as_typed() {
        assert_eq!(
            parsed("type #q \"a\" and \"b\""),
            Command::Type {
                selector: SelectorSpec::parse("#q"),
                text: "\"a\" and \"b\"".to_string(),
            }
        );
        assert_eq!(
            parsed("type #q \"hello world\""),
            Command::Type {
                selector: SelectorSpec::parse("#q"),
                text: "hello world".to_string(),
            }
        );
        assert_eq!(
            parsed("type #q 'tis"),
            Command::Type {
                selector: SelectorSpec::parse("#q"),
                text: "'tis".to_string(),
            }
        );
    }

    #[test]
    fn inner_quotes_keep_spaces_in_one_token() {
        assert_eq!(
            parsed("select select[aria-label=\"Sort by\"] price"),
            Command::Select {
                selector: SelectorSpec::parse("select[aria-label=\"Sort by\"]"),
                value: "price".to_string(),
            }
        );
    }

    #[test]
    fn unterminated_quote_is_a_parse_error() {
        assert!(matches!(
            parse("type \"#q hello"),
            Err(ConsoleError::UnterminatedQuote)
        ));
    }

    #[test]
    fn press_forms_are_told_apart_by_count() {
        assert_eq!(
            parsed("press Enter"),
            Command::Press {
                selector: None,
                key: "Enter".to_string()
            }
        );
        assert_eq!(
            parsed("press #search Enter"),
            Command::Press {
                selector: Some(SelectorSpec::parse("#search")),
                key: "Enter".to_string()
            }
        );
    }

    #[test]
    fn waitfor_state_and_timeout_are_distinguished() {
        assert_eq!(
            parsed("waitfor #result visible"),
            Command::WaitFor {
                selector: SelectorSpec::parse("#result"),
                state: WaitState::Visible,
                timeout: None,
            }
        );
        assert_eq!(
            parsed("waitfor #result 5000"),
            Command::WaitFor {
                selector: SelectorSpec::parse("#result"),
                state: WaitState::Visible,
                timeout: Some(Duration::from_millis(5000)),
            }
        );
        assert_eq!(
            parsed("waitfor .spinner detached 100"),
            Command::WaitFor {
                selector: SelectorSpec::parse(".spinner"),
                state: WaitState::Detached,
                timeout: Some(Duration::from_millis(100)),
            }
        );
    }

    #[test]
    fn waitfor_rejects_other_tokens() {
        for line in [
            "waitfor #x shown",
            "waitfor #x Visible",
            "waitfor #x -5",
            "waitfor #x 100 visible",
            "waitfor #x visible soon",
        ] {
            assert!(parse(line).is_err(), "{line}");
        }
    }

    #[test]
    fn list_takes_optional_limit() {
        assert_eq!(
            parsed("list a 5"),
            Command::List {
                selector: SelectorSpec::parse("a"),
                limit: Some(5),
            }
        );
        assert!(parse("list a 0").is_err());
    }

    #[test]
    fn eval_is_untokenized() {
        assert_eq!(
            parsed("eval document.querySelectorAll('a').length  + \"x\""),
            Command::Eval {
                script: "document.querySelectorAll('a').length  + \"x\"".to_string()
            }
        );
        assert!(matches!(parse("eval"), Err(ConsoleError::Usage(_))));
    }

    #[test]
    fn view_validates_mode() {
        assert_eq!(parsed("view"), Command::View { mode: None });
        assert_eq!(
            parsed("view text"),
            Command::View {
                mode: Some(ViewMode::Text)
            }
        );
        assert!(matches!(
            parse("view xml"),
            Err(ConsoleError::InvalidArgument { command: "view", .. })
        ));
    }

    #[test]
    fn wait_needs_milliseconds() {
        assert_eq!(
            parsed("wait 2000"),
            Command::Wait {
                duration: Duration::from_millis(2000)
            }
        );
        assert!(parse("wait").is_err());
        assert!(parse("wait soon").is_err());
        assert!(parse("wait 1 2").is_err());
    }

    #[test]
    fn useframe_parses_reference() {
        assert_eq!(
            parsed("useframe name=login"),
            Command::UseFrame {
                reference: FrameReference::Name("login".to_string())
            }
        );
        assert!(parse("useframe").is_err());
        assert!(parse("useframe login").is_err());
    }

    #[test]
    fn bare_commands_reject_arguments() {
        assert!(parse("reload now").is_err());
        assert!(parse("usemainframe 1").is_err());
        assert_eq!(parsed("help click"), Command::Help);
    }

    #[test]
    fn non_ascii_text_survives_tokenizing() {
        assert_eq!(
            parsed("type #q \"naïve café\""),
            Command::Type {
                selector: SelectorSpec::parse("#q"),
                text: "naïve café".to_string(),
            }
        );
    }

    #[test]
    fn wait_states_evaluate_checks() {
        assert!(WaitState::Attached.is_satisfied(true, false));
        assert!(WaitState::Detached.is_satisfied(false, false));
        assert!(!WaitState::Visible.is_satisfied(true, false));
        assert!(WaitState::Hidden.is_satisfied(true, false));
        assert!(WaitState::Hidden.is_satisfied(false, false));
    }
}
