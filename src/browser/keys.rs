use crate::error::{ConsoleError, Result};

/// Fields of an `Input.dispatchKeyEvent` for one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDefinition {
    pub key: String,
    pub code: String,
    /// Character the key produces, empty for non-printing keys
    pub text: String,
    /// Windows VK code, which CDP uses on every platform
    pub key_code: u32,
}

impl KeyDefinition {
    fn named(key: &str, code: &str, text: &str, key_code: u32) -> Self {
        Self {
            key: key.to_string(),
            code: code.to_string(),
            text: text.to_string(),
            key_code,
        }
    }

    pub fn event(&self, event_type: &str) -> serde_json::Value {
        let mut event = serde_json::json!({
            "type": event_type,
            "key": self.key,
            "code": self.code,
            "windowsVirtualKeyCode": self.key_code,
        });
        if event_type == "keyDown" && !self.text.is_empty() {
            event["text"] = serde_json::json!(self.text);
        }
        event
    }
}

/// Look up a key by name (`Enter`, `esc`, `ArrowDown`, `F5`) or a single
/// character. Names are case-insensitive.
pub fn lookup(name: &str) -> Result<KeyDefinition> {
    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c != ' ' {
            return Ok(character(c));
        }
    }

    let def = match name.to_lowercase().as_str() {
        "enter" | "return" => KeyDefinition::named("Enter", "Enter", "\r", 13),
        "tab" => KeyDefinition::named("Tab", "Tab", "\t", 9),
        "escape" | "esc" => KeyDefinition::named("Escape", "Escape", "", 27),
        "backspace" => KeyDefinition::named("Backspace", "Backspace", "", 8),
        "delete" | "del" => KeyDefinition::named("Delete", "Delete", "", 46),
        "arrowup" | "up" => KeyDefinition::named("ArrowUp", "ArrowUp", "", 38),
        "arrowdown" | "down" => KeyDefinition::named("ArrowDown", "ArrowDown", "", 40),
        "arrowleft" | "left" => KeyDefinition::named("ArrowLeft", "ArrowLeft", "", 37),
        "arrowright" | "right" => KeyDefinition::named("ArrowRight", "ArrowRight", "", 39),
        "home" => KeyDefinition::named("Home", "Home", "", 36),
        "end" => KeyDefinition::named("End", "End", "", 35),
        "pageup" => KeyDefinition::named("PageUp", "PageUp", "", 33),
        "pagedown" => KeyDefinition::named("PageDown", "PageDown", "", 34),
        "space" | " " => KeyDefinition::named(" ", "Space", " ", 32),
        "insert" => KeyDefinition::named("Insert", "Insert", "", 45),
        other => match function_key(other) {
            Some(def) => def,
            None => {
                return Err(ConsoleError::InvalidArgument {
                    command: "press",
                    reason: format!("unknown key '{}'", name),
                })
            }
        },
    };
    Ok(def)
}

fn function_key(name: &str) -> Option<KeyDefinition> {
    let n: u32 = name.strip_prefix('f')?.parse().ok()?;
    if !(1..=12).contains(&n) {
        return None;
    }
    let key = format!("F{}", n);
    Some(KeyDefinition::named(&key, &key, "", 111 + n))
}

fn character(c: char) -> KeyDefinition {
    let (code, key_code) = if c.is_ascii_alphabetic() {
        let upper = c.to_ascii_uppercase();
        (format!("Key{}", upper), upper as u32)
    } else if c.is_ascii_digit() {
        (format!("Digit{}", c), c as u32)
    } else {
        (String::new(), 0)
    };

    KeyDefinition {
        key: c.to_string(),
        code,
        text: c.to_string(),
        key_code,
    }
}
