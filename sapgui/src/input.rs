use serde::Deserialize;

use crate::platforms::Key;

/// One unit of typed input: either a run of literal characters sent as
/// unicode events, or a named key press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keystroke {
    Text(String),
    Key(Key),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    Down,
}

fn named_key(token: &str) -> Option<Key> {
    let upper = token.to_ascii_uppercase();
    let key = match upper.as_str() {
        "TAB" => Key::Tab,
        "ENTER" => Key::Enter,
        "ESC" | "ESCAPE" => Key::Escape,
        "BACKSPACE" | "BS" => Key::Backspace,
        "DEL" | "DELETE" => Key::Delete,
        "UP" => Key::Up,
        "DOWN" => Key::Down,
        "LEFT" => Key::Left,
        "RIGHT" => Key::Right,
        _ => {
            let n: u8 = upper.strip_prefix('F')?.parse().ok()?;
            if (1..=16).contains(&n) {
                return Some(Key::Function(n));
            }
            return None;
        }
    };
    Some(key)
}

/// Parses SendKeys-style markup into a keystroke sequence.
///
/// `{TOKEN}` names a key (case-insensitive), `~` is Enter, and everything
/// else is literal text. Malformed markup degrades to literal characters:
/// an unterminated `{` and an unrecognized `{...}` are both typed verbatim
/// rather than rejected, so free text containing braces still goes through.
/// Consecutive literal characters are batched into one [`Keystroke::Text`].
pub fn parse_keystrokes(text: &str) -> Vec<Keystroke> {
    let mut out = Vec::new();
    let mut literal = String::new();
    let mut chars = text.chars().peekable();

    let flush = |literal: &mut String, out: &mut Vec<Keystroke>| {
        if !literal.is_empty() {
            out.push(Keystroke::Text(std::mem::take(literal)));
        }
    };

    while let Some(ch) = chars.next() {
        match ch {
            '~' => {
                flush(&mut literal, &mut out);
                out.push(Keystroke::Key(Key::Enter));
            }
            '{' => {
                let mut token = String::new();
                let mut terminated = false;
                for inner in chars.by_ref() {
                    if inner == '}' {
                        terminated = true;
                        break;
                    }
                    token.push(inner);
                }
                match (terminated, named_key(&token)) {
                    (true, Some(key)) => {
                        flush(&mut literal, &mut out);
                        out.push(Keystroke::Key(key));
                    }
                    (true, None) => {
                        literal.push('{');
                        literal.push_str(&token);
                        literal.push('}');
                    }
                    (false, _) => {
                        literal.push('{');
                        literal.push_str(&token);
                    }
                }
            }
            _ => literal.push(ch),
        }
    }
    flush(&mut literal, &mut out);
    out
}
