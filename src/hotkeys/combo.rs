use crate::error::{Result, SoundboardError};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Modifier {
    Ctrl,
    Alt,
    Shift,
    Cmd,
}

impl Modifier {
    fn parse(token: &str) -> Option<Self> {
        match token {
            "ctrl" | "control" => Some(Modifier::Ctrl),
            "alt" | "option" => Some(Modifier::Alt),
            "shift" => Some(Modifier::Shift),
            "cmd" | "super" | "win" | "meta" => Some(Modifier::Cmd),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Modifier::Ctrl => "ctrl",
            Modifier::Alt => "alt",
            Modifier::Shift => "shift",
            Modifier::Cmd => "cmd",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NamedKey {
    Space,
    Tab,
    Enter,
    Backspace,
    Delete,
    Insert,
    Home,
    End,
    PageUp,
    PageDown,
    Up,
    Down,
    Left,
    Right,
}

const NAMED_KEYS: [(&str, NamedKey); 14] = [
    ("space", NamedKey::Space),
    ("tab", NamedKey::Tab),
    ("enter", NamedKey::Enter),
    ("backspace", NamedKey::Backspace),
    ("delete", NamedKey::Delete),
    ("insert", NamedKey::Insert),
    ("home", NamedKey::Home),
    ("end", NamedKey::End),
    ("pageup", NamedKey::PageUp),
    ("pagedown", NamedKey::PageDown),
    ("up", NamedKey::Up),
    ("down", NamedKey::Down),
    ("left", NamedKey::Left),
    ("right", NamedKey::Right),
];

// US layout: what a key types with shift held, and the key itself
const SHIFTED_SYMBOLS: [(char, char); 20] = [
    ('!', '1'),
    ('@', '2'),
    ('#', '3'),
    ('$', '4'),
    ('%', '5'),
    ('^', '6'),
    ('&', '7'),
    ('*', '8'),
    ('(', '9'),
    (')', '0'),
    ('_', '-'),
    ('{', '['),
    ('}', ']'),
    ('|', '\\'),
    (':', ';'),
    ('"', '\''),
    ('<', ','),
    ('>', '.'),
    ('?', '/'),
    ('~', '`'),
];

fn unshifted(c: char) -> Option<char> {
    SHIFTED_SYMBOLS.iter().find(|(symbol, _)| *symbol == c).map(|(_, key)| *key)
}

impl NamedKey {
    pub fn label(&self) -> &'static str {
        NAMED_KEYS
            .iter()
            .find(|(_, key)| key == self)
            .map(|(label, _)| *label)
            .unwrap_or("?")
    }
}

/// The one non-modifier key of a combo. Function keys sort first and numerically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BaseKey {
    Function(u8),
    Char(char),
    Named(NamedKey),
}

impl BaseKey {
    fn parse(token: &str) -> Option<Self> {
        if let Some(n) = token.strip_prefix('f').and_then(|n| n.parse::<u8>().ok()) {
            if (1..=24).contains(&n) {
                return Some(BaseKey::Function(n));
            }
        }
        if let Some((_, key)) = NAMED_KEYS.iter().find(|(label, _)| *label == token) {
            return Some(BaseKey::Named(*key));
        }

        let mut chars = token.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_graphic() && c != '+' => Some(BaseKey::Char(c)),
            _ => None,
        }
    }
}

impl fmt::Display for BaseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BaseKey::Function(n) => write!(f, "<f{}>", n),
            BaseKey::Char(c) => write!(f, "{}", c),
            BaseKey::Named(key) => write!(f, "<{}>", key.label()),
        }
    }
}

/// A modifier set plus one base key. `Display` gives the canonical string,
/// e.g. `<ctrl>+<shift>+a` or `<f1>`.
///
/// Shifted symbols are stored as the key they sit on, so `!` and `shift+1`
/// are the same combo.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyCombo {
    base: BaseKey,
    modifiers: BTreeSet<Modifier>,
}

impl KeyCombo {
    pub fn new(base: BaseKey, modifiers: impl IntoIterator<Item = Modifier>) -> Self {
        let mut modifiers: BTreeSet<Modifier> = modifiers.into_iter().collect();
        let base = match base {
            BaseKey::Char(c) => match unshifted(c) {
                Some(key) => {
                    modifiers.insert(Modifier::Shift);
                    BaseKey::Char(key)
                }
                None => base,
            },
            _ => base,
        };
        Self { base, modifiers }
    }

    pub fn function(n: u8) -> Self {
        Self::new(BaseKey::Function(n), [])
    }

    pub fn parse(input: &str) -> Result<Self> {
        let mut modifiers = BTreeSet::new();
        let mut base = None;

        for raw in input.split('+') {
            let token = raw.trim().to_ascii_lowercase();
            let token = token
                .strip_prefix('<')
                .and_then(|t| t.strip_suffix('>'))
                .filter(|t| !t.is_empty())
                .unwrap_or(token.as_str())
                .trim();
            if token.is_empty() {
                return Err(SoundboardError::invalid_combo(input, "empty key"));
            }

            if let Some(modifier) = Modifier::parse(token) {
                modifiers.insert(modifier);
                continue;
            }
            let key = BaseKey::parse(token)
                .ok_or_else(|| SoundboardError::invalid_combo(input, format!("unknown key '{}'", token)))?;
            if base.replace(key).is_some() {
                return Err(SoundboardError::invalid_combo(input, "more than one base key"));
            }
        }

        let base = base.ok_or_else(|| SoundboardError::invalid_combo(input, "missing base key"))?;
        Ok(Self::new(base, modifiers))
    }
}

impl FromStr for KeyCombo {
    type Err = SoundboardError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for modifier in &self.modifiers {
            write!(f, "<{}>+", modifier.label())?;
        }
        write!(f, "{}", self.base)
    }
}
