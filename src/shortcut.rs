//! Shortcut strings such as `f`, `shift+f` or `g e`.

use std::fmt;
use std::str::FromStr;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::error::HintError;
use crate::models::Modifiers;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    Char(char),
    Esc,
    Enter,
    Tab,
    Space,
    Up,
    Down,
    Left,
    Right,
}

impl Key {
    fn parse(name: &str) -> Option<Key> {
        let key = match name {
            "esc" | "escape" => Key::Esc,
            "enter" | "return" => Key::Enter,
            "tab" => Key::Tab,
            "space" => Key::Space,
            "up" => Key::Up,
            "down" => Key::Down,
            "left" => Key::Left,
            "right" => Key::Right,
            _ => {
                let mut chars = name.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Key::Char(c),
                    _ => return None,
                }
            }
        };
        Some(key)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Char(c) => write!(f, "{c}"),
            Key::Esc => f.write_str("esc"),
            Key::Enter => f.write_str("enter"),
            Key::Tab => f.write_str("tab"),
            Key::Space => f.write_str("space"),
            Key::Up => f.write_str("up"),
            Key::Down => f.write_str("down"),
            Key::Left => f.write_str("left"),
            Key::Right => f.write_str("right"),
        }
    }
}

/// One key press with the modifiers that must be held.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct KeyChord {
    pub key: Key,
    pub modifiers: Modifiers,
}

impl KeyChord {
    /// Shift on character keys is satisfied by either the modifier or an upper-case char.
    pub fn matches(&self, event: &KeyEvent) -> bool {
        let mods = event.modifiers;
        let mut shift = mods.contains(KeyModifiers::SHIFT);
        let key = match event.code {
            KeyCode::Char(' ') => Key::Space,
            KeyCode::Char(c) => {
                shift |= c.is_uppercase();
                Key::Char(c.to_lowercase().next().unwrap_or(c))
            }
            KeyCode::Esc => Key::Esc,
            KeyCode::Enter => Key::Enter,
            KeyCode::Tab => Key::Tab,
            KeyCode::Up => Key::Up,
            KeyCode::Down => Key::Down,
            KeyCode::Left => Key::Left,
            KeyCode::Right => Key::Right,
            _ => return false,
        };

        key == self.key
            && shift == self.modifiers.shift
            && mods.contains(KeyModifiers::CONTROL) == self.modifiers.ctrl
            && mods.contains(KeyModifiers::ALT) == self.modifiers.alt
            && mods.intersects(KeyModifiers::SUPER | KeyModifiers::META) == self.modifiers.meta
    }
}

impl FromStr for KeyChord {
    type Err = HintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        let mut parts: Vec<&str> = lower.split('+').collect();
        let key_name = parts.pop().unwrap_or_default();
        let key = Key::parse(key_name)
            .ok_or_else(|| HintError::InvalidShortcut(format!("unknown key `{key_name}` in `{s}`")))?;

        let mut modifiers = Modifiers::NONE;
        for part in parts {
            match part {
                "ctrl" | "control" => modifiers.ctrl = true,
                "alt" | "opt" => modifiers.alt = true,
                "shift" => modifiers.shift = true,
                "meta" | "mod" | "cmd" | "super" => modifiers.meta = true,
                other => {
                    return Err(HintError::InvalidShortcut(format!("unknown modifier `{other}` in `{s}`")));
                }
            }
        }
        Ok(KeyChord { key, modifiers })
    }
}

impl fmt::Display for KeyChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.modifiers.ctrl {
            f.write_str("ctrl+")?;
        }
        if self.modifiers.alt {
            f.write_str("alt+")?;
        }
        if self.modifiers.shift {
            f.write_str("shift+")?;
        }
        if self.modifiers.meta {
            f.write_str("meta+")?;
        }
        write!(f, "{}", self.key)
    }
}

/// A sequence of chords typed one after another.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Shortcut {
    chords: Vec<KeyChord>,
}

impl Shortcut {
    pub fn parse(s: &str) -> Result<Self, HintError> {
        let chords = s
            .split_whitespace()
            .map(KeyChord::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        if chords.is_empty() {
            return Err(HintError::InvalidShortcut("empty shortcut".to_string()));
        }
        Ok(Self { chords })
    }

    /// Whether `typed` equals the first `typed.len()` chords of this shortcut.
    pub fn starts_with(&self, typed: &[KeyEvent]) -> bool {
        typed.len() <= self.chords.len()
            && self.chords.iter().zip(typed).all(|(chord, event)| chord.matches(event))
    }

    pub fn is_matched_by(&self, typed: &[KeyEvent]) -> bool {
        typed.len() == self.chords.len() && self.starts_with(typed)
    }
}

impl FromStr for Shortcut {
    type Err = HintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Shortcut::parse(s)
    }
}

impl fmt::Display for Shortcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, chord) in self.chords.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{chord}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode, mods: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, mods)
    }

    #[test]
    fn parses_the_default_bindings() {
        for s in ["f", "shift+f", "ctrl+f", "g e", "g b"] {
            let shortcut = Shortcut::parse(s).unwrap();
            assert_eq!(shortcut.to_string(), s);
        }
        assert_eq!(Shortcut::parse("Ctrl+F").unwrap().to_string(), "ctrl+f");
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(Shortcut::parse(""), Err(HintError::InvalidShortcut(_))));
        assert!(matches!(Shortcut::parse("hyper+f"), Err(HintError::InvalidShortcut(_))));
        assert!(matches!(Shortcut::parse("ctrl+ff"), Err(HintError::InvalidShortcut(_))));
    }

    #[test]
    fn shift_matches_upper_case_chars() {
        let chord: KeyChord = "shift+f".parse().unwrap();
        assert!(chord.matches(&key(KeyCode::Char('F'), KeyModifiers::SHIFT)));
        assert!(chord.matches(&key(KeyCode::Char('F'), KeyModifiers::NONE)));
        assert!(!chord.matches(&key(KeyCode::Char('f'), KeyModifiers::NONE)));

        let plain: KeyChord = "f".parse().unwrap();
        assert!(plain.matches(&key(KeyCode::Char('f'), KeyModifiers::NONE)));
        assert!(!plain.matches(&key(KeyCode::Char('F'), KeyModifiers::SHIFT)));
        assert!(!plain.matches(&key(KeyCode::Char('f'), KeyModifiers::CONTROL)));
    }

    #[test]
    fn sequences_match_by_prefix() {
        let shortcut = Shortcut::parse("g e").unwrap();
        let g = key(KeyCode::Char('g'), KeyModifiers::NONE);
        let e = key(KeyCode::Char('e'), KeyModifiers::NONE);
        assert!(shortcut.starts_with(&[g]));
        assert!(!shortcut.is_matched_by(&[g]));
        assert!(shortcut.is_matched_by(&[g, e]));
        assert!(!shortcut.starts_with(&[e]));
    }
}
