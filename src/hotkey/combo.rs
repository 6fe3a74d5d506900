//! Key combination parsing and matching
//!
//! Combinations are written either as `Ctrl+Shift+A` or in the
//! `<ctrl>+<shift>+a` style. Parsing produces a backend-neutral
//! [`KeyCombo`]; each listener backend maps the key name to its own key
//! type and feeds events into a [`ComboMatcher`].

use super::HotkeyAction;
use crate::error::HotkeyError;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Modifier keys. Left and right variants both satisfy a modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Modifier {
    Ctrl,
    Shift,
    Alt,
    Meta,
}

impl Modifier {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "CTRL" | "CONTROL" | "CTL" => Some(Modifier::Ctrl),
            "SHIFT" => Some(Modifier::Shift),
            "ALT" | "OPTION" | "OPT" => Some(Modifier::Alt),
            "META" | "SUPER" | "CMD" | "COMMAND" | "WIN" | "LOGO" => Some(Modifier::Meta),
            _ => None,
        }
    }
}

/// A parsed key combination: a set of modifiers plus one key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCombo {
    pub modifiers: BTreeSet<Modifier>,
    /// Normalized key name: uppercase, no KEY_ prefix (e.g. "F9", "A", "ESC")
    pub key: String,
}

impl std::fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for modifier in &self.modifiers {
            write!(f, "{:?}+", modifier)?;
        }
        write!(f, "{}", self.key)
    }
}

/// A combination bound to an action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub combo: KeyCombo,
    pub action: HotkeyAction,
}

/// Parse a combination string such as "Ctrl+F9" or "<ctrl>+<shift>+a"
pub fn parse_combo(input: &str) -> Result<KeyCombo, HotkeyError> {
    let invalid = |reason: &str| HotkeyError::InvalidCombo(input.to_string(), reason.to_string());

    let mut modifiers = BTreeSet::new();
    let mut key: Option<String> = None;

    for raw in input.split('+') {
        let part = raw
            .trim()
            .trim_start_matches('<')
            .trim_end_matches('>')
            .trim();

        if part.is_empty() {
            return Err(invalid("empty key name"));
        }

        let normalized = normalize_key_name(part);

        if let Some(modifier) = Modifier::from_name(&normalized) {
            if !modifiers.insert(modifier) {
                return Err(invalid("modifier listed twice"));
            }
            continue;
        }

        if key.is_some() {
            return Err(invalid("more than one non-modifier key"));
        }
        key = Some(normalized);
    }

    let key = key.ok_or_else(|| invalid("missing a non-modifier key"))?;

    Ok(KeyCombo { modifiers, key })
}

/// Parse every configured binding, rejecting duplicates of the same combination
pub fn parse_bindings(
    bindings: &BTreeMap<String, HotkeyAction>,
) -> Result<Vec<Binding>, HotkeyError> {
    if bindings.is_empty() {
        return Err(HotkeyError::NoBindings);
    }

    let mut parsed: Vec<Binding> = Vec::with_capacity(bindings.len());
    for (combo_str, action) in bindings {
        let combo = parse_combo(combo_str)?;
        if parsed.iter().any(|b| b.combo == combo) {
            return Err(HotkeyError::InvalidCombo(
                combo_str.clone(),
                "bound more than once".to_string(),
            ));
        }
        parsed.push(Binding {
            combo,
            action: *action,
        });
    }

    Ok(parsed)
}

/// Uppercase, strip a KEY_ prefix, and fold common aliases
fn normalize_key_name(name: &str) -> String {
    let upper: String = name
        .chars()
        .filter(|c| !matches!(c, '-' | ' ' | '_'))
        .map(|c| c.to_ascii_uppercase())
        .collect();

    let upper = upper.strip_prefix("KEY").filter(|rest| !rest.is_empty()).map(str::to_string).unwrap_or(upper);

    match upper.as_str() {
        "ESCAPE" => "ESC".to_string(),
        "RETURN" => "ENTER".to_string(),
        "SCROLL" => "SCROLLLOCK".to_string(),
        "DEL" => "DELETE".to_string(),
        "INS" => "INSERT".to_string(),
        "PGUP" => "PAGEUP".to_string(),
        "PGDN" | "PGDOWN" => "PAGEDOWN".to_string(),
        "BACKTICK" => "GRAVE".to_string(),
        _ => upper,
    }
}

/// Tracks modifier state and turns native key events into actions.
///
/// Generic over the backend's key type. A binding fires once per press:
/// repeats are ignored until the key is released. Modifiers must match
/// exactly, so `Ctrl+F9` does not fire while Shift is also held.
pub struct ComboMatcher<K> {
    bindings: Vec<(BTreeSet<Modifier>, K, HotkeyAction)>,
    /// Held modifier keys as (modifier, is_right_side)
    held: HashSet<(Modifier, bool)>,
    /// Indices of bindings whose key is currently down
    pressed: HashSet<usize>,
}

impl<K: PartialEq + Copy> ComboMatcher<K> {
    pub fn new(bindings: Vec<(BTreeSet<Modifier>, K, HotkeyAction)>) -> Self {
        Self {
            bindings,
            held: HashSet::new(),
            pressed: HashSet::new(),
        }
    }

    /// Record a modifier key going down or up
    pub fn modifier(&mut self, modifier: Modifier, right: bool, down: bool) {
        if down {
            self.held.insert((modifier, right));
        } else {
            self.held.remove(&(modifier, right));
        }
    }

    fn active_modifiers(&self) -> BTreeSet<Modifier> {
        self.held.iter().map(|(m, _)| *m).collect()
    }

    /// Handle a non-modifier key press; returns the action to fire, if any
    pub fn key_down(&mut self, key: K) -> Option<HotkeyAction> {
        let active = self.active_modifiers();
        let index = self
            .bindings
            .iter()
            .position(|(mods, k, _)| *k == key && *mods == active)?;

        if !self.pressed.insert(index) {
            // Key repeat while held
            return None;
        }

        Some(self.bindings[index].2)
    }

    /// Handle a non-modifier key release
    pub fn key_up(&mut self, key: K) {
        let bindings = &self.bindings;
        self.pressed.retain(|&i| bindings[i].1 != key);
    }
}
