//! Key-combo state machine
//!
//! Tracks which keys are physically down (`KeyState`) and fires registered
//! bindings (`HotkeyRouter`) whenever a press event completes a combo.
//!
//! Matching is edge-triggered per completing keystroke, not level-triggered:
//! a binding fires on every press of one of its own keys that leaves the
//! combo fully depressed, so releasing and re-pressing one member while the
//! rest stay held fires again, while holding the combo (or pressing
//! unrelated keys alongside it) does not. A multi-key combo pressed in an
//! unusual order can therefore fire a subset combo on more than one
//! keystroke of the same gesture. Changing this would change user-visible
//! repeat behavior; see DESIGN.md.

#[cfg(target_os = "linux")]
pub mod evdev_listener;

use crate::error::ConfigError;
use std::collections::{BTreeSet, HashSet};
use std::fmt;

/// Canonical lowercase identifier for a physical key.
///
/// Side-specific modifiers collapse to their generic name (LEFTSHIFT and
/// RIGHTSHIFT both become `shift`), so combo strings and raw device events
/// meet in the same namespace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyToken(String);

impl KeyToken {
    pub fn new(name: &str) -> Self {
        let lower = name.trim().to_lowercase();
        let stripped = lower.strip_prefix("key_").unwrap_or(&lower);
        let canonical = match stripped {
            "leftshift" | "rightshift" | "lshift" | "rshift" => "shift",
            "leftctrl" | "rightctrl" | "lctrl" | "rctrl" | "control" => "ctrl",
            "leftalt" | "rightalt" | "lalt" | "ralt" => "alt",
            "leftmeta" | "rightmeta" | "meta" | "win" | "cmd" => "super",
            other => other,
        };
        KeyToken(canonical.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw key transition produced by an event source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyEvent {
    Pressed(KeyToken),
    Released(KeyToken),
}

/// A set of keys that must all be down at once to satisfy a binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCombo {
    keys: BTreeSet<KeyToken>,
    text: String,
}

impl KeyCombo {
    /// Parse a combo string like "ctrl+shift+l".
    ///
    /// Tokens are canonicalized, so "LEFTSHIFT + L" and "shift+l" are the
    /// same combo. Empty or repeated tokens are rejected.
    pub fn parse(combo: &str) -> Result<Self, ConfigError> {
        let mut keys = BTreeSet::new();
        for part in combo.split('+') {
            let part = part.trim();
            if part.is_empty() {
                return Err(ConfigError::InvalidCombo {
                    combo: combo.to_string(),
                    reason: "empty key name".to_string(),
                });
            }
            let token = KeyToken::new(part);
            if !keys.insert(token.clone()) {
                return Err(ConfigError::InvalidCombo {
                    combo: combo.to_string(),
                    reason: format!("key '{token}' appears twice"),
                });
            }
        }
        if keys.is_empty() {
            return Err(ConfigError::InvalidCombo {
                combo: combo.to_string(),
                reason: "no keys".to_string(),
            });
        }

        let text = keys
            .iter()
            .map(KeyToken::as_str)
            .collect::<Vec<_>>()
            .join("+");
        Ok(Self { keys, text })
    }

    /// Canonical textual form, stable across spelling variants
    pub fn canonical(&self) -> &str {
        &self.text
    }

    pub fn contains(&self, token: &KeyToken) -> bool {
        self.keys.contains(token)
    }

    pub fn is_satisfied_by(&self, state: &KeyState) -> bool {
        self.keys.iter().all(|k| state.is_down(k))
    }
}

impl fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical())
    }
}

/// The set of currently depressed keys.
///
/// A token is present iff its physical key is down. Releasing an absent
/// token is a no-op.
#[derive(Debug, Default)]
pub struct KeyState {
    down: HashSet<KeyToken>,
}

impl KeyState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&mut self, token: KeyToken) {
        self.down.insert(token);
    }

    pub fn release(&mut self, token: &KeyToken) {
        self.down.remove(token);
    }

    pub fn is_down(&self, token: &KeyToken) -> bool {
        self.down.contains(token)
    }

    pub fn len(&self) -> usize {
        self.down.len()
    }

    pub fn is_empty(&self) -> bool {
        self.down.is_empty()
    }
}

/// A registered combo and the language it dictates in
#[derive(Debug, Clone)]
pub struct KeyBinding {
    pub combo: KeyCombo,
    pub language: String,
}

/// Routes raw key events to bindings.
///
/// Bindings are registered once at startup and immutable afterwards.
#[derive(Debug, Default)]
pub struct HotkeyRouter {
    bindings: Vec<KeyBinding>,
    state: KeyState,
}

impl HotkeyRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a combo. The same canonical combo may only be bound once.
    pub fn register(&mut self, combo: KeyCombo, language: String) -> Result<(), ConfigError> {
        if self
            .bindings
            .iter()
            .any(|b| b.combo.canonical() == combo.canonical())
        {
            return Err(ConfigError::DuplicateCombo(combo.canonical().to_string()));
        }
        tracing::debug!("Registered hotkey {} -> {}", combo.canonical(), language);
        self.bindings.push(KeyBinding { combo, language });
        Ok(())
    }

    /// Record a press and return every binding the keystroke completed,
    /// in registration order.
    ///
    /// Only bindings whose combo includes the pressed token can fire, so a
    /// combo that stays satisfied does not re-trigger on unrelated keys.
    pub fn on_press(&mut self, token: KeyToken) -> Vec<KeyBinding> {
        self.state.press(token.clone());
        self.bindings
            .iter()
            .filter(|b| b.combo.contains(&token) && b.combo.is_satisfied_by(&self.state))
            .cloned()
            .collect()
    }

    /// Record a release. Releasing a key that was never seen is a no-op.
    pub fn on_release(&mut self, token: &KeyToken) {
        self.state.release(token);
    }

    pub fn pressed(&self) -> &KeyState {
        &self.state
    }

    pub fn bindings(&self) -> &[KeyBinding] {
        &self.bindings
    }
}
