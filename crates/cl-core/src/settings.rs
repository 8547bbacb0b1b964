//! User-facing options.

use serde::{Deserialize, Serialize};

/// Modifier key that may be designated as the bypass modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModifierKey {
    #[default]
    Alt,
    Shift,
    Ctrl,
    Meta,
}

impl ModifierKey {
    /// Map a `KeyboardEvent.key` value to a modifier.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "Alt" | "AltGraph" => Some(ModifierKey::Alt),
            "Shift" => Some(ModifierKey::Shift),
            "Control" => Some(ModifierKey::Ctrl),
            "Meta" | "OS" => Some(ModifierKey::Meta),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ModifierKey::Alt => "alt",
            ModifierKey::Shift => "shift",
            ModifierKey::Ctrl => "ctrl",
            ModifierKey::Meta => "meta",
        }
    }
}

/// Lock options. Every field falls back to its default when missing from
/// persisted data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockSettings {
    /// Holding [`Self::bypass_modifier`] suspends enforcement.
    pub allow_edit_with_modifier: bool,
    pub bypass_modifier: ModifierKey,
    /// Suppress pointer-move from a pointer pressed on a locked node.
    pub block_pointer_drag: bool,
    /// Add [`LOCKED_CLASS`] to locked node elements.
    pub mark_locked_nodes: bool,
}

/// CSS class applied to locked node elements.
pub const LOCKED_CLASS: &str = "canvas-lock-locked";

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            allow_edit_with_modifier: false,
            bypass_modifier: ModifierKey::Alt,
            block_pointer_drag: true,
            mark_locked_nodes: true,
        }
    }
}

impl LockSettings {
    /// Parse a settings record, filling gaps with defaults.
    pub fn from_json(text: &str) -> Result<Self, String> {
        serde_json::from_str(text).map_err(|e| format!("invalid settings: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_fields_take_defaults() {
        let s = LockSettings::from_json(r#"{"allow_edit_with_modifier": true}"#).unwrap();
        assert_eq!(
            s,
            LockSettings {
                allow_edit_with_modifier: true,
                ..LockSettings::default()
            }
        );
    }

    #[test]
    fn modifier_names_roundtrip_through_json() {
        let s = LockSettings::from_json(r#"{"bypass_modifier": "meta"}"#).unwrap();
        assert_eq!(s.bypass_modifier, ModifierKey::Meta);
        assert!(LockSettings::from_json(r#"{"bypass_modifier": "hyper"}"#).is_err());
    }

    #[test]
    fn keyboard_keys_map_to_modifiers() {
        assert_eq!(ModifierKey::from_key("Control"), Some(ModifierKey::Ctrl));
        assert_eq!(ModifierKey::from_key("ArrowLeft"), None);
    }
}
