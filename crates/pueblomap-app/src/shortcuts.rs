//! Keyboard and pointer shortcut registry and documentation.

/// A shortcut definition.
#[derive(Debug, Clone)]
pub struct Shortcut {
    pub key: &'static str,
    pub shift: bool,
    pub description: &'static str,
}

impl Shortcut {
    pub const fn new(key: &'static str, shift: bool, description: &'static str) -> Self {
        Self {
            key,
            shift,
            description,
        }
    }

    /// Format the shortcut for display (e.g., "Shift+Drag").
    pub fn format(&self) -> String {
        if self.shift {
            format!("Shift+{}", self.key)
        } else {
            self.key.to_string()
        }
    }
}

/// Registry of all shortcuts the editor understands.
pub struct ShortcutRegistry;

impl ShortcutRegistry {
    /// Get all registered shortcuts.
    pub fn all() -> Vec<Shortcut> {
        vec![
            Shortcut::new("Escape", false, "Cancel drag, marquee, edit, then selection"),
            Shortcut::new("+", false, "Zoom in"),
            Shortcut::new("-", false, "Zoom out"),
            Shortcut::new("0", false, "Reset view"),
            Shortcut::new("F", false, "Fit all elements"),
            Shortcut::new("Wheel", false, "Zoom around the pointer"),
            Shortcut::new("Drag", false, "Move element, or pan on empty map"),
            Shortcut::new("Middle Drag", false, "Pan"),
            Shortcut::new("Drag", true, "Marquee select"),
            Shortcut::new("Click", true, "Toggle element in selection"),
            Shortcut::new("Double Click", false, "Edit element"),
        ]
    }

    /// Print all shortcuts to console.
    pub fn print_all() {
        println!("\n=== Shortcuts ===");
        for shortcut in Self::all() {
            println!("  {:20} {}", shortcut.format(), shortcut.description);
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format() {
        assert_eq!(Shortcut::new("Drag", true, "").format(), "Shift+Drag");
        assert_eq!(Shortcut::new("F", false, "").format(), "F");
    }
}
