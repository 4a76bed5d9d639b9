//! Input events consumed by the editor.

use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// Double-click detection constants.
const DOUBLE_CLICK_TIME_MS: f64 = 500.0;
const DOUBLE_CLICK_DISTANCE: f64 = 5.0;

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseButton {
    #[default]
    Primary,
    Middle,
    Secondary,
}

/// Modifier keys state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        ctrl: false,
        alt: false,
        meta: false,
    };

    pub const SHIFT: Modifiers = Modifiers {
        shift: true,
        ctrl: false,
        alt: false,
        meta: false,
    };
}

/// Which surface delivered an event.
///
/// Releases are also listened for on the whole window so a gesture that ends
/// outside the map still terminates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventTarget {
    #[default]
    Surface,
    Window,
}

/// A pointer, wheel, keyboard or resize event. Pointer positions are in
/// surface pixels unless the event came from the window, in which case they
/// are client pixels. Wheel positions are always client pixels and are
/// resolved against the surface rectangle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputEvent {
    PointerDown {
        position: Point,
        #[serde(default)]
        button: MouseButton,
        #[serde(default)]
        modifiers: Modifiers,
        #[serde(default)]
        timestamp_ms: f64,
    },
    PointerMove {
        position: Point,
    },
    PointerUp {
        position: Point,
        #[serde(default)]
        button: MouseButton,
        #[serde(default)]
        target: EventTarget,
    },
    PointerLeave,
    Wheel {
        position: Point,
        delta_y: f64,
        #[serde(default)]
        timestamp_ms: f64,
    },
    KeyDown {
        key: String,
        #[serde(default)]
        modifiers: Modifiers,
    },
    /// The map surface moved or changed size, in client pixels.
    SurfaceResized {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
}

impl InputEvent {
    pub fn pointer_down(x: f64, y: f64) -> Self {
        InputEvent::PointerDown {
            position: Point::new(x, y),
            button: MouseButton::Primary,
            modifiers: Modifiers::NONE,
            timestamp_ms: 0.0,
        }
    }

    pub fn pointer_move(x: f64, y: f64) -> Self {
        InputEvent::PointerMove {
            position: Point::new(x, y),
        }
    }

    pub fn pointer_up(x: f64, y: f64) -> Self {
        InputEvent::PointerUp {
            position: Point::new(x, y),
            button: MouseButton::Primary,
            target: EventTarget::Surface,
        }
    }

    pub fn key(key: impl Into<String>) -> Self {
        InputEvent::KeyDown {
            key: key.into(),
            modifiers: Modifiers::NONE,
        }
    }
}

/// Convert a client-space point into surface-relative pixels.
pub fn client_to_surface(point: Point, surface: Rect) -> Point {
    Point::new(point.x - surface.x0, point.y - surface.y0)
}

/// Detects double clicks from pointer-down timestamps.
#[derive(Debug, Clone, Default)]
pub struct ClickTracker {
    last_click: Option<(f64, Point)>,
}

impl ClickTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a press. Returns true when it completes a double click.
    pub fn press(&mut self, position: Point, timestamp_ms: f64) -> bool {
        let is_double = self.last_click.is_some_and(|(time, pos)| {
            let elapsed = timestamp_ms - time;
            (0.0..DOUBLE_CLICK_TIME_MS).contains(&elapsed)
                && pos.distance(position) < DOUBLE_CLICK_DISTANCE
        });
        // A double click consumes the pair so a third click starts over.
        self.last_click = if is_double {
            None
        } else {
            Some((timestamp_ms, position))
        };
        is_double
    }

    pub fn reset(&mut self) {
        self.last_click = None;
    }
}
