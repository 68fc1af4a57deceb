use std::fmt;

/// Identity handle for an element of the host document.
///
/// Two handles are equal only when they name the same arena slot, never because two
/// elements happen to look alike.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub usize);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A rectangle in terminal cells, relative to the document viewport.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DomRect {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

impl DomRect {
    pub fn new(left: i32, top: i32, width: i32, height: i32) -> Self {
        Self { left, top, width, height }
    }

    pub fn right(&self) -> i32 {
        self.left + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.top + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Shifts the rectangle by the given offset.
    pub fn translate(&self, dx: i32, dy: i32) -> Self {
        Self { left: self.left + dx, top: self.top + dy, ..*self }
    }

    pub fn intersects(&self, other: &DomRect) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.left < other.right()
            && other.left < self.right()
            && self.top < other.bottom()
            && other.top < self.bottom()
    }
}

/// Modifier keys carried by synthetic pointer events and shortcuts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers { ctrl: false, alt: false, shift: false, meta: false };
    pub const SHIFT: Modifiers = Modifiers { ctrl: false, alt: false, shift: true, meta: false };
    pub const CTRL: Modifiers = Modifiers { ctrl: true, alt: false, shift: false, meta: false };
}

/// Where keystrokes are currently routed in the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FocusArea {
    Document,
    /// The invisible capture element owned by an active hinting session.
    HintCapture,
    Editing,
}
