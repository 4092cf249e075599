//! Fixed canvas layout.
//!
//! Drawing and hit testing both read `BUTTONS`, so the clickable regions and
//! the painted buttons cannot drift apart.

pub const CANVAS_WIDTH: u32 = 1200;
pub const CANVAS_HEIGHT: u32 = 600;

/// Axis-aligned rectangle with inclusive edges.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rect {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl Rect {
    pub const fn new(x0: u32, y0: u32, x1: u32, y1: u32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Rectangle from an origin and a size in pixels.
    pub const fn sized(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self::new(x, y, x + width - 1, y + height - 1)
    }

    pub fn width(&self) -> u32 {
        self.x1 - self.x0 + 1
    }

    pub fn height(&self) -> u32 {
        self.y1 - self.y0 + 1
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x0 as f32 && x <= self.x1 as f32 && y >= self.y0 as f32 && y <= self.y1 as f32
    }

    pub fn fits(&self, width: u32, height: u32) -> bool {
        self.x0 <= self.x1 && self.y0 <= self.y1 && self.x1 < width && self.y1 < height
    }
}

pub const LEFT_PANEL: Rect = Rect::new(0, 0, 300, CANVAS_HEIGHT - 1);
pub const CENTER_PANEL: Rect = Rect::new(300, 0, 900, CANVAS_HEIGHT - 1);
pub const RIGHT_PANEL: Rect = Rect::new(900, 0, CANVAS_WIDTH - 1, CANVAS_HEIGHT - 1);

pub const EMOJI_SLOT: Rect = Rect::sized(75, 70, 150, 150);
pub const FACE_SLOT: Rect = Rect::sized(360, 50, 480, 480);
pub const ACCURACY_BOX: Rect = Rect::new(450, 540, 750, 580);

/// What a pointer press on the canvas means.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerAction {
    Quit,
    FlashToggle,
    None,
}

#[derive(Clone, Copy, Debug)]
pub struct Button {
    pub action: PointerAction,
    pub rect: Rect,
    pub label: &'static str,
    pub fill: [u8; 3],
}

pub const FLASH_BUTTON: Button = Button {
    action: PointerAction::FlashToggle,
    rect: Rect::new(950, 400, 1150, 450),
    label: "FLASH",
    fill: [200, 80, 80],
};

pub const QUIT_BUTTON: Button = Button {
    action: PointerAction::Quit,
    rect: Rect::new(950, 500, 1150, 550),
    label: "QUIT",
    fill: [50, 50, 50],
};

pub const BUTTONS: [Button; 2] = [FLASH_BUTTON, QUIT_BUTTON];

/// Map a pointer press to its action. Buttons do not overlap.
pub fn hit_test(x: f32, y: f32) -> PointerAction {
    BUTTONS
        .iter()
        .find(|button| button.rect.contains(x, y))
        .map(|button| button.action)
        .unwrap_or(PointerAction::None)
}
