use anyhow::{anyhow, Result};
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgb, RgbImage};

use super::font::{draw_text, GLYPH_HEIGHT};
use super::layout::{
    Rect, ACCURACY_BOX, BUTTONS, CANVAS_HEIGHT, CANVAS_WIDTH, CENTER_PANEL, EMOJI_SLOT, FACE_SLOT,
    LEFT_PANEL, RIGHT_PANEL,
};
use super::PointerAction;
use crate::assets::EmojiTable;
use crate::frame::Frame;
use crate::state::UiState;

const BACKGROUND: [u8; 3] = [255, 255, 255];
const INK: [u8; 3] = [0, 0, 0];
const BUTTON_INK: [u8; 3] = [255, 255, 255];
const FLASH_ACTIVE_FILL: [u8; 3] = [240, 190, 40];
const OUTLINE: u32 = 2;

/// Which piece of the layout a text span belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextRole {
    Heading,
    Caption,
    EmotionLabel,
    Accuracy,
    Button,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextSpan {
    pub role: TextRole,
    pub text: String,
    pub x: u32,
    pub y: u32,
    pub scale: u32,
}

/// A composed display frame: pixels plus the text painted into them.
#[derive(Clone, Debug)]
pub struct Surface {
    image: RgbImage,
    texts: Vec<TextSpan>,
}

impl Surface {
    fn blank() -> Self {
        Self {
            image: RgbImage::from_pixel(CANVAS_WIDTH, CANVAS_HEIGHT, Rgb(BACKGROUND)),
            texts: Vec::new(),
        }
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn texts(&self) -> &[TextSpan] {
        &self.texts
    }

    /// First text painted for `role`.
    pub fn text(&self, role: TextRole) -> Option<&str> {
        self.texts
            .iter()
            .find(|span| span.role == role)
            .map(|span| span.text.as_str())
    }

    /// Pixels packed as `0x00RRGGBB`, row-major.
    pub fn to_rgb32(&self) -> Vec<u32> {
        self.image
            .pixels()
            .map(|p| {
                let [r, g, b] = p.0;
                ((r as u32) << 16) | ((g as u32) << 8) | b as u32
            })
            .collect()
    }

    /// Paint text whose baseline sits at `baseline`.
    fn label(&mut self, role: TextRole, text: String, x: u32, baseline: u32, scale: u32, color: [u8; 3]) {
        let y = baseline.saturating_sub(GLYPH_HEIGHT * scale);
        draw_text(&mut self.image, &text, x, y, scale, color);
        self.texts.push(TextSpan {
            role,
            text,
            x,
            y,
            scale,
        });
    }
}

/// Build the three-panel display for one frame.
///
/// Never fails: a missing frame or emoji leaves its slot blank, and a
/// sub-element that cannot be placed is skipped with a log line.
pub fn compose(frame: Option<&Frame>, state: &UiState, emojis: &EmojiTable) -> Surface {
    let mut surface = Surface::blank();

    // Left panel
    outline(&mut surface.image, LEFT_PANEL, INK);
    surface.label(TextRole::Heading, "REACTION".into(), 90, 40, 3, INK);
    if let Some(image) = state.emoji_key().and_then(|key| emojis.get(key)) {
        if let Err(e) = draw_emoji(&mut surface.image, image, EMOJI_SLOT) {
            log::warn!("emoji render failed: {:#}", e);
        }
    }
    surface.label(TextRole::Caption, "DETECTED EMOTION:".into(), 50, 300, 2, INK);
    surface.label(TextRole::EmotionLabel, state.display_label(), 80, 350, 4, INK);

    // Center panel
    outline(&mut surface.image, CENTER_PANEL, INK);
    if let Some(frame) = frame {
        if let Err(e) = draw_frame(&mut surface.image, frame, FACE_SLOT) {
            log::warn!("frame render failed: {:#}", e);
        }
    }
    outline(&mut surface.image, ACCURACY_BOX, INK);
    surface.label(
        TextRole::Accuracy,
        format!("ACCURACY: {}%", state.display_score()),
        460,
        570,
        2,
        INK,
    );

    // Right panel
    outline(&mut surface.image, RIGHT_PANEL, INK);
    for button in BUTTONS {
        let fill = if button.action == PointerAction::FlashToggle && state.flash_on {
            FLASH_ACTIVE_FILL
        } else {
            button.fill
        };
        fill_rect(&mut surface.image, button.rect, fill);
        surface.label(
            TextRole::Button,
            button.label.to_string(),
            button.rect.x0 + 50,
            button.rect.y0 + 35,
            3,
            BUTTON_INK,
        );
    }

    surface
}

fn check_slot(canvas: &RgbImage, slot: Rect) -> Result<()> {
    if slot.fits(canvas.width(), canvas.height()) {
        Ok(())
    } else {
        Err(anyhow!("slot {:?} does not fit the canvas", slot))
    }
}

/// Scale the emoji into `slot`, alpha blending when it has an alpha channel.
fn draw_emoji(canvas: &mut RgbImage, emoji: &DynamicImage, slot: Rect) -> Result<()> {
    check_slot(canvas, slot)?;
    if emoji.width() == 0 || emoji.height() == 0 {
        return Err(anyhow!("emoji has no pixels"));
    }
    let blend = emoji.color().has_alpha();
    let resized = imageops::resize(&emoji.to_rgba8(), slot.width(), slot.height(), FilterType::Triangle);
    for (x, y, pixel) in resized.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let target = canvas.get_pixel_mut(slot.x0 + x, slot.y0 + y);
        if blend {
            let alpha = a as f32 / 255.0;
            for (dst, src) in target.0.iter_mut().zip([r, g, b]) {
                *dst = (alpha * src as f32 + (1.0 - alpha) * *dst as f32).round() as u8;
            }
        } else {
            target.0 = [r, g, b];
        }
    }
    Ok(())
}

fn draw_frame(canvas: &mut RgbImage, frame: &Frame, slot: Rect) -> Result<()> {
    check_slot(canvas, slot)?;
    let resized = imageops::resize(frame.image(), slot.width(), slot.height(), FilterType::Triangle);
    imageops::replace(canvas, &resized, slot.x0 as i64, slot.y0 as i64);
    Ok(())
}

fn fill_rect(canvas: &mut RgbImage, rect: Rect, color: [u8; 3]) {
    let (width, height) = canvas.dimensions();
    for y in rect.y0..=rect.y1.min(height.saturating_sub(1)) {
        for x in rect.x0..=rect.x1.min(width.saturating_sub(1)) {
            canvas.put_pixel(x, y, Rgb(color));
        }
    }
}

fn outline(canvas: &mut RgbImage, rect: Rect, color: [u8; 3]) {
    let t = OUTLINE - 1;
    let edges = [
        Rect::new(rect.x0, rect.y0, rect.x1, rect.y0 + t),
        Rect::new(rect.x0, rect.y1.saturating_sub(t), rect.x1, rect.y1),
        Rect::new(rect.x0, rect.y0, rect.x0 + t, rect.y1),
        Rect::new(rect.x1.saturating_sub(t), rect.y0, rect.x1, rect.y1),
    ];
    for edge in edges {
        fill_rect(canvas, edge, color);
    }
}
