//! Emoji assets, keyed by emotion label.
//!
//! Loaded once at startup from `<dir>/<label>.png`. A missing directory is a
//! startup error; missing or unreadable files are logged and left out.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, Result};
use image::DynamicImage;

use crate::detect::Emotion;

#[derive(Default)]
pub struct EmojiTable {
    images: HashMap<Emotion, DynamicImage>,
}

impl EmojiTable {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn load(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(anyhow!("emoji directory {} not found", dir.display()));
        }

        let mut table = Self::empty();
        for emotion in Emotion::ALL {
            let path = dir.join(format!("{}.png", emotion.label()));
            if !path.exists() {
                log::warn!("emoji missing: {}", path.display());
                continue;
            }
            match image::open(&path) {
                Ok(image) => table.insert(emotion, image),
                Err(e) => log::warn!("could not load emoji {}: {}", path.display(), e),
            }
        }
        log::info!(
            "loaded {}/{} emoji from {}",
            table.len(),
            Emotion::ALL.len(),
            dir.display()
        );
        Ok(table)
    }

    pub fn insert(&mut self, emotion: Emotion, image: DynamicImage) {
        self.images.insert(emotion, image);
    }

    pub fn get(&self, emotion: Emotion) -> Option<&DynamicImage> {
        self.images.get(&emotion)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}
