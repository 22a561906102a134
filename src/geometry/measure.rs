//! Text measurement.
//!
//! Real rasterization (typesetting a label to find its size) is slow, so
//! every measurement goes through [`MeasureCache`], keyed by a hash of the
//! content and style. The cache never invalidates on its own; callers evict.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use glam::{DVec2, dvec2};

/// Style inputs that change a label's size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub scale: f64,
}

impl Default for TextStyle {
    fn default() -> Self {
        TextStyle { scale: 1.0 }
    }
}

impl TextStyle {
    fn hash_into(&self, state: &mut impl Hasher) {
        self.scale.to_bits().hash(state);
    }
}

/// Produces the size of a rendered label in world units.
pub trait TextMeasurer: fmt::Debug {
    fn measure(&self, text: &str, style: &TextStyle) -> DVec2;
}

/// Proportional character widths, in hundredths of the average character.
#[rustfmt::skip]
const CHAR_WIDTHS: [u8; 95] = [
    45,  55,  62, 115,  90, 132, 125,  40,
    55,  55,  71, 115,  45,  48,  45,  50,
    91,  91,  91,  91,  91,  91,  91,  91,
    91,  91,  50,  50, 120, 120, 120,  78,
   142, 102, 105, 110, 115, 105,  98, 105,
   125,  58,  58, 107,  95, 145, 125, 115,
    95, 115, 107,  95,  97, 118, 102, 150,
   100,  93, 100,  58,  50,  58, 119,  72,
    72,  86,  92,  80,  92,  85,  52,  92,
    92,  47,  47,  88,  48, 135,  92,  86,
    92,  92,  69,  75,  58,  92,  80, 121,
    81,  80,  76,  91,  49,  91, 118,
];

/// Width of one line in hundredths of a character.
fn line_length(line: &str) -> u32 {
    line.chars()
        .map(|c| {
            if (' '..='~').contains(&c) {
                CHAR_WIDTHS[c as usize - 0x20] as u32
            } else {
                100
            }
        })
        .sum()
}

/// Estimates label size from a character-width table; no rasterizer needed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CharWidthMeasurer {
    pub char_width: f64,
    pub char_height: f64,
}

impl TextMeasurer for CharWidthMeasurer {
    fn measure(&self, text: &str, style: &TextStyle) -> DVec2 {
        if text.is_empty() {
            return DVec2::ZERO;
        }
        let widest = text.lines().map(line_length).max().unwrap_or(0);
        let lines = text.lines().count().max(1);
        dvec2(
            widest as f64 * self.char_width * 0.01,
            lines as f64 * self.char_height,
        ) * style.scale
    }
}

#[derive(Debug, Default)]
pub struct MeasureCache {
    entries: HashMap<u64, DVec2>,
    misses: usize,
}

impl MeasureCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(text: &str, style: &TextStyle) -> u64 {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        style.hash_into(&mut hasher);
        hasher.finish()
    }

    /// Measure through the cache.
    pub fn measure(&mut self, measurer: &dyn TextMeasurer, text: &str, style: &TextStyle) -> DVec2 {
        let key = Self::key(text, style);
        if let Some(&size) = self.entries.get(&key) {
            return size;
        }
        self.misses += 1;
        let size = measurer.measure(text, style);
        self.entries.insert(key, size);
        size
    }

    /// Drop one entry. Returns whether it was cached.
    pub fn evict(&mut self, text: &str, style: &TextStyle) -> bool {
        self.entries.remove(&Self::key(text, style)).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of calls that reached the measurer.
    pub fn misses(&self) -> usize {
        self.misses
    }
}
