use std::collections::{BTreeMap, BTreeSet};

use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

use crate::data::model::DimValue;

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Ten-colour qualitative sequence used for chart categories.
pub const G10: [Color32; 10] = [
    Color32::from_rgb(0x33, 0x66, 0xCC),
    Color32::from_rgb(0xDC, 0x39, 0x12),
    Color32::from_rgb(0xFF, 0x99, 0x00),
    Color32::from_rgb(0x10, 0x96, 0x18),
    Color32::from_rgb(0x99, 0x00, 0x99),
    Color32::from_rgb(0x00, 0x99, 0xC6),
    Color32::from_rgb(0xDD, 0x44, 0x77),
    Color32::from_rgb(0x66, 0xAA, 0x00),
    Color32::from_rgb(0xB8, 0x2E, 0x2E),
    Color32::from_rgb(0x31, 0x63, 0x95),
];

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Color32> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.55);
            let rgb: Srgb = hsl.into_color();
            Color32::from_rgb(
                (rgb.red * 255.0) as u8,
                (rgb.green * 255.0) as u8,
                (rgb.blue * 255.0) as u8,
            )
        })
        .collect()
}

/// The qualitative sequence while it lasts, evenly spaced hues beyond it.
pub fn category_palette(n: usize) -> Vec<Color32> {
    if n <= G10.len() {
        G10[..n].to_vec()
    } else {
        generate_palette(n)
    }
}

// ---------------------------------------------------------------------------
// Color mapping: category value → Color32
// ---------------------------------------------------------------------------

/// Maps the values of the chart's category dimension to distinct colours.
#[derive(Debug, Clone)]
pub struct ColorMap {
    mapping: BTreeMap<DimValue, Color32>,
    default_color: Color32,
}

impl ColorMap {
    /// Build a colour map from the sorted set of values to display.
    pub fn new(values: &BTreeSet<DimValue>) -> Self {
        let palette = category_palette(values.len());
        let mapping: BTreeMap<DimValue, Color32> = values
            .iter()
            .zip(palette)
            .map(|(v, c)| (v.clone(), c))
            .collect();

        ColorMap {
            mapping,
            default_color: Color32::GRAY,
        }
    }

    /// Look up the colour for a given category value.
    pub fn color_for(&self, value: &DimValue) -> Color32 {
        self.mapping
            .get(value)
            .copied()
            .unwrap_or(self.default_color)
    }
}
