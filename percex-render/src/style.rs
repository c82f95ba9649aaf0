use percex_core::Encoding;
use rand::Rng;
use rand::seq::SliceRandom;
use tiny_skia::Color;

/// red, peru, purple, lightgreen, blue
pub const PALETTE: [[u8; 3]; 5] = [
    [255, 0, 0],
    [205, 133, 63],
    [128, 0, 128],
    [144, 238, 144],
    [0, 0, 255],
];

const GRADIENT_LOW: [u8; 3] = [255, 255, 0];
const GRADIENT_HIGH: [u8; 3] = [0, 128, 0];

pub const OUTLINE: Color = Color::BLACK;
pub const BACKGROUND: Color = Color::WHITE;

/// How bars are filled for one draw
#[derive(Debug, Clone, PartialEq)]
pub enum BarFill {
    Solid(Color),
    /// One color per bar, cycling if there are more bars than colors
    PerBar(Vec<Color>),
    /// Color from value on the yellow-to-green scale
    ByValue,
}

impl BarFill {
    /// Fill for an encoding; multi-color draws a fresh color order each call.
    pub fn for_encoding<R: Rng + ?Sized>(encoding: Encoding, rng: &mut R) -> Self {
        match encoding {
            Encoding::Bw => BarFill::Solid(Color::WHITE),
            Encoding::Multicolor => {
                let mut palette = PALETTE;
                palette.shuffle(rng);
                BarFill::PerBar(
                    palette
                        .iter()
                        .map(|[r, g, b]| Color::from_rgba8(*r, *g, *b, 255))
                        .collect(),
                )
            }
            Encoding::Gradient => BarFill::ByValue,
        }
    }

    pub fn color(&self, index: usize, value: u32) -> Color {
        match self {
            BarFill::Solid(c) => *c,
            BarFill::PerBar(colors) if !colors.is_empty() => colors[index % colors.len()],
            BarFill::PerBar(_) => Color::WHITE,
            BarFill::ByValue => gradient_color(value as f32),
        }
    }
}

pub fn outline(encoding: Encoding) -> Option<Color> {
    match encoding {
        Encoding::Bw => Some(OUTLINE),
        Encoding::Multicolor | Encoding::Gradient => None,
    }
}

/// Linear RGB interpolation from yellow at 0 to green at 100
pub fn gradient_color(value: f32) -> Color {
    let t = (value / 100.0).clamp(0.0, 1.0);
    let lerp = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t) / 255.0;
    Color::from_rgba(
        lerp(GRADIENT_LOW[0], GRADIENT_HIGH[0]),
        lerp(GRADIENT_LOW[1], GRADIENT_HIGH[1]),
        lerp(GRADIENT_LOW[2], GRADIENT_HIGH[2]),
        1.0,
    )
    .unwrap_or(Color::BLACK)
}
