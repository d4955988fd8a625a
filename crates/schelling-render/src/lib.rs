//! Draws a [`PopulationSnapshot`] into a single-frame GIF: a titled strip on
//! top, then one colored square per agent. Vacant cells render white.

use schelling_core::{Category, PopulationSnapshot};
use std::fs::File;
use std::path::PathBuf;
use std::{error::Error, fmt};

/// Category palette, indexed by `category - 1`: blue, red, green, cyan,
/// magenta, yellow, black.
pub const AGENT_COLORS: [[u8; 3]; 7] = [
    [0x00, 0x00, 0xFF],
    [0xFF, 0x00, 0x00],
    [0x00, 0x80, 0x00],
    [0x00, 0xC0, 0xC0],
    [0xC0, 0x00, 0xC0],
    [0xC0, 0xC0, 0x00],
    [0x00, 0x00, 0x00],
];

const VACANT_COLOR: [u8; 3] = [0xFF, 0xFF, 0xFF];
const TITLE_BACKGROUND: [u8; 3] = [0xE8, 0xE8, 0xE8];
const TITLE_COLOR: [u8; 3] = [0x20, 0x20, 0x20];

/// GIF frames address at most `u16::MAX` pixels per side.
const MAX_SIDE: u64 = u16::MAX as u64;

#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Each grid cell is drawn as `cell_scale` x `cell_scale` pixels.
    /// A value of zero is treated as one.
    pub cell_scale: u32,
    /// Height in pixels of the title strip above the grid.
    pub title_height: u32,
    /// Directory receiving the rendered files.
    pub output_dir: PathBuf,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            cell_scale: 8,
            title_height: 14,
            output_dir: PathBuf::from("tmp"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderResult {
    pub path: PathBuf,
    pub image_width: u32,
    pub image_height: u32,
}

#[derive(Debug)]
pub enum RenderError {
    PaletteExhausted { category: Category },
    ImageTooLarge { width: u64, height: u64 },
    Io(std::io::Error),
    Encode(gif::EncodingError),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::PaletteExhausted { category } => write!(
                f,
                "category {category} has no palette color (1..={} are drawable)",
                AGENT_COLORS.len()
            ),
            RenderError::ImageTooLarge { width, height } => {
                write!(f, "image {width}x{height} exceeds the GIF frame limit")
            }
            RenderError::Io(e) => write!(f, "{}", e),
            RenderError::Encode(e) => write!(f, "{}", e),
        }
    }
}

impl From<std::io::Error> for RenderError {
    fn from(err: std::io::Error) -> Self {
        RenderError::Io(err)
    }
}

impl From<gif::EncodingError> for RenderError {
    fn from(err: gif::EncodingError) -> Self {
        RenderError::Encode(err)
    }
}

impl Error for RenderError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RenderError::Io(e) => Some(e),
            RenderError::Encode(e) => Some(e),
            _ => None,
        }
    }
}

/// Render `snapshot` to `<output_dir>/<sanitized output_name>.gif`.
///
/// The pixel buffer is composed before any file is touched, so palette and
/// size failures never leave a partial file behind.
pub fn render_snapshot(
    snapshot: &PopulationSnapshot,
    title: &str,
    output_name: &str,
    options: &RenderOptions,
) -> Result<RenderResult, RenderError> {
    let scale = u64::from(options.cell_scale.max(1));
    let width = u64::from(snapshot.width) * scale;
    let height = u64::from(snapshot.height) * scale + u64::from(options.title_height);
    if width > MAX_SIDE || height > MAX_SIDE {
        return Err(RenderError::ImageTooLarge { width, height });
    }
    let (img_width, img_height) = (width as u32, height as u32);

    let mut pixels = compose_pixels(snapshot, title, img_width, img_height, options)?;

    std::fs::create_dir_all(&options.output_dir)?;
    let path = options
        .output_dir
        .join(format!("{}.gif", sanitize_name(output_name)));
    let file = File::create(&path)?;
    let mut encoder = gif::Encoder::new(file, img_width as u16, img_height as u16, &[])?;
    // speed=1 trades encoding time for the best quantization.
    let frame = gif::Frame::from_rgba_speed(img_width as u16, img_height as u16, &mut pixels, 1);
    encoder.write_frame(&frame)?;

    Ok(RenderResult {
        path,
        image_width: img_width,
        image_height: img_height,
    })
}

/// RGBA buffer: title strip on top, scaled grid below on a white background.
fn compose_pixels(
    snapshot: &PopulationSnapshot,
    title: &str,
    img_width: u32,
    img_height: u32,
    options: &RenderOptions,
) -> Result<Vec<u8>, RenderError> {
    let scale = options.cell_scale.max(1);
    let mut pixels = vec![0u8; img_width as usize * img_height as usize * 4];

    for y in 0..img_height {
        let color = if y < options.title_height {
            TITLE_BACKGROUND
        } else {
            VACANT_COLOR
        };
        for x in 0..img_width {
            put_pixel(&mut pixels, img_width, img_height, x, y, color);
        }
    }

    render_text(&mut pixels, img_width, img_height, 2, 3, title, TITLE_COLOR);

    for &(cell, category) in &snapshot.agents {
        let color = palette_color(category)?;
        for dy in 0..scale {
            for dx in 0..scale {
                // Cells outside the declared grid clip rather than wrap.
                let px = cell.x.saturating_mul(scale).saturating_add(dx);
                let py = options
                    .title_height
                    .saturating_add(cell.y.saturating_mul(scale))
                    .saturating_add(dy);
                put_pixel(&mut pixels, img_width, img_height, px, py, color);
            }
        }
    }

    Ok(pixels)
}

fn palette_color(category: Category) -> Result<[u8; 3], RenderError> {
    (category as usize)
        .checked_sub(1)
        .and_then(|i| AGENT_COLORS.get(i))
        .copied()
        .ok_or(RenderError::PaletteExhausted { category })
}

/// Keep alphanumerics and dashes; everything else becomes an underscore.
fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

fn put_pixel(pixels: &mut [u8], img_width: u32, img_height: u32, x: u32, y: u32, color: [u8; 3]) {
    if x < img_width && y < img_height {
        let idx = (y as usize * img_width as usize + x as usize) * 4;
        pixels[idx..idx + 3].copy_from_slice(&color);
        pixels[idx + 3] = 0xFF;
    }
}

/// Stamp `text` with the built-in 5x7 font, one pixel of spacing per glyph.
fn render_text(
    pixels: &mut [u8],
    img_width: u32,
    img_height: u32,
    start_x: u32,
    start_y: u32,
    text: &str,
    color: [u8; 3],
) {
    let mut cursor_x = start_x;
    for ch in text.chars() {
        let bitmap = glyph(ch);
        for (row, &bits) in bitmap.iter().enumerate() {
            for col in 0..5u32 {
                if (bits >> (4 - col)) & 1 == 1 {
                    put_pixel(
                        pixels,
                        img_width,
                        img_height,
                        cursor_x + col,
                        start_y + row as u32,
                        color,
                    );
                }
            }
        }
        cursor_x += 6;
    }
}

/// 5x7 bitmaps for `a..=z`, case-insensitive. Each byte is one row, MSB of
/// the top five bits leftmost.
const LETTER_GLYPHS: [[u8; 7]; 26] = [
    [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
    [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
    [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
    [0b11110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11110],
    [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
    [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
    [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01110],
    [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
    [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
    [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100],
    [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
    [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
    [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
    [0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001, 0b10001],
    [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
    [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
    [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101],
    [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
    [0b01110, 0b10001, 0b10000, 0b01110, 0b00001, 0b10001, 0b01110],
    [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
    [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
    [0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b01010, 0b00100],
    [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b11011, 0b10001],
    [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001],
    [0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100, 0b00100],
    [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111],
];

/// 5x7 bitmaps for `0..=9`.
const DIGIT_GLYPHS: [[u8; 7]; 10] = [
    [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
    [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
    [0b01110, 0b10001, 0b00001, 0b00110, 0b01000, 0b10000, 0b11111],
    [0b01110, 0b10001, 0b00001, 0b00110, 0b00001, 0b10001, 0b01110],
    [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
    [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
    [0b01110, 0b10000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
    [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
    [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
    [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00001, 0b01110],
];

fn glyph(ch: char) -> [u8; 7] {
    if let Some(digit) = ch.to_digit(10) {
        return DIGIT_GLYPHS[digit as usize];
    }
    if ch.is_ascii_alphabetic() {
        return LETTER_GLYPHS[(ch.to_ascii_lowercase() as u8 - b'a') as usize];
    }
    match ch {
        ' ' => [0; 7],
        ':' => [0b00000, 0b00100, 0b00100, 0b00000, 0b00100, 0b00100, 0b00000],
        '.' => [0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b00100, 0b00100],
        ',' => [0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b00100, 0b01000],
        '-' => [0b00000, 0b00000, 0b00000, 0b11111, 0b00000, 0b00000, 0b00000],
        '%' => [0b11001, 0b11010, 0b00010, 0b00100, 0b01000, 0b01011, 0b10011],
        '/' => [0b00001, 0b00010, 0b00010, 0b00100, 0b01000, 0b01000, 0b10000],
        '(' => [0b00010, 0b00100, 0b01000, 0b01000, 0b01000, 0b00100, 0b00010],
        ')' => [0b01000, 0b00100, 0b00010, 0b00010, 0b00010, 0b00100, 0b01000],
        // Unknown characters render as a filled box.
        _ => [0b11111, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11111],
    }
}
