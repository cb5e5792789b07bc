pub mod bitmap_font;

use crate::logw;
use fontdue::{Font, FontSettings};
use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Bold sans faces probed in order before falling back to the bitmap face.
pub const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans-Bold.ttf",
    "/Library/Fonts/Arial Bold.ttf",
    "/System/Library/Fonts/Supplemental/Arial Bold.ttf",
    "C:\\Windows\\Fonts\\arialbd.ttf",
    "arial.ttf",
];

const PLATE_PAD: f32 = 8.0;
const OUTLINE_PX: i32 = 2;
const TEXT_COLOR: [u8; 3] = [255, 255, 255];
const OUTLINE_COLOR: [u8; 3] = [0, 0, 0];

#[derive(Debug, Error)]
pub enum CaptionError {
    #[error("font {path}: {reason}")]
    Font { path: String, reason: String },
    #[error("image: {0}")]
    Image(#[from] image::ImageError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptionPosition {
    Bottom,
    Center,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlateMode {
    /// One translucent box per line.
    Line,
    /// One box around the whole block.
    Block,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WrapMode {
    Word,
    Char,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionStyle {
    pub font_size: f32,
    /// Kept clear on each side of the frame.
    pub margin: u32,
    pub line_spacing: u32,
    pub bottom_offset: u32,
    pub position: CaptionPosition,
    pub plate: PlateMode,
    pub plate_alpha: u8,
    pub outline: bool,
    pub wrap: WrapMode,
    pub font_path: Option<PathBuf>,
}

impl Default for CaptionStyle {
    fn default() -> Self {
        Self {
            font_size: 32.0,
            margin: 30,
            line_spacing: 12,
            bottom_offset: 120,
            position: CaptionPosition::Bottom,
            plate: PlateMode::Line,
            plate_alpha: 160,
            outline: false,
            wrap: WrapMode::Word,
            font_path: None,
        }
    }
}

pub enum CaptionFont {
    Vector(Box<Font>),
    /// Built-in 5x7 face; widths are estimated per character.
    Bitmap,
}

impl CaptionFont {
    pub fn from_bytes(bytes: Vec<u8>, label: &str) -> Result<Self, CaptionError> {
        Font::from_bytes(bytes, FontSettings::default())
            .map(|f| CaptionFont::Vector(Box::new(f)))
            .map_err(|reason| CaptionError::Font {
                path: label.to_string(),
                reason: reason.to_string(),
            })
    }

    /// An explicit font path first, then the system list, then the bitmap face.
    pub fn resolve(preferred: Option<&Path>) -> Self {
        let candidates = preferred
            .into_iter()
            .map(Path::to_path_buf)
            .chain(SYSTEM_FONTS.iter().map(PathBuf::from));

        for path in candidates {
            let Ok(bytes) = std::fs::read(&path) else {
                continue;
            };
            match Self::from_bytes(bytes, &path.display().to_string()) {
                Ok(font) => return font,
                Err(err) => logw(format!("Skipping unusable font: {}", err)),
            }
        }

        logw("No scalable font found; captions use the built-in bitmap face");
        CaptionFont::Bitmap
    }

    pub fn is_bitmap(&self) -> bool {
        matches!(self, CaptionFont::Bitmap)
    }

    pub fn measure(&self, text: &str, px: f32) -> f32 {
        match self {
            CaptionFont::Vector(font) => text.chars().map(|c| font.metrics(c, px).advance_width).sum(),
            CaptionFont::Bitmap => bitmap_font::text_width(text, bitmap_font::scale_for(px)) as f32,
        }
    }

    fn draw_line(&self, img: &mut RgbaImage, text: &str, x: f32, top: f32, px: f32, color: [u8; 3]) {
        match self {
            CaptionFont::Vector(font) => {
                let ascent = font
                    .horizontal_line_metrics(px)
                    .map(|m| m.ascent)
                    .unwrap_or(px * 0.8);
                let baseline = top + ascent;
                let mut pen_x = x;
                for ch in text.chars() {
                    let (metrics, coverage) = font.rasterize(ch, px);
                    let gx = (pen_x + metrics.xmin as f32).round() as i64;
                    let gy = (baseline - metrics.height as f32 - metrics.ymin as f32).round() as i64;
                    for row in 0..metrics.height {
                        for col in 0..metrics.width {
                            let a = coverage[row * metrics.width + col];
                            if a == 0 {
                                continue;
                            }
                            blend(img, gx + col as i64, gy + row as i64, color, a as f32 / 255.0);
                        }
                    }
                    pen_x += metrics.advance_width;
                }
            }
            CaptionFont::Bitmap => {
                let scale = bitmap_font::scale_for(px);
                let glyph_h = (bitmap_font::GLYPH_H * scale) as f32;
                let ox = x.round() as i64;
                let oy = (top + (px - glyph_h).max(0.0) / 2.0).round() as i64;
                bitmap_font::for_each_pixel(text, scale, |dx, dy| {
                    blend(img, ox + dx as i64, oy + dy as i64, color, 1.0);
                });
            }
        }
    }
}

/// Splits `text` into lines no wider than `max_width` according to `measure`.
///
/// Word mode never breaks inside a word, so a single overlong word gets a line of
/// its own. Char mode breaks anywhere.
pub fn wrap_text<F>(text: &str, max_width: f32, mode: WrapMode, measure: F) -> Vec<String>
where
    F: Fn(&str) -> f32,
{
    let mut lines = Vec::new();
    let mut current = String::new();

    match mode {
        WrapMode::Word => {
            for word in text.split_whitespace() {
                let candidate = if current.is_empty() {
                    word.to_string()
                } else {
                    format!("{current} {word}")
                };
                if current.is_empty() || measure(&candidate) <= max_width {
                    current = candidate;
                } else {
                    lines.push(std::mem::replace(&mut current, word.to_string()));
                }
            }
        }
        WrapMode::Char => {
            let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
            for ch in normalized.chars() {
                if current.is_empty() && ch == ' ' {
                    continue;
                }
                let mut candidate = current.clone();
                candidate.push(ch);
                if current.is_empty() || measure(&candidate) <= max_width {
                    current = candidate;
                } else {
                    lines.push(current.trim_end().to_string());
                    current = if ch == ' ' { String::new() } else { ch.to_string() };
                }
            }
        }
    }

    if !current.is_empty() {
        lines.push(current.trim_end().to_string());
    }
    lines
}

pub struct CaptionRenderer {
    font: CaptionFont,
    style: CaptionStyle,
}

impl CaptionRenderer {
    pub fn new(style: CaptionStyle) -> Self {
        let font = CaptionFont::resolve(style.font_path.as_deref());
        Self { font, style }
    }

    pub fn with_font(font: CaptionFont, style: CaptionStyle) -> Self {
        Self { font, style }
    }

    pub fn style(&self) -> &CaptionStyle {
        &self.style
    }

    pub fn safe_width(&self, frame_width: u32) -> f32 {
        frame_width.saturating_sub(self.style.margin * 2) as f32
    }

    pub fn line_width(&self, line: &str) -> f32 {
        self.font.measure(line, self.style.font_size)
    }

    pub fn layout(&self, text: &str, frame_width: u32) -> Vec<String> {
        let px = self.style.font_size;
        wrap_text(text, self.safe_width(frame_width), self.style.wrap, |s| {
            self.font.measure(s, px)
        })
    }

    /// Transparent frame-sized image with the wrapped caption drawn on it.
    pub fn render(&self, text: &str, width: u32, height: u32) -> RgbaImage {
        let mut img = RgbaImage::new(width, height);
        let lines = self.layout(text, width);
        if lines.is_empty() {
            return img;
        }

        let style = &self.style;
        let px = style.font_size;
        let line_h = px + style.line_spacing as f32;
        let total_h = lines.len() as f32 * line_h;
        let start_y = match style.position {
            CaptionPosition::Bottom => height as f32 - total_h - style.bottom_offset as f32,
            CaptionPosition::Center => (height as f32 - total_h) / 2.0,
        }
        .max(0.0);

        let widths: Vec<f32> = lines.iter().map(|l| self.font.measure(l, px)).collect();
        let plate = [0, 0, 0];
        let plate_alpha = style.plate_alpha as f32 / 255.0;

        if style.plate == PlateMode::Block {
            let widest = widths.iter().cloned().fold(0.0, f32::max);
            let x = (width as f32 - widest) / 2.0;
            fill_rect(
                &mut img,
                x - PLATE_PAD,
                start_y - PLATE_PAD / 2.0,
                x + widest + PLATE_PAD,
                start_y + total_h - PLATE_PAD,
                plate,
                plate_alpha,
            );
        }

        for (i, (line, line_w)) in lines.iter().zip(&widths).enumerate() {
            let x = (width as f32 - line_w) / 2.0;
            let y = start_y + i as f32 * line_h;

            if style.plate == PlateMode::Line {
                fill_rect(
                    &mut img,
                    x - PLATE_PAD,
                    y - PLATE_PAD / 2.0,
                    x + line_w + PLATE_PAD,
                    y + line_h - PLATE_PAD,
                    plate,
                    plate_alpha,
                );
            }

            if style.outline {
                for dx in -OUTLINE_PX..=OUTLINE_PX {
                    for dy in -OUTLINE_PX..=OUTLINE_PX {
                        if dx == 0 && dy == 0 {
                            continue;
                        }
                        self.font.draw_line(
                            &mut img,
                            line,
                            x + dx as f32,
                            y + dy as f32,
                            px,
                            OUTLINE_COLOR,
                        );
                    }
                }
            }
            self.font.draw_line(&mut img, line, x, y, px, TEXT_COLOR);
        }

        img
    }

    pub fn render_to_file(
        &self,
        text: &str,
        width: u32,
        height: u32,
        path: &Path,
    ) -> Result<(), CaptionError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        self.render(text, width, height).save(path)?;
        Ok(())
    }
}

fn blend(img: &mut RgbaImage, x: i64, y: i64, color: [u8; 3], alpha: f32) {
    if x < 0 || y < 0 || x >= img.width() as i64 || y >= img.height() as i64 {
        return;
    }
    let dst = img.get_pixel_mut(x as u32, y as u32);
    let da = dst[3] as f32 / 255.0;
    let out_a = alpha + da * (1.0 - alpha);
    if out_a <= 0.0 {
        return;
    }
    let mut out = [0u8; 4];
    for c in 0..3 {
        let v = (color[c] as f32 * alpha + dst[c] as f32 * da * (1.0 - alpha)) / out_a;
        out[c] = v.round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    *dst = Rgba(out);
}

fn fill_rect(img: &mut RgbaImage, x0: f32, y0: f32, x1: f32, y1: f32, color: [u8; 3], alpha: f32) {
    let x0 = x0.round().max(0.0) as i64;
    let y0 = y0.round().max(0.0) as i64;
    let x1 = (x1.round() as i64).min(img.width() as i64);
    let y1 = (y1.round() as i64).min(img.height() as i64);
    for y in y0..y1 {
        for x in x0..x1 {
            blend(img, x, y, color, alpha);
        }
    }
}
