use std::path::Path;

use image::imageops::{self, FilterType};
use image::{ImageBuffer, ImageFormat, Rgba, RgbaImage};

use crate::error::{PlayerError, Result};
use crate::media::DecodedFrame;

/// Where a surface lands inside a viewport when letterboxed ("contain" fit).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// The pixel buffer frames are drawn onto, sized to the media's native resolution.
///
/// Starts unestablished; [`DrawSurface::establish`] sizes it once metadata is known.
#[derive(Default)]
pub struct DrawSurface {
    image: Option<RgbaImage>,
    draws: u64,
}

impl DrawSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_established(&self) -> bool {
        self.image.is_some()
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.image.as_ref().map(|img| img.dimensions())
    }

    /// Size the surface. Returns false (and keeps the pixels) if already that size.
    pub fn establish(&mut self, width: u32, height: u32) -> bool {
        if self.dimensions() == Some((width, height)) {
            return false;
        }
        self.image = Some(RgbaImage::new(width.max(1), height.max(1)));
        log::info!("Draw surface sized to {width}x{height}");
        true
    }

    /// Drop the buffer; the next source has to establish it again.
    pub fn reset(&mut self) {
        self.image = None;
    }

    /// Copy `frame` over the whole surface, scaling to fit if sizes differ.
    pub fn draw_frame(&mut self, frame: &DecodedFrame) -> Result<()> {
        let Some(target) = self.image.as_mut() else {
            return Err(PlayerError::Draw("surface not established".to_string()));
        };
        let view: ImageBuffer<Rgba<u8>, &[u8]> =
            ImageBuffer::from_raw(frame.width, frame.height, frame.data.as_slice()).ok_or_else(
                || {
                    PlayerError::Draw(format!(
                        "frame buffer of {} bytes does not hold {}x{} RGBA",
                        frame.data.len(),
                        frame.width,
                        frame.height
                    ))
                },
            )?;

        let (w, h) = target.dimensions();
        if (frame.width, frame.height) == (w, h) {
            target.copy_from_slice(frame.data.as_slice());
        } else {
            *target = imageops::resize(&view, w, h, FilterType::Triangle);
        }
        self.draws += 1;
        Ok(())
    }

    /// Number of frames drawn since creation.
    pub fn draw_count(&self) -> u64 {
        self.draws
    }

    pub fn pixels(&self) -> Option<&RgbaImage> {
        self.image.as_ref()
    }

    /// Letterbox the surface into a viewport, preserving aspect ratio.
    pub fn fit_rect(&self, viewport_w: u32, viewport_h: u32) -> Option<FitRect> {
        let (w, h) = self.dimensions()?;
        Some(fit_rect(w, h, viewport_w, viewport_h))
    }

    pub fn save_png(&self, path: &Path) -> Result<()> {
        let image = self
            .image
            .as_ref()
            .ok_or_else(|| PlayerError::Draw("nothing drawn yet".to_string()))?;
        image.save_with_format(path, ImageFormat::Png)?;
        Ok(())
    }
}

fn fit_rect(media_w: u32, media_h: u32, viewport_w: u32, viewport_h: u32) -> FitRect {
    let media_aspect = media_w as f32 / media_h.max(1) as f32;
    let viewport_aspect = viewport_w as f32 / viewport_h.max(1) as f32;

    let (scale_x, scale_y) = if media_aspect > viewport_aspect {
        // Media is wider: fit width, letterbox top/bottom
        (1.0, viewport_aspect / media_aspect)
    } else {
        // Media is taller: fit height, pillarbox left/right
        (media_aspect / viewport_aspect, 1.0)
    };

    let width = viewport_w as f32 * scale_x;
    let height = viewport_h as f32 * scale_y;
    FitRect {
        x: (viewport_w as f32 - width) * 0.5,
        y: (viewport_h as f32 - height) * 0.5,
        width,
        height,
    }
}
