//! Frame compositor: applies a camera transform to a decoded frame.
//!
//! The camera state gives a logical center and scale; this module owns the
//! crop/scale math. The sampled source rectangle is clamped to the decoded
//! frame bounds; that clamp, not any clamp on the logical camera
//! coordinate, is what keeps sampling in range while the logical state
//! stays continuous.
//!
//! Two CPU resampling backends implement the same interface and must agree
//! within a small pixel tolerance; a GPU path would slot in the same way.

use reelcut_project_model::effect::EffectState;

/// An RGBA8 pixel buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA, `width * height * 4` bytes.
    pub data: Vec<u8>,
}

impl Frame {
    /// Allocate a black, fully opaque frame.
    pub fn new(width: u32, height: u32) -> Self {
        let mut data = vec![0u8; (width as usize) * (height as usize) * 4];
        for px in data.chunks_exact_mut(4) {
            px[3] = 255;
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Pixel at `(x, y)`, clamped to frame bounds.
    pub fn pixel(&self, x: i64, y: i64) -> [u8; 4] {
        let x = x.clamp(0, self.width as i64 - 1) as usize;
        let y = y.clamp(0, self.height as i64 - 1) as usize;
        let offset = (y * self.width as usize + x) * 4;
        [
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
            self.data[offset + 3],
        ]
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        let offset = ((y * self.width + x) * 4) as usize;
        self.data[offset..offset + 4].copy_from_slice(&rgba);
    }
}

/// The source sub-rectangle to sample, in source pixel space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceRect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

/// Compute the sampled region for a camera state over a source of the given
/// dimensions. Width/height are the source divided by the zoom scale; the
/// rectangle is centered on the logical camera point and then shifted (not
/// shrunk) to stay inside the source bounds.
pub fn source_rect(state: &EffectState, source_w: u32, source_h: u32) -> SourceRect {
    let sw = source_w as f64;
    let sh = source_h as f64;
    let scale = state.zoom.scale.max(1.0);

    let w = sw / scale;
    let h = sh / scale;
    let center_x = state.zoom.x * sw;
    let center_y = state.zoom.y * sh;

    let x = (center_x - w / 2.0).clamp(0.0, sw - w);
    let y = (center_y - h / 2.0).clamp(0.0, sh - h);

    SourceRect { x, y, w, h }
}

/// A resampling backend: same transform, interchangeable implementations.
pub trait ZoomBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Sample the camera's source region of `source` and scale it up to a
    /// `dest_w` x `dest_h` frame. Must be deterministic for a given input.
    fn compose(&self, source: &Frame, state: &EffectState, dest_w: u32, dest_h: u32) -> Frame;
}

/// Nearest-neighbor sampling. The reference implementation: cheap, exact
/// for identity transforms.
#[derive(Debug, Default)]
pub struct NearestBackend;

impl ZoomBackend for NearestBackend {
    fn name(&self) -> &'static str {
        "cpu-nearest"
    }

    fn compose(&self, source: &Frame, state: &EffectState, dest_w: u32, dest_h: u32) -> Frame {
        let rect = source_rect(state, source.width, source.height);
        let mut dest = Frame::new(dest_w, dest_h);

        for dy in 0..dest_h {
            for dx in 0..dest_w {
                let sx = rect.x + (dx as f64 + 0.5) / dest_w as f64 * rect.w;
                let sy = rect.y + (dy as f64 + 0.5) / dest_h as f64 * rect.h;
                let rgba = source.pixel(sx.floor() as i64, sy.floor() as i64);
                dest.set_pixel(dx, dy, rgba);
            }
        }

        dest
    }
}

/// Bilinear sampling for smoother upscaling.
#[derive(Debug, Default)]
pub struct BilinearBackend;

impl ZoomBackend for BilinearBackend {
    fn name(&self) -> &'static str {
        "cpu-bilinear"
    }

    fn compose(&self, source: &Frame, state: &EffectState, dest_w: u32, dest_h: u32) -> Frame {
        let rect = source_rect(state, source.width, source.height);
        let mut dest = Frame::new(dest_w, dest_h);

        for dy in 0..dest_h {
            for dx in 0..dest_w {
                let sx = rect.x + (dx as f64 + 0.5) / dest_w as f64 * rect.w - 0.5;
                let sy = rect.y + (dy as f64 + 0.5) / dest_h as f64 * rect.h - 0.5;

                let x0 = sx.floor();
                let y0 = sy.floor();
                let fx = sx - x0;
                let fy = sy - y0;

                let p00 = source.pixel(x0 as i64, y0 as i64);
                let p10 = source.pixel(x0 as i64 + 1, y0 as i64);
                let p01 = source.pixel(x0 as i64, y0 as i64 + 1);
                let p11 = source.pixel(x0 as i64 + 1, y0 as i64 + 1);

                let mut rgba = [0u8; 4];
                for c in 0..4 {
                    let top = p00[c] as f64 * (1.0 - fx) + p10[c] as f64 * fx;
                    let bottom = p01[c] as f64 * (1.0 - fx) + p11[c] as f64 * fx;
                    rgba[c] = (top * (1.0 - fy) + bottom * fy).round() as u8;
                }
                dest.set_pixel(dx, dy, rgba);
            }
        }

        dest
    }
}
