//! Payload and descriptor value types

use crate::format::{ChannelLayout, Precision};
use crate::{Error, Result};
use std::fmt;

/// Pixel extent, half-open on x2/y2
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Rect {
    pub const fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Width in pixels (0 for inverted extents)
    pub fn width(&self) -> usize {
        span(self.x1, self.x2)
    }

    /// Height in pixels (0 for inverted extents)
    pub fn height(&self) -> usize {
        span(self.y1, self.y2)
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}

/// Distance from `lo` to `hi`, widened so the full i32 range fits
fn span(lo: i32, hi: i32) -> usize {
    let span = (i64::from(hi) - i64::from(lo)).max(0);
    usize::try_from(span).unwrap_or(usize::MAX)
}

/// Render scale and pixel aspect ratio a payload was produced at
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderScale {
    pub x: f64,
    pub y: f64,
    pub pixel_aspect: f64,
}

impl RenderScale {
    /// Full resolution, square pixels
    pub const IDENTITY: RenderScale = RenderScale {
        x: 1.0,
        y: 1.0,
        pixel_aspect: 1.0,
    };

    pub const fn new(x: f64, y: f64, pixel_aspect: f64) -> Self {
        Self { x, y, pixel_aspect }
    }
}

impl Default for RenderScale {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Geometry and format of a payload
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Descriptor {
    /// Pixel extent
    pub bounds: Rect,
    /// Channel layout
    pub layout: ChannelLayout,
    /// Component precision
    pub precision: Precision,
    /// Row stride in bytes
    pub row_stride: usize,
    /// Scale the pixels were rendered at
    pub render_scale: RenderScale,
}

impl Descriptor {
    /// Descriptor with a tightly packed row stride
    pub fn new(bounds: Rect, layout: ChannelLayout, precision: Precision) -> Self {
        let row_stride = bounds
            .width()
            .saturating_mul(layout.components() * precision.size());
        Self {
            bounds,
            layout,
            precision,
            row_stride,
            render_scale: RenderScale::IDENTITY,
        }
    }

    pub fn with_row_stride(mut self, row_stride: usize) -> Self {
        self.row_stride = row_stride;
        self
    }

    pub fn with_render_scale(mut self, render_scale: RenderScale) -> Self {
        self.render_scale = render_scale;
        self
    }

    /// Bytes per pixel
    pub fn pixel_size(&self) -> usize {
        self.layout.components() * self.precision.size()
    }

    /// Bytes one row of pixels occupies, None if that overflows
    pub fn row_len(&self) -> Option<usize> {
        self.bounds.width().checked_mul(self.pixel_size())
    }

    /// Bytes a buffer must hold for this descriptor, None if that overflows
    pub fn byte_len(&self) -> Option<usize> {
        self.row_stride.checked_mul(self.bounds.height())
    }
}

/// Immutable image payload carried across frames
///
/// Cloning deep-copies the pixel bytes, so a payload handed out of a slot never
/// aliases the slot's copy.
#[derive(Clone, PartialEq, Default)]
pub struct Payload {
    descriptor: Descriptor,
    data: Vec<u8>,
}

impl Payload {
    /// Create a payload, checking the bytes against the descriptor
    pub fn new(descriptor: Descriptor, data: Vec<u8>) -> Result<Self> {
        if !data.is_empty() {
            let (width, height) = (descriptor.bounds.width(), descriptor.bounds.height());
            let min_stride = descriptor.row_len().ok_or_else(|| {
                Error::InvalidShape(format!("row of {} pixels does not fit in memory", width))
            })?;
            if descriptor.row_stride < min_stride {
                return Err(Error::InvalidShape(format!(
                    "row stride {} is smaller than {} bytes per row",
                    descriptor.row_stride, min_stride
                )));
            }
            let byte_len = descriptor.byte_len().ok_or_else(|| {
                Error::InvalidShape(format!(
                    "{} rows at stride {} do not fit in memory",
                    height, descriptor.row_stride
                ))
            })?;
            if data.len() != byte_len {
                return Err(Error::InvalidShape(format!(
                    "expected {} bytes for {}x{} at stride {}, got {}",
                    byte_len,
                    width,
                    height,
                    descriptor.row_stride,
                    data.len()
                )));
            }
        }
        Ok(Self { descriptor, data })
    }

    /// Get descriptor
    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    /// Get pixel bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Take the pixel bytes
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn render_scale(&self) -> RenderScale {
        self.descriptor.render_scale
    }

    /// Same pixels stamped with another render scale
    pub fn with_render_scale(mut self, render_scale: RenderScale) -> Self {
        self.descriptor.render_scale = render_scale;
        self
    }

    /// Size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True for the default (black) payload and any other payload without pixels
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Payload")
            .field("descriptor", &self.descriptor)
            .field("len", &self.data.len())
            .finish()
    }
}
