//! Image manipulation.
//!
//! This module provides:
//!
//! - The [`Image`] type, an owned RGBA image.
//! - [`Resolution`] and [`Rect`] to describe image sizes and regions.
//! - A handful of [`draw`] functions to visualize hands and notices.

pub mod draw;
mod jpeg;

use std::{fmt, path::Path};

use anyhow::Context;
use embedded_graphics::{pixelcolor::raw::RawU32, prelude::PixelColor};
use image::{imageops::FilterType, ImageBuffer, Rgba, RgbaImage};

#[derive(Debug, Clone, Copy)]
enum ImageFormat {
    Jpeg,
    Png,
}

impl ImageFormat {
    fn from_path(path: &Path) -> anyhow::Result<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("jpg" | "jpeg") => Ok(Self::Jpeg),
            Some("png") => Ok(Self::Png),
            _ => anyhow::bail!(
                "invalid image path '{}' (must have one of the supported extensions)",
                path.display()
            ),
        }
    }
}

/// An 8-bit sRGB image with alpha channel.
#[derive(Clone)]
pub struct Image {
    // RGBA8 so that frames can be uploaded to the GPU without conversion.
    pub(crate) buf: RgbaImage,
}

impl Image {
    /// Loads an image from the filesystem.
    ///
    /// The path must have a supported file extension (`jpeg`, `jpg` or `png`).
    pub fn load<A: AsRef<Path>>(path: A) -> anyhow::Result<Self> {
        Self::load_impl(path.as_ref())
    }

    fn load_impl(path: &Path) -> anyhow::Result<Self> {
        let format = ImageFormat::from_path(path)?;
        let data =
            std::fs::read(path).with_context(|| format!("failed to read '{}'", path.display()))?;
        match format {
            ImageFormat::Jpeg => Self::decode_jpeg(&data),
            ImageFormat::Png => {
                let buf =
                    image::load_from_memory_with_format(&data, image::ImageFormat::Png)?.to_rgba8();
                Ok(Self { buf })
            }
        }
    }

    /// Decodes a JFIF JPEG or Motion JPEG from a byte slice.
    pub fn decode_jpeg(data: &[u8]) -> anyhow::Result<Self> {
        jpeg::decode_jpeg(data)
    }

    /// Creates an empty image of a specified size.
    ///
    /// The image will start out black and fully transparent.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            buf: ImageBuffer::new(width, height),
        }
    }

    /// Creates an image of a specified size, filled with `color`.
    pub fn filled(width: u32, height: u32, color: Color) -> Self {
        Self {
            buf: ImageBuffer::from_pixel(width, height, Rgba(color.0)),
        }
    }

    /// Returns the width of this image, in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.buf.width()
    }

    /// Returns the height of this image, in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.buf.height()
    }

    #[inline]
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width(), self.height())
    }

    /// Returns a [`Rect`] positioned at `(0, 0)` that covers the whole image.
    #[inline]
    pub fn rect(&self) -> Rect {
        Rect::from_top_left(0.0, 0.0, self.width() as f32, self.height() as f32)
    }

    /// Returns the raw RGBA8 pixel data, row by row.
    #[inline]
    pub fn data(&self) -> &[u8] {
        self.buf.as_raw()
    }

    /// Gets the image color at the given pixel coordinates.
    ///
    /// # Panics
    ///
    /// This will panic if `(x, y)` is outside the bounds of this image.
    pub fn get(&self, x: u32, y: u32) -> Color {
        Color(self.buf[(x, y)].0)
    }

    /// Sets the image color at the given pixel coordinates.
    ///
    /// # Panics
    ///
    /// This will panic if `(x, y)` is outside the bounds of this image.
    pub fn set(&mut self, x: u32, y: u32, color: Color) {
        self.buf[(x, y)] = Rgba(color.0);
    }

    /// Returns the color of the pixel containing the point `(x, y)`.
    ///
    /// Points outside of the image yield [`Color::NULL`].
    pub fn sample(&self, x: f32, y: f32) -> Color {
        if x < 0.0 || y < 0.0 {
            return Color::NULL;
        }
        let (x, y) = (x as u32, y as u32);
        if x >= self.width() || y >= self.height() {
            return Color::NULL;
        }
        self.get(x, y)
    }

    /// Sets every pixel of the image to `color`.
    pub fn clear(&mut self, color: Color) {
        for pixel in self.buf.pixels_mut() {
            *pixel = Rgba(color.0);
        }
    }

    /// Returns a copy of this image, scaled to `width` by `height` pixels.
    pub fn resized(&self, width: u32, height: u32) -> Image {
        Image {
            buf: image::imageops::resize(&self.buf, width, height, FilterType::Triangle),
        }
    }

    /// Alpha-blends `src` onto `self`, placing the top left corner of `src` at `(x, y)`.
    ///
    /// Parts of `src` that fall outside of `self` are discarded.
    pub fn blend(&mut self, src: &Image, x: i32, y: i32) {
        for (sx, sy, src_px) in src.buf.enumerate_pixels() {
            let (dx, dy) = (x + sx as i32, y + sy as i32);
            if dx < 0 || dy < 0 || dx as u32 >= self.width() || dy as u32 >= self.height() {
                continue;
            }

            let dest = &mut self.buf[(dx as u32, dy as u32)];
            *dest = Rgba(Color(src_px.0).over(Color(dest.0)).0);
        }
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Image({})", self.resolution())
    }
}

/// Width and height of an image, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    width: u32,
    height: u32,
}

impl Resolution {
    pub const RES_720P: Self = Self::new(1280, 720);

    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn num_pixels(&self) -> u32 {
        self.width * self.height
    }

    /// Returns whether this resolution covers no pixels.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.num_pixels() == 0
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// An axis-aligned rectangle with floating-point coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
}

impl Rect {
    #[inline]
    pub fn from_top_left(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[inline]
    pub fn from_center(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self::from_top_left(x - width / 2.0, y - height / 2.0, width, height)
    }

    /// Computes the smallest rectangle containing all `points`.
    ///
    /// Returns [`None`] if `points` is empty.
    pub fn bounding<I: IntoIterator<Item = [f32; 2]>>(points: I) -> Option<Self> {
        let mut points = points.into_iter();
        let [x, y] = points.next()?;
        let (mut min, mut max) = ([x, y], [x, y]);
        for [x, y] in points {
            min = [min[0].min(x), min[1].min(y)];
            max = [max[0].max(x), max[1].max(y)];
        }
        Some(Self::from_top_left(
            min[0],
            min[1],
            max[0] - min[0],
            max[1] - min[1],
        ))
    }

    #[inline]
    pub fn x(&self) -> f32 {
        self.x
    }

    #[inline]
    pub fn y(&self) -> f32 {
        self.y
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.height
    }

    #[inline]
    pub fn center(&self) -> [f32; 2] {
        [self.x + self.width / 2.0, self.y + self.height / 2.0]
    }

    /// Grows each side of the rectangle by `amount` times its width or height.
    pub fn grow_rel(&self, amount: f32) -> Self {
        let [cx, cy] = self.center();
        Self::from_center(
            cx,
            cy,
            self.width * (1.0 + 2.0 * amount),
            self.height * (1.0 + 2.0 * amount),
        )
    }

    /// Returns the smallest square with the same center that contains `self`.
    pub fn grow_to_square(&self) -> Self {
        let [cx, cy] = self.center();
        let side = self.width.max(self.height);
        Self::from_center(cx, cy, side, side)
    }

    /// Returns the largest square with the same center that fits inside `self`.
    pub fn shrink_to_square(&self) -> Self {
        let [cx, cy] = self.center();
        let side = self.width.min(self.height);
        Self::from_center(cx, cy, side, side)
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    #[must_use]
    pub fn move_by(&self, x: f32, y: f32) -> Self {
        Self::from_top_left(self.x + x, self.y + y, self.width, self.height)
    }

    /// Computes the overlapping part of `self` and `other`.
    ///
    /// Returns [`None`] if the rectangles do not overlap.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let min = [self.x.max(other.x), self.y.max(other.y)];
        let max = [
            (self.x + self.width).min(other.x + other.width),
            (self.y + self.height).min(other.y + other.height),
        ];
        if min[0] > max[0] || min[1] > max[1] {
            return None;
        }

        Rect::bounding([min, max])
    }

    /// Computes the Intersection over Union (IOU) of `self` and `other`.
    pub fn iou(&self, other: &Rect) -> f32 {
        let intersection = self.intersection(other).map_or(0.0, |rect| rect.area());
        intersection / (self.area() + other.area() - intersection)
    }
}

/// An 8-bit sRGB color with alpha channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color(pub(crate) [u8; 4]);

impl Color {
    /// Fully transparent black (all components are 0).
    pub const NULL: Self = Self([0, 0, 0, 0]);
    pub const BLACK: Self = Self([0, 0, 0, 255]);
    pub const WHITE: Self = Self([255, 255, 255, 255]);
    pub const RED: Self = Self([255, 0, 0, 255]);
    pub const GREEN: Self = Self([0, 255, 0, 255]);
    pub const YELLOW: Self = Self([255, 255, 0, 255]);
    pub const PLUM: Self = Self([221, 160, 221, 255]);
    pub const INDIGO: Self = Self([75, 0, 130, 255]);

    #[inline]
    pub const fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b, 255])
    }

    #[inline]
    pub const fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self([r, g, b, a])
    }

    #[inline]
    pub fn r(&self) -> u8 {
        self.0[0]
    }

    #[inline]
    pub fn g(&self) -> u8 {
        self.0[1]
    }

    #[inline]
    pub fn b(&self) -> u8 {
        self.0[2]
    }

    #[inline]
    pub fn a(&self) -> u8 {
        self.0[3]
    }

    /// Composites `self` over `dest` ("source over" alpha blending).
    pub fn over(self, dest: Color) -> Color {
        let src_a = self.a() as f32 / 255.0;
        let dest_a = dest.a() as f32 / 255.0;
        let out_a = src_a + dest_a * (1.0 - src_a);
        if out_a == 0.0 {
            return Color::NULL;
        }

        let channel = |s: u8, d: u8| {
            let c = (s as f32 * src_a + d as f32 * dest_a * (1.0 - src_a)) / out_a;
            c.round() as u8
        };
        Color([
            channel(self.r(), dest.r()),
            channel(self.g(), dest.g()),
            channel(self.b(), dest.b()),
            (out_a * 255.0).round() as u8,
        ])
    }
}

impl PixelColor for Color {
    type Raw = RawU32;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_outside_is_null() {
        let image = Image::filled(4, 4, Color::WHITE);
        assert_eq!(image.sample(1.5, 3.9), Color::WHITE);
        assert_eq!(image.sample(-0.5, 1.0), Color::NULL);
        assert_eq!(image.sample(4.0, 1.0), Color::NULL);
    }

    #[test]
    fn blend_clips_and_composites() {
        let mut dest = Image::filled(4, 4, Color::BLACK);
        let mut src = Image::filled(2, 2, Color::WHITE);
        src.set(1, 1, Color::NULL);

        dest.blend(&src, 3, -1);
        assert_eq!(dest.get(3, 0), Color::WHITE);
        assert_eq!(dest.get(2, 0), Color::BLACK);
        assert_eq!(dest.get(3, 1), Color::BLACK);

        dest.blend(&src, 0, 0);
        assert_eq!(dest.get(0, 0), Color::WHITE);
        assert_eq!(dest.get(1, 1), Color::BLACK);
    }

    #[test]
    fn half_transparent_over_opaque() {
        let c = Color::from_rgba8(255, 255, 255, 128).over(Color::BLACK);
        assert_eq!(c.a(), 255);
        assert!((127..=129).contains(&c.r()));
    }

    #[test]
    fn rect_geometry() {
        let rect = Rect::bounding([[10.0, 20.0], [30.0, 60.0], [20.0, 40.0]]).unwrap();
        assert_eq!(rect, Rect::from_top_left(10.0, 20.0, 20.0, 40.0));
        assert_eq!(rect.center(), [20.0, 40.0]);

        let square = rect.grow_to_square();
        assert_eq!(square, Rect::from_center(20.0, 40.0, 40.0, 40.0));
        assert_eq!(rect.shrink_to_square().width(), 20.0);

        let grown = rect.grow_rel(0.5);
        assert_eq!(grown.width(), 40.0);
        assert_eq!(grown.height(), 80.0);
        assert_eq!(grown.center(), [20.0, 40.0]);

        assert_eq!(Rect::bounding(std::iter::empty()), None);
    }

    #[test]
    fn rect_overlap() {
        let a = Rect::from_top_left(0.0, 0.0, 10.0, 10.0);
        let b = Rect::from_top_left(5.0, 0.0, 10.0, 10.0);
        assert_eq!(a.intersection(&b), Some(Rect::from_top_left(5.0, 0.0, 5.0, 10.0)));
        assert_eq!(a.iou(&b), 50.0 / 150.0);
        assert_eq!(a.iou(&a), 1.0);

        let far = a.move_by(20.0, 0.0);
        assert_eq!(far.x(), 20.0);
        assert_eq!(a.intersection(&far), None);
        assert_eq!(a.iou(&far), 0.0);
    }
}
