//! Drawing primitives.
//!
//! Every function returns a guard that draws the shape when dropped, and can be used to customize
//! it first:
//!
//! ```
//! # use handmoji::image::{draw, Color, Image};
//! let mut image = Image::new(64, 64);
//! draw::line(&mut image, [0.0, 0.0], [63.0, 63.0])
//!     .color(Color::RED)
//!     .stroke_width(3);
//! ```

use std::convert::Infallible;

use embedded_graphics::{
    draw_target::DrawTarget,
    mono_font::{ascii, MonoTextStyle},
    prelude::*,
    primitives::{Circle, Line, PrimitiveStyle, Rectangle},
    text::{Alignment, Baseline, Text, TextStyleBuilder},
};

use super::{Color, Image};

fn infallible<T>(result: Result<T, Infallible>) -> T {
    match result {
        Ok(t) => t,
        Err(never) => match never {},
    }
}

fn point([x, y]: [f32; 2]) -> Point {
    Point::new(x.round() as i32, y.round() as i32)
}

/// Guard returned by [`line`]; draws the line when dropped and allows customization.
pub struct DrawLine<'a> {
    image: &'a mut Image,
    start: Point,
    end: Point,
    color: Color,
    stroke_width: u32,
}

impl DrawLine<'_> {
    /// Sets the line's color.
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Sets the line's stroke width.
    ///
    /// By default, a stroke width of 1 is used.
    pub fn stroke_width(&mut self, width: u32) -> &mut Self {
        self.stroke_width = width;
        self
    }
}

impl Drop for DrawLine<'_> {
    fn drop(&mut self) {
        infallible(
            Line::new(self.start, self.end)
                .into_styled(PrimitiveStyle::with_stroke(self.color, self.stroke_width))
                .draw(&mut Target(&mut *self.image)),
        );
    }
}

/// Guard returned by [`marker`]; draws the marker when dropped and allows customization.
pub struct DrawMarker<'a> {
    image: &'a mut Image,
    center: Point,
    color: Color,
    diameter: u32,
}

impl DrawMarker<'_> {
    /// Sets the marker's color.
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Sets the marker's diameter in pixels.
    ///
    /// The default diameter is 10.
    pub fn diameter(&mut self, diameter: u32) -> &mut Self {
        assert!(diameter != 0, "marker diameter must be greater than zero");
        self.diameter = diameter;
        self
    }
}

impl Drop for DrawMarker<'_> {
    fn drop(&mut self) {
        infallible(
            Circle::with_center(self.center, self.diameter)
                .into_styled(PrimitiveStyle::with_fill(self.color))
                .draw(&mut Target(&mut *self.image)),
        );
    }
}

/// Guard returned by [`text`]; draws the text when dropped and allows customization.
pub struct DrawText<'a> {
    image: &'a mut Image,
    pos: Point,
    text: &'a str,
    color: Color,
    alignment: Alignment,
    baseline: Baseline,
}

impl DrawText<'_> {
    /// Sets the text color.
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Aligns the top of the text with the `y` coordinate.
    pub fn align_top(&mut self) -> &mut Self {
        self.baseline = Baseline::Top;
        self
    }

    /// Aligns the left side of the text with the `x` coordinate.
    pub fn align_left(&mut self) -> &mut Self {
        self.alignment = Alignment::Left;
        self
    }
}

impl Drop for DrawText<'_> {
    fn drop(&mut self) {
        // FIXME: e-g's mono fonts only cover ASCII
        let character_style = MonoTextStyle::new(&ascii::FONT_10X20, self.color);
        let text_style = TextStyleBuilder::new()
            .alignment(self.alignment)
            .baseline(self.baseline)
            .build();
        infallible(
            Text::with_text_style(self.text, self.pos, character_style, text_style)
                .draw(&mut Target(&mut *self.image)),
        );
    }
}

/// Draws a line onto an image.
pub fn line(image: &mut Image, start: [f32; 2], end: [f32; 2]) -> DrawLine<'_> {
    DrawLine {
        image,
        start: point(start),
        end: point(end),
        color: Color::from_rgb8(0, 0, 255),
        stroke_width: 1,
    }
}

/// Draws a filled circular marker centered on `pos`.
///
/// This can be used to visualize landmarks or points of interest.
pub fn marker(image: &mut Image, pos: [f32; 2]) -> DrawMarker<'_> {
    DrawMarker {
        image,
        center: point(pos),
        color: Color::RED,
        diameter: 10,
    }
}

/// Draws a text string onto an image.
///
/// By default, the text is centered horizontally and vertically around `pos`.
pub fn text<'a>(image: &'a mut Image, pos: [f32; 2], text: &'a str) -> DrawText<'a> {
    DrawText {
        image,
        pos: point(pos),
        text,
        color: Color::RED,
        alignment: Alignment::Center,
        baseline: Baseline::Middle,
    }
}

struct Target<'a>(&'a mut Image);

impl Dimensions for Target<'_> {
    fn bounding_box(&self) -> Rectangle {
        Rectangle {
            top_left: Point { x: 0, y: 0 },
            size: Size {
                width: self.0.width(),
                height: self.0.height(),
            },
        }
    }
}

impl DrawTarget for Target<'_> {
    type Color = Color;

    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(pos, color) in pixels {
            if pos.x >= 0
                && (pos.x as u32) < self.0.width()
                && pos.y >= 0
                && (pos.y as u32) < self.0.height()
            {
                self.0.set(pos.x as u32, pos.y as u32, color);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_is_clipped() {
        let mut image = Image::new(8, 8);
        line(&mut image, [-4.0, 3.0], [20.0, 3.0]).color(Color::WHITE);
        for x in 0..8 {
            assert_eq!(image.get(x, 3), Color::WHITE);
        }
        assert_eq!(image.get(0, 2), Color::NULL);
    }

    #[test]
    fn marker_fills_center() {
        let mut image = Image::new(16, 16);
        marker(&mut image, [8.0, 8.0]).color(Color::GREEN);
        assert_eq!(image.get(8, 8), Color::GREEN);
        assert_eq!(image.get(0, 0), Color::NULL);
    }

    #[test]
    fn text_draws_something() {
        let mut image = Image::new(64, 32);
        text(&mut image, [32.0, 16.0], "hi").color(Color::WHITE);
        assert!(image.data().chunks(4).any(|px| px == [255, 255, 255, 255]));
    }
}
