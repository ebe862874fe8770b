//! Neural Network inference.

use std::{ops::Index, ops::RangeInclusive, path::Path, sync::Arc};

use anyhow::{bail, Context};
use ndarray::{Array, ArrayD, IxDyn};
use tract_onnx::prelude::{
    tvec, Framework, Graph, InferenceModelExt, SimplePlan, TValue, TypedFact, TypedOp,
};

use crate::image::{Color, Image, Rect, Resolution};

type Model = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// A convolutional neural network (CNN) that operates on image data.
///
/// This is a cheaply [`Clone`]able handle to the underlying network.
#[derive(Clone)]
pub struct Cnn {
    model: Arc<Model>,
    shape: CnnInputShape,
    input_res: Resolution,
    color_mapper: ColorMapper,
}

impl Cnn {
    /// Loads a pre-trained model from an ONNX file path.
    ///
    /// The path must have a `.onnx` extension. The network must take exactly one image input in
    /// either NCHW or NHWC layout.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        Self::load_impl(path.as_ref())
    }

    fn load_impl(path: &Path) -> anyhow::Result<Self> {
        match path.extension() {
            Some(ext) if ext == "onnx" => {}
            _ => bail!(
                "neural network file must have `.onnx` extension (got '{}')",
                path.display()
            ),
        }

        let data = std::fs::read(path)
            .with_context(|| format!("failed to read model '{}'", path.display()))?;
        Self::from_onnx(&data).with_context(|| format!("failed to load '{}'", path.display()))
    }

    /// Loads a pre-trained model from an in-memory ONNX file.
    ///
    /// Returns an error if the network data is malformed, if the network uses unimplemented
    /// operations, or if its input is not an image.
    pub fn from_onnx(mut data: &[u8]) -> anyhow::Result<Self> {
        let graph = tract_onnx::onnx()
            .model_for_read(&mut data)?
            .into_optimized()?;
        let model = SimplePlan::new(graph)?;

        let inputs = model.model().inputs.len();
        if inputs != 1 {
            bail!("CNN network has to take exactly 1 input, this one takes {inputs}");
        }
        let fact = model.model().input_fact(0)?;
        let Some(dims) = fact.shape.as_concrete() else {
            bail!("CNN input shape must be concrete, got {:?}", fact.shape);
        };
        let (shape, input_res) = CnnInputShape::detect(dims)?;
        log::debug!(
            "loaded {:?} CNN with {} input and {} outputs",
            shape,
            input_res,
            model.model().outputs.len(),
        );

        Ok(Self {
            model: Arc::new(model),
            shape,
            input_res,
            color_mapper: ColorMapper::linear(0.0..=1.0),
        })
    }

    /// Returns the expected input image size.
    #[inline]
    pub fn input_resolution(&self) -> Resolution {
        self.input_res
    }

    #[inline]
    pub fn input_shape(&self) -> CnnInputShape {
        self.shape
    }

    /// Returns the number of output tensors computed by [`Cnn::estimate`].
    pub fn num_outputs(&self) -> usize {
        self.model.model().outputs.len()
    }

    /// Runs the network on the region `roi` of `image`, returning the estimated outputs.
    ///
    /// The region will be sampled to create the network's input tensor; parts of it that lie
    /// outside of `image` read as black. If the region's aspect ratio does not match the network's
    /// input aspect ratio, the image will be stretched.
    pub fn estimate(&self, image: &Image, roi: Rect) -> anyhow::Result<Outputs> {
        let input = image_to_tensor(image, roi, self.input_res, self.shape, &self.color_mapper);
        let outputs = self
            .model
            .run(tvec![TValue::from_const(Arc::new(input.into()))])?;

        let inner = outputs
            .iter()
            .map(|tensor| Ok(tensor.to_array_view::<f32>()?.to_owned()))
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Outputs { inner })
    }
}

fn image_to_tensor(
    image: &Image,
    roi: Rect,
    res: Resolution,
    shape: CnnInputShape,
    color_mapper: &ColorMapper,
) -> ArrayD<f32> {
    let (w, h) = (res.width() as usize, res.height() as usize);
    let sample = |x: usize, y: usize| {
        let u = roi.x() + (x as f32 + 0.5) / w as f32 * roi.width();
        let v = roi.y() + (y as f32 + 0.5) / h as f32 * roi.height();
        color_mapper.map(image.sample(u, v))
    };

    match shape {
        CnnInputShape::NCHW => Array::from_shape_fn(IxDyn(&[1, 3, h, w]), |idx| {
            sample(idx[3], idx[2])[idx[1]]
        }),
        CnnInputShape::NHWC => Array::from_shape_fn(IxDyn(&[1, h, w, 3]), |idx| {
            sample(idx[2], idx[1])[idx[3]]
        }),
    }
}

#[derive(Clone, Copy)]
struct ColorMapper {
    start: f32,
    end: f32,
}

impl ColorMapper {
    /// Creates a color mapper that uniformly maps sRGB values to `target_range`.
    fn linear(target_range: RangeInclusive<f32>) -> Self {
        let (start, end) = target_range.into_inner();
        assert!(end > start);
        Self { start, end }
    }

    fn map(&self, color: Color) -> [f32; 3] {
        let adjust_range = (self.end - self.start) / 255.0;
        [color.r(), color.g(), color.b()].map(|col| col as f32 * adjust_range + self.start)
    }
}

/// Describes in what order a CNN expects its input image data.
///
/// - `N` is the number of images, fixed at 1.
/// - `C` is the number of color channels, 3 for RGB inputs.
/// - `H` and `W` are the height and width of the input, respectively.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CnnInputShape {
    /// Shape is `[N, C, H, W]`.
    NCHW,
    /// Shape is `[N, H, W, C]`.
    NHWC,
}

impl CnnInputShape {
    fn detect(dims: &[usize]) -> anyhow::Result<(Self, Resolution)> {
        let (shape, w, h) = match *dims {
            [1, 3, h, w] => (Self::NCHW, w, h),
            [1, h, w, 3] => (Self::NHWC, w, h),
            _ => bail!("invalid CNN input shape {dims:?} (expected [1, 3, H, W] or [1, H, W, 3])"),
        };
        Ok((shape, Resolution::new(w.try_into()?, h.try_into()?)))
    }
}

/// The result of a neural network inference pass.
///
/// This is a list of tensors corresponding to the network's output nodes.
#[derive(Debug, Clone)]
pub struct Outputs {
    inner: Vec<ArrayD<f32>>,
}

impl Outputs {
    /// Returns the number of tensors in this inference output.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ArrayD<f32>> {
        self.inner.iter()
    }
}

impl From<Vec<ArrayD<f32>>> for Outputs {
    fn from(inner: Vec<ArrayD<f32>>) -> Self {
        Self { inner }
    }
}

impl Index<usize> for Outputs {
    type Output = ArrayD<f32>;

    fn index(&self, index: usize) -> &ArrayD<f32> {
        &self.inner[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_mapper() {
        let mapper = ColorMapper::linear(-1.0..=1.0);
        assert_eq!(mapper.map(Color::BLACK), [-1.0, -1.0, -1.0]);
        assert_eq!(mapper.map(Color::WHITE), [1.0, 1.0, 1.0]);

        let mapper = ColorMapper::linear(0.0..=1.0);
        assert_eq!(mapper.map(Color::RED), [1.0, 0.0, 0.0]);
    }

    #[test]
    fn detect_input_shape() {
        let (shape, res) = CnnInputShape::detect(&[1, 3, 224, 224]).unwrap();
        assert_eq!(shape, CnnInputShape::NCHW);
        assert_eq!(res, Resolution::new(224, 224));

        let (shape, res) = CnnInputShape::detect(&[1, 256, 128, 3]).unwrap();
        assert_eq!(shape, CnnInputShape::NHWC);
        assert_eq!(res, Resolution::new(128, 256));

        assert!(CnnInputShape::detect(&[1, 4, 224, 224]).is_err());
        assert!(CnnInputShape::detect(&[224, 224]).is_err());
    }

    #[test]
    fn tensor_layout() {
        // Left half red, right half green.
        let mut image = Image::new(4, 4);
        for y in 0..4 {
            for x in 0..4 {
                let color = if x < 2 { Color::RED } else { Color::GREEN };
                image.set(x, y, color);
            }
        }
        let mapper = ColorMapper::linear(0.0..=1.0);
        let res = Resolution::new(2, 2);

        let nchw = image_to_tensor(&image, image.rect(), res, CnnInputShape::NCHW, &mapper);
        assert_eq!(nchw.shape(), &[1, 3, 2, 2]);
        assert_eq!(nchw[[0, 0, 0, 0]], 1.0);
        assert_eq!(nchw[[0, 1, 0, 0]], 0.0);
        assert_eq!(nchw[[0, 1, 1, 1]], 1.0);

        let nhwc = image_to_tensor(&image, image.rect(), res, CnnInputShape::NHWC, &mapper);
        assert_eq!(nhwc.shape(), &[1, 2, 2, 3]);
        assert_eq!(nhwc[[0, 1, 0, 0]], 1.0);
        assert_eq!(nhwc[[0, 1, 1, 1]], 1.0);
        assert_eq!(nhwc[[0, 1, 1, 0]], 0.0);
    }

    #[test]
    fn roi_outside_image_is_black() {
        let image = Image::filled(4, 4, Color::WHITE);
        let roi = Rect::from_top_left(8.0, 8.0, 4.0, 4.0);
        let mapper = ColorMapper::linear(0.0..=1.0);
        let tensor = image_to_tensor(
            &image,
            roi,
            Resolution::new(2, 2),
            CnnInputShape::NCHW,
            &mapper,
        );
        assert!(tensor.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn load_requires_onnx_extension() {
        let err = Cnn::load("model.tflite").err().unwrap();
        assert!(err.to_string().contains(".onnx"), "{err}");
        assert!(Cnn::load("/nonexistent/handmoji/model.onnx").is_err());
    }

    #[test]
    fn garbage_model_fails_to_load() {
        assert!(Cnn::from_onnx(b"not a protobuf").is_err());
    }
}
