use std::{
    env::{self, VarError},
    panic::{catch_unwind, AssertUnwindSafe},
};

use image::ImageBuffer;
use once_cell::sync::Lazy;

use super::Image;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JpegBackend {
    /// Uses the `jpeg-decoder` crate (through `image`), a robust but slow pure-Rust JPEG decoder.
    JpegDecoder,
    /// Uses the `mozjpeg` crate, a wrapper around Mozilla's libjpeg fork. Robust and fast-ish, but
    /// C.
    MozJpeg,
}

const DEFAULT_BACKEND: JpegBackend = JpegBackend::MozJpeg;

static JPEG_BACKEND: Lazy<JpegBackend> = Lazy::new(|| {
    let backend = parse_backend(env::var("HANDMOJI_JPEG_BACKEND"));
    log::debug!("using JPEG decode backend: {:?}", backend);
    backend
});

fn parse_backend(var: Result<String, VarError>) -> JpegBackend {
    match var {
        Ok(v) if v == "mozjpeg" => JpegBackend::MozJpeg,
        Ok(v) if v == "jpeg-decoder" => JpegBackend::JpegDecoder,
        Ok(v) => {
            log::warn!(
                "invalid value set for `HANDMOJI_JPEG_BACKEND` variable: '{v}'; using {:?}",
                DEFAULT_BACKEND
            );
            DEFAULT_BACKEND
        }
        Err(VarError::NotPresent) => DEFAULT_BACKEND,
        Err(VarError::NotUnicode(s)) => {
            log::warn!(
                "invalid value set for `HANDMOJI_JPEG_BACKEND` variable: {}; using {:?}",
                s.to_string_lossy(),
                DEFAULT_BACKEND
            );
            DEFAULT_BACKEND
        }
    }
}

pub(super) fn decode_jpeg(data: &[u8]) -> anyhow::Result<Image> {
    decode_with(*JPEG_BACKEND, data)
}

fn decode_with(backend: JpegBackend, data: &[u8]) -> anyhow::Result<Image> {
    let buf = match backend {
        JpegBackend::JpegDecoder => {
            image::load_from_memory_with_format(data, image::ImageFormat::Jpeg)?.to_rgba8()
        }
        JpegBackend::MozJpeg => {
            // mozjpeg crate unfortunately reports errors only via unwinding
            let (buf, width, height) = catch_unwind(AssertUnwindSafe(|| -> anyhow::Result<_> {
                let mut decompress = mozjpeg::Decompress::new_mem(data)?;

                // Tune settings for decode performance.
                decompress.do_fancy_upsampling(false);
                decompress.dct_method(mozjpeg::DctMethod::IntegerFast);

                let mut decompress = decompress.rgba()?;
                let buf = decompress
                    .read_scanlines_flat()
                    .ok_or_else(|| anyhow::anyhow!("failed to decode image"))?;
                Ok((buf, decompress.width(), decompress.height()))
            }))
            .map_err(|payload| match payload.downcast::<String>() {
                Ok(string) => anyhow::Error::msg(string),
                Err(_) => anyhow::anyhow!("<unknown panic message>"),
            })??;

            ImageBuffer::from_raw(u32::try_from(width)?, u32::try_from(height)?, buf)
                .ok_or_else(|| anyhow::anyhow!("decoded JPEG has unexpected buffer size"))?
        }
    };

    Ok(Image { buf })
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;

    use super::*;

    #[test]
    fn backend_selection() {
        assert_eq!(
            parse_backend(Err(VarError::NotPresent)),
            JpegBackend::MozJpeg
        );
        assert_eq!(
            parse_backend(Ok("jpeg-decoder".into())),
            JpegBackend::JpegDecoder
        );
        assert_eq!(parse_backend(Ok("mozjpeg".into())), JpegBackend::MozJpeg);
        assert_eq!(parse_backend(Ok("turbo".into())), DEFAULT_BACKEND);
        assert_eq!(
            parse_backend(Err(VarError::NotUnicode(OsString::from("x")))),
            DEFAULT_BACKEND
        );
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(decode_with(JpegBackend::JpegDecoder, b"definitely not a jpeg").is_err());
    }
}
