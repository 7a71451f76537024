//! Codec seam between the batch pipeline and the pixel-level image library

use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage};
use tracing::debug;

use crate::error::CodecError;
use crate::processing::formats::detect_input_format;
use crate::processing::resize::FilterType;

/// Decode, resize and encode operations the pipeline needs from an image library.
///
/// A raster is owned by exactly one job; it is moved into `resize` and
/// dropped once encoded.
pub trait ImageCodec: Send + Sync {
    /// Decoded pixel data
    type Raster: Send;

    /// Decode PNG or JPEG bytes
    fn decode(&self, bytes: &[u8]) -> Result<Self::Raster, CodecError>;

    /// Width and height of a decoded raster
    fn dimensions(&self, raster: &Self::Raster) -> (u32, u32);

    /// Resample to exactly `width` x `height`
    fn resize(
        &self,
        raster: Self::Raster,
        width: u32,
        height: u32,
        filter: FilterType,
    ) -> Result<Self::Raster, CodecError>;

    /// Encode as baseline JPEG at `quality` (1-100)
    fn encode_jpeg(&self, raster: &Self::Raster, quality: u8) -> Result<Vec<u8>, CodecError>;
}

/// Codec backed by the `image` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCrateCodec;

impl ImageCodec for ImageCrateCodec {
    type Raster = DynamicImage;

    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, CodecError> {
        let format = detect_input_format(bytes).ok_or_else(|| {
            CodecError::Unsupported(
                infer::get(bytes)
                    .map(|kind| kind.mime_type().to_string())
                    .unwrap_or_else(|| "unrecognized signature".to_string()),
            )
        })?;

        let image = image::load_from_memory_with_format(bytes, format.into())?;
        debug!("Decoded {:?} image {}x{}", format, image.width(), image.height());
        Ok(image)
    }

    fn dimensions(&self, raster: &DynamicImage) -> (u32, u32) {
        (raster.width(), raster.height())
    }

    fn resize(
        &self,
        raster: DynamicImage,
        width: u32,
        height: u32,
        filter: FilterType,
    ) -> Result<DynamicImage, CodecError> {
        Ok(raster.resize_exact(width, height, filter.into()))
    }

    fn encode_jpeg(&self, raster: &DynamicImage, quality: u8) -> Result<Vec<u8>, CodecError> {
        // JPEG carries no alpha channel
        let rgb = raster.to_rgb8();
        let mut bytes = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut bytes, quality);
        encoder.encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)?;
        Ok(bytes)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Codec doubles for exercising the pipeline without real pixel work

    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Delegates to [`ImageCrateCodec`] and counts every call
    #[derive(Debug, Default)]
    pub struct CountingCodec {
        pub calls: AtomicUsize,
    }

    impl CountingCodec {
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ImageCodec for CountingCodec {
        type Raster = DynamicImage;

        fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, CodecError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            ImageCrateCodec.decode(bytes)
        }

        fn dimensions(&self, raster: &DynamicImage) -> (u32, u32) {
            ImageCrateCodec.dimensions(raster)
        }

        fn resize(
            &self,
            raster: DynamicImage,
            width: u32,
            height: u32,
            filter: FilterType,
        ) -> Result<DynamicImage, CodecError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            ImageCrateCodec.resize(raster, width, height, filter)
        }

        fn encode_jpeg(&self, raster: &DynamicImage, quality: u8) -> Result<Vec<u8>, CodecError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            ImageCrateCodec.encode_jpeg(raster, quality)
        }
    }

    /// Decodes normally but fails every resize
    #[derive(Debug, Default)]
    pub struct FailingResizeCodec;

    impl ImageCodec for FailingResizeCodec {
        type Raster = DynamicImage;

        fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, CodecError> {
            ImageCrateCodec.decode(bytes)
        }

        fn dimensions(&self, raster: &DynamicImage) -> (u32, u32) {
            ImageCrateCodec.dimensions(raster)
        }

        fn resize(
            &self,
            _raster: DynamicImage,
            _width: u32,
            _height: u32,
            _filter: FilterType,
        ) -> Result<DynamicImage, CodecError> {
            Err(CodecError::Other("resampler exhausted".to_string()))
        }

        fn encode_jpeg(&self, raster: &DynamicImage, quality: u8) -> Result<Vec<u8>, CodecError> {
            ImageCrateCodec.encode_jpeg(raster, quality)
        }
    }
}
