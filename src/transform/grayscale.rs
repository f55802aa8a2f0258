use super::{LumaWeights, WEIGHT_SHIFT};
use crate::error::ShellError;
use image::{DynamicImage, GenericImageView, Luma, Rgb};
use imageproc::map::map_colors;

const ROUNDING: u32 = 1 << (WEIGHT_SHIFT - 1);

/// Convert an image to single-channel 8-bit luminance.
/// Alpha is discarded, dimensions are preserved.
pub fn apply(image: &DynamicImage, weights: LumaWeights) -> Result<DynamicImage, ShellError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(ShellError::Decode(format!(
            "image has no pixels ({}x{})",
            width, height
        )));
    }

    let [wr, wg, wb] = weights.fixed_point();
    let rgb = image.to_rgb8();
    let gray = map_colors(&rgb, |Rgb([r, g, b])| {
        let y = (u32::from(r) * wr + u32::from(g) * wg + u32::from(b) * wb + ROUNDING)
            >> WEIGHT_SHIFT;
        Luma([y.min(255) as u8])
    });

    Ok(DynamicImage::ImageLuma8(gray))
}
