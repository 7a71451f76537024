//! Scale arithmetic and resampling filters

use serde::{Deserialize, Serialize};

use crate::error::{BatchScaleError, Result};

/// Available resize filters
///
/// Only smooth filters are offered; there is no nearest-neighbour
/// variant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterType {
    /// Triangle (linear interpolation)
    Triangle,
    /// Catmull-Rom cubic spline
    CatmullRom,
    /// Gaussian blur
    Gaussian,
    /// Lanczos with radius 3 (high quality, recommended)
    #[default]
    Lanczos3,
}

impl From<FilterType> for image::imageops::FilterType {
    fn from(filter: FilterType) -> Self {
        match filter {
            FilterType::Triangle => image::imageops::FilterType::Triangle,
            FilterType::CatmullRom => image::imageops::FilterType::CatmullRom,
            FilterType::Gaussian => image::imageops::FilterType::Gaussian,
            FilterType::Lanczos3 => image::imageops::FilterType::Lanczos3,
        }
    }
}

/// Reject scale factors that are not strictly positive and finite
pub fn validate_scale(scale: f64) -> Result<()> {
    if !scale.is_finite() || scale <= 0.0 {
        return Err(BatchScaleError::validation(
            format!("Scale factor must be a positive number, got {}", scale),
            None,
        ));
    }
    Ok(())
}

/// Compute output dimensions as `floor(original * scale)` on each axis.
///
/// Truncates rather than rounds. Fails when either side would be zero or
/// does not fit in a `u32`.
pub fn scaled_dimensions(width: u32, height: u32, scale: f64) -> Result<(u32, u32)> {
    validate_scale(scale)?;

    let scale_axis = |side: u32, axis: &str| -> Result<u32> {
        let scaled = (f64::from(side) * scale).floor();
        if scaled < 1.0 || scaled > f64::from(u32::MAX) {
            return Err(BatchScaleError::validation(
                format!(
                    "Invalid dimensions: {} {} * {} gives {}",
                    axis, side, scale, scaled
                ),
                None,
            ));
        }
        Ok(scaled as u32)
    };

    Ok((scale_axis(width, "width")?, scale_axis(height, "height")?))
}
