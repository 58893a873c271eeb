//! Print Profile
//!
//! Physical output parameters for print templates. The raster itself is
//! always the template canvas; the profile only tells downstream print
//! tooling how large a pixel is.

use serde::{Deserialize, Serialize};

const METERS_PER_INCH: f64 = 0.0254;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintProfile {
    pub dpi: u32,
}

impl PrintProfile {
    /// 8.5in x 11in canvases at 300 dpi.
    pub fn letter_300dpi() -> Self {
        Self { dpi: 300 }
    }

    /// PNG `pHYs` density.
    pub fn pixels_per_meter(&self) -> u32 {
        (self.dpi as f64 / METERS_PER_INCH).round() as u32
    }
}
