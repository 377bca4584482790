//! Request files and mask images.

use anyhow::{bail, Context, Result};
use std::path::Path;

use bodyfit_core::{FitRequest, Measurements, SilhouetteMask};

/// Read a JSON request: `{"front": {...}, "side": {...}, "height_cm": 175}`
pub fn read_request(path: &Path) -> Result<FitRequest> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading request {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing request {}", path.display()))
}

/// Load a mask image; pixels brighter than `threshold` are foreground
pub fn load_mask(path: &Path, threshold: u8) -> Result<SilhouetteMask> {
    let luma = image::open(path)
        .with_context(|| format!("opening mask {}", path.display()))?
        .to_luma8();

    Ok(SilhouetteMask::from_fn(luma.width(), luma.height(), |x, y| {
        luma.get_pixel(x, y)[0] > threshold
    }))
}

/// Attach mask images to the views of `request`
pub fn attach_masks(
    request: &mut FitRequest,
    front: Option<&Path>,
    side: Option<&Path>,
    threshold: u8,
) -> Result<()> {
    if let Some(path) = front {
        request.front.mask = Some(load_mask(path, threshold)?);
    }
    if let Some(path) = side {
        let Some(view) = request.side.as_mut() else {
            bail!("side mask given but the request has no side view");
        };
        view.mask = Some(load_mask(path, threshold)?);
    }
    Ok(())
}

/// Read measurements either bare or wrapped in an estimate response
pub fn read_measurements(path: &Path) -> Result<Measurements> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading measurements {}", path.display()))?;
    let mut value: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("parsing measurements {}", path.display()))?;

    if let Some(inner) = value.get_mut("measurements") {
        value = inner.take();
    }
    serde_json::from_value(value).context("measurement record is incomplete")
}
