use anyhow::{anyhow, Result};

use crate::frame::PixelFormat;

/// Convert a captured buffer into packed RGB24.
pub(crate) fn normalize_to_rgb(
    pixels: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
) -> Result<Vec<u8>> {
    match format {
        PixelFormat::Rgb24 => {
            check_packed_len(pixels, width, height, "RGB")?;
            Ok(pixels.to_vec())
        }
        PixelFormat::Bgr24 => {
            check_packed_len(pixels, width, height, "BGR")?;
            let mut rgb = pixels.to_vec();
            for px in rgb.chunks_exact_mut(3) {
                px.swap(0, 2);
            }
            Ok(rgb)
        }
        PixelFormat::Nv12 => nv12_to_rgb(pixels, width, height),
    }
}

fn check_packed_len(pixels: &[u8], width: u32, height: u32, name: &str) -> Result<()> {
    let expected = (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(3))
        .ok_or_else(|| anyhow!("{} frame dimensions overflow", name))?;
    if pixels.len() != expected {
        return Err(anyhow!(
            "{} frame length mismatch: expected {}, got {}",
            name,
            expected,
            pixels.len()
        ));
    }
    Ok(())
}

/// NV12: full Y plane followed by interleaved U/V at half resolution.
fn nv12_to_rgb(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let (w, h) = (width as usize, height as usize);
    if w == 0 || h == 0 {
        return Err(anyhow!("NV12 frame has zero size {}x{}", w, h));
    }
    if w % 2 != 0 {
        return Err(anyhow!("NV12 frame width must be even, got {}", w));
    }
    let luma_len = w
        .checked_mul(h)
        .ok_or_else(|| anyhow!("NV12 frame dimensions overflow"))?;
    let chroma_len = w * h.div_ceil(2);
    if pixels.len() < luma_len + chroma_len {
        return Err(anyhow!(
            "NV12 frame too short: need {} bytes, got {}",
            luma_len + chroma_len,
            pixels.len()
        ));
    }
    let (luma, chroma) = pixels.split_at(luma_len);

    let mut rgb = Vec::with_capacity(luma_len * 3);
    for (row, luma_row) in luma.chunks_exact(w).enumerate() {
        let chroma_row = &chroma[(row / 2) * w..];
        for (col, &y) in luma_row.iter().enumerate() {
            let pair = (col / 2) * 2;
            let u = chroma_row[pair] as i32 - 128;
            let v = chroma_row[pair + 1] as i32 - 128;
            rgb.extend_from_slice(&yuv_to_rgb(y as i32, u, v));
        }
    }
    Ok(rgb)
}

// Full-range BT.601 in 8.8 fixed point.
fn yuv_to_rgb(y: i32, u: i32, v: i32) -> [u8; 3] {
    let r = y + ((359 * v) >> 8);
    let g = y - ((88 * u + 183 * v) >> 8);
    let b = y + ((454 * u) >> 8);
    [saturate(r), saturate(g), saturate(b)]
}

fn saturate(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nv12_conversion_produces_gray() -> Result<()> {
        let y_plane = vec![128u8; 4];
        let uv_plane = vec![128u8; 2];
        let nv12 = [y_plane, uv_plane].concat();

        let rgb = normalize_to_rgb(&nv12, 2, 2, PixelFormat::Nv12)?;
        assert_eq!(rgb, vec![128u8; 12]);

        Ok(())
    }

    #[test]
    fn bgr_channels_are_swapped() -> Result<()> {
        let rgb = normalize_to_rgb(&[0, 10, 200], 1, 1, PixelFormat::Bgr24)?;
        assert_eq!(rgb, vec![200, 10, 0]);
        Ok(())
    }

    #[test]
    fn nv12_chroma_shifts_red() -> Result<()> {
        // V above neutral pushes red up and green down.
        let nv12 = [100, 100, 100, 100, 128, 200];
        let rgb = normalize_to_rgb(&nv12, 2, 2, PixelFormat::Nv12)?;
        assert!(rgb[0] > 100);
        assert!(rgb[1] < 100);
        assert_eq!(rgb[2], 100);
        Ok(())
    }

    #[test]
    fn nv12_zero_size_is_an_error() {
        assert!(normalize_to_rgb(&[], 0, 2, PixelFormat::Nv12).is_err());
        assert!(normalize_to_rgb(&[], 2, 0, PixelFormat::Nv12).is_err());
    }

    #[test]
    fn rgb_length_mismatch_is_an_error() {
        assert!(normalize_to_rgb(&[1u8; 8], 1, 3, PixelFormat::Rgb24).is_err());
    }
}
