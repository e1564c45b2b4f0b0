//! Software compositor — scanline polygon fill with source-over blending.

use crate::types::{OutputSurface, Region, Rgb};
use std::borrow::Cow;

/// Paint each region's interior over the frame, in input order.
///
/// Later regions blend over earlier ones at overlapping pixels, so the
/// caller's ordering is the z-order. With no regions the input pixels are
/// returned as-is, borrowed — the passthrough tick costs nothing.
pub fn composite<'a>(
    rgb: &'a [u8],
    width: u32,
    height: u32,
    regions: &[Region],
) -> OutputSurface<'a> {
    if regions.is_empty() {
        return OutputSurface {
            data: Cow::Borrowed(rgb),
            width,
            height,
        };
    }

    let mut data = rgb.to_vec();
    for region in regions {
        fill_region(&mut data, width, height, region);
    }

    OutputSurface {
        data: Cow::Owned(data),
        width,
        height,
    }
}

/// Scanline-fill one closed polygon with its style.
///
/// Even-odd rule at pixel centers: a pixel (x, y) is interior when the
/// ray through (x + 0.5, y + 0.5) crosses an odd number of edges. Rows
/// are clamped to the frame, so out-of-frame geometry costs nothing.
fn fill_region(data: &mut [u8], width: u32, height: u32, region: &Region) {
    let pts = &region.points;
    if pts.len() < 3 {
        return;
    }

    let color = region.style.color();
    let opacity = region.style.opacity();

    let y_lo = pts.iter().map(|p| p.y).fold(f32::INFINITY, f32::min);
    let y_hi = pts.iter().map(|p| p.y).fold(f32::NEG_INFINITY, f32::max);
    let row_start = y_lo.floor().max(0.0) as i64;
    let row_end = y_hi.ceil().min(height as f32 - 1.0) as i64;

    let mut crossings: Vec<f32> = Vec::new();

    for row in row_start..=row_end {
        let yc = row as f32 + 0.5;

        crossings.clear();
        for i in 0..pts.len() {
            let a = pts[i];
            let b = pts[(i + 1) % pts.len()];
            // Half-open span per edge so a vertex on the scanline is
            // counted exactly once.
            if (a.y <= yc && yc < b.y) || (b.y <= yc && yc < a.y) {
                crossings.push(a.x + (yc - a.y) * (b.x - a.x) / (b.y - a.y));
            }
        }
        crossings.sort_by(|u, v| u.partial_cmp(v).unwrap_or(std::cmp::Ordering::Equal));

        for pair in crossings.chunks_exact(2) {
            // Interior pixels: span_lo <= x + 0.5 < span_hi.
            let x_start = ((pair[0] - 0.5).ceil().max(0.0)) as i64;
            let x_end = ((pair[1] - 0.5).ceil() as i64 - 1).min(width as i64 - 1);
            for x in x_start..=x_end {
                let off = ((row as u32 * width + x as u32) * 3) as usize;
                blend_pixel(&mut data[off..off + 3], color, opacity);
            }
        }
    }
}

/// Source-over: out = color * opacity + under * (1 - opacity), per channel.
fn blend_pixel(px: &mut [u8], color: Rgb, opacity: f32) {
    let mix = |over: u8, under: u8| -> u8 {
        (over as f32 * opacity + under as f32 * (1.0 - opacity))
            .round()
            .clamp(0.0, 255.0) as u8
    };
    px[0] = mix(color.r, px[0]);
    px[1] = mix(color.g, px[1]);
    px[2] = mix(color.b, px[2]);
}
