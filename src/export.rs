//! PNG export of generated worlds.
//!
//! Renders the heightmap with an elevation colormap and overlays rivers,
//! roads, and bridge spans. Intended for inspecting generation output; the
//! real rendering layer consumes the raw data structures instead.

use image::{ImageBuffer, Rgb, RgbImage};

use crate::geom::Point2;
use crate::heightmap::Heightmap;
use crate::world::WorldData;

/// Export a heightmap using a spectral colormap.
/// Heights are normalized over the map's full range.
pub fn export_heightmap(hm: &Heightmap, path: &str) -> Result<(), image::ImageError> {
    let per_axis = hm.samples_per_axis() as u32;
    let mut img: RgbImage = ImageBuffer::new(per_axis, per_axis);

    let min = hm.min_height();
    let range = (hm.max_height() - min).max(1e-6);

    for iz in 0..per_axis {
        for ix in 0..per_axis {
            let h = hm.grid_height(ix as usize, iz as usize);
            let t = (h - min) / range;
            img.put_pixel(ix, iz, Rgb(spectral_colormap(t.clamp(0.0, 1.0))));
        }
    }

    img.save(path)
}

/// Export the full world: elevation-shaded terrain with rivers (blue),
/// roads (near-black), and bridge spans (red). `scale` is pixels per
/// heightmap sample.
pub fn export_world_map(world: &WorldData, path: &str, scale: u32) -> Result<(), image::ImageError> {
    let hm = &world.heightmap;
    let scale = scale.max(1);
    let per_axis = hm.samples_per_axis() as u32;
    let dim = per_axis * scale;
    let mut img: RgbImage = ImageBuffer::new(dim, dim);

    let max = hm.max_height().max(hm.sea_level + 1.0);
    for pz in 0..dim {
        for px in 0..dim {
            let x = -hm.half + px as f32 / (dim - 1) as f32 * hm.size;
            let z = -hm.half + pz as f32 / (dim - 1) as f32 * hm.size;
            let h = hm.sample_height(x, z);
            img.put_pixel(px, pz, Rgb(elevation_color(h, hm.sea_level, max)));
        }
    }

    for river in &world.rivers {
        draw_polyline(&mut img, hm, &river.points, [58, 108, 214]);
    }

    for road in &world.roads {
        let ground: Vec<Point2> = road.path.iter().map(|p| p.ground()).collect();
        draw_polyline(&mut img, hm, &ground, [40, 36, 32]);
        for span in &road.bridge_spans {
            let span_points: Vec<Point2> = road.path[span.start_index..=span.end_index]
                .iter()
                .map(|p| p.ground())
                .collect();
            draw_polyline(&mut img, hm, &span_points, [205, 52, 46]);
        }
    }

    img.save(path)
}

/// Terrain color by elevation: blue depths, sandy shores, green lowland,
/// brown highland, white peaks.
fn elevation_color(h: f32, sea_level: f32, max: f32) -> [u8; 3] {
    if h < sea_level {
        let depth = ((sea_level - h) / 24.0).clamp(0.0, 1.0);
        return mix([94, 158, 214], [16, 38, 96], depth);
    }

    let t = ((h - sea_level) / (max - sea_level).max(1e-6)).clamp(0.0, 1.0);
    if t < 0.04 {
        mix([194, 178, 128], [120, 158, 82], t / 0.04)
    } else if t < 0.45 {
        mix([120, 158, 82], [118, 96, 66], (t - 0.04) / 0.41)
    } else if t < 0.8 {
        mix([118, 96, 66], [150, 142, 134], (t - 0.45) / 0.35)
    } else {
        mix([150, 142, 134], [244, 246, 248], (t - 0.8) / 0.2)
    }
}

fn mix(a: [u8; 3], b: [u8; 3], t: f32) -> [u8; 3] {
    let t = t.clamp(0.0, 1.0);
    [
        (a[0] as f32 + (b[0] as f32 - a[0] as f32) * t) as u8,
        (a[1] as f32 + (b[1] as f32 - a[1] as f32) * t) as u8,
        (a[2] as f32 + (b[2] as f32 - a[2] as f32) * t) as u8,
    ]
}

/// Stamp a world-space polyline into the image, stepping each segment at
/// sub-pixel resolution.
fn draw_polyline(img: &mut RgbImage, hm: &Heightmap, points: &[Point2], color: [u8; 3]) {
    let dim = img.width();
    if dim < 2 {
        return;
    }
    let to_pixel = |p: Point2| -> (f32, f32) {
        (
            (p.x + hm.half) / hm.size * (dim - 1) as f32,
            (p.z + hm.half) / hm.size * (dim - 1) as f32,
        )
    };

    for w in points.windows(2) {
        let (x0, z0) = to_pixel(w[0]);
        let (x1, z1) = to_pixel(w[1]);
        let steps = ((x1 - x0).abs().max((z1 - z0).abs()).ceil() as u32).max(1) * 2;
        for s in 0..=steps {
            let t = s as f32 / steps as f32;
            let px = x0 + (x1 - x0) * t;
            let pz = z0 + (z1 - z0) * t;
            if px >= 0.0 && pz >= 0.0 && (px as u32) < dim && (pz as u32) < dim {
                img.put_pixel(px as u32, pz as u32, Rgb(color));
            }
        }
    }
}

/// Spectral colormap (matplotlib style): dark blue -> cyan -> green -> yellow -> orange -> red
fn spectral_colormap(t: f32) -> [u8; 3] {
    let colors: [[f32; 3]; 11] = [
        [0.37, 0.31, 0.64],
        [0.20, 0.53, 0.74],
        [0.40, 0.76, 0.65],
        [0.67, 0.87, 0.64],
        [0.90, 0.96, 0.60],
        [1.00, 1.00, 0.75],
        [1.00, 0.88, 0.55],
        [0.99, 0.68, 0.38],
        [0.96, 0.43, 0.26],
        [0.84, 0.24, 0.31],
        [0.62, 0.00, 0.26],
    ];

    let t_scaled = t * 10.0;
    let idx = (t_scaled as usize).min(9);
    let frac = t_scaled - idx as f32;

    let c1 = colors[idx];
    let c2 = colors[idx + 1];

    [
        ((c1[0] + (c2[0] - c1[0]) * frac) * 255.0) as u8,
        ((c1[1] + (c2[1] - c1[1]) * frac) * 255.0) as u8,
        ((c1[2] + (c2[2] - c1[2]) * frac) * 255.0) as u8,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elevation_color_bands() {
        // Water is blue-dominant, peaks are near-white.
        let water = elevation_color(-10.0, 0.0, 200.0);
        assert!(water[2] > water[0] && water[2] > water[1]);

        let peak = elevation_color(200.0, 0.0, 200.0);
        assert!(peak.iter().all(|&c| c > 220));
    }

    #[test]
    fn test_spectral_colormap_endpoints() {
        assert_eq!(spectral_colormap(0.0), [94, 79, 163]);
        let high = spectral_colormap(1.0);
        assert!(high[0] > 140 && high[2] < 80);
    }
}
