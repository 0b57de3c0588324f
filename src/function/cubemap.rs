//! Host-side conversions between cubemaps and latitude-longitude maps.
//!
//! Cubemaps are laid out as `[6, R, R, 3]` in the face order
//! `+x, -x, +y, -y, +z, -z`. Latitude-longitude maps are `[H, W, 3]`.

use rayon::prelude::*;
use std::f32::consts::PI;

/// The direction through the texel coordinate `(x, y)` in `[-1, 1]` of `face`.
pub fn cube_to_dir(
    face: usize,
    x: f32,
    y: f32,
) -> [f32; 3] {
    match face {
        0 => [1.0, -y, -x],
        1 => [-1.0, -y, x],
        2 => [x, 1.0, y],
        3 => [x, -1.0, -y],
        4 => [x, -y, 1.0],
        _ => [-x, -y, -1.0],
    }
}

/// The face and texel coordinate in `[-1, 1]` hit by `dir`.
pub fn dir_to_cube([x, y, z]: [f32; 3]) -> (usize, f32, f32) {
    let (ax, ay, az) = (x.abs(), y.abs(), z.abs());

    if ax >= ay && ax >= az {
        if x >= 0.0 {
            (0, -z / ax, -y / ax)
        } else {
            (1, z / ax, -y / ax)
        }
    } else if ay >= az {
        if y >= 0.0 {
            (2, x / ay, z / ay)
        } else {
            (3, x / ay, -z / ay)
        }
    } else if z >= 0.0 {
        (4, x / az, -y / az)
    } else {
        (5, -x / az, -y / az)
    }
}

/// Unrolling a cubemap of resolution `resolution` to a latlong map.
pub fn cubemap_to_latlong(
    cubemap: &[f32],
    resolution: usize,
    [height, width]: [usize; 2],
) -> Vec<f32> {
    let mut latlong = vec![0.0; height * width * 3];

    latlong
        .par_chunks_mut(3)
        .enumerate()
        .for_each(|(index, texel)| {
            let (row, col) = (index / width, index % width);
            let theta = (row as f32 + 0.5) / height as f32 * PI;
            let phi = ((col as f32 + 0.5) / width as f32 * 2.0 - 1.0) * PI;
            let dir = [
                theta.sin() * phi.sin(),
                theta.cos(),
                -theta.sin() * phi.cos(),
            ];

            let (face, x, y) = dir_to_cube(dir);
            let to_texel = |v: f32| {
                (((v + 1.0) * 0.5 * resolution as f32) as usize).min(resolution - 1)
            };
            let offset = ((face * resolution + to_texel(y)) * resolution
                + to_texel(x))
                * 3;
            texel.copy_from_slice(&cubemap[offset..offset + 3]);
        });

    latlong
}

/// Projecting a latlong map of shape `[height, width, 3]` onto a cubemap.
///
/// The latlong map is sampled bilinearly and wraps around horizontally.
pub fn latlong_to_cubemap(
    latlong: &[f32],
    [height, width]: [usize; 2],
    resolution: usize,
) -> Vec<f32> {
    let mut cubemap = vec![0.0; 6 * resolution * resolution * 3];
    let fetch = |row: usize, col: usize, channel: usize| {
        latlong[(row.min(height - 1) * width + col % width) * 3 + channel]
    };

    cubemap
        .par_chunks_mut(3)
        .enumerate()
        .for_each(|(index, texel)| {
            let face = index / (resolution * resolution);
            let row = index / resolution % resolution;
            let col = index % resolution;
            let to_coord = |i: usize| (2 * i + 1) as f32 / resolution as f32 - 1.0;

            let [x, y, z] = normalize(cube_to_dir(face, to_coord(col), to_coord(row)));
            let u = x.atan2(-z) / (2.0 * PI) + 0.5;
            let v = y.clamp(-1.0, 1.0).acos() / PI;

            let s = (u * width as f32 - 0.5).rem_euclid(width as f32);
            let t = (v * height as f32 - 0.5).max(0.0);
            let (col_0, row_0) = (s.floor() as usize, t.floor() as usize);
            let (ds, dt) = (s.fract(), t.fract());

            for (channel, value) in texel.iter_mut().enumerate() {
                let top = fetch(row_0, col_0, channel) * (1.0 - ds)
                    + fetch(row_0, col_0 + 1, channel) * ds;
                let bottom = fetch(row_0 + 1, col_0, channel) * (1.0 - ds)
                    + fetch(row_0 + 1, col_0 + 1, channel) * ds;
                *value = top * (1.0 - dt) + bottom * dt;
            }
        });

    cubemap
}

#[inline]
fn normalize([x, y, z]: [f32; 3]) -> [f32; 3] {
    let length = (x * x + y * y + z * z).sqrt().max(f32::EPSILON);
    [x / length, y / length, z / length]
}

#[cfg(test)]
mod tests {
    #[test]
    fn dir_to_cube_inverts_cube_to_dir() {
        use super::*;

        for face in 0..6 {
            for (x, y) in [(0.0, 0.0), (0.5, -0.25), (-0.75, 0.9)] {
                let dir = cube_to_dir(face, x, y);
                let (face_output, x_output, y_output) = dir_to_cube(dir);
                assert_eq!(face_output, face, "face of {dir:?}");
                assert!((x_output - x).abs() < 1e-6, "x of {dir:?}");
                assert!((y_output - y).abs() < 1e-6, "y of {dir:?}");
            }
        }
    }

    #[test]
    fn constant_maps_stay_constant() {
        use super::*;

        let cubemap = [0.25, 0.5, 1.0].repeat(6 * 4 * 4);
        let latlong = cubemap_to_latlong(&cubemap, 4, [8, 16]);
        assert_eq!(latlong.len(), 8 * 16 * 3);
        assert!(latlong.chunks(3).all(|texel| texel == [0.25, 0.5, 1.0]));

        let cubemap = latlong_to_cubemap(&latlong, [8, 16], 4);
        assert_eq!(cubemap.len(), 6 * 4 * 4 * 3);
        assert!(cubemap
            .chunks(3)
            .all(|texel| texel.iter().zip([0.25, 0.5, 1.0]).all(|(a, b)| (a - b).abs() < 1e-6)));
    }

    #[test]
    fn latlong_top_row_is_up_face() {
        use super::*;

        let resolution = 2;
        let mut cubemap = vec![0.0; 6 * resolution * resolution * 3];
        cubemap[2 * resolution * resolution * 3..3 * resolution * resolution * 3]
            .fill(1.0);

        let latlong = cubemap_to_latlong(&cubemap, resolution, [16, 32]);
        assert!(latlong[..32 * 3].iter().all(|value| *value == 1.0));
        assert!(latlong[15 * 32 * 3..].iter().all(|value| *value == 0.0));
    }
}
