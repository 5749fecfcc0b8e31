use starfield_core::{glam::DVec3, StarPoint};

use rand::{rngs::StdRng, Rng, SeedableRng};

// This only depends on `starfield_core`, otherwise crates that use it as a dev-dependency would see two copies of their own
// types: https://github.com/rust-lang/cargo/issues/6765

/// Nine stars in the cube `[-10, 10]^3`, with ids `1..=9` and magnitudes equal to their ids.
///
/// Built with brightness order and 4 points per node:
///   - stars 1-4 fill the root
///   - stars 5-8 all fall in the `+x +y +z` child, which fills up and ends the level 1 pass
///   - star 9 is therefore placed at level 2, under the `-x -y -z` child
pub fn nine_star_fixture() -> Vec<StarPoint> {
    let positions = [
        [-10.0, -10.0, -10.0],
        [10.0, 10.0, 10.0],
        [-5.0, 5.0, -5.0],
        [5.0, -5.0, 5.0],
        [2.0, 2.0, 2.0],
        [6.0, 6.0, 6.0],
        [3.0, 7.0, 1.0],
        [8.0, 1.0, 4.0],
        [-7.0, -7.0, -7.0],
    ];

    positions
        .iter()
        .enumerate()
        .map(|(i, p)| StarPoint::new(i as u64 + 1, DVec3::from(*p), (i + 1) as f32))
        .collect()
}

/// `num_stars` stars uniformly distributed in `[-half_extent, half_extent]^3`, with magnitudes in `[-1, 20)`. The same
/// arguments always produce the same catalog.
pub fn random_star_catalog(num_stars: usize, half_extent: f64) -> Vec<StarPoint> {
    let mut rng = StdRng::seed_from_u64(num_stars as u64);

    (0..num_stars)
        .map(|i| {
            let position = DVec3::new(
                rng.gen_range(-half_extent..=half_extent),
                rng.gen_range(-half_extent..=half_extent),
                rng.gen_range(-half_extent..=half_extent),
            );

            StarPoint::new(i as u64, position, rng.gen_range(-1.0..20.0))
        })
        .collect()
}
