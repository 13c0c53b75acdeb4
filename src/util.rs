//! Random point-set generation, used by the demo binary and by tests that
//! want a throwaway terrain without hand-listing coordinates.

use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};

use crate::driver::InputPoint;
use crate::errors::{TerraError, TerraResult};
use crate::mesh::ids::PointId;

/// Generates a random floating-point number between 0.0 and 1.0.
#[must_use]
pub fn generate_random_float() -> f64 {
    rand::random::<f64>()
}

/// Generates `count` points scattered uniformly over `x_range`/`y_range`,
/// with elevation `sin(x) * cos(y)` scaled to give the surface some
/// relief worth refining. Optionally seeded for reproducible demos and
/// tests.
///
/// # Errors
///
/// Returns [`TerraError::InvalidParameters`] if `count < 3` or either
/// range is empty.
pub fn generate_random_points(
    count: usize,
    x_range: (f64, f64),
    y_range: (f64, f64),
    seed: Option<u64>,
) -> TerraResult<Vec<InputPoint>> {
    if count < 3 {
        return Err(TerraError::InvalidParameters(format!(
            "need at least 3 points, got {count}"
        )));
    }
    if x_range.0 >= x_range.1 || y_range.0 >= y_range.1 {
        return Err(TerraError::InvalidParameters(
            "coordinate range must have min < max".to_string(),
        ));
    }

    let mut rng = seed.map_or_else(|| rand::make_rng::<StdRng>(), StdRng::seed_from_u64);
    let points = (0..count)
        .map(|i| {
            let x = rng.random_range(x_range.0..x_range.1);
            let y = rng.random_range(y_range.0..y_range.1);
            let z = x.sin() * y.cos();
            InputPoint { pid: PointId(u32::try_from(i).unwrap_or(u32::MAX)), x, y, z }
        })
        .collect();
    Ok(points)
}

/// Convenience wrapper over [`generate_random_points`] using a fixed seed,
/// for deterministic demos and regression tests.
///
/// # Errors
///
/// Returns the same errors as [`generate_random_points`].
pub fn generate_seeded_points(count: usize, x_range: (f64, f64), y_range: (f64, f64), seed: u64) -> TerraResult<Vec<InputPoint>> {
    generate_random_points(count, x_range, y_range, Some(seed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_random_float_stays_in_unit_range() {
        for _ in 0..20 {
            let v = generate_random_float();
            assert!((0.0..1.0).contains(&v));
        }
    }

    #[test]
    fn seeded_generation_is_deterministic() {
        let a = generate_seeded_points(10, (0.0, 10.0), (0.0, 10.0), 42).unwrap();
        let b = generate_seeded_points(10, (0.0, 10.0), (0.0, 10.0), 42).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_seeds_usually_differ() {
        let a = generate_seeded_points(10, (0.0, 10.0), (0.0, 10.0), 1).unwrap();
        let b = generate_seeded_points(10, (0.0, 10.0), (0.0, 10.0), 2).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn rejects_too_few_points() {
        let err = generate_random_points(2, (0.0, 1.0), (0.0, 1.0), Some(1)).unwrap_err();
        assert!(matches!(err, TerraError::InvalidParameters(_)));
    }

    #[test]
    fn rejects_empty_range() {
        let err = generate_random_points(5, (1.0, 1.0), (0.0, 1.0), Some(1)).unwrap_err();
        assert!(matches!(err, TerraError::InvalidParameters(_)));
    }
}
