//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Convert an angle in degrees to radians.
pub fn deg_to_rad<T>(angle_deg: T) -> T
where
    T: Float,
{
    angle_deg * T::from(std::f64::consts::PI).unwrap() / T::from(180.0).unwrap()
}

/// Convert an angle in radians to degrees.
pub fn rad_to_deg<T>(angle_rad: T) -> T
where
    T: Float,
{
    angle_rad * T::from(180.0).unwrap() / T::from(std::f64::consts::PI).unwrap()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_deg_rad_conversions() {
        assert!((deg_to_rad(180f64) - std::f64::consts::PI).abs() < 1e-12);
        assert!((rad_to_deg(std::f64::consts::PI) - 180f64).abs() < 1e-12);
        assert!((rad_to_deg(deg_to_rad(22.5f64)) - 22.5f64).abs() < 1e-12);
    }
}
