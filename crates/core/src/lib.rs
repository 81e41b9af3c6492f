//! Core units, constants, and shared primitives for the Persistent Thrust workspace.

pub mod window;

pub use window::SlidingWindow;

/// Physical constants expressed in SI units (unless stated otherwise).
pub mod constants {
    /// Standard gravity at Earth's surface (m/s²).
    pub const G0: f64 = 9.80665;
    /// Kilograms per metric tonne. Resource densities are expressed in t/unit.
    pub const KG_PER_TONNE: f64 = 1_000.0;
    /// Newtons per kilonewton. Persisted thrust values are kN.
    pub const N_PER_KN: f64 = 1_000.0;
    /// Below this magnitude a quantity is treated as empty when used as a denominator.
    pub const DENOMINATOR_EPSILON: f64 = 1e-9;
}

/// Basic unit conversion helpers.
pub mod units {
    use super::constants::{KG_PER_TONNE, N_PER_KN};

    /// Convert kilonewtons to newtons.
    #[inline]
    pub fn kn_to_n(v: f64) -> f64 {
        v * N_PER_KN
    }

    /// Convert tonnes to kilograms.
    #[inline]
    pub fn tonnes_to_kg(v: f64) -> f64 {
        v * KG_PER_TONNE
    }
}

/// Ratio helpers shared by every found-ratio computation.
pub mod ratio {
    use super::constants::DENOMINATOR_EPSILON;

    /// Clamp into `[0, 1]`, mapping NaN to zero.
    #[inline]
    pub fn clamp_unit(v: f64) -> f64 {
        if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
    }

    /// `available / requested` clamped into `[0, 1]`.
    ///
    /// A request below [`DENOMINATOR_EPSILON`] is always satisfiable and yields `1.0`.
    #[inline]
    pub fn availability(available: f64, requested: f64) -> f64 {
        if requested <= DENOMINATOR_EPSILON {
            return 1.0;
        }
        clamp_unit(available.max(0.0) / requested)
    }
}

/// Minimal vector helpers to avoid ad-hoc `[f64; 3]` math everywhere.
pub mod vector {
    /// Alias for a 3D vector in metres or m/s depending on context.
    pub type Vector3 = [f64; 3];

    /// The zero vector.
    pub const ZERO: Vector3 = [0.0, 0.0, 0.0];

    /// Euclidean norm of a vector.
    #[inline]
    pub fn norm(v: &Vector3) -> f64 {
        dot(v, v).sqrt()
    }

    /// Dot product of two vectors.
    #[inline]
    pub fn dot(a: &Vector3, b: &Vector3) -> f64 {
        a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
    }

    /// Cross product `a × b`.
    #[inline]
    pub fn cross(a: &Vector3, b: &Vector3) -> Vector3 {
        [
            a[1] * b[2] - a[2] * b[1],
            a[2] * b[0] - a[0] * b[2],
            a[0] * b[1] - a[1] * b[0],
        ]
    }

    /// Vector addition.
    #[inline]
    pub fn add(a: &Vector3, b: &Vector3) -> Vector3 {
        [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
    }

    /// Vector subtraction.
    #[inline]
    pub fn sub(a: &Vector3, b: &Vector3) -> Vector3 {
        [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
    }

    /// Scale a vector by a scalar.
    #[inline]
    pub fn scale(v: &Vector3, s: f64) -> Vector3 {
        [v[0] * s, v[1] * s, v[2] * s]
    }

    /// Negate a vector.
    #[inline]
    pub fn neg(v: &Vector3) -> Vector3 {
        [-v[0], -v[1], -v[2]]
    }

    /// Unit vector along `v`, or the zero vector when `v` has no usable direction.
    #[inline]
    pub fn normalize(v: &Vector3) -> Vector3 {
        let n = norm(v);
        if n.is_finite() && n > 1e-12 {
            scale(v, 1.0 / n)
        } else {
            ZERO
        }
    }

    /// True when every component is exactly zero.
    #[inline]
    pub fn is_zero(v: &Vector3) -> bool {
        v[0] == 0.0 && v[1] == 0.0 && v[2] == 0.0
    }

    /// Swap the y and z components.
    ///
    /// Vehicle-local vectors are y-up while orbit state vectors are z-up; the
    /// swap is its own inverse.
    #[inline]
    pub fn swap_yz(v: &Vector3) -> Vector3 {
        [v[0], v[2], v[1]]
    }
}

/// Stable identifiers that survive scene reloads.
pub mod ids {
    use std::fmt;

    use serde::{Deserialize, Serialize};

    /// Persistent identifier of a vessel.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct VesselId(pub u64);

    /// Persistent identifier of a part within a vessel.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct PartId(pub u64);

    impl fmt::Display for VesselId {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "vessel#{}", self.0)
        }
    }

    impl fmt::Display for PartId {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "part#{}", self.0)
        }
    }
}
