//! Universal-variable Kepler propagation.
//!
//! The orbit is stored as a state vector at an epoch, so re-initialising from
//! state vectors is exact and cheap. Propagation solves the universal Kepler
//! equation with Newton iteration, which covers elliptic, parabolic, and
//! hyperbolic conics without special cases.

use std::f64::consts::TAU;

use pt_core::vector::{self, Vector3};

use crate::{Orbit, OrbitError};

const MAX_ITERATIONS: usize = 200;
const STUMPFF_SERIES_LIMIT: f64 = 1e-6;
const ALPHA_EPSILON: f64 = 1e-15;

#[derive(Debug, Clone, PartialEq)]
pub struct KeplerOrbit {
    mu: f64,
    epoch: f64,
    position: Vector3,
    velocity: Vector3,
}

impl KeplerOrbit {
    pub fn from_state_vectors(
        mu: f64,
        position: Vector3,
        velocity: Vector3,
        epoch: f64,
    ) -> Result<Self, OrbitError> {
        if !mu.is_finite() || mu <= 0.0 {
            return Err(OrbitError::InvalidMu(mu));
        }
        validate_state(&position, &velocity, epoch)?;
        Ok(Self {
            mu,
            epoch,
            position,
            velocity,
        })
    }

    /// Circular equatorial orbit of the given radius, prograde about +z.
    pub fn circular(mu: f64, radius: f64, epoch: f64) -> Result<Self, OrbitError> {
        let speed = (mu / radius).sqrt();
        Self::from_state_vectors(mu, [radius, 0.0, 0.0], [0.0, speed, 0.0], epoch)
    }

    pub fn mu(&self) -> f64 {
        self.mu
    }

    pub fn epoch(&self) -> f64 {
        self.epoch
    }

    /// Position and velocity at `ut`.
    pub fn state_at(&self, ut: f64) -> (Vector3, Vector3) {
        let dt = ut - self.epoch;
        if dt == 0.0 || !dt.is_finite() {
            return (self.position, self.velocity);
        }
        propagate(self.mu, &self.position, &self.velocity, dt)
    }

    /// Specific orbital energy (J/kg).
    pub fn specific_energy(&self) -> f64 {
        let r = vector::norm(&self.position);
        let v = vector::norm(&self.velocity);
        0.5 * v * v - self.mu / r
    }

    /// Semi-major axis; negative for hyperbolic orbits and infinite for parabolic ones.
    pub fn semi_major_axis(&self) -> f64 {
        let energy = self.specific_energy();
        if energy == 0.0 {
            f64::INFINITY
        } else {
            -self.mu / (2.0 * energy)
        }
    }

    pub fn angular_momentum(&self) -> Vector3 {
        vector::cross(&self.position, &self.velocity)
    }

    pub fn eccentricity_vector(&self) -> Vector3 {
        let r = vector::norm(&self.position);
        let v2 = vector::dot(&self.velocity, &self.velocity);
        let rv = vector::dot(&self.position, &self.velocity);
        let term_r = vector::scale(&self.position, v2 - self.mu / r);
        let term_v = vector::scale(&self.velocity, rv);
        vector::scale(&vector::sub(&term_r, &term_v), 1.0 / self.mu)
    }

    pub fn eccentricity(&self) -> f64 {
        vector::norm(&self.eccentricity_vector())
    }

    /// Semi-latus rectum `h² / μ`.
    pub fn semi_latus_rectum(&self) -> f64 {
        let h = vector::norm(&self.angular_momentum());
        h * h / self.mu
    }

    pub fn periapsis_radius(&self) -> f64 {
        self.semi_latus_rectum() / (1.0 + self.eccentricity())
    }

    /// `None` for open orbits.
    pub fn apoapsis_radius(&self) -> Option<f64> {
        let e = self.eccentricity();
        if e < 1.0 {
            Some(self.semi_latus_rectum() / (1.0 - e))
        } else {
            None
        }
    }

    /// Orbital period; `None` for open orbits.
    pub fn period(&self) -> Option<f64> {
        let a = self.semi_major_axis();
        if a > 0.0 && a.is_finite() {
            Some(TAU * (a * a * a / self.mu).sqrt())
        } else {
            None
        }
    }
}

impl Orbit for KeplerOrbit {
    fn position_at(&self, ut: f64) -> Vector3 {
        self.state_at(ut).0
    }

    fn velocity_at(&self, ut: f64) -> Vector3 {
        self.state_at(ut).1
    }

    fn reinitialize_from_state_vectors(
        &mut self,
        position: Vector3,
        velocity: Vector3,
        ut: f64,
    ) -> Result<(), OrbitError> {
        validate_state(&position, &velocity, ut)?;
        self.position = position;
        self.velocity = velocity;
        self.epoch = ut;
        Ok(())
    }
}

fn validate_state(position: &Vector3, velocity: &Vector3, epoch: f64) -> Result<(), OrbitError> {
    if !epoch.is_finite()
        || !position.iter().all(|c| c.is_finite())
        || !velocity.iter().all(|c| c.is_finite())
    {
        return Err(OrbitError::NonFinite);
    }
    if vector::norm(position) <= 0.0 {
        return Err(OrbitError::DegeneratePosition);
    }
    Ok(())
}

fn stumpff(z: f64) -> (f64, f64) {
    if z > STUMPFF_SERIES_LIMIT {
        let s = z.sqrt();
        ((1.0 - s.cos()) / z, (s - s.sin()) / (s * s * s))
    } else if z < -STUMPFF_SERIES_LIMIT {
        let s = (-z).sqrt();
        ((s.cosh() - 1.0) / -z, (s.sinh() - s) / (s * s * s))
    } else {
        (
            0.5 - z / 24.0 + z * z / 720.0,
            1.0 / 6.0 - z / 120.0 + z * z / 5040.0,
        )
    }
}

fn propagate(mu: f64, r0_vec: &Vector3, v0_vec: &Vector3, dt: f64) -> (Vector3, Vector3) {
    let sqrt_mu = mu.sqrt();
    let r0 = vector::norm(r0_vec);
    let v0_sq = vector::dot(v0_vec, v0_vec);
    let rv = vector::dot(r0_vec, v0_vec);
    let vr0 = rv / r0;
    let alpha = 2.0 / r0 - v0_sq / mu;

    let mut dt = dt;
    if alpha > ALPHA_EPSILON {
        let period = TAU / (mu * alpha * alpha * alpha).sqrt();
        if period.is_finite() && period > 0.0 {
            dt = dt.rem_euclid(period);
        }
    }

    let mut chi = initial_guess(mu, alpha, r0, rv, dt);
    for _ in 0..MAX_ITERATIONS {
        let z = alpha * chi * chi;
        let (c, s) = stumpff(z);
        let f = r0 * vr0 / sqrt_mu * chi * chi * c
            + (1.0 - alpha * r0) * chi * chi * chi * s
            + r0 * chi
            - sqrt_mu * dt;
        let df = r0 * vr0 / sqrt_mu * chi * (1.0 - z * s)
            + (1.0 - alpha * r0) * chi * chi * c
            + r0;
        if !f.is_finite() || !df.is_finite() || df == 0.0 {
            break;
        }
        let step = f / df;
        chi -= step;
        if step.abs() <= 1e-12 * chi.abs().max(1.0) {
            break;
        }
    }

    let z = alpha * chi * chi;
    let (c, s) = stumpff(z);
    let f = 1.0 - chi * chi / r0 * c;
    let g = dt - chi * chi * chi / sqrt_mu * s;
    let r_vec = vector::add(&vector::scale(r0_vec, f), &vector::scale(v0_vec, g));
    let r = vector::norm(&r_vec);
    let fdot = sqrt_mu / (r * r0) * (alpha * chi * chi * chi * s - chi);
    let gdot = 1.0 - chi * chi / r * c;
    let v_vec = vector::add(&vector::scale(r0_vec, fdot), &vector::scale(v0_vec, gdot));

    if r_vec.iter().chain(v_vec.iter()).all(|c| c.is_finite()) {
        (r_vec, v_vec)
    } else {
        // Far along a hyperbola the conic is indistinguishable from its asymptote.
        (vector::add(r0_vec, &vector::scale(v0_vec, dt)), *v0_vec)
    }
}

fn initial_guess(mu: f64, alpha: f64, r0: f64, rv: f64, dt: f64) -> f64 {
    let sqrt_mu = mu.sqrt();
    let guess = if alpha > ALPHA_EPSILON {
        sqrt_mu * alpha * dt
    } else if alpha < -ALPHA_EPSILON {
        let a = 1.0 / alpha;
        let sign = dt.signum();
        let numerator = -2.0 * mu * alpha * dt;
        let denominator = rv + sign * (-mu * a).sqrt() * (1.0 - r0 * alpha);
        sign * (-a).sqrt() * (numerator / denominator).ln()
    } else {
        sqrt_mu * dt / r0
    };
    if guess.is_finite() {
        guess
    } else {
        sqrt_mu * dt / r0
    }
}
