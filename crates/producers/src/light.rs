//! Light sources, occluding bodies, and flux at a point.
//!
//! Positions are absolute, in the orbit (z-up) frame.

use pt_core::vector::{self, Vector3};

#[derive(Debug, Clone, PartialEq)]
pub struct LightSource {
    pub name: String,
    pub position: Vector3,
    /// Relative output; 1.0 is nominal panel rating at `reference_distance`.
    pub luminosity: f64,
    pub reference_distance: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Occluder {
    pub name: String,
    pub position: Vector3,
    pub radius: f64,
}

/// Light sources and the bodies that can shadow them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Illumination {
    pub sources: Vec<LightSource>,
    pub occluders: Vec<Occluder>,
    /// Contributions at or below this are dropped.
    pub negligible_flux: f64,
}

impl Illumination {
    pub fn new(negligible_flux: f64) -> Self {
        Self {
            negligible_flux: negligible_flux.max(0.0),
            ..Self::default()
        }
    }

    /// Relative flux at `point`, summed over every visible source.
    pub fn flux_at(&self, point: &Vector3) -> f64 {
        self.sources
            .iter()
            .filter(|source| self.line_of_sight(point, source))
            .map(|source| source_flux(source, point))
            .filter(|flux| *flux > self.negligible_flux)
            .sum()
    }

    fn line_of_sight(&self, point: &Vector3, source: &LightSource) -> bool {
        self.occluders
            .iter()
            .filter(|body| body.name != source.name)
            .all(|body| !segment_hits_sphere(point, &source.position, &body.position, body.radius))
    }
}

fn source_flux(source: &LightSource, point: &Vector3) -> f64 {
    let distance = vector::norm(&vector::sub(&source.position, point));
    if distance <= 0.0 || source.reference_distance <= 0.0 || source.luminosity <= 0.0 {
        return 0.0;
    }
    let ratio = source.reference_distance / distance;
    let flux = ratio * ratio * source.luminosity;
    if flux.is_finite() { flux } else { 0.0 }
}

/// True when the segment `from → to` passes strictly inside the sphere.
fn segment_hits_sphere(from: &Vector3, to: &Vector3, center: &Vector3, radius: f64) -> bool {
    if radius <= 0.0 {
        return false;
    }
    let segment = vector::sub(to, from);
    let length_sq = vector::dot(&segment, &segment);
    let t = if length_sq > 0.0 {
        (vector::dot(&vector::sub(center, from), &segment) / length_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let closest = vector::add(from, &vector::scale(&segment, t));
    vector::norm(&vector::sub(center, &closest)) < radius
}
