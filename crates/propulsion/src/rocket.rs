//! Rocket equation helpers.

use pt_core::constants::G0;

/// Propellant mass flow (kg/s) for a thrust in newtons at a specific impulse in seconds.
pub fn mass_flow_rate(thrust_n: f64, isp_s: f64) -> f64 {
    let exhaust = isp_s * G0;
    if thrust_n <= 0.0 || !thrust_n.is_finite() || exhaust <= 0.0 || !exhaust.is_finite() {
        return 0.0;
    }
    thrust_n / exhaust
}

/// Velocity change from burning `burned_kg` out of `initial_kg`.
///
/// Returns zero for non-positive burns and when the final mass would not be positive.
pub fn tsiolkovsky_delta_v(isp_s: f64, initial_kg: f64, burned_kg: f64) -> f64 {
    let final_kg = initial_kg - burned_kg;
    if burned_kg <= 0.0 || initial_kg <= 0.0 || final_kg <= 0.0 || isp_s <= 0.0 {
        return 0.0;
    }
    let dv = isp_s * G0 * (initial_kg / final_kg).ln();
    if dv.is_finite() { dv } else { 0.0 }
}
