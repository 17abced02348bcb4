//! Scattering phase functions for the raymarch in-scatter term.
//!
//! The Mie phase function describes how much light a fog particle scatters
//! toward the viewer as a function of the angle between the view ray and the
//! light direction. Three approximations of increasing cheapness are
//! supported, plus an off switch that leaves only extinction active.

use serde::{Deserialize, Serialize};

/// Mie phase function approximation. Exactly one mode is active per frame.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum MieApproximation {
    /// Standard single-parameter Henyey-Greenstein phase function.
    #[default]
    HenyeyGreenstein,
    /// Cornette-Shanks refinement of HG with better backscatter.
    CornetteShanks,
    /// Schlick's approximation: replaces the 3/2 power with a square,
    /// using the derived k-factor instead of g directly.
    Schlick,
    /// No Mie scattering; only extinction and transmittance apply.
    Off,
}

/// Derived Schlick k-factor for anisotropy `g`: `k = 1.55g − 0.55g³`.
pub fn schlick_k(g: f32) -> f32 {
    1.55 * g - 0.55 * g * g * g
}

/// A phase-function evaluator for one (mode, anisotropy) pair.
///
/// The Schlick k-factor is computed once at construction, so callers cache a
/// `PhaseFunction` and rebuild it only when the mode or anisotropy changes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseFunction {
    mode: MieApproximation,
    g: f32,
    k: f32,
}

impl PhaseFunction {
    /// Build an evaluator for the given mode and anisotropy `g` ∈ \[-1, 1\].
    pub fn new(mode: MieApproximation, g: f32) -> Self {
        let g = g.clamp(-1.0, 1.0);
        Self {
            mode,
            g,
            k: schlick_k(g),
        }
    }

    /// The approximation mode this evaluator was built for.
    pub fn mode(&self) -> MieApproximation {
        self.mode
    }

    /// The anisotropy this evaluator was built for.
    pub fn anisotropy(&self) -> f32 {
        self.g
    }

    /// The cached Schlick k-factor.
    pub fn k_factor(&self) -> f32 {
        self.k
    }

    /// Evaluate the phase weight for `cos_theta`, the cosine of the angle
    /// between the view ray direction and the light direction.
    pub fn eval(&self, cos_theta: f32) -> f32 {
        const FRAC_1_4PI: f32 = 1.0 / (4.0 * std::f32::consts::PI);
        let g = self.g;

        match self.mode {
            MieApproximation::HenyeyGreenstein => {
                let denom = (1.0 + g * g - 2.0 * g * cos_theta).max(1e-6);
                FRAC_1_4PI * (1.0 - g * g) / denom.powf(1.5)
            }
            MieApproximation::CornetteShanks => {
                let denom = ((2.0 + g * g) * (1.0 + g * g - 2.0 * g * cos_theta).max(1e-6).powf(1.5))
                    .max(1e-6);
                3.0 / (8.0 * std::f32::consts::PI) * (1.0 - g * g) * (1.0 + cos_theta * cos_theta)
                    / denom
            }
            MieApproximation::Schlick => {
                let k = self.k;
                let denom = (1.0 + k * cos_theta).max(1e-3);
                FRAC_1_4PI * (1.0 - k * k) / (denom * denom)
            }
            MieApproximation::Off => 0.0,
        }
    }
}

/// Rayleigh phase function: `3/(16π) · (1 + cos²θ)`.
///
/// Wavelength dependence is folded into the Rayleigh coefficient; this is
/// only the angular term.
pub fn rayleigh_phase(cos_theta: f32) -> f32 {
    3.0 / (16.0 * std::f32::consts::PI) * (1.0 + cos_theta * cos_theta)
}
