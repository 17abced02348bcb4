//! Numerical models for the murk volumetric fog pipeline.
//!
//! Pure, backend-independent building blocks: scattering phase functions,
//! noise textures and 3D lookup tables, and the fog density field sampled by
//! the raymarch stage. Nothing in this crate touches render targets or frame
//! state.

mod density;
mod phase;
mod texture;

pub use density::{DensityProfile, FogBounds, HeightFalloff, NoiseField, NoiseSource, transmittance};
pub use phase::{MieApproximation, PhaseFunction, rayleigh_phase, schlick_k};
pub use texture::{NoiseLut3d, NoiseTexture2d, TextureError};
