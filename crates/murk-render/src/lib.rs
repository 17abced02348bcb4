//! The murk volumetric fog render pipeline.
//!
//! A camera post-process in three stages: a ray-marched scattering pass into
//! a reduced-resolution target, an optional depth-aware separable blur, and
//! a full-resolution composite over the scene color. [`FogPipeline`] owns
//! the persistent state and runs all three per frame; the stage modules are
//! public for hosts that drive them individually.

pub mod blur;
pub mod composite;
pub mod light;
pub mod pipeline;
pub mod quality;
pub mod raymarch;
pub mod shadow_feed;
pub mod target;
pub mod uniforms;
pub mod view;

pub use light::DirectionalLight;
pub use pipeline::{FogPipeline, FrameOutput, FrameParams};
pub use quality::{FpsCounter, MIN_RAYMARCH_STEPS, QualityController};
pub use shadow_feed::{FeedHandle, ShadowCapture, ShadowFeed, ShadowFeedError};
pub use target::{DepthMap, RenderTarget, TargetPool};
pub use uniforms::{BlurUniform, FogUniform, FrameBindings, ShadowKeyword};
pub use view::FrameView;
