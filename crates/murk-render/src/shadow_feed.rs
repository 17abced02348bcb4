//! Shadow visibility feed for the raymarch in-scatter term.
//!
//! The host engine attaches a feed per shadow-casting light and pushes a
//! depth capture (the light's depth map plus its view-projection matrix)
//! whenever the shadow pass renders. The raymarch stage then queries light
//! visibility at arbitrary world positions. A feed with no capture yet
//! reports full visibility, so fog renders unshadowed rather than black
//! while the first shadow frame is in flight.

use std::collections::HashMap;

use glam::{Mat4, Vec3, Vec4};
use thiserror::Error;

use crate::target::DepthMap;

/// Depth-compare bias in NDC units, hiding self-occlusion acne at the
/// capture resolution.
const DEPTH_BIAS: f32 = 5e-3;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ShadowFeedError {
    #[error("light {0} already detached or never attached")]
    UnknownHandle(u64),
    #[error("light id 0 is reserved")]
    InvalidLight,
}

/// Opaque handle to an attached feed. Returned by [`ShadowFeed::attach`]
/// and required for every capture, query, and detach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FeedHandle(u64);

/// One shadow-pass result pushed by the host.
#[derive(Debug, Clone)]
pub struct ShadowCapture {
    /// Depth map rendered from the light's point of view.
    pub depth: DepthMap,
    /// World-to-clip matrix of the shadow camera that rendered `depth`.
    pub light_view_proj: Mat4,
}

#[derive(Debug, Default)]
struct FeedEntry {
    capture: Option<ShadowCapture>,
}

/// Registry of per-light shadow feeds.
#[derive(Debug, Default)]
pub struct ShadowFeed {
    entries: HashMap<u64, FeedEntry>,
}

impl ShadowFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a feed for a light, identified by a nonzero host-side id.
    ///
    /// Attaching the same light twice returns the existing feed unchanged.
    pub fn attach(&mut self, light_id: u64) -> Result<FeedHandle, ShadowFeedError> {
        if light_id == 0 {
            return Err(ShadowFeedError::InvalidLight);
        }
        if self.entries.contains_key(&light_id) {
            log::debug!("Shadow feed for light {light_id} already attached");
        } else {
            self.entries.insert(light_id, FeedEntry::default());
            log::info!("Shadow feed attached for light {light_id}");
        }
        Ok(FeedHandle(light_id))
    }

    /// Detach a feed, dropping its capture.
    pub fn detach(&mut self, handle: FeedHandle) -> Result<(), ShadowFeedError> {
        match self.entries.remove(&handle.0) {
            Some(_) => {
                log::info!("Shadow feed detached for light {}", handle.0);
                Ok(())
            }
            None => Err(ShadowFeedError::UnknownHandle(handle.0)),
        }
    }

    /// Whether any attached feed currently holds a capture.
    pub fn has_capture(&self) -> bool {
        self.entries.values().any(|e| e.capture.is_some())
    }

    /// Push this frame's shadow-pass result for a light.
    pub fn capture(
        &mut self,
        handle: FeedHandle,
        capture: ShadowCapture,
    ) -> Result<(), ShadowFeedError> {
        let entry = self
            .entries
            .get_mut(&handle.0)
            .ok_or(ShadowFeedError::UnknownHandle(handle.0))?;
        entry.capture = Some(capture);
        Ok(())
    }

    /// Light visibility at a world position, in [0, 1].
    ///
    /// Positions outside the capture frustum, and feeds without a capture,
    /// report full visibility.
    pub fn visibility(&self, handle: FeedHandle, world_pos: Vec3) -> f32 {
        let Some(entry) = self.entries.get(&handle.0) else {
            return 1.0;
        };
        let Some(capture) = &entry.capture else {
            return 1.0;
        };

        let clip = capture.light_view_proj * Vec4::new(world_pos.x, world_pos.y, world_pos.z, 1.0);
        if clip.w.abs() < 1e-9 {
            return 1.0;
        }
        let ndc = clip / clip.w;
        let u = ndc.x * 0.5 + 0.5;
        let v = 0.5 - ndc.y * 0.5;
        if !(0.0..=1.0).contains(&u) || !(0.0..=1.0).contains(&v) || !(0.0..=1.0).contains(&ndc.z) {
            return 1.0;
        }

        let occluder = capture.depth.sample(u, v);
        if ndc.z <= occluder + DEPTH_BIAS { 1.0 } else { 0.0 }
    }
}
