//! Final full-resolution composite of the fog target over the scene.
//!
//! The raymarch writes in-scatter in RGB and transmittance in alpha, so the
//! blend is `scene * fog.a + fog.rgb` per channel. The fog target is usually
//! lower resolution than the scene and is upsampled bilinearly here.

use crate::target::RenderTarget;

/// Blend the fog target over the scene into a new full-resolution target.
///
/// With `add_scene_color` off the scene is returned untouched, which lets
/// the host inspect the raw fog contribution elsewhere without the blend.
pub fn composite(scene: &RenderTarget, fog: &RenderTarget, add_scene_color: bool) -> RenderTarget {
    if !add_scene_color {
        return scene.clone();
    }

    let width = scene.width();
    let height = scene.height();
    let mut output = RenderTarget::new(width, height);

    for y in 0..height {
        for x in 0..width {
            let u = (x as f32 + 0.5) / width as f32;
            let v = (y as f32 + 0.5) / height as f32;
            let f = fog.sample(u, v);
            let s = scene.pixel(x as i64, y as i64);

            let transmittance = f[3];
            output.put_pixel(
                x,
                y,
                [
                    s[0] * transmittance + f[0],
                    s[1] * transmittance + f[1],
                    s[2] * transmittance + f[2],
                    s[3],
                ],
            );
        }
    }
    output
}
