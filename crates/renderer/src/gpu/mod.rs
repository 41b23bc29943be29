//! wgpu implementation of the graphics backend.
//!
//! - `context` owns wgpu instance/device/surface wiring and rebuilds the
//!   swapchain when the window resizes.
//! - `channels` creates the `iChannel0` texture, its sampler, and the
//!   transparent placeholder sampled before an image arrives.
//! - `pipeline` holds the bind group layouts and builds render pipelines for
//!   the wrapped GLSL stages.
//! - `uniforms` mirrors the injected uniform block.
//! - `state` glues everything together behind [`WgpuContext`].

mod channels;
mod context;
mod pipeline;
mod state;
mod uniforms;

pub use state::WgpuContext;
