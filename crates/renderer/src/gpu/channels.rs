use image::RgbaImage;
use wgpu::util::{DeviceExt, TextureDataOrder};

use crate::backend::{FilterMode, Sampling, WrapMode};

/// GPU texture bound to `iChannel0`.
pub(crate) struct ChannelTexture {
    pub _texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
    /// Bumped on every upload so cached bind groups can be invalidated.
    pub generation: u64,
}

/// 1x1 transparent texture sampled until the real image arrives.
pub(crate) fn create_placeholder(device: &wgpu::Device, queue: &wgpu::Queue) -> ChannelTexture {
    let data = [0u8; 4];
    let texture = create_rgba_texture(device, queue, "placeholder channel texture", 1, 1, &data);
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let sampler = device.create_sampler(&sampler_descriptor(Sampling::BACKGROUND));
    ChannelTexture {
        _texture: texture,
        view,
        sampler,
        generation: 0,
    }
}

/// Uploads RGBA8 pixels in source row order.
pub(crate) fn upload(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    image: &RgbaImage,
    sampling: Sampling,
    generation: u64,
) -> ChannelTexture {
    let (width, height) = image.dimensions();
    if sampling.mipmaps {
        tracing::debug!("mipmap generation is not supported; uploading base level only");
    }
    let texture = create_rgba_texture(
        device,
        queue,
        "channel texture",
        width.max(1),
        height.max(1),
        image.as_raw(),
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let sampler = device.create_sampler(&sampler_descriptor(sampling));
    ChannelTexture {
        _texture: texture,
        view,
        sampler,
        generation,
    }
}

fn create_rgba_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    width: u32,
    height: u32,
    data: &[u8],
) -> wgpu::Texture {
    device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        TextureDataOrder::LayerMajor,
        data,
    )
}

pub(crate) fn sampler_descriptor(sampling: Sampling) -> wgpu::SamplerDescriptor<'static> {
    wgpu::SamplerDescriptor {
        label: Some("channel sampler"),
        address_mode_u: address_mode(sampling.wrap_s),
        address_mode_v: address_mode(sampling.wrap_t),
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: filter_mode(sampling.mag_filter),
        min_filter: filter_mode(sampling.min_filter),
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    }
}

fn address_mode(wrap: WrapMode) -> wgpu::AddressMode {
    match wrap {
        WrapMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
        WrapMode::Repeat => wgpu::AddressMode::Repeat,
    }
}

fn filter_mode(filter: FilterMode) -> wgpu::FilterMode {
    match filter {
        FilterMode::Nearest => wgpu::FilterMode::Nearest,
        FilterMode::Linear => wgpu::FilterMode::Linear,
    }
}
