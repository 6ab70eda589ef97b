use std::collections::HashMap;

use wgpu::util::{DeviceExt, TextureDataOrder};

use crate::texture::{FilterMode, GraphicsDevice, SamplerParams, TextureId, WrapMode};

use super::mipmaps::{mip_level_count, MipmapGenerator};

/// Upper bound on emulated texture units, whatever the adapter allows.
pub(crate) const MAX_TEXTURE_UNITS: u32 = 16;

pub(crate) const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

struct GpuImage {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
    width: u32,
    height: u32,
    mip_level_count: u32,
}

/// [`GraphicsDevice`] backed by wgpu.
///
/// Texture units are emulated: each unit is a texture/sampler pair in bind
/// group 1, rebuilt by the renderer whenever [`revision`](Self::revision)
/// changes. Units with nothing bound sample a 1x1 white placeholder.
pub(crate) struct WgpuTextureDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    images: HashMap<TextureId, Option<GpuImage>>,
    next_id: u32,
    units: Vec<Option<TextureId>>,
    active_unit: u32,
    placeholder: GpuImage,
    mipmaps: MipmapGenerator,
    unit_layout: wgpu::BindGroupLayout,
    revision: u64,
    max_dimension: u32,
}

impl WgpuTextureDevice {
    pub(crate) fn new(device: &wgpu::Device, queue: &wgpu::Queue, limits: &wgpu::Limits) -> Self {
        let unit_count = limits
            .max_sampled_textures_per_shader_stage
            .min(limits.max_samplers_per_shader_stage)
            .min(MAX_TEXTURE_UNITS)
            .max(1);
        tracing::debug!(unit_count, "emulating texture units");

        let unit_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("texture unit layout"),
            entries: &unit_layout_entries(unit_count),
        });

        Self {
            device: device.clone(),
            queue: queue.clone(),
            images: HashMap::new(),
            next_id: 0,
            units: vec![None; unit_count as usize],
            active_unit: 0,
            placeholder: create_placeholder_image(device, queue),
            mipmaps: MipmapGenerator::new(device, TEXTURE_FORMAT),
            unit_layout,
            revision: 0,
            max_dimension: limits.max_texture_dimension_2d,
        }
    }

    pub(crate) fn unit_count(&self) -> u32 {
        self.units.len() as u32
    }

    pub(crate) fn unit_layout(&self) -> &wgpu::BindGroupLayout {
        &self.unit_layout
    }

    /// Bumped whenever the contents of the unit bind group would change.
    pub(crate) fn revision(&self) -> u64 {
        self.revision
    }

    pub(crate) fn create_unit_bind_group(&self) -> wgpu::BindGroup {
        let mut entries = Vec::with_capacity(self.units.len() * 2);
        for (index, unit) in self.units.iter().enumerate() {
            let image = unit
                .and_then(|id| self.images.get(&id))
                .and_then(Option::as_ref)
                .unwrap_or(&self.placeholder);
            entries.push(wgpu::BindGroupEntry {
                binding: (index as u32) * 2,
                resource: wgpu::BindingResource::TextureView(&image.view),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: (index as u32) * 2 + 1,
                resource: wgpu::BindingResource::Sampler(&image.sampler),
            });
        }
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("texture unit bind group"),
            layout: &self.unit_layout,
            entries: &entries,
        })
    }

    fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    fn write_base_level(&self, texture: &wgpu::Texture, width: u32, height: u32, pixels: &[u8]) {
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
    }
}

impl GraphicsDevice for WgpuTextureDevice {
    fn create_texture(&mut self) -> TextureId {
        loop {
            self.next_id = self.next_id.wrapping_add(1);
            if let Some(id) = TextureId::new(self.next_id) {
                if !self.images.contains_key(&id) {
                    self.images.insert(id, None);
                    return id;
                }
            }
        }
    }

    fn delete_texture(&mut self, id: TextureId) {
        if self.images.remove(&id).is_none() {
            tracing::warn!(texture = %id, "deleting unknown texture");
            return;
        }
        for unit in self.units.iter_mut().filter(|unit| **unit == Some(id)) {
            *unit = None;
        }
        self.touch();
    }

    fn bind_texture(&mut self, id: Option<TextureId>) {
        let Some(slot) = self.units.get_mut(self.active_unit as usize) else {
            tracing::warn!(unit = self.active_unit, "binding to texture unit out of range");
            return;
        };
        if *slot != id {
            *slot = id;
            self.touch();
        }
    }

    fn active_texture_unit(&mut self, unit: u32) {
        self.active_unit = unit;
    }

    fn allocate_image(
        &mut self,
        id: TextureId,
        width: u32,
        height: u32,
        params: &SamplerParams,
        pixels: &[u8],
    ) {
        if !self.images.contains_key(&id) {
            tracing::warn!(texture = %id, "allocating storage for unknown texture");
            return;
        }

        let mip_level_count = mip_level_count(width, height);
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&format!("frax texture {id}")),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TEXTURE_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        self.write_base_level(&texture, width, height, pixels);

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = self.device.create_sampler(&sampler_descriptor(params));
        self.images.insert(
            id,
            Some(GpuImage {
                texture,
                view,
                sampler,
                width,
                height,
                mip_level_count,
            }),
        );
        self.touch();
    }

    fn update_image(&mut self, id: TextureId, width: u32, height: u32, pixels: &[u8]) {
        match self.images.get(&id).and_then(Option::as_ref) {
            Some(image) if (image.width, image.height) == (width, height) => {
                self.write_base_level(&image.texture, width, height, pixels);
            }
            Some(image) => tracing::warn!(
                texture = %id,
                allocated = ?(image.width, image.height),
                requested = ?(width, height),
                "ignoring image update with mismatched size"
            ),
            None => tracing::warn!(texture = %id, "updating texture without storage"),
        }
    }

    fn generate_mipmaps(&mut self, id: TextureId) {
        if let Some(image) = self.images.get(&id).and_then(Option::as_ref) {
            self.mipmaps.generate(
                &self.device,
                &self.queue,
                &image.texture,
                image.mip_level_count,
            );
        }
    }

    fn max_texture_units(&self) -> u32 {
        self.unit_count()
    }

    fn max_texture_dimension(&self) -> u32 {
        self.max_dimension
    }
}

fn unit_layout_entries(unit_count: u32) -> Vec<wgpu::BindGroupLayoutEntry> {
    let mut entries = Vec::with_capacity(unit_count as usize * 2);
    for index in 0..unit_count {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: index * 2,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: index * 2 + 1,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        });
    }
    entries
}

fn sampler_descriptor(params: &SamplerParams) -> wgpu::SamplerDescriptor<'static> {
    let address_mode = match params.wrap {
        WrapMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
        WrapMode::Repeat => wgpu::AddressMode::Repeat,
    };
    wgpu::SamplerDescriptor {
        label: Some("frax texture sampler"),
        address_mode_u: address_mode,
        address_mode_v: address_mode,
        address_mode_w: address_mode,
        mag_filter: filter_mode(params.mag_filter),
        min_filter: filter_mode(params.min_filter),
        mipmap_filter: filter_mode(params.mipmap_filter),
        ..Default::default()
    }
}

fn filter_mode(mode: FilterMode) -> wgpu::FilterMode {
    match mode {
        FilterMode::Nearest => wgpu::FilterMode::Nearest,
        FilterMode::Linear => wgpu::FilterMode::Linear,
    }
}

fn create_placeholder_image(device: &wgpu::Device, queue: &wgpu::Queue) -> GpuImage {
    let data = [255u8, 255, 255, 255];
    let texture = device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some("placeholder unit texture"),
            size: wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TEXTURE_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        TextureDataOrder::LayerMajor,
        &data,
    );

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let sampler = device.create_sampler(&sampler_descriptor(&SamplerParams::default()));

    GpuImage {
        texture,
        view,
        sampler,
        width: 1,
        height: 1,
        mip_level_count: 1,
    }
}
