//! In-memory graphics device used by the texture tests.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use super::device::{GraphicsDevice, SamplerParams, TextureId, UniformTarget};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum DeviceCall {
    Create(TextureId),
    Delete(TextureId),
    Bind(Option<TextureId>),
    ActiveUnit(u32),
    Allocate {
        id: TextureId,
        width: u32,
        height: u32,
    },
    Update {
        id: TextureId,
        width: u32,
        height: u32,
    },
    Mipmaps(TextureId),
}

#[derive(Debug, Clone)]
pub(crate) struct StoredImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
    pub params: SamplerParams,
    /// Number of times storage has been (re)allocated for this handle.
    pub allocations: u32,
}

#[derive(Debug)]
pub(crate) struct RecordingDevice {
    next_id: u32,
    units: u32,
    active_unit: u32,
    pub max_dimension: u32,
    pub live: BTreeMap<TextureId, Option<StoredImage>>,
    pub bound: BTreeMap<u32, TextureId>,
    pub calls: Vec<DeviceCall>,
    pub deleted: Vec<TextureId>,
}

impl RecordingDevice {
    pub fn new(units: u32) -> Self {
        Self {
            next_id: 0,
            units,
            active_unit: 0,
            max_dimension: 8192,
            live: BTreeMap::new(),
            bound: BTreeMap::new(),
            calls: Vec::new(),
            deleted: Vec::new(),
        }
    }

    pub fn shared(units: u32) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self::new(units)))
    }

    pub fn image(&self, id: TextureId) -> Option<&StoredImage> {
        self.live.get(&id).and_then(Option::as_ref)
    }

    pub fn bound_on(&self, unit: u32) -> Option<TextureId> {
        self.bound.get(&unit).copied()
    }

    pub fn take_calls(&mut self) -> Vec<DeviceCall> {
        std::mem::take(&mut self.calls)
    }
}

impl GraphicsDevice for RecordingDevice {
    fn create_texture(&mut self) -> TextureId {
        self.next_id += 1;
        let id = TextureId::new(self.next_id).expect("ids start at one");
        self.live.insert(id, None);
        self.calls.push(DeviceCall::Create(id));
        id
    }

    fn delete_texture(&mut self, id: TextureId) {
        assert!(
            self.live.remove(&id).is_some(),
            "texture {id} deleted twice or never created"
        );
        self.bound.retain(|_, bound| *bound != id);
        self.deleted.push(id);
        self.calls.push(DeviceCall::Delete(id));
    }

    fn bind_texture(&mut self, id: Option<TextureId>) {
        match id {
            Some(id) => {
                self.bound.insert(self.active_unit, id);
            }
            None => {
                self.bound.remove(&self.active_unit);
            }
        }
        self.calls.push(DeviceCall::Bind(id));
    }

    fn active_texture_unit(&mut self, unit: u32) {
        self.active_unit = unit;
        self.calls.push(DeviceCall::ActiveUnit(unit));
    }

    fn allocate_image(
        &mut self,
        id: TextureId,
        width: u32,
        height: u32,
        params: &SamplerParams,
        pixels: &[u8],
    ) {
        let slot = self.live.get_mut(&id).expect("allocating unknown texture");
        let allocations = slot.as_ref().map_or(0, |image| image.allocations) + 1;
        *slot = Some(StoredImage {
            width,
            height,
            pixels: pixels.to_vec(),
            params: *params,
            allocations,
        });
        self.calls.push(DeviceCall::Allocate { id, width, height });
    }

    fn update_image(&mut self, id: TextureId, width: u32, height: u32, pixels: &[u8]) {
        let image = self
            .live
            .get_mut(&id)
            .and_then(Option::as_mut)
            .expect("updating texture without storage");
        assert_eq!((image.width, image.height), (width, height));
        image.pixels = pixels.to_vec();
        self.calls.push(DeviceCall::Update { id, width, height });
    }

    fn generate_mipmaps(&mut self, id: TextureId) {
        self.calls.push(DeviceCall::Mipmaps(id));
    }

    fn max_texture_units(&self) -> u32 {
        self.units
    }

    fn max_texture_dimension(&self) -> u32 {
        self.max_dimension
    }
}

/// Shader program stand-in that records integer uniforms by name.
#[derive(Debug, Default)]
pub(crate) struct RecordingProgram {
    names: Vec<String>,
    pub values: HashMap<String, i32>,
}

impl RecordingProgram {
    pub fn with_uniforms(names: &[&str]) -> Self {
        Self {
            names: names.iter().map(|name| name.to_string()).collect(),
            values: HashMap::new(),
        }
    }
}

impl UniformTarget for RecordingProgram {
    type Location = usize;

    fn uniform_location(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|candidate| candidate == name)
    }

    fn set_uniform_i32(&mut self, location: usize, value: i32) {
        let name = self.names[location].clone();
        self.values.insert(name, value);
    }
}

/// Encodes a solid `width`x`height` PNG into `dir` and returns its path.
pub(crate) fn write_png(
    dir: &std::path::Path,
    file_name: &str,
    width: u32,
    height: u32,
    rgba: [u8; 4],
) -> std::path::PathBuf {
    let path = dir.join(file_name);
    image::RgbaImage::from_pixel(width, height, image::Rgba(rgba))
        .save(&path)
        .expect("write test png");
    path
}
