//! Name-keyed GPU texture cache with deterministic lifetimes.
//!
//! - `device` declares the [`GraphicsDevice`] seam the subsystem is written
//!   against, plus the [`UniformTarget`] a shader program exposes.
//! - [`Texture`] owns exactly one GPU handle and re-uploads pixels, choosing
//!   between an in-place update and a full reallocation.
//! - [`TextureManager`] maps names to textures and owns them until they are
//!   taken or unloaded.
//! - [`TextureUnitAllocator`] hands out texture units round-robin for
//!   [`Texture::bind_to_unit`].
//!
//! Every texture releases its handle on `Drop`, so a handle is deleted exactly
//! once no matter which path removes it.

mod device;
mod error;
mod manager;
mod units;

#[cfg(test)]
pub(crate) mod testing;

use std::cell::RefCell;
use std::fmt;
use std::path::Path;
use std::rc::Rc;

use image::{DynamicImage, RgbaImage};

pub use device::{
    FilterMode, GraphicsDevice, SamplerParams, TextureId, UniformTarget, WrapMode,
};
pub use error::TextureError;
pub use manager::TextureManager;
pub use units::{TextureUnitAllocator, MIN_EXPECTED_TEXTURE_UNITS};

const BYTES_PER_PIXEL: u32 = 4;

/// Borrowed RGBA8 pixel rows ready for upload.
#[derive(Clone, Copy, Debug)]
pub struct ImageData<'a> {
    pixels: &'a [u8],
    width: u32,
    height: u32,
    bytes_per_row: u32,
}

impl<'a> ImageData<'a> {
    /// Describes `height` rows of `bytes_per_row` bytes each.
    pub fn new(pixels: &'a [u8], width: u32, height: u32, bytes_per_row: u32) -> Self {
        Self {
            pixels,
            width,
            height,
            bytes_per_row,
        }
    }

    /// Describes tightly packed rows (`width * 4` bytes each).
    pub fn packed(pixels: &'a [u8], width: u32, height: u32) -> Self {
        Self::new(pixels, width, height, width.saturating_mul(BYTES_PER_PIXEL))
    }

    pub fn from_rgba(image: &'a RgbaImage) -> Self {
        Self::packed(image.as_raw(), image.width(), image.height())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn validate(&self) -> Result<(), TextureError> {
        if self.width == 0 || self.height == 0 {
            return Err(TextureError::EmptyImage {
                width: self.width,
                height: self.height,
            });
        }

        let expected = u64::from(self.width) * u64::from(BYTES_PER_PIXEL);
        let actual = u64::from(self.bytes_per_row);
        let total = actual * u64::from(self.height);
        if actual != expected || self.pixels.len() as u64 != total {
            return Err(TextureError::UnsupportedFormat {
                width: self.width,
                height: self.height,
                expected,
                actual,
                len: self.pixels.len(),
            });
        }
        Ok(())
    }
}

/// A single GPU-resident 2D image.
pub struct Texture<D: GraphicsDevice> {
    device: Rc<RefCell<D>>,
    id: Option<TextureId>,
    size: (u32, u32),
}

impl<D: GraphicsDevice> Texture<D> {
    /// Allocates an empty texture handle on `device`.
    pub fn new(device: Rc<RefCell<D>>) -> Self {
        let id = device.borrow_mut().create_texture();
        Self {
            device,
            id: Some(id),
            size: (0, 0),
        }
    }

    pub fn from_image(device: Rc<RefCell<D>>, image: ImageData<'_>) -> Result<Self, TextureError> {
        let mut texture = Self::new(device);
        texture.set_image(image)?;
        Ok(texture)
    }

    pub fn from_file(device: Rc<RefCell<D>>, path: impl AsRef<Path>) -> Result<Self, TextureError> {
        let mut texture = Self::new(device);
        texture.set_image_from_file(path)?;
        Ok(texture)
    }

    /// Current handle, `None` once the texture has been deleted.
    pub fn id(&self) -> Option<TextureId> {
        self.id
    }

    /// Dimensions of the last upload; `(0, 0)` before the first one.
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn is_deleted(&self) -> bool {
        self.id.is_none()
    }

    /// Uploads `image`, reusing the existing storage when the size is unchanged.
    ///
    /// A failed upload leaves the texture exactly as it was.
    pub fn set_image(&mut self, image: ImageData<'_>) -> Result<(), TextureError> {
        let id = self.id.ok_or(TextureError::Deleted)?;
        image.validate()?;

        let max = self.device.borrow().max_texture_dimension();
        if image.width > max || image.height > max {
            return Err(TextureError::TooLarge {
                width: image.width,
                height: image.height,
                max,
            });
        }

        let size = (image.width, image.height);
        let mut device = self.device.borrow_mut();
        device.bind_texture(Some(id));
        if self.size == size {
            device.update_image(id, size.0, size.1, image.pixels);
        } else {
            device.allocate_image(
                id,
                size.0,
                size.1,
                &SamplerParams::TRILINEAR_CLAMPED,
                image.pixels,
            );
            self.size = size;
        }
        device.generate_mipmaps(id);
        device.bind_texture(None);
        Ok(())
    }

    /// Converts `image` to RGBA8 when needed and uploads it.
    pub fn set_dynamic_image(&mut self, image: &DynamicImage) -> Result<(), TextureError> {
        match image {
            DynamicImage::ImageRgba8(rgba) => self.set_image(ImageData::from_rgba(rgba)),
            other => {
                let rgba = other.to_rgba8();
                self.set_image(ImageData::from_rgba(&rgba))
            }
        }
    }

    /// Reads and decodes the image at `path`, then uploads it.
    pub fn set_image_from_file(&mut self, path: impl AsRef<Path>) -> Result<(), TextureError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| TextureError::FileOpen {
            path: path.to_path_buf(),
            source,
        })?;
        let image = image::load_from_memory(&bytes).map_err(|source| TextureError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
        self.set_dynamic_image(&image)
    }

    /// Binds onto the active unit. Does nothing once deleted.
    pub fn bind(&self) {
        if let Some(id) = self.id {
            self.device.borrow_mut().bind_texture(Some(id));
        }
    }

    /// Binds onto the next unit of `units` and points `uniform` at it.
    ///
    /// Returns the unit that was selected.
    pub fn bind_to_unit<P: UniformTarget>(
        &self,
        units: &mut TextureUnitAllocator,
        program: &mut P,
        uniform: &str,
    ) -> u32 {
        let unit = units.next_unit();
        {
            let mut device = self.device.borrow_mut();
            device.active_texture_unit(unit);
            device.bind_texture(self.id);
        }

        match program.uniform_location(uniform) {
            Some(location) => program.set_uniform_i32(location, unit as i32),
            None => tracing::debug!(uniform, unit, "shader program has no such sampler uniform"),
        }
        unit
    }

    /// Releases the GPU handle. Safe to call repeatedly.
    pub fn delete(&mut self) {
        if let Some(id) = self.id.take() {
            tracing::debug!(texture = %id, "deleting texture");
            self.device.borrow_mut().delete_texture(id);
            self.size = (0, 0);
        }
    }
}

impl<D: GraphicsDevice> Drop for Texture<D> {
    fn drop(&mut self) {
        self.delete();
    }
}

impl<D: GraphicsDevice> fmt::Debug for Texture<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Texture")
            .field("id", &self.id)
            .field("size", &self.size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{write_png, DeviceCall, RecordingDevice, RecordingProgram};
    use super::*;

    fn solid(width: u32, height: u32, value: u8) -> Vec<u8> {
        vec![value; (width * height * 4) as usize]
    }

    #[test]
    fn new_texture_has_handle_and_no_size() {
        let device = RecordingDevice::shared(16);
        let texture = Texture::new(device.clone());
        assert!(texture.id().is_some());
        assert_eq!(texture.size(), (0, 0));
        assert!(device.borrow().image(texture.id().unwrap()).is_none());
    }

    #[test]
    fn same_size_upload_updates_in_place() {
        let device = RecordingDevice::shared(16);
        let mut texture = Texture::new(device.clone());
        let id = texture.id().unwrap();

        let first = solid(4, 2, 10);
        texture.set_image(ImageData::packed(&first, 4, 2)).unwrap();
        device.borrow_mut().take_calls();

        let second = solid(4, 2, 20);
        texture.set_image(ImageData::packed(&second, 4, 2)).unwrap();

        assert_eq!(texture.id(), Some(id));
        assert_eq!(
            device.borrow_mut().take_calls(),
            vec![
                DeviceCall::Bind(Some(id)),
                DeviceCall::Update {
                    id,
                    width: 4,
                    height: 2
                },
                DeviceCall::Mipmaps(id),
                DeviceCall::Bind(None),
            ]
        );
        let device = device.borrow();
        let stored = device.image(id).unwrap();
        assert_eq!(stored.allocations, 1);
        assert_eq!(stored.pixels, second);
    }

    #[test]
    fn resized_upload_reallocates_with_trilinear_sampling() {
        let device = RecordingDevice::shared(16);
        let mut texture = Texture::new(device.clone());
        let id = texture.id().unwrap();

        texture
            .set_image(ImageData::packed(&solid(2, 2, 1), 2, 2))
            .unwrap();
        texture
            .set_image(ImageData::packed(&solid(8, 3, 2), 8, 3))
            .unwrap();

        assert_eq!(texture.size(), (8, 3));
        let device = device.borrow();
        let stored = device.image(id).unwrap();
        assert_eq!(stored.allocations, 2);
        assert_eq!((stored.width, stored.height), (8, 3));
        assert_eq!(stored.params, SamplerParams::TRILINEAR_CLAMPED);
        assert_eq!(
            device
                .calls
                .iter()
                .filter(|call| matches!(call, DeviceCall::Mipmaps(_)))
                .count(),
            2
        );
        assert_eq!(device.bound_on(0), None, "upload must leave nothing bound");
    }

    #[test]
    fn padded_rows_are_rejected_without_side_effects() {
        let device = RecordingDevice::shared(16);
        let mut texture = Texture::new(device.clone());
        let original = solid(2, 2, 7);
        texture
            .set_image(ImageData::packed(&original, 2, 2))
            .unwrap();
        device.borrow_mut().take_calls();

        let padded = vec![0u8; 12 * 2];
        let err = texture
            .set_image(ImageData::new(&padded, 2, 2, 12))
            .unwrap_err();

        assert!(matches!(
            err,
            TextureError::UnsupportedFormat {
                expected: 8,
                actual: 12,
                ..
            }
        ));
        assert_eq!(texture.size(), (2, 2));
        assert!(device.borrow().calls.is_empty());
        let device = device.borrow();
        assert_eq!(device.image(texture.id().unwrap()).unwrap().pixels, original);
    }

    #[test]
    fn short_buffers_and_empty_images_are_rejected() {
        let device = RecordingDevice::shared(16);
        let mut texture = Texture::new(device);
        let short = vec![0u8; 7];
        assert!(matches!(
            texture.set_image(ImageData::packed(&short, 2, 1)),
            Err(TextureError::UnsupportedFormat { .. })
        ));
        assert!(matches!(
            texture.set_image(ImageData::packed(&[], 0, 4)),
            Err(TextureError::EmptyImage { width: 0, height: 4 })
        ));
    }

    #[test]
    fn images_beyond_the_device_limit_leave_the_texture_untouched() {
        let device = RecordingDevice::shared(16);
        device.borrow_mut().max_dimension = 4;
        let mut texture = Texture::new(device.clone());
        texture
            .set_image(ImageData::packed(&solid(2, 2, 1), 2, 2))
            .unwrap();
        device.borrow_mut().take_calls();

        let wide = solid(5, 1, 3);
        assert!(matches!(
            texture.set_image(ImageData::packed(&wide, 5, 1)),
            Err(TextureError::TooLarge { width: 5, height: 1, max: 4 })
        ));
        assert_eq!(texture.size(), (2, 2));
        assert!(device.borrow_mut().take_calls().is_empty());
        let id = texture.id().unwrap();
        assert_eq!(device.borrow().image(id).unwrap().pixels, solid(2, 2, 1));
    }

    #[test]
    fn delete_is_idempotent_and_resets_state() {
        let device = RecordingDevice::shared(16);
        let mut texture = Texture::new(device.clone());
        let id = texture.id().unwrap();
        texture
            .set_image(ImageData::packed(&solid(1, 1, 0), 1, 1))
            .unwrap();

        texture.delete();
        texture.delete();

        assert!(texture.is_deleted());
        assert_eq!(texture.size(), (0, 0));
        assert_eq!(device.borrow().deleted, vec![id]);
        assert!(matches!(
            texture.set_image(ImageData::packed(&solid(1, 1, 0), 1, 1)),
            Err(TextureError::Deleted)
        ));
    }

    #[test]
    fn drop_releases_the_handle_once() {
        let device = RecordingDevice::shared(16);
        let id = {
            let mut texture = Texture::new(device.clone());
            let id = texture.id().unwrap();
            texture.delete();
            id
        };
        let second = Texture::new(device.clone()).id().unwrap();
        assert_eq!(device.borrow().deleted, vec![id, second]);
        assert!(device.borrow().live.is_empty());
    }

    #[test]
    fn bind_is_a_no_op_after_delete() {
        let device = RecordingDevice::shared(16);
        let mut texture = Texture::new(device.clone());
        texture.bind();
        assert_eq!(device.borrow().bound_on(0), texture.id());

        texture.delete();
        device.borrow_mut().take_calls();
        texture.bind();
        assert!(device.borrow().calls.is_empty());
    }

    #[test]
    fn bind_to_unit_cycles_through_the_pool() {
        let device = RecordingDevice::shared(3);
        let texture = Texture::new(device.clone());
        let mut units = TextureUnitAllocator::from_device(&*device.borrow());
        let mut program = RecordingProgram::with_uniforms(&["palette"]);

        units.next_unit();
        let selected: Vec<u32> = (0..5)
            .map(|_| texture.bind_to_unit(&mut units, &mut program, "palette"))
            .collect();

        assert_eq!(selected, vec![1, 2, 0, 1, 2]);
        assert_eq!(program.values.get("palette"), Some(&2));
        assert_eq!(device.borrow().bound_on(2), texture.id());
    }

    #[test]
    fn bind_to_unit_tolerates_missing_uniforms() {
        let device = RecordingDevice::shared(16);
        let texture = Texture::new(device.clone());
        let mut units = TextureUnitAllocator::new(16);
        let mut program = RecordingProgram::with_uniforms(&[]);

        assert_eq!(texture.bind_to_unit(&mut units, &mut program, "missing"), 0);
        assert!(program.values.is_empty());
        assert_eq!(device.borrow().bound_on(0), texture.id());
    }

    #[test]
    fn file_uploads_decode_into_rgba() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "tile.png", 3, 2, [1, 2, 3, 255]);
        let device = RecordingDevice::shared(16);

        let texture = Texture::from_file(device.clone(), &path).unwrap();

        assert_eq!(texture.size(), (3, 2));
        let device = device.borrow();
        let stored = device.image(texture.id().unwrap()).unwrap();
        assert_eq!(&stored.pixels[..4], &[1, 2, 3, 255]);
    }

    #[test]
    fn converts_non_rgba_images() {
        let device = RecordingDevice::shared(16);
        let mut texture = Texture::new(device.clone());
        let gray = DynamicImage::ImageLuma8(image::GrayImage::from_pixel(2, 2, image::Luma([9])));

        texture.set_dynamic_image(&gray).unwrap();

        let device = device.borrow();
        let stored = device.image(texture.id().unwrap()).unwrap();
        assert_eq!(&stored.pixels[..4], &[9, 9, 9, 255]);
    }

    #[test]
    fn file_errors_are_classified() {
        let dir = tempfile::tempdir().unwrap();
        let device = RecordingDevice::shared(16);
        let mut texture = Texture::new(device);

        let missing = texture.set_image_from_file(dir.path().join("missing.png"));
        assert!(matches!(missing, Err(TextureError::FileOpen { .. })));

        let garbage = dir.path().join("garbage.png");
        std::fs::write(&garbage, b"definitely not an image").unwrap();
        let decoded = texture.set_image_from_file(&garbage);
        assert!(matches!(decoded, Err(TextureError::Decode { .. })));
        assert_eq!(texture.size(), (0, 0));
    }
}
