use std::fmt;
use std::num::NonZeroU32;

/// Opaque handle naming a GPU-side texture resource.
///
/// Handles are never zero; an unallocated texture is represented by
/// `Option<TextureId>::None` instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(NonZeroU32);

impl TextureId {
    pub fn new(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for TextureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0.get())
    }
}

/// Texture coordinate wrapping applied outside the `[0, 1]` range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WrapMode {
    ClampToEdge,
    Repeat,
}

/// Filtering used when sampling between texels or mip levels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterMode {
    Nearest,
    Linear,
}

/// Sampling state attached to a texture whenever its storage is (re)allocated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SamplerParams {
    pub wrap: WrapMode,
    pub mag_filter: FilterMode,
    pub min_filter: FilterMode,
    pub mipmap_filter: FilterMode,
}

impl SamplerParams {
    /// Edge-clamped wrapping, linear magnification and trilinear minification.
    pub const TRILINEAR_CLAMPED: Self = Self {
        wrap: WrapMode::ClampToEdge,
        mag_filter: FilterMode::Linear,
        min_filter: FilterMode::Linear,
        mipmap_filter: FilterMode::Linear,
    };
}

impl Default for SamplerParams {
    fn default() -> Self {
        Self::TRILINEAR_CLAMPED
    }
}

/// GPU primitives needed by [`Texture`](super::Texture).
///
/// The trait mirrors the classic bind-to-edit graphics model: a texture is
/// bound onto the active unit while it is being edited or sampled, and unit
/// selection is global to the context. Implementations are bound to the thread
/// that owns the graphics context.
pub trait GraphicsDevice {
    /// Allocates a fresh handle with no storage attached.
    fn create_texture(&mut self) -> TextureId;

    /// Releases the resource behind `id`. Unknown handles are ignored.
    fn delete_texture(&mut self, id: TextureId);

    /// Binds `id` onto the active unit, or unbinds the active unit on `None`.
    fn bind_texture(&mut self, id: Option<TextureId>);

    /// Selects the unit subsequent [`bind_texture`](Self::bind_texture) calls act on.
    fn active_texture_unit(&mut self, unit: u32);

    /// (Re)allocates storage for `id`, applies `params` and uploads level 0.
    ///
    /// `pixels` is tightly packed RGBA8, `width * height * 4` bytes.
    fn allocate_image(
        &mut self,
        id: TextureId,
        width: u32,
        height: u32,
        params: &SamplerParams,
        pixels: &[u8],
    );

    /// Overwrites level 0 of an already allocated texture of the same size.
    fn update_image(&mut self, id: TextureId, width: u32, height: u32, pixels: &[u8]);

    /// Rebuilds the mip chain of `id` from level 0.
    fn generate_mipmaps(&mut self, id: TextureId);

    /// Number of texture units a shader stage can sample from.
    fn max_texture_units(&self) -> u32;

    /// Largest width or height a 2D texture may have.
    fn max_texture_dimension(&self) -> u32;
}

/// Shader-side consumer of texture unit indices.
pub trait UniformTarget {
    type Location: Copy;

    /// Looks a uniform up by name; `None` when the program has no such uniform.
    fn uniform_location(&self, name: &str) -> Option<Self::Location>;

    fn set_uniform_i32(&mut self, location: Self::Location, value: i32);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_not_a_handle() {
        assert!(TextureId::new(0).is_none());
        assert_eq!(TextureId::new(7).map(TextureId::get), Some(7));
    }

    #[test]
    fn handles_display_as_hex() {
        let id = TextureId::new(0x2a).unwrap();
        assert_eq!(id.to_string(), "0x0000002a");
    }
}
