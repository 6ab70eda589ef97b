use super::device::GraphicsDevice;

/// Smallest unit pool a conforming GPU is expected to expose.
pub const MIN_EXPECTED_TEXTURE_UNITS: u32 = 16;

/// Round-robin allocator handing out texture unit indices.
///
/// One allocator is shared by every texture drawn through the same context;
/// it is passed explicitly to [`Texture::bind_to_unit`](super::Texture::bind_to_unit).
#[derive(Debug, Clone)]
pub struct TextureUnitAllocator {
    next: u32,
    pool_size: u32,
}

impl TextureUnitAllocator {
    pub fn new(pool_size: u32) -> Self {
        if pool_size < MIN_EXPECTED_TEXTURE_UNITS {
            tracing::warn!(
                pool_size,
                expected = MIN_EXPECTED_TEXTURE_UNITS,
                "GPU only supports {} texture units (should be {} min.)",
                pool_size,
                MIN_EXPECTED_TEXTURE_UNITS
            );
        }
        Self {
            next: 0,
            pool_size: pool_size.max(1),
        }
    }

    pub fn from_device<D: GraphicsDevice + ?Sized>(device: &D) -> Self {
        Self::new(device.max_texture_units())
    }

    pub fn pool_size(&self) -> u32 {
        self.pool_size
    }

    /// Unit the next call to [`next_unit`](Self::next_unit) will return.
    pub fn peek(&self) -> u32 {
        self.next
    }

    /// Starts handing out units from zero again.
    ///
    /// Renderers call this once per frame so a stable set of textures keeps
    /// landing on the same units.
    pub fn reset(&mut self) {
        self.next = 0;
    }

    pub fn next_unit(&mut self) -> u32 {
        let unit = self.next;
        self.next = if unit + 1 >= self.pool_size { 0 } else { unit + 1 };
        unit
    }
}
