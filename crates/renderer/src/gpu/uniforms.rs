use tracing::{debug, warn};
use wgpu::naga;

use crate::compile::{UNIFORM_BINDING, UNIFORM_GROUP};
use crate::texture::UniformTarget;

/// Scalar and vector types a reflected uniform member may have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformKind {
    Int,
    Uint,
    Float,
    Vec2,
    Vec3,
    Vec4,
}

impl UniformKind {
    fn from_naga(inner: &naga::TypeInner) -> Option<Self> {
        use naga::{ScalarKind, TypeInner, VectorSize};

        match inner {
            TypeInner::Scalar(scalar) if scalar.width == 4 => match scalar.kind {
                ScalarKind::Sint => Some(Self::Int),
                ScalarKind::Uint => Some(Self::Uint),
                ScalarKind::Float => Some(Self::Float),
                _ => None,
            },
            TypeInner::Vector { size, scalar }
                if scalar.kind == ScalarKind::Float && scalar.width == 4 =>
            {
                Some(match size {
                    VectorSize::Bi => Self::Vec2,
                    VectorSize::Tri => Self::Vec3,
                    VectorSize::Quad => Self::Vec4,
                })
            }
            _ => None,
        }
    }

    fn byte_len(self) -> usize {
        match self {
            Self::Int | Self::Uint | Self::Float => 4,
            Self::Vec2 => 8,
            Self::Vec3 => 12,
            Self::Vec4 => 16,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Uint(u32),
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
}

impl UniformValue {
    pub fn kind(&self) -> UniformKind {
        match self {
            Self::Int(_) => UniformKind::Int,
            Self::Uint(_) => UniformKind::Uint,
            Self::Float(_) => UniformKind::Float,
            Self::Vec2(_) => UniformKind::Vec2,
            Self::Vec3(_) => UniformKind::Vec3,
            Self::Vec4(_) => UniformKind::Vec4,
        }
    }

    fn bytes(&self) -> &[u8] {
        match self {
            Self::Int(value) => bytemuck::bytes_of(value),
            Self::Uint(value) => bytemuck::bytes_of(value),
            Self::Float(value) => bytemuck::bytes_of(value),
            Self::Vec2(value) => bytemuck::cast_slice(value),
            Self::Vec3(value) => bytemuck::cast_slice(value),
            Self::Vec4(value) => bytemuck::cast_slice(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformField {
    pub name: String,
    pub kind: UniformKind,
    pub offset: u32,
}

/// Index of a field inside a [`UniformBlock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation(usize);

/// CPU mirror of a shader's std140 uniform block.
///
/// Fields come from reflecting the compiled module, so any shader can expose
/// its own parameters and callers address them by name. Writes only touch the
/// byte mirror; [`take_dirty`](Self::take_dirty) tells the owner when the GPU
/// buffer needs a refresh.
#[derive(Debug, Clone)]
pub struct UniformBlock {
    fields: Vec<UniformField>,
    data: Vec<u8>,
    dirty: bool,
}

impl UniformBlock {
    /// Builds a block of `size` bytes, rounded up to 16 for uniform binding.
    pub fn new(fields: Vec<UniformField>, size: u32) -> Self {
        let size = (size.max(16) as usize).next_multiple_of(16);
        Self {
            fields,
            data: vec![0; size],
            dirty: true,
        }
    }

    /// A block with no fields, used when the shader declares no uniforms.
    pub fn empty() -> Self {
        Self::new(Vec::new(), 16)
    }

    /// Reflects the uniform block bound at group 0, binding 0.
    pub fn reflect(module: &naga::Module) -> Option<Self> {
        let (_, variable) = module.global_variables.iter().find(|(_, variable)| {
            variable.space == naga::AddressSpace::Uniform
                && variable.binding.as_ref().is_some_and(|binding| {
                    binding.group == UNIFORM_GROUP && binding.binding == UNIFORM_BINDING
                })
        })?;
        let naga::TypeInner::Struct { members, span } = &module.types[variable.ty].inner else {
            return None;
        };

        let fields = members
            .iter()
            .filter_map(|member| {
                let name = member.name.clone()?;
                match UniformKind::from_naga(&module.types[member.ty].inner) {
                    Some(kind) => Some(UniformField {
                        name,
                        kind,
                        offset: member.offset,
                    }),
                    None => {
                        debug!(uniform = %name, "skipping uniform with unsupported type");
                        None
                    }
                }
            })
            .collect();
        Some(Self::new(fields, *span))
    }

    pub fn fields(&self) -> &[UniformField] {
        &self.fields
    }

    pub fn location(&self, name: &str) -> Option<UniformLocation> {
        self.fields
            .iter()
            .position(|field| field.name == name)
            .map(UniformLocation)
    }

    /// Writes `value` at `location`. Returns `false`, leaving the block
    /// untouched, when the value's type differs from the declared one.
    pub fn set(&mut self, location: UniformLocation, value: UniformValue) -> bool {
        let Some(field) = self.fields.get(location.0) else {
            return false;
        };
        if field.kind != value.kind() {
            warn!(
                uniform = %field.name,
                expected = ?field.kind,
                actual = ?value.kind(),
                "ignoring uniform write with mismatched type"
            );
            return false;
        }
        let start = field.offset as usize;
        let end = start + field.kind.byte_len();
        let Some(slot) = self.data.get_mut(start..end) else {
            return false;
        };
        let bytes = value.bytes();
        if slot != bytes {
            slot.copy_from_slice(bytes);
            self.dirty = true;
        }
        true
    }

    /// Name-based [`set`](Self::set); unknown names return `false`.
    pub fn set_named(&mut self, name: &str, value: UniformValue) -> bool {
        match self.location(name) {
            Some(location) => self.set(location, value),
            None => false,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Returns whether anything changed since the last call and clears the flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }
}

impl UniformTarget for UniformBlock {
    type Location = UniformLocation;

    fn uniform_location(&self, name: &str) -> Option<UniformLocation> {
        self.location(name)
    }

    fn set_uniform_i32(&mut self, location: UniformLocation, value: i32) {
        self.set(location, UniformValue::Int(value));
    }
}

#[cfg(test)]
mod tests {
    use wgpu::naga::ShaderStage;

    use super::*;
    use crate::compile::{parse_stage, wrap_fragment, DEFAULT_FRAGMENT_SHADER};

    fn fractal_block() -> UniformBlock {
        let wrapped = wrap_fragment(DEFAULT_FRAGMENT_SHADER, 4);
        let module = parse_stage(&wrapped, ShaderStage::Fragment).expect("bundled shader");
        UniformBlock::reflect(&module).expect("uniform block")
    }

    #[test]
    fn reflects_std140_offsets_of_the_bundled_shader() {
        let block = fractal_block();
        let offsets: Vec<(&str, UniformKind, u32)> = block
            .fields()
            .iter()
            .map(|field| (field.name.as_str(), field.kind, field.offset))
            .collect();

        assert_eq!(
            offsets,
            vec![
                ("viewport", UniformKind::Vec4, 0),
                ("center", UniformKind::Vec2, 16),
                ("c", UniformKind::Vec2, 24),
                ("scale", UniformKind::Float, 32),
                ("max_it", UniformKind::Int, 36),
                ("mode", UniformKind::Int, 40),
                ("palette", UniformKind::Int, 44),
            ]
        );
        assert_eq!(block.size(), 48);
    }

    #[test]
    fn writes_land_at_the_reflected_offset() {
        let mut block = fractal_block();
        block.take_dirty();

        assert!(block.set_named("max_it", UniformValue::Int(42)));
        assert!(block.take_dirty());
        assert_eq!(&block.bytes()[36..40], &42i32.to_ne_bytes());

        assert!(block.set_named("c", UniformValue::Vec2([0.5, -1.0])));
        assert_eq!(&block.bytes()[24..28], &0.5f32.to_ne_bytes());
        assert_eq!(&block.bytes()[28..32], &(-1.0f32).to_ne_bytes());
    }

    #[test]
    fn unchanged_writes_do_not_mark_the_block_dirty() {
        let mut block = fractal_block();
        block.set_named("scale", UniformValue::Float(2.0));
        block.take_dirty();

        assert!(block.set_named("scale", UniformValue::Float(2.0)));
        assert!(!block.take_dirty());
    }

    #[test]
    fn mismatched_and_unknown_writes_are_rejected() {
        let mut block = fractal_block();
        block.take_dirty();

        assert!(!block.set_named("max_it", UniformValue::Float(1.0)));
        assert!(!block.set_named("missing", UniformValue::Int(1)));
        assert!(!block.take_dirty());
        assert!(block.bytes().iter().all(|byte| *byte == 0));
    }

    #[test]
    fn empty_block_is_bindable() {
        let block = UniformBlock::empty();
        assert_eq!(block.size(), 16);
        assert!(block.location("anything").is_none());
    }
}
