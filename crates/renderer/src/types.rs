use std::path::PathBuf;

/// Escape-time formula evaluated by the bundled fragment shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FractalMode {
    /// `z' = z^2 + c` with `z` seeded from the pixel and `c` user-controlled.
    #[default]
    Julia,
    /// `z' = z^2 + c` with `c` taken from the pixel.
    Mandelbrot,
}

impl FractalMode {
    pub fn toggled(self) -> Self {
        match self {
            Self::Julia => Self::Mandelbrot,
            Self::Mandelbrot => Self::Julia,
        }
    }

    pub(crate) fn as_uniform(self) -> i32 {
        match self {
            Self::Julia => 0,
            Self::Mandelbrot => 1,
        }
    }
}

impl std::fmt::Display for FractalMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FractalMode::Julia => f.write_str("julia"),
            FractalMode::Mandelbrot => f.write_str("mandelbrot"),
        }
    }
}

/// A named texture the viewer loads at start-up and binds every frame.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureBinding {
    /// Registry name inside the texture manager.
    pub name: String,
    /// Image file to read.
    pub path: PathBuf,
    /// Integer uniform that receives the texture unit index.
    pub uniform: String,
    /// Abort start-up when the texture cannot be loaded.
    pub required: bool,
}

impl TextureBinding {
    /// Binding whose uniform shares the texture's name.
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let name = name.into();
        Self {
            uniform: name.clone(),
            name,
            path: path.into(),
            required: false,
        }
    }
}

/// Initial fractal parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewOptions {
    pub max_iterations: i32,
    pub julia: [f64; 2],
    pub mode: FractalMode,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            julia: [0.0, 0.0],
            mode: FractalMode::Julia,
        }
    }
}

/// Immutable configuration passed to the renderer at start-up.
///
/// `RendererConfig` mirrors CLI flags and config-file settings: which shaders
/// to compile, how large the window should be, and which textures to feed the
/// fragment shader.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Window size in physical pixels.
    pub surface_size: (u32, u32),
    pub title: String,
    /// Vertex shader override; the bundled quad shader is used when `None`.
    pub vertex_shader: Option<PathBuf>,
    /// Fragment shader override; the bundled fractal shader is used when `None`.
    pub fragment_shader: Option<PathBuf>,
    /// Textures loaded into the texture manager and bound each frame.
    pub textures: Vec<TextureBinding>,
    /// Present with vsync (FIFO) when true.
    pub vsync: bool,
    pub view: ViewOptions,
    pub clear_color: [f64; 4],
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            surface_size: (600, 600),
            title: "FraX".to_string(),
            vertex_shader: None,
            fragment_shader: None,
            textures: Vec::new(),
            vsync: true,
            view: ViewOptions::default(),
            clear_color: [0.2, 0.3, 0.3, 1.0],
        }
    }
}
