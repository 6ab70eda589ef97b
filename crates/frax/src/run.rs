use anyhow::{Context, Result};
use fraxconfig::{FractalKind, FraxConfig, TextureEntry};
use renderer::{FractalMode, Renderer, RendererConfig, TextureBinding, ViewOptions};
use tracing_subscriber::EnvFilter;

use crate::cli::RunArgs;
use crate::paths::AppPaths;

pub fn run(args: RunArgs) -> Result<()> {
    let config = effective_config(&args)?;
    let renderer_config = renderer_config(&config);
    tracing::info!(
        size = ?renderer_config.surface_size,
        mode = %renderer_config.view.mode,
        max_iterations = renderer_config.view.max_iterations,
        textures = renderer_config.textures.len(),
        fragment = ?renderer_config.fragment_shader,
        "starting FraX"
    );
    Renderer::new(renderer_config).run()
}

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

pub fn print_config_location(args: &RunArgs) -> Result<()> {
    let paths = AppPaths::discover()?;
    let default_file = paths.config_file();
    println!("Configuration:");
    println!("  directory:  {}", paths.config_dir().display());
    println!(
        "  default:    {} ({})",
        default_file.display(),
        if default_file.is_file() { "present" } else { "missing" }
    );
    if let Some(explicit) = &args.config {
        println!("  --config:   {}", explicit.display());
    }
    Ok(())
}

pub fn print_effective_config(args: &RunArgs) -> Result<()> {
    let config = effective_config(args)?;
    let rendered = toml::to_string_pretty(&config).context("failed to render configuration")?;
    print!("{rendered}");
    Ok(())
}

/// Config file (explicit or discovered) with command-line flags applied.
pub(crate) fn effective_config(args: &RunArgs) -> Result<FraxConfig> {
    let mut config = load_config(args)?;
    apply_overrides(&mut config, args);
    config.validate().context("invalid settings")?;
    Ok(config)
}

fn load_config(args: &RunArgs) -> Result<FraxConfig> {
    if let Some(path) = &args.config {
        return FraxConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()));
    }

    let paths = AppPaths::discover()?;
    let candidate = paths.config_file();
    if candidate.is_file() {
        tracing::info!(path = %candidate.display(), "using configuration file");
        FraxConfig::load(&candidate)
            .with_context(|| format!("failed to load config {}", candidate.display()))
    } else {
        tracing::debug!(path = %candidate.display(), "no configuration file; using defaults");
        Ok(FraxConfig::default())
    }
}

fn apply_overrides(config: &mut FraxConfig, args: &RunArgs) {
    if let Some(fragment) = &args.fragment {
        config.shaders.fragment = Some(fragment.clone());
    }
    if let Some(vertex) = &args.vertex {
        config.shaders.vertex = Some(vertex.clone());
    }
    if let Some((width, height)) = args.size {
        config.window.width = width;
        config.window.height = height;
    }
    if let Some(max_iterations) = args.max_iterations {
        config.view.max_iterations = max_iterations;
    }
    if let Some(julia) = args.julia {
        config.view.julia = julia;
    }
    if let Some(mode) = args.mode {
        config.view.mode = mode;
    }
    if args.no_vsync {
        config.window.vsync = false;
    }
    for (name, path) in &args.textures {
        config.textures.insert(
            name.clone(),
            TextureEntry {
                path: path.clone(),
                uniform: None,
                required: true,
            },
        );
    }
}

pub(crate) fn renderer_config(config: &FraxConfig) -> RendererConfig {
    let textures = config
        .resolved_textures()
        .into_iter()
        .map(|texture| TextureBinding {
            name: texture.name,
            path: texture.path,
            uniform: texture.uniform,
            required: texture.required,
        })
        .collect();

    RendererConfig {
        surface_size: (config.window.width, config.window.height),
        title: config.window.title.clone(),
        vertex_shader: config.shaders.vertex.clone(),
        fragment_shader: config.shaders.fragment.clone(),
        textures,
        vsync: config.window.vsync,
        view: ViewOptions {
            max_iterations: config.view.max_iterations,
            julia: config.view.julia,
            mode: match config.view.mode {
                FractalKind::Julia => FractalMode::Julia,
                FractalKind::Mandelbrot => FractalMode::Mandelbrot,
            },
        },
        ..RendererConfig::default()
    }
}
