use std::path::PathBuf;

use clap::{Parser, Subcommand};
use fraxconfig::FractalKind;

#[derive(Parser, Debug)]
#[command(
    name = "frax",
    author,
    version,
    about = "Interactive Julia / Mandelbrot fractal viewer",
    arg_required_else_help = false
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// Configuration file; defaults to `frax.toml` in the user config directory.
    #[arg(long, value_name = "FILE", env = "FRAX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Fragment shader to use instead of the bundled fractal shader.
    #[arg(long, value_name = "FILE")]
    pub fragment: Option<PathBuf>,

    /// Vertex shader to use instead of the bundled quad shader.
    #[arg(long, value_name = "FILE")]
    pub vertex: Option<PathBuf>,

    /// Window size (e.g. `800x600`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_surface_size)]
    pub size: Option<(u32, u32)>,

    /// Initial iteration limit.
    #[arg(long, value_name = "COUNT", value_parser = parse_iterations)]
    pub max_iterations: Option<i32>,

    /// Initial Julia constant as `RE,IM`.
    #[arg(long, value_name = "RE,IM", value_parser = parse_julia, allow_hyphen_values = true)]
    pub julia: Option<[f64; 2]>,

    /// Fractal to start with: `julia` or `mandelbrot`.
    #[arg(long, value_name = "MODE", value_parser = parse_mode)]
    pub mode: Option<FractalKind>,

    /// Load a required texture and bind it to the sampler uniform `NAME`. Repeatable.
    #[arg(long = "texture", value_name = "NAME=PATH", value_parser = parse_texture)]
    pub textures: Vec<(String, PathBuf)>,

    /// Present without waiting for vertical sync.
    #[arg(long)]
    pub no_vsync: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Inspect configuration discovery and the effective settings.
    Config(ConfigCommand),
}

#[derive(Parser, Debug)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print where the configuration file is looked up.
    Where,
    /// Print the effective configuration after applying command-line flags.
    Show,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_surface_size(value: &str) -> Result<(u32, u32), String> {
    let trimmed = value.trim();
    let (width, height) = trimmed
        .split_once(['x', 'X', '×'])
        .ok_or_else(|| "expected WxH format, e.g. 800x600".to_string())?;

    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| "invalid width in size specification".to_string())?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| "invalid height in size specification".to_string())?;

    if width == 0 || height == 0 {
        return Err("window dimensions must be greater than zero".into());
    }

    Ok((width, height))
}

pub fn parse_iterations(value: &str) -> Result<i32, String> {
    let count: i32 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid iteration count '{value}'"))?;
    if count <= 0 {
        return Err("iteration count must be at least 1".into());
    }
    Ok(count)
}

pub fn parse_julia(value: &str) -> Result<[f64; 2], String> {
    let (re, im) = value
        .split_once(',')
        .ok_or_else(|| "expected RE,IM (e.g. -0.8,0.156)".to_string())?;
    let re: f64 = re
        .trim()
        .parse()
        .map_err(|_| format!("invalid real part '{}'", re.trim()))?;
    let im: f64 = im
        .trim()
        .parse()
        .map_err(|_| format!("invalid imaginary part '{}'", im.trim()))?;
    if !re.is_finite() || !im.is_finite() {
        return Err("julia constant must be finite".into());
    }
    Ok([re, im])
}

pub fn parse_mode(value: &str) -> Result<FractalKind, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "julia" | "j" => Ok(FractalKind::Julia),
        "mandelbrot" | "mandel" | "m" => Ok(FractalKind::Mandelbrot),
        other => Err(format!(
            "unknown fractal '{other}'; expected julia or mandelbrot"
        )),
    }
}

pub fn parse_texture(value: &str) -> Result<(String, PathBuf), String> {
    let (name, path) = value
        .split_once('=')
        .ok_or_else(|| "expected NAME=PATH".to_string())?;
    let name = name.trim();
    if name.is_empty() {
        return Err("texture name must not be empty".into());
    }
    if path.trim().is_empty() {
        return Err(format!("texture '{name}' needs a path"));
    }
    Ok((name.to_string(), PathBuf::from(path.trim())))
}
