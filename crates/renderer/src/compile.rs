use std::fmt::Write as _;
use std::path::PathBuf;

use thiserror::Error;
use wgpu::naga::{self, front::glsl, ShaderStage};

/// Bundled vertex shader: passes a clip-space quad through unchanged.
pub const DEFAULT_VERTEX_SHADER: &str = include_str!("../shaders/quad.vert");

/// Bundled escape-time fragment shader.
pub const DEFAULT_FRAGMENT_SHADER: &str = include_str!("../shaders/fractal.frag");

/// Sampler-index uniform of the bundled fragment shader; `-1` selects the
/// built-in cosine palette.
pub(crate) const PALETTE_UNIFORM: &str = "palette";

/// Bind group holding the program's uniform block.
pub(crate) const UNIFORM_GROUP: u32 = 0;
pub(crate) const UNIFORM_BINDING: u32 = 0;

/// Bind group holding the emulated texture units.
pub(crate) const TEXTURE_UNIT_GROUP: u32 = 1;

#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("failed to read shader at {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to compile {stage} shader:\n{log}")]
    Compile { stage: &'static str, log: String },
    #[error("failed to link shader program: {0}")]
    Link(String),
    #[error("{stage} shader does not define `void main()`")]
    MissingEntryPoint { stage: &'static str },
}

pub(crate) fn stage_name(stage: ShaderStage) -> &'static str {
    match stage {
        ShaderStage::Vertex => "vertex",
        ShaderStage::Fragment => "fragment",
        _ => "compute",
    }
}

/// Parses GLSL into a naga module, rendering diagnostics against `source`.
pub(crate) fn parse_stage(source: &str, stage: ShaderStage) -> Result<naga::Module, ShaderError> {
    let mut frontend = glsl::Frontend::default();
    let module = frontend
        .parse(&glsl::Options::from(stage), source)
        .map_err(|errors| ShaderError::Compile {
            stage: stage_name(stage),
            log: errors.emit_to_string(source),
        })?;
    if !module.entry_points.iter().any(|entry| entry.name == "main") {
        return Err(ShaderError::MissingEntryPoint {
            stage: stage_name(stage),
        });
    }
    Ok(module)
}

/// Produces a self-contained fragment shader from user GLSL.
///
/// The `#version` line is blanked and [`fragment_prelude`] is prepended, so
/// line numbers in diagnostics still match the user's file. The prelude
/// declares `v_position`, `frag_color`, one texture/sampler pair per unit and
/// the `frax_texture*` lookup helpers.
pub(crate) fn wrap_fragment(source: &str, units: u32) -> String {
    let mut body = String::with_capacity(source.len());
    let mut skipped_version = false;
    for line in source.lines() {
        if !skipped_version && line.trim_start().starts_with("#version") {
            skipped_version = true;
            body.push('\n');
            continue;
        }
        body.push_str(line);
        body.push('\n');
    }
    format!("{}#line 1\n{body}", fragment_prelude(units))
}

/// GLSL declarations shared by every fragment shader.
///
/// Units are addressed by integer index at runtime, so the helpers dispatch
/// through an if-chain. Both helpers pick the mip level explicitly, which
/// keeps them valid inside non-uniform control flow.
pub(crate) fn fragment_prelude(units: u32) -> String {
    let units = units.max(1);
    let mut prelude = String::from(
        "#version 450\n\
         layout(location = 0) in vec2 v_position;\n\
         layout(location = 0) out vec4 frag_color;\n\n",
    );

    for unit in 0..units {
        let _ = writeln!(
            prelude,
            "layout(set = {TEXTURE_UNIT_GROUP}, binding = {}) uniform texture2D frax_unit{unit}_texture;\n\
             layout(set = {TEXTURE_UNIT_GROUP}, binding = {}) uniform sampler frax_unit{unit}_sampler;",
            unit * 2,
            unit * 2 + 1,
        );
    }

    write_helper(
        &mut prelude,
        "vec4 frax_texture_lod(int unit, vec2 uv, float lod)",
        units,
        "textureLod({sampler}, uv, lod)",
    );
    write_helper(
        &mut prelude,
        "vec4 frax_texture_grad(int unit, vec2 uv, vec2 dx, vec2 dy)",
        units,
        "textureGrad({sampler}, uv, dx, dy)",
    );
    prelude.push_str("vec4 frax_texture(int unit, vec2 uv) {\n    return frax_texture_lod(unit, uv, 0.0);\n}\n\n");
    prelude
}

fn write_helper(out: &mut String, signature: &str, units: u32, lookup: &str) {
    let _ = writeln!(out, "\n{signature} {{");
    for unit in 0..units {
        let sampler = format!("sampler2D(frax_unit{unit}_texture, frax_unit{unit}_sampler)");
        let call = lookup.replace("{sampler}", &sampler);
        let keyword = if unit == 0 { "if" } else { "} else if" };
        let _ = writeln!(out, "    {keyword} (unit == {unit}) {{\n        return {call};");
    }
    out.push_str("    }\n    return vec4(1.0, 0.0, 1.0, 1.0);\n}\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_shaders_parse() {
        parse_stage(DEFAULT_VERTEX_SHADER, ShaderStage::Vertex).expect("vertex shader");
        let wrapped = wrap_fragment(DEFAULT_FRAGMENT_SHADER, 16);
        parse_stage(&wrapped, ShaderStage::Fragment).expect("fragment shader");
    }

    #[test]
    fn wrap_replaces_the_version_line_and_keeps_numbering() {
        let source = "#version 330 core\nvoid main() {\n    frag_color = vec4(1.0);\n}\n";
        let wrapped = wrap_fragment(source, 2);

        assert_eq!(wrapped.matches("#version").count(), 1);
        assert!(wrapped.starts_with("#version 450"));
        let body = wrapped.split("#line 1\n").nth(1).unwrap();
        assert_eq!(body.lines().nth(1), Some("void main() {"));
    }

    #[test]
    fn prelude_declares_one_pair_per_unit() {
        let prelude = fragment_prelude(3);
        assert!(prelude.contains("binding = 4) uniform texture2D frax_unit2_texture"));
        assert!(prelude.contains("binding = 5) uniform sampler frax_unit2_sampler"));
        assert!(!prelude.contains("frax_unit3"));
        assert!(prelude.contains("} else if (unit == 2)"));
    }

    #[test]
    fn compile_errors_carry_the_stage_and_log() {
        let wrapped = wrap_fragment("void main() { frag_color = nope; }", 1);
        match parse_stage(&wrapped, ShaderStage::Fragment) {
            Err(ShaderError::Compile { stage, log }) => {
                assert_eq!(stage, "fragment");
                assert!(!log.is_empty());
            }
            other => panic!("expected compile error, got {other:?}"),
        }
    }

    #[test]
    fn missing_main_is_reported() {
        let source = "#version 450\nlayout(location = 0) out vec4 color;\nvoid helper() { color = vec4(0.0); }\n";
        let err = parse_stage(source, ShaderStage::Fragment).unwrap_err();
        assert!(
            matches!(
                err,
                ShaderError::MissingEntryPoint { stage: "fragment" }
                    | ShaderError::Compile { stage: "fragment", .. }
            ),
            "unexpected error: {err}"
        );
    }
}
