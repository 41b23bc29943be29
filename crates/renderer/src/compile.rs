//! Shader source preparation and validation.
//!
//! Background fragment shaders are written for WebGL: loose `uniform`
//! declarations, `precision` statements, `gl_FragColor`, `texture2D`, and a
//! bottom-left `gl_FragCoord`. ShaderToy-style sources that only define
//! `mainImage` are accepted too. Both are rewritten into Vulkan-flavoured
//! GLSL 450 with a std140 uniform block and separate texture/sampler
//! bindings, then parsed and validated with naga so compile errors come back
//! as an info log instead of a device error.

use wgpu::naga;

use crate::backend::UniformSlot;
use crate::types::StageKind;

/// Name of the single vertex attribute of the fixed vertex stage.
pub const POSITION_ATTRIBUTE: &str = "position";

/// Fixed pass-through vertex stage for the full-screen quad.
pub const VERTEX_SHADER_GLSL: &str = r"#version 450
layout(location = 0) in vec2 position;

void main() {
    gl_Position = vec4(position, 0.0, 1.0);
}
";

/// GLSL prologue injected ahead of every fragment source.
///
/// The block layout must match `BackdropUniforms` in `gpu/uniforms.rs`.
const HEADER: &str = r"#version 450
layout(location = 0) out vec4 backdrop_FragColor;

layout(std140, set = 0, binding = 0) uniform BackdropParams {
    vec3 _iResolution;
    float _iTime;
    vec4 _iMouse;
} backdrop;

#define iResolution backdrop._iResolution
#define iTime backdrop._iTime
#define iMouse backdrop._iMouse

layout(set = 1, binding = 0) uniform texture2D backdrop_channel0_texture;
layout(set = 1, binding = 1) uniform sampler backdrop_channel0_sampler;

#define iChannel0 sampler2D(backdrop_channel0_texture, backdrop_channel0_sampler)

vec4 backdrop_FragCoord;
";

/// Epilogue for sources with their own `main`, renamed to `backdrop_main`.
const FOOTER_MAIN: &str = r"
void main() {
    backdrop_FragCoord = vec4(gl_FragCoord.x, iResolution.y - gl_FragCoord.y, gl_FragCoord.z, gl_FragCoord.w);
    backdrop_main();
}
";

/// Epilogue for ShaderToy-style sources exposing `mainImage`.
const FOOTER_MAIN_IMAGE: &str = r"
void main() {
    vec2 fragCoord = vec2(gl_FragCoord.x, iResolution.y - gl_FragCoord.y);
    backdrop_FragCoord = vec4(fragCoord, gl_FragCoord.z, gl_FragCoord.w);
    vec4 color = vec4(0.0);
    mainImage(color, fragCoord);
    backdrop_FragColor = color;
}
";

/// Identifier rewrites applied to the user's fragment body.
const FRAGMENT_RENAMES: [(&str, &str); 3] = [
    ("gl_FragColor", "backdrop_FragColor"),
    ("gl_FragCoord", "backdrop_FragCoord"),
    ("texture2D", "texture"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentStyle {
    /// Defines `void main()` and writes `gl_FragColor`.
    Main,
    /// Defines `mainImage(out vec4, in vec2)`.
    MainImage,
}

/// A stage that parsed and validated successfully.
#[derive(Debug, Clone)]
pub struct PreparedStage {
    pub kind: StageKind,
    /// GLSL 450 handed to the backend.
    pub glsl: String,
    /// Background uniforms the stage actually reads.
    pub active_uniforms: Vec<UniformSlot>,
}

impl PreparedStage {
    pub fn is_active(&self, slot: UniformSlot) -> bool {
        self.active_uniforms.contains(&slot)
    }
}

/// Prepares and validates a stage, returning the diagnostic log on failure.
pub fn prepare_stage(kind: StageKind, source: &str) -> Result<PreparedStage, String> {
    let (glsl, active_uniforms) = match kind {
        StageKind::Vertex => (source.to_string(), Vec::new()),
        StageKind::Fragment => {
            let wrapped = wrap_fragment(source)?;
            (wrapped.glsl, wrapped.active_uniforms)
        }
    };
    validate_glsl(kind, &glsl)?;
    Ok(PreparedStage {
        kind,
        glsl,
        active_uniforms,
    })
}

fn validate_glsl(kind: StageKind, glsl: &str) -> Result<naga::Module, String> {
    let stage = match kind {
        StageKind::Vertex => naga::ShaderStage::Vertex,
        StageKind::Fragment => naga::ShaderStage::Fragment,
    };
    let mut frontend = naga::front::glsl::Frontend::default();
    let module = frontend
        .parse(&naga::front::glsl::Options::from(stage), glsl)
        .map_err(|errors| errors.emit_to_string(glsl))?;
    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|error| error.emit_to_string(glsl))?;
    Ok(module)
}

struct WrappedFragment {
    glsl: String,
    active_uniforms: Vec<UniformSlot>,
}

/// Produces a self-contained GLSL 450 fragment shader from WebGL-style code.
///
/// 1. Strip comments and `#version`, then rewrite every `precision` and
///    `uniform` statement, even ones spanning several lines (line breaks are
///    kept so `#line 1` keeps diagnostics aligned with the user source).
/// 2. Rename `gl_FragColor`, `gl_FragCoord`, `texture2D`, and `main`.
/// 3. Prepend [`HEADER`] and append the footer matching the entry style.
fn wrap_fragment(source: &str) -> Result<WrappedFragment, String> {
    let stripped = strip_comments(source);
    let style = detect_style(&stripped)
        .ok_or_else(|| "fragment source defines neither main() nor mainImage()".to_string())?;

    let mut unversioned = String::with_capacity(stripped.len());
    for line in stripped.lines() {
        if !line.trim_start().starts_with("#version") {
            unversioned.push_str(line);
        }
        unversioned.push('\n');
    }

    let declarations = rewrite_declarations(&unversioned)?;
    let body = rename_identifiers(&declarations.body, |ident| {
        if style == FragmentStyle::Main && ident == "main" {
            return Some("backdrop_main");
        }
        FRAGMENT_RENAMES
            .iter()
            .find(|(from, _)| *from == ident)
            .map(|(_, to)| *to)
    });

    // Both footers read iResolution.y to flip gl_FragCoord, so the
    // resolution is always live whatever the body uses.
    let used = identifiers(&body);
    let active_uniforms = UniformSlot::ALL
        .into_iter()
        .filter(|slot| match slot {
            UniformSlot::Resolution => true,
            UniformSlot::Channel0 if !declarations.channel_aliases.is_empty() => true,
            _ => used.iter().any(|ident| *ident == slot.glsl_name()),
        })
        .collect();

    let aliases: String = declarations
        .channel_aliases
        .iter()
        .map(|name| format!("#define {name} iChannel0\n"))
        .collect();
    let footer = match style {
        FragmentStyle::Main => FOOTER_MAIN,
        FragmentStyle::MainImage => FOOTER_MAIN_IMAGE,
    };

    Ok(WrappedFragment {
        glsl: format!("{HEADER}{aliases}\n#line 1\n{body}{footer}"),
        active_uniforms,
    })
}

struct RewrittenDeclarations {
    body: String,
    /// Extra `sampler2D` uniforms, all served by the single image channel.
    channel_aliases: Vec<String>,
}

/// Removes `precision` statements and replaces loose `uniform` declarations.
///
/// The background uniforms are dropped since the header provides them. Any
/// other `sampler2D` becomes an alias of `iChannel0`; other opaque types are
/// refused. Remaining uniforms turn into zero-initialised globals so shaders
/// written against a richer host still compile. Each statement is replaced in
/// place with as many line breaks as it spanned.
fn rewrite_declarations(text: &str) -> Result<RewrittenDeclarations, String> {
    let mut body = String::with_capacity(text.len());
    let mut channel_aliases = Vec::new();
    let mut cursor = 0;

    for (start, ident) in identifier_spans(text) {
        if start < cursor || (ident != "uniform" && ident != "precision") {
            continue;
        }
        let end = text[start..]
            .find(';')
            .map(|offset| start + offset + 1)
            .ok_or_else(|| format!("unterminated `{ident}` statement"))?;
        let statement = &text[start..end];

        let replacement = if ident == "precision" {
            String::new()
        } else {
            rewrite_uniform(statement, &mut channel_aliases)?
        };

        body.push_str(&text[cursor..start]);
        body.push_str(&replacement);
        for _ in 0..statement.matches('\n').count() {
            body.push('\n');
        }
        cursor = end;
    }
    body.push_str(&text[cursor..]);

    Ok(RewrittenDeclarations {
        body,
        channel_aliases,
    })
}

fn rewrite_uniform(statement: &str, channel_aliases: &mut Vec<String>) -> Result<String, String> {
    let inner = statement
        .trim_end_matches(';')
        .trim_start()
        .trim_start_matches("uniform");
    if inner.contains('{') {
        return Err("uniform blocks are not supported".to_string());
    }

    let spans = identifier_spans(inner);
    let Some(&(type_start, ty)) = spans
        .iter()
        .find(|(_, ident)| !matches!(*ident, "lowp" | "mediump" | "highp"))
    else {
        return Err(format!("malformed declaration `{}`", statement.trim()));
    };

    let mut globals = Vec::new();
    for declarator in inner[type_start + ty.len()..].split(',') {
        let Some(name) = identifiers(declarator).first().copied() else {
            return Err(format!("malformed declaration `{}`", statement.trim()));
        };
        let array = declarator
            .find('[')
            .map(|open| declarator[open..].trim())
            .unwrap_or("");

        if UniformSlot::from_glsl_name(name).is_some() {
            continue;
        }
        if ty == "sampler2D" && array.is_empty() {
            channel_aliases.push(name.to_string());
            continue;
        }
        if is_opaque_type(ty) {
            return Err(format!(
                "uniform `{name}` of type `{ty}{array}` is not supported; only one 2D image can be sampled"
            ));
        }

        if array.is_empty() && is_value_type(ty) {
            globals.push(format!("{ty} {name} = {ty}(0);"));
        } else {
            globals.push(format!("{ty} {name}{array};"));
        }
    }
    Ok(globals.join(" "))
}

fn is_opaque_type(ty: &str) -> bool {
    ty.starts_with("sampler") || ty.starts_with("image") || ty.starts_with("texture")
}

fn is_value_type(ty: &str) -> bool {
    matches!(ty, "float" | "int" | "uint" | "bool")
        || ["vec", "ivec", "uvec", "bvec", "mat"]
            .iter()
            .any(|prefix| ty.strip_prefix(prefix).is_some_and(|rest| rest.starts_with(['2', '3', '4'])))
}

pub fn detect_style(source: &str) -> Option<FragmentStyle> {
    let spans = identifier_spans(source);
    let defines_main = spans.windows(2).any(|pair| {
        let (_, previous) = pair[0];
        let (start, ident) = pair[1];
        previous == "void"
            && ident == "main"
            && source[start + ident.len()..].trim_start().starts_with('(')
    });
    if defines_main {
        Some(FragmentStyle::Main)
    } else if spans.iter().any(|(_, ident)| *ident == "mainImage") {
        Some(FragmentStyle::MainImage)
    } else {
        None
    }
}

/// Removes `//` and `/* */` comments, keeping line breaks.
fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '/' {
            match chars.peek() {
                Some('/') => {
                    for next in chars.by_ref() {
                        if next == '\n' {
                            out.push('\n');
                            break;
                        }
                    }
                    continue;
                }
                Some('*') => {
                    chars.next();
                    let mut previous = '\0';
                    for next in chars.by_ref() {
                        if next == '\n' {
                            out.push('\n');
                        }
                        if previous == '*' && next == '/' {
                            break;
                        }
                        previous = next;
                    }
                    out.push(' ');
                    continue;
                }
                _ => {}
            }
        }
        out.push(ch);
    }
    out
}

fn identifier_spans(text: &str) -> Vec<(usize, &str)> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut index = 0;
    while index < bytes.len() {
        let byte = bytes[index];
        if byte.is_ascii_alphabetic() || byte == b'_' {
            let start = index;
            while index < bytes.len() && (bytes[index].is_ascii_alphanumeric() || bytes[index] == b'_')
            {
                index += 1;
            }
            spans.push((start, &text[start..index]));
        } else if byte.is_ascii_digit() {
            // Numeric literals such as `1e5` or `2.0f` are not identifiers.
            while index < bytes.len()
                && (bytes[index].is_ascii_alphanumeric() || bytes[index] == b'_' || bytes[index] == b'.')
            {
                index += 1;
            }
        } else {
            index += 1;
        }
    }
    spans
}

fn identifiers(text: &str) -> Vec<&str> {
    identifier_spans(text)
        .into_iter()
        .map(|(_, ident)| ident)
        .collect()
}

fn rename_identifiers<'a>(line: &str, rename: impl Fn(&str) -> Option<&'a str>) -> String {
    let mut out = String::with_capacity(line.len());
    let mut cursor = 0;
    for (start, ident) in identifier_spans(line) {
        if let Some(replacement) = rename(ident) {
            out.push_str(&line[cursor..start]);
            out.push_str(replacement);
            cursor = start + ident.len();
        }
    }
    out.push_str(&line[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEBGL_SOURCE: &str = r#"
        precision mediump float;
        uniform vec3 iResolution;
        uniform float iTime;
        uniform vec4 iMouse;
        uniform sampler2D iChannel0;

        // ripple around the pointer
        void main() {
            vec2 uv = gl_FragCoord.xy / iResolution.xy;
            float d = distance(gl_FragCoord.xy, iMouse.xy) / iResolution.y;
            vec2 offset = 0.01 * sin(d * 40.0 - iTime * 3.0) * normalize(uv - 0.5);
            gl_FragColor = texture2D(iChannel0, uv + offset);
        }
    "#;

    fn user_body(glsl: &str) -> &str {
        glsl.split_once("#line 1\n")
            .map(|(_, rest)| rest)
            .expect("line directive")
    }

    #[test]
    fn wrap_strips_webgl_declarations() {
        let wrapped = wrap_fragment(WEBGL_SOURCE).expect("wrap");
        let body = user_body(&wrapped.glsl);
        assert!(!body.contains("uniform"));
        assert!(!body.contains("precision mediump"));
        assert!(!body.contains("texture2D"));
        assert!(!body.contains("ripple"));
        assert!(body.contains("void backdrop_main()"));
        assert!(body.contains("backdrop_FragColor = texture(iChannel0"));
    }

    #[test]
    fn wrap_keeps_source_line_numbers() {
        let wrapped = wrap_fragment(WEBGL_SOURCE).expect("wrap");
        let body = user_body(&wrapped.glsl);
        let original = WEBGL_SOURCE.lines().position(|l| l.contains("void main"));
        let rewritten = body.lines().position(|l| l.contains("void backdrop_main"));
        assert_eq!(original, rewritten);
    }

    #[test]
    fn multi_line_declarations_are_removed_in_place() {
        let source = "precision\n  highp float;\nuniform float\n    iTime;\nvoid main() {\n    gl_FragColor = vec4(iTime);\n}\n";
        let wrapped = wrap_fragment(source).expect("wrap");
        let body = user_body(&wrapped.glsl);
        assert!(!body.contains("uniform"));
        assert!(!body.contains("highp"));
        assert_eq!(
            body.lines().position(|l| l.contains("void backdrop_main")),
            Some(4)
        );
        prepare_stage(StageKind::Fragment, source).expect("valid shader");
    }

    #[test]
    fn unknown_uniforms_become_zeroed_globals() {
        let source = r#"
            uniform float iFrame;
            uniform mediump vec2 u_offset, u_scale;
            uniform float u_weights[4];
            void main() {
                gl_FragColor = vec4(iFrame + u_offset.x * u_scale.y + u_weights[1]);
            }
        "#;
        let wrapped = wrap_fragment(source).expect("wrap");
        let body = user_body(&wrapped.glsl);
        assert!(body.contains("float iFrame = float(0);"));
        assert!(body.contains("vec2 u_offset = vec2(0); vec2 u_scale = vec2(0);"));
        assert!(body.contains("float u_weights[4];"));
        prepare_stage(StageKind::Fragment, source).expect("valid shader");
    }

    #[test]
    fn extra_sampler_aliases_the_image_channel() {
        let source = r#"
            uniform sampler2D u_photo;
            void main() {
                gl_FragColor = texture2D(u_photo, vec2(0.5));
            }
        "#;
        let stage = prepare_stage(StageKind::Fragment, source).expect("valid shader");
        assert!(stage.glsl.contains("#define u_photo iChannel0"));
        assert!(stage.is_active(UniformSlot::Channel0));
    }

    #[test]
    fn other_opaque_uniforms_are_refused() {
        let source = "uniform samplerCube u_sky;\nvoid main() { gl_FragColor = vec4(1.0); }";
        let error = wrap_fragment(source).err().expect("refused");
        assert!(error.contains("u_sky"), "{error}");
    }

    #[test]
    fn unterminated_uniform_is_an_error() {
        let error = wrap_fragment("void main() {}\nuniform float u_tail")
            .err()
            .expect("refused");
        assert!(error.contains("unterminated"), "{error}");
    }

    #[test]
    fn active_uniforms_follow_usage() {
        let source = r#"
            uniform float iTime;
            uniform vec4 iMouse;
            void main() {
                float iTimeDelta = 0.0;
                gl_FragColor = vec4(sin(iTime) + iTimeDelta);
            }
        "#;
        let wrapped = wrap_fragment(source).expect("wrap");
        assert_eq!(
            wrapped.active_uniforms,
            vec![UniformSlot::Resolution, UniformSlot::Time]
        );
    }

    #[test]
    fn resolution_is_active_for_the_coordinate_flip() {
        let source = r#"
            uniform vec3 iResolution;
            uniform float iTime;
            uniform vec4 iMouse;
            uniform sampler2D iChannel0;
            void main() {
                gl_FragColor = vec4(gl_FragCoord.y * 0.001, sin(iTime), 0.0, 1.0);
            }
        "#;
        let stage = prepare_stage(StageKind::Fragment, source).expect("valid shader");
        assert!(stage.is_active(UniformSlot::Resolution));
        assert!(!stage.is_active(UniformSlot::Mouse));
        assert!(!stage.is_active(UniformSlot::Channel0));
    }

    #[test]
    fn strips_declarations_sharing_a_line_with_code() {
        let source = "uniform float iTime; void main() { gl_FragColor = vec4(iTime); }";
        let wrapped = wrap_fragment(source).expect("wrap");
        assert!(!user_body(&wrapped.glsl).contains("uniform"));
        assert!(wrapped.glsl.contains(" void backdrop_main()"));
        prepare_stage(StageKind::Fragment, source).expect("valid shader");
    }

    #[test]
    fn detects_entry_styles() {
        assert_eq!(detect_style(WEBGL_SOURCE), Some(FragmentStyle::Main));
        assert_eq!(
            detect_style("void mainImage(out vec4 c, in vec2 p) { c = vec4(1.0); }"),
            Some(FragmentStyle::MainImage)
        );
        assert_eq!(detect_style("float helper() { return 1.0; }"), None);
    }

    #[test]
    fn number_literals_are_not_identifiers() {
        assert_eq!(identifiers("x = 1e5 + y2;"), vec!["x", "y2"]);
    }

    #[test]
    fn strips_block_and_line_comments() {
        let stripped = strip_comments("a /* b\n c */ d // e\nf");
        assert_eq!(identifiers(&stripped), vec!["a", "d", "f"]);
        assert_eq!(stripped.lines().count(), 3);
    }

    #[test]
    fn validates_webgl_fragment() {
        let stage = prepare_stage(StageKind::Fragment, WEBGL_SOURCE).expect("valid shader");
        assert_eq!(stage.active_uniforms, UniformSlot::ALL.to_vec());
    }

    #[test]
    fn validates_main_image_fragment() {
        let source = r#"
            void mainImage(out vec4 fragColor, in vec2 fragCoord) {
                vec2 uv = fragCoord / iResolution.xy;
                fragColor = vec4(uv, 0.5 + 0.5 * sin(iTime), 1.0);
            }
        "#;
        let stage = prepare_stage(StageKind::Fragment, source).expect("valid shader");
        assert!(stage.is_active(UniformSlot::Time));
        assert!(!stage.is_active(UniformSlot::Mouse));
    }

    #[test]
    fn validates_fixed_vertex_stage() {
        prepare_stage(StageKind::Vertex, VERTEX_SHADER_GLSL).expect("vertex stage");
    }

    #[test]
    fn syntax_error_reports_log() {
        let source = "void main() { gl_FragColor = vec4(1.0 }";
        let log = prepare_stage(StageKind::Fragment, source).unwrap_err();
        assert!(!log.trim().is_empty());
    }
}
