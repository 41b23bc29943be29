use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use image::{Rgba, RgbaImage};
use tempfile::TempDir;

const SHADER: &str = r#"
precision mediump float;
uniform vec3 iResolution;
uniform float iTime;
uniform vec4 iMouse;
uniform sampler2D iChannel0;

void main() {
    vec2 uv = gl_FragCoord.xy / iResolution.xy;
    float glow = 0.02 / max(distance(gl_FragCoord.xy, iMouse.xy), 1.0);
    gl_FragColor = texture2D(iChannel0, uv) + vec4(glow * (0.5 + 0.5 * sin(iTime)));
}
"#;

fn backdrop(config_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_backdrop"))
        .args(args)
        .env("BACKDROP_CONFIG_DIR", config_dir)
        .env_remove("BACKDROP_FALLBACK_EMAIL")
        .env("RUST_LOG", "warn")
        .output()
        .expect("spawn backdrop")
}

#[test]
fn check_reports_uniforms_of_the_last_frame() {
    let dir = TempDir::new().unwrap();
    let shader = dir.path().join("bg.frag");
    fs::write(&shader, SHADER).unwrap();

    let output = backdrop(
        dir.path(),
        &[
            "check",
            "--shader",
            shader.to_str().unwrap(),
            "--size",
            "320x200",
            "--frames",
            "4",
            "--pointer",
            "40,60",
        ],
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout.contains("frames drawn: 4"), "{stdout}");
    assert!(stdout.contains("iResolution = (320, 200, 1)"), "{stdout}");
    assert!(stdout.contains("iMouse = (40, 140, 0, 0)"), "{stdout}");
    assert!(stdout.contains("iChannel0 = placeholder"), "{stdout}");
}

#[test]
fn check_uses_scene_file_and_image() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("bg.frag"), SHADER).unwrap();
    RgbaImage::from_pixel(8, 4, Rgba([10, 20, 30, 255]))
        .save(dir.path().join("hero.png"))
        .unwrap();
    let scene = dir.path().join("scene.toml");
    fs::write(
        &scene,
        r#"
version = 1
[shader]
fragment = "bg.frag"
[image]
path = "hero.png"
[window]
width = 64
height = 48
[reveal]
threshold = 0.4
"#,
    )
    .unwrap();

    let output = backdrop(dir.path(), &["check", "--scene", scene.to_str().unwrap()]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout.contains("iResolution = (64, 48, 1)"), "{stdout}");
    assert!(stdout.contains("iChannel0 = 8x4 image"), "{stdout}");
    assert!(stdout.contains("reveal threshold: 0.4"), "{stdout}");
}

#[test]
fn check_marks_unused_uniforms_inactive() {
    let dir = TempDir::new().unwrap();
    let shader = dir.path().join("plain.frag");
    fs::write(
        &shader,
        "void mainImage(out vec4 fragColor, in vec2 fragCoord) {\n    fragColor = vec4(fragCoord / iResolution.xy, 0.0, 1.0);\n}\n",
    )
    .unwrap();

    let output = backdrop(dir.path(), &["check", "--shader", shader.to_str().unwrap()]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout.contains("(MainImage)"), "{stdout}");
    assert!(stdout.contains("(inactive)"), "{stdout}");
    assert!(stdout.contains("frames drawn: 3"), "{stdout}");
}

#[test]
fn check_fails_on_broken_shader() {
    let dir = TempDir::new().unwrap();
    let shader = dir.path().join("broken.frag");
    fs::write(&shader, "void main() { gl_FragColor = vec4(1.0 }").unwrap();

    let output = backdrop(dir.path(), &["check", "--shader", shader.to_str().unwrap()]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to build"), "{stderr}");
}

#[test]
fn check_without_shader_or_scene_fails() {
    let dir = TempDir::new().unwrap();
    let output = backdrop(dir.path(), &["check"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("no shader given"));
}

#[test]
fn submit_reports_network_error_when_endpoint_is_unreachable() {
    let dir = TempDir::new().unwrap();
    let output = backdrop(
        dir.path(),
        &[
            "submit",
            "--action",
            "http://127.0.0.1:9/contact",
            "--field",
            "name=Ada",
            "--fallback-email",
            "hello@example.org",
        ],
    );
    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Sending…"), "{stdout}");
    assert!(
        stdout.contains("Network error — please email hello@example.org"),
        "{stdout}"
    );
}
