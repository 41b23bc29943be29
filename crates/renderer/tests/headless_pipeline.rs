use std::fs;
use std::sync::mpsc;
use std::time::Duration;

use image::{Rgba, RgbaImage};
use renderer::{
    AttachOutcome, FrameDriver, HeadlessContext, ImageHandle, Pipeline, RecordedCall, SceneState,
    SteppedTimeSource, SurfaceDimensions, TextureState, TickOutcome, UniformSlot, UniformValue,
};

const RIPPLE: &str = r#"
precision mediump float;

uniform vec3 iResolution;
uniform float iTime;
uniform vec4 iMouse;
uniform sampler2D iChannel0;

void main() {
    vec2 uv = gl_FragCoord.xy / iResolution.xy;
    vec2 toMouse = gl_FragCoord.xy - iMouse.xy;
    float ripple = sin(length(toMouse) * 0.05 - iTime * 4.0) * 0.004;
    gl_FragColor = texture2D(iChannel0, uv + normalize(toMouse + 0.0001) * ripple);
}
"#;

#[test]
fn shader_file_and_image_render_through_the_headless_backend() {
    let dir = tempfile::tempdir().unwrap();
    let shader_path = dir.path().join("background.frag");
    fs::write(&shader_path, RIPPLE).unwrap();
    let image_path = dir.path().join("hero.png");
    RgbaImage::from_pixel(16, 8, Rgba([200, 100, 50, 255]))
        .save(&image_path)
        .unwrap();

    let mut ctx = HeadlessContext::new();
    let source = fs::read_to_string(&shader_path).unwrap();
    let pipeline = Pipeline::build(&mut ctx, &source).expect("pipeline");
    let scene = SceneState::new(&mut ctx, &SurfaceDimensions::new(640, 360)).unwrap();
    let mut driver = FrameDriver::start(pipeline, scene, Box::new(SteppedTimeSource::sixty_hz()));

    let (tx, rx) = mpsc::channel();
    let image = ImageHandle::load_file(&image_path, move |loaded| {
        let _ = tx.send(loaded);
    })
    .unwrap();
    let attached = driver.attach_image(&mut ctx, &image).unwrap();

    assert_eq!(driver.tick(&mut ctx).unwrap(), TickOutcome::Rescheduled);

    let completed = rx.recv_timeout(Duration::from_secs(5)).expect("image decoded");
    let uploaded_now = driver.image_ready(&mut ctx, &completed).unwrap();
    assert_eq!(uploaded_now, attached == AttachOutcome::Deferred);
    assert_eq!(
        driver.scene().texture.state(),
        TextureState::Loaded {
            width: 16,
            height: 8
        }
    );

    driver.pointer_moved(40.0, 60.0);
    driver.resize(&SurfaceDimensions::new(320, 200));
    assert_eq!(driver.tick(&mut ctx).unwrap(), TickOutcome::Rescheduled);

    assert_eq!(ctx.draw_count(), 2);
    assert_eq!(ctx.upload_count(), 1);
    assert_eq!(ctx.current_viewport(), Some((320, 200)));
    assert_eq!(
        ctx.uniform_value(UniformSlot::Mouse),
        Some(UniformValue::Vec4([40.0, 140.0, 0.0, 0.0]))
    );
    let sample = driver.last_sample().unwrap();
    assert!(sample.time > 0.0);
    assert_eq!(sample.resolution, [320.0, 200.0, 1.0]);
    assert!(ctx
        .calls()
        .iter()
        .any(|call| matches!(call, RecordedCall::BindTexture { unit: 0, .. })));
}

#[test]
fn shadertoy_style_source_builds() {
    let mut ctx = HeadlessContext::new();
    let source = r#"
        void mainImage(out vec4 fragColor, in vec2 fragCoord) {
            vec2 uv = fragCoord / iResolution.xy;
            fragColor = vec4(uv, 0.5 + 0.5 * cos(iTime), 1.0);
        }
    "#;
    let pipeline = Pipeline::build(&mut ctx, source).expect("pipeline");
    assert!(pipeline.uniforms().mouse.is_none());
    assert!(pipeline.uniforms().texture.is_none());
    let scene = SceneState::new(&mut ctx, &SurfaceDimensions::new(64, 64)).unwrap();
    let mut driver = FrameDriver::start(pipeline, scene, Box::new(SteppedTimeSource::sixty_hz()));
    for _ in 0..3 {
        driver.tick(&mut ctx).unwrap();
    }
    assert_eq!(ctx.draw_count(), 3);
}
