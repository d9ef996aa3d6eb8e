use std::error::Error;
use std::fmt::Display;
use std::time::Instant;

use glam::Vec3;
use sdl2::event::{Event, WindowEvent};
use sdl2::keyboard::Keycode;
use sdl2::video::GLProfile;

mod camera;
mod renderer;

use camera::Camera;
use renderer::Renderer;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let sdl_context = sdl2::init().map_err(SdlErr)?;
    let video_subsystem = sdl_context.video().map_err(SdlErr)?;
    let gl_attr = video_subsystem.gl_attr();
    gl_attr.set_context_profile(GLProfile::GLES);
    gl_attr.set_context_version(3, 0);
    // Linear->SRGB conversion is done in the shaders.
    gl_attr.set_framebuffer_srgb_compatible(false);
    let window = video_subsystem
        .window(env!("CARGO_PKG_NAME"), 800, 600)
        .resizable()
        .opengl()
        .build()?;
    let _gl_context = window.gl_create_context().map_err(SdlErr)?;
    let mut event_pump = sdl_context.event_pump().map_err(SdlErr)?;

    let mut renderer = Renderer::new(&video_subsystem, &window)?;
    let mut camera = Camera::new(Vec3::new(0.0, 0.0, 3.0));
    let start = Instant::now();
    let mut last_frame = start;

    'running: loop {
        for event in event_pump.poll_iter() {
            match event {
                Event::Quit { .. } => break 'running,
                Event::KeyDown {
                    keycode: Some(Keycode::Escape),
                    ..
                } => break 'running,
                Event::Window {
                    win_event: WindowEvent::Resized(width, height),
                    ..
                } => renderer.resize(width, height),
                _ => {}
            }
        }

        let now = Instant::now();
        let delta_time = (now - last_frame).as_secs_f32();
        last_frame = now;
        camera.update(&event_pump.keyboard_state(), delta_time);

        let (width, height) = window.drawable_size();
        renderer.render(
            &camera,
            width as f32 / height as f32,
            start.elapsed().as_secs_f32(),
        );
        window.gl_swap_window();
    }

    Ok(())
}

#[derive(Debug)]
pub struct SdlErr(String);
impl Display for SdlErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sdl error: {}", self.0)
    }
}
impl Error for SdlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        None
    }
}
