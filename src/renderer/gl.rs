//! OpenGL ES 3.0 bindings (generated by build.rs) plus the small helpers the
//! renderer leans on everywhere.

#![allow(clippy::missing_safety_doc)]

use std::ffi::{c_void, CString};

include!(concat!(env!("OUT_DIR"), "/bindings.rs"));

/// Wraps a raw GL call in `unsafe` and, in debug builds, panics on any error
/// the driver reported for it.
macro_rules! call {
    ($expr:expr) => {{
        let result = unsafe { $expr };
        if cfg!(debug_assertions) {
            let error = unsafe { crate::renderer::gl::GetError() };
            if error != crate::renderer::gl::NO_ERROR {
                let error_number_stringified;
                let error_name = match error {
                    crate::renderer::gl::INVALID_ENUM => "INVALID_ENUM",
                    crate::renderer::gl::INVALID_VALUE => "INVALID_VALUE",
                    crate::renderer::gl::INVALID_OPERATION => "INVALID_OPERATION",
                    crate::renderer::gl::OUT_OF_MEMORY => "OUT_OF_MEMORY",
                    crate::renderer::gl::INVALID_FRAMEBUFFER_OPERATION => {
                        "INVALID_FRAMEBUFFER_OPERATION"
                    }
                    _ => {
                        error_number_stringified = format!("{error}");
                        &error_number_stringified
                    }
                };
                panic!(
                    "OpenGL error {error_name} at {}:{}:{}",
                    file!(),
                    line!(),
                    column!(),
                );
            }
        }
        result
    }};
}
pub(crate) use call;

/// Uploads `bytes` to the buffer currently bound to `target`.
pub fn buffer_data(target: types::GLenum, bytes: &[u8], usage: types::GLenum) {
    call!(BufferData(
        target,
        bytes.len() as isize,
        bytes.as_ptr() as *const c_void,
        usage,
    ));
}

/// Compiles a shader of the given kind, panicking with the driver's info log
/// if compilation fails.
pub fn create_shader(kind: types::GLenum, source: &str) -> types::GLuint {
    let shader = call!(CreateShader(kind));
    let sources = [source.as_bytes().as_ptr().cast()];
    let source_lens = [source.len() as i32];
    call!(ShaderSource(
        shader,
        1,
        sources.as_ptr(),
        source_lens.as_ptr()
    ));
    call!(CompileShader(shader));
    let mut compile_status = 0;
    call!(GetShaderiv(shader, COMPILE_STATUS, &mut compile_status));
    if compile_status == FALSE as i32 {
        let mut info_log = [0u8; 4096];
        let mut length = 0;
        call!(GetShaderInfoLog(
            shader,
            info_log.len() as i32,
            &mut length,
            info_log.as_mut_ptr().cast(),
        ));
        let info_log = std::str::from_utf8(&info_log[..length as usize]).unwrap();
        panic!("compiling shader failed: {info_log}");
    }
    shader
}

/// Links the given shaders into a program, panicking with the driver's info
/// log if linking fails.
pub fn create_program(shaders: &[types::GLuint]) -> types::GLuint {
    let program = call!(CreateProgram());
    for &shader in shaders {
        call!(AttachShader(program, shader));
    }
    call!(LinkProgram(program));
    let mut link_status = 0;
    call!(GetProgramiv(program, LINK_STATUS, &mut link_status));
    if link_status == FALSE as i32 {
        let mut info_log = [0u8; 4096];
        let mut length = 0;
        call!(GetProgramInfoLog(
            program,
            info_log.len() as i32,
            &mut length,
            info_log.as_mut_ptr().cast(),
        ));
        let info_log = std::str::from_utf8(&info_log[..length as usize]).unwrap();
        panic!("linking shader program failed: {info_log}");
    }
    program
}

/// Returns the location of a uniform, or None if the program does not have
/// it (or the linker removed it).
pub fn get_uniform_location(program: types::GLuint, name: &str) -> Option<types::GLint> {
    let name = CString::new(name).unwrap();
    let location = call!(GetUniformLocation(program, name.as_ptr()));
    (location != -1).then_some(location)
}
