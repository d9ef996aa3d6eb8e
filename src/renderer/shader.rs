use glam::{Mat4, Vec3};

use crate::renderer::gl;

/// A compiled and linked shader program.
///
/// Uniform setters look the name up on every call and silently skip uniforms
/// the program does not have. Meshes may bind fewer textures than the shader
/// declares samplers for, and drivers remove unused uniforms at link time,
/// so a missing location is normal rather than a bug.
pub struct ShaderProgram {
    program: gl::types::GLuint,
}

impl ShaderProgram {
    pub fn new(vertex_source: &str, fragment_source: &str) -> ShaderProgram {
        let vertex_shader = gl::create_shader(gl::VERTEX_SHADER, vertex_source);
        let fragment_shader = gl::create_shader(gl::FRAGMENT_SHADER, fragment_source);
        let program = gl::create_program(&[vertex_shader, fragment_shader]);
        gl::call!(gl::DeleteShader(vertex_shader));
        gl::call!(gl::DeleteShader(fragment_shader));
        ShaderProgram { program }
    }

    pub fn bind(&self) {
        gl::call!(gl::UseProgram(self.program));
    }

    pub fn set_int(&self, name: &str, value: i32) {
        if let Some(location) = gl::get_uniform_location(self.program, name) {
            gl::call!(gl::Uniform1i(location, value));
        }
    }

    pub fn set_float(&self, name: &str, value: f32) {
        if let Some(location) = gl::get_uniform_location(self.program, name) {
            gl::call!(gl::Uniform1f(location, value));
        }
    }

    pub fn set_vec3(&self, name: &str, value: Vec3) {
        if let Some(location) = gl::get_uniform_location(self.program, name) {
            gl::call!(gl::Uniform3f(location, value.x, value.y, value.z));
        }
    }

    pub fn set_mat4(&self, name: &str, value: &Mat4) {
        if let Some(location) = gl::get_uniform_location(self.program, name) {
            let columns = value.to_cols_array();
            gl::call!(gl::UniformMatrix4fv(
                location,
                1,
                gl::FALSE,
                columns.as_ptr()
            ));
        }
    }
}

impl Drop for ShaderProgram {
    fn drop(&mut self) {
        gl::call!(gl::DeleteProgram(self.program));
    }
}
