use std::ffi::c_void;
use std::path::Path;

use anyhow::Context;
use glam::{Mat3, Mat4};

use crate::renderer::gl;
use crate::renderer::shader::ShaderProgram;

const VERTEX_SHADER: &str = r#"#version 300 es
layout(location = 0) in vec3 POSITION;
out vec3 tex_coords;
uniform mat4 view;
uniform mat4 projection;
void main() {
    tex_coords = POSITION;
    vec4 position = projection * view * vec4(POSITION, 1.0);
    // w/w depth == 1.0, so the box sits behind everything else.
    gl_Position = position.xyww;
}
"#;
const FRAGMENT_SHADER: &str = r#"#version 300 es
precision mediump float;
out vec4 FRAG_COLOR;
in vec3 tex_coords;
uniform samplerCube skybox;
void main() {
    vec4 color = texture(skybox, tex_coords);
    // The framebuffer is not SRGB; convert in shader like the other passes.
    FRAG_COLOR = vec4(pow(color.rgb, vec3(1.0 / 2.2)), color.a);
}
"#;

/// Unit cube, 36 vertices, wound to be visible from the inside.
#[rustfmt::skip]
const SKYBOX_VERTICES: [f32; 108] = [
    -1.0,  1.0, -1.0,   -1.0, -1.0, -1.0,    1.0, -1.0, -1.0,
     1.0, -1.0, -1.0,    1.0,  1.0, -1.0,   -1.0,  1.0, -1.0,

    -1.0, -1.0,  1.0,   -1.0, -1.0, -1.0,   -1.0,  1.0, -1.0,
    -1.0,  1.0, -1.0,   -1.0,  1.0,  1.0,   -1.0, -1.0,  1.0,

     1.0, -1.0, -1.0,    1.0, -1.0,  1.0,    1.0,  1.0,  1.0,
     1.0,  1.0,  1.0,    1.0,  1.0, -1.0,    1.0, -1.0, -1.0,

    -1.0, -1.0,  1.0,   -1.0,  1.0,  1.0,    1.0,  1.0,  1.0,
     1.0,  1.0,  1.0,    1.0, -1.0,  1.0,   -1.0, -1.0,  1.0,

    -1.0,  1.0, -1.0,    1.0,  1.0, -1.0,    1.0,  1.0,  1.0,
     1.0,  1.0,  1.0,   -1.0,  1.0,  1.0,   -1.0,  1.0, -1.0,

    -1.0, -1.0, -1.0,   -1.0, -1.0,  1.0,    1.0, -1.0, -1.0,
     1.0, -1.0, -1.0,   -1.0, -1.0,  1.0,    1.0, -1.0,  1.0,
];

/// A cubemap sky drawn after the rest of the scene.
pub struct Skybox {
    program: ShaderProgram,
    vao: gl::types::GLuint,
    vbo: gl::types::GLuint,
    texture: gl::types::GLuint,
}

impl Skybox {
    /// Builds the cubemap from six face images, ordered +X, -X, +Y, -Y,
    /// +Z, -Z (right, left, top, bottom, front, back).
    pub fn new(face_paths: [&Path; 6]) -> anyhow::Result<Skybox> {
        let mut texture = 0;
        gl::call!(gl::GenTextures(1, &mut texture));
        gl::call!(gl::BindTexture(gl::TEXTURE_CUBE_MAP, texture));
        for (face, path) in face_paths.iter().enumerate() {
            let image = image::open(path)
                .with_context(|| format!("could not load skybox face {}", path.display()))?
                .to_rgba8();
            gl::call!(gl::TexImage2D(
                gl::TEXTURE_CUBE_MAP_POSITIVE_X + face as u32,
                0,
                gl::RGBA8 as i32,
                image.width() as i32,
                image.height() as i32,
                0,
                gl::RGBA,
                gl::UNSIGNED_BYTE,
                image.as_raw().as_ptr() as *const c_void,
            ));
        }
        gl::call!(gl::TexParameteri(
            gl::TEXTURE_CUBE_MAP,
            gl::TEXTURE_MIN_FILTER,
            gl::LINEAR as i32
        ));
        gl::call!(gl::TexParameteri(
            gl::TEXTURE_CUBE_MAP,
            gl::TEXTURE_MAG_FILTER,
            gl::LINEAR as i32
        ));
        gl::call!(gl::TexParameteri(
            gl::TEXTURE_CUBE_MAP,
            gl::TEXTURE_WRAP_S,
            gl::CLAMP_TO_EDGE as i32
        ));
        gl::call!(gl::TexParameteri(
            gl::TEXTURE_CUBE_MAP,
            gl::TEXTURE_WRAP_T,
            gl::CLAMP_TO_EDGE as i32
        ));
        gl::call!(gl::TexParameteri(
            gl::TEXTURE_CUBE_MAP,
            gl::TEXTURE_WRAP_R,
            gl::CLAMP_TO_EDGE as i32
        ));

        let mut vao = 0;
        let mut vbo = 0;
        gl::call!(gl::GenVertexArrays(1, &mut vao));
        gl::call!(gl::GenBuffers(1, &mut vbo));
        gl::call!(gl::BindVertexArray(vao));
        gl::call!(gl::BindBuffer(gl::ARRAY_BUFFER, vbo));
        gl::buffer_data(
            gl::ARRAY_BUFFER,
            bytemuck::cast_slice(&SKYBOX_VERTICES),
            gl::STATIC_DRAW,
        );
        gl::call!(gl::EnableVertexAttribArray(0));
        gl::call!(gl::VertexAttribPointer(
            0,
            3,
            gl::FLOAT,
            gl::FALSE,
            0,
            std::ptr::null(),
        ));
        gl::call!(gl::BindVertexArray(0));

        let program = ShaderProgram::new(VERTEX_SHADER, FRAGMENT_SHADER);
        program.bind();
        program.set_int("skybox", 0);

        Ok(Skybox {
            program,
            vao,
            vbo,
            texture,
        })
    }

    pub fn draw(&self, view: Mat4, projection: Mat4) {
        gl::call!(gl::DepthFunc(gl::LEQUAL));
        self.program.bind();
        // Strip the translation so the box follows the camera.
        let view = Mat4::from_mat3(Mat3::from_mat4(view));
        self.program.set_mat4("view", &view);
        self.program.set_mat4("projection", &projection);
        gl::call!(gl::BindVertexArray(self.vao));
        gl::call!(gl::ActiveTexture(gl::TEXTURE0));
        gl::call!(gl::BindTexture(gl::TEXTURE_CUBE_MAP, self.texture));
        gl::call!(gl::DrawArrays(gl::TRIANGLES, 0, 36));
        gl::call!(gl::BindVertexArray(0));
        gl::call!(gl::DepthFunc(gl::LESS));
    }
}

impl Drop for Skybox {
    fn drop(&mut self) {
        gl::call!(gl::DeleteVertexArrays(1, &self.vao));
        gl::call!(gl::DeleteBuffers(1, &self.vbo));
        gl::call!(gl::DeleteTextures(1, &self.texture));
    }
}
