//! Everything that talks to OpenGL: shader programs, the cube field, the
//! imported model and the skybox, drawn once per frame from [`Renderer::render`].

use std::ffi::c_void;
use std::path::Path;

use anyhow::Context;
use glam::{Mat4, Vec3};
use sdl2::video::Window;
use sdl2::VideoSubsystem;

mod gl;
pub mod model;
mod shader;
mod skybox;
mod texture;

use crate::camera::Camera;
use model::Model;
use shader::ShaderProgram;
use skybox::Skybox;

const CUBE_VERTEX_SHADER: &str = r#"#version 300 es
layout(location = 0) in vec3 POSITION;
layout(location = 1) in vec2 TEXCOORD_0;
out vec2 tex_coords;
uniform mat4 model;
uniform mat4 view;
uniform mat4 projection;
void main() {
    tex_coords = TEXCOORD_0;
    gl_Position = projection * view * model * vec4(POSITION, 1.0);
}
"#;
const CUBE_FRAGMENT_SHADER: &str = r#"#version 300 es
precision mediump float;
out vec4 FRAG_COLOR;
in vec2 tex_coords;
uniform sampler2D texture1;
uniform sampler2D texture2;
uniform float blend;
void main() {
    vec4 color = mix(texture(texture1, tex_coords), texture(texture2, tex_coords), blend);
    // The framebuffer is not SRGB; convert the linear color in shader.
    FRAG_COLOR = vec4(pow(color.rgb, vec3(1.0 / 2.2)), color.a);
}
"#;

const MODEL_VERTEX_SHADER: &str = r#"#version 300 es
layout(location = 0) in vec3 POSITION;
layout(location = 1) in vec3 NORMAL;
layout(location = 2) in vec2 TEXCOORD_0;
out vec3 world_pos;
out vec3 normal;
out vec2 tex_coords;
uniform mat4 model;
uniform mat4 view;
uniform mat4 projection;
void main() {
    world_pos = vec3(model * vec4(POSITION, 1.0));
    normal = mat3(model) * NORMAL;
    tex_coords = TEXCOORD_0;
    gl_Position = projection * view * vec4(world_pos, 1.0);
}
"#;
const MODEL_FRAGMENT_SHADER: &str = r#"#version 300 es
precision mediump float;
struct Material {
    sampler2D texture_diffuse1;
    sampler2D texture_specular1;
};
out vec4 FRAG_COLOR;
in vec3 world_pos;
in vec3 normal;
in vec2 tex_coords;
uniform Material material;
uniform vec3 view_pos;
void main() {
    vec3 n = normalize(normal);
    vec3 light_dir = normalize(vec3(0.4, 1.0, 0.6));
    float diffuse = max(dot(n, light_dir), 0.0) * 0.7 + 0.3;
    vec4 base = texture(material.texture_diffuse1, tex_coords);
    vec3 view_dir = normalize(view_pos - world_pos);
    vec3 reflect_dir = reflect(-light_dir, n);
    float specular = pow(max(dot(view_dir, reflect_dir), 0.0), 32.0)
        * texture(material.texture_specular1, tex_coords).r;
    vec3 color = base.rgb * diffuse + vec3(specular);
    FRAG_COLOR = vec4(pow(color, vec3(1.0 / 2.2)), base.a);
}
"#;

/// 36 vertices of a unit cube, interleaved position (3) + UV (2).
#[rustfmt::skip]
const CUBE_VERTICES: [f32; 180] = [
    -0.5, -0.5, -0.5,  0.0, 0.0,    0.5, -0.5, -0.5,  1.0, 0.0,    0.5,  0.5, -0.5,  1.0, 1.0,
     0.5,  0.5, -0.5,  1.0, 1.0,   -0.5,  0.5, -0.5,  0.0, 1.0,   -0.5, -0.5, -0.5,  0.0, 0.0,

    -0.5, -0.5,  0.5,  0.0, 0.0,    0.5, -0.5,  0.5,  1.0, 0.0,    0.5,  0.5,  0.5,  1.0, 1.0,
     0.5,  0.5,  0.5,  1.0, 1.0,   -0.5,  0.5,  0.5,  0.0, 1.0,   -0.5, -0.5,  0.5,  0.0, 0.0,

    -0.5,  0.5,  0.5,  1.0, 0.0,   -0.5,  0.5, -0.5,  1.0, 1.0,   -0.5, -0.5, -0.5,  0.0, 1.0,
    -0.5, -0.5, -0.5,  0.0, 1.0,   -0.5, -0.5,  0.5,  0.0, 0.0,   -0.5,  0.5,  0.5,  1.0, 0.0,

     0.5,  0.5,  0.5,  1.0, 0.0,    0.5,  0.5, -0.5,  1.0, 1.0,    0.5, -0.5, -0.5,  0.0, 1.0,
     0.5, -0.5, -0.5,  0.0, 1.0,    0.5, -0.5,  0.5,  0.0, 0.0,    0.5,  0.5,  0.5,  1.0, 0.0,

    -0.5, -0.5, -0.5,  0.0, 1.0,    0.5, -0.5, -0.5,  1.0, 1.0,    0.5, -0.5,  0.5,  1.0, 0.0,
     0.5, -0.5,  0.5,  1.0, 0.0,   -0.5, -0.5,  0.5,  0.0, 0.0,   -0.5, -0.5, -0.5,  0.0, 1.0,

    -0.5,  0.5, -0.5,  0.0, 1.0,    0.5,  0.5, -0.5,  1.0, 1.0,    0.5,  0.5,  0.5,  1.0, 0.0,
     0.5,  0.5,  0.5,  1.0, 0.0,   -0.5,  0.5,  0.5,  0.0, 0.0,   -0.5,  0.5, -0.5,  0.0, 1.0,
];

const CUBE_POSITIONS: [Vec3; 10] = [
    Vec3::new(0.0, 0.0, 0.0),
    Vec3::new(2.0, 5.0, -15.0),
    Vec3::new(-1.5, -2.2, -2.5),
    Vec3::new(-3.8, -2.0, -12.3),
    Vec3::new(2.4, -0.4, -3.5),
    Vec3::new(-1.7, 3.0, -7.5),
    Vec3::new(1.3, -2.0, -2.5),
    Vec3::new(1.5, 2.0, -2.5),
    Vec3::new(1.5, 0.2, -1.5),
    Vec3::new(-1.3, 1.0, -1.5),
];

const MODEL_PATH: &str = "assets/models/crate/crate.gltf";

pub struct Renderer {
    cube_program: ShaderProgram,
    model_program: ShaderProgram,
    cube_vao: gl::types::GLuint,
    cube_vbo: gl::types::GLuint,
    cube_textures: [gl::types::GLuint; 2],
    model: Model,
    skybox: Skybox,
}

impl Renderer {
    /// Loads the GL function pointers and every GPU resource the scene
    /// needs. Runs once, before the render loop; blocks until done.
    pub fn new(video: &VideoSubsystem, window: &Window) -> anyhow::Result<Renderer> {
        gl::load_with(|s| video.gl_get_proc_address(s) as *const c_void);
        video
            .gl_set_swap_interval(1)
            .map_err(|err| anyhow::anyhow!("could not enable vsync: {err}"))?;
        let (w, h) = window.drawable_size();
        gl::call!(gl::Viewport(0, 0, w as i32, h as i32));
        gl::call!(gl::Enable(gl::DEPTH_TEST));

        let cube_program = ShaderProgram::new(CUBE_VERTEX_SHADER, CUBE_FRAGMENT_SHADER);
        let model_program = ShaderProgram::new(MODEL_VERTEX_SHADER, MODEL_FRAGMENT_SHADER);

        let mut cube_vao = 0;
        let mut cube_vbo = 0;
        gl::call!(gl::GenVertexArrays(1, &mut cube_vao));
        gl::call!(gl::GenBuffers(1, &mut cube_vbo));
        gl::call!(gl::BindVertexArray(cube_vao));
        gl::call!(gl::BindBuffer(gl::ARRAY_BUFFER, cube_vbo));
        gl::buffer_data(
            gl::ARRAY_BUFFER,
            bytemuck::cast_slice(&CUBE_VERTICES),
            gl::STATIC_DRAW,
        );
        let stride = 5 * std::mem::size_of::<f32>() as i32;
        gl::call!(gl::EnableVertexAttribArray(0));
        gl::call!(gl::VertexAttribPointer(
            0,
            3,
            gl::FLOAT,
            gl::FALSE,
            stride,
            std::ptr::null(),
        ));
        gl::call!(gl::EnableVertexAttribArray(1));
        gl::call!(gl::VertexAttribPointer(
            1,
            2,
            gl::FLOAT,
            gl::FALSE,
            stride,
            std::ptr::null::<c_void>().add(3 * std::mem::size_of::<f32>()),
        ));
        gl::call!(gl::BindVertexArray(0));

        let cube_textures = [
            load_scene_texture("assets/textures/container.png")?,
            load_scene_texture("assets/textures/awesomeface.png")?,
        ];
        // Tell the cube shader which texture unit each sampler uses.
        cube_program.bind();
        cube_program.set_int("texture1", 0);
        cube_program.set_int("texture2", 1);

        let model = Model::load(MODEL_PATH).context("could not load the crate model")?;
        log::info!(
            "{MODEL_PATH}: {} meshes, {} vertices, {} textures",
            model.mesh_count(),
            model.vertex_count(),
            model.texture_count(),
        );

        let skybox = Skybox::new([
            Path::new("assets/skybox/right.png"),
            Path::new("assets/skybox/left.png"),
            Path::new("assets/skybox/top.png"),
            Path::new("assets/skybox/bottom.png"),
            Path::new("assets/skybox/front.png"),
            Path::new("assets/skybox/back.png"),
        ])?;

        Ok(Renderer {
            cube_program,
            model_program,
            cube_vao,
            cube_vbo,
            cube_textures,
            model,
            skybox,
        })
    }

    pub fn resize(&mut self, width: i32, height: i32) {
        gl::call!(gl::Viewport(0, 0, width, height));
    }

    pub fn render(&mut self, camera: &Camera, aspect_ratio: f32, time: f32) {
        gl::call!(gl::ClearColor(0.2, 0.3, 0.3, 1.0));
        gl::call!(gl::Clear(gl::COLOR_BUFFER_BIT | gl::DEPTH_BUFFER_BIT));

        let view = camera.view_matrix();
        let projection = Mat4::perspective_rh_gl(105.0_f32.to_radians(), aspect_ratio, 0.1, 100.0);

        self.cube_program.bind();
        self.cube_program.set_mat4("view", &view);
        self.cube_program.set_mat4("projection", &projection);
        self.cube_program.set_float("blend", 0.2);
        gl::call!(gl::ActiveTexture(gl::TEXTURE0));
        gl::call!(gl::BindTexture(gl::TEXTURE_2D, self.cube_textures[0]));
        gl::call!(gl::ActiveTexture(gl::TEXTURE1));
        gl::call!(gl::BindTexture(gl::TEXTURE_2D, self.cube_textures[1]));
        gl::call!(gl::BindVertexArray(self.cube_vao));
        for (i, &position) in CUBE_POSITIONS.iter().enumerate() {
            let angle = (20.0 * i as f32).to_radians();
            let rotation =
                Mat4::from_axis_angle(Vec3::new(1.0, 0.3, 0.5).normalize(), time * angle + 1.0);
            self.cube_program
                .set_mat4("model", &(Mat4::from_translation(position) * rotation));
            gl::call!(gl::DrawArrays(gl::TRIANGLES, 0, 36));
        }
        gl::call!(gl::BindVertexArray(0));

        self.model_program.bind();
        self.model_program.set_mat4("view", &view);
        self.model_program.set_mat4("projection", &projection);
        self.model_program
            .set_mat4("model", &Mat4::from_translation(Vec3::new(0.0, -2.5, -4.0)));
        self.model_program.set_vec3("view_pos", camera.position);
        self.model.draw(&self.model_program);

        // Drawn last so its fragments only fill what the scene left open.
        self.skybox.draw(view, projection);
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        gl::call!(gl::DeleteVertexArrays(1, &self.cube_vao));
        gl::call!(gl::DeleteBuffers(1, &self.cube_vbo));
        gl::call!(gl::DeleteTextures(
            self.cube_textures.len() as i32,
            self.cube_textures.as_ptr(),
        ));
    }
}

fn load_scene_texture(path: &str) -> anyhow::Result<gl::types::GLuint> {
    texture::load_2d(Path::new(path)).with_context(|| format!("could not load texture {path}"))
}
