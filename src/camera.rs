use glam::{Mat4, Vec3};
use sdl2::keyboard::{KeyboardState, Scancode};

const MOVE_SPEED: f32 = 2.5;
const LOOK_SPEED_DEGREES: f32 = 60.0;

/// First-person fly camera driven by per-frame keyboard polling: WASD moves,
/// arrow keys look around.
pub struct Camera {
    pub position: Vec3,
    /// Degrees; -90 looks down -Z.
    yaw: f32,
    /// Degrees, clamped short of straight up/down.
    pitch: f32,
}

impl Camera {
    pub fn new(position: Vec3) -> Camera {
        Camera {
            position,
            yaw: -90.0,
            pitch: 0.0,
        }
    }

    fn front(&self) -> Vec3 {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        Vec3::new(
            yaw.cos() * pitch.cos(),
            pitch.sin(),
            yaw.sin() * pitch.cos(),
        )
        .normalize()
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.front(), Vec3::Y)
    }

    /// Applies one frame of movement from the currently held keys.
    pub fn update(&mut self, keys: &KeyboardState, delta_time: f32) {
        let front = self.front();
        let right = front.cross(Vec3::Y).normalize();
        let distance = MOVE_SPEED * delta_time;
        if keys.is_scancode_pressed(Scancode::W) {
            self.position += front * distance;
        }
        if keys.is_scancode_pressed(Scancode::S) {
            self.position -= front * distance;
        }
        if keys.is_scancode_pressed(Scancode::A) {
            self.position -= right * distance;
        }
        if keys.is_scancode_pressed(Scancode::D) {
            self.position += right * distance;
        }
        let turn = LOOK_SPEED_DEGREES * delta_time;
        if keys.is_scancode_pressed(Scancode::Left) {
            self.yaw -= turn;
        }
        if keys.is_scancode_pressed(Scancode::Right) {
            self.yaw += turn;
        }
        if keys.is_scancode_pressed(Scancode::Up) {
            self.pitch = (self.pitch + turn).min(89.0);
        }
        if keys.is_scancode_pressed(Scancode::Down) {
            self.pitch = (self.pitch - turn).max(-89.0);
        }
    }
}
