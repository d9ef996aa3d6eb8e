//! 2-D texture decode and upload, shared by the model pipeline and the
//! renderer's own textures.

use std::ffi::c_void;
use std::path::Path;

use crate::renderer::gl;

/// Decodes an image file to RGBA8, flipped vertically: image rows are stored
/// top-down while GL samples textures bottom-up.
pub fn decode(path: &Path) -> Result<image::RgbaImage, image::ImageError> {
    Ok(image::open(path)?.flipv().to_rgba8())
}

/// Uploads an RGBA8 image as a 2-D texture with mipmaps, repeat wrapping and
/// trilinear filtering, and returns the new handle.
pub fn upload_2d(image: &image::RgbaImage) -> gl::types::GLuint {
    let mut texture = 0;
    gl::call!(gl::GenTextures(1, &mut texture));
    gl::call!(gl::BindTexture(gl::TEXTURE_2D, texture));
    gl::call!(gl::TexImage2D(
        gl::TEXTURE_2D,
        0,
        gl::RGBA8 as i32,
        image.width() as i32,
        image.height() as i32,
        0,
        gl::RGBA,
        gl::UNSIGNED_BYTE,
        image.as_raw().as_ptr() as *const c_void,
    ));
    gl::call!(gl::GenerateMipmap(gl::TEXTURE_2D));
    gl::call!(gl::TexParameteri(
        gl::TEXTURE_2D,
        gl::TEXTURE_WRAP_S,
        gl::REPEAT as i32
    ));
    gl::call!(gl::TexParameteri(
        gl::TEXTURE_2D,
        gl::TEXTURE_WRAP_T,
        gl::REPEAT as i32
    ));
    gl::call!(gl::TexParameteri(
        gl::TEXTURE_2D,
        gl::TEXTURE_MIN_FILTER,
        gl::LINEAR_MIPMAP_LINEAR as i32
    ));
    gl::call!(gl::TexParameteri(
        gl::TEXTURE_2D,
        gl::TEXTURE_MAG_FILTER,
        gl::LINEAR as i32
    ));
    texture
}

/// Decode-and-upload in one step for textures that bypass the model cache.
pub fn load_2d(path: &Path) -> Result<gl::types::GLuint, image::ImageError> {
    Ok(upload_2d(&decode(path)?))
}
