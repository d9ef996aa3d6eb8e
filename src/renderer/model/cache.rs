//! Per-model texture cache: each texture file is decoded and uploaded at
//! most once per load, no matter how many materials reference it.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::renderer::gl;
use crate::renderer::texture;

use super::scene::Material;
use super::{TextureKind, TextureRef};

/// Owns the GPU texture handles of one [`super::Model`], keyed by the
/// relative path exactly as it appears in the asset. Mutated only while that
/// model loads; draws never touch it.
pub struct TextureCache {
    directory: PathBuf,
    loaded: HashMap<String, gl::types::GLuint>,
}

impl TextureCache {
    /// `directory` is the asset's base directory, derived once by the loader
    /// and used to resolve every relative texture path.
    pub fn new(directory: PathBuf) -> TextureCache {
        TextureCache {
            directory,
            loaded: HashMap::new(),
        }
    }

    /// Texture references a material defines for one kind, uploading any
    /// path not seen before. A cache hit does no file I/O and no GL calls.
    ///
    /// A path that fails to read or decode is logged and skipped; the mesh
    /// ends up with one fewer texture instead of failing the load.
    pub fn material_textures(&mut self, material: &Material, kind: TextureKind) -> Vec<TextureRef> {
        let mut refs = Vec::new();
        for relative_path in material.texture_paths(kind) {
            if let Some(&id) = self.loaded.get(relative_path) {
                refs.push(TextureRef { id, kind });
                continue;
            }
            let full_path = self.directory.join(relative_path);
            match texture::load_2d(&full_path) {
                Ok(id) => {
                    self.loaded.insert(relative_path.clone(), id);
                    refs.push(TextureRef { id, kind });
                }
                Err(err) => {
                    log::warn!("skipping texture {}: {err}", full_path.display());
                }
            }
        }
        refs
    }

    pub fn len(&self) -> usize {
        self.loaded.len()
    }
}

impl Drop for TextureCache {
    fn drop(&mut self) {
        for texture in self.loaded.values() {
            gl::call!(gl::DeleteTextures(1, texture));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem;

    fn material_with_diffuse(paths: &[&str]) -> Material {
        Material {
            diffuse_textures: paths.iter().map(|path| path.to_string()).collect(),
            specular_textures: Vec::new(),
        }
    }

    fn preloaded(entries: &[(&str, gl::types::GLuint)]) -> TextureCache {
        TextureCache {
            // Nothing under this path exists; hits must not try to read it.
            directory: PathBuf::from("/nonexistent/asset/dir"),
            loaded: entries
                .iter()
                .map(|(path, id)| (path.to_string(), *id))
                .collect(),
        }
    }

    #[test]
    fn hits_resolve_without_touching_the_filesystem() {
        let mut cache = preloaded(&[("shared.png", 7)]);
        let first = material_with_diffuse(&["shared.png"]);
        let second = material_with_diffuse(&["shared.png"]);
        let first_refs = cache.material_textures(&first, TextureKind::Diffuse);
        let second_refs = cache.material_textures(&second, TextureKind::Diffuse);
        assert_eq!(
            first_refs,
            vec![TextureRef {
                id: 7,
                kind: TextureKind::Diffuse,
            }]
        );
        // Both materials share the one upload.
        assert_eq!(first_refs, second_refs);
        assert_eq!(cache.len(), 1);
        // There is no GL context in tests to delete the fake handle with.
        mem::forget(cache);
    }

    #[test]
    fn missing_textures_are_skipped() {
        let mut cache = TextureCache::new(PathBuf::from("/nonexistent/asset/dir"));
        let material = material_with_diffuse(&["missing.png"]);
        let refs = cache.material_textures(&material, TextureKind::Diffuse);
        assert!(refs.is_empty());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn corrupt_images_are_skipped() {
        let dir = std::env::temp_dir().join(format!("crate-scene-cache-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("bad.png"), b"not an image").unwrap();
        let mut cache = TextureCache::new(dir.clone());
        let material = material_with_diffuse(&["bad.png"]);
        let refs = cache.material_textures(&material, TextureKind::Diffuse);
        assert!(refs.is_empty());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn one_bad_path_does_not_lose_the_good_ones() {
        let mut cache = preloaded(&[("ok.png", 3)]);
        let material = material_with_diffuse(&["ok.png", "missing.png"]);
        let refs = cache.material_textures(&material, TextureKind::Diffuse);
        assert_eq!(
            refs,
            vec![TextureRef {
                id: 3,
                kind: TextureKind::Diffuse,
            }]
        );
        mem::forget(cache);
    }

    #[test]
    fn refs_carry_the_requested_kind() {
        let mut cache = preloaded(&[("spec.png", 9)]);
        let material = Material {
            diffuse_textures: Vec::new(),
            specular_textures: vec!["spec.png".to_string()],
        };
        let refs = cache.material_textures(&material, TextureKind::Specular);
        assert_eq!(refs[0].kind, TextureKind::Specular);
        mem::forget(cache);
    }
}
