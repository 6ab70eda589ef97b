use std::cell::RefCell;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

use tracing::debug;

use super::device::GraphicsDevice;
use super::error::TextureError;
use super::Texture;

/// Registry of named textures sharing one graphics device.
///
/// The manager owns every registered texture until [`take`](Self::take)
/// hands it out. Entries removed by [`unload`](Self::unload), replaced by
/// [`insert`](Self::insert), or still present when the manager is dropped are
/// deleted on the GPU.
///
/// The `must_*` methods are thin wrappers that panic instead of returning an
/// error; use them only where the texture is mandatory (startup assets).
pub struct TextureManager<D: GraphicsDevice> {
    device: Rc<RefCell<D>>,
    textures: HashMap<String, Texture<D>>,
}

impl<D: GraphicsDevice> TextureManager<D> {
    pub fn new(device: Rc<RefCell<D>>) -> Self {
        Self {
            device,
            textures: HashMap::new(),
        }
    }

    pub fn device(&self) -> &Rc<RefCell<D>> {
        &self.device
    }

    /// Returns the texture registered under `name`, creating an empty one if
    /// needed. The flag is `true` when the entry already existed.
    pub fn get(&mut self, name: &str) -> (&mut Texture<D>, bool) {
        match self.textures.entry(name.to_owned()) {
            Entry::Occupied(entry) => (entry.into_mut(), true),
            Entry::Vacant(entry) => {
                let texture = Texture::new(Rc::clone(&self.device));
                (entry.insert(texture), false)
            }
        }
    }

    /// Looks up an existing texture without creating one.
    pub fn find(&mut self, name: &str) -> Result<&mut Texture<D>, TextureError> {
        self.textures
            .get_mut(name)
            .ok_or_else(|| TextureError::NotFound(name.to_owned()))
    }

    /// # Panics
    ///
    /// Panics when no texture is registered under `name`.
    pub fn must_get(&mut self, name: &str) -> &mut Texture<D> {
        self.find(name).unwrap_or_else(|err| panic!("{err}"))
    }

    pub fn has(&self, name: &str) -> bool {
        self.textures.contains_key(name)
    }

    /// Registers `name` from the image at `path` unless it is already present.
    ///
    /// An existing entry is returned untouched; use [`reload`](Self::reload)
    /// to force a re-read. On failure nothing is registered under `name`.
    pub fn load(
        &mut self,
        name: &str,
        path: impl AsRef<Path>,
    ) -> Result<&mut Texture<D>, TextureError> {
        match self.textures.entry(name.to_owned()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let path = path.as_ref();
                debug!(name, path = %path.display(), "loading texture");
                let texture = Texture::from_file(Rc::clone(&self.device), path)?;
                Ok(entry.insert(texture))
            }
        }
    }

    /// # Panics
    ///
    /// Panics when the texture cannot be loaded.
    pub fn must_load(&mut self, name: &str, path: impl AsRef<Path>) -> &mut Texture<D> {
        let path = path.as_ref();
        match self.load(name, path) {
            Ok(texture) => texture,
            Err(err) => panic!(
                "could not load texture \"{name}\" from {}: {err}",
                path.display()
            ),
        }
    }

    /// Re-reads `path` into `name`, creating the entry if needed.
    ///
    /// Errors leave the entry registered with its previous content.
    pub fn reload(
        &mut self,
        name: &str,
        path: impl AsRef<Path>,
    ) -> Result<&mut Texture<D>, TextureError> {
        let path = path.as_ref();
        debug!(name, path = %path.display(), "reloading texture");
        let (texture, _) = self.get(name);
        texture.set_image_from_file(path)?;
        Ok(texture)
    }

    /// Registers an owned texture, deleting whatever `name` held before.
    ///
    /// Returns `true` when an existing entry was replaced.
    pub fn insert(&mut self, name: &str, texture: Texture<D>) -> bool {
        match self.textures.insert(name.to_owned(), texture) {
            Some(mut previous) => {
                debug!(name, "replacing texture");
                previous.delete();
                true
            }
            None => false,
        }
    }

    /// Removes `name` and hands ownership to the caller without deleting it.
    pub fn take(&mut self, name: &str) -> Option<Texture<D>> {
        self.textures.remove(name)
    }

    pub fn try_take(&mut self, name: &str) -> Result<Texture<D>, TextureError> {
        self.take(name)
            .ok_or_else(|| TextureError::NotFound(name.to_owned()))
    }

    /// # Panics
    ///
    /// Panics when no texture is registered under `name`.
    pub fn must_take(&mut self, name: &str) -> Texture<D> {
        self.try_take(name).unwrap_or_else(|err| panic!("{err}"))
    }

    /// Removes and deletes `name`. Unknown names are ignored.
    pub fn unload(&mut self, name: &str) {
        debug!(name, "unloading texture");
        if let Some(mut texture) = self.textures.remove(name) {
            texture.delete();
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.textures.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }
}

impl<D: GraphicsDevice> Drop for TextureManager<D> {
    fn drop(&mut self) {
        if !self.textures.is_empty() {
            debug!(remaining = self.textures.len(), "releasing registered textures");
        }
        for (_, mut texture) in self.textures.drain() {
            texture.delete();
        }
    }
}
