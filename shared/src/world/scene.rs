use crate::world::entity::SyncEntities;

/// Handle to an object owned by the scene provider
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

/// The scene / object graph the replicated entities live on.
///
/// Paths are absolute and slash-delimited, starting with the name of a root
/// object, e.g. `"Level/Players/Player 3kq9x0"`.
pub trait SceneProvider {
    /// Every root object, by current name
    fn root_objects(&self) -> Vec<(String, ObjectId)>;

    /// Resolves a slash-delimited path relative to `root`
    fn find(&self, root: ObjectId, relative_path: &str) -> Option<ObjectId>;

    /// Instantiates `prefab`, optionally under `parent`. The prefab's sync
    /// entities must be spawned into `entities` on the new object.
    fn instantiate(
        &mut self,
        prefab: &str,
        parent: Option<ObjectId>,
        entities: &mut SyncEntities,
    ) -> Option<ObjectId>;

    fn name(&self, object: ObjectId) -> Option<String>;

    fn set_name(&mut self, object: ObjectId, name: &str);

    /// Absolute path of the object, root name first
    fn path_of(&self, object: ObjectId) -> Option<String>;

    /// Destroys the object and its descendants, returning every destroyed object
    fn destroy(&mut self, object: ObjectId) -> Vec<ObjectId>;
}

/// Strips the display-identity suffix appended on ownership grant:
/// `"Player 3kq9x0"` becomes `"Player"`. Names without a suffix are returned whole.
pub fn strip_display_suffix(name: &str) -> &str {
    match name.rfind(' ') {
        Some(index) => &name[..index],
        None => name,
    }
}

/// A hierarchical path split into the pieces needed to resolve or rebuild it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenePath<'p> {
    pub full: &'p str,
    /// First segment, `None` when the object itself is a root
    pub root_name: Option<&'p str>,
    /// Path from the root to the object's parent, `None` when the parent is the root
    pub parent_relative: Option<&'p str>,
    /// Path from the root to the object, `None` when the object is a root
    pub object_relative: Option<&'p str>,
    /// Last segment, including any display suffix
    pub object_name: &'p str,
}

impl<'p> ScenePath<'p> {
    pub fn parse(path: &'p str) -> Option<Self> {
        if path.is_empty() {
            return None;
        }
        let Some(first_slash) = path.find('/') else {
            return Some(Self {
                full: path,
                root_name: None,
                parent_relative: None,
                object_relative: None,
                object_name: path,
            });
        };
        let last_slash = path.rfind('/').unwrap_or(first_slash);
        let parent_relative = if first_slash == last_slash {
            None
        } else {
            Some(&path[first_slash + 1..last_slash])
        };
        Some(Self {
            full: path,
            root_name: Some(&path[..first_slash]),
            parent_relative,
            object_relative: Some(&path[first_slash + 1..]),
            object_name: &path[last_slash + 1..],
        })
    }

    /// The object name without its display suffix, used to find objects that
    /// existed in the scene before they were first owned
    pub fn find_name(&self) -> &'p str {
        strip_display_suffix(self.object_name)
    }

    /// `object_relative` with the last segment's display suffix stripped
    pub fn object_relative_unsuffixed(&self) -> Option<String> {
        let relative = self.object_relative?;
        let unsuffixed = match self.parent_relative {
            Some(parent) => format!("{}/{}", parent, self.find_name()),
            None => self.find_name().to_string(),
        };
        (unsuffixed != relative).then_some(unsuffixed)
    }
}
