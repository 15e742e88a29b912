/// Draw lists handed to the passes every frame.
///
/// Entries are plain integer handles into arenas owned by the scene side
/// (mesh table, material table, world matrix buffer). Passes read the lists
/// while recording and never mutate them.

/// Index of a mesh in the scene's mesh table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshHandle(pub u32);

/// Index of a material in the scene's material table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialHandle(pub u32);

/// Slot of a world matrix in a `WorldMatrixBuffer`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransformHandle(pub u32);

/// Partition of the draw lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaterialClass {
    Opaque,
    /// Opaque with alpha test (drawn after plain opaque geometry)
    AlphaMasked,
    /// Blended, back to front; submission order is preserved
    Transparent,
    Ui,
}

impl MaterialClass {
    pub const ALL: [MaterialClass; 4] = [
        MaterialClass::Opaque,
        MaterialClass::AlphaMasked,
        MaterialClass::Transparent,
        MaterialClass::Ui,
    ];

    fn index(self) -> usize {
        match self {
            MaterialClass::Opaque => 0,
            MaterialClass::AlphaMasked => 1,
            MaterialClass::Transparent => 2,
            MaterialClass::Ui => 3,
        }
    }
}

/// One draw: a mesh rendered with a material at a world transform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawItem {
    pub mesh: MeshHandle,
    pub material: MaterialHandle,
    pub transform: TransformHandle,
    pub instance_count: u32,
}

impl DrawItem {
    pub fn new(mesh: MeshHandle, material: MaterialHandle, transform: TransformHandle) -> Self {
        Self { mesh, material, transform, instance_count: 1 }
    }
}

/// Per-frame draw lists, as produced by the scene side
pub trait SceneDrawLists: Send + Sync {
    fn draw_list(&self, class: MaterialClass) -> &[DrawItem];

    /// Number of draws over every class
    fn draw_count(&self) -> usize {
        MaterialClass::ALL.iter().map(|&class| self.draw_list(class).len()).sum()
    }

    fn is_empty(&self) -> bool {
        self.draw_count() == 0
    }
}

/// Plain `Vec`-backed draw lists
#[derive(Debug, Clone, Default)]
pub struct FrameDrawLists {
    lists: [Vec<DrawItem>; 4],
}

impl FrameDrawLists {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, class: MaterialClass, item: DrawItem) {
        self.lists[class.index()].push(item);
    }

    /// Empty every list, keeping the allocations for the next frame
    pub fn clear(&mut self) {
        for list in &mut self.lists {
            list.clear();
        }
    }

    /// Sort every class except `Transparent` by (material, mesh)
    pub fn sort_by_material(&mut self) {
        for class in MaterialClass::ALL {
            if class == MaterialClass::Transparent {
                continue;
            }
            self.lists[class.index()].sort_by_key(|item| (item.material, item.mesh));
        }
    }
}

impl SceneDrawLists for FrameDrawLists {
    fn draw_list(&self, class: MaterialClass) -> &[DrawItem] {
        &self.lists[class.index()]
    }
}

#[cfg(test)]
#[path = "draw_list_tests.rs"]
mod tests;
