//! Scene collaborator interface
//!
//! The render core never walks a scene graph. It consumes per-frame draw
//! lists partitioned by material class, where every entry references
//! meshes, materials and world transforms by integer handle.

pub mod draw_list;
pub mod world_matrix_buffer;

pub use draw_list::{
    DrawItem, FrameDrawLists, MaterialClass, MaterialHandle, MeshHandle, SceneDrawLists,
    TransformHandle,
};
pub use world_matrix_buffer::WorldMatrixBuffer;
