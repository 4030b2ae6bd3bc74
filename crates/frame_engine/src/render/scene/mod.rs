//! Scene-side state: render items, their object constants and shared geometry

pub mod mesh;
pub mod object_data;
pub mod object_table;
pub mod render_item;
pub mod shapes;

pub use mesh::{GeometryLayout, MeshGeometry, MeshHandle, SubmeshGeometry};
pub use object_data::ObjectConstants;
pub use object_table::ObjectTable;
pub use render_item::{DirtyState, RenderItem};
