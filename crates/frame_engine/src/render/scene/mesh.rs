//! Shared geometry buffers and named submesh ranges
//!
//! Every shape lives in one vertex/index buffer pair. A submesh is just the
//! slice of the index buffer it occupies plus the vertex offset its indices
//! are relative to.

use std::collections::HashMap;

use crate::render::backend::IndexFormat;
use crate::render::error::{FrameResourceError, FrameResult};

/// Handle to a registered [`MeshGeometry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshHandle(pub(crate) usize);

impl MeshHandle {
    /// Registration index
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Draw arguments for one submesh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmeshGeometry {
    /// Indices in the submesh
    pub index_count: u32,
    /// First index in the shared index buffer
    pub start_index: u32,
    /// Offset added to every index of the submesh
    pub base_vertex: i32,
}

/// Concatenation plan for submeshes sharing one buffer pair
#[derive(Debug, Clone, Default)]
pub struct GeometryLayout {
    submeshes: Vec<(String, SubmeshGeometry)>,
    vertex_count: u32,
    index_count: u32,
}

impl GeometryLayout {
    /// Empty layout
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a submesh of `vertex_count` vertices and `index_count` indices
    pub fn with_submesh(mut self, name: impl Into<String>, vertex_count: u32, index_count: u32) -> FrameResult<Self> {
        let name = name.into();
        let overflow = || FrameResourceError::GeometryOverflow(name.clone());
        let base_vertex = i32::try_from(self.vertex_count).map_err(|_| overflow())?;

        let submesh = SubmeshGeometry {
            index_count,
            start_index: self.index_count,
            base_vertex,
        };
        self.vertex_count = self.vertex_count.checked_add(vertex_count).ok_or_else(overflow)?;
        self.index_count = self.index_count.checked_add(index_count).ok_or_else(overflow)?;
        self.submeshes.push((name, submesh));
        Ok(self)
    }

    /// Vertices across all submeshes
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// Indices across all submeshes
    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Look up a submesh by name
    pub fn submesh(&self, name: &str) -> Option<SubmeshGeometry> {
        self.submeshes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, s)| *s)
    }

    /// Submeshes in concatenation order
    pub fn submeshes(&self) -> impl Iterator<Item = (&str, SubmeshGeometry)> {
        self.submeshes.iter().map(|(n, s)| (n.as_str(), *s))
    }
}

/// A vertex/index buffer pair with its named submeshes
#[derive(Debug, Clone)]
pub struct MeshGeometry<B> {
    name: String,
    vertex_buffer: B,
    index_buffer: B,
    vertex_stride: u32,
    index_format: IndexFormat,
    submeshes: HashMap<String, SubmeshGeometry>,
}

impl<B: Copy> MeshGeometry<B> {
    /// Bind a layout to the buffers holding its data
    pub fn new(
        name: impl Into<String>,
        layout: &GeometryLayout,
        vertex_buffer: B,
        index_buffer: B,
        vertex_stride: u32,
        index_format: IndexFormat,
    ) -> Self {
        Self {
            name: name.into(),
            vertex_buffer,
            index_buffer,
            vertex_stride,
            index_format,
            submeshes: layout.submeshes().map(|(n, s)| (n.to_string(), s)).collect(),
        }
    }

    /// Geometry name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shared vertex buffer
    pub fn vertex_buffer(&self) -> B {
        self.vertex_buffer
    }

    /// Shared index buffer
    pub fn index_buffer(&self) -> B {
        self.index_buffer
    }

    /// Bytes per vertex
    pub fn vertex_stride(&self) -> u32 {
        self.vertex_stride
    }

    /// Index width
    pub fn index_format(&self) -> IndexFormat {
        self.index_format
    }

    /// Draw arguments of a named submesh
    pub fn submesh(&self, name: &str) -> FrameResult<SubmeshGeometry> {
        self.submeshes
            .get(name)
            .copied()
            .ok_or_else(|| FrameResourceError::UnknownSubmesh(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submeshes_are_concatenated() {
        let layout = GeometryLayout::new()
            .with_submesh("box", 24, 36).expect("box")
            .with_submesh("grid", 2400, 13_806).expect("grid")
            .with_submesh("sphere", 401, 2280).expect("sphere");

        assert_eq!(layout.vertex_count(), 2825);
        assert_eq!(layout.index_count(), 16_122);
        assert_eq!(
            layout.submesh("grid"),
            Some(SubmeshGeometry { index_count: 13_806, start_index: 36, base_vertex: 24 })
        );
        assert_eq!(
            layout.submesh("sphere"),
            Some(SubmeshGeometry { index_count: 2280, start_index: 13_842, base_vertex: 2424 })
        );
        assert_eq!(layout.submesh("cone"), None);
    }

    #[test]
    fn test_layout_overflow_is_reported() {
        let result = GeometryLayout::new()
            .with_submesh("a", u32::MAX, 3)
            .and_then(|layout| layout.with_submesh("b", 1, 3));
        assert!(matches!(result, Err(FrameResourceError::GeometryOverflow(name)) if name == "b"));
    }

    #[test]
    fn test_geometry_lookup() {
        let layout = GeometryLayout::new().with_submesh("box", 24, 36).expect("box");
        let geometry = MeshGeometry::new("shapes", &layout, 1u32, 2u32, 28, IndexFormat::U16);

        assert_eq!(geometry.submesh("box").expect("box").index_count, 36);
        assert!(matches!(
            geometry.submesh("torus"),
            Err(FrameResourceError::UnknownSubmesh(name)) if name == "torus"
        ));
        assert_eq!(geometry.index_buffer(), 2);
    }
}
