//! The static shapes scene
//!
//! A box on a grid flanked by five rows of pillars: a cylinder with a sphere
//! on top on either side of the grid. All four shapes share one vertex and
//! index buffer.

use crate::foundation::math::{Mat4, Mat4Ext};
use crate::render::backend::GraphicsDevice;
use crate::render::error::FrameResult;
use crate::render::frame_resources::FrameResources;
use crate::render::scene::mesh::{GeometryLayout, MeshHandle};

/// Submesh name of the box
pub const BOX: &str = "box";
/// Submesh name of the ground grid
pub const GRID: &str = "grid";
/// Submesh name of the sphere
pub const SPHERE: &str = "sphere";
/// Submesh name of the cylinder
pub const CYLINDER: &str = "cylinder";

/// Bytes per vertex: position (3 x f32) and colour (4 x f32)
pub const SHAPES_VERTEX_STRIDE: u32 = 28;

/// Pillar rows along the z axis
pub const PILLAR_ROWS: usize = 5;

/// Render items in the scene
pub const SHAPES_ITEM_COUNT: usize = 2 + PILLAR_ROWS * 4;

/// Vertex and index counts of the generated shapes
///
/// | shape    | generator parameters            | vertices | indices |
/// |----------|---------------------------------|----------|---------|
/// | box      | 1.5 x 0.5 x 1.5                 | 24       | 36      |
/// | grid     | 20 x 30, 60 x 40 vertices       | 2400     | 13806   |
/// | sphere   | radius 0.5, 20 slices/stacks    | 401      | 2280    |
/// | cylinder | 0.5 to 0.3, height 3, 20 x 20   | 485      | 2520    |
pub fn shapes_geometry_layout() -> FrameResult<GeometryLayout> {
    GeometryLayout::new()
        .with_submesh(BOX, 24, 36)?
        .with_submesh(GRID, 2400, 13_806)?
        .with_submesh(SPHERE, 401, 2280)?
        .with_submesh(CYLINDER, 485, 2520)
}

/// One item of the scene before registration
#[derive(Debug, Clone, PartialEq)]
pub struct ShapePlacement {
    /// Submesh drawn
    pub submesh: &'static str,
    /// Object to world
    pub world: Mat4,
}

/// Items in submission order
///
/// Box, grid, then per row: left cylinder, right cylinder, left sphere,
/// right sphere.
pub fn shape_placements() -> Vec<ShapePlacement> {
    let mut placements = Vec::with_capacity(SHAPES_ITEM_COUNT);
    placements.push(ShapePlacement {
        submesh: BOX,
        world: Mat4::translation(0.0, 0.5, 0.0) * Mat4::scaling(2.0, 2.0, 2.0),
    });
    placements.push(ShapePlacement {
        submesh: GRID,
        world: Mat4::identity(),
    });

    for row in 0..PILLAR_ROWS {
        let z = -10.0 + row as f32 * 5.0;
        placements.extend([
            ShapePlacement { submesh: CYLINDER, world: Mat4::translation(-5.0, 1.5, z) },
            ShapePlacement { submesh: CYLINDER, world: Mat4::translation(5.0, 1.5, z) },
            ShapePlacement { submesh: SPHERE, world: Mat4::translation(-5.0, 3.5, z) },
            ShapePlacement { submesh: SPHERE, world: Mat4::translation(5.0, 3.5, z) },
        ]);
    }
    placements
}

/// Register every placement against `mesh`, returning the item count
pub fn build_shapes_scene<D: GraphicsDevice>(
    resources: &mut FrameResources<D>,
    mesh: MeshHandle,
) -> FrameResult<usize> {
    let placements = shape_placements();
    for placement in &placements {
        resources.add_render_item(mesh, placement.submesh, placement.world)?;
    }
    log::debug!("Built shapes scene with {} render items", placements.len());
    Ok(placements.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec4;
    use approx::assert_relative_eq;

    #[test]
    fn test_layout_offsets() {
        let layout = shapes_geometry_layout().expect("layout");
        let cylinder = layout.submesh(CYLINDER).expect("cylinder");

        assert_eq!(layout.vertex_count(), 3310);
        assert_eq!(layout.index_count(), 18_642);
        assert_eq!(cylinder.start_index, 36 + 13_806 + 2280);
        assert_eq!(cylinder.base_vertex, 24 + 2400 + 401);
    }

    #[test]
    fn test_placements() {
        let placements = shape_placements();
        assert_eq!(placements.len(), 22);
        assert_eq!(placements[0].submesh, BOX);
        assert_eq!(placements[1].submesh, GRID);
        assert_eq!(placements[1].world, Mat4::identity());

        let order: Vec<&str> = placements[2..6].iter().map(|p| p.submesh).collect();
        assert_eq!(order, vec![CYLINDER, CYLINDER, SPHERE, SPHERE]);

        // Last row right sphere
        let origin = placements[21].world * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(origin, Vec4::new(5.0, 3.5, 10.0, 1.0));
    }

    #[test]
    fn test_box_sits_on_the_grid() {
        let world = shape_placements()[0].world;
        let bottom = world * Vec4::new(0.0, -0.25, 0.0, 1.0);
        assert_relative_eq!(bottom.y, 0.0, epsilon = 1e-6);
    }
}
