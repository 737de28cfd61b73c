use glam::Vec3;

use super::{
    accumulate_spring_forces, integrate_nodes, DeformableNode, DeformableSurface, FloorResponse,
    NodeStep, Spring,
};
use crate::config::ClothConfig;

/// Diagonal springs are softer than grid edges.
const SHEAR_SCALE: f32 = 0.75;

/// Cloth sheet: a `width × height` grid of nodes joined by structural and
/// shear springs.
#[derive(Debug, Clone)]
pub struct DeformableBody {
    width: usize,
    height: usize,
    spacing: f32,
    config: ClothConfig,
    nodes: Vec<DeformableNode>,
    springs: Vec<Spring>,
    indices: Vec<u32>,
}

impl DeformableBody {
    pub fn new(width: usize, height: usize, spacing: f32) -> Self {
        Self::with_config(width, height, spacing, ClothConfig::default())
    }

    /// Grid of at least 2×2 nodes, laid out along +X (columns) and +Z (rows).
    pub fn with_config(width: usize, height: usize, spacing: f32, config: ClothConfig) -> Self {
        let width = width.max(2);
        let height = height.max(2);
        let nodes = grid_nodes(width, height, spacing, config.origin);
        let springs = grid_springs(&nodes, width, height);
        let indices = grid_indices(width, height);

        Self {
            width,
            height,
            spacing,
            config,
            nodes,
            springs,
            indices,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn config(&self) -> &ClothConfig {
        &self.config
    }

    pub fn node_index(&self, column: usize, row: usize) -> Option<usize> {
        (column < self.width && row < self.height).then_some(row * self.width + column)
    }

    pub fn node(&self, column: usize, row: usize) -> Option<&DeformableNode> {
        self.node_index(column, row).map(|index| &self.nodes[index])
    }

    pub fn pin_node(&mut self, index: usize) {
        if let Some(node) = self.nodes.get_mut(index) {
            node.pinned = true;
            node.velocity = Vec3::ZERO;
        }
    }

    pub fn unpin_node(&mut self, index: usize) {
        if let Some(node) = self.nodes.get_mut(index) {
            node.pinned = false;
        }
    }

    /// Pins every node of one grid row.
    pub fn pin_row(&mut self, row: usize) {
        for column in 0..self.width {
            if let Some(index) = self.node_index(column, row) {
                self.pin_node(index);
            }
        }
    }

    /// Restores the initial flat grid, keeping pins.
    pub fn reset(&mut self) {
        let fresh = grid_nodes(self.width, self.height, self.spacing, self.config.origin);
        for (node, initial) in self.nodes.iter_mut().zip(fresh) {
            node.position = initial.position;
            node.velocity = Vec3::ZERO;
        }
    }

    pub fn simulate(&mut self, dt: f32, gravity: Vec3) {
        if !dt.is_finite() || dt <= 0.0 {
            return;
        }

        let step = NodeStep {
            gravity,
            node_mass: self.config.node_mass,
            damping: self.config.damping,
            dt: dt.min(self.config.max_dt),
            floor_y: self.config.floor_y,
            floor: FloorResponse::Inelastic,
        };
        let forces = accumulate_spring_forces(&self.nodes, &self.springs, self.config.stiffness);
        integrate_nodes(&mut self.nodes, &forces, &step);
    }
}

impl DeformableSurface for DeformableBody {
    fn nodes(&self) -> &[DeformableNode] {
        &self.nodes
    }

    fn springs(&self) -> &[Spring] {
        &self.springs
    }

    fn indices(&self) -> &[u32] {
        &self.indices
    }

    fn simulate(&mut self, dt: f32, gravity: Vec3) {
        DeformableBody::simulate(self, dt, gravity);
    }
}

fn grid_nodes(width: usize, height: usize, spacing: f32, origin: Vec3) -> Vec<DeformableNode> {
    let mut nodes = Vec::with_capacity(width * height);
    for row in 0..height {
        for column in 0..width {
            let offset = Vec3::new(column as f32 * spacing, 0.0, row as f32 * spacing);
            nodes.push(DeformableNode::new(origin + offset));
        }
    }
    nodes
}

fn grid_springs(nodes: &[DeformableNode], width: usize, height: usize) -> Vec<Spring> {
    let index = |column: usize, row: usize| row * width + column;
    let mut springs = Vec::new();

    for row in 0..height {
        for column in 0..width {
            let here = index(column, row);
            if column + 1 < width {
                springs.push(Spring::between(nodes, here, index(column + 1, row), 1.0));
            }
            if row + 1 < height {
                springs.push(Spring::between(nodes, here, index(column, row + 1), 1.0));
            }
            if column + 1 < width && row + 1 < height {
                springs.push(Spring::between(
                    nodes,
                    here,
                    index(column + 1, row + 1),
                    SHEAR_SCALE,
                ));
                springs.push(Spring::between(
                    nodes,
                    index(column + 1, row),
                    index(column, row + 1),
                    SHEAR_SCALE,
                ));
            }
        }
    }
    springs
}

/// Two triangles per cell, facing +Y while the sheet is flat.
fn grid_indices(width: usize, height: usize) -> Vec<u32> {
    let mut indices = Vec::with_capacity((width - 1) * (height - 1) * 6);
    for row in 0..height - 1 {
        for column in 0..width - 1 {
            let a = (row * width + column) as u32;
            let b = a + 1;
            let c = a + width as u32;
            let d = c + 1;
            indices.extend_from_slice(&[a, c, b, b, c, d]);
        }
    }
    indices
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_topology_counts() {
        let cloth = DeformableBody::new(4, 3, 0.5);
        assert_eq!(cloth.nodes().len(), 12);
        // 3×3 + 4×2 structural, 2 shear per 3×2 cells.
        assert_eq!(cloth.springs().len(), 9 + 8 + 12);
        assert_eq!(cloth.indices().len(), 3 * 2 * 6);
        assert_eq!(cloth.node_index(3, 2), Some(11));
        assert_eq!(cloth.node_index(4, 0), None);
    }

    #[test]
    fn flat_sheet_normals_point_up() {
        let cloth = DeformableBody::new(3, 3, 1.0);
        for normal in cloth.normals() {
            assert!((normal - Vec3::Y).length() < 1e-5);
        }
    }

    #[test]
    fn pinned_row_holds_while_rest_falls() {
        let mut cloth = DeformableBody::new(5, 5, 0.2);
        cloth.pin_row(0);
        let pinned_before = cloth.node(2, 0).unwrap().position;
        let free_before = cloth.node(2, 4).unwrap().position;

        for _ in 0..10 {
            cloth.simulate(1.0 / 60.0, Vec3::new(0.0, -9.81, 0.0));
        }

        assert_eq!(cloth.node(2, 0).unwrap().position, pinned_before);
        assert!(cloth.node(2, 4).unwrap().position.y < free_before.y);
    }

    #[test]
    fn floor_stops_nodes_dead() {
        let config = ClothConfig {
            origin: Vec3::new(0.0, 0.01, 0.0),
            ..ClothConfig::default()
        };
        let mut cloth = DeformableBody::with_config(3, 3, 0.5, config);
        for _ in 0..30 {
            cloth.simulate(1.0 / 30.0, Vec3::new(0.0, -9.81, 0.0));
        }
        for node in cloth.nodes() {
            assert!(node.position.y >= 0.0);
            assert_eq!(node.velocity.y, 0.0);
        }
    }

    #[test]
    fn reset_restores_layout() {
        let mut cloth = DeformableBody::new(3, 3, 0.5);
        let initial = cloth.vertices();
        cloth.simulate(0.1, Vec3::new(0.0, -9.81, 0.0));
        assert_ne!(cloth.vertices(), initial);
        cloth.reset();
        assert_eq!(cloth.vertices(), initial);
    }
}
