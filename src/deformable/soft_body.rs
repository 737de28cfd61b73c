use glam::Vec3;

use super::{
    accumulate_spring_forces, integrate_nodes, DeformableNode, DeformableSurface, FloorResponse,
    NodeStep, Spring,
};
use crate::config::SoftBodyConfig;

/// Stiffness multipliers for face, edge and corner neighbours.
const NEIGHBOUR_SCALES: [f32; 3] = [1.0, 0.8, 0.7];

/// Soft volume: an `nx × ny × nz` lattice where every node is tied to its 26
/// nearest neighbours.
#[derive(Debug, Clone)]
pub struct SoftBodyVolume {
    dims: [usize; 3],
    spacing: f32,
    config: SoftBodyConfig,
    nodes: Vec<DeformableNode>,
    springs: Vec<Spring>,
    indices: Vec<u32>,
}

impl SoftBodyVolume {
    pub fn new(nx: usize, ny: usize, nz: usize, spacing: f32) -> Self {
        Self::with_config(nx, ny, nz, spacing, SoftBodyConfig::default())
    }

    /// Each dimension is raised to at least two nodes.
    pub fn with_config(
        nx: usize,
        ny: usize,
        nz: usize,
        spacing: f32,
        config: SoftBodyConfig,
    ) -> Self {
        let dims = [nx.max(2), ny.max(2), nz.max(2)];
        let nodes = lattice_nodes(dims, spacing, config.origin);
        let springs = lattice_springs(&nodes, dims);
        let indices = surface_indices(dims);

        Self {
            dims,
            spacing,
            config,
            nodes,
            springs,
            indices,
        }
    }

    pub fn dimensions(&self) -> [usize; 3] {
        self.dims
    }

    pub fn config(&self) -> &SoftBodyConfig {
        &self.config
    }

    pub fn node_index(&self, i: usize, j: usize, k: usize) -> Option<usize> {
        let [nx, ny, nz] = self.dims;
        (i < nx && j < ny && k < nz).then(|| lattice_index(self.dims, [i, j, k]))
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

    pub fn center_of_mass(&self) -> Vec3 {
        let sum: Vec3 = self.nodes.iter().map(|node| node.position).sum();
        sum / self.nodes.len() as f32
    }

    /// Adds `velocity` to every free node.
    pub fn apply_impulse(&mut self, velocity: Vec3) {
        for node in self.nodes.iter_mut().filter(|node| !node.pinned) {
            node.velocity += velocity;
        }
    }

    pub fn reset(&mut self) {
        let fresh = lattice_nodes(self.dims, self.spacing, self.config.origin);
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
            floor: FloorResponse::Bounce(self.config.floor_restitution),
        };
        let forces = accumulate_spring_forces(&self.nodes, &self.springs, self.config.stiffness);
        integrate_nodes(&mut self.nodes, &forces, &step);
    }
}

impl DeformableSurface for SoftBodyVolume {
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
        SoftBodyVolume::simulate(self, dt, gravity);
    }
}

fn lattice_index(dims: [usize; 3], [i, j, k]: [usize; 3]) -> usize {
    (k * dims[1] + j) * dims[0] + i
}

fn lattice_nodes(dims: [usize; 3], spacing: f32, origin: Vec3) -> Vec<DeformableNode> {
    let mut nodes = Vec::with_capacity(dims.iter().product());
    for k in 0..dims[2] {
        for j in 0..dims[1] {
            for i in 0..dims[0] {
                let offset = Vec3::new(i as f32, j as f32, k as f32) * spacing;
                nodes.push(DeformableNode::new(origin + offset));
            }
        }
    }
    nodes
}

/// Lexicographically positive offsets, so each neighbour pair appears once.
fn forward_offsets() -> impl Iterator<Item = [isize; 3]> {
    (-1..=1isize)
        .flat_map(|dz| (-1..=1isize).flat_map(move |dy| (-1..=1isize).map(move |dx| [dx, dy, dz])))
        .filter(|&[dx, dy, dz]| (dz, dy, dx) > (0, 0, 0))
}

fn lattice_springs(nodes: &[DeformableNode], dims: [usize; 3]) -> Vec<Spring> {
    let mut springs = Vec::new();
    for k in 0..dims[2] {
        for j in 0..dims[1] {
            for i in 0..dims[0] {
                let here = lattice_index(dims, [i, j, k]);
                for offset in forward_offsets() {
                    let Some(there) = neighbour(dims, [i, j, k], offset) else {
                        continue;
                    };
                    let axes = offset.iter().filter(|&&d| d != 0).count();
                    springs.push(Spring::between(
                        nodes,
                        here,
                        there,
                        NEIGHBOUR_SCALES[axes - 1],
                    ));
                }
            }
        }
    }
    springs
}

fn neighbour(dims: [usize; 3], cell: [usize; 3], offset: [isize; 3]) -> Option<usize> {
    let mut target = [0usize; 3];
    for axis in 0..3 {
        let coord = cell[axis].checked_add_signed(offset[axis])?;
        if coord >= dims[axis] {
            return None;
        }
        target[axis] = coord;
    }
    Some(lattice_index(dims, target))
}

/// Triangles over the six outer faces, counter-clockwise seen from outside.
fn surface_indices(dims: [usize; 3]) -> Vec<u32> {
    // (fixed axis, at max side, u axis, v axis) with u × v pointing outward.
    const FACES: [(usize, bool, usize, usize); 6] = [
        (0, true, 1, 2),
        (0, false, 2, 1),
        (1, true, 2, 0),
        (1, false, 0, 2),
        (2, true, 0, 1),
        (2, false, 1, 0),
    ];

    let mut indices = Vec::new();
    for (fixed, at_max, u_axis, v_axis) in FACES {
        let fixed_coord = if at_max { dims[fixed] - 1 } else { 0 };
        for u in 0..dims[u_axis] - 1 {
            for v in 0..dims[v_axis] - 1 {
                let corner = |du: usize, dv: usize| {
                    let mut coord = [0usize; 3];
                    coord[fixed] = fixed_coord;
                    coord[u_axis] = u + du;
                    coord[v_axis] = v + dv;
                    lattice_index(dims, coord) as u32
                };
                let (p00, p10, p01, p11) = (corner(0, 0), corner(1, 0), corner(0, 1), corner(1, 1));
                indices.extend_from_slice(&[p00, p10, p11, p00, p11, p01]);
            }
        }
    }
    indices
}
