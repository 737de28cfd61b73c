//! Rigid-body dynamics: inertia, integration, and the contact solver.

pub mod friction;
pub mod inertia;
pub mod integrator;
pub mod solver;

pub use integrator::Integrator;
pub use solver::{Contact, ContactSolver, SolverStepMetrics};
