//! Frame orchestration: sub-stepping, collision detection and contact solving.

use std::{path::Path, sync::Arc, time::Instant};

use ash_renderer::vulkan::VulkanDevice;
use glam::Vec3;

use crate::{
    collision::{collect_proxies, CollisionDetector, ContactCandidate, CpuAllPairsDetector},
    config::{GpuCollisionConfig, IntegratorConfig, PhysicsConfig, SolverConfig},
    core::{GameObject, Scene},
    deformable::DeformableSurface,
    dynamics::{ContactSolver, Integrator, SolverStepMetrics},
    error::{PhysicsError, Result},
    gpu::GpuCollisionSystem,
    utils::{
        logging,
        profiling::{PhysicsProfiler, ScopedTimer},
    },
};

/// Which detector produced the contacts of one sub-step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DetectionPath {
    Cpu,
    Gpu,
    CpuFallback,
}

/// Owns the integrator, both collision detectors and the contact solver.
#[derive(Debug)]
pub struct PhysicsSystem {
    config: PhysicsConfig,
    integrator: Integrator,
    solver: ContactSolver,
    cpu_detector: CpuAllPairsDetector,
    gpu_collision: GpuCollisionSystem,
    profile: PhysicsProfiler,
    last_metrics: SolverStepMetrics,
}

impl Default for PhysicsSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsSystem {
    pub fn new() -> Self {
        Self::with_config(PhysicsConfig::default())
    }

    pub fn with_config(mut config: PhysicsConfig) -> Self {
        let mut gpu_collision = GpuCollisionSystem::new(config.gpu);
        gpu_collision.set_enabled(config.gpu_collision_enabled);
        config.gpu = *gpu_collision.config();

        Self {
            integrator: Integrator::new(config.integrator),
            solver: ContactSolver::new(config.solver),
            cpu_detector: CpuAllPairsDetector::new(),
            gpu_collision,
            profile: PhysicsProfiler::default(),
            last_metrics: SolverStepMetrics::default(),
            config,
        }
    }

    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    pub fn gravity(&self) -> Vec3 {
        self.config.gravity
    }

    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.config.gravity = gravity;
    }

    pub fn integrator_config(&self) -> &IntegratorConfig {
        &self.integrator.config
    }

    pub fn set_integrator_config(&mut self, config: IntegratorConfig) {
        self.config.integrator = config;
        self.integrator.config = config;
    }

    pub fn solver_config(&self) -> &SolverConfig {
        &self.solver.config
    }

    pub fn set_solver_config(&mut self, config: SolverConfig) {
        self.config.solver = config;
        self.solver.config = config;
    }

    pub fn set_gpu_config(&mut self, config: GpuCollisionConfig) -> Result<()> {
        self.gpu_collision.set_config(config)?;
        self.config.gpu = config;
        Ok(())
    }

    /// Creates the Vulkan collision backend and turns GPU detection on.
    pub fn initialize_gpu(&mut self, device: Arc<VulkanDevice>, shader_dir: &Path) -> Result<()> {
        self.gpu_collision.initialize(device, shader_dir)?;
        self.set_gpu_collision_enabled(true);
        Ok(())
    }

    /// Takes effect only once a backend is installed.
    pub fn set_gpu_collision_enabled(&mut self, enabled: bool) {
        self.config.gpu_collision_enabled = enabled;
        self.gpu_collision.set_enabled(enabled);
    }

    pub fn gpu_collision_enabled(&self) -> bool {
        self.gpu_collision.is_enabled()
    }

    pub fn gpu_collision(&self) -> &GpuCollisionSystem {
        &self.gpu_collision
    }

    pub fn gpu_collision_mut(&mut self) -> &mut GpuCollisionSystem {
        &mut self.gpu_collision
    }

    /// Timings and counters of the most recent `update`.
    pub fn last_profile(&self) -> &PhysicsProfiler {
        &self.profile
    }

    /// Solver metrics summed over the sub-steps of the most recent `update`.
    pub fn last_solver_metrics(&self) -> &SolverStepMetrics {
        &self.last_metrics
    }

    /// Advances `scene` by `dt` seconds, splitting the frame into as many
    /// sub-steps as the fastest body needs.
    pub fn update(&mut self, scene: &mut Scene, dt: f32) {
        if !dt.is_finite() || dt <= 0.0 {
            return;
        }

        let _trace = logging::ScopedTimer::new("physics::update");
        let started = Instant::now();
        let gravity = self.config.gravity;
        let mut profile = PhysicsProfiler {
            body_count: scene.len(),
            ..PhysicsProfiler::default()
        };
        let mut metrics = SolverStepMetrics::default();

        let max_speed = self
            .integrator
            .estimate_max_speed(scene.objects(), gravity, dt);
        let substeps = self.integrator.substep_count(max_speed, dt);
        let sub_dt = dt / substeps as f32;

        for _ in 0..substeps {
            {
                let _timer = ScopedTimer::new(&mut profile.integrate_time);
                self.integrator.step(scene.objects_mut(), gravity, sub_dt);
            }

            let (candidates, path) = {
                let _timer = ScopedTimer::new(&mut profile.detection_time);
                self.detect(scene.objects())
            };
            match path {
                DetectionPath::Gpu => profile.gpu_passes += 1,
                DetectionPath::CpuFallback => profile.cpu_fallbacks += 1,
                DetectionPath::Cpu => {}
            }
            profile.contact_count += candidates.len();

            let step_metrics = {
                let _timer = ScopedTimer::new(&mut profile.solver_time);
                self.solver.solve(scene.objects_mut(), &candidates, sub_dt)
            };
            metrics.merge(&step_metrics);
        }

        profile.substeps = substeps;
        profile.total_time = started.elapsed();
        profile.report();

        self.profile = profile;
        self.last_metrics = metrics;
    }

    /// Steps every deformable once with the system gravity.
    pub fn update_deformables(&self, bodies: &mut [&mut dyn DeformableSurface], dt: f32) {
        let _trace = logging::ScopedTimer::new("physics::deformables");
        for body in bodies.iter_mut() {
            body.simulate(dt, self.config.gravity);
        }
    }

    fn detect(&self, objects: &[GameObject]) -> (Vec<ContactCandidate>, DetectionPath) {
        let proxies = collect_proxies(objects);

        let mut path = DetectionPath::Cpu;
        if self.gpu_collision.is_enabled() {
            match self.gpu_collision.detect(&proxies) {
                Ok(candidates) => return (candidates, DetectionPath::Gpu),
                Err(err @ PhysicsError::CapacityExceeded { .. }) => {
                    log::warn!("{err}; using CPU collision for this step");
                }
                Err(err) => {
                    log::error!("GPU collision pass failed: {err}; using CPU collision");
                }
            }
            path = DetectionPath::CpuFallback;
        }

        let candidates = self.cpu_detector.detect(&proxies).unwrap_or_else(|err| {
            log::error!("{} detector failed: {err}", self.cpu_detector.name());
            Vec::new()
        });
        (candidates, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::{Collider, RigidBodyProperties, Transform},
        gpu::{
            CollisionComputeBackend, GpuColliderAabb, GpuCollisionPair, PassOutput,
            SoftwareBackend,
        },
    };

    struct LostDevice;

    impl CollisionComputeBackend for LostDevice {
        fn name(&self) -> &str {
            "lost"
        }

        fn narrow_phase(
            &self,
            _aabbs: &[GpuColliderAabb],
            _pairs: &[GpuCollisionPair],
        ) -> Result<PassOutput> {
            Err(PhysicsError::Vulkan("ERROR_DEVICE_LOST".into()))
        }

        fn spatial_hash(
            &self,
            _aabbs: &[GpuColliderAabb],
            _config: &GpuCollisionConfig,
        ) -> Result<PassOutput> {
            Err(PhysicsError::Vulkan("ERROR_DEVICE_LOST".into()))
        }
    }

    fn resting_pair() -> Scene {
        let mut scene = Scene::new();
        scene.add_object(
            GameObject::new("floor")
                .with_physics(RigidBodyProperties::immovable())
                .with_collider(Collider::static_cuboid(Vec3::new(5.0, 0.5, 5.0))),
        );
        scene.add_object(
            GameObject::new("box")
                .with_transform(Transform::from_position(Vec3::new(0.0, 0.95, 0.0)))
                .with_physics(RigidBodyProperties::dynamic(1.0))
                .with_collider(Collider::cuboid(Vec3::splat(0.5))),
        );
        scene
    }

    #[test]
    fn non_positive_dt_is_a_no_op() {
        let mut scene = resting_pair();
        let before = scene.objects()[1].clone();
        let mut system = PhysicsSystem::new();

        system.update(&mut scene, 0.0);
        system.update(&mut scene, -1.0);
        system.update(&mut scene, f32::NAN);

        assert_eq!(scene.objects()[1].transform(), before.transform());
        assert_eq!(system.last_profile().substeps, 0);
    }

    #[test]
    fn profile_counts_cpu_contacts() {
        let mut scene = resting_pair();
        let mut system = PhysicsSystem::new();
        system.update(&mut scene, 1.0 / 60.0);

        let profile = system.last_profile();
        assert_eq!(profile.body_count, 2);
        assert_eq!(profile.substeps, 1);
        assert!(profile.contact_count >= 1);
        assert_eq!(profile.gpu_passes, 0);
        assert_eq!(profile.cpu_fallbacks, 0);
        assert_eq!(system.last_solver_metrics().contacts_solved, profile.contact_count);
    }

    #[test]
    fn software_backend_drives_gpu_path() {
        let mut scene = resting_pair();
        let mut system = PhysicsSystem::new();
        system
            .gpu_collision_mut()
            .install_backend(Box::new(SoftwareBackend))
            .unwrap();
        system.set_gpu_collision_enabled(true);

        system.update(&mut scene, 1.0 / 60.0);
        assert_eq!(system.last_profile().gpu_passes, 1);
        assert!(system.last_profile().contact_count >= 1);
    }

    #[test]
    fn failed_gpu_pass_falls_back_to_cpu() {
        let mut scene = resting_pair();
        let mut system = PhysicsSystem::new();
        system
            .gpu_collision_mut()
            .install_backend(Box::new(LostDevice))
            .unwrap();
        system.set_gpu_collision_enabled(true);

        system.update(&mut scene, 1.0 / 60.0);
        let profile = system.last_profile();
        assert_eq!(profile.gpu_passes, 0);
        assert_eq!(profile.cpu_fallbacks, 1);
        assert!(profile.contact_count >= 1);
    }

    #[test]
    fn enabling_without_backend_stays_on_cpu() {
        let mut system = PhysicsSystem::new();
        system.set_gpu_collision_enabled(true);
        assert!(!system.gpu_collision_enabled());
        assert!(system.config().gpu_collision_enabled);
    }

    #[test]
    fn deformables_use_system_gravity() {
        let mut system = PhysicsSystem::new();
        system.set_gravity(Vec3::ZERO);
        let mut cloth = crate::deformable::DeformableBody::new(3, 3, 0.5);
        let before = cloth.vertices();

        let mut bodies: [&mut dyn DeformableSurface; 1] = [&mut cloth];
        system.update_deformables(&mut bodies, 1.0 / 60.0);
        assert_eq!(cloth.vertices(), before);
    }
}
