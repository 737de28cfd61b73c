use approx::assert_relative_eq;
use impulse_physics::core::combine_coefficient;
use impulse_physics::dynamics::inertia::{body_inertia_tensor, world_half_extents};
use impulse_physics::*;

const DT: f32 = 1.0 / 60.0;

fn floor() -> GameObject {
    GameObject::new("floor")
        .with_transform(Transform::from_position(Vec3::new(0.0, -0.5, 0.0)))
        .with_physics(RigidBodyProperties::immovable())
        .with_collider(Collider::static_cuboid(Vec3::new(10.0, 0.5, 10.0)))
}

fn crate_at(position: Vec3, physics: RigidBodyProperties) -> GameObject {
    GameObject::new("crate")
        .with_transform(Transform::from_position(position))
        .with_physics(physics)
        .with_collider(Collider::cuboid(Vec3::splat(0.5)))
}

fn kinetic_energy(scene: &Scene) -> f32 {
    scene
        .objects()
        .iter()
        .filter(|object| object.is_movable())
        .map(|object| 0.5 * object.physics().mass * object.physics().velocity.length_squared())
        .sum()
}

#[test]
fn free_fall_is_split_into_substeps() {
    let mut scene = Scene::new();
    let id = scene.add_object(
        GameObject::new("faller")
            .with_transform(Transform::from_position(Vec3::new(0.0, 100.0, 0.0)))
            .with_physics(RigidBodyProperties {
                linear_damping: 0.0,
                ..RigidBodyProperties::dynamic(2.0)
            }),
    );
    let mut system = PhysicsSystem::new();

    system.update(&mut scene, 0.5);

    assert_eq!(system.last_profile().substeps, 10);
    let body = scene.object(id).unwrap();
    assert_relative_eq!(body.physics().velocity.y, -4.905, epsilon = 1e-4);
    // Sum of 0.05 * v_k for v_k = -0.4905 * k, k = 1..=10.
    assert_relative_eq!(body.transform().position.y, 100.0 - 1.348875, epsilon = 1e-3);
    assert_relative_eq!(body.physics().last_acceleration.length(), 9.81, epsilon = 1e-4);
}

#[test]
fn invalid_mass_bodies_are_left_untouched() {
    let mut scene = Scene::new();
    let velocity = Vec3::new(1.0, 2.0, 3.0);
    let start = Vec3::new(0.0, 5.0, 0.0);
    let ids: Vec<ObjectId> = [0.0, -1.0, f32::INFINITY, f32::NAN]
        .into_iter()
        .map(|mass| {
            scene.add_object(
                GameObject::new("weightless")
                    .with_transform(Transform::from_position(start))
                    .with_physics(RigidBodyProperties {
                        mass,
                        velocity,
                        last_acceleration: Vec3::ONE,
                        ..RigidBodyProperties::dynamic(1.0)
                    }),
            )
        })
        .collect();
    for &id in &ids {
        scene
            .object_mut(id)
            .unwrap()
            .physics_mut()
            .apply_force(Vec3::new(50.0, 0.0, 0.0));
    }
    let mut system = PhysicsSystem::new();

    system.update(&mut scene, DT);

    for id in ids {
        let body = scene.object(id).unwrap();
        assert!(body.physics().simulate);
        assert_eq!(body.physics().velocity, velocity);
        assert_eq!(body.transform().position, start);
        assert_eq!(body.physics().last_acceleration, Vec3::ZERO);
    }
}

#[test]
fn crates_overlapping_side_by_side_separate_in_one_update() {
    let mut scene = Scene::new();
    let left = scene.add_object(crate_at(
        Vec3::new(-0.4, 0.0, 0.0),
        RigidBodyProperties::dynamic(1.0),
    ));
    let right = scene.add_object(crate_at(
        Vec3::new(0.4, 0.0, 0.0),
        RigidBodyProperties::dynamic(1.0),
    ));
    let mut system = PhysicsSystem::new();

    system.update(&mut scene, DT);

    let left_x = scene.object(left).unwrap().transform().position.x;
    let right_x = scene.object(right).unwrap().transform().position.x;
    assert!(right_x >= left_x);
    assert!(right_x - left_x > 0.82, "separation {}", right_x - left_x);
}

#[test]
fn mass_never_changes_during_simulation() {
    let mut scene = Scene::new();
    scene.add_object(floor());
    for level in 0..4 {
        scene.add_object(crate_at(
            Vec3::new(0.05 * level as f32, 0.5 + level as f32 * 0.98, 0.0),
            RigidBodyProperties::dynamic(1.0 + level as f32),
        ));
    }
    let masses: Vec<f32> = scene.objects().iter().map(|o| o.physics().mass).collect();
    let mut system = PhysicsSystem::new();

    for _ in 0..120 {
        system.update(&mut scene, DT);
    }

    let after: Vec<f32> = scene.objects().iter().map(|o| o.physics().mass).collect();
    assert_eq!(masses, after);
}

#[test]
fn overlapping_crates_are_pushed_apart() {
    let mut scene = Scene::new();
    let a = scene.add_object(crate_at(Vec3::ZERO, RigidBodyProperties::dynamic(1.0)));
    let b = scene.add_object(crate_at(
        Vec3::new(0.6, 0.0, 0.0),
        RigidBodyProperties::dynamic(1.0),
    ));
    let mut system = PhysicsSystem::new();
    system.set_gravity(Vec3::ZERO);

    for _ in 0..30 {
        system.update(&mut scene, DT);
    }

    let pa = scene.object(a).unwrap().transform().position;
    let pb = scene.object(b).unwrap().transform().position;
    assert!(pb.x - pa.x > 0.95, "centres only {} apart", pb.x - pa.x);
}

#[test]
fn head_on_collision_loses_energy() {
    let mut scene = Scene::new();
    let material = RigidBodyProperties {
        restitution: 1.0,
        linear_damping: 0.0,
        ..RigidBodyProperties::dynamic(1.0)
    };
    let a = scene.add_object(crate_at(
        Vec3::new(-1.0, 0.0, 0.0),
        RigidBodyProperties {
            velocity: Vec3::new(2.0, 0.0, 0.0),
            ..material
        },
    ));
    let b = scene.add_object(crate_at(
        Vec3::new(1.0, 0.0, 0.0),
        RigidBodyProperties {
            velocity: Vec3::new(-2.0, 0.0, 0.0),
            ..material
        },
    ));
    let mut system = PhysicsSystem::new();
    system.set_gravity(Vec3::ZERO);
    let before = kinetic_energy(&scene);

    for _ in 0..60 {
        system.update(&mut scene, DT);
    }

    assert!(kinetic_energy(&scene) < before);
    let va = scene.object(a).unwrap().physics().velocity.x;
    let vb = scene.object(b).unwrap().physics().velocity.x;
    assert!(vb - va >= 0.0, "crates still approaching: {va} vs {vb}");
}

#[test]
fn free_spin_keeps_angular_momentum() {
    let mut scene = Scene::new();
    let id = scene.add_object(crate_at(
        Vec3::new(0.0, 5.0, 0.0),
        RigidBodyProperties {
            angular_velocity: Vec3::new(1.0, 2.0, 0.5),
            angular_damping: 0.0,
            ..RigidBodyProperties::dynamic(3.0)
        },
    ));
    let mut system = PhysicsSystem::new();
    system.set_gravity(Vec3::ZERO);

    let momentum = |scene: &Scene| {
        let body = scene.object(id).unwrap();
        body_inertia_tensor(world_half_extents(body), body.physics().mass)
            * body.physics().angular_velocity
    };
    let before = momentum(&scene);
    system.update(&mut scene, DT);
    let after = momentum(&scene);

    let drift = (after - before).length() / before.length();
    assert!(drift < 0.01, "angular momentum drifted by {drift}");
}

fn spin_down(material: RigidBodyProperties) -> f32 {
    let mut scene = Scene::new();
    scene.add_object(floor().with_physics(RigidBodyProperties {
        simulate: false,
        mass: 0.0,
        ..material
    }));
    let id = scene.add_object(crate_at(
        Vec3::new(0.0, 0.49, 0.0),
        RigidBodyProperties {
            angular_velocity: Vec3::new(5.0, 0.0, 0.0),
            ..material
        },
    ));
    let mut system = PhysicsSystem::new();

    for _ in 0..30 {
        system.update(&mut scene, DT);
    }
    scene.object(id).unwrap().physics().angular_velocity.length()
}

#[test]
fn grippy_floor_removes_more_spin_than_slick_floor() {
    let grippy = spin_down(RigidBodyProperties {
        static_friction: 1.0,
        dynamic_friction: 0.9,
        restitution: 0.0,
        ..RigidBodyProperties::dynamic(1.0)
    });
    let slick = spin_down(RigidBodyProperties {
        static_friction: 0.05,
        dynamic_friction: 0.05,
        restitution: 0.8,
        ..RigidBodyProperties::dynamic(1.0)
    });

    assert!(
        grippy < slick,
        "high friction should dissipate more spin: {grippy} vs {slick}"
    );
}

#[test]
fn material_coefficients_combine_by_geometric_mean() {
    assert_relative_eq!(combine_coefficient(0.9, 0.4), 0.6, epsilon = 1e-6);
    assert_eq!(combine_coefficient(0.0, 0.4), 0.0);
}
