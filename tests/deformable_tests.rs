use impulse_physics::*;

const GRAVITY: Vec3 = Vec3::new(0.0, -9.81, 0.0);

#[test]
fn cloth_simulation_is_deterministic() {
    let mut first = DeformableBody::new(8, 8, 0.25);
    let mut second = DeformableBody::new(8, 8, 0.25);
    first.pin_row(0);
    second.pin_row(0);

    for frame in 0..200 {
        let dt = if frame % 3 == 0 { 1.0 / 30.0 } else { 1.0 / 90.0 };
        first.simulate(dt, GRAVITY);
        second.simulate(dt, GRAVITY);
    }

    assert_eq!(first.vertices(), second.vertices());
    assert_eq!(first.normals(), second.normals());
}

#[test]
fn soft_body_simulation_is_deterministic() {
    let mut first = SoftBodyVolume::new(3, 4, 3, 0.3);
    let mut second = SoftBodyVolume::new(3, 4, 3, 0.3);
    first.apply_impulse(Vec3::new(1.0, 0.0, -0.5));
    second.apply_impulse(Vec3::new(1.0, 0.0, -0.5));

    for _ in 0..240 {
        first.simulate(1.0 / 60.0, GRAVITY);
        second.simulate(1.0 / 60.0, GRAVITY);
    }

    assert_eq!(first.vertices(), second.vertices());
}

#[test]
fn hanging_cloth_stays_attached_and_above_floor() {
    let config = ClothConfig {
        origin: Vec3::new(0.0, 3.0, 0.0),
        ..ClothConfig::default()
    };
    let mut cloth = DeformableBody::with_config(6, 6, 0.2, config);
    cloth.pin_row(0);
    let anchors: Vec<Vec3> = (0..6)
        .map(|column| cloth.node(column, 0).unwrap().position)
        .collect();

    for _ in 0..300 {
        cloth.simulate(1.0 / 60.0, GRAVITY);
    }

    for (column, anchor) in anchors.iter().enumerate() {
        assert_eq!(cloth.node(column, 0).unwrap().position, *anchor);
    }
    let free_corner = cloth.node(5, 5).unwrap().position;
    assert!(free_corner.y < 3.0);
    assert!(cloth.vertices().iter().all(|v| v.is_finite() && v.y >= 0.0));
}

#[test]
fn oversized_steps_are_clamped() {
    let mut clamped = DeformableBody::new(4, 4, 0.5);
    let mut reference = DeformableBody::new(4, 4, 0.5);

    clamped.simulate(10.0, GRAVITY);
    reference.simulate(clamped.config().max_dt, GRAVITY);

    assert_eq!(clamped.vertices(), reference.vertices());
}

#[test]
fn invalid_steps_are_ignored() {
    let mut volume = SoftBodyVolume::new(2, 2, 2, 0.5);
    let before = volume.vertices();

    volume.simulate(0.0, GRAVITY);
    volume.simulate(-0.1, GRAVITY);
    volume.simulate(f32::INFINITY, GRAVITY);

    assert_eq!(volume.vertices(), before);
}

#[test]
fn physics_system_steps_mixed_deformables() {
    let system = PhysicsSystem::new();
    let mut cloth = DeformableBody::new(4, 4, 0.25);
    let mut volume = SoftBodyVolume::new(2, 2, 2, 0.25);
    let cloth_start = cloth.vertices();
    let volume_start = volume.vertices();

    {
        let mut bodies: [&mut dyn DeformableSurface; 2] = [&mut cloth, &mut volume];
        for _ in 0..10 {
            system.update_deformables(&mut bodies, 1.0 / 60.0);
        }
    }

    assert!(cloth.vertices()[0].y < cloth_start[0].y);
    assert!(volume.vertices()[0].y < volume_start[0].y);
}
