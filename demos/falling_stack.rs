use impulse_physics::*;

fn main() {
    let mut scene = Scene::new();
    scene.add_object(
        GameObject::new("ground")
            .with_transform(Transform::from_position(Vec3::new(0.0, -0.5, 0.0)))
            .with_physics(RigidBodyProperties::immovable())
            .with_collider(Collider::static_cuboid(Vec3::new(10.0, 0.5, 10.0))),
    );

    for i in 0..5 {
        let physics = match i % 3 {
            0 => RigidBodyProperties::steel(2.0),
            1 => RigidBodyProperties::rubber(1.0),
            _ => RigidBodyProperties::ice(1.5),
        };
        scene.add_object(
            GameObject::new(format!("crate{i}"))
                .with_transform(Transform::from_position(Vec3::new(
                    0.1 * i as f32,
                    i as f32 * 1.2 + 1.0,
                    0.0,
                )))
                .with_physics(physics)
                .with_collider(Collider::cuboid(Vec3::splat(0.5))),
        );
    }

    let mut cloth = DeformableBody::new(10, 10, 0.2);
    cloth.pin_row(0);

    let mut system = PhysicsSystem::new();
    for _ in 0..120 {
        system.update(&mut scene, 1.0 / 60.0);
        system.update_deformables(&mut [&mut cloth as &mut dyn DeformableSurface], 1.0 / 60.0);
    }

    for object in scene.objects().iter().skip(1) {
        println!("{}: y = {:.3}", object.name, object.transform().position.y);
    }
    println!(
        "cloth corner settled at {:?}",
        cloth.node(9, 9).map(|node| node.position)
    );
}
