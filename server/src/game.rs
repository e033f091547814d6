//! Initial world contents for a fresh server

use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::world::ItemLocation;
use shared::{EntityKind, EntityState, Vec3, World, WorldError};

/// Radius around the origin that random worlds are scattered over.
pub const WORLD_RADIUS: f32 = 50.0;

/// Fixed layout used with `--test-map`: two stocked chests, a few mobs and
/// loose items, always with the same ids.
pub fn seed_test_map(world: &mut World) -> Result<(), WorldError> {
    for x in [-10.0, 10.0] {
        let chest = world.spawn(EntityKind::Chest, EntityState::at(Vec3::new(x, 0.0, 5.0)))?;
        world.create_item(ItemLocation::Inventory(chest));
        world.create_item(ItemLocation::Inventory(chest));
    }
    for (i, x) in [-5.0, 0.0, 5.0].into_iter().enumerate() {
        let mut state = EntityState::named(Vec3::new(x, 0.0, 20.0), "slime");
        state.health = 50 + 10 * i as u32;
        world.spawn(EntityKind::Mob, state)?;
    }
    world.create_item(ItemLocation::Ground(Vec3::new(2.0, 0.0, -2.0)));
    world.create_item(ItemLocation::Ground(Vec3::new(-2.0, 0.0, -2.0)));
    info!("Seeded test map with {} entities", world.entity_count());
    Ok(())
}

/// Scatters chests, mobs and items at random. A fixed seed reproduces the layout.
pub fn seed_random(world: &mut World, seed: Option<u64>) -> Result<(), WorldError> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    for _ in 0..rng.gen_range(2..=4) {
        let chest = world.spawn(EntityKind::Chest, EntityState::at(random_point(&mut rng)))?;
        for _ in 0..rng.gen_range(0..=3) {
            world.create_item(ItemLocation::Inventory(chest));
        }
    }
    for _ in 0..rng.gen_range(4..=8) {
        let mut state = EntityState::named(random_point(&mut rng), "slime");
        state.heading = rng.gen_range(0.0..std::f32::consts::TAU);
        world.spawn(EntityKind::Mob, state)?;
    }
    for _ in 0..rng.gen_range(3..=6) {
        world.create_item(ItemLocation::Ground(random_point(&mut rng)));
    }

    info!("Seeded random world with {} entities", world.entity_count());
    Ok(())
}

fn random_point(rng: &mut StdRng) -> Vec3 {
    Vec3::new(
        rng.gen_range(-WORLD_RADIUS..WORLD_RADIUS),
        0.0,
        rng.gen_range(-WORLD_RADIUS..WORLD_RADIUS),
    )
}

/// Where a player's entity appears. Spread on a ring so joiners do not overlap.
pub fn spawn_point(player: u32) -> Vec3 {
    let angle = (player % 8) as f32 * std::f32::consts::TAU / 8.0;
    Vec3::new(3.0 * angle.cos(), 0.0, 3.0 * angle.sin())
}
