use std::time::Duration;

use super::*;
use crate::lod::test_utils::{MockFactory, MockMesh};
use crate::lod::GeometryKind;

fn manager() -> LodManager<MockFactory> {
  LodManager::new(MockFactory::default(), LodConfig::default(), DeviceTier::High)
}

fn visible(id: &str, distance: f64) -> VisibleEntity {
  VisibleEntity {
    entity_id: EntityId::from(id),
    distance,
  }
}

#[test]
fn test_register_builds_levels_from_profile() {
  let mut lod = manager();
  lod.register_entity("earth", EntityType::Planet, 10.0).unwrap();

  let entity = lod.entity("earth").unwrap();
  assert_eq!(entity.lod_levels.len(), QualityProfile::HIGH.level_count());
  assert_eq!(entity.importance, EntityType::Planet.default_importance());
  assert_eq!(entity.current_lod, None);
  assert_eq!(lod.len(), 1);
}

#[test]
fn test_register_rejects_bad_base_size() {
  let mut lod = manager();
  for base_size in [0.0, -1.0, f64::NAN, f64::INFINITY] {
    let err = lod.register_entity("bad", EntityType::Moon, base_size).unwrap_err();
    assert!(matches!(err, LodError::InvalidBaseSize { .. }));
  }
  assert!(lod.is_empty());
}

#[test]
fn test_importance_is_clamped() {
  let mut lod = manager();
  lod
    .register_entity_with_importance("a", EntityType::Debris, 1.0, 3.0)
    .unwrap();
  lod
    .register_entity_with_importance("b", EntityType::Debris, 1.0, f64::NAN)
    .unwrap();
  assert_eq!(lod.entity("a").unwrap().importance, 1.0);
  assert_eq!(lod.entity("b").unwrap().importance, EntityType::Debris.default_importance());
}

#[test]
fn test_planet_threshold_boundary() {
  let mut lod = manager();
  lod.register_entity("earth", EntityType::Planet, 10.0).unwrap();

  let threshold = lod.distance_threshold("earth", 1, 1.0).unwrap();
  // importance 0.8 stretches normalized distance by 1.2
  assert!((threshold - 10.0 * 10.0 / 1.2).abs() < 1e-9);

  assert_eq!(lod.get_lod_level("earth", threshold - 1e-3, 1.0, None).unwrap(), 0);
  assert_eq!(lod.get_lod_level("earth", threshold + 1e-3, 1.0, None).unwrap(), 1);
}

#[test]
fn test_low_importance_downgrades_sooner() {
  let mut lod = manager();
  lod.register_entity("sun", EntityType::Star, 10.0).unwrap();
  lod.register_entity("scrap", EntityType::Debris, 10.0).unwrap();

  // star: 200 / 10 = 20, debris: 20 * 1.9 = 38
  assert_eq!(lod.get_lod_level("sun", 200.0, 1.0, None).unwrap(), 1);
  assert_eq!(lod.get_lod_level("scrap", 200.0, 1.0, None).unwrap(), 2);
}

#[test]
fn test_zoom_scales_distance() {
  let mut lod = manager();
  lod.register_entity("sun", EntityType::Star, 10.0).unwrap();

  assert_eq!(lod.get_lod_level("sun", 400.0, 1.0, None).unwrap(), 2);
  assert_eq!(lod.get_lod_level("sun", 400.0, 2.0, None).unwrap(), 1);
  // invalid zoom falls back to 1
  assert_eq!(lod.get_lod_level("sun", 400.0, 0.0, None).unwrap(), 2);
  assert_eq!(lod.get_lod_level("sun", 1e9, 1.0, None).unwrap(), 3);
}

#[test]
fn test_screen_size_selection() {
  let mut lod = manager();
  lod.register_entity("earth", EntityType::Planet, 10.0).unwrap();

  // High profile: [200, 80, 30, 0] px
  assert_eq!(lod.get_lod_level("earth", 0.0, 1.0, Some(250.0)).unwrap(), 0);
  assert_eq!(lod.get_lod_level("earth", 0.0, 1.0, Some(100.0)).unwrap(), 1);
  assert_eq!(lod.get_lod_level("earth", 0.0, 1.0, Some(40.0)).unwrap(), 2);
  assert_eq!(lod.get_lod_level("earth", 0.0, 1.0, Some(5.0)).unwrap(), 3);
}

#[test]
fn test_unknown_entity() {
  let mut lod = manager();
  let mut mesh = MockMesh::default();
  assert_eq!(
    lod.get_lod_level("ghost", 1.0, 1.0, None),
    Err(LodError::UnknownEntity(EntityId::from("ghost")))
  );
  assert!(matches!(
    lod.apply_lod(&mut mesh, "ghost", 0, 1.0),
    Err(LodError::UnknownEntity(_))
  ));
  assert!(lod.unregister_entity("ghost").is_err());
  assert_eq!(mesh.mutations, 0);
}

#[test]
fn test_invalid_level() {
  let mut lod = manager();
  lod.register_entity("earth", EntityType::Planet, 10.0).unwrap();
  let mut mesh = MockMesh::default();

  let err = lod.apply_lod(&mut mesh, "earth", 9, 1.0).unwrap_err();
  assert_eq!(
    err,
    LodError::InvalidLevel {
      id: EntityId::from("earth"),
      level: 9,
      available: 4,
    }
  );
  assert!(lod.level_threshold("earth", 4).is_err());
}

#[test]
fn test_fps_below_floor_shrinks_thresholds() {
  let mut lod = manager();
  lod.register_entity("earth", EntityType::Planet, 10.0).unwrap();

  let t0 = Instant::now();
  let mut thresholds = vec![lod.level_threshold("earth", 1).unwrap()];
  for check in 0..=40u64 {
    // several samples per interval
    for tenth in 0..4u64 {
      let now = t0 + Duration::from_millis(check * 1000 + tenth * 250);
      lod.record_fps_at(20.0, now);
    }
    thresholds.push(lod.level_threshold("earth", 1).unwrap());
  }

  assert!(thresholds.windows(2).all(|w| w[1] <= w[0]));
  assert!(thresholds.iter().all(|&t| t >= MIN_DISTANCE_THRESHOLD));
  assert!(thresholds.last().unwrap() < thresholds.first().unwrap());
  assert!(lod.adaptive_scale() < 1.0);

  for level in 1..4 {
    assert!(lod.level_threshold("earth", level).unwrap() >= MIN_DISTANCE_THRESHOLD);
  }
}

#[test]
fn test_apply_binds_resources() {
  let mut lod = manager();
  lod.register_entity("earth", EntityType::Planet, 10.0).unwrap();
  let mut mesh = MockMesh::default();

  let outcome = lod.apply_lod(&mut mesh, "earth", 1, 150.0).unwrap();
  assert_eq!(outcome, ApplyOutcome::Applied { level: 1 });
  assert_eq!(lod.current_lod("earth"), Some(1));

  let geometry = mesh.geometry.as_ref().unwrap();
  assert_eq!(geometry.spec.lod_level, 1);
  assert_eq!(geometry.spec.kind, GeometryKind::Sphere);
  assert_eq!(mesh.material.as_ref().unwrap().spec.texture_size, 1024);
  assert_eq!(mesh.scale, 10.0);
  assert!(mesh.visible);

  let transition = lod.transitions().last().unwrap();
  assert_eq!(transition.from, None);
  assert_eq!(transition.to, 1);
  assert_eq!(transition.distance, 150.0);
}

#[test]
fn test_apply_is_idempotent() {
  let mut lod = manager();
  lod.register_entity("earth", EntityType::Planet, 10.0).unwrap();
  let mut mesh = MockMesh::default();

  lod.apply_lod(&mut mesh, "earth", 2, 300.0).unwrap();
  let stats = lod.lod_stats();
  let mutations = mesh.mutations;

  let outcome = lod.apply_lod(&mut mesh, "earth", 2, 310.0).unwrap();
  assert_eq!(outcome, ApplyOutcome::Unchanged);
  assert_eq!(mesh.mutations, mutations);

  let after = lod.lod_stats();
  assert_eq!(after.geometry, stats.geometry);
  assert_eq!(after.material, stats.material);
  assert_eq!(after.transitions, stats.transitions);
}

#[test]
fn test_shared_resources_are_cached() {
  let mut lod = manager();
  lod.register_entity("earth", EntityType::Planet, 10.0).unwrap();
  lod.register_entity("mars", EntityType::Planet, 10.0).unwrap();
  let mut earth = MockMesh::default();
  let mut mars = MockMesh::default();

  lod.apply_lod(&mut earth, "earth", 0, 1.0).unwrap();
  lod.apply_lod(&mut mars, "mars", 0, 1.0).unwrap();

  assert_eq!(lod.factory().geometries_created, 1);
  assert_eq!(lod.factory().materials_created, 1);
  assert!(Rc::ptr_eq(earth.geometry.as_ref().unwrap(), mars.geometry.as_ref().unwrap()));
  assert_eq!(lod.lod_stats().geometry.hits, 1);
}

#[test]
fn test_creation_failure_falls_back_to_level_zero() {
  let mut lod = LodManager::new(MockFactory::failing(&[2]), LodConfig::default(), DeviceTier::High);
  lod.register_entity("earth", EntityType::Planet, 10.0).unwrap();
  let mut mesh = MockMesh::default();

  let outcome = lod.apply_lod(&mut mesh, "earth", 2, 300.0).unwrap();
  assert_eq!(outcome, ApplyOutcome::FellBack { requested: 2, level: 0 });
  assert_eq!(lod.current_lod("earth"), Some(0));
  assert_eq!(mesh.geometry.as_ref().unwrap().spec.lod_level, 0);
  assert!(mesh.visible);

  // already at level 0: the mesh is left alone
  let mutations = mesh.mutations;
  let outcome = lod.apply_lod(&mut mesh, "earth", 2, 300.0).unwrap();
  assert_eq!(outcome, ApplyOutcome::FellBack { requested: 2, level: 0 });
  assert_eq!(mesh.mutations, mutations);
}

#[test]
fn test_double_failure_hides_mesh() {
  let mut lod = LodManager::new(MockFactory::failing(&[0, 2]), LodConfig::default(), DeviceTier::High);
  lod.register_entity("earth", EntityType::Planet, 10.0).unwrap();
  let mut mesh = MockMesh::default();

  let err = lod.apply_lod(&mut mesh, "earth", 2, 300.0).unwrap_err();
  match err {
    LodError::ResourceCreation { kind, key, message } => {
      assert_eq!(kind, ResourceKind::Geometry);
      assert_eq!(key, "planet_0_10");
      assert_eq!(message, "no buffer for level 0");
    }
    other => panic!("unexpected error {other:?}"),
  }
  assert!(!mesh.visible);
  assert_eq!(lod.current_lod("earth"), None);

  // level 0 itself failing hides without a second attempt
  let mut other = MockMesh::default();
  lod.register_entity("mars", EntityType::Planet, 10.0).unwrap();
  assert!(lod.apply_lod(&mut other, "mars", 0, 1.0).is_err());
  assert!(!other.visible);
}

#[test]
fn test_more_bound_meshes_than_cache_capacity_stay_visible() {
  let config = LodConfig {
    geometry_capacity: 4,
    ..Default::default()
  };
  let mut lod = LodManager::new(MockFactory::default(), config, DeviceTier::High);
  let mut meshes: Vec<MockMesh> = (0..6).map(|_| MockMesh::default()).collect();

  for (i, mesh) in meshes.iter_mut().enumerate() {
    let id = format!("planet{i}");
    lod.register_entity(id.as_str(), EntityType::Planet, 10.0 + i as f64).unwrap();
    let outcome = lod.apply_lod(mesh, &id, 0, 1.0).unwrap();
    assert_eq!(outcome, ApplyOutcome::Applied { level: 0 });
  }
  assert!(meshes.iter().all(|mesh| mesh.visible && mesh.geometry.is_some()));

  let stats = lod.lod_stats().geometry;
  assert_eq!(stats.len, 6);
  assert_eq!(stats.overflows, 2);
  assert_eq!(lod.factory().disposed(), 0);

  // Four meshes go away; the pass trims the cache back to capacity.
  meshes.truncate(2);
  let mut no_meshes: HashMap<EntityId, MockMesh> = HashMap::new();
  lod.update_lod_for_all(&[], &mut no_meshes, 1.0);

  let stats = lod.lod_stats().geometry;
  assert_eq!(stats.len, 4);
  assert_eq!(stats.evictions, 2);
  assert_eq!(lod.factory().disposed(), 2);
  assert!(meshes.iter().all(|mesh| mesh.visible));
}

#[test]
fn test_unregister_purges_sole_referrer_entries() {
  let mut lod = manager();
  lod.register_entity("earth", EntityType::Planet, 10.0).unwrap();
  lod.register_entity("mars", EntityType::Planet, 20.0).unwrap();
  let mut earth = MockMesh::default();
  let mut mars = MockMesh::default();

  lod.apply_lod(&mut earth, "earth", 1, 150.0).unwrap();
  lod.apply_lod(&mut mars, "mars", 1, 300.0).unwrap();
  // geometry keyed by size, material shared
  assert_eq!(lod.lod_stats().geometry.len, 2);
  assert_eq!(lod.lod_stats().material.len, 1);

  drop(earth);
  let removed = lod.unregister_entity("earth").unwrap();
  assert_eq!(removed.current_lod, Some(1));

  let stats = lod.lod_stats();
  assert_eq!(stats.geometry.len, 1);
  assert_eq!(stats.material.len, 1);
  assert_eq!(lod.factory().disposed(), 1);
  assert!(!lod.contains("earth"));
}

#[test]
fn test_unregister_keeps_entries_bound_to_meshes() {
  let mut lod = manager();
  lod.register_entity("earth", EntityType::Planet, 10.0).unwrap();
  let mut earth = MockMesh::default();
  lod.apply_lod(&mut earth, "earth", 0, 1.0).unwrap();

  lod.unregister_entity("earth").unwrap();
  assert_eq!(lod.lod_stats().geometry.len, 1);
  assert_eq!(lod.factory().disposed(), 0);
}

#[test]
fn test_profile_switch_regenerates_levels() {
  let mut lod = manager();
  lod.register_entity("earth", EntityType::Planet, 10.0).unwrap();
  let mut mesh = MockMesh::default();
  lod.apply_lod(&mut mesh, "earth", 1, 150.0).unwrap();

  lod.set_device_tier(DeviceTier::Ultra);
  assert_eq!(lod.profile().name, "ultra");

  let entity = lod.entity("earth").unwrap();
  assert_eq!(entity.lod_levels.len(), 5);
  assert_eq!(entity.current_lod, None);
  assert_eq!(lod.lod_stats().geometry.len, 0);
  assert_eq!(lod.factory().disposed(), 2);

  let outcome = lod.apply_lod(&mut mesh, "earth", 1, 150.0).unwrap();
  assert_eq!(outcome, ApplyOutcome::Applied { level: 1 });
  assert_eq!(mesh.material.as_ref().unwrap().spec.texture_size, 2048);
}

#[test]
fn test_update_lod_for_all() {
  let mut lod = manager();
  lod.register_entity("earth", EntityType::Planet, 10.0).unwrap();
  lod.register_entity("luna", EntityType::Moon, 5.0).unwrap();
  lod.register_entity("meshless", EntityType::Moon, 5.0).unwrap();

  let mut meshes = HashMap::new();
  meshes.insert(EntityId::from("earth"), MockMesh::default());
  meshes.insert(EntityId::from("luna"), MockMesh::default());
  meshes.insert(EntityId::from("orphan"), MockMesh::default());

  // earth: 50 / 10 * 1.2 = 6 -> 0; luna: 100 / 5 * 1.4 = 28 -> 1
  let entries = [
    visible("earth", 50.0),
    visible("luna", 100.0),
    visible("orphan", 10.0),
    visible("meshless", 10.0),
  ];

  let report = lod.update_lod_for_all(&entries, &mut meshes, 1.0);
  assert_eq!(
    report,
    LodUpdateReport {
      processed: 4,
      changed: 2,
      unchanged: 0,
      skipped: 2,
      hidden: 0,
    }
  );
  assert_eq!(lod.current_lod("earth"), Some(0));
  assert_eq!(lod.current_lod("luna"), Some(1));

  let report = lod.update_lod_for_all(&entries, &mut meshes, 1.0);
  assert_eq!(report.unchanged, 2);
  assert_eq!(report.changed, 0);

  let stats = lod.lod_stats();
  assert_eq!(stats.registered, 3);
  assert_eq!(stats.per_level, vec![1, 1, 0, 0]);
  assert_eq!(stats.unassigned, 1);
  assert_eq!(stats.transitions, 2);
}

#[test]
fn test_update_lod_for_all_counts_hidden() {
  let mut lod = LodManager::new(MockFactory::failing(&[0, 1, 2, 3]), LodConfig::default(), DeviceTier::High);
  lod.register_entity("earth", EntityType::Planet, 10.0).unwrap();
  let mut meshes = HashMap::new();
  meshes.insert(EntityId::from("earth"), MockMesh::default());

  let report = lod.update_lod_for_all(&[visible("earth", 50.0)], &mut meshes, 1.0);
  assert_eq!(report.hidden, 1);
  assert!(!meshes["earth"].visible);
}

#[test]
fn test_warm_up_runs_on_tick() {
  let mut lod = manager();
  assert_eq!(lod.warm_up(EntityType::Star, 100.0), 4);
  assert_eq!(lod.warm_up(EntityType::Star, -1.0), 0);
  assert_eq!(lod.pending_warm_ups(), 4);
  assert_eq!(lod.factory().geometries_created, 0);

  assert_eq!(lod.tick(), 4);
  assert_eq!(lod.factory().geometries_created, 4);
  assert_eq!(lod.factory().materials_created, 4);
  assert_eq!(lod.lod_stats().geometry.len, 4);

  lod.register_entity("sun", EntityType::Star, 100.0).unwrap();
  let mut mesh = MockMesh::default();
  lod.apply_lod(&mut mesh, "sun", 0, 1.0).unwrap();
  assert_eq!(lod.factory().geometries_created, 4);
}

#[test]
fn test_warm_up_respects_tick_budget() {
  let config = LodConfig {
    tasks_per_tick: 3,
    ..Default::default()
  };
  let mut lod = LodManager::new(MockFactory::default(), config, DeviceTier::Ultra);
  assert_eq!(lod.warm_up(EntityType::Gateway, 50.0), 5);
  assert_eq!(lod.tick(), 3);
  assert_eq!(lod.tick(), 2);
  assert_eq!(lod.tick(), 0);
}

#[test]
fn test_unregister_cancels_owned_warm_up() {
  let config = LodConfig {
    warm_up_on_register: true,
    ..Default::default()
  };
  let mut lod = LodManager::new(MockFactory::default(), config, DeviceTier::High);
  lod.register_entity("earth", EntityType::Planet, 10.0).unwrap();
  lod.register_entity("mars", EntityType::Planet, 20.0).unwrap();
  assert_eq!(lod.pending_warm_ups(), 2);

  lod.unregister_entity("earth").unwrap();
  assert_eq!(lod.pending_warm_ups(), 1);
  assert_eq!(lod.tick(), 1);
  assert_eq!(lod.factory().geometries_created, 1);
}

#[test]
fn test_profile_without_levels_registers_without_warm_up() {
  let config = LodConfig {
    warm_up_on_register: true,
    ..Default::default()
  };
  let mut lod = LodManager::new(MockFactory::default(), config, DeviceTier::High);
  lod.set_quality_profile(QualityProfile {
    name: "empty",
    distance_multipliers: &[],
    screen_sizes: &[],
    texture_sizes: &[],
    detail_scale: 1.0,
  });

  lod.register_entity("earth", EntityType::Planet, 10.0).unwrap();
  assert!(lod.entity("earth").unwrap().lod_levels.is_empty());
  assert_eq!(lod.pending_warm_ups(), 0);

  let mut mesh = MockMesh::default();
  let err = lod.apply_lod(&mut mesh, "earth", 0, 1.0).unwrap_err();
  assert!(matches!(err, LodError::InvalidLevel { available: 0, .. }));
  assert_eq!(lod.tick(), 0);
}

#[test]
fn test_dispose_releases_everything() {
  let mut lod = manager();
  lod.register_entity("earth", EntityType::Planet, 10.0).unwrap();
  let mut mesh = MockMesh::default();
  lod.apply_lod(&mut mesh, "earth", 0, 1.0).unwrap();
  lod.warm_up(EntityType::Moon, 3.0);

  lod.dispose();
  let stats = lod.lod_stats();
  assert_eq!(stats.registered, 0);
  assert_eq!(stats.geometry.len, 0);
  assert_eq!(stats.material.len, 0);
  assert_eq!(stats.scheduled_tasks, 0);
  assert_eq!(stats.transitions, 0);
  assert_eq!(lod.factory().disposed(), 2);
}
