use super::*;
use crate::geometry::Aabb;
use crate::octree::{OctreeConfig, SpatialObject};
use crate::types::SpatialMetadata;

fn setup(entries: &[(&str, ObjectType, DVec3)]) -> (Octree, DynamicObjectManager) {
	let mut octree = Octree::new(OctreeConfig::with_bounds(Aabb::from_center_half_extents(
		DVec3::ZERO,
		DVec3::splat(100.0),
	)));
	let mut manager = DynamicObjectManager::new();
	for (id, object_type, position) in entries {
		octree.insert(SpatialObject::new(*id, *position, 1.0, SpatialMetadata::moving(*object_type, 0.5)));
		if let Some(strategy) = UpdateStrategy::for_object_type(*object_type) {
			manager.register(*id, strategy);
		}
	}
	(octree, manager)
}

#[test]
fn test_strategy_mapping() {
	assert_eq!(UpdateStrategy::for_object_type(ObjectType::Static), None);
	assert_eq!(UpdateStrategy::for_object_type(ObjectType::Frequent), Some(UpdateStrategy::Immediate));
	assert_eq!(UpdateStrategy::for_object_type(ObjectType::Dynamic), Some(UpdateStrategy::Deferred));
	assert_eq!(UpdateStrategy::for_object_type(ObjectType::Massive), Some(UpdateStrategy::Lazy));
}

#[test]
fn test_budget_limits() {
	let budget = UpdateBudget {
		max_updates_per_tick: 3,
		..Default::default()
	};
	assert!(budget.can_update(2));
	assert!(!budget.can_update(3));

	let unlimited = UpdateBudget {
		max_updates_per_tick: 0, // 0 = unlimited
		max_lazy_per_query: 0,
	};
	assert!(unlimited.can_update(10_000));
	assert!(unlimited.can_reconcile(10_000));
	assert!(UpdateBudget::UNLIMITED.can_update(10_000));
}

#[test]
fn test_immediate_relocates_now() {
	let (mut octree, mut manager) = setup(&[("cam", ObjectType::Frequent, DVec3::splat(-50.0))]);

	let outcome = manager
		.update_position(&mut octree, "cam", DVec3::splat(50.0), None, false)
		.unwrap();
	assert_eq!(outcome, UpdateOutcome::Applied);
	assert_eq!(octree.get("cam").unwrap().position, DVec3::splat(50.0));
	assert!(!octree.get("cam").unwrap().dirty);
	assert_eq!(octree.query_sphere(DVec3::splat(50.0), 0.5).len(), 1);
}

#[test]
fn test_deferred_buffers_until_flush() {
	let (mut octree, mut manager) = setup(&[("ship", ObjectType::Dynamic, DVec3::splat(-50.0))]);

	let outcome = manager
		.update_position(&mut octree, "ship", DVec3::splat(40.0), None, false)
		.unwrap();
	assert_eq!(outcome, UpdateOutcome::Queued);
	assert_eq!(octree.get("ship").unwrap().position, DVec3::splat(-50.0));
	assert_eq!(manager.pending_count(), 1);

	assert_eq!(manager.process_update_queue(&mut octree, 10), 1);
	assert_eq!(octree.get("ship").unwrap().position, DVec3::splat(40.0));
	assert_eq!(manager.pending_count(), 0);
}

#[test]
fn test_deferred_updates_coalesce() {
	let (mut octree, mut manager) = setup(&[("ship", ObjectType::Dynamic, DVec3::ZERO)]);

	for step in 1..=5 {
		manager
			.update_position(&mut octree, "ship", DVec3::splat(step as f64), Some(2.0), false)
			.unwrap();
	}
	assert_eq!(manager.pending_count(), 1);
	assert_eq!(manager.stats().deferred_coalesced, 4);

	assert_eq!(manager.process_update_queue(&mut octree, 0), 1);
	let ship = octree.get("ship").unwrap();
	assert_eq!(ship.position, DVec3::splat(5.0));
	assert_eq!(ship.radius, 2.0);
}

#[test]
fn test_batch_size_bounds_flush() {
	let entries: Vec<(String, DVec3)> = (0..5)
		.map(|i| (format!("d{i}"), DVec3::splat(i as f64)))
		.collect();
	let refs: Vec<(&str, ObjectType, DVec3)> = entries
		.iter()
		.map(|(id, p)| (id.as_str(), ObjectType::Dynamic, *p))
		.collect();
	let (mut octree, mut manager) = setup(&refs);

	for (id, _) in &entries {
		manager
			.update_position(&mut octree, id, DVec3::splat(-20.0), None, false)
			.unwrap();
	}

	assert_eq!(manager.process_update_queue(&mut octree, 2), 2);
	assert_eq!(manager.pending_count(), 3);
	// Arrival order
	assert_eq!(octree.get("d0").unwrap().position, DVec3::splat(-20.0));
	assert_eq!(octree.get("d1").unwrap().position, DVec3::splat(-20.0));
	assert_eq!(octree.get("d2").unwrap().position, DVec3::splat(2.0));
}

#[test]
fn test_force_immediate_supersedes_queue() {
	let (mut octree, mut manager) = setup(&[("ship", ObjectType::Dynamic, DVec3::ZERO)]);

	manager
		.update_position(&mut octree, "ship", DVec3::splat(10.0), None, false)
		.unwrap();
	let outcome = manager
		.update_position(&mut octree, "ship", DVec3::splat(20.0), None, true)
		.unwrap();
	assert_eq!(outcome, UpdateOutcome::Applied);
	assert_eq!(manager.pending_count(), 0);

	assert_eq!(manager.process_update_queue(&mut octree, 0), 0);
	assert_eq!(octree.get("ship").unwrap().position, DVec3::splat(20.0));
}

#[test]
fn test_unregister_cancels_queued_work() {
	let (mut octree, mut manager) = setup(&[("ship", ObjectType::Dynamic, DVec3::ZERO)]);

	manager
		.update_position(&mut octree, "ship", DVec3::splat(30.0), None, false)
		.unwrap();
	assert!(manager.unregister("ship"));
	assert!(!manager.has_pending("ship"));

	octree.remove("ship");
	assert_eq!(manager.process_update_queue(&mut octree, 0), 0);
	assert!(octree.get("ship").is_none());
}

#[test]
fn test_reregistration_drops_stale_generation() {
	let (mut octree, mut manager) = setup(&[("ship", ObjectType::Dynamic, DVec3::ZERO)]);
	let first = manager.generation_of("ship").unwrap();

	manager
		.update_position(&mut octree, "ship", DVec3::splat(30.0), None, false)
		.unwrap();
	let second = manager.register("ship", UpdateStrategy::Deferred);

	assert_ne!(first, second);
	assert_eq!(manager.pending_count(), 0);
	assert_eq!(manager.process_update_queue(&mut octree, 0), 0);
	assert_eq!(octree.get("ship").unwrap().position, DVec3::ZERO);
}

#[test]
fn test_lazy_marks_dirty_then_reconciles() {
	let (mut octree, mut manager) = setup(&[("nebula", ObjectType::Massive, DVec3::splat(-50.0))]);
	let owner = octree.owner_of("nebula");

	let outcome = manager
		.update_position(&mut octree, "nebula", DVec3::splat(60.0), None, false)
		.unwrap();
	assert_eq!(outcome, UpdateOutcome::MarkedDirty);
	assert!(octree.get("nebula").unwrap().dirty);
	assert_eq!(octree.owner_of("nebula"), owner);
	assert_eq!(manager.dirty_count(), 1);

	let ids = vec![EntityId::from("nebula")];
	assert_eq!(manager.update_lazy_objects(&mut octree, &ids, 0), 1);
	assert!(!octree.get("nebula").unwrap().dirty);
	assert_eq!(manager.dirty_count(), 0);
	assert_eq!(manager.update_lazy_objects(&mut octree, &ids, 0), 0);
}

#[test]
fn test_unknown_entity_is_rejected() {
	let (mut octree, mut manager) = setup(&[("rock", ObjectType::Static, DVec3::ZERO)]);

	let err = manager
		.update_position(&mut octree, "rock", DVec3::ONE, None, false)
		.unwrap_err();
	assert_eq!(err, SpatialError::UnknownEntity("rock".into()));
	assert!(!manager.is_tracked("rock"));
}
