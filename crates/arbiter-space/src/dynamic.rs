//! Per-cycle map with agent safety bubbles layered over the static map.

use arbiter_core::{AgentKey, Vec3};
use indexmap::IndexMap;

use crate::error::SpaceError;
use crate::map::{FreeSpace, Map};
use crate::region::ConvexRegion;

/// A static [`Map`] plus one dynamic obstacle per agent.
///
/// Built by the arbitration engine from a state snapshot at the start of
/// a cycle and dropped at the end of it. Borrowing the static map keeps
/// the per-cycle cost to the bubbles themselves.
#[derive(Clone, Debug)]
pub struct CycleMap<'m> {
    map: &'m Map,
    dynamic: IndexMap<AgentKey, ConvexRegion>,
}

impl<'m> CycleMap<'m> {
    /// Cycle map over `map` with no dynamic obstacles.
    pub fn new(map: &'m Map) -> Self {
        Self {
            map,
            dynamic: IndexMap::new(),
        }
    }

    /// The underlying static map.
    pub fn map(&self) -> &'m Map {
        self.map
    }

    /// Place (or replace) `key`'s bubble: a ball of `radius` at `center`.
    pub fn add_dynamic_obstacle(
        &mut self,
        key: AgentKey,
        center: Vec3,
        radius: f64,
    ) -> Result<(), SpaceError> {
        let ball = ConvexRegion::ball(center, radius)?;
        self.dynamic.insert(key, ball);
        Ok(())
    }

    /// The bubble registered for `key`, if any.
    pub fn dynamic_obstacle(&self, key: &AgentKey) -> Option<&ConvexRegion> {
        self.dynamic.get(key)
    }

    /// Number of dynamic obstacles.
    pub fn dynamic_len(&self) -> usize {
        self.dynamic.len()
    }

    /// First agent other than `key` whose bubble strictly contains `p`.
    ///
    /// Bubbles are open here: a point exactly one radius away keeps the
    /// required separation.
    pub fn dynamic_conflict(&self, key: &AgentKey, p: Vec3) -> Option<&AgentKey> {
        self.dynamic
            .iter()
            .find(|(other, region)| *other != key && region.contains_strictly(p))
            .map(|(other, _)| other)
    }

    /// Whether `p` is free of every OTHER agent's bubble. The agent's
    /// own bubble never blocks it.
    pub fn is_free_dynamic(&self, key: &AgentKey, p: Vec3) -> bool {
        self.dynamic_conflict(key, p).is_none()
    }

    /// Static free space and free of every other agent's bubble.
    pub fn is_free_for(&self, key: &AgentKey, p: Vec3) -> bool {
        self.map.is_free_space(p) && self.is_free_dynamic(key, p)
    }

    /// Drop every dynamic obstacle, keeping the static map.
    pub fn clear_dynamic_obstacles(&mut self) {
        self.dynamic.clear();
    }
}

/// As a plain [`FreeSpace`], a cycle map treats every bubble as an
/// obstacle.
impl FreeSpace for CycleMap<'_> {
    fn contains(&self, p: Vec3) -> bool {
        self.map.contains(p)
    }

    fn is_free_space(&self, p: Vec3) -> bool {
        self.map.is_free_space(p) && !self.dynamic.values().any(|r| r.contains_strictly(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arena() -> Map {
        Map::open_box(Vec3::new(-10.0, -10.0, 0.0), Vec3::new(10.0, 10.0, 5.0)).unwrap()
    }

    #[test]
    fn own_bubble_does_not_block() {
        let m = arena();
        let mut c = CycleMap::new(&m);
        let a = AgentKey::new("a");
        let b = AgentKey::new("b");
        c.add_dynamic_obstacle(a.clone(), Vec3::new(0.0, 0.0, 1.0), 1.0)
            .unwrap();
        c.add_dynamic_obstacle(b.clone(), Vec3::new(5.0, 0.0, 1.0), 1.0)
            .unwrap();

        let near_a = Vec3::new(0.5, 0.0, 1.0);
        assert!(c.is_free_dynamic(&a, near_a));
        assert!(!c.is_free_dynamic(&b, near_a));
        assert_eq!(c.dynamic_conflict(&b, near_a), Some(&a));
        assert!(!c.is_free_space(near_a));
    }

    #[test]
    fn bubble_boundary_is_open() {
        let m = arena();
        let mut c = CycleMap::new(&m);
        let a = AgentKey::new("a");
        c.add_dynamic_obstacle(a, Vec3::new(0.0, 0.0, 1.0), 1.0)
            .unwrap();
        let other = AgentKey::new("b");
        assert!(c.is_free_dynamic(&other, Vec3::new(1.0, 0.0, 1.0)));
        assert!(!c.is_free_dynamic(&other, Vec3::new(0.99, 0.0, 1.0)));
    }

    #[test]
    fn is_free_for_combines_static_and_dynamic() {
        let m = arena();
        let mut c = CycleMap::new(&m);
        let a = AgentKey::new("a");
        c.add_dynamic_obstacle(a.clone(), Vec3::new(0.0, 0.0, 1.0), 1.0)
            .unwrap();
        let b = AgentKey::new("b");
        assert!(!c.is_free_for(&b, Vec3::new(20.0, 0.0, 1.0)));
        assert!(c.is_free_for(&b, Vec3::new(3.0, 0.0, 1.0)));
        assert!(c.is_free_for(&a, Vec3::new(0.0, 0.0, 1.0)));
    }

    #[test]
    fn replace_and_clear() {
        let m = arena();
        let mut c = CycleMap::new(&m);
        let a = AgentKey::new("a");
        c.add_dynamic_obstacle(a.clone(), Vec3::ZERO, 1.0).unwrap();
        c.add_dynamic_obstacle(a.clone(), Vec3::new(3.0, 0.0, 0.0), 1.0)
            .unwrap();
        assert_eq!(c.dynamic_len(), 1);
        assert!(c.dynamic_obstacle(&a).unwrap().contains(Vec3::new(3.0, 0.0, 0.0)));
        c.clear_dynamic_obstacles();
        assert_eq!(c.dynamic_len(), 0);
        assert!(c.is_free_space(Vec3::new(3.0, 0.0, 1.0)));
    }

    #[test]
    fn invalid_radius_rejected() {
        let m = arena();
        let mut c = CycleMap::new(&m);
        assert_eq!(
            c.add_dynamic_obstacle(AgentKey::new("a"), Vec3::ZERO, -1.0),
            Err(SpaceError::InvalidRadius { value: -1.0 })
        );
        assert_eq!(c.dynamic_len(), 0);
    }
}
