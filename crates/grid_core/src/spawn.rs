//! Unit spawn points with a FIFO queue for blocked exits.
//!
//! Every building has one spawn cell at `origin + spawn_offset`. A unit that
//! cannot appear because the cell is taken waits in the building's queue,
//! and the queue is retried on a fixed interval, one unit per retry.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::data::UnitData;
use crate::grid::GridManager;
use crate::movement::TickContext;
use crate::position::GridPosition;

/// Time between attempts to release a queued unit.
pub const DEFAULT_SPAWN_RETRY_INTERVAL_MS: u32 = 500;

/// Spawn cell and waiting queue of one building.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnPoint {
    cell: GridPosition,
    capacity: usize,
    retry_interval_ms: u32,
    retry_timer_ms: u32,
    queue: VecDeque<UnitData>,
}

impl SpawnPoint {
    /// Spawn point at `cell` holding at most `capacity` waiting units.
    #[must_use]
    pub fn new(cell: GridPosition, capacity: usize) -> Self {
        Self {
            cell,
            capacity,
            retry_interval_ms: DEFAULT_SPAWN_RETRY_INTERVAL_MS,
            retry_timer_ms: 0,
            queue: VecDeque::new(),
        }
    }

    /// Override the retry interval.
    #[must_use]
    pub fn with_retry_interval(mut self, retry_interval_ms: u32) -> Self {
        self.retry_interval_ms = retry_interval_ms;
        self
    }

    /// Cell where units appear.
    #[must_use]
    pub const fn cell(&self) -> GridPosition {
        self.cell
    }

    /// Maximum number of waiting units.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// True if the spawn cell exists and is free right now.
    #[must_use]
    pub fn is_clear(&self, grid: &GridManager) -> bool {
        grid.is_free(self.cell)
    }

    /// Queue a unit. Returns its 1-based place in line, or hands the unit
    /// back if the queue is full.
    pub fn enqueue(&mut self, unit: UnitData) -> std::result::Result<usize, UnitData> {
        if self.queue.len() >= self.capacity {
            return Err(unit);
        }
        if self.queue.is_empty() {
            self.retry_timer_ms = 0;
        }
        self.queue.push_back(unit);
        Ok(self.queue.len())
    }

    /// Advance the retry timer; on an elapsed interval with a free spawn
    /// cell, release the unit at the front of the queue.
    pub fn update(&mut self, ctx: TickContext, grid: &GridManager) -> Option<UnitData> {
        if self.queue.is_empty() {
            return None;
        }

        self.retry_timer_ms = self.retry_timer_ms.saturating_add(ctx.delta_ms);
        if self.retry_timer_ms < self.retry_interval_ms {
            return None;
        }
        self.retry_timer_ms = 0;

        if !self.is_clear(grid) {
            tracing::debug!(cell = %self.cell, waiting = self.queue.len(), "Spawn cell still blocked");
            return None;
        }
        self.queue.pop_front()
    }

    /// Put a released unit back at the front of the line.
    ///
    /// Used when the release could not be turned into a spawn. Capacity is
    /// not checked since the unit already held a place.
    pub fn requeue_front(&mut self, unit: UnitData) {
        self.queue.push_front(unit);
    }

    /// Drop every waiting unit. Returns how many were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        self.retry_timer_ms = 0;
        dropped
    }

    /// Number of waiting units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// True if nothing is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Waiting units, front first.
    pub fn queued(&self) -> impl Iterator<Item = &UnitData> {
        self.queue.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Fixed;
    use crate::occupant::OccupantId;

    fn unit(id: &str) -> UnitData {
        UnitData {
            id: id.to_string(),
            name: id.to_string(),
            speed: Fixed::from_num(2),
            can_move: true,
            locomotion: crate::data::LocomotionKind::Vehicle,
        }
    }

    fn tick(n: u64) -> TickContext {
        TickContext::new(n, 50)
    }

    #[test]
    fn test_queue_capacity() {
        let mut spawn = SpawnPoint::new(GridPosition::new(1, 1), 2);
        assert_eq!(spawn.enqueue(unit("a")), Ok(1));
        assert_eq!(spawn.enqueue(unit("b")), Ok(2));
        assert_eq!(spawn.enqueue(unit("c")).map_err(|u| u.id), Err("c".to_string()));
        assert_eq!(spawn.len(), 2);
    }

    #[test]
    fn test_releases_in_fifo_order_one_per_interval() {
        let grid = GridManager::new(4, 4).unwrap();
        let mut spawn = SpawnPoint::new(GridPosition::new(1, 1), 5);
        spawn.enqueue(unit("a")).unwrap();
        spawn.enqueue(unit("b")).unwrap();

        let mut released = Vec::new();
        for n in 1..=20 {
            if let Some(data) = spawn.update(tick(n), &grid) {
                released.push((n, data.id));
            }
        }

        // 500 ms at 50 ms per tick
        assert_eq!(released, vec![(10, "a".to_string()), (20, "b".to_string())]);
        assert!(spawn.is_empty());
    }

    #[test]
    fn test_blocked_cell_holds_queue() {
        let mut grid = GridManager::new(4, 4).unwrap();
        let blocker = OccupantId::from_raw(0, 0);
        grid.register_unit(blocker, GridPosition::new(1, 1)).unwrap();

        let mut spawn = SpawnPoint::new(GridPosition::new(1, 1), 5);
        spawn.enqueue(unit("a")).unwrap();
        assert!(!spawn.is_clear(&grid));

        for n in 1..=30 {
            assert!(spawn.update(tick(n), &grid).is_none());
        }

        grid.unregister_unit(blocker);
        let released = (31..=40).find_map(|n| spawn.update(tick(n), &grid));
        assert_eq!(released.map(|u| u.id), Some("a".to_string()));
    }

    #[test]
    fn test_out_of_bounds_spawn_cell_never_clear() {
        let grid = GridManager::new(4, 4).unwrap();
        let spawn = SpawnPoint::new(GridPosition::new(-1, 0), 5);
        assert!(!spawn.is_clear(&grid));
    }

    #[test]
    fn test_requeue_front_keeps_place() {
        let grid = GridManager::new(4, 4).unwrap();
        let mut spawn = SpawnPoint::new(GridPosition::new(1, 1), 2).with_retry_interval(50);
        spawn.enqueue(unit("a")).unwrap();
        spawn.enqueue(unit("b")).unwrap();

        let released = spawn.update(tick(1), &grid);
        assert_eq!(released.as_ref().map(|u| u.id.as_str()), Some("a"));
        if let Some(data) = released {
            spawn.requeue_front(data);
        }

        let order: Vec<_> = spawn.queued().map(|u| u.id.as_str()).collect();
        assert_eq!(order, vec!["a", "b"]);
        assert_eq!(spawn.update(tick(2), &grid).map(|u| u.id), Some("a".to_string()));
    }

    #[test]
    fn test_clear() {
        let mut spawn = SpawnPoint::new(GridPosition::ZERO, 5).with_retry_interval(100);
        spawn.enqueue(unit("a")).unwrap();
        spawn.enqueue(unit("b")).unwrap();
        assert_eq!(spawn.clear(), 2);
        assert!(spawn.is_empty());
        assert_eq!(spawn.queued().count(), 0);
    }
}
