// THEORY:
// The `RegionStore` is the single owner of every `Region` the operator has drawn.
// It gives the rest of the system the concept of identity: regions are appended
// with a freshly minted `RegionId` and are then addressed only by that id.
//
// Key architectural principles:
// 1.  **Exclusive Ownership**: The classifier, editor and transition gate never
//     hold their own copies of region state. They read through `get`/`list` and
//     write through `update_geometry`/`update_flags`.
// 2.  **Append-Only Lifecycle**: Regions are born via `add` and never removed.
//     Ids are handed out from a monotonically increasing counter, so the backing
//     vector is always sorted by id and lookups can binary search.
// 3.  **Snapshots for Iteration**: `list` returns an owned copy of the current
//     regions. A classification pass iterates that copy, so a region appended by
//     the editor mid-pass cannot corrupt or shift the entries already captured;
//     it is simply picked up on the next tick.
// 4.  **Monotonic Flags**: `update_flags` re-applies every flag that was set
//     before the mutator ran, so no caller can clear a logged transition.

use crate::core_modules::region::{Point, Region, RegionId, SequenceFlags, SignalColor};
use crate::error::{WatchError, WatchResult};

/// Owns the live collection of regions.
#[derive(Debug, Default)]
pub struct RegionStore {
    /// Regions in creation order. Sorted by id by construction.
    regions: Vec<Region>,
    /// A counter to ensure each new region gets a unique id.
    next_id: u64,
}

impl RegionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a region spanning `corners` with all flags cleared and returns
    /// its new id.
    pub fn add(&mut self, corners: (Point, Point)) -> RegionId {
        let id = RegionId::new(self.next_id);
        self.next_id += 1;
        self.regions.push(Region::new(id, corners));
        id
    }

    /// An ordered snapshot of every region, in creation order.
    pub fn list(&self) -> Vec<Region> {
        self.regions.clone()
    }

    pub fn get(&self, id: RegionId) -> WatchResult<&Region> {
        self.index_of(id).map(|index| &self.regions[index])
    }

    pub fn update_geometry(&mut self, id: RegionId, corners: (Point, Point)) -> WatchResult<()> {
        let index = self.index_of(id)?;
        self.regions[index].corners = corners;
        Ok(())
    }

    /// Applies `mutator` to the region's flags. Any flag that was already set
    /// stays set regardless of what the mutator does.
    pub fn update_flags<F>(&mut self, id: RegionId, mutator: F) -> WatchResult<()>
    where
        F: FnOnce(&mut SequenceFlags),
    {
        let index = self.index_of(id)?;
        let flags = &mut self.regions[index].flags;
        let before = *flags;
        mutator(flags);
        for color in SignalColor::SEQUENCE {
            if before.is_logged(color) {
                flags.mark(color);
            }
        }
        Ok(())
    }

    /// The first region, in store order, whose bounds contain `point`.
    pub fn hit_test(&self, point: Point) -> Option<RegionId> {
        self.regions
            .iter()
            .find(|region| region.contains(point))
            .map(|region| region.id)
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    fn index_of(&self, id: RegionId) -> WatchResult<usize> {
        self.regions
            .binary_search_by_key(&id, |region| region.id)
            .map_err(|_| WatchError::RegionNotFound(id))
    }
}
