/// Allocates and recycles dense `u32` slot indices.
///
/// Backs integer handles whose value is also an offset into a GPU array
/// (world matrices, per-draw data). Freed slots are reused before the
/// high-water mark grows, so the backing array stays compact.
///
/// ```ignore
/// let mut slots = SlotAllocator::new();
/// let a = slots.alloc();  // 0
/// let b = slots.alloc();  // 1
/// slots.free(a);
/// let c = slots.alloc();  // 0 again
/// ```
pub struct SlotAllocator {
    free_list: Vec<u32>,
    allocated: Vec<bool>,
    len: u32,
}

impl SlotAllocator {
    pub fn new() -> Self {
        Self {
            free_list: Vec::new(),
            allocated: Vec::new(),
            len: 0,
        }
    }

    /// Allocate the most recently freed slot, or a fresh one
    pub fn alloc(&mut self) -> u32 {
        let id = match self.free_list.pop() {
            Some(id) => id,
            None => {
                self.allocated.push(false);
                (self.allocated.len() - 1) as u32
            }
        };
        self.allocated[id as usize] = true;
        self.len += 1;
        id
    }

    /// Return a slot to the pool. Returns `false` if it was not allocated.
    pub fn free(&mut self, id: u32) -> bool {
        match self.allocated.get_mut(id as usize) {
            Some(live) if *live => {
                *live = false;
                self.len -= 1;
                self.free_list.push(id);
                true
            }
            _ => false,
        }
    }

    pub fn is_allocated(&self, id: u32) -> bool {
        self.allocated.get(id as usize).copied().unwrap_or(false)
    }

    /// Highest index ever allocated + 1 (minimum backing capacity)
    pub fn high_water_mark(&self) -> u32 {
        self.allocated.len() as u32
    }

    /// Number of currently allocated slots
    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Currently allocated slots in ascending order
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.allocated
            .iter()
            .enumerate()
            .filter(|(_, live)| **live)
            .map(|(id, _)| id as u32)
    }
}

impl Default for SlotAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "slot_allocator_tests.rs"]
mod tests;
