//! Two-slot ping-pong buffer ownership.
//!
//! Exactly one slot is the read side and the other the write side for a
//! frame. A single role bit selects which; `commit_swap` toggles it so the
//! buffer written this frame is the one read next frame.

/// Owns the two feedback buffers and their role assignment.
#[derive(Debug)]
pub struct SwapChain<T> {
    slots: [T; 2],
    /// Index of the slot read this frame. The other slot is written.
    input_slot: usize,
    swaps: u64,
}

impl<T> SwapChain<T> {
    /// Create a swap chain. Slot `a` starts as input, slot `b` as output.
    pub fn new(a: T, b: T) -> Self {
        Self {
            slots: [a, b],
            input_slot: 0,
            swaps: 0,
        }
    }

    /// The buffer sampled by this frame's feedback pass.
    pub fn acquire_input(&self) -> &T {
        &self.slots[self.input_slot]
    }

    /// The buffer written by this frame's feedback pass.
    pub fn acquire_output(&self) -> &T {
        &self.slots[1 - self.input_slot]
    }

    /// Both buffers for the current frame, as `(input, output)`.
    pub fn acquire(&self) -> (&T, &T) {
        (self.acquire_input(), self.acquire_output())
    }

    /// Exchange roles once the frame's work has been issued.
    pub fn commit_swap(&mut self) {
        self.input_slot = 1 - self.input_slot;
        self.swaps += 1;
    }

    /// Discard both buffers and reset the role assignment.
    ///
    /// Returns the old buffers so the caller decides when they are dropped.
    pub fn replace(&mut self, a: T, b: T) -> [T; 2] {
        self.input_slot = 0;
        self.swaps = 0;
        std::mem::replace(&mut self.slots, [a, b])
    }

    /// Swaps committed since creation or the last `replace`.
    pub fn swap_count(&self) -> u64 {
        self.swaps
    }
}
