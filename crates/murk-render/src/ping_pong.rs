//! Double-buffered resources selected by frame parity.

/// Two physical copies of a resource. Which one is "current" depends only on
/// the parity of the frame counter, so frame `n` and `n + 2` always agree.
///
/// Even frames write slot 0 and read history from slot 1; odd frames swap.
#[derive(Debug)]
pub struct PingPong<T> {
    slots: [T; 2],
}

impl<T> PingPong<T> {
    pub fn new(first: T, second: T) -> Self {
        Self {
            slots: [first, second],
        }
    }

    /// Build both slots with the same constructor, passing the slot index.
    pub fn from_fn(mut make: impl FnMut(usize) -> T) -> Self {
        Self {
            slots: [make(0), make(1)],
        }
    }

    /// Slot index written on `frame`.
    pub fn current_index(frame: u32) -> usize {
        (frame % 2) as usize
    }

    /// Slot index holding last frame's result on `frame`.
    pub fn previous_index(frame: u32) -> usize {
        1 - Self::current_index(frame)
    }

    pub fn current(&self, frame: u32) -> &T {
        &self.slots[Self::current_index(frame)]
    }

    pub fn previous(&self, frame: u32) -> &T {
        &self.slots[Self::previous_index(frame)]
    }

    /// Slot by physical index (0 or 1).
    pub fn slot(&self, index: usize) -> &T {
        &self.slots[index & 1]
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.slots.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_depends_only_on_parity() {
        let pair = PingPong::new("a", "b");
        for frame in 0..64u32 {
            assert_eq!(pair.current(frame), pair.current(frame + 2));
            assert_eq!(pair.previous(frame), pair.previous(frame + 2));
        }
    }

    #[test]
    fn test_current_and_previous_never_alias() {
        let pair = PingPong::from_fn(|i| i);
        for frame in [0, 1, 2, 7, u32::MAX - 1, u32::MAX] {
            assert_ne!(pair.current(frame), pair.previous(frame), "frame {frame}");
        }
    }

    #[test]
    fn test_even_frames_write_first_slot() {
        let pair = PingPong::new(10, 20);
        assert_eq!(*pair.current(0), 10);
        assert_eq!(*pair.previous(0), 20);
        assert_eq!(*pair.current(1), 20);
        assert_eq!(*pair.previous(1), 10);
    }

    #[test]
    fn test_previous_of_next_frame_is_current_of_this_frame() {
        let pair = PingPong::from_fn(|i| i);
        for frame in 0..10u32 {
            assert_eq!(pair.current(frame), pair.previous(frame + 1));
        }
    }
}
