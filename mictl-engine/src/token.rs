//! Correlation token allocation

use std::sync::atomic::{AtomicU32, Ordering};

use mictl_protocol::Token;

/// Largest token handed out before the counter starts over at 1
pub const MAX_TOKEN: u32 = i32::MAX as u32;

/// Issues increasing positive tokens, wrapping to 1
#[derive(Debug)]
pub struct TokenAllocator {
    next: AtomicU32,
}

impl TokenAllocator {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Start counting at `first` (clamped to the valid range)
    pub fn starting_at(first: u32) -> Self {
        Self {
            next: AtomicU32::new(first.clamp(1, MAX_TOKEN)),
        }
    }

    pub fn next_token(&self) -> Token {
        let previous = self
            .next
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                Some(if current >= MAX_TOKEN { 1 } else { current + 1 })
            });
        match previous {
            Ok(value) | Err(value) => Token(value),
        }
    }
}

impl Default for TokenAllocator {
    fn default() -> Self {
        Self::new()
    }
}
