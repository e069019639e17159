//! Server-issued request identifiers.
//!
//! Ids combine a random value drawn once per process with a monotonic counter, so
//! they are unique within the process lifetime without coordination.

use rand::RngCore;
use rand::rngs::OsRng;
use std::sync::atomic::{AtomicU64, Ordering};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug)]
pub struct RequestIdGenerator {
    boot_id: u64,
    counter: AtomicU64,
}

impl RequestIdGenerator {
    pub fn new() -> Self {
        RequestIdGenerator {
            boot_id: OsRng.next_u64(),
            counter: AtomicU64::new(0),
        }
    }

    pub fn issue(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("sp-{:016x}-{:x}", self.boot_id, n)
    }
}

impl Default for RequestIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
