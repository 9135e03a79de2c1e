//! Connection id generation.

use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque identifier for one live transport session. Unique for the process
/// lifetime.
pub type ConnId = String;

/// Generates connection ids: "c" + 6-character base36 counter.
/// Example: "cAAAAAC"
pub struct ConnIdGenerator {
    counter: AtomicU64,
}

impl ConnIdGenerator {
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }

    /// Generate the next unique connection id.
    pub fn next(&self) -> ConnId {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("c{}", base36_encode_6(n))
    }
}

impl Default for ConnIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode a number as a 6-character base36 string.
fn base36_encode_6(mut n: u64) -> String {
    const CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut result = [b'A'; 6];

    for i in (0..6).rev() {
        result[i] = CHARS[(n % 36) as usize];
        n /= 36;
    }

    String::from_utf8_lossy(&result).into_owned()
}
