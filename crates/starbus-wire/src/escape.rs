//! String escaping for outbound JSON.
//!
//! Escaping draws from a small pool of reusable growable buffers indexed
//! round-robin, so concurrent encoders do not churn allocations or contend
//! on one buffer.

use std::ops::Deref;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Default number of pooled buffers.
pub const DEFAULT_POOL_SIZE: usize = 8;

/// Append `s` to `out`, escaping quote, backslash, newline, carriage
/// return and tab.
pub fn push_escaped(out: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
}

/// A pooled escape buffer, held for the lifetime of one encoded field.
pub struct Escaped<'a>(MutexGuard<'a, String>);

impl Deref for Escaped<'_> {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

/// Round-robin pool of escape buffers.
pub struct Escaper {
    slots: Vec<Mutex<String>>,
    next: AtomicUsize,
}

impl Escaper {
    /// Create a pool with `slots` reusable buffers.
    pub fn new(slots: usize) -> Self {
        Self {
            slots: (0..slots.max(1)).map(|_| Mutex::new(String::new())).collect(),
            next: AtomicUsize::new(0),
        }
    }

    /// Escape `s` into the next pooled buffer and hand it out.
    pub fn escape(&self, s: &str) -> Escaped<'_> {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.slots.len();
        let mut buf = self.slots[index]
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        buf.clear();
        push_escaped(&mut buf, s);
        Escaped(buf)
    }
}

impl Default for Escaper {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_specials() {
        let escaper = Escaper::default();
        let out = escaper.escape("a\"b\\c\nd\re\tf");
        assert_eq!(&*out, "a\\\"b\\\\c\\nd\\re\\tf");
    }

    #[test]
    fn pool_wraps_around() {
        let escaper = Escaper::new(2);
        for i in 0..10 {
            let out = escaper.escape(&format!("value {i}"));
            assert_eq!(&*out, &format!("value {i}"));
        }
    }
}
