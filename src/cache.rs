//! The bounded envelope cache.
//!
//! Structured envelope parsing is cheap but not free, and clients tend to
//! re-request the same headers while scrolling a mailbox. This cache keys on
//! `(uidvalidity, uid)` so a resync can never serve stale entries. Eviction
//! is FIFO; any bounded policy that preserves read-through semantics would
//! do.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};

use mail_types::envelope::Envelope;

use crate::parse::parse_envelope;

#[derive(Debug)]
pub struct EnvelopeCache {
    inner: Mutex<Inner>,
    capacity: usize,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<(u32, u32), Arc<Envelope>>,
    order: VecDeque<(u32, u32)>,
}

impl EnvelopeCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, uid_validity: u32, uid: u32) -> Option<Arc<Envelope>> {
        self.inner
            .lock()
            .unwrap()
            .entries
            .get(&(uid_validity, uid))
            .cloned()
    }

    /// Read-through lookup: parses and stores the raw envelope on a miss.
    pub fn get_or_parse(&self, uid_validity: u32, uid: u32, raw: &str) -> Option<Arc<Envelope>> {
        let key = (uid_validity, uid);

        let mut inner = self.inner.lock().unwrap();
        if let Some(envelope) = inner.entries.get(&key) {
            return Some(envelope.clone());
        }

        let envelope = Arc::new(parse_envelope(raw)?);

        while inner.order.len() >= self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.entries.remove(&oldest);
            }
        }

        inner.order.push_back(key);
        inner.entries.insert(key, envelope.clone());
        Some(envelope)
    }
}
