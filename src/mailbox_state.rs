//! The selected-mailbox reducer.
//!
//! Folds a batch of response records into an updated mailbox state plus an
//! observable delta. The reducer is total: records it cannot classify simply
//! do not participate. It is also deterministic, so replaying a batch over
//! the same starting state always produces the same delta.

use std::collections::BTreeMap;

use log::trace;

use mail_types::{
    fetch::FlagChange,
    response::{ResponseCode, Vanished},
    sequence::UidSet,
};

use crate::{
    decode::ResponseRecord,
    parse::{flag_change, parse_untagged, UntaggedResponse},
};

/// Client-side view of the selected mailbox.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectedState {
    pub uid_validity: Option<u32>,
    pub uid_next: Option<u32>,
    pub highest_mod_seq: Option<u64>,
    /// UIDs known to exist under the current UIDVALIDITY.
    pub uids: UidSet,
    /// Message count last announced by EXISTS; concrete UIDs arrive only
    /// through FETCH.
    pub expected_exists: Option<u32>,
    /// Sequence number to UID mapping learned from FETCH responses.
    seq_uids: BTreeMap<u32, u32>,
}

impl SelectedState {
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot(&self) -> SelectedSnapshot {
        SelectedSnapshot {
            uid_validity: self.uid_validity,
            uid_next: self.uid_next,
            highest_mod_seq: self.highest_mod_seq,
            uids: self.uids.clone(),
        }
    }
}

/// An immutable view of the state before or after a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectedSnapshot {
    pub uid_validity: Option<u32>,
    pub uid_next: Option<u32>,
    pub highest_mod_seq: Option<u64>,
    pub uids: UidSet,
}

/// QRESYNC events observed while applying a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QresyncEvent {
    Vanished(Vanished),
    HighestModSeq(u64),
}

/// Untagged traffic surfaced to IDLE observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleEvent {
    Exists(u32),
    Recent(u32),
    Expunge(u32),
    Fetch(u32),
}

/// What one batch did to the selected mailbox.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateDelta {
    pub previous: SelectedSnapshot,
    pub current: SelectedSnapshot,
    pub qresync_events: Vec<QresyncEvent>,
    pub flag_changes: Vec<FlagChange>,
    pub idle_events: Vec<IdleEvent>,
    /// Sorted ascending, computed over the active UIDVALIDITY.
    pub added_uids: Vec<u32>,
    pub removed_uids: Vec<u32>,
}

/// Applies a batch of records in receive order.
pub fn apply(state: &SelectedState, records: &[ResponseRecord]) -> (SelectedState, StateDelta) {
    let previous = state.snapshot();
    let mut next = state.clone();
    let mut delta = StateDelta {
        previous: previous.clone(),
        ..Default::default()
    };

    for record in records {
        let Some(response) = parse_untagged(record) else {
            continue;
        };
        apply_one(&mut next, &mut delta, &response);
    }

    delta.current = next.snapshot();

    // UIDVALIDITY replacement: diff against the fresh set, not across the
    // epoch boundary.
    let empty = UidSet::new();
    let diff_base = if previous.uid_validity == delta.current.uid_validity {
        &previous.uids
    } else {
        &empty
    };

    delta.added_uids = delta.current.uids.difference(diff_base);
    delta.removed_uids = diff_base.difference(&delta.current.uids);

    (next, delta)
}

fn apply_one(state: &mut SelectedState, delta: &mut StateDelta, response: &UntaggedResponse) {
    match response {
        // Response codes first, per the record ordering rules.
        UntaggedResponse::Cond { codes, .. } => {
            for code in codes {
                apply_code(state, delta, code);
            }
        }

        UntaggedResponse::Status(status) => {
            if let Some(uid_validity) = status.get("UIDVALIDITY") {
                apply_code(state, delta, &ResponseCode::UidValidity(uid_validity as u32));
            }
            if let Some(uid_next) = status.get("UIDNEXT") {
                state.uid_next = Some(uid_next as u32);
            }
            if let Some(mod_seq) = status.get("HIGHESTMODSEQ") {
                raise_mod_seq(state, mod_seq);
            }
        }

        UntaggedResponse::Vanished(vanished) => {
            state.uids.remove_all(&vanished.uids);
            for uid in vanished.uids.iter() {
                state.seq_uids.retain(|_, known| *known != uid);
            }
            delta
                .qresync_events
                .push(QresyncEvent::Vanished(vanished.clone()));
        }

        UntaggedResponse::Fetch(attributes) => {
            delta.idle_events.push(IdleEvent::Fetch(attributes.sequence));

            if let Some(uid) = attributes.uid {
                state.uids.insert(uid);
                state.seq_uids.insert(attributes.sequence, uid);
            }

            if let Some(change) = flag_change(attributes) {
                delta.flag_changes.push(change);
            }
        }

        UntaggedResponse::Exists(count) => {
            state.expected_exists = Some(*count);
            delta.idle_events.push(IdleEvent::Exists(*count));
        }

        UntaggedResponse::Recent(count) => {
            delta.idle_events.push(IdleEvent::Recent(*count));
        }

        UntaggedResponse::Expunge(sequence) => {
            delta.idle_events.push(IdleEvent::Expunge(*sequence));

            if let Some(uid) = state.seq_uids.remove(sequence) {
                state.uids.remove(uid);
            }
            // Sequence numbers above the expunged one shift down.
            let shifted: Vec<(u32, u32)> = state
                .seq_uids
                .range((sequence + 1)..)
                .map(|(seq, uid)| (*seq, *uid))
                .collect();
            for (seq, uid) in shifted {
                state.seq_uids.remove(&seq);
                state.seq_uids.insert(seq - 1, uid);
            }
            if let Some(expected) = state.expected_exists.as_mut() {
                *expected = expected.saturating_sub(1);
            }
        }

        other => {
            trace!("selected-state reducer ignoring {:?}", other);
        }
    }
}

fn apply_code(state: &mut SelectedState, delta: &mut StateDelta, code: &ResponseCode) {
    match code {
        ResponseCode::UidValidity(uid_validity) => {
            if state.uid_validity != Some(*uid_validity) {
                if state.uid_validity.is_some() {
                    trace!(
                        "UIDVALIDITY changed {:?} -> {}, resetting state",
                        state.uid_validity,
                        uid_validity
                    );
                }
                // A new UID space invalidates everything derived from the
                // old one.
                *state = SelectedState::new();
                state.uid_validity = Some(*uid_validity);
            }
        }
        ResponseCode::UidNext(uid_next) => {
            state.uid_next = Some(*uid_next);
        }
        ResponseCode::HighestModSeq(mod_seq) => {
            raise_mod_seq(state, *mod_seq);
            delta.qresync_events.push(QresyncEvent::HighestModSeq(*mod_seq));
        }
        _ => {}
    }
}

/// HIGHESTMODSEQ never decreases within one UIDVALIDITY.
fn raise_mod_seq(state: &mut SelectedState, mod_seq: u64) {
    if state.highest_mod_seq.map_or(true, |known| mod_seq > known) {
        state.highest_mod_seq = Some(mod_seq);
    }
}
