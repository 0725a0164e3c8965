//! Process-global recording-time-offset state.
//!
//! All channels of a session share one anonymization offset, derived once
//! from the first block (or record) ever written while offsetting is
//! active. Because channels may be driven from parallel threads, the slot
//! lives behind a mutex and the derivation is one-shot: whichever writer
//! gets there first wins, everyone else reads.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Timelike, Utc};

use crate::types::TimeOffsetMode;

struct TimeOffsetState {
    mode: TimeOffsetMode,
    recording_time_offset: Option<i64>,
    gmt_offset_seconds: i32,
}

static TIME_OFFSETS: Mutex<TimeOffsetState> = Mutex::new(TimeOffsetState {
    mode: TimeOffsetMode::Ignore,
    recording_time_offset: None,
    gmt_offset_seconds: 0,
});

fn state() -> std::sync::MutexGuard<'static, TimeOffsetState> {
    TIME_OFFSETS.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Turns timestamp anonymization on or off for the whole process.
/// The default is [`TimeOffsetMode::Ignore`].
pub fn set_time_offset_mode(mode: TimeOffsetMode) {
    state().mode = mode;
}

pub fn time_offset_mode() -> TimeOffsetMode {
    state().mode
}

/// The session's recording time offset, if one has been derived (or
/// installed by appending to an existing session).
pub fn recording_time_offset() -> Option<i64> {
    state().recording_time_offset
}

pub fn gmt_offset_seconds() -> i32 {
    state().gmt_offset_seconds
}

/// Derives the session offset from the first real timestamp if no offset
/// exists yet; returns the offset in effect either way.
pub(crate) fn ensure_recording_time_offset(timestamp: i64, gmt_offset_seconds: i32) -> i64 {
    let mut st = state();
    match st.recording_time_offset {
        Some(offset) => offset,
        None => {
            let offset = derive_recording_time_offset(timestamp, gmt_offset_seconds);
            st.recording_time_offset = Some(offset);
            st.gmt_offset_seconds = gmt_offset_seconds;
            offset
        }
    }
}

/// Adopts offsets read back from an existing session (the append path).
pub(crate) fn install_offsets(recording_time_offset: i64, gmt_offset_seconds: i32) {
    let mut st = state();
    if recording_time_offset != 0 {
        st.recording_time_offset = Some(recording_time_offset);
    }
    st.gmt_offset_seconds = gmt_offset_seconds;
}

/// Applies the session offset to a timestamp destined for an unencrypted
/// header field. Identity while offsetting is off or no offset exists.
///
/// Offset timestamps follow the oUTC convention: `offset − t`, so they are
/// negative and *decrease* as real time advances. Decoders re-apply the
/// offset stored in metadata section 3 to recover real time.
pub fn apply_recording_time_offset(t: i64) -> i64 {
    let st = state();
    match (st.mode, st.recording_time_offset) {
        (TimeOffsetMode::Apply, Some(offset)) => offset - t,
        _ => t,
    }
}

/// The offset is the µUTC instant of the most recent local midnight before
/// `timestamp`: anonymized times keep their time of day but lose the date.
pub fn derive_recording_time_offset(timestamp: i64, gmt_offset_seconds: i32) -> i64 {
    let local = timestamp + gmt_offset_seconds as i64 * 1_000_000;
    let micros_past_midnight = match DateTime::<Utc>::from_timestamp_micros(local) {
        Some(dt) => {
            dt.num_seconds_from_midnight() as i64 * 1_000_000 + dt.timestamp_subsec_micros() as i64
        }
        // out of chrono's range; fall back to plain day arithmetic
        None => local.rem_euclid(86_400_000_000),
    };
    timestamp - micros_past_midnight
}

#[cfg(test)]
pub(crate) fn reset_for_tests() {
    let mut st = state();
    st.mode = TimeOffsetMode::Ignore;
    st.recording_time_offset = None;
    st.gmt_offset_seconds = 0;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_offset_lands_on_local_midnight() {
        // 2000-01-01 00:00:00 UTC
        let ts = 946_684_800_000_000i64;
        // GMT-6: local time is 1999-12-31 18:00, so the offset points at
        // 1999-12-31 18:00 UTC minus 18 hours of local day
        let offset = derive_recording_time_offset(ts, -6 * 3600);
        assert_eq!(ts - offset, 18 * 3600 * 1_000_000);

        // at GMT 0 the timestamp is exactly local midnight
        assert_eq!(derive_recording_time_offset(ts, 0), ts);

        // sub-second components survive
        let offset = derive_recording_time_offset(ts + 1_500_000, 0);
        assert_eq!(offset, ts);
    }

    #[test]
    fn test_one_shot_derivation_and_apply() {
        reset_for_tests();
        set_time_offset_mode(TimeOffsetMode::Apply);

        let ts = 946_684_800_000_000i64;
        let offset = ensure_recording_time_offset(ts, -6 * 3600);
        assert_eq!(recording_time_offset(), Some(offset));
        // a later call must not re-derive
        assert_eq!(ensure_recording_time_offset(ts + 9_999_999, 0), offset);
        assert_eq!(gmt_offset_seconds(), -6 * 3600);

        // offset times are negative and decrease as real time advances
        let t0 = apply_recording_time_offset(ts);
        let t1 = apply_recording_time_offset(ts + 1_000_000);
        assert!(t0 < 0);
        assert_eq!(t1, t0 - 1_000_000);

        reset_for_tests();
        assert_eq!(apply_recording_time_offset(ts), ts);
    }
}
