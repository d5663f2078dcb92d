//! Flat string-keyed encoding of a [`SessionDescriptor`].
//!
//! Decoding never fails. Anything that does not parse is simply absent, so a
//! mangled link degrades to an idle screen instead of a timeline anchored at
//! the epoch.

use std::collections::BTreeMap;

use super::{SessionDescriptor, SessionMode};

pub type ParamMap = BTreeMap<String, String>;

pub const MODE_KEY: &str = "mode";
pub const START_KEY: &str = "start";
pub const DURATION_KEY: &str = "duration";
pub const TARGET_KEY: &str = "target";

/// Every key the codec owns. Anything else in a link belongs to someone else.
pub const DESCRIPTOR_KEYS: [&str; 4] = [MODE_KEY, START_KEY, DURATION_KEY, TARGET_KEY];

pub fn decode(params: &ParamMap) -> SessionDescriptor {
    let mode = params
        .get(MODE_KEY)
        .map(|value| SessionMode::from_param(value.trim()))
        .unwrap_or_default();

    let field = |key: &str| params.get(key).and_then(|raw| parse_positive(raw));

    match mode {
        SessionMode::Home => SessionDescriptor::home(),
        SessionMode::Stopwatch => SessionDescriptor {
            mode,
            anchor_start: field(START_KEY),
            ..SessionDescriptor::default()
        },
        SessionMode::Timer => SessionDescriptor {
            mode,
            anchor_start: field(START_KEY),
            duration: field(DURATION_KEY),
            ..SessionDescriptor::default()
        },
        SessionMode::Alarm => SessionDescriptor {
            mode,
            target_time: field(TARGET_KEY),
            ..SessionDescriptor::default()
        },
    }
}

/// Emits the mode plus only the fields that mode uses.
pub fn encode(descriptor: &SessionDescriptor) -> ParamMap {
    let mut params = ParamMap::new();
    if descriptor.mode == SessionMode::Home {
        return params;
    }

    params.insert(MODE_KEY.into(), descriptor.mode.as_str().into());
    let mut put = |key: &str, value: Option<i64>| {
        if let Some(value) = value {
            params.insert(key.into(), value.to_string());
        }
    };

    match descriptor.mode {
        SessionMode::Stopwatch => put(START_KEY, descriptor.anchor_start),
        SessionMode::Timer => {
            put(START_KEY, descriptor.anchor_start);
            put(DURATION_KEY, descriptor.duration);
        }
        SessionMode::Alarm => put(TARGET_KEY, descriptor.target_time),
        SessionMode::Home => {}
    }

    params
}

pub fn clear() -> ParamMap {
    ParamMap::new()
}

fn parse_positive(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok().filter(|value| *value > 0)
}
