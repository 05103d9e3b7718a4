use time::OffsetDateTime;

/// Source of task and subtask identifiers.
///
/// Ids are decimal millisecond timestamps so that a larger id means a more
/// recently created task; the "recent" sort order relies on that.
pub trait IdSource {
    fn next_id(&mut self) -> String;
}

/// Wall-clock ids, strictly increasing within one instance.
#[derive(Debug, Default)]
pub struct ClockIds {
    last: i128,
}

impl ClockIds {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdSource for ClockIds {
    fn next_id(&mut self) -> String {
        let now_ms = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
        let id = if now_ms > self.last { now_ms } else { self.last + 1 };
        self.last = id;
        id.to_string()
    }
}

/// Deterministic ids counting up from a starting value.
#[derive(Debug)]
pub struct SequentialIds {
    next: u64,
}

impl SequentialIds {
    pub fn starting_at(next: u64) -> Self {
        Self { next }
    }
}

impl IdSource for SequentialIds {
    fn next_id(&mut self) -> String {
        let id = self.next;
        self.next += 1;
        id.to_string()
    }
}

/// Numeric value of an id for recency comparisons. Non-numeric ids sort as oldest.
pub fn recency_key(id: &str) -> i128 {
    id.trim().parse::<i128>().unwrap_or(i128::MIN)
}
