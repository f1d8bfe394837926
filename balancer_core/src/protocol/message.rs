use serde::{Serialize, Serializer};

/// Capacity of the diagnostic message in bytes.
pub const STATUS_MSG_CAPACITY: usize = 128;
/// Marks a message that was cut short.
pub const TRUNCATION_MARK: &str = " ...";

/// Fixed-capacity diagnostic text accumulated over one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusMessage(heapless::String<STATUS_MSG_CAPACITY>);

impl StatusMessage {
    pub fn new() -> Self {
        Self(heapless::String::new())
    }

    /// Append `text`. Returns false when it did not fit; the message then
    /// ends with [`TRUNCATION_MARK`].
    pub fn append(&mut self, text: &str) -> bool {
        if self.0.push_str(text).is_ok() {
            return true;
        }
        let room = STATUS_MSG_CAPACITY - self.0.len();
        let _ = self.0.push_str(&text[..floor_char_boundary(text, room)]);

        let current = self.0.as_str();
        let keep = floor_char_boundary(current, STATUS_MSG_CAPACITY - TRUNCATION_MARK.len());
        let mut cut = heapless::String::new();
        let _ = cut.push_str(&current[..keep]);
        let _ = cut.push_str(TRUNCATION_MARK);
        self.0 = cut;
        false
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Serialize for StatusMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl std::fmt::Display for StatusMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Largest index `<= max` that falls on a char boundary of `s`.
fn floor_char_boundary(s: &str, max: usize) -> usize {
    if max >= s.len() {
        return s.len();
    }
    let mut i = max;
    while !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}
