use std::borrow::Cow;

/// Repairs a byte string into valid UTF-8
///
/// Byte sequences that fail to decode are dropped outright; valid runs on
/// either side are kept verbatim. No replacement character is inserted, so the
/// output is never longer than the input and repairing twice is a no-op.
pub fn repair_utf8(bytes: &[u8]) -> Cow<'_, str> {
    if let Ok(valid) = std::str::from_utf8(bytes) {
        return Cow::Borrowed(valid);
    }

    let mut repaired = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        repaired.push_str(chunk.valid());
    }
    Cow::Owned(repaired)
}
