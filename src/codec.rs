//! Line-oriented textual encoding of ring messages.
//!
//! The on-wire text is a brace-delimited, tab-indented three-line record:
//!
//! ```text
//! {
//!     "source": 42,
//!     "type": 1,
//!     "value": something
//! }
//! ```
//!
//! (the indentation is a single tab character and `value` is written raw,
//! without quoting). `encode` is total; `decode` tolerates a missing
//! trailing comma and yields `None` on anything else malformed, so callers
//! can drop the datum and keep reading.

use crate::message::{Kind, Message};

const SOURCE_PREFIX: &str = "\t\"source\": ";
const TYPE_PREFIX: &str = "\t\"type\": ";
const VALUE_PREFIX: &str = "\t\"value\": ";

pub fn encode(msg: &Message) -> String {
    format!(
        "{{\n{}{},\n{}{},\n{}{}\n}}",
        SOURCE_PREFIX,
        msg.source,
        TYPE_PREFIX,
        msg.kind.code(),
        VALUE_PREFIX,
        msg.value
    )
}

pub fn decode(text: &str) -> Option<Message> {
    let mut lines = text.lines();
    if lines.next()? != "{" {
        return None;
    }
    let source = field(lines.next()?, SOURCE_PREFIX)?.parse().ok()?;
    let code = field(lines.next()?, TYPE_PREFIX)?.parse().ok()?;
    let kind = Kind::from_code(code)?;
    let value = lines.next()?.strip_prefix(VALUE_PREFIX)?;
    Some(Message::new(source, kind, value))
}

fn field<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(prefix)?;
    Some(rest.strip_suffix(',').unwrap_or(rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding_is_bit_exact() {
        let msg = Message::new(42, Kind::ElectionStart, "something");
        assert_eq!(
            encode(&msg),
            "{\n\t\"source\": 42,\n\t\"type\": 1,\n\t\"value\": something\n}"
        );
    }

    #[test]
    fn round_trip() {
        let msg = Message::new(5584, Kind::ElectionStart, "iorjjkgfd");
        assert_eq!(decode(&encode(&msg)), Some(msg));
    }

    #[test]
    fn round_trip_preserves_an_empty_value() {
        let msg = Message::greetings(65535);
        assert_eq!(decode(&encode(&msg)), Some(msg));
    }

    #[test]
    fn value_may_contain_separators() {
        let msg = Message::new(1, Kind::ElectedLeader, "a, \"b\": {c}");
        assert_eq!(decode(&encode(&msg)), Some(msg));
    }

    #[test]
    fn decode_tolerates_a_trailing_comma_on_numeric_fields() {
        let text = "{\n\t\"source\": 7,\n\t\"type\": 0,\n\t\"value\": x\n}";
        let msg = decode(text).expect("should decode");
        assert_eq!(msg.source, 7);
        assert_eq!(msg.kind, Kind::Greetings);
    }

    #[test]
    fn malformed_records_fail_to_decode() {
        // not a record at all
        assert_eq!(decode("garbage"), None);
        // missing opening brace
        assert_eq!(decode("\t\"source\": 1,\n\t\"type\": 0,\n"), None);
        // unknown type code
        let text = "{\n\t\"source\": 1,\n\t\"type\": 9,\n\t\"value\": x\n}";
        assert_eq!(decode(text), None);
        // non-numeric source
        let text = "{\n\t\"source\": abc,\n\t\"type\": 0,\n\t\"value\": x\n}";
        assert_eq!(decode(text), None);
        // truncated record
        assert_eq!(decode("{\n\t\"source\": 1,\n"), None);
    }
}
