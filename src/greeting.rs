//! The one line every server writes before closing a connection.
//!
//! Two shapes exist on the wire:
//!
//! ```text
//! The time is 2024-03-09 14:02:11.532907\n
//! Server id: 1, The time is 2024-03-09 14:02:11.532907\n
//! ```
//!
//! The second shape is used by the forking server so a client can tell which
//! process answered.

use bytes::{BufMut, Bytes, BytesMut};
use chrono::{DateTime, Local, NaiveDateTime, SubsecRound};
use std::fmt;

/// strftime pattern of the timestamp part.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

const TIME_PREFIX: &str = "The time is ";
const ID_PREFIX: &str = "Server id: ";
const ID_SEPARATOR: &str = ", ";

/// Identity of a process in the forking server.
///
/// `0` is the parent that bound the socket, `1..=N` are its replicas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServerId(pub usize);

impl ServerId {
    pub const PARENT: ServerId = ServerId(0);

    pub fn is_parent(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single time announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Greeting {
    pub server_id: Option<ServerId>,
    pub time: NaiveDateTime,
}

impl Greeting {
    /// Greeting stamped with the current local time.
    pub fn now(server_id: Option<ServerId>) -> Self {
        Self::at(server_id, Local::now())
    }

    /// The wire format carries microseconds, so finer precision is dropped here.
    pub fn at(server_id: Option<ServerId>, time: DateTime<Local>) -> Self {
        Self {
            server_id,
            time: time.trunc_subsecs(6).naive_local(),
        }
    }

    /// Wire bytes, including the trailing `\n`.
    pub fn encode(&self) -> Bytes {
        let line = self.to_string();
        let mut buf = BytesMut::with_capacity(line.len() + 1);
        buf.put_slice(line.as_bytes());
        buf.put_u8(b'\n');
        buf.freeze()
    }

    /// Parse one received line. A trailing `\n` or `\r\n` is ignored.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let line = line.trim_end_matches(['\r', '\n']);

        let (server_id, rest) = match line.strip_prefix(ID_PREFIX) {
            Some(rest) => {
                let (id, rest) = rest
                    .split_once(ID_SEPARATOR)
                    .ok_or(ParseError::Shape)?;
                let id = id.parse().map_err(|_| ParseError::ServerId(id.to_string()))?;
                (Some(ServerId(id)), rest)
            }
            None => (None, line),
        };

        let stamp = rest.strip_prefix(TIME_PREFIX).ok_or(ParseError::Shape)?;
        let time = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT)
            .map_err(|_| ParseError::Timestamp(stamp.to_string()))?;

        Ok(Self { server_id, time })
    }
}

impl fmt::Display for Greeting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(id) = self.server_id {
            write!(f, "{ID_PREFIX}{id}{ID_SEPARATOR}")?;
        }
        write!(f, "{TIME_PREFIX}{}", self.time.format(TIMESTAMP_FORMAT))
    }
}

/// Reasons a received line is not a greeting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    Shape,
    ServerId(String),
    Timestamp(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Shape => write!(f, "line is not a time greeting"),
            ParseError::ServerId(id) => write!(f, "invalid server id '{id}'"),
            ParseError::Timestamp(ts) => write!(f, "invalid timestamp '{ts}'"),
        }
    }
}

impl std::error::Error for ParseError {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn fixed_time() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_micro_opt(14, 2, 11, 532_907)
            .unwrap()
    }

    #[test]
    fn test_encode_plain() {
        let greeting = Greeting {
            server_id: None,
            time: fixed_time(),
        };
        assert_eq!(
            &greeting.encode()[..],
            b"The time is 2024-03-09 14:02:11.532907\n"
        );
    }

    #[test]
    fn test_encode_with_server_id() {
        let greeting = Greeting {
            server_id: Some(ServerId(2)),
            time: fixed_time(),
        };
        assert_eq!(
            &greeting.encode()[..],
            b"Server id: 2, The time is 2024-03-09 14:02:11.532907\n"
        );
    }

    #[test]
    fn test_parse_both_shapes() {
        let plain = Greeting::parse("The time is 2024-03-09 14:02:11.532907\n").unwrap();
        assert_eq!(plain.server_id, None);
        assert_eq!(plain.time, fixed_time());

        let tagged =
            Greeting::parse("Server id: 0, The time is 2024-03-09 14:02:11.532907\r\n").unwrap();
        assert_eq!(tagged.server_id, Some(ServerId::PARENT));
        assert!(tagged.server_id.unwrap().is_parent());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(Greeting::parse("hello"), Err(ParseError::Shape));
        assert_eq!(
            Greeting::parse("Server id: x, The time is 2024-03-09 14:02:11.532907"),
            Err(ParseError::ServerId("x".to_string()))
        );
        assert_eq!(
            Greeting::parse("The time is yesterday"),
            Err(ParseError::Timestamp("yesterday".to_string()))
        );
        assert_eq!(Greeting::parse("Server id: 1"), Err(ParseError::Shape));
    }

    #[test]
    fn test_now_is_parseable() {
        let greeting = Greeting::now(Some(ServerId(1)));
        let line = String::from_utf8(greeting.encode().to_vec()).unwrap();
        assert!(line.ends_with('\n'));
        assert_eq!(Greeting::parse(&line).unwrap(), greeting);
    }
}
