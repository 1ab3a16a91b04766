use bytes::Bytes;

/// A decoded RESP2 frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    /// `+OK`
    SimpleString(String),
    /// `-ERR ...`
    Error(String),
    /// `:42`
    Integer(i64),
    /// `$n\r\n...`
    BulkString(Bytes),
    /// `$-1` / `*-1`
    Null,
    /// `*n\r\n...`
    Array(Vec<RespValue>),
}

impl RespValue {
    /// Interpret as UTF-8 text, if this is a string-like frame
    #[must_use]
    pub fn as_text(&self) -> Option<String> {
        match self {
            RespValue::SimpleString(s) => Some(s.clone()),
            RespValue::BulkString(b) => Some(String::from_utf8_lossy(b).into_owned()),
            _ => None,
        }
    }

    /// Check for a server error reply
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, RespValue::Error(_))
    }

    /// Bulk string from text
    #[must_use]
    pub fn bulk(text: &str) -> Self {
        RespValue::BulkString(Bytes::copy_from_slice(text.as_bytes()))
    }

    /// Serialize to wire format
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_into(&mut out);
        out
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            RespValue::SimpleString(s) => out.extend_from_slice(format!("+{s}\r\n").as_bytes()),
            RespValue::Error(s) => out.extend_from_slice(format!("-{s}\r\n").as_bytes()),
            RespValue::Integer(n) => out.extend_from_slice(format!(":{n}\r\n").as_bytes()),
            RespValue::BulkString(b) => {
                out.extend_from_slice(format!("${}\r\n", b.len()).as_bytes());
                out.extend_from_slice(b);
                out.extend_from_slice(b"\r\n");
            }
            RespValue::Null => out.extend_from_slice(b"$-1\r\n"),
            RespValue::Array(items) => {
                out.extend_from_slice(format!("*{}\r\n", items.len()).as_bytes());
                for item in items {
                    item.encode_into(out);
                }
            }
        }
    }

    /// Decode a pub/sub `message` push into `(channel, payload)`
    #[must_use]
    pub fn as_pubsub_message(&self) -> Option<(String, String)> {
        let RespValue::Array(items) = self else {
            return None;
        };

        match items.as_slice() {
            [kind, channel, payload] if kind.as_text().as_deref() == Some("message") => {
                Some((channel.as_text()?, payload.as_text()?))
            }
            _ => None,
        }
    }
}
