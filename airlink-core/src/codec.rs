//! Payload codec: fixed-capacity buffers, silent truncation, handshake token.

/// Largest payload carried in one datagram. Longer input is truncated, never
/// split or rejected.
pub const MAX_PAYLOAD_LEN: usize = 200;

/// Reserved payload confirming mutual readiness. Recognized by exact
/// byte/length match only; a compliant deployment must not send it as user
/// data.
pub const HANDSHAKE_TOKEN: &[u8] = b"ESPNOW_HELLO_RC";

/// Fixed-capacity payload buffer. One instance holds the outbound payload,
/// one the most recent inbound payload; neither is ever resized.
#[derive(Debug, Clone)]
pub struct MessageBuf {
    buf: [u8; MAX_PAYLOAD_LEN],
    len: usize,
}

impl MessageBuf {
    pub const fn new() -> Self {
        Self {
            buf: [0; MAX_PAYLOAD_LEN],
            len: 0,
        }
    }

    /// Copy `payload` in, truncating at capacity. Returns the stored length.
    pub fn store(&mut self, payload: &[u8]) -> usize {
        let n = payload.len().min(MAX_PAYLOAD_LEN);
        self.buf[..n].copy_from_slice(&payload[..n]);
        self.len = n;
        n
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Exact match against the handshake token.
    pub fn is_handshake(&self) -> bool {
        self.as_bytes() == HANDSHAKE_TOKEN
    }
}

impl Default for MessageBuf {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_keeps_payload_under_limit() {
        let mut buf = MessageBuf::new();
        assert_eq!(buf.store(b"hello"), 5);
        assert_eq!(buf.as_bytes(), b"hello");
    }

    #[test]
    fn store_truncates_at_limit() {
        let payload: Vec<u8> = (0..=255u8).chain(0..=255u8).collect();
        let mut buf = MessageBuf::new();
        assert_eq!(buf.store(&payload), MAX_PAYLOAD_LEN);
        assert_eq!(buf.as_bytes(), &payload[..MAX_PAYLOAD_LEN]);
    }

    #[test]
    fn store_at_exactly_limit_is_unchanged() {
        let payload = vec![0x5A; MAX_PAYLOAD_LEN];
        let mut buf = MessageBuf::new();
        assert_eq!(buf.store(&payload), MAX_PAYLOAD_LEN);
        assert_eq!(buf.as_bytes(), payload.as_slice());
    }

    #[test]
    fn handshake_requires_exact_match() {
        let mut buf = MessageBuf::new();
        buf.store(HANDSHAKE_TOKEN);
        assert!(buf.is_handshake());

        let mut longer = HANDSHAKE_TOKEN.to_vec();
        longer.push(b'!');
        buf.store(&longer);
        assert!(!buf.is_handshake());

        buf.store(&HANDSHAKE_TOKEN[..HANDSHAKE_TOKEN.len() - 1]);
        assert!(!buf.is_handshake());
    }

    #[test]
    fn clear_empties_buffer() {
        let mut buf = MessageBuf::new();
        buf.store(b"payload");
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.as_bytes(), b"");
    }
}
