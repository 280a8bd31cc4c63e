use std::time::Duration;

/// Time allowed for a single outbound WebSocket write.
pub const WS_WRITE_WAIT: Duration = Duration::from_secs(30);

/// Default period between keepalive pings while a socket is open.
pub const WS_PING_PERIOD: Duration = Duration::from_secs(30);

/// Maximum inbound message size in bytes (16 MB).
///
/// Long research replies arrive as many small chunks, so a single frame
/// anywhere near this size means the peer is misbehaving.
pub const WS_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Capacity of the per-socket outbound write channel.
pub const WS_WRITE_QUEUE_CAPACITY: usize = 256;

/// Delay before the first reconnection attempt.
pub const RECONNECT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Maximum number of automatic reconnection attempts after an
/// unexpected close.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Close code sent when the client tears a socket down on purpose.
pub const WS_CLOSE_NORMAL: u16 = 1000;

/// Close code a peer sends when it is going away (server restart, tab close).
pub const WS_CLOSE_GOING_AWAY: u16 = 1001;

/// Returns `true` if a close code denotes an orderly shutdown.
pub fn is_normal_close(code: u16) -> bool {
    code == WS_CLOSE_NORMAL || code == WS_CLOSE_GOING_AWAY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_close_codes() {
        assert!(is_normal_close(1000));
        assert!(is_normal_close(1001));
        assert!(!is_normal_close(1006));
        assert!(!is_normal_close(1011));
    }

    #[test]
    fn reconnect_defaults() {
        assert_eq!(MAX_RECONNECT_ATTEMPTS, 5);
        assert_eq!(RECONNECT_BASE_DELAY, Duration::from_secs(1));
    }
}
