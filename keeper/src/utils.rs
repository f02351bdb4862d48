use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Milliseconds since the unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// VRF input for an attempt starting at `ms`: the decimal timestamp as UTF-8.
pub fn alpha_from_millis(ms: u64) -> Vec<u8> {
    ms.to_string().into_bytes()
}

/// Time left until `end_ms`, never negative.
pub fn wait_until(end_ms: u64, now_ms: u64) -> Duration {
    Duration::from_millis(end_ms.saturating_sub(now_ms))
}

/// Decode a hex string, tolerating a leading `0x`.
pub fn decode_hex(s: &str) -> Result<Vec<u8>, hex::FromHexError> {
    let s = s.trim();
    hex::decode(s.strip_prefix("0x").unwrap_or(s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_hex_to_bytes() {
        assert_eq!(decode_hex("00ff").unwrap(), vec![0u8, 255]);
        assert_eq!(decode_hex("0x00ff").unwrap(), vec![0u8, 255]);
        assert!(decode_hex("0g").is_err());
    }

    #[test]
    fn test_alpha_is_decimal_utf8() {
        let alpha = alpha_from_millis(1_700_000_000_000);
        assert_eq!(alpha, b"1700000000000".to_vec());
        assert_eq!(hex::encode(&alpha), "31373030303030303030303030");
    }

    #[test]
    fn test_wait_never_negative() {
        assert_eq!(wait_until(1_000, 5_000), Duration::ZERO);
        assert_eq!(wait_until(5_000, 5_000), Duration::ZERO);
        assert_eq!(wait_until(6_000, 5_000), Duration::from_millis(1_000));
    }
}
