use alloy::primitives::Address;
use alloy::sol;

// ── ERC20 contract interface ───────────────────────────────────────

sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    contract IERC20 {
        function balanceOf(address account) external view returns (uint256);
        function decimals() external view returns (uint8);
        function symbol() external view returns (string);
        function name() external view returns (string);
        function transfer(address to, uint256 amount) external returns (bool);
    }
}

// ── Address helpers ────────────────────────────────────────────────

/// Strict form check: `0x` followed by exactly 40 hex characters.
pub fn is_hex_address(s: &str) -> bool {
    s.strip_prefix("0x")
        .is_some_and(|hex| hex.len() == 40 && hex.bytes().all(|b| b.is_ascii_hexdigit()))
}

/// Parse an address that passed [`is_hex_address`]. Checksums are not enforced
/// since users paste lowercase addresses from explorers.
pub fn parse_address(s: &str) -> Option<Address> {
    if !is_hex_address(s) {
        return None;
    }
    s.parse().ok()
}

/// Shorten a hex string for display: `0x1234…abcd`.
pub fn short_hex(s: &str) -> String {
    if s.len() > 12 {
        format!("{}…{}", &s[..6], &s[s.len() - 4..])
    } else {
        s.to_string()
    }
}

/// Format an address for display (shortened, checksummed).
pub fn short_addr(addr: &Address) -> String {
    short_hex(&addr.to_checksum(None))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_form_check() {
        assert!(is_hex_address("0x1111111111111111111111111111111111111111"));
        assert!(is_hex_address("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"));
        assert!(!is_hex_address("1111111111111111111111111111111111111111"));
        assert!(!is_hex_address("0x111111111111111111111111111111111111111"));
        assert!(!is_hex_address("0x111111111111111111111111111111111111111g"));
    }

    #[test]
    fn shortens_long_hex() {
        assert_eq!(short_hex("0xdeadbeef"), "0xdeadbeef");
        assert_eq!(
            short_hex("0x5c504ed432cb51138bcf09aa5e8a410dd4a1e204ef84bfed1be16dfba1b22060"),
            "0x5c50…2060"
        );
    }
}
