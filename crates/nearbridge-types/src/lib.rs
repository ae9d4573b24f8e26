use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// 0x-prefixed hex string (e.g. "0x02f8...").
pub type Hex = String;

/// USDC uses 6 decimals on both chains.
pub const USDC_DECIMALS: u32 = 6;

const USDC_UNIT: u128 = 10u128.pow(USDC_DECIMALS);

/// Structured rejection returned by an Ethereum node on broadcast.
///
/// `reason` is the node's message verbatim (e.g. "nonce too low").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayError {
    pub reason: String,
    pub code: Option<i64>,
    /// The raw transaction that was rejected, echoed back to the caller.
    pub transaction: Option<Hex>,
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reason)?;
        if let Some(code) = self.code {
            write!(f, " (code {})", code)?;
        }
        Ok(())
    }
}

/// Bridge client error types.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("connectivity error: {0}")]
    Connectivity(String),

    /// The NEAR RPC timed out, but the transaction may still have been accepted.
    #[error("NEAR submission timed out, transaction {tx_hash} may still execute")]
    SubmissionTimeout { tx_hash: String },

    #[error("NEAR error: {0}")]
    Near(String),

    #[error("relay rejected: {0}")]
    Relay(RelayError),

    #[error("confirmation failed: {0}")]
    Confirmation(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("invalid ethereum address: {0}")]
    InvalidAddress(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

/// Ethereum fee market and nonce parameters the bridge contract signs with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkDetails {
    pub max_priority_fee_per_gas: u128,
    pub max_fee_per_gas: u128,
    pub gas_limit: u128,
    pub chain_id: u64,
    pub eth_nonce: u64,
}

/// Payload forwarded through the `msg` field of `ft_transfer_call`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeRequest {
    /// Recipient address, 40 hex chars without the 0x prefix.
    pub eth_address: String,
    pub network_details: NetworkDetails,
}

impl BridgeRequest {
    /// JSON encoding used as the `ft_transfer_call` message.
    pub fn to_msg(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// A fully signed Ethereum transaction as produced by the bridge contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignedTransaction(pub Vec<u8>);

impl SignedTransaction {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Lowercase 0x-prefixed hex, the form `eth_sendRawTransaction` expects.
    pub fn to_hex(&self) -> Hex {
        bytes_to_hex(&self.0)
    }
}

/// Strip an optional 0x / 0X prefix.
pub fn strip_0x(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

/// Normalize a recipient address: strip the prefix and require 20 bytes of hex.
///
/// Case is preserved; checksums are not verified.
pub fn normalize_eth_address(address: &str) -> Result<String> {
    let stripped = strip_0x(address.trim());
    if stripped.len() != 40 || !stripped.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(BridgeError::InvalidAddress(address.to_string()));
    }
    Ok(stripped.to_string())
}

/// Parse a hex string to bytes.
pub fn hex_to_bytes(hex_str: &str) -> Result<Vec<u8>> {
    hex::decode(strip_0x(hex_str)).map_err(|e| BridgeError::InvalidHex(e.to_string()))
}

/// Convert bytes to a 0x-prefixed hex string.
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Parse a JSON-RPC quantity ("0x3b9aca00") into an integer.
pub fn hex_quantity_to_u128(quantity: &str) -> Result<u128> {
    let digits = strip_0x(quantity);
    if digits.is_empty() {
        return Err(BridgeError::InvalidHex(quantity.to_string()));
    }
    u128::from_str_radix(digits, 16).map_err(|e| BridgeError::InvalidHex(format!("{}: {}", quantity, e)))
}

/// Same as [`hex_quantity_to_u128`] for values that must fit in 64 bits.
pub fn hex_quantity_to_u64(quantity: &str) -> Result<u64> {
    let value = hex_quantity_to_u128(quantity)?;
    u64::try_from(value).map_err(|_| BridgeError::InvalidHex(format!("{} overflows u64", quantity)))
}

/// Convert a decimal USDC amount ("10", "0.25") to its smallest-unit string.
///
/// At most 6 fractional digits are accepted, so the conversion is exact.
pub fn parse_usdc_amount(amount: &str) -> Result<String> {
    let amount = amount.trim();
    let invalid = || BridgeError::InvalidAmount(amount.to_string());

    let (whole, frac) = match amount.split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (amount, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(invalid());
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    if frac.len() > USDC_DECIMALS as usize {
        return Err(BridgeError::InvalidAmount(format!(
            "{} has more than {} decimal places",
            amount, USDC_DECIMALS
        )));
    }

    let whole_units: u128 = if whole.is_empty() { 0 } else { whole.parse().map_err(|_| invalid())? };
    let padded = format!("{:0<width$}", frac, width = USDC_DECIMALS as usize);
    let frac_units: u128 = padded.parse().map_err(|_| invalid())?;

    let total = whole_units
        .checked_mul(USDC_UNIT)
        .and_then(|v| v.checked_add(frac_units))
        .ok_or_else(invalid)?;
    if total == 0 {
        return Err(BridgeError::InvalidAmount(format!("{} must be positive", amount)));
    }
    Ok(total.to_string())
}

/// Format a smallest-unit balance for display with two decimals, rounding half up.
pub fn format_usdc_amount(units: u128) -> String {
    let cents = units.saturating_add(USDC_UNIT / 200) / (USDC_UNIT / 100);
    format!("{}.{:02}", cents / 100, cents % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_usdc_amount() {
        assert_eq!(parse_usdc_amount("10").unwrap(), "10000000");
        assert_eq!(parse_usdc_amount("0.1").unwrap(), "100000");
        assert_eq!(parse_usdc_amount("1.234567").unwrap(), "1234567");
        assert_eq!(parse_usdc_amount(".5").unwrap(), "500000");
    }

    #[test]
    fn test_parse_usdc_amount_rejects_bad_input() {
        for bad in ["", ".", "abc", "-1", "1.2345678", "0", "0.000000", "1e6"] {
            assert!(parse_usdc_amount(bad).is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_format_usdc_amount() {
        assert_eq!(format_usdc_amount(1_234_567), "1.23");
        assert_eq!(format_usdc_amount(1_235_000), "1.24");
        assert_eq!(format_usdc_amount(0), "0.00");
        assert_eq!(format_usdc_amount(10_000_000), "10.00");
    }

    #[test]
    fn test_normalize_eth_address() {
        let addr = "8530748420d2A67D59E1fb0d2f33b71B51Ff3965";
        assert_eq!(normalize_eth_address(addr).unwrap(), addr);
        assert_eq!(normalize_eth_address(&format!("0x{}", addr)).unwrap(), addr);
        assert!(normalize_eth_address("0x1234").is_err());
        assert!(normalize_eth_address("zz30748420d2A67D59E1fb0d2f33b71B51Ff3965").is_err());
    }

    #[test]
    fn test_signed_transaction_hex() {
        let tx = SignedTransaction(vec![2, 248, 178, 131, 0, 15]);
        assert_eq!(tx.to_hex(), "0x02f8b283000f");

        let parsed: SignedTransaction = serde_json::from_str("[2,248,10]").unwrap();
        assert_eq!(parsed.to_hex(), "0x02f80a");
    }

    #[test]
    fn test_hex_quantity() {
        assert_eq!(hex_quantity_to_u128("0x3b9aca00").unwrap(), 1_000_000_000);
        assert_eq!(hex_quantity_to_u64("0x0").unwrap(), 0);
        assert!(hex_quantity_to_u128("0x").is_err());
        assert!(hex_quantity_to_u128("0xzz").is_err());
    }

    #[test]
    fn test_bridge_request_msg_uses_plain_integers() {
        let request = BridgeRequest {
            eth_address: "8530748420d2A67D59E1fb0d2f33b71B51Ff3965".into(),
            network_details: NetworkDetails {
                max_priority_fee_per_gas: 1_000_000_000,
                max_fee_per_gas: 2_000_000_000,
                gas_limit: 60_000,
                chain_id: 11155111,
                eth_nonce: 7,
            },
        };
        let msg = request.to_msg().unwrap();
        let value: serde_json::Value = serde_json::from_str(&msg).unwrap();
        assert_eq!(value["eth_address"], "8530748420d2A67D59E1fb0d2f33b71B51Ff3965");
        assert_eq!(value["network_details"]["max_priority_fee_per_gas"], 1_000_000_000u64);
        assert_eq!(value["network_details"]["max_fee_per_gas"], 2_000_000_000u64);
        assert_eq!(value["network_details"]["gas_limit"], 60_000);
        assert_eq!(value["network_details"]["chain_id"], 11155111);
        assert_eq!(value["network_details"]["eth_nonce"], 7);
    }

    #[test]
    fn test_relay_error_display_keeps_reason() {
        let err = BridgeError::Relay(RelayError {
            reason: "nonce too low".into(),
            code: Some(-32000),
            transaction: None,
        });
        assert_eq!(err.to_string(), "relay rejected: nonce too low (code -32000)");
    }
}
