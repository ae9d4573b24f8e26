//! Offline decoding of the bridge contract's signed transactions.
//!
//! The contract signs EIP-1559 (type 2) envelopes whose calldata is an
//! ERC-20 `transfer` on the USDC token.

use alloy::consensus::{TxEip1559, TxEnvelope};
use alloy::eips::eip2718::Decodable2718;
use alloy::sol;
use alloy::sol_types::SolCall;
use nearbridge_types::{BridgeError, Result};

sol! {
    interface IERC20 {
        function transfer(address to, uint256 amount) external returns (bool);
        function balanceOf(address account) external view returns (uint256 balance);
    }
}

/// Decode a signed type-2 transaction. Other envelope types are rejected.
pub fn decode_signed_transaction(raw: &[u8]) -> Result<TxEip1559> {
    if raw.is_empty() {
        return Err(BridgeError::Serialization("empty signed transaction".into()));
    }
    let envelope = TxEnvelope::decode_2718(&mut &raw[..])
        .map_err(|e| BridgeError::Serialization(format!("invalid signed transaction: {}", e)))?;
    match envelope {
        TxEnvelope::Eip1559(signed) => Ok(signed.tx().clone()),
        other => Err(BridgeError::Serialization(format!(
            "unsupported transaction type 0x{:02x}",
            u8::from(other.tx_type())
        ))),
    }
}

/// Recipient and amount when `input` is an ERC-20 `transfer` call.
pub fn erc20_transfer(input: &[u8]) -> Option<IERC20::transferCall> {
    IERC20::transferCall::abi_decode(input, true).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Address, TxKind, U256};

    // Signed USDC transfer produced by the bridge contract on Sepolia.
    const SEPOLIA_SIGNED_TX: &str = "02f8b283aa36a701830f4cd885031ef4348082ea6094661c18a2a5db14cad34c62c3721febd1dfe94a1280b844a9059cbb0000000000000000000000008530748420d2a67d59e1fb0d2f33b71b51ff39650000000000000000000000000000000000000000000000000de0b6b3a7640000c080a0ee71ef343d4beedea5ce4ed614faddcd87adf9a71a434e999f5cc988e42fad55a01d5823bb5031b94a4586a937dfd09112f6964b68f84c5ac69788a15825e43b39";

    #[test]
    fn test_decode_sepolia_transaction() {
        let raw = hex::decode(SEPOLIA_SIGNED_TX).unwrap();
        let tx = decode_signed_transaction(&raw).unwrap();

        assert_eq!(tx.chain_id, 11155111);
        assert_eq!(tx.nonce, 1);
        assert_eq!(tx.max_priority_fee_per_gas, 1_002_712);
        assert_eq!(tx.max_fee_per_gas, 13_404_222_592);
        assert_eq!(tx.gas_limit, 60_000);
        let token: Address = "0x661c18a2a5db14cad34c62c3721febd1dfe94a12".parse().unwrap();
        assert_eq!(tx.to, TxKind::Call(token));
        assert_eq!(tx.value, U256::ZERO);

        let transfer = erc20_transfer(&tx.input).unwrap();
        assert_eq!(
            hex::encode(transfer.to.as_slice()),
            "8530748420d2a67d59e1fb0d2f33b71b51ff3965"
        );
        assert_eq!(transfer.amount, U256::from(1_000_000_000_000_000_000u128));
    }

    #[test]
    fn test_decode_rejects_other_types() {
        assert!(decode_signed_transaction(&[]).is_err());
        assert!(decode_signed_transaction(&[0x01, 0xc0]).is_err());
        // type 2 with an empty list
        assert!(decode_signed_transaction(&[0x02, 0xc0]).is_err());
    }

    #[test]
    fn test_erc20_calldata() {
        let to = Address::repeat_byte(0x11);
        let data = IERC20::transferCall {
            to,
            amount: U256::from(100_000u64),
        }
        .abi_encode();
        assert_eq!(data.len(), 68);
        assert_eq!(hex::encode(&data[..4]), "a9059cbb");

        let decoded = erc20_transfer(&data).unwrap();
        assert_eq!(decoded.to, to);
        assert_eq!(decoded.amount, U256::from(100_000u64));

        let balance_of = IERC20::balanceOfCall { account: to }.abi_encode();
        assert_eq!(hex::encode(&balance_of[..4]), "70a08231");
        assert!(erc20_transfer(&balance_of).is_none());
        assert!(erc20_transfer(&[0x60, 0x00]).is_none());
    }
}
