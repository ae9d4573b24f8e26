//! Borsh wire format for NEAR transactions carrying a single function call.

use borsh::BorshSerialize;
use sha2::{Digest, Sha256};
use std::io;

use nearbridge_types::{BridgeError, Result};

use crate::signer::InMemorySigner;
use crate::FunctionCall;

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize)]
pub enum PublicKey {
    Ed25519([u8; 32]),
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize)]
pub enum Signature {
    Ed25519([u8; 64]),
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize)]
pub struct FunctionCallAction {
    pub method_name: String,
    pub args: Vec<u8>,
    pub gas: u64,
    pub deposit: u128,
}

/// Only the action kind the bridge sends is modelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    FunctionCall(FunctionCallAction),
}

impl Action {
    const FUNCTION_CALL_TAG: u8 = 2;
}

impl BorshSerialize for Action {
    fn serialize<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        match self {
            Action::FunctionCall(call) => {
                Self::FUNCTION_CALL_TAG.serialize(writer)?;
                call.serialize(writer)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize)]
pub struct Transaction {
    pub signer_id: String,
    pub public_key: PublicKey,
    pub nonce: u64,
    pub receiver_id: String,
    pub block_hash: [u8; 32],
    pub actions: Vec<Action>,
}

impl Transaction {
    pub fn function_call(
        signer: &InMemorySigner,
        nonce: u64,
        block_hash: [u8; 32],
        call: &FunctionCall,
    ) -> Self {
        Self {
            signer_id: signer.account_id.clone(),
            public_key: PublicKey::Ed25519(signer.public_key_bytes()),
            nonce,
            receiver_id: call.receiver_id.clone(),
            block_hash,
            actions: vec![Action::FunctionCall(FunctionCallAction {
                method_name: call.method_name.clone(),
                args: call.args.clone(),
                gas: call.gas,
                deposit: call.deposit,
            })],
        }
    }

    /// SHA-256 of the borsh encoding; this is both the signed payload and the tx hash.
    pub fn hash(&self) -> Result<[u8; 32]> {
        let bytes = self
            .try_to_vec()
            .map_err(|e| BridgeError::Serialization(e.to_string()))?;
        Ok(Sha256::digest(&bytes).into())
    }

    pub fn sign(self, signer: &InMemorySigner) -> Result<SignedTransaction> {
        let hash = self.hash()?;
        Ok(SignedTransaction {
            signature: Signature::Ed25519(signer.sign(&hash)),
            transaction: self,
            hash,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub transaction: Transaction,
    pub signature: Signature,
    hash: [u8; 32],
}

impl SignedTransaction {
    /// Base58 transaction hash as shown by explorers and accepted by the `tx` method.
    pub fn hash(&self) -> String {
        bs58::encode(self.hash).into_string()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = self
            .transaction
            .try_to_vec()
            .map_err(|e| BridgeError::Serialization(e.to_string()))?;
        self.signature
            .serialize(&mut bytes)
            .map_err(|e| BridgeError::Serialization(e.to_string()))?;
        Ok(bytes)
    }
}

/// Decode a base58 block hash as returned by the RPC.
pub fn parse_block_hash(encoded: &str) -> Result<[u8; 32]> {
    let bytes = bs58::decode(encoded)
        .into_vec()
        .map_err(|e| BridgeError::Near(format!("invalid block hash {}: {}", encoded, e)))?;
    bytes
        .try_into()
        .map_err(|_| BridgeError::Near(format!("block hash {} is not 32 bytes", encoded)))
}
