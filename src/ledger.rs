//! Ledger reader: fetches a confirmed transaction by reference and extracts
//! a normalized transfer record from its parsed instruction list.
//!
//! The reader is read-only; it never signs or submits anything. Transaction
//! classification is a pure function over the jsonParsed instruction list so
//! it can be exercised without a network.

use async_trait::async_trait;
use rust_decimal::Decimal;
use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::RpcTransactionConfig;
use solana_client::rpc_request::RpcError;
use solana_commitment_config::CommitmentConfig;
use solana_signature::Signature;
use solana_transaction_status_client_types::{
    EncodedTransaction, ParsedInstruction, UiInstruction, UiMessage, UiParsedInstruction,
    UiTransactionEncoding,
};
use std::fmt::{Debug, Formatter};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::amount::{UiAmount, lamports_to_sol};
use crate::types::{AssetKind, PaymentReference, TransferRecord};

/// Errors produced while fetching or classifying one on-chain transaction.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LedgerError {
    /// No such transaction on the ledger.
    #[error("transaction not found")]
    NotFound,
    /// Transaction present, but it failed at the protocol level.
    #[error("transaction failed on-chain")]
    TransactionFailed,
    /// Transaction present, but no recognized transfer shape was found in
    /// its instruction list.
    #[error("transfer instruction not found in transaction")]
    NoTransferInstruction,
    /// RPC transport or protocol failure; the ledger could not be consulted.
    #[error("rpc error: {0}")]
    Rpc(String),
}

/// Source of normalized transfer records, keyed by payment reference.
///
/// The production implementation is [`SolanaLedgerReader`]; tests substitute
/// an in-memory source.
#[async_trait]
pub trait TransferSource: Send + Sync {
    async fn fetch_transfer(
        &self,
        reference: &PaymentReference,
    ) -> Result<TransferRecord, LedgerError>;
}

/// Reads confirmed transactions from a Solana RPC endpoint.
#[derive(Clone)]
pub struct SolanaLedgerReader {
    rpc_client: Arc<RpcClient>,
    commitment: CommitmentConfig,
}

impl Debug for SolanaLedgerReader {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolanaLedgerReader")
            .field("rpc_url", &self.rpc_client.url())
            .finish()
    }
}

impl SolanaLedgerReader {
    pub fn new(rpc_url: &Url, timeout: Duration) -> Self {
        let commitment = CommitmentConfig::confirmed();
        let rpc_client =
            RpcClient::new_with_timeout_and_commitment(rpc_url.to_string(), timeout, commitment);
        tracing::info!(rpc = %rpc_url, timeout_secs = timeout.as_secs(), "Initialized Solana ledger reader");
        Self {
            rpc_client: Arc::new(rpc_client),
            commitment,
        }
    }
}

#[async_trait]
impl TransferSource for SolanaLedgerReader {
    async fn fetch_transfer(
        &self,
        reference: &PaymentReference,
    ) -> Result<TransferRecord, LedgerError> {
        // A reference that is not a valid signature cannot exist on the ledger.
        let signature =
            Signature::from_str(reference.as_str()).map_err(|_| LedgerError::NotFound)?;
        let config = RpcTransactionConfig {
            encoding: Some(UiTransactionEncoding::JsonParsed),
            commitment: Some(self.commitment),
            max_supported_transaction_version: Some(0),
        };
        let confirmed = self
            .rpc_client
            .get_transaction_with_config(&signature, config)
            .await
            .map_err(map_client_error)?;
        if let Some(meta) = &confirmed.transaction.meta {
            if meta.err.is_some() {
                return Err(LedgerError::TransactionFailed);
            }
        }
        let instructions = parsed_instructions(&confirmed.transaction.transaction)?;
        classify_transfer(&instructions)
    }
}

/// Distinguishes an absent transaction from a transport failure.
fn map_client_error(error: ClientError) -> LedgerError {
    if is_missing_transaction(&error.kind) {
        LedgerError::NotFound
    } else {
        LedgerError::Rpc(error.to_string())
    }
}

/// A missing transaction comes back as a JSON null result, which fails to
/// decode into the confirmed-transaction shape. Some endpoints report it as
/// a user-facing "not found" message instead. Any other client error stays
/// a hard RPC error.
fn is_missing_transaction(kind: &ClientErrorKind) -> bool {
    match kind {
        ClientErrorKind::RpcError(RpcError::ForUser(message)) => message.contains("not found"),
        ClientErrorKind::SerdeJson(serde_error) => serde_error.to_string().contains("null"),
        _ => false,
    }
}

/// Extracts the fully parsed instructions out of a jsonParsed-encoded
/// transaction. Partially decoded instructions are skipped; they cannot be a
/// recognized transfer shape.
fn parsed_instructions(
    transaction: &EncodedTransaction,
) -> Result<Vec<ParsedInstruction>, LedgerError> {
    let message = match transaction {
        EncodedTransaction::Json(ui_transaction) => &ui_transaction.message,
        _ => return Err(LedgerError::NoTransferInstruction),
    };
    match message {
        UiMessage::Parsed(parsed) => Ok(parsed
            .instructions
            .iter()
            .filter_map(|instruction| match instruction {
                UiInstruction::Parsed(UiParsedInstruction::Parsed(parsed)) => Some(parsed.clone()),
                _ => None,
            })
            .collect()),
        UiMessage::Raw(_) => Err(LedgerError::NoTransferInstruction),
    }
}

/// Classifies the instruction list into a normalized transfer record.
///
/// The native shape is tried first: a system-program `transfer` whose amount
/// is reported in lamports. Token transfers (`transfer` or `transferChecked`
/// on a token program) are the fallback.
pub(crate) fn classify_transfer(
    instructions: &[ParsedInstruction],
) -> Result<TransferRecord, LedgerError> {
    if let Some(record) = classify_native(instructions) {
        return Ok(record);
    }
    if let Some(record) = classify_token(instructions) {
        return Ok(record);
    }
    Err(LedgerError::NoTransferInstruction)
}

fn classify_native(instructions: &[ParsedInstruction]) -> Option<TransferRecord> {
    instructions.iter().find_map(|instruction| {
        if instruction.program != "system" {
            return None;
        }
        let parsed = &instruction.parsed;
        if parsed.get("type")?.as_str()? != "transfer" {
            return None;
        }
        let info = parsed.get("info")?;
        let sender = info.get("source")?.as_str()?.to_string();
        let receiver = info.get("destination")?.as_str()?.to_string();
        let lamports = info.get("lamports")?.as_u64()?;
        Some(TransferRecord {
            sender,
            receiver,
            amount: lamports_to_sol(lamports),
            asset: AssetKind::Native,
            checked: true,
        })
    })
}

fn classify_token(instructions: &[ParsedInstruction]) -> Option<TransferRecord> {
    instructions.iter().find_map(|instruction| {
        if instruction.program == "system" {
            return None;
        }
        let parsed = &instruction.parsed;
        let kind = parsed.get("type")?.as_str()?;
        let info = parsed.get("info")?;
        let sender = info.get("source")?.as_str()?.to_string();
        let receiver = info.get("destination")?.as_str()?.to_string();
        match kind {
            "transferChecked" => {
                // The checked variant carries an explicit decimal-scaled
                // UI amount.
                let token_amount = info.get("tokenAmount")?;
                let amount = match token_amount.get("uiAmountString").and_then(|v| v.as_str()) {
                    Some(s) => UiAmount::parse(s).ok()?.into_inner(),
                    None => {
                        let ui_amount = token_amount.get("uiAmount")?.as_f64()?;
                        UiAmount::try_from(ui_amount).ok()?.into_inner()
                    }
                };
                Some(TransferRecord {
                    sender,
                    receiver,
                    amount,
                    asset: AssetKind::FungibleToken,
                    checked: true,
                })
            }
            "transfer" => {
                // Raw transfer: amount is reported in base units and passed
                // through as-is; decimal scaling is the caller's
                // responsibility. Base-unit amounts routinely exceed any
                // human display bound, so this is a plain integer parse.
                let amount = info.get("amount")?.as_str()?.parse::<u64>().ok()?;
                Some(TransferRecord {
                    sender,
                    receiver,
                    amount: Decimal::from(amount),
                    asset: AssetKind::FungibleToken,
                    checked: false,
                })
            }
            _ => None,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use serde_json::json;
    use std::str::FromStr;

    fn instruction(program: &str, parsed: serde_json::Value) -> ParsedInstruction {
        ParsedInstruction {
            program: program.to_string(),
            program_id: "11111111111111111111111111111111".to_string(),
            parsed,
            stack_height: None,
        }
    }

    fn native_transfer(source: &str, destination: &str, lamports: u64) -> ParsedInstruction {
        instruction(
            "system",
            json!({
                "type": "transfer",
                "info": { "source": source, "destination": destination, "lamports": lamports }
            }),
        )
    }

    #[test]
    fn classifies_native_transfer_in_sol() {
        let instructions = vec![native_transfer("W1", "SVC", 520_000_000)];
        let record = classify_transfer(&instructions).unwrap();
        assert_eq!(record.asset, AssetKind::Native);
        assert_eq!(record.sender, "W1");
        assert_eq!(record.receiver, "SVC");
        assert_eq!(record.amount, Decimal::from_str("0.52").unwrap());
        assert!(record.checked);
    }

    #[test]
    fn classifies_checked_token_transfer_with_ui_amount() {
        let instructions = vec![instruction(
            "spl-token",
            json!({
                "type": "transferChecked",
                "info": {
                    "source": "SRC_ATA",
                    "destination": "DST_ATA",
                    "tokenAmount": { "uiAmount": 100.51, "uiAmountString": "100.51", "decimals": 9 }
                }
            }),
        )];
        let record = classify_transfer(&instructions).unwrap();
        assert_eq!(record.asset, AssetKind::FungibleToken);
        assert_eq!(record.amount, Decimal::from_str("100.51").unwrap());
        assert!(record.checked);
    }

    #[test]
    fn classifies_raw_token_transfer_as_reported() {
        // 100.51 tokens at 9 decimals: well past any human display bound.
        let instructions = vec![instruction(
            "spl-token",
            json!({
                "type": "transfer",
                "info": { "source": "SRC_ATA", "destination": "DST_ATA", "amount": "100510000000" }
            }),
        )];
        let record = classify_transfer(&instructions).unwrap();
        assert_eq!(record.asset, AssetKind::FungibleToken);
        assert_eq!(record.amount, Decimal::from(100_510_000_000u64));
        assert!(!record.checked);
    }

    #[test]
    fn non_integer_raw_amount_is_rejected() {
        let instructions = vec![instruction(
            "spl-token",
            json!({
                "type": "transfer",
                "info": { "source": "SRC_ATA", "destination": "DST_ATA", "amount": "-5" }
            }),
        )];
        assert!(matches!(
            classify_transfer(&instructions),
            Err(LedgerError::NoTransferInstruction)
        ));
    }

    #[test]
    fn native_shape_wins_over_token_shape() {
        let instructions = vec![
            instruction(
                "spl-token",
                json!({
                    "type": "transfer",
                    "info": { "source": "SRC_ATA", "destination": "DST_ATA", "amount": "42" }
                }),
            ),
            native_transfer("W1", "SVC", 1_000_000_000),
        ];
        let record = classify_transfer(&instructions).unwrap();
        assert_eq!(record.asset, AssetKind::Native);
    }

    #[test]
    fn unrecognized_shapes_are_rejected() {
        let instructions = vec![instruction(
            "system",
            json!({ "type": "createAccount", "info": {} }),
        )];
        assert!(matches!(
            classify_transfer(&instructions),
            Err(LedgerError::NoTransferInstruction)
        ));
        assert!(matches!(
            classify_transfer(&[]),
            Err(LedgerError::NoTransferInstruction)
        ));
    }

    #[test]
    fn only_missing_transaction_shapes_map_to_not_found() {
        let null_decode = serde_json::from_value::<String>(serde_json::Value::Null).unwrap_err();
        assert!(is_missing_transaction(&ClientErrorKind::SerdeJson(
            null_decode
        )));
        assert!(is_missing_transaction(&ClientErrorKind::RpcError(
            RpcError::ForUser("Transaction not found".to_string())
        )));

        // Other decode failures and user-facing messages stay hard errors.
        let truncated = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(!is_missing_transaction(&ClientErrorKind::SerdeJson(
            truncated
        )));
        assert!(!is_missing_transaction(&ClientErrorKind::RpcError(
            RpcError::ForUser("airdrop request failed".to_string())
        )));
        assert!(!is_missing_transaction(&ClientErrorKind::Custom(
            "connection reset".to_string()
        )));
    }

    #[test]
    fn incomplete_native_info_is_rejected() {
        let instructions = vec![instruction(
            "system",
            json!({ "type": "transfer", "info": { "source": "W1" } }),
        )];
        assert!(matches!(
            classify_transfer(&instructions),
            Err(LedgerError::NoTransferInstruction)
        ));
    }
}
