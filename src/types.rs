//! Core data model for the payment verification gate.
//!
//! These types flow between the ledger reader, the price oracle, the payment
//! store, and the verifier. [`TransferRecord`] and [`CostQuote`] are
//! transient per-request values; [`RecordedPayment`] is the only persisted
//! shape and is created exactly once per accepted verification.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::time::SystemTime;

/// Opaque identifier of one on-chain transaction, used as the idempotency key.
///
/// On Solana this is the base58 transaction signature. Uniqueness is global
/// and assigned by the ledger; the gate never inspects the contents beyond
/// handing it to the RPC endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PaymentReference(String);

impl PaymentReference {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PaymentReference {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for PaymentReference {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Display for PaymentReference {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for PaymentReference {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for PaymentReference {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self(s))
    }
}

/// Which asset one on-chain transfer moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetKind {
    /// The chain's base currency (SOL).
    Native,
    /// A fungible token issued on top of the chain (SPL token).
    FungibleToken,
}

/// A normalized transfer extracted from one on-chain transaction.
///
/// Produced transiently by the ledger reader and consumed by the verifier;
/// never persisted as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferRecord {
    /// Sending address as reported by the ledger. For token transfers this is
    /// the token-account address, not the owner wallet.
    pub sender: String,
    /// Receiving address as reported by the ledger.
    pub receiver: String,
    /// Transfer amount in the asset's display unit. Native amounts are
    /// converted from lamports; token amounts from a `transferChecked`
    /// instruction carry the explicit UI amount.
    pub amount: Decimal,
    pub asset: AssetKind,
    /// Whether `amount` is already decimal-scaled. Always true for native
    /// transfers and checked token transfers; false for a raw token
    /// `transfer`, whose amount is reported in base units and left for the
    /// caller to scale.
    pub checked: bool,
}

/// A Unix timestamp in seconds, recorded at payment acceptance.
///
/// Serialized as a stringified integer to avoid loss of precision in JSON.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Ord, Eq)]
pub struct UnixTimestamp(u64);

impl UnixTimestamp {
    pub fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    pub fn now() -> Self {
        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .expect("SystemTime before UNIX epoch?!?")
            .as_secs();
        Self(now)
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }
}

impl Display for UnixTimestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for UnixTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for UnixTimestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let ts = s
            .parse::<u64>()
            .map_err(|_| serde::de::Error::custom("timestamp must be a non-negative integer"))?;
        Ok(UnixTimestamp(ts))
    }
}

/// A payment accepted by the verifier, persisted under its reference key.
///
/// Created exactly once per accepted verification and never mutated after
/// creation. Deleted only by an explicit compensating action when a
/// downstream step fails after acceptance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedPayment {
    pub reference: PaymentReference,
    pub amount: Decimal,
    pub recorded_at: UnixTimestamp,
    pub from: String,
    pub to: String,
}

/// A required cost plus the fractional margin absorbing price movement
/// between quote and settlement. Ephemeral, computed per request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostQuote {
    /// Required cost denominated in the accepted fungible token.
    pub base_cost: Decimal,
    /// Fraction added on top, e.g. `0.005` for 0.5%.
    pub slippage_tolerance: Decimal,
}

impl CostQuote {
    pub fn new(base_cost: Decimal, slippage_tolerance: Decimal) -> Self {
        Self {
            base_cost,
            slippage_tolerance,
        }
    }

    /// The cost a payment must strictly exceed to be accepted.
    pub fn tolerated(&self) -> Decimal {
        self.base_cost * (Decimal::ONE + self.slippage_tolerance)
    }
}

/// Structured, terminal rejection reasons returned to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectReason {
    /// The reference is already present in the payment ledger.
    AlreadyUsed,
    /// Transfer sender/receiver do not match the expected payer and payee.
    AddressMismatch,
    /// Transfer amount does not strictly exceed the tolerated cost.
    InsufficientFunds,
    /// The price oracle was unreachable, so the native-path cost basis is
    /// undefined.
    PriceUnavailable,
    /// Neither a native nor a token transfer shape was found for the
    /// reference.
    NoValidTransfer,
}

impl Display for RejectReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RejectReason::AlreadyUsed => "ALREADY_USED",
            RejectReason::AddressMismatch => "ADDRESS_MISMATCH",
            RejectReason::InsufficientFunds => "INSUFFICIENT_FUNDS",
            RejectReason::PriceUnavailable => "PRICE_UNAVAILABLE",
            RejectReason::NoValidTransfer => "NO_VALID_TRANSFER",
        };
        f.write_str(s)
    }
}

/// The outcome of one verification call: strictly accepted or rejected.
///
/// No partial or "maybe accepted" state exists; hard failures (RPC transport,
/// storage) are surfaced as errors instead.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Accepted(RecordedPayment),
    Rejected(RejectReason),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted(_))
    }

    pub fn reason(&self) -> Option<RejectReason> {
        match self {
            Verdict::Accepted(_) => None,
            Verdict::Rejected(reason) => Some(*reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn tolerated_cost_applies_slippage() {
        let quote = CostQuote::new(Decimal::from(100), Decimal::from_str("0.005").unwrap());
        assert_eq!(quote.tolerated(), Decimal::from_str("100.500").unwrap());
    }

    #[test]
    fn reject_reason_wire_strings() {
        assert_eq!(RejectReason::AlreadyUsed.to_string(), "ALREADY_USED");
        assert_eq!(
            serde_json::to_string(&RejectReason::NoValidTransfer).unwrap(),
            "\"NO_VALID_TRANSFER\""
        );
    }

    #[test]
    fn recorded_payment_round_trips_through_json() {
        let payment = RecordedPayment {
            reference: PaymentReference::from("txA"),
            amount: Decimal::from_str("0.52").unwrap(),
            recorded_at: UnixTimestamp::from_secs(1_700_000_000),
            from: "W1".to_string(),
            to: "SVC".to_string(),
        };
        let json = serde_json::to_string(&payment).unwrap();
        let back: RecordedPayment = serde_json::from_str(&json).unwrap();
        assert_eq!(back, payment);
    }
}
