//! Payment verification gate for Solana.
//!
//! Before a downstream paid action proceeds, this crate decides whether a
//! claimed on-chain payment reference (a) actually exists on-chain, (b)
//! moved the required asset from the claimed payer to the configured
//! receiving wallet, (c) covers a required cost within a bounded slippage
//! margin, and (d) has never been accepted before. The answer is strictly
//! [`Verdict::Accepted`] or [`Verdict::Rejected`] with a structured reason;
//! there is no "maybe accepted" state.
//!
//! Payments are accepted in two forms:
//!
//! - **Native (SOL)**: a system-program transfer from the payer wallet to
//!   the receiving wallet. The token-denominated cost is converted into SOL
//!   through a price oracle before the amount check.
//! - **Fungible token (SPL)**: a token transfer between the associated
//!   token accounts derived from the payer and receiving wallets for the
//!   configured mint. No price conversion.
//!
//! Accepted payments are recorded durably under their reference, which is
//! the idempotency key: presenting the same reference again is rejected as
//! a replay. When a downstream step fails after acceptance, the caller
//! compensates with [`PaymentVerifier::delete_payment`] to free the
//! reference.
//!
//! # Modules
//!
//! - [`amount`] — decimal amount parsing and lamport conversion.
//! - [`config`] — environment-driven configuration and verifier assembly.
//! - [`ledger`] — confirmed-transaction fetch and transfer classification.
//! - [`oracle`] — token-to-SOL exchange rates from the Jupiter price API.
//! - [`store`] — the payment ledger contract and its in-process backend.
//! - [`telemetry`] — opt-in tracing subscriber setup.
//! - [`types`] — the core data model.
//! - [`verifier`] — the verification state machine.
//!
//! # Example
//!
//! ```no_run
//! use rust_decimal::Decimal;
//! use solgate::config::GateConfig;
//! use solgate::types::PaymentReference;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GateConfig::from_env()?;
//! let verifier = config.build_verifier()?;
//!
//! let reference = PaymentReference::from("5Nf6...signature...");
//! let verdict = verifier
//!     .verify(&reference, Decimal::from(100), "payer-wallet-base58")
//!     .await?;
//! if verdict.is_accepted() {
//!     // proceed with the paid action; on failure, compensate:
//!     // verifier.delete_payment(&reference).await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod amount;
pub mod config;
pub mod ledger;
pub mod oracle;
pub mod store;
pub mod telemetry;
pub mod types;
pub mod verifier;

pub use types::{
    AssetKind, CostQuote, PaymentReference, RecordedPayment, RejectReason, TransferRecord, Verdict,
};
pub use verifier::{PaymentVerifier, VerifierConfig, VerifyError};
