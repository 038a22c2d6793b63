//! The payment verifier: decides, before any downstream paid action
//! proceeds, whether a claimed payment reference is real, moved the required
//! asset between the claimed parties, covers the required cost within the
//! slippage bound, and has never been accepted before.
//!
//! Verification is a single best-effort attempt per call; retry policy
//! belongs to the caller. Every rejection is terminal for that call.

use rust_decimal::Decimal;
use solana_pubkey::{Pubkey, pubkey};
use std::str::FromStr;
use tracing::instrument;

use crate::ledger::{LedgerError, TransferSource};
use crate::oracle::{OracleError, PriceOracle};
use crate::store::{PaymentStore, StoreError};
use crate::types::{
    AssetKind, CostQuote, PaymentReference, RecordedPayment, RejectReason, TransferRecord,
    UnixTimestamp, Verdict,
};

/// The Associated Token Account program.
const ATA_PROGRAM_PUBKEY: Pubkey = pubkey!("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL");

/// Default slippage tolerance: 0.5%.
pub fn default_slippage_tolerance() -> Decimal {
    Decimal::new(5, 3)
}

/// Hard failures during verification. Expected rejections (insufficient
/// funds, replay, address mismatch) are [`Verdict::Rejected`] values, not
/// errors.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// RPC transport or protocol failure while reading the ledger.
    #[error("ledger unavailable: {0}")]
    Ledger(String),
    /// The payment store failed to read or write.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Wallet, mint, and tolerance settings the verifier checks payments against.
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// The service wallet every payment must be addressed to.
    pub receiving_wallet: Pubkey,
    /// The accepted fungible token's mint.
    pub token_mint: Pubkey,
    /// Fractional margin added to the required cost, e.g. `0.005`.
    pub slippage_tolerance: Decimal,
}

impl VerifierConfig {
    pub fn new(receiving_wallet: Pubkey, token_mint: Pubkey) -> Self {
        Self {
            receiving_wallet,
            token_mint,
            slippage_tolerance: default_slippage_tolerance(),
        }
    }

    pub fn with_slippage_tolerance(mut self, slippage_tolerance: Decimal) -> Self {
        self.slippage_tolerance = slippage_tolerance;
        self
    }
}

/// Orchestrates the replay check, transfer classification, price conversion,
/// and durable recording of one payment.
#[derive(Debug)]
pub struct PaymentVerifier<L, O, S> {
    ledger: L,
    oracle: O,
    store: S,
    config: VerifierConfig,
}

impl<L, O, S> PaymentVerifier<L, O, S>
where
    L: TransferSource,
    O: PriceOracle,
    S: PaymentStore,
{
    pub fn new(ledger: L, oracle: O, store: S, config: VerifierConfig) -> Self {
        Self {
            ledger,
            oracle,
            store,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Verifies one claimed payment against a required cost in token units.
    ///
    /// Checks run in order and short-circuit: replay check first (before any
    /// network work), then transfer classification, address binding, price
    /// conversion on the native path, and the strict amount comparison. On
    /// success the payment is recorded atomically; a lost insert race
    /// surfaces as `ALREADY_USED`.
    #[instrument(skip_all, err, fields(reference = %reference, payer = payer_wallet))]
    pub async fn verify(
        &self,
        reference: &PaymentReference,
        required_cost: Decimal,
        payer_wallet: &str,
    ) -> Result<Verdict, VerifyError> {
        if self.store.exists(reference).await? {
            tracing::debug!("reference already recorded, rejecting replay");
            return Ok(Verdict::Rejected(RejectReason::AlreadyUsed));
        }

        let quote = CostQuote::new(required_cost, self.config.slippage_tolerance);
        let tolerated = quote.tolerated();

        let transfer = match self.ledger.fetch_transfer(reference).await {
            Ok(transfer) => transfer,
            Err(
                error @ (LedgerError::NotFound
                | LedgerError::TransactionFailed
                | LedgerError::NoTransferInstruction),
            ) => {
                tracing::debug!(%error, "no usable transfer for reference");
                return Ok(Verdict::Rejected(RejectReason::NoValidTransfer));
            }
            Err(LedgerError::Rpc(message)) => return Err(VerifyError::Ledger(message)),
        };

        match transfer.asset {
            AssetKind::Native => {
                self.verify_native(reference, &transfer, tolerated, payer_wallet)
                    .await
            }
            AssetKind::FungibleToken => {
                self.verify_token(reference, &transfer, tolerated, payer_wallet)
                    .await
            }
        }
    }

    /// Native path: the payment arrived as SOL, so the token-denominated
    /// cost is converted through the oracle rate before comparison.
    async fn verify_native(
        &self,
        reference: &PaymentReference,
        transfer: &TransferRecord,
        tolerated: Decimal,
        payer_wallet: &str,
    ) -> Result<Verdict, VerifyError> {
        if transfer.sender != payer_wallet
            || transfer.receiver != self.config.receiving_wallet.to_string()
        {
            return Ok(Verdict::Rejected(RejectReason::AddressMismatch));
        }
        let rate = match self.oracle.exchange_rate(&self.config.token_mint).await {
            Ok(rate) => rate,
            Err(OracleError::Unavailable(reason)) => {
                // Without a rate the cost basis is undefined; never fall
                // through to the token path.
                tracing::warn!(%reason, "price oracle unavailable, rejecting native payment");
                return Ok(Verdict::Rejected(RejectReason::PriceUnavailable));
            }
        };
        let tolerated_native = tolerated * rate;
        if let Some(verdict) = assert_sufficient(transfer.amount, tolerated_native) {
            return Ok(verdict);
        }
        self.record(reference, transfer).await
    }

    /// Token path: sender and receiver must be the token accounts derived
    /// from the payer and service wallets for the configured mint. No price
    /// conversion; the amount is already token-denominated.
    async fn verify_token(
        &self,
        reference: &PaymentReference,
        transfer: &TransferRecord,
        tolerated: Decimal,
        payer_wallet: &str,
    ) -> Result<Verdict, VerifyError> {
        let payer = match Pubkey::from_str(payer_wallet) {
            Ok(payer) => payer,
            // A wallet that is not a valid address cannot own the sending
            // token account.
            Err(_) => return Ok(Verdict::Rejected(RejectReason::AddressMismatch)),
        };
        let mint = &self.config.token_mint;
        let addresses_match = [spl_token::ID, spl_token_2022::ID]
            .iter()
            .any(|token_program| {
                let source = associated_token_address(&payer, mint, token_program);
                let destination =
                    associated_token_address(&self.config.receiving_wallet, mint, token_program);
                transfer.sender == source.to_string()
                    && transfer.receiver == destination.to_string()
            });
        if !addresses_match {
            return Ok(Verdict::Rejected(RejectReason::AddressMismatch));
        }
        if let Some(verdict) = assert_sufficient(transfer.amount, tolerated) {
            return Ok(verdict);
        }
        self.record(reference, transfer).await
    }

    async fn record(
        &self,
        reference: &PaymentReference,
        transfer: &TransferRecord,
    ) -> Result<Verdict, VerifyError> {
        let payment = RecordedPayment {
            reference: reference.clone(),
            amount: transfer.amount,
            recorded_at: UnixTimestamp::now(),
            from: transfer.sender.clone(),
            to: transfer.receiver.clone(),
        };
        let inserted = self.store.insert_if_absent(payment.clone()).await?;
        if !inserted {
            // A concurrent verification recorded the same reference between
            // the replay check and this insert.
            tracing::warn!("lost insert race, rejecting replay");
            return Ok(Verdict::Rejected(RejectReason::AlreadyUsed));
        }
        tracing::info!(
            amount = %payment.amount,
            from = %payment.from,
            to = %payment.to,
            "payment accepted and recorded"
        );
        Ok(Verdict::Accepted(payment))
    }

    /// Compensating action for a failed downstream step: frees the reference
    /// so the same payment can be presented again. Caller-driven only; the
    /// verifier never deletes a payment it just recorded.
    #[instrument(skip_all, err, fields(reference = %reference))]
    pub async fn delete_payment(&self, reference: &PaymentReference) -> Result<(), VerifyError> {
        self.store.delete(reference).await?;
        tracing::info!("payment record deleted, reference freed for reuse");
        Ok(())
    }
}

/// The boundary is exclusive: a payment exactly equal to the tolerated cost
/// is insufficient.
fn assert_sufficient(amount: Decimal, tolerated: Decimal) -> Option<Verdict> {
    if amount > tolerated {
        None
    } else {
        Some(Verdict::Rejected(RejectReason::InsufficientFunds))
    }
}

/// Deterministically derives the token account holding `mint` balances for
/// `owner`. A pure function of owner, token program, and mint; no network
/// call.
pub fn associated_token_address(owner: &Pubkey, mint: &Pubkey, token_program: &Pubkey) -> Pubkey {
    let (address, _bump) = Pubkey::find_program_address(
        &[owner.as_ref(), token_program.as_ref(), mint.as_ref()],
        &ATA_PROGRAM_PUBKEY,
    );
    address
}
