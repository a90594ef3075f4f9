//! # Payment Flow
//!
//! The orchestrator a wallet UI (or the `proxipay` binary) drives:
//!
//! ```text
//!   Discover ──select_vendor──► Details ──submit──► Processing ──ok──► Result
//!      ▲  ▲                       ▲                     │  │              │
//!      │  │                       └──────── error ──────┘  │              │
//!      │  └────────────── error, session ended ────────────┘              │
//!      └──────────────────────────── reset_flow ──────────────────────────┘
//! ```
//!
//! `submit` validates the form while still in `Details`, then runs the
//! processing steps strictly in order with the user's wallet locked:
//!
//! 1. MPIN store (first payment) or verify
//! 2. balance pre-check (nothing is signed for a payment that cannot be paid)
//! 3. key unlock, payload signing, exchange, ack verification
//! 4. offline record, then debit
//!
//! A failure at any step returns the flow to `Details` with the error kept in
//! [`PaymentFlow::last_error`], so the user can correct the form and submit
//! again. Later steps have not run; earlier ones are not undone (an MPIN
//! created on this attempt stays). If the selected advertisement can no
//! longer be paid (its session nonce was spent or expired), the flow goes
//! back to `Discover` instead, since only a fresh scan can help.

use std::fmt;
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::amount::Amount;
use crate::clock::{Clock, IdGenerator, RandomIds, SystemClock};
use crate::config::{SimulationConfig, BASE_CURRENCY, RECORD_ID_PREFIX};
use crate::crypto::{derive, DerivationContext};
use crate::discovery::{VendorAdvertisement, VendorDirectory};
use crate::error::{PaymentError, PaymentResult};
use crate::exchange::{
    build_and_sign, verify_ack, LoopbackTransport, PayerSession, VendorResponder,
};
use crate::ledger::{OfflineStore, OfflineTransactionRecord};
use crate::mpin::{validate_pin_format, MpinGate};
use crate::storage::KeyValueStore;
use crate::wallet::WalletLedger;

const PROGRESS_CHANNEL_CAPACITY: usize = 32;

const SESSION_ENDED_HINT: &str = "the vendor session has ended, scan for vendors again";

// ---------------------------------------------------------------------------
// States and events
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlowState {
    Discover,
    Details,
    Processing,
    Result,
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlowState::Discover => "discover",
            FlowState::Details => "details",
            FlowState::Processing => "processing",
            FlowState::Result => "result",
        };
        f.write_str(name)
    }
}

/// Progress notifications emitted while a payment is processing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaymentProgress {
    UnlockingKey,
    PreparingPayload,
    Exchanging,
    ValidatingAck,
    PersistingRecord,
    Completed,
}

impl PaymentProgress {
    /// Status line for display.
    pub fn message(&self) -> &'static str {
        match self {
            PaymentProgress::UnlockingKey => "Unlocking your wallet key...",
            PaymentProgress::PreparingPayload => "Preparing transaction payload...",
            PaymentProgress::Exchanging => "Exchanging payload over BLE...",
            PaymentProgress::ValidatingAck => "Validating vendor acknowledgement...",
            PaymentProgress::PersistingRecord => "Persisting offline record...",
            PaymentProgress::Completed => "Transaction stored offline.",
        }
    }
}

/// What the user typed on the details step.
#[derive(Clone, Debug, Default)]
pub struct PaymentForm {
    pub amount: String,
    pub mpin: String,
    /// Required only when no MPIN is configured yet.
    pub confirm_mpin: Option<String>,
    pub payer_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentOutcome {
    pub ack_id: String,
    pub record_id: String,
    /// Receiver id of the vendor paid.
    pub vendor_id: String,
    pub amount: Amount,
    pub new_balance: Amount,
}

/// Parse a user-entered amount: any finite decimal greater than zero.
pub fn parse_amount(input: &str) -> PaymentResult<Amount> {
    match input.parse::<Amount>() {
        Ok(amount) if !amount.is_zero() => Ok(amount),
        _ => Err(PaymentError::validation(
            "enter a valid amount greater than zero",
        )),
    }
}

// ---------------------------------------------------------------------------
// Services
// ---------------------------------------------------------------------------

/// Everything a flow needs, shared between flows of one wallet.
pub struct PaymentServices {
    wallet: WalletLedger,
    mpin: MpinGate,
    ledger: Arc<dyn OfflineStore>,
    directory: Arc<VendorDirectory>,
    payer: PayerSession,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    config: SimulationConfig,
}

impl PaymentServices {
    /// Wire up the services with the wall clock and random ids.
    ///
    /// Spawns the loopback vendor task, so it must run inside a tokio
    /// runtime.
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        ledger: Arc<dyn OfflineStore>,
        config: SimulationConfig,
    ) -> Self {
        Self::with_sources(
            store,
            ledger,
            config,
            Arc::new(SystemClock),
            Arc::new(RandomIds),
        )
    }

    pub fn with_sources(
        store: Arc<dyn KeyValueStore>,
        ledger: Arc<dyn OfflineStore>,
        config: SimulationConfig,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        let directory = Arc::new(VendorDirectory::with_defaults(ids.clone(), &config));
        let responder = VendorResponder::new(directory.clone(), clock.clone(), ids.clone());
        let transport = LoopbackTransport::spawn(responder, config.exchange_delay);

        Self {
            wallet: WalletLedger::new(store.clone(), clock.clone(), config.default_balance),
            mpin: MpinGate::new(store),
            ledger,
            directory,
            payer: PayerSession::new(Arc::new(transport)),
            clock,
            ids,
            config,
        }
    }

    pub fn wallet(&self) -> &WalletLedger {
        &self.wallet
    }

    pub fn mpin(&self) -> &MpinGate {
        &self.mpin
    }

    pub fn directory(&self) -> &VendorDirectory {
        &self.directory
    }

    pub async fn balance(&self, user_id: &str) -> PaymentResult<Amount> {
        Ok(self.wallet.balance(user_id).await?)
    }

    /// Offline records paid by `user_id`, oldest first.
    pub async fn history(&self, user_id: &str) -> PaymentResult<Vec<OfflineTransactionRecord>> {
        let records = self.ledger.records().await?;
        Ok(records.into_iter().filter(|r| r.payer_id == user_id).collect())
    }

    /// Forget the user's MPIN. Balance and records stay.
    pub async fn logout(&self, user_id: &str) -> PaymentResult<()> {
        self.mpin.clear(user_id).await?;
        info!(user_id, "logged out");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Flow
// ---------------------------------------------------------------------------

struct ValidatedSubmission {
    amount: Amount,
    pin: String,
    create_mpin: bool,
    payer_name: Option<String>,
}

pub struct PaymentFlow {
    services: Arc<PaymentServices>,
    user_id: String,
    state: FlowState,
    vendors: Vec<VendorAdvertisement>,
    selected: Option<VendorAdvertisement>,
    last_error: Option<String>,
    outcome: Option<PaymentOutcome>,
    progress: broadcast::Sender<PaymentProgress>,
}

impl PaymentFlow {
    pub fn new(services: Arc<PaymentServices>, user_id: impl Into<String>) -> Self {
        let (progress, _) = broadcast::channel(PROGRESS_CHANNEL_CAPACITY);
        Self {
            services,
            user_id: user_id.into(),
            state: FlowState::Discover,
            vendors: Vec::new(),
            selected: None,
            last_error: None,
            outcome: None,
            progress,
        }
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn vendors(&self) -> &[VendorAdvertisement] {
        &self.vendors
    }

    pub fn selected_vendor(&self) -> Option<&VendorAdvertisement> {
        self.selected.as_ref()
    }

    /// Message of the most recent failed submission.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn outcome(&self) -> Option<&PaymentOutcome> {
        self.outcome.as_ref()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PaymentProgress> {
        self.progress.subscribe()
    }

    fn require(&self, expected: FlowState, action: &str) -> PaymentResult<()> {
        if self.state != expected {
            return Err(PaymentError::InvalidState {
                state: self.state.to_string(),
                action: action.to_string(),
            });
        }
        Ok(())
    }

    fn transition(&mut self, next: FlowState) {
        info!(user_id = %self.user_id, from = %self.state, to = %next, "payment flow transition");
        self.state = next;
    }

    fn emit(&self, event: PaymentProgress) {
        debug!(user_id = %self.user_id, status = event.message(), "payment progress");
        let _ = self.progress.send(event);
    }

    /// Scan for nearby vendors, replacing the current list.
    pub async fn discover(&mut self) -> PaymentResult<&[VendorAdvertisement]> {
        self.require(FlowState::Discover, "discover vendors")?;
        self.vendors = self.services.directory.discover().await;
        Ok(&self.vendors)
    }

    pub fn select_vendor(&mut self, vendor_id: &str) -> PaymentResult<&VendorAdvertisement> {
        self.require(FlowState::Discover, "select a vendor")?;
        let vendor = self
            .vendors
            .iter()
            .find(|v| v.id == vendor_id)
            .cloned()
            .ok_or_else(|| {
                PaymentError::validation(format!("vendor {} was not discovered", vendor_id))
            })?;

        self.last_error = None;
        self.transition(FlowState::Details);
        Ok(self.selected.insert(vendor))
    }

    /// Whether the details step should ask for an existing MPIN (`true`) or
    /// for a new one plus confirmation (`false`).
    pub async fn mpin_configured(&self) -> PaymentResult<bool> {
        Ok(self.services.mpin.exists(&self.user_id).await?)
    }

    /// Validate the form and run the payment.
    pub async fn submit(&mut self, form: PaymentForm) -> PaymentResult<PaymentOutcome> {
        self.require(FlowState::Details, "submit a payment")?;

        let submission = match self.validate(form).await {
            Ok(s) => s,
            Err(e) => {
                self.last_error = Some(e.to_string());
                return Err(e);
            }
        };
        let vendor = self
            .selected
            .clone()
            .ok_or_else(|| PaymentError::validation("no vendor selected"))?;

        self.transition(FlowState::Processing);
        match self.process(&vendor, submission).await {
            Ok(outcome) => {
                self.last_error = None;
                self.outcome = Some(outcome.clone());
                self.transition(FlowState::Result);
                Ok(outcome)
            }
            Err(e) => {
                warn!(user_id = %self.user_id, vendor_id = %vendor.id, error = %e, "payment failed");
                let sessions = self.services.directory.sessions();
                if sessions.is_open(&vendor.id, &vendor.session_nonce) {
                    self.last_error = Some(e.to_string());
                    self.transition(FlowState::Details);
                } else {
                    self.last_error = Some(format!("{}; {}", e, SESSION_ENDED_HINT));
                    self.vendors.clear();
                    self.selected = None;
                    self.transition(FlowState::Discover);
                }
                Err(e)
            }
        }
    }

    /// Back to an empty discover step.
    pub fn reset_flow(&mut self) {
        self.vendors.clear();
        self.selected = None;
        self.last_error = None;
        self.outcome = None;
        self.transition(FlowState::Discover);
    }

    async fn validate(&self, form: PaymentForm) -> PaymentResult<ValidatedSubmission> {
        if self.user_id.trim().is_empty() {
            return Err(PaymentError::validation(
                "user profile is incomplete, please log in again",
            ));
        }
        let amount = parse_amount(&form.amount)?;

        let configured = self.mpin_configured().await?;
        if configured {
            if form.mpin.is_empty() {
                return Err(PaymentError::validation("enter your MPIN to continue"));
            }
        } else {
            validate_pin_format(&form.mpin)?;
            if form.confirm_mpin.as_deref() != Some(form.mpin.as_str()) {
                return Err(PaymentError::validation("MPIN confirmation does not match"));
            }
        }

        Ok(ValidatedSubmission {
            amount,
            pin: form.mpin,
            create_mpin: !configured,
            payer_name: form.payer_name,
        })
    }

    async fn process(
        &self,
        vendor: &VendorAdvertisement,
        submission: ValidatedSubmission,
    ) -> PaymentResult<PaymentOutcome> {
        let services = &self.services;
        let user_id = self.user_id.as_str();
        let amount = submission.amount;

        let wallet = services.wallet.lock(user_id).await;

        if submission.create_mpin {
            services.mpin.store(user_id, &submission.pin).await?;
        } else if !services.mpin.verify(user_id, &submission.pin).await? {
            return Err(PaymentError::IncorrectMpin);
        }

        let available = wallet.balance().await?;
        if amount > available {
            return Err(PaymentError::InsufficientBalance {
                available,
                requested: amount,
            });
        }

        self.emit(PaymentProgress::UnlockingKey);
        if !services.config.unlock_delay.is_zero() {
            tokio::time::sleep(services.config.unlock_delay).await;
        }
        let keys = derive(&DerivationContext::payer(user_id, &submission.pin), user_id);

        self.emit(PaymentProgress::PreparingPayload);
        let signed = build_and_sign(
            vendor,
            amount,
            user_id,
            submission.payer_name.as_deref(),
            &keys,
            services.clock.as_ref(),
            services.ids.as_ref(),
        )?;

        self.emit(PaymentProgress::Exchanging);
        let ack = services.payer.exchange(&signed, vendor).await?;

        self.emit(PaymentProgress::ValidatingAck);
        verify_ack(&ack, vendor)?;

        self.emit(PaymentProgress::PersistingRecord);
        let record_id = services.ids.next_id(RECORD_ID_PREFIX);
        let ack_id = ack.ack_id().to_string();
        let record = OfflineTransactionRecord::stored_offline(
            record_id.clone(),
            signed,
            ack,
            services.clock.now_iso(),
        );
        services.ledger.append(record).await?;

        let new_balance = wallet.debit(amount).await?;
        self.emit(PaymentProgress::Completed);

        info!(
            user_id,
            vendor_id = %vendor.receiver_id,
            %amount,
            currency = BASE_CURRENCY,
            %ack_id,
            %record_id,
            %new_balance,
            "payment stored offline"
        );

        Ok(PaymentOutcome {
            ack_id,
            record_id,
            vendor_id: vendor.receiver_id.clone(),
            amount,
            new_balance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::BlobOfflineStore;
    use crate::storage::MemoryStore;

    fn services() -> Arc<PaymentServices> {
        let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
        let ledger = Arc::new(BlobOfflineStore::new(store.clone()));
        Arc::new(PaymentServices::new(store, ledger, SimulationConfig::instant()))
    }

    fn form(amount: &str, pin: &str, confirm: Option<&str>) -> PaymentForm {
        PaymentForm {
            amount: amount.into(),
            mpin: pin.into(),
            confirm_mpin: confirm.map(str::to_string),
            payer_name: None,
        }
    }

    async fn at_details(services: Arc<PaymentServices>) -> PaymentFlow {
        let mut flow = PaymentFlow::new(services, "user-1");
        flow.discover().await.unwrap();
        flow.select_vendor("vendor-bridge").unwrap();
        flow
    }

    fn xof(s: &str) -> Amount {
        s.parse().unwrap()
    }

    #[test]
    fn amount_parsing() {
        assert_eq!(parse_amount("50").unwrap(), Amount::from(50));
        assert_eq!(parse_amount(" 10000 ").unwrap(), Amount::from(10_000));
        assert_eq!(parse_amount("12.5").unwrap(), xof("12.5"));
        assert_eq!(parse_amount("0.01").unwrap(), xof("0.01"));
        for bad in ["0", "0.00", "-5", "abc", "", "NaN", "99999999999999999999999999999999999"] {
            assert!(
                matches!(parse_amount(bad), Err(PaymentError::Validation(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn happy_path_reaches_result() {
        let services = services();
        let mut flow = at_details(services.clone()).await;
        assert_eq!(flow.state(), FlowState::Details);
        assert!(!flow.mpin_configured().await.unwrap());

        let outcome = flow.submit(form("50", "1234", Some("1234"))).await.unwrap();
        assert_eq!(flow.state(), FlowState::Result);
        assert_eq!(outcome.new_balance, Amount::from(9_950));
        assert_eq!(outcome.vendor_id, "RX-4421");
        assert!(outcome.ack_id.starts_with("ack-"));
        assert!(outcome.record_id.starts_with("offline-"));
        assert_eq!(flow.outcome(), Some(&outcome));
        assert!(flow.mpin_configured().await.unwrap());

        flow.reset_flow();
        assert_eq!(flow.state(), FlowState::Discover);
        assert!(flow.vendors().is_empty());
        assert!(flow.outcome().is_none());
    }

    #[tokio::test]
    async fn progress_events_in_order() {
        let mut flow = at_details(services()).await;
        let mut rx = flow.subscribe();
        flow.submit(form("50", "1234", Some("1234"))).await.unwrap();

        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            seen.push(event);
        }
        assert_eq!(
            seen,
            [
                PaymentProgress::UnlockingKey,
                PaymentProgress::PreparingPayload,
                PaymentProgress::Exchanging,
                PaymentProgress::ValidatingAck,
                PaymentProgress::PersistingRecord,
                PaymentProgress::Completed,
            ]
        );
    }

    #[tokio::test]
    async fn confirmation_mismatch_stays_in_details() {
        let services = services();
        let mut flow = at_details(services.clone()).await;

        let err = flow.submit(form("50", "1234", Some("4321"))).await.unwrap_err();
        assert!(matches!(err, PaymentError::Validation(_)));
        assert_eq!(flow.state(), FlowState::Details);
        assert!(flow.last_error().unwrap().contains("confirmation"));
        assert!(!flow.mpin_configured().await.unwrap());
    }

    #[tokio::test]
    async fn wrong_mpin_is_rejected_before_signing() {
        let services = services();
        services.mpin().store("user-1", "1234").await.unwrap();
        let mut flow = at_details(services.clone()).await;
        let mut rx = flow.subscribe();

        let err = flow.submit(form("50", "9999", None)).await.unwrap_err();
        assert!(matches!(err, PaymentError::IncorrectMpin));
        assert_eq!(flow.state(), FlowState::Details);
        assert!(rx.try_recv().is_err());
        assert_eq!(services.balance("user-1").await.unwrap(), Amount::from(10_000));
    }

    #[tokio::test]
    async fn wrong_mpin_wins_over_overdraft() {
        let services = services();
        services.mpin().store("user-1", "1234").await.unwrap();
        let mut flow = at_details(services).await;

        let err = flow.submit(form("15000", "9999", None)).await.unwrap_err();
        assert!(matches!(err, PaymentError::IncorrectMpin));
    }

    #[tokio::test]
    async fn overdraft_on_first_payment_still_creates_mpin() {
        let services = services();
        let mut flow = at_details(services.clone()).await;
        let mut rx = flow.subscribe();

        let err = flow.submit(form("15000", "1234", Some("1234"))).await.unwrap_err();
        assert!(matches!(err, PaymentError::InsufficientBalance { .. }));
        assert_eq!(flow.state(), FlowState::Details);
        assert!(rx.try_recv().is_err());
        assert!(flow.mpin_configured().await.unwrap());
        assert!(services.mpin().verify("user-1", "1234").await.unwrap());
    }

    #[tokio::test]
    async fn spent_session_sends_flow_back_to_discover() {
        let services = services();
        let mut flow = at_details(services.clone()).await;
        let vendor = flow.selected_vendor().unwrap().clone();
        services
            .directory()
            .sessions()
            .consume(&vendor.id, &vendor.session_nonce)
            .unwrap();

        let err = flow.submit(form("50", "1234", Some("1234"))).await.unwrap_err();
        assert!(matches!(err, PaymentError::SessionMismatch(_)));
        assert_eq!(flow.state(), FlowState::Discover);
        assert!(flow.selected_vendor().is_none());
        assert!(flow.vendors().is_empty());
        assert!(flow.last_error().unwrap().contains("scan for vendors again"));

        flow.discover().await.unwrap();
        flow.select_vendor("vendor-bridge").unwrap();
        let outcome = flow.submit(form("50", "1234", None)).await.unwrap();
        assert_eq!(outcome.new_balance, Amount::from(9_950));
    }

    #[tokio::test]
    async fn failure_with_open_session_stays_in_details() {
        let services = services();
        let mut flow = at_details(services.clone()).await;
        let vendor = flow.selected_vendor().unwrap().clone();

        assert!(flow.submit(form("20000", "1234", Some("1234"))).await.is_err());
        assert_eq!(flow.state(), FlowState::Details);
        assert!(services
            .directory()
            .sessions()
            .is_open(&vendor.id, &vendor.session_nonce));
    }

    #[tokio::test]
    async fn empty_mpin_when_configured() {
        let services = services();
        services.mpin().store("user-1", "1234").await.unwrap();
        let mut flow = at_details(services).await;
        assert!(matches!(
            flow.submit(form("50", "", None)).await,
            Err(PaymentError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn operations_rejected_in_wrong_state() {
        let mut flow = PaymentFlow::new(services(), "user-1");
        assert!(matches!(
            flow.submit(form("50", "1234", Some("1234"))).await,
            Err(PaymentError::InvalidState { .. })
        ));

        flow.discover().await.unwrap();
        assert!(flow.select_vendor("vendor-ghost").is_err());
        assert_eq!(flow.state(), FlowState::Discover);

        flow.select_vendor("vendor-cafe").unwrap();
        assert!(matches!(
            flow.discover().await,
            Err(PaymentError::InvalidState { .. })
        ));
    }

    #[tokio::test]
    async fn retry_after_failure_succeeds() {
        let services = services();
        let mut flow = at_details(services.clone()).await;

        assert!(flow.submit(form("0", "1234", Some("1234"))).await.is_err());
        let outcome = flow.submit(form("75.5", "1234", Some("1234"))).await.unwrap();
        assert_eq!(outcome.new_balance, xof("9924.5"));
        assert_eq!(services.history("user-1").await.unwrap().len(), 1);
        assert!(services.history("user-2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn logout_clears_mpin_only() {
        let services = services();
        let mut flow = at_details(services.clone()).await;
        flow.submit(form("50", "1234", Some("1234"))).await.unwrap();

        services.logout("user-1").await.unwrap();
        assert!(!services.mpin().exists("user-1").await.unwrap());
        assert_eq!(services.balance("user-1").await.unwrap(), Amount::from(9_950));
        assert_eq!(services.history("user-1").await.unwrap().len(), 1);
    }
}
