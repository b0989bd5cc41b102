// 6.0 account.rs: the smart margin account root. owns the ledger, the
// conditional-order store, the trigger registry, and the event log. all
// mutating entry points run under one execution guard and either commit
// completely or leave no trace.

use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::commands::{Command, CommandKind, DispatchError};
use crate::conditional::{ConditionalOrder, ConditionalOrderParams, TriggerRegistry};
use crate::config::{AccountConfig, ExchangeSettings};
use crate::events::{
    ConditionalCancelReason, ConditionalOrderCancelledEvent, ConditionalOrderFilledEvent,
    ConditionalOrderPlacedEvent, DepositEvent, Event, EventLog, EventPayload, FeeImposedEvent,
    GasDepositEvent, GasWithdrawEvent, OwnershipTransferredEvent, WithdrawEvent,
};
use crate::fees::trade_fee;
use crate::ledger::{CollateralLedger, LedgerError};
use crate::types::{Address, ConditionalOrderId, MarketKey, Price, Quote, SignedSize, Timestamp};
use crate::venue::{MarginVenue, VenueError, TRACKING_CODE};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AccountError {
    #[error("Unauthorized: caller {caller} is not the owner")]
    Unauthorized { caller: Address },

    #[error("Unauthorized: caller {caller} is not the automation caller")]
    NotAutomation { caller: Address },

    #[error("Reentrant call blocked")]
    Reentered,

    #[error("Invalid margin delta")]
    InvalidMarginDelta,

    #[error("Cannot pay fee")]
    CannotPayFee,

    #[error("Zero size delta")]
    ZeroSizeDelta,

    #[error("Conditional order {0:?} not found")]
    ConditionalOrderNotFound(ConditionalOrderId),

    #[error("Conditional order {0:?} cannot execute")]
    CannotExecuteConditionalOrder(ConditionalOrderId),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Venue(#[from] VenueError),
}

/** 6.1: account root. one per owner, durable across calls */
#[derive(Debug, Clone)]
pub struct SmartAccount {
    owner: Address,
    /// Designated automation caller allowed to fill conditional orders.
    automation: Address,
    settings: ExchangeSettings,
    ledger: CollateralLedger,
    conditional_orders: HashMap<ConditionalOrderId, ConditionalOrder>,
    next_conditional_order_id: u64,
    triggers: TriggerRegistry,
    treasury_accrued: Quote,
    events: EventLog,
    guard: bool,
    current_time: Timestamp,
}

impl SmartAccount {
    pub fn new(
        owner: Address,
        automation: Address,
        settings: ExchangeSettings,
        config: AccountConfig,
    ) -> Self {
        Self {
            owner,
            automation,
            settings,
            ledger: CollateralLedger::new(),
            conditional_orders: HashMap::new(),
            next_conditional_order_id: 0,
            triggers: TriggerRegistry::new(),
            treasury_accrued: Quote::zero(),
            events: EventLog::new(config.max_events, config.verbose),
            guard: false,
            current_time: Timestamp::from_millis(0),
        }
    }

    // --- time (explicit, caller-advanced) ---

    pub fn set_time(&mut self, timestamp: Timestamp) {
        self.current_time = timestamp;
    }

    pub fn advance_time(&mut self, millis: i64) {
        self.current_time = Timestamp::from_millis(self.current_time.as_millis() + millis);
    }

    pub fn time(&self) -> Timestamp {
        self.current_time
    }

    // --- reads ---

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn collateral_balance(&self) -> Quote {
        self.ledger.collateral
    }

    pub fn gas_balance(&self) -> Quote {
        self.ledger.gas
    }

    pub fn free_collateral(&self) -> Quote {
        self.ledger.free_collateral()
    }

    pub fn treasury_accrued(&self) -> Quote {
        self.treasury_accrued
    }

    pub fn ledger(&self) -> &CollateralLedger {
        &self.ledger
    }

    pub fn events(&self) -> &[Event] {
        self.events.events()
    }

    pub fn next_conditional_order_id(&self) -> ConditionalOrderId {
        ConditionalOrderId(self.next_conditional_order_id)
    }

    pub fn open_conditional_orders(&self) -> usize {
        self.conditional_orders.len()
    }

    /// Stored record, or the empty sentinel when filled/cancelled/never placed.
    pub fn conditional_order(&self, id: ConditionalOrderId) -> ConditionalOrder {
        self.conditional_orders
            .get(&id)
            .cloned()
            .unwrap_or_else(ConditionalOrder::empty)
    }

    // --- guard ---

    fn lock(&mut self) -> Result<(), AccountError> {
        if self.guard {
            return Err(AccountError::Reentered);
        }
        self.guard = true;
        Ok(())
    }

    fn unlock(&mut self) {
        self.guard = false;
    }

    fn require_owner(&self, caller: Address) -> Result<(), AccountError> {
        if caller != self.owner {
            return Err(AccountError::Unauthorized { caller });
        }
        Ok(())
    }

    fn emit(&mut self, payload: EventPayload) {
        self.events.record(self.current_time, payload);
    }

    // --- ownership ---

    pub fn transfer_ownership(
        &mut self,
        caller: Address,
        new_owner: Address,
    ) -> Result<(), AccountError> {
        self.require_owner(caller)?;
        self.lock()?;

        let previous_owner = self.owner;
        self.owner = new_owner;
        self.emit(EventPayload::OwnershipTransferred(OwnershipTransferredEvent {
            previous_owner,
            new_owner,
        }));

        self.unlock();
        Ok(())
    }

    // --- collateral and gas ---

    pub fn deposit(&mut self, caller: Address, amount: Quote) -> Result<(), AccountError> {
        self.require_owner(caller)?;
        self.lock()?;

        let result = self.ledger.deposit(amount).map_err(AccountError::from);
        if result.is_ok() {
            let new_balance = self.ledger.collateral;
            self.emit(EventPayload::Deposit(DepositEvent {
                amount,
                new_balance,
            }));
        }

        self.unlock();
        result
    }

    pub fn withdraw(&mut self, caller: Address, amount: Quote) -> Result<(), AccountError> {
        self.require_owner(caller)?;
        self.lock()?;

        let result = self.ledger.withdraw(amount).map_err(AccountError::from);
        if result.is_ok() {
            let new_balance = self.ledger.collateral;
            self.emit(EventPayload::Withdraw(WithdrawEvent {
                amount,
                new_balance,
            }));
        }

        self.unlock();
        result
    }

    /// Native gas top-up. Modeled after a plain value transfer: no owner check.
    pub fn deposit_gas(&mut self, amount: Quote) -> Result<(), AccountError> {
        self.lock()?;

        let result = self.ledger.deposit_gas(amount).map_err(AccountError::from);
        if result.is_ok() {
            let new_balance = self.ledger.gas;
            self.emit(EventPayload::GasDeposit(GasDepositEvent {
                amount,
                new_balance,
            }));
        }

        self.unlock();
        result
    }

    pub fn withdraw_gas(&mut self, caller: Address, amount: Quote) -> Result<(), AccountError> {
        self.require_owner(caller)?;
        self.lock()?;

        let result = self.ledger.withdraw_gas(amount).map_err(AccountError::from);
        if result.is_ok() {
            let new_balance = self.ledger.gas;
            self.emit(EventPayload::GasWithdraw(GasWithdrawEvent {
                amount,
                new_balance,
            }));
        }

        self.unlock();
        result
    }

    // --- command dispatcher ---

    /// Execute an ordered batch of commands as one all-or-nothing unit.
    /// Any decode or handler failure rolls back every earlier command's
    /// state changes, including events emitted mid-batch.
    pub fn execute<V: MarginVenue>(
        &mut self,
        caller: Address,
        venue: &mut V,
        opcodes: &[u8],
        payloads: &[Vec<Decimal>],
    ) -> Result<(), AccountError> {
        self.require_owner(caller)?;
        self.lock()?;
        let result = self.execute_batch(venue, opcodes, payloads);
        self.unlock();
        result
    }

    fn execute_batch<V: MarginVenue>(
        &mut self,
        venue: &mut V,
        opcodes: &[u8],
        payloads: &[Vec<Decimal>],
    ) -> Result<(), AccountError> {
        if opcodes.len() != payloads.len() {
            return Err(DispatchError::LengthMismatch {
                commands: opcodes.len(),
                inputs: payloads.len(),
            }
            .into());
        }

        let checkpoint = (self.clone(), venue.clone());

        for (opcode, payload) in opcodes.iter().zip(payloads) {
            let step = CommandKind::try_from(*opcode)
                .and_then(|kind| Command::decode(kind, payload))
                .map_err(AccountError::from)
                .and_then(|command| self.dispatch(venue, command));

            if let Err(err) = step {
                *self = checkpoint.0;
                *venue = checkpoint.1;
                return Err(err);
            }
        }

        Ok(())
    }

    fn dispatch<V: MarginVenue>(
        &mut self,
        venue: &mut V,
        command: Command,
    ) -> Result<(), AccountError> {
        match command {
            Command::ModifyMargin {
                market,
                margin_delta,
            } => self.modify_margin(venue, market, margin_delta),
            Command::WithdrawAllMargin { market } => self.withdraw_all_margin(venue, market),
            Command::SubmitAtomicOrder {
                market,
                size_delta,
                price_impact_delta,
            } => {
                self.impose_fee(venue, market, size_delta)?;
                venue.submit_atomic_order(market, size_delta, price_impact_delta, TRACKING_CODE)?;
                Ok(())
            }
            Command::SubmitDelayedOrder {
                market,
                size_delta,
                price_impact_delta,
                desired_time_delta_ms,
            } => {
                self.impose_fee(venue, market, size_delta)?;
                venue.submit_delayed_order(
                    market,
                    size_delta,
                    price_impact_delta,
                    desired_time_delta_ms,
                    TRACKING_CODE,
                )?;
                Ok(())
            }
            Command::SubmitOffchainDelayedOrder {
                market,
                size_delta,
                price_impact_delta,
            } => {
                self.impose_fee(venue, market, size_delta)?;
                venue.submit_offchain_delayed_order(
                    market,
                    size_delta,
                    price_impact_delta,
                    TRACKING_CODE,
                )?;
                Ok(())
            }
            Command::CancelDelayedOrder { market } => {
                venue.cancel_delayed_order(market)?;
                Ok(())
            }
            Command::CancelOffchainDelayedOrder { market } => {
                venue.cancel_offchain_delayed_order(market)?;
                Ok(())
            }
            Command::ClosePosition {
                market,
                price_impact_delta,
            } => {
                venue.close_position(market, price_impact_delta)?;
                Ok(())
            }
        }
    }

    // --- market command handlers ---

    fn modify_margin<V: MarginVenue>(
        &mut self,
        venue: &mut V,
        market: MarketKey,
        margin_delta: Quote,
    ) -> Result<(), AccountError> {
        if margin_delta.is_zero() {
            return Err(AccountError::InvalidMarginDelta);
        }

        if margin_delta.is_positive() {
            // ledger debited before the venue sees the margin
            self.ledger.debit(margin_delta)?;
            venue.transfer_margin(market, margin_delta)?;
        } else {
            // venue-side insufficiency propagates verbatim
            venue.transfer_margin(market, margin_delta)?;
            self.ledger.credit(margin_delta.abs());
        }

        Ok(())
    }

    fn withdraw_all_margin<V: MarginVenue>(
        &mut self,
        venue: &mut V,
        market: MarketKey,
    ) -> Result<(), AccountError> {
        let pulled = venue.withdraw_all_margin(market)?;
        if !pulled.is_zero() {
            self.ledger.credit(pulled);
        }
        Ok(())
    }

    /// Charge the trade fee for a non-zero size delta at the venue's current
    /// price. The debit must succeed in full or the enclosing batch aborts.
    fn impose_fee<V: MarginVenue>(
        &mut self,
        venue: &V,
        market: MarketKey,
        size_delta: SignedSize,
    ) -> Result<(), AccountError> {
        if size_delta.is_zero() {
            return Ok(());
        }

        let reading = venue.asset_price(market)?;
        if reading.invalid {
            return Err(VenueError::InvalidPrice.into());
        }

        let fee = trade_fee(size_delta, reading.price, self.settings.trade_fee_bps);
        if !fee.is_zero() {
            self.ledger
                .debit(fee)
                .map_err(|_| AccountError::CannotPayFee)?;
            self.treasury_accrued = self.treasury_accrued.add(fee);
        }

        let treasury = self.settings.treasury;
        self.emit(EventPayload::FeeImposed(FeeImposedEvent {
            market,
            size_delta,
            fee,
            treasury,
        }));

        Ok(())
    }

    // --- conditional order engine ---

    pub fn place_conditional_order(
        &mut self,
        caller: Address,
        params: ConditionalOrderParams,
    ) -> Result<ConditionalOrderId, AccountError> {
        self.require_owner(caller)?;
        self.lock()?;
        let result = self.place_conditional_order_inner(params);
        self.unlock();
        result
    }

    fn place_conditional_order_inner(
        &mut self,
        params: ConditionalOrderParams,
    ) -> Result<ConditionalOrderId, AccountError> {
        if params.size_delta.is_zero() {
            return Err(AccountError::ZeroSizeDelta);
        }

        let id = ConditionalOrderId(self.next_conditional_order_id);
        self.next_conditional_order_id += 1;

        let trigger = self.triggers.register(id);
        let order = ConditionalOrder::from_params(&params, trigger);
        self.conditional_orders.insert(id, order);

        self.emit(EventPayload::ConditionalOrderPlaced(
            ConditionalOrderPlacedEvent {
                id,
                market: params.market,
                margin_delta: params.margin_delta,
                size_delta: params.size_delta,
                target_price: params.target_price,
                kind: params.kind,
                reduce_only: params.reduce_only,
            },
        ));

        Ok(id)
    }

    pub fn cancel_conditional_order(
        &mut self,
        caller: Address,
        id: ConditionalOrderId,
    ) -> Result<(), AccountError> {
        self.require_owner(caller)?;
        self.lock()?;
        let result = self.cancel_conditional_order_inner(id);
        self.unlock();
        result
    }

    fn cancel_conditional_order_inner(
        &mut self,
        id: ConditionalOrderId,
    ) -> Result<(), AccountError> {
        let order = self
            .conditional_orders
            .remove(&id)
            .ok_or(AccountError::ConditionalOrderNotFound(id))?;

        self.triggers.cancel(order.trigger);
        self.emit(EventPayload::ConditionalOrderCancelled(
            ConditionalOrderCancelledEvent {
                id,
                reason: ConditionalCancelReason::ByUser,
            },
        ));

        Ok(())
    }

    /// Off-chain eligibility probe the automation network polls. Returns
    /// whether the order can fill right now and, when it can, the id to pass
    /// to `fill_conditional_order`. Never mutates.
    pub fn checker<V: MarginVenue>(
        &self,
        venue: &V,
        id: ConditionalOrderId,
    ) -> (bool, Option<ConditionalOrderId>) {
        let order = self.conditional_order(id);
        if order.is_empty() {
            return (false, None);
        }

        let Ok(reading) = venue.asset_price(order.market) else {
            return (false, None);
        };
        if reading.invalid {
            return (false, None);
        }

        if order.is_eligible(reading.price) {
            (true, Some(id))
        } else {
            (false, None)
        }
    }

    /// Keeper entry point. Re-validates eligibility at call time, clears the
    /// record before delegating to the market handlers so a racing second
    /// fill observes an empty record, and pays the keeper out of the gas
    /// balance. Ineligibility leaves the record untouched for a later retry.
    pub fn fill_conditional_order<V: MarginVenue>(
        &mut self,
        caller: Address,
        venue: &mut V,
        id: ConditionalOrderId,
    ) -> Result<(), AccountError> {
        if caller != self.automation {
            return Err(AccountError::NotAutomation { caller });
        }
        self.lock()?;
        let result = self.fill_conditional_order_inner(venue, id);
        self.unlock();
        result
    }

    fn fill_conditional_order_inner<V: MarginVenue>(
        &mut self,
        venue: &mut V,
        id: ConditionalOrderId,
    ) -> Result<(), AccountError> {
        let order = self
            .conditional_orders
            .get(&id)
            .cloned()
            .ok_or(AccountError::ConditionalOrderNotFound(id))?;

        let reading = venue.asset_price(order.market)?;
        if reading.invalid {
            return Err(VenueError::InvalidPrice.into());
        }
        let fill_price = reading.price;

        if !order.is_eligible(fill_price) {
            return Err(AccountError::CannotExecuteConditionalOrder(id));
        }

        if order.reduce_only {
            let position_size = venue
                .position(order.market)
                .map(|p| p.size)
                .unwrap_or_else(SignedSize::zero);

            // the venue's own protections have made this order meaningless:
            // treat it as implicitly cancelled rather than leaving it stuck
            if position_size.is_zero() || !order.size_delta.reduces(position_size) {
                self.conditional_orders.remove(&id);
                self.triggers.cancel(order.trigger);
                self.emit(EventPayload::ConditionalOrderCancelled(
                    ConditionalOrderCancelledEvent {
                        id,
                        reason: ConditionalCancelReason::ReduceOnlyInvalid,
                    },
                ));
                return Ok(());
            }
        }

        let checkpoint = (self.clone(), venue.clone());
        let result = self.fill_effects(venue, id, &order, fill_price);
        if result.is_err() {
            *self = checkpoint.0;
            *venue = checkpoint.1;
        }
        result
    }

    fn fill_effects<V: MarginVenue>(
        &mut self,
        venue: &mut V,
        id: ConditionalOrderId,
        order: &ConditionalOrder,
        fill_price: Price,
    ) -> Result<(), AccountError> {
        // clear first: a reentrant fill on the same id now sees the sentinel
        self.conditional_orders.remove(&id);
        self.triggers.cancel(order.trigger);

        let keeper_fee = self.settings.keeper_fee;
        if !keeper_fee.is_zero() {
            self.ledger.withdraw_gas(keeper_fee)?;
        }

        if !order.reduce_only && !order.margin_delta.is_zero() {
            self.modify_margin(venue, order.market, order.margin_delta)?;
        }

        self.impose_fee(venue, order.market, order.size_delta)?;
        venue.submit_offchain_delayed_order(
            order.market,
            order.size_delta,
            order.price_impact_delta,
            TRACKING_CODE,
        )?;

        self.emit(EventPayload::ConditionalOrderFilled(
            ConditionalOrderFilledEvent {
                id,
                fill_price,
                keeper_fee,
            },
        ));

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditional::ConditionalOrderKind;
    use crate::venue::SimVenue;
    use rust_decimal_macros::dec;

    const OWNER: Address = Address(1);
    const KEEPER: Address = Address(2);
    const RANDO: Address = Address(3);
    const ETH: MarketKey = MarketKey(1);

    fn account() -> SmartAccount {
        let mut account = SmartAccount::new(
            OWNER,
            KEEPER,
            ExchangeSettings::default(),
            AccountConfig::default(),
        );
        account.deposit(OWNER, Quote::new(dec!(10000))).unwrap();
        account.deposit_gas(Quote::new(dec!(10))).unwrap();
        account
    }

    fn venue() -> SimVenue {
        let mut venue = SimVenue::new();
        venue.add_market(ETH, Price::new_unchecked(dec!(2000)));
        venue
    }

    fn limit_buy(target: Decimal) -> ConditionalOrderParams {
        ConditionalOrderParams {
            market: ETH,
            margin_delta: Quote::new(dec!(1000)),
            size_delta: SignedSize::new(dec!(1)),
            target_price: target,
            kind: ConditionalOrderKind::Limit,
            price_impact_delta: dec!(0.01),
            reduce_only: false,
        }
    }

    #[test]
    fn only_owner_can_move_collateral() {
        let mut account = account();

        let err = account.deposit(RANDO, Quote::new(dec!(1))).unwrap_err();
        assert_eq!(err, AccountError::Unauthorized { caller: RANDO });

        let err = account.withdraw(RANDO, Quote::new(dec!(1))).unwrap_err();
        assert_eq!(err, AccountError::Unauthorized { caller: RANDO });

        let err = account.withdraw_gas(RANDO, Quote::new(dec!(1))).unwrap_err();
        assert_eq!(err, AccountError::Unauthorized { caller: RANDO });
    }

    #[test]
    fn ownership_transfer_moves_authority() {
        let mut account = account();
        account.transfer_ownership(OWNER, RANDO).unwrap();

        assert_eq!(account.owner(), RANDO);
        assert!(account.deposit(OWNER, Quote::new(dec!(1))).is_err());
        account.deposit(RANDO, Quote::new(dec!(1))).unwrap();
    }

    #[test]
    fn deposit_withdraw_emit_events() {
        let account = account();
        let payloads: Vec<_> = account.events().iter().map(|e| &e.payload).collect();

        assert!(matches!(payloads[0], EventPayload::Deposit(_)));
        assert!(matches!(payloads[1], EventPayload::GasDeposit(_)));
    }

    #[test]
    fn modify_margin_moves_collateral_to_venue() {
        let mut account = account();
        let mut venue = venue();

        account
            .execute(
                OWNER,
                &mut venue,
                &[CommandKind::ModifyMargin.opcode()],
                &[vec![dec!(1), dec!(2500)]],
            )
            .unwrap();

        assert_eq!(account.collateral_balance().value(), dec!(7500));
        assert_eq!(venue.position(ETH).unwrap().margin.value(), dec!(2500));
    }

    #[test]
    fn zero_margin_delta_rejected() {
        let mut account = account();
        let mut venue = venue();

        let err = account
            .execute(
                OWNER,
                &mut venue,
                &[CommandKind::ModifyMargin.opcode()],
                &[vec![dec!(1), dec!(0)]],
            )
            .unwrap_err();
        assert_eq!(err, AccountError::InvalidMarginDelta);
        assert_eq!(account.collateral_balance().value(), dec!(10000));
    }

    #[test]
    fn batch_rolls_back_on_failure() {
        let mut account = account();
        let mut venue = venue();

        let events_before = account.events().len();

        // first command succeeds, second cancels a nonexistent delayed order
        let err = account
            .execute(
                OWNER,
                &mut venue,
                &[
                    CommandKind::ModifyMargin.opcode(),
                    CommandKind::CancelDelayedOrder.opcode(),
                ],
                &[vec![dec!(1), dec!(2500)], vec![dec!(1)]],
            )
            .unwrap_err();
        assert_eq!(err, AccountError::Venue(VenueError::NoPreviousOrder));

        // everything rolled back, including the margin move
        assert_eq!(account.collateral_balance().value(), dec!(10000));
        assert!(venue.position(ETH).is_none());
        assert_eq!(account.events().len(), events_before);
    }

    #[test]
    fn length_mismatch_fails_before_any_handler() {
        let mut account = account();
        let mut venue = venue();

        let err = account
            .execute(
                OWNER,
                &mut venue,
                &[CommandKind::ModifyMargin.opcode()],
                &[],
            )
            .unwrap_err();
        assert_eq!(
            err,
            AccountError::Dispatch(DispatchError::LengthMismatch {
                commands: 1,
                inputs: 0,
            })
        );
        assert_eq!(account.collateral_balance().value(), dec!(10000));
    }

    #[test]
    fn fee_imposed_on_atomic_order() {
        let mut account = account();
        let mut venue = venue();

        // 2 ETH * $2000 = $4000 notional at 5 bps = $2 fee
        account
            .execute(
                OWNER,
                &mut venue,
                &[
                    CommandKind::ModifyMargin.opcode(),
                    CommandKind::SubmitAtomicOrder.opcode(),
                ],
                &[vec![dec!(1), dec!(2000)], vec![dec!(1), dec!(2), dec!(0.01)]],
            )
            .unwrap();

        assert_eq!(account.collateral_balance().value(), dec!(7998));
        assert_eq!(account.treasury_accrued().value(), dec!(2));
        assert!(account
            .events()
            .iter()
            .any(|e| matches!(e.payload, EventPayload::FeeImposed(_))));
    }

    #[test]
    fn cannot_pay_fee_aborts_batch() {
        let mut account = account();
        let mut venue = venue();

        // sink nearly all collateral into margin, leaving less than the fee
        let err = account
            .execute(
                OWNER,
                &mut venue,
                &[
                    CommandKind::ModifyMargin.opcode(),
                    CommandKind::SubmitAtomicOrder.opcode(),
                ],
                &[
                    vec![dec!(1), dec!(9999.5)],
                    vec![dec!(1), dec!(2), dec!(0.01)],
                ],
            )
            .unwrap_err();
        assert_eq!(err, AccountError::CannotPayFee);

        assert_eq!(account.collateral_balance().value(), dec!(10000));
        assert!(venue.position(ETH).is_none());
    }

    #[test]
    fn conditional_ids_start_at_zero_and_increase() {
        let mut account = account();

        let a = account
            .place_conditional_order(OWNER, limit_buy(dec!(1900)))
            .unwrap();
        let b = account
            .place_conditional_order(OWNER, limit_buy(dec!(1800)))
            .unwrap();

        assert_eq!(a, ConditionalOrderId(0));
        assert_eq!(b, ConditionalOrderId(1));

        // cancellation never frees an id for reuse
        account.cancel_conditional_order(OWNER, a).unwrap();
        let c = account
            .place_conditional_order(OWNER, limit_buy(dec!(1700)))
            .unwrap();
        assert_eq!(c, ConditionalOrderId(2));
    }

    #[test]
    fn cancelled_order_reads_back_as_sentinel() {
        let mut account = account();
        let id = account
            .place_conditional_order(OWNER, limit_buy(dec!(1900)))
            .unwrap();

        assert!(!account.conditional_order(id).is_empty());
        account.cancel_conditional_order(OWNER, id).unwrap();
        assert!(account.conditional_order(id).is_empty());

        let err = account.cancel_conditional_order(OWNER, id).unwrap_err();
        assert_eq!(err, AccountError::ConditionalOrderNotFound(id));
    }

    #[test]
    fn checker_tracks_price() {
        let mut account = account();
        let mut venue = venue();
        let id = account
            .place_conditional_order(OWNER, limit_buy(dec!(1900)))
            .unwrap();

        assert_eq!(account.checker(&venue, id), (false, None));

        venue.set_price(ETH, Price::new_unchecked(dec!(1890)));
        assert_eq!(account.checker(&venue, id), (true, Some(id)));

        venue.set_price_invalid(ETH, true);
        assert_eq!(account.checker(&venue, id), (false, None));
    }

    #[test]
    fn fill_requires_automation_caller() {
        let mut account = account();
        let mut venue = venue();
        let id = account
            .place_conditional_order(OWNER, limit_buy(dec!(1900)))
            .unwrap();

        let err = account
            .fill_conditional_order(OWNER, &mut venue, id)
            .unwrap_err();
        assert_eq!(err, AccountError::NotAutomation { caller: OWNER });
    }

    #[test]
    fn ineligible_fill_leaves_record_for_retry() {
        let mut account = account();
        let mut venue = venue();
        let id = account
            .place_conditional_order(OWNER, limit_buy(dec!(1900)))
            .unwrap();

        let err = account
            .fill_conditional_order(KEEPER, &mut venue, id)
            .unwrap_err();
        assert_eq!(err, AccountError::CannotExecuteConditionalOrder(id));
        assert!(!account.conditional_order(id).is_empty());

        // conditions met later, same record fills
        venue.set_price(ETH, Price::new_unchecked(dec!(1890)));
        account.fill_conditional_order(KEEPER, &mut venue, id).unwrap();
        assert!(account.conditional_order(id).is_empty());
    }

    #[test]
    fn fill_pays_keeper_from_gas_balance() {
        let mut account = account();
        let mut venue = venue();
        let id = account
            .place_conditional_order(OWNER, limit_buy(dec!(1900)))
            .unwrap();

        venue.set_price(ETH, Price::new_unchecked(dec!(1890)));
        let gas_before = account.gas_balance();
        account.fill_conditional_order(KEEPER, &mut venue, id).unwrap();

        let keeper_fee = ExchangeSettings::default().keeper_fee;
        assert_eq!(account.gas_balance(), gas_before.sub(keeper_fee));
        assert!(venue.offchain_delayed_order(ETH).is_some());
    }

    #[test]
    fn double_fill_fails_fast() {
        let mut account = account();
        let mut venue = venue();
        let id = account
            .place_conditional_order(OWNER, limit_buy(dec!(1900)))
            .unwrap();

        venue.set_price(ETH, Price::new_unchecked(dec!(1890)));
        account.fill_conditional_order(KEEPER, &mut venue, id).unwrap();

        let err = account
            .fill_conditional_order(KEEPER, &mut venue, id)
            .unwrap_err();
        assert_eq!(err, AccountError::ConditionalOrderNotFound(id));
    }

    #[test]
    fn reduce_only_against_no_position_implicitly_cancels() {
        let mut account = account();
        let mut venue = venue();

        let id = account
            .place_conditional_order(
                OWNER,
                ConditionalOrderParams {
                    market: ETH,
                    margin_delta: Quote::zero(),
                    size_delta: SignedSize::new(dec!(-1)),
                    target_price: dec!(2100),
                    kind: ConditionalOrderKind::Limit,
                    price_impact_delta: dec!(0.01),
                    reduce_only: true,
                },
            )
            .unwrap();

        venue.set_price(ETH, Price::new_unchecked(dec!(2100)));
        account.fill_conditional_order(KEEPER, &mut venue, id).unwrap();

        // no fill happened, record cleared, reason recorded
        assert!(venue.offchain_delayed_order(ETH).is_none());
        assert!(account.conditional_order(id).is_empty());
        assert!(account.events().iter().any(|e| matches!(
            &e.payload,
            EventPayload::ConditionalOrderCancelled(ev)
                if ev.reason == ConditionalCancelReason::ReduceOnlyInvalid
        )));
    }

    #[test]
    fn fill_rolls_back_when_effects_fail() {
        let mut account = account();
        let mut venue = venue();

        // an off-chain order already rests, so the fill's submission collides
        venue
            .submit_offchain_delayed_order(ETH, SignedSize::new(dec!(1)), dec!(0.01), TRACKING_CODE)
            .unwrap();

        let id = account
            .place_conditional_order(OWNER, limit_buy(dec!(1900)))
            .unwrap();
        venue.set_price(ETH, Price::new_unchecked(dec!(1890)));

        let gas_before = account.gas_balance();
        let err = account
            .fill_conditional_order(KEEPER, &mut venue, id)
            .unwrap_err();
        assert_eq!(err, AccountError::Venue(VenueError::OrderAlreadyExists(ETH)));

        // record restored, keeper fee refunded, margin untouched
        assert!(!account.conditional_order(id).is_empty());
        assert_eq!(account.gas_balance(), gas_before);
        assert_eq!(account.collateral_balance().value(), dec!(10000));
    }
}
