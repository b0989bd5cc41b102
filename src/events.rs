// 8.0: every state change produces an event. used for audit trails, state
// reconstruction, and as the feed the keeper network and indexers watch.
// the EventPayload enum lists all event types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::conditional::ConditionalOrderKind;
use crate::types::{Address, ConditionalOrderId, MarketKey, Price, Quote, SignedSize, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self {
            id,
            timestamp,
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    // Ledger events
    Deposit(DepositEvent),
    Withdraw(WithdrawEvent),
    GasDeposit(GasDepositEvent),
    GasWithdraw(GasWithdrawEvent),

    // Fee events
    FeeImposed(FeeImposedEvent),

    // Conditional order lifecycle
    ConditionalOrderPlaced(ConditionalOrderPlacedEvent),
    ConditionalOrderCancelled(ConditionalOrderCancelledEvent),
    ConditionalOrderFilled(ConditionalOrderFilledEvent),

    // Ownership
    OwnershipTransferred(OwnershipTransferredEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositEvent {
    pub amount: Quote,
    pub new_balance: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawEvent {
    pub amount: Quote,
    pub new_balance: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GasDepositEvent {
    pub amount: Quote,
    pub new_balance: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GasWithdrawEvent {
    pub amount: Quote,
    pub new_balance: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeImposedEvent {
    pub market: MarketKey,
    pub size_delta: SignedSize,
    pub fee: Quote,
    pub treasury: Address,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionalOrderPlacedEvent {
    pub id: ConditionalOrderId,
    pub market: MarketKey,
    pub margin_delta: Quote,
    pub size_delta: SignedSize,
    pub target_price: Decimal,
    pub kind: ConditionalOrderKind,
    pub reduce_only: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionalOrderCancelledEvent {
    pub id: ConditionalOrderId,
    pub reason: ConditionalCancelReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionalCancelReason {
    /// Explicit owner cancellation.
    ByUser,
    /// Reduce-only order whose target position no longer admits a reduction.
    ReduceOnlyInvalid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionalOrderFilledEvent {
    pub id: ConditionalOrderId,
    pub fill_price: Price,
    pub keeper_fee: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnershipTransferredEvent {
    pub previous_owner: Address,
    pub new_owner: Address,
}

/// Append-only event log with a retention cap.
#[derive(Debug, Clone)]
pub struct EventLog {
    events: Vec<Event>,
    next_id: u64,
    max_events: usize,
    verbose: bool,
}

impl EventLog {
    pub fn new(max_events: usize, verbose: bool) -> Self {
        Self {
            events: Vec::new(),
            next_id: 1,
            max_events,
            verbose,
        }
    }

    pub fn record(&mut self, timestamp: Timestamp, payload: EventPayload) {
        let event = Event::new(EventId(self.next_id), timestamp, payload);
        self.next_id += 1;

        if self.verbose {
            println!("[Event {}] {:?}", event.id.0, event.payload);
        }

        self.events.push(event);

        if self.events.len() > self.max_events {
            let drain_count = self.events.len() - self.max_events;
            self.events.drain(0..drain_count);
        }
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn recent(&self, count: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(count);
        &self.events[start..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn log_records_in_order() {
        let mut log = EventLog::new(100, false);

        log.record(
            Timestamp::from_millis(1000),
            EventPayload::Deposit(DepositEvent {
                amount: Quote::new(dec!(10000)),
                new_balance: Quote::new(dec!(10000)),
            }),
        );
        log.record(
            Timestamp::from_millis(2000),
            EventPayload::Withdraw(WithdrawEvent {
                amount: Quote::new(dec!(500)),
                new_balance: Quote::new(dec!(9500)),
            }),
        );

        assert_eq!(log.events().len(), 2);
        assert!(log.events()[0].id < log.events()[1].id);
    }

    #[test]
    fn log_respects_retention_cap() {
        let mut log = EventLog::new(3, false);

        for i in 0..5 {
            log.record(
                Timestamp::from_millis(i),
                EventPayload::GasDeposit(GasDepositEvent {
                    amount: Quote::new(dec!(1)),
                    new_balance: Quote::new(Decimal::from(i + 1)),
                }),
            );
        }

        assert_eq!(log.events().len(), 3);
        // ids keep increasing even after older events are dropped
        assert_eq!(log.events()[0].id, EventId(3));
        assert_eq!(log.recent(1)[0].id, EventId(5));
    }

    #[test]
    fn fee_imposed_event_shape() {
        let fee = FeeImposedEvent {
            market: MarketKey(1),
            size_delta: SignedSize::new(dec!(-2)),
            fee: Quote::new(dec!(2)),
            treasury: Address(0xFEE),
        };

        assert!(fee.size_delta.is_short());
        assert_eq!(fee.fee.value(), dec!(2));
    }

    #[test]
    fn events_roundtrip_through_json() {
        let mut log = EventLog::new(10, false);
        log.record(
            Timestamp::from_millis(1000),
            EventPayload::FeeImposed(FeeImposedEvent {
                market: MarketKey(1),
                size_delta: SignedSize::new(dec!(2)),
                fee: Quote::new(dec!(2)),
                treasury: Address(0xFEE),
            }),
        );

        let json = serde_json::to_string(log.events()).unwrap();
        assert!(json.contains("FeeImposed"));

        let restored: Vec<Event> = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.len(), 1);
        assert_eq!(restored[0].id, EventId(1));
    }
}
