// 9.0 conditional.rs: limit and stop instructions delegated to the keeper
// network. records are keyed by a monotonically increasing id that is never
// reused. filled and cancelled orders collapse to the same all-zero sentinel,
// so a zero record at an id is indistinguishable from "never existed";
// callers rely on the id counter, not negative lookups.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::{ConditionalOrderId, MarketKey, Price, Quote, SignedSize, TaskId};

/// Kind of trigger condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionalOrderKind {
    /// Fill at target price or better: longs trigger at-or-below target,
    /// shorts at-or-above.
    Limit,
    /// Fill once price moves through the target: longs trigger at-or-above,
    /// shorts at-or-below.
    Stop,
}

/// Parameters the owner supplies when placing a conditional order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionalOrderParams {
    pub market: MarketKey,
    pub margin_delta: Quote,
    pub size_delta: SignedSize,
    pub target_price: Decimal,
    pub kind: ConditionalOrderKind,
    pub price_impact_delta: Decimal,
    pub reduce_only: bool,
}

/// A standing conditional order, owned exclusively by the account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalOrder {
    pub market: MarketKey,
    pub margin_delta: Quote,
    pub size_delta: SignedSize,
    pub target_price: Decimal,
    pub kind: ConditionalOrderKind,
    pub price_impact_delta: Decimal,
    pub reduce_only: bool,
    /// Handle to the trigger registered with the automation network.
    pub trigger: TaskId,
}

impl ConditionalOrder {
    pub fn from_params(params: &ConditionalOrderParams, trigger: TaskId) -> Self {
        Self {
            market: params.market,
            margin_delta: params.margin_delta,
            size_delta: params.size_delta,
            target_price: params.target_price,
            kind: params.kind,
            price_impact_delta: params.price_impact_delta,
            reduce_only: params.reduce_only,
            trigger,
        }
    }

    /// The all-zero sentinel standing for filled, cancelled, or never placed.
    pub fn empty() -> Self {
        Self {
            market: MarketKey(0),
            margin_delta: Quote::zero(),
            size_delta: SignedSize::zero(),
            target_price: Decimal::ZERO,
            kind: ConditionalOrderKind::Limit,
            price_impact_delta: Decimal::ZERO,
            reduce_only: false,
            trigger: TaskId::none(),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::empty()
    }

    /// Pure fill-eligibility predicate over the venue's current price.
    /// Re-evaluated on-chain at fill time; the keeper's off-chain claim is
    /// never trusted.
    pub fn is_eligible(&self, current_price: Price) -> bool {
        if self.is_empty() || self.size_delta.is_zero() {
            return false;
        }

        let price = current_price.value();
        match self.kind {
            ConditionalOrderKind::Limit => {
                if self.size_delta.is_long() {
                    price <= self.target_price
                } else {
                    price >= self.target_price
                }
            }
            ConditionalOrderKind::Stop => {
                if self.size_delta.is_long() {
                    price >= self.target_price
                } else {
                    price <= self.target_price
                }
            }
        }
    }
}

/// Registry standing in for the automation network's task bookkeeping.
/// Task ids are monotonic; cancelled tasks are simply forgotten.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerRegistry {
    tasks: HashMap<TaskId, ConditionalOrderId>,
    next_task_id: u64,
}

impl Default for TriggerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TriggerRegistry {
    pub fn new() -> Self {
        Self {
            tasks: HashMap::new(),
            next_task_id: 1, // 0 is TaskId::none()
        }
    }

    pub fn register(&mut self, order_id: ConditionalOrderId) -> TaskId {
        let task = TaskId(self.next_task_id);
        self.next_task_id += 1;
        self.tasks.insert(task, order_id);
        task
    }

    pub fn cancel(&mut self, task: TaskId) -> bool {
        self.tasks.remove(&task).is_some()
    }

    pub fn order_for(&self, task: TaskId) -> Option<ConditionalOrderId> {
        self.tasks.get(&task).copied()
    }

    pub fn active_count(&self) -> usize {
        self.tasks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn order(kind: ConditionalOrderKind, size: Decimal, target: Decimal) -> ConditionalOrder {
        ConditionalOrder {
            market: MarketKey(1),
            margin_delta: Quote::new(dec!(100)),
            size_delta: SignedSize::new(size),
            target_price: target,
            kind,
            price_impact_delta: dec!(0.01),
            reduce_only: false,
            trigger: TaskId(1),
        }
    }

    #[test]
    fn limit_long_triggers_at_or_below_target() {
        let buy_limit = order(ConditionalOrderKind::Limit, dec!(1), dec!(1900));

        assert!(!buy_limit.is_eligible(Price::new_unchecked(dec!(2000))));
        assert!(buy_limit.is_eligible(Price::new_unchecked(dec!(1900))));
        assert!(buy_limit.is_eligible(Price::new_unchecked(dec!(1850))));
    }

    #[test]
    fn limit_short_triggers_at_or_above_target() {
        let sell_limit = order(ConditionalOrderKind::Limit, dec!(-1), dec!(2100));

        assert!(!sell_limit.is_eligible(Price::new_unchecked(dec!(2000))));
        assert!(sell_limit.is_eligible(Price::new_unchecked(dec!(2100))));
        assert!(sell_limit.is_eligible(Price::new_unchecked(dec!(2200))));
    }

    #[test]
    fn stop_long_triggers_at_or_above_target() {
        let buy_stop = order(ConditionalOrderKind::Stop, dec!(1), dec!(2100));

        assert!(!buy_stop.is_eligible(Price::new_unchecked(dec!(2000))));
        assert!(buy_stop.is_eligible(Price::new_unchecked(dec!(2100))));
    }

    #[test]
    fn stop_short_triggers_at_or_below_target() {
        let sell_stop = order(ConditionalOrderKind::Stop, dec!(-1), dec!(1900));

        assert!(!sell_stop.is_eligible(Price::new_unchecked(dec!(2000))));
        assert!(sell_stop.is_eligible(Price::new_unchecked(dec!(1900))));
        assert!(sell_stop.is_eligible(Price::new_unchecked(dec!(1500))));
    }

    #[test]
    fn empty_record_is_never_eligible() {
        let empty = ConditionalOrder::empty();
        assert!(empty.is_empty());
        assert!(!empty.is_eligible(Price::new_unchecked(dec!(1))));
        assert!(!empty.is_eligible(Price::new_unchecked(dec!(1_000_000))));
    }

    #[test]
    fn trigger_registry_lifecycle() {
        let mut registry = TriggerRegistry::new();

        let t1 = registry.register(ConditionalOrderId(0));
        let t2 = registry.register(ConditionalOrderId(1));
        assert_ne!(t1, t2);
        assert_eq!(registry.order_for(t1), Some(ConditionalOrderId(0)));
        assert_eq!(registry.active_count(), 2);

        assert!(registry.cancel(t1));
        assert!(!registry.cancel(t1)); // already gone
        assert_eq!(registry.order_for(t1), None);
        assert_eq!(registry.active_count(), 1);
    }
}
