// 4.0 venue.rs: the external derivatives venue, behind a trait. the account only
// needs margin transfers, order submission/cancellation, close, and three reads
// (position, pending delayed order, asset price). SimVenue is a MOCKED in-crate
// implementation: no matching, no funding, no liquidation. venue failures
// surface verbatim to the caller.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::{MarketKey, Price, Quote, SignedSize, Timestamp};

/// Tracking code tagged onto every order the account submits.
pub const TRACKING_CODE: &str = "SMART_MARGIN";

/// A position held at the venue for one market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VenuePosition {
    pub margin: Quote,
    pub size: SignedSize,
}

impl VenuePosition {
    pub fn flat(margin: Quote) -> Self {
        Self {
            margin,
            size: SignedSize::zero(),
        }
    }
}

/// A delayed order resting at the venue, awaiting its execution round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayedOrder {
    pub size_delta: SignedSize,
    pub price_impact_delta: Decimal,
    /// Hint for how long the venue should defer execution. Zero for the
    /// off-chain flavor, which follows the off-chain price feed cadence.
    pub desired_time_delta_ms: i64,
    pub tracking_code: String,
    pub submitted_at: Timestamp,
    pub offchain: bool,
}

/// Asset price read, with the venue's own validity flag. Callers must check
/// `invalid` before trusting the price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceReading {
    pub price: Price,
    pub invalid: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VenueError {
    #[error("Market {0:?} not found")]
    MarketNotFound(MarketKey),

    #[error("no previous order")]
    NoPreviousOrder,

    #[error("order already exists for market {0:?}")]
    OrderAlreadyExists(MarketKey),

    #[error("no position open")]
    NoOpenPosition,

    #[error("insufficient venue margin: held {held}, requested {requested}")]
    InsufficientVenueMargin { held: Quote, requested: Quote },

    #[error("invalid price")]
    InvalidPrice,

    #[error("cannot cancel executable order yet")]
    ExecutabilityNotReached,
}

/// Contract the account core holds against the venue. `Clone` so a command
/// batch can snapshot venue state and roll it back atomically.
pub trait MarginVenue: Clone {
    /// Move margin between the caller and the venue. Positive delta deposits
    /// margin in, negative withdraws it back out.
    fn transfer_margin(&mut self, market: MarketKey, delta: Quote) -> Result<(), VenueError>;

    /// Pull all venue margin for a market back out. Returns the amount,
    /// `Quote::zero()` when there was nothing to pull.
    fn withdraw_all_margin(&mut self, market: MarketKey) -> Result<Quote, VenueError>;

    fn submit_atomic_order(
        &mut self,
        market: MarketKey,
        size_delta: SignedSize,
        price_impact_delta: Decimal,
        tracking_code: &str,
    ) -> Result<(), VenueError>;

    fn submit_delayed_order(
        &mut self,
        market: MarketKey,
        size_delta: SignedSize,
        price_impact_delta: Decimal,
        desired_time_delta_ms: i64,
        tracking_code: &str,
    ) -> Result<(), VenueError>;

    fn submit_offchain_delayed_order(
        &mut self,
        market: MarketKey,
        size_delta: SignedSize,
        price_impact_delta: Decimal,
        tracking_code: &str,
    ) -> Result<(), VenueError>;

    fn cancel_delayed_order(&mut self, market: MarketKey) -> Result<(), VenueError>;

    fn cancel_offchain_delayed_order(&mut self, market: MarketKey) -> Result<(), VenueError>;

    fn close_position(
        &mut self,
        market: MarketKey,
        price_impact_delta: Decimal,
    ) -> Result<(), VenueError>;

    fn position(&self, market: MarketKey) -> Option<VenuePosition>;

    fn delayed_order(&self, market: MarketKey) -> Option<DelayedOrder>;

    fn offchain_delayed_order(&self, market: MarketKey) -> Option<DelayedOrder>;

    fn asset_price(&self, market: MarketKey) -> Result<PriceReading, VenueError>;
}

#[derive(Debug, Clone, Default)]
struct MarketSlot {
    price: Option<Price>,
    price_invalid: bool,
    position: Option<VenuePosition>,
    delayed: Option<DelayedOrder>,
    offchain: Option<DelayedOrder>,
}

/// Deterministic mock venue. Orders fill nothing on their own; atomic orders
/// apply immediately, delayed orders rest in their slot until cancelled.
#[derive(Debug, Clone)]
pub struct SimVenue {
    markets: HashMap<MarketKey, MarketSlot>,
    current_time: Timestamp,
    /// Minimum age before an off-chain delayed order may be cancelled.
    pub offchain_min_age_ms: i64,
}

impl Default for SimVenue {
    fn default() -> Self {
        Self::new()
    }
}

impl SimVenue {
    pub fn new() -> Self {
        Self {
            markets: HashMap::new(),
            current_time: Timestamp::from_millis(0),
            offchain_min_age_ms: 2 * 60 * 1000,
        }
    }

    pub fn add_market(&mut self, market: MarketKey, price: Price) {
        self.markets.insert(
            market,
            MarketSlot {
                price: Some(price),
                ..MarketSlot::default()
            },
        );
    }

    pub fn set_price(&mut self, market: MarketKey, price: Price) {
        if let Some(slot) = self.markets.get_mut(&market) {
            slot.price = Some(price);
        }
    }

    pub fn set_price_invalid(&mut self, market: MarketKey, invalid: bool) {
        if let Some(slot) = self.markets.get_mut(&market) {
            slot.price_invalid = invalid;
        }
    }

    pub fn set_time(&mut self, timestamp: Timestamp) {
        self.current_time = timestamp;
    }

    pub fn advance_time(&mut self, millis: i64) {
        self.current_time = Timestamp::from_millis(self.current_time.as_millis() + millis);
    }

    pub fn time(&self) -> Timestamp {
        self.current_time
    }

    fn slot_mut(&mut self, market: MarketKey) -> Result<&mut MarketSlot, VenueError> {
        self.markets
            .get_mut(&market)
            .ok_or(VenueError::MarketNotFound(market))
    }

    fn valid_price(&self, market: MarketKey) -> Result<Price, VenueError> {
        let reading = self.asset_price(market)?;
        if reading.invalid {
            return Err(VenueError::InvalidPrice);
        }
        Ok(reading.price)
    }
}

impl MarginVenue for SimVenue {
    fn transfer_margin(&mut self, market: MarketKey, delta: Quote) -> Result<(), VenueError> {
        let slot = self.slot_mut(market)?;
        let mut position = slot.position.unwrap_or(VenuePosition::flat(Quote::zero()));

        if delta.is_negative() {
            let requested = delta.abs();
            if requested > position.margin {
                return Err(VenueError::InsufficientVenueMargin {
                    held: position.margin,
                    requested,
                });
            }
        }

        position.margin = position.margin.add(delta);
        slot.position = Some(position);
        Ok(())
    }

    fn withdraw_all_margin(&mut self, market: MarketKey) -> Result<Quote, VenueError> {
        let slot = self.slot_mut(market)?;
        let Some(position) = slot.position.as_mut() else {
            return Ok(Quote::zero());
        };

        let pulled = position.margin;
        position.margin = Quote::zero();
        if position.size.is_zero() {
            slot.position = None;
        }
        Ok(pulled)
    }

    fn submit_atomic_order(
        &mut self,
        market: MarketKey,
        size_delta: SignedSize,
        _price_impact_delta: Decimal,
        _tracking_code: &str,
    ) -> Result<(), VenueError> {
        self.valid_price(market)?;
        let slot = self.slot_mut(market)?;

        // atomic orders execute immediately at the current round's price
        let mut position = slot.position.unwrap_or(VenuePosition::flat(Quote::zero()));
        position.size = position.size.add(size_delta.value());
        slot.position = Some(position);
        Ok(())
    }

    fn submit_delayed_order(
        &mut self,
        market: MarketKey,
        size_delta: SignedSize,
        price_impact_delta: Decimal,
        desired_time_delta_ms: i64,
        tracking_code: &str,
    ) -> Result<(), VenueError> {
        self.valid_price(market)?;
        let now = self.current_time;
        let slot = self.slot_mut(market)?;

        if slot.delayed.is_some() {
            return Err(VenueError::OrderAlreadyExists(market));
        }

        slot.delayed = Some(DelayedOrder {
            size_delta,
            price_impact_delta,
            desired_time_delta_ms,
            tracking_code: tracking_code.to_string(),
            submitted_at: now,
            offchain: false,
        });
        Ok(())
    }

    fn submit_offchain_delayed_order(
        &mut self,
        market: MarketKey,
        size_delta: SignedSize,
        price_impact_delta: Decimal,
        tracking_code: &str,
    ) -> Result<(), VenueError> {
        self.valid_price(market)?;
        let now = self.current_time;
        let slot = self.slot_mut(market)?;

        if slot.offchain.is_some() {
            return Err(VenueError::OrderAlreadyExists(market));
        }

        slot.offchain = Some(DelayedOrder {
            size_delta,
            price_impact_delta,
            desired_time_delta_ms: 0,
            tracking_code: tracking_code.to_string(),
            submitted_at: now,
            offchain: true,
        });
        Ok(())
    }

    fn cancel_delayed_order(&mut self, market: MarketKey) -> Result<(), VenueError> {
        let slot = self.slot_mut(market)?;
        if slot.delayed.take().is_none() {
            return Err(VenueError::NoPreviousOrder);
        }
        Ok(())
    }

    fn cancel_offchain_delayed_order(&mut self, market: MarketKey) -> Result<(), VenueError> {
        let now = self.current_time;
        let min_age = self.offchain_min_age_ms;
        let slot = self.slot_mut(market)?;

        let Some(order) = slot.offchain.as_ref() else {
            return Err(VenueError::NoPreviousOrder);
        };

        // the cooldown protects executable orders from being cancelled out
        // from under the off-chain execution round
        if order.submitted_at.elapsed_millis(&now) < min_age {
            return Err(VenueError::ExecutabilityNotReached);
        }

        slot.offchain = None;
        Ok(())
    }

    fn close_position(
        &mut self,
        market: MarketKey,
        _price_impact_delta: Decimal,
    ) -> Result<(), VenueError> {
        self.valid_price(market)?;
        let slot = self.slot_mut(market)?;

        let Some(position) = slot.position.as_mut() else {
            return Err(VenueError::NoOpenPosition);
        };
        if position.size.is_zero() {
            return Err(VenueError::NoOpenPosition);
        }

        // margin stays at the venue until withdrawn
        position.size = SignedSize::zero();
        Ok(())
    }

    fn position(&self, market: MarketKey) -> Option<VenuePosition> {
        self.markets.get(&market).and_then(|slot| slot.position)
    }

    fn delayed_order(&self, market: MarketKey) -> Option<DelayedOrder> {
        self.markets
            .get(&market)
            .and_then(|slot| slot.delayed.clone())
    }

    fn offchain_delayed_order(&self, market: MarketKey) -> Option<DelayedOrder> {
        self.markets
            .get(&market)
            .and_then(|slot| slot.offchain.clone())
    }

    fn asset_price(&self, market: MarketKey) -> Result<PriceReading, VenueError> {
        let slot = self
            .markets
            .get(&market)
            .ok_or(VenueError::MarketNotFound(market))?;
        let price = slot.price.ok_or(VenueError::InvalidPrice)?;
        Ok(PriceReading {
            price,
            invalid: slot.price_invalid,
        })
    }
}
