// 7.0 config.rs: all settings in one place. exchange-wide schedule plus
// per-account runtime knobs. the exchange settings are a read-only handle
// injected at account construction, never ambient state.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::types::{Address, Bps, Quote};

/** 7.1: exchange-wide schedule. treasury, fee bps, keeper fee */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeSettings {
    // Where imposed fees accrue
    pub treasury: Address,
    // Fee charged on |sizeDelta| notional, in basis points
    pub trade_fee_bps: Bps,
    // Flat fee paid to the keeper out of the gas balance on each fill
    pub keeper_fee: Quote,
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        Self {
            treasury: Address(0xFEE),
            trade_fee_bps: Bps::new(5), // 0.05%
            keeper_fee: Quote::new(dec!(1)),
        }
    }
}

impl ExchangeSettings {
    pub fn fee_fraction(&self) -> Decimal {
        self.trade_fee_bps.as_fraction()
    }
}

/// Per-account runtime configuration.
#[derive(Debug, Clone)]
pub struct AccountConfig {
    /// Maximum number of events to retain in memory.
    pub max_events: usize,
    /// Enable verbose event logging.
    pub verbose: bool,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            max_events: 100_000,
            verbose: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_sane() {
        let settings = ExchangeSettings::default();
        assert_eq!(settings.fee_fraction(), dec!(0.0005));
        assert!(settings.keeper_fee.is_positive());
    }
}
