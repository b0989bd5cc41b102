// 5.0 ledger.rs: collateral ledger. pure bookkeeping for the account's
// deposited collateral and its native gas balance. external transfers are
// modeled as the balance mutation itself; every operation either fully
// applies or fails without touching state.

use serde::{Deserialize, Serialize};

use crate::types::Quote;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollateralLedger {
    pub collateral: Quote,
    pub gas: Quote,
    pub total_deposited: Quote,
    pub total_withdrawn: Quote,
}

impl CollateralLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Free collateral available for margin transfers and fees.
    pub fn free_collateral(&self) -> Quote {
        self.collateral
    }

    pub fn deposit(&mut self, amount: Quote) -> Result<(), LedgerError> {
        if !amount.is_positive() {
            return Err(LedgerError::ValueCannotBeZero { field: "deposit" });
        }
        self.collateral = self.collateral.add(amount);
        self.total_deposited = self.total_deposited.add(amount);
        Ok(())
    }

    pub fn withdraw(&mut self, amount: Quote) -> Result<(), LedgerError> {
        if !amount.is_positive() {
            return Err(LedgerError::ValueCannotBeZero { field: "withdraw" });
        }
        if amount > self.collateral {
            return Err(LedgerError::InsufficientFreeMargin {
                available: self.collateral,
                requested: amount,
            });
        }
        self.collateral = self.collateral.sub(amount);
        self.total_withdrawn = self.total_withdrawn.add(amount);
        Ok(())
    }

    /// Debit collateral for margin sent to the venue or fees imposed.
    /// The caller chooses the error for an uncovered debit.
    pub fn debit(&mut self, amount: Quote) -> Result<(), LedgerError> {
        if amount > self.collateral {
            return Err(LedgerError::InsufficientFreeMargin {
                available: self.collateral,
                requested: amount,
            });
        }
        self.collateral = self.collateral.sub(amount);
        Ok(())
    }

    /// Credit collateral returned from the venue.
    pub fn credit(&mut self, amount: Quote) {
        self.collateral = self.collateral.add(amount);
    }

    pub fn deposit_gas(&mut self, amount: Quote) -> Result<(), LedgerError> {
        if !amount.is_positive() {
            return Err(LedgerError::ValueCannotBeZero { field: "depositGas" });
        }
        self.gas = self.gas.add(amount);
        Ok(())
    }

    pub fn withdraw_gas(&mut self, amount: Quote) -> Result<(), LedgerError> {
        if !amount.is_positive() {
            return Err(LedgerError::ValueCannotBeZero { field: "withdrawGas" });
        }
        // a gas shortfall is a failed native transfer, not a margin problem
        if amount > self.gas {
            return Err(LedgerError::EthWithdrawalFailed);
        }
        self.gas = self.gas.sub(amount);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("Value cannot be zero: {field}")]
    ValueCannotBeZero { field: &'static str },

    #[error("Insufficient free margin: available {available}, requested {requested}")]
    InsufficientFreeMargin { available: Quote, requested: Quote },

    #[error("Eth withdrawal failed")]
    EthWithdrawalFailed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn funded() -> CollateralLedger {
        let mut ledger = CollateralLedger::new();
        ledger.deposit(Quote::new(dec!(10000))).unwrap();
        ledger
    }

    #[test]
    fn deposit_withdraw_roundtrip() {
        let mut ledger = funded();
        assert_eq!(ledger.collateral.value(), dec!(10000));

        ledger.deposit(Quote::new(dec!(5000))).unwrap();
        assert_eq!(ledger.collateral.value(), dec!(15000));

        ledger.withdraw(Quote::new(dec!(3000))).unwrap();
        assert_eq!(ledger.collateral.value(), dec!(12000));
        assert_eq!(ledger.total_deposited.value(), dec!(15000));
        assert_eq!(ledger.total_withdrawn.value(), dec!(3000));
    }

    #[test]
    fn zero_amounts_rejected() {
        let mut ledger = funded();

        let err = ledger.deposit(Quote::zero()).unwrap_err();
        assert_eq!(err, LedgerError::ValueCannotBeZero { field: "deposit" });

        let err = ledger.withdraw(Quote::zero()).unwrap_err();
        assert_eq!(err, LedgerError::ValueCannotBeZero { field: "withdraw" });

        assert_eq!(ledger.collateral.value(), dec!(10000));
    }

    #[test]
    fn over_withdrawal_reports_both_sides() {
        let mut ledger = funded();

        let err = ledger.withdraw(Quote::new(dec!(10001))).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientFreeMargin {
                available: Quote::new(dec!(10000)),
                requested: Quote::new(dec!(10001)),
            }
        );
        assert_eq!(ledger.collateral.value(), dec!(10000));
    }

    #[test]
    fn gas_balance_is_separate() {
        let mut ledger = funded();
        ledger.deposit_gas(Quote::new(dec!(2))).unwrap();

        // gas over-withdrawal is a transfer failure, not insufficient margin
        let err = ledger.withdraw_gas(Quote::new(dec!(3))).unwrap_err();
        assert_eq!(err, LedgerError::EthWithdrawalFailed);

        ledger.withdraw_gas(Quote::new(dec!(2))).unwrap();
        assert!(ledger.gas.is_zero());
        assert_eq!(ledger.collateral.value(), dec!(10000));
    }

    #[test]
    fn debit_credit_for_margin_moves() {
        let mut ledger = funded();

        ledger.debit(Quote::new(dec!(4000))).unwrap();
        assert_eq!(ledger.collateral.value(), dec!(6000));

        ledger.credit(Quote::new(dec!(1500)));
        assert_eq!(ledger.collateral.value(), dec!(7500));

        assert!(matches!(
            ledger.debit(Quote::new(dec!(8000))),
            Err(LedgerError::InsufficientFreeMargin { .. })
        ));
    }
}
