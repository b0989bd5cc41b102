// margin-account-core: self-custodied smart margin trading account.
// custody-first architecture: the collateral ledger and the execution guard
// take priority. all computation is deterministic with no external I/O.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: Address, MarketKey, Price, Quote, SignedSize
//   2.x  commands.rs: opcode set, payload decoding, dispatch errors
//   3.x  fees.rs: trade fee schedule (notional * bps, floored)
//   4.x  venue.rs: external derivatives venue trait, SimVenue MOCKED
//   5.x  ledger.rs: collateral + gas balances, deposit/withdraw flows
//   6.x  account.rs: account root: guard, batch dispatcher, handlers
//   7.x  config.rs: exchange settings + account config
//   8.x  events.rs: state transition events for audit
//   9.x  conditional.rs: limit/stop conditional orders, trigger registry

// core account modules
pub mod account;
pub mod commands;
pub mod events;
pub mod fees;
pub mod ledger;
pub mod types;

// conditional order engine
pub mod conditional;

// integration modules
pub mod config;
pub mod venue;

// re exports for convenience
pub use account::*;
pub use commands::*;
pub use conditional::*;
pub use events::*;
pub use fees::*;
pub use ledger::*;
pub use types::*;
pub use config::{AccountConfig, ExchangeSettings};
pub use venue::{
    DelayedOrder, MarginVenue, PriceReading, SimVenue, VenueError, VenuePosition, TRACKING_CODE,
};
