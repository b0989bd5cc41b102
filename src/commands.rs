// 2.0 commands.rs: the instruction set the dispatcher executes. a closed,
// versioned enumeration of opcodes, each with a fixed payload shape. payloads
// arrive as opaque word lists and are decoded strictly: wrong arity or an
// out-of-domain word is a structured error, never a silently-garbage command.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{MarketKey, Quote, SignedSize};

/// Opcodes understood by the dispatcher. The set is closed: unknown raw
/// opcodes are rejected at decode time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandKind {
    ModifyMargin,
    WithdrawAllMargin,
    SubmitAtomicOrder,
    SubmitDelayedOrder,
    SubmitOffchainDelayedOrder,
    CancelDelayedOrder,
    CancelOffchainDelayedOrder,
    ClosePosition,
}

impl CommandKind {
    pub fn opcode(&self) -> u8 {
        match self {
            CommandKind::ModifyMargin => 0,
            CommandKind::WithdrawAllMargin => 1,
            CommandKind::SubmitAtomicOrder => 2,
            CommandKind::SubmitDelayedOrder => 3,
            CommandKind::SubmitOffchainDelayedOrder => 4,
            CommandKind::CancelDelayedOrder => 5,
            CommandKind::CancelOffchainDelayedOrder => 6,
            CommandKind::ClosePosition => 7,
        }
    }

    /// Number of payload words this opcode expects. Exact, not a minimum.
    pub fn arity(&self) -> usize {
        match self {
            CommandKind::ModifyMargin => 2,
            CommandKind::WithdrawAllMargin => 1,
            CommandKind::SubmitAtomicOrder => 3,
            CommandKind::SubmitDelayedOrder => 4,
            CommandKind::SubmitOffchainDelayedOrder => 3,
            CommandKind::CancelDelayedOrder => 1,
            CommandKind::CancelOffchainDelayedOrder => 1,
            CommandKind::ClosePosition => 2,
        }
    }
}

impl TryFrom<u8> for CommandKind {
    type Error = DispatchError;

    fn try_from(opcode: u8) -> Result<Self, Self::Error> {
        match opcode {
            0 => Ok(CommandKind::ModifyMargin),
            1 => Ok(CommandKind::WithdrawAllMargin),
            2 => Ok(CommandKind::SubmitAtomicOrder),
            3 => Ok(CommandKind::SubmitDelayedOrder),
            4 => Ok(CommandKind::SubmitOffchainDelayedOrder),
            5 => Ok(CommandKind::CancelDelayedOrder),
            6 => Ok(CommandKind::CancelOffchainDelayedOrder),
            7 => Ok(CommandKind::ClosePosition),
            other => Err(DispatchError::InvalidCommandType { opcode: other }),
        }
    }
}

/// A fully-decoded command, ready for its handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    ModifyMargin {
        market: MarketKey,
        margin_delta: Quote,
    },
    WithdrawAllMargin {
        market: MarketKey,
    },
    SubmitAtomicOrder {
        market: MarketKey,
        size_delta: SignedSize,
        price_impact_delta: Decimal,
    },
    SubmitDelayedOrder {
        market: MarketKey,
        size_delta: SignedSize,
        price_impact_delta: Decimal,
        desired_time_delta_ms: i64,
    },
    SubmitOffchainDelayedOrder {
        market: MarketKey,
        size_delta: SignedSize,
        price_impact_delta: Decimal,
    },
    CancelDelayedOrder {
        market: MarketKey,
    },
    CancelOffchainDelayedOrder {
        market: MarketKey,
    },
    ClosePosition {
        market: MarketKey,
        price_impact_delta: Decimal,
    },
}

impl Command {
    /// Decode a payload against the opcode's declared shape. Strict: trailing
    /// words are rejected, integral words must actually be integral.
    pub fn decode(kind: CommandKind, payload: &[Decimal]) -> Result<Self, DispatchError> {
        if payload.len() != kind.arity() {
            return Err(DispatchError::PayloadArity {
                kind,
                expected: kind.arity(),
                got: payload.len(),
            });
        }

        match kind {
            CommandKind::ModifyMargin => Ok(Command::ModifyMargin {
                market: decode_market(kind, payload[0])?,
                margin_delta: Quote::new(payload[1]),
            }),
            CommandKind::WithdrawAllMargin => Ok(Command::WithdrawAllMargin {
                market: decode_market(kind, payload[0])?,
            }),
            CommandKind::SubmitAtomicOrder => Ok(Command::SubmitAtomicOrder {
                market: decode_market(kind, payload[0])?,
                size_delta: SignedSize::new(payload[1]),
                price_impact_delta: decode_impact(kind, payload[2])?,
            }),
            CommandKind::SubmitDelayedOrder => Ok(Command::SubmitDelayedOrder {
                market: decode_market(kind, payload[0])?,
                size_delta: SignedSize::new(payload[1]),
                price_impact_delta: decode_impact(kind, payload[2])?,
                desired_time_delta_ms: decode_millis(kind, payload[3])?,
            }),
            CommandKind::SubmitOffchainDelayedOrder => Ok(Command::SubmitOffchainDelayedOrder {
                market: decode_market(kind, payload[0])?,
                size_delta: SignedSize::new(payload[1]),
                price_impact_delta: decode_impact(kind, payload[2])?,
            }),
            CommandKind::CancelDelayedOrder => Ok(Command::CancelDelayedOrder {
                market: decode_market(kind, payload[0])?,
            }),
            CommandKind::CancelOffchainDelayedOrder => Ok(Command::CancelOffchainDelayedOrder {
                market: decode_market(kind, payload[0])?,
            }),
            CommandKind::ClosePosition => Ok(Command::ClosePosition {
                market: decode_market(kind, payload[0])?,
                price_impact_delta: decode_impact(kind, payload[1])?,
            }),
        }
    }
}

fn decode_market(kind: CommandKind, word: Decimal) -> Result<MarketKey, DispatchError> {
    if word.fract() != Decimal::ZERO {
        return Err(DispatchError::PayloadValue {
            kind,
            field: "market",
        });
    }
    word.to_u32()
        .map(MarketKey)
        .ok_or(DispatchError::PayloadValue {
            kind,
            field: "market",
        })
}

fn decode_millis(kind: CommandKind, word: Decimal) -> Result<i64, DispatchError> {
    if word.fract() != Decimal::ZERO || word < Decimal::ZERO {
        return Err(DispatchError::PayloadValue {
            kind,
            field: "desiredTimeDelta",
        });
    }
    word.to_i64().ok_or(DispatchError::PayloadValue {
        kind,
        field: "desiredTimeDelta",
    })
}

fn decode_impact(kind: CommandKind, word: Decimal) -> Result<Decimal, DispatchError> {
    if word < Decimal::ZERO {
        return Err(DispatchError::PayloadValue {
            kind,
            field: "priceImpactDelta",
        });
    }
    Ok(word)
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("Length mismatch: {commands} commands, {inputs} inputs")]
    LengthMismatch { commands: usize, inputs: usize },

    #[error("Invalid command type: opcode {opcode}")]
    InvalidCommandType { opcode: u8 },

    #[error("Payload arity mismatch for {kind:?}: expected {expected} words, got {got}")]
    PayloadArity {
        kind: CommandKind,
        expected: usize,
        got: usize,
    },

    #[error("Payload word out of domain for {kind:?}: {field}")]
    PayloadValue {
        kind: CommandKind,
        field: &'static str,
    },
}
