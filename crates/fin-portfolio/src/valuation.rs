use serde::{Deserialize, Serialize};

use crate::fixedpoint::Micros;

/// A holding paired with the price it should be marked at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MarkedHolding {
    pub symbol: String,
    pub name: String,
    pub shares: i64,
    pub price: Micros,
}

/// Position value = shares × current price.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionValue {
    pub symbol: String,
    pub name: String,
    pub shares: i64,
    pub price: Micros,
    pub value: Micros,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Valuation {
    pub positions: Vec<PositionValue>,
    pub cash: Micros,
    /// Σ position values.
    pub holdings_value: Micros,
    /// holdings_value + cash.
    pub total: Micros,
}

/// Value every marked holding and add cash. `None` on overflow.
///
/// Positions keep the order they were supplied in.
pub fn value_portfolio(cash: Micros, marked: Vec<MarkedHolding>) -> Option<Valuation> {
    let mut positions = Vec::with_capacity(marked.len());
    let mut holdings_value = Micros::ZERO;

    for m in marked {
        let value = m.price.checked_mul_qty(m.shares)?;
        holdings_value = holdings_value.checked_add(value)?;
        positions.push(PositionValue {
            symbol: m.symbol,
            name: m.name,
            shares: m.shares,
            price: m.price,
            value,
        });
    }

    Some(Valuation {
        positions,
        cash,
        holdings_value,
        total: holdings_value.checked_add(cash)?,
    })
}
