//! Execution simulation: slippage, fills, and position accounting.
//!
//! Orders fill in full at the bar close plus adverse slippage, clamped to
//! the bar's range. Cash is unconstrained; the simulator never rejects an
//! order.

use crate::bars::Bar;
use crate::config::{SlippageConfig, SlippageKind, TICK_SIZE};
use crate::strategy::{Order, Side};
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub order: Order,
    pub fill_price: f64,
    /// Always equals the requested size; partial fills are not modeled.
    pub filled_size: u32,
    pub timestamp: String,
    pub slippage: f64,
}

/// Signed inventory. `avg_price` is 0.0 by convention while flat.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Position {
    pub size: i64,
    pub avg_price: f64,
}

impl Position {
    /// Transition table keyed by (position direction, order side).
    ///
    /// Additions blend the entry via weighted average, reductions keep it,
    /// and a fill that crosses zero opens the residual at the fill price.
    pub fn apply(&mut self, side: Side, qty: u32, price: f64) {
        let qty = qty as i64;
        if qty == 0 {
            return;
        }
        match (self.size.cmp(&0), side) {
            (Ordering::Equal, Side::Buy) => {
                self.size = qty;
                self.avg_price = price;
            }
            (Ordering::Equal, Side::Sell) => {
                self.size = -qty;
                self.avg_price = price;
            }
            (Ordering::Greater, Side::Buy) => {
                let total = self.size + qty;
                self.avg_price =
                    (self.avg_price * self.size as f64 + price * qty as f64) / total as f64;
                self.size = total;
            }
            (Ordering::Less, Side::Sell) => {
                let total = -self.size + qty;
                self.avg_price =
                    (self.avg_price * -self.size as f64 + price * qty as f64) / total as f64;
                self.size = -total;
            }
            (Ordering::Greater, Side::Sell) => {
                let closed = self.size.min(qty);
                let remainder = qty - closed;
                if remainder > 0 {
                    self.size = -remainder;
                    self.avg_price = price;
                } else {
                    self.size -= closed;
                    if self.size == 0 {
                        self.avg_price = 0.0;
                    }
                }
            }
            (Ordering::Less, Side::Buy) => {
                let closed = (-self.size).min(qty);
                let remainder = qty - closed;
                if remainder > 0 {
                    self.size = remainder;
                    self.avg_price = price;
                } else {
                    self.size += closed;
                    if self.size == 0 {
                        self.avg_price = 0.0;
                    }
                }
            }
        }
    }

    pub fn is_flat(&self) -> bool {
        self.size == 0
    }
}

pub struct ExecutionSimulator {
    slippage: SlippageConfig,
    cash: f64,
    position: Position,
}

impl ExecutionSimulator {
    pub fn new(slippage: SlippageConfig, initial_cash: f64) -> Self {
        Self { slippage, cash: initial_cash, position: Position::default() }
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn position(&self) -> Position {
        self.position
    }

    /// Mark-to-market value of the open inventory.
    pub fn position_value(&self, price: f64) -> f64 {
        self.position.size as f64 * price
    }

    pub fn reset(&mut self, initial_cash: f64) {
        self.cash = initial_cash;
        self.position = Position::default();
    }

    /// Fill an order against the current bar.
    pub fn execute(&mut self, order: &Order, bar: &Bar, realized_vol: f64) -> Fill {
        let slippage = self.slippage_amount(realized_vol, bar.close);
        let raw = match order.side {
            Side::Buy => bar.close + slippage,
            Side::Sell => bar.close - slippage,
        };
        let fill_price = raw.min(bar.high).max(bar.low);

        let cost = fill_price * order.size as f64;
        match order.side {
            Side::Buy => self.cash -= cost,
            Side::Sell => self.cash += cost,
        }
        self.position.apply(order.side, order.size, fill_price);

        Fill {
            order: order.clone(),
            fill_price,
            filled_size: order.size,
            timestamp: bar.timestamp.clone(),
            slippage,
        }
    }

    /// Slippage in price units, always non-negative.
    fn slippage_amount(&self, realized_vol: f64, price: f64) -> f64 {
        let base = self.slippage.base_ticks as f64 * TICK_SIZE;
        match self.slippage.kind {
            SlippageKind::Fixed => base,
            SlippageKind::Adaptive => {
                let vol_component = self.slippage.vol_multiplier * realized_vol * price;
                let factor = if realized_vol < self.slippage.vol_low {
                    self.slippage.low_factor
                } else if realized_vol > self.slippage.vol_high {
                    self.slippage.high_factor
                } else {
                    1.0
                };
                (base + vol_component) * factor
            }
        }
    }
}
