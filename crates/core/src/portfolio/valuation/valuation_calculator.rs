//! Pure valuation arithmetic over already-priced position lists.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::{PricedPosition, PricedSnapshot, ValuationConfig};
use crate::portfolio::snapshot::{PortfolioSnapshot, Position};

/// Builds a priced snapshot from freshly priced aggregate and sub-position
/// lists. `unrealized_pnl` is zero when no cost basis is known
/// (`avg_price <= 0`); `total_pnl_pct` is zero when cost is non-positive;
/// cash is left out of net value when the config says so.
pub fn calculate_valuation(
    snapshot: &PortfolioSnapshot,
    priced_positions: Vec<Position>,
    priced_sub_positions: Vec<Position>,
    config: &ValuationConfig,
    as_of: NaiveDate,
) -> PricedSnapshot {
    let market_value: Decimal = priced_positions.iter().map(Position::market_value).sum();
    let net_value = if config.exclude_cash {
        market_value
    } else {
        market_value + snapshot.cash
    };

    let cost: Decimal = priced_positions
        .iter()
        .filter(|p| p.avg_price > Decimal::ZERO)
        .map(|p| p.avg_price * p.quantity)
        .sum();
    let total_pnl: Decimal = priced_positions.iter().map(unrealized_pnl).sum();
    let total_pnl_pct = if cost > Decimal::ZERO {
        total_pnl / cost
    } else {
        Decimal::ZERO
    };

    let positions = priced_positions
        .into_iter()
        .map(|p| price_position(p, net_value))
        .collect();
    let sub_positions = priced_sub_positions
        .into_iter()
        .map(|p| price_position(p, net_value))
        .collect();

    PricedSnapshot {
        start_date: snapshot.start_date,
        end_date: snapshot.end_date,
        as_of,
        positions,
        sub_positions,
        cash: snapshot.cash,
        net_value,
        cost,
        total_pnl,
        total_pnl_pct,
    }
}

fn unrealized_pnl(position: &Position) -> Decimal {
    if position.avg_price <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    (position.last_price - position.avg_price) * position.quantity
}

fn price_position(position: Position, net_value: Decimal) -> PricedPosition {
    let market_value = position.market_value();
    let weight_in_portfolio = if net_value.is_zero() {
        Decimal::ZERO
    } else {
        market_value / net_value
    };
    PricedPosition {
        unrealized_pnl: unrealized_pnl(&position),
        market_value,
        weight_in_portfolio,
        position,
    }
}
