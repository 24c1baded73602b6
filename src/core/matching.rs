//! FIFO matching of sales and crypto-funded purchases against the credit pool.

use super::pool::{CreditPool, Match, PoolError};
use super::precision;
use super::transaction::Transaction;
use super::warnings::Warning;
use rust_decimal::Decimal;

/// Result of matching one sale against the pool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SellOutcome {
    /// Quantity matched against lots
    pub matched: Decimal,
    /// Quantity for which no lot was found
    pub unmatched: Decimal,
    /// Number of matches created
    pub matches: usize,
    pub warnings: Vec<Warning>,
}

impl CreditPool {
    /// Match `quantity` of `tx.currency` sold by `tx` against the oldest lots.
    ///
    /// Whatever cannot be matched is assumed to have been bought for nothing;
    /// that part creates no match and is reported as a [`Warning::MissingCostBasis`].
    pub fn sell(&mut self, quantity: Decimal, tx: &Transaction) -> Result<SellOutcome, PoolError> {
        let mut outcome = SellOutcome::default();
        let mut remaining = quantity;

        if tx.pay_currency != *self.fiat() {
            outcome.warnings.push(Warning::NonFiatDisposal {
                transaction_id: tx.id.clone(),
                currency: tx.currency.clone(),
                pay_currency: tx.pay_currency.clone(),
            });
        }

        while remaining > Decimal::ZERO {
            let Some(lot) = self
                .find_eligible_lot(&tx.currency, tx.timestamp)
                .and_then(|index| self.lot_mut(index))
            else {
                let assumed_profit = precision::mul(remaining, tx.spot_price)?;
                outcome.warnings.push(Warning::MissingCostBasis {
                    transaction_id: tx.id.clone(),
                    exchange: tx.exchange.clone(),
                    currency: tx.currency.clone(),
                    timestamp: tx.timestamp,
                    unmatched: remaining,
                    assumed_profit,
                });
                outcome.unmatched = remaining;
                break;
            };

            let quantity = remaining.min(lot.balance());
            let buy_value = precision::mul(quantity, lot.buy().spot_price)?;
            let sell_value = precision::mul(quantity, tx.spot_price)?;
            let profit = precision::sub(sell_value, buy_value)?;
            let hold_time = tx.timestamp - lot.buy().timestamp;

            lot.consume(Match {
                quantity,
                profit,
                hold_time,
                tx: tx.clone(),
                paid_with_cryptocurrency: false,
            });

            remaining -= quantity;
            outcome.matched += quantity;
            outcome.matches += 1;
        }

        Ok(outcome)
    }

    /// Record the buy `buy` of `quantity` units.
    ///
    /// A fiat purchase opens a new lot. A purchase paid with another crypto asset
    /// instead draws the payment of `quantity × spot_price` down from the oldest
    /// lots of that asset; every lot touched gets a match with zero profit.
    /// Running out of funding lots is an error.
    pub fn add_credit(&mut self, quantity: Decimal, buy: &Transaction) -> Result<(), PoolError> {
        if buy.pay_currency == *self.fiat() {
            let lot = Transaction {
                quantity,
                ..buy.clone()
            };
            return self.add_lot(lot);
        }

        // in units of the pay currency, the unit of the funding lots' balances
        let mut remaining = precision::mul(quantity, buy.spot_price)?;
        while remaining > Decimal::ZERO {
            let lot = self
                .find_eligible_lot(&buy.pay_currency, buy.timestamp)
                .and_then(|index| self.lot_mut(index))
                .ok_or_else(|| PoolError::FundingLotNotFound {
                    id: buy.id.clone(),
                    currency: buy.currency.clone(),
                    pay_currency: buy.pay_currency.clone(),
                })?;

            let spent = remaining.min(lot.balance());
            let hold_time = buy.timestamp - lot.buy().timestamp;
            lot.consume(Match {
                quantity: spent,
                profit: Decimal::ZERO,
                hold_time,
                tx: buy.clone(),
                paid_with_cryptocurrency: true,
            });
            remaining = precision::sub(remaining, spent)?;
        }

        log::debug!("Recorded trade {} paid with {}", buy.id, buy.pay_currency);
        Ok(())
    }
}
