use super::precision::ArithmeticError;
use super::transaction::{Currency, Transaction};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("lot for {id} must be paid in {fiat}, not {pay_currency}")]
    NotFiatPriced {
        id: String,
        pay_currency: Currency,
        fiat: Currency,
    },
    #[error("could not find {pay_currency} credit for buying {currency} in transaction {id}")]
    FundingLotNotFound {
        id: String,
        currency: Currency,
        pay_currency: Currency,
    },
    #[error(transparent)]
    Arithmetic(#[from] ArithmeticError),
}

/// Part of a lot consumed by a sale, or by paying for another purchase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub quantity: Decimal,
    pub profit: Decimal,
    pub hold_time: Duration,
    /// The sale, or the crypto-funded buy that spent this lot
    pub tx: Transaction,
    pub paid_with_cryptocurrency: bool,
}

impl Match {
    /// Whether the lot was held at least `tax_free_after` before this disposal.
    pub fn is_exempt(&self, tax_free_after: Duration) -> bool {
        self.hold_time >= tax_free_after
    }

    pub fn hold_days(&self) -> i64 {
        self.hold_time.num_days()
    }
}

/// A purchase of some asset with fiat, and what is left of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lot {
    balance: Decimal,
    buy: Transaction,
    sells: Vec<Match>,
}

impl Lot {
    fn new(buy: Transaction) -> Self {
        Lot {
            balance: buy.quantity,
            buy,
            sells: Vec::new(),
        }
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn buy(&self) -> &Transaction {
        &self.buy
    }

    pub fn sells(&self) -> &[Match] {
        &self.sells
    }

    pub fn currency(&self) -> &Currency {
        &self.buy.currency
    }

    /// Take `quantity` off the balance and record the match.
    ///
    /// Callers never take more than the balance.
    pub(crate) fn consume(&mut self, m: Match) {
        debug_assert!(m.quantity <= self.balance);
        self.balance -= m.quantity;
        log::debug!(
            "Lot {} {} CONSUME: qty={} by {}. Remaining: {}",
            self.buy.id,
            self.buy.currency,
            m.quantity,
            m.tx.id,
            self.balance
        );
        self.sells.push(m);
    }

    fn is_eligible(&self, currency: &Currency, at_or_before: DateTime<Utc>) -> bool {
        self.balance > Decimal::ZERO
            && self.buy.currency == *currency
            && self.buy.timestamp <= at_or_before
    }
}

/// Open lots in the order their buys were recorded.
#[derive(Debug, Clone)]
pub struct CreditPool {
    fiat: Currency,
    lots: Vec<Lot>,
}

impl CreditPool {
    pub fn new(fiat: Currency) -> Self {
        CreditPool {
            fiat,
            lots: Vec::new(),
        }
    }

    pub fn fiat(&self) -> &Currency {
        &self.fiat
    }

    pub fn lots(&self) -> &[Lot] {
        &self.lots
    }

    /// Record a fiat purchase as a new lot at the end of the pool.
    pub fn add_lot(&mut self, buy: Transaction) -> Result<(), PoolError> {
        if buy.pay_currency != self.fiat {
            return Err(PoolError::NotFiatPriced {
                id: buy.id.clone(),
                pay_currency: buy.pay_currency.clone(),
                fiat: self.fiat.clone(),
            });
        }
        log::debug!("Pool ADD: {}", buy);
        self.lots.push(Lot::new(buy));
        Ok(())
    }

    /// Index of the first lot (oldest buy) of `currency` with a positive balance
    /// bought no later than `at_or_before`.
    pub fn find_eligible_lot(
        &self,
        currency: &Currency,
        at_or_before: DateTime<Utc>,
    ) -> Option<usize> {
        self.lots
            .iter()
            .position(|lot| lot.is_eligible(currency, at_or_before))
    }

    pub(crate) fn lot_mut(&mut self, index: usize) -> Option<&mut Lot> {
        self.lots.get_mut(index)
    }

    /// Remaining balance per currency over all lots.
    pub fn open_balances(&self) -> BTreeMap<Currency, Decimal> {
        let mut balances = BTreeMap::new();
        for lot in &self.lots {
            *balances
                .entry(lot.currency().clone())
                .or_insert(Decimal::ZERO) += lot.balance;
        }
        balances
    }
}
