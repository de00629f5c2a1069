//! Running received-amount totals per destination and currency.

use compact_str::CompactString;
use monetize_sdk::objects::{Destination, MAX_CURRENCY_SCALE};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

/// Ledger handle shared between the scheduler and the router feeding it.
pub type SharedLedger = Arc<RwLock<Ledger>>;

/// Accumulated payments for one destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub destination: Destination,
    /// Sum of all received amounts, in minor units. Never decreases.
    pub accumulated_amount: u64,
    pub currency_code: Option<CompactString>,
    pub currency_scale: Option<u32>,
}

impl LedgerEntry {
    /// Accumulated amount shifted by the currency scale.
    pub fn formatted_amount(&self) -> Decimal {
        format_amount(self.accumulated_amount, self.currency_scale)
    }
}

/// Result of [`Ledger::grand_total`].
///
/// Collapses to a single value when every tracked destination shares one
/// currency; otherwise keeps one total per currency code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrandTotal<V> {
    Single(V),
    PerCurrency(BTreeMap<Option<CompactString>, V>),
}

impl<V> GrandTotal<V> {
    pub fn single(&self) -> Option<&V> {
        match self {
            GrandTotal::Single(value) => Some(value),
            GrandTotal::PerCurrency(_) => None,
        }
    }

    /// Total for `currency_code` when the result was not collapsed.
    pub fn currency(&self, currency_code: &str) -> Option<&V> {
        match self {
            GrandTotal::Single(_) => None,
            GrandTotal::PerCurrency(totals) => totals.get(&Some(CompactString::from(currency_code))),
        }
    }
}

/// Amount-per-destination accumulator.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    entries: HashMap<Destination, LedgerEntry>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedLedger {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Add `amount_delta` to the destination's total.
    ///
    /// Currency fields are overwritten when supplied and kept otherwise.
    /// An empty destination is ignored.
    pub fn record_payment(
        &mut self,
        destination: &Destination,
        amount_delta: u64,
        currency_code: Option<&str>,
        currency_scale: Option<u32>,
    ) {
        if destination.is_empty() {
            debug!(amount_delta, "Ignoring payment without destination");
            return;
        }

        let entry = self
            .entries
            .entry(destination.clone())
            .or_insert_with(|| LedgerEntry {
                destination: destination.clone(),
                accumulated_amount: 0,
                currency_code: None,
                currency_scale: None,
            });
        entry.accumulated_amount = entry.accumulated_amount.saturating_add(amount_delta);
        if let Some(code) = currency_code {
            entry.currency_code = Some(CompactString::from(code));
        }
        if let Some(scale) = currency_scale {
            entry.currency_scale = Some(scale);
        }

        debug!(
            %destination,
            amount_delta,
            total = entry.accumulated_amount,
            currency = ?entry.currency_code,
            "Recorded payment"
        );
    }

    /// Accumulated amount in minor units, or `None` for an unknown destination.
    pub fn total_for(&self, destination: &Destination) -> Option<u64> {
        self.entries
            .get(destination)
            .map(|entry| entry.accumulated_amount)
    }

    /// Accumulated amount as a decimal string with `currency_scale` fraction digits.
    pub fn formatted_total_for(&self, destination: &Destination) -> Option<String> {
        self.entries
            .get(destination)
            .map(|entry| entry.formatted_amount().to_string())
    }

    pub fn currency_for(&self, destination: &Destination) -> Option<&str> {
        self.entries
            .get(destination)
            .and_then(|entry| entry.currency_code.as_deref())
    }

    pub fn entry(&self, destination: &Destination) -> Option<&LedgerEntry> {
        self.entries.get(destination)
    }

    pub fn entries(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all accumulated amounts grouped by currency.
    pub fn grand_total(&self) -> GrandTotal<u64> {
        self.group_by_currency(|entry| entry.accumulated_amount, |a, b| a.saturating_add(b))
    }

    /// Like [`grand_total`](Self::grand_total) but summing the scaled amounts.
    pub fn formatted_grand_total(&self) -> GrandTotal<Decimal> {
        self.group_by_currency(LedgerEntry::formatted_amount, |a, b| a + b)
    }

    fn group_by_currency<V, F, S>(&self, value_of: F, sum: S) -> GrandTotal<V>
    where
        V: Copy + Default,
        F: Fn(&LedgerEntry) -> V,
        S: Fn(V, V) -> V,
    {
        let mut totals: BTreeMap<Option<CompactString>, V> = BTreeMap::new();
        for entry in self.entries.values() {
            let slot = totals.entry(entry.currency_code.clone()).or_default();
            *slot = sum(*slot, value_of(entry));
        }

        if totals.len() == 1 {
            if let Some((_, total)) = totals.pop_first() {
                return GrandTotal::Single(total);
            }
        }
        GrandTotal::PerCurrency(totals)
    }
}

/// `amount * 10^-scale` with exactly `scale` fraction digits. A missing scale counts as 0.
///
/// Scales above [`MAX_CURRENCY_SCALE`] cannot be represented and are clamped.
pub fn format_amount(amount: u64, scale: Option<u32>) -> Decimal {
    let requested = scale.unwrap_or(0);
    if requested > MAX_CURRENCY_SCALE {
        warn!(
            amount,
            scale = requested,
            max_scale = MAX_CURRENCY_SCALE,
            "Currency scale out of range, formatting with the maximum scale"
        );
    }
    Decimal::from_i128_with_scale(i128::from(amount), requested.min(MAX_CURRENCY_SCALE))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wallet(name: &str) -> Destination {
        Destination::from(name)
    }

    #[test]
    fn test_unknown_destination_is_none() {
        let ledger = Ledger::new();
        assert_eq!(ledger.total_for(&wallet("$invalid_wallet")), None);
        assert_eq!(ledger.formatted_total_for(&wallet("$invalid_wallet")), None);
        assert_eq!(ledger.currency_for(&wallet("$invalid_wallet")), None);
    }

    #[test]
    fn test_totals_accumulate_per_destination() {
        let mut ledger = Ledger::new();
        let first = wallet("$wallet");
        let second = wallet("$wallet2");

        ledger.record_payment(&first, 22, Some("XRP"), None);
        assert_eq!(ledger.currency_for(&first), Some("XRP"));
        assert_eq!(ledger.total_for(&first), Some(22));

        ledger.record_payment(&first, 22, Some("XRP"), None);
        ledger.record_payment(&second, 22, Some("XRP"), None);

        assert_eq!(ledger.total_for(&first), Some(44));
        assert_eq!(ledger.total_for(&second), Some(22));
        assert_eq!(ledger.grand_total(), GrandTotal::Single(66));
    }

    #[test]
    fn test_empty_destination_is_ignored() {
        let mut ledger = Ledger::new();
        ledger.record_payment(&Destination::default(), 10, Some("USD"), Some(2));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_formatted_total_uses_scale() {
        let mut ledger = Ledger::new();
        let destination = wallet("$wallet");
        ledger.record_payment(&destination, 22, Some("USD"), Some(2));
        ledger.record_payment(&destination, 22, Some("USD"), Some(2));

        assert_eq!(
            ledger.formatted_total_for(&destination).as_deref(),
            Some("0.44")
        );
        assert_eq!(
            ledger.formatted_grand_total().single().map(ToString::to_string),
            Some("0.44".to_string())
        );
    }

    #[test]
    fn test_formatted_total_keeps_trailing_zeros() {
        let mut ledger = Ledger::new();
        let destination = wallet("$wallet");
        ledger.record_payment(&destination, 5400, Some("USD"), Some(6));
        assert_eq!(
            ledger.formatted_total_for(&destination).as_deref(),
            Some("0.005400")
        );

        let unscaled = wallet("$unscaled");
        ledger.record_payment(&unscaled, 12, Some("XRP"), None);
        assert_eq!(ledger.formatted_total_for(&unscaled).as_deref(), Some("12"));
    }

    #[test]
    fn test_currency_fields_keep_previous_values_when_absent() {
        let mut ledger = Ledger::new();
        let destination = wallet("$wallet");
        ledger.record_payment(&destination, 1, Some("USD"), Some(2));
        ledger.record_payment(&destination, 1, None, None);

        let entry = ledger.entry(&destination).unwrap();
        assert_eq!(entry.currency_code.as_deref(), Some("USD"));
        assert_eq!(entry.currency_scale, Some(2));

        ledger.record_payment(&destination, 1, Some("EUR"), Some(3));
        let entry = ledger.entry(&destination).unwrap();
        assert_eq!(entry.currency_code.as_deref(), Some("EUR"));
        assert_eq!(entry.currency_scale, Some(3));
        assert_eq!(entry.accumulated_amount, 3);
    }

    #[test]
    fn test_grand_total_splits_by_currency() {
        let mut ledger = Ledger::new();
        let first = wallet("$wallet");
        let second = wallet("$wallet2");
        ledger.record_payment(&first, 22, Some("USD"), Some(2));
        ledger.record_payment(&first, 22, Some("USD"), Some(2));
        ledger.record_payment(&second, 40, Some("XRP"), Some(2));

        let total = ledger.grand_total();
        assert_eq!(total.single(), None);
        assert_eq!(total.currency("USD"), Some(&44));
        assert_eq!(total.currency("XRP"), Some(&40));

        let formatted = ledger.formatted_grand_total();
        assert_eq!(formatted.currency("USD"), Some(&Decimal::new(44, 2)));
        assert_eq!(formatted.currency("XRP"), Some(&Decimal::new(40, 2)));
    }

    #[test]
    fn test_oversized_scale_is_clamped() {
        let formatted = format_amount(5, Some(40));
        assert_eq!(formatted.scale(), MAX_CURRENCY_SCALE);
        assert_eq!(formatted, Decimal::from_i128_with_scale(5, MAX_CURRENCY_SCALE));
        assert_eq!(format_amount(5, Some(MAX_CURRENCY_SCALE)).scale(), MAX_CURRENCY_SCALE);
    }

    #[test]
    fn test_grand_total_of_empty_ledger() {
        let ledger = Ledger::new();
        assert_eq!(ledger.grand_total(), GrandTotal::PerCurrency(BTreeMap::new()));
    }
}
