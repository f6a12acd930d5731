use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::warn;

use crate::error::Result;
use crate::stats::period::{self, Granularity, Period, Window};
use crate::types::{parse_amount, round_money, Bet, BetFilters, BetStats, BetStatus, BetType, ProfitBucket};

/// One bet record whose amounts could not be read. The record is left out of
/// the aggregation; everything else still counts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("bet {bet_id} has unusable {field} `{value}`")]
pub struct DataCorruptionWarning {
    pub bet_id: String,
    pub field: &'static str,
    pub value: String,
}

impl DataCorruptionWarning {
    fn new(bet: &Bet, field: &'static str, value: Option<&str>) -> Self {
        Self {
            bet_id: bet.id.clone(),
            field,
            value: value.unwrap_or_default().to_string(),
        }
    }
}

/// Money movement of one finished bet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    pub stake: Decimal,
    pub payout: Decimal,
    pub profit: Decimal,
    pub won: bool,
}

/// Per-bet rule. Pending bets settle to nothing; lost bets ignore any payout.
pub fn settle(bet: &Bet) -> std::result::Result<Option<Settlement>, DataCorruptionWarning> {
    if !bet.status.is_finished() {
        return Ok(None);
    }
    let stake = parse_amount(&bet.stake)
        .ok_or_else(|| DataCorruptionWarning::new(bet, "stake", Some(bet.stake.as_str())))?;

    let settlement = match bet.status {
        BetStatus::Completed => {
            let payout = bet
                .payout
                .as_deref()
                .and_then(parse_amount)
                .ok_or_else(|| DataCorruptionWarning::new(bet, "payout", bet.payout.as_deref()))?;
            let profit = payout
                .checked_sub(stake)
                .ok_or_else(|| DataCorruptionWarning::new(bet, "payout", bet.payout.as_deref()))?;
            Settlement { stake, payout, profit, won: true }
        }
        BetStatus::Lost => Settlement { stake, payout: Decimal::ZERO, profit: -stake, won: false },
        BetStatus::Pending => return Ok(None),
    };
    Ok(Some(settlement))
}

/// Derived profit shown in listings: zero while pending.
pub fn bet_profit(bet: &Bet) -> std::result::Result<Decimal, DataCorruptionWarning> {
    Ok(settle(bet)?.map_or(Decimal::ZERO, |s| s.profit))
}

/// Which bets an aggregation looks at and how it buckets them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub window: Window,
    pub granularity: Granularity,
    pub bet_type: Option<BetType>,
    pub house: Option<String>,
}

impl Selection {
    pub fn from_filters(filters: &BetFilters, now: DateTime<Utc>) -> Result<Self> {
        let resolved = period::resolve(filters, now)?;
        Self::with_window(filters, resolved.window, resolved.granularity)
    }

    /// The period right before the current one. Defaults to daily.
    pub fn previous(filters: &BetFilters, now: DateTime<Utc>) -> Result<Self> {
        let period = period::non_blank(&filters.period)
            .map(str::parse::<Period>)
            .transpose()?
            .unwrap_or(Period::Daily);
        let window = period::previous_window(period, now)?;
        Self::with_window(filters, window, period.granularity())
    }

    fn with_window(filters: &BetFilters, window: Window, granularity: Granularity) -> Result<Self> {
        Ok(Self {
            window,
            granularity,
            bet_type: period::non_blank(&filters.bet_type)
                .map(str::parse::<BetType>)
                .transpose()?,
            house: period::non_blank(&filters.house).map(str::to_string),
        })
    }

    fn matches(&self, owner_id: &str, bet: &Bet) -> bool {
        bet.owner_id == owner_id
            && self.window.contains(bet.placed_at)
            && self.bet_type.map_or(true, |t| bet.bet_type == t)
            && self.house.as_deref().map_or(true, |h| bet.house.as_deref() == Some(h))
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Totals {
    stake: Decimal,
    payout: Decimal,
    profit: Decimal,
}

impl Totals {
    /// `None` when any running sum would leave the decimal range.
    fn plus(&self, s: &Settlement) -> Option<Totals> {
        Some(Totals {
            stake: self.stake.checked_add(s.stake)?,
            payout: self.payout.checked_add(s.payout)?,
            profit: self.profit.checked_add(s.profit)?,
        })
    }
}

/// Result of one aggregation pass, including the records that were skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    pub stats: BetStats,
    pub skipped: Vec<DataCorruptionWarning>,
}

/// `part / whole * 100` rounded to two places; zero when `whole` is zero.
fn percentage(part: Decimal, whole: Decimal) -> Decimal {
    if whole.is_zero() {
        return Decimal::ZERO;
    }
    part.checked_div(whole)
        .and_then(|q| q.checked_mul(Decimal::ONE_HUNDRED))
        .map_or(Decimal::ZERO, round_money)
}

/// Aggregate the finished bets of `owner_id` matching `selection`.
///
/// Profit is summed per bet rather than derived from the stake and payout
/// totals. Buckets come out ascending by key.
pub fn aggregate(owner_id: &str, bets: &[Bet], selection: &Selection) -> Aggregation {
    let mut totals = Totals::default();
    let mut finished: u64 = 0;
    let mut won: u64 = 0;
    let mut buckets: BTreeMap<String, Totals> = BTreeMap::new();
    let mut skipped = Vec::new();

    for bet in bets.iter().filter(|b| selection.matches(owner_id, b)) {
        let key = period::bucket_key(bet.placed_at, selection.granularity);
        let folded = settle(bet).and_then(|settlement| {
            let Some(s) = settlement else {
                return Ok(None);
            };
            let bucket = buckets.get(&key).copied().unwrap_or_default();
            match (totals.plus(&s), bucket.plus(&s)) {
                (Some(t), Some(b)) => Ok(Some((s, t, b))),
                _ => Err(DataCorruptionWarning::new(bet, "stake", Some(bet.stake.as_str()))),
            }
        });

        match folded {
            Ok(Some((settlement, next_totals, next_bucket))) => {
                finished += 1;
                if settlement.won {
                    won += 1;
                }
                totals = next_totals;
                buckets.insert(key, next_bucket);
            }
            Ok(None) => {}
            Err(w) => {
                warn!(bet_id = %w.bet_id, field = w.field, value = %w.value, "Skipping corrupt bet: {w}");
                skipped.push(w);
            }
        }
    }

    let profit_by_date = buckets
        .into_iter()
        .map(|(date, t)| ProfitBucket {
            date,
            profit: round_money(t.profit),
            stake: round_money(t.stake),
            payout: round_money(t.payout),
        })
        .collect();

    let stats = BetStats {
        total_stake: round_money(totals.stake),
        total_payout: round_money(totals.payout),
        total_profit: round_money(totals.profit),
        total_bets: finished,
        win_rate: percentage(Decimal::from(won), Decimal::from(finished)),
        roi: percentage(totals.profit, totals.stake),
        profit_by_date,
    };

    Aggregation { stats, skipped }
}

/// Statistics for `owner_id` over `bets` under `filters`, evaluated at `now`,
/// together with the records left out as corrupt.
/// Only a malformed filter set is an error.
pub fn compute_stats(
    owner_id: &str,
    bets: &[Bet],
    filters: &BetFilters,
    now: DateTime<Utc>,
) -> Result<Aggregation> {
    let selection = Selection::from_filters(filters, now)?;
    Ok(aggregate(owner_id, bets, &selection))
}

/// Distinct bucket keys over all of an owner's bets, most recent first.
pub fn available_periods(owner_id: &str, bets: &[Bet], granularity: Granularity) -> Vec<String> {
    let keys: BTreeSet<String> = bets
        .iter()
        .filter(|b| b.owner_id == owner_id)
        .map(|b| period::bucket_key(b.placed_at, granularity))
        .collect();
    keys.into_iter().rev().collect()
}
