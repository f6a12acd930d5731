use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::config::{MAX_AMOUNT, MONEY_DP};
use crate::error::{AppError, Result};
use crate::stats::period;

// ---------------------------------------------------------------------------
// Bet status: any state may move to any other
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetStatus {
    Pending,
    Completed,
    Lost,
}

impl BetStatus {
    /// Completed and lost bets are "finished" and take part in aggregates.
    pub fn is_finished(self) -> bool {
        !matches!(self, BetStatus::Pending)
    }
}

impl std::fmt::Display for BetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BetStatus::Pending => "pending",
            BetStatus::Completed => "completed",
            BetStatus::Lost => "lost",
        };
        write!(f, "{s}")
    }
}

impl FromStr for BetStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(BetStatus::Pending),
            "completed" => Ok(BetStatus::Completed),
            "lost" => Ok(BetStatus::Lost),
            other => Err(AppError::validation(format!("Invalid status `{other}`"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Bet type: informational only, never used in the math
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetType {
    Surebet,
    Giros,
    Superodd,
    Dnc,
    Gastos,
    Bingos,
    Extracao,
}

impl std::fmt::Display for BetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BetType::Surebet => "surebet",
            BetType::Giros => "giros",
            BetType::Superodd => "superodd",
            BetType::Dnc => "dnc",
            BetType::Gastos => "gastos",
            BetType::Bingos => "bingos",
            BetType::Extracao => "extracao",
        };
        write!(f, "{s}")
    }
}

impl FromStr for BetType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "surebet" => Ok(BetType::Surebet),
            "giros" => Ok(BetType::Giros),
            "superodd" => Ok(BetType::Superodd),
            "dnc" => Ok(BetType::Dnc),
            "gastos" => Ok(BetType::Gastos),
            "bingos" => Ok(BetType::Bingos),
            "extracao" => Ok(BetType::Extracao),
            other => Err(AppError::validation(format!("Invalid bet type `{other}`"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Bet
// ---------------------------------------------------------------------------

/// A stored bet. Amounts are kept as the decimal text they were persisted with;
/// they are parsed on every aggregation so one corrupt record can be skipped
/// without failing the rest. Profit is never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bet {
    pub id: String,
    pub owner_id: String,
    pub stake: String,
    pub payout: Option<String>,
    pub bet_type: BetType,
    pub status: BetStatus,
    pub house: Option<String>,
    pub description: Option<String>,
    pub placed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Listing row: the stored bet plus its derived profit (null when the record is corrupt).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BetView {
    #[serde(flatten)]
    pub bet: Bet,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub profit: Option<Decimal>,
}

// ---------------------------------------------------------------------------
// Amounts
// ---------------------------------------------------------------------------

/// Money as it arrives on the wire: `"100.50"` and `100.5` are both accepted.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawAmount {
    Text(String),
    Number(serde_json::Number),
}

impl RawAmount {
    fn to_decimal(&self, field: &str) -> Result<Decimal> {
        let raw = match self {
            RawAmount::Text(s) => s.clone(),
            RawAmount::Number(n) => n.to_string(),
        };
        parse_amount(&raw)
            .ok_or_else(|| AppError::validation(format!("{field} must be a decimal amount, got `{raw}`")))
    }

    /// Submitted amount rounded to the money scale, capped at `MAX_AMOUNT`.
    fn to_money(&self, field: &str) -> Result<Decimal> {
        let value = round_money(self.to_decimal(field)?);
        if value.abs() > Decimal::from(MAX_AMOUNT) {
            return Err(AppError::validation(format!("{field} must not exceed {MAX_AMOUNT}")));
        }
        // -0.001 rounds to a signed zero
        if value.is_zero() {
            return Ok(Decimal::ZERO);
        }
        Ok(value)
    }
}

/// Exact decimal parse of a stored or submitted amount. Accepts scientific notation.
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let raw = raw.trim();
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}

/// Round half away from zero to the money scale.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Canonical stored text for an amount: always two decimal places.
pub fn format_money(value: Decimal) -> String {
    let mut rounded = round_money(value);
    rounded.rescale(MONEY_DP);
    rounded.to_string()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBet {
    pub stake: RawAmount,
    pub payout: Option<RawAmount>,
    pub bet_type: String,
    pub house: Option<String>,
    pub description: Option<String>,
    pub placed_at: Option<String>,
}

impl NewBet {
    /// Validate the request and build a pending bet owned by `owner_id`.
    pub fn into_bet(self, owner_id: &str, now: DateTime<Utc>) -> Result<Bet> {
        let stake = self.stake.to_money("stake")?;
        if stake <= Decimal::ZERO {
            return Err(AppError::validation("stake must be at least 0.01"));
        }
        let payout = self
            .payout
            .map(|p| p.to_money("payout"))
            .transpose()?;
        if payout.is_some_and(|p| p.is_sign_negative() && !p.is_zero()) {
            return Err(AppError::validation("payout must not be negative"));
        }
        let bet_type: BetType = self.bet_type.trim().parse()?;
        let placed_at = period::parse_placed_at(self.placed_at.as_deref(), now)?;

        Ok(Bet {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            stake: format_money(stake),
            payout: payout.map(format_money),
            bet_type,
            status: BetStatus::Pending,
            house: non_blank(self.house),
            description: non_blank(self.description),
            placed_at,
            created_at: now,
            updated_at: now,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdate {
    pub status: String,
    pub payout: Option<RawAmount>,
}

/// A validated status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub status: BetStatus,
    pub payout: Option<Decimal>,
}

impl StatusUpdate {
    pub fn parse(self) -> Result<StatusChange> {
        let status: BetStatus = self.status.trim().parse()?;
        let payout = self
            .payout
            .map(|p| p.to_money("payout"))
            .transpose()?;
        if payout.is_some_and(|p| p.is_sign_negative() && !p.is_zero()) {
            return Err(AppError::validation("payout must not be negative"));
        }
        Ok(StatusChange { status, payout })
    }
}

/// Apply a transition in place. Stake never changes; a bet cannot be
/// completed without a payout on record.
pub fn apply_status(bet: &mut Bet, change: &StatusChange, now: DateTime<Utc>) -> Result<()> {
    let payout = change.payout.map(format_money).or_else(|| bet.payout.clone());
    if change.status == BetStatus::Completed && payout.is_none() {
        return Err(AppError::validation("payout is required to complete a bet"));
    }
    bet.payout = payout;
    bet.status = change.status;
    bet.updated_at = now;
    Ok(())
}

// ---------------------------------------------------------------------------
// Filters and statistics
// ---------------------------------------------------------------------------

/// Raw filter set as received from the caller. Blank values count as absent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BetFilters {
    pub bet_type: Option<String>,
    pub house: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub period: Option<String>,
    pub month: Option<String>,
    pub year: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfitBucket {
    pub date: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub profit: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub stake: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub payout: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BetStats {
    #[serde(with = "rust_decimal::serde::float")]
    pub total_stake: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_payout: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_profit: Decimal,
    pub total_bets: u64,
    #[serde(with = "rust_decimal::serde::float")]
    pub win_rate: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub roi: Decimal,
    pub profit_by_date: Vec<ProfitBucket>,
}

impl BetStats {
    pub fn empty() -> Self {
        Self {
            total_stake: Decimal::ZERO,
            total_payout: Decimal::ZERO,
            total_profit: Decimal::ZERO,
            total_bets: 0,
            win_rate: Decimal::ZERO,
            roi: Decimal::ZERO,
            profit_by_date: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 15, 0, 0).unwrap()
    }

    fn new_bet(stake: RawAmount) -> NewBet {
        NewBet {
            stake,
            payout: None,
            bet_type: "surebet".to_string(),
            house: Some("  ".to_string()),
            description: Some(" final ".to_string()),
            placed_at: None,
        }
    }

    #[test]
    fn new_bet_starts_pending_with_canonical_amounts() {
        let mut req = new_bet(RawAmount::Text("100.5".to_string()));
        req.payout = Some(RawAmount::Number(serde_json::Number::from(150)));
        let bet = req.into_bet("user-1", now()).unwrap();

        assert_eq!(bet.status, BetStatus::Pending);
        assert_eq!(bet.stake, "100.50");
        assert_eq!(bet.payout.as_deref(), Some("150.00"));
        assert_eq!(bet.owner_id, "user-1");
        assert_eq!(bet.house, None);
        assert_eq!(bet.description.as_deref(), Some("final"));
        assert_eq!(bet.placed_at, now());
    }

    #[test]
    fn new_bet_rejects_bad_stake_and_type() {
        let err = new_bet(RawAmount::Text("abc".to_string()))
            .into_bet("u", now())
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = new_bet(RawAmount::Text("0".to_string()))
            .into_bet("u", now())
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let mut req = new_bet(RawAmount::Text("10".to_string()));
        req.bet_type = "poker".to_string();
        assert!(matches!(req.into_bet("u", now()), Err(AppError::Validation(_))));
    }

    #[test]
    fn stake_is_checked_after_rounding() {
        let err = new_bet(RawAmount::Text("0.001".to_string()))
            .into_bet("u", now())
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let bet = new_bet(RawAmount::Text("0.005".to_string()))
            .into_bet("u", now())
            .unwrap();
        assert_eq!(bet.stake, "0.01");
    }

    #[test]
    fn oversized_amounts_are_rejected() {
        let huge = "50000000000000000000000000000";
        let err = new_bet(RawAmount::Text(huge.to_string()))
            .into_bet("u", now())
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let mut req = new_bet(RawAmount::Text("10".to_string()));
        req.payout = Some(RawAmount::Text("1000000000000.01".to_string()));
        assert!(matches!(req.into_bet("u", now()), Err(AppError::Validation(_))));

        let mut req = new_bet(RawAmount::Text("1000000000000".to_string()));
        req.payout = Some(RawAmount::Text("1000000000000.004".to_string()));
        let bet = req.into_bet("u", now()).unwrap();
        assert_eq!(bet.stake, "1000000000000.00");
        assert_eq!(bet.payout.as_deref(), Some("1000000000000.00"));

        let update = StatusUpdate {
            status: "completed".to_string(),
            payout: Some(RawAmount::Text(huge.to_string())),
        };
        assert!(matches!(update.parse(), Err(AppError::Validation(_))));
    }

    #[test]
    fn amounts_accept_json_numbers_and_strings() {
        let parsed: NewBet = serde_json::from_str(
            r#"{"stake": 25.75, "payout": "30", "betType": "dnc", "placedAt": "2025-03-01"}"#,
        )
        .unwrap();
        let bet = parsed.into_bet("u", now()).unwrap();
        assert_eq!(bet.stake, "25.75");
        assert_eq!(bet.payout.as_deref(), Some("30.00"));
        assert_eq!(bet.bet_type, BetType::Dnc);
    }

    #[test]
    fn money_rounds_half_away_from_zero() {
        assert_eq!(round_money(dec!(1.005)), dec!(1.01));
        assert_eq!(round_money(dec!(-1.005)), dec!(-1.01));
        assert_eq!(format_money(dec!(7)), "7.00");
    }

    #[test]
    fn status_parse_rejects_unknown_tokens() {
        let update = StatusUpdate { status: "won".to_string(), payout: None };
        assert!(matches!(update.parse(), Err(AppError::Validation(_))));
    }

    #[test]
    fn completing_requires_a_payout() {
        let mut bet = new_bet(RawAmount::Text("10".to_string()))
            .into_bet("u", now())
            .unwrap();
        let complete = StatusChange { status: BetStatus::Completed, payout: None };
        assert!(apply_status(&mut bet, &complete, now()).is_err());
        assert_eq!(bet.status, BetStatus::Pending);

        let complete = StatusChange { status: BetStatus::Completed, payout: Some(dec!(18)) };
        apply_status(&mut bet, &complete, now()).unwrap();
        assert_eq!(bet.status, BetStatus::Completed);
        assert_eq!(bet.payout.as_deref(), Some("18.00"));
    }

    #[test]
    fn completed_bet_can_be_reverted() {
        let mut req = new_bet(RawAmount::Text("10".to_string()));
        req.payout = Some(RawAmount::Text("12".to_string()));
        let mut bet = req.into_bet("u", now()).unwrap();

        for status in [BetStatus::Completed, BetStatus::Pending, BetStatus::Lost, BetStatus::Completed] {
            apply_status(&mut bet, &StatusChange { status, payout: None }, now()).unwrap();
            assert_eq!(bet.status, status);
        }
        assert_eq!(bet.stake, "10.00");
    }
}
