use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::stats::period::{self, Window};
use crate::types::{Bet, BetFilters, BetType, StatusChange};

/// Optional pre-filter for listings. Aggregation re-applies its own filters,
/// so an unfiltered list is always acceptable input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BetQuery {
    pub bet_type: Option<BetType>,
    pub house: Option<String>,
    pub window: Window,
}

impl BetQuery {
    /// Listing filters: betType, house and startDate/endDate.
    pub fn from_filters(filters: &BetFilters) -> Result<Self> {
        Ok(Self {
            bet_type: period::non_blank(&filters.bet_type)
                .map(str::parse::<BetType>)
                .transpose()?,
            house: period::non_blank(&filters.house).map(str::to_string),
            window: period::explicit_window(
                period::non_blank(&filters.start_date),
                period::non_blank(&filters.end_date),
            )?,
        })
    }

    pub fn matches(&self, bet: &Bet) -> bool {
        self.window.contains(bet.placed_at)
            && self.bet_type.map_or(true, |t| bet.bet_type == t)
            && self.house.as_deref().map_or(true, |h| bet.house.as_deref() == Some(h))
    }
}

/// Bet persistence. Every operation is scoped by the owning user; a bet owned
/// by someone else behaves exactly like a missing one.
#[async_trait]
pub trait BetRepository: Send + Sync {
    /// Owner's bets matching `query`, most recently placed first.
    async fn list_bets(&self, owner_id: &str, query: &BetQuery) -> Result<Vec<Bet>>;

    async fn get_bet(&self, id: &str, owner_id: &str) -> Result<Option<Bet>>;

    async fn create_bet(&self, bet: Bet) -> Result<Bet>;

    /// Apply a status transition; `NotFound` when the bet is missing or not the owner's.
    async fn update_status(
        &self,
        id: &str,
        owner_id: &str,
        change: &StatusChange,
        now: DateTime<Utc>,
    ) -> Result<Bet>;

    /// Remove permanently; `NotFound` when the bet is missing or not the owner's.
    async fn delete_bet(&self, id: &str, owner_id: &str) -> Result<()>;

    /// Backend name for health reporting.
    fn backend(&self) -> &'static str;
}
