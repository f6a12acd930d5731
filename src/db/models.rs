use chrono::{DateTime, Utc};

use crate::error::{AppError, Result};
use crate::types::Bet;

/// Row of the `bets` table (see migrations/). Timestamps are epoch milliseconds.
#[derive(Debug, sqlx::FromRow)]
pub struct BetRow {
    pub id: String,
    pub owner_id: String,
    pub stake: String,
    pub payout: Option<String>,
    pub bet_type: String,
    pub status: String,
    pub house: Option<String>,
    pub description: Option<String>,
    pub placed_at: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

fn decode_err(msg: String) -> AppError {
    AppError::Database(sqlx::Error::Decode(msg.into()))
}

fn from_millis(column: &str, ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| decode_err(format!("{column} out of range: {ms}")))
}

impl TryFrom<BetRow> for Bet {
    type Error = AppError;

    fn try_from(row: BetRow) -> Result<Self> {
        // Amounts stay as text: a malformed stake is the aggregator's problem,
        // not a reason to fail the whole listing.
        Ok(Bet {
            bet_type: row
                .bet_type
                .parse()
                .map_err(|_| decode_err(format!("bet {} has unknown bet_type `{}`", row.id, row.bet_type)))?,
            status: row
                .status
                .parse()
                .map_err(|_| decode_err(format!("bet {} has unknown status `{}`", row.id, row.status)))?,
            placed_at: from_millis("placed_at", row.placed_at)?,
            created_at: from_millis("created_at", row.created_at)?,
            updated_at: from_millis("updated_at", row.updated_at)?,
            id: row.id,
            owner_id: row.owner_id,
            stake: row.stake,
            payout: row.payout,
            house: row.house,
            description: row.description,
        })
    }
}
