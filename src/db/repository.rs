use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::db::models::BetRow;
use crate::error::{AppError, Result};
use crate::repository::{BetQuery, BetRepository};
use crate::types::{apply_status, Bet, StatusChange};

const SELECT_BETS: &str = r#"
    SELECT id, owner_id, stake, payout, bet_type, status, house, description,
           placed_at, created_at, updated_at
    FROM bets
"#;

/// Open (creating if needed) the SQLite file and bring the schema up to date.
pub async fn connect(db_path: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new().connect_with(options).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

/// `BetRepository` on SQLite. Concurrent writers to the same bet resolve as last write wins.
pub struct SqliteBetRepository {
    pool: SqlitePool,
}

impl SqliteBetRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BetRepository for SqliteBetRepository {
    async fn list_bets(&self, owner_id: &str, query: &BetQuery) -> Result<Vec<Bet>> {
        let mut qb = QueryBuilder::<Sqlite>::new(SELECT_BETS);
        qb.push(" WHERE owner_id = ").push_bind(owner_id.to_string());
        if let Some(bet_type) = query.bet_type {
            qb.push(" AND bet_type = ").push_bind(bet_type.to_string());
        }
        if let Some(house) = &query.house {
            qb.push(" AND house = ").push_bind(house.clone());
        }
        if let Some(start) = query.window.start {
            qb.push(" AND placed_at >= ").push_bind(start.timestamp_millis());
        }
        if let Some(end) = query.window.end {
            qb.push(" AND placed_at <= ").push_bind(end.timestamp_millis());
        }
        qb.push(" ORDER BY placed_at DESC");

        let rows: Vec<BetRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        debug!(owner_id, rows = rows.len(), "Listed bets");
        rows.into_iter().map(Bet::try_from).collect()
    }

    async fn get_bet(&self, id: &str, owner_id: &str) -> Result<Option<Bet>> {
        let sql = format!("{SELECT_BETS} WHERE id = ? AND owner_id = ?");
        let row: Option<BetRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Bet::try_from).transpose()
    }

    async fn create_bet(&self, bet: Bet) -> Result<Bet> {
        sqlx::query(
            r#"
            INSERT INTO bets (
                id, owner_id, stake, payout, bet_type, status, house, description,
                placed_at, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&bet.id)
        .bind(&bet.owner_id)
        .bind(&bet.stake)
        .bind(&bet.payout)
        .bind(bet.bet_type.to_string())
        .bind(bet.status.to_string())
        .bind(&bet.house)
        .bind(&bet.description)
        .bind(bet.placed_at.timestamp_millis())
        .bind(bet.created_at.timestamp_millis())
        .bind(bet.updated_at.timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(bet)
    }

    async fn update_status(
        &self,
        id: &str,
        owner_id: &str,
        change: &StatusChange,
        now: DateTime<Utc>,
    ) -> Result<Bet> {
        let mut bet = self
            .get_bet(id, owner_id)
            .await?
            .ok_or_else(|| AppError::bet_not_found(id))?;
        apply_status(&mut bet, change, now)?;

        let result = sqlx::query(
            r#"
            UPDATE bets SET status = ?, payout = ?, updated_at = ?
            WHERE id = ? AND owner_id = ?
            "#,
        )
        .bind(bet.status.to_string())
        .bind(&bet.payout)
        .bind(bet.updated_at.timestamp_millis())
        .bind(id)
        .bind(owner_id)
        .execute(&self.pool)
        .await?;

        // Deleted between the read and the write.
        if result.rows_affected() == 0 {
            return Err(AppError::bet_not_found(id));
        }
        Ok(bet)
    }

    async fn delete_bet(&self, id: &str, owner_id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM bets WHERE id = ? AND owner_id = ?")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::bet_not_found(id));
        }
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::period::Window;
    use crate::types::{BetStatus, BetType};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    async fn memory_repo() -> SqliteBetRepository {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        SqliteBetRepository::new(pool)
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, hour, 0, 0).unwrap()
    }

    fn test_bet(id: &str, owner: &str, placed_at: DateTime<Utc>) -> Bet {
        Bet {
            id: id.to_string(),
            owner_id: owner.to_string(),
            stake: "20.00".to_string(),
            payout: Some("35.50".to_string()),
            bet_type: BetType::Giros,
            status: BetStatus::Pending,
            house: Some("Bet365".to_string()),
            description: Some("cashout".to_string()),
            placed_at,
            created_at: placed_at,
            updated_at: placed_at,
        }
    }

    #[tokio::test]
    async fn create_then_get_round_trips_every_field() {
        let repo = memory_repo().await;
        let bet = test_bet("a", "alice", at(1, 15));
        repo.create_bet(bet.clone()).await.unwrap();

        let stored = repo.get_bet("a", "alice").await.unwrap();
        assert_eq!(stored, Some(bet));
        assert_eq!(repo.get_bet("a", "bob").await.unwrap(), None);
    }

    #[tokio::test]
    async fn list_filters_and_orders() {
        let repo = memory_repo().await;
        repo.create_bet(test_bet("a", "alice", at(1, 15))).await.unwrap();
        repo.create_bet(test_bet("b", "alice", at(5, 15))).await.unwrap();
        let mut other_type = test_bet("c", "alice", at(3, 15));
        other_type.bet_type = BetType::Dnc;
        repo.create_bet(other_type).await.unwrap();
        repo.create_bet(test_bet("d", "bob", at(2, 15))).await.unwrap();

        let all = repo.list_bets("alice", &BetQuery::default()).await.unwrap();
        let ids: Vec<&str> = all.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);

        let query = BetQuery {
            bet_type: Some(BetType::Giros),
            window: Window::between(at(1, 0), at(4, 0)),
            ..BetQuery::default()
        };
        let filtered = repo.list_bets("alice", &query).await.unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].id, "a");
    }

    #[tokio::test]
    async fn status_update_and_delete_are_owner_scoped() {
        let repo = memory_repo().await;
        repo.create_bet(test_bet("a", "alice", at(1, 15))).await.unwrap();

        let lose = StatusChange { status: BetStatus::Lost, payout: None };
        assert!(matches!(
            repo.update_status("a", "bob", &lose, at(2, 0)).await,
            Err(AppError::NotFound(_))
        ));

        let win = StatusChange { status: BetStatus::Completed, payout: Some(dec!(40)) };
        let updated = repo.update_status("a", "alice", &win, at(2, 0)).await.unwrap();
        assert_eq!(updated.status, BetStatus::Completed);
        assert_eq!(updated.payout.as_deref(), Some("40.00"));
        assert_eq!(repo.get_bet("a", "alice").await.unwrap(), Some(updated));

        assert!(matches!(repo.delete_bet("a", "bob").await, Err(AppError::NotFound(_))));
        repo.delete_bet("a", "alice").await.unwrap();
        assert_eq!(repo.get_bet("a", "alice").await.unwrap(), None);
    }

    #[tokio::test]
    async fn corrupt_amounts_still_list() {
        let repo = memory_repo().await;
        let mut bet = test_bet("a", "alice", at(1, 15));
        bet.stake = "twenty".to_string();
        repo.create_bet(bet).await.unwrap();

        let listed = repo.list_bets("alice", &BetQuery::default()).await.unwrap();
        assert_eq!(listed[0].stake, "twenty");
    }
}
