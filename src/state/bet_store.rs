use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::error::{AppError, Result};
use crate::repository::{BetQuery, BetRepository};
use crate::types::{apply_status, Bet, StatusChange};

// ---------------------------------------------------------------------------
// InMemoryBetStore
// ---------------------------------------------------------------------------

/// Process-local store. Nothing survives a restart; used for development and tests.
#[derive(Default)]
pub struct InMemoryBetStore {
    /// bet_id → Bet
    bets: DashMap<String, Bet>,
}

impl InMemoryBetStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.bets.len()
    }
}

#[async_trait]
impl BetRepository for InMemoryBetStore {
    async fn list_bets(&self, owner_id: &str, query: &BetQuery) -> Result<Vec<Bet>> {
        let mut bets: Vec<Bet> = self
            .bets
            .iter()
            .filter(|entry| entry.owner_id == owner_id && query.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        bets.sort_by(|a, b| b.placed_at.cmp(&a.placed_at));
        Ok(bets)
    }

    async fn get_bet(&self, id: &str, owner_id: &str) -> Result<Option<Bet>> {
        Ok(self
            .bets
            .get(id)
            .filter(|bet| bet.owner_id == owner_id)
            .map(|bet| bet.clone()))
    }

    async fn create_bet(&self, bet: Bet) -> Result<Bet> {
        self.bets.insert(bet.id.clone(), bet.clone());
        Ok(bet)
    }

    async fn update_status(
        &self,
        id: &str,
        owner_id: &str,
        change: &StatusChange,
        now: DateTime<Utc>,
    ) -> Result<Bet> {
        // Entry lock is held for the whole transition.
        let mut bet = self
            .bets
            .get_mut(id)
            .filter(|bet| bet.owner_id == owner_id)
            .ok_or_else(|| AppError::bet_not_found(id))?;
        apply_status(&mut bet, change, now)?;
        Ok(bet.clone())
    }

    async fn delete_bet(&self, id: &str, owner_id: &str) -> Result<()> {
        self.bets
            .remove_if(id, |_, bet| bet.owner_id == owner_id)
            .map(|_| ())
            .ok_or_else(|| AppError::bet_not_found(id))
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
