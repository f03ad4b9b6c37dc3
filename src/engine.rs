//! The spin allocation engine.
//!
//! One call = one atomic unit of work against the ledger: re-check
//! eligibility, pick a prize, reserve a code, write the spin + coupon pair,
//! bump the prize counter. The database transaction is the only
//! serialization point; concurrent writers are detected (guarded counter
//! update, unique spin indexes) and the whole sequence is retried a bounded
//! number of times. No in-process state is ever consulted for caps or
//! identity uniqueness.

use chrono::{Duration, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, DatabaseConnection, DbErr,
    EntityTrait, QueryFilter, QueryOrder, SqlErr, TransactionTrait,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::codegen::{self, CodeError};
use crate::config::EngineConfig;
use crate::eligibility;
use crate::entities::{campaign, coupon, prize, spin};
use crate::identity::{IdentityError, SpinIdentity};
use crate::selector;

#[derive(Debug, thiserror::Error)]
pub enum AllocationError {
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error("no live campaign to spin")]
    NoActiveCampaign,
    #[error("identity already holds a spin in this campaign")]
    AlreadySpun,
    #[error("campaign has no active prizes")]
    NoPrizesConfigured,
    #[error("no unused coupon code found after {attempts} attempts")]
    CodeSpaceExhausted { attempts: u32 },
    #[error("allocation conflicted with concurrent spins after {attempts} attempts")]
    Conflict { attempts: u32 },
    #[error("ledger error: {0}")]
    Ledger(#[from] DbErr),
}

/// Raw request inputs; the engine normalizes the identity itself before
/// touching the ledger.
#[derive(Debug, Clone)]
pub struct SpinRequest {
    pub phone: Option<String>,
    pub email: Option<String>,
    pub ip_address: String,
    pub user_agent: String,
}

#[derive(Debug, Clone)]
pub struct AllocationOutcome {
    pub prize: prize::Model,
    /// Position of the winner within the active prize set, in wheel order
    pub prize_index: usize,
    pub coupon: coupon::Model,
    pub redirect_url: String,
    /// Set when the all-capped fallback path awarded this prize
    pub fallback: bool,
}

/// Failure of a single transactional attempt. Races roll the whole sequence
/// back and re-run it; fatal errors surface immediately.
enum AttemptError {
    Fatal(AllocationError),
    /// Guarded counter update matched no row: a concurrent allocation took
    /// the prize's last capacity between our read and our write
    CapRace,
    /// Commit rejected by a concurrent writer
    CommitRace(DbErr),
    /// Code generator ran out of attempts inside this transaction
    CodeSpace,
}

fn fatal_db(err: DbErr) -> AttemptError {
    AttemptError::Fatal(AllocationError::Ledger(err))
}

#[derive(Clone)]
pub struct SpinEngine {
    database: DatabaseConnection,
    config: EngineConfig,
}

impl SpinEngine {
    pub fn new(database: DatabaseConnection, config: EngineConfig) -> Self {
        assert!(config.max_attempts >= 1, "Engine needs at least one attempt");
        Self { database, config }
    }

    pub async fn allocate(
        &self,
        campaign_id: &str,
        request: &SpinRequest,
    ) -> Result<AllocationOutcome, AllocationError> {
        let mut rng = StdRng::from_entropy();
        self.allocate_with_rng(campaign_id, request, &mut rng).await
    }

    /// Allocation with an injected randomness source, so draw sequences are
    /// reproducible under test.
    pub async fn allocate_with_rng(
        &self,
        campaign_id: &str,
        request: &SpinRequest,
        rng: &mut StdRng,
    ) -> Result<AllocationOutcome, AllocationError> {
        let identity = SpinIdentity::from_raw(request.phone.as_deref(), request.email.as_deref())?;

        let mut code_space_exhausted = false;
        for attempt in 1..=self.config.max_attempts {
            match self
                .try_allocate(campaign_id, &identity, request, rng)
                .await
            {
                Ok(outcome) => {
                    info!(
                        campaign = campaign_id,
                        prize = %outcome.prize.name,
                        code = %outcome.coupon.code,
                        fallback = outcome.fallback,
                        "spin allocated"
                    );
                    return Ok(outcome);
                }
                Err(AttemptError::Fatal(err)) => return Err(err),
                Err(AttemptError::CapRace) => {
                    code_space_exhausted = false;
                    warn!(
                        campaign = campaign_id,
                        attempt, "prize capacity raced away, retrying"
                    );
                }
                Err(AttemptError::CommitRace(db)) => {
                    code_space_exhausted = false;
                    warn!(
                        campaign = campaign_id,
                        attempt,
                        error = %db,
                        "commit lost to a concurrent writer, retrying"
                    );
                }
                Err(AttemptError::CodeSpace) => {
                    code_space_exhausted = true;
                    warn!(
                        campaign = campaign_id,
                        attempt, "coupon code space exhausted, retrying"
                    );
                }
            }
        }

        if code_space_exhausted {
            Err(AllocationError::CodeSpaceExhausted {
                attempts: codegen::MAX_CODE_ATTEMPTS,
            })
        } else {
            Err(AllocationError::Conflict {
                attempts: self.config.max_attempts,
            })
        }
    }

    async fn try_allocate(
        &self,
        campaign_id: &str,
        identity: &SpinIdentity,
        request: &SpinRequest,
        rng: &mut StdRng,
    ) -> Result<AllocationOutcome, AttemptError> {
        let txn = self.database.begin().await.map_err(fatal_db)?;

        // 1. Live campaign and its active prizes, win counts as of this
        //    transaction.
        let campaign = campaign::Entity::find_by_id(campaign_id)
            .one(&txn)
            .await
            .map_err(fatal_db)?
            .filter(|c| c.is_live())
            .ok_or(AttemptError::Fatal(AllocationError::NoActiveCampaign))?;

        let prizes = prize::Entity::find()
            .filter(prize::Column::CampaignId.eq(&campaign.id))
            .filter(prize::Column::Active.eq(true))
            .order_by_asc(prize::Column::CreatedAt)
            .order_by_asc(prize::Column::Id)
            .all(&txn)
            .await
            .map_err(fatal_db)?;
        if prizes.is_empty() {
            return Err(AttemptError::Fatal(AllocationError::NoPrizesConfigured));
        }

        // 2. Authoritative already-spun re-check; the advisory checker only
        //    saves latency.
        if eligibility::spin_exists(&txn, &campaign.id, identity)
            .await
            .map_err(fatal_db)?
        {
            return Err(AttemptError::Fatal(AllocationError::AlreadySpun));
        }

        // 3. Weighted selection over the freshly read set.
        let selection = selector::select(&prizes, rng)
            .ok_or(AttemptError::Fatal(AllocationError::NoPrizesConfigured))?;
        let fallback = selection.fallback;
        let selected = selection.prize.clone();
        let prize_index = prizes
            .iter()
            .position(|p| p.id == selected.id)
            .unwrap_or(0);

        // 4. Reserve a redemption code under this transaction.
        let code = codegen::issue_code(&txn, &selected, &self.config.coupon_prefix, rng)
            .await
            .map_err(|err| match err {
                CodeError::Ledger(db) => fatal_db(db),
                CodeError::SpaceExhausted { .. } => AttemptError::CodeSpace,
            })?;

        // 5. Spin + coupon rows, then the counter increment.
        let now = Utc::now().fixed_offset();
        let spin_row = spin::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            campaign_id: Set(campaign.id.clone()),
            prize_id: Set(selected.id.clone()),
            phone: Set(identity.phone.clone()),
            email: Set(identity.email.clone()),
            coupon_code: Set(code.clone()),
            ip_address: Set(request.ip_address.clone()),
            user_agent: Set(request.user_agent.clone()),
            created_at: Set(now),
        };
        let spin_model = spin_row.insert(&txn).await.map_err(|err| {
            if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                AttemptError::Fatal(AllocationError::AlreadySpun)
            } else {
                fatal_db(err)
            }
        })?;

        let expires_at = (Utc::now() + Duration::days(self.config.coupon_ttl_days)).fixed_offset();
        let coupon_row = coupon::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            code: Set(code),
            prize_id: Set(selected.id.clone()),
            spin_id: Set(spin_model.id.clone()),
            phone: Set(identity.phone.clone()),
            email: Set(identity.email.clone()),
            expires_at: Set(expires_at),
            used: Set(false),
            redeemed_at: Set(None),
            created_at: Set(now),
        };
        let coupon_model = coupon_row.insert(&txn).await.map_err(fatal_db)?;

        // The increment is guarded by the cap on the normal path. The
        // fallback path bumps past the cap unguarded: that overflow is the
        // price of never leaving the player empty-handed.
        let mut update = prize::Entity::update_many()
            .col_expr(
                prize::Column::WinCount,
                Expr::col(prize::Column::WinCount).add(1),
            )
            .filter(prize::Column::Id.eq(&selected.id));
        if !fallback {
            update = update.filter(
                Condition::any()
                    .add(prize::Column::MaxWins.is_null())
                    .add(Expr::col(prize::Column::WinCount).lt(Expr::col(prize::Column::MaxWins))),
            );
        }
        let updated = update.exec(&txn).await.map_err(fatal_db)?;
        if updated.rows_affected == 0 {
            return Err(AttemptError::CapRace);
        }

        txn.commit().await.map_err(|err| {
            if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                AttemptError::Fatal(AllocationError::AlreadySpun)
            } else {
                AttemptError::CommitRace(err)
            }
        })?;

        Ok(AllocationOutcome {
            prize: selected,
            prize_index,
            coupon: coupon_model,
            redirect_url: campaign.redirect_url,
            fallback,
        })
    }
}
