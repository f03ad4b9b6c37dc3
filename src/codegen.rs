//! Redemption code generation.
//!
//! Codes look like `GATEWAY-7XK2M9`: a configured prefix plus six characters
//! from an alphabet with the easily-confused glyphs (0/O, 1/I/L) removed.
//! Uniqueness of generated codes is checked against the coupons table inside
//! the caller's transaction; prizes configured with a fixed code skip the
//! check entirely and every winner shares that code.

use rand::Rng;
use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter};

use crate::entities::{coupon, prize};

pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const CODE_LENGTH: usize = 6;

/// Regenerations before giving up. Exhaustion at 32^6 possible suffixes
/// signals a saturated code space or a ledger problem, so the whole
/// allocation is the thing to retry, not just this step.
pub const MAX_CODE_ATTEMPTS: u32 = 10;

#[derive(Debug, thiserror::Error)]
pub enum CodeError {
    #[error("ledger error: {0}")]
    Ledger(#[from] DbErr),
    #[error("no unused coupon code found after {attempts} attempts")]
    SpaceExhausted { attempts: u32 },
}

/// One candidate code; collision checking is the caller's concern.
pub fn candidate_code(prefix: &str, rng: &mut impl Rng) -> String {
    let mut code = String::with_capacity(prefix.len() + 1 + CODE_LENGTH);
    code.push_str(prefix);
    code.push('-');
    for _ in 0..CODE_LENGTH {
        let index = rng.gen_range(0..CODE_ALPHABET.len());
        code.push(char::from(CODE_ALPHABET[index]));
    }
    code
}

/// Produce the redemption code for `prize`, unique among persisted coupons.
/// Run inside the allocation transaction so the uniqueness check and the
/// eventual insert see the same ledger state.
pub async fn issue_code<C: ConnectionTrait>(
    conn: &C,
    prize: &prize::Model,
    prefix: &str,
    rng: &mut (impl Rng + Send),
) -> Result<String, CodeError> {
    if let Some(fixed) = &prize.coupon_code {
        return Ok(fixed.clone());
    }

    for _ in 0..MAX_CODE_ATTEMPTS {
        let candidate = candidate_code(prefix, rng);
        let taken = coupon::Entity::find()
            .filter(coupon::Column::Code.eq(&candidate))
            .one(conn)
            .await?
            .is_some();
        if !taken {
            return Ok(candidate);
        }
    }

    Err(CodeError::SpaceExhausted {
        attempts: MAX_CODE_ATTEMPTS,
    })
}
