use anyhow::{anyhow, Context, Result};
use sqlx::PgPool;
use thiserror::Error;

use pasaj_db::models::Payment;
use pasaj_db::repositories::{EventRepository, PaymentRepository, SettingsRepository};

use super::provision::Debit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PaymentError {
    #[error("deposit is below the minimum of {minimum} Rials")]
    BelowMinimum { minimum: i64 },
    #[error("payment not found")]
    NotFound,
    #[error("payment was already decided")]
    AlreadyDecided,
}

/// All wallet mutations go through here. Balances are Rial integers on the
/// user row; this service owns the SQL that moves them.
#[derive(Debug, Clone)]
pub struct WalletService {
    pool: PgPool,
    payments: PaymentRepository,
    settings: SettingsRepository,
    events: EventRepository,
}

impl WalletService {
    pub fn new(pool: PgPool) -> Self {
        let payments = PaymentRepository::new(pool.clone());
        let settings = SettingsRepository::new(pool.clone());
        let events = EventRepository::new(pool.clone());
        Self {
            pool,
            payments,
            settings,
            events,
        }
    }

    pub async fn balance_of(&self, telegram_id: i64) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT balance FROM users WHERE telegram_id = $1")
            .bind(telegram_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to read balance")?
            .ok_or_else(|| anyhow!("User {telegram_id} not found"))
    }

    /// Takes `amount` from the wallet if it fits. The sufficiency check and
    /// the subtraction are one conditional UPDATE, so two concurrent spends
    /// can never both pass on the same funds.
    pub async fn try_debit(&self, telegram_id: i64, amount: i64) -> Result<Debit> {
        let affected = sqlx::query(
            "UPDATE users SET balance = balance - $1 WHERE telegram_id = $2 AND balance >= $1",
        )
        .bind(amount)
        .bind(telegram_id)
        .execute(&self.pool)
        .await
        .context("Failed to debit wallet")?
        .rows_affected();

        if affected == 1 {
            return Ok(Debit::Applied);
        }

        // Errors out when the user row is missing, which is the right answer.
        let balance = self.balance_of(telegram_id).await?;
        Ok(Debit::Insufficient {
            shortfall: amount - balance,
        })
    }

    pub async fn credit(&self, telegram_id: i64, amount: i64) -> Result<()> {
        let affected = sqlx::query("UPDATE users SET balance = balance + $1 WHERE telegram_id = $2")
            .bind(amount)
            .bind(telegram_id)
            .execute(&self.pool)
            .await
            .context("Failed to credit wallet")?
            .rows_affected();

        if affected == 0 {
            anyhow::bail!("Cannot credit unknown user {telegram_id}");
        }
        Ok(())
    }

    /// Files a deposit for admin review. Nothing is credited yet; the
    /// amount only moves on approval.
    pub async fn submit_payment(
        &self,
        telegram_id: i64,
        amount: i64,
        method: &str,
        authority: Option<&str>,
        receipt_path: Option<&str>,
    ) -> Result<Result<i64, PaymentError>> {
        let settings = self.settings.load().await?;
        if amount < settings.min_deposit {
            return Ok(Err(PaymentError::BelowMinimum {
                minimum: settings.min_deposit,
            }));
        }

        let payment_id = self
            .payments
            .create(telegram_id, amount, method, authority, receipt_path)
            .await?;

        let _ = self
            .events
            .log(
                Some(telegram_id),
                "deposit_submitted",
                &format!("payment {payment_id}, {amount} Rials via {method}"),
            )
            .await;

        Ok(Ok(payment_id))
    }

    /// Approves a pending deposit and credits the wallet in one
    /// transaction. The row lock makes a double-click on the approve button
    /// come back as `AlreadyDecided` instead of a double credit.
    pub async fn approve_payment(&self, payment_id: i64) -> Result<Result<Payment, PaymentError>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to open approval transaction")?;

        let payment =
            sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = $1 FOR UPDATE")
                .bind(payment_id)
                .fetch_optional(&mut *tx)
                .await
                .context("Failed to lock payment row")?;

        let Some(payment) = payment else {
            return Ok(Err(PaymentError::NotFound));
        };
        if !payment.is_pending() {
            return Ok(Err(PaymentError::AlreadyDecided));
        }

        let payment = sqlx::query_as::<_, Payment>(
            r#"
            UPDATE payments SET approved = TRUE, decided_at = CURRENT_TIMESTAMP
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(payment_id)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to mark payment approved")?;

        sqlx::query("UPDATE users SET balance = balance + $1 WHERE telegram_id = $2")
            .bind(payment.amount)
            .bind(payment.telegram_id)
            .execute(&mut *tx)
            .await
            .context("Failed to credit approved deposit")?;

        tx.commit().await.context("Failed to commit approval")?;

        let _ = self
            .events
            .log(
                Some(payment.telegram_id),
                "deposit_approved",
                &format!("payment {}, {} Rials", payment.id, payment.amount),
            )
            .await;

        Ok(Ok(payment))
    }

    pub async fn reject_payment(&self, payment_id: i64) -> Result<Result<Payment, PaymentError>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to open rejection transaction")?;

        let payment =
            sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = $1 FOR UPDATE")
                .bind(payment_id)
                .fetch_optional(&mut *tx)
                .await
                .context("Failed to lock payment row")?;

        let Some(payment) = payment else {
            return Ok(Err(PaymentError::NotFound));
        };
        if !payment.is_pending() {
            return Ok(Err(PaymentError::AlreadyDecided));
        }

        let payment = sqlx::query_as::<_, Payment>(
            r#"
            UPDATE payments SET approved = FALSE, decided_at = CURRENT_TIMESTAMP
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(payment_id)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to mark payment rejected")?;

        tx.commit().await.context("Failed to commit rejection")?;

        let _ = self
            .events
            .log(
                Some(payment.telegram_id),
                "deposit_rejected",
                &format!("payment {}", payment.id),
            )
            .await;

        Ok(Ok(payment))
    }

    pub async fn pending_payments(&self) -> Result<Vec<Payment>> {
        self.payments.list_pending().await
    }

    pub async fn payment_history(&self, telegram_id: i64) -> Result<Vec<Payment>> {
        self.payments.list_for_user(telegram_id).await
    }
}
