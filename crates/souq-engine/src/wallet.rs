//! # Wallet Ledger
//!
//! The only code path that changes `wallets.balance`.
//!
//! ## Re-pricing a Wallet-Paid Order
//! ```text
//! adjust(old = 17.250, new = 20.125)
//!    │
//!    ├── credit 17.250            balance 2.750 → 20.000
//!    ├── validate 20.125          InsufficientBalance → whole tx rolls back
//!    └── deduct 20.125
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use souq_core::points::conversion_amount;
use souq_core::validation::validate_points;
use souq_core::wallet::{debit_clamped, ensure_sufficient};
use souq_core::{
    CoreError, Money, Payment, PaymentMethod, PaymentStatus, PointsTransactionType,
    ValidationError, Wallet,
};
use souq_db::{Conn, NewPayment, PaymentRepository, PointsRepository, WalletRepository};

use crate::activity::Activity;
use crate::context::EngineContext;
use crate::error::FulfillmentResult;
use crate::numbering::next_payment_number;
use crate::points::PointsLedger;

#[derive(Debug, Clone, Copy)]
pub struct WalletLedger;

impl WalletLedger {
    /// Fails with `InsufficientBalance` when the wallet holds less than
    /// `required`. A customer without a wallet has a zero balance.
    pub async fn validate_balance(
        conn: &mut Conn,
        customer_id: i64,
        required: Money,
    ) -> FulfillmentResult<Wallet> {
        let wallet = WalletRepository::get_or_create(conn, customer_id).await?;
        ensure_sufficient(wallet.balance, required)?;
        Ok(wallet)
    }

    /// Debits `amount`, clamped at zero. Returns the new balance.
    pub async fn deduct(conn: &mut Conn, customer_id: i64, amount: Money) -> FulfillmentResult<Money> {
        let wallet = WalletRepository::get_or_create(conn, customer_id).await?;
        let balance = debit_clamped(wallet.balance, amount);
        WalletRepository::set_balance(conn, wallet.id, balance).await?;
        debug!(customer_id, amount = %amount, balance = %balance, "Wallet debited");
        Ok(balance)
    }

    /// Credits `amount`. Returns the new balance.
    pub async fn credit(conn: &mut Conn, customer_id: i64, amount: Money) -> FulfillmentResult<Money> {
        let wallet = WalletRepository::get_or_create(conn, customer_id).await?;
        let balance = wallet.balance + amount.non_negative();
        WalletRepository::set_balance(conn, wallet.id, balance).await?;
        debug!(customer_id, amount = %amount, balance = %balance, "Wallet credited");
        Ok(balance)
    }

    /// Gives back `old_amount`, then charges `new_amount`.
    pub async fn adjust(
        conn: &mut Conn,
        customer_id: i64,
        old_amount: Money,
        new_amount: Money,
    ) -> FulfillmentResult<Money> {
        Self::credit(conn, customer_id, old_amount).await?;
        Self::validate_balance(conn, customer_id, new_amount).await?;
        Self::deduct(conn, customer_id, new_amount).await
    }
}

/// Inserts the completed wallet payment that settles an invoice.
pub(crate) async fn record_wallet_payment(
    conn: &mut Conn,
    invoice_id: i64,
    customer_id: i64,
    amount: Money,
    now: DateTime<Utc>,
) -> FulfillmentResult<Payment> {
    let payment_number = next_payment_number(conn, now).await?;
    let payment = PaymentRepository::insert(
        conn,
        &NewPayment {
            payment_number,
            invoice_id: Some(invoice_id),
            customer_id: Some(customer_id),
            amount,
            method: PaymentMethod::Wallet,
            status: PaymentStatus::Completed,
            paid_at: Some(now),
            ..NewPayment::default()
        },
    )
    .await?;
    Ok(payment)
}

/// Moves every completed payment of `method` on the invoice to refunded.
pub(crate) async fn refund_payments(
    conn: &mut Conn,
    invoice_id: i64,
    method: PaymentMethod,
) -> FulfillmentResult<usize> {
    let mut refunded = 0;
    for mut payment in PaymentRepository::for_invoice(conn, invoice_id).await? {
        if payment.method != method || payment.status != PaymentStatus::Completed {
            continue;
        }
        payment.status = PaymentStatus::Refunded;
        PaymentRepository::update(conn, &payment).await?;
        refunded += 1;
    }
    Ok(refunded)
}

/// Result of a points-to-wallet conversion.
#[derive(Debug, Clone, Serialize)]
pub struct PointsConversion {
    pub customer_id: i64,
    pub points: i64,
    pub amount: Money,
    pub points_balance: i64,
    pub wallet_balance: Money,
}

/// Customer-facing wallet operations that own their transaction.
#[derive(Debug, Clone)]
pub struct WalletService {
    ctx: EngineContext,
}

impl WalletService {
    pub fn new(ctx: EngineContext) -> Self {
        WalletService { ctx }
    }

    /// Exchanges loyalty points for wallet credit at the configured point
    /// value and appends a `points_to_wallet` history row.
    pub async fn convert_points_to_wallet(
        &self,
        customer_id: i64,
        points: i64,
    ) -> FulfillmentResult<PointsConversion> {
        validate_points(points)?;
        if points == 0 {
            return Err(ValidationError::MustBePositive {
                field: "points".into(),
            }
            .into());
        }
        let amount = conversion_amount(points, self.ctx.settings.point_value());
        if !amount.is_positive() {
            return Err(ValidationError::Conflict("points currently have no wallet value".into()).into());
        }

        let mut tx = self.ctx.db.begin().await?;

        PointsLedger::ensure_available(&mut tx, customer_id, points).await?;
        let points_balance = PointsLedger::deduct(&mut tx, customer_id, points).await?;
        let wallet_balance = WalletLedger::credit(&mut tx, customer_id, amount).await?;
        PointsRepository::insert(
            &mut tx,
            customer_id,
            None,
            PointsTransactionType::PointsToWallet,
            points,
            amount,
        )
        .await?;

        tx.commit().await?;

        info!(customer_id, points, amount = %amount, "Points converted to wallet");
        self.ctx.record(Activity::new(
            "points_converted",
            "customer",
            customer_id,
            format!("{points} points converted to {amount}"),
        ));

        Ok(PointsConversion {
            customer_id,
            points,
            amount,
            points_balance,
            wallet_balance,
        })
    }

    /// Current balance; zero for a customer who never used the wallet.
    pub async fn balance(&self, customer_id: i64) -> FulfillmentResult<Money> {
        let mut conn = self.ctx.db.pool().acquire().await?;
        PointsLedger::customer(&mut conn, customer_id).await?;
        let balance = WalletRepository::find_by_customer(&mut conn, customer_id)
            .await?
            .map(|w| w.balance)
            .unwrap_or_default();
        Ok(balance)
    }
}

/// Error for a wallet operation on an order without a customer.
pub(crate) fn customer_required(order_id: i64) -> CoreError {
    ValidationError::Conflict(format!("order {order_id} has no customer wallet")).into()
}
