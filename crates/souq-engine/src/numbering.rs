//! Next identifiers, derived from the highest number already stored for the
//! prefix and year. Callers run these on their transaction connection so
//! the read and the insert that uses the number share one unit of work.

use chrono::{DateTime, Datelike, Utc};

use souq_core::numbering::{
    next_sequence, order_number, payment_number, sequence_prefix, wallet_charge_reference,
    PAYMENT_PREFIX, WALLET_CHARGE_PREFIX,
};
use souq_core::OrderSource;
use souq_db::{Conn, DbResult, OrderRepository, PaymentRepository};

pub async fn next_order_number(
    conn: &mut Conn,
    source: OrderSource,
    now: DateTime<Utc>,
) -> DbResult<String> {
    let year = now.year();
    let last = OrderRepository::last_number(conn, &sequence_prefix(source.prefix(), year)).await?;
    Ok(order_number(source, year, next_sequence(last.as_deref())))
}

pub async fn next_payment_number(conn: &mut Conn, now: DateTime<Utc>) -> DbResult<String> {
    let year = now.year();
    let last = PaymentRepository::last_number(conn, &sequence_prefix(PAYMENT_PREFIX, year)).await?;
    Ok(payment_number(year, next_sequence(last.as_deref())))
}

pub async fn next_wallet_charge_reference(conn: &mut Conn, now: DateTime<Utc>) -> DbResult<String> {
    let year = now.year();
    let last =
        PaymentRepository::last_reference(conn, &sequence_prefix(WALLET_CHARGE_PREFIX, year)).await?;
    Ok(wallet_charge_reference(year, next_sequence(last.as_deref())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use souq_core::{DeliveryType, Money, OrderStatus, PaymentMethod};
    use souq_db::{Database, DbConfig, NewOrder};

    #[tokio::test]
    async fn test_sequences_are_per_source_and_year() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();

        assert_eq!(
            next_order_number(&mut conn, OrderSource::App, now).await.unwrap(),
            "APPS-2026-000001"
        );

        for number in ["APPS-2026-000041", "APPS-2025-000900", "WEBS-2026-000003"] {
            OrderRepository::insert(
                &mut conn,
                &NewOrder {
                    order_number: number.into(),
                    source: OrderSource::App,
                    customer_id: None,
                    charity_id: None,
                    delivery_type: DeliveryType::Pickup,
                    payment_method: PaymentMethod::Cash,
                    status: OrderStatus::Pending,
                    total_amount: Money::zero(),
                    notes: None,
                },
            )
            .await
            .unwrap();
        }

        assert_eq!(
            next_order_number(&mut conn, OrderSource::App, now).await.unwrap(),
            "APPS-2026-000042"
        );
        assert_eq!(
            next_order_number(&mut conn, OrderSource::CallCenter, now).await.unwrap(),
            "CALS-2026-000001"
        );
        assert_eq!(next_payment_number(&mut conn, now).await.unwrap(), "PAY-2026-000001");
        assert_eq!(
            next_wallet_charge_reference(&mut conn, now).await.unwrap(),
            "WCH-2026-000001"
        );
    }
}
