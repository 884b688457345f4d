//! # Commands
//!
//! Typed inputs for the order pipelines. Each command validates its own
//! shape before any transaction opens; business rules (stock, balance,
//! offer windows) are checked by the services.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use souq_core::validation::{
    validate_line_count, validate_note, validate_offer_quantity, validate_points,
    validate_quantity, ValidationResult,
};
use souq_core::{DeliveryType, OrderSource, OrderStatus, PaymentMethod, ValidationError};

/// A requested cart line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineRequest {
    pub variant_id: i64,
    pub quantity: i64,
}

/// An offer taken `quantity` times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferSelection {
    pub offer_id: i64,
    #[serde(default = "one")]
    pub quantity: i64,
}

fn one() -> i64 {
    1
}

/// Where and when to deliver. A saved `address_id` wins over `area_id`;
/// street-level fields overlay whichever was resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryDetails {
    pub address_id: Option<i64>,
    pub area_id: Option<i64>,
    pub block: Option<String>,
    pub street: Option<String>,
    pub house: Option<String>,
    pub avenue: Option<String>,
    pub directions: Option<String>,
    pub delivery_datetime: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl DeliveryDetails {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_note("delivery.notes", self.notes.as_deref())?;
        validate_note("delivery.directions", self.directions.as_deref())?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderCommand {
    #[serde(default)]
    pub source: OrderSource,
    #[serde(default)]
    pub customer_id: Option<i64>,
    #[serde(default)]
    pub charity_id: Option<i64>,
    #[serde(default)]
    pub items: Vec<OrderLineRequest>,
    #[serde(default)]
    pub offers: Vec<OfferSelection>,
    /// Loyalty points to redeem; zero for none.
    #[serde(default)]
    pub use_points: i64,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub delivery_type: DeliveryType,
    #[serde(default)]
    pub delivery: Option<DeliveryDetails>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl CreateOrderCommand {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_line_count(self.items.len(), !self.offers.is_empty())?;
        validate_lines(&self.items)?;
        validate_offers(&self.offers)?;
        validate_points(self.use_points)?;
        validate_note("notes", self.notes.as_deref())?;

        if self.customer_id.is_none() {
            if self.use_points > 0 {
                return Err(ValidationError::Conflict(
                    "points can only be redeemed on customer orders".into(),
                ));
            }
            if self.payment_method == PaymentMethod::Wallet {
                return Err(ValidationError::Conflict(
                    "wallet payment requires a customer".into(),
                ));
            }
        }

        if self.delivery_type == DeliveryType::Delivery && self.delivery.is_none() {
            return Err(ValidationError::Required {
                field: "delivery".into(),
            });
        }
        if let Some(delivery) = &self.delivery {
            delivery.validate()?;
        }
        Ok(())
    }
}

/// Partial update. `None` fields keep their stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateOrderCommand {
    /// Replaces every line when present; omitted keeps the stored lines.
    pub items: Option<Vec<OrderLineRequest>>,
    /// Replaces the attached offers. Only accepted together with `items`.
    pub offers: Option<Vec<OfferSelection>>,
    pub use_points: Option<i64>,
    pub payment_method: Option<PaymentMethod>,
    pub delivery_type: Option<DeliveryType>,
    pub delivery: Option<DeliveryDetails>,
    pub status: Option<OrderStatus>,
    pub notes: Option<String>,
}

impl UpdateOrderCommand {
    pub fn validate(&self) -> ValidationResult<()> {
        if self.offers.is_some() && self.items.is_none() {
            return Err(ValidationError::Conflict(
                "offers can only be changed together with items".into(),
            ));
        }
        if let Some(items) = &self.items {
            let has_offers = self.offers.as_ref().is_some_and(|o| !o.is_empty());
            validate_line_count(items.len(), has_offers)?;
            validate_lines(items)?;
        }
        if let Some(offers) = &self.offers {
            validate_offers(offers)?;
        }
        if let Some(points) = self.use_points {
            validate_points(points)?;
        }
        if self.status == Some(OrderStatus::Cancelled) {
            return Err(ValidationError::NotAllowed {
                field: "status".into(),
                allowed: vec!["pending".into(), "processing".into(), "completed".into()],
            });
        }
        validate_note("notes", self.notes.as_deref())?;
        if let Some(delivery) = &self.delivery {
            delivery.validate()?;
        }
        Ok(())
    }
}

fn validate_lines(lines: &[OrderLineRequest]) -> ValidationResult<()> {
    lines.iter().try_for_each(|line| validate_quantity(line.quantity))
}

fn validate_offers(offers: &[OfferSelection]) -> ValidationResult<()> {
    for selection in offers {
        validate_offer_quantity(selection.quantity)?;
    }
    let mut ids: Vec<i64> = offers.iter().map(|o| o.offer_id).collect();
    ids.sort_unstable();
    let before = ids.len();
    ids.dedup();
    if ids.len() != before {
        return Err(ValidationError::Conflict(
            "each offer may be selected once; use quantity instead".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create() -> CreateOrderCommand {
        CreateOrderCommand {
            source: OrderSource::App,
            customer_id: Some(1),
            charity_id: None,
            items: vec![OrderLineRequest { variant_id: 1, quantity: 2 }],
            offers: Vec::new(),
            use_points: 0,
            payment_method: PaymentMethod::Cash,
            delivery_type: DeliveryType::Pickup,
            delivery: None,
            notes: None,
        }
    }

    #[test]
    fn test_create_validation() {
        assert!(create().validate().is_ok());

        let mut empty = create();
        empty.items.clear();
        assert!(empty.validate().is_err());
        empty.offers.push(OfferSelection { offer_id: 3, quantity: 1 });
        assert!(empty.validate().is_ok());

        let mut charity_wallet = create();
        charity_wallet.customer_id = None;
        charity_wallet.payment_method = PaymentMethod::Wallet;
        assert!(charity_wallet.validate().is_err());

        let mut no_address = create();
        no_address.delivery_type = DeliveryType::Delivery;
        assert!(matches!(
            no_address.validate(),
            Err(ValidationError::Required { .. })
        ));
    }

    #[test]
    fn test_duplicate_offer_selection_rejected() {
        let mut cmd = create();
        cmd.offers = vec![
            OfferSelection { offer_id: 3, quantity: 1 },
            OfferSelection { offer_id: 3, quantity: 2 },
        ];
        assert!(matches!(cmd.validate(), Err(ValidationError::Conflict(_))));
    }

    #[test]
    fn test_update_validation() {
        assert!(UpdateOrderCommand::default().validate().is_ok());

        let offers_only = UpdateOrderCommand {
            offers: Some(vec![OfferSelection { offer_id: 1, quantity: 1 }]),
            ..Default::default()
        };
        assert!(offers_only.validate().is_err());

        let cancel = UpdateOrderCommand {
            status: Some(OrderStatus::Cancelled),
            ..Default::default()
        };
        assert!(cancel.validate().is_err());
    }

    #[test]
    fn test_deserialize_defaults() {
        let cmd: CreateOrderCommand = serde_json::from_str(
            r#"{"customer_id": 4, "items": [{"variant_id": 9, "quantity": 1}],
                "offers": [{"offer_id": 2}], "payment_method": "wallet"}"#,
        )
        .unwrap();
        assert_eq!(cmd.offers[0].quantity, 1);
        assert_eq!(cmd.source, OrderSource::App);
        assert_eq!(cmd.payment_method, PaymentMethod::Wallet);
    }
}
