use chrono::{DateTime, Utc};
use diesel::{
    Selectable,
    prelude::{Identifiable, Insertable, Queryable},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

// Accounts

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, ToSchema)]
#[diesel(table_name = crate::schema::patients)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PatientEntity {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub contact: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub user_role: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Insertable, Deserialize, Debug)]
#[diesel(table_name = crate::schema::patients)]
pub struct CreatePatientEntity {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub contact: String,
    pub password_hash: String,
    pub user_role: i32,
}

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, ToSchema)]
#[diesel(table_name = crate::schema::hospitals)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct HospitalEntity {
    pub id: i32,
    pub name: String,
    pub government_id: String,
    pub email: String,
    pub contact: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Insertable, Deserialize, Debug)]
#[diesel(table_name = crate::schema::hospitals)]
pub struct CreateHospitalEntity {
    pub name: String,
    pub government_id: String,
    pub email: String,
    pub contact: String,
    pub password_hash: String,
}

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, ToSchema)]
#[diesel(table_name = crate::schema::pharmacies)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PharmacyEntity {
    pub id: i32,
    pub name: String,
    pub government_id: String,
    pub email: String,
    pub contact: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Insertable, Deserialize, Debug)]
#[diesel(table_name = crate::schema::pharmacies)]
pub struct CreatePharmacyEntity {
    pub name: String,
    pub government_id: String,
    pub email: String,
    pub contact: String,
    pub password_hash: String,
}

// Carts

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::cart_items)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CartItemEntity {
    pub id: i32,
    pub patient_id: i32,
    pub prescription_id: i32,
    pub prescription_medicine_id: i32,
    pub quantity: i32,
    pub unit_price_minor: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Deserialize, Debug)]
#[diesel(table_name = crate::schema::cart_items)]
pub struct CreateCartItemEntity {
    pub patient_id: i32,
    pub prescription_id: i32,
    pub prescription_medicine_id: i32,
    pub quantity: i32,
    pub unit_price_minor: i64,
}

// Orders

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, ToSchema)]
#[diesel(table_name = crate::schema::orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderEntity {
    pub id: i32,
    pub patient_id: i32,
    pub reference: String,
    pub status: String,
    pub total_minor: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::orders)]
pub struct CreateOrderEntity {
    pub patient_id: i32,
    pub reference: String,
    pub status: String,
    pub total_minor: i64,
}

#[derive(Queryable, Selectable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::order_details)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderDetailEntity {
    pub id: i32,
    pub order_id: i32,
    pub prescription_id: i32,
    pub prescription_medicine_id: i32,
    pub quantity: i32,
    pub unit_price_minor: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::order_details)]
pub struct CreateOrderDetailEntity {
    pub order_id: i32,
    pub prescription_id: i32,
    pub prescription_medicine_id: i32,
    pub quantity: i32,
    pub unit_price_minor: i64,
}

/// Order lifecycle. Stored as text but validated against this set on every
/// transition; free-text statuses are rejected at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Pending,
    Paid,
    Fulfilled,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Paid => "PAID",
            OrderStatus::Fulfilled => "FULFILLED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Some(OrderStatus::Pending),
            "PAID" => Some(OrderStatus::Paid),
            "FULFILLED" => Some(OrderStatus::Fulfilled),
            "CANCELLED" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    /// PENDING -> PAID | CANCELLED, PAID -> FULFILLED | CANCELLED;
    /// FULFILLED and CANCELLED are terminal.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Paid)
                | (OrderStatus::Pending, OrderStatus::Cancelled)
                | (OrderStatus::Paid, OrderStatus::Fulfilled)
                | (OrderStatus::Paid, OrderStatus::Cancelled)
        )
    }
}

// Payments

#[derive(Queryable, Selectable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::payments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PaymentEntity {
    pub id: Uuid,
    pub prescription_id: i32,
    pub patient_id: i32,
    pub amount_minor: i64,
    pub currency: String,
    pub method: String,
    pub transaction_ref: String,
    pub authorization_code: Option<String>,
    pub channel: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::payments)]
pub struct CreatePaymentEntity {
    pub prescription_id: i32,
    pub patient_id: i32,
    pub amount_minor: i64,
    pub currency: String,
    pub method: String,
    pub transaction_ref: String,
    pub authorization_code: Option<String>,
    pub channel: Option<String>,
    pub status: String,
}

/// Settlement status of a recorded gateway payment. Only a PENDING record
/// may move; a settled outcome is never rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Success => "SUCCESS",
            PaymentStatus::Failed => "FAILED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Some(PaymentStatus::Pending),
            "SUCCESS" => Some(PaymentStatus::Success),
            "FAILED" => Some(PaymentStatus::Failed),
            _ => None,
        }
    }

    pub fn can_transition_to(self, next: PaymentStatus) -> bool {
        matches!(
            (self, next),
            (PaymentStatus::Pending, PaymentStatus::Success)
                | (PaymentStatus::Pending, PaymentStatus::Failed)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_status_parses_known_values_only() {
        assert_eq!(OrderStatus::parse("pending"), Some(OrderStatus::Pending));
        assert_eq!(OrderStatus::parse(" PAID "), Some(OrderStatus::Paid));
        assert_eq!(OrderStatus::parse("shipped"), None);
        assert_eq!(OrderStatus::parse(""), None);
    }

    #[test]
    fn order_status_transitions_follow_the_lifecycle() {
        use OrderStatus::*;
        assert!(Pending.can_transition_to(Paid));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Paid.can_transition_to(Fulfilled));
        assert!(Paid.can_transition_to(Cancelled));

        assert!(!Pending.can_transition_to(Fulfilled));
        assert!(!Paid.can_transition_to(Pending));
        assert!(!Fulfilled.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Pending));
    }

    #[test]
    fn payment_status_never_moves_backward() {
        use PaymentStatus::*;
        assert!(Pending.can_transition_to(Success));
        assert!(Pending.can_transition_to(Failed));

        assert!(!Success.can_transition_to(Pending));
        assert!(!Success.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Success));
        assert!(!Failed.can_transition_to(Pending));
    }

    #[test]
    fn payment_status_round_trips_through_text() {
        for status in [
            PaymentStatus::Pending,
            PaymentStatus::Success,
            PaymentStatus::Failed,
        ] {
            assert_eq!(PaymentStatus::parse(status.as_str()), Some(status));
        }
    }
}
