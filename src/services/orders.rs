use crate::{
    db::DbPool,
    entities::{
        order::{self, Entity as OrderEntity, Model as OrderModel},
        order_item::{self, Entity as OrderItemEntity},
    },
    errors::ServiceError,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub order_number: String,
    pub customer_id: Uuid,
    pub status: String,
    pub order_date: DateTime<Utc>,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub total_amount: Decimal,
    pub currency: String,
    pub payment_status: String,
    pub payment_method: Option<String>,
    pub coupon_code: Option<String>,
    pub billing_address: Option<String>,
    pub items: Vec<order_item::Model>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub version: i32,
}

/// Read-side service for orders created by checkout
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
}

impl OrderService {
    /// Creates a new order service instance
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Retrieves an order with its line-item snapshot
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<Option<OrderResponse>, ServiceError> {
        let db = &*self.db_pool;

        let Some(order_model) = OrderEntity::find_by_id(order_id).one(db).await? else {
            info!(order_id = %order_id, "Order not found");
            return Ok(None);
        };

        let items = OrderItemEntity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .order_by_asc(order_item::Column::CreatedAt)
            .all(db)
            .await?;

        Ok(Some(Self::model_to_response(order_model, items)))
    }

    /// Converts an order model plus items to response format
    fn model_to_response(model: OrderModel, items: Vec<order_item::Model>) -> OrderResponse {
        OrderResponse {
            id: model.id,
            order_number: model.order_number,
            customer_id: model.customer_id,
            status: model.status,
            order_date: model.order_date,
            subtotal: model.subtotal,
            discount: model.discount,
            total_amount: model.total_amount,
            currency: model.currency,
            payment_status: model.payment_status,
            payment_method: model.payment_method,
            coupon_code: model.coupon_code,
            billing_address: model.billing_address,
            items,
            created_at: model.created_at,
            updated_at: model.updated_at,
            version: model.version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_model_to_response_conversion() {
        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let customer_id = Uuid::new_v4();

        let model = OrderModel {
            id: order_id,
            order_number: "ORD-A1B2C3D4".to_string(),
            customer_id,
            status: "confirmed".to_string(),
            order_date: now,
            subtotal: Decimal::from_str("99.99").unwrap(),
            discount: Decimal::from_str("10.00").unwrap(),
            total_amount: Decimal::from_str("89.99").unwrap(),
            currency: "USD".to_string(),
            payment_status: "paid".to_string(),
            payment_method: Some("stripe".to_string()),
            coupon_code: Some("TENOFF".to_string()),
            billing_address: None,
            created_at: now,
            updated_at: Some(now),
            version: 2,
        };

        let response = OrderService::model_to_response(model, Vec::new());

        assert_eq!(response.id, order_id);
        assert_eq!(response.customer_id, customer_id);
        assert_eq!(response.order_number, "ORD-A1B2C3D4");
        assert_eq!(response.status, "confirmed");
        assert_eq!(response.discount, Decimal::from_str("10.00").unwrap());
        assert_eq!(response.total_amount, Decimal::from_str("89.99").unwrap());
        assert!(response.items.is_empty());
    }
}
