use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};

use crate::pricing;

/// A sellable catalog entry.
///
/// Money is kept in minor units (`price_cents`, `final_price_cents`) and the discount in
/// hundredths of a percent, so every stored amount is an exact fixed-point number.
/// `final_price_cents` is owned by [`ActiveModelBehavior::before_save`] and rewritten on
/// every insert and update.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "product")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    #[sea_orm(unique)]
    pub slug: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub price_cents: i64,
    pub discount_hundredths: i32,
    pub final_price_cents: i64,
    pub stock: i32,
    pub is_active: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl Model {
    pub fn price(&self) -> Decimal {
        pricing::from_cents(self.price_cents)
    }

    pub fn discount(&self) -> Decimal {
        pricing::from_hundredths(self.discount_hundredths)
    }

    pub fn final_price(&self) -> Decimal {
        pricing::from_cents(self.final_price_cents)
    }

    pub fn has_stock(&self) -> bool {
        self.stock > 0
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        super::product_category::Relation::Category.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::product_category::Relation::Product.def().rev())
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut product = self;

        // Recomputed from whatever price/discount this write carries, changed or not.
        let price = current(&product.price_cents)
            .ok_or_else(|| DbErr::Custom("product price must be set before saving".to_owned()))?;
        let discount = current(&product.discount_hundredths).unwrap_or(0);
        product.final_price_cents = Set(pricing::final_price_cents(price, discount));

        let now = Utc::now();
        if insert && current_is_unset(&product.created_at) {
            product.created_at = Set(now);
        }
        product.updated_at = Set(now);

        Ok(product)
    }
}

fn current<V>(value: &ActiveValue<V>) -> Option<V>
where
    V: Into<Value> + Copy,
{
    match value {
        ActiveValue::Set(v) | ActiveValue::Unchanged(v) => Some(*v),
        ActiveValue::NotSet => None,
    }
}

fn current_is_unset<V>(value: &ActiveValue<V>) -> bool
where
    V: Into<Value>,
{
    matches!(value, ActiveValue::NotSet)
}
