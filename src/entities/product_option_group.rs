use sea_orm::entity::prelude::*;
use serde::Serialize;

/// Attaches an option group to a product. Unique per `(product_id, option_group_id)`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "product_option_group")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(indexed)]
    pub product_id: i32,
    #[sea_orm(indexed)]
    pub option_group_id: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Product,
    #[sea_orm(
        belongs_to = "super::option_group::Entity",
        from = "Column::OptionGroupId",
        to = "super::option_group::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    OptionGroup,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl Related<super::option_group::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OptionGroup.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
