use sea_orm::entity::prelude::*;
use serde::Serialize;

/// A named axis of product variation, e.g. "Color".
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "option_group")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub title: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub is_active: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl Related<super::option_value::Entity> for Entity {
    fn to() -> RelationDef {
        super::option_value::Relation::OptionGroup.def().rev()
    }
}

impl Related<super::option_attribute::Entity> for Entity {
    fn to() -> RelationDef {
        super::option_attribute::Relation::OptionGroup.def().rev()
    }
}

impl ActiveModelBehavior for ActiveModel {}
