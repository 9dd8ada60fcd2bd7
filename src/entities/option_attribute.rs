use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "option_attribute")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    #[sea_orm(indexed)]
    pub option_group_id: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::option_group::Entity",
        from = "Column::OptionGroupId",
        to = "super::option_group::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    OptionGroup,
}

impl Related<super::option_group::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OptionGroup.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
