use sea_orm::entity::prelude::*;
use serde::Serialize;

/// One concrete value of an option group. `(value, option_group_id)` is unique,
/// see `setup_schema`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "option_value")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub value: String,
    pub is_active: bool,
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
