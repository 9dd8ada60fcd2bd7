pub mod category;
pub mod option_attribute;
pub mod option_group;
pub mod option_value;
pub mod product;
pub mod product_attribute_value;
pub mod product_category;
pub mod product_image;
pub mod product_option_group;

use sea_orm::sea_query::{Index, IndexCreateStatement};
use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, Schema};
use tracing::info;

/// Creates every catalog table and the composite unique indexes. Safe to run on an
/// already initialised database.
pub async fn setup_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    create_table(db, category::Entity).await?;
    create_table(db, option_group::Entity).await?;
    create_table(db, option_value::Entity).await?;
    create_table(db, option_attribute::Entity).await?;
    create_table(db, product::Entity).await?;
    create_table(db, product_category::Entity).await?;
    create_table(db, product_option_group::Entity).await?;
    create_table(db, product_attribute_value::Entity).await?;
    create_table(db, product_image::Entity).await?;

    let unique_indexes = [
        Index::create()
            .name("ux_option_value_group_value")
            .table(option_value::Entity)
            .col(option_value::Column::OptionGroupId)
            .col(option_value::Column::Value)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("ux_option_attribute_group_title")
            .table(option_attribute::Entity)
            .col(option_attribute::Column::OptionGroupId)
            .col(option_attribute::Column::Title)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("ux_product_category_pair")
            .table(product_category::Entity)
            .col(product_category::Column::ProductId)
            .col(product_category::Column::CategoryId)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("ux_product_option_group_pair")
            .table(product_option_group::Entity)
            .col(product_option_group::Column::ProductId)
            .col(product_option_group::Column::OptionGroupId)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("ux_product_attribute_value_pair")
            .table(product_attribute_value::Entity)
            .col(product_attribute_value::Column::ProductId)
            .col(product_attribute_value::Column::OptionValueId)
            .unique()
            .if_not_exists()
            .to_owned(),
    ];

    for index in unique_indexes.iter() {
        create_index(db, index).await?;
    }

    info!("catalog schema is ready");
    Ok(())
}

async fn create_table<E>(db: &DatabaseConnection, entity: E) -> Result<(), DbErr>
where
    E: EntityTrait,
{
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(backend.build(&statement)).await?;
    Ok(())
}

async fn create_index(db: &DatabaseConnection, index: &IndexCreateStatement) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    db.execute(backend.build(index)).await?;
    Ok(())
}
