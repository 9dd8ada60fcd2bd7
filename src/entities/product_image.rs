use async_trait::async_trait;
use chrono::Utc;
use lazy_static::lazy_static;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// One picture in a product gallery. `image` is the storage path relative to the
/// upload root, `products/{product_id}/images/{file_name}`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "product_image")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(indexed)]
    pub product_id: i32,
    #[sea_orm(unique)]
    pub image: String,
    pub extension: ImageExtension,
    pub alt_text: String,
    pub index: i32,
    pub is_active: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
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
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut image = self;
        let now = Utc::now();
        if insert && matches!(image.created_at, ActiveValue::NotSet) {
            image.created_at = Set(now);
        }
        image.updated_at = Set(now);
        Ok(image)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, EnumIter, DeriveActiveEnum, Serialize)]
#[sea_orm(
    enum_name = "image_extension",
    db_type = "String(StringLen::N(8))",
    rs_type = "String"
)]
#[serde(rename_all = "lowercase")]
pub enum ImageExtension {
    #[sea_orm(string_value = "jpg")]
    Jpg,
    #[sea_orm(string_value = "jpeg")]
    Jpeg,
    #[sea_orm(string_value = "png")]
    Png,
    #[sea_orm(string_value = "gif")]
    Gif,
    #[sea_orm(string_value = "webp")]
    Webp,
}

lazy_static! {
    static ref ALLOWED_EXTENSIONS: BTreeMap<&'static str, ImageExtension> = BTreeMap::from([
        ("gif", ImageExtension::Gif),
        ("jpeg", ImageExtension::Jpeg),
        ("jpg", ImageExtension::Jpg),
        ("png", ImageExtension::Png),
        ("webp", ImageExtension::Webp),
    ]);
}

impl ImageExtension {
    /// Extension of `file_name`, if it is one of the accepted image types.
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| ext.parse().ok())
    }

    /// Comma separated list used in validation messages.
    pub fn allowed() -> String {
        ALLOWED_EXTENSIONS
            .keys()
            .copied()
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageExtension::Jpg => "jpg",
            ImageExtension::Jpeg => "jpeg",
            ImageExtension::Png => "png",
            ImageExtension::Gif => "gif",
            ImageExtension::Webp => "webp",
        }
    }
}

impl FromStr for ImageExtension {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALLOWED_EXTENSIONS
            .get(s.to_ascii_lowercase().as_str())
            .copied()
            .ok_or(())
    }
}

impl fmt::Display for ImageExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
