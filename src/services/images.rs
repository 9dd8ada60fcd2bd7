use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};
use validator::Validate;

use crate::entities::product_image::{self, ImageExtension};
use crate::services::products::find_product;
use crate::services::{ServiceError, ServiceResult};
use crate::storage::ImageStore;

/// An uploaded file waiting to become a gallery entry.
#[derive(Debug, Clone, Validate)]
pub struct NewImage {
    pub product_id: i32,
    pub file_name: String,
    pub bytes: Vec<u8>,
    #[validate(range(min = 0))]
    pub index: i32,
    #[validate(length(max = 255))]
    pub alt_text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageOrder {
    pub image_ids: Vec<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageView {
    pub id: i32,
    pub product_id: i32,
    pub image: String,
    pub url: String,
    pub alt_text: String,
    pub index: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<product_image::Model> for ImageView {
    fn from(model: product_image::Model) -> Self {
        ImageView {
            url: format!("/api/product-image/{}/file", model.id),
            id: model.id,
            product_id: model.product_id,
            image: model.image,
            alt_text: model.alt_text,
            index: model.index,
            is_active: model.is_active,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

impl From<&product_image::Model> for ImageView {
    fn from(model: &product_image::Model) -> Self {
        ImageView::from(model.clone())
    }
}

/// Stores the file and records it in the product's gallery.
///
/// The row is inserted before the file is written; if writing fails the caller's
/// transaction is dropped and nothing is kept.
pub async fn add_image<C>(
    db: &C,
    store: &ImageStore,
    input: NewImage,
) -> ServiceResult<product_image::Model>
where
    C: ConnectionTrait,
{
    input.validate()?;
    find_product(db, input.product_id).await?;

    let extension = ImageExtension::from_file_name(&input.file_name).ok_or_else(|| {
        ServiceError::validation(
            "image",
            format!(
                "unsupported file extension, allowed: {}",
                ImageExtension::allowed()
            ),
        )
    })?;
    if input.bytes.is_empty() {
        return Err(ServiceError::validation("image", "file is empty"));
    }
    if input.bytes.len() > store.max_bytes() {
        return Err(ServiceError::validation(
            "image",
            format!("file is larger than {} bytes", store.max_bytes()),
        ));
    }

    let path = store.image_path(input.product_id, &input.file_name, extension);
    let created = product_image::ActiveModel {
        product_id: Set(input.product_id),
        image: Set(path.clone()),
        extension: Set(extension),
        alt_text: Set(input.alt_text.unwrap_or_default()),
        index: Set(input.index),
        is_active: Set(true),
        ..Default::default()
    }
    .insert(db)
    .await?;

    store
        .write(&path, &input.bytes)
        .await
        .map_err(|err| ServiceError::Storage(format!("{path}: {err}")))?;

    info!(
        image_id = created.id,
        product_id = created.product_id,
        index = created.index,
        path = %created.image,
        "product image stored"
    );
    Ok(created)
}

/// Gives every listed image the index of its position in `ordered_ids`. Images of the
/// product that are not listed keep their index.
///
/// A partial list can therefore leave two images at the same index. Pass the whole gallery
/// to get a clean `0..n` numbering; when index 0 ends up shared the product has no primary
/// image until it is resolved.
pub async fn reorder<C>(
    db: &C,
    product_id: i32,
    ordered_ids: &[i32],
) -> ServiceResult<Vec<product_image::Model>>
where
    C: ConnectionTrait,
{
    find_product(db, product_id).await?;

    let mut seen = HashSet::new();
    if let Some(repeated) = ordered_ids.iter().find(|id| !seen.insert(**id)) {
        return Err(ServiceError::validation(
            "image_ids",
            format!("image {repeated} is listed more than once"),
        ));
    }

    let mut by_id: HashMap<i32, product_image::Model> = gallery(db, product_id, false)
        .await?
        .into_iter()
        .map(|image| (image.id, image))
        .collect();
    if let Some(foreign) = ordered_ids.iter().find(|id| !by_id.contains_key(*id)) {
        return Err(ServiceError::validation(
            "image_ids",
            format!("image {foreign} does not belong to product {product_id}"),
        ));
    }

    for (position, id) in ordered_ids.iter().enumerate() {
        if let Some(image) = by_id.remove(id) {
            let position = i32::try_from(position)
                .map_err(|_| ServiceError::validation("image_ids", "too many images"))?;
            if image.index == position {
                continue;
            }
            let mut active: product_image::ActiveModel = image.into();
            active.index = Set(position);
            active.update(db).await?;
        }
    }

    gallery(db, product_id, false).await
}

/// Hides the image from the storefront without deleting it.
pub async fn deactivate<C>(db: &C, id: i32) -> ServiceResult<product_image::Model>
where
    C: ConnectionTrait,
{
    let image = find_image(db, id).await?;
    let mut active: product_image::ActiveModel = image.into();
    active.is_active = Set(false);
    Ok(active.update(db).await?)
}

/// Removes the gallery entry and returns it; the caller drops the file after commit.
pub async fn delete_image<C>(db: &C, id: i32) -> ServiceResult<product_image::Model>
where
    C: ConnectionTrait,
{
    let image = find_image(db, id).await?;
    product_image::Entity::delete_by_id(id).exec(db).await?;
    info!(image_id = id, product_id = image.product_id, "product image deleted");
    Ok(image)
}

pub async fn get_image<C>(db: &C, id: i32, active_only: bool) -> ServiceResult<product_image::Model>
where
    C: ConnectionTrait,
{
    let image = find_image(db, id).await?;
    if active_only && !image.is_active {
        return Err(ServiceError::not_found("product image", id));
    }
    Ok(image)
}

/// Gallery of an existing product, see [`gallery`].
pub async fn list_images<C>(
    db: &C,
    product_id: i32,
    active_only: bool,
) -> ServiceResult<Vec<product_image::Model>>
where
    C: ConnectionTrait,
{
    let product = find_product(db, product_id).await?;
    if active_only && !product.is_active {
        return Err(ServiceError::not_found("product", product_id));
    }
    gallery(db, product_id, active_only).await
}

/// The active image at index 0, or `None` when there is none or more than one.
pub async fn primary_image<C>(db: &C, product_id: i32) -> ServiceResult<Option<product_image::Model>>
where
    C: ConnectionTrait,
{
    find_product(db, product_id).await?;
    let images = gallery(db, product_id, true).await?;
    Ok(primary_of(&images).cloned())
}

/// Index 0 is the primary image by convention only, so an ambiguous gallery has none.
pub fn primary_of(images: &[product_image::Model]) -> Option<&product_image::Model> {
    let mut at_zero = images.iter().filter(|image| image.index == 0);
    match (at_zero.next(), at_zero.next()) {
        (Some(primary), None) => Some(primary),
        (Some(primary), Some(_)) => {
            warn!(
                product_id = primary.product_id,
                "several images share index 0, no primary image"
            );
            None
        }
        _ => None,
    }
}

/// Images ordered by index, ties by insertion order.
pub(crate) async fn gallery<C>(
    db: &C,
    product_id: i32,
    active_only: bool,
) -> ServiceResult<Vec<product_image::Model>>
where
    C: ConnectionTrait,
{
    let mut query = product_image::Entity::find()
        .filter(product_image::Column::ProductId.eq(product_id))
        .order_by_asc(product_image::Column::Index)
        .order_by_asc(product_image::Column::Id);
    if active_only {
        query = query.filter(product_image::Column::IsActive.eq(true));
    }
    Ok(query.all(db).await?)
}

async fn find_image<C>(db: &C, id: i32) -> ServiceResult<product_image::Model>
where
    C: ConnectionTrait,
{
    product_image::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::not_found("product image", id))
}
