use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::str::FromStr;
use tracing::{debug, info};
use validator::Validate;

use crate::entities::{
    category, option_group, option_value, product, product_attribute_value, product_category,
    product_image, product_option_group,
};
use crate::pricing;
use crate::services::categories;
use crate::services::images::{self, ImageView};
use crate::services::options::{find_group, find_value};
use crate::services::{
    cascade_failure, taken_column, unique_violation, ServiceError, ServiceResult,
};
use crate::slug::{first_free, slugify, SLUG_REGEX};

/// Payload for a new product. A `final_price` sent by a client is ignored; the stored
/// value is always computed on save.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct NewProduct {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(regex(path = *SLUG_REGEX))]
    pub slug: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub discount: Option<Decimal>,
    #[validate(range(min = 0))]
    pub stock: Option<i32>,
    pub is_active: Option<bool>,
    #[serde(default)]
    pub categories: Vec<i32>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ProductChanges {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    #[validate(regex(path = *SLUG_REGEX))]
    pub slug: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub discount: Option<Decimal>,
    #[validate(range(min = 0))]
    pub stock: Option<i32>,
    pub is_active: Option<bool>,
    /// Replaces the whole category set when present.
    pub categories: Option<Vec<i32>>,
}

#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub category: Option<i32>,
    pub min: Option<Decimal>,
    pub max: Option<Decimal>,
    pub in_stock: Option<bool>,
}

impl ProductFilter {
    /// Reads the filter from raw query parameters. Unknown parameters are ignored; a value
    /// that does not parse is a validation error on that parameter.
    pub fn from_query(params: &HashMap<String, String>) -> ServiceResult<Self> {
        Ok(ProductFilter {
            category: query_param(params, "category")?,
            min: query_param(params, "min")?,
            max: query_param(params, "max")?,
            in_stock: query_param(params, "in_stock")?,
        })
    }
}

fn query_param<T: FromStr>(params: &HashMap<String, String>, name: &str) -> ServiceResult<Option<T>> {
    params
        .get(name)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|_| ServiceError::validation(name, format!("'{raw}' is not a valid value")))
        })
        .transpose()
}

/// List entry: enough to render a product card.
#[derive(Debug, Clone, Serialize)]
pub struct ProductSummary {
    pub id: i32,
    pub title: String,
    pub slug: String,
    pub final_price: Decimal,
    pub has_stock: bool,
    pub is_active: bool,
    pub primary_image: Option<ImageView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OptionGroupRef {
    pub id: i32,
    pub title: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttributeValueRef {
    pub id: i32,
    pub value: String,
    pub option_group_id: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductDetail {
    pub id: i32,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub price: Decimal,
    pub discount: Decimal,
    pub final_price: Decimal,
    pub stock: i32,
    pub has_stock: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Category titles, alphabetically.
    pub categories: Vec<String>,
    pub images: Vec<ImageView>,
    pub option_groups: Vec<OptionGroupRef>,
    pub attribute_values: Vec<AttributeValueRef>,
}

pub async fn create_product<C>(db: &C, input: NewProduct) -> ServiceResult<product::Model>
where
    C: ConnectionTrait,
{
    input.validate()?;
    let price_cents = pricing::price_to_cents("price", input.price.unwrap_or(Decimal::ZERO))?;
    let discount = pricing::discount_to_hundredths(input.discount.unwrap_or(Decimal::ZERO))?;
    let category_ids = existing_categories(db, &input.categories).await?;
    let slug = assign_slug(db, input.slug, &input.title, None).await?;

    let created = product::ActiveModel {
        title: Set(input.title),
        slug: Set(slug),
        description: Set(input.description.unwrap_or_default()),
        price_cents: Set(price_cents),
        discount_hundredths: Set(discount),
        stock: Set(input.stock.unwrap_or(0)),
        is_active: Set(input.is_active.unwrap_or(true)),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(|err| taken_column(err, &["slug"]))?;

    link_categories(db, created.id, &category_ids).await?;

    info!(
        product_id = created.id,
        slug = %created.slug,
        final_price = %created.final_price(),
        "product created"
    );
    Ok(created)
}

/// Applies `changes` and saves. The final price is recomputed on every update, also when
/// neither price nor discount changed.
pub async fn update_product<C>(
    db: &C,
    id: i32,
    changes: ProductChanges,
) -> ServiceResult<product::Model>
where
    C: ConnectionTrait,
{
    changes.validate()?;
    let existing = find_product(db, id).await?;
    let mut active: product::ActiveModel = existing.into();

    if let Some(title) = changes.title {
        active.title = Set(title);
    }
    if let Some(slug) = changes.slug {
        ensure_slug_free(db, &slug, Some(id)).await?;
        active.slug = Set(slug);
    }
    if let Some(description) = changes.description {
        active.description = Set(description);
    }
    if let Some(price) = changes.price {
        active.price_cents = Set(pricing::price_to_cents("price", price)?);
    }
    if let Some(discount) = changes.discount {
        active.discount_hundredths = Set(pricing::discount_to_hundredths(discount)?);
    }
    if let Some(stock) = changes.stock {
        active.stock = Set(stock);
    }
    if let Some(is_active) = changes.is_active {
        active.is_active = Set(is_active);
    }

    let category_ids = match changes.categories {
        Some(ids) => Some(existing_categories(db, &ids).await?),
        None => None,
    };

    let updated = active
        .update(db)
        .await
        .map_err(|err| taken_column(err, &["slug"]))?;

    if let Some(category_ids) = category_ids {
        product_category::Entity::delete_many()
            .filter(product_category::Column::ProductId.eq(id))
            .exec(db)
            .await?;
        link_categories(db, id, &category_ids).await?;
    }

    debug!(product_id = id, final_price = %updated.final_price(), "product updated");
    Ok(updated)
}

/// Deletes a product with its images, attribute values, option group links and category
/// links. Returns the storage paths of the removed images so the caller can drop the
/// files once the transaction is committed.
pub async fn delete_product<C>(db: &C, id: i32) -> ServiceResult<Vec<String>>
where
    C: ConnectionTrait,
{
    let existing = find_product(db, id).await?;

    let image_paths: Vec<String> = product_image::Entity::find()
        .filter(product_image::Column::ProductId.eq(id))
        .all(db)
        .await
        .map_err(cascade_failure("load images"))?
        .into_iter()
        .map(|image| image.image)
        .collect();

    product_image::Entity::delete_many()
        .filter(product_image::Column::ProductId.eq(id))
        .exec(db)
        .await
        .map_err(cascade_failure("delete images"))?;

    let attribute_values = product_attribute_value::Entity::delete_many()
        .filter(product_attribute_value::Column::ProductId.eq(id))
        .exec(db)
        .await
        .map_err(cascade_failure("delete attribute values"))?
        .rows_affected;

    product_option_group::Entity::delete_many()
        .filter(product_option_group::Column::ProductId.eq(id))
        .exec(db)
        .await
        .map_err(cascade_failure("unlink option groups"))?;

    product_category::Entity::delete_many()
        .filter(product_category::Column::ProductId.eq(id))
        .exec(db)
        .await
        .map_err(cascade_failure("unlink categories"))?;

    existing
        .delete(db)
        .await
        .map_err(cascade_failure("delete product"))?;

    info!(
        product_id = id,
        images = image_paths.len(),
        attribute_values,
        "product deleted"
    );
    Ok(image_paths)
}

pub async fn attach_option_group<C>(
    db: &C,
    product_id: i32,
    option_group_id: i32,
) -> ServiceResult<product_option_group::Model>
where
    C: ConnectionTrait,
{
    find_product(db, product_id).await?;
    find_group(db, option_group_id).await?;

    let message =
        format!("option group {option_group_id} is already attached to product {product_id}");
    let existing = product_option_group::Entity::find()
        .filter(product_option_group::Column::ProductId.eq(product_id))
        .filter(product_option_group::Column::OptionGroupId.eq(option_group_id))
        .one(db)
        .await?;
    if existing.is_some() {
        return Err(ServiceError::conflict(&["product", "option_group"], message));
    }

    Ok(product_option_group::ActiveModel {
        product_id: Set(product_id),
        option_group_id: Set(option_group_id),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(|err| unique_violation(err, &["product", "option_group"], &message))?)
}

pub async fn detach_option_group<C>(
    db: &C,
    product_id: i32,
    option_group_id: i32,
) -> ServiceResult<()>
where
    C: ConnectionTrait,
{
    find_product(db, product_id).await?;
    let deleted = product_option_group::Entity::delete_many()
        .filter(product_option_group::Column::ProductId.eq(product_id))
        .filter(product_option_group::Column::OptionGroupId.eq(option_group_id))
        .exec(db)
        .await?
        .rows_affected;
    if deleted == 0 {
        return Err(ServiceError::not_found("product option group", option_group_id));
    }
    Ok(())
}

/// Records `option_value_id` as chosen for the product. Whether the value's group is
/// attached to the product is not checked.
pub async fn set_attribute_value<C>(
    db: &C,
    product_id: i32,
    option_value_id: i32,
) -> ServiceResult<product_attribute_value::Model>
where
    C: ConnectionTrait,
{
    find_product(db, product_id).await?;
    find_value(db, option_value_id).await?;

    let message = format!("option value {option_value_id} is already set on product {product_id}");
    let existing = product_attribute_value::Entity::find()
        .filter(product_attribute_value::Column::ProductId.eq(product_id))
        .filter(product_attribute_value::Column::OptionValueId.eq(option_value_id))
        .one(db)
        .await?;
    if existing.is_some() {
        return Err(ServiceError::conflict(&["product", "option_value"], message));
    }

    Ok(product_attribute_value::ActiveModel {
        product_id: Set(product_id),
        option_value_id: Set(option_value_id),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(|err| unique_violation(err, &["product", "option_value"], &message))?)
}

pub async fn remove_attribute_value<C>(
    db: &C,
    product_id: i32,
    option_value_id: i32,
) -> ServiceResult<()>
where
    C: ConnectionTrait,
{
    find_product(db, product_id).await?;
    let deleted = product_attribute_value::Entity::delete_many()
        .filter(product_attribute_value::Column::ProductId.eq(product_id))
        .filter(product_attribute_value::Column::OptionValueId.eq(option_value_id))
        .exec(db)
        .await?
        .rows_affected;
    if deleted == 0 {
        return Err(ServiceError::not_found("product attribute value", option_value_id));
    }
    Ok(())
}

pub async fn list_products<C>(
    db: &C,
    filter: ProductFilter,
    active_only: bool,
) -> ServiceResult<Vec<ProductSummary>>
where
    C: ConnectionTrait,
{
    let mut query = product::Entity::find().order_by_asc(product::Column::Id);
    if active_only {
        query = query.filter(product::Column::IsActive.eq(true));
    }
    if let Some(category_id) = filter.category {
        // A hidden category cannot be browsed into.
        categories::get_category(db, category_id, active_only).await?;
        let product_ids: Vec<i32> = product_category::Entity::find()
            .select_only()
            .column(product_category::Column::ProductId)
            .filter(product_category::Column::CategoryId.eq(category_id))
            .into_tuple()
            .all(db)
            .await?;
        query = query.filter(product::Column::Id.is_in(product_ids));
    }
    if let Some(min) = filter.min {
        let min = pricing::price_to_cents("min", min)?;
        query = query.filter(product::Column::FinalPriceCents.gte(min));
    }
    if let Some(max) = filter.max {
        let max = pricing::price_to_cents("max", max)?;
        query = query.filter(product::Column::FinalPriceCents.lte(max));
    }
    match filter.in_stock {
        Some(true) => query = query.filter(product::Column::Stock.gt(0)),
        Some(false) => query = query.filter(product::Column::Stock.lte(0)),
        None => {}
    }

    let products = query.all(db).await?;
    let ids: Vec<i32> = products.iter().map(|product| product.id).collect();

    let mut galleries: HashMap<i32, Vec<product_image::Model>> = HashMap::new();
    for image in product_image::Entity::find()
        .filter(product_image::Column::ProductId.is_in(ids))
        .filter(product_image::Column::IsActive.eq(true))
        .all(db)
        .await?
    {
        galleries.entry(image.product_id).or_default().push(image);
    }

    Ok(products
        .into_iter()
        .map(|product| {
            let primary_image = galleries
                .get(&product.id)
                .and_then(|gallery| images::primary_of(gallery))
                .map(ImageView::from);
            ProductSummary {
                id: product.id,
                final_price: product.final_price(),
                has_stock: product.has_stock(),
                is_active: product.is_active,
                title: product.title,
                slug: product.slug,
                primary_image,
            }
        })
        .collect())
}

/// Full product representation. With `active_only` the product itself must be active and
/// inactive images, categories, groups and values are left out.
pub async fn product_detail<C>(db: &C, id: i32, active_only: bool) -> ServiceResult<ProductDetail>
where
    C: ConnectionTrait,
{
    let product = find_product(db, id).await?;
    if active_only && !product.is_active {
        return Err(ServiceError::not_found("product", id));
    }

    let mut categories_query = product
        .find_related(category::Entity)
        .order_by_asc(category::Column::Title);
    if active_only {
        categories_query = categories_query.filter(category::Column::IsActive.eq(true));
    }
    let categories = categories_query
        .all(db)
        .await?
        .into_iter()
        .map(|category| category.title)
        .collect();

    let images = images::gallery(db, id, active_only)
        .await?
        .into_iter()
        .map(ImageView::from)
        .collect();

    let group_ids: Vec<i32> = product_option_group::Entity::find()
        .select_only()
        .column(product_option_group::Column::OptionGroupId)
        .filter(product_option_group::Column::ProductId.eq(id))
        .into_tuple()
        .all(db)
        .await?;
    let mut groups_query = option_group::Entity::find()
        .filter(option_group::Column::Id.is_in(group_ids))
        .order_by_asc(option_group::Column::Title);
    if active_only {
        groups_query = groups_query.filter(option_group::Column::IsActive.eq(true));
    }
    let option_groups = groups_query
        .all(db)
        .await?
        .into_iter()
        .map(|group| OptionGroupRef {
            id: group.id,
            title: group.title,
        })
        .collect();

    let value_ids: Vec<i32> = product_attribute_value::Entity::find()
        .select_only()
        .column(product_attribute_value::Column::OptionValueId)
        .filter(product_attribute_value::Column::ProductId.eq(id))
        .into_tuple()
        .all(db)
        .await?;
    let mut values_query = option_value::Entity::find()
        .filter(option_value::Column::Id.is_in(value_ids))
        .order_by_asc(option_value::Column::OptionGroupId)
        .order_by_asc(option_value::Column::Id);
    if active_only {
        // A hidden group hides its values too.
        values_query = values_query
            .filter(option_value::Column::IsActive.eq(true))
            .inner_join(option_group::Entity)
            .filter(option_group::Column::IsActive.eq(true));
    }
    let attribute_values = values_query
        .all(db)
        .await?
        .into_iter()
        .map(|value| AttributeValueRef {
            id: value.id,
            value: value.value,
            option_group_id: value.option_group_id,
        })
        .collect();

    Ok(ProductDetail {
        id: product.id,
        price: product.price(),
        discount: product.discount(),
        final_price: product.final_price(),
        has_stock: product.has_stock(),
        title: product.title,
        slug: product.slug,
        description: product.description,
        stock: product.stock,
        is_active: product.is_active,
        created_at: product.created_at,
        updated_at: product.updated_at,
        categories,
        images,
        option_groups,
        attribute_values,
    })
}

pub(crate) async fn find_product<C>(db: &C, id: i32) -> ServiceResult<product::Model>
where
    C: ConnectionTrait,
{
    product::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::not_found("product", id))
}

/// De-duplicated, sorted category ids; the first unknown id is reported as not found.
async fn existing_categories<C>(db: &C, requested: &[i32]) -> ServiceResult<Vec<i32>>
where
    C: ConnectionTrait,
{
    let wanted: BTreeSet<i32> = requested.iter().copied().collect();
    if wanted.is_empty() {
        return Ok(Vec::new());
    }
    let found: HashSet<i32> = category::Entity::find()
        .select_only()
        .column(category::Column::Id)
        .filter(category::Column::Id.is_in(wanted.iter().copied()))
        .into_tuple::<i32>()
        .all(db)
        .await?
        .into_iter()
        .collect();
    if let Some(missing) = wanted.iter().find(|id| !found.contains(*id)) {
        return Err(ServiceError::not_found("category", *missing));
    }
    Ok(wanted.into_iter().collect())
}

async fn link_categories<C>(db: &C, product_id: i32, category_ids: &[i32]) -> ServiceResult<()>
where
    C: ConnectionTrait,
{
    if category_ids.is_empty() {
        return Ok(());
    }
    let links = category_ids
        .iter()
        .map(|&category_id| product_category::ActiveModel {
            product_id: Set(product_id),
            category_id: Set(category_id),
            ..Default::default()
        });
    product_category::Entity::insert_many(links).exec(db).await?;
    Ok(())
}

async fn ensure_slug_free<C>(db: &C, slug: &str, exclude: Option<i32>) -> ServiceResult<()>
where
    C: ConnectionTrait,
{
    let mut query = product::Entity::find().filter(product::Column::Slug.eq(slug));
    if let Some(id) = exclude {
        query = query.filter(product::Column::Id.ne(id));
    }
    if query.one(db).await?.is_some() {
        return Err(ServiceError::validation(
            "slug",
            format!("slug '{slug}' is already in use"),
        ));
    }
    Ok(())
}

async fn assign_slug<C>(
    db: &C,
    requested: Option<String>,
    title: &str,
    exclude: Option<i32>,
) -> ServiceResult<String>
where
    C: ConnectionTrait,
{
    if let Some(slug) = requested {
        ensure_slug_free(db, &slug, exclude).await?;
        return Ok(slug);
    }

    let base = slugify(title);
    if base.is_empty() {
        return Err(ServiceError::validation(
            "title",
            "must contain at least one latin letter or digit",
        ));
    }
    let taken: HashSet<String> = product::Entity::find()
        .select_only()
        .column(product::Column::Slug)
        .filter(product::Column::Slug.starts_with(base.as_str()))
        .into_tuple::<String>()
        .all(db)
        .await?
        .into_iter()
        .collect();
    Ok(first_free(&base, &taken))
}
