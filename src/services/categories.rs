use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::info;
use validator::Validate;

use crate::entities::{category, product_category};
use crate::services::{cascade_failure, taken_column, ServiceError, ServiceResult};
use crate::slug::{first_free, slugify, SLUG_REGEX};

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct NewCategory {
    #[validate(length(min = 1, max = 20))]
    pub title: String,
    #[validate(regex(path = *SLUG_REGEX))]
    pub slug: Option<String>,
    pub description: Option<String>,
    pub parent_id: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CategoryChanges {
    #[validate(length(min = 1, max = 20))]
    pub title: Option<String>,
    #[validate(regex(path = *SLUG_REGEX))]
    pub slug: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

/// Category with its subtree, siblings ordered by title.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CategoryNode {
    pub id: i32,
    pub title: String,
    pub slug: String,
    pub children: Vec<CategoryNode>,
}

pub async fn create_category<C>(db: &C, input: NewCategory) -> ServiceResult<category::Model>
where
    C: ConnectionTrait,
{
    input.validate()?;
    ensure_title_free(db, &input.title, None).await?;
    if let Some(parent_id) = input.parent_id {
        find_category(db, parent_id).await?;
    }
    let slug = assign_slug(db, input.slug, &input.title, None).await?;

    let created = category::ActiveModel {
        title: Set(input.title),
        slug: Set(slug),
        description: Set(input.description),
        is_active: Set(input.is_active.unwrap_or(true)),
        parent_id: Set(input.parent_id),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(|err| taken_column(err, &["title", "slug"]))?;

    info!(category_id = created.id, slug = %created.slug, "category created");
    Ok(created)
}

pub async fn update_category<C>(
    db: &C,
    id: i32,
    changes: CategoryChanges,
) -> ServiceResult<category::Model>
where
    C: ConnectionTrait,
{
    changes.validate()?;
    let existing = find_category(db, id).await?;
    let mut active: category::ActiveModel = existing.into();

    if let Some(title) = changes.title {
        ensure_title_free(db, &title, Some(id)).await?;
        active.title = Set(title);
    }
    if let Some(slug) = changes.slug {
        ensure_slug_free(db, &slug, Some(id)).await?;
        active.slug = Set(slug);
    }
    if let Some(description) = changes.description {
        active.description = Set(Some(description));
    }
    if let Some(is_active) = changes.is_active {
        active.is_active = Set(is_active);
    }

    active
        .update(db)
        .await
        .map_err(|err| taken_column(err, &["title", "slug"]))
}

/// Moves `id` under `parent_id`, or to the root when `parent_id` is `None`.
///
/// Rejects moves that would make a category its own ancestor.
pub async fn reparent_category<C>(
    db: &C,
    id: i32,
    parent_id: Option<i32>,
) -> ServiceResult<category::Model>
where
    C: ConnectionTrait,
{
    let existing = find_category(db, id).await?;

    if let Some(parent_id) = parent_id {
        find_category(db, parent_id).await?;
        let parents = parent_links(db).await?;
        if creates_cycle(&parents, id, parent_id) {
            return Err(ServiceError::validation(
                "parent_id",
                format!("category {parent_id} is {id} itself or one of its descendants"),
            ));
        }
    }

    let mut active: category::ActiveModel = existing.into();
    active.parent_id = Set(parent_id);
    let updated = active.update(db).await?;
    info!(category_id = id, parent_id = ?parent_id, "category moved");
    Ok(updated)
}

/// Deletes a category. Direct children become roots; their own children are untouched.
/// Returns the number of orphaned children.
pub async fn delete_category<C>(db: &C, id: i32) -> ServiceResult<u64>
where
    C: ConnectionTrait,
{
    let existing = find_category(db, id).await?;

    let orphaned = category::Entity::update_many()
        .col_expr(category::Column::ParentId, Expr::value(Option::<i32>::None))
        .filter(category::Column::ParentId.eq(id))
        .exec(db)
        .await
        .map_err(cascade_failure("orphan children"))?
        .rows_affected;

    product_category::Entity::delete_many()
        .filter(product_category::Column::CategoryId.eq(id))
        .exec(db)
        .await
        .map_err(cascade_failure("unlink products"))?;

    category::Entity::delete_by_id(existing.id)
        .exec(db)
        .await
        .map_err(cascade_failure("delete category"))?;

    info!(category_id = id, orphaned, "category deleted");
    Ok(orphaned)
}

pub async fn get_category<C>(db: &C, id: i32, active_only: bool) -> ServiceResult<category::Model>
where
    C: ConnectionTrait,
{
    let found = find_category(db, id).await?;
    if active_only && !found.is_active {
        return Err(ServiceError::not_found("category", id));
    }
    Ok(found)
}

pub async fn list_categories<C>(db: &C, active_only: bool) -> ServiceResult<Vec<category::Model>>
where
    C: ConnectionTrait,
{
    let mut query = category::Entity::find().order_by_asc(category::Column::Title);
    if active_only {
        query = query.filter(category::Column::IsActive.eq(true));
    }
    Ok(query.all(db).await?)
}

/// Direct children of `id`, ordered by title.
pub async fn list_children<C>(
    db: &C,
    id: i32,
    active_only: bool,
) -> ServiceResult<Vec<category::Model>>
where
    C: ConnectionTrait,
{
    get_category(db, id, active_only).await?;
    let mut query = category::Entity::find()
        .filter(category::Column::ParentId.eq(id))
        .order_by_asc(category::Column::Title);
    if active_only {
        query = query.filter(category::Column::IsActive.eq(true));
    }
    Ok(query.all(db).await?)
}

/// Active categories as a forest. An inactive category hides its whole subtree.
pub async fn category_tree<C>(db: &C) -> ServiceResult<Vec<CategoryNode>>
where
    C: ConnectionTrait,
{
    let categories = list_categories(db, true).await?;
    Ok(build_tree(&categories))
}

pub(crate) async fn find_category<C>(db: &C, id: i32) -> ServiceResult<category::Model>
where
    C: ConnectionTrait,
{
    category::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::not_found("category", id))
}

async fn ensure_title_free<C>(db: &C, title: &str, exclude: Option<i32>) -> ServiceResult<()>
where
    C: ConnectionTrait,
{
    let mut query = category::Entity::find().filter(category::Column::Title.eq(title));
    if let Some(id) = exclude {
        query = query.filter(category::Column::Id.ne(id));
    }
    if query.one(db).await?.is_some() {
        return Err(ServiceError::validation(
            "title",
            format!("category '{title}' already exists"),
        ));
    }
    Ok(())
}

async fn ensure_slug_free<C>(db: &C, slug: &str, exclude: Option<i32>) -> ServiceResult<()>
where
    C: ConnectionTrait,
{
    let mut query = category::Entity::find().filter(category::Column::Slug.eq(slug));
    if let Some(id) = exclude {
        query = query.filter(category::Column::Id.ne(id));
    }
    if query.one(db).await?.is_some() {
        return Err(ServiceError::validation(
            "slug",
            format!("slug '{slug}' is already in use"),
        ));
    }
    Ok(())
}

/// A client supplied slug must be free; a derived one gets the first free numeric suffix.
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
    let taken: HashSet<String> = category::Entity::find()
        .select_only()
        .column(category::Column::Slug)
        .filter(category::Column::Slug.starts_with(base.as_str()))
        .into_tuple::<String>()
        .all(db)
        .await?
        .into_iter()
        .collect();
    Ok(first_free(&base, &taken))
}

async fn parent_links<C>(db: &C) -> ServiceResult<HashMap<i32, Option<i32>>>
where
    C: ConnectionTrait,
{
    let links: Vec<(i32, Option<i32>)> = category::Entity::find()
        .select_only()
        .column(category::Column::Id)
        .column(category::Column::ParentId)
        .into_tuple()
        .all(db)
        .await?;
    Ok(links.into_iter().collect())
}

/// Whether hanging `node` under `new_parent` closes a loop. The walk is bounded by the
/// number of categories, so corrupt data cannot make it spin.
fn creates_cycle(parents: &HashMap<i32, Option<i32>>, node: i32, new_parent: i32) -> bool {
    let mut cursor = Some(new_parent);
    for _ in 0..=parents.len() {
        match cursor {
            Some(current) if current == node => return true,
            Some(current) => cursor = parents.get(&current).copied().flatten(),
            None => return false,
        }
    }
    true
}

fn build_tree(categories: &[category::Model]) -> Vec<CategoryNode> {
    let mut children_by_parent: HashMap<Option<i32>, Vec<&category::Model>> = HashMap::new();
    for category in categories {
        children_by_parent
            .entry(category.parent_id)
            .or_default()
            .push(category);
    }
    for children in children_by_parent.values_mut() {
        children.sort_by(|a, b| a.title.cmp(&b.title));
    }

    fn build_branch(
        parent_id: Option<i32>,
        grouped: &HashMap<Option<i32>, Vec<&category::Model>>,
        depth_left: usize,
    ) -> Vec<CategoryNode> {
        if depth_left == 0 {
            return Vec::new();
        }
        grouped
            .get(&parent_id)
            .map(|children| {
                children
                    .iter()
                    .map(|category| CategoryNode {
                        id: category.id,
                        title: category.title.clone(),
                        slug: category.slug.clone(),
                        children: build_branch(Some(category.id), grouped, depth_left - 1),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    build_branch(None, &children_by_parent, categories.len())
}
