use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;
use validator::Validate;

use crate::entities::{
    option_attribute, option_group, option_value, product_attribute_value, product_option_group,
};
use crate::services::{cascade_failure, unique_violation, ServiceError, ServiceResult};

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct NewOptionGroup {
    #[validate(length(min = 1, max = 100))]
    pub title: String,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct OptionGroupChanges {
    #[validate(length(min = 1, max = 100))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct NewOptionValue {
    #[validate(length(min = 1, max = 100))]
    pub value: String,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct NewOptionAttribute {
    #[validate(length(min = 1, max = 100))]
    pub title: String,
}

/// An option group together with the values and attributes it owns.
#[derive(Debug, Clone, Serialize)]
pub struct OptionGroupView {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub values: Vec<option_value::Model>,
    pub attributes: Vec<option_attribute::Model>,
}

pub async fn create_group<C>(db: &C, input: NewOptionGroup) -> ServiceResult<option_group::Model>
where
    C: ConnectionTrait,
{
    input.validate()?;
    ensure_group_title_free(db, &input.title, None).await?;

    let created = option_group::ActiveModel {
        title: Set(input.title),
        description: Set(input.description),
        is_active: Set(input.is_active.unwrap_or(true)),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(option_group_id = created.id, title = %created.title, "option group created");
    Ok(created)
}

pub async fn update_group<C>(
    db: &C,
    id: i32,
    changes: OptionGroupChanges,
) -> ServiceResult<option_group::Model>
where
    C: ConnectionTrait,
{
    changes.validate()?;
    let existing = find_group(db, id).await?;
    let mut active: option_group::ActiveModel = existing.into();

    if let Some(title) = changes.title {
        ensure_group_title_free(db, &title, Some(id)).await?;
        active.title = Set(title);
    }
    if let Some(description) = changes.description {
        active.description = Set(Some(description));
    }
    if let Some(is_active) = changes.is_active {
        active.is_active = Set(is_active);
    }

    Ok(active.update(db).await?)
}

/// Hides the group from the storefront. Product associations are kept.
pub async fn deactivate_group<C>(db: &C, id: i32) -> ServiceResult<option_group::Model>
where
    C: ConnectionTrait,
{
    let existing = find_group(db, id).await?;
    let mut active: option_group::ActiveModel = existing.into();
    active.is_active = Set(false);
    Ok(active.update(db).await?)
}

pub async fn add_value<C>(
    db: &C,
    group_id: i32,
    input: NewOptionValue,
) -> ServiceResult<option_value::Model>
where
    C: ConnectionTrait,
{
    input.validate()?;
    find_group(db, group_id).await?;

    let duplicate = option_value::Entity::find()
        .filter(option_value::Column::OptionGroupId.eq(group_id))
        .filter(option_value::Column::Value.eq(input.value.as_str()))
        .one(db)
        .await?;
    if duplicate.is_some() {
        return Err(duplicate_value(&input.value, group_id));
    }

    let message = duplicate_value(&input.value, group_id).to_string();
    let created = option_value::ActiveModel {
        value: Set(input.value),
        is_active: Set(input.is_active.unwrap_or(true)),
        option_group_id: Set(group_id),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(|err| unique_violation(err, &["value", "option_group"], &message))?;

    info!(option_value_id = created.id, option_group_id = group_id, "option value added");
    Ok(created)
}

/// Hides the value from the storefront. Products that already chose it keep it.
pub async fn deactivate_value<C>(db: &C, id: i32) -> ServiceResult<option_value::Model>
where
    C: ConnectionTrait,
{
    let existing = find_value(db, id).await?;
    let mut active: option_value::ActiveModel = existing.into();
    active.is_active = Set(false);
    Ok(active.update(db).await?)
}

pub async fn add_attribute<C>(
    db: &C,
    group_id: i32,
    input: NewOptionAttribute,
) -> ServiceResult<option_attribute::Model>
where
    C: ConnectionTrait,
{
    input.validate()?;
    find_group(db, group_id).await?;

    let message = format!(
        "attribute '{}' already exists in option group {group_id}",
        input.title
    );
    let duplicate = option_attribute::Entity::find()
        .filter(option_attribute::Column::OptionGroupId.eq(group_id))
        .filter(option_attribute::Column::Title.eq(input.title.as_str()))
        .one(db)
        .await?;
    if duplicate.is_some() {
        return Err(ServiceError::conflict(&["title", "option_group"], message));
    }

    Ok(option_attribute::ActiveModel {
        title: Set(input.title),
        option_group_id: Set(group_id),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(|err| unique_violation(err, &["title", "option_group"], &message))?)
}

/// Deletes a group with its values, attributes and every product association that
/// points at the group or one of its values.
pub async fn delete_group<C>(db: &C, id: i32) -> ServiceResult<()>
where
    C: ConnectionTrait,
{
    let group = find_group(db, id).await?;

    let value_ids: Vec<i32> = option_value::Entity::find()
        .filter(option_value::Column::OptionGroupId.eq(id))
        .all(db)
        .await
        .map_err(cascade_failure("load option values"))?
        .into_iter()
        .map(|value| value.id)
        .collect();

    let unlinked_values = product_attribute_value::Entity::delete_many()
        .filter(product_attribute_value::Column::OptionValueId.is_in(value_ids.clone()))
        .exec(db)
        .await
        .map_err(cascade_failure("unlink product attribute values"))?
        .rows_affected;

    let unlinked_products = product_option_group::Entity::delete_many()
        .filter(product_option_group::Column::OptionGroupId.eq(id))
        .exec(db)
        .await
        .map_err(cascade_failure("unlink product option groups"))?
        .rows_affected;

    option_value::Entity::delete_many()
        .filter(option_value::Column::OptionGroupId.eq(id))
        .exec(db)
        .await
        .map_err(cascade_failure("delete option values"))?;

    option_attribute::Entity::delete_many()
        .filter(option_attribute::Column::OptionGroupId.eq(id))
        .exec(db)
        .await
        .map_err(cascade_failure("delete option attributes"))?;

    option_group::Entity::delete_by_id(group.id)
        .exec(db)
        .await
        .map_err(cascade_failure("delete option group"))?;

    info!(
        option_group_id = id,
        values = value_ids.len(),
        unlinked_values,
        unlinked_products,
        "option group deleted"
    );
    Ok(())
}

pub async fn get_group<C>(db: &C, id: i32, active_only: bool) -> ServiceResult<OptionGroupView>
where
    C: ConnectionTrait,
{
    let group = find_group(db, id).await?;
    if active_only && !group.is_active {
        return Err(ServiceError::not_found("option group", id));
    }
    let mut views = attach_children(db, vec![group], active_only).await?;
    views
        .pop()
        .ok_or_else(|| ServiceError::not_found("option group", id))
}

/// Groups ordered by title. The storefront view drops inactive groups and values.
pub async fn list_groups<C>(db: &C, active_only: bool) -> ServiceResult<Vec<OptionGroupView>>
where
    C: ConnectionTrait,
{
    let mut query = option_group::Entity::find().order_by_asc(option_group::Column::Title);
    if active_only {
        query = query.filter(option_group::Column::IsActive.eq(true));
    }
    let groups = query.all(db).await?;
    attach_children(db, groups, active_only).await
}

pub(crate) async fn find_group<C>(db: &C, id: i32) -> ServiceResult<option_group::Model>
where
    C: ConnectionTrait,
{
    option_group::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::not_found("option group", id))
}

pub(crate) async fn find_value<C>(db: &C, id: i32) -> ServiceResult<option_value::Model>
where
    C: ConnectionTrait,
{
    option_value::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::not_found("option value", id))
}

fn duplicate_value(value: &str, group_id: i32) -> ServiceError {
    ServiceError::conflict(
        &["value", "option_group"],
        format!("value '{value}' already exists in option group {group_id}"),
    )
}

async fn ensure_group_title_free<C>(db: &C, title: &str, exclude: Option<i32>) -> ServiceResult<()>
where
    C: ConnectionTrait,
{
    let mut query = option_group::Entity::find().filter(option_group::Column::Title.eq(title));
    if let Some(id) = exclude {
        query = query.filter(option_group::Column::Id.ne(id));
    }
    if query.one(db).await?.is_some() {
        return Err(ServiceError::validation(
            "title",
            format!("option group '{title}' already exists"),
        ));
    }
    Ok(())
}

async fn attach_children<C>(
    db: &C,
    groups: Vec<option_group::Model>,
    active_only: bool,
) -> ServiceResult<Vec<OptionGroupView>>
where
    C: ConnectionTrait,
{
    let ids: Vec<i32> = groups.iter().map(|group| group.id).collect();

    let mut values_query = option_value::Entity::find()
        .filter(option_value::Column::OptionGroupId.is_in(ids.clone()))
        .order_by_asc(option_value::Column::Id);
    if active_only {
        values_query = values_query.filter(option_value::Column::IsActive.eq(true));
    }
    let mut values: HashMap<i32, Vec<option_value::Model>> = HashMap::new();
    for value in values_query.all(db).await? {
        values.entry(value.option_group_id).or_default().push(value);
    }

    let mut attributes: HashMap<i32, Vec<option_attribute::Model>> = HashMap::new();
    for attribute in option_attribute::Entity::find()
        .filter(option_attribute::Column::OptionGroupId.is_in(ids))
        .order_by_asc(option_attribute::Column::Title)
        .all(db)
        .await?
    {
        attributes
            .entry(attribute.option_group_id)
            .or_default()
            .push(attribute);
    }

    Ok(groups
        .into_iter()
        .map(|group| OptionGroupView {
            values: values.remove(&group.id).unwrap_or_default(),
            attributes: attributes.remove(&group.id).unwrap_or_default(),
            id: group.id,
            title: group.title,
            description: group.description,
            is_active: group.is_active,
        })
        .collect())
}
