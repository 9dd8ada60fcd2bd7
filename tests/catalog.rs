mod common;

use rust_decimal::Decimal;
use sea_orm::{EntityTrait, PaginatorTrait, TransactionTrait};
use std::str::FromStr;

use common::TestEnv;
use shop_catalog::entities::{
    category, option_value, product_attribute_value, product_image, product_option_group,
};
use shop_catalog::services::categories::{self, NewCategory};
use shop_catalog::services::images::{self, NewImage};
use shop_catalog::services::options::{self, NewOptionGroup, NewOptionValue};
use shop_catalog::services::products::{self, NewProduct, ProductChanges, ProductFilter};
use shop_catalog::services::ServiceError;
use shop_catalog::storage::ImageStore;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn category(title: &str) -> NewCategory {
    NewCategory {
        title: title.to_string(),
        ..Default::default()
    }
}

fn product(title: &str, price: &str, discount: &str) -> NewProduct {
    NewProduct {
        title: title.to_string(),
        price: Some(dec(price)),
        discount: Some(dec(discount)),
        stock: Some(3),
        ..Default::default()
    }
}

fn png(product_id: i32, index: i32) -> NewImage {
    NewImage {
        product_id,
        file_name: format!("shot-{index}.png"),
        bytes: vec![0x89, b'P', b'N', b'G'],
        index,
        alt_text: None,
    }
}

#[tokio::test]
async fn widget_final_price_follows_discount() {
    let env = TestEnv::new().await;

    let widget = products::create_product(&env.db, product("Widget", "100.00", "10"))
        .await
        .unwrap();
    assert_eq!(widget.final_price(), dec("90.00"));

    let updated = products::update_product(
        &env.db,
        widget.id,
        ProductChanges {
            discount: Some(Decimal::ZERO),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(updated.final_price(), dec("100.00"));
}

#[tokio::test]
async fn resaving_keeps_final_price() {
    let env = TestEnv::new().await;

    let created = products::create_product(&env.db, product("Lamp", "19.99", "15"))
        .await
        .unwrap();
    assert_eq!(created.final_price(), dec("16.99"));

    let resaved = products::update_product(&env.db, created.id, ProductChanges::default())
        .await
        .unwrap();
    assert_eq!(resaved.final_price_cents, created.final_price_cents);
}

#[tokio::test]
async fn invalid_money_is_rejected() {
    let env = TestEnv::new().await;

    let err = products::create_product(&env.db, product("Cheap", "1.005", "0"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "validation");
    assert_eq!(err.fields(), vec!["price".to_string()]);

    let err = products::create_product(&env.db, product("Generous", "10.00", "120"))
        .await
        .unwrap_err();
    assert_eq!(err.fields(), vec!["discount".to_string()]);

    let err = products::create_product(&env.db, product("Huge", "100000000.00", "0"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "validation");
}

#[tokio::test]
async fn derived_slugs_get_a_suffix() {
    let env = TestEnv::new().await;

    let first = categories::create_category(&env.db, category("Electronics"))
        .await
        .unwrap();
    let second = categories::create_category(&env.db, category("Electronics!!"))
        .await
        .unwrap();
    assert_eq!(first.slug, "electronics");
    assert_eq!(second.slug, "electronics-2");

    let taken = categories::create_category(
        &env.db,
        NewCategory {
            title: "Gadgets".to_string(),
            slug: Some("electronics".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert_eq!(taken.fields(), vec!["slug".to_string()]);

    let empty = categories::create_category(&env.db, category("!!!"))
        .await
        .unwrap_err();
    assert_eq!(empty.kind(), "validation");
}

#[tokio::test]
async fn duplicate_category_title_is_rejected() {
    let env = TestEnv::new().await;

    categories::create_category(&env.db, category("Books")).await.unwrap();
    let err = categories::create_category(&env.db, category("Books"))
        .await
        .unwrap_err();
    assert_eq!(err.fields(), vec!["title".to_string()]);
    assert_eq!(category::Entity::find().count(&env.db).await.unwrap(), 1);
}

#[tokio::test]
async fn deleting_a_category_orphans_its_children() {
    let env = TestEnv::new().await;

    let root = categories::create_category(&env.db, category("Home")).await.unwrap();
    let mut children = Vec::new();
    for title in ["Kitchen", "Garden", "Bath"] {
        let child = categories::create_category(
            &env.db,
            NewCategory {
                title: title.to_string(),
                parent_id: Some(root.id),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        children.push(child.id);
    }

    let txn = env.db.begin().await.unwrap();
    let orphaned = categories::delete_category(&txn, root.id).await.unwrap();
    txn.commit().await.unwrap();
    assert_eq!(orphaned, 3);

    for id in children {
        let child = categories::get_category(&env.db, id, false).await.unwrap();
        assert_eq!(child.parent_id, None);
    }
    assert!(matches!(
        categories::get_category(&env.db, root.id, false).await,
        Err(ServiceError::NotFound { .. })
    ));
}

#[tokio::test]
async fn reparenting_cannot_create_a_cycle() {
    let env = TestEnv::new().await;

    let a = categories::create_category(&env.db, category("A")).await.unwrap();
    let b = categories::create_category(
        &env.db,
        NewCategory {
            title: "B".to_string(),
            parent_id: Some(a.id),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let err = categories::reparent_category(&env.db, a.id, Some(b.id))
        .await
        .unwrap_err();
    assert_eq!(err.fields(), vec!["parent_id".to_string()]);

    let err = categories::reparent_category(&env.db, a.id, Some(a.id))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "validation");

    let moved = categories::reparent_category(&env.db, b.id, None).await.unwrap();
    assert_eq!(moved.parent_id, None);
}

#[tokio::test]
async fn category_tree_hides_inactive_subtrees() {
    let env = TestEnv::new().await;

    let shop = categories::create_category(&env.db, category("Shop")).await.unwrap();
    let hidden = categories::create_category(
        &env.db,
        NewCategory {
            title: "Hidden".to_string(),
            parent_id: Some(shop.id),
            is_active: Some(false),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    categories::create_category(
        &env.db,
        NewCategory {
            title: "Below hidden".to_string(),
            parent_id: Some(hidden.id),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let tree = categories::category_tree(&env.db).await.unwrap();
    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0].title, "Shop");
    assert!(tree[0].children.is_empty());
}

#[tokio::test]
async fn duplicate_option_value_conflicts() {
    let env = TestEnv::new().await;

    let size = options::create_group(
        &env.db,
        NewOptionGroup {
            title: "Size".to_string(),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let value = NewOptionValue {
        value: "XL".to_string(),
        is_active: None,
    };
    options::add_value(&env.db, size.id, value.clone()).await.unwrap();

    let err = options::add_value(&env.db, size.id, value).await.unwrap_err();
    assert!(matches!(err, ServiceError::Conflict { .. }));
    assert_eq!(
        err.fields(),
        vec!["value".to_string(), "option_group".to_string()]
    );
    assert_eq!(option_value::Entity::find().count(&env.db).await.unwrap(), 1);
}

#[tokio::test]
async fn gallery_is_ordered_and_has_a_primary_image() {
    let env = TestEnv::new().await;
    let store = ImageStore::new(env.upload_dir(), 1024);

    let chair = products::create_product(&env.db, product("Chair", "40.00", "0"))
        .await
        .unwrap();
    let mut ids = Vec::new();
    for index in [2, 0, 1] {
        let image = images::add_image(&env.db, &store, png(chair.id, index))
            .await
            .unwrap();
        assert!(store.absolute(&image.image).exists());
        ids.push(image.id);
    }

    let gallery = images::list_images(&env.db, chair.id, true).await.unwrap();
    let order: Vec<i32> = gallery.iter().map(|image| image.index).collect();
    assert_eq!(order, vec![0, 1, 2]);

    let primary = images::primary_image(&env.db, chair.id).await.unwrap().unwrap();
    assert_eq!(primary.id, ids[1]);

    // Move the index-2 image to the front.
    let reordered = images::reorder(&env.db, chair.id, &[ids[0], ids[1], ids[2]])
        .await
        .unwrap();
    assert_eq!(reordered[0].id, ids[0]);
    assert_eq!(reordered[0].index, 0);

    images::deactivate(&env.db, ids[0]).await.unwrap();
    assert!(images::primary_image(&env.db, chair.id).await.unwrap().is_none());
    let visible = images::list_images(&env.db, chair.id, true).await.unwrap();
    assert_eq!(visible.len(), 2);
}

#[tokio::test]
async fn reorder_rejects_foreign_and_repeated_ids() {
    let env = TestEnv::new().await;
    let store = ImageStore::new(env.upload_dir(), 1024);

    let a = products::create_product(&env.db, product("A", "1.00", "0")).await.unwrap();
    let b = products::create_product(&env.db, product("B", "1.00", "0")).await.unwrap();
    let own = images::add_image(&env.db, &store, png(a.id, 0)).await.unwrap();
    let foreign = images::add_image(&env.db, &store, png(b.id, 0)).await.unwrap();

    let err = images::reorder(&env.db, a.id, &[own.id, foreign.id])
        .await
        .unwrap_err();
    assert_eq!(err.fields(), vec!["image_ids".to_string()]);

    let err = images::reorder(&env.db, a.id, &[own.id, own.id])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "validation");
}

#[tokio::test]
async fn uploads_are_checked_before_storing() {
    let env = TestEnv::new().await;
    let store = ImageStore::new(env.upload_dir(), 8);

    let lamp = products::create_product(&env.db, product("Lamp", "5.00", "0"))
        .await
        .unwrap();

    let mut wrong_type = png(lamp.id, 0);
    wrong_type.file_name = "notes.txt".to_string();
    let err = images::add_image(&env.db, &store, wrong_type).await.unwrap_err();
    assert_eq!(err.fields(), vec!["image".to_string()]);

    let mut too_big = png(lamp.id, 0);
    too_big.bytes = vec![0; 9];
    assert!(images::add_image(&env.db, &store, too_big).await.is_err());

    let err = images::add_image(&env.db, &store, png(9_999, 0)).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound { .. }));

    assert_eq!(product_image::Entity::find().count(&env.db).await.unwrap(), 0);
}

#[tokio::test]
async fn deleting_a_product_cascades_in_one_transaction() {
    let env = TestEnv::new().await;
    let store = ImageStore::new(env.upload_dir(), 1024);

    let furniture = categories::create_category(&env.db, category("Furniture"))
        .await
        .unwrap();
    let mut input = product("Desk", "250.00", "5");
    input.categories = vec![furniture.id];
    let desk = products::create_product(&env.db, input).await.unwrap();

    let colour = options::create_group(
        &env.db,
        NewOptionGroup {
            title: "Colour".to_string(),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    products::attach_option_group(&env.db, desk.id, colour.id).await.unwrap();
    for value in ["Oak", "Walnut", "White"] {
        let value = options::add_value(
            &env.db,
            colour.id,
            NewOptionValue {
                value: value.to_string(),
                is_active: None,
            },
        )
        .await
        .unwrap();
        products::set_attribute_value(&env.db, desk.id, value.id).await.unwrap();
    }
    images::add_image(&env.db, &store, png(desk.id, 0)).await.unwrap();
    images::add_image(&env.db, &store, png(desk.id, 1)).await.unwrap();

    let txn = env.db.begin().await.unwrap();
    let paths = products::delete_product(&txn, desk.id).await.unwrap();
    txn.commit().await.unwrap();

    assert_eq!(paths.len(), 2);
    assert_eq!(product_image::Entity::find().count(&env.db).await.unwrap(), 0);
    assert_eq!(
        product_attribute_value::Entity::find()
            .count(&env.db)
            .await
            .unwrap(),
        0
    );
    assert!(categories::get_category(&env.db, furniture.id, false).await.is_ok());
    assert!(options::get_group(&env.db, colour.id, false).await.is_ok());
    assert_eq!(option_value::Entity::find().count(&env.db).await.unwrap(), 3);
}

#[tokio::test]
async fn rolled_back_delete_keeps_everything() {
    let env = TestEnv::new().await;

    let kept = products::create_product(&env.db, product("Kept", "3.00", "0"))
        .await
        .unwrap();

    {
        let txn = env.db.begin().await.unwrap();
        products::delete_product(&txn, kept.id).await.unwrap();
        txn.rollback().await.unwrap();
    }

    assert!(products::product_detail(&env.db, kept.id, false).await.is_ok());
}

#[tokio::test]
async fn product_listing_filters_by_price_and_category() {
    let env = TestEnv::new().await;

    let toys = categories::create_category(&env.db, category("Toys")).await.unwrap();
    let mut ball = product("Ball", "10.00", "50");
    ball.categories = vec![toys.id];
    products::create_product(&env.db, ball).await.unwrap();
    products::create_product(&env.db, product("Kite", "30.00", "0")).await.unwrap();
    let mut hidden = product("Hidden", "1.00", "0");
    hidden.is_active = Some(false);
    products::create_product(&env.db, hidden).await.unwrap();

    let cheap = products::list_products(
        &env.db,
        ProductFilter {
            max: Some(dec("5.00")),
            ..Default::default()
        },
        true,
    )
    .await
    .unwrap();
    let titles: Vec<&str> = cheap.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, vec!["Ball"]);
    assert_eq!(cheap[0].final_price, dec("5.00"));

    let in_toys = products::list_products(
        &env.db,
        ProductFilter {
            category: Some(toys.id),
            ..Default::default()
        },
        true,
    )
    .await
    .unwrap();
    assert_eq!(in_toys.len(), 1);

    let everything = products::list_products(&env.db, ProductFilter::default(), false)
        .await
        .unwrap();
    assert_eq!(everything.len(), 3);

    let detail = products::product_detail(&env.db, in_toys[0].id, true).await.unwrap();
    assert_eq!(detail.categories, vec!["Toys".to_string()]);
}

#[tokio::test]
async fn deleting_an_option_group_unlinks_products() {
    let env = TestEnv::new().await;

    let shirt = products::create_product(&env.db, product("Shirt", "20.00", "0"))
        .await
        .unwrap();
    let size = options::create_group(
        &env.db,
        NewOptionGroup {
            title: "Size".to_string(),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let m = options::add_value(
        &env.db,
        size.id,
        NewOptionValue {
            value: "M".to_string(),
            is_active: None,
        },
    )
    .await
    .unwrap();
    products::attach_option_group(&env.db, shirt.id, size.id).await.unwrap();
    products::set_attribute_value(&env.db, shirt.id, m.id).await.unwrap();

    options::delete_group(&env.db, size.id).await.unwrap();

    let detail = products::product_detail(&env.db, shirt.id, false).await.unwrap();
    assert!(detail.option_groups.is_empty());
    assert!(detail.attribute_values.is_empty());
}

async fn group_with_value(env: &TestEnv, title: &str, value: &str) -> (i32, i32) {
    let group = options::create_group(
        &env.db,
        NewOptionGroup {
            title: title.to_string(),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let value = options::add_value(
        &env.db,
        group.id,
        NewOptionValue {
            value: value.to_string(),
            is_active: None,
        },
    )
    .await
    .unwrap();
    (group.id, value.id)
}

#[tokio::test]
async fn storefront_detail_hides_values_of_inactive_groups() {
    let env = TestEnv::new().await;

    let shoe = products::create_product(&env.db, product("Shoe", "60.00", "0"))
        .await
        .unwrap();
    let (colour, red) = group_with_value(&env, "Colour", "Red").await;
    let (size, forty_two) = group_with_value(&env, "Size", "42").await;
    for group in [colour, size] {
        products::attach_option_group(&env.db, shoe.id, group).await.unwrap();
    }
    for value in [red, forty_two] {
        products::set_attribute_value(&env.db, shoe.id, value).await.unwrap();
    }

    options::deactivate_group(&env.db, colour).await.unwrap();

    let storefront = products::product_detail(&env.db, shoe.id, true).await.unwrap();
    let groups: Vec<i32> = storefront.option_groups.iter().map(|g| g.id).collect();
    let values: Vec<i32> = storefront.attribute_values.iter().map(|v| v.id).collect();
    assert_eq!(groups, vec![size]);
    assert_eq!(values, vec![forty_two]);

    let admin = products::product_detail(&env.db, shoe.id, false).await.unwrap();
    assert_eq!(admin.option_groups.len(), 2);
    assert_eq!(admin.attribute_values.len(), 2);
}

#[tokio::test]
async fn duplicate_product_links_conflict() {
    let env = TestEnv::new().await;

    let bag = products::create_product(&env.db, product("Bag", "30.00", "0"))
        .await
        .unwrap();
    let (colour, black) = group_with_value(&env, "Colour", "Black").await;

    products::attach_option_group(&env.db, bag.id, colour).await.unwrap();
    let err = products::attach_option_group(&env.db, bag.id, colour)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict { .. }));
    assert_eq!(
        product_option_group::Entity::find().count(&env.db).await.unwrap(),
        1
    );

    products::set_attribute_value(&env.db, bag.id, black).await.unwrap();
    let err = products::set_attribute_value(&env.db, bag.id, black)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict { .. }));
    assert_eq!(
        product_attribute_value::Entity::find()
            .count(&env.db)
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn product_links_to_unknown_ids_are_not_found() {
    let env = TestEnv::new().await;

    let bag = products::create_product(&env.db, product("Bag", "30.00", "0"))
        .await
        .unwrap();
    let (colour, black) = group_with_value(&env, "Colour", "Black").await;

    let missing = [
        products::attach_option_group(&env.db, bag.id, 9_999).await.err(),
        products::attach_option_group(&env.db, 9_999, colour).await.err(),
        products::set_attribute_value(&env.db, bag.id, 9_999).await.err(),
        products::set_attribute_value(&env.db, 9_999, black).await.err(),
    ];
    for err in missing {
        assert!(matches!(err, Some(ServiceError::NotFound { .. })), "{err:?}");
    }
    assert_eq!(
        product_option_group::Entity::find().count(&env.db).await.unwrap(),
        0
    );
}

#[tokio::test]
async fn deactivated_value_is_hidden_but_kept() {
    let env = TestEnv::new().await;

    let hat = products::create_product(&env.db, product("Hat", "12.00", "0"))
        .await
        .unwrap();
    let (size, small) = group_with_value(&env, "Size", "S").await;
    let large = options::add_value(
        &env.db,
        size,
        NewOptionValue {
            value: "L".to_string(),
            is_active: None,
        },
    )
    .await
    .unwrap();
    products::set_attribute_value(&env.db, hat.id, small).await.unwrap();

    options::deactivate_value(&env.db, small).await.unwrap();

    let listed = options::list_groups(&env.db, true).await.unwrap();
    let values: Vec<i32> = listed[0].values.iter().map(|v| v.id).collect();
    assert_eq!(values, vec![large.id]);
    let storefront = options::get_group(&env.db, size, true).await.unwrap();
    assert_eq!(storefront.values.len(), 1);

    let admin = options::get_group(&env.db, size, false).await.unwrap();
    assert_eq!(admin.values.len(), 2);
    assert_eq!(
        product_attribute_value::Entity::find()
            .count(&env.db)
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn deactivated_group_is_hidden_but_kept() {
    let env = TestEnv::new().await;

    let hat = products::create_product(&env.db, product("Hat", "12.00", "0"))
        .await
        .unwrap();
    let (size, _) = group_with_value(&env, "Size", "M").await;
    products::attach_option_group(&env.db, hat.id, size).await.unwrap();

    options::deactivate_group(&env.db, size).await.unwrap();

    assert!(options::list_groups(&env.db, true).await.unwrap().is_empty());
    assert!(matches!(
        options::get_group(&env.db, size, true).await,
        Err(ServiceError::NotFound { .. })
    ));

    let admin = options::list_groups(&env.db, false).await.unwrap();
    assert_eq!(admin.len(), 1);
    assert!(!admin[0].is_active);
    assert_eq!(
        product_option_group::Entity::find().count(&env.db).await.unwrap(),
        1
    );
}

#[tokio::test]
async fn storefront_cannot_browse_a_hidden_category() {
    let env = TestEnv::new().await;

    let hidden = categories::create_category(
        &env.db,
        NewCategory {
            title: "Clearance".to_string(),
            is_active: Some(false),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let mut sock = product("Sock", "2.00", "0");
    sock.categories = vec![hidden.id];
    products::create_product(&env.db, sock).await.unwrap();

    let filter = ProductFilter {
        category: Some(hidden.id),
        ..Default::default()
    };
    let err = products::list_products(&env.db, filter.clone(), true)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound { .. }));

    let admin = products::list_products(&env.db, filter, false).await.unwrap();
    assert_eq!(admin.len(), 1);
}

#[tokio::test]
async fn partial_reorder_keeps_unlisted_indexes() {
    let env = TestEnv::new().await;
    let store = ImageStore::new(env.upload_dir(), 1024);

    let vase = products::create_product(&env.db, product("Vase", "15.00", "0"))
        .await
        .unwrap();
    let mut ids = Vec::new();
    for index in 0..3 {
        ids.push(images::add_image(&env.db, &store, png(vase.id, index)).await.unwrap().id);
    }

    // Only the last image is moved to the front.
    let gallery = images::reorder(&env.db, vase.id, &[ids[2]]).await.unwrap();
    let layout: Vec<(i32, i32)> = gallery.iter().map(|i| (i.id, i.index)).collect();
    assert_eq!(layout, vec![(ids[0], 0), (ids[2], 0), (ids[1], 1)]);
    assert!(images::primary_image(&env.db, vase.id).await.unwrap().is_none());

    // Listing the whole gallery restores a single primary image.
    images::reorder(&env.db, vase.id, &[ids[2], ids[0], ids[1]])
        .await
        .unwrap();
    let primary = images::primary_image(&env.db, vase.id).await.unwrap().unwrap();
    assert_eq!(primary.id, ids[2]);
}
