use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    IntoActiveModel, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::{debug, info};

use crate::db::entities::{ingredient, recipe, tag};
use crate::db::services::{
    RecipeAttribute, get_attributes_for_recipes, get_or_create_attribute, recipes_linked_to,
    replace_recipe_links,
};

// --- Recipe Service Types ---

/// A recipe together with the tags and ingredients linked to it.
#[derive(Debug, Clone)]
pub struct RecipeWithRelations {
    pub recipe: recipe::Model,
    pub tags: Vec<tag::Model>,
    pub ingredients: Vec<ingredient::Model>,
}

/// Restricts a recipe listing to recipes linked to any of the given tag or ingredient ids.
/// Empty lists do not filter.
#[derive(Debug, Default, Clone)]
pub struct RecipeFilter {
    pub tag_ids: Vec<i32>,
    pub ingredient_ids: Vec<i32>,
}

/// A validated recipe ready to be inserted.
#[derive(Debug, Clone)]
pub struct NewRecipe {
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: String,
    pub description: String,
    pub tag_names: Vec<String>,
    pub ingredient_names: Vec<String>,
}

/// Changes to apply to an existing recipe. `None` leaves the field untouched.
///
/// `Some` on `tag_names`/`ingredient_names` replaces the whole association set,
/// so `Some(vec![])` clears it.
#[derive(Debug, Default, Clone)]
pub struct RecipeChanges {
    pub title: Option<String>,
    pub time_minutes: Option<i32>,
    pub price: Option<Decimal>,
    pub link: Option<String>,
    pub description: Option<String>,
    pub tag_names: Option<Vec<String>>,
    pub ingredient_names: Option<Vec<String>>,
}

// --- Recipe Service Functions ---

/// Retrieves the user's recipes, newest first, with their tags and ingredients.
pub async fn list_recipes(
    db: &DatabaseConnection,
    user_id: i32,
    filter: &RecipeFilter,
) -> Result<Vec<RecipeWithRelations>, DbErr> {
    let mut query = recipe::Entity::find().filter(recipe::Column::UserId.eq(user_id));
    if !filter.tag_ids.is_empty() {
        query = query.filter(recipe::Column::Id.in_subquery(recipes_linked_to::<tag::Entity>(&filter.tag_ids)));
    }
    if !filter.ingredient_ids.is_empty() {
        query = query.filter(
            recipe::Column::Id.in_subquery(recipes_linked_to::<ingredient::Entity>(&filter.ingredient_ids)),
        );
    }

    let recipes = query.order_by_desc(recipe::Column::Id).all(db).await?;
    attach_relations(db, recipes).await
}

/// Retrieves a recipe without its relations if it exists and belongs to the user.
pub async fn find_owned_recipe<C>(conn: &C, user_id: i32, recipe_id: i32) -> Result<Option<recipe::Model>, DbErr>
where
    C: ConnectionTrait,
{
    recipe::Entity::find_by_id(recipe_id)
        .filter(recipe::Column::UserId.eq(user_id))
        .one(conn)
        .await
}

/// Retrieves a recipe with its relations if it exists and belongs to the user.
pub async fn get_recipe(
    db: &DatabaseConnection,
    user_id: i32,
    recipe_id: i32,
) -> Result<Option<RecipeWithRelations>, DbErr> {
    let Some(model) = find_owned_recipe(db, user_id, recipe_id).await? else {
        return Ok(None);
    };
    Ok(attach_relations(db, vec![model]).await?.pop())
}

/// Creates a recipe owned by the user and links its tags and ingredients,
/// creating any that the user does not have yet.
pub async fn create_recipe(
    db: &DatabaseConnection,
    user_id: i32,
    input: NewRecipe,
) -> Result<RecipeWithRelations, DbErr> {
    let txn = db.begin().await?;
    let now = Utc::now();

    let new_recipe = recipe::ActiveModel {
        user_id: Set(user_id),
        title: Set(input.title),
        time_minutes: Set(input.time_minutes),
        price: Set(input.price),
        link: Set(input.link),
        description: Set(input.description),
        image: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    let model = new_recipe.insert(&txn).await?;

    let tags = link_attributes::<tag::Entity, _>(&txn, user_id, model.id, &input.tag_names).await?;
    let ingredients = link_attributes::<ingredient::Entity, _>(&txn, user_id, model.id, &input.ingredient_names).await?;
    txn.commit().await?;

    info!(user_id, recipe_id = model.id, "Recipe created.");
    Ok(RecipeWithRelations {
        recipe: model,
        tags,
        ingredients,
    })
}

/// Applies `changes` to the user's recipe. Returns `None` if the recipe does not
/// exist or belongs to someone else. Ownership itself is never changed.
pub async fn update_recipe(
    db: &DatabaseConnection,
    user_id: i32,
    recipe_id: i32,
    changes: RecipeChanges,
) -> Result<Option<RecipeWithRelations>, DbErr> {
    let txn = db.begin().await?;
    let Some(existing) = find_owned_recipe(&txn, user_id, recipe_id).await? else {
        return Ok(None);
    };

    let mut active_model = existing.into_active_model();
    if let Some(title) = changes.title {
        active_model.title = Set(title);
    }
    if let Some(time_minutes) = changes.time_minutes {
        active_model.time_minutes = Set(time_minutes);
    }
    if let Some(price) = changes.price {
        active_model.price = Set(price);
    }
    if let Some(link) = changes.link {
        active_model.link = Set(link);
    }
    if let Some(description) = changes.description {
        active_model.description = Set(description);
    }
    active_model.updated_at = Set(Utc::now());
    let model = active_model.update(&txn).await?;

    if let Some(names) = changes.tag_names {
        link_attributes::<tag::Entity, _>(&txn, user_id, recipe_id, &names).await?;
    }
    if let Some(names) = changes.ingredient_names {
        link_attributes::<ingredient::Entity, _>(&txn, user_id, recipe_id, &names).await?;
    }

    let updated = attach_relations(&txn, vec![model]).await?.pop();
    txn.commit().await?;

    debug!(user_id, recipe_id, "Recipe updated.");
    Ok(updated)
}

/// Stores the media path of an uploaded image on the user's recipe.
pub async fn set_recipe_image(
    db: &DatabaseConnection,
    user_id: i32,
    recipe_id: i32,
    image_path: String,
) -> Result<Option<recipe::Model>, DbErr> {
    let Some(existing) = find_owned_recipe(db, user_id, recipe_id).await? else {
        return Ok(None);
    };
    let mut active_model = existing.into_active_model();
    active_model.image = Set(Some(image_path));
    active_model.updated_at = Set(Utc::now());
    active_model.update(db).await.map(Some)
}

/// Deletes the user's recipe and its tag/ingredient links. The tags and
/// ingredients themselves are kept.
pub async fn delete_recipe(db: &DatabaseConnection, user_id: i32, recipe_id: i32) -> Result<u64, DbErr> {
    let txn = db.begin().await?;
    if find_owned_recipe(&txn, user_id, recipe_id).await?.is_none() {
        return Ok(0);
    }
    replace_recipe_links::<tag::Entity, _>(&txn, recipe_id, &[]).await?;
    replace_recipe_links::<ingredient::Entity, _>(&txn, recipe_id, &[]).await?;
    let result = recipe::Entity::delete_by_id(recipe_id).exec(&txn).await?;
    txn.commit().await?;

    info!(user_id, recipe_id, "Recipe deleted.");
    Ok(result.rows_affected)
}

// --- Helpers ---

async fn attach_relations<C>(conn: &C, recipes: Vec<recipe::Model>) -> Result<Vec<RecipeWithRelations>, DbErr>
where
    C: ConnectionTrait,
{
    let ids: Vec<i32> = recipes.iter().map(|r| r.id).collect();
    let mut tags = get_attributes_for_recipes::<tag::Entity, _>(conn, &ids).await?;
    let mut ingredients = get_attributes_for_recipes::<ingredient::Entity, _>(conn, &ids).await?;

    Ok(recipes
        .into_iter()
        .map(|recipe| RecipeWithRelations {
            tags: tags.remove(&recipe.id).unwrap_or_default(),
            ingredients: ingredients.remove(&recipe.id).unwrap_or_default(),
            recipe,
        })
        .collect())
}

/// Names repeated in one payload resolve to the same row and are linked once.
fn unique_names(names: &[String]) -> Vec<&str> {
    let mut seen: Vec<&str> = Vec::with_capacity(names.len());
    for name in names {
        if !seen.contains(&name.as_str()) {
            seen.push(name);
        }
    }
    seen
}

/// Resolves each name to the user's row, creating missing ones, and makes
/// them the recipe's full set of links. Returned ordered by id.
async fn link_attributes<E, C>(
    conn: &C,
    user_id: i32,
    recipe_id: i32,
    names: &[String],
) -> Result<Vec<E::Model>, DbErr>
where
    E: RecipeAttribute,
    C: ConnectionTrait + TransactionTrait,
{
    let mut models = Vec::new();
    for name in unique_names(names) {
        models.push(get_or_create_attribute::<E, C>(conn, user_id, name).await?);
    }
    let ids: Vec<i32> = models.iter().map(|m| E::id_of(m)).collect();
    replace_recipe_links::<E, C>(conn, recipe_id, &ids).await?;
    models.sort_by_key(|m| E::id_of(m));
    Ok(models)
}
