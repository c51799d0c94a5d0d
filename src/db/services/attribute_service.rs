use std::collections::HashMap;

use sea_orm::sea_query::{Expr, Query, SelectStatement};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use tracing::debug;

use crate::db::entities::{ingredient, recipe_ingredient, recipe_tag, tag};
use crate::db::services::is_unique_violation;

/// A per-user, named row that recipes link to through a join table.
/// Tags and ingredients are the two kinds; they share every query below.
pub trait RecipeAttribute: EntityTrait {
    /// The `recipe_id`/attribute id join table.
    type Link: EntityTrait;

    /// Lower-case singular used in logs and messages, e.g. "tag".
    const LABEL: &'static str;

    fn id_column() -> Self::Column;
    fn user_column() -> Self::Column;
    fn name_column() -> Self::Column;
    fn link_recipe_column() -> <Self::Link as EntityTrait>::Column;
    fn link_attribute_column() -> <Self::Link as EntityTrait>::Column;

    fn id_of(model: &Self::Model) -> i32;
    fn name_of(model: &Self::Model) -> &str;

    fn new_row(user_id: i32, name: &str) -> Self::ActiveModel;
    fn new_link(recipe_id: i32, attribute_id: i32) -> <Self::Link as EntityTrait>::ActiveModel;
}

impl RecipeAttribute for tag::Entity {
    type Link = recipe_tag::Entity;

    const LABEL: &'static str = "tag";

    fn id_column() -> tag::Column {
        tag::Column::Id
    }
    fn user_column() -> tag::Column {
        tag::Column::UserId
    }
    fn name_column() -> tag::Column {
        tag::Column::Name
    }
    fn link_recipe_column() -> recipe_tag::Column {
        recipe_tag::Column::RecipeId
    }
    fn link_attribute_column() -> recipe_tag::Column {
        recipe_tag::Column::TagId
    }

    fn id_of(model: &tag::Model) -> i32 {
        model.id
    }
    fn name_of(model: &tag::Model) -> &str {
        &model.name
    }

    fn new_row(user_id: i32, name: &str) -> tag::ActiveModel {
        tag::ActiveModel {
            user_id: Set(user_id),
            name: Set(name.to_owned()),
            ..Default::default()
        }
    }
    fn new_link(recipe_id: i32, tag_id: i32) -> recipe_tag::ActiveModel {
        recipe_tag::ActiveModel {
            recipe_id: Set(recipe_id),
            tag_id: Set(tag_id),
            ..Default::default()
        }
    }
}

impl RecipeAttribute for ingredient::Entity {
    type Link = recipe_ingredient::Entity;

    const LABEL: &'static str = "ingredient";

    fn id_column() -> ingredient::Column {
        ingredient::Column::Id
    }
    fn user_column() -> ingredient::Column {
        ingredient::Column::UserId
    }
    fn name_column() -> ingredient::Column {
        ingredient::Column::Name
    }
    fn link_recipe_column() -> recipe_ingredient::Column {
        recipe_ingredient::Column::RecipeId
    }
    fn link_attribute_column() -> recipe_ingredient::Column {
        recipe_ingredient::Column::IngredientId
    }

    fn id_of(model: &ingredient::Model) -> i32 {
        model.id
    }
    fn name_of(model: &ingredient::Model) -> &str {
        &model.name
    }

    fn new_row(user_id: i32, name: &str) -> ingredient::ActiveModel {
        ingredient::ActiveModel {
            user_id: Set(user_id),
            name: Set(name.to_owned()),
            ..Default::default()
        }
    }
    fn new_link(recipe_id: i32, ingredient_id: i32) -> recipe_ingredient::ActiveModel {
        recipe_ingredient::ActiveModel {
            recipe_id: Set(recipe_id),
            ingredient_id: Set(ingredient_id),
            ..Default::default()
        }
    }
}

// --- Attribute Service Functions ---

/// Retrieves the user's tags or ingredients ordered by name, descending.
/// With `assigned_only`, rows not linked to any recipe are left out.
pub async fn list_attributes<E>(db: &DatabaseConnection, user_id: i32, assigned_only: bool) -> Result<Vec<E::Model>, DbErr>
where
    E: RecipeAttribute,
{
    let mut query = E::find().filter(E::user_column().eq(user_id));
    if assigned_only {
        query = query.filter(
            E::id_column().in_subquery(
                Query::select()
                    .column(E::link_attribute_column())
                    .from(<E::Link as Default>::default())
                    .to_owned(),
            ),
        );
    }
    query.order_by_desc(E::name_column()).all(db).await
}

/// Retrieves a row if it exists and belongs to the user.
pub async fn get_attribute<E, C>(conn: &C, user_id: i32, id: i32) -> Result<Option<E::Model>, DbErr>
where
    E: RecipeAttribute,
    C: ConnectionTrait,
{
    E::find()
        .filter(E::id_column().eq(id))
        .filter(E::user_column().eq(user_id))
        .one(conn)
        .await
}

async fn find_by_name<E, C>(conn: &C, user_id: i32, name: &str) -> Result<Option<E::Model>, DbErr>
where
    E: RecipeAttribute,
    C: ConnectionTrait,
{
    E::find()
        .filter(E::user_column().eq(user_id))
        .filter(E::name_column().eq(name))
        .one(conn)
        .await
}

/// Looks up the user's row by name, creating it if absent.
pub async fn get_or_create_attribute<E, C>(conn: &C, user_id: i32, name: &str) -> Result<E::Model, DbErr>
where
    E: RecipeAttribute,
    C: ConnectionTrait + TransactionTrait,
{
    match find_by_name::<E, C>(conn, user_id, name).await? {
        Some(existing) => Ok(existing),
        None => create_or_find::<E, C>(conn, user_id, name).await,
    }
}

/// Inserts in a savepoint. If a concurrent request created the same name
/// first, the unique index rejects ours and the winner's row is returned.
async fn create_or_find<E, C>(conn: &C, user_id: i32, name: &str) -> Result<E::Model, DbErr>
where
    E: RecipeAttribute,
    C: ConnectionTrait + TransactionTrait,
{
    let savepoint = conn.begin().await?;
    match E::insert(E::new_row(user_id, name)).exec(&savepoint).await {
        Ok(_) => {
            let created = find_by_name::<E, _>(&savepoint, user_id, name)
                .await?
                .ok_or(DbErr::RecordNotInserted)?;
            savepoint.commit().await?;
            debug!(user_id, id = E::id_of(&created), name, kind = E::LABEL, "Created recipe attribute.");
            Ok(created)
        }
        Err(err) if is_unique_violation(&err) => {
            savepoint.rollback().await?;
            find_by_name::<E, C>(conn, user_id, name).await?.ok_or(err)
        }
        Err(err) => Err(err),
    }
}

/// Renames a row. Returns `None` if it does not exist or belongs to someone else.
/// A name already taken by another of the user's rows fails with a unique violation.
pub async fn rename_attribute<E>(db: &DatabaseConnection, user_id: i32, id: i32, name: &str) -> Result<Option<E::Model>, DbErr>
where
    E: RecipeAttribute,
{
    let Some(existing) = get_attribute::<E, _>(db, user_id, id).await? else {
        return Ok(None);
    };
    if E::name_of(&existing) == name {
        return Ok(Some(existing));
    }
    E::update_many()
        .col_expr(E::name_column(), Expr::value(name.to_owned()))
        .filter(E::id_column().eq(id))
        .filter(E::user_column().eq(user_id))
        .exec(db)
        .await?;
    get_attribute::<E, _>(db, user_id, id).await
}

/// Deletes a row. Links to recipes are removed along with it.
pub async fn delete_attribute<E>(db: &DatabaseConnection, user_id: i32, id: i32) -> Result<u64, DbErr>
where
    E: RecipeAttribute,
{
    let txn = db.begin().await?;
    if get_attribute::<E, _>(&txn, user_id, id).await?.is_none() {
        return Ok(0);
    }
    <E::Link as EntityTrait>::delete_many()
        .filter(E::link_attribute_column().eq(id))
        .exec(&txn)
        .await?;
    let result = E::delete_many().filter(E::id_column().eq(id)).exec(&txn).await?;
    txn.commit().await?;
    Ok(result.rows_affected)
}

/// Replaces the full set of tags or ingredients linked to a recipe.
pub async fn replace_recipe_links<E, C>(conn: &C, recipe_id: i32, ids: &[i32]) -> Result<(), DbErr>
where
    E: RecipeAttribute,
    C: ConnectionTrait,
{
    <E::Link as EntityTrait>::delete_many()
        .filter(E::link_recipe_column().eq(recipe_id))
        .exec(conn)
        .await?;

    if !ids.is_empty() {
        let links = ids.iter().map(|&id| E::new_link(recipe_id, id));
        <E::Link as EntityTrait>::insert_many(links).exec(conn).await?;
    }
    Ok(())
}

/// Subquery selecting the ids of recipes linked to any of `ids`.
pub fn recipes_linked_to<E>(ids: &[i32]) -> SelectStatement
where
    E: RecipeAttribute,
{
    Query::select()
        .column(E::link_recipe_column())
        .from(<E::Link as Default>::default())
        .and_where(E::link_attribute_column().is_in(ids.iter().copied()))
        .to_owned()
}

/// Retrieves the rows linked to each given recipe, keyed by recipe id and ordered by id.
pub async fn get_attributes_for_recipes<E, C>(conn: &C, recipe_ids: &[i32]) -> Result<HashMap<i32, Vec<E::Model>>, DbErr>
where
    E: RecipeAttribute,
    C: ConnectionTrait,
{
    let mut by_recipe: HashMap<i32, Vec<E::Model>> = HashMap::new();
    if recipe_ids.is_empty() {
        return Ok(by_recipe);
    }

    let links: Vec<(i32, i32)> = <E::Link as EntityTrait>::find()
        .select_only()
        .column(E::link_recipe_column())
        .column(E::link_attribute_column())
        .filter(E::link_recipe_column().is_in(recipe_ids.iter().copied()))
        .into_tuple()
        .all(conn)
        .await?;
    if links.is_empty() {
        return Ok(by_recipe);
    }

    let mut attribute_ids: Vec<i32> = links.iter().map(|&(_, id)| id).collect();
    attribute_ids.sort_unstable();
    attribute_ids.dedup();
    let attributes: HashMap<i32, E::Model> = E::find()
        .filter(E::id_column().is_in(attribute_ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|model| (E::id_of(&model), model))
        .collect();

    for (recipe_id, attribute_id) in links {
        if let Some(model) = attributes.get(&attribute_id) {
            by_recipe.entry(recipe_id).or_default().push(model.clone());
        }
    }
    for models in by_recipe.values_mut() {
        models.sort_by_key(|m| E::id_of(m));
    }
    Ok(by_recipe)
}
