//! Table and index creation from the entity definitions.

use sea_orm::sea_query::{Index, IndexCreateStatement};
use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr, EntityName, EntityTrait, Schema};
use tracing::debug;

use crate::db::entities::{ingredient, recipe, recipe_ingredient, recipe_tag, tag, user};

/// Creates every table and unique index that does not exist yet.
/// Tables are created parents first so foreign keys resolve.
pub async fn ensure_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let schema = Schema::new(db.get_database_backend());

    create_table(db, &schema, user::Entity).await?;
    create_table(db, &schema, recipe::Entity).await?;
    create_table(db, &schema, tag::Entity).await?;
    create_table(db, &schema, ingredient::Entity).await?;
    create_table(db, &schema, recipe_tag::Entity).await?;
    create_table(db, &schema, recipe_ingredient::Entity).await?;

    for index in unique_indexes() {
        db.execute(db.get_database_backend().build(&index)).await?;
    }
    Ok(())
}

async fn create_table<E>(db: &DatabaseConnection, schema: &Schema, entity: E) -> Result<(), DbErr>
where
    E: EntityTrait,
{
    let mut stmt = schema.create_table_from_entity(entity);
    stmt.if_not_exists();
    db.execute(db.get_database_backend().build(&stmt)).await?;
    debug!(table = entity.table_name(), "Ensured table exists.");
    Ok(())
}

fn unique_indexes() -> Vec<IndexCreateStatement> {
    vec![
        Index::create()
            .name("idx_tags_user_id_name")
            .table(tag::Entity)
            .col(tag::Column::UserId)
            .col(tag::Column::Name)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("idx_ingredients_user_id_name")
            .table(ingredient::Entity)
            .col(ingredient::Column::UserId)
            .col(ingredient::Column::Name)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("idx_recipe_tags_recipe_id_tag_id")
            .table(recipe_tag::Entity)
            .col(recipe_tag::Column::RecipeId)
            .col(recipe_tag::Column::TagId)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("idx_recipe_ingredients_recipe_id_ingredient_id")
            .table(recipe_ingredient::Entity)
            .col(recipe_ingredient::Column::RecipeId)
            .col(recipe_ingredient::Column::IngredientId)
            .unique()
            .if_not_exists()
            .to_owned(),
    ]
}
