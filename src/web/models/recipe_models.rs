use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::entities::{ingredient, recipe, tag};
use crate::db::services::{NewRecipe, RecipeChanges, RecipeFilter, RecipeWithRelations};
use crate::services::image_service::media_url;
use crate::web::error::{AppError, FieldErrors, NON_FIELD_ERRORS};
use crate::web::models::{
    MAX_CHAR_FIELD_LEN, NULL, REQUIRED, json_type, optional_text, present, required_text,
};

pub const PRICE_MAX_DIGITS: u32 = 5;
pub const PRICE_DECIMAL_PLACES: u32 = 2;

const INVALID_INTEGER: &str = "A valid integer is required.";
const INVALID_NUMBER: &str = "A valid number is required.";

// --- Requests ---

/// Body of recipe create, full update and partial update.
/// Unknown keys such as `id` or `user` are ignored. Nested tags and
/// ingredients are read by name only; their ids are never trusted.
#[derive(Debug, Default, Deserialize)]
pub struct RecipePayload {
    #[serde(default, deserialize_with = "present")]
    pub title: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub time_minutes: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub price: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub link: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub tags: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub ingredients: Option<Value>,
}

impl RecipePayload {
    /// Validates a create request. `title`, `time_minutes` and `price` are required.
    pub fn into_new_recipe(self) -> Result<NewRecipe, AppError> {
        let changes = self.into_changes(false)?;
        match (changes.title, changes.time_minutes, changes.price) {
            (Some(title), Some(time_minutes), Some(price)) => Ok(NewRecipe {
                title,
                time_minutes,
                price,
                link: changes.link.unwrap_or_default(),
                description: changes.description.unwrap_or_default(),
                tag_names: changes.tag_names.unwrap_or_default(),
                ingredient_names: changes.ingredient_names.unwrap_or_default(),
            }),
            _ => Err(AppError::Validation(FieldErrors::single(
                NON_FIELD_ERRORS,
                "Missing required recipe fields.",
            ))),
        }
    }

    /// Validates an update. With `partial` (PATCH) every field is optional;
    /// otherwise (PUT) the required fields must be present.
    pub fn into_changes(self, partial: bool) -> Result<RecipeChanges, AppError> {
        let mut errors = FieldErrors::new();

        let title = required_text(&mut errors, "title", self.title, Some(MAX_CHAR_FIELD_LEN), partial);
        let time_minutes = match self.time_minutes {
            Some(value) => integer_value(&mut errors, "time_minutes", value),
            None => {
                if !partial {
                    errors.add("time_minutes", REQUIRED);
                }
                None
            }
        };
        let price = match self.price {
            Some(value) => decimal_value(&mut errors, "price", value).and_then(|p| clean_price(&mut errors, p)),
            None => {
                if !partial {
                    errors.add("price", REQUIRED);
                }
                None
            }
        };
        let link = optional_text(&mut errors, "link", self.link, Some(MAX_CHAR_FIELD_LEN));
        let description = optional_text(&mut errors, "description", self.description, None);
        let tag_names = self.tags.and_then(|tags| clean_names(&mut errors, "tags", tags));
        let ingredient_names = self
            .ingredients
            .and_then(|ingredients| clean_names(&mut errors, "ingredients", ingredients));

        errors.into_result()?;
        Ok(RecipeChanges {
            title,
            time_minutes,
            price,
            link,
            description,
            tag_names,
            ingredient_names,
        })
    }
}

/// Reads an integer field. Whole numbers and numeric strings are accepted.
fn integer_value(errors: &mut FieldErrors, field: &str, value: Value) -> Option<i32> {
    let parsed = match &value {
        Value::Null => {
            errors.add(field, NULL);
            return None;
        }
        Value::Number(n) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<i32>().ok(),
        _ => None,
    };
    if parsed.is_none() {
        errors.add(field, INVALID_INTEGER);
    }
    parsed
}

/// Reads a decimal field from a JSON number or a numeric string.
fn decimal_value(errors: &mut FieldErrors, field: &str, value: Value) -> Option<Decimal> {
    let text = match value {
        Value::Null => {
            errors.add(field, NULL);
            return None;
        }
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => String::new(),
    };
    let parsed = Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok();
    if parsed.is_none() {
        errors.add(field, INVALID_NUMBER);
    }
    parsed
}

/// Enforces the `decimal(5, 2)` column: at most 5 digits, 2 after the point.
fn clean_price(errors: &mut FieldErrors, price: Decimal) -> Option<Decimal> {
    let price = price.normalize();
    let decimal_places = price.scale();
    let digits = (price.mantissa().unsigned_abs().to_string().len() as u32).max(decimal_places);
    let whole_digits = digits - decimal_places;
    let max_whole_digits = PRICE_MAX_DIGITS - PRICE_DECIMAL_PLACES;

    if digits > PRICE_MAX_DIGITS {
        errors.add(
            "price",
            format!("Ensure that there are no more than {PRICE_MAX_DIGITS} digits in total."),
        );
        None
    } else if decimal_places > PRICE_DECIMAL_PLACES {
        errors.add(
            "price",
            format!("Ensure that there are no more than {PRICE_DECIMAL_PLACES} decimal places."),
        );
        None
    } else if whole_digits > max_whole_digits {
        errors.add(
            "price",
            format!("Ensure that there are no more than {max_whole_digits} digits before the decimal point."),
        );
        None
    } else {
        Some(price)
    }
}

/// Reads a list of `{"name": ...}` objects. Messages about an item are
/// recorded under `field`, prefixed with the item key.
fn clean_names(errors: &mut FieldErrors, field: &str, value: Value) -> Option<Vec<String>> {
    let items = match value {
        Value::Array(items) => items,
        Value::Null => {
            errors.add(field, NULL);
            return None;
        }
        other => {
            errors.add(
                field,
                format!("Expected a list of items but got type \"{}\".", json_type(&other)),
            );
            return None;
        }
    };

    let mut names = Vec::with_capacity(items.len());
    for item in items {
        let mut item_errors = FieldErrors::new();
        let name = match item {
            Value::Object(mut map) => {
                required_text(&mut item_errors, "name", map.remove("name"), Some(MAX_CHAR_FIELD_LEN), false)
            }
            other => {
                errors.add(
                    field,
                    format!("Invalid data. Expected a dictionary, but got {}.", json_type(&other)),
                );
                continue;
            }
        };
        match name {
            Some(name) => names.push(name),
            None => {
                for message in item_errors.get("name").unwrap_or_default() {
                    errors.add(field, format!("name: {message}"));
                }
            }
        }
    }
    Some(names)
}

/// Query string of the recipe list, e.g. `?tags=1,2&ingredients=3`.
#[derive(Debug, Default, Deserialize)]
pub struct RecipeListQuery {
    pub tags: Option<String>,
    pub ingredients: Option<String>,
}

impl RecipeListQuery {
    pub fn into_filter(self) -> Result<RecipeFilter, AppError> {
        let mut errors = FieldErrors::new();
        let tag_ids = parse_id_list(&mut errors, "tags", self.tags.as_deref());
        let ingredient_ids = parse_id_list(&mut errors, "ingredients", self.ingredients.as_deref());
        errors.into_result()?;
        Ok(RecipeFilter {
            tag_ids,
            ingredient_ids,
        })
    }
}

fn parse_id_list(errors: &mut FieldErrors, field: &str, raw: Option<&str>) -> Vec<i32> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    let mut ids = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.parse::<i32>() {
            Ok(id) => ids.push(id),
            Err(_) => errors.add(field, format!("'{part}' is not a valid id.")),
        }
    }
    ids
}

/// Query string of the tag and ingredient lists, e.g. `?assigned_only=1`.
#[derive(Debug, Default, Deserialize)]
pub struct AssignedOnlyQuery {
    pub assigned_only: Option<String>,
}

impl AssignedOnlyQuery {
    pub fn assigned_only(&self) -> bool {
        matches!(
            self.assigned_only.as_deref().map(str::trim),
            Some("1") | Some("true") | Some("True")
        )
    }
}

/// Body of a tag or ingredient update.
#[derive(Debug, Default, Deserialize)]
pub struct RenamePayload {
    #[serde(default, deserialize_with = "present")]
    pub name: Option<Value>,
}

impl RenamePayload {
    /// Returns the new name, or `None` for a partial update that leaves it unchanged.
    pub fn into_name(self, partial: bool) -> Result<Option<String>, AppError> {
        let mut errors = FieldErrors::new();
        let name = required_text(&mut errors, "name", self.name, Some(MAX_CHAR_FIELD_LEN), partial);
        errors.into_result()?;
        Ok(name)
    }
}

// --- Responses ---

/// A tag or ingredient embedded by value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamedItem {
    pub id: i32,
    pub name: String,
}

impl From<tag::Model> for NamedItem {
    fn from(model: tag::Model) -> Self {
        NamedItem {
            id: model.id,
            name: model.name,
        }
    }
}

impl From<ingredient::Model> for NamedItem {
    fn from(model: ingredient::Model) -> Self {
        NamedItem {
            id: model.id,
            name: model.name,
        }
    }
}

/// Recipe as shown in the list. Leaves out `description` and `image`.
#[derive(Debug, Clone, Serialize)]
pub struct RecipeResponse {
    pub id: i32,
    pub title: String,
    pub time_minutes: i32,
    pub price: String,
    pub link: String,
    pub tags: Vec<NamedItem>,
    pub ingredients: Vec<NamedItem>,
}

/// Recipe as shown on its own: the list fields plus `description` and `image`.
#[derive(Debug, Clone, Serialize)]
pub struct RecipeDetailResponse {
    #[serde(flatten)]
    pub summary: RecipeResponse,
    pub description: String,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeImageResponse {
    pub id: i32,
    pub image: Option<String>,
}

pub fn format_price(price: Decimal) -> String {
    format!("{:.2}", price)
}

impl RecipeResponse {
    fn build(recipe: &recipe::Model, tags: Vec<tag::Model>, ingredients: Vec<ingredient::Model>) -> Self {
        RecipeResponse {
            id: recipe.id,
            title: recipe.title.clone(),
            time_minutes: recipe.time_minutes,
            price: format_price(recipe.price),
            link: recipe.link.clone(),
            tags: tags.into_iter().map(NamedItem::from).collect(),
            ingredients: ingredients.into_iter().map(NamedItem::from).collect(),
        }
    }
}

impl From<RecipeWithRelations> for RecipeResponse {
    fn from(value: RecipeWithRelations) -> Self {
        RecipeResponse::build(&value.recipe, value.tags, value.ingredients)
    }
}

impl From<RecipeWithRelations> for RecipeDetailResponse {
    fn from(value: RecipeWithRelations) -> Self {
        let summary = RecipeResponse::build(&value.recipe, value.tags, value.ingredients);
        RecipeDetailResponse {
            summary,
            description: value.recipe.description,
            image: value.recipe.image.as_deref().map(media_url),
        }
    }
}

impl From<recipe::Model> for RecipeImageResponse {
    fn from(model: recipe::Model) -> Self {
        RecipeImageResponse {
            id: model.id,
            image: model.image.as_deref().map(media_url),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn payload(json: serde_json::Value) -> RecipePayload {
        serde_json::from_value(json).unwrap()
    }

    fn field_errors(err: AppError) -> FieldErrors {
        match err {
            AppError::Validation(errors) => errors,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_create_requires_title_time_and_price() {
        let err = payload(json!({})).into_new_recipe().unwrap_err();
        let errors = field_errors(err);
        assert!(errors.get("title").is_some());
        assert!(errors.get("time_minutes").is_some());
        assert!(errors.get("price").is_some());
        assert!(errors.get("link").is_none());
    }

    #[test]
    fn test_create_defaults_optional_fields() {
        let new_recipe = payload(json!({
            "title": "Chocolate cheesecake",
            "time_minutes": 30,
            "price": "5.99",
        }))
        .into_new_recipe()
        .unwrap();

        assert_eq!(new_recipe.title, "Chocolate cheesecake");
        assert_eq!(new_recipe.price, dec("5.99"));
        assert_eq!(new_recipe.link, "");
        assert_eq!(new_recipe.description, "");
        assert!(new_recipe.tag_names.is_empty());
    }

    #[test]
    fn test_partial_update_ignores_user_and_absent_fields() {
        let changes = payload(json!({ "title": "New title", "user": 42 }))
            .into_changes(true)
            .unwrap();
        assert_eq!(changes.title.as_deref(), Some("New title"));
        assert!(changes.price.is_none());
        assert!(changes.tag_names.is_none());
        assert!(changes.ingredient_names.is_none());
    }

    #[test]
    fn test_empty_tag_list_is_present_not_absent() {
        let changes = payload(json!({ "tags": [] })).into_changes(true).unwrap();
        assert_eq!(changes.tag_names, Some(Vec::new()));
    }

    #[test]
    fn test_blank_tag_name_rejected() {
        let err = payload(json!({ "tags": [{ "name": "" }, { "name": "Vegan" }] }))
            .into_changes(true)
            .unwrap_err();
        let errors = field_errors(err);
        assert_eq!(errors.get("tags").map(|m| m.len()), Some(1));
    }

    #[test]
    fn test_null_is_rejected_where_absent_is_not() {
        let err = payload(json!({ "tags": null, "link": null, "price": null }))
            .into_changes(true)
            .unwrap_err();
        let errors = field_errors(err);
        for field in ["tags", "link", "price"] {
            assert_eq!(errors.get(field), Some(&[NULL.to_string()][..]), "{field}");
        }
        assert!(errors.get("ingredients").is_none());
    }

    #[test]
    fn test_wrong_types_are_reported_per_field() {
        let err = payload(json!({
            "title": "Curry",
            "time_minutes": "abc",
            "price": true,
            "tags": "Vegan",
            "ingredients": ["Salt"],
        }))
        .into_new_recipe()
        .unwrap_err();
        let errors = field_errors(err);
        assert_eq!(errors.get("time_minutes"), Some(&[INVALID_INTEGER.to_string()][..]));
        assert_eq!(errors.get("price"), Some(&[INVALID_NUMBER.to_string()][..]));
        assert_eq!(
            errors.get("tags"),
            Some(&["Expected a list of items but got type \"str\".".to_string()][..])
        );
        assert_eq!(errors.get("ingredients").map(|m| m.len()), Some(1));
        assert!(errors.get(NON_FIELD_ERRORS).is_none());
        assert!(errors.get("title").is_none());
    }

    #[test]
    fn test_numeric_strings_are_accepted() {
        let changes = payload(json!({ "time_minutes": " 45 ", "price": 7.5 }))
            .into_changes(true)
            .unwrap();
        assert_eq!(changes.time_minutes, Some(45));
        assert_eq!(changes.price, Some(dec("7.5")));

        let err = payload(json!({ "time_minutes": 12.5 })).into_changes(true).unwrap_err();
        assert!(field_errors(err).get("time_minutes").is_some());
    }

    #[test]
    fn test_price_precision() {
        let mut errors = FieldErrors::new();
        assert_eq!(clean_price(&mut errors, dec("5.25")), Some(dec("5.25")));
        assert_eq!(clean_price(&mut errors, dec("20.00")), Some(dec("20")));
        assert_eq!(clean_price(&mut errors, dec("999.99")), Some(dec("999.99")));
        assert!(errors.is_empty());

        assert!(clean_price(&mut errors, dec("5.999")).is_none());
        assert!(clean_price(&mut errors, dec("1000")).is_none());
        assert!(clean_price(&mut errors, dec("123456")).is_none());
        assert_eq!(errors.get("price").map(|m| m.len()), Some(3));
    }

    #[test]
    fn test_price_is_formatted_with_two_places() {
        assert_eq!(format_price(dec("20")), "20.00");
        assert_eq!(format_price(dec("5.25")), "5.25");
        assert_eq!(format_price(dec("7.5")), "7.50");
    }

    #[test]
    fn test_id_list_query() {
        let filter = RecipeListQuery {
            tags: Some("1, 2,".into()),
            ingredients: None,
        }
        .into_filter()
        .unwrap();
        assert_eq!(filter.tag_ids, vec![1, 2]);
        assert!(filter.ingredient_ids.is_empty());

        let err = RecipeListQuery {
            tags: Some("1,abc".into()),
            ingredients: None,
        }
        .into_filter()
        .unwrap_err();
        assert!(field_errors(err).get("tags").is_some());
    }

    #[test]
    fn test_assigned_only_flag() {
        let on = AssignedOnlyQuery { assigned_only: Some("1".into()) };
        let off = AssignedOnlyQuery { assigned_only: Some("0".into()) };
        assert!(on.assigned_only());
        assert!(!off.assigned_only());
        assert!(!AssignedOnlyQuery::default().assigned_only());
    }
}
