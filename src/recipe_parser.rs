use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::sanitizer::{isolate_recipes_block, repair_bare_values, strip_fences_and_trailer};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Ingredient {
    pub name: String,
    pub amount: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Recipe {
    pub title: String,
    pub description: String,
    pub prep: String,
    pub cook: String,
    pub servings: String,
    pub ingredients: Vec<Ingredient>,
    pub steps: Vec<String>,
    pub nutrition: BTreeMap<String, String>,
    pub benefits: Vec<String>,
}

/// What a single model reply yields: `{"recipes": [...]}`, never empty once extracted.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct RecipeCollection {
    pub recipes: Vec<Recipe>,
}

impl RecipeCollection {
    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }
}

/// How entries that fail schema validation are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ValidationPolicy {
    /// One bad entry fails the whole reply.
    #[default]
    Strict,
    /// Bad entries are dropped and counted.
    DropInvalid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub collection: RecipeCollection,
    pub dropped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("no JSON object containing \"recipes\" found in model reply")]
    NoJsonFound,

    #[error("model reply is not valid JSON: {message}")]
    MalformedJson { message: String, candidate: String },

    #[error("recipe schema violation in {}: {detail}", describe_location(.index))]
    SchemaViolation { index: Option<usize>, detail: String },

    #[error("model reply contained no valid recipes")]
    NoValidRecipes,
}

impl ExtractionError {
    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ExtractionError::NoJsonFound => "no_json_found",
            ExtractionError::MalformedJson { .. } => "malformed_json",
            ExtractionError::SchemaViolation { .. } => "schema_violation",
            ExtractionError::NoValidRecipes => "no_valid_recipes",
        }
    }
}

fn describe_location(index: &Option<usize>) -> String {
    match index {
        Some(index) => format!("recipe #{}", index),
        None => "reply".to_string(),
    }
}

/// Turns a raw model reply into recipes, failing the whole reply on any invalid entry.
pub fn extract_recipes(raw: &str) -> Result<RecipeCollection, ExtractionError> {
    extract_recipes_with(raw, ValidationPolicy::Strict).map(|extraction| extraction.collection)
}

/// Full extraction pipeline: fence/trailer stripping, bare-value repair, block isolation,
/// parsing and schema validation under `policy`.
pub fn extract_recipes_with(
    raw: &str,
    policy: ValidationPolicy,
) -> Result<Extraction, ExtractionError> {
    let cleaned = strip_fences_and_trailer(raw);
    let repaired = repair_bare_values(&cleaned);
    let block = isolate_recipes_block(&repaired).ok_or(ExtractionError::NoJsonFound)?;

    let value: Value =
        serde_json::from_str(block).map_err(|e| ExtractionError::MalformedJson {
            message: e.to_string(),
            candidate: block.to_string(),
        })?;

    validate_collection(&value, policy)
}

fn validate_collection(
    value: &Value,
    policy: ValidationPolicy,
) -> Result<Extraction, ExtractionError> {
    let entries = value
        .get("recipes")
        .and_then(Value::as_array)
        .ok_or_else(|| ExtractionError::SchemaViolation {
            index: None,
            detail: "`recipes` must be an array".to_string(),
        })?;

    let mut recipes = Vec::with_capacity(entries.len());
    let mut dropped = 0;
    for (index, entry) in entries.iter().enumerate() {
        match recipe_from_value(entry) {
            Ok(recipe) => recipes.push(recipe),
            Err(detail) => match policy {
                ValidationPolicy::Strict => {
                    return Err(ExtractionError::SchemaViolation {
                        index: Some(index),
                        detail,
                    })
                }
                ValidationPolicy::DropInvalid => dropped += 1,
            },
        }
    }

    if recipes.is_empty() {
        return Err(ExtractionError::NoValidRecipes);
    }

    Ok(Extraction {
        collection: RecipeCollection { recipes },
        dropped,
    })
}

// Field errors are plain descriptions; the caller attaches the recipe index.
type FieldResult<T> = Result<T, String>;

fn recipe_from_value(entry: &Value) -> FieldResult<Recipe> {
    let fields = entry
        .as_object()
        .ok_or_else(|| "entry is not an object".to_string())?;

    let ingredients = array_field(fields, "ingredients")?
        .iter()
        .enumerate()
        .map(|(position, item)| ingredient_from_value(position, item))
        .collect::<FieldResult<Vec<_>>>()?;

    let nutrition = fields
        .get("nutrition")
        .ok_or_else(|| missing("nutrition"))?
        .as_object()
        .ok_or_else(|| "`nutrition` must be an object".to_string())?
        .iter()
        .map(|(nutrient, value)| {
            scalar_text(value)
                .map(|text| (nutrient.clone(), text))
                .ok_or_else(|| format!("`nutrition.{}` must be a string or number", nutrient))
        })
        .collect::<FieldResult<BTreeMap<_, _>>>()?;

    Ok(Recipe {
        title: scalar_field(fields, "title")?,
        description: scalar_field(fields, "description")?,
        prep: scalar_field(fields, "prep")?,
        cook: scalar_field(fields, "cook")?,
        servings: scalar_field(fields, "servings")?,
        ingredients,
        steps: scalar_list(fields, "steps")?,
        nutrition,
        benefits: scalar_list(fields, "benefits")?,
    })
}

fn ingredient_from_value(position: usize, item: &Value) -> FieldResult<Ingredient> {
    let fields = item
        .as_object()
        .ok_or_else(|| format!("`ingredients[{}]` must be an object", position))?;
    let field = |name: &str| {
        fields
            .get(name)
            .and_then(scalar_text)
            .ok_or_else(|| format!("`ingredients[{}].{}` must be a string or number", position, name))
    };
    Ok(Ingredient {
        name: field("name")?,
        amount: field("amount")?,
    })
}

fn scalar_field(fields: &Map<String, Value>, name: &str) -> FieldResult<String> {
    let value = fields.get(name).ok_or_else(|| missing(name))?;
    scalar_text(value).ok_or_else(|| format!("`{}` must be a string or number", name))
}

fn array_field<'a>(fields: &'a Map<String, Value>, name: &str) -> FieldResult<&'a Vec<Value>> {
    fields
        .get(name)
        .ok_or_else(|| missing(name))?
        .as_array()
        .ok_or_else(|| format!("`{}` must be an array", name))
}

fn scalar_list(fields: &Map<String, Value>, name: &str) -> FieldResult<Vec<String>> {
    array_field(fields, name)?
        .iter()
        .enumerate()
        .map(|(position, value)| {
            scalar_text(value)
                .ok_or_else(|| format!("`{}[{}]` must be a string or number", name, position))
        })
        .collect()
}

/// Strings pass through; numbers and booleans are rendered as text.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn missing(name: &str) -> String {
    format!("`{}` is missing", name)
}
