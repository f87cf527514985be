use serde::Serialize;
use thiserror::Error;

const UNSPECIFIED: &str = "none";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("ingredients must not be empty")]
    EmptyIngredients,
}

/// One user's ask: what is in the pantry and what to stay away from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    ingredients: String,
    diet_type: String,
    allergies: String,
}

impl GenerationRequest {
    pub fn new(
        ingredients: impl AsRef<str>,
        diet_type: impl AsRef<str>,
        allergies: impl AsRef<str>,
    ) -> Result<Self, RequestError> {
        let ingredients = ingredients.as_ref().trim();
        if ingredients.is_empty() {
            return Err(RequestError::EmptyIngredients);
        }
        Ok(Self {
            ingredients: ingredients.to_string(),
            diet_type: diet_type.as_ref().trim().to_string(),
            allergies: allergies.as_ref().trim().to_string(),
        })
    }

    pub fn ingredients(&self) -> &str {
        &self.ingredients
    }

    pub fn diet_type(&self) -> &str {
        &self.diet_type
    }

    pub fn allergies(&self) -> &str {
        &self.allergies
    }
}

fn or_unspecified(value: &str) -> &str {
    if value.is_empty() {
        UNSPECIFIED
    } else {
        value
    }
}

/// Builds the single user message sent to the model. The JSON shape spelled out at the end
/// is what the extractor expects back.
pub fn compose_prompt(request: &GenerationRequest) -> String {
    format!(
        "I have these ingredients: {ingredients}.
Diet preference: {diet}. Allergies to avoid: {allergies}.
Give me 3-5 totally different recipes.
For each recipe return:
- title
- short description
- prep time
- cook time (include oven/pan temperatures where relevant)
- servings
- ingredient list with metric amounts, each item as {{name, amount}}
- step-by-step instructions (each step on its own line)
- nutrition table: calories, fat, carbs, protein, fibre, vitamin-C, calcium
- 2-3 health advantages of eating this dish
Return strict JSON: {{recipes:[{{title,description,prep,cook,servings,ingredients:[],steps:[],nutrition:{{}},benefits:[]}},...]}}",
        ingredients = request.ingredients(),
        diet = or_unspecified(request.diet_type()),
        allergies = or_unspecified(request.allergies()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_ingredients_are_rejected() {
        assert_eq!(
            GenerationRequest::new("   \n", "vegan", ""),
            Err(RequestError::EmptyIngredients)
        );
    }

    #[test]
    fn test_fields_are_trimmed() {
        let request = GenerationRequest::new(" rice, eggs ", " keto ", "").unwrap();
        assert_eq!(request.ingredients(), "rice, eggs");
        assert_eq!(request.diet_type(), "keto");
        assert_eq!(request.allergies(), "");
    }

    #[test]
    fn test_prompt_embeds_request_and_shape() {
        let request = GenerationRequest::new("tomato, basil", "vegetarian", "peanuts").unwrap();
        let prompt = compose_prompt(&request);
        assert!(prompt.starts_with("I have these ingredients: tomato, basil."));
        assert!(prompt.contains("Diet preference: vegetarian. Allergies to avoid: peanuts."));
        assert!(prompt.contains(
            "{recipes:[{title,description,prep,cook,servings,ingredients:[],steps:[],nutrition:{},benefits:[]},...]}"
        ));
    }

    #[test]
    fn test_prompt_fills_unspecified_preferences() {
        let request = GenerationRequest::new("lentils", "", "").unwrap();
        let prompt = compose_prompt(&request);
        assert!(prompt.contains("Diet preference: none. Allergies to avoid: none."));
    }
}
