pub mod api_connection;
pub mod cli;
pub mod logging;
pub mod recipe_generator;
pub mod recipe_parser;
pub mod recipe_request;
pub mod sanitizer;
pub mod server;

pub use recipe_parser::{extract_recipes, ExtractionError, Recipe, RecipeCollection};
