use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::api_connection::{ModelClient, ModelError};
use crate::recipe_parser::{extract_recipes_with, Extraction, ExtractionError, ValidationPolicy};
use crate::recipe_request::{compose_prompt, GenerationRequest};

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),
}

impl GenerationError {
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationError::Model(e) => e.kind(),
            GenerationError::Extraction(e) => e.kind(),
        }
    }
}

/// Prompt -> model -> extractor, for one request at a time.
pub struct RecipeGenerator<M> {
    client: M,
    policy: ValidationPolicy,
}

impl<M: ModelClient> RecipeGenerator<M> {
    pub fn new(client: M, policy: ValidationPolicy) -> Self {
        Self { client, policy }
    }

    pub async fn generate(&self, request: &GenerationRequest) -> Result<Extraction, GenerationError> {
        debug!(
            ingredients = request.ingredients(),
            diet_type = request.diet_type(),
            allergies = request.allergies(),
            "generating recipes"
        );

        let reply = self
            .client
            .generate(compose_prompt(request))
            .await
            .inspect_err(|e| error!(kind = e.kind(), error = %e, "model call failed"))?;

        let extraction = extract_recipes_with(&reply, self.policy).inspect_err(|e| {
            warn!(kind = e.kind(), error = %e, "could not extract recipes from model reply");
            if let ExtractionError::MalformedJson { candidate, .. } = e {
                debug!(%candidate, "rejected JSON candidate");
            }
        })?;

        if extraction.dropped > 0 {
            warn!(dropped = extraction.dropped, "dropped invalid recipes");
        }
        info!(count = extraction.collection.len(), "recipes extracted");
        Ok(extraction)
    }
}
