use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use vault_transform::{
    RequestContext, TransformKind, TransformRequest, TransformResult, Transformer, VaultError,
};

type Result<T> = std::result::Result<T, TokenizerError>;

#[derive(Debug, Error)]
pub enum TokenizerError {
    #[error("failed to {operation} values")]
    Vault {
        operation: TransformKind,
        #[source]
        source: VaultError,
    },

    #[error("vault rejected {count} batch item(s): {first}")]
    ItemErrors { count: usize, first: String },

    #[error("vault returned {actual} results for {expected} values")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("vault returned no values")]
    EmptyResponse,

    #[error("vault returned unknown reference {0:?}")]
    UnknownReference(String),

    #[error("vault returned reference {0:?} more than once")]
    DuplicateReference(String),

    #[error("vault returned no value for reference {0:?}")]
    MissingValue(String),
}

impl TokenizerError {
    /// Stable reason code for callers and metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Vault { source, .. } => source.reason().code(),
            Self::ItemErrors { .. } => "TOKENIZER_ITEM_ERRORS",
            Self::LengthMismatch { .. } => "TOKENIZER_LENGTH_MISMATCH",
            Self::EmptyResponse => "TOKENIZER_EMPTY_RESPONSE",
            Self::UnknownReference(_) | Self::DuplicateReference(_) => {
                "TOKENIZER_BAD_REFERENCE"
            }
            Self::MissingValue(_) => "TOKENIZER_MISSING_VALUE",
        }
    }

    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Vault { source, .. } if source.is_retriable())
    }
}

/// Card number tokenization keyed by input value.
#[async_trait]
pub trait CardTokenizer: Send + Sync {
    /// Maps each distinct card number to its token.
    async fn encode(
        &self,
        ctx: &RequestContext,
        card_numbers: &[String],
    ) -> Result<HashMap<String, String>>;

    /// Maps each distinct token to its card number.
    async fn decode(&self, ctx: &RequestContext, tokens: &[String])
        -> Result<HashMap<String, String>>;
}

/// [`CardTokenizer`] over a batch [`Transformer`].
pub struct VaultTokenizer {
    transformer: Arc<dyn Transformer>,
    role: String,
    transformation: String,
}

impl VaultTokenizer {
    pub fn new(
        transformer: Arc<dyn Transformer>,
        role: impl Into<String>,
        transformation: impl Into<String>,
    ) -> Self {
        Self {
            transformer,
            role: role.into(),
            transformation: transformation.into(),
        }
    }

    async fn run(
        &self,
        ctx: &RequestContext,
        kind: TransformKind,
        values: &[String],
    ) -> Result<HashMap<String, String>> {
        let inputs = distinct(values);
        if inputs.is_empty() {
            return Ok(HashMap::new());
        }

        let items = inputs
            .iter()
            .enumerate()
            .map(|(i, value)| TransformRequest {
                value: (*value).to_owned(),
                transformation: self.transformation.clone(),
                reference: i.to_string(),
                ..TransformRequest::default()
            })
            .collect();

        let results = self
            .transformer
            .transform(ctx, kind, &self.role, items)
            .await
            .map_err(|source| TokenizerError::Vault {
                operation: kind,
                source,
            })?;

        let mapping = correlate(&inputs, &results).inspect_err(|e| {
            tracing::warn!(
                error = %e,
                reason = e.reason(),
                kind = %kind,
                request_id = ctx.request_id(),
                "Vault transform batch rejected"
            );
        })?;
        tracing::debug!(
            kind = %kind,
            items = mapping.len(),
            request_id = ctx.request_id(),
            "Vault transform batch done"
        );
        Ok(mapping)
    }
}

#[async_trait]
impl CardTokenizer for VaultTokenizer {
    async fn encode(
        &self,
        ctx: &RequestContext,
        card_numbers: &[String],
    ) -> Result<HashMap<String, String>> {
        self.run(ctx, TransformKind::Encode, card_numbers).await
    }

    async fn decode(
        &self,
        ctx: &RequestContext,
        tokens: &[String],
    ) -> Result<HashMap<String, String>> {
        self.run(ctx, TransformKind::Decode, tokens).await
    }
}

/// Distinct values in first-seen order.
fn distinct(values: &[String]) -> Vec<&str> {
    let mut seen = HashSet::new();
    values
        .iter()
        .map(String::as_str)
        .filter(|value| seen.insert(*value))
        .collect()
}

/// Re-associates batch results with inputs through their positional reference.
fn correlate(inputs: &[&str], results: &[TransformResult]) -> Result<HashMap<String, String>> {
    if results.len() != inputs.len() {
        return Err(TokenizerError::LengthMismatch {
            expected: inputs.len(),
            actual: results.len(),
        });
    }

    let failed: Vec<&str> = results.iter().filter_map(TransformResult::error).collect();
    if let Some(first) = failed.first() {
        return Err(TokenizerError::ItemErrors {
            count: failed.len(),
            first: (*first).to_owned(),
        });
    }

    if results.iter().all(|result| result.value().is_none()) {
        return Err(TokenizerError::EmptyResponse);
    }

    let mut mapping = HashMap::with_capacity(inputs.len());
    for result in results {
        let input = result
            .reference
            .parse::<usize>()
            .ok()
            .and_then(|index| inputs.get(index))
            .ok_or_else(|| TokenizerError::UnknownReference(result.reference.clone()))?;
        let output = result
            .value()
            .ok_or_else(|| TokenizerError::MissingValue(result.reference.clone()))?;
        if mapping
            .insert((*input).to_owned(), output.to_owned())
            .is_some()
        {
            return Err(TokenizerError::DuplicateReference(result.reference.clone()));
        }
    }
    Ok(mapping)
}
