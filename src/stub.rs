use async_trait::async_trait;
use vault_transform::{
    RequestContext, TransformKind, TransformRequest, TransformResult, Transformer, VaultError,
};

/// Transformer for stub environments: every value maps to itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityTransformer;

#[async_trait]
impl Transformer for IdentityTransformer {
    async fn transform(
        &self,
        _ctx: &RequestContext,
        kind: TransformKind,
        _role: &str,
        items: Vec<TransformRequest>,
    ) -> Result<Vec<TransformResult>, VaultError> {
        Ok(items
            .into_iter()
            .map(|item| {
                let (encoded_value, decoded_value) = match kind {
                    TransformKind::Encode => (Some(item.value), None),
                    TransformKind::Decode => (None, Some(item.value)),
                };
                TransformResult {
                    encoded_value,
                    decoded_value,
                    reference: item.reference,
                    errors: None,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_echoes_values_on_the_matching_side() {
        let items = vec![TransformRequest {
            value: "4111".to_string(),
            reference: "0".to_string(),
            ..TransformRequest::default()
        }];

        let encoded = IdentityTransformer
            .transform(&RequestContext::new(), TransformKind::Encode, "pan", items.clone())
            .await
            .unwrap();
        assert_eq!(encoded[0].encoded_value.as_deref(), Some("4111"));
        assert_eq!(encoded[0].reference, "0");

        let decoded = IdentityTransformer
            .transform(&RequestContext::new(), TransformKind::Decode, "pan", items)
            .await
            .unwrap();
        assert_eq!(decoded[0].decoded_value.as_deref(), Some("4111"));
        assert!(decoded[0].encoded_value.is_none());
    }
}
