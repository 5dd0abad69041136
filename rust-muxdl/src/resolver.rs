//! Variant resolution: ask the provider once, partition what it returns.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::{MediaDetails, VariantCatalog};
use crate::extractor::MetadataProvider;
use crate::{Error, Result};

#[derive(Clone)]
pub struct VariantResolver {
    provider: Arc<dyn MetadataProvider>,
}

impl VariantResolver {
    pub fn new(provider: Arc<dyn MetadataProvider>) -> Self {
        Self { provider }
    }

    /// Resolve the full details of `url`. Provider failures are never
    /// retried and surface as `Error::Provider`.
    pub async fn resolve_details(&self, url: &str) -> Result<MediaDetails> {
        debug!(provider = self.provider.name(), url = %url, "Resolving variants");
        let details = self.provider.extract(url).await.map_err(|e| {
            warn!(provider = self.provider.name(), url = %url, error = %e, "Resolution failed");
            Error::from(e)
        })?;
        debug!(url = %url, variants = details.variants.len(), "Resolved");
        Ok(details)
    }

    /// Resolve `url` and partition its variants by capability.
    pub async fn resolve(&self, url: &str) -> Result<VariantCatalog> {
        Ok(self.resolve_details(url).await?.catalog())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StreamVariant;
    use crate::extractor::ExtractorError;
    use async_trait::async_trait;

    struct Fixed(Option<Vec<StreamVariant>>);

    #[async_trait]
    impl MetadataProvider for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn extract(&self, url: &str) -> std::result::Result<MediaDetails, ExtractorError> {
            match &self.0 {
                Some(variants) => Ok(MediaDetails::new(url, "t", variants.clone())),
                None => Err(ExtractorError::InvalidUrl(url.to_string())),
            }
        }
    }

    #[tokio::test]
    async fn test_partition_is_disjoint_and_drops_empty_variants() {
        let resolver = VariantResolver::new(Arc::new(Fixed(Some(vec![
            StreamVariant::new("A1", true, false, "m4a"),
            StreamVariant::new("V1", false, true, "mp4"),
            StreamVariant::new("C1", true, true, "mp4"),
            StreamVariant::new("SB", false, false, "mhtml"),
            StreamVariant::new("A2", true, false, "webm"),
        ]))));

        let catalog = resolver.resolve("u1").await.unwrap();
        let ids = |v: &[StreamVariant]| v.iter().map(|s| s.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&catalog.audio_only), vec!["A1", "A2"]);
        assert_eq!(ids(&catalog.video_only), vec!["V1"]);
        assert_eq!(ids(&catalog.combined), vec!["C1"]);
        assert_eq!(catalog.len(), 4);
    }

    #[tokio::test]
    async fn test_provider_failure_is_provider_error() {
        let resolver = VariantResolver::new(Arc::new(Fixed(None)));
        let err = resolver.resolve("not a url").await.unwrap_err();
        assert!(matches!(err, Error::Provider(_)));
    }
}
