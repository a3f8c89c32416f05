//! Default machine images

use crate::error::{KeelError, Result};

/// Container-optimized images by region
const REGION_IMAGES: &[(&str, &str)] = &[
    ("ap-northeast-1", "ami-0b5f2822ce1be5c05"),
    ("ap-southeast-1", "ami-0a3f70f0255af1d29"),
    ("ap-southeast-2", "ami-0c2a1acae6667e438"),
    ("eu-central-1", "ami-0ac6a7b0d46ac4a3d"),
    ("eu-west-1", "ami-0e9f1f8d3b9f2f5d1"),
    ("us-east-1", "ami-0fac5486e4cff37f4"),
    ("us-east-2", "ami-0a0c6574ce16ce87a"),
    ("us-west-1", "ami-0e0e9e9ef3f4a5c35"),
    ("us-west-2", "ami-09568291a9d6c804c"),
];

/// Looks up a machine image when none was supplied
pub trait ImageResolver {
    fn resolve(&self, region: &str) -> Result<String>;
}

/// Resolves images from a built-in region table
#[derive(Debug, Clone, Copy, Default)]
pub struct RegionImageResolver;

impl ImageResolver for RegionImageResolver {
    fn resolve(&self, region: &str) -> Result<String> {
        REGION_IMAGES
            .iter()
            .find(|(r, _)| *r == region)
            .map(|(_, id)| id.to_string())
            .ok_or_else(|| KeelError::UnsupportedRegion(region.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_region() {
        let id = RegionImageResolver.resolve("us-west-2").unwrap();
        assert!(id.starts_with("ami-"));
    }

    #[test]
    fn test_resolve_unknown_region() {
        assert!(matches!(
            RegionImageResolver.resolve("mars-north-1"),
            Err(KeelError::UnsupportedRegion(r)) if r == "mars-north-1"
        ));
    }
}
