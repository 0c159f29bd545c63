//! Release signing keys compiled into the binary.

use crate::signature::parse_public_key;

const HASHICORP_KEY: &str = include_str!("../keys/hashicorp.asc");
const OPENTOFU_KEY: &str = include_str!("../keys/opentofu.asc");

/// A vendor key trusted to sign `SHA256SUMS` files without configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustAnchor {
    HashiCorp,
    OpenTofu,
}

impl TrustAnchor {
    /// The anchor for a release product, matched case-insensitively.
    pub fn for_product(product: &str) -> Option<Self> {
        match product.to_ascii_lowercase().as_str() {
            "terraform" => Some(Self::HashiCorp),
            "opentofu" | "tofu" => Some(Self::OpenTofu),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::HashiCorp => "HashiCorp",
            Self::OpenTofu => "OpenTofu",
        }
    }

    fn bundled(&self) -> &'static str {
        match self {
            Self::HashiCorp => HASHICORP_KEY,
            Self::OpenTofu => OPENTOFU_KEY,
        }
    }

    /// The armored key, or `None` while the bundled file is still a placeholder.
    ///
    /// A placeholder never parses, so callers skip the anchor instead of
    /// failing every verification against it.
    pub fn armored(&self) -> Option<&'static str> {
        let key = self.bundled();
        parse_public_key(key).is_ok().then_some(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_product() {
        assert_eq!(TrustAnchor::for_product("terraform"), Some(TrustAnchor::HashiCorp));
        assert_eq!(TrustAnchor::for_product("Terraform"), Some(TrustAnchor::HashiCorp));
        assert_eq!(TrustAnchor::for_product("opentofu"), Some(TrustAnchor::OpenTofu));
        assert_eq!(TrustAnchor::for_product("tofu"), Some(TrustAnchor::OpenTofu));
        assert_eq!(TrustAnchor::for_product("custom"), None);
        assert_eq!(TrustAnchor::OpenTofu.name(), "OpenTofu");
    }

    #[test]
    fn test_bundled_keys_are_armor_blocks() {
        for anchor in [TrustAnchor::HashiCorp, TrustAnchor::OpenTofu] {
            let key = anchor.bundled();
            assert!(key.contains("-----BEGIN PGP PUBLIC KEY BLOCK-----"));
            assert!(key.contains("-----END PGP PUBLIC KEY BLOCK-----"));
            if key.contains("<INSERT_") {
                assert_eq!(anchor.armored(), None);
            } else {
                assert_eq!(anchor.armored(), Some(key));
            }
        }
    }
}
