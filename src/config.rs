use near_sdk::{env, near, AccountId, CryptoHash};

use crate::error::{HtlcError, HtlcResult};

/// Deployment parameters fixed at `new`. They bind every order id and
/// signature to one token, one protocol version and one network.
#[near(serializers = [json, borsh])]
#[derive(Clone, Debug, PartialEq)]
pub struct HtlcConfig {
    /// NEP-141 token held in escrow.
    pub token_id: AccountId,
    /// Protocol name in the signature domain, e.g. "HTLC".
    pub name: String,
    /// Protocol version in the signature domain, e.g. "1".
    pub version: String,
    /// Network this deployment lives on ("mainnet", "testnet", "sandbox", ...).
    pub chain_id: String,
}

impl HtlcConfig {
    pub fn new(
        token_id: AccountId,
        name: String,
        version: String,
        chain_id: String,
    ) -> HtlcResult<Self> {
        let config = Self {
            token_id,
            name,
            version,
            chain_id,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> HtlcResult<()> {
        if self.name.trim().is_empty() {
            return Err(HtlcError::InvalidConfig("empty domain name"));
        }
        if self.version.trim().is_empty() {
            return Err(HtlcError::InvalidConfig("empty domain version"));
        }
        if self.chain_id.trim().is_empty() {
            return Err(HtlcError::InvalidConfig("empty chain id"));
        }
        Ok(())
    }

    /// Fixed-width encoding of the network, used in order ids and signature domains.
    pub fn chain_context(&self) -> CryptoHash {
        env::sha256_array(self.chain_id.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token() -> AccountId {
        "token.testnet".parse().unwrap()
    }

    #[test]
    fn rejects_empty_fields() {
        let err = HtlcConfig::new(token(), " ".into(), "1".into(), "testnet".into()).unwrap_err();
        assert_eq!(err, HtlcError::InvalidConfig("empty domain name"));

        let err = HtlcConfig::new(token(), "HTLC".into(), "".into(), "testnet".into()).unwrap_err();
        assert_eq!(err, HtlcError::InvalidConfig("empty domain version"));

        let err = HtlcConfig::new(token(), "HTLC".into(), "1".into(), "".into()).unwrap_err();
        assert_eq!(err, HtlcError::InvalidConfig("empty chain id"));
    }

    #[test]
    fn chain_context_differs_per_network() {
        let testnet =
            HtlcConfig::new(token(), "HTLC".into(), "1".into(), "testnet".into()).unwrap();
        let mainnet = HtlcConfig {
            chain_id: "mainnet".into(),
            ..testnet.clone()
        };
        assert_ne!(testnet.chain_context(), mainnet.chain_context());
        assert_eq!(testnet.chain_context(), env::sha256_array(b"testnet"));
    }
}
