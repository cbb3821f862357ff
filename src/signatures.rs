use near_sdk::borsh::BorshSerialize;
use near_sdk::json_types::Base58CryptoHash;
use near_sdk::store::LookupMap;
use near_sdk::{env, near, AccountId, CryptoHash, CurveType, PublicKey};

use crate::config::HtlcConfig;
use crate::order::OrderId;

pub const DOMAIN_TYPE: &str =
    "Domain(string name,string version,bytes32 chainContext,string verifyingContract)";
pub const INITIATE_TYPE: &str =
    "Initiate(string redeemer,uint64 timelock,uint128 amount,bytes32 secretHash)";
pub const REFUND_TYPE: &str = "Refund(bytes32 orderId)";

/// Everything a signature is bound to besides its message. A signature made for
/// one deployment or network never verifies on another.
#[derive(Clone, Debug, PartialEq)]
pub struct Domain {
    pub name: String,
    pub version: String,
    pub chain_context: CryptoHash,
    pub verifying_contract: AccountId,
}

impl Domain {
    pub fn new(config: &HtlcConfig, verifying_contract: AccountId) -> Self {
        Self {
            name: config.name.clone(),
            version: config.version.clone(),
            chain_context: config.chain_context(),
            verifying_contract,
        }
    }

    pub fn separator(&self) -> CryptoHash {
        let mut preimage = Vec::with_capacity(32 * 5);
        preimage.extend_from_slice(&env::sha256_array(DOMAIN_TYPE.as_bytes()));
        preimage.extend_from_slice(&env::sha256_array(self.name.as_bytes()));
        preimage.extend_from_slice(&env::sha256_array(self.version.as_bytes()));
        preimage.extend_from_slice(&self.chain_context);
        preimage.extend_from_slice(&env::sha256_array(self.verifying_contract.as_str().as_bytes()));
        env::sha256_array(&preimage)
    }

    /// The 32 bytes a party signs to authorize `message` under this domain.
    pub fn digest<M: TypedMessage>(&self, message: &M) -> CryptoHash {
        let mut preimage = Vec::with_capacity(2 + 32 * 2);
        preimage.extend_from_slice(b"\x19\x01");
        preimage.extend_from_slice(&self.separator());
        preimage.extend_from_slice(&message.struct_hash());
        env::sha256_array(&preimage)
    }
}

#[near(serializers = [json])]
#[derive(Clone, Debug, PartialEq)]
pub struct DomainView {
    pub name: String,
    pub version: String,
    pub chain_context: Base58CryptoHash,
    pub verifying_contract: AccountId,
    pub separator: Base58CryptoHash,
}

impl From<&Domain> for DomainView {
    fn from(domain: &Domain) -> Self {
        Self {
            name: domain.name.clone(),
            version: domain.version.clone(),
            chain_context: domain.chain_context.into(),
            verifying_contract: domain.verifying_contract.clone(),
            separator: domain.separator().into(),
        }
    }
}

/// A structured message with a fixed type string and canonical borsh encoding.
pub trait TypedMessage: BorshSerialize {
    const TYPE: &'static str;

    fn struct_hash(&self) -> CryptoHash {
        let mut buffer = env::sha256_array(Self::TYPE.as_bytes()).to_vec();
        self.serialize(&mut buffer).expect("Serialization failed");
        env::sha256_array(&buffer)
    }
}

/// Initiator's authorization for a relayer to open an order on their behalf.
#[near(serializers = [borsh])]
#[derive(Clone, Debug)]
pub struct Initiate {
    pub redeemer: AccountId,
    pub timelock: u64,
    pub amount: u128,
    pub secret_hash: CryptoHash,
}

impl TypedMessage for Initiate {
    const TYPE: &'static str = INITIATE_TYPE;
}

/// Redeemer's consent to return an order's funds before its timelock expires.
#[near(serializers = [borsh])]
#[derive(Clone, Debug)]
pub struct Refund {
    pub order_id: OrderId,
}

impl TypedMessage for Refund {
    const TYPE: &'static str = REFUND_TYPE;
}

/// An ed25519 signature together with the key that produced it.
#[derive(Clone, Debug)]
pub struct DetachedSignature {
    pub public_key: PublicKey,
    pub signature: Vec<u8>,
}

/// Recovers the account that authorized `message` under `domain`, if any.
pub trait SignatureVerifier {
    fn recover<M: TypedMessage>(
        &self,
        domain: &Domain,
        message: &M,
        signature: &DetachedSignature,
    ) -> Option<AccountId>;
}

/// Verifies against keys accounts proved ownership of through `register_key`.
pub struct RegisteredKeys<'a> {
    owners: &'a LookupMap<PublicKey, AccountId>,
}

impl<'a> RegisteredKeys<'a> {
    pub fn new(owners: &'a LookupMap<PublicKey, AccountId>) -> Self {
        Self { owners }
    }
}

impl SignatureVerifier for RegisteredKeys<'_> {
    fn recover<M: TypedMessage>(
        &self,
        domain: &Domain,
        message: &M,
        signed: &DetachedSignature,
    ) -> Option<AccountId> {
        let owner = self.owners.get(&signed.public_key)?;
        let public_key = ed25519_key_bytes(&signed.public_key)?;
        let signature: [u8; 64] = signed.signature.as_slice().try_into().ok()?;

        let digest = domain.digest(message);
        env::ed25519_verify(&signature, &digest, &public_key).then(|| owner.clone())
    }
}

fn ed25519_key_bytes(public_key: &PublicKey) -> Option<[u8; 32]> {
    if public_key.curve_type() != CurveType::ED25519 {
        return None;
    }
    public_key.as_bytes()[1..].try_into().ok()
}

#[cfg(test)]
pub(crate) mod test_keys {
    use ed25519_dalek::{Signer, SigningKey};
    use near_sdk::{bs58, CryptoHash, PublicKey};

    /// Deterministic ed25519 keypair for a test party.
    pub fn signing_key(seed: u8) -> SigningKey {
        SigningKey::from_bytes(&[seed; 32])
    }

    pub fn public_key(key: &SigningKey) -> PublicKey {
        format!(
            "ed25519:{}",
            bs58::encode(key.verifying_key().as_bytes()).into_string()
        )
        .parse()
        .unwrap()
    }

    pub fn sign(key: &SigningKey, digest: &CryptoHash) -> Vec<u8> {
        key.sign(digest).to_bytes().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::test_keys::*;
    use super::*;

    fn account(name: &str) -> AccountId {
        name.parse().unwrap()
    }

    fn domain() -> Domain {
        let config = HtlcConfig::new(
            account("token.testnet"),
            "HTLC".into(),
            "1".into(),
            "testnet".into(),
        )
        .unwrap();
        Domain::new(&config, account("htlc.testnet"))
    }

    fn refund() -> Refund {
        Refund { order_id: [9u8; 32] }
    }

    #[test]
    fn separator_binds_contract_and_network() {
        let base = domain();
        let other_contract = Domain {
            verifying_contract: account("other-htlc.testnet"),
            ..base.clone()
        };
        let other_network = Domain {
            chain_context: env::sha256_array(b"mainnet"),
            ..base.clone()
        };
        let other_version = Domain {
            version: "2".into(),
            ..base.clone()
        };
        assert_ne!(base.separator(), other_contract.separator());
        assert_ne!(base.separator(), other_network.separator());
        assert_ne!(base.separator(), other_version.separator());
        assert_ne!(base.digest(&refund()), other_contract.digest(&refund()));
    }

    #[test]
    fn message_types_do_not_collide() {
        let initiate = Initiate {
            redeemer: account("bob.testnet"),
            timelock: 7200,
            amount: 100,
            secret_hash: [1u8; 32],
        };
        let changed = Initiate {
            amount: 101,
            ..initiate.clone()
        };
        assert_ne!(initiate.struct_hash(), changed.struct_hash());
        assert_ne!(initiate.struct_hash(), refund().struct_hash());
    }

    #[test]
    fn recovers_registered_signer() {
        let alice_key = signing_key(1);
        let mut owners = LookupMap::new(b"o");
        owners.insert(public_key(&alice_key), account("alice.testnet"));
        let verifier = RegisteredKeys::new(&owners);

        let domain = domain();
        let signed = DetachedSignature {
            public_key: public_key(&alice_key),
            signature: sign(&alice_key, &domain.digest(&refund())),
        };

        assert_eq!(
            verifier.recover(&domain, &refund(), &signed),
            Some(account("alice.testnet"))
        );
    }

    #[test]
    fn rejects_foreign_domain_and_unknown_keys() {
        let alice_key = signing_key(1);
        let stranger_key = signing_key(2);
        let mut owners = LookupMap::new(b"o");
        owners.insert(public_key(&alice_key), account("alice.testnet"));
        let verifier = RegisteredKeys::new(&owners);
        let domain = domain();

        let foreign = Domain {
            verifying_contract: account("other-htlc.testnet"),
            ..domain.clone()
        };
        let replayed = DetachedSignature {
            public_key: public_key(&alice_key),
            signature: sign(&alice_key, &foreign.digest(&refund())),
        };
        assert_eq!(verifier.recover(&domain, &refund(), &replayed), None);

        let unregistered = DetachedSignature {
            public_key: public_key(&stranger_key),
            signature: sign(&stranger_key, &domain.digest(&refund())),
        };
        assert_eq!(verifier.recover(&domain, &refund(), &unregistered), None);

        let truncated = DetachedSignature {
            public_key: public_key(&alice_key),
            signature: vec![0u8; 10],
        };
        assert_eq!(verifier.recover(&domain, &refund(), &truncated), None);
    }
}
