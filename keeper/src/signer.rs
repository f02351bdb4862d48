use crate::error::{Error, Result};
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use ed25519_dalek::{Signer, SigningKey};
use std::fmt;

type Blake2b256 = Blake2b<U32>;

const ED25519_FLAG: u8 = 0x00;
// intent scope TransactionData, version V0, app Sui
const TX_INTENT: [u8; 3] = [0, 0, 0];
const TX_DIGEST_SALT: &[u8] = b"TransactionData::";
const SUI_PRIVKEY_HRP: &str = "suiprivkey";

/// The keeper's signing credential.
pub struct KeeperKey {
    signing: SigningKey,
    address: String,
}

impl fmt::Debug for KeeperKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeeperKey").field("address", &self.address).finish()
    }
}

impl KeeperKey {
    /// Accepts a bech32 `suiprivkey` string, a base64 keystore entry
    /// (`flag || key`), or a raw base64 or hex 32-byte seed.
    pub fn from_secret(secret: &str) -> Result<Self> {
        let secret = secret.trim();
        if secret.starts_with(SUI_PRIVKEY_HRP) {
            return Self::from_bech32(secret);
        }

        let seed = if secret.starts_with("0x") || (secret.len() == 64 && secret.bytes().all(|b| b.is_ascii_hexdigit())) {
            crate::utils::decode_hex(secret)
                .map_err(|e| Error::Config(format!("admin secret is not valid hex: {}", e)))?
        } else {
            let raw = BASE64_STANDARD
                .decode(secret)
                .map_err(|e| Error::Config(format!("admin secret is not valid base64: {}", e)))?;
            match raw.len() {
                33 => flagged_seed(&raw)?,
                // legacy keystore: secret || public
                64 => raw[..32].to_vec(),
                _ => raw,
            }
        };

        Self::from_seed_bytes(&seed)
    }

    /// `suiprivkey1...` as printed by `sui keytool export`.
    fn from_bech32(secret: &str) -> Result<Self> {
        let (hrp, data) = bech32::decode(secret)
            .map_err(|e| Error::Config(format!("admin secret is not valid bech32: {}", e)))?;
        if hrp.as_str() != SUI_PRIVKEY_HRP {
            return Err(Error::Config(format!("unexpected bech32 prefix {}", hrp)));
        }
        if data.len() != 33 {
            return Err(Error::Config(format!(
                "bech32 admin secret must be 33 bytes, got {}",
                data.len()
            )));
        }
        Self::from_seed_bytes(&flagged_seed(&data)?)
    }

    fn from_seed_bytes(seed: &[u8]) -> Result<Self> {
        let seed: [u8; 32] = seed
            .try_into()
            .map_err(|_| Error::Config(format!("admin secret must be 32 bytes, got {}", seed.len())))?;
        Ok(Self::from_seed(seed))
    }

    pub fn from_seed(seed: [u8; 32]) -> Self {
        let signing = SigningKey::from_bytes(&seed);
        let public = signing.verifying_key().to_bytes();

        let mut hasher = Blake2b256::new();
        hasher.update([ED25519_FLAG]);
        hasher.update(public);
        let address = format!("0x{}", hex::encode(hasher.finalize()));

        Self { signing, address }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.signing.verifying_key().to_bytes()
    }

    /// Sign BCS transaction bytes, returning the base64 `flag || sig || pubkey`
    /// blob the json-rpc expects.
    pub fn sign_transaction(&self, tx_bytes: &[u8]) -> String {
        let digest = intent_digest(tx_bytes);
        let signature = self.signing.sign(&digest);

        let mut serialized = Vec::with_capacity(1 + 64 + 32);
        serialized.push(ED25519_FLAG);
        serialized.extend_from_slice(&signature.to_bytes());
        serialized.extend_from_slice(&self.public_key());
        BASE64_STANDARD.encode(serialized)
    }
}

/// Strip the scheme flag from `flag || seed`, accepting only ed25519.
fn flagged_seed(raw: &[u8]) -> Result<Vec<u8>> {
    match raw.split_first() {
        Some((&ED25519_FLAG, seed)) => Ok(seed.to_vec()),
        Some((flag, _)) => Err(Error::Config(format!(
            "unsupported key scheme flag {:#04x}, only ed25519 is supported",
            flag
        ))),
        None => Err(Error::Config("admin secret is empty".to_string())),
    }
}

/// Base58 digest the fullnode reports for these BCS transaction bytes.
pub fn transaction_digest(tx_bytes: &[u8]) -> String {
    let mut hasher = Blake2b256::new();
    hasher.update(TX_DIGEST_SALT);
    hasher.update(tx_bytes);
    bs58::encode(hasher.finalize()).into_string()
}

fn intent_digest(tx_bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(TX_INTENT);
    hasher.update(tx_bytes);
    hasher.finalize().into()
}
