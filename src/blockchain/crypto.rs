use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors that can occur during cryptographic operations
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Decoding error: {0}")]
    DecodingError(String),
}

/// Number of hex characters of the public-key hash kept as an address.
const ADDRESS_LEN: usize = 40;

/// Computes the SHA-256 digest of `data` as a lowercase hex string.
///
/// This is the single hash entry point shared by block hashing, transaction
/// identifiers and the Merkle builder, so all of them stay byte-exact with
/// any other implementation of the same scheme.
pub fn sha256_hex(data: impl AsRef<[u8]>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_ref());
    format!("{:x}", hasher.finalize())
}

/// Derives an address from a hex-encoded public key.
///
/// The address is the first 40 hex characters of `sha256(pubkey_hex)`.
/// This truncation is a demo convenience and is not collision-hardened;
/// do not reuse it in anything that handles real value.
pub fn address_from_public_key(public_key_hex: &str) -> String {
    let mut hash = sha256_hex(public_key_hex);
    hash.truncate(ADDRESS_LEN);
    hash
}

/// An ed25519 keypair used to sign transactions
#[derive(Debug, Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl KeyPair {
    /// Generates a new random keypair
    pub fn generate() -> Self {
        let mut csprng = OsRng;
        let signing_key = SigningKey::generate(&mut csprng);
        let verifying_key = VerifyingKey::from(&signing_key);

        KeyPair {
            signing_key,
            verifying_key,
        }
    }

    /// Reconstructs a keypair from a hex-encoded secret key
    pub fn from_secret_hex(secret_hex: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(secret_hex.trim())
            .map_err(|e| CryptoError::DecodingError(e.to_string()))?;

        let bytes_array: [u8; 32] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidPrivateKey("secret key must be 32 bytes".to_string())
        })?;

        let signing_key = SigningKey::from_bytes(&bytes_array);
        let verifying_key = VerifyingKey::from(&signing_key);

        Ok(KeyPair {
            signing_key,
            verifying_key,
        })
    }

    /// Hex encoding of the public key, as carried in transactions
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.verifying_key.as_bytes())
    }

    /// Hex encoding of the secret key, for export to the shell user
    pub fn secret_key_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }

    /// Address derived from this keypair's public key
    pub fn address(&self) -> String {
        address_from_public_key(&self.public_key_hex())
    }

    /// Signs a message, returning the signature as hex
    pub fn sign(&self, message: &str) -> String {
        let signature = self.signing_key.sign(message.as_bytes());
        hex::encode(signature.to_bytes())
    }
}

/// Verifies a hex-encoded signature over `message` against a hex-encoded
/// public key.
///
/// Returns `Ok(false)` when the signature does not match; errors are
/// reserved for material that cannot be decoded at all.
pub fn verify(
    public_key_hex: &str,
    message: &str,
    signature_hex: &str,
) -> Result<bool, CryptoError> {
    let key_bytes = hex::decode(public_key_hex)
        .map_err(|e| CryptoError::DecodingError(e.to_string()))?;
    let key_array: [u8; 32] = key_bytes
        .try_into()
        .map_err(|_| CryptoError::InvalidPublicKey("public key must be 32 bytes".to_string()))?;
    let verifying_key = VerifyingKey::from_bytes(&key_array)
        .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;

    let sig_bytes = hex::decode(signature_hex)
        .map_err(|e| CryptoError::DecodingError(e.to_string()))?;
    let sig_array: [u8; 64] = sig_bytes
        .try_into()
        .map_err(|_| CryptoError::InvalidSignature("signature must be 64 bytes".to_string()))?;
    let signature = Signature::from_bytes(&sig_array);

    Ok(verifying_key.verify(message.as_bytes(), &signature).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let keypair = KeyPair::generate();
        let message = "from=abc;to=def;amount=5;nonce=1";

        let signature = keypair.sign(message);
        assert!(verify(&keypair.public_key_hex(), message, &signature).unwrap());

        // A different message must not verify
        let other = "from=abc;to=def;amount=6;nonce=1";
        assert!(!verify(&keypair.public_key_hex(), other, &signature).unwrap());
    }

    #[test]
    fn test_address_shape() {
        let keypair = KeyPair::generate();
        let address = keypair.address();

        assert_eq!(address.len(), 40);
        assert!(address.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_secret_key_round_trip() {
        let keypair = KeyPair::generate();
        let restored = KeyPair::from_secret_hex(&keypair.secret_key_hex()).unwrap();

        assert_eq!(restored.public_key_hex(), keypair.public_key_hex());
        assert_eq!(restored.address(), keypair.address());
    }

    #[test]
    fn test_sha256_hex_is_stable() {
        // Known SHA-256 of the empty string
        assert_eq!(
            sha256_hex(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_verify_rejects_garbage_key() {
        let keypair = KeyPair::generate();
        let signature = keypair.sign("message");

        assert!(verify("zzzz", "message", &signature).is_err());
    }
}
