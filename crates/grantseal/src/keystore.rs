//! Integrity keystore.
//!
//! Holds the signing keys used by the checksum token encoding. The store is
//! read-only once built and must contain at least one key flagged for the
//! `sig` use, otherwise construction fails so a misconfigured server never
//! starts.
//!
//! ## Supported Algorithms
//!
//! - **HS256**: HMAC with SHA-256 (shared secret, never exported)
//! - **RS256** / **RS384**: RSA with SHA-256 / SHA-384
//! - **ES384**: ECDSA with P-384 curve

use std::fmt;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
use p384::SecretKey as EcSecretKey;
use p384::ecdsa::SigningKey as EcSigningKey;
use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};

use crate::codec::CodecError;
use crate::error::TokenError;

/// Message of the startup failure when no signing key is configured.
pub const MISSING_SIGNING_KEY: &str = "at least one signing key must be provided for integrity";

/// Supported signing algorithms for checksum tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SigningAlgorithm {
    /// HMAC with SHA-256.
    HS256,
    /// RSA with SHA-256.
    RS256,
    /// RSA with SHA-384.
    RS384,
    /// ECDSA with P-384 curve.
    ES384,
}

impl SigningAlgorithm {
    /// Converts to the `jsonwebtoken` Algorithm type.
    #[must_use]
    pub fn to_jwt_algorithm(self) -> Algorithm {
        match self {
            Self::HS256 => Algorithm::HS256,
            Self::RS256 => Algorithm::RS256,
            Self::RS384 => Algorithm::RS384,
            Self::ES384 => Algorithm::ES384,
        }
    }

    /// Returns the algorithm name as used in JWK/JWT headers.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HS256 => "HS256",
            Self::RS256 => "RS256",
            Self::RS384 => "RS384",
            Self::ES384 => "ES384",
        }
    }

    /// Returns `true` if this is an RSA-based algorithm.
    #[must_use]
    pub fn is_rsa(&self) -> bool {
        matches!(self, Self::RS256 | Self::RS384)
    }

    /// Returns `true` if this is a symmetric algorithm.
    #[must_use]
    pub fn is_symmetric(&self) -> bool {
        matches!(self, Self::HS256)
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Intended use of a key (`use` member of a JWK).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyUse {
    /// Signing and verification.
    Sig,
    /// Encryption.
    Enc,
}

impl KeyUse {
    /// Returns the JWK `use` value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sig => "sig",
            Self::Enc => "enc",
        }
    }
}

/// JSON Web Key Set of the public halves of the keystore.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Jwks {
    /// The keys in this set.
    pub keys: Vec<Jwk>,
}

/// JSON Web Key (public part only).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type ("RSA" or "EC").
    pub kty: String,

    /// Key ID.
    pub kid: String,

    /// Key use ("sig" for signing).
    #[serde(rename = "use")]
    pub use_: String,

    /// Algorithm.
    pub alg: String,

    /// RSA modulus (base64url encoded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,

    /// RSA exponent (base64url encoded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,

    /// EC curve name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,

    /// EC x coordinate (base64url encoded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,

    /// EC y coordinate (base64url encoded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
}

/// Public key material kept for JWKS export.
enum PublicKeyData {
    Rsa { n: Vec<u8>, e: Vec<u8> },
    Ec { x: Vec<u8>, y: Vec<u8> },
    Secret,
}

/// A single key of the integrity keystore.
pub struct IntegrityKey {
    /// Key ID, written to the `kid` header of signed payloads.
    pub kid: String,

    /// Signing algorithm the key is bound to.
    pub algorithm: SigningAlgorithm,

    /// Intended use.
    pub key_use: KeyUse,

    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    public_key_data: PublicKeyData,
}

impl IntegrityKey {
    /// Creates an HMAC key from a shared secret.
    ///
    /// # Errors
    /// Returns an error if the secret is shorter than 32 bytes.
    pub fn from_secret(kid: impl Into<String>, secret: &[u8]) -> Result<Self, CodecError> {
        if secret.len() < 32 {
            return Err(CodecError::invalid_key(
                "HS256 secret must be at least 32 bytes",
            ));
        }

        Ok(Self {
            kid: kid.into(),
            algorithm: SigningAlgorithm::HS256,
            key_use: KeyUse::Sig,
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            public_key_data: PublicKeyData::Secret,
        })
    }

    /// Generates a new RSA key pair.
    ///
    /// # Errors
    /// Returns an error if key generation fails or algorithm is not RSA-based.
    pub fn generate_rsa(algorithm: SigningAlgorithm) -> Result<Self, CodecError> {
        if !algorithm.is_rsa() {
            return Err(CodecError::invalid_key(format!(
                "Algorithm {algorithm} is not RSA-based"
            )));
        }

        let private_key = RsaPrivateKey::new(&mut OsRng, 2048)
            .map_err(|e| CodecError::invalid_key(e.to_string()))?;
        let public_key = private_key.to_public_key();

        let private_pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| CodecError::invalid_key(e.to_string()))?;
        let public_pem = public_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| CodecError::invalid_key(e.to_string()))?;

        Self::from_pem(
            uuid::Uuid::new_v4().to_string(),
            algorithm,
            &private_pem,
            &public_pem,
        )
    }

    /// Generates a new EC key pair using P-384 curve.
    ///
    /// # Errors
    /// Returns an error if key generation fails.
    pub fn generate_ec() -> Result<Self, CodecError> {
        let secret_key = EcSecretKey::random(&mut OsRng);
        let private_pem = secret_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| CodecError::invalid_key(e.to_string()))?;

        Self::from_pem(
            uuid::Uuid::new_v4().to_string(),
            SigningAlgorithm::ES384,
            &private_pem,
            "",
        )
    }

    /// Loads a key pair from PKCS#8 PEM strings.
    ///
    /// The public PEM is only read for RSA keys; EC public points are
    /// derived from the private key.
    ///
    /// # Errors
    /// Returns an error if the PEM data is invalid or the algorithm is HS256.
    pub fn from_pem(
        kid: impl Into<String>,
        algorithm: SigningAlgorithm,
        private_pem: &str,
        public_pem: &str,
    ) -> Result<Self, CodecError> {
        let (encoding_key, decoding_key, public_key_data) = match algorithm {
            SigningAlgorithm::HS256 => {
                return Err(CodecError::invalid_key(
                    "HS256 keys are built from a secret, not PEM",
                ));
            }
            SigningAlgorithm::RS256 | SigningAlgorithm::RS384 => {
                let encoding_key = EncodingKey::from_rsa_pem(private_pem.as_bytes())
                    .map_err(|e| CodecError::invalid_key(e.to_string()))?;
                let decoding_key = DecodingKey::from_rsa_pem(public_pem.as_bytes())
                    .map_err(|e| CodecError::invalid_key(e.to_string()))?;

                let public_key = RsaPublicKey::from_public_key_pem(public_pem)
                    .map_err(|e| CodecError::invalid_key(e.to_string()))?;
                let n = public_key.n().to_bytes_be();
                let e = public_key.e().to_bytes_be();

                (encoding_key, decoding_key, PublicKeyData::Rsa { n, e })
            }
            SigningAlgorithm::ES384 => {
                let encoding_key = EncodingKey::from_ec_pem(private_pem.as_bytes())
                    .map_err(|e| CodecError::invalid_key(e.to_string()))?;

                let secret_key = EcSecretKey::from_pkcs8_pem(private_pem)
                    .map_err(|e| CodecError::invalid_key(e.to_string()))?;
                let signing_key = EcSigningKey::from(&secret_key);
                let point = signing_key.verifying_key().to_encoded_point(false);
                let x = point
                    .x()
                    .ok_or_else(|| CodecError::invalid_key("Missing x coordinate"))?;
                let y = point
                    .y()
                    .ok_or_else(|| CodecError::invalid_key("Missing y coordinate"))?;

                let decoding_key = DecodingKey::from_ec_components(
                    &URL_SAFE_NO_PAD.encode(&x[..]),
                    &URL_SAFE_NO_PAD.encode(&y[..]),
                )
                .map_err(|e| CodecError::invalid_key(e.to_string()))?;

                (
                    encoding_key,
                    decoding_key,
                    PublicKeyData::Ec {
                        x: x.to_vec(),
                        y: y.to_vec(),
                    },
                )
            }
        };

        Ok(Self {
            kid: kid.into(),
            algorithm,
            key_use: KeyUse::Sig,
            encoding_key,
            decoding_key,
            public_key_data,
        })
    }

    /// Re-flags the key for another use.
    #[must_use]
    pub fn with_use(mut self, key_use: KeyUse) -> Self {
        self.key_use = key_use;
        self
    }

    pub(crate) fn encoding_key(&self) -> &EncodingKey {
        &self.encoding_key
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }

    /// Exports the public key as a JWK. Symmetric keys have no public half.
    #[must_use]
    pub fn to_jwk(&self) -> Option<Jwk> {
        let jwk = match &self.public_key_data {
            PublicKeyData::Rsa { n, e } => Jwk {
                kty: "RSA".to_string(),
                kid: self.kid.clone(),
                use_: self.key_use.as_str().to_string(),
                alg: self.algorithm.as_str().to_string(),
                n: Some(URL_SAFE_NO_PAD.encode(n)),
                e: Some(URL_SAFE_NO_PAD.encode(e)),
                crv: None,
                x: None,
                y: None,
            },
            PublicKeyData::Ec { x, y } => Jwk {
                kty: "EC".to_string(),
                kid: self.kid.clone(),
                use_: self.key_use.as_str().to_string(),
                alg: self.algorithm.as_str().to_string(),
                n: None,
                e: None,
                crv: Some("P-384".to_string()),
                x: Some(URL_SAFE_NO_PAD.encode(x)),
                y: Some(URL_SAFE_NO_PAD.encode(y)),
            },
            PublicKeyData::Secret => return None,
        };
        Some(jwk)
    }
}

impl fmt::Debug for IntegrityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntegrityKey")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .field("key_use", &self.key_use)
            .finish_non_exhaustive()
    }
}

/// Read-only set of integrity keys.
#[derive(Debug)]
pub struct IntegrityKeystore {
    keys: Vec<IntegrityKey>,
    signing: usize,
}

impl IntegrityKeystore {
    /// Builds the keystore.
    ///
    /// # Errors
    /// Returns a configuration error if no key is flagged for `sig`.
    pub fn new(keys: Vec<IntegrityKey>) -> Result<Self, TokenError> {
        let Some(signing) = keys.iter().position(|k| k.key_use == KeyUse::Sig) else {
            return Err(TokenError::configuration(MISSING_SIGNING_KEY));
        };
        Ok(Self { keys, signing })
    }

    /// Returns the first key flagged for `key_use`.
    #[must_use]
    pub fn get(&self, key_use: KeyUse) -> Option<&IntegrityKey> {
        self.keys.iter().find(|k| k.key_use == key_use)
    }

    /// Returns the signing key used for new tokens.
    #[must_use]
    pub fn signing_key(&self) -> &IntegrityKey {
        &self.keys[self.signing]
    }

    /// Finds a signing key by its ID.
    #[must_use]
    pub fn find(&self, kid: &str) -> Option<&IntegrityKey> {
        self.keys
            .iter()
            .find(|k| k.key_use == KeyUse::Sig && k.kid == kid)
    }

    /// Returns the number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` if the store holds no key (never the case once built).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Returns the JWKS containing the public halves of asymmetric keys.
    #[must_use]
    pub fn jwks(&self) -> Jwks {
        Jwks {
            keys: self.keys.iter().filter_map(IntegrityKey::to_jwk).collect(),
        }
    }
}
