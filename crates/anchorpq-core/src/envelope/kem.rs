//! ML-KEM keypairs, encapsulation, and public-key interchange.
//!
//! Public keys travel as DER `SubjectPublicKeyInfo` with the NIST ML-KEM
//! OIDs, so they round-trip with any standards-following peer. The
//! decapsulation key is held privately by [`KemKeyPair`] and is only
//! reachable by the sibling keystore module for persistence.

use chrono::Utc;
use ml_kem::kem::{Decapsulate, Encapsulate};
use ml_kem::{Ciphertext, Encoded, EncodedSizeUser, KemCore, MlKem512, MlKem768, MlKem1024};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;
use zeroize::Zeroizing;

use super::EnvelopeError;

/// A decapsulated or encapsulated 32-byte shared secret.
///
/// Zeroized on drop; callers derive AEAD keys from it and let it go.
pub type SharedSecret = Zeroizing<[u8; 32]>;

/// KEM algorithm family name on the wire.
pub const KEM_ALGORITHM_NAME: &str = "ML-KEM";

/// ML-KEM parameter sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterSet {
    /// ML-KEM-512 (NIST security level 1).
    MlKem512,
    /// ML-KEM-768 (NIST security level 3). The default.
    MlKem768,
    /// ML-KEM-1024 (NIST security level 5).
    MlKem1024,
}

impl ParameterSet {
    /// Wire name (`ML-KEM-768` style).
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::MlKem512 => "ML-KEM-512",
            Self::MlKem768 => "ML-KEM-768",
            Self::MlKem1024 => "ML-KEM-1024",
        }
    }

    /// Parses a parameter-set name. Accepts the `ML-KEM-*` wire names and
    /// the legacy `KYBER*` aliases, case-insensitive.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "ML-KEM-512" | "KYBER512" => Some(Self::MlKem512),
            "ML-KEM-768" | "KYBER768" => Some(Self::MlKem768),
            "ML-KEM-1024" | "KYBER1024" => Some(Self::MlKem1024),
            _ => None,
        }
    }

    /// Parses a parameter-set name, falling back to [`Self::MlKem768`]
    /// with a warning on unknown input.
    #[must_use]
    pub fn from_name_lossy(name: &str) -> Self {
        Self::from_name(name).unwrap_or_else(|| {
            warn!(
                parameter_set = name,
                "unknown ML-KEM parameter set, defaulting to ML-KEM-768"
            );
            Self::MlKem768
        })
    }

    /// Encapsulation (public) key size in bytes.
    #[must_use]
    pub const fn encapsulation_key_size(self) -> usize {
        match self {
            Self::MlKem512 => 800,
            Self::MlKem768 => 1184,
            Self::MlKem1024 => 1568,
        }
    }

    /// KEM ciphertext size in bytes.
    #[must_use]
    pub const fn ciphertext_size(self) -> usize {
        match self {
            Self::MlKem512 => 768,
            Self::MlKem768 => 1088,
            Self::MlKem1024 => 1568,
        }
    }

    /// Decapsulation (private) key size in bytes.
    #[must_use]
    pub const fn decapsulation_key_size(self) -> usize {
        match self {
            Self::MlKem512 => 1632,
            Self::MlKem768 => 2400,
            Self::MlKem1024 => 3168,
        }
    }

    /// DER-encoded OID (full TLV) for this parameter set.
    ///
    /// NIST arc 2.16.840.1.101.3.4.4.{1,2,3}.
    #[must_use]
    pub const fn oid_der(self) -> &'static [u8] {
        match self {
            Self::MlKem512 => &[0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x04, 0x01],
            Self::MlKem768 => &[0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x04, 0x02],
            Self::MlKem1024 => {
                &[0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x04, 0x03]
            },
        }
    }

    fn from_oid_der(oid: &[u8]) -> Option<Self> {
        [Self::MlKem512, Self::MlKem768, Self::MlKem1024]
            .into_iter()
            .find(|set| set.oid_der() == oid)
    }

    /// Compact tag used by the on-disk keystore format.
    #[must_use]
    pub(super) const fn tag(self) -> u8 {
        match self {
            Self::MlKem512 => 1,
            Self::MlKem768 => 2,
            Self::MlKem1024 => 3,
        }
    }

    pub(super) fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::MlKem512),
            2 => Some(Self::MlKem768),
            3 => Some(Self::MlKem1024),
            _ => None,
        }
    }
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self::MlKem768
    }
}

impl std::fmt::Display for ParameterSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_name())
    }
}

enum EncapsKey {
    MlKem512(Box<<MlKem512 as KemCore>::EncapsulationKey>),
    MlKem768(Box<<MlKem768 as KemCore>::EncapsulationKey>),
    MlKem1024(Box<<MlKem1024 as KemCore>::EncapsulationKey>),
}

enum DecapsKey {
    MlKem512(Box<<MlKem512 as KemCore>::DecapsulationKey>),
    MlKem768(Box<<MlKem768 as KemCore>::DecapsulationKey>),
    MlKem1024(Box<<MlKem1024 as KemCore>::DecapsulationKey>),
}

/// An ML-KEM public (encapsulation) key.
pub struct KemPublicKey {
    parameter_set: ParameterSet,
    inner: EncapsKey,
}

impl std::fmt::Debug for KemPublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KemPublicKey")
            .field("parameter_set", &self.parameter_set)
            .finish_non_exhaustive()
    }
}

impl KemPublicKey {
    /// Parameter set this key belongs to.
    #[must_use]
    pub const fn parameter_set(&self) -> ParameterSet {
        self.parameter_set
    }

    /// Raw encapsulation-key bytes (FIPS 203 byte encoding).
    #[must_use]
    pub fn raw_bytes(&self) -> Vec<u8> {
        match &self.inner {
            EncapsKey::MlKem512(ek) => ek.as_bytes().to_vec(),
            EncapsKey::MlKem768(ek) => ek.as_bytes().to_vec(),
            EncapsKey::MlKem1024(ek) => ek.as_bytes().to_vec(),
        }
    }

    /// Builds a public key from raw FIPS 203 bytes.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::InvalidPublicKey`] on a length mismatch
    /// for the parameter set.
    pub fn from_raw_bytes(
        parameter_set: ParameterSet,
        bytes: &[u8],
    ) -> Result<Self, EnvelopeError> {
        if bytes.len() != parameter_set.encapsulation_key_size() {
            return Err(EnvelopeError::InvalidPublicKey {
                reason: format!(
                    "expected {} bytes for {parameter_set}, got {}",
                    parameter_set.encapsulation_key_size(),
                    bytes.len()
                ),
            });
        }

        fn decode<K: KemCore>(bytes: &[u8]) -> Result<K::EncapsulationKey, EnvelopeError> {
            let encoded = Encoded::<K::EncapsulationKey>::try_from(bytes).map_err(|_| {
                EnvelopeError::InvalidPublicKey {
                    reason: "malformed encapsulation key bytes".to_string(),
                }
            })?;
            Ok(K::EncapsulationKey::from_bytes(&encoded))
        }

        let inner = match parameter_set {
            ParameterSet::MlKem512 => EncapsKey::MlKem512(Box::new(decode::<MlKem512>(bytes)?)),
            ParameterSet::MlKem768 => EncapsKey::MlKem768(Box::new(decode::<MlKem768>(bytes)?)),
            ParameterSet::MlKem1024 => EncapsKey::MlKem1024(Box::new(decode::<MlKem1024>(bytes)?)),
        };
        Ok(Self {
            parameter_set,
            inner,
        })
    }

    /// Encapsulates a fresh shared secret against this key.
    ///
    /// Probabilistic: independent calls produce distinct encapsulations
    /// and distinct secrets.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::EncapsulationFailed`] if the KEM rejects
    /// the operation.
    pub fn encapsulate(&self) -> Result<(Vec<u8>, SharedSecret), EnvelopeError> {
        let mut rng = rand::thread_rng();

        match &self.inner {
            EncapsKey::MlKem512(ek) => {
                let (ct, ss) = ek
                    .encapsulate(&mut rng)
                    .map_err(|_| EnvelopeError::EncapsulationFailed)?;
                Ok((ct.to_vec(), secret_from_slice(&ss)))
            },
            EncapsKey::MlKem768(ek) => {
                let (ct, ss) = ek
                    .encapsulate(&mut rng)
                    .map_err(|_| EnvelopeError::EncapsulationFailed)?;
                Ok((ct.to_vec(), secret_from_slice(&ss)))
            },
            EncapsKey::MlKem1024(ek) => {
                let (ct, ss) = ek
                    .encapsulate(&mut rng)
                    .map_err(|_| EnvelopeError::EncapsulationFailed)?;
                Ok((ct.to_vec(), secret_from_slice(&ss)))
            },
        }
    }

    /// Exports this key as DER `SubjectPublicKeyInfo`.
    #[must_use]
    pub fn to_spki_der(&self) -> Vec<u8> {
        let key = self.raw_bytes();
        let oid = self.parameter_set.oid_der();

        // AlgorithmIdentifier ::= SEQUENCE { algorithm OID }
        let mut algorithm = Vec::with_capacity(oid.len() + 4);
        algorithm.push(0x30);
        push_der_len(&mut algorithm, oid.len());
        algorithm.extend_from_slice(oid);

        // subjectPublicKey BIT STRING, zero unused bits.
        let mut bit_string = Vec::with_capacity(key.len() + 5);
        bit_string.push(0x03);
        push_der_len(&mut bit_string, key.len() + 1);
        bit_string.push(0x00);
        bit_string.extend_from_slice(&key);

        let mut spki = Vec::with_capacity(algorithm.len() + bit_string.len() + 4);
        spki.push(0x30);
        push_der_len(&mut spki, algorithm.len() + bit_string.len());
        spki.extend_from_slice(&algorithm);
        spki.extend_from_slice(&bit_string);
        spki
    }

    /// Imports a DER `SubjectPublicKeyInfo` public key.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::InvalidPublicKey`] on any structural
    /// defect, unknown algorithm OID, or key-length mismatch.
    pub fn from_spki_der(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        let invalid = |reason: &str| EnvelopeError::InvalidPublicKey {
            reason: reason.to_string(),
        };

        let mut outer = DerReader::new(bytes);
        let spki_body = outer.read_tlv(0x30).map_err(invalid)?;
        outer.ensure_exhausted().map_err(invalid)?;

        let mut spki = DerReader::new(spki_body);
        let algorithm_body = spki.read_tlv(0x30).map_err(invalid)?;
        let bit_string = spki.read_tlv(0x03).map_err(invalid)?;
        spki.ensure_exhausted().map_err(invalid)?;

        let mut algorithm = DerReader::new(algorithm_body);
        let oid_body = algorithm.read_tlv(0x06).map_err(invalid)?;
        algorithm.ensure_exhausted().map_err(invalid)?;

        // Rebuild the full OID TLV for the table lookup.
        let mut oid = Vec::with_capacity(oid_body.len() + 2);
        oid.push(0x06);
        push_der_len(&mut oid, oid_body.len());
        oid.extend_from_slice(oid_body);

        let parameter_set = ParameterSet::from_oid_der(&oid)
            .ok_or_else(|| invalid("unknown KEM algorithm identifier"))?;

        let Some((&unused_bits, key_bytes)) = bit_string.split_first() else {
            return Err(invalid("empty subjectPublicKey"));
        };
        if unused_bits != 0 {
            return Err(invalid("subjectPublicKey has unused bits"));
        }

        Self::from_raw_bytes(parameter_set, key_bytes)
    }
}

/// An ML-KEM keypair with distribution metadata.
///
/// The decapsulation key is private to this struct; nothing outside the
/// envelope module can read it.
pub struct KemKeyPair {
    parameter_set: ParameterSet,
    key_id: Uuid,
    generated_at: i64,
    public: KemPublicKey,
    private: DecapsKey,
}

impl std::fmt::Debug for KemKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KemKeyPair")
            .field("parameter_set", &self.parameter_set)
            .field("key_id", &self.key_id)
            .field("generated_at", &self.generated_at)
            .finish_non_exhaustive()
    }
}

impl KemKeyPair {
    /// Generates a fresh keypair with a CSPRNG.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::KeyGenerationFailed`] if the KEM cannot
    /// produce a keypair.
    pub fn generate(parameter_set: ParameterSet) -> Result<Self, EnvelopeError> {
        let mut rng = rand::thread_rng();

        let (private, inner_public) = match parameter_set {
            ParameterSet::MlKem512 => {
                let (dk, ek) = MlKem512::generate(&mut rng);
                (
                    DecapsKey::MlKem512(Box::new(dk)),
                    EncapsKey::MlKem512(Box::new(ek)),
                )
            },
            ParameterSet::MlKem768 => {
                let (dk, ek) = MlKem768::generate(&mut rng);
                (
                    DecapsKey::MlKem768(Box::new(dk)),
                    EncapsKey::MlKem768(Box::new(ek)),
                )
            },
            ParameterSet::MlKem1024 => {
                let (dk, ek) = MlKem1024::generate(&mut rng);
                (
                    DecapsKey::MlKem1024(Box::new(dk)),
                    EncapsKey::MlKem1024(Box::new(ek)),
                )
            },
        };

        Ok(Self {
            parameter_set,
            key_id: Uuid::new_v4(),
            generated_at: Utc::now().timestamp_millis(),
            public: KemPublicKey {
                parameter_set,
                inner: inner_public,
            },
            private,
        })
    }

    /// Rebuilds a keypair from its raw byte encodings (keystore load).
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::InvalidPublicKey`] or
    /// [`EnvelopeError::InvalidPrivateKey`] on length or structure
    /// mismatches.
    pub(super) fn from_parts(
        parameter_set: ParameterSet,
        public_bytes: &[u8],
        private_bytes: &[u8],
        key_id: Uuid,
        generated_at: i64,
    ) -> Result<Self, EnvelopeError> {
        let public = KemPublicKey::from_raw_bytes(parameter_set, public_bytes)?;

        if private_bytes.len() != parameter_set.decapsulation_key_size() {
            return Err(EnvelopeError::InvalidPrivateKey {
                reason: format!(
                    "expected {} bytes for {parameter_set}, got {}",
                    parameter_set.decapsulation_key_size(),
                    private_bytes.len()
                ),
            });
        }

        fn decode<K: KemCore>(bytes: &[u8]) -> Result<K::DecapsulationKey, EnvelopeError> {
            let encoded = Encoded::<K::DecapsulationKey>::try_from(bytes).map_err(|_| {
                EnvelopeError::InvalidPrivateKey {
                    reason: "malformed decapsulation key bytes".to_string(),
                }
            })?;
            Ok(K::DecapsulationKey::from_bytes(&encoded))
        }

        let private = match parameter_set {
            ParameterSet::MlKem512 => {
                DecapsKey::MlKem512(Box::new(decode::<MlKem512>(private_bytes)?))
            },
            ParameterSet::MlKem768 => {
                DecapsKey::MlKem768(Box::new(decode::<MlKem768>(private_bytes)?))
            },
            ParameterSet::MlKem1024 => {
                DecapsKey::MlKem1024(Box::new(decode::<MlKem1024>(private_bytes)?))
            },
        };

        Ok(Self {
            parameter_set,
            key_id,
            generated_at,
            public,
            private,
        })
    }

    /// Parameter set of this keypair.
    #[must_use]
    pub const fn parameter_set(&self) -> ParameterSet {
        self.parameter_set
    }

    /// Distribution identifier for this keypair.
    #[must_use]
    pub const fn key_id(&self) -> Uuid {
        self.key_id
    }

    /// Generation time, milliseconds since the Unix epoch.
    #[must_use]
    pub const fn generated_at(&self) -> i64 {
        self.generated_at
    }

    /// The public half.
    #[must_use]
    pub const fn public_key(&self) -> &KemPublicKey {
        &self.public
    }

    /// Recovers the shared secret from a client encapsulation.
    ///
    /// Deterministic given inputs: the same encapsulation always yields
    /// the same secret.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::DecapsulationFailed`] when the
    /// encapsulation has the wrong length for this parameter set.
    pub fn decapsulate(&self, encapsulation: &[u8]) -> Result<SharedSecret, EnvelopeError> {
        let expected = self.parameter_set.ciphertext_size();
        if encapsulation.len() != expected {
            return Err(EnvelopeError::DecapsulationFailed {
                reason: format!(
                    "expected {expected} encapsulation bytes for {}, got {}",
                    self.parameter_set,
                    encapsulation.len()
                ),
            });
        }

        fn run<K: KemCore>(
            dk: &K::DecapsulationKey,
            encapsulation: &[u8],
        ) -> Result<SharedSecret, EnvelopeError> {
            let ct = Ciphertext::<K>::try_from(encapsulation).map_err(|_| {
                EnvelopeError::DecapsulationFailed {
                    reason: "malformed encapsulation bytes".to_string(),
                }
            })?;
            let ss = dk
                .decapsulate(&ct)
                .map_err(|_| EnvelopeError::DecapsulationFailed {
                    reason: "decapsulation rejected".to_string(),
                })?;
            Ok(secret_from_slice(&ss))
        }

        match &self.private {
            DecapsKey::MlKem512(dk) => run::<MlKem512>(dk, encapsulation),
            DecapsKey::MlKem768(dk) => run::<MlKem768>(dk, encapsulation),
            DecapsKey::MlKem1024(dk) => run::<MlKem1024>(dk, encapsulation),
        }
    }

    /// Raw decapsulation-key bytes for the keystore. Zeroized on drop.
    pub(super) fn private_key_bytes(&self) -> Zeroizing<Vec<u8>> {
        match &self.private {
            DecapsKey::MlKem512(dk) => Zeroizing::new(dk.as_bytes().to_vec()),
            DecapsKey::MlKem768(dk) => Zeroizing::new(dk.as_bytes().to_vec()),
            DecapsKey::MlKem1024(dk) => Zeroizing::new(dk.as_bytes().to_vec()),
        }
    }
}

/// The public-key distribution document served to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicKeyResponse {
    /// Base64 of the DER `SubjectPublicKeyInfo` bytes.
    #[serde(rename = "publicKey")]
    pub public_key: String,
    /// Parameter-set wire name.
    #[serde(rename = "parameterSet")]
    pub parameter_set: String,
    /// KEM family name, always `ML-KEM`.
    pub algorithm: String,
    /// Key generation time, milliseconds since the Unix epoch.
    #[serde(rename = "generatedAt")]
    pub generated_at: i64,
    /// Keypair UUID.
    #[serde(rename = "keyId")]
    pub key_id: String,
}

impl PublicKeyResponse {
    /// Builds the distribution document for a keypair.
    #[must_use]
    pub fn for_keypair(keypair: &KemKeyPair) -> Self {
        use base64::Engine;
        use base64::engine::general_purpose::STANDARD;

        Self {
            public_key: STANDARD.encode(keypair.public_key().to_spki_der()),
            parameter_set: keypair.parameter_set().wire_name().to_string(),
            algorithm: KEM_ALGORITHM_NAME.to_string(),
            generated_at: keypair.generated_at(),
            key_id: keypair.key_id().to_string(),
        }
    }

    /// Decodes and imports the carried public key.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::InvalidPublicKey`] on undecodable base64
    /// or a malformed SPKI document.
    pub fn import(&self) -> Result<KemPublicKey, EnvelopeError> {
        use base64::Engine;
        use base64::engine::general_purpose::STANDARD;

        let der = STANDARD
            .decode(&self.public_key)
            .map_err(|e| EnvelopeError::InvalidPublicKey {
                reason: format!("undecodable base64: {e}"),
            })?;
        KemPublicKey::from_spki_der(&der)
    }
}

fn secret_from_slice(shared_key: &[u8]) -> SharedSecret {
    let mut secret = Zeroizing::new([0u8; 32]);
    secret.copy_from_slice(shared_key);
    secret
}

fn push_der_len(out: &mut Vec<u8>, len: usize) {
    if len < 0x80 {
        out.push(len as u8);
    } else if len <= 0xFF {
        out.push(0x81);
        out.push(len as u8);
    } else {
        out.push(0x82);
        out.push((len >> 8) as u8);
        out.push((len & 0xFF) as u8);
    }
}

struct DerReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> DerReader<'a> {
    const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn read_u8(&mut self) -> Result<u8, &'static str> {
        let byte = *self.bytes.get(self.pos).ok_or("truncated DER input")?;
        self.pos += 1;
        Ok(byte)
    }

    fn read_len(&mut self) -> Result<usize, &'static str> {
        let first = self.read_u8()?;
        if first < 0x80 {
            return Ok(first as usize);
        }
        let count = (first & 0x7F) as usize;
        if count == 0 || count > 2 {
            return Err("unsupported DER length encoding");
        }
        let mut len = 0usize;
        for _ in 0..count {
            len = (len << 8) | self.read_u8()? as usize;
        }
        Ok(len)
    }

    fn read_tlv(&mut self, expected_tag: u8) -> Result<&'a [u8], &'static str> {
        let tag = self.read_u8()?;
        if tag != expected_tag {
            return Err("unexpected DER tag");
        }
        let len = self.read_len()?;
        let end = self.pos.checked_add(len).ok_or("DER length overflow")?;
        if end > self.bytes.len() {
            return Err("DER length overruns input");
        }
        let body = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(body)
    }

    fn ensure_exhausted(&self) -> Result<(), &'static str> {
        if self.pos == self.bytes.len() {
            Ok(())
        } else {
            Err("trailing bytes after DER structure")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_set_names() {
        assert_eq!(
            ParameterSet::from_name("ML-KEM-512"),
            Some(ParameterSet::MlKem512)
        );
        assert_eq!(
            ParameterSet::from_name("kyber768"),
            Some(ParameterSet::MlKem768)
        );
        assert_eq!(ParameterSet::from_name("ML-KEM-999"), None);
        assert_eq!(
            ParameterSet::from_name_lossy("nonsense"),
            ParameterSet::MlKem768
        );
    }

    #[test]
    fn generate_and_round_trip_shared_secret() {
        let keypair = KemKeyPair::generate(ParameterSet::MlKem768).unwrap();
        let (encapsulation, client_secret) = keypair.public_key().encapsulate().unwrap();
        assert_eq!(
            encapsulation.len(),
            ParameterSet::MlKem768.ciphertext_size()
        );

        let server_secret = keypair.decapsulate(&encapsulation).unwrap();
        assert_eq!(*client_secret, *server_secret);
    }

    #[test]
    fn encapsulation_is_probabilistic() {
        let keypair = KemKeyPair::generate(ParameterSet::MlKem768).unwrap();
        let (ct1, ss1) = keypair.public_key().encapsulate().unwrap();
        let (ct2, ss2) = keypair.public_key().encapsulate().unwrap();
        assert_ne!(ct1, ct2);
        assert_ne!(*ss1, *ss2);
    }

    #[test]
    fn decapsulation_rejects_wrong_length() {
        let keypair = KemKeyPair::generate(ParameterSet::MlKem512).unwrap();
        let err = keypair.decapsulate(&[0u8; 17]).unwrap_err();
        assert!(matches!(err, EnvelopeError::DecapsulationFailed { .. }));
    }

    #[test]
    fn spki_round_trip_for_all_parameter_sets() {
        for parameter_set in [
            ParameterSet::MlKem512,
            ParameterSet::MlKem768,
            ParameterSet::MlKem1024,
        ] {
            let keypair = KemKeyPair::generate(parameter_set).unwrap();
            let der = keypair.public_key().to_spki_der();
            let imported = KemPublicKey::from_spki_der(&der).unwrap();
            assert_eq!(imported.parameter_set(), parameter_set);
            assert_eq!(imported.raw_bytes(), keypair.public_key().raw_bytes());
        }
    }

    #[test]
    fn imported_key_encapsulates_against_original_private_key() {
        let keypair = KemKeyPair::generate(ParameterSet::MlKem768).unwrap();
        let der = keypair.public_key().to_spki_der();
        let imported = KemPublicKey::from_spki_der(&der).unwrap();

        let (encapsulation, client_secret) = imported.encapsulate().unwrap();
        let server_secret = keypair.decapsulate(&encapsulation).unwrap();
        assert_eq!(*client_secret, *server_secret);
    }

    #[test]
    fn spki_import_rejects_garbage() {
        assert!(matches!(
            KemPublicKey::from_spki_der(&[0xFF, 0x01, 0x02]),
            Err(EnvelopeError::InvalidPublicKey { .. })
        ));
        assert!(matches!(
            KemPublicKey::from_spki_der(&[]),
            Err(EnvelopeError::InvalidPublicKey { .. })
        ));
    }

    #[test]
    fn spki_import_rejects_truncated_key() {
        let keypair = KemKeyPair::generate(ParameterSet::MlKem512).unwrap();
        let der = keypair.public_key().to_spki_der();
        let err = KemPublicKey::from_spki_der(&der[..der.len() - 4]).unwrap_err();
        assert!(matches!(err, EnvelopeError::InvalidPublicKey { .. }));
    }

    #[test]
    fn public_key_response_round_trip() {
        let keypair = KemKeyPair::generate(ParameterSet::MlKem768).unwrap();
        let response = PublicKeyResponse::for_keypair(&keypair);
        assert_eq!(response.algorithm, "ML-KEM");
        assert_eq!(response.parameter_set, "ML-KEM-768");

        let imported = response.import().unwrap();
        assert_eq!(imported.raw_bytes(), keypair.public_key().raw_bytes());
    }
}
