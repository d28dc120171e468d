//! BIP32 HD key nodes.
//!
//! An HD node is a key plus a chain code and its position in the tree
//! (depth, parent fingerprint, child index). Private nodes serialize as
//! `xprv...`, public nodes as `xpub...` (Base58Check, 78-byte payload).

use bch_primitives::base58::{decode_check, encode_check};
use bch_primitives::ec::{PrivateKey, PublicKey};
use bch_primitives::hash::{hash160, sha512_hmac};
use bch_primitives::util::{ByteReader, ByteWriter};

use crate::path::DerivationPath;
use crate::HdError;

/// Child indexes at or above this value are hardened.
pub const HARDENED_OFFSET: u32 = 0x8000_0000;

/// Version bytes for serialized mainnet private keys (`xprv`).
const XPRV_VERSION: u32 = 0x0488_ADE4;

/// Version bytes for serialized mainnet public keys (`xpub`).
const XPUB_VERSION: u32 = 0x0488_B21E;

/// Length of the serialized node payload: version, depth, fingerprint,
/// child index, chain code, and key data.
const SERIALIZED_LEN: usize = 4 + 1 + 4 + 4 + 32 + 33;

/// HMAC key used to derive a master node from a seed.
const MASTER_HMAC_KEY: &[u8] = b"Bitcoin seed";

/// A private HD node: an extended private key.
#[derive(Clone, Debug)]
pub struct HdPrivateNode {
    depth: u8,
    parent_fingerprint: [u8; 4],
    child_index: u32,
    chain_code: [u8; 32],
    private_key: PrivateKey,
}

/// A public HD node: an extended public key.
#[derive(Clone, Debug)]
pub struct HdPublicNode {
    depth: u8,
    parent_fingerprint: [u8; 4],
    child_index: u32,
    chain_code: [u8; 32],
    public_key: PublicKey,
}

impl HdPrivateNode {
    /// Derive a master node from a seed (16-64 bytes).
    ///
    /// # Arguments
    /// * `seed` - The seed bytes.
    ///
    /// # Returns
    /// The master `HdPrivateNode`, or an error if the seed length is out of
    /// range or the derived key is invalid.
    pub fn from_seed(seed: &[u8]) -> Result<Self, HdError> {
        if seed.len() < 16 || seed.len() > 64 {
            return Err(HdError::InvalidSerialization(format!(
                "seed must be 16-64 bytes, got {}",
                seed.len()
            )));
        }
        let digest = sha512_hmac(MASTER_HMAC_KEY, seed);
        let private_key = PrivateKey::from_bytes(&digest[..32])?;
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&digest[32..]);
        Ok(HdPrivateNode {
            depth: 0,
            parent_fingerprint: [0u8; 4],
            child_index: 0,
            chain_code,
            private_key,
        })
    }

    /// Decode a serialized `xprv...` string.
    ///
    /// # Arguments
    /// * `serialized` - The Base58Check-encoded extended private key.
    ///
    /// # Returns
    /// The decoded node, or an error if the encoding, version, or key data
    /// is invalid.
    pub fn decode(serialized: &str) -> Result<Self, HdError> {
        let (version, depth, parent_fingerprint, child_index, chain_code, key_data) =
            decode_payload(serialized)?;
        if version != XPRV_VERSION {
            return Err(HdError::UnexpectedVersion(version));
        }
        if key_data[0] != 0x00 {
            return Err(HdError::InvalidSerialization(
                "private key data must begin with 0x00".to_string(),
            ));
        }
        let private_key = PrivateKey::from_bytes(&key_data[1..])?;
        Ok(HdPrivateNode {
            depth,
            parent_fingerprint,
            child_index,
            chain_code,
            private_key,
        })
    }

    /// Encode this node as an `xprv...` string.
    pub fn encode(&self) -> String {
        let mut key_data = [0u8; 33];
        key_data[1..].copy_from_slice(&self.private_key.to_bytes());
        encode_payload(
            XPRV_VERSION,
            self.depth,
            self.parent_fingerprint,
            self.child_index,
            self.chain_code,
            key_data,
        )
    }

    /// Derive a child node (BIP32 CKDpriv).
    ///
    /// # Arguments
    /// * `index` - The raw child index; values at or above
    ///   [`HARDENED_OFFSET`] derive hardened children.
    ///
    /// # Returns
    /// The child node, or an error if the derived key is invalid.
    pub fn derive_child(&self, index: u32) -> Result<Self, HdError> {
        let mut data = ByteWriter::with_capacity(37);
        if index >= HARDENED_OFFSET {
            data.write_u8(0x00);
            data.write_bytes(&self.private_key.to_bytes());
        } else {
            data.write_bytes(&self.private_key.public_key().to_compressed());
        }
        data.write_u32_be(index);

        let digest = sha512_hmac(&self.chain_code, data.as_bytes());
        let mut tweak = [0u8; 32];
        tweak.copy_from_slice(&digest[..32]);
        let private_key = self.private_key.tweak_add(&tweak)?;
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&digest[32..]);

        Ok(HdPrivateNode {
            depth: self.depth.wrapping_add(1),
            parent_fingerprint: self.fingerprint(),
            child_index: index,
            chain_code,
            private_key,
        })
    }

    /// Derive along a private (`m/...`) path, substituting the `i`
    /// placeholder with `address_index`.
    ///
    /// # Arguments
    /// * `path` - The parsed derivation path.
    /// * `address_index` - The value substituted for `i`.
    ///
    /// # Returns
    /// The derived node, or an error if the path is a public path or any
    /// derivation step fails.
    pub fn derive_path(
        &self,
        path: &DerivationPath,
        address_index: u32,
    ) -> Result<Self, HdError> {
        if path.public {
            return Err(HdError::PathTypeMismatch(
                "private derivation requires an m/ path".to_string(),
            ));
        }
        let mut node = self.clone();
        for index in path.instantiate(address_index)? {
            node = node.derive_child(index)?;
        }
        Ok(node)
    }

    /// The public node corresponding to this private node.
    pub fn public_node(&self) -> HdPublicNode {
        HdPublicNode {
            depth: self.depth,
            parent_fingerprint: self.parent_fingerprint,
            child_index: self.child_index,
            chain_code: self.chain_code,
            public_key: self.private_key.public_key(),
        }
    }

    /// The node's private key.
    pub fn private_key(&self) -> &PrivateKey {
        &self.private_key
    }

    /// The first four bytes of the Hash160 of the compressed public key.
    pub fn fingerprint(&self) -> [u8; 4] {
        fingerprint_of(&self.private_key.public_key())
    }
}

impl HdPublicNode {
    /// Decode a serialized `xpub...` string.
    ///
    /// # Arguments
    /// * `serialized` - The Base58Check-encoded extended public key.
    ///
    /// # Returns
    /// The decoded node, or an error if the encoding, version, or key data
    /// is invalid.
    pub fn decode(serialized: &str) -> Result<Self, HdError> {
        let (version, depth, parent_fingerprint, child_index, chain_code, key_data) =
            decode_payload(serialized)?;
        if version != XPUB_VERSION {
            return Err(HdError::UnexpectedVersion(version));
        }
        let public_key = PublicKey::from_bytes(&key_data)?;
        Ok(HdPublicNode {
            depth,
            parent_fingerprint,
            child_index,
            chain_code,
            public_key,
        })
    }

    /// Encode this node as an `xpub...` string.
    pub fn encode(&self) -> String {
        encode_payload(
            XPUB_VERSION,
            self.depth,
            self.parent_fingerprint,
            self.child_index,
            self.chain_code,
            self.public_key.to_compressed(),
        )
    }

    /// Derive a child node (BIP32 CKDpub).
    ///
    /// Hardened indexes cannot be derived from public keys.
    ///
    /// # Arguments
    /// * `index` - The raw child index; must be below [`HARDENED_OFFSET`].
    ///
    /// # Returns
    /// The child node, or an error if the index is hardened or the derived
    /// key is invalid.
    pub fn derive_child(&self, index: u32) -> Result<Self, HdError> {
        if index >= HARDENED_OFFSET {
            return Err(HdError::HardenedFromPublic);
        }
        let mut data = ByteWriter::with_capacity(37);
        data.write_bytes(&self.public_key.to_compressed());
        data.write_u32_be(index);

        let digest = sha512_hmac(&self.chain_code, data.as_bytes());
        let mut tweak = [0u8; 32];
        tweak.copy_from_slice(&digest[..32]);
        let public_key = self.public_key.tweak_add(&tweak)?;
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&digest[32..]);

        Ok(HdPublicNode {
            depth: self.depth.wrapping_add(1),
            parent_fingerprint: fingerprint_of(&self.public_key),
            child_index: index,
            chain_code,
            public_key,
        })
    }

    /// Derive along a public (`M/...`) path, substituting the `i`
    /// placeholder with `address_index`.
    ///
    /// # Arguments
    /// * `path` - The parsed derivation path.
    /// * `address_index` - The value substituted for `i`.
    ///
    /// # Returns
    /// The derived node, or an error if the path is a private path,
    /// contains hardened steps, or any derivation step fails.
    pub fn derive_path(
        &self,
        path: &DerivationPath,
        address_index: u32,
    ) -> Result<Self, HdError> {
        if !path.public {
            return Err(HdError::PathTypeMismatch(
                "public derivation requires an M/ path".to_string(),
            ));
        }
        let mut node = self.clone();
        for index in path.instantiate(address_index)? {
            node = node.derive_child(index)?;
        }
        Ok(node)
    }

    /// The node's public key.
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }
}

/// First four bytes of the Hash160 of the compressed public key.
fn fingerprint_of(public_key: &PublicKey) -> [u8; 4] {
    let digest = hash160(&public_key.to_compressed());
    let mut out = [0u8; 4];
    out.copy_from_slice(&digest[..4]);
    out
}

/// Decode the common 78-byte payload shared by xprv and xpub.
#[allow(clippy::type_complexity)]
fn decode_payload(
    serialized: &str,
) -> Result<(u32, u8, [u8; 4], u32, [u8; 32], [u8; 33]), HdError> {
    let payload = decode_check(serialized)?;
    if payload.len() != SERIALIZED_LEN {
        return Err(HdError::InvalidSerialization(format!(
            "expected {} payload bytes, got {}",
            SERIALIZED_LEN,
            payload.len()
        )));
    }
    let mut reader = ByteReader::new(&payload);
    let version = reader.read_u32_be()?;
    let depth = reader.read_u8()?;
    let mut parent_fingerprint = [0u8; 4];
    parent_fingerprint.copy_from_slice(reader.read_bytes(4)?);
    let child_index = reader.read_u32_be()?;
    let mut chain_code = [0u8; 32];
    chain_code.copy_from_slice(reader.read_bytes(32)?);
    let mut key_data = [0u8; 33];
    key_data.copy_from_slice(reader.read_bytes(33)?);
    Ok((version, depth, parent_fingerprint, child_index, chain_code, key_data))
}

/// Encode the common 78-byte payload shared by xprv and xpub.
fn encode_payload(
    version: u32,
    depth: u8,
    parent_fingerprint: [u8; 4],
    child_index: u32,
    chain_code: [u8; 32],
    key_data: [u8; 33],
) -> String {
    let mut writer = ByteWriter::with_capacity(SERIALIZED_LEN);
    writer.write_u32_be(version);
    writer.write_u8(depth);
    writer.write_bytes(&parent_fingerprint);
    writer.write_u32_be(child_index);
    writer.write_bytes(&chain_code);
    writer.write_bytes(&key_data);
    encode_check(writer.as_bytes())
}
