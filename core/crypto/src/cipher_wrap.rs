use aes::Aes256;
use cbc::Decryptor as CbcDecryptor;
use cipher::{generic_array::GenericArray, BlockDecryptMut, KeyIvInit};
use common::error::IngestError;
use zeroize::Zeroizing;

pub const BLOCK_SIZE: usize = 16;
pub const KEY_SIZE: usize = 32;

/// Thin wrapper around the AES-256-CBC block decryptor. Holds the raw key
/// material in a zeroizing buffer so it isn't left lingering in memory once
/// the cipher handle is released, mirroring the RAII cipher-context
/// lifetime used upstream.
pub struct Cipher {
    key: Zeroizing<[u8; KEY_SIZE]>,
    inner: CbcDecryptor<Aes256>,
}

impl Cipher {
    #[track_caller]
    pub fn new(key: &[u8], iv: &[u8; BLOCK_SIZE]) -> Result<Self, IngestError> {
        if key.len() != KEY_SIZE {
            return Err(IngestError::invalid_argument(
                "Decryption key must be 32 bytes long for AES-256-CBC",
            ));
        }
        let mut owned_key = [0u8; KEY_SIZE];
        owned_key.copy_from_slice(key);
        let key_array = GenericArray::from_slice(&owned_key);
        let iv_array = GenericArray::from_slice(iv);
        let inner = CbcDecryptor::<Aes256>::new(key_array, iv_array);
        Ok(Self {
            key: Zeroizing::new(owned_key),
            inner,
        })
    }

    /// Decrypts every full block in `buf` in place. `buf.len()` MUST be a
    /// multiple of [`BLOCK_SIZE`]; callers hold back the final block until
    /// they are ready to unpad it (see [`crate::Decryptor`]).
    pub fn decrypt_blocks_in_place(&mut self, buf: &mut [u8]) {
        debug_assert_eq!(buf.len() % BLOCK_SIZE, 0);
        for chunk in buf.chunks_exact_mut(BLOCK_SIZE) {
            let block = GenericArray::from_mut_slice(chunk);
            self.inner.decrypt_block_mut(block);
        }
    }

    /// Decrypts exactly one block in place, without touching any PKCS#7
    /// padding — callers strip padding themselves once they know this is
    /// the true final block of the stream.
    pub fn decrypt_final_block_in_place(&mut self, block: &mut [u8; BLOCK_SIZE]) {
        let block = GenericArray::from_mut_slice(block);
        self.inner.decrypt_block_mut(block);
    }

    #[allow(dead_code)]
    fn key_len(&self) -> usize {
        self.key.len()
    }
}
