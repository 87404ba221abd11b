//! Streaming AES-256-CBC / PKCS#7 decryption (spec §4.1).

mod cipher_wrap;

pub use cipher_wrap::{Cipher, BLOCK_SIZE, KEY_SIZE};

use common::error::IngestError;
use std::io::{Read, Write};

/// `block_size * 1024`, chosen so that the held-back final block never
/// straddles a read boundary in a way that would break the update/final
/// split (spec §4.1 design rationale).
const BUFFER_SIZE: usize = BLOCK_SIZE * 1024;

pub struct Decryptor;

impl Decryptor {
    /// Streams `input` through AES-256-CBC, writing plaintext to `output`.
    /// The first 16 bytes of `input` are consumed as the IV. Returns the
    /// number of plaintext bytes written, so a caller staging into a
    /// pre-sized file (e.g. a memfd sized to the ciphertext length) can
    /// truncate away the difference.
    #[track_caller]
    pub fn decrypt_stream<R: Read, W: Write>(
        input: &mut R,
        input_name: &str,
        output: &mut W,
        key: &[u8],
    ) -> Result<u64, IngestError> {
        if key.len() != KEY_SIZE {
            return Err(IngestError::invalid_argument(
                "Decryption key must be 32 bytes long for AES-256-CBC",
            ));
        }

        let mut iv = [0u8; BLOCK_SIZE];
        read_exact_or_eof(input, &mut iv).map_err(|_| {
            IngestError::invalid_argument(format!(
                "Unexpected end of file while reading IV in {input_name}"
            ))
        })?;

        let mut cipher = Cipher::new(key, &iv)?;

        let mut read_buf = vec![0u8; BUFFER_SIZE];
        let mut pending: Vec<u8> = Vec::with_capacity(BUFFER_SIZE + BLOCK_SIZE);
        let mut written: u64 = 0;

        loop {
            let n = input
                .read(&mut read_buf)
                .map_err(|err| IngestError::io_with_source(format!("Error reading {input_name}"), err))?;
            if n == 0 {
                break;
            }
            pending.extend_from_slice(&read_buf[..n]);

            let available_blocks = pending.len() / BLOCK_SIZE;
            // Hold back the final block: it may carry PKCS#7 padding we
            // can only interpret once we know it's truly last.
            if available_blocks > 1 {
                let process_len = (available_blocks - 1) * BLOCK_SIZE;
                let mut chunk = pending[..process_len].to_vec();
                cipher.decrypt_blocks_in_place(&mut chunk);
                output
                    .write_all(&chunk)
                    .map_err(|_| IngestError::io("Error writing to output stream"))?;
                written += chunk.len() as u64;
                pending.drain(..process_len);
            }
        }

        if pending.is_empty() || pending.len() % BLOCK_SIZE != 0 {
            return Err(IngestError::crypto(
                "Error during decrypt finalization: wrong final block length",
            ));
        }

        let last_block_start = pending.len() - BLOCK_SIZE;
        if last_block_start > 0 {
            let mut chunk = pending[..last_block_start].to_vec();
            cipher.decrypt_blocks_in_place(&mut chunk);
            output
                .write_all(&chunk)
                .map_err(|_| IngestError::io("Error writing to output stream"))?;
            written += chunk.len() as u64;
        }

        let mut last_block = [0u8; BLOCK_SIZE];
        last_block.copy_from_slice(&pending[last_block_start..]);
        cipher.decrypt_final_block_in_place(&mut last_block);

        let unpadded = unpad_pkcs7(&last_block)?;
        output
            .write_all(unpadded)
            .map_err(|_| IngestError::io("Error writing to output stream"))?;
        written += unpadded.len() as u64;

        Ok(written)
    }

    /// Convenience wrapper that opens `path` as the input stream. Returns the
    /// number of plaintext bytes written, same as `decrypt_stream`.
    #[track_caller]
    pub fn decrypt_file<W: Write>(path: &str, output: &mut W, key: &[u8]) -> Result<u64, IngestError> {
        let mut file = std::fs::File::open(path)
            .map_err(|err| IngestError::io_with_source(format!("Failed to open {path}"), err))?;
        Self::decrypt_stream(&mut file, path, output, key)
    }
}

/// Like `Read::read_exact` but distinguishes "hit EOF before filling the
/// buffer" from other I/O errors via the `Err(())` sentinel.
fn read_exact_or_eof<R: Read>(input: &mut R, buf: &mut [u8]) -> Result<(), ()> {
    let mut filled = 0;
    while filled < buf.len() {
        match input.read(&mut buf[filled..]) {
            Ok(0) => return Err(()),
            Ok(n) => filled += n,
            Err(_) => return Err(()),
        }
    }
    Ok(())
}

fn unpad_pkcs7(block: &[u8; BLOCK_SIZE]) -> Result<&[u8], IngestError> {
    let pad_len = block[BLOCK_SIZE - 1] as usize;
    if pad_len == 0 || pad_len > BLOCK_SIZE {
        return Err(IngestError::crypto(
            "Error during decrypt finalization: invalid PKCS#7 padding length",
        ));
    }
    let pad_start = BLOCK_SIZE - pad_len;
    if block[pad_start..].iter().any(|&b| b as usize != pad_len) {
        return Err(IngestError::crypto(
            "Error during decrypt finalization: invalid PKCS#7 padding bytes",
        ));
    }
    Ok(&block[..pad_start])
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::cipher::{BlockEncryptMut, KeyIvInit};
    use rand::RngCore;
    use std::io::Cursor;

    fn encrypt(plaintext: &[u8], key: &[u8; KEY_SIZE]) -> Vec<u8> {
        let mut iv = [0u8; BLOCK_SIZE];
        rand::thread_rng().fill_bytes(&mut iv);

        let pad_len = BLOCK_SIZE - (plaintext.len() % BLOCK_SIZE);
        let mut padded = plaintext.to_vec();
        padded.extend(std::iter::repeat(pad_len as u8).take(pad_len));

        let mut encryptor = cbc::Encryptor::<aes::Aes256>::new(key.into(), &iv.into());
        for chunk in padded.chunks_exact_mut(BLOCK_SIZE) {
            let block = ::cipher::generic_array::GenericArray::from_mut_slice(chunk);
            encryptor.encrypt_block_mut(block);
        }

        let mut out = iv.to_vec();
        out.extend(padded);
        out
    }

    #[test]
    fn round_trip_random_bytes() {
        let mut key = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut key);

        let mut plaintext = vec![0u8; 10 * 1024 * 1024];
        rand::thread_rng().fill_bytes(&mut plaintext);

        let ciphertext = encrypt(&plaintext, &key);

        let mut input = Cursor::new(ciphertext);
        let mut output = Vec::new();
        let written = Decryptor::decrypt_stream(&mut input, "<memory stream>", &mut output, &key).unwrap();

        assert_eq!(output, plaintext);
        assert_eq!(written, plaintext.len() as u64);
    }

    #[test]
    fn wrong_key_length_is_rejected() {
        let mut input = Cursor::new(Vec::new());
        let mut output = Vec::new();
        let err = Decryptor::decrypt_stream(&mut input, "<memory stream>", &mut output, b"too_short_key").unwrap_err();
        assert!(err.to_string().contains("Decryption key must be 32 bytes long for AES-256-CBC"));
    }

    #[test]
    fn truncated_iv_is_rejected() {
        let key = [0u8; KEY_SIZE];
        let mut input = Cursor::new(b"short".to_vec());
        let mut output = Vec::new();
        let err = Decryptor::decrypt_stream(&mut input, "<memory stream>", &mut output, &key).unwrap_err();
        assert!(err.to_string().contains("Unexpected end of file while reading IV"));
    }

    #[test]
    fn garbage_ciphertext_fails_at_finalization() {
        let key = [0u8; KEY_SIZE];
        let mut input = Cursor::new(b"1111111111111111_garbage_data".to_vec());
        let mut output = Vec::new();
        let err = Decryptor::decrypt_stream(&mut input, "<memory stream>", &mut output, &key).unwrap_err();
        assert!(err.to_string().contains("Error during decrypt finalization"));
    }
}
