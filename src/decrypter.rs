//! CENC `cenc` scheme sample decryption (AES-128-CTR).
//!
//! A sample is split into subsamples, each a run of clear bytes followed by
//! a run of encrypted bytes. The keystream starts at the sample IV and runs
//! on across the encrypted runs of one sample, clear runs do not consume it.
use aes::cipher::{KeyIvInit, StreamCipher};
use aes::Aes128;

use crate::error::{Error, Result};
use crate::key::ContentKey;

type Aes128Ctr = ctr::Ctr128BE<Aes128>;

/// Size of a full CENC IV. 8-byte IVs are zero extended by the caller.
pub const IV_SIZE: usize = 16;

/// Per-sample decryption engine.
///
/// Implementations keep no state between calls, the counter comes from the
/// IV alone, so one engine can be shared by several pipeline threads.
pub trait SampleCipher: Send + Sync {
    /// Decrypt `data_in` into `data_out` following the subsample layout.
    ///
    /// `subsample_count == 0` means the whole sample is encrypted.
    fn decrypt_sample_data(
        &self,
        data_in: &[u8],
        data_out: &mut Vec<u8>,
        iv: &[u8; IV_SIZE],
        subsample_count: usize,
        bytes_of_cleartext_data: &[u16],
        bytes_of_encrypted_data: &[u32],
    ) -> Result<()>;
}

/// AES-128-CTR single sample decrypter.
#[derive(Clone)]
pub struct Aes128CtrCipher {
    key: [u8; 16],
}

impl Aes128CtrCipher {
    pub fn new(key: &ContentKey) -> Self {
        Self {
            key: *key.as_bytes(),
        }
    }

    /// Create from raw key bytes, which must be 16 bytes long.
    pub fn from_slice(key: &[u8]) -> Result<Self> {
        Ok(Self::new(&ContentKey::from_slice(key)?))
    }

    fn keystream(&self, iv: &[u8; IV_SIZE]) -> Aes128Ctr {
        Aes128Ctr::new((&self.key).into(), iv.into())
    }
}

impl std::fmt::Debug for Aes128CtrCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Aes128CtrCipher")
    }
}

impl SampleCipher for Aes128CtrCipher {
    fn decrypt_sample_data(
        &self,
        data_in: &[u8],
        data_out: &mut Vec<u8>,
        iv: &[u8; IV_SIZE],
        subsample_count: usize,
        bytes_of_cleartext_data: &[u16],
        bytes_of_encrypted_data: &[u32],
    ) -> Result<()> {
        let mut cipher = self.keystream(iv);
        let mut out = data_in.to_vec();

        if subsample_count == 0 {
            cipher.apply_keystream(&mut out);
            *data_out = out;
            return Ok(());
        }

        if bytes_of_cleartext_data.len() < subsample_count
            || bytes_of_encrypted_data.len() < subsample_count
        {
            return Err(Error::DecryptFailed(format!(
                "subsample tables shorter than subsample count {} (clear {}, encrypted {})",
                subsample_count,
                bytes_of_cleartext_data.len(),
                bytes_of_encrypted_data.len()
            )));
        }

        let mut offset = 0usize;
        for (&clear, &encrypted) in bytes_of_cleartext_data
            .iter()
            .zip(bytes_of_encrypted_data)
            .take(subsample_count)
        {
            let run = offset
                .checked_add(usize::from(clear))
                .and_then(|start| Some(start..start.checked_add(usize::try_from(encrypted).ok()?)?))
                .filter(|run| run.end <= out.len());
            let Some(run) = run else {
                return Err(Error::DecryptFailed(format!(
                    "subsamples exceed sample size {}",
                    data_in.len()
                )));
            };
            offset = run.end;
            cipher.apply_keystream(&mut out[run]);
        }

        if offset != data_in.len() {
            return Err(Error::DecryptFailed(format!(
                "subsamples cover {} of {} bytes",
                offset,
                data_in.len()
            )));
        }

        *data_out = out;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use aes::cipher::{KeyIvInit, StreamCipher};

    use super::{Aes128Ctr, Aes128CtrCipher, SampleCipher};
    use crate::error::Error;
    use crate::key::ContentKey;

    const KEY: [u8; 16] = [0x3c; 16];
    const IV: [u8; 16] = [0, 1, 2, 3, 4, 5, 6, 7, 0, 0, 0, 0, 0, 0, 0, 0];

    fn plaintext(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 % 251) as u8).collect()
    }

    fn encrypt_regions(data: &[u8], layout: &[(u16, u32)]) -> Vec<u8> {
        let mut stream = Aes128Ctr::new(&KEY.into(), &IV.into());
        let mut out = data.to_vec();
        let mut offset = 0;
        for &(clear, enc) in layout {
            let start = offset + clear as usize;
            let end = start + enc as usize;
            stream.apply_keystream(&mut out[start..end]);
            offset = end;
        }
        out
    }

    #[test]
    fn full_sample_without_subsamples() {
        let cipher = Aes128CtrCipher::new(&ContentKey::new(KEY));
        let clear = plaintext(100);
        let encrypted = encrypt_regions(&clear, &[(0, 100)]);
        assert_ne!(encrypted, clear);

        let mut out = Vec::new();
        cipher
            .decrypt_sample_data(&encrypted, &mut out, &IV, 0, &[], &[])
            .expect("decrypt");
        assert_eq!(out, clear);
    }

    #[test]
    fn keystream_continues_across_subsamples() {
        let cipher = Aes128CtrCipher::new(&ContentKey::new(KEY));
        // Encrypted runs are not block aligned on purpose.
        let layout = [(5u16, 21u32), (3, 10), (7, 0), (0, 33)];
        let total: usize = layout.iter().map(|&(c, e)| c as usize + e as usize).sum();
        let clear = plaintext(total);
        let encrypted = encrypt_regions(&clear, &layout);

        let clear_sizes: Vec<u16> = layout.iter().map(|l| l.0).collect();
        let enc_sizes: Vec<u32> = layout.iter().map(|l| l.1).collect();
        let mut out = Vec::new();
        cipher
            .decrypt_sample_data(&encrypted, &mut out, &IV, layout.len(), &clear_sizes, &enc_sizes)
            .expect("decrypt");
        assert_eq!(out, clear);
        // Clear runs were passed through untouched.
        assert_eq!(&encrypted[..5], &clear[..5]);
    }

    #[test]
    fn each_sample_restarts_from_its_iv() {
        let cipher = Aes128CtrCipher::new(&ContentKey::new(KEY));
        let clear = plaintext(16);
        let encrypted = encrypt_regions(&clear, &[(0, 16)]);

        for _ in 0..3 {
            let mut out = Vec::new();
            cipher
                .decrypt_sample_data(&encrypted, &mut out, &IV, 1, &[0], &[16])
                .expect("decrypt");
            assert_eq!(out, clear);
        }
    }

    #[test]
    fn layout_larger_than_sample_fails() {
        let cipher = Aes128CtrCipher::new(&ContentKey::new(KEY));
        let mut out = Vec::new();
        let err = cipher
            .decrypt_sample_data(&[0u8; 16], &mut out, &IV, 1, &[4], &[16])
            .unwrap_err();
        assert!(matches!(err, Error::DecryptFailed(_)));
        assert!(out.is_empty());
    }

    #[test]
    fn layout_shorter_than_sample_fails() {
        let cipher = Aes128CtrCipher::new(&ContentKey::new(KEY));
        let mut out = Vec::new();
        let err = cipher
            .decrypt_sample_data(&[0u8; 32], &mut out, &IV, 1, &[0], &[16])
            .unwrap_err();
        assert!(matches!(err, Error::DecryptFailed(_)));
    }

    #[test]
    fn oversized_run_lengths_fail() {
        let cipher = Aes128CtrCipher::new(&ContentKey::new(KEY));
        let mut out = Vec::new();
        let err = cipher
            .decrypt_sample_data(&[0u8; 32], &mut out, &IV, 2, &[u16::MAX, u16::MAX], &[u32::MAX, u32::MAX])
            .unwrap_err();
        assert!(matches!(err, Error::DecryptFailed(_)));
        assert!(out.is_empty());
    }

    #[test]
    fn short_tables_fail() {
        let cipher = Aes128CtrCipher::new(&ContentKey::new(KEY));
        let mut out = Vec::new();
        let err = cipher
            .decrypt_sample_data(&[0u8; 32], &mut out, &IV, 2, &[0], &[16, 16])
            .unwrap_err();
        assert!(matches!(err, Error::DecryptFailed(_)));
    }

    #[test]
    fn rejects_bad_key_length() {
        let err = Aes128CtrCipher::from_slice(&[]).unwrap_err();
        assert!(matches!(err, Error::CipherInitFailed(_)));
    }
}
