//! The binary OpenToken frame: header, HMAC, IV, key info, and length-prefixed
//! ciphertext.
//!
//! [`encode`] and [`decode`] take a randomness source and a derived key as
//! explicit parameters rather than reaching for globals, so tests can pin the
//! IV and exercise both directions with the same key material.

use std::io::{Read, Write};

use aes::{Aes128, Aes256};
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use des::TdesEde3;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use hmac::{Hmac, Mac};
use rand::{CryptoRng, RngCore};
use sha1::{Digest, Sha1};
use subtle::ConstantTimeEq;

use crate::cipher_suite::CipherSuite;
use crate::error::OpenTokenError;

const OTK_LITERAL: &[u8; 3] = b"OTK";
const VERSION: u8 = 1;
const HMAC_LEN: usize = 20;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;
type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;
type Des3CbcEnc = cbc::Encryptor<TdesEde3>;
type Des3CbcDec = cbc::Decryptor<TdesEde3>;

/// A fully parsed, not-yet-authenticated OpenToken frame.
struct Frame {
    hmac: [u8; HMAC_LEN],
    iv: Vec<u8>,
    key_info: Vec<u8>,
    ciphertext: Vec<u8>,
}

/// Encodes `cleartext` (the UTF-8 textual line form of a payload) into an
/// OpenToken frame, Base64-encoded with the OpenToken pad substitution
/// already applied by the caller's text layer.
///
/// `key` is the suite's cipher-ready key — empty for [`CipherSuite::None`],
/// and for [`CipherSuite::Des3`] already expanded to 24 bytes (see
/// `key_deriver::expand_des3_key`), never the raw 21-byte PBKDF2 output. The
/// same bytes are used both as the HMAC key and the CBC key.
///
/// # Errors
/// [`OpenTokenError::BadArgument`] if the compressed, encrypted ciphertext
/// exceeds the frame's 16-bit payload length field (65535 bytes).
pub(crate) fn encode(
    suite: CipherSuite,
    key: &[u8],
    cleartext: &[u8],
    rng: &mut (impl RngCore + CryptoRng),
) -> Result<Vec<u8>, OpenTokenError> {
    let iv = generate_iv(suite, rng);
    let hmac = compute_hmac(suite, key, &iv, &[], cleartext);

    let compressed = zlib_compress(cleartext);
    let ciphertext = if suite.is_encrypted() {
        cbc_encrypt(suite, key, &iv, &compressed)
    } else {
        compressed
    };

    if ciphertext.len() > usize::from(u16::MAX) {
        return Err(OpenTokenError::BadArgument(
            "ciphertext exceeds maximum frame payload length".to_owned(),
        ));
    }

    let frame_bytes = assemble(suite.id(), &hmac, &iv, &[], &ciphertext);

    #[cfg(feature = "tracing")]
    tracing::debug!(
        suite_id = suite.id(),
        frame_len = frame_bytes.len(),
        "assembled OpenToken frame"
    );

    Ok(frame_bytes)
}

/// Parses and authenticates an OpenToken frame, returning the cleartext
/// textual line form on success.
///
/// `key` is the same cipher-ready key [`encode`] expects. `expected_suite` is
/// the suite the caller expects; a frame whose own suite id disagrees is
/// rejected as [`OpenTokenError::Malformed`] before any crypto is attempted.
pub(crate) fn decode(
    expected_suite: CipherSuite,
    key: &[u8],
    frame_bytes: &[u8],
) -> Result<Vec<u8>, OpenTokenError> {
    let frame = parse(frame_bytes, expected_suite)?;

    let cleartext = if expected_suite.is_encrypted() {
        let compressed = match cbc_decrypt(expected_suite, key, &frame.iv, &frame.ciphertext) {
            Ok(compressed) => compressed,
            Err(err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(suite_id = expected_suite.id(), "CBC unpad/decrypt failed");
                return Err(err);
            }
        };
        zlib_decompress(&compressed)?
    } else {
        zlib_decompress(&frame.ciphertext)?
    };

    let expected_hmac = compute_hmac(expected_suite, key, &frame.iv, &frame.key_info, &cleartext);
    if frame.hmac[..].ct_eq(&expected_hmac[..]).unwrap_u8() == 0 {
        #[cfg(feature = "tracing")]
        tracing::warn!(suite_id = expected_suite.id(), "HMAC does not match");
        return Err(OpenTokenError::BadCredentials(
            "HMAC does not match.".to_owned(),
        ));
    }

    Ok(cleartext)
}

fn generate_iv(suite: CipherSuite, rng: &mut (impl RngCore + CryptoRng)) -> Vec<u8> {
    let mut iv = vec![0u8; suite.iv_len()];
    rng.fill_bytes(&mut iv);
    iv
}

/// HMAC over `version || suite_id || iv || key_info || cleartext`. Suite 0
/// degrades to a plain, unkeyed SHA-1 digest.
fn compute_hmac(suite: CipherSuite, key: &[u8], iv: &[u8], key_info: &[u8], cleartext: &[u8]) -> Vec<u8> {
    if suite == CipherSuite::None {
        let mut hasher = Sha1::new();
        hasher.update([VERSION, suite.id()]);
        hasher.update(iv);
        hasher.update(key_info);
        hasher.update(cleartext);
        hasher.finalize().to_vec()
    } else {
        let mut mac = Hmac::<Sha1>::new_from_slice(key).expect("HMAC accepts any key length");
        mac.update(&[VERSION, suite.id()]);
        mac.update(iv);
        mac.update(key_info);
        mac.update(cleartext);
        mac.finalize().into_bytes().to_vec()
    }
}

fn zlib_compress(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .expect("writing to an in-memory buffer cannot fail");
    encoder
        .finish()
        .expect("writing to an in-memory buffer cannot fail")
}

fn zlib_decompress(data: &[u8]) -> Result<Vec<u8>, OpenTokenError> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| OpenTokenError::Malformed(format!("Invalid zlib stream: {e}")))?;
    Ok(out)
}

fn cbc_encrypt(suite: CipherSuite, key: &[u8], iv: &[u8], data: &[u8]) -> Vec<u8> {
    match suite {
        CipherSuite::Aes256 => {
            let enc = Aes256CbcEnc::new_from_slices(key, iv).expect("key/iv length matches suite table");
            enc.encrypt_padded_vec_mut::<Pkcs7>(data)
        }
        CipherSuite::Aes128 => {
            let enc = Aes128CbcEnc::new_from_slices(key, iv).expect("key/iv length matches suite table");
            enc.encrypt_padded_vec_mut::<Pkcs7>(data)
        }
        CipherSuite::Des3 => {
            let enc = Des3CbcEnc::new_from_slices(key, iv).expect("key/iv length matches suite table");
            enc.encrypt_padded_vec_mut::<Pkcs7>(data)
        }
        CipherSuite::None => unreachable!("caller must not CBC-encrypt suite 0"),
    }
}

fn cbc_decrypt(suite: CipherSuite, key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>, OpenTokenError> {
    if data.len() % suite.block_len() != 0 {
        return Err(OpenTokenError::Malformed(
            "Ciphertext length is not a multiple of the cipher block size.".to_owned(),
        ));
    }

    let bad_credentials = || OpenTokenError::BadCredentials("Error decrypting token.".to_owned());
    match suite {
        CipherSuite::Aes256 => {
            let dec = Aes256CbcDec::new_from_slices(key, iv).map_err(|_| bad_credentials())?;
            dec.decrypt_padded_vec_mut::<Pkcs7>(data).map_err(|_| bad_credentials())
        }
        CipherSuite::Aes128 => {
            let dec = Aes128CbcDec::new_from_slices(key, iv).map_err(|_| bad_credentials())?;
            dec.decrypt_padded_vec_mut::<Pkcs7>(data).map_err(|_| bad_credentials())
        }
        CipherSuite::Des3 => {
            let dec = Des3CbcDec::new_from_slices(key, iv).map_err(|_| bad_credentials())?;
            dec.decrypt_padded_vec_mut::<Pkcs7>(data).map_err(|_| bad_credentials())
        }
        CipherSuite::None => unreachable!("caller must not CBC-decrypt suite 0"),
    }
}

/// Assembles the frame bytes. The caller must have already checked
/// `ciphertext.len() <= u16::MAX`; `iv`/`key_info` are always within their
/// 1-byte-length-prefixed bounds by construction (the suite table caps IV
/// length at 16, and this core never populates `key_info`).
fn assemble(suite_id: u8, hmac: &[u8], iv: &[u8], key_info: &[u8], ciphertext: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(
        3 + 1 + 1 + HMAC_LEN + 1 + iv.len() + 1 + key_info.len() + 2 + ciphertext.len(),
    );
    buf.extend_from_slice(OTK_LITERAL);
    buf.push(VERSION);
    buf.push(suite_id);
    buf.extend_from_slice(hmac);
    buf.push(u8::try_from(iv.len()).expect("iv length is bounded by the suite table"));
    buf.extend_from_slice(iv);
    buf.push(u8::try_from(key_info.len()).expect("key_info is never populated by this core"));
    buf.extend_from_slice(key_info);
    buf.extend_from_slice(
        &u16::try_from(ciphertext.len())
            .expect("ciphertext length checked by encode")
            .to_be_bytes(),
    );
    buf.extend_from_slice(ciphertext);
    buf
}

fn parse(bytes: &[u8], expected_suite: CipherSuite) -> Result<Frame, OpenTokenError> {
    let mut cursor = Cursor::new(bytes);

    let header = cursor.take(3)?;
    if header != OTK_LITERAL.as_slice() {
        return Err(OpenTokenError::Malformed(format!(
            "Invalid token header literal: {}",
            String::from_utf8_lossy(header)
        )));
    }

    let version = cursor.take_u8()?;
    if version != VERSION {
        return Err(OpenTokenError::Malformed(format!(
            "Invalid OTK version: {version}."
        )));
    }

    let suite_id = cursor.take_u8()?;
    if suite_id != expected_suite.id() {
        return Err(OpenTokenError::Malformed(format!(
            "CipherID, {suite_id}, doesn't match the encoding cipher, {}.",
            expected_suite.id()
        )));
    }

    let hmac_slice = cursor.take(HMAC_LEN)?;
    let mut hmac = [0u8; HMAC_LEN];
    hmac.copy_from_slice(hmac_slice);

    let iv_len = cursor.take_u8()? as usize;
    let iv = cursor.take(iv_len)?.to_vec();

    let key_info_len = cursor.take_u8()? as usize;
    let key_info = cursor.take(key_info_len)?.to_vec();

    let payload_len = u16::from_be_bytes(cursor.take(2)?.try_into().expect("take(2)")) as usize;
    let ciphertext = cursor.take(payload_len)?.to_vec();

    Ok(Frame {
        hmac,
        iv,
        key_info,
        ciphertext,
    })
}

/// A minimal cursor over a byte slice, failing with [`OpenTokenError::Malformed`]
/// on truncation rather than panicking.
struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], OpenTokenError> {
        let end = self.pos + n;
        let slice = self
            .bytes
            .get(self.pos..end)
            .ok_or_else(|| OpenTokenError::Malformed("Truncated OpenToken frame.".to_owned()))?;
        self.pos = end;
        Ok(slice)
    }

    fn take_u8(&mut self) -> Result<u8, OpenTokenError> {
        Ok(self.take(1)?[0])
    }
}
