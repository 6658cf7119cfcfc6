//! Credential verification.
//!
//! A stored reference is a self-describing string with a leading format
//! tag: `$6$...` is POSIX SHA-512 crypt, `$vg$<salt-hex>$<hash-hex>$` is
//! the native 10000-round salted SHA-512 format. Verification recomputes
//! the digest with the parameters encoded in the reference (never implicit
//! defaults) and compares with a full-length accumulator so timing does
//! not depend on where the strings diverge.

use crate::crypto::secure_random_bytes;
use crate::{VaultError, VaultResult};
use sha2::Sha512;
use sha_crypt::{sha512_crypt_b64, Sha512Params};
use zeroize::Zeroizing;

const VG_TAG: &str = "$vg$";
const SHA512_CRYPT_TAG: &str = "$6$";

/// Rounds fixed by the `$vg$` tag itself.
pub const VG_ROUNDS: u32 = 10_000;
const VG_SALT_LEN: usize = 16;
const VG_DIGEST_LEN: usize = 64;

/// Default rounds for `$6$` references without an explicit `rounds=` field.
const CRYPT_DEFAULT_ROUNDS: u32 = 5_000;

/// Supplied credentials beyond this length are rejected outright.
pub const MAX_CREDENTIAL_LEN: usize = 256;

/// Similarity floor for voice passphrase acceptance.
pub const VOICE_SIMILARITY_THRESHOLD: f64 = 0.60;

/// Three-valued verification outcome. `Error` covers a malformed reference
/// or an unusable backend; the gate counts it like a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    Success,
    Failure,
    Error,
}

/// Equality with a full-length XOR-OR accumulator: the time taken depends
/// only on the input length, never on the position of the first differing
/// byte. A length mismatch short-circuits, indistinguishable from a hash
/// mismatch to the caller.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut acc = 0u8;
    for (x, y) in a.iter().zip(b) {
        acc |= x ^ y;
    }
    acc == 0
}

/// Verify a supplied credential against a stored reference, dispatching on
/// the format tag. The plaintext is not retained; zeroing the caller's
/// buffer is the caller's obligation on every exit path.
pub fn verify_reference(credential: &[u8], reference: &str) -> VerifyOutcome {
    if credential.len() > MAX_CREDENTIAL_LEN {
        return VerifyOutcome::Failure;
    }

    if reference.starts_with(VG_TAG) {
        verify_vg(credential, reference)
    } else if reference.starts_with(SHA512_CRYPT_TAG) {
        verify_sha512_crypt(credential, reference)
    } else {
        VerifyOutcome::Error
    }
}

/// Validate the shape of a reference without verifying anything against it.
pub fn check_reference_format(reference: &str) -> VaultResult<()> {
    if reference.starts_with(VG_TAG) {
        parse_vg(reference).map(|_| ())
    } else if reference.starts_with(SHA512_CRYPT_TAG) {
        parse_sha512_crypt(reference).map(|_| ())
    } else {
        Err(VaultError::Credential(
            "unrecognized reference format tag".into(),
        ))
    }
}

/// Produce a fresh `$vg$` reference for `credential` with a CSPRNG salt.
pub fn hash_password(credential: &str) -> VaultResult<String> {
    let mut salt = [0u8; VG_SALT_LEN];
    secure_random_bytes(&mut salt)?;

    let mut digest = Zeroizing::new([0u8; VG_DIGEST_LEN]);
    pbkdf2::pbkdf2_hmac::<Sha512>(credential.as_bytes(), &salt, VG_ROUNDS, &mut digest[..]);

    Ok(format!(
        "$vg${}${}$",
        hex::encode(salt),
        hex::encode(&digest[..])
    ))
}

fn verify_vg(credential: &[u8], reference: &str) -> VerifyOutcome {
    let (salt, stored) = match parse_vg(reference) {
        Ok(parts) => parts,
        Err(_) => return VerifyOutcome::Error,
    };

    let mut computed = Zeroizing::new([0u8; VG_DIGEST_LEN]);
    pbkdf2::pbkdf2_hmac::<Sha512>(credential, &salt, VG_ROUNDS, &mut computed[..]);

    if constant_time_eq(&computed[..], &stored) {
        VerifyOutcome::Success
    } else {
        VerifyOutcome::Failure
    }
}

fn verify_sha512_crypt(credential: &[u8], reference: &str) -> VerifyOutcome {
    let (rounds, salt, stored) = match parse_sha512_crypt(reference) {
        Ok(parts) => parts,
        Err(_) => return VerifyOutcome::Error,
    };

    let params = match Sha512Params::new(rounds as usize) {
        Ok(params) => params,
        Err(_) => return VerifyOutcome::Error,
    };
    let computed = match sha512_crypt_b64(credential, salt.as_bytes(), &params) {
        Ok(encoded) => Zeroizing::new(encoded),
        Err(_) => return VerifyOutcome::Error,
    };

    if constant_time_eq(computed.as_bytes(), stored.as_bytes()) {
        VerifyOutcome::Success
    } else {
        VerifyOutcome::Failure
    }
}

/// `$vg$<salt-hex>$<hash-hex>$`
fn parse_vg(reference: &str) -> VaultResult<(Vec<u8>, Vec<u8>)> {
    let rest = reference
        .strip_prefix(VG_TAG)
        .ok_or_else(|| VaultError::Credential("missing $vg$ tag".into()))?;

    let mut fields = rest.split('$');
    let salt_hex = fields.next().unwrap_or_default();
    let hash_hex = fields
        .next()
        .ok_or_else(|| VaultError::Credential("missing hash field".into()))?;
    if fields.next() != Some("") || fields.next().is_some() {
        return Err(VaultError::Credential("malformed $vg$ reference".into()));
    }

    let salt = hex::decode(salt_hex)
        .map_err(|_| VaultError::Credential("salt is not hex".into()))?;
    let hash = hex::decode(hash_hex)
        .map_err(|_| VaultError::Credential("hash is not hex".into()))?;

    if salt.is_empty() {
        return Err(VaultError::Credential("empty salt".into()));
    }
    if hash.len() != VG_DIGEST_LEN {
        return Err(VaultError::Credential(format!(
            "hash length {} is not {}",
            hash.len(),
            VG_DIGEST_LEN
        )));
    }

    Ok((salt, hash))
}

/// `$6$salt$hash` or `$6$rounds=N$salt$hash`
fn parse_sha512_crypt(reference: &str) -> VaultResult<(u32, String, String)> {
    let rest = reference
        .strip_prefix(SHA512_CRYPT_TAG)
        .ok_or_else(|| VaultError::Credential("missing $6$ tag".into()))?;

    let (rounds, rest) = match rest.strip_prefix("rounds=") {
        Some(tail) => {
            let (value, tail) = tail
                .split_once('$')
                .ok_or_else(|| VaultError::Credential("malformed rounds field".into()))?;
            let rounds: u32 = value
                .parse()
                .map_err(|_| VaultError::Credential("rounds is not a number".into()))?;
            (rounds, tail)
        }
        None => (CRYPT_DEFAULT_ROUNDS, rest),
    };

    let (salt, hash) = rest
        .split_once('$')
        .ok_or_else(|| VaultError::Credential("missing salt/hash separator".into()))?;

    if salt.is_empty() || salt.len() > 16 {
        return Err(VaultError::Credential("bad crypt salt length".into()));
    }
    if hash.is_empty() || hash.contains('$') {
        return Err(VaultError::Credential("malformed crypt hash".into()));
    }

    Ok((rounds, salt.to_string(), hash.to_string()))
}

/// Case-folded, whitespace-normalized Levenshtein similarity between an
/// utterance and the stored passphrase: `1 - distance / max(len_a, len_b)`.
pub fn voice_similarity(utterance: &str, passphrase: &str) -> f64 {
    strsim::normalized_levenshtein(&normalize(utterance), &normalize(passphrase))
}

/// True when the utterance clears the acceptance floor.
pub fn voice_matches(utterance: &str, passphrase: &str) -> bool {
    voice_similarity(utterance, passphrase) >= VOICE_SIMILARITY_THRESHOLD
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
