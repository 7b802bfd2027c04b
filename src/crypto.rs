//! Ed25519 signing of transaction identities.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;

use crate::error::TransactionError;
use crate::tx::Transaction;

/// Keypair bundle held for each registered user.
#[derive(Debug, Clone)]
pub struct Keypair {
    pub signing: SigningKey,
    pub verifying: VerifyingKey,
}

/// Generate a fresh Ed25519 keypair using the OS RNG.
pub fn generate_keypair() -> Keypair {
    let signing = SigningKey::generate(&mut OsRng);
    let verifying = signing.verifying_key();
    Keypair { signing, verifying }
}

/// Sign arbitrary bytes with the provided signing key.
pub fn sign_bytes(signing: &SigningKey, msg: &[u8]) -> Signature {
    signing.sign(msg)
}

/// Verify a message/signature pair using the provided verifying key.
pub fn verify_bytes(verifying: &VerifyingKey, msg: &[u8], sig: &Signature) -> bool {
    verifying.verify(msg, sig).is_ok()
}

/// Sign the transaction's identity and attach the signature.
pub fn sign_transaction(tx: &mut Transaction, signing: &SigningKey) -> Result<(), TransactionError> {
    if tx.is_signed() {
        return Err(TransactionError::AlreadySigned);
    }
    let msg = tx.signing_message()?;
    let sig = sign_bytes(signing, &msg);
    tx.assign_signature(&sig.to_bytes())
}

/// `false` for unsigned or unidentified transactions, for signatures that
/// are malformed or do not verify, and when the stored identity no longer
/// matches the transaction's content.
pub fn verify_transaction_signature(tx: &Transaction, verifying: &VerifyingKey) -> bool {
    if tx.identity() != Some(tx.compute_identity()) {
        return false;
    }
    let Ok(msg) = tx.signing_message() else {
        return false;
    };
    let Ok(Some(sig_bytes)) = tx.signature_bytes() else {
        return false;
    };
    let Ok(sig) = Signature::from_slice(&sig_bytes) else {
        return false;
    };
    verify_bytes(verifying, &msg, &sig)
}
