//! Cryptographic primitives for the Folio ledger.
//!
//! Hash and signature algorithms are selected by name through the
//! [`HashProvider`] and [`SignatureProvider`] traits, so the ledger never
//! hard-codes an algorithm family. Also provides the binary Merkle tree used
//! to seal pages, with inclusion proofs.
//!
//! All crypto operations wrap established libraries.

pub mod error;
pub mod hasher;
pub mod merkle;
pub mod signer;

pub use error::CryptoError;
pub use hasher::{HashAlgorithm, HashProvider, StandardHashProvider};
pub use merkle::{MerkleProof, MerkleTree, ProofStep, Side};
pub use signer::{Ed25519SignatureProvider, KeyPair, PrivateKey, SignatureProvider};
