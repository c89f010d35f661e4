//! `bko audit verify`: hash-chain verification of a desk audit log.

use anyhow::{bail, Result};

use bko_audit::{verify_hash_chain, VerifyResult};

pub fn verify(path: &str) -> Result<()> {
    match verify_hash_chain(path)? {
        VerifyResult::Valid { lines } => {
            println!("OK: {lines} event(s), chain intact");
            Ok(())
        }
        VerifyResult::Broken { line, reason } => {
            bail!("audit chain broken at line {line}: {reason}")
        }
    }
}
