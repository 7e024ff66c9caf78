//! `papeline verify` - check a delivery signature

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;

use papeline_arxiv::signer::{self, key_id_for, verifying_key_from_pem};

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// SPKI PEM public key
    #[arg(long)]
    pub public_key: PathBuf,

    /// Base64 signature (X-Signature header value)
    #[arg(long)]
    pub signature: String,

    /// File holding the exact request body
    pub file: PathBuf,
}

pub fn run(args: VerifyArgs) -> Result<ExitCode> {
    let pem = std::fs::read_to_string(&args.public_key)
        .with_context(|| format!("Failed to read {}", args.public_key.display()))?;
    let key = verifying_key_from_pem(&pem)?;
    let body = std::fs::read(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    if signer::verify(&key, &body, &args.signature) {
        eprintln!("Signature OK (key id {})", key_id_for(&key));
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("Signature INVALID");
        Ok(ExitCode::FAILURE)
    }
}
