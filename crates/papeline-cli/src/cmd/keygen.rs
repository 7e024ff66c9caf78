//! `papeline keygen` - generate an Ed25519 key pair for signed delivery

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use papeline_arxiv::Signer;

pub const PRIVATE_KEY_FILE: &str = "private_key.pem";
pub const PUBLIC_KEY_FILE: &str = "public_key.pem";

#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Write private_key.pem and public_key.pem here instead of printing them
    #[arg(short, long)]
    pub out_dir: Option<PathBuf>,

    /// Overwrite existing key files
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: KeygenArgs) -> Result<()> {
    let signer = Signer::generate();
    let private_pem = signer.private_key_pem()?;
    let public_pem = signer.public_key_pem()?;

    let Some(dir) = args.out_dir else {
        print!("{private_pem}");
        print!("{public_pem}");
        eprintln!("key id: {}", signer.key_id());
        return Ok(());
    };

    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let private_path = dir.join(PRIVATE_KEY_FILE);
    let public_path = dir.join(PUBLIC_KEY_FILE);
    if !args.force {
        for path in [&private_path, &public_path] {
            if path.exists() {
                anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
            }
        }
    }

    write_private(&private_path, private_pem.as_bytes())?;
    fs::write(&public_path, public_pem)
        .with_context(|| format!("Failed to write {}", public_path.display()))?;

    eprintln!("Private key: {}", private_path.display());
    eprintln!("Public key:  {}", public_path.display());
    eprintln!("Key id:      {}", signer.key_id());
    Ok(())
}

/// Write with owner-only permissions where the platform supports it.
fn write_private(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options
        .open(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    file.write_all(bytes)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    file.sync_all()?;
    Ok(())
}
