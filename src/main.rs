#![cfg(feature = "cli")]
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{ArgAction, Parser, Subcommand};
use log::{error, info, LevelFilter};

use rsclearkey::config::ClearKeyConfig;
use rsclearkey::decrypter::{Aes128CtrCipher, SampleCipher, IV_SIZE};
use rsclearkey::license::{create_license_request, parse_license_response};
use rsclearkey::transport::ReqwestTransport;
use rsclearkey::{ClearKeyCdm, ContentKey, KeyId};

#[derive(Parser)]
#[command(name = "rsclearkey", version, disable_version_flag = true, about = "rsclearkey CLI")]
struct Cli {
    #[arg(short = 'v', long = "version", action = ArgAction::SetTrue)]
    version: bool,

    #[arg(short = 'd', long = "debug", action = ArgAction::SetTrue)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// CLI subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Print the ClearKey license request for a key id.
    Request {
        /// Key id as hex, UUID or Base64.
        kid: String,
    },
    /// Acquire the key for a key id from a license server.
    ///
    /// Settings missing on the command line are taken from the config file.
    /// Without a license URL the configured keys are used instead.
    License {
        /// Key id as hex, UUID or Base64. Defaults to `default_kid` from the config.
        kid: Option<String>,
        #[arg(short = 's', long = "server")]
        server: Option<String>,
        #[arg(short = 'c', long = "config")]
        config: Option<PathBuf>,
        /// Save the raw request and response next to the library path.
        #[arg(long = "debug-license", action = ArgAction::SetTrue)]
        debug_license: bool,
        #[arg(short = 'o', long = "out_dir")]
        out_dir: Option<PathBuf>,
    },
    /// Parse a saved license response and print its key.
    Parse {
        path: PathBuf,
    },
    /// Decrypt a single raw `cenc` sample.
    Decrypt {
        input: PathBuf,
        output: PathBuf,
        /// Content key as 32 hex digits.
        #[arg(short = 'k', long = "key")]
        key: String,
        /// 8 or 16 byte IV as hex; 8 byte IVs are zero extended.
        #[arg(short = 'i', long = "iv")]
        iv: String,
        /// Subsample layout as `clear:encrypted` pairs, e.g. `5:16,0:32`.
        /// The whole sample is encrypted when omitted.
        #[arg(short = 's', long = "subsamples")]
        subsamples: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new().filter_level(level).init();

    info!("rsclearkey version {}", env!("CARGO_PKG_VERSION"));

    if cli.version {
        return Ok(());
    }

    match cli.command {
        Some(Commands::Request { kid }) => run_request(&kid),
        Some(Commands::License {
            kid,
            server,
            config,
            debug_license,
            out_dir,
        }) => run_license(
            kid.as_deref(),
            server,
            config.as_deref(),
            debug_license,
            out_dir,
        ),
        Some(Commands::Parse { path }) => run_parse(&path),
        Some(Commands::Decrypt {
            input,
            output,
            key,
            iv,
            subsamples,
        }) => run_decrypt(&input, &output, &key, &iv, subsamples.as_deref()),
        None => Ok(()),
    }
}

fn run_request(kid: &str) -> anyhow::Result<()> {
    let kid: KeyId = kid.parse().context("Invalid key id")?;
    let request = create_license_request(&kid);
    println!("{}", String::from_utf8_lossy(&request));
    Ok(())
}

fn run_license(
    kid: Option<&str>,
    server: Option<String>,
    config_path: Option<&Path>,
    debug_license: bool,
    out_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut config = match config_path {
        Some(path) => ClearKeyConfig::from_path(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ClearKeyConfig::default(),
    };
    if let Some(server) = server {
        config.license_url = server;
    }
    if let Some(out_dir) = out_dir {
        config.session.library_path = out_dir;
    }
    config.session.debug_license |= debug_license;

    let kid = match kid {
        Some(kid) => kid.parse::<KeyId>().context("Invalid key id")?,
        None => match config.default_kid().context("Invalid default_kid in config")? {
            Some(kid) => kid,
            None => bail!("No key id given and no default_kid configured"),
        },
    };

    if config.license_url.is_empty() && config.keys.is_empty() {
        bail!("Neither a license server nor provisioned keys are configured");
    }

    let transport = ReqwestTransport::new().context("Failed to create HTTP client")?;
    let mut cdm = ClearKeyCdm::from_config(config, transport);
    info!("[+] Loaded CDM");

    let session = match cdm.open(&[], kid) {
        Ok(session) => session,
        Err(e) => {
            error!("[-] Failed to open session ({}): {}", e.kind(), e);
            return Err(e).context("License acquisition failed");
        }
    };
    info!("[+] Opened Session for {}", kid);

    for pair in session.registry().key_pairs() {
        info!("[CONTENT] {}", pair);
    }

    cdm.close(&kid)?;
    Ok(())
}

fn run_parse(path: &Path) -> anyhow::Result<()> {
    let data = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let registry = parse_license_response(&data).context("Failed to parse license response")?;
    if registry.is_empty() {
        info!("[-] License response carries no usable key");
        return Ok(());
    }
    for (kid, key) in registry.iter() {
        info!("[+] {} -> {}", kid, key);
    }
    for pair in registry.key_pairs() {
        info!("[CONTENT] {}", pair);
    }
    Ok(())
}

fn run_decrypt(
    input: &Path,
    output: &Path,
    key: &str,
    iv: &str,
    subsamples: Option<&str>,
) -> anyhow::Result<()> {
    let key = ContentKey::from_hex(key).context("Invalid content key")?;
    let iv = parse_iv(iv)?;
    let (clear, encrypted) = match subsamples {
        Some(layout) => parse_subsamples(layout)?,
        None => (Vec::new(), Vec::new()),
    };

    let data = std::fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let cipher = Aes128CtrCipher::new(&key);
    let mut out = Vec::with_capacity(data.len());
    cipher
        .decrypt_sample_data(&data, &mut out, &iv, clear.len(), &clear, &encrypted)
        .context("Failed to decrypt sample")?;

    std::fs::write(output, &out).with_context(|| format!("Failed to write {}", output.display()))?;
    info!("[+] Decrypted {} bytes to {}", out.len(), output.display());
    Ok(())
}

fn parse_iv(iv: &str) -> anyhow::Result<[u8; IV_SIZE]> {
    let bytes = hex::decode(iv.trim_start_matches("0x")).context("IV is not hex")?;
    let mut full = [0u8; IV_SIZE];
    match bytes.len() {
        8 | IV_SIZE => full[..bytes.len()].copy_from_slice(&bytes),
        n => bail!("IV must be 8 or 16 bytes, got {}", n),
    }
    Ok(full)
}

fn parse_subsamples(layout: &str) -> anyhow::Result<(Vec<u16>, Vec<u32>)> {
    let mut clear = Vec::new();
    let mut encrypted = Vec::new();
    for entry in layout.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (c, e) = entry
            .split_once(':')
            .with_context(|| format!("Subsample `{}` is not `clear:encrypted`", entry))?;
        clear.push(c.trim().parse::<u16>().with_context(|| format!("Bad clear size in `{}`", entry))?);
        encrypted.push(
            e.trim()
                .parse::<u32>()
                .with_context(|| format!("Bad encrypted size in `{}`", entry))?,
        );
    }
    Ok((clear, encrypted))
}
