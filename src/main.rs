//! `bb84-sim`: run one BB84 session and print what happened.

use anyhow::Context;
use bb84::cipher::CipherMode;
use bb84::config::ProtocolConfig;
use bb84::privacy_amplification::AmplifierKind;
use bb84::protocol::{Bb84Protocol, SessionReport};
use clap::{ArgAction, Parser, ValueEnum};
use log::info;
use std::path::PathBuf;

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ModeArg {
    #[clap(alias = "otp")]
    OneTimePad,
    #[clap(alias = "aead")]
    DerivedAead,
}

impl From<ModeArg> for CipherMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::OneTimePad => CipherMode::OneTimePad,
            ModeArg::DerivedAead => CipherMode::DerivedAead,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum AmplifierArg {
    StridedParity,
    Toeplitz,
    Hmac,
}

impl From<AmplifierArg> for AmplifierKind {
    fn from(kind: AmplifierArg) -> Self {
        match kind {
            AmplifierArg::StridedParity => AmplifierKind::StridedParity,
            AmplifierArg::Toeplitz => AmplifierKind::Toeplitz,
            AmplifierArg::Hmac => AmplifierKind::Hmac,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "bb84-sim",
    about = "Simulate a BB84 key exchange, optionally with an eavesdropper",
    version
)]
struct Cli {
    /// TOML config; flags below override it
    #[arg(long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Qubits to send (1..=1000)
    #[arg(short = 'n', long = "size")]
    size: Option<usize>,

    /// Put Eve on the channel
    #[arg(long = "eve", action = ArgAction::SetTrue)]
    eve: bool,

    /// Fraction of qubits Eve intercepts
    #[arg(long = "intercept", value_name = "P")]
    intercept: Option<f64>,

    /// Channel bit-flip probability
    #[arg(long = "noise", value_name = "P")]
    noise: Option<f64>,

    #[arg(long = "seed")]
    seed: Option<u64>,

    #[arg(long = "mode", value_enum)]
    mode: Option<ModeArg>,

    #[arg(long = "amplifier", value_enum)]
    amplifier: Option<AmplifierArg>,

    /// Encrypt and decrypt this message with the final key
    #[arg(short = 'm', long = "message")]
    message: Option<String>,

    /// Print the report as JSON
    #[arg(long = "json", action = ArgAction::SetTrue)]
    json: bool,

    /// Fetch transmissions from a BB84 backend instead of simulating locally
    #[cfg(feature = "remote")]
    #[arg(long = "backend", value_name = "URL")]
    backend: Option<String>,
}

impl Cli {
    fn protocol_config(&self) -> anyhow::Result<ProtocolConfig> {
        let mut config = match &self.config {
            Some(path) => ProtocolConfig::load(path)?,
            None => ProtocolConfig::default(),
        };
        if let Some(size) = self.size {
            config.transmission_size = size;
        }
        if self.eve {
            config.eve_active = true;
        }
        if let Some(p) = self.intercept {
            config.eve_intercept_probability = p;
        }
        if let Some(p) = self.noise {
            config.channel_noise = p;
        }
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        if let Some(mode) = self.mode {
            config.cipher_mode = mode.into();
        }
        if let Some(kind) = self.amplifier {
            config.amplifier = kind.into();
        }
        config.validate()?;
        Ok(config)
    }

    #[cfg(feature = "remote")]
    fn protocol(&self, config: ProtocolConfig) -> anyhow::Result<Bb84Protocol> {
        match &self.backend {
            Some(url) => {
                let backend = bb84::backend::HttpBackend::new(url.clone())?;
                Ok(Bb84Protocol::with_channel(config, Box::new(backend))?)
            }
            None => Ok(Bb84Protocol::new(config)?),
        }
    }

    #[cfg(not(feature = "remote"))]
    fn protocol(&self, config: ProtocolConfig) -> anyhow::Result<Bb84Protocol> {
        Ok(Bb84Protocol::new(config)?)
    }
}

fn print_report(report: &SessionReport) {
    println!("BB84 session ({} channel)", report.channel);
    println!("  qubits sent:     {}", report.transmission_size);
    println!("  sifted length:   {}", report.sifted_length);
    println!("  errors:          {}", report.errors);
    println!(
        "  QBER:            {:.2}% (abort at {:.0}%)",
        report.qber * 100.0,
        report.threshold * 100.0
    );
    println!("  sifted key:      {}", report.sifted_key);
    if let Some(key) = &report.corrected_key {
        println!("  corrected key:   {} ({})", key, report.reconciler);
    }
    if let Some(key) = &report.final_key {
        println!("  final key:       {} ({})", key, report.amplifier);
    }
    if report.aborted {
        println!("  ABORTED: error rate suggests an eavesdropper");
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = cli.protocol_config()?;
    info!("starting session: {:?}", config);
    let mut protocol = cli.protocol(config)?;

    let outcome = protocol.run_to_completion();
    if let Some(report) = protocol.report() {
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_report(&report);
        }
    }

    match outcome {
        Ok(_) => {}
        Err(e) if e.is_abort() => return Ok(()),
        Err(e) => return Err(e.into()),
    }

    if let Some(message) = &cli.message {
        let mode = protocol.derive_cipher_key()?;
        let sealed = protocol
            .encrypt(message)
            .with_context(|| format!("encrypting with {:?}", mode))?;
        let decrypted = protocol.decrypt(&sealed)?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&sealed)?);
        } else {
            println!("  cipher text:     {}", sealed.cipher_text);
            println!("  decrypted:       {}", decrypted);
            if mode == CipherMode::OneTimePad {
                println!("  key bits left:   {}", sealed.key_remaining);
            }
        }
    }
    Ok(())
}
