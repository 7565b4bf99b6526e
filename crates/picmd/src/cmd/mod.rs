use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use picmd_frame::{FieldEncoding, FrameConfig};
use picmd_transport::DEFAULT_BAUD_RATE;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod encode;
pub mod send;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the built-in diagnostic handlers on a device (`-` for stdin/stdout).
    Serve(ServeArgs),
    /// Send one command and print the reply.
    Send(SendArgs),
    /// Print the frame for a command without sending it.
    Encode(EncodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Encode(args) => encode::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Field layout on the wire.
#[derive(Copy, Clone, Debug, Default, ValueEnum)]
pub enum EncodingArg {
    /// Raw bytes.
    #[default]
    Binary,
    /// Two ASCII hex digits per byte.
    Hex,
}

impl From<EncodingArg> for FieldEncoding {
    fn from(arg: EncodingArg) -> Self {
        match arg {
            EncodingArg::Binary => FieldEncoding::Binary,
            EncodingArg::Hex => FieldEncoding::HexAscii,
        }
    }
}

#[derive(Args, Debug)]
pub struct LinkArgs {
    /// Serial device path.
    pub device: PathBuf,
    /// Line speed in baud.
    #[arg(long, default_value_t = DEFAULT_BAUD_RATE)]
    pub baud: u32,
    /// Field encoding.
    #[arg(long, value_enum, default_value_t = EncodingArg::Binary)]
    pub encoding: EncodingArg,
}

impl LinkArgs {
    pub fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            encoding: self.encoding.into(),
            ..FrameConfig::default()
        }
    }
}

#[derive(Args, Debug)]
pub struct PayloadArgs {
    /// Command id (decimal or 0x-prefixed hex).
    #[arg(long, value_parser = parse_id)]
    pub id: u8,
    /// Payload as a UTF-8 string.
    #[arg(long, conflicts_with = "hex")]
    pub data: Option<String>,
    /// Payload as hex digits (e.g. 0102ff).
    #[arg(long, conflicts_with = "data")]
    pub hex: Option<String>,
}

impl PayloadArgs {
    pub fn payload(&self) -> CliResult<Vec<u8>> {
        if let Some(data) = &self.data {
            return Ok(data.as_bytes().to_vec());
        }
        if let Some(digits) = &self.hex {
            return hex::decode(digits.trim())
                .map_err(|err| CliError::new(USAGE, format!("--hex is not valid hex: {err}")));
        }
        Ok(Vec::new())
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[command(flatten)]
    pub link: LinkArgs,
    /// Serial read timeout; bounds how long Ctrl-C takes to stop (e.g. 100ms).
    #[arg(long, default_value = "100ms")]
    pub read_timeout: String,
    /// Answer unknown command ids with COMMAND_FAIL instead of exiting.
    #[arg(long)]
    pub reply_unknown: bool,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub link: LinkArgs,
    #[command(flatten)]
    pub payload: PayloadArgs,
    /// Maximum time to wait for the reply (e.g. 5s, 500ms).
    #[arg(long, default_value = "2s")]
    pub wait_timeout: String,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    #[command(flatten)]
    pub payload: PayloadArgs,
    /// Field encoding.
    #[arg(long, value_enum, default_value_t = EncodingArg::Binary)]
    pub encoding: EncodingArg,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

fn parse_id(input: &str) -> Result<u8, String> {
    let input = input.trim();
    let parsed = match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some(digits) => u16::from_str_radix(digits, 16),
        None => input.parse::<u16>(),
    };
    let id = parsed.map_err(|_| format!("invalid command id: {input}"))?;
    u8::try_from(id).map_err(|_| format!("command id {id} out of range (0..=255)"))
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
