//! Subcommand implementations.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use bbqr_protocol::{
    ContentType, Decoder, DecoderConfig, EncodeError, EncoderConfig, FailureReason, Header,
    Outcome, TransferEncoding,
};
use clap::Args;
use log::{debug, info, warn};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};

#[derive(Error, Debug)]
pub enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Encoding failed: {0}")]
    Encode(#[from] EncodeError),

    #[error("Transfer failed: {0}")]
    TransferFailed(#[from] FailureReason),

    #[error("Incomplete transfer: received {received} of {expected} parts")]
    Incomplete { received: usize, expected: usize },

    #[error("{count} fragment(s) could not be parsed")]
    InvalidFragments { count: usize },

    #[error("JSON output failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Split a file into BBQr fragments.
#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Input file (stdin when omitted)
    pub input: Option<PathBuf>,

    /// Content type: psbt, transaction, json, cbor, unicode, binary, executable
    #[arg(short = 't', long = "type")]
    pub content_type: Option<ContentType>,

    /// Transfer encoding: plain, compressed (zlib), hex
    #[arg(short, long)]
    pub encoding: Option<TransferEncoding>,

    /// Maximum body length of each fragment
    #[arg(short = 'n', long)]
    pub max_fragment_length: Option<usize>,

    /// Fragment index the display loop starts from
    #[arg(long, default_value = "0")]
    pub first_part: usize,

    /// Cycle through the fragments until interrupted
    #[arg(short, long = "loop")]
    pub cycle: bool,

    /// Delay between frames in loop mode
    #[arg(long)]
    pub interval_ms: Option<u64>,
}

/// Reassemble a payload from scanned fragments, one per line.
#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Files with one fragment per line (stdin when omitted)
    pub inputs: Vec<PathBuf>,

    /// Where to write the payload (stdout when omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Refuse transfers declaring more parts than this
    #[arg(long)]
    pub max_parts: Option<usize>,

    /// Refuse compressed transfers inflating past this many bytes
    #[arg(long)]
    pub max_payload_len: Option<usize>,
}

/// Print the parsed header of each fragment as JSON.
#[derive(Args, Debug)]
pub struct InspectArgs {
    #[arg(required = true)]
    pub fragments: Vec<String>,
}

pub async fn encode(args: EncodeArgs, defaults: EncoderConfig) -> Result<(), CliError> {
    let payload = match &args.input {
        Some(path) => tokio::fs::read(path).await?,
        None => {
            let mut buf = Vec::new();
            tokio::io::stdin().read_to_end(&mut buf).await?;
            buf
        }
    };

    let content_type = args.content_type.unwrap_or(defaults.content_type);
    let encoding = args.encoding.unwrap_or(defaults.encoding);
    let max_len = args
        .max_fragment_length
        .unwrap_or(defaults.max_fragment_length);

    let mut transfer = bbqr_protocol::encode(&payload, content_type, encoding, max_len)?
        .with_first_part(args.first_part);
    if transfer.encoding() != encoding {
        info!(
            "Compression did not reduce size, using {} encoding",
            transfer.encoding()
        );
    }
    info!(
        "{} bytes -> {} fragment(s) of up to {} chars",
        payload.len(),
        transfer.part_count(),
        max_len
    );

    let mut stdout = tokio::io::stdout();

    if !args.cycle {
        for part in transfer.all_parts() {
            stdout.write_all(part.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
        }
        stdout.flush().await?;
        return Ok(());
    }

    let interval_ms = args.interval_ms.unwrap_or(defaults.frame_interval_ms).max(1);
    let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let part = transfer.next_part();
                stdout.write_all(part.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await?;
            }
            _ = &mut ctrl_c => {
                debug!("Interrupted, stopping display loop");
                break;
            }
        }
    }

    Ok(())
}

pub async fn decode(args: DecodeArgs, defaults: DecoderConfig) -> Result<(), CliError> {
    let config = DecoderConfig {
        max_parts: args.max_parts.unwrap_or(defaults.max_parts),
        max_payload_len: args.max_payload_len.unwrap_or(defaults.max_payload_len),
    };
    let mut decoder = Decoder::with_config(config);

    if args.inputs.is_empty() {
        scan_lines(BufReader::new(tokio::io::stdin()), &mut decoder).await?;
    } else {
        for path in &args.inputs {
            debug!("Reading fragments from {:?}", path);
            let file = tokio::fs::File::open(path).await?;
            scan_lines(BufReader::new(file), &mut decoder).await?;
            if decoder.is_complete() {
                break;
            }
        }
    }

    let data = match decoder.result() {
        Some(Outcome::Success { data, content_type }) => {
            info!("Decoded {} bytes of {}", data.len(), content_type);
            data
        }
        Some(Outcome::Failure { reason }) => return Err(reason.into()),
        None => {
            return Err(CliError::Incomplete {
                received: decoder.processed_parts_count(),
                expected: decoder.expected_part_count(),
            })
        }
    };

    match &args.output {
        Some(path) => tokio::fs::write(path, &data).await?,
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(&data).await?;
            stdout.flush().await?;
        }
    }
    Ok(())
}

/// Feed every non-empty line to the decoder until the transfer finishes.
async fn scan_lines<R>(reader: R, decoder: &mut Decoder) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if decoder.receive_part(line) {
            info!(
                "Part {}/{} ({:.0}%)",
                decoder.processed_parts_count(),
                decoder.expected_part_count(),
                decoder.percent_complete() * 100.0
            );
        }
        if decoder.is_complete() {
            break;
        }
    }
    Ok(())
}

pub fn inspect(args: InspectArgs) -> Result<(), CliError> {
    let mut invalid = 0;
    for fragment in &args.fragments {
        match Header::parse(fragment) {
            Ok((header, body)) => println!("{}", describe(&header, body)?),
            Err(e) => {
                warn!("{:?}: {}", fragment, e);
                invalid += 1;
            }
        }
    }
    if invalid > 0 {
        return Err(CliError::InvalidFragments { count: invalid });
    }
    Ok(())
}

fn describe(header: &Header, body: &str) -> Result<serde_json::Value, serde_json::Error> {
    let mut value = serde_json::to_value(header)?;
    value["body_len"] = body.len().into();
    Ok(value)
}
