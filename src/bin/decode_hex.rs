//! Decode one hex-encoded message and print its field tree.
//!
//! Usage:
//!   decode_hex [--little] ROOT HEX [ARG ...]
//!   decode_hex --list
//!
//! HEX may contain spaces. ARGs are the root type's parser arguments
//! (`true`/`false` or numbers). Reserved-field mismatches are logged through
//! `tracing`; set `RUST_LOG=warn` (or `trace` for dispatch) to see them.

use anyhow::{anyhow, bail, Context};
use fieldbus_codec::dump::render_all;
use fieldbus_codec::protocols::{root_type, ROOT_TYPES};
use fieldbus_codec::{ByteOrder, Codec};
use tracing_subscriber::EnvFilter;

fn parse_arg(arg: &str) -> anyhow::Result<u64> {
    match arg {
        "true" => Ok(1),
        "false" => Ok(0),
        _ => match arg.strip_prefix("0x") {
            Some(hex) => u64::from_str_radix(hex, 16).with_context(|| format!("argument {}", arg)),
            None => arg.parse().with_context(|| format!("argument {}", arg)),
        },
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut raw_args: Vec<String> = std::env::args().skip(1).collect();
    if raw_args.iter().any(|a| a == "--list") {
        for root in ROOT_TYPES {
            println!("{} [{}]", root.name, root.args.join(", "));
        }
        return Ok(());
    }
    let byte_order = if let Some(pos) = raw_args.iter().position(|a| a == "--little") {
        raw_args.remove(pos);
        ByteOrder::LittleEndian
    } else {
        ByteOrder::BigEndian
    };

    let mut args = raw_args.into_iter();
    let (Some(root_name), Some(hex_text)) = (args.next(), args.next()) else {
        bail!("usage: decode_hex [--little] ROOT HEX [ARG ...]  (decode_hex --list for root types)");
    };
    let root = root_type(&root_name).ok_or_else(|| anyhow!("unknown root type {}", root_name))?;
    let parser_args = args.map(|a| parse_arg(&a)).collect::<anyhow::Result<Vec<_>>>()?;
    let digits: String = hex_text.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = hex::decode(digits).context("hex input")?;

    let codec = Codec::new(byte_order);
    let decoded = (root.decode)(&codec, &bytes, &parser_args)?;
    print!("{}", render_all(&decoded.tree));
    eprintln!("consumed {} of {} bits", decoded.consumed_bits, bytes.len() * 8);
    if decoded.reserialized != bytes {
        eprintln!("re-serialized: {}", hex::encode(&decoded.reserialized));
    }
    Ok(())
}
