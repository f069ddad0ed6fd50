use std::io::{self, Read};

use anyhow::{Context, Result, bail};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use clap::Parser;
use serde_json::{Map, Value, json};

use resource_guard::services::auth::shape::{TokenShape, fingerprint, segment_count};

/// Decode a compact access token WITHOUT verifying it.
///
/// Debugging aid for tokens handed to the resource server:
/// - Reports shape (signed / encrypted / opaque) and a log fingerprint
/// - Prints the decoded header and payload as JSON
/// - Reports `exp` and whether it has passed
/// - Lists namespaced custom claims (keys starting with `--prefix`)
///
/// Nothing printed here has been checked against any key.
#[derive(Parser, Debug)]
#[command(name = "token-inspect", version, about)]
struct Args {
    /// Token to inspect. Reads stdin when omitted or "-".
    token: Option<String>,

    /// Prefix of namespaced custom claims
    #[arg(long, default_value = "https://")]
    prefix: String,

    /// Override "now" (unix seconds) for the expiry check. Default: now.
    #[arg(long)]
    now: Option<i64>,

    /// Single-line JSON output
    #[arg(long, default_value_t = false)]
    compact: bool,
}

fn decode_segment(segment: &str) -> Result<Value> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .context("segment is not base64url")?;
    serde_json::from_slice(&bytes).context("segment is not json")
}

fn inspect(token: &str, prefix: &str, now: i64) -> Result<Value> {
    let token = token.trim();
    if token.is_empty() {
        bail!("empty token");
    }

    let segments = segment_count(token);
    let parts: Vec<&str> = token.split('.').collect();

    let mut report = Map::new();
    report.insert("fingerprint".into(), json!(fingerprint(token)));
    report.insert("segments".into(), json!(segments));

    match (TokenShape::classify(token), segments) {
        (TokenShape::SignedToken, _) => {
            let header = decode_segment(parts[0]).context("header")?;
            let payload = decode_segment(parts[1]).context("payload")?;

            let exp = payload.get("exp").and_then(Value::as_i64);
            let namespaced: Map<String, Value> = payload
                .as_object()
                .map(|claims| {
                    claims
                        .iter()
                        .filter(|(k, _)| k.starts_with(prefix))
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect()
                })
                .unwrap_or_default();

            report.insert("shape".into(), json!("signed"));
            report.insert("header".into(), header);
            report.insert("payload".into(), payload);
            report.insert("exp".into(), json!(exp));
            report.insert("expired".into(), json!(exp.map(|exp| exp <= now)));
            report.insert("namespaced_claims".into(), Value::Object(namespaced));
        }
        // JWE compact: only the protected header is readable.
        (TokenShape::OpaqueToken, 5) => {
            report.insert("shape".into(), json!("encrypted"));
            report.insert(
                "header".into(),
                decode_segment(parts[0]).unwrap_or(Value::Null),
            );
        }
        (TokenShape::OpaqueToken, _) => {
            report.insert("shape".into(), json!("opaque"));
        }
    }

    Ok(Value::Object(report))
}

fn main() -> Result<()> {
    let args = Args::parse();

    let token = match args.token.as_deref() {
        Some(token) if token != "-" => token.to_string(),
        _ => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("read token from stdin")?;
            buf
        }
    };

    let now = args.now.unwrap_or_else(|| chrono::Utc::now().timestamp());
    let report = inspect(&token, &args.prefix, now)?;

    if args.compact {
        println!("{}", serde_json::to_string(&report)?);
    } else {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}
