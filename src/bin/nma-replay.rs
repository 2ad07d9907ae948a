use anyhow::{Context, Result};
use clap::Parser;
use osnma_engine::{
    types::{InavWord, OsnmaDataMessage},
    EngineConfig, Event, EventSink, Fragment, FullStorage, Gst, InavBand, NmaEngine, PublicKey,
    Svn, TagPolicy, TrustAnchor, Validated,
};
use spki::DecodePublicKey;
use std::io::{BufRead, Read};

/// Replay recorded OSNMA and INAV data through the NMA engine.
///
/// Records are read from stdin, one per line:
///
///   osnma <wn> <tow> <svn> <hex 5 bytes>
///   inav <wn> <tow> <svn> <e1b|e5b> <hex 16 bytes>
///   subframe <wn> <tow> <svn> <hex 75 bytes>
///   lost <svn>
///   time <wn> <tow> | time none
///
/// Empty lines and lines starting with '#' are ignored.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Merkle tree root in hex.
    #[arg(long)]
    merkle_root: Option<String>,
    /// Path to the P-256 public key in PEM format.
    #[arg(long)]
    pubkey: Option<String>,
    /// P-521 public key in hexadecimal format (SEC1 encoding).
    #[arg(long)]
    pubkey_p521: Option<String>,
    /// ID of the public key.
    #[arg(long)]
    pkid: Option<u8>,
    /// Which tags to check (all, utc, slow_eph, eph, none).
    #[arg(long, default_value_t = TagPolicy::All)]
    tag_policy: TagPolicy,
    /// Minimum number of verified tag bits to report data as authenticated.
    #[arg(long, default_value_t = osnma_engine::config::DEFAULT_MIN_AUTHBITS)]
    min_authbits: u16,
    /// Maximum difference in seconds between the receiver time and the key
    /// disclosure time.
    #[arg(long, default_value_t = osnma_engine::config::DEFAULT_TIME_TOLERANCE_SECS)]
    time_tolerance: u32,
}

fn load_pubkey(path: &str, pkid: u8) -> Result<PublicKey<Validated>> {
    let mut file = std::fs::File::open(path)?;
    let mut pem = String::new();
    file.read_to_string(&mut pem)?;
    let pubkey = p256::ecdsa::VerifyingKey::from_public_key_pem(&pem)?;
    Ok(PublicKey::from_p256(pubkey, pkid).force_valid())
}

fn load_pubkey_p521(hex: &str, pkid: u8) -> Result<PublicKey<Validated>> {
    let pubkey = hex::decode(hex)?;
    let pubkey = p521::ecdsa::VerifyingKey::from_sec1_bytes(&pubkey)?;
    Ok(PublicKey::from_p521(pubkey, pkid).force_valid())
}

fn trust_anchor(args: &Args) -> Result<TrustAnchor> {
    if args.pubkey.is_some() && args.pubkey_p521.is_some() {
        anyhow::bail!("the --pubkey and --pubkey-p521 arguments are mutually exclusive");
    }
    let has_pubkey = args.pubkey.is_some() || args.pubkey_p521.is_some();
    if has_pubkey != args.pkid.is_some() {
        anyhow::bail!("the --pkid argument needs to be used together with --pubkey or --pubkey-p521");
    }
    let public_key = match (&args.pubkey, &args.pubkey_p521, args.pkid) {
        (Some(path), _, Some(pkid)) => Some(load_pubkey(path, pkid)?),
        (_, Some(hex), Some(pkid)) => Some(load_pubkey_p521(hex, pkid)?),
        _ => None,
    };
    let merkle_root = match &args.merkle_root {
        Some(merkle) => Some(
            hex::decode(merkle)
                .context("failed to parse Merkle tree root")?
                .try_into()
                .map_err(|_| anyhow::anyhow!("the Merkle tree root has a wrong length"))?,
        ),
        None => None,
    };
    if merkle_root.is_none() && public_key.is_none() {
        log::warn!("no Merkle tree root nor public key given. data will not be authenticated");
    }
    Ok(TrustAnchor {
        merkle_root,
        public_key,
    })
}

struct PrintEvents;

impl EventSink for PrintEvents {
    fn event(&mut self, event: Event) {
        match event {
            Event::VerifiedNavObject {
                kind,
                svn,
                gst,
                authbits,
                ..
            } => println!(
                "verified {kind:?} {svn} wn={} tow={} authbits={authbits}",
                gst.wn(),
                gst.tow()
            ),
            Event::AuthenticationStatus(status) => println!(
                "status {} eph_bits={} utc_bits={}",
                status.svn, status.verified_eph_bits, status.verified_utc_bits
            ),
            Event::BadAuthentication { kind, svn, gst } => {
                println!("failure {kind:?} svn={svn:?} gst={gst:?}")
            }
            Event::UnauthenticatedNavObject { svn, gst, .. } => {
                println!("unauthenticated {svn} wn={} tow={}", gst.wn(), gst.tow())
            }
        }
    }
}

fn parse_gst(wn: Option<&str>, tow: Option<&str>) -> Result<Gst> {
    let wn = wn.context("missing WN")?.parse()?;
    let tow = tow.context("missing TOW")?.parse()?;
    Gst::try_new(wn, tow).context("TOW out of range")
}

fn parse_svn(svn: Option<&str>) -> Result<Svn> {
    Ok(svn.context("missing SVN")?.parse()?)
}

fn parse_hex<const N: usize>(data: Option<&str>) -> Result<[u8; N]> {
    hex::decode(data.context("missing data")?)?
        .try_into()
        .map_err(|_| anyhow::anyhow!("data should have {N} bytes"))
}

fn process_line(engine: &mut NmaEngine<FullStorage>, line: &str) -> Result<()> {
    let mut fields = line.split_whitespace();
    let Some(record) = fields.next() else {
        return Ok(());
    };
    match record {
        "osnma" => {
            let gst = parse_gst(fields.next(), fields.next())?;
            let svn = parse_svn(fields.next())?;
            let data: OsnmaDataMessage = parse_hex(fields.next())?;
            engine.feed_osnma(&data, svn, gst, &mut PrintEvents);
        }
        "inav" => {
            let gst = parse_gst(fields.next(), fields.next())?;
            let svn = parse_svn(fields.next())?;
            let band = match fields.next() {
                Some("e1b") => InavBand::E1B,
                Some("e5b") => InavBand::E5B,
                band => anyhow::bail!("invalid INAV band {band:?}"),
            };
            let word: InavWord = parse_hex(fields.next())?;
            engine.feed_inav(&word, svn, gst, band, &mut PrintEvents);
        }
        "subframe" => {
            let gst = parse_gst(fields.next(), fields.next())?;
            let svn = parse_svn(fields.next())?;
            let data = hex::decode(fields.next().context("missing data")?)?;
            let fragment = Fragment::new(svn, gst, &data)?;
            engine.ingest_fragment(&fragment, &mut PrintEvents);
        }
        "lost" => engine.loss_of_lock(parse_svn(fields.next())?),
        "time" => {
            let wn = fields.next();
            let gst = if wn == Some("none") {
                None
            } else {
                Some(parse_gst(wn, fields.next())?)
            };
            engine.set_receiver_time(gst);
        }
        _ => anyhow::bail!("unknown record {record}"),
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let config = EngineConfig {
        tag_policy: args.tag_policy,
        min_authbits: args.min_authbits,
        time_tolerance_secs: args.time_tolerance,
    };
    let mut engine = NmaEngine::<FullStorage>::new(trust_anchor(&args)?, config);
    log::info!("engine mode {:?}", engine.mode());

    for (lineno, line) in std::io::stdin().lock().lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Err(e) = process_line(&mut engine, line) {
            log::error!("line {}: {e:#}", lineno + 1);
        }
    }
    Ok(())
}
