use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use colored::*;
use gpsbus::protocol::{
    CommandReply, GroundFrame, InboundMessage, ReplyStatus, TelemetryFrame, GPS_APP_READ_MID,
    GPS_APP_SEND_HK_MID, GPS_APP_SEND_RF_MID,
};
use gpsbus::telemetry::{RfTelemetryPacket, TelemetryMessage};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;
use tokio::time;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: &str = "8080";
const REPLY_TIMEOUT_MS: u64 = 5000;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() -> CliResult<()> {
    let matches = App::new("gpsbus")
        .version("0.1.0")
        .author("Space Systems Engineering Team")
        .about("🛰️  Ground client for the GPS sensor application")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("host")
                .short("H")
                .long("host")
                .value_name("HOST")
                .help("Simulator host address")
                .takes_value(true)
                .default_value(DEFAULT_HOST)
                .global(true),
        )
        .arg(
            Arg::with_name("port")
                .short("p")
                .long("port")
                .value_name("PORT")
                .help("Simulator port")
                .takes_value(true)
                .default_value(DEFAULT_PORT)
                .global(true),
        )
        .arg(
            Arg::with_name("json")
                .long("json")
                .help("Print raw JSON frames")
                .global(true),
        )
        .subcommand(SubCommand::with_name("noop").about("🏓 Send a NOOP ground command"))
        .subcommand(SubCommand::with_name("reset").about("🧹 Reset the command counters"))
        .subcommand(SubCommand::with_name("read").about("📍 Trigger a sensor read"))
        .subcommand(SubCommand::with_name("hk").about("📊 Request a housekeeping report"))
        .subcommand(SubCommand::with_name("rf").about("📡 Request an RF telemetry report"))
        .subcommand(
            SubCommand::with_name("send")
                .about("🔧 Send an arbitrary message")
                .arg(
                    Arg::with_name("msg-id")
                        .long("msg-id")
                        .value_name("MID")
                        .help("Message id, decimal or 0x-prefixed hex")
                        .takes_value(true)
                        .required(true),
                )
                .arg(
                    Arg::with_name("code")
                        .long("code")
                        .value_name("CC")
                        .help("Command code")
                        .takes_value(true)
                        .default_value("0"),
                )
                .arg(
                    Arg::with_name("length")
                        .long("length")
                        .value_name("BYTES")
                        .help("Total packet length")
                        .takes_value(true)
                        .default_value("8"),
                ),
        )
        .subcommand(
            SubCommand::with_name("monitor")
                .about("👀 Stream telemetry frames")
                .arg(
                    Arg::with_name("count")
                        .short("n")
                        .long("count")
                        .value_name("N")
                        .help("Stop after N frames")
                        .takes_value(true),
                ),
        )
        .get_matches();

    let host = matches.value_of("host").unwrap_or(DEFAULT_HOST);
    let port = matches.value_of("port").unwrap_or(DEFAULT_PORT);
    let json = matches.is_present("json");

    let stream = TcpStream::connect(format!("{}:{}", host, port)).await?;
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    let (message, expect_telemetry) = match matches.subcommand() {
        ("noop", _) => (InboundMessage::noop(), None),
        ("reset", _) => (InboundMessage::reset_counters(), None),
        ("read", _) => (InboundMessage::trigger(GPS_APP_READ_MID), None),
        ("hk", _) => (InboundMessage::trigger(GPS_APP_SEND_HK_MID), Some(TelemetryKind::Housekeeping)),
        ("rf", _) => (InboundMessage::trigger(GPS_APP_SEND_RF_MID), Some(TelemetryKind::Rf)),
        ("send", Some(sub)) => (parse_send(sub)?, None),
        ("monitor", Some(sub)) => {
            let count = sub.value_of("count").map(str::parse::<usize>).transpose()?;
            return monitor(&mut reader, count, json).await;
        }
        _ => return Err("no subcommand given".into()),
    };

    let line = serde_json::to_string(&message)?;
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;

    let (reply, early) =
        time::timeout(Duration::from_millis(REPLY_TIMEOUT_MS), wait_for_reply(&mut reader)).await??;
    print_reply(&reply, json);

    if let (Some(kind), ReplyStatus::Accepted) = (expect_telemetry, reply.status) {
        // The report is broadcast before the reply, so it may already be here.
        let frame = match early.into_iter().find(|frame| kind.matches(&frame.telemetry)) {
            Some(frame) => frame,
            None => {
                time::timeout(
                    Duration::from_millis(REPLY_TIMEOUT_MS),
                    wait_for_telemetry(&mut reader, kind),
                )
                .await??
            }
        };
        print_telemetry(&frame, json);
    }

    Ok(())
}

#[derive(Debug, Clone, Copy)]
enum TelemetryKind {
    Housekeeping,
    Rf,
}

impl TelemetryKind {
    fn matches(self, telemetry: &TelemetryMessage) -> bool {
        matches!(
            (self, telemetry),
            (TelemetryKind::Housekeeping, TelemetryMessage::Housekeeping(_))
                | (TelemetryKind::Rf, TelemetryMessage::Rf(_))
        )
    }
}

fn parse_u16(text: &str) -> CliResult<u16> {
    Ok(match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16)?,
        None => text.parse()?,
    })
}

fn parse_send(sub: &ArgMatches) -> CliResult<InboundMessage> {
    let msg_id = parse_u16(sub.value_of("msg-id").unwrap_or_default())?;
    let code: u8 = sub.value_of("code").unwrap_or("0").parse()?;
    let length: usize = sub.value_of("length").unwrap_or("8").parse()?;
    Ok(InboundMessage::new(msg_id, code, length))
}

async fn next_frame(reader: &mut BufReader<OwnedReadHalf>) -> CliResult<GroundFrame> {
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return Err("simulator closed the connection".into());
        }
        if !line.trim().is_empty() {
            return Ok(serde_json::from_str(line.trim())?);
        }
    }
}

/// Wait for the command reply, keeping any telemetry that arrives first.
async fn wait_for_reply(
    reader: &mut BufReader<OwnedReadHalf>,
) -> CliResult<(CommandReply, Vec<TelemetryFrame>)> {
    let mut early = Vec::new();
    loop {
        match next_frame(reader).await? {
            GroundFrame::Reply(reply) => return Ok((reply, early)),
            GroundFrame::Telemetry(frame) => early.push(frame),
        }
    }
}

async fn wait_for_telemetry(
    reader: &mut BufReader<OwnedReadHalf>,
    kind: TelemetryKind,
) -> CliResult<TelemetryFrame> {
    loop {
        if let GroundFrame::Telemetry(frame) = next_frame(reader).await? {
            if kind.matches(&frame.telemetry) {
                return Ok(frame);
            }
        }
    }
}

async fn monitor(reader: &mut BufReader<OwnedReadHalf>, count: Option<usize>, json: bool) -> CliResult<()> {
    println!("{}", "📡 Streaming telemetry (Ctrl+C to stop)".bright_cyan());
    let mut seen = 0usize;
    while count.map_or(true, |limit| seen < limit) {
        if let GroundFrame::Telemetry(frame) = next_frame(reader).await? {
            print_telemetry(&frame, json);
            seen += 1;
        }
    }
    Ok(())
}

fn print_reply(reply: &CommandReply, json: bool) {
    if json {
        if let Ok(text) = serde_json::to_string_pretty(reply) {
            println!("{}", text);
        }
        return;
    }

    let status = match reply.status {
        ReplyStatus::Accepted => "ACCEPTED".green().bold(),
        ReplyStatus::Rejected => "REJECTED".red().bold(),
        ReplyStatus::Failed => "FAILED".yellow().bold(),
    };
    println!(
        "{} MID=0x{:04X} CC={} {}",
        status,
        reply.msg_id,
        reply.command_code,
        reply.message.as_deref().unwrap_or("")
    );
    println!(
        "  {} cmd={} err={} sats={} rf_seq={}",
        "counters".dimmed(),
        reply.state.command_counter,
        reply.state.error_counter,
        reply.state.satellite_count,
        reply.state.rf_sequence_counter
    );
}

fn print_telemetry(frame: &TelemetryFrame, json: bool) {
    if json {
        if let Ok(text) = serde_json::to_string(frame) {
            println!("{}", text);
        }
        return;
    }

    match &frame.telemetry {
        TelemetryMessage::Housekeeping(packet) => {
            let p = &packet.payload;
            println!(
                "{} t={} cmd={} err={} lat={:.6} lon={:.6} alt={:.2} sats={}",
                "HK".bright_blue().bold(),
                packet.timestamp,
                p.command_counter,
                p.command_error_counter,
                p.latitude,
                p.longitude,
                p.altitude,
                p.satellites
            );
        }
        TelemetryMessage::Rf(packet) => {
            println!("{} t={} seq={}", "RF".bright_magenta().bold(), packet.timestamp, packet.sequence);
            println!("  {}", hex_dump(&frame.raw).as_str().dimmed());
            if let Some(decoded) = RfTelemetryPacket::from_bytes(&frame.raw) {
                let pos = decoded.position();
                println!(
                    "  lat={:.6} lon={:.6} alt={:.2} sats={}",
                    pos.latitude,
                    pos.longitude,
                    pos.altitude,
                    decoded.satellites()
                );
            }
        }
    }
}

fn hex_dump(bytes: &[u8]) -> String {
    bytes
        .chunks(4)
        .map(|group| group.iter().map(|b| format!("{:02x}", b)).collect::<String>())
        .collect::<Vec<_>>()
        .join(" ")
}
