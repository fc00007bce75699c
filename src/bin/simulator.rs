use clap::{App, Arg};
use gpsbus::agent::{Dispatched, GpsApp, RunStatus};
use gpsbus::bus::Transport;
use gpsbus::clock::{Clock, SystemClock};
use gpsbus::config::AppConfig;
use gpsbus::error::{GpsError, TransportError};
use gpsbus::protocol::{CommandReply, GroundFrame, InboundMessage, ReplyStatus, TelemetryFrame};
use gpsbus::scheduler::WakeupScheduler;
use gpsbus::subsystems::SimulatedGpsReceiver;
use gpsbus::telemetry::TelemetryMessage;
use gpsbus::TelemetryState;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tokio::sync::{broadcast, mpsc, oneshot, Mutex};
use tokio::time;
use tracing::{debug, error, info, warn};

const DEFAULT_PORT: &str = "8080";
const TELEMETRY_BROADCAST_BUFFER_SIZE: usize = 256;
const TICK_MS: u64 = 100;

/// A queued message and, for ground commands, where its reply goes.
type PipeEntry = (InboundMessage, Option<oneshot::Sender<CommandReply>>);

/// Command pipe fed by ground clients and the wakeup scheduler, plus a
/// telemetry fan-out to every connected ground client.
struct GroundLinkTransport {
    pipe_rx: mpsc::Receiver<PipeEntry>,
    awaiting_reply: Option<oneshot::Sender<CommandReply>>,
    telemetry_tx: broadcast::Sender<String>,
}

impl GroundLinkTransport {
    /// Answer the sender of the message most recently received.
    fn complete(&mut self, reply: CommandReply) {
        if let Some(reply_tx) = self.awaiting_reply.take() {
            // The client may have gone away meanwhile.
            let _ = reply_tx.send(reply);
        }
    }
}

impl Transport for GroundLinkTransport {
    fn receive(&mut self) -> Result<Option<InboundMessage>, TransportError> {
        match self.pipe_rx.try_recv() {
            Ok((message, reply_tx)) => {
                self.awaiting_reply = reply_tx;
                Ok(Some(message))
            }
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(TransportError::PipeClosed),
        }
    }

    fn transmit(&mut self, telemetry: &TelemetryMessage) -> Result<(), TransportError> {
        let frame = GroundFrame::Telemetry(TelemetryFrame::new(*telemetry));
        let line = serde_json::to_string(&frame)
            .map_err(|e| TransportError::Rejected(e.to_string()))?;

        // No subscribers just means nobody is listening right now.
        if self.telemetry_tx.send(line).is_err() {
            debug!(msg_id = telemetry.msg_id(), "telemetry dropped, no ground clients");
        }
        Ok(())
    }
}

type SimApp = GpsApp<SimulatedGpsReceiver, GroundLinkTransport, SystemClock>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let matches = App::new("gpsbus-simulator")
        .version("0.1.0")
        .about("GPS sensor application simulator with a TCP ground link")
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("FILE")
                .help("JSON configuration file")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("port")
                .short("p")
                .long("port")
                .value_name("PORT")
                .help("Ground link TCP port")
                .takes_value(true)
                .default_value(DEFAULT_PORT),
        )
        .get_matches();

    let config = match matches.value_of("config") {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    let port: u16 = matches.value_of("port").unwrap_or(DEFAULT_PORT).parse()?;

    println!("🛰️  GPS Application Simulator");
    println!("============================");

    let (telemetry_tx, _) = broadcast::channel(TELEMETRY_BROADCAST_BUFFER_SIZE);
    let (pipe_tx, pipe_rx) = mpsc::channel(config.pipe_depth);
    info!("📥 Command pipe {} (depth {})", config.pipe_name, config.pipe_depth);

    let clock = SystemClock;
    let mut scheduler = WakeupScheduler::from_config(&config, clock.timestamp());

    let transport = GroundLinkTransport {
        pipe_rx,
        awaiting_reply: None,
        telemetry_tx: telemetry_tx.clone(),
    };
    let app: Arc<Mutex<SimApp>> = Arc::new(Mutex::new(GpsApp::new(
        config,
        SimulatedGpsReceiver::new(),
        transport,
        clock,
    )));
    app.lock().await.init();

    let tcp_app = Arc::clone(&app);
    let tcp_pipe_tx = pipe_tx.clone();
    let tcp_telemetry_tx = telemetry_tx.clone();
    let tcp_server = tokio::spawn(async move {
        if let Err(e) = start_tcp_server(port, tcp_app, tcp_pipe_tx, tcp_telemetry_tx).await {
            error!("TCP server error: {}", e);
        }
    });

    let mut interval = time::interval(Duration::from_millis(TICK_MS));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let mut guard = app.lock().await;
                guard.sensor_mut().advance(TICK_MS);

                let now = guard.clock().timestamp();
                for wakeup in scheduler.due_messages(now) {
                    if let Err(e) = pipe_tx.try_send((wakeup, None)) {
                        warn!(msg_id = wakeup.msg_id, "wakeup not queued: {}", e);
                    }
                }

                if drain_pipe(&mut guard) != RunStatus::Run {
                    error!("command pipe failed, simulator exiting");
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                app.lock().await.stop();
                break;
            }
        }
    }

    tcp_server.abort();
    println!("🛑 GPS Application Simulator stopped");

    Ok(())
}

/// Process everything queued on the command pipe, replying to ground
/// clients as their commands complete.
fn drain_pipe(app: &mut SimApp) -> RunStatus {
    loop {
        match app.dispatch_next() {
            Ok(Some(Dispatched { message, outcome })) => {
                let reply = command_reply(&message, outcome, *app.state());
                app.transport_mut().complete(reply);
            }
            Ok(None) | Err(_) => return app.run_status(),
        }
    }
}

async fn start_tcp_server(
    port: u16,
    app: Arc<Mutex<SimApp>>,
    pipe_tx: mpsc::Sender<PipeEntry>,
    telemetry_tx: broadcast::Sender<String>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    info!("🌐 Ground link listening on port {}", port);

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("🔗 Ground client connected: {}", addr);
                let client_app = Arc::clone(&app);
                let client_pipe_tx = pipe_tx.clone();
                let client_telemetry_rx = telemetry_tx.subscribe();

                tokio::spawn(async move {
                    if let Err(e) =
                        handle_client(stream, client_app, client_pipe_tx, client_telemetry_rx).await
                    {
                        warn!("Client {} error: {}", addr, e);
                    }
                    info!("🔌 Ground client {} disconnected", addr);
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

async fn handle_client(
    stream: TcpStream,
    app: Arc<Mutex<SimApp>>,
    pipe_tx: mpsc::Sender<PipeEntry>,
    mut telemetry_rx: broadcast::Receiver<String>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let (reader, writer) = stream.into_split();
    let mut buf_reader = BufReader::new(reader);
    let writer = Arc::new(Mutex::new(writer));

    let telemetry_writer = Arc::clone(&writer);
    let telemetry_task = tokio::spawn(async move {
        loop {
            match telemetry_rx.recv().await {
                Ok(line) => {
                    let mut writer_guard = telemetry_writer.lock().await;
                    if writer_guard.write_all(line.as_bytes()).await.is_err()
                        || writer_guard.write_all(b"\n").await.is_err()
                    {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("ground client lagging, skipped {} frames", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let mut line = String::new();
    loop {
        line.clear();
        if buf_reader.read_line(&mut line).await? == 0 {
            break;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let reply = match serde_json::from_str::<InboundMessage>(trimmed) {
            Ok(message) => {
                info!("📨 Received: {:?}", message);
                let (reply_tx, reply_rx) = oneshot::channel();
                let queued = match pipe_tx.try_send((message, Some(reply_tx))) {
                    Ok(()) => Ok(reply_rx),
                    Err(TrySendError::Full(_)) => Err(TransportError::PipeFull),
                    Err(TrySendError::Closed(_)) => Err(TransportError::PipeClosed),
                };

                match queued {
                    Ok(reply_rx) => match reply_rx.await {
                        Ok(reply) => reply,
                        // Dropped unanswered: the app stopped reading the pipe.
                        Err(_) => {
                            let state = *app.lock().await.state();
                            pipe_failure_reply(&message, &TransportError::PipeClosed, state)
                        }
                    },
                    Err(e) => {
                        warn!(msg_id = message.msg_id, "command not queued: {}", e);
                        let state = *app.lock().await.state();
                        pipe_failure_reply(&message, &e, state)
                    }
                }
            }
            Err(e) => {
                warn!("Failed to parse ground message: {}", e);
                continue;
            }
        };

        let reply_json = serde_json::to_string(&GroundFrame::Reply(reply))?;
        let mut writer_guard = writer.lock().await;
        writer_guard.write_all(reply_json.as_bytes()).await?;
        writer_guard.write_all(b"\n").await?;
    }

    telemetry_task.abort();
    Ok(())
}

fn command_reply(
    message: &InboundMessage,
    outcome: Result<gpsbus::Handled, GpsError>,
    state: TelemetryState,
) -> CommandReply {
    let (status, text) = match outcome {
        Ok(handled) => (ReplyStatus::Accepted, format!("{:?}", handled)),
        Err(e) if e.counts_as_error() => (ReplyStatus::Rejected, e.to_string()),
        Err(e) => (ReplyStatus::Failed, e.to_string()),
    };

    CommandReply {
        msg_id: message.msg_id,
        command_code: message.command_code,
        status,
        message: Some(text),
        state,
    }
}

fn pipe_failure_reply(message: &InboundMessage, e: &TransportError, state: TelemetryState) -> CommandReply {
    CommandReply {
        msg_id: message.msg_id,
        command_code: message.command_code,
        status: ReplyStatus::Failed,
        message: Some(e.to_string()),
        state,
    }
}
