//! Dispatcher execution: input feed, client bridge and event printer

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::sync::Arc;
use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde_json::{json, Value};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::cli::{Args, RespondMode};
use crate::config::ConfigManager;
use crate::notifications::{
    ChannelEmitter, ClientBridge, EmittedEvent, EventEmitter, IncomingMessage, ListenerRegistry,
    LoggingPresenter, NotificationHandler, NotificationListener, ReceivedNotificationForwarder,
    RemoteMessage, StaticDelegate,
};
use super::initialization::configure_handler;

/// What the input feed delivered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStats {
    pub messages: usize,
    pub deleted: usize,
    pub rejected: usize,
}

/// One decoded input line
#[derive(Debug)]
enum FeedLine {
    Message(RemoteMessage),
    Deleted,
}

fn parse_line(line: &str) -> Result<FeedLine> {
    let value: Value = serde_json::from_str(line).context("Input line is not valid JSON")?;
    if value.get("deleted").and_then(Value::as_bool) == Some(true) {
        return Ok(FeedLine::Deleted);
    }
    let message = serde_json::from_value(value).context("Input line is not a remote message")?;
    Ok(FeedLine::Message(message))
}

/// Read newline-delimited messages and push them through the listener registry
pub fn feed<R: BufRead>(reader: R, listeners: &ListenerRegistry) -> Result<FeedStats> {
    let mut stats = FeedStats::default();

    for (index, line) in reader.lines().enumerate() {
        let line = line.context("Failed to read input")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match parse_line(line) {
            Ok(FeedLine::Message(message)) => {
                let message = IncomingMessage::from(message);
                debug!("Feeding message {} from line {}", message.identifier(), index + 1);
                listeners.dispatch_message(&message);
                stats.messages += 1;
            }
            Ok(FeedLine::Deleted) => {
                listeners.dispatch_deleted_messages();
                stats.deleted += 1;
            }
            Err(e) => {
                warn!("Skipping input line {}: {:#}", index + 1, e);
                stats.rejected += 1;
            }
        }
    }

    Ok(stats)
}

/// Write one event as a JSON line
pub fn write_event<W: Write>(writer: &mut W, event: &EmittedEvent) -> Result<()> {
    let line = json!({
        "event": event.name,
        "body": event.body,
    });
    serde_json::to_writer(&mut *writer, &line).context("Failed to serialize event")?;
    writeln!(writer).context("Failed to write event")?;
    writer.flush().context("Failed to flush event output")?;
    Ok(())
}

fn client_bridge(mode: RespondMode, handler: &Arc<NotificationHandler>) -> Option<ClientBridge> {
    let delegate = match mode {
        RespondMode::Show => StaticDelegate::show(),
        RespondMode::Suppress => StaticDelegate::suppress(),
        RespondMode::None => return None,
    };
    Some(ClientBridge::new(Arc::clone(handler), Arc::new(delegate)))
}

/// Print every event and hand it to the client bridge until `shutdown` fires
///
/// The handler keeps an emitter alive, so the channel never closes on its own.
async fn print_events(
    mut events: mpsc::UnboundedReceiver<EmittedEvent>,
    bridge: Option<ClientBridge>,
    shutdown: CancellationToken,
) -> Result<usize> {
    let mut printed = 0;
    loop {
        tokio::select! {
            biased;
            Some(event) = events.recv() => {
                write_event(&mut io::stdout().lock(), &event)?;
                printed += 1;
                if let Some(bridge) = &bridge {
                    bridge.dispatch(event);
                }
            }
            _ = shutdown.cancelled() => break,
        }
    }

    // Events emitted during deactivation
    while let Ok(event) = events.try_recv() {
        write_event(&mut io::stdout().lock(), &event)?;
        printed += 1;
    }
    Ok(printed)
}

/// Run the dispatcher over the configured input
pub async fn run(args: Args, config: ConfigManager) -> Result<()> {
    let handler_config = configure_handler(&args, &config)?;

    let listeners = Arc::new(ListenerRegistry::new());
    let (emitter, events) = ChannelEmitter::channel();
    let emitter: Arc<dyn EventEmitter> = Arc::new(emitter);

    let handler = NotificationHandler::new(
        Arc::clone(&listeners),
        Arc::clone(&emitter),
        Arc::new(LoggingPresenter),
        handler_config,
        Handle::current(),
    );
    handler.activate();

    let forwarder: Arc<dyn NotificationListener> =
        Arc::new(ReceivedNotificationForwarder::new(Arc::clone(&emitter)));
    listeners.add_listener(Arc::clone(&forwarder));

    let shutdown = CancellationToken::new();
    let printer = tokio::spawn(print_events(
        events,
        client_bridge(args.respond, &handler),
        shutdown.clone(),
    ));

    let input = args.input.clone();
    let feed_listeners = Arc::clone(&listeners);
    let stats = tokio::task::spawn_blocking(move || match input {
        Some(path) => {
            info!("Reading messages from {}", path.display());
            let file = File::open(&path)
                .with_context(|| format!("Failed to open input file: {}", path.display()))?;
            feed(BufReader::new(file), &feed_listeners)
        }
        None => {
            debug!("Reading messages from stdin");
            feed(io::stdin().lock(), &feed_listeners)
        }
    })
    .await
    .context("Input reader task failed")??;

    debug!("Input finished, {} notification(s) in flight", handler.pending_count());
    handler.wait_until_idle().await;
    handler.deactivate();
    listeners.remove_listener(&forwarder);

    shutdown.cancel();
    let printed = printer.await.context("Event printer task failed")??;

    info!(
        "Processed {} message(s), {} deleted signal(s), {} rejected line(s), {} event(s) emitted",
        stats.messages, stats.deleted, stats.rejected, printed
    );
    Ok(())
}
