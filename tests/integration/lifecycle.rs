use crate::*;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use bytes::Bytes;
use sluice_core::{ChainableHandler, PassThrough, SluiceConfig};
use sluice_media::{spawn_reporter, Channel, Direction, MediaDescription, TrackError};

/// Close fires once, clears the handler, and fences off both paths.
#[test]
fn test_close_semantics() -> Result<()> {
    init_tracing();
    let link = link(
        MediaDescription::video("v", Direction::SendRecv),
        MediaDescription::video("v", Direction::SendRecv),
        &TrackConfig::default(),
    );
    link.b
        .set_rtcp_handler(Some(Arc::new(ChainableHandler::new(PassThrough))));

    let closed = Arc::new(AtomicUsize::new(0));
    let c = closed.clone();
    link.b.events().on_closed(move || {
        c.fetch_add(1, Ordering::SeqCst);
    });

    link.b.close();
    link.b.close();
    assert_eq!(closed.load(Ordering::SeqCst), 1);
    assert!(link.b.is_closed());
    assert!(!link.b.is_open());
    assert!(link.b.rtcp_handler().is_none());

    assert!(matches!(
        link.b.send_binary(Bytes::from_static(b"late")),
        Err(TrackError::Closed)
    ));
    assert!(matches!(
        link.b.outgoing(Message::binary(Bytes::from_static(b"late"))),
        Err(TrackError::Closed)
    ));

    // The open side still sends; the closed side silently ignores it.
    assert!(link.a.send_binary(Bytes::from_static(b"ignored"))?);
    assert!(link.b.peek().is_none());
    Ok(())
}

/// A track whose transport went away reports it instead of sending.
#[test]
fn test_dropped_transport() -> Result<()> {
    init_tracing();
    let Link {
        a, b, a_to_b, b_to_a, ..
    } = link(
        MediaDescription::audio("a", Direction::SendRecv),
        MediaDescription::audio("a", Direction::SendRecv),
        &TrackConfig::default(),
    );
    assert!(a.is_open());

    drop(a_to_b);
    assert!(!a.is_open());
    assert!(!a.is_closed());
    assert!(matches!(
        a.send_binary(Bytes::from_static(b"nowhere")),
        Err(TrackError::TransportUnavailable)
    ));

    // The reverse direction is unaffected.
    assert!(b.send_binary(Bytes::from_static(b"still here"))?);
    assert_eq!(b_to_a.sent().len(), 1);
    Ok(())
}

/// Tracks built from a loaded config use its queue limit and DSCP marks.
#[test]
fn test_config_file_drives_tracks() -> Result<()> {
    init_tracing();
    let dir = std::env::temp_dir().join(format!("sluice-it-{}", std::process::id()));
    std::fs::create_dir_all(&dir)?;
    let path = dir.join("config.toml");
    std::fs::write(&path, "[track]\nrecv_queue_limit = 1\naudio_dscp = 40\n")?;

    let config = SluiceConfig::load_from(&path).context("config should load")?;
    let _ = std::fs::remove_dir_all(&dir);

    let link = link(
        MediaDescription::audio("a", Direction::SendRecv),
        MediaDescription::audio("a", Direction::SendRecv),
        &config.track,
    );
    link.a.send_binary(Bytes::from_static(b"1"))?;
    link.a.send_binary(Bytes::from_static(b"2"))?;

    assert!(link.a_to_b.sent().iter().all(|m| m.dscp == 40));
    assert_eq!(drain(&link.b).len(), 1);
    assert_eq!(link.counters.snapshot().queue_full, 1);
    Ok(())
}

/// The reporter keeps running until shutdown, then flushes and exits.
#[tokio::test]
async fn test_reporter_stops_on_shutdown() -> Result<()> {
    init_tracing();
    let counters = sluice_media::TrackCounters::new();
    let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
    let reporter = spawn_reporter(counters.clone(), Duration::from_millis(10), shutdown_rx);

    counters.record_queue_full();
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(!reporter.is_finished());

    shutdown_tx.send(())?;
    tokio::time::timeout(Duration::from_secs(1), reporter).await??;
    Ok(())
}
