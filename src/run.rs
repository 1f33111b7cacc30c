use anyhow::{Context, Error};
use futures::stream::StreamExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::command::FilterStat;
use crate::select::{EventStream, ScanStats, SelectEvent, SelectRequest, SelectSource};

const CHANNEL_CAPACITY: usize = 16;

/// Runs the select and copies every record payload, in arrival order, to `writer`.
///
/// Events are drained by a spawned task into a bounded channel; the calling
/// task owns the writer. A terminal stream error is reported only after all
/// payloads received before it have been written.
pub async fn filter_execute<S, W>(
    source: &S,
    request: &SelectRequest,
    writer: &mut W,
) -> Result<FilterStat, Error>
where
    S: SelectSource + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let events = source.select(request).await?;

    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let producer = tokio::spawn(drain_events(events, tx));

    let stat = match copy_records(rx, writer).await {
        Ok(stat) => stat,
        Err(e) => {
            // the event stream is dropped once the aborted task is joined
            producer.abort();
            let _ = producer.await;
            return Err(e);
        }
    };

    let scan = producer
        .await?
        .context("failed to read from SelectObjectContent event stream")?;

    Ok(FilterStat { scan, ..stat })
}

async fn drain_events(
    mut events: EventStream,
    tx: mpsc::Sender<Vec<u8>>,
) -> Result<Option<ScanStats>, Error> {
    let mut scan = None;

    while let Some(event) = events.next().await {
        match event? {
            SelectEvent::Records(payload) => {
                if tx.send(payload).await.is_err() {
                    debug!("output closed, stop reading events");
                    break;
                }
            }
            SelectEvent::Stats(stats) => {
                debug!(?stats, "select stats");
                scan = Some(stats);
            }
            SelectEvent::Progress(progress) => trace!(?progress, "select progress"),
            SelectEvent::Continuation => trace!("select continuation"),
            SelectEvent::End => debug!("select end"),
        }
    }

    Ok(scan)
}

async fn copy_records<W>(
    mut rx: mpsc::Receiver<Vec<u8>>,
    writer: &mut W,
) -> Result<FilterStat, Error>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut stat = FilterStat::default();

    while let Some(payload) = rx.recv().await {
        writer.write_all(&payload).await?;
        stat = stat + payload.as_slice();
    }
    writer.flush().await?;

    Ok(stat)
}
