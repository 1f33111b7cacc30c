use anyhow::{Error, anyhow};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::operation::select_object_content::SelectObjectContentOutput;
use aws_sdk_s3::types::{
    CompressionType, ExpressionType, InputSerialization, JsonInput, JsonOutput, JsonType,
    OutputSerialization, Progress, SelectObjectContentEventStream, Stats,
};
use futures::stream::{self, BoxStream, StreamExt};
use tracing::debug;

use crate::arg::S3Location;

/// Ordered events of a select, terminated by the first error.
pub type EventStream = BoxStream<'static, Result<SelectEvent, Error>>;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScanStats {
    pub bytes_scanned: i64,
    pub bytes_processed: i64,
    pub bytes_returned: i64,
}

impl From<&Stats> for ScanStats {
    fn from(stats: &Stats) -> Self {
        ScanStats {
            bytes_scanned: stats.bytes_scanned.unwrap_or_default(),
            bytes_processed: stats.bytes_processed.unwrap_or_default(),
            bytes_returned: stats.bytes_returned.unwrap_or_default(),
        }
    }
}

impl From<&Progress> for ScanStats {
    fn from(progress: &Progress) -> Self {
        ScanStats {
            bytes_scanned: progress.bytes_scanned.unwrap_or_default(),
            bytes_processed: progress.bytes_processed.unwrap_or_default(),
            bytes_returned: progress.bytes_returned.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectEvent {
    Records(Vec<u8>),
    Stats(ScanStats),
    Progress(ScanStats),
    Continuation,
    End,
}

/// A filter expression bound to the object it runs against.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectRequest {
    pub location: S3Location,
    pub expression: String,
}

impl SelectRequest {
    pub fn new(location: S3Location, expression: String) -> Self {
        SelectRequest {
            location,
            expression,
        }
    }

    /// Source objects are gzip-compressed JSON Lines.
    pub fn input_serialization(&self) -> InputSerialization {
        InputSerialization::builder()
            .json(JsonInput::builder().r#type(JsonType::Lines).build())
            .compression_type(CompressionType::Gzip)
            .build()
    }

    pub fn output_serialization(&self) -> OutputSerialization {
        OutputSerialization::builder()
            .json(JsonOutput::builder().build())
            .build()
    }
}

#[async_trait]
pub trait SelectSource {
    /// Starts the select. An error here means nothing has been received yet.
    async fn select(&self, request: &SelectRequest) -> Result<EventStream, Error>;
}

/// `SelectSource` backed by the S3 `SelectObjectContent` API.
pub struct S3Select {
    client: Client,
}

impl S3Select {
    pub fn new(client: Client) -> Self {
        S3Select { client }
    }
}

#[async_trait]
impl SelectSource for S3Select {
    async fn select(&self, request: &SelectRequest) -> Result<EventStream, Error> {
        debug!(
            location = %request.location,
            expression = %request.expression,
            "starting SelectObjectContent"
        );

        let output = self
            .client
            .select_object_content()
            .bucket(&request.location.bucket)
            .key(&request.location.key)
            .expression_type(ExpressionType::Sql)
            .expression(&request.expression)
            .input_serialization(request.input_serialization())
            .output_serialization(request.output_serialization())
            .send()
            .await
            .map_err(|e| anyhow!("{}", DisplayErrorContext(e)))?;

        Ok(event_stream(output))
    }
}

fn event_stream(output: SelectObjectContentOutput) -> EventStream {
    stream::unfold(Some(output.payload), |receiver| async move {
        let mut receiver = receiver?;
        match receiver.recv().await {
            Ok(Some(event)) => Some((Ok(convert_event(event)), Some(receiver))),
            Ok(None) => None,
            // stop polling after the first error
            Err(e) => Some((Err(anyhow!("{}", DisplayErrorContext(e))), None)),
        }
    })
    .filter_map(|x| async move { x.transpose() })
    .boxed()
}

fn convert_event(event: SelectObjectContentEventStream) -> Option<SelectEvent> {
    match event {
        SelectObjectContentEventStream::Records(records) => Some(SelectEvent::Records(
            records.payload.map(|x| x.into_inner()).unwrap_or_default(),
        )),
        SelectObjectContentEventStream::Stats(stats) => Some(SelectEvent::Stats(
            stats.details.as_ref().map(ScanStats::from).unwrap_or_default(),
        )),
        SelectObjectContentEventStream::Progress(progress) => Some(SelectEvent::Progress(
            progress
                .details
                .as_ref()
                .map(ScanStats::from)
                .unwrap_or_default(),
        )),
        SelectObjectContentEventStream::Cont(_) => Some(SelectEvent::Continuation),
        SelectObjectContentEventStream::End(_) => Some(SelectEvent::End),
        otherwise => {
            debug!("skipping unknown select event: {:?}", otherwise);
            None
        }
    }
}
