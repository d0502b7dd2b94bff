//! Upstream detections.
//!
//! The detector itself is outside this crate; it hands over one
//! [`DetectionBatch`] per frame. [`JsonLinesSource`] reads batches encoded as
//! one JSON object per line:
//!
//! ```text
//! {"width":2432,"height":2048,"detections":[{"x":1300.5,"y":880.0,"class_id":1,"confidence":0.82}]}
//! ```
//!
//! Lines may omit `width`/`height` when the source has a default frame.

use crate::error::{PtzError, PtzResult};
use crate::projection::{Frame, PixelCoordinate};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

/// One detected object: box center plus classifier output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Box center column in pixels
    pub x: f64,
    /// Box center row in pixels
    pub y: f64,
    /// Classifier label
    #[serde(default)]
    pub class_id: u32,
    /// Classifier score in [0, 1]; 1.0 when absent
    #[serde(default = "default_confidence")]
    pub confidence: f32,
}

fn default_confidence() -> f32 {
    1.0
}

impl Detection {
    /// Detection at `(x, y)` with class 0 and full confidence.
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            class_id: 0,
            confidence: default_confidence(),
        }
    }

    /// Replace the confidence.
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }

    /// Box center as a pixel coordinate.
    pub fn center(&self) -> PixelCoordinate {
        PixelCoordinate {
            x: self.x,
            y: self.y,
        }
    }
}

/// All detections of a single frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionBatch {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Detections in source order
    #[serde(default)]
    pub detections: Vec<Detection>,
}

impl DetectionBatch {
    /// Batch for a `width` x `height` frame.
    pub fn new(width: u32, height: u32, detections: Vec<Detection>) -> Self {
        Self {
            width,
            height,
            detections,
        }
    }

    /// Validated frame; fails on a zero dimension.
    pub fn frame(&self) -> PtzResult<Frame> {
        Frame::new(self.width, self.height)
    }
}

/// Producer of detection batches. `Ok(None)` marks end of stream.
#[async_trait]
pub trait DetectionSource: Send {
    /// Next batch, or `None` at end of stream.
    async fn next_batch(&mut self) -> PtzResult<Option<DetectionBatch>>;
}

/// Wire form of a batch; dimensions are optional on input.
#[derive(Deserialize)]
struct RawBatch {
    width: Option<u32>,
    height: Option<u32>,
    #[serde(default)]
    detections: Vec<Detection>,
}

/// Reads JSON-encoded batches, one per line. Blank lines are skipped.
///
/// A line that is not UTF-8 or not a valid batch is reported as
/// [`PtzError::Detection`]; reading continues with the next line.
pub struct JsonLinesSource<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
    line_number: u64,
    default_frame: Option<Frame>,
}

impl<R: AsyncRead + Unpin + Send> JsonLinesSource<R> {
    /// Read from `reader`; lines must carry their own dimensions.
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            buf: Vec::new(),
            line_number: 0,
            default_frame: None,
        }
    }

    /// Frame size used for lines that do not carry their own.
    pub fn with_default_frame(mut self, frame: Frame) -> Self {
        self.default_frame = Some(frame);
        self
    }

    fn decode(&self, line: &str) -> PtzResult<DetectionBatch> {
        let raw: RawBatch = serde_json::from_str(line)
            .map_err(|e| PtzError::Detection(format!("line {}: {}", self.line_number, e)))?;

        let fallback = self.default_frame.map(|f| (f.width(), f.height()));
        let (width, height) = match (raw.width, raw.height, fallback) {
            (Some(w), Some(h), _) => (w, h),
            (w, h, Some((dw, dh))) => (w.unwrap_or(dw), h.unwrap_or(dh)),
            _ => {
                return Err(PtzError::Detection(format!(
                    "line {}: missing frame width/height",
                    self.line_number
                )))
            }
        };
        Ok(DetectionBatch::new(width, height, raw.detections))
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> DetectionSource for JsonLinesSource<R> {
    async fn next_batch(&mut self) -> PtzResult<Option<DetectionBatch>> {
        loop {
            self.buf.clear();
            if self.reader.read_until(b'\n', &mut self.buf).await? == 0 {
                return Ok(None);
            }
            self.line_number += 1;

            let line = std::str::from_utf8(&self.buf).map_err(|e| {
                PtzError::Detection(format!("line {}: {}", self.line_number, e))
            })?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            return self.decode(trimmed).map(Some);
        }
    }
}

/// Replays batches from any iterator; used for recorded sessions and tests.
pub struct IterSource<I> {
    inner: I,
}

impl<I> IterSource<I>
where
    I: Iterator<Item = DetectionBatch> + Send,
{
    /// Replay `batches` in order.
    pub fn new<T: IntoIterator<IntoIter = I>>(batches: T) -> Self {
        Self {
            inner: batches.into_iter(),
        }
    }
}

#[async_trait]
impl<I> DetectionSource for IterSource<I>
where
    I: Iterator<Item = DetectionBatch> + Send,
{
    async fn next_batch(&mut self) -> PtzResult<Option<DetectionBatch>> {
        Ok(self.inner.next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_json_lines_parses_and_ends() {
        let input = b"{\"width\":100,\"height\":80,\"detections\":[{\"x\":1.0,\"y\":2.0,\"class_id\":3,\"confidence\":0.5}]}\n\n{\"width\":100,\"height\":80}\n";
        let mut source = JsonLinesSource::new(&input[..]);

        let first = source.next_batch().await.unwrap().unwrap();
        assert_eq!(first.detections.len(), 1);
        assert_eq!(first.detections[0].class_id, 3);
        assert_eq!(first.detections[0].confidence, 0.5);

        let second = source.next_batch().await.unwrap().unwrap();
        assert!(second.detections.is_empty());

        assert!(source.next_batch().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_malformed_line_reports_line_number() {
        let input = b"{\"width\":10,\"height\":10}\nnot json\n";
        let mut source = JsonLinesSource::new(&input[..]);
        source.next_batch().await.unwrap();

        let err = source.next_batch().await.unwrap_err();
        assert!(matches!(err, PtzError::Detection(ref m) if m.starts_with("line 2")));
    }

    #[tokio::test]
    async fn test_non_utf8_line_is_detection_error_and_reading_continues() {
        let mut input = b"{\"width\":10,\"height\":10}\n".to_vec();
        input.extend_from_slice(&[0xFF, 0xFE, b'\n']);
        input.extend_from_slice(b"{\"width\":20,\"height\":20}");
        let mut source = JsonLinesSource::new(&input[..]);

        assert_eq!(source.next_batch().await.unwrap().unwrap().width, 10);
        let err = source.next_batch().await.unwrap_err();
        assert!(matches!(err, PtzError::Detection(ref m) if m.starts_with("line 2")));
        // last line has no trailing newline
        assert_eq!(source.next_batch().await.unwrap().unwrap().width, 20);
        assert!(source.next_batch().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_dimensions_use_default_frame() {
        let input = b"{\"detections\":[{\"x\":1.0,\"y\":1.0}]}\n{\"width\":64,\"detections\":[]}\n";
        let frame = Frame::new(2432, 2048).unwrap();
        let mut source = JsonLinesSource::new(&input[..]).with_default_frame(frame);

        let first = source.next_batch().await.unwrap().unwrap();
        assert_eq!((first.width, first.height), (2432, 2048));
        let second = source.next_batch().await.unwrap().unwrap();
        assert_eq!((second.width, second.height), (64, 2048));
    }

    #[tokio::test]
    async fn test_missing_dimensions_without_default_is_error() {
        let input = b"{\"detections\":[]}\n";
        let mut source = JsonLinesSource::new(&input[..]);
        let err = source.next_batch().await.unwrap_err();
        assert!(matches!(err, PtzError::Detection(ref m) if m.contains("missing frame")));
    }

    #[test]
    fn test_default_confidence_is_one() {
        let d: Detection = serde_json::from_str("{\"x\":5.0,\"y\":6.0}").unwrap();
        assert_eq!(d.confidence, 1.0);
        assert_eq!(d.center(), PixelCoordinate { x: 5.0, y: 6.0 });
    }

    #[tokio::test]
    async fn test_iter_source() {
        let mut source = IterSource::new(vec![DetectionBatch::new(4, 4, vec![])]);
        assert!(source.next_batch().await.unwrap().is_some());
        assert!(source.next_batch().await.unwrap().is_none());
    }
}
