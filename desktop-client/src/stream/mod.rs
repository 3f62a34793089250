//! Turning the raw `/reply` body into protocol frames.

pub mod decoder;

pub use decoder::FrameDecoder;

use futures_util::{Stream, StreamExt};
use goose_desktop_models::StreamEvent;
use tracing::{debug, warn};

use crate::error::ChatError;

/// Adapt a byte-chunk stream into a stream of frames.
///
/// The returned stream is finite and single-use: it ends after a `Finish`
/// or `Error` frame, after the first failure, or when the body closes.
pub fn frame_stream<S, B, E>(body: S) -> impl Stream<Item = Result<StreamEvent, ChatError>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<ChatError>,
{
    async_stream::stream! {
        let mut decoder = FrameDecoder::new();
        futures_util::pin_mut!(body);

        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    yield Err(e.into());
                    return;
                }
            };

            for frame in decoder.push(chunk.as_ref()) {
                match frame {
                    Ok(event) => {
                        let terminal = event.is_terminal();
                        yield Ok(event);
                        if terminal {
                            if decoder.has_pending_data() {
                                warn!("Discarding data received after the final frame");
                            }
                            return;
                        }
                    }
                    Err(e) => {
                        yield Err(e.into());
                        return;
                    }
                }
            }
        }

        debug!("Reply body closed");
        if let Some(frame) = decoder.finish() {
            yield frame.map_err(ChatError::from);
        }
    }
}
