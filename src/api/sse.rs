//! Server-Sent Events support

use crate::broadcast::{Broadcaster, Frame};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;

/// Open a push stream backed by the broadcast registry
///
/// The registration lives as long as the stream: a drop guard deregisters the
/// client when the connection closes from either end.
pub fn sse_stream(
    broadcaster: &Broadcaster,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (id, rx) = broadcaster.register();
    let guard = Registration {
        id,
        broadcaster: broadcaster.clone(),
    };

    let stream = UnboundedReceiverStream::new(rx).map(move |frame| {
        // Keeps the guard owned by the stream until it is dropped
        let _keep_alive = &guard;
        Ok(frame_to_event(frame))
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn frame_to_event(frame: Frame) -> Event {
    match frame {
        Frame::Comment(text) => Event::default().comment(text),
        Frame::Event { name, data } => Event::default().event(name).data(data),
    }
}

struct Registration {
    id: i64,
    broadcaster: Broadcaster,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.broadcaster.deregister(self.id);
    }
}
