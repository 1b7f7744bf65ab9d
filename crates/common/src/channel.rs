//! Bidirectional request/reply and push channel between editor and host
//!
//! One [`Channel`] wraps one stream. Either end may answer requests by
//! registering a [`Responder`]; each incoming request is served on its own
//! task, so a long test run never holds up watcher pushes or other requests.
//! A responder that fails or panics produces an error reply, and the channel
//! keeps serving.

use crate::protocol::{Event, EventTopic, Frame, Reply, Request};
use crate::{Error, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tracing::{debug, error, trace, warn};

/// Upper bound for one frame; test reports carry captured output
const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Answers requests arriving on a channel
#[async_trait]
pub trait Responder: Send + Sync + 'static {
    async fn respond(&self, request: Request, peer: Peer) -> Result<Reply>;
}

/// Sending half towards the remote endpoint
#[derive(Clone)]
pub struct Peer {
    outbound: mpsc::UnboundedSender<Frame>,
}

impl Peer {
    /// Push an event to the remote endpoint
    pub fn emit(&self, event: Event) -> Result<()> {
        trace!("Emitting {}", event.topic());
        self.outbound
            .send(Frame::Event { event })
            .map_err(|_| Error::Channel("peer disconnected".to_string()))
    }

    pub fn is_connected(&self) -> bool {
        !self.outbound.is_closed()
    }
}

/// Receiving end of one subscription
pub struct Subscription {
    topic: EventTopic,
    key: String,
    rx: mpsc::UnboundedReceiver<Event>,
}

impl Subscription {
    /// Next event, or `None` once the subscription was replaced, removed or
    /// the channel closed
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    pub fn topic(&self) -> EventTopic {
        self.topic
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Fan-out of pushed events to keyed subscribers
///
/// A topic may have many subscribers, but at most one per key: subscribing
/// again under the same key closes the previous subscription.
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<HashMap<EventTopic, HashMap<String, mpsc::UnboundedSender<Event>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, topic: EventTopic, key: impl Into<String>) -> Subscription {
        let key = key.into();
        let (tx, rx) = mpsc::unbounded_channel();
        let previous = self
            .subscribers
            .lock()
            .entry(topic)
            .or_default()
            .insert(key.clone(), tx);
        if previous.is_some() {
            debug!("Replaced subscription {}/{}", topic, key);
        }
        Subscription { topic, key, rx }
    }

    pub fn unsubscribe(&self, topic: EventTopic, key: &str) -> bool {
        self.subscribers
            .lock()
            .get_mut(&topic)
            .map(|subs| subs.remove(key).is_some())
            .unwrap_or(false)
    }

    /// Deliver to every live subscriber of the event's topic. Returns the
    /// number of deliveries.
    pub fn publish(&self, event: Event) -> usize {
        let topic = event.topic();
        let mut subscribers = self.subscribers.lock();
        let Some(subs) = subscribers.get_mut(&topic) else {
            return 0;
        };
        subs.retain(|_, tx| !tx.is_closed());
        subs.values().filter(|tx| tx.send(event.clone()).is_ok()).count()
    }

    /// Drop every subscription, ending their receivers
    pub fn clear(&self) {
        self.subscribers.lock().clear();
    }

    pub fn subscriber_count(&self, topic: EventTopic) -> usize {
        self.subscribers
            .lock()
            .get(&topic)
            .map(|subs| subs.values().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }
}

type Pending = Arc<DashMap<u64, oneshot::Sender<Reply>>>;

/// One endpoint of the editor/host channel
pub struct Channel {
    peer: Peer,
    pending: Pending,
    next_id: AtomicU64,
    bus: Arc<EventBus>,
    closed: watch::Receiver<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl Channel {
    /// Start serving `stream`. Must be called inside a tokio runtime.
    pub fn open<S>(stream: S, responder: Option<Arc<dyn Responder>>) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read, write) = tokio::io::split(stream);
        let (outbound, rx) = mpsc::unbounded_channel();
        let (closed_tx, closed) = watch::channel(false);
        let peer = Peer { outbound };
        let pending: Pending = Arc::new(DashMap::new());
        let bus = Arc::new(EventBus::new());

        let writer = tokio::spawn(write_loop(write, rx, pending.clone()));
        let reader = tokio::spawn(read_loop(
            read,
            Inbound {
                pending: pending.clone(),
                bus: bus.clone(),
                responder,
                peer: peer.clone(),
                closed: closed_tx,
            },
        ));

        Self {
            peer,
            pending,
            next_id: AtomicU64::new(1),
            bus,
            closed,
            tasks: vec![writer, reader],
        }
    }

    /// Send a request and wait for its reply.
    ///
    /// An error reply from the peer comes back as [`Error::Remote`].
    pub async fn request(&self, request: Request) -> Result<Reply> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let topic = request.topic();
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);

        // Teardown marks the channel closed before clearing `pending`, so a
        // slot inserted after the clear is caught here.
        if self.is_closed() {
            self.pending.remove(&id);
            return Err(Error::Channel(format!("channel closed, `{}` not sent", topic)));
        }

        debug!("Request #{} {}", id, topic);
        if self.peer.outbound.send(Frame::Request { id, request }).is_err() {
            self.pending.remove(&id);
            return Err(Error::Channel("channel closed".to_string()));
        }

        match rx.await {
            Ok(Reply::Error { message }) => Err(Error::Remote(message)),
            Ok(reply) => Ok(reply),
            Err(_) => Err(Error::Channel(format!(
                "channel closed before `{}` was answered",
                topic
            ))),
        }
    }

    pub fn emit(&self, event: Event) -> Result<()> {
        self.peer.emit(event)
    }

    pub fn subscribe(&self, topic: EventTopic, key: impl Into<String>) -> Subscription {
        self.bus.subscribe(topic, key)
    }

    pub fn unsubscribe(&self, topic: EventTopic, key: &str) -> bool {
        self.bus.unsubscribe(topic, key)
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn peer(&self) -> Peer {
        self.peer.clone()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Resolves once the remote end disconnected
    pub async fn closed(&self) {
        let mut closed = self.closed.clone();
        let _ = closed.wait_for(|closed| *closed).await;
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

struct Inbound {
    pending: Pending,
    bus: Arc<EventBus>,
    responder: Option<Arc<dyn Responder>>,
    peer: Peer,
    closed: watch::Sender<bool>,
}

async fn write_loop<W>(write: W, mut rx: mpsc::UnboundedReceiver<Frame>, pending: Pending)
where
    W: AsyncWrite + Unpin,
{
    let mut sink = FramedWrite::new(write, LinesCodec::new());
    while let Some(frame) = rx.recv().await {
        let line = match serde_json::to_string(&frame) {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to encode frame: {}", e);
                continue;
            }
        };
        if let Err(e) = sink.send(line).await {
            warn!("Channel write failed: {}", e);
            break;
        }
    }

    // Refuse further frames before failing the requests already queued
    rx.close();
    if !pending.is_empty() {
        debug!("Channel writer stopped, failing {} pending request(s)", pending.len());
        pending.clear();
    }
}

async fn read_loop<R>(read: R, inbound: Inbound)
where
    R: AsyncRead + Unpin,
{
    let mut lines = FramedRead::new(read, LinesCodec::new_with_max_length(MAX_FRAME_LEN));

    while let Some(line) = lines.next().await {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("Channel read failed: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        let frame: Frame = match serde_json::from_str(&line) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Dropping malformed frame: {}", e);
                continue;
            }
        };

        match frame {
            Frame::Reply { id, reply } => match inbound.pending.remove(&id) {
                Some((_, slot)) => {
                    let _ = slot.send(reply);
                }
                None => warn!("Reply for unknown request #{}", id),
            },
            Frame::Event { event } => {
                let topic = event.topic();
                let delivered = inbound.bus.publish(event);
                trace!("Event {} delivered to {} subscriber(s)", topic, delivered);
            }
            Frame::Request { id, request } => {
                tokio::spawn(answer(id, request, inbound.responder.clone(), inbound.peer.clone()));
            }
        }
    }

    let _ = inbound.closed.send(true);
    debug!("Channel closed, failing {} pending request(s)", inbound.pending.len());
    inbound.pending.clear();
    inbound.bus.clear();
}

async fn answer(id: u64, request: Request, responder: Option<Arc<dyn Responder>>, peer: Peer) {
    let topic = request.topic();
    let reply = match responder {
        None => Reply::error(format!("no responder for `{}`", topic)),
        Some(responder) => {
            let call_peer = peer.clone();
            let call = tokio::spawn(async move { responder.respond(request, call_peer).await });
            match call.await {
                Ok(Ok(reply)) => reply,
                Ok(Err(e)) => {
                    warn!("Responder for {} failed: {}", topic, e);
                    Reply::error(e)
                }
                Err(e) => {
                    error!("Responder for {} panicked: {}", topic, e);
                    Reply::error(format!("responder for `{}` crashed", topic))
                }
            }
        }
    };

    if peer.outbound.send(Frame::Reply { id, reply }).is_err() {
        debug!("Peer gone before reply #{} could be sent", id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    struct Echo;

    #[async_trait]
    impl Responder for Echo {
        async fn respond(&self, request: Request, peer: Peer) -> Result<Reply> {
            match request {
                Request::BrowseFile { default_path } => Ok(Reply::Selection(default_path)),
                Request::WatchProjectFiles { project_directory } => {
                    peer.emit(Event::FileNavigatorUpdated { project_directory })?;
                    Ok(Reply::Done)
                }
                Request::InstallRuntimeTest { .. } => Err(Error::Execution("npm missing".into())),
                Request::OpenRecorderWindow => panic!("window system unavailable"),
                _ => Ok(Reply::Done),
            }
        }
    }

    fn pair() -> (Channel, Channel) {
        let (a, b) = tokio::io::duplex(64 * 1024);
        (Channel::open(a, None), Channel::open(b, Some(Arc::new(Echo))))
    }

    #[tokio::test]
    async fn test_request_reply() {
        let (editor, _host) = pair();
        let reply = editor
            .request(Request::BrowseFile { default_path: Some(PathBuf::from("/p")) })
            .await
            .unwrap();
        assert_eq!(reply, Reply::Selection(Some(PathBuf::from("/p"))));
    }

    #[tokio::test]
    async fn test_failing_responder_does_not_close_channel() {
        let (editor, _host) = pair();
        let err = editor
            .request(Request::InstallRuntimeTest { runtime_test_directory: PathBuf::from("/rt") })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Remote(ref m) if m.contains("npm missing")));

        let err = editor.request(Request::OpenRecorderWindow).await.unwrap_err();
        assert!(matches!(err, Error::Remote(_)));

        assert_eq!(editor.request(Request::BrowseDirectory).await.unwrap(), Reply::Done);
    }

    #[tokio::test]
    async fn test_request_without_responder_gets_error_reply() {
        let (_editor, host) = pair();
        let err = host.request(Request::BrowseDirectory).await.unwrap_err();
        assert!(matches!(err, Error::Remote(ref m) if m.contains("browse-directory")));
    }

    #[tokio::test]
    async fn test_responder_pushes_events() {
        let (editor, _host) = pair();
        let mut sub = editor.subscribe(EventTopic::FileNavigatorUpdated, "navigator");
        editor
            .request(Request::WatchProjectFiles { project_directory: PathBuf::from("/proj") })
            .await
            .unwrap();
        let event = tokio::time::timeout(Duration::from_secs(1), sub.recv()).await.unwrap();
        let expected = Event::FileNavigatorUpdated { project_directory: PathBuf::from("/proj") };
        assert_eq!(event, Some(expected));
    }

    #[tokio::test]
    async fn test_pending_request_fails_when_peer_drops() {
        let (a, b) = tokio::io::duplex(1024);
        let editor = Channel::open(a, None);
        let request = editor.request(Request::BrowseDirectory);
        drop(b);
        let err = request.await.unwrap_err();
        assert!(matches!(err, Error::Channel(_)));
        editor.closed().await;
        assert!(editor.is_closed());
    }

    #[test]
    fn test_resubscribe_replaces_previous() {
        let bus = EventBus::new();
        let mut first = bus.subscribe(EventTopic::FileNavigatorUpdated, "navigator");
        let mut second = bus.subscribe(EventTopic::FileNavigatorUpdated, "navigator");
        let _other = bus.subscribe(EventTopic::FileNavigatorUpdated, "status-bar");

        let delivered =
            bus.publish(Event::FileNavigatorUpdated { project_directory: PathBuf::from("/p") });
        assert_eq!(delivered, 2);
        assert!(first.rx.try_recv().is_err());
        assert!(second.rx.try_recv().is_ok());
        assert_eq!(bus.subscriber_count(EventTopic::FileNavigatorUpdated), 2);

        assert!(bus.unsubscribe(EventTopic::FileNavigatorUpdated, "status-bar"));
        assert_eq!(bus.subscriber_count(EventTopic::FileNavigatorUpdated), 1);
    }
}
