use std::sync::mpsc::{self, Receiver, Sender};

use tracing::debug;

use crate::models::ItemId;

/// A request to pull missing data from the network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchRequest {
    Item(ItemId),
    Conversation(ItemId),
}

/// Fire-and-forget network fetches. Results land in the item store and are
/// picked up by a later rebuild, never awaited.
pub trait RemoteFetcher: Send + Sync {
    fn request_fetch(&self, id: ItemId);

    fn request_conversation_fetch(&self, conversation_id: ItemId);

    /// Whether whole conversations can be fetched in one request
    fn supports_conversation_fetch(&self) -> bool {
        true
    }
}

/// Forwards fetch requests to whatever owns the network connection
pub struct ChannelFetcher {
    tx: Sender<FetchRequest>,
    conversation_fetch: bool,
}

impl ChannelFetcher {
    pub fn new() -> (Self, Receiver<FetchRequest>) {
        let (tx, rx) = mpsc::channel();
        (
            Self {
                tx,
                conversation_fetch: true,
            },
            rx,
        )
    }

    /// For sources that can only fetch single notes
    pub fn without_conversation_fetch(mut self) -> Self {
        self.conversation_fetch = false;
        self
    }

    fn send(&self, request: FetchRequest) {
        // The receiver going away only means nobody is fetching anymore
        if self.tx.send(request).is_err() {
            debug!(?request, "fetch request dropped, receiver gone");
        }
    }
}

impl RemoteFetcher for ChannelFetcher {
    fn request_fetch(&self, id: ItemId) {
        self.send(FetchRequest::Item(id));
    }

    fn request_conversation_fetch(&self, conversation_id: ItemId) {
        self.send(FetchRequest::Conversation(conversation_id));
    }

    fn supports_conversation_fetch(&self) -> bool {
        self.conversation_fetch
    }
}

/// Offline operation: every request is ignored
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopFetcher;

impl RemoteFetcher for NoopFetcher {
    fn request_fetch(&self, _id: ItemId) {}

    fn request_conversation_fetch(&self, _conversation_id: ItemId) {}

    fn supports_conversation_fetch(&self) -> bool {
        false
    }
}
