use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::JoinHandle;

use tracing::{debug, info};

use crate::conversation::{ConversationCache, ConversationTreeBuilder};
use crate::events::CoreEvent;
use crate::models::{ItemId, PageParams};
use crate::timeline::{CollapseState, DuplicateCollapser, PageLoader, TimelineDataset};

/// Identity of one load request. A result is only applied if its ticket is
/// still the latest one issued for the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoadTicket(u64);

pub enum LoadCommand {
    Page {
        ticket: LoadTicket,
        base: Arc<TimelineDataset>,
        params: PageParams,
        collapse: CollapseState,
    },
    Conversation {
        ticket: LoadTicket,
        selected_id: ItemId,
        allow_remote_fetch: bool,
        force_resync: bool,
    },
    Shutdown,
}

#[derive(Clone)]
pub struct ListHandle {
    command_tx: Sender<LoadCommand>,
    next_ticket: Arc<AtomicU64>,
}

impl ListHandle {
    pub(crate) fn new(command_tx: Sender<LoadCommand>) -> Self {
        Self {
            command_tx,
            next_ticket: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn next_ticket(&self) -> LoadTicket {
        LoadTicket(self.next_ticket.fetch_add(1, Ordering::SeqCst))
    }

    pub fn send(&self, command: LoadCommand) -> Result<(), mpsc::SendError<LoadCommand>> {
        self.command_tx.send(command)
    }

    pub fn load_page(
        &self,
        base: Arc<TimelineDataset>,
        params: PageParams,
        collapse: CollapseState,
    ) -> Result<LoadTicket, mpsc::SendError<LoadCommand>> {
        let ticket = self.next_ticket();
        self.send(LoadCommand::Page {
            ticket,
            base,
            params,
            collapse,
        })?;
        Ok(ticket)
    }

    pub fn load_conversation(
        &self,
        selected_id: ItemId,
        allow_remote_fetch: bool,
        force_resync: bool,
    ) -> Result<LoadTicket, mpsc::SendError<LoadCommand>> {
        let ticket = self.next_ticket();
        self.send(LoadCommand::Conversation {
            ticket,
            selected_id,
            allow_remote_fetch,
            force_resync,
        })?;
        Ok(ticket)
    }
}

/// Background worker of one logical list (a timeline or a conversation).
///
/// Loads run one at a time. When several requests are queued only the
/// newest is executed; the skipped ones were superseded anyway.
pub struct ListRuntime {
    handle: ListHandle,
    event_rx: Option<Receiver<CoreEvent>>,
    cache: ConversationCache,
    worker_handle: Option<JoinHandle<()>>,
}

struct ListWorker {
    loader: PageLoader,
    collapser: Arc<DuplicateCollapser>,
    conversations: Arc<ConversationTreeBuilder>,
    cache: ConversationCache,
    command_rx: Receiver<LoadCommand>,
    event_tx: Sender<CoreEvent>,
}

impl ListRuntime {
    pub fn spawn(
        loader: PageLoader,
        collapser: Arc<DuplicateCollapser>,
        conversations: Arc<ConversationTreeBuilder>,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::channel::<LoadCommand>();
        let (event_tx, event_rx) = mpsc::channel::<CoreEvent>();
        let cache = ConversationCache::new();

        let worker = ListWorker {
            loader,
            collapser,
            conversations,
            cache: cache.clone(),
            command_rx,
            event_tx,
        };
        let worker_handle = std::thread::spawn(move || {
            worker.run();
        });

        Self {
            handle: ListHandle::new(command_tx),
            event_rx: Some(event_rx),
            cache,
            worker_handle: Some(worker_handle),
        }
    }

    pub fn handle(&self) -> ListHandle {
        self.handle.clone()
    }

    pub fn take_event_rx(&mut self) -> Option<Receiver<CoreEvent>> {
        self.event_rx.take()
    }

    /// Items of the conversation currently being built, readable while the
    /// worker fills it
    pub fn conversation_cache(&self) -> ConversationCache {
        self.cache.clone()
    }

    pub fn shutdown(&mut self) {
        let _ = self.handle.send(LoadCommand::Shutdown);
        if let Some(worker_handle) = self.worker_handle.take() {
            let _ = worker_handle.join();
        }
    }
}

impl ListWorker {
    fn run(self) {
        info!("list worker started");
        while let Ok(command) = self.command_rx.recv() {
            let Some(command) = self.latest_command(command) else {
                break;
            };
            let event = match command {
                LoadCommand::Shutdown => break,
                LoadCommand::Page {
                    ticket,
                    base,
                    params,
                    collapse,
                } => {
                    let dataset = self
                        .loader
                        .load_dataset(&base, params, &self.collapser, &collapse);
                    CoreEvent::TimelineLoaded {
                        ticket,
                        dataset,
                        collapse,
                    }
                }
                LoadCommand::Conversation {
                    ticket,
                    selected_id,
                    allow_remote_fetch,
                    force_resync,
                } => {
                    let build = self.conversations.build_with_cache(
                        &self.cache,
                        selected_id,
                        allow_remote_fetch,
                        force_resync,
                    );
                    CoreEvent::ConversationLoaded { ticket, build }
                }
            };
            if self.event_tx.send(event).is_err() {
                debug!("event receiver gone, stopping list worker");
                break;
            }
        }
        info!("list worker stopped");
    }

    /// Drain queued commands, keeping only the newest. `None` on shutdown.
    fn latest_command(&self, mut command: LoadCommand) -> Option<LoadCommand> {
        loop {
            if matches!(command, LoadCommand::Shutdown) {
                return None;
            }
            match self.command_rx.try_recv() {
                Ok(next) => {
                    debug!("skipping superseded load request");
                    command = next;
                }
                Err(TryRecvError::Empty) => return Some(command),
                Err(TryRecvError::Disconnected) => return Some(command),
            }
        }
    }
}
