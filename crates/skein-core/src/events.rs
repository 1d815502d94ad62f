use crate::conversation::ConversationBuild;
use crate::runtime::LoadTicket;
use crate::timeline::{CollapseState, TimelineDataset};

/// Results posted by a list worker back to the rendering side
#[derive(Debug)]
pub enum CoreEvent {
    TimelineLoaded {
        ticket: LoadTicket,
        dataset: TimelineDataset,
        /// Collapse state the dataset was built with
        collapse: CollapseState,
    },
    ConversationLoaded {
        ticket: LoadTicket,
        build: ConversationBuild,
    },
}

impl CoreEvent {
    pub fn ticket(&self) -> LoadTicket {
        match self {
            CoreEvent::TimelineLoaded { ticket, .. } | CoreEvent::ConversationLoaded { ticket, .. } => *ticket,
        }
    }
}
