use std::collections::VecDeque;

use super::protocol::{Envelope, RemoteCall};
use crate::world::EntityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObserverScope {
    All,
    OwnerOnly,
    SkipOwner,
}

pub trait RemoteChannel {
    fn invoke_on_authority(&mut self, entity: EntityId, call: RemoteCall);

    fn invoke_on_observers(&mut self, entity: EntityId, call: RemoteCall, scope: ObserverScope);
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outgoing {
    ToAuthority(Envelope),
    ToObservers {
        envelope: Envelope,
        scope: ObserverScope,
    },
}

impl Outgoing {
    pub fn envelope(&self) -> &Envelope {
        match self {
            Self::ToAuthority(envelope) => envelope,
            Self::ToObservers { envelope, .. } => envelope,
        }
    }
}

/// Calls queued by one node, in issue order, waiting for the host transport.
#[derive(Debug, Default)]
pub struct Outbox {
    queue: VecDeque<Outgoing>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Outgoing> {
        self.queue.iter()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = Outgoing> + '_ {
        self.queue.drain(..)
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

impl RemoteChannel for Outbox {
    fn invoke_on_authority(&mut self, entity: EntityId, call: RemoteCall) {
        log::trace!("-> authority {} {}", entity, call.name());
        self.queue
            .push_back(Outgoing::ToAuthority(Envelope::new(entity, call)));
    }

    fn invoke_on_observers(&mut self, entity: EntityId, call: RemoteCall, scope: ObserverScope) {
        log::trace!("-> observers {} {} {:?}", entity, call.name(), scope);
        self.queue.push_back(Outgoing::ToObservers {
            envelope: Envelope::new(entity, call),
            scope,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_issue_order() {
        let mut outbox = Outbox::new();
        outbox.invoke_on_authority(1, RemoteCall::StartFire);
        outbox.invoke_on_authority(1, RemoteCall::HandleFiring { sequence: 1 });
        outbox.invoke_on_observers(2, RemoteCall::ClientStartReload, ObserverScope::OwnerOnly);

        let names: Vec<_> = outbox.drain().map(|o| o.envelope().call.name()).collect();
        assert_eq!(names, vec!["start_fire", "handle_firing", "client_start_reload"]);
        assert!(outbox.is_empty());
    }
}
