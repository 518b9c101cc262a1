mod channel;
mod protocol;
mod replication;
mod role;

pub use channel::{ObserverScope, Outbox, Outgoing, RemoteChannel};
pub use protocol::{
    CallDirection, EntityUpdate, Envelope, FieldId, FieldUpdate, FieldValue, Message,
    RemoteCall, ReplicationFrame, SpawnRecord, WireError, WireHit, sequence_greater_than,
};
pub use replication::{
    FieldSpec, Replicable, ReplicationCondition, ReplicationScope, Replicator, ViewerBaseline,
    collect_fields,
};
pub use role::{AuthorityOracle, ConnectionId, NetMode, NetRole};
