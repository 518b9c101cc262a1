use rkyv::{Archive, Deserialize, Serialize, rancor};

const SEQUENCE_WRAP_THRESHOLD: u32 = u32::MAX / 2;

#[inline]
pub fn sequence_greater_than(s1: u32, s2: u32) -> bool {
    ((s1 > s2) && (s1 - s2 <= SEQUENCE_WRAP_THRESHOLD))
        || ((s1 < s2) && (s2 - s1 > SEQUENCE_WRAP_THRESHOLD))
}

fn finite(v: &[f32; 3]) -> bool {
    v.iter().all(|c| c.is_finite())
}

fn non_zero(v: &[f32; 3]) -> bool {
    v.iter().any(|c| *c != 0.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallDirection {
    ToAuthority,
    ToObservers,
}

/// Named calls that cross between nodes.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum RemoteCall {
    StartFire,
    StopFire,
    StartReload,
    StopReload,
    HandleFiring {
        sequence: u32,
    },
    FireShot {
        origin: [f32; 3],
        direction: [f32; 3],
    },
    EquipWeapon {
        weapon: u32,
    },
    DropWeapon,
    SetTargeting {
        targeting: bool,
    },
    SetRunning {
        running: bool,
        toggled: bool,
    },
    StartLunge {
        weapon: u32,
    },
    FinishLunge,
    LungeCollision,
    Interact,
    Move {
        position: [f32; 3],
        velocity: [f32; 3],
        aim: [f32; 3],
    },
    ClientStartReload,
    FireInPlace {
        weapon: u32,
        extra: bool,
    },
}

impl RemoteCall {
    pub fn name(&self) -> &'static str {
        match self {
            Self::StartFire => "start_fire",
            Self::StopFire => "stop_fire",
            Self::StartReload => "start_reload",
            Self::StopReload => "stop_reload",
            Self::HandleFiring { .. } => "handle_firing",
            Self::FireShot { .. } => "fire_shot",
            Self::EquipWeapon { .. } => "equip_weapon",
            Self::DropWeapon => "drop_weapon",
            Self::SetTargeting { .. } => "set_targeting",
            Self::SetRunning { .. } => "set_running",
            Self::StartLunge { .. } => "start_lunge",
            Self::FinishLunge => "finish_lunge",
            Self::LungeCollision => "lunge_collision",
            Self::Interact => "interact",
            Self::Move { .. } => "move",
            Self::ClientStartReload => "client_start_reload",
            Self::FireInPlace { .. } => "fire_in_place",
        }
    }

    pub fn direction(&self) -> CallDirection {
        match self {
            Self::ClientStartReload | Self::FireInPlace { .. } => CallDirection::ToObservers,
            _ => CallDirection::ToAuthority,
        }
    }

    /// Argument sanity gate run by the receiving node before execution.
    pub fn validate(&self) -> bool {
        match self {
            Self::FireShot { origin, direction } => {
                finite(origin) && finite(direction) && non_zero(direction)
            }
            Self::Move {
                position,
                velocity,
                aim,
            } => finite(position) && finite(velocity) && finite(aim) && non_zero(aim),
            _ => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct Envelope {
    pub entity: u32,
    pub call: RemoteCall,
}

impl Envelope {
    pub fn new(entity: u32, call: RemoteCall) -> Self {
        Self { entity, call }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
#[repr(u8)]
pub enum FieldId {
    Owner,
    CurrentAmmo,
    CurrentAmmoInClip,
    BurstCounter,
    PendingReload,
    Inventory,
    CurrentWeapon,
    Health,
    Targeting,
    Running,
    Lunging,
    LastHit,
    Dying,
    Position,
    Velocity,
    Aim,
    Exploded,
    Stuck,
    StuckTo,
}

#[derive(Debug, Clone, Copy, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct WireHit {
    pub actual_damage: f32,
    pub instigator: Option<u32>,
    pub damage_causer: Option<u32>,
    pub damage_type: u16,
    pub killed: bool,
    pub serial: u32,
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum FieldValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    Vector([f32; 3]),
    Entity(Option<u32>),
    Entities(Vec<u32>),
    Hit(WireHit),
}

impl FieldValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<glam::Vec3> {
        match self {
            Self::Vector(v) => Some(glam::Vec3::from_array(*v)),
            _ => None,
        }
    }

    pub fn as_entity(&self) -> Option<Option<u32>> {
        match self {
            Self::Entity(v) => Some(*v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct FieldUpdate {
    pub field: FieldId,
    pub value: FieldValue,
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct EntityUpdate {
    pub entity: u32,
    pub fields: Vec<FieldUpdate>,
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct SpawnRecord {
    pub entity: u32,
    pub kind: u8,
    pub archetype: u16,
    pub controller: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Default, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct ReplicationFrame {
    pub tick: u32,
    pub server_time: f32,
    pub spawned: Vec<SpawnRecord>,
    pub updates: Vec<EntityUpdate>,
    pub removed: Vec<u32>,
}

impl ReplicationFrame {
    pub fn new(tick: u32, server_time: f32) -> Self {
        Self {
            tick,
            server_time,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.spawned.is_empty() && self.updates.is_empty() && self.removed.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum Message {
    Call(Envelope),
    Frame(ReplicationFrame),
}

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("serialization failed: {0}")]
    Serialize(rancor::Error),
    #[error("deserialization failed: {0}")]
    Deserialize(rancor::Error),
}

impl Message {
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        rkyv::to_bytes::<rancor::Error>(self)
            .map(|aligned| aligned.into_vec())
            .map_err(WireError::Serialize)
    }

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        rkyv::from_bytes::<Self, rancor::Error>(data).map_err(WireError::Deserialize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_comparison_wraps() {
        assert!(sequence_greater_than(2, 1));
        assert!(!sequence_greater_than(1, 2));
        assert!(!sequence_greater_than(5, 5));
        assert!(sequence_greater_than(0, u32::MAX));
        assert!(!sequence_greater_than(u32::MAX, 0));
    }

    #[test]
    fn validation_rejects_degenerate_vectors() {
        let shot = RemoteCall::FireShot {
            origin: [0.0, 1.0, 0.0],
            direction: [0.0, 0.0, -1.0],
        };
        assert!(shot.validate());

        let nan = RemoteCall::FireShot {
            origin: [f32::NAN, 0.0, 0.0],
            direction: [0.0, 0.0, -1.0],
        };
        assert!(!nan.validate());

        let zero_aim = RemoteCall::Move {
            position: [0.0; 3],
            velocity: [0.0; 3],
            aim: [0.0; 3],
        };
        assert!(!zero_aim.validate());
        assert!(RemoteCall::StartFire.validate());
    }

    #[test]
    fn call_directions() {
        assert_eq!(RemoteCall::StartReload.direction(), CallDirection::ToAuthority);
        assert_eq!(
            RemoteCall::ClientStartReload.direction(),
            CallDirection::ToObservers
        );
    }

    #[test]
    fn frame_survives_the_wire() {
        let mut frame = ReplicationFrame::new(42, 1.5);
        frame.spawned.push(SpawnRecord {
            entity: 3,
            kind: 1,
            archetype: 2,
            controller: Some(1),
        });
        frame.updates.push(EntityUpdate {
            entity: 3,
            fields: vec![
                FieldUpdate {
                    field: FieldId::CurrentAmmo,
                    value: FieldValue::Int(17),
                },
                FieldUpdate {
                    field: FieldId::LastHit,
                    value: FieldValue::Hit(WireHit {
                        actual_damage: 80.0,
                        instigator: Some(9),
                        damage_causer: None,
                        damage_type: 1,
                        killed: false,
                        serial: 2,
                    }),
                },
            ],
        });
        frame.removed.push(11);

        let bytes = Message::Frame(frame.clone()).encode().unwrap();
        assert_eq!(Message::decode(&bytes).unwrap(), Message::Frame(frame));
    }

    #[test]
    fn garbage_fails_to_decode() {
        assert!(Message::decode(&[1, 2, 3]).is_err());
    }
}
