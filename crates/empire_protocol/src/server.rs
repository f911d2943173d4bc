//! Server-to-client messages: fixed-layout little-endian encode.

use bytes::BufMut;

use crate::codec::encode_frame;

/// Server message type bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ServerMessageType {
    /// Match start marker.
    GameBegin = 0,
    /// Tick-time marker preceding a delta batch.
    GameStepTime = 1,
    /// Object creation.
    AddObject = 2,
    /// Unit movement segment.
    UnitMovement = 3,
    /// HP change.
    HpUpdate = 4,
    /// Object death.
    ObjectDeath = 5,
    /// Stockpile update.
    ResourcesUpdate = 6,
    /// Construction progress.
    BuildPercentageUpdate = 7,
    /// Production queue append.
    QueueUnit = 8,
    /// Production progress/rate.
    UpdateProduction = 9,
    /// Production queue removal.
    RemoveFromProductionQueue = 10,
    /// Wire-visible unit type change.
    ChangeUnitType = 11,
    /// Carried cargo change.
    SetCarriedResources = 12,
    /// Housed flag change.
    HousedUpdate = 13,
    /// A player left (resign/drop/defeat).
    PlayerLeaveBroadcast = 14,
    /// Ping echo.
    PingResponse = 15,
}

/// Object type tag inside `AddObject`.
pub const OBJECT_TYPE_BUILDING: u8 = 0;
/// Object type tag inside `AddObject`.
pub const OBJECT_TYPE_UNIT: u8 = 1;

/// A server-to-client message.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// Match start; carries the server time base.
    GameBegin {
        /// Server time in seconds.
        server_time: f64,
    },
    /// Tick-time marker; precedes the batch of deltas for that tick.
    GameStepTime {
        /// Server time of the simulation step.
        server_time: f64,
    },
    /// A building entered the world.
    AddBuilding {
        /// Object id.
        id: u32,
        /// Owner (0xFF = gaia).
        player: u8,
        /// Rounded HP.
        hp: u32,
        /// Wire building type.
        building_type: u16,
        /// Base tile x.
        base_tile_x: u16,
        /// Base tile y.
        base_tile_y: u16,
        /// Construction progress.
        build_percentage: f32,
    },
    /// A unit entered the world.
    AddUnit {
        /// Object id.
        id: u32,
        /// Owner.
        player: u8,
        /// Rounded HP.
        hp: u32,
        /// Wire unit type.
        unit_type: u16,
        /// Map x.
        map_x: f32,
        /// Map y.
        map_y: f32,
    },
    /// A unit movement segment: start point plus velocity, for client
    /// extrapolation.
    UnitMovement {
        /// Unit id.
        unit_id: u32,
        /// Segment start x.
        start_x: f32,
        /// Segment start y.
        start_y: f32,
        /// Velocity x (tiles/second).
        speed_x: f32,
        /// Velocity y (tiles/second).
        speed_y: f32,
        /// Action byte (idle/moving/task/attack).
        action: u8,
    },
    /// Rounded HP changed.
    HpUpdate {
        /// Object id.
        object_id: u32,
        /// New rounded HP.
        new_hp: u32,
    },
    /// Object removed from the world.
    ObjectDeath {
        /// Object id.
        object_id: u32,
    },
    /// Stockpile snapshot.
    ResourcesUpdate {
        /// Wood points.
        wood: u32,
        /// Food points.
        food: u32,
        /// Gold points.
        gold: u32,
        /// Stone points.
        stone: u32,
    },
    /// Construction progress.
    BuildPercentageUpdate {
        /// Foundation id.
        building_id: u32,
        /// Progress, 0..=100.
        percentage: f32,
    },
    /// A unit type was appended to a production queue.
    QueueUnit {
        /// Building id.
        building_id: u32,
        /// Wire unit type.
        unit_type: u16,
    },
    /// Front production item progress and rate.
    UpdateProduction {
        /// Building id.
        building_id: u32,
        /// Progress, 0..=100.
        percentage: f32,
        /// Progress rate in percentage points per second.
        speed: f32,
    },
    /// A production queue item was removed.
    RemoveFromProductionQueue {
        /// Building id.
        building_id: u32,
        /// Index from the front of the queue.
        queue_index: u8,
    },
    /// Task-driven type change, externally visible.
    ChangeUnitType {
        /// Unit id.
        unit_id: u32,
        /// New wire type.
        new_type: u16,
    },
    /// Carried cargo snapshot.
    SetCarriedResources {
        /// Villager id.
        unit_id: u32,
        /// Carried resource type byte.
        resource_type: u8,
        /// Whole carried points.
        amount: u8,
    },
    /// Housed flag change.
    HousedUpdate {
        /// New housed value.
        housed: bool,
    },
    /// A player left the match.
    PlayerLeaveBroadcast {
        /// Leaving player index.
        player: u8,
        /// Reason byte (resign/drop/defeat).
        reason: u8,
    },
    /// Ping echo.
    PingResponse {
        /// Echoed number.
        number: u64,
    },
}

impl ServerMessage {
    /// Encode into a complete frame.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::new();
        let msg_type = match self {
            Self::GameBegin { server_time } => {
                body.put_f64_le(*server_time);
                ServerMessageType::GameBegin
            }
            Self::GameStepTime { server_time } => {
                body.put_f64_le(*server_time);
                ServerMessageType::GameStepTime
            }
            Self::AddBuilding {
                id,
                player,
                hp,
                building_type,
                base_tile_x,
                base_tile_y,
                build_percentage,
            } => {
                body.put_u8(OBJECT_TYPE_BUILDING);
                body.put_u32_le(*id);
                body.put_u8(*player);
                body.put_u32_le(*hp);
                body.put_u16_le(*building_type);
                body.put_u16_le(*base_tile_x);
                body.put_u16_le(*base_tile_y);
                body.put_f32_le(*build_percentage);
                ServerMessageType::AddObject
            }
            Self::AddUnit {
                id,
                player,
                hp,
                unit_type,
                map_x,
                map_y,
            } => {
                body.put_u8(OBJECT_TYPE_UNIT);
                body.put_u32_le(*id);
                body.put_u8(*player);
                body.put_u32_le(*hp);
                body.put_u16_le(*unit_type);
                body.put_f32_le(*map_x);
                body.put_f32_le(*map_y);
                ServerMessageType::AddObject
            }
            Self::UnitMovement {
                unit_id,
                start_x,
                start_y,
                speed_x,
                speed_y,
                action,
            } => {
                body.put_u32_le(*unit_id);
                body.put_f32_le(*start_x);
                body.put_f32_le(*start_y);
                body.put_f32_le(*speed_x);
                body.put_f32_le(*speed_y);
                body.put_u8(*action);
                ServerMessageType::UnitMovement
            }
            Self::HpUpdate { object_id, new_hp } => {
                body.put_u32_le(*object_id);
                body.put_u32_le(*new_hp);
                ServerMessageType::HpUpdate
            }
            Self::ObjectDeath { object_id } => {
                body.put_u32_le(*object_id);
                ServerMessageType::ObjectDeath
            }
            Self::ResourcesUpdate {
                wood,
                food,
                gold,
                stone,
            } => {
                body.put_u32_le(*wood);
                body.put_u32_le(*food);
                body.put_u32_le(*gold);
                body.put_u32_le(*stone);
                ServerMessageType::ResourcesUpdate
            }
            Self::BuildPercentageUpdate {
                building_id,
                percentage,
            } => {
                body.put_u32_le(*building_id);
                body.put_f32_le(*percentage);
                ServerMessageType::BuildPercentageUpdate
            }
            Self::QueueUnit {
                building_id,
                unit_type,
            } => {
                body.put_u32_le(*building_id);
                body.put_u16_le(*unit_type);
                ServerMessageType::QueueUnit
            }
            Self::UpdateProduction {
                building_id,
                percentage,
                speed,
            } => {
                body.put_u32_le(*building_id);
                body.put_f32_le(*percentage);
                body.put_f32_le(*speed);
                ServerMessageType::UpdateProduction
            }
            Self::RemoveFromProductionQueue {
                building_id,
                queue_index,
            } => {
                body.put_u32_le(*building_id);
                body.put_u8(*queue_index);
                ServerMessageType::RemoveFromProductionQueue
            }
            Self::ChangeUnitType { unit_id, new_type } => {
                body.put_u32_le(*unit_id);
                body.put_u16_le(*new_type);
                ServerMessageType::ChangeUnitType
            }
            Self::SetCarriedResources {
                unit_id,
                resource_type,
                amount,
            } => {
                body.put_u32_le(*unit_id);
                body.put_u8(*resource_type);
                body.put_u8(*amount);
                ServerMessageType::SetCarriedResources
            }
            Self::HousedUpdate { housed } => {
                body.put_u8(u8::from(*housed));
                ServerMessageType::HousedUpdate
            }
            Self::PlayerLeaveBroadcast { player, reason } => {
                body.put_u8(*player);
                body.put_u8(*reason);
                ServerMessageType::PlayerLeaveBroadcast
            }
            Self::PingResponse { number } => {
                body.put_u64_le(*number);
                ServerMessageType::PingResponse
            }
        };
        encode_frame(msg_type as u8, &body)
    }
}
