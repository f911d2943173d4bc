//! Client-to-server messages: decode (and encode, for the client side
//! and tests).

use bytes::BufMut;

use crate::codec::{encode_frame, BodyReader, Frame};
use crate::error::ProtocolError;

/// Client message type bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ClientMessageType {
    /// Order units to a map coordinate.
    MoveToMapCoord = 0,
    /// Order units onto an object.
    SetTarget = 1,
    /// Enqueue unit production.
    ProduceUnit = 2,
    /// Place a building foundation.
    PlaceBuildingFoundation = 3,
    /// Remove a production queue item (indexed from the back).
    DequeueProductionQueueItem = 4,
    /// Delete an own object.
    DeleteObject = 5,
    /// Keep-alive.
    Ping = 6,
    /// Loading finished; ready to start.
    FinishedLoading = 7,
}

/// A decoded client-to-server message.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// Order units to a map coordinate.
    MoveToMapCoord {
        /// Goal x in map coordinates.
        target_x: f32,
        /// Goal y in map coordinates.
        target_y: f32,
        /// Commanded unit ids.
        unit_ids: Vec<u32>,
    },
    /// Order units onto an object.
    SetTarget {
        /// Target object id.
        target_id: u32,
        /// Commanded unit ids.
        unit_ids: Vec<u32>,
    },
    /// Enqueue unit production.
    ProduceUnit {
        /// Producing building id.
        building_id: u32,
        /// Requested wire unit type.
        unit_type: u16,
    },
    /// Place a building foundation and send villagers to it.
    PlaceBuildingFoundation {
        /// Wire building type.
        building_type: u16,
        /// Base tile x.
        base_tile_x: u16,
        /// Base tile y.
        base_tile_y: u16,
        /// Villagers ordered to construct.
        villager_ids: Vec<u32>,
    },
    /// Remove a production queue item, indexed from the back so an
    /// in-flight completion cannot shift the index meaning.
    DequeueProductionQueueItem {
        /// Producing building id.
        building_id: u32,
        /// Index counted from the back of the queue.
        index_from_back: u8,
    },
    /// Delete an own object.
    DeleteObject {
        /// Object id.
        object_id: u32,
    },
    /// Keep-alive with an echo number.
    Ping {
        /// Echoed in the response.
        number: u64,
    },
    /// Loading finished.
    FinishedLoading,
}

fn read_id_list(reader: &mut BodyReader<'_>) -> Result<Vec<u32>, ProtocolError> {
    let count = reader.read_u16()? as usize;
    let mut ids = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        ids.push(reader.read_u32()?);
    }
    Ok(ids)
}

impl ClientMessage {
    /// Decode a received frame.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::UnknownMessageType`] for unassigned
    /// type bytes and [`ProtocolError::Truncated`] /
    /// [`ProtocolError::TrailingBytes`] for malformed bodies. The
    /// caller logs and discards such frames; the connection stays up.
    pub fn decode(frame: &Frame) -> Result<Self, ProtocolError> {
        let mut reader = BodyReader::new(&frame.body);
        let message = match frame.msg_type {
            0 => Self::MoveToMapCoord {
                target_x: reader.read_f32()?,
                target_y: reader.read_f32()?,
                unit_ids: read_id_list(&mut reader)?,
            },
            1 => Self::SetTarget {
                target_id: reader.read_u32()?,
                unit_ids: read_id_list(&mut reader)?,
            },
            2 => Self::ProduceUnit {
                building_id: reader.read_u32()?,
                unit_type: reader.read_u16()?,
            },
            3 => Self::PlaceBuildingFoundation {
                building_type: reader.read_u16()?,
                base_tile_x: reader.read_u16()?,
                base_tile_y: reader.read_u16()?,
                villager_ids: read_id_list(&mut reader)?,
            },
            4 => Self::DequeueProductionQueueItem {
                building_id: reader.read_u32()?,
                index_from_back: reader.read_u8()?,
            },
            5 => Self::DeleteObject {
                object_id: reader.read_u32()?,
            },
            6 => Self::Ping {
                number: reader.read_u64()?,
            },
            7 => Self::FinishedLoading,
            other => return Err(ProtocolError::UnknownMessageType(other)),
        };
        reader.finish()?;
        Ok(message)
    }

    /// Encode into a complete frame.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::new();
        let msg_type = match self {
            Self::MoveToMapCoord {
                target_x,
                target_y,
                unit_ids,
            } => {
                body.put_f32_le(*target_x);
                body.put_f32_le(*target_y);
                body.put_u16_le(unit_ids.len() as u16);
                for id in unit_ids {
                    body.put_u32_le(*id);
                }
                ClientMessageType::MoveToMapCoord
            }
            Self::SetTarget {
                target_id,
                unit_ids,
            } => {
                body.put_u32_le(*target_id);
                body.put_u16_le(unit_ids.len() as u16);
                for id in unit_ids {
                    body.put_u32_le(*id);
                }
                ClientMessageType::SetTarget
            }
            Self::ProduceUnit {
                building_id,
                unit_type,
            } => {
                body.put_u32_le(*building_id);
                body.put_u16_le(*unit_type);
                ClientMessageType::ProduceUnit
            }
            Self::PlaceBuildingFoundation {
                building_type,
                base_tile_x,
                base_tile_y,
                villager_ids,
            } => {
                body.put_u16_le(*building_type);
                body.put_u16_le(*base_tile_x);
                body.put_u16_le(*base_tile_y);
                body.put_u16_le(villager_ids.len() as u16);
                for id in villager_ids {
                    body.put_u32_le(*id);
                }
                ClientMessageType::PlaceBuildingFoundation
            }
            Self::DequeueProductionQueueItem {
                building_id,
                index_from_back,
            } => {
                body.put_u32_le(*building_id);
                body.put_u8(*index_from_back);
                ClientMessageType::DequeueProductionQueueItem
            }
            Self::DeleteObject { object_id } => {
                body.put_u32_le(*object_id);
                ClientMessageType::DeleteObject
            }
            Self::Ping { number } => {
                body.put_u64_le(*number);
                ClientMessageType::Ping
            }
            Self::FinishedLoading => ClientMessageType::FinishedLoading,
        };
        encode_frame(msg_type as u8, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::RecvBuffer;

    fn roundtrip(message: &ClientMessage) -> ClientMessage {
        let bytes = message.encode();
        let mut buffer = RecvBuffer::new();
        buffer.extend_from_slice(&bytes);
        let frame = buffer.next_frame().unwrap().unwrap();
        ClientMessage::decode(&frame).unwrap()
    }

    #[test]
    fn test_move_to_map_coord_roundtrip() {
        let message = ClientMessage::MoveToMapCoord {
            target_x: 12.5,
            target_y: 3.25,
            unit_ids: vec![4, 5, 6],
        };
        assert_eq!(roundtrip(&message), message);
    }

    #[test]
    fn test_place_foundation_roundtrip() {
        let message = ClientMessage::PlaceBuildingFoundation {
            building_type: 1,
            base_tile_x: 10,
            base_tile_y: 20,
            villager_ids: vec![7],
        };
        assert_eq!(roundtrip(&message), message);
    }

    #[test]
    fn test_move_to_wire_layout() {
        let bytes = ClientMessage::MoveToMapCoord {
            target_x: 1.0,
            target_y: 2.0,
            unit_ids: vec![9],
        }
        .encode();

        // type 0, length 3 + 4 + 4 + 2 + 4 = 17
        assert_eq!(bytes[0], 0);
        assert_eq!(u16::from_le_bytes([bytes[1], bytes[2]]), 17);
        assert_eq!(f32::from_le_bytes(bytes[3..7].try_into().unwrap()), 1.0);
        assert_eq!(f32::from_le_bytes(bytes[7..11].try_into().unwrap()), 2.0);
        assert_eq!(u16::from_le_bytes([bytes[11], bytes[12]]), 1);
        assert_eq!(u32::from_le_bytes(bytes[13..17].try_into().unwrap()), 9);
    }

    #[test]
    fn test_short_body_is_rejected() {
        // SetTarget declaring one unit id but carrying none
        let mut body = Vec::new();
        body.put_u32_le(44);
        body.put_u16_le(1);
        let frame_bytes = encode_frame(1, &body);

        let mut buffer = RecvBuffer::new();
        buffer.extend_from_slice(&frame_bytes);
        let frame = buffer.next_frame().unwrap().unwrap();
        assert!(matches!(
            ClientMessage::decode(&frame),
            Err(ProtocolError::Truncated { .. })
        ));
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let frame_bytes = encode_frame(200, &[]);
        let mut buffer = RecvBuffer::new();
        buffer.extend_from_slice(&frame_bytes);
        let frame = buffer.next_frame().unwrap().unwrap();
        assert_eq!(
            ClientMessage::decode(&frame),
            Err(ProtocolError::UnknownMessageType(200))
        );
    }

    #[test]
    fn test_trailing_bytes_are_rejected() {
        let mut body = Vec::new();
        body.put_u32_le(1);
        body.put_u8(0);
        body.put_u8(99);
        let frame_bytes = encode_frame(4, &body);

        let mut buffer = RecvBuffer::new();
        buffer.extend_from_slice(&frame_bytes);
        let frame = buffer.next_frame().unwrap().unwrap();
        assert_eq!(
            ClientMessage::decode(&frame),
            Err(ProtocolError::TrailingBytes(1))
        );
    }
}
