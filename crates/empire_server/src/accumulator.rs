//! Per-player outgoing message batches.
//!
//! Deltas produced during a tick accumulate per player and are flushed
//! once per tick as a single write, prefixed by one `GameStepTime`
//! marker, which coalesces transport overhead to one packet per player
//! per tick.

use empire_protocol::ServerMessage;

/// Accumulates encoded frames per player between flushes.
#[derive(Debug)]
pub struct MessageAccumulator {
    batches: Vec<Vec<u8>>,
}

impl MessageAccumulator {
    /// Create an accumulator for `player_count` players.
    #[must_use]
    pub fn new(player_count: u8) -> Self {
        Self {
            batches: (0..player_count).map(|_| Vec::new()).collect(),
        }
    }

    /// Append a frame to one player's batch.
    pub fn push(&mut self, player: u8, frame: &[u8]) {
        if let Some(batch) = self.batches.get_mut(player as usize) {
            batch.extend_from_slice(frame);
        }
    }

    /// Append a frame to every player's batch.
    pub fn broadcast(&mut self, frame: &[u8]) {
        for batch in &mut self.batches {
            batch.extend_from_slice(frame);
        }
    }

    /// Whether any batch has pending bytes.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.batches.iter().any(|b| !b.is_empty())
    }

    /// Take all non-empty batches, each prefixed with a single
    /// tick-time marker for `server_time`.
    pub fn flush(&mut self, server_time: f64) -> Vec<(u8, Vec<u8>)> {
        if !self.has_pending() {
            return Vec::new();
        }
        let marker = ServerMessage::GameStepTime { server_time }.encode();

        let mut out = Vec::new();
        for (player, batch) in self.batches.iter_mut().enumerate() {
            if batch.is_empty() {
                continue;
            }
            let mut bytes = Vec::with_capacity(marker.len() + batch.len());
            bytes.extend_from_slice(&marker);
            bytes.append(batch);
            out.push((player as u8, bytes));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use empire_protocol::ServerMessageType;

    #[test]
    fn test_flush_prefixes_single_time_marker() {
        let mut acc = MessageAccumulator::new(2);
        let death = ServerMessage::ObjectDeath { object_id: 9 }.encode();
        acc.push(0, &death);
        acc.push(0, &death);

        let flushed = acc.flush(2.5);
        assert_eq!(flushed.len(), 1);
        let (player, bytes) = &flushed[0];
        assert_eq!(*player, 0);

        // Exactly one GameStepTime marker at the front.
        assert_eq!(bytes[0], ServerMessageType::GameStepTime as u8);
        let marker_len = u16::from_le_bytes([bytes[1], bytes[2]]) as usize;
        assert_eq!(bytes[marker_len], ServerMessageType::ObjectDeath as u8);
        assert_eq!(bytes.len(), marker_len + 2 * death.len());
    }

    #[test]
    fn test_flush_skips_idle_players() {
        let mut acc = MessageAccumulator::new(3);
        let frame = ServerMessage::ObjectDeath { object_id: 1 }.encode();
        acc.push(2, &frame);

        let flushed = acc.flush(0.1);
        assert_eq!(flushed.len(), 1);
        assert_eq!(flushed[0].0, 2);

        // Batches are empty after a flush.
        assert!(!acc.has_pending());
        assert!(acc.flush(0.2).is_empty());
    }

    #[test]
    fn test_broadcast_reaches_all_players() {
        let mut acc = MessageAccumulator::new(2);
        let frame = ServerMessage::ObjectDeath { object_id: 5 }.encode();
        acc.broadcast(&frame);

        let flushed = acc.flush(1.0);
        assert_eq!(flushed.len(), 2);
    }
}
