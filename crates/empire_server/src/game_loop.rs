//! The fixed-timestep match loop.
//!
//! Simulation steps run at wall-clock-derived intervals, decoupled
//! from message arrival: however many (or few) client messages came in
//! since the last step, steps fire on schedule, and after a stall the
//! loop catches up by running several steps back to back. Between
//! steps the loop drains inbound messages, applies them as commands,
//! and flushes each player's accumulated deltas as one write prefixed
//! by a single tick-time marker.

use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use empire_core::prelude::*;
use empire_protocol::{ClientMessage, ServerMessage};

use crate::accumulator::MessageAccumulator;
use crate::network::{Connection, NetEvent};
use crate::ServerConfig;

/// Upper bound on catch-up steps per loop iteration; beyond this the
/// backlog is dropped rather than spiraling.
const MAX_CATCH_UP_STEPS: u32 = 10;

/// One running match: simulation, connections and batching.
pub struct MatchLoop {
    game: Game,
    config: ServerConfig,
    connections: Vec<Connection>,
    connected: Vec<bool>,
    last_activity: Vec<Instant>,
    accumulator: MessageAccumulator,
    events_rx: mpsc::UnboundedReceiver<NetEvent>,
}

impl MatchLoop {
    /// Wire up a match loop over an already-populated game.
    #[must_use]
    pub fn new(
        game: Game,
        config: ServerConfig,
        connections: Vec<Connection>,
        events_rx: mpsc::UnboundedReceiver<NetEvent>,
    ) -> Self {
        let player_count = config.player_count;
        let now = Instant::now();
        Self {
            game,
            config,
            connections,
            connected: vec![true; player_count as usize],
            last_activity: vec![now; player_count as usize],
            accumulator: MessageAccumulator::new(player_count),
            events_rx,
        }
    }

    /// Block until every connected player reported loading completion.
    ///
    /// Players that disconnect while loading are marked dropped; the
    /// match still starts if at least one player remains.
    pub async fn wait_for_loading(&mut self) {
        loop {
            let all_loaded = (0..self.config.player_count).all(|p| {
                !self.connected[p as usize]
                    || self
                        .game
                        .player(p)
                        .is_some_and(|player| player.finished_loading)
            });
            if all_loaded {
                return;
            }
            match self.events_rx.recv().await {
                Some(event) => self.handle_event(event),
                None => return,
            }
        }
    }

    /// Run the match to completion.
    pub async fn run(mut self) {
        self.send_initial_state();
        tracing::info!(players = self.config.player_count, "match started");

        let step = Duration::from_secs_f64(TICK_DURATION);
        let mut next_step = Instant::now();

        loop {
            // Pump all inbound messages that have already arrived.
            while let Ok(event) = self.events_rx.try_recv() {
                self.handle_event(event);
            }
            self.check_ping_timeouts();

            // Run due simulation steps, catching up after stalls.
            let now = Instant::now();
            let mut ran_step = false;
            let mut catch_up = 0;
            while now >= next_step {
                self.game.simulate(TICK_DURATION);
                next_step += step;
                ran_step = true;
                catch_up += 1;
                if catch_up >= MAX_CATCH_UP_STEPS {
                    next_step = Instant::now() + step;
                    break;
                }
            }

            if ran_step {
                self.route_events();
                self.flush_batches();
            }

            if self.game.playing_player_count() <= 1 && self.config.player_count > 1 {
                tracing::info!("too few players left; match over");
                break;
            }

            // Sleep until the next due step, but wake for inbound
            // messages so they are never starved.
            tokio::select! {
                () = tokio::time::sleep_until(tokio::time::Instant::from_std(next_step)) => {}
                event = self.events_rx.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break,
                },
            }
        }
    }

    /// Send each player the match-start snapshot: `GameBegin`, every
    /// live object, and their own stockpile.
    fn send_initial_state(&mut self) {
        // World creation already queued per-object deltas; the snapshot
        // below covers them, so they must not be re-sent.
        let _ = self.game.take_events();

        let mut snapshot = ServerMessage::GameBegin {
            server_time: self.game.game_time(),
        }
        .encode();

        for id in self.game.objects().sorted_ids() {
            let Some(object) = self.game.objects().get(id) else {
                continue;
            };
            snapshot.extend_from_slice(&encode_object_snapshot(object));
        }

        for player in 0..self.config.player_count {
            if !self.connected[player as usize] {
                continue;
            }
            let mut bytes = snapshot.clone();
            if let Some(state) = self.game.player(player) {
                bytes.extend_from_slice(
                    &ServerMessage::ResourcesUpdate {
                        wood: state.resources.wood,
                        food: state.resources.food,
                        gold: state.resources.gold,
                        stone: state.resources.stone,
                    }
                    .encode(),
                );
            }
            self.send_to(player, bytes);
        }
    }

    fn handle_event(&mut self, event: NetEvent) {
        match event {
            NetEvent::Message(player, message) => {
                if let Some(slot) = self.last_activity.get_mut(player as usize) {
                    *slot = Instant::now();
                }
                self.handle_message(player, message);
            }
            NetEvent::Disconnected(player) => self.drop_player(player),
        }
    }

    fn handle_message(&mut self, player: u8, message: ClientMessage) {
        let command = match message {
            ClientMessage::Ping { number } => {
                self.accumulator
                    .push(player, &ServerMessage::PingResponse { number }.encode());
                return;
            }
            ClientMessage::FinishedLoading => {
                if let Some(state) = self.game.player_mut(player) {
                    state.finished_loading = true;
                }
                return;
            }
            ClientMessage::MoveToMapCoord {
                target_x,
                target_y,
                unit_ids,
            } => PlayerCommand::MoveToMapCoord {
                target: Vec2::new(target_x, target_y),
                units: unit_ids,
            },
            ClientMessage::SetTarget {
                target_id,
                unit_ids,
            } => PlayerCommand::SetTarget {
                target: target_id,
                units: unit_ids,
            },
            ClientMessage::ProduceUnit {
                building_id,
                unit_type,
            } => PlayerCommand::ProduceUnit {
                building: building_id,
                unit_type,
            },
            ClientMessage::PlaceBuildingFoundation {
                building_type,
                base_tile_x,
                base_tile_y,
                villager_ids,
            } => {
                let Some(building_type) = BuildingType::from_u16(building_type) else {
                    tracing::warn!(player, building_type, "unknown building type; discarded");
                    return;
                };
                PlayerCommand::PlaceBuildingFoundation {
                    building_type,
                    base_tile: (u32::from(base_tile_x), u32::from(base_tile_y)),
                    villagers: villager_ids,
                }
            }
            ClientMessage::DequeueProductionQueueItem {
                building_id,
                index_from_back,
            } => PlayerCommand::DequeueProductionQueueItem {
                building: building_id,
                index_from_back,
            },
            ClientMessage::DeleteObject { object_id } => {
                PlayerCommand::DeleteObject { object: object_id }
            }
        };

        if let Err(error) = self.game.apply_command(player, command) {
            tracing::warn!(player, %error, "command rejected");
        }
    }

    /// Drop silent connections after the configured deadline. This is
    /// the only timeout-driven state transition in the match.
    fn check_ping_timeouts(&mut self) {
        for player in 0..self.config.player_count {
            if self.connected[player as usize]
                && self.last_activity[player as usize].elapsed() > self.config.ping_timeout
            {
                tracing::warn!(player, "ping timeout");
                self.drop_player(player);
            }
        }
    }

    /// Mark a player dropped. Their objects stay in the world.
    fn drop_player(&mut self, player: u8) {
        let Some(slot) = self.connected.get_mut(player as usize) else {
            return;
        };
        if !*slot {
            return;
        }
        *slot = false;
        if let Some(state) = self.game.player_mut(player) {
            state.is_connected = false;
        }
        self.game.mark_player_left(player, LeaveReason::Drop);
    }

    /// Encode this tick's deltas into the per-player batches.
    fn route_events(&mut self) {
        for event in self.game.take_events() {
            let frame = encode_event(&event);
            match event.recipient() {
                Recipient::All => self.accumulator.broadcast(&frame),
                Recipient::Player(player) => self.accumulator.push(player, &frame),
            }
        }
    }

    /// Flush each player's batch as one coalesced write.
    fn flush_batches(&mut self) {
        for (player, bytes) in self.accumulator.flush(self.game.game_time()) {
            self.send_to(player, bytes);
        }
    }

    fn send_to(&mut self, player: u8, bytes: Vec<u8>) {
        if !self.connected[player as usize] {
            return;
        }
        if let Some(connection) = self.connections.get(player as usize) {
            if !connection.send(bytes) {
                self.drop_player(player);
            }
        }
    }
}

/// Encode a live object as an `AddObject` frame (initial snapshot).
fn encode_object_snapshot(object: &GameObject) -> Vec<u8> {
    match &object.kind {
        ObjectKind::Unit(unit) => ServerMessage::AddUnit {
            id: object.id,
            player: object.player,
            hp: object.displayed_hp(),
            unit_type: unit.unit_type() as u16,
            map_x: unit.position.x,
            map_y: unit.position.y,
        }
        .encode(),
        ObjectKind::Building(building) => ServerMessage::AddBuilding {
            id: object.id,
            player: object.player,
            hp: object.displayed_hp(),
            building_type: building.building_type as u16,
            base_tile_x: building.base_tile.0 as u16,
            base_tile_y: building.base_tile.1 as u16,
            build_percentage: building.build_percentage,
        }
        .encode(),
    }
}

/// Map a simulation delta to its wire frame.
fn encode_event(event: &GameEvent) -> Vec<u8> {
    match event {
        GameEvent::ObjectAdded {
            id,
            player,
            hp,
            payload,
        } => match payload {
            AddObjectPayload::Unit {
                unit_type,
                position,
            } => ServerMessage::AddUnit {
                id: *id,
                player: *player,
                hp: *hp,
                unit_type: *unit_type as u16,
                map_x: position.x,
                map_y: position.y,
            }
            .encode(),
            AddObjectPayload::Building {
                building_type,
                base_tile,
                build_percentage,
            } => ServerMessage::AddBuilding {
                id: *id,
                player: *player,
                hp: *hp,
                building_type: *building_type,
                base_tile_x: base_tile.0 as u16,
                base_tile_y: base_tile.1 as u16,
                build_percentage: *build_percentage,
            }
            .encode(),
        },
        GameEvent::UnitMovement {
            id,
            start,
            speed,
            action,
        } => ServerMessage::UnitMovement {
            unit_id: *id,
            start_x: start.x,
            start_y: start.y,
            speed_x: speed.x,
            speed_y: speed.y,
            action: *action as u8,
        }
        .encode(),
        GameEvent::HpUpdate { id, hp } => ServerMessage::HpUpdate {
            object_id: *id,
            new_hp: *hp,
        }
        .encode(),
        GameEvent::ObjectDeath { id } => ServerMessage::ObjectDeath { object_id: *id }.encode(),
        GameEvent::BuildPercentageUpdate { id, percentage } => {
            ServerMessage::BuildPercentageUpdate {
                building_id: *id,
                percentage: *percentage,
            }
            .encode()
        }
        GameEvent::ChangeUnitType { id, new_type } => ServerMessage::ChangeUnitType {
            unit_id: *id,
            new_type: *new_type as u16,
        }
        .encode(),
        GameEvent::CarriedResourcesChanged {
            id,
            resource,
            amount,
        } => ServerMessage::SetCarriedResources {
            unit_id: *id,
            resource_type: *resource as u8,
            amount: *amount as u8,
        }
        .encode(),
        GameEvent::ResourcesUpdate { resources, .. } => ServerMessage::ResourcesUpdate {
            wood: resources.wood,
            food: resources.food,
            gold: resources.gold,
            stone: resources.stone,
        }
        .encode(),
        GameEvent::HousedUpdate { housed, .. } => {
            ServerMessage::HousedUpdate { housed: *housed }.encode()
        }
        GameEvent::QueueUnit {
            building,
            unit_type,
        } => ServerMessage::QueueUnit {
            building_id: *building,
            unit_type: *unit_type as u16,
        }
        .encode(),
        GameEvent::UpdateProduction {
            building,
            percentage,
            speed,
        } => ServerMessage::UpdateProduction {
            building_id: *building,
            percentage: *percentage,
            speed: *speed,
        }
        .encode(),
        GameEvent::RemoveFromProductionQueue { building, index } => {
            ServerMessage::RemoveFromProductionQueue {
                building_id: *building,
                queue_index: *index,
            }
            .encode()
        }
        GameEvent::PlayerLeft { player, reason } => ServerMessage::PlayerLeaveBroadcast {
            player: *player,
            reason: *reason as u8,
        }
        .encode(),
    }
}
