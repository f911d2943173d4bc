//! The per-unit action state machine.
//!
//! Evaluated once per simulation step per unit, in sorted-id order,
//! with this priority: an in-progress attack swing is never
//! interrupted; then goals are resolved and paths (re)planned; then
//! movement integrates `speed * dt` with collision and evasion; and on
//! contact with the target object the relevant interaction runs
//! instead of further movement (construct / gather / drop-off / melee).

use std::collections::VecDeque;

use crate::buildings::BuildingType;
use crate::collision::{try_evade_unit, CollisionHit};
use crate::data::ATTACK_ANIMATION_FPS;
use crate::events::GameEvent;
use crate::game::{Game, BLOCKED_IDLE_GRACE, CONTACT_DISTANCE, TARGET_REPLAN_DISTANCE};
use crate::math::Vec2;
use crate::objects::{ObjectId, ObjectKind, GAIA_PLAYER_INDEX};
use crate::pathfinding::{plan_path, PathGoal};
use crate::units::{Unit, UnitAction, UnitClass, VillagerTask};

/// Two movement directions closer than this (dot product of unit
/// vectors) count as the same segment; no new movement delta is sent.
const DIRECTION_EPSILON: f32 = 0.999;

/// What the unit is currently trying to reach.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Goal {
    None,
    Point(Vec2),
    Object(ObjectId),
}

/// How an interaction attempt resolved.
enum Interaction {
    /// Not in contact yet; keep approaching.
    NotInContact,
    /// Interaction ran this step.
    Done,
}

impl Game {
    /// Advance one unit by one step.
    pub(crate) fn update_unit(&mut self, id: ObjectId, dt: f64) {
        let Some(object) = self.objects.get(id) else {
            return;
        };
        if self.objects.is_delete_pending(id) {
            return;
        }
        let player = object.player;
        let Some(unit) = object.as_unit() else {
            return;
        };
        let mut unit = unit.clone();

        self.step_unit(id, player, &mut unit, dt);

        if let Some(object) = self.objects.get_mut(id) {
            if let Some(slot) = object.as_unit_mut() {
                *slot = unit;
            }
        }
    }

    fn step_unit(&mut self, id: ObjectId, player: u8, unit: &mut Unit, dt: f64) {
        // 1. A running attack swing completes before anything else.
        if unit.action == UnitAction::Attack {
            if self.continue_attack_cycle(id, unit) {
                return;
            }
        }

        // 2. Resolve the current goal; stale targets are dropped.
        let goal = self.resolve_goal(id, unit);

        match goal {
            Goal::None => {
                if unit.action != UnitAction::Idle {
                    self.stop_unit(id, unit);
                }
            }
            Goal::Object(target_id) => {
                // 3. Contact dispatch takes priority over movement.
                match self.try_interact(id, player, unit, target_id, dt) {
                    Interaction::Done => {}
                    Interaction::NotInContact => {
                        self.approach(id, unit, &goal, dt);
                    }
                }
            }
            Goal::Point(_) => {
                self.approach(id, unit, &goal, dt);
            }
        }
    }

    /// Current goal of a unit: targeted object if it is still alive,
    /// else the bare move-to coordinate, else nothing.
    fn resolve_goal(&mut self, id: ObjectId, unit: &mut Unit) -> Goal {
        if let Some(target_id) = unit.target {
            if self.live_object(target_id).is_some() {
                return Goal::Object(target_id);
            }
            tracing::warn!(unit = id, target = target_id, "target no longer exists");
            unit.target = None;
            unit.path = None;
        }
        if let Some(point) = unit.move_to {
            return Goal::Point(point);
        }
        Goal::None
    }

    // ------------------------------------------------------------------
    // Movement
    // ------------------------------------------------------------------

    /// Plan if needed, then integrate movement toward the goal.
    fn approach(&mut self, id: ObjectId, unit: &mut Unit, goal: &Goal, dt: f64) {
        if unit.path.is_some() {
            self.check_replan(unit, goal);
        }

        if unit.path.is_none() {
            let Some(path) = self.plan_for_goal(unit, goal) else {
                // No movement possible at all.
                self.stop_unit(id, unit);
                Self::clear_goal(unit, goal);
                return;
            };
            unit.path = Some(path);
        }

        self.integrate_movement(id, unit, goal, dt);
    }

    /// Recompute the path when a targeted unit drifted away from the
    /// planned path's end.
    fn check_replan(&self, unit: &mut Unit, goal: &Goal) {
        let Goal::Object(target_id) = *goal else {
            return;
        };
        let Some(target_pos) = self
            .live_object(target_id)
            .and_then(|o| o.as_unit())
            .map(|u| u.position)
        else {
            return;
        };
        let Some(end) = unit.path.as_ref().and_then(|p| p.back().copied()) else {
            return;
        };
        if end.distance(target_pos) > TARGET_REPLAN_DISTANCE {
            unit.path = None;
        }
    }

    fn plan_for_goal(&self, unit: &Unit, goal: &Goal) -> Option<VecDeque<Vec2>> {
        let radius = self.data.unit(unit.class).radius;
        let path_goal = match *goal {
            Goal::Point(p) => PathGoal::Point(p),
            Goal::Object(target_id) => {
                let target = self.live_object(target_id)?;
                match &target.kind {
                    ObjectKind::Building(building) => PathGoal::Footprint {
                        base: building.base_tile,
                        size: self.data.building(building.building_type).size,
                    },
                    ObjectKind::Unit(other) => PathGoal::Point(other.position),
                }
            }
            Goal::None => return None,
        };
        plan_path(&self.map, unit.position, &path_goal, radius).map(VecDeque::from)
    }

    /// Move `speed * dt` along the cached path, with collision checks
    /// and the single-obstacle evade maneuver.
    fn integrate_movement(&mut self, id: ObjectId, unit: &mut Unit, goal: &Goal, dt: f64) {
        let stats = self.data.unit(unit.class);
        let speed = stats.speed;
        let radius = stats.radius;
        let move_distance = speed * dt as f32;

        let Some(path) = unit.path.as_mut() else {
            return;
        };
        let Some(&waypoint) = path.front() else {
            unit.path = None;
            self.arrive(id, unit, goal);
            return;
        };

        let to_waypoint = waypoint - unit.position;
        let remaining = to_waypoint.length();
        let direction = to_waypoint.normalized();
        let candidate = if remaining <= move_distance {
            waypoint
        } else {
            unit.position + direction * move_distance
        };

        // A unit that was standing still this step still has its own
        // tile marked in the occupancy refresh; release the mark so it
        // does not collide with itself on the first step out.
        if unit.action != UnitAction::Moving {
            let (tile_x, tile_y) = unit.position.tile();
            self.map.set_occupied_for_units(tile_x, tile_y, false);
        }

        match self.collision_at(id, radius, candidate) {
            None => {
                self.accept_move(id, unit, direction, speed, candidate);
                if let Some(path) = unit.path.as_mut() {
                    if candidate == waypoint {
                        path.pop_front();
                        if path.is_empty() {
                            unit.path = None;
                            self.arrive(id, unit, goal);
                        }
                    }
                }
            }
            Some(CollisionHit::Unit(obstacle_id)) => {
                let obstacle = self
                    .objects
                    .get(obstacle_id)
                    .and_then(|o| o.as_unit())
                    .map(|u| (u.position, self.data.unit(u.class).radius));
                let evaded = obstacle.and_then(|(obstacle_pos, obstacle_radius)| {
                    let evade_point = try_evade_unit(
                        unit.position,
                        candidate,
                        move_distance,
                        obstacle_pos,
                        radius + obstacle_radius,
                    )?;
                    self.collision_at(id, radius, evade_point)
                        .is_none()
                        .then_some(evade_point)
                });

                match evaded {
                    Some(evade_point) => {
                        let evade_dir = (evade_point - unit.position).normalized();
                        self.accept_move(id, unit, evade_dir, speed, evade_point);
                    }
                    None => self.handle_blocked(id, unit),
                }
            }
            Some(CollisionHit::Tile(..)) | Some(CollisionHit::OutOfBounds) => {
                // Terrain ahead: the cached path is stale (a footprint
                // may have been committed across it). Replan next step;
                // the grace timer still bounds units that stay stuck.
                unit.path = None;
                self.handle_blocked(id, unit);
            }
        }
    }

    /// Commit an accepted movement step and emit a segment delta when
    /// the direction or action changed.
    fn accept_move(&mut self, id: ObjectId, unit: &mut Unit, direction: Vec2, speed: f32, new_pos: Vec2) {
        let segment_changed = unit.action != UnitAction::Moving
            || unit.movement_direction.dot(direction) < DIRECTION_EPSILON;

        let start = unit.position;
        unit.position = new_pos;
        unit.movement_direction = direction;
        unit.action = UnitAction::Moving;
        unit.blocked_since = None;

        if segment_changed {
            self.emit_movement(id, start, direction * speed, UnitAction::Moving);
        }
    }

    /// Fully blocked: keep the move animation for a short grace delay,
    /// then formally revert to idle and drop the goal.
    fn handle_blocked(&mut self, id: ObjectId, unit: &mut Unit) {
        match unit.blocked_since {
            None => {
                unit.blocked_since = Some(self.game_time);
                // Stand still but keep displaying the move action.
                let needs_emit = unit.action != UnitAction::Moving
                    || unit.movement_direction != Vec2::ZERO;
                unit.action = UnitAction::Moving;
                unit.movement_direction = Vec2::ZERO;
                if needs_emit {
                    self.emit_movement(id, unit.position, Vec2::ZERO, UnitAction::Moving);
                }
            }
            Some(since) if self.game_time - since >= BLOCKED_IDLE_GRACE => {
                unit.target = None;
                unit.move_to = None;
                self.stop_unit(id, unit);
            }
            Some(_) => {}
        }
    }

    /// The path ran out; either we are at the goal point or at the
    /// closest reachable approach.
    fn arrive(&mut self, id: ObjectId, unit: &mut Unit, goal: &Goal) {
        match *goal {
            Goal::Point(_) => {
                unit.move_to = None;
                self.stop_unit(id, unit);
            }
            Goal::Object(target_id) => {
                // Contact dispatch runs next step if we actually got
                // there; otherwise the closest approach is final.
                if self.contact_distance(unit, target_id).is_none() {
                    unit.target = None;
                    self.stop_unit(id, unit);
                }
            }
            Goal::None => {
                self.stop_unit(id, unit);
            }
        }
    }

    /// Stop in place and emit the idle segment.
    fn stop_unit(&mut self, id: ObjectId, unit: &mut Unit) {
        unit.path = None;
        unit.movement_direction = Vec2::ZERO;
        unit.blocked_since = None;
        if unit.action != UnitAction::Idle {
            unit.action = UnitAction::Idle;
            self.emit_movement(id, unit.position, Vec2::ZERO, UnitAction::Idle);
        }
    }

    fn clear_goal(unit: &mut Unit, goal: &Goal) {
        match goal {
            Goal::Point(_) => unit.move_to = None,
            Goal::Object(_) => unit.target = None,
            Goal::None => {}
        }
    }

    // ------------------------------------------------------------------
    // Contact interactions
    // ------------------------------------------------------------------

    /// Distance slack remaining to the target, `Some` when touching.
    fn contact_distance(&self, unit: &Unit, target_id: ObjectId) -> Option<f32> {
        let radius = self.data.unit(unit.class).radius;
        let target = self.live_object(target_id)?;
        let gap = match &target.kind {
            ObjectKind::Building(building) => {
                let size = self.data.building(building.building_type).size;
                let closest = building.closest_point(size, unit.position);
                unit.position.distance(closest) - radius
            }
            ObjectKind::Unit(other) => {
                let other_radius = self.data.unit(other.class).radius;
                unit.position.distance(other.position) - radius - other_radius
            }
        };
        (gap <= CONTACT_DISTANCE).then_some(gap)
    }

    /// Dispatch the on-contact interaction for the unit's target.
    fn try_interact(
        &mut self,
        id: ObjectId,
        player: u8,
        unit: &mut Unit,
        target_id: ObjectId,
        dt: f64,
    ) -> Interaction {
        if self.contact_distance(unit, target_id).is_none() {
            return Interaction::NotInContact;
        }
        // Copy what the dispatch needs; the borrow must not outlive it.
        let Some((target_player, building_info)) = self.live_object(target_id).map(|target| {
            let building_info = target.as_building().map(|building| {
                (
                    building.building_type,
                    building.is_completed(),
                    self.data.building(building.building_type).resource_node.is_some(),
                )
            });
            (target.player, building_info)
        }) else {
            return Interaction::NotInContact;
        };

        match building_info {
            Some((building_type, completed, is_node)) => {
                if target_player == GAIA_PLAYER_INDEX && is_node {
                    if unit.class == UnitClass::Villager {
                        self.gather(id, player, unit, target_id, dt);
                        return Interaction::Done;
                    }
                } else if target_player == player {
                    if !completed && unit.class == UnitClass::Villager {
                        self.construct(id, unit, target_id, dt);
                        return Interaction::Done;
                    }
                    if completed && self.can_drop_off(unit, building_type) {
                        self.drop_off(id, player, unit, target_id);
                        return Interaction::Done;
                    }
                } else {
                    self.start_or_continue_attack(id, unit, target_id);
                    return Interaction::Done;
                }
            }
            None => {
                if target_player != player {
                    self.start_or_continue_attack(id, unit, target_id);
                    return Interaction::Done;
                }
            }
        }

        // Friendly object with nothing to do: arrival ends the order.
        unit.target = None;
        self.stop_unit(id, unit);
        Interaction::Done
    }

    fn can_drop_off(&self, unit: &Unit, building_type: BuildingType) -> bool {
        let Some(resource) = unit.carried_resource else {
            return false;
        };
        unit.carried_amount >= 1.0 && self.data.building(building_type).accepts_dropoff(resource)
    }

    // ------------------------------------------------------------------
    // Gathering and drop-off
    // ------------------------------------------------------------------

    /// Accumulate fractional resources from a gaia node, clamped to
    /// carry capacity; at capacity, auto-target the nearest drop-off.
    fn gather(&mut self, id: ObjectId, player: u8, unit: &mut Unit, node_id: ObjectId, dt: f64) {
        let Some((resource, remaining)) = self
            .live_object(node_id)
            .and_then(|o| o.as_building())
            .and_then(|b| {
                let (resource, _) = self.data.building(b.building_type).resource_node?;
                Some((resource, b.resource_remaining))
            })
        else {
            return;
        };

        self.set_villager_task(id, unit, VillagerTask::for_resource(resource));
        if unit.action != UnitAction::Task {
            unit.action = UnitAction::Task;
            unit.action_start_time = self.game_time;
            self.emit_movement(id, unit.position, Vec2::ZERO, UnitAction::Task);
        }

        if unit.carried_resource != Some(resource) {
            unit.carried_resource = Some(resource);
            unit.carried_amount = 0.0;
        }

        let stats = self.data.unit(unit.class);
        let capacity = stats.carry_capacity as f32;
        let before_points = unit.carried_whole_points();

        let gain = (stats.gather_rate * dt as f32)
            .min(capacity - unit.carried_amount)
            .min(remaining);
        unit.carried_amount += gain;

        if let Some(node) = self
            .objects
            .get_mut(node_id)
            .and_then(|o| o.as_building_mut())
        {
            node.resource_remaining -= gain;
            if node.resource_remaining <= 0.0 {
                self.kill_object(node_id);
            }
        }

        if unit.carried_whole_points() != before_points {
            self.events.push(GameEvent::CarriedResourcesChanged {
                id,
                resource,
                amount: unit.carried_whole_points(),
            });
        }

        if unit.carried_amount >= capacity {
            unit.carried_amount = capacity;
            match self.nearest_drop_off(player, unit, resource) {
                Some(drop_off) => {
                    // Detour to the drop-off; the manual target stays on
                    // the node so the villager returns afterwards.
                    unit.target = Some(drop_off);
                    unit.path = None;
                }
                None => {
                    unit.target = None;
                    self.stop_unit(id, unit);
                }
            }
        }
    }

    /// Nearest own completed building accepting `resource`, by
    /// straight-line distance to the building center.
    fn nearest_drop_off(
        &self,
        player: u8,
        unit: &Unit,
        resource: crate::resources::ResourceType,
    ) -> Option<ObjectId> {
        let mut best: Option<(f32, ObjectId)> = None;
        for id in self.objects.sorted_ids() {
            let Some(object) = self.live_object(id) else {
                continue;
            };
            if object.player != player {
                continue;
            }
            let Some(building) = object.as_building() else {
                continue;
            };
            if !building.is_completed() {
                continue;
            }
            let stats = self.data.building(building.building_type);
            if !stats.accepts_dropoff(resource) {
                continue;
            }
            let distance = unit.position.distance(building.center(stats.size));
            if best.map_or(true, |(d, _)| distance < d) {
                best = Some((distance, id));
            }
        }
        best.map(|(_, id)| id)
    }

    /// Deposit carried cargo and auto-return to the last manually
    /// targeted object if it still exists.
    fn drop_off(&mut self, id: ObjectId, player: u8, unit: &mut Unit, _building_id: ObjectId) {
        let Some(resource) = unit.carried_resource else {
            return;
        };
        let amount = unit.carried_amount.round() as u32;
        unit.carried_amount = 0.0;

        if amount > 0 {
            let state = &mut self.players[player as usize];
            *state.resources.get_mut(resource) += amount;
            let resources = state.resources;
            self.events.push(GameEvent::ResourcesUpdate { player, resources });
        }
        self.events.push(GameEvent::CarriedResourcesChanged {
            id,
            resource,
            amount: 0,
        });

        match unit.manual_target.filter(|&t| self.live_object(t).is_some()) {
            Some(origin) => {
                unit.target = Some(origin);
                unit.path = None;
            }
            None => {
                unit.target = None;
                self.stop_unit(id, unit);
            }
        }
    }

    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Contribute construction progress to a foundation.
    ///
    /// The first contact with a 0% foundation atomically checks that
    /// the footprint is free of units before committing occupancy; if
    /// blocked, the builder halts with no partial commit.
    fn construct(&mut self, id: ObjectId, unit: &mut Unit, foundation_id: ObjectId, dt: f64) {
        let Some((building_type, base_tile, committed, percentage)) = self
            .live_object(foundation_id)
            .and_then(|o| o.as_building())
            .map(|b| (b.building_type, b.base_tile, b.footprint_committed, b.build_percentage))
        else {
            return;
        };
        let stats = self.data.building(building_type);
        let size = stats.size;
        let construction_time = stats.construction_time;
        let max_hp = stats.max_hp;
        let population_space = stats.population_space;

        if !committed {
            if self.footprint_contains_units(base_tile, size) {
                tracing::debug!(
                    builder = id,
                    foundation = foundation_id,
                    "foundation blocked by standing units; construction halted"
                );
                unit.target = None;
                self.stop_unit(id, unit);
                return;
            }
            self.map
                .set_footprint_occupied(base_tile.0, base_tile.1, size.0, size.1, true);
            if let Some(building) = self
                .objects
                .get_mut(foundation_id)
                .and_then(|o| o.as_building_mut())
            {
                building.footprint_committed = true;
            }
        }

        self.set_villager_task(id, unit, VillagerTask::Builder);
        if unit.action != UnitAction::Task {
            unit.action = UnitAction::Task;
            unit.action_start_time = self.game_time;
            self.emit_movement(id, unit.position, Vec2::ZERO, UnitAction::Task);
        }

        let build_rate = self.data.unit(unit.class).build_rate;
        let new_percentage =
            (percentage + 100.0 * dt as f32 / construction_time * build_rate).min(100.0);

        let owner = self.objects.get(foundation_id).map(|o| o.player);
        let mut old_hp_displayed = 0;
        let mut new_hp_displayed = 0;
        if let Some(object) = self.objects.get_mut(foundation_id) {
            old_hp_displayed = object.displayed_hp();
            object.hp = max_hp as f32 * new_percentage / 100.0;
            new_hp_displayed = object.displayed_hp();
            if let Some(building) = object.as_building_mut() {
                building.build_percentage = new_percentage;
            }
        }

        if new_percentage.floor() > percentage.floor() || new_percentage >= 100.0 {
            self.events.push(GameEvent::BuildPercentageUpdate {
                id: foundation_id,
                percentage: new_percentage,
            });
        }
        if new_hp_displayed != old_hp_displayed {
            self.events.push(GameEvent::HpUpdate {
                id: foundation_id,
                hp: new_hp_displayed,
            });
        }

        if new_percentage >= 100.0 {
            // Completed: population space comes online, the builder is
            // released.
            if let Some(owner) = owner {
                if let Some(state) = self.players.get_mut(owner as usize) {
                    state.available_population_space += population_space;
                }
            }
            self.set_villager_task(id, unit, VillagerTask::None);
            unit.target = None;
            self.stop_unit(id, unit);
        }
    }

    /// Whether any unit's center stands inside a footprint rect.
    fn footprint_contains_units(&self, base_tile: (u32, u32), size: (u32, u32)) -> bool {
        let min_x = base_tile.0 as f32;
        let min_y = base_tile.1 as f32;
        let max_x = (base_tile.0 + size.0) as f32;
        let max_y = (base_tile.1 + size.1) as f32;

        self.objects.iter().any(|object| {
            object.as_unit().is_some_and(|unit| {
                unit.position.x >= min_x
                    && unit.position.x < max_x
                    && unit.position.y >= min_y
                    && unit.position.y < max_y
            })
        })
    }

    // ------------------------------------------------------------------
    // Melee combat
    // ------------------------------------------------------------------

    /// Begin an attack cycle, or keep the running one.
    fn start_or_continue_attack(&mut self, id: ObjectId, unit: &mut Unit, target_id: ObjectId) {
        if unit.action == UnitAction::Attack {
            return;
        }
        unit.action = UnitAction::Attack;
        unit.action_start_time = self.game_time;
        unit.attack_damage_applied = false;
        unit.movement_direction = Vec2::ZERO;
        unit.path = None;
        unit.target = Some(target_id);
        self.emit_movement(id, unit.position, Vec2::ZERO, UnitAction::Attack);
    }

    /// Advance the melee cycle. Returns `true` while the swing is still
    /// in progress (the unit does nothing else this step).
    ///
    /// Damage lands exactly once per cycle at the 50%-elapsed point:
    /// `max(1, attack - armor)`.
    fn continue_attack_cycle(&mut self, id: ObjectId, unit: &mut Unit) -> bool {
        let stats = self.data.unit(unit.class);
        let cycle = f64::from(stats.attack_frames) / f64::from(ATTACK_ANIMATION_FPS);
        let attack = stats.attack;
        let elapsed = self.game_time - unit.action_start_time;

        let Some(target_id) = unit.target else {
            self.stop_unit(id, unit);
            return false;
        };
        if self.live_object(target_id).is_none() {
            unit.target = None;
            self.stop_unit(id, unit);
            return false;
        }

        if !unit.attack_damage_applied && elapsed >= cycle / 2.0 {
            unit.attack_damage_applied = true;
            self.apply_damage(target_id, attack);
        }

        if elapsed < cycle {
            return true;
        }

        // Cycle complete; retarget or swing again.
        let still_in_contact = self.live_object(target_id).is_some()
            && self.contact_distance(unit, target_id).is_some();
        if still_in_contact {
            unit.action_start_time += cycle;
            unit.attack_damage_applied = false;
            true
        } else {
            // Fall through to goal resolution: the chase emits a new
            // movement segment, or stopping emits the idle one.
            false
        }
    }
}
