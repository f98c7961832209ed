//! # Simulation モジュール
//!
//! 意思決定コアをオフラインで駆動するシミュレーションハーネスを提供します。
//!
//! このモジュールは仕様上コアの「外部」にあたるアダプタ層の参照実装です。
//! 毎ティック、ボットへ読み取り専用スナップショット（`WorldSnapshot`）を
//! 渡し、ボットが書き込んだ意図（`ActionBuffer`）を実際の状態へ適用します。
//! コア自身はワールド状態を一切書き換えません。
//!
//! ## ティック処理順序
//!
//! 1. **スナップショット構築**: 現在状態の凍結と受信メッセージの引き渡し
//! 2. **ボット評価**: ターゲット選定 → 交戦判断 → 意図の書き込み
//! 3. **意図の適用**: 回転（レート上限でクランプ）、移動、射撃合法性判定
//! 4. **敵ユニット更新**: ボットへの接近移動と接触攻撃
//! 5. **クールダウン・時刻の前進**

use tracing::{debug, info, trace, warn};

use crate::bot::TankBot;
use crate::models::common::{math_utils, EntityState, Vec3};
use crate::models::engagement::Movement;
use crate::models::messages::{ArmorSide, MessageContainer, MessagePayload, MessageTarget};
use crate::models::traits::{IActionSink, IWorld, MoveDirection};
use crate::scenario::{ScenarioConfig, TankProfile};

/// 接触攻撃の有効距離（m）
const CONTACT_RANGE_M: f64 = 3.0;

/// 接触攻撃の基礎ダメージ（毎秒）
const CONTACT_DAMAGE_PER_S: f64 = 10.0;

/// 射撃が命中と判定される砲塔ヨーの許容誤差（ラジアン）
const SHOT_ARC_EPSILON_RAD: f64 = 0.05;

/// 敵ユニットの正面装甲値（ハーネス簡略化のため固定）
const ENEMY_FRONT_ARMOR: f64 = 0.2;

/// 1ティック分の凍結されたワールド状態
pub struct WorldSnapshot {
    self_state: EntityState,
    enemies: Vec<EntityState>,
    profile: TankProfile,
    gravity: f64,
    tick_rate: f64,
    team: Vec<String>,
    enemy_ids: Vec<String>,
    inbox: Vec<MessageContainer>,
}

impl IWorld for WorldSnapshot {
    fn self_state(&self) -> &EntityState {
        &self.self_state
    }

    fn entity_state(&self, id: &str) -> Option<&EntityState> {
        if self.self_state.id == id {
            return Some(&self.self_state);
        }
        self.enemies.iter().find(|enemy| enemy.id == id)
    }

    fn visible_enemies(&self) -> &[EntityState] {
        &self.enemies
    }

    fn profile(&self) -> &TankProfile {
        &self.profile
    }

    fn gravity(&self) -> f64 {
        self.gravity
    }

    fn tick_rate(&self) -> f64 {
        self.tick_rate
    }

    fn team_members(&self) -> &[String] {
        &self.team
    }

    fn enemy_members(&self) -> &[String] {
        &self.enemy_ids
    }

    fn drain_messages(&mut self) -> Vec<MessageContainer> {
        std::mem::take(&mut self.inbox)
    }
}

/// ボットの意図を1ティック分だけ蓄積するバッファ
#[derive(Debug, Default)]
pub struct ActionBuffer {
    pub body_turn_rad: f64,
    pub turret_yaw_delta_rad: f64,
    pub turret_pitch_delta_rad: f64,
    pub movement: Option<Movement>,
    pub fired: bool,
    pub shot_attempts: u32,
    pub outgoing: Vec<MessageContainer>,
    shooting_allowed: bool,
}

impl ActionBuffer {
    pub fn new(shooting_allowed: bool) -> Self {
        Self {
            shooting_allowed,
            ..Self::default()
        }
    }
}

impl IActionSink for ActionBuffer {
    fn rotate_body(&mut self, delta_rad: f64) {
        self.body_turn_rad += delta_rad;
    }

    fn rotate_turret_yaw(&mut self, delta_rad: f64) {
        self.turret_yaw_delta_rad += delta_rad;
    }

    fn rotate_turret_pitch(&mut self, delta_rad: f64) {
        self.turret_pitch_delta_rad += delta_rad;
    }

    fn move_direction(&mut self, direction: MoveDirection) {
        self.movement = Some(Movement::Direction(direction));
    }

    fn move_towards(&mut self, direction: MoveDirection, point: Vec3, strafe: bool) {
        self.movement = Some(Movement::Towards {
            direction,
            point,
            strafe,
        });
    }

    fn can_shoot(&self) -> bool {
        self.shooting_allowed && !self.fired
    }

    fn shoot(&mut self) -> bool {
        self.shot_attempts += 1;
        if self.shooting_allowed && !self.fired {
            self.fired = true;
            true
        } else {
            false
        }
    }

    fn send(&mut self, target: MessageTarget, payload: MessagePayload) {
        self.outgoing.push(MessageContainer::new(target, payload));
    }
}

/// ハーネス内の敵ユニット
#[derive(Debug, Clone)]
struct EnemyUnit {
    id: String,
    position: Vec3,
    speed: f64,
    health: f64,
    alive: bool,
}

/// シミュレーションエンジン
pub struct SimulationEngine {
    pub current_time: f64,
    pub dt: f64,
    pub max_time: f64,
    pub step_count: u64,

    pub bot: TankBot,
    bot_state: EntityState,
    enemies: Vec<EnemyUnit>,
    cooldown_remaining: f64,
    inbox: Vec<MessageContainer>,

    pub scenario: ScenarioConfig,
    pub verbose_level: u8,

    pub shots_fired: u64,
    pub hits: u64,
    pub enemies_destroyed: u64,
    team_score: u32,
}

impl SimulationEngine {
    pub fn new(scenario: ScenarioConfig, verbose_level: u8) -> Self {
        let dt = 1.0 / scenario.sim.tick_rate_hz;
        let max_time = scenario.sim.t_max_s;

        let spawn = scenario.bot.spawn;
        let mut bot_state = EntityState::new(
            scenario.bot.id.clone(),
            Vec3::new(spawn.x_m, spawn.y_m, spawn.z_m),
        );
        bot_state.health = scenario.bot.profile.max_health;

        let enemies = scenario
            .enemies
            .iter()
            .map(|config| EnemyUnit {
                id: config.id.clone(),
                position: Vec3::new(config.spawn.x_m, config.spawn.y_m, config.spawn.z_m),
                speed: config.speed_mps,
                health: config.health,
                alive: true,
            })
            .collect();

        Self {
            current_time: 0.0,
            dt,
            max_time,
            step_count: 0,
            bot: TankBot::new(),
            bot_state,
            enemies,
            cooldown_remaining: 0.0,
            inbox: Vec::new(),
            scenario,
            verbose_level,
            shots_fired: 0,
            hits: 0,
            enemies_destroyed: 0,
            team_score: 0,
        }
    }

    pub fn initialize(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if self.verbose_level > 0 {
            info!("シミュレーションエンジンを初期化中...");
        }

        let snapshot = self.make_snapshot();
        let mut actions = ActionBuffer::new(false);
        self.bot.setup(&snapshot, &mut actions);
        self.log_outgoing(&actions);

        if self.verbose_level > 0 {
            info!("初期化完了:");
            info!("  ボット: {} (射撃モード: {:?})", self.bot_state.id, self.scenario.bot.profile.fire_mode);
            info!("  敵機: {}機", self.enemies.len());
        }

        Ok(())
    }

    pub fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("=== シミュレーション実行開始 ===");

        while self.current_time < self.max_time {
            self.step();

            if self.verbose_level > 2 {
                trace!("時刻: {:.1}秒 (ステップ: {})", self.current_time, self.step_count);
            }

            if self.step_count % 100 == 0 && self.verbose_level > 0 {
                let progress = (self.current_time / self.max_time) * 100.0;
                info!(
                    "進行状況: {:.1}% ({:.1}/{:.1}秒)",
                    progress, self.current_time, self.max_time
                );
            }

            if !self.bot_state.alive {
                info!("BOT_DESTROYED: ボットが撃破されたため終了します");
                break;
            }
            if self.enemies.iter().all(|enemy| !enemy.alive) {
                info!("ALL_ENEMIES_DESTROYED: 全敵機を撃破しました");
                break;
            }
            if self.step_count > 100_000 {
                break;
            }
        }

        info!("=== シミュレーション完了 ===");
        info!("実行時間: {:.1}秒", self.current_time);
        info!("総ステップ数: {}", self.step_count);
        info!("射撃数: {} (命中: {})", self.shots_fired, self.hits);
        info!("撃破数: {}機", self.enemies_destroyed);
        info!("ボット残り体力: {:.1}", self.bot_state.health);

        Ok(())
    }

    fn step(&mut self) {
        let mut snapshot = self.make_snapshot();
        let mut actions = ActionBuffer::new(self.cooldown_remaining <= 0.0);
        self.bot.process_tick(&mut snapshot, &mut actions);

        self.apply_actions(&actions);
        self.advance_enemies();

        self.cooldown_remaining = (self.cooldown_remaining - self.dt).max(0.0);
        self.current_time += self.dt;
        self.step_count += 1;
    }

    /// 現在状態を凍結してスナップショットを作る
    fn make_snapshot(&mut self) -> WorldSnapshot {
        let enemies = self
            .enemies
            .iter()
            .map(|enemy| {
                let mut state = EntityState::new(enemy.id.clone(), enemy.position);
                state.alive = enemy.alive;
                state.health = enemy.health;
                state
            })
            .collect();

        WorldSnapshot {
            self_state: self.bot_state.clone(),
            enemies,
            profile: self.scenario.bot.profile.clone(),
            gravity: self.scenario.world.gravity_mps2,
            tick_rate: self.scenario.sim.tick_rate_hz,
            team: Vec::new(), // オフラインハーネスでは味方なし
            enemy_ids: self.enemies.iter().map(|enemy| enemy.id.clone()).collect(),
            inbox: std::mem::take(&mut self.inbox),
        }
    }

    /// ボットの意図を実際の状態へ適用する
    fn apply_actions(&mut self, actions: &ActionBuffer) {
        let profile = self.scenario.bot.profile.clone();

        // 回転の適用。コアはレート上限を守るが、アダプタ側でも安全にクランプする。
        let body_turn = actions
            .body_turn_rad
            .clamp(-profile.body_rotation_speed_rad, profile.body_rotation_speed_rad);
        self.bot_state.body.yaw = math_utils::normalize_angle(self.bot_state.body.yaw + body_turn);

        let yaw_delta = actions
            .turret_yaw_delta_rad
            .clamp(-profile.turret_yaw_speed_rad, profile.turret_yaw_speed_rad);
        self.bot_state.turret.yaw =
            math_utils::normalize_angle(self.bot_state.turret.yaw + yaw_delta);

        let pitch_delta = actions
            .turret_pitch_delta_rad
            .clamp(-profile.turret_pitch_speed_rad, profile.turret_pitch_speed_rad);
        self.bot_state.turret.pitch = (self.bot_state.turret.pitch + pitch_delta)
            .clamp(profile.turret_min_pitch_rad, profile.turret_max_pitch_rad);

        // 移動の適用
        if let Some(movement) = actions.movement {
            let step_length = profile.move_speed_mps * self.dt;
            if let Some(position) = self.bot_state.position {
                let new_position = match movement {
                    Movement::Direction(direction) => {
                        let heading = self.bot_state.body.yaw;
                        let sign = match direction {
                            MoveDirection::Forward => 1.0,
                            MoveDirection::Backward => -1.0,
                        };
                        position
                            + Vec3::new(heading.cos(), heading.sin(), 0.0) * (sign * step_length)
                    }
                    Movement::Towards {
                        direction,
                        point,
                        strafe,
                    } => {
                        // 非ストレーフ移動では車体も目標地点へ旋回させる
                        if !strafe {
                            let bearing =
                                (point.y - position.y).atan2(point.x - position.x);
                            let turn =
                                math_utils::angle_difference(self.bot_state.body.yaw, bearing)
                                    .clamp(
                                        -profile.body_rotation_speed_rad,
                                        profile.body_rotation_speed_rad,
                                    );
                            self.bot_state.body.yaw =
                                math_utils::normalize_angle(self.bot_state.body.yaw + turn);
                        }
                        let to_point =
                            Vec3::new(point.x - position.x, point.y - position.y, 0.0).normalize();
                        let sign = match direction {
                            MoveDirection::Forward => 1.0,
                            MoveDirection::Backward => -1.0,
                        };
                        position + to_point * (sign * step_length)
                    }
                };
                self.bot_state.position = Some(new_position);
            }
        }

        // 射撃の解決
        if actions.fired {
            self.shots_fired += 1;
            self.cooldown_remaining = profile.shoot_cooldown_s;
            self.resolve_shot(&profile);
        }

        // 送信メッセージ（オフラインではログのみ）
        self.log_outgoing(actions);
    }

    /// 射撃を解決する
    ///
    /// 砲塔ヨー方向の許容誤差内にいる最近傍の生存敵が射程内なら命中。
    fn resolve_shot(&mut self, profile: &TankProfile) {
        let Some(bot_position) = self.bot_state.position else {
            return;
        };
        let turret_yaw = self.bot_state.turret.yaw;

        let target = self
            .enemies
            .iter_mut()
            .filter(|enemy| enemy.alive)
            .filter(|enemy| {
                let distance = bot_position.distance(&enemy.position);
                if distance > profile.max_attack_range_m {
                    return false;
                }
                let bearing = (enemy.position.y - bot_position.y)
                    .atan2(enemy.position.x - bot_position.x);
                math_utils::angle_difference(turret_yaw, bearing).abs() <= SHOT_ARC_EPSILON_RAD
            })
            .min_by(|a, b| {
                let da = bot_position.distance(&a.position);
                let db = bot_position.distance(&b.position);
                da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
            });

        let Some(enemy) = target else {
            debug!(
                turret_yaw,
                "SHOT_MISSED: 射線上に有効な敵がいませんでした"
            );
            return;
        };

        // 敵はボットへ向かって移動するため、被弾面は正面とみなす
        let damage_dealt = profile.projectile_damage * (1.0 - ENEMY_FRONT_ARMOR);
        enemy.health -= damage_dealt;
        self.hits += 1;

        let enemy_id = enemy.id.clone();
        let destroyed = enemy.health <= 0.0;
        if destroyed {
            enemy.alive = false;
        }

        info!(
            target_id = %enemy_id,
            damage_dealt,
            remaining_health = enemy.health.max(0.0),
            "SHOT_HIT: 射撃が命中しました"
        );

        // 命中通知は次のティックの受信メッセージとして配送される
        self.inbox.push(MessageContainer::new(
            MessageTarget::Client(self.bot_state.id.clone()),
            MessagePayload::Hit {
                hit_entity: enemy_id.clone(),
                hit_side: ArmorSide::Front,
                damage_dealt,
            },
        ));

        if destroyed {
            self.enemies_destroyed += 1;
            self.team_score += 1;
            info!(target_id = %enemy_id, "ENEMY_DESTROYED: 敵機を撃破しました");
            self.inbox.push(MessageContainer::new(
                MessageTarget::Team,
                MessagePayload::TeamScored {
                    team: "friendly".to_string(),
                    score: self.team_score,
                },
            ));
        }
    }

    /// 敵ユニットの更新
    ///
    /// 敵はボットへ向かって等速直線運動し、接触距離内では接触攻撃を行います。
    fn advance_enemies(&mut self) {
        let Some(bot_position) = self.bot_state.position else {
            return;
        };
        let armor = self.scenario.bot.profile.armor;
        let body_yaw = self.bot_state.body.yaw;

        for enemy in &mut self.enemies {
            if !enemy.alive {
                continue;
            }

            let distance = enemy.position.distance(&bot_position);
            if distance > CONTACT_RANGE_M && enemy.speed > 0.0 {
                let direction = (bot_position - enemy.position).normalize();
                enemy.position = enemy.position + direction * (enemy.speed * self.dt);
                continue;
            }

            if distance <= CONTACT_RANGE_M && self.bot_state.alive {
                // 被弾面は車体ヨーと敵への方位の関係から決定する
                let bearing =
                    (enemy.position.y - bot_position.y).atan2(enemy.position.x - bot_position.x);
                let relative = math_utils::angle_difference(body_yaw, bearing);
                let hit_side = if relative.abs() < std::f64::consts::FRAC_PI_4 {
                    ArmorSide::Front
                } else if relative.abs() > 3.0 * std::f64::consts::FRAC_PI_4 {
                    ArmorSide::Rear
                } else if relative > 0.0 {
                    ArmorSide::Left
                } else {
                    ArmorSide::Right
                };

                let damage_received =
                    CONTACT_DAMAGE_PER_S * self.dt * (1.0 - armor.value(hit_side));
                self.bot_state.health -= damage_received;

                self.inbox.push(MessageContainer::new(
                    MessageTarget::Client(self.bot_state.id.clone()),
                    MessagePayload::GotHit {
                        shooter_entity: enemy.id.clone(),
                        hit_side,
                        damage_received,
                    },
                ));

                if self.bot_state.health <= 0.0 {
                    self.bot_state.alive = false;
                    warn!(
                        killer = %enemy.id,
                        "BOT_KILLED: ボットが撃破されました"
                    );
                }
            }
        }
    }

    fn log_outgoing(&self, actions: &ActionBuffer) {
        for message in &actions.outgoing {
            trace!(
                target = ?message.target,
                payload = ?message.payload,
                "BOT_MESSAGE_SENT: メッセージを送信しました"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::{
        ArmorProfile, BotConfig, EnemyConfig, FireMode, PositionConfig, ScenarioMeta,
        SimulationConfig, WorldConfig,
    };

    fn test_scenario(enemies: Vec<EnemyConfig>) -> ScenarioConfig {
        ScenarioConfig {
            meta: ScenarioMeta {
                version: "1.0".to_string(),
                name: "harness test".to_string(),
                description: "unit test".to_string(),
            },
            sim: SimulationConfig {
                tick_rate_hz: 5.0,
                t_max_s: 60.0,
            },
            world: WorldConfig { gravity_mps2: 18.0 },
            bot: BotConfig {
                id: "B001".to_string(),
                spawn: PositionConfig {
                    x_m: 0.0,
                    y_m: 0.0,
                    z_m: 0.0,
                },
                profile: TankProfile {
                    body_rotation_speed_rad: 0.1,
                    turret_yaw_speed_rad: 0.2,
                    turret_pitch_speed_rad: 0.1,
                    turret_min_pitch_rad: -1.4,
                    turret_max_pitch_rad: 0.8,
                    muzzle_speed_mps: 30.0,
                    armor: ArmorProfile {
                        front: 0.5,
                        rear: 0.1,
                        left: 0.3,
                        right: 0.3,
                    },
                    projectile_damage: 20.0,
                    min_attack_range_m: 10.0,
                    max_attack_range_m: 50.0,
                    fire_mode: FireMode::Direct,
                    shoot_cooldown_s: 1.0,
                    move_speed_mps: 5.0,
                    max_health: 100.0,
                },
            },
            enemies,
        }
    }

    fn static_enemy(id: &str, x: f64, health: f64) -> EnemyConfig {
        EnemyConfig {
            id: id.to_string(),
            spawn: PositionConfig {
                x_m: x,
                y_m: 0.0,
                z_m: 0.0,
            },
            speed_mps: 0.0,
            health,
        }
    }

    #[test]
    fn test_action_buffer_shoot_legality() {
        let mut buffer = ActionBuffer::new(true);
        assert!(buffer.can_shoot());
        assert!(buffer.shoot());
        // 同一ティック内の2発目は不正
        assert!(!buffer.can_shoot());
        assert!(!buffer.shoot());
        assert_eq!(buffer.shot_attempts, 2);

        let mut cooling = ActionBuffer::new(false);
        assert!(!cooling.can_shoot());
        assert!(!cooling.shoot());
    }

    #[test]
    fn test_direct_fire_destroys_static_enemy() {
        // 正面装甲0.2の敵に20ダメージ → 16/発。体力32 → 2発で撃破。
        let scenario = test_scenario(vec![static_enemy("E001", 30.0, 32.0)]);
        let mut engine = SimulationEngine::new(scenario, 0);
        engine.initialize().unwrap();
        engine.run().unwrap();

        assert_eq!(engine.enemies_destroyed, 1);
        assert_eq!(engine.hits, 2);
        assert!(engine.current_time < engine.max_time);
    }

    #[test]
    fn test_cooldown_limits_fire_rate() {
        let scenario = test_scenario(vec![static_enemy("E001", 30.0, 1000.0)]);
        let mut engine = SimulationEngine::new(scenario, 0);
        engine.initialize().unwrap();

        for _ in 0..50 {
            engine.step();
        }
        // 50ステップ = 10秒、クールダウン1秒 → 最大でも11発
        assert!(engine.shots_fired >= 2);
        assert!(engine.shots_fired <= 11);
    }

    #[test]
    fn test_hit_messages_are_delivered_next_tick() {
        let scenario = test_scenario(vec![static_enemy("E001", 30.0, 1000.0)]);
        let mut engine = SimulationEngine::new(scenario, 0);
        engine.initialize().unwrap();

        engine.step();
        assert_eq!(engine.hits, 1);
        // 命中通知が次ティックの受信箱に入っている
        assert!(engine
            .inbox
            .iter()
            .any(|m| matches!(m.payload, MessagePayload::Hit { .. })));

        // 次のステップで受信箱が消費される
        engine.step();
        assert!(engine
            .inbox
            .iter()
            .all(|m| !matches!(m.payload, MessagePayload::Hit { .. })));
    }

    #[test]
    fn test_contact_attack_damages_bot() {
        // 高速の敵が接近して接触攻撃する。射撃で削り切れない体力を与える。
        let mut enemy = static_enemy("E001", 60.0, 100_000.0);
        enemy.speed_mps = 25.0;
        let scenario = test_scenario(vec![enemy]);
        let max_health = scenario.bot.profile.max_health;

        let mut engine = SimulationEngine::new(scenario, 0);
        engine.initialize().unwrap();
        for _ in 0..200 {
            engine.step();
            if !engine.bot_state.alive {
                break;
            }
        }

        assert!(engine.bot_state.health < max_health);
    }

    #[test]
    fn test_towards_movement_strafe_keeps_body_heading() {
        let scenario = test_scenario(Vec::new());
        let mut engine = SimulationEngine::new(scenario, 0);

        // ストレーフ移動では車体ヨーは変わらない
        let mut actions = ActionBuffer::new(false);
        actions.move_towards(MoveDirection::Forward, Vec3::new(0.0, 10.0, 0.0), true);
        engine.apply_actions(&actions);
        assert_eq!(engine.bot_state.body.yaw, 0.0);

        // 非ストレーフ移動では車体が目標地点へレート上限で旋回する
        let mut actions = ActionBuffer::new(false);
        actions.move_towards(MoveDirection::Forward, Vec3::new(0.0, 10.0, 0.0), false);
        engine.apply_actions(&actions);
        let rate = engine.scenario.bot.profile.body_rotation_speed_rad;
        assert!((engine.bot_state.body.yaw - rate).abs() < 1e-12);
    }

    #[test]
    fn test_patrol_when_no_enemies() {
        let scenario = test_scenario(Vec::new());
        let mut engine = SimulationEngine::new(scenario, 0);
        engine.initialize().unwrap();

        let start = engine.bot_state.position.unwrap();
        let start_yaw = engine.bot_state.body.yaw;
        for _ in 0..10 {
            engine.step();
        }
        // 哨戒で前進と旋回が起きている
        let position = engine.bot_state.position.unwrap();
        assert!(position.distance(&start) > 0.0);
        assert!(engine.bot_state.body.yaw != start_yaw);
        assert_eq!(engine.shots_fired, 0);
    }
}
