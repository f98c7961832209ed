//! # Bot モジュール
//!
//! 戦車ボット本体の2フェーズライフサイクルを提供します。
//!
//! 外部ホストのコールバックモデルを抽象的に再現しています:
//! 接続後に一度だけ`setup`が呼ばれ（ロスター取得・挨拶送信）、
//! その後は毎ティック`process_tick`が呼ばれます。
//!
//! `process_tick`は (スナップショット, 静的プロファイル) → (判断, 照準増分)
//! の純粋な単一スレッド評価で、コア内部にティックをまたぐ共有可変状態は
//! 持ちません。受信メッセージはテレメトリ（ログ）のみに使用し、判断分岐
//! には使いません。

use tracing::{debug, info, trace, warn};

use crate::models::engagement::{self, EngagementContext, Movement, TickPlan};
use crate::models::messages::{MessageContainer, MessagePayload, MessageTarget};
use crate::models::targeting;
use crate::models::traits::{IActionSink, IWorld};

/// 戦車ボット
#[derive(Debug, Default)]
pub struct TankBot {
    /// 自チームのメンバーID（自分を除く）
    team_members: Vec<String>,
    /// 敵チームのメンバーID
    enemy_members: Vec<String>,
}

impl TankBot {
    pub fn new() -> Self {
        Self::default()
    }

    /// 一度だけの初期化
    ///
    /// チームロスターを取得し、チームメンバーに挨拶を、敵チームに
    /// 宣戦メッセージを送信します（どちらも判断には影響しない任意の
    /// ブロードキャストです）。
    pub fn setup(&mut self, world: &dyn IWorld, actions: &mut dyn IActionSink) {
        self.team_members = world.team_members().to_vec();
        self.enemy_members = world.enemy_members().to_vec();

        let my_id = world.self_state().id.clone();
        for member in &self.team_members {
            actions.send(
                MessageTarget::Client(member.clone()),
                MessagePayload::Text {
                    text: format!("Hello {} from {}!", member, my_id),
                },
            );
        }
        // 宣戦布告は敵チーム全体へのブロードキャスト
        actions.send(
            MessageTarget::EnemyTeam,
            MessagePayload::Text {
                text: format!("{} is coming for you!", my_id),
            },
        );
        // サーバーへ準備完了を通知
        actions.send(
            MessageTarget::Server,
            MessagePayload::Text {
                text: format!("{} ready", my_id),
            },
        );

        info!(
            id = %my_id,
            team_members = self.team_members.len(),
            enemy_members = self.enemy_members.len(),
            fire_mode = ?world.profile().fire_mode,
            "BOT_SETUP: ボットを初期化しました"
        );
    }

    /// 1ティックの処理
    ///
    /// ターゲット選定 → 交戦判断 → 行動適用の順に評価し、
    /// 1ティック分の意図を`actions`へ書き込みます。
    pub fn process_tick(&mut self, world: &mut dyn IWorld, actions: &mut dyn IActionSink) {
        // 受信メッセージの処理（テレメトリのみ）
        for message in world.drain_messages() {
            self.handle_message(world, &message);
        }

        let self_state = world.self_state().clone();

        // 死亡時は何もしない。早期リターン。
        if !self_state.alive {
            debug!(id = %self_state.id, "BOT_DEAD: 死亡しているためこのティックは何もしません");
            return;
        }

        let enemies = world.visible_enemies().to_vec();
        let target = targeting::select_nearest(&self_state, &enemies);

        let context = EngagementContext {
            self_state: &self_state,
            target,
            profile: world.profile(),
            gravity: world.gravity(),
            tick_rate: world.tick_rate(),
        };

        let Some(plan) = engagement::evaluate(&context) else {
            return;
        };
        self.apply_plan(&plan, actions);
    }

    /// 行動計画を外部アダプタへ書き出す
    fn apply_plan(&self, plan: &TickPlan, actions: &mut dyn IActionSink) {
        if plan.body_turn_rad != 0.0 {
            actions.rotate_body(plan.body_turn_rad);
        }
        if plan.turret_yaw_delta_rad != 0.0 {
            actions.rotate_turret_yaw(plan.turret_yaw_delta_rad);
        }
        if plan.turret_pitch_delta_rad != 0.0 {
            actions.rotate_turret_pitch(plan.turret_pitch_delta_rad);
        }

        match plan.movement {
            Some(Movement::Direction(direction)) => actions.move_direction(direction),
            Some(Movement::Towards {
                direction,
                point,
                strafe,
            }) => actions.move_towards(direction, point, strafe),
            None => {}
        }

        if plan.fire {
            if actions.can_shoot() {
                if !actions.shoot() {
                    // 同一ティック内では再試行せず、次ティックで自然に再挑戦する
                    warn!(
                        decision = ?plan.decision,
                        "FIRE_REJECTED: 射撃が拒否されました（クールダウン等）"
                    );
                }
            } else {
                debug!(
                    decision = ?plan.decision,
                    "FIRE_ON_COOLDOWN: 射撃不可のため保留します"
                );
            }
        } else if let Some(reason) = plan.hold_fire {
            trace!(
                decision = ?plan.decision,
                reason = ?reason,
                "FIRE_HELD: 射撃を保留しています"
            );
        }
    }

    /// 受信メッセージの処理
    ///
    /// Hit/GotHitはログ・テレメトリのみに反応し、判断分岐には使いません。
    /// 未知のタグは失敗せずに無視します。
    fn handle_message(&self, world: &dyn IWorld, message: &MessageContainer) {
        match &message.payload {
            MessagePayload::Hit {
                hit_entity,
                hit_side,
                damage_dealt,
            } => {
                // 命中した相手の残り体力も記録する
                let target_health = world.entity_state(hit_entity).map(|state| state.health);
                info!(
                    hit_entity = %hit_entity,
                    hit_side = %hit_side,
                    damage_dealt,
                    target_health = ?target_health,
                    "COMBAT_HIT: 敵に命中しました"
                );
            }
            MessagePayload::GotHit {
                shooter_entity,
                hit_side,
                damage_received,
            } => {
                let my_state = world.self_state();
                warn!(
                    shooter_entity = %shooter_entity,
                    hit_side = %hit_side,
                    damage_received,
                    current_health = my_state.health,
                    "COMBAT_GOT_HIT: 被弾しました"
                );
                if !my_state.alive {
                    info!(
                        killer = %shooter_entity,
                        "BOT_KILLED: 撃破されました"
                    );
                }
            }
            MessagePayload::TeamScored { team, score } => {
                info!(team = %team, score, "TEAM_SCORED: チームが得点しました");
            }
            MessagePayload::Text { text } => {
                debug!(text = %text, "MESSAGE_TEXT: テキストメッセージを受信しました");
            }
            // 未対応のメッセージ
            MessagePayload::Unknown { tag } => {
                warn!(tag = %tag, "MESSAGE_UNKNOWN: 未知のメッセージを無視します");
            }
        }
    }
}
