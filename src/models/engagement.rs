//! # Engagement モジュール
//!
//! ティックごとの交戦判断を行う状態機械（EngagementFSM）を提供します。
//!
//! 状態は目標との現在距離から毎ティック新規に評価され、ヒステリシスは
//! ありません。目標がレンジ境界をまたぐとPursue/Engage/Retreatの間で
//! 振動し得ますが、これは仕様どおりの挙動です。
//!
//! ## 状態
//!
//! - **Patrol**: 目標なし → 一定方向に旋回しながら前進
//! - **Pursue**: 距離 > 交戦レンジ上限 → 目標へ前進、照準、射撃なし
//! - **Retreat**: 距離 < 交戦レンジ下限 → 目標から後退、照準、射撃なし
//! - **Engage**: レンジ内（境界含む） → 照準し、収束していれば射撃
//!
//! 自分が死亡している場合は他の評価より先にノーオペで終了します。

use tracing::{debug, trace};

use crate::models::aim::{self, AimStep};
use crate::models::ballistics;
use crate::models::common::{math_utils, EntityState, Orientation, Vec3};
use crate::models::traits::MoveDirection;
use crate::scenario::{FireMode, TankProfile};

/// 直接照準射撃の角度許容誤差（ラジアン）
pub const AIM_EPSILON_RAD: f64 = 0.01;

/// 間接射撃のピッチ収束許容誤差（ラジアン）
pub const PITCH_SOLVE_EPSILON_RAD: f64 = 1e-6;

/// 1ティックの交戦判断結果
#[derive(Debug, Clone, PartialEq)]
pub enum EngagementDecision {
    /// 目標なし、哨戒行動
    Patrol,
    /// 目標へ接近中
    Pursue(String),
    /// 目標から離脱中
    Retreat(String),
    /// 交戦レンジ内
    Engage { target: String, fire: bool },
}

/// 射撃保留の理由
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldFireReason {
    /// ピッチ可動範囲内に目標距離へ届く解が存在しない
    UnreachableRange,
    /// 砲塔がまだ照準に収束していない
    NotAligned,
}

/// 移動指示
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Movement {
    /// 車体方向に沿った移動
    Direction(MoveDirection),
    /// 指定地点へ向かう移動
    Towards {
        direction: MoveDirection,
        point: Vec3,
        strafe: bool,
    },
}

/// 1ティック分の行動計画
///
/// 外部アダプタが1回だけ消費する意図の集合で、永続化されません。
#[derive(Debug, Clone, PartialEq)]
pub struct TickPlan {
    pub decision: EngagementDecision,
    /// 車体の回転増分（rad、ゼロなら回転なし）
    pub body_turn_rad: f64,
    pub movement: Option<Movement>,
    /// 砲塔ヨーの回転増分（rad）
    pub turret_yaw_delta_rad: f64,
    /// 砲塔ピッチの回転増分（rad）
    pub turret_pitch_delta_rad: f64,
    /// このティックで射撃するかどうか
    pub fire: bool,
    /// 射撃しない場合の理由（射撃時と哨戒・移動時はNone）
    pub hold_fire: Option<HoldFireReason>,
}

impl TickPlan {
    fn without_aim(decision: EngagementDecision) -> Self {
        Self {
            decision,
            body_turn_rad: 0.0,
            movement: None,
            turret_yaw_delta_rad: 0.0,
            turret_pitch_delta_rad: 0.0,
            fire: false,
            hold_fire: None,
        }
    }

    fn with_aim(mut self, step: &AimStep) -> Self {
        self.turret_yaw_delta_rad = step.delta.yaw;
        self.turret_pitch_delta_rad = step.delta.pitch;
        self
    }
}

/// FSMへの1ティック分の入力
pub struct EngagementContext<'a> {
    pub self_state: &'a EntityState,
    /// ターゲット選定の結果（なければNone）
    pub target: Option<&'a EntityState>,
    pub profile: &'a TankProfile,
    /// 重力加速度（m/s²）
    pub gravity: f64,
    /// サーバーティックレート（Hz）
    pub tick_rate: f64,
}

/// 1ティック分の交戦判断を評価する
///
/// # 戻り値
///
/// 行動計画。自分が死亡している（または自位置が不明な）場合はNone
/// （ノーオペティック）。
pub fn evaluate(ctx: &EngagementContext) -> Option<TickPlan> {
    // 死亡時は移動も照準も射撃もしない
    if !ctx.self_state.alive {
        trace!(id = %ctx.self_state.id, "FSM_DEAD: 死亡しているためノーオペです");
        return None;
    }
    let self_position = ctx.self_state.position?;

    // 有効な位置を持つ目標がなければ哨戒
    let Some((target, target_position)) = ctx
        .target
        .and_then(|t| t.position.map(|position| (t, position)))
    else {
        return Some(patrol_plan(ctx.profile));
    };

    let distance = self_position.distance(&target_position);
    let plan = if distance > ctx.profile.max_attack_range_m {
        pursue_plan(ctx, self_position, target, target_position)
    } else if distance < ctx.profile.min_attack_range_m {
        retreat_plan(ctx, self_position, target, target_position)
    } else {
        // レンジ境界はEngageに含む
        engage_plan(ctx, self_position, target, target_position)
    };

    trace!(
        id = %ctx.self_state.id,
        target_id = %target.id,
        distance,
        decision = ?plan.decision,
        "FSM_DECISION: 交戦判断を評価しました"
    );

    Some(plan)
}

/// 哨戒: 一定方向（時計回り）に旋回しながら前進
fn patrol_plan(profile: &TankProfile) -> TickPlan {
    TickPlan {
        body_turn_rad: -profile.body_rotation_speed_rad,
        movement: Some(Movement::Direction(MoveDirection::Forward)),
        ..TickPlan::without_aim(EngagementDecision::Patrol)
    }
}

/// 追跡: 目標へ前進しつつ砲塔を向ける。射撃はしない。
fn pursue_plan(
    ctx: &EngagementContext,
    self_position: Vec3,
    target: &EntityState,
    target_position: Vec3,
) -> TickPlan {
    let step = aim_step(ctx, self_position, target_position);
    TickPlan {
        movement: Some(Movement::Towards {
            direction: MoveDirection::Forward,
            point: target_position,
            strafe: true,
        }),
        ..TickPlan::without_aim(EngagementDecision::Pursue(target.id.clone())).with_aim(&step)
    }
}

/// 離脱: 目標から後退しつつ砲塔を向ける。射撃はしない。
fn retreat_plan(
    ctx: &EngagementContext,
    self_position: Vec3,
    target: &EntityState,
    target_position: Vec3,
) -> TickPlan {
    let step = aim_step(ctx, self_position, target_position);
    TickPlan {
        movement: Some(Movement::Towards {
            direction: MoveDirection::Backward,
            point: target_position,
            strafe: true,
        }),
        ..TickPlan::without_aim(EngagementDecision::Retreat(target.id.clone())).with_aim(&step)
    }
}

/// 交戦: 射撃モードに応じて照準し、収束していれば射撃する
fn engage_plan(
    ctx: &EngagementContext,
    self_position: Vec3,
    target: &EntityState,
    target_position: Vec3,
) -> TickPlan {
    match ctx.profile.fire_mode {
        FireMode::Direct => direct_engage(ctx, self_position, target, target_position),
        FireMode::Indirect => indirect_engage(ctx, self_position, target, target_position),
    }
}

/// 直接照準射撃: 砲塔を目標へ向け、角度誤差が許容値内なら射撃
fn direct_engage(
    ctx: &EngagementContext,
    self_position: Vec3,
    target: &EntityState,
    target_position: Vec3,
) -> TickPlan {
    let turret = ctx.self_state.turret;
    let desired = aim::orientation_towards(self_position, target_position);
    let yaw_error = math_utils::angle_difference(turret.yaw, desired.yaw);
    let pitch_error = desired.pitch - turret.pitch;

    if yaw_error.abs() < AIM_EPSILON_RAD && pitch_error.abs() < AIM_EPSILON_RAD {
        return TickPlan {
            fire: true,
            ..TickPlan::without_aim(EngagementDecision::Engage {
                target: target.id.clone(),
                fire: true,
            })
        };
    }

    let step = aim_step(ctx, self_position, target_position);
    TickPlan {
        hold_fire: Some(HoldFireReason::NotAligned),
        ..TickPlan::without_aim(EngagementDecision::Engage {
            target: target.id.clone(),
            fire: false,
        })
        .with_aim(&step)
    }
}

/// 間接射撃: 水平距離からピッチ解を求め、解へ収束してから射撃
///
/// 解が存在しない場合（目標が達成可能レンジ外）は盲目的に撃たず、
/// 到達不能を報告して射撃を保留します。
fn indirect_engage(
    ctx: &EngagementContext,
    self_position: Vec3,
    target: &EntityState,
    target_position: Vec3,
) -> TickPlan {
    let profile = ctx.profile;
    let turret = ctx.self_state.turret;
    let horizontal_range = self_position.distance_xy(&target_position);
    let desired_yaw = aim::orientation_towards(self_position, target_position).yaw;

    let solved = ballistics::solve_pitch_for_range(
        profile.muzzle_speed_mps,
        ctx.gravity,
        ctx.tick_rate,
        profile.turret_min_pitch_rad,
        profile.turret_max_pitch_rad,
        horizontal_range,
        indirect_tolerance(profile, ctx.tick_rate),
    );

    let Some(solved_pitch) = solved else {
        debug!(
            target_id = %target.id,
            horizontal_range,
            min_pitch = profile.turret_min_pitch_rad,
            max_pitch = profile.turret_max_pitch_rad,
            "ENGAGE_UNREACHABLE: ピッチ範囲内に目標距離への解がなく射撃を保留します"
        );
        // ヨーだけは目標へ回し続ける（ピッチは保持）
        let step = aim::step_towards(
            turret,
            Orientation::new(desired_yaw, turret.pitch),
            profile.turret_yaw_speed_rad,
            profile.turret_pitch_speed_rad,
            pitch_bounds(profile),
        );
        return TickPlan {
            hold_fire: Some(HoldFireReason::UnreachableRange),
            ..TickPlan::without_aim(EngagementDecision::Engage {
                target: target.id.clone(),
                fire: false,
            })
            .with_aim(&step)
        };
    };

    let yaw_error = math_utils::angle_difference(turret.yaw, desired_yaw);
    let pitch_error = turret.pitch - solved_pitch;

    if pitch_error.abs() < PITCH_SOLVE_EPSILON_RAD && yaw_error.abs() < AIM_EPSILON_RAD {
        return TickPlan {
            fire: true,
            ..TickPlan::without_aim(EngagementDecision::Engage {
                target: target.id.clone(),
                fire: true,
            })
        };
    }

    let step = aim::step_towards(
        turret,
        Orientation::new(desired_yaw, solved_pitch),
        profile.turret_yaw_speed_rad,
        profile.turret_pitch_speed_rad,
        pitch_bounds(profile),
    );
    TickPlan {
        hold_fire: Some(HoldFireReason::NotAligned),
        ..TickPlan::without_aim(EngagementDecision::Engage {
            target: target.id.clone(),
            fire: false,
        })
        .with_aim(&step)
    }
}

fn aim_step(ctx: &EngagementContext, self_position: Vec3, target_position: Vec3) -> AimStep {
    aim::aim_at_position(
        self_position,
        ctx.self_state.turret,
        target_position,
        ctx.profile.turret_yaw_speed_rad,
        ctx.profile.turret_pitch_speed_rad,
        pitch_bounds(ctx.profile),
    )
}

fn pitch_bounds(profile: &TankProfile) -> (f64, f64) {
    (profile.turret_min_pitch_rad, profile.turret_max_pitch_rad)
}

/// 着弾距離の許容誤差（m）
///
/// 弾道は1ステップで初速×dtだけ水平に進むため、離散化誤差として
/// 1ステップ分の移動量を許容します。
fn indirect_tolerance(profile: &TankProfile, tick_rate: f64) -> f64 {
    profile.muzzle_speed_mps / tick_rate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::common::Vec3;
    use crate::scenario::ArmorProfile;

    const GRAVITY: f64 = 18.0;
    const TICK_RATE: f64 = 5.0;

    fn profile(fire_mode: FireMode) -> TankProfile {
        TankProfile {
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
            fire_mode,
            shoot_cooldown_s: 1.0,
            move_speed_mps: 5.0,
            max_health: 100.0,
        }
    }

    fn entity(id: &str, x: f64, y: f64) -> EntityState {
        EntityState::new(id.to_string(), Vec3::new(x, y, 0.0))
    }

    fn context<'a>(
        self_state: &'a EntityState,
        target: Option<&'a EntityState>,
        profile: &'a TankProfile,
    ) -> EngagementContext<'a> {
        EngagementContext {
            self_state,
            target,
            profile,
            gravity: GRAVITY,
            tick_rate: TICK_RATE,
        }
    }

    #[test]
    fn test_dead_self_yields_noop() {
        let profile = profile(FireMode::Direct);
        let mut me = entity("ME", 0.0, 0.0);
        me.alive = false;
        let enemy = entity("E001", 30.0, 0.0);
        assert!(evaluate(&context(&me, Some(&enemy), &profile)).is_none());
    }

    #[test]
    fn test_no_target_patrols() {
        let profile = profile(FireMode::Direct);
        let me = entity("ME", 0.0, 0.0);
        let plan = evaluate(&context(&me, None, &profile)).unwrap();

        assert_eq!(plan.decision, EngagementDecision::Patrol);
        // 旋回方向は固定（負=時計回り）、旋回量は最大レート
        assert_eq!(plan.body_turn_rad, -profile.body_rotation_speed_rad);
        assert_eq!(
            plan.movement,
            Some(Movement::Direction(MoveDirection::Forward))
        );
        assert!(!plan.fire);
    }

    #[test]
    fn test_beyond_max_range_pursues() {
        let profile = profile(FireMode::Direct);
        let me = entity("ME", 0.0, 0.0);
        let enemy = entity("E001", 80.0, 0.0);
        let plan = evaluate(&context(&me, Some(&enemy), &profile)).unwrap();

        assert_eq!(plan.decision, EngagementDecision::Pursue("E001".to_string()));
        assert!(matches!(
            plan.movement,
            Some(Movement::Towards {
                direction: MoveDirection::Forward,
                strafe: true,
                ..
            })
        ));
        assert!(!plan.fire);
    }

    #[test]
    fn test_below_min_range_retreats() {
        let profile = profile(FireMode::Direct);
        let me = entity("ME", 0.0, 0.0);
        let enemy = entity("E001", 5.0, 0.0);
        let plan = evaluate(&context(&me, Some(&enemy), &profile)).unwrap();

        assert_eq!(plan.decision, EngagementDecision::Retreat("E001".to_string()));
        assert!(matches!(
            plan.movement,
            Some(Movement::Towards {
                direction: MoveDirection::Backward,
                ..
            })
        ));
        assert!(!plan.fire);
    }

    #[test]
    fn test_range_boundaries_are_inclusive_of_engage() {
        let profile = profile(FireMode::Direct);
        let me = entity("ME", 0.0, 0.0);

        // 距離 == min_attack_range_m
        let at_min = entity("E001", profile.min_attack_range_m, 0.0);
        let plan = evaluate(&context(&me, Some(&at_min), &profile)).unwrap();
        assert!(matches!(plan.decision, EngagementDecision::Engage { .. }));

        // 距離 == max_attack_range_m
        let at_max = entity("E001", profile.max_attack_range_m, 0.0);
        let plan = evaluate(&context(&me, Some(&at_max), &profile)).unwrap();
        assert!(matches!(plan.decision, EngagementDecision::Engage { .. }));
    }

    #[test]
    fn test_direct_fire_when_aligned() {
        let profile = profile(FireMode::Direct);
        // 砲塔ヨー0・ピッチ0、目標は+x軸上の同高度 → 照準済み
        let me = entity("ME", 0.0, 0.0);
        let enemy = entity("E001", 30.0, 0.0);
        let plan = evaluate(&context(&me, Some(&enemy), &profile)).unwrap();

        assert_eq!(
            plan.decision,
            EngagementDecision::Engage {
                target: "E001".to_string(),
                fire: true,
            }
        );
        assert!(plan.fire);
        assert!(plan.hold_fire.is_none());
    }

    #[test]
    fn test_direct_holds_fire_until_aligned() {
        let profile = profile(FireMode::Direct);
        let mut me = entity("ME", 0.0, 0.0);
        me.turret.yaw = 1.5; // 目標方向（ヨー0）から大きくずれている
        let enemy = entity("E001", 30.0, 0.0);
        let plan = evaluate(&context(&me, Some(&enemy), &profile)).unwrap();

        assert!(!plan.fire);
        assert_eq!(plan.hold_fire, Some(HoldFireReason::NotAligned));
        // ヨー増分はレート上限でクランプされる
        assert!((plan.turret_yaw_delta_rad + profile.turret_yaw_speed_rad).abs() < 1e-12);
    }

    #[test]
    fn test_indirect_unreachable_range_holds_fire() {
        let mut profile = profile(FireMode::Indirect);
        profile.max_attack_range_m = 10_000.0;
        profile.min_attack_range_m = 0.0;
        let me = entity("ME", 0.0, 0.0);
        // 初速30 m/sでは5000mへ届くピッチは存在しない
        let enemy = entity("E001", 5000.0, 0.0);
        let plan = evaluate(&context(&me, Some(&enemy), &profile)).unwrap();

        assert_eq!(
            plan.decision,
            EngagementDecision::Engage {
                target: "E001".to_string(),
                fire: false,
            }
        );
        assert!(!plan.fire);
        assert_eq!(plan.hold_fire, Some(HoldFireReason::UnreachableRange));
        // ピッチは動かさない
        assert_eq!(plan.turret_pitch_delta_rad, 0.0);
    }

    #[test]
    fn test_indirect_fires_once_pitch_converged() {
        let profile = profile(FireMode::Indirect);
        let range = 40.0;
        let solved = ballistics::solve_pitch_for_range(
            profile.muzzle_speed_mps,
            GRAVITY,
            TICK_RATE,
            profile.turret_min_pitch_rad,
            profile.turret_max_pitch_rad,
            range,
            indirect_tolerance(&profile, TICK_RATE),
        )
        .expect("40mは到達可能なはず");

        let mut me = entity("ME", 0.0, 0.0);
        me.turret.pitch = solved; // 既に解へ収束済み
        let enemy = entity("E001", range, 0.0);
        let plan = evaluate(&context(&me, Some(&enemy), &profile)).unwrap();

        assert!(plan.fire);
        assert!(plan.hold_fire.is_none());
    }

    #[test]
    fn test_indirect_steps_pitch_towards_solution() {
        let profile = profile(FireMode::Indirect);
        let me = entity("ME", 0.0, 0.0); // ピッチ0から開始
        let enemy = entity("E001", 40.0, 0.0);
        let plan = evaluate(&context(&me, Some(&enemy), &profile)).unwrap();

        assert!(!plan.fire);
        assert_eq!(plan.hold_fire, Some(HoldFireReason::NotAligned));
        // 曲射なので上向き（負方向）へピッチを動かす
        assert!(plan.turret_pitch_delta_rad < 0.0);
        assert!(plan.turret_pitch_delta_rad.abs() <= profile.turret_pitch_speed_rad + 1e-12);
    }
}
