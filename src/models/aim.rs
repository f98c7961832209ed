//! # Aim モジュール
//!
//! レート制限付きの照準制御を提供します。
//!
//! 1ティックあたりの回転量は設定された最大回転速度を超えず、
//! 同じ目標姿勢に対して繰り返し適用すると残り角度誤差が毎ティック
//! 単調に減少し、ゼロに到達した後は保持されます。
//!
//! ヨーは±πでラップして最短経路を取り、ピッチはラップせず
//! [min_pitch, max_pitch] にクランプされます。

use crate::models::common::{math_utils, Orientation, Vec3};

/// 1ティック分の照準ステップの結果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AimStep {
    /// このティックで適用する回転増分（クランプ後の実効値）
    pub delta: Orientation,
    /// 増分適用後の姿勢
    pub orientation: Orientation,
}

/// 目標姿勢に向けた1ティック分のクランプ済み回転を計算する
///
/// # 引数
///
/// * `current` - 現在の姿勢
/// * `desired` - 目標の姿勢
/// * `max_yaw_rate` - ヨーの最大回転量（ラジアン/ティック）
/// * `max_pitch_rate` - ピッチの最大回転量（ラジアン/ティック）
/// * `pitch_bounds` - ピッチの可動範囲 (min, max)
///
/// # 戻り値
///
/// 実効増分と適用後の姿勢
pub fn step_towards(
    current: Orientation,
    desired: Orientation,
    max_yaw_rate: f64,
    max_pitch_rate: f64,
    pitch_bounds: (f64, f64),
) -> AimStep {
    // 軸ごとの最短角度差（ヨーのみラップ）
    let yaw_error = math_utils::angle_difference(current.yaw, desired.yaw);
    let pitch_error = desired.pitch - current.pitch;

    let yaw_delta = yaw_error.clamp(-max_yaw_rate, max_yaw_rate);
    let pitch_delta = pitch_error.clamp(-max_pitch_rate, max_pitch_rate);

    let new_yaw = math_utils::normalize_angle(current.yaw + yaw_delta);
    // ピッチは増分適用後に可動範囲へクランプ
    let new_pitch = (current.pitch + pitch_delta).clamp(pitch_bounds.0, pitch_bounds.1);

    AimStep {
        delta: Orientation {
            yaw: yaw_delta,
            pitch: new_pitch - current.pitch,
            roll: 0.0,
        },
        orientation: Orientation {
            yaw: new_yaw,
            pitch: new_pitch,
            roll: current.roll,
        },
    }
}

/// 自位置から目標位置への望ましい姿勢（ヨー・ピッチ）を算出する
///
/// 目標が自分より下にある場合は正のピッチ（砲身下向き）になります。
pub fn orientation_towards(self_position: Vec3, target_position: Vec3) -> Orientation {
    let direction = target_position - self_position;
    let horizontal = (direction.x.powi(2) + direction.y.powi(2)).sqrt();
    Orientation::new(direction.y.atan2(direction.x), (-direction.z).atan2(horizontal))
}

/// 目標位置に向けた1ティック分の回転を計算する
///
/// 目標方向ベクトルから望ましいヨー・ピッチを導出し、`step_towards`に
/// 委譲します。
pub fn aim_at_position(
    self_position: Vec3,
    current: Orientation,
    target_position: Vec3,
    max_yaw_rate: f64,
    max_pitch_rate: f64,
    pitch_bounds: (f64, f64),
) -> AimStep {
    let desired = orientation_towards(self_position, target_position);
    step_towards(current, desired, max_yaw_rate, max_pitch_rate, pitch_bounds)
}
