//! # Ballistics モジュール
//!
//! 砲弾の弾道計算を提供します。
//!
//! サーバー側の砲弾シミュレーションは半陰的オイラー法で離散化されています:
//!
//! ```text
//! dt = 1 / tick_rate
//! vy -= gravity * dt
//! x  += vx * dt
//! y  += vy * dt
//! ```
//!
//! 本モジュールはこの式を忠実に再現し、順方向クエリ（ピッチ → 飛翔経路）と
//! 逆方向クエリ（目標水平距離 → ピッチ）の両方を提供します。
//! 状態は持たず、すべて純粋関数です。
//!
//! ピッチの符号規約: 0 = 水平、正 = 砲身下向き（vyが負）、負 = 上向き。

use tracing::trace;

/// 最大シミュレーションステップ数のデフォルト値
pub const DEFAULT_MAX_STEPS: usize = 1000;

/// ピッチ探索の刻み幅（ラジアン）
const PITCH_SCAN_STEP_RAD: f64 = 0.005;

/// 弾道上の1点（水平距離, 高さ）
///
/// 生成された列が1本の飛翔アークを表します。使用後は破棄され、
/// 永続化されません。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrajectoryPoint {
    /// 発射点からの水平距離（m）
    pub distance: f64,
    /// 発射点からの相対高さ（m）
    pub height: f64,
}

/// 弾道を1ステップずつ生成する有限・遅延イテレータ
///
/// 呼び出し側は全体を実体化せずに先頭だけを消費できます
/// （例: 最初の地面交差点を探す場合）。Cloneで再スタート可能です。
#[derive(Debug, Clone)]
pub struct TrajectoryIter {
    vx: f64,
    vy: f64,
    x: f64,
    y: f64,
    dt: f64,
    gravity: f64,
    steps_left: usize,
    max_range: f64,
    done: bool,
}

impl TrajectoryIter {
    fn empty() -> Self {
        Self {
            vx: 0.0,
            vy: 0.0,
            x: 0.0,
            y: 0.0,
            dt: 0.0,
            gravity: 0.0,
            steps_left: 0,
            max_range: 0.0,
            done: true,
        }
    }
}

impl Iterator for TrajectoryIter {
    type Item = TrajectoryPoint;

    fn next(&mut self) -> Option<TrajectoryPoint> {
        if self.done || self.steps_left == 0 {
            return None;
        }
        self.steps_left -= 1;

        self.vy -= self.gravity * self.dt;
        let new_x = self.x + self.vx * self.dt;
        let new_y = self.y + self.vy * self.dt;

        // 不変条件: 水平距離は毎ステップ前進する。前進しない場合は打ち切る。
        if new_x <= self.x {
            self.done = true;
            return None;
        }

        self.x = new_x;
        self.y = new_y;

        // 最大距離を超えたらこの点を最後に打ち切る
        if self.x > self.max_range {
            self.done = true;
        }

        Some(TrajectoryPoint {
            distance: self.x,
            height: self.y,
        })
    }
}

/// 砲弾の飛翔経路をシミュレーション
///
/// # 引数
///
/// * `muzzle_speed` - 初速（m/s）
/// * `gravity` - 重力加速度（m/s²）
/// * `tick_rate` - サーバーティックレート（Hz）
/// * `pitch` - 砲身ピッチ（ラジアン、正=下向き）
/// * `max_steps` - 最大ステップ数
/// * `max_range` - 打ち切り水平距離（m）
///
/// # 戻り値
///
/// 弾道点の遅延イテレータ。いずれかの入力が非有限（NaN等）の場合、
/// 途中まで埋まったゴミではなく空の列を返す。
pub fn simulate(
    muzzle_speed: f64,
    gravity: f64,
    tick_rate: f64,
    pitch: f64,
    max_steps: usize,
    max_range: f64,
) -> TrajectoryIter {
    let inputs = [muzzle_speed, gravity, tick_rate, pitch, max_range];
    if inputs.iter().any(|v| !v.is_finite()) || tick_rate <= 0.0 {
        trace!(
            muzzle_speed,
            gravity,
            tick_rate,
            pitch,
            "TRAJECTORY_INVALID_INPUT: 非有限な弾道パラメータのため空の弾道を返します"
        );
        return TrajectoryIter::empty();
    }

    let dt = 1.0 / tick_rate;
    TrajectoryIter {
        vx: muzzle_speed * pitch.cos(),
        vy: -muzzle_speed * pitch.sin(),
        x: 0.0,
        y: 0.0,
        dt,
        gravity,
        steps_left: max_steps,
        max_range,
        done: false,
    }
}

/// 指定ピッチでの最大水平到達距離を求める
///
/// 到達距離は最初の地面交差点（高さ ≤ 0 となる最初の点）の水平距離とします。
/// ステップ上限内で交差しない場合は最終点の水平距離を返します。
/// 弾道が空の場合はNoneを返します。
pub fn horizontal_reach(
    muzzle_speed: f64,
    gravity: f64,
    tick_rate: f64,
    pitch: f64,
    max_range: f64,
) -> Option<f64> {
    let mut last = None;
    for point in simulate(
        muzzle_speed,
        gravity,
        tick_rate,
        pitch,
        DEFAULT_MAX_STEPS,
        max_range,
    ) {
        if point.height <= 0.0 {
            return Some(point.distance);
        }
        last = Some(point.distance);
    }
    last
}

/// 目標水平距離に着弾するピッチを探索する（逆方向クエリ）
///
/// [min_pitch, max_pitch] の範囲を固定刻みで走査し、シミュレーションした
/// 到達距離が目標に最も近いピッチを返します。誤差が許容値を超える場合は
/// None（到達不能）を返します。
///
/// # 引数
///
/// * `muzzle_speed` - 初速（m/s）
/// * `gravity` - 重力加速度（m/s²）
/// * `tick_rate` - サーバーティックレート（Hz）
/// * `min_pitch` - ピッチ下限（ラジアン）
/// * `max_pitch` - ピッチ上限（ラジアン）
/// * `target_range` - 目標水平距離（m）
/// * `tolerance` - 着弾距離の許容誤差（m）
///
/// # 戻り値
///
/// 許容誤差内で目標に着弾するピッチ、存在しない場合はNone
pub fn solve_pitch_for_range(
    muzzle_speed: f64,
    gravity: f64,
    tick_rate: f64,
    min_pitch: f64,
    max_pitch: f64,
    target_range: f64,
    tolerance: f64,
) -> Option<f64> {
    let inputs = [
        muzzle_speed,
        gravity,
        tick_rate,
        min_pitch,
        max_pitch,
        target_range,
        tolerance,
    ];
    if inputs.iter().any(|v| !v.is_finite()) || min_pitch > max_pitch || target_range <= 0.0 {
        return None;
    }

    // 目標より先の弾道は評価不要（打ち切り距離は目標の2倍で十分）
    let sim_max_range = target_range * 2.0;

    let mut best: Option<(f64, f64)> = None; // (pitch, 誤差)
    let steps = ((max_pitch - min_pitch) / PITCH_SCAN_STEP_RAD).ceil() as usize;
    for i in 0..=steps {
        let pitch = (min_pitch + i as f64 * PITCH_SCAN_STEP_RAD).min(max_pitch);
        if let Some(reach) = horizontal_reach(muzzle_speed, gravity, tick_rate, pitch, sim_max_range)
        {
            let error = (reach - target_range).abs();
            if best.is_none_or(|(_, best_error)| error < best_error) {
                best = Some((pitch, error));
            }
        }
    }

    match best {
        Some((pitch, error)) if error <= tolerance => {
            trace!(
                pitch,
                error,
                target_range,
                "PITCH_SOLVED: 目標距離に対するピッチ解を発見しました"
            );
            Some(pitch)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_simulate_matches_hand_computed_points() {
        // pitch=0, gravity=18, speed=30, tick_rate=5 → dt=0.2
        // step1: vy=-3.6, x=6,  y=-0.72
        // step2: vy=-7.2, x=12, y=-2.16
        // step3: vy=-10.8, x=18, y=-4.32
        let points: Vec<TrajectoryPoint> =
            simulate(30.0, 18.0, 5.0, 0.0, DEFAULT_MAX_STEPS, 1000.0)
                .take(3)
                .collect();
        assert_eq!(points.len(), 3);

        let expected = [(6.0, -0.72), (12.0, -2.16), (18.0, -4.32)];
        for (point, (x, y)) in points.iter().zip(expected) {
            assert!((point.distance - x).abs() < 1e-6);
            assert!((point.height - y).abs() < 1e-6);
        }
    }

    #[test]
    fn test_simulate_nonfinite_input_yields_empty() {
        assert_eq!(
            simulate(f64::NAN, 18.0, 5.0, 0.0, DEFAULT_MAX_STEPS, 1000.0).count(),
            0
        );
        assert_eq!(
            simulate(30.0, f64::INFINITY, 5.0, 0.0, DEFAULT_MAX_STEPS, 1000.0).count(),
            0
        );
        assert_eq!(
            simulate(30.0, 18.0, 5.0, f64::NAN, DEFAULT_MAX_STEPS, 1000.0).count(),
            0
        );
    }

    #[test]
    fn test_simulate_distance_strictly_increasing() {
        for pitch in [-1.4, -0.8, -0.3, 0.0, 0.4, 1.2] {
            let mut previous = 0.0;
            let mut count = 0;
            for point in simulate(30.0, 18.0, 5.0, pitch, DEFAULT_MAX_STEPS, 10_000.0) {
                assert!(
                    point.distance > previous,
                    "pitch={} で水平距離が前進していません",
                    pitch
                );
                previous = point.distance;
                count += 1;
            }
            assert!(count > 0, "pitch={} で弾道が空です", pitch);
        }
    }

    #[test]
    fn test_simulate_terminates_on_max_range() {
        let points: Vec<TrajectoryPoint> =
            simulate(30.0, 18.0, 5.0, 0.0, DEFAULT_MAX_STEPS, 20.0).collect();
        // x = 6, 12, 18, 24 → 24で打ち切り
        assert_eq!(points.len(), 4);
        assert!(points.last().unwrap().distance > 20.0);
    }

    #[test]
    fn test_simulate_vertical_pitch_terminates() {
        // 真上/後方向き（vx ≤ 0）は前進しないため即終了
        assert_eq!(
            simulate(30.0, 18.0, 5.0, -PI / 2.0, DEFAULT_MAX_STEPS, 1000.0).count(),
            0
        );
        assert_eq!(
            simulate(30.0, 18.0, 5.0, PI / 2.0 + 0.5, DEFAULT_MAX_STEPS, 1000.0).count(),
            0
        );
    }

    #[test]
    fn test_horizontal_reach_upward_pitch_flies_farther() {
        // 45度上向き付近が最長射程。浅い上向きより遠くへ届く。
        let near_optimal = horizontal_reach(30.0, 18.0, 5.0, -0.8, 10_000.0).unwrap();
        let shallow = horizontal_reach(30.0, 18.0, 5.0, -0.1, 10_000.0).unwrap();
        assert!(near_optimal > shallow);
    }

    #[test]
    fn test_solve_pitch_for_range_recovers_known_pitch() {
        // 0.3 radの到達距離を目標にすると、0.3 rad近傍の解が返る
        let target = horizontal_reach(30.0, 18.0, 5.0, 0.3, 10_000.0).unwrap();
        let solved =
            solve_pitch_for_range(30.0, 18.0, 5.0, -1.4, 0.8, target, 1.0).expect("解があるはず");
        assert!((solved - 0.3).abs() < 1e-3);
    }

    #[test]
    fn test_solve_pitch_for_range_unreachable() {
        // 初速30 m/sでは10kmに届くピッチは存在しない
        assert!(solve_pitch_for_range(30.0, 18.0, 5.0, -1.4, 0.8, 10_000.0, 1.0).is_none());
    }

    #[test]
    fn test_solve_pitch_for_range_nonfinite_input() {
        assert!(solve_pitch_for_range(f64::NAN, 18.0, 5.0, -1.4, 0.8, 40.0, 1.0).is_none());
        // 範囲が逆転している場合もNone
        assert!(solve_pitch_for_range(30.0, 18.0, 5.0, 0.8, -1.4, 40.0, 1.0).is_none());
    }

    #[test]
    fn test_trajectory_iter_is_restartable() {
        let iter = simulate(30.0, 18.0, 5.0, -0.4, DEFAULT_MAX_STEPS, 1000.0);
        let first_pass: Vec<TrajectoryPoint> = iter.clone().take(5).collect();
        let second_pass: Vec<TrajectoryPoint> = iter.take(5).collect();
        assert_eq!(first_pass, second_pass);
    }
}
