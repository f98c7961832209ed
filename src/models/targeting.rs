//! # Targeting モジュール
//!
//! 可視の敵スナップショットから交戦対象を選定します。
//!
//! 選定は毎ティック新しいスナップショットに対して決定的に再評価される
//! 純粋関数で、状態は持ちません。対象が見つからないことは正常な結果
//! （NoTarget）であり、エラーではありません。

use crate::models::common::EntityState;

/// 最も近い有効な敵を選定する
///
/// 死亡している・位置が不明・自分自身であるエンティティを除外し、
/// 残りから自位置へのユークリッド距離が最小のものを返します。
/// 同距離の場合はID昇順で決定的に選びます。
///
/// # 引数
///
/// * `self_state` - 自分自身のスナップショット
/// * `candidates` - 可視の敵スナップショットのスライス
///
/// # 戻り値
///
/// 最近傍の敵への参照。有効な候補が存在しない場合はNone。
pub fn select_nearest<'a>(
    self_state: &EntityState,
    candidates: &'a [EntityState],
) -> Option<&'a EntityState> {
    let self_position = self_state.position?;

    candidates
        .iter()
        .filter(|candidate| candidate.alive && candidate.id != self_state.id)
        .filter_map(|candidate| {
            candidate
                .position
                .map(|position| (candidate, self_position.distance(&position)))
        })
        .min_by(|(a, dist_a), (b, dist_b)| {
            dist_a
                .partial_cmp(dist_b)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        })
        .map(|(candidate, _)| candidate)
}
