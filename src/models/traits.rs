use crate::models::common::{EntityState, Vec3};
use crate::models::messages::{MessageContainer, MessagePayload, MessageTarget};
use crate::scenario::TankProfile;

/// 移動方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Forward,
    Backward,
}

/// ゲームワールドの読み取りインターフェース
///
/// 外部アダプタが毎ティック提供するスナップショットへのアクセスです。
/// コアはここから読むだけで、ワールド状態を直接書き換えません。
pub trait IWorld {
    /// 自分自身の現在スナップショット
    fn self_state(&self) -> &EntityState;

    /// 指定IDのエンティティのスナップショット
    fn entity_state(&self, id: &str) -> Option<&EntityState>;

    /// 可視の敵スナップショット一覧
    fn visible_enemies(&self) -> &[EntityState];

    /// 自ユニットの静的性能パラメータ
    fn profile(&self) -> &TankProfile;

    /// 重力加速度（m/s²）
    fn gravity(&self) -> f64;

    /// サーバーティックレート（Hz）
    fn tick_rate(&self) -> f64;

    /// 自チームのメンバーID一覧（自分を除く）
    fn team_members(&self) -> &[String];

    /// 敵チームのメンバーID一覧
    fn enemy_members(&self) -> &[String];

    /// このティックの受信メッセージを取り出す
    fn drain_messages(&mut self) -> Vec<MessageContainer>;
}

/// 行動出力インターフェース
///
/// コアが1ティック分の意図（回転・移動・射撃・メッセージ送信）を
/// 書き込む先です。実際のワールド状態への適用は外部アダプタが行います。
pub trait IActionSink {
    /// 車体を回転させる（ラジアン、正=反時計回り）
    fn rotate_body(&mut self, delta_rad: f64);

    /// 砲塔ヨーを回転させる
    fn rotate_turret_yaw(&mut self, delta_rad: f64);

    /// 砲塔ピッチを回転させる（正=下向き）
    fn rotate_turret_pitch(&mut self, delta_rad: f64);

    /// 車体方向に沿って移動する
    fn move_direction(&mut self, direction: MoveDirection);

    /// 指定地点へ向かって移動する
    ///
    /// `strafe`がtrueの場合、車体の向きを変えずに平行移動します。
    fn move_towards(&mut self, direction: MoveDirection, point: Vec3, strafe: bool);

    /// 射撃可能かどうか（クールダウン等の合法性チェック）
    fn can_shoot(&self) -> bool;

    /// 射撃する。クールダウン中など不正な場合はfalseを返す。
    fn shoot(&mut self) -> bool;

    /// メッセージを送信する
    fn send(&mut self, target: MessageTarget, payload: MessagePayload);
}
