// 基本的なデータ型と数学ユーティリティ
pub mod common;

// 外部アダプタとのインターフェース（trait）定義
pub mod traits;

// 戦闘イベントメッセージの型定義
pub mod messages;

// 意思決定コアの各コンポーネント
pub mod aim;
pub mod ballistics;
pub mod engagement;
pub mod targeting;

// 便利な re-export
pub use common::*;
pub use traits::*;
pub use messages::{ArmorSide, MessageContainer, MessagePayload, MessageTarget};
pub use aim::{aim_at_position, orientation_towards, step_towards, AimStep};
pub use ballistics::{
    horizontal_reach, simulate, solve_pitch_for_range, TrajectoryIter, TrajectoryPoint,
};
pub use engagement::{
    evaluate, EngagementContext, EngagementDecision, HoldFireReason, Movement, TickPlan,
};
pub use targeting::select_nearest;
