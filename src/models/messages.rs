//! # Messages モジュール
//!
//! 外部アダプタとやり取りする戦闘イベントメッセージの型定義を提供します。
//!
//! 受信メッセージはコアの判断分岐には使われず、テレメトリ（ログ出力）
//! のみに使用されます。未知のタグは失敗せず無視されます（ログのみ）。

/// 装甲面（被弾面）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmorSide {
    Front,
    Rear,
    Left,
    Right,
}

impl std::fmt::Display for ArmorSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ArmorSide::Front => "front",
            ArmorSide::Rear => "rear",
            ArmorSide::Left => "left",
            ArmorSide::Right => "right",
        };
        write!(f, "{}", name)
    }
}

/// メッセージの宛先
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageTarget {
    /// 特定のクライアント
    Client(String),
    /// 自チーム全体
    Team,
    /// 敵チーム全体
    EnemyTeam,
    /// サーバーのみ
    Server,
}

/// 戦闘イベントメッセージのペイロード（タグ付き共用体）
#[derive(Debug, Clone)]
pub enum MessagePayload {
    /// 自分の砲弾が敵に命中した
    Hit {
        hit_entity: String,
        hit_side: ArmorSide,
        damage_dealt: f64,
    },
    /// 自分が被弾した
    GotHit {
        shooter_entity: String,
        hit_side: ArmorSide,
        damage_received: f64,
    },
    /// チームが得点した
    TeamScored { team: String, score: u32 },
    /// 汎用テキストメッセージ
    Text { text: String },
    /// 未知のタグ（ログして無視する）
    Unknown { tag: String },
}

/// メッセージコンテナ（宛先 + ペイロード）
#[derive(Debug, Clone)]
pub struct MessageContainer {
    pub target: MessageTarget,
    pub payload: MessagePayload,
}

impl MessageContainer {
    pub fn new(target: MessageTarget, payload: MessagePayload) -> Self {
        Self { target, payload }
    }
}
