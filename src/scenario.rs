use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::models::messages::ArmorSide;

/// シナリオメタデータ
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScenarioMeta {
    pub version: String,
    pub name: String,
    pub description: String,
}

/// シミュレーション設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulationConfig {
    /// サーバーティックレート（Hz）
    pub tick_rate_hz: f64,
    /// 最大シミュレーション時間（秒）
    pub t_max_s: f64,
}

/// 世界設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorldConfig {
    /// 重力加速度（m/s²）
    pub gravity_mps2: f64,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct PositionConfig {
    pub x_m: f64,
    pub y_m: f64,
    pub z_m: f64,
}

/// 射撃モード
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FireMode {
    /// 直接照準射撃（目標に砲塔を直接向ける）
    Direct,
    /// 間接射撃（弾道計算でピッチを解いて曲射する）
    Indirect,
}

/// 面ごとの装甲値（0.0〜1.0、被ダメージ軽減率）
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct ArmorProfile {
    pub front: f64,
    pub rear: f64,
    pub left: f64,
    pub right: f64,
}

impl ArmorProfile {
    /// 指定面の装甲値を取得
    pub fn value(&self, side: ArmorSide) -> f64 {
        match side {
            ArmorSide::Front => self.front,
            ArmorSide::Rear => self.rear,
            ArmorSide::Left => self.left,
            ArmorSide::Right => self.right,
        }
    }
}

/// 戦車の静的性能パラメータ
///
/// エージェントの寿命の間は不変です。回転速度はすべて1ティックあたりの
/// ラジアンで表します。
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TankProfile {
    /// 車体の最大回転量（rad/tick）
    pub body_rotation_speed_rad: f64,
    /// 砲塔ヨーの最大回転量（rad/tick）
    pub turret_yaw_speed_rad: f64,
    /// 砲塔ピッチの最大回転量（rad/tick）
    pub turret_pitch_speed_rad: f64,
    /// 砲塔ピッチ下限（ラジアン、負=上向き）
    pub turret_min_pitch_rad: f64,
    /// 砲塔ピッチ上限（ラジアン、正=下向き）
    pub turret_max_pitch_rad: f64,
    /// 砲弾の初速（m/s）
    pub muzzle_speed_mps: f64,
    /// 面ごとの装甲値
    pub armor: ArmorProfile,
    /// 砲弾の基礎ダメージ
    pub projectile_damage: f64,
    /// 交戦レンジ下限（m）
    pub min_attack_range_m: f64,
    /// 交戦レンジ上限（m）
    pub max_attack_range_m: f64,
    /// 射撃モード
    pub fire_mode: FireMode,
    /// 射撃クールダウン（秒、アダプタ側の射撃可否判定に使用）
    pub shoot_cooldown_s: f64,
    /// 走行速度（m/s）
    pub move_speed_mps: f64,
    /// 最大体力
    pub max_health: f64,
}

/// ボット設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BotConfig {
    pub id: String,
    pub spawn: PositionConfig,
    pub profile: TankProfile,
}

/// 敵ユニット設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EnemyConfig {
    pub id: String,
    pub spawn: PositionConfig,
    /// ボットへ向かう走行速度（m/s、0で静止）
    pub speed_mps: f64,
    pub health: f64,
}

/// 完全なシナリオ設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScenarioConfig {
    pub meta: ScenarioMeta,
    pub sim: SimulationConfig,
    pub world: WorldConfig,
    pub bot: BotConfig,
    pub enemies: Vec<EnemyConfig>,
}

impl ScenarioConfig {
    /// YAMLファイルからシナリオ設定を読み込み
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();

        // ファイル存在チェック
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.to_path_buf()));
        }

        // ファイル読み込み
        let contents =
            fs::read_to_string(path).map_err(|e| ScenarioError::IoError(path.to_path_buf(), e))?;

        // YAML解析
        let config: ScenarioConfig = serde_yaml::from_str(&contents)
            .map_err(|e| ScenarioError::ParseError(path.to_path_buf(), e))?;

        // 基本的な検証
        config.validate()?;

        Ok(config)
    }

    /// 設定の基本的な検証
    pub fn validate(&self) -> Result<(), ScenarioError> {
        // 時間設定の検証
        if self.sim.tick_rate_hz <= 0.0 {
            return Err(ScenarioError::ValidationError(
                "tick_rate_hz must be positive".to_string(),
            ));
        }
        if self.sim.t_max_s <= 0.0 {
            return Err(ScenarioError::ValidationError(
                "t_max_s must be positive".to_string(),
            ));
        }

        // 重力の検証
        if self.world.gravity_mps2 <= 0.0 {
            return Err(ScenarioError::ValidationError(
                "gravity_mps2 must be positive".to_string(),
            ));
        }

        let profile = &self.bot.profile;

        // 回転速度の検証
        if profile.body_rotation_speed_rad <= 0.0
            || profile.turret_yaw_speed_rad <= 0.0
            || profile.turret_pitch_speed_rad <= 0.0
        {
            return Err(ScenarioError::ValidationError(
                "rotation speeds must be positive".to_string(),
            ));
        }

        // ピッチ範囲の検証
        if profile.turret_min_pitch_rad >= profile.turret_max_pitch_rad {
            return Err(ScenarioError::ValidationError(format!(
                "invalid pitch bounds: min {} >= max {}",
                profile.turret_min_pitch_rad, profile.turret_max_pitch_rad
            )));
        }

        // 交戦レンジの検証
        if profile.min_attack_range_m < 0.0
            || profile.min_attack_range_m > profile.max_attack_range_m
        {
            return Err(ScenarioError::ValidationError(format!(
                "invalid attack range band: [{}, {}]",
                profile.min_attack_range_m, profile.max_attack_range_m
            )));
        }

        // 初速の検証
        if profile.muzzle_speed_mps <= 0.0 {
            return Err(ScenarioError::ValidationError(
                "muzzle_speed_mps must be positive".to_string(),
            ));
        }

        // 敵IDの一意性検証
        for (i, enemy) in self.enemies.iter().enumerate() {
            if self.enemies[..i].iter().any(|other| other.id == enemy.id) {
                return Err(ScenarioError::ValidationError(format!(
                    "duplicate enemy id: {}",
                    enemy.id
                )));
            }
            if enemy.id == self.bot.id {
                return Err(ScenarioError::ValidationError(format!(
                    "enemy id collides with bot id: {}",
                    enemy.id
                )));
            }
        }

        Ok(())
    }

    /// シナリオの概要を表示
    pub fn print_summary(&self) {
        println!("=== シナリオ情報 ===");
        println!("名前: {}", self.meta.name);
        println!("説明: {}", self.meta.description);
        println!("バージョン: {}", self.meta.version);
        println!();

        println!("=== シミュレーション設定 ===");
        println!("ティックレート: {:.1} Hz", self.sim.tick_rate_hz);
        println!("最大時間: {:.1}秒", self.sim.t_max_s);
        println!("重力: {:.1} m/s²", self.world.gravity_mps2);
        println!();

        let profile = &self.bot.profile;
        println!("=== ボット ===");
        println!("ID: {}", self.bot.id);
        println!("射撃モード: {:?}", profile.fire_mode);
        println!(
            "交戦レンジ: {:.0}〜{:.0} m",
            profile.min_attack_range_m, profile.max_attack_range_m
        );
        println!(
            "砲塔ピッチ範囲: {:.2}〜{:.2} rad",
            profile.turret_min_pitch_rad, profile.turret_max_pitch_rad
        );
        println!("初速: {:.1} m/s", profile.muzzle_speed_mps);
        println!();

        println!("=== 敵ユニット ===");
        println!("敵数: {}機", self.enemies.len());
        for enemy in &self.enemies {
            println!(
                "  {}: 位置({:.0}, {:.0}) 速度{:.1} m/s 体力{:.0}",
                enemy.id, enemy.spawn.x_m, enemy.spawn.y_m, enemy.speed_mps, enemy.health
            );
        }
    }
}

/// シナリオ読み込みエラー
#[derive(Debug)]
pub enum ScenarioError {
    FileNotFound(std::path::PathBuf),
    IoError(std::path::PathBuf, std::io::Error),
    ParseError(std::path::PathBuf, serde_yaml::Error),
    ValidationError(String),
}

impl std::fmt::Display for ScenarioError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScenarioError::FileNotFound(path) => {
                write!(f, "シナリオファイルが見つかりません: {}", path.display())
            }
            ScenarioError::IoError(path, err) => {
                write!(f, "ファイル読み込みエラー {}: {}", path.display(), err)
            }
            ScenarioError::ParseError(path, err) => {
                write!(f, "YAML解析エラー {}: {}", path.display(), err)
            }
            ScenarioError::ValidationError(msg) => {
                write!(f, "設定検証エラー: {}", msg)
            }
        }
    }
}

impl std::error::Error for ScenarioError {}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn sample_yaml() -> &'static str {
        r#"
meta:
  version: "1.0"
  name: "test"
  description: "unit test scenario"
sim:
  tick_rate_hz: 5.0
  t_max_s: 60.0
world:
  gravity_mps2: 18.0
bot:
  id: "B001"
  spawn: { x_m: 0.0, y_m: 0.0, z_m: 0.0 }
  profile:
    body_rotation_speed_rad: 0.1
    turret_yaw_speed_rad: 0.2
    turret_pitch_speed_rad: 0.1
    turret_min_pitch_rad: -1.4
    turret_max_pitch_rad: 0.8
    muzzle_speed_mps: 30.0
    armor: { front: 0.5, rear: 0.1, left: 0.3, right: 0.3 }
    projectile_damage: 20.0
    min_attack_range_m: 10.0
    max_attack_range_m: 50.0
    fire_mode: direct
    shoot_cooldown_s: 1.0
    move_speed_mps: 5.0
    max_health: 100.0
enemies:
  - id: "E001"
    spawn: { x_m: 30.0, y_m: 0.0, z_m: 0.0 }
    speed_mps: 0.0
    health: 40.0
"#
    }

    fn parse_sample() -> ScenarioConfig {
        serde_yaml::from_str(sample_yaml()).expect("サンプルYAMLが解析できません")
    }

    #[test]
    fn test_parse_and_validate_sample() {
        let config = parse_sample();
        assert!(config.validate().is_ok());
        assert_eq!(config.bot.profile.fire_mode, FireMode::Direct);
        assert_eq!(config.enemies.len(), 1);
    }

    #[test]
    fn test_validate_rejects_bad_tick_rate() {
        let mut config = parse_sample();
        config.sim.tick_rate_hz = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_pitch_bounds() {
        let mut config = parse_sample();
        config.bot.profile.turret_min_pitch_rad = 1.0;
        config.bot.profile.turret_max_pitch_rad = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_range_band() {
        let mut config = parse_sample();
        config.bot.profile.min_attack_range_m = 100.0;
        config.bot.profile.max_attack_range_m = 50.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_enemy_ids() {
        let mut config = parse_sample();
        let duplicated = config.enemies[0].clone();
        config.enemies.push(duplicated);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_armor_profile_lookup() {
        let config = parse_sample();
        let armor = config.bot.profile.armor;
        assert_eq!(armor.value(crate::models::messages::ArmorSide::Front), 0.5);
        assert_eq!(armor.value(crate::models::messages::ArmorSide::Rear), 0.1);
    }

    #[test]
    fn test_missing_file_error() {
        let result = ScenarioConfig::from_file("scenarios/does_not_exist.yaml");
        assert!(matches!(result, Err(ScenarioError::FileNotFound(_))));
    }
}
