use std::ops::{Add, Sub, Mul};

/// 3次元ベクトル（位置・方向）を表す構造体
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec3 {
    pub x: f64, // m
    pub y: f64, // m
    pub z: f64, // m (高さ)
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// 3次元距離を計算
    pub fn distance(&self, other: &Vec3) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2) + (self.z - other.z).powi(2))
            .sqrt()
    }

    /// XY平面での2次元距離を計算（弾道計算の水平距離に使用）
    pub fn distance_xy(&self, other: &Vec3) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// ベクトルの長さ（原点からの距離）
    pub fn magnitude(&self) -> f64 {
        (self.x.powi(2) + self.y.powi(2) + self.z.powi(2)).sqrt()
    }

    /// ベクトルを正規化（長さゼロの場合はそのまま返す）
    pub fn normalize(&self) -> Self {
        let mag = self.magnitude();
        if mag > 0.0 {
            Self::new(self.x / mag, self.y / mag, self.z / mag)
        } else {
            *self
        }
    }
}

impl Add for Vec3 {
    type Output = Self;

    fn add(self, other: Self) -> Self::Output {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;

    fn sub(self, other: Self) -> Self::Output {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Self;

    fn mul(self, scalar: f64) -> Self::Output {
        Self::new(self.x * scalar, self.y * scalar, self.z * scalar)
    }
}

/// 姿勢（ヨー・ピッチ・ロール、ラジアン）
///
/// ピッチの符号規約: 0 = 水平、正 = 砲身下向き、負 = 上向き。
/// ヨーは±πでラップし、ピッチはラップしない。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Orientation {
    /// ヨー角（水平方向、ラジアン）
    pub yaw: f64,
    /// ピッチ角（上下方向、ラジアン）
    pub pitch: f64,
    /// ロール角（ラジアン、本システムでは常にほぼ0）
    pub roll: f64,
}

impl Orientation {
    pub fn new(yaw: f64, pitch: f64) -> Self {
        Self { yaw, pitch, roll: 0.0 }
    }
}

/// エンティティの1ティック分のスナップショット
///
/// 外部アダプタが毎ティック生成する読み取り専用の状態です。
/// コアはこれを読むだけで、決して書き換えません。
#[derive(Debug, Clone)]
pub struct EntityState {
    /// エンティティの一意識別子
    pub id: String,
    /// 生存フラグ
    pub alive: bool,
    /// 車体位置（不明な場合はNone）
    pub position: Option<Vec3>,
    /// 車体の姿勢
    pub body: Orientation,
    /// 砲塔の姿勢
    pub turret: Orientation,
    /// 現在の体力
    pub health: f64,
}

impl EntityState {
    pub fn new(id: String, position: Vec3) -> Self {
        Self {
            id,
            alive: true,
            position: Some(position),
            body: Orientation::default(),
            turret: Orientation::default(),
            health: 0.0, // 外部アダプタが設定
        }
    }
}

/// 数学ユーティリティ関数
pub mod math_utils {
    use std::f64::consts::{PI, TAU};

    /// 角度を-π〜πの範囲に正規化
    pub fn normalize_angle(angle_rad: f64) -> f64 {
        let normalized = (angle_rad + PI).rem_euclid(TAU) - PI;
        if normalized <= -PI {
            normalized + TAU
        } else {
            normalized
        }
    }

    /// 2つの角度の最短差を計算（-π〜πの範囲）
    pub fn angle_difference(from_rad: f64, to_rad: f64) -> f64 {
        normalize_angle(to_rad - from_rad)
    }
}
