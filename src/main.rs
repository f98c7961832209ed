mod bot;
mod logging;
mod models;
mod scenario;
mod simulation;

use clap::{Arg, Command};
use logging::{init_logging, LogConfig, LogOutput};
use models::ballistics::{self, DEFAULT_MAX_STEPS};
use scenario::ScenarioConfig;
use simulation::SimulationEngine;
use tracing::Level;

/// コマンドライン定義を構築
fn build_cli() -> Command {
    Command::new("tankbot")
        .version("0.1.0")
        .about("タンクボット意思決定コア (Tank Bot Decision Core)")
        .long_about("ティック駆動型対戦アリーナ向けの戦車ボット意思決定コア\n\
                     オフラインシミュレーションハーネスで交戦判断の評価を行います。")
        .arg(
            Arg::new("scenario")
                .short('s')
                .long("scenario")
                .value_name("FILE")
                .help("シナリオファイル(.yaml)のパスを指定")
                .long_help("実行するシナリオファイル(.yaml)のパスを指定します。\n\
                           指定しない場合、利用方法の一覧が表示されます。")
        )
        .arg(
            Arg::new("info")
                .short('i')
                .long("info")
                .action(clap::ArgAction::SetTrue)
                .help("シナリオの情報のみ表示して終了")
                .conflicts_with("arc")
        )
        .arg(
            Arg::new("arc")
                .short('a')
                .long("arc")
                .action(clap::ArgAction::SetTrue)
                .help("弾道プレビューを表示")
                .conflicts_with("info")
        )
        .arg(
            Arg::new("pitch")
                .long("pitch")
                .value_name("RAD")
                .allow_negative_numbers(true)
                .default_value("-0.8")
                .help("弾道プレビューの砲身ピッチ (ラジアン、負=上向き)")
        )
        .arg(
            Arg::new("speed")
                .long("speed")
                .value_name("MPS")
                .default_value("30")
                .help("弾道プレビューの初速 (m/s)")
        )
        .arg(
            Arg::new("gravity")
                .long("gravity")
                .value_name("MPS2")
                .default_value("18")
                .help("弾道プレビューの重力加速度 (m/s²)")
        )
        .arg(
            Arg::new("tick-rate")
                .long("tick-rate")
                .value_name("HZ")
                .default_value("5")
                .help("弾道プレビューのティックレート (Hz)")
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(clap::ArgAction::Count)
                .help("詳細出力レベル (-v: 基本, -vv: 詳細, -vvv: デバッグ)")
        )
        .arg(
            Arg::new("log")
                .long("log")
                .value_name("OUTPUT")
                .default_value("console")
                .help("ログ出力先 (console, file, both)")
        )
        .arg(
            Arg::new("log-dir")
                .long("log-dir")
                .value_name("DIR")
                .default_value("logs")
                .help("ログファイルの出力ディレクトリ (file/both時に使用)")
        )
}

fn main() {
    // コマンドライン引数の解析
    let matches = build_cli().get_matches();

    // 詳細レベルに応じたログ初期化
    let verbose_level = matches.get_count("verbose");
    let log_level = match verbose_level {
        0 | 1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let log_output = matches
        .get_one::<String>("log")
        .and_then(|s| s.parse::<LogOutput>().ok())
        .unwrap_or(LogOutput::Console);
    let log_dir = matches
        .get_one::<String>("log-dir")
        .cloned()
        .unwrap_or_else(|| "logs".to_string());
    if let Err(e) = init_logging(LogConfig {
        level: log_level,
        output: log_output,
        log_dir,
        ..LogConfig::default()
    }) {
        eprintln!("ログ初期化エラー: {}", e);
        std::process::exit(1);
    }

    println!("タンクボット意思決定コア (Tank Bot Decision Core) - tankbot v0.1.0");
    println!();

    if verbose_level > 0 {
        println!("詳細出力レベル: {}", verbose_level);
    }

    // 弾道プレビューモード
    if matches.get_flag("arc") {
        let pitch = parse_f64_arg(&matches, "pitch");
        let speed = parse_f64_arg(&matches, "speed");
        let gravity = parse_f64_arg(&matches, "gravity");
        let tick_rate = parse_f64_arg(&matches, "tick-rate");
        preview_arc(speed, gravity, tick_rate, pitch);
        return;
    }

    // シナリオファイルの処理
    if let Some(scenario_path) = matches.get_one::<String>("scenario") {
        match run_scenario(scenario_path, matches.get_flag("info"), verbose_level) {
            Ok(_) => {
                if verbose_level > 0 {
                    println!("シナリオ実行が正常に完了しました。");
                }
            }
            Err(e) => {
                eprintln!("エラー: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        // デフォルト動作: 利用方法の一覧を表示
        show_default_help();
    }
}

fn parse_f64_arg(matches: &clap::ArgMatches, name: &str) -> f64 {
    let raw = matches
        .get_one::<String>(name)
        .expect("default value is set");
    match raw.parse::<f64>() {
        Ok(value) => value,
        Err(_) => {
            eprintln!("エラー: --{} の値が数値ではありません: {}", name, raw);
            std::process::exit(1);
        }
    }
}

/// 弾道プレビューを表示
///
/// 指定パラメータでの弾道を積分し、距離と高度の一覧を出力します。
fn preview_arc(muzzle_speed: f64, gravity: f64, tick_rate: f64, pitch: f64) {
    println!("=== 弾道プレビュー ===");
    println!("初速: {:.1} m/s", muzzle_speed);
    println!("重力: {:.1} m/s²", gravity);
    println!("ティックレート: {:.1} Hz", tick_rate);
    println!("砲身ピッチ: {:.3} rad", pitch);
    println!();

    let trajectory = ballistics::simulate(
        muzzle_speed,
        gravity,
        tick_rate,
        pitch,
        DEFAULT_MAX_STEPS,
        1.0e9,
    );

    println!("{:>6} {:>12} {:>12}", "ステップ", "距離(m)", "高度(m)");
    let mut landed_at = None;
    for (step, point) in trajectory.enumerate() {
        println!("{:>6} {:>12.2} {:>12.2}", step + 1, point.distance, point.height);
        if point.height <= 0.0 {
            landed_at = Some(point.distance);
            break;
        }
    }

    println!();
    match landed_at {
        Some(distance) => println!("着弾距離: {:.2} m", distance),
        None => println!("最大ステップ数内に着弾しませんでした"),
    }
}

/// シナリオファイルを読み込んで実行
fn run_scenario(
    scenario_path: &str,
    info_only: bool,
    verbose_level: u8,
) -> Result<(), Box<dyn std::error::Error>> {
    // シナリオファイルの読み込み
    let scenario = ScenarioConfig::from_file(scenario_path)?;

    if verbose_level > 0 {
        println!("シナリオファイル読み込み完了: {}", scenario_path);
    }

    // 情報表示のみの場合
    if info_only {
        scenario.print_summary();
        return Ok(());
    }

    // シナリオ実行
    execute_scenario(scenario, verbose_level)?;

    Ok(())
}

/// シナリオの実行
fn execute_scenario(
    scenario: ScenarioConfig,
    verbose_level: u8,
) -> Result<(), Box<dyn std::error::Error>> {
    // 基本情報表示
    scenario.print_summary();
    println!();

    if verbose_level > 0 {
        println!("シミュレーション設定:");
        println!("  ティックレート: {:.1} Hz", scenario.sim.tick_rate_hz);
        println!("  最大時間: {:.1}秒", scenario.sim.t_max_s);
        println!();
    }

    // シミュレーションエンジンの作成と初期化
    let mut simulation = SimulationEngine::new(scenario, verbose_level);
    simulation.initialize()?;

    // シミュレーション実行
    simulation.run()?;

    Ok(())
}

/// デフォルトヘルプとシナリオ一覧を表示
fn show_default_help() {
    println!("使用方法:");
    println!("  tankbot [オプション]");
    println!();
    println!("オプション:");
    println!("  -s, --scenario <FILE>  シナリオファイルを指定して実行");
    println!("  -i, --info             シナリオ情報のみ表示");
    println!("  -a, --arc              弾道プレビューを表示");
    println!("  -v, --verbose          詳細出力 (複数指定で詳細レベル上昇)");
    println!("      --log <OUTPUT>     ログ出力先 (console, file, both)");
    println!("      --log-dir <DIR>    ログファイルの出力ディレクトリ");
    println!("  -h, --help             このヘルプを表示");
    println!();
    println!("利用可能なシナリオファイル:");
    println!("  scenarios/scenario_skirmish.yaml   - 直接射撃の基本シナリオ");
    println!("  scenarios/scenario_artillery.yaml  - 曲射砲撃シナリオ");
    println!();
    println!("例:");
    println!("  tankbot -s scenarios/scenario_skirmish.yaml");
    println!("  tankbot -s scenarios/scenario_artillery.yaml -v");
    println!("  tankbot -s scenarios/scenario_skirmish.yaml -i");
    println!("  tankbot --arc --pitch -0.6 --speed 30");
}
