//! gridcsv - GRIDDED DATA TO CSV CONVERTER
//!
//! 메인 엔트리포인트

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};

use gridcsv::{
    batch::{BatchEvent, BatchRunner},
    cli::{split_list, Args, Command, ConvertArgs, InspectArgs, RegistryAction, RegistryArgs},
    dataset::BackendRegistry,
    registry::{self, RegistryClient},
    stats::format_duration,
};

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    match args.command {
        Command::Convert(convert) => run_convert(&convert, args.verbose),
        Command::Inspect(inspect) => run_inspect(&inspect),
        Command::Registry(registry) => run_registry(&registry),
    }
}

/// 로그 초기화 (기본 info, `-v`이면 debug, RUST_LOG가 있으면 우선)
fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

/// 변환 명령 실행
fn run_convert(args: &ConvertArgs, verbose: bool) -> Result<()> {
    let base_dir = std::env::current_dir().context("현재 폴더를 확인할 수 없습니다")?;

    let (inputs, output_root) = match args.inputs() {
        Some(inputs) => (inputs, args.output.clone()),
        None => prompt_inputs(&base_dir, args.output.clone())?,
    };

    if inputs.is_empty() {
        println!("{}", "⚠️ 처리할 입력 경로가 없습니다.".yellow());
        return Ok(());
    }

    let request = args
        .to_batch_request(inputs, base_dir, output_root)
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    print_header(args, &request.inputs, request.output_root.as_deref(), &request.patterns.to_string());

    let backends = BackendRegistry::builtin(&args.grib_options());
    if backends.is_empty() {
        anyhow::bail!("사용 가능한 디코더가 없습니다 (netcdf/grib 기능을 확인하세요)");
    }

    let runner = BatchRunner::new(&backends, args.convert_options());
    let mut progress: Option<ProgressBar> = None;
    let mut errors: Vec<(PathBuf, String)> = Vec::new();

    let report = runner.run(&request, |event| match event {
        BatchEvent::Started { label, files } => {
            println!("\n{} {} ({}개 파일)", "📂".bright_cyan(), label.bright_white(), files);
            progress = create_progress_bar(files).ok();
        }
        BatchEvent::FileDone { outcome, .. } => {
            if let Some(pb) = &progress {
                pb.inc(1);
                if verbose && outcome.success {
                    pb.println(format!(
                        "  {} {:?} ({}개 CSV, {})",
                        "✓".green(),
                        outcome.path.file_name().unwrap_or_default(),
                        outcome.written.len(),
                        format_duration(outcome.elapsed)
                    ));
                }
            }
            if let Some(error) = &outcome.error {
                errors.push((outcome.path.clone(), error.clone()));
            }
        }
        BatchEvent::Finished { stats } => {
            if let Some(pb) = progress.take() {
                pb.finish_with_message("완료!");
            }
            stats.print_summary();
        }
    });

    print_errors(&errors, verbose);
    report.print_summary();

    if let Some(report_path) = &args.report {
        report
            .write_csv(report_path)
            .map_err(|e| anyhow::anyhow!("{}", e))?;
        println!("\n{} 보고서 저장: {:?}", "📝".bright_cyan(), report_path);
    }

    println!("\n{} 변환 종료\n", "✅".bright_green());
    Ok(())
}

/// 대화형 입력: 출력 폴더 이름과 쉼표로 구분된 입력 경로
fn prompt_inputs(base_dir: &Path, output: Option<PathBuf>) -> Result<(Vec<String>, Option<PathBuf>)> {
    let output_root = match output {
        Some(output) => output,
        None => {
            let name: String = Input::new()
                .with_prompt("출력 폴더 이름을 입력하세요")
                .default("csv_output".to_string())
                .interact_text()
                .context("출력 폴더 입력 실패")?;
            base_dir.join(name.trim())
        }
    };

    if output_root.is_dir() {
        println!("  {} 이미 있는 출력 폴더를 사용합니다: {:?}", "ℹ️".bright_blue(), output_root);
    } else {
        fs::create_dir_all(&output_root)
            .with_context(|| format!("출력 폴더를 만들 수 없습니다: {:?}", output_root))?;
        println!("  {} 출력 폴더를 만들었습니다: {:?}", "📁".bright_green(), output_root);
    }

    let list: String = Input::new()
        .with_prompt("변환할 폴더/파일을 쉼표로 구분해 입력하세요 (예: ncin1,ncin2,ncin3/a.nc)")
        .allow_empty(true)
        .interact_text()
        .context("입력 경로 입력 실패")?;

    Ok((split_list(&list), Some(output_root)))
}

/// 헤더 출력
fn print_header(args: &ConvertArgs, inputs: &[String], output_root: Option<&Path>, patterns: &str) {
    println!("\n{}", "═".repeat(50).bright_blue());
    println!(
        "{}",
        " 🚀 GRIDDED DATA TO CSV CONVERTER".bright_white().bold()
    );
    println!("{}", "═".repeat(50).bright_blue());
    println!("  {} 입력: {}", "📂".bright_cyan(), inputs.join(", "));

    match output_root {
        Some(root) => println!("  {} 출력 폴더: {:?}", "📄".bright_green(), root),
        None => println!("  {} 출력 폴더: 각 입력 옆", "📄".bright_green()),
    }

    println!("  {} 패턴 필터: {}", "🔍".bright_magenta(), patterns);
    println!("  {} 디코더: {}", "⚙️".bright_yellow(), args.engine);

    if args.no_recursive {
        println!("  {} 하위 폴더 탐색 안 함", "📏".bright_white());
    } else if let Some(depth) = args.max_depth {
        println!("  {} 최대 깊이: {}", "📏".bright_white(), depth);
    }

    if let (Some(lat), Some(lon)) = (args.lat, args.lon) {
        println!("  {} 최근접 격자점: ({}, {})", "📍".bright_cyan(), lat, lon);
    }

    println!("{}", "═".repeat(50).bright_blue());
}

/// 진행률 바 생성
fn create_progress_bar(total: usize) -> Result<ProgressBar> {
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")?
            .progress_chars("█▓▒░"),
    );
    Ok(pb)
}

/// 실패 파일 목록 출력
fn print_errors(errors: &[(PathBuf, String)], verbose: bool) {
    if errors.is_empty() {
        return;
    }

    println!("\n{}", "❌ 오류 발생 파일:".bright_red());
    for (path, error) in errors {
        println!("  {} {:?}", "•".red(), path);
        if verbose {
            println!("    {}", error.dimmed());
        }
    }
}

/// 파일의 변수와 차원 출력
fn run_inspect(args: &InspectArgs) -> Result<()> {
    let backends = BackendRegistry::builtin(&Default::default());
    let (backend, dataset) = backends
        .open(&args.file, args.engine.backend_name())
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    println!("\n{}", "═".repeat(50).bright_blue());
    println!("{}", format!(" 🔎 {:?}", args.file).bright_white().bold());
    println!("{}", "═".repeat(50).bright_blue());
    println!("  {} 디코더: {}", "⚙️".bright_yellow(), backend);

    let fields = dataset.fields();
    println!("  {} 변수 수: {}", "📋".bright_white(), fields.len());
    for field in &fields {
        let dims = field
            .dims
            .iter()
            .map(|(name, len)| format!("{}={}", name, len))
            .collect::<Vec<_>>()
            .join(", ");
        println!("    {} {} ({})", "•".cyan(), field.name.bright_white(), dims);
    }
    println!("{}", "═".repeat(50).bright_blue());

    Ok(())
}

/// 모델 레지스트리 명령 실행
fn run_registry(args: &RegistryArgs) -> Result<()> {
    let client = RegistryClient::new(&args.tracking_uri).map_err(|e| anyhow::anyhow!("{}", e))?;
    println!("  {} 추적 서버: {}", "🌐".bright_cyan(), client.tracking_uri());

    match &args.action {
        RegistryAction::List => {
            let models = client
                .search_registered_models()
                .map_err(|e| anyhow::anyhow!("{}", e))?;

            if models.is_empty() {
                println!("{}", "⚠️ 등록된 모델이 없습니다.".yellow());
            }
            for model in &models {
                println!("\n{} {}", "🏷️".bright_magenta(), model.name.bright_white().bold());
                for version in &model.latest_versions {
                    println!("    {} {}", "•".cyan(), version);
                }
            }
        }
        RegistryAction::Register(register) => {
            let (run, version) = registry::train_and_register(&client, &register.to_request())
                .map_err(|e| anyhow::anyhow!("{}", e))?;

            println!("  {} 실행 ID: {}", "🧪".bright_cyan(), run.run_id);
            println!("  {} 정확도: {:.4}", "📈".bright_white(), run.accuracy);
            println!("  {} 모델 URI: {}", "📦".bright_cyan(), run.model_uri);
            println!(
                "\n{} 모델 등록 완료: {} {}\n",
                "✅".bright_green(),
                version.name,
                version
            );
        }
    }

    Ok(())
}
