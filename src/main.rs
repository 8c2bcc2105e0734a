//! burndate CLI
//!
//! 运行 Telegram bot，对固定地点的卫星影像做对话式二分查找，
//! 收敛到火灾损毁最早可见的日期。

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use burndate::{AppConfig, Bisector, BotRunner, CandidateImage, CatalogClient};

#[derive(Parser)]
#[command(name = "burndate")]
#[command(about = "用对话式二分查找定位火灾损毁最早可见的影像日期")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 启动 bot（长轮询 Telegram 更新）
    Serve,
    /// 检索目录并打印候选影像日期（调试用）
    Dates {
        /// 起始日期（默认取配置里的 start_date）
        #[arg(long)]
        from: Option<NaiveDate>,
        /// 输出 JSON 格式
        #[arg(long)]
        json: bool,
    },
    /// 离线模拟一次查找：按给定判定串打印探测序列（调试用）
    Simulate {
        /// 候选数量（从 2020-01-01 起逐日生成）
        #[arg(long, short, default_value = "16")]
        count: u32,
        /// 判定串，每个字符一步：y = 是，n = 否
        verdicts: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // 通过 RUST_LOG 控制日志级别，默认 info
    // 例如: RUST_LOG=debug burndate serve
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("burndate=info"));

    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve => {
            let config = AppConfig::auto_load()?;
            let runner = BotRunner::new(config)?;
            runner.run().await?;
        }
        Commands::Dates { from, json } => {
            let config = AppConfig::auto_load()?;
            let from = from.unwrap_or(config.catalog.start_date);
            let client = CatalogClient::new(config.catalog)?;
            let candidates = client.search(from).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&candidates)?);
            } else if candidates.is_empty() {
                println!("{} 之后没有可用影像", from);
            } else {
                println!("发现 {} 个候选日期:\n", candidates.len());
                for c in &candidates {
                    println!(
                        "  {} | 场景: {}",
                        c.date,
                        c.source_id.as_deref().unwrap_or("-")
                    );
                }
            }
        }
        Commands::Simulate { count, verdicts } => {
            simulate(count, &verdicts)?;
        }
    }

    Ok(())
}

/// 离线跑一遍状态机，打印每一步的探测点和区间大小
fn simulate(count: u32, verdicts: &str) -> Result<()> {
    anyhow::ensure!(count > 0, "候选数量必须大于 0");

    let base: NaiveDate = "2020-01-01".parse().unwrap();
    let candidates: Vec<CandidateImage> = (0..count)
        .map(|i| CandidateImage::new(base + chrono::Duration::days(i as i64), None))
        .collect();

    let mut bisector = Bisector::new(candidates);
    println!("候选 {} 张，判定串 \"{}\"\n", count, verdicts);

    for (step, ch) in verdicts.chars().enumerate() {
        if bisector.completed() {
            println!("\n查找已在第 {} 步前终止，剩余判定被忽略", step + 1);
            break;
        }

        let verdict = match ch {
            'y' | 'Y' => true,
            'n' | 'N' => false,
            other => anyhow::bail!("无法识别的判定字符: {:?}（只接受 y/n）", other),
        };

        let probe = bisector.probe().clone();
        bisector.answer(verdict);
        println!(
            "  步骤 {}: 探测 {} -> {} | 剩余 {}",
            step + 1,
            probe.date,
            if verdict { "是" } else { "否" },
            bisector.remaining()
        );
    }

    if bisector.completed() {
        match bisector.culprit() {
            Some(date) => println!("\n结果: 最早可见日期 {}", date),
            None => println!("\n结果: 范围内未见损毁"),
        }
    } else {
        println!(
            "\n判定串用完查找未结束，当前探测点 {}，剩余 {} 张",
            bisector.probe().date,
            bisector.remaining()
        );
    }

    Ok(())
}
