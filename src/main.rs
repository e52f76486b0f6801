use anyhow::Result;
use clap::Parser;
use hoopquery::analyzer;
use hoopquery::config::Config;
use hoopquery::dashboard::DashboardService;
use hoopquery::db;
use hoopquery::llm::LlmClient;
use hoopquery::pipeline::Pipeline;
use std::io::{BufRead, Write};
use tracing::info;

#[derive(Parser)]
#[command(name = "hoopquery")]
#[command(about = "Query and analyze NBA data in natural language")]
struct Args {
    /// Ask a one-shot question; omit for an interactive loop
    #[arg(short, long)]
    question: Option<String>,

    /// Print chart-ready JSON instead of a narrative analysis
    #[arg(long)]
    chart: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config = Config::from_env()?;

    info!("Connecting to database...");
    let pool = db::init_pool(&config.database_url).await?;

    if let Some(question) = args.question {
        let answer = answer_question(&pool, &config, &question, args.chart).await;
        println!("{}", answer);
        return Ok(());
    }

    println!("Welcome to HoopQuery! Type 'quit' to exit.");
    let stdin = std::io::stdin();
    loop {
        print!("\nask> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if matches!(question.to_lowercase().as_str(), "quit" | "exit") {
            break;
        }

        let answer = answer_question(&pool, &config, question, args.chart).await;
        println!("{}", answer);
    }

    Ok(())
}

/// Failures come back as printable text here; the interactive loop keeps
/// going after a bad question.
async fn answer_question(
    pool: &sqlx::PgPool,
    config: &Config,
    question: &str,
    chart: bool,
) -> String {
    if chart {
        let service = DashboardService::new(pool.clone(), config);
        return match service.interpret_question(question).await {
            Ok(response) => serde_json::to_string_pretty(&response)
                .unwrap_or_else(|e| format!("Error serializing response: {}", e)),
            Err(e) => format!("Error: {}", e),
        };
    }

    let pipeline = Pipeline::new(pool.clone(), config);
    let result = match pipeline.run(question).await {
        Ok(result) => result,
        Err(e) => return format!("Error: {}", e),
    };

    let llm = LlmClient::new(
        config.openai_api_key.clone(),
        config.openai_model.clone(),
        config.openai_base_url.clone(),
    );
    match analyzer::analyze(&llm, &result).await {
        Ok(analysis) => analysis,
        Err(e) => format!("Error during analysis: {}", e),
    }
}
