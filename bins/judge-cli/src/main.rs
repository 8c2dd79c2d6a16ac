mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::ApiClient;

#[derive(Parser)]
#[command(name = "judge-cli")]
#[command(about = "Judge CLI - Seed problems and drive the judge API", long_about = None)]
struct Cli {
    /// Base URL of the judge API
    #[arg(long, default_value = "http://localhost:5000", global = true)]
    api_url: String,

    /// User id sent as x-user-id
    #[arg(long, default_value = "cli", global = true)]
    user_id: String,

    /// Role sent as x-user-role (user or admin)
    #[arg(long, default_value = "user", global = true)]
    role: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load problems and their test cases from a JSON file into Redis
    Seed {
        /// Path to the problems file
        #[arg(short, long, default_value = "demos/problems.json")]
        file: String,

        /// Redis connection URL
        #[arg(long, default_value = "redis://127.0.0.1:6379")]
        redis_url: String,
    },

    /// Run a solution against a problem's sample test cases
    RunSample {
        /// Problem id
        #[arg(short, long)]
        problem: String,

        /// Source file
        #[arg(short, long)]
        file: String,

        /// Language (cpp, java, python)
        #[arg(short, long)]
        language: String,
    },

    /// Run a solution against custom stdin
    RunCustom {
        /// Source file
        #[arg(short, long)]
        file: String,

        /// Language (cpp, java, python)
        #[arg(short, long)]
        language: String,

        /// Stdin passed to the program
        #[arg(short, long, default_value = "")]
        input: String,

        /// Read stdin from a file instead
        #[arg(long)]
        input_file: Option<String>,
    },

    /// Submit a solution for grading
    Submit {
        /// Problem id
        #[arg(short, long)]
        problem: String,

        /// Source file
        #[arg(short, long)]
        file: String,

        /// Language (cpp, java, python)
        #[arg(short, long)]
        language: String,
    },

    /// List submissions for a user (defaults to --user-id), or all with --all
    Submissions {
        /// User whose submissions to list
        #[arg(short, long)]
        user: Option<String>,

        /// List every submission (admin)
        #[arg(long)]
        all: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let api = ApiClient::new(&cli.api_url, &cli.user_id, &cli.role);

    match cli.command {
        Commands::Seed { file, redis_url } => {
            commands::seed(&file, &redis_url).await?;
        }
        Commands::RunSample {
            problem,
            file,
            language,
        } => {
            commands::run_sample(&api, &problem, &file, &language).await?;
        }
        Commands::RunCustom {
            file,
            language,
            input,
            input_file,
        } => {
            commands::run_custom(&api, &file, &language, &input, input_file.as_deref()).await?;
        }
        Commands::Submit {
            problem,
            file,
            language,
        } => {
            commands::submit(&api, &problem, &file, &language).await?;
        }
        Commands::Submissions { user, all } => {
            let user = if all { None } else { Some(user.unwrap_or(cli.user_id)) };
            commands::list_submissions(&api, user.as_deref()).await?;
        }
    }

    Ok(())
}
