use anyhow::Result;
use clap::Parser;
use dotenv::dotenv;
use log::{error, info};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use docquery::openai::OpenAiConfig;
use docquery::session::{Session, UploadedFile};

/// Chat with your PDF/XLSX documents using retrieval-augmented answering
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Folder of PDFs, or a single PDF/XLSX/text file, to ingest at startup
    #[arg(index = 1)]
    source: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    let mut session = Session::with_openai();
    if let Ok(config) = OpenAiConfig::from_env() {
        session.on_credential_change(&config.api_key);
    }

    if let Some(source) = &args.source {
        if !session.has_credential() {
            error!("OPENAI_API_KEY is not set; cannot ingest {}", source.display());
            return Err(anyhow::anyhow!("Missing API credential"));
        }
        ingest_path(&mut session, source).await?;
        info!("Ingested {}", source.display());
    }

    run_chat_loop(&mut session).await
}

/// Route a path to the right handler: folders go through the PDF folder
/// ingest, single files through the upload path.
async fn ingest_path(session: &mut Session, path: &Path) -> Result<()> {
    if path.is_dir() {
        session.on_ingest(path).await
    } else {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();
        let bytes = std::fs::read(path)?;
        session.on_files_uploaded(&[UploadedFile { name, bytes }]).await
    }
}

/// Interactive chat loop. Plain lines are questions; `:`-prefixed lines
/// are commands. Type `exit` to quit.
async fn run_chat_loop(session: &mut Session) -> Result<()> {
    println!("Ready. Ask a question, or use :ingest <path>, :key <api-key>, :forget, :history. Type 'exit' to quit.");

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut buffer = String::new();

    loop {
        print!("\n> ");
        stdout.flush()?;

        buffer.clear();
        if stdin.read_line(&mut buffer)? == 0 {
            break;
        }

        let line = buffer.trim();
        if line.is_empty() {
            continue;
        }

        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            break;
        }

        if let Some(rest) = line.strip_prefix(':') {
            if let Err(e) = handle_command(session, rest).await {
                error!("{:#}", e);
                println!("Error: {:#}", e);
            }
            continue;
        }

        match session.on_ask(line).await {
            Ok(answer) => println!("{}", answer),
            Err(e) => {
                error!("{:#}", e);
                println!("Error: {:#}", e);
            }
        }
    }

    Ok(())
}

async fn handle_command(session: &mut Session, command: &str) -> Result<()> {
    let (name, rest) = match command.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (command, ""),
    };

    match name {
        "ingest" => {
            anyhow::ensure!(!rest.is_empty(), "Usage: :ingest <folder-or-file>");
            let path = Path::new(rest);
            anyhow::ensure!(path.exists(), "No such path: {}", rest);
            ingest_path(session, path).await?;
            println!("Ingested {}", rest);
        }
        "key" => {
            anyhow::ensure!(!rest.is_empty(), "Usage: :key <api-key>");
            session.on_credential_change(rest);
            println!("Credential updated; transcript cleared. Please ingest your documents again.");
        }
        "forget" => {
            session.forget();
            println!("Index cleared.");
        }
        "history" => {
            if session.transcript().is_empty() {
                println!("(no conversation yet)");
            }
            for turn in session.transcript() {
                println!("you: {}", turn.question);
                println!("bot: {}", turn.answer);
            }
        }
        other => anyhow::bail!("Unknown command: :{}", other),
    }

    Ok(())
}
