use application::export::{export_content, ExportFormat};
use application::generator::{
    GenerationError, GenerationResult, GenerationService, GenerationUpdate,
};
use clap::Parser;
use colored::Colorize;
use dialoguer::{Confirm, Input};
use domain::session::Session;
use infrastructure::chat_client::ChatCompletionClient;
use infrastructure::config::Config;
use infrastructure::retry::RetryPolicy;
use shared::telemetry::Telemetry;
use shared::types::Result;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "webforge")]
#[command(about = "Turn a plain-language description into runnable front-end code")]
pub struct Cli {
    /// Enter interactive chat mode
    #[arg(long)]
    pub chat: bool,

    /// Override the configured model
    #[arg(long)]
    pub model: Option<String>,

    /// Print the sandbox configuration as JSON after each generation
    #[arg(long)]
    pub show_sandbox: bool,

    /// Directory to export the generated file into
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// The description of the app to generate
    #[arg(trailing_var_arg = true)]
    pub args: Vec<String>,
}

pub struct CliApp {
    service: GenerationService<ChatCompletionClient>,
    session: Session,
    last_result: Option<GenerationResult>,
    show_sandbox: bool,
}

impl CliApp {
    pub fn new(config: &Config, model_override: Option<String>, show_sandbox: bool) -> Self {
        let client = ChatCompletionClient::with_retry_policy(
            config.endpoint.clone(),
            config.api_key.clone(),
            RetryPolicy::new(config.max_retries),
        );
        let model = model_override.unwrap_or_else(|| config.model.clone());
        let service = GenerationService::new(client, config.system_prompt.clone(), model);
        Self {
            service,
            session: Session::new(format!("cli-{}", std::process::id())),
            last_result: None,
            show_sandbox,
        }
    }

    pub async fn run(&mut self, cli: Cli) -> Result<()> {
        if cli.chat {
            self.chat_loop(cli.export.as_deref()).await
        } else {
            let description = cli.args.join(" ");
            self.generate_once(&description, cli.export.as_deref())
                .await
        }
    }

    async fn chat_loop(&mut self, export_dir: Option<&Path>) -> Result<()> {
        println!(
            "{}",
            "webforge chat - describe an app, /clear to reset, /export to save, /quit to leave"
                .bold()
        );
        loop {
            let line: String = Input::<String>::new()
                .with_prompt(">")
                .allow_empty(true)
                .interact_text()?;
            match line.trim() {
                "/quit" | "/exit" => break,
                "/clear" => self.clear_history()?,
                "/export" => self.export_last(export_dir)?,
                input => self.generate_once(input, export_dir).await?,
            }
        }
        Ok(())
    }

    async fn generate_once(&mut self, description: &str, export_dir: Option<&Path>) -> Result<()> {
        let rx = match self.service.generate(description, self.session.clone()) {
            Ok(rx) => rx,
            Err(e @ GenerationError::EmptyInput) | Err(e @ GenerationError::Busy) => {
                println!("{}", e.to_string().yellow());
                return Ok(());
            }
        };

        let telemetry = Telemetry::start("generation");
        self.render_stream(rx).await?;
        let elapsed = telemetry.finish();
        println!("{}", format!("({elapsed:.1?})").dimmed());

        if let Some(result) = self.last_result.clone() {
            if self.show_sandbox {
                println!("{}", serde_json::to_string_pretty(&result.sandbox)?);
            }
            if export_dir.is_some() {
                self.export_last(export_dir)?;
            }
        }
        Ok(())
    }

    /// Drain the update stream, printing only the unseen suffix of each
    /// progress snapshot so the output grows in place.
    async fn render_stream(&mut self, mut rx: mpsc::Receiver<GenerationUpdate>) -> Result<()> {
        let mut printed = 0usize;
        while let Some(update) = rx.recv().await {
            match update {
                GenerationUpdate::Progress { text } => {
                    print!("{}", &text[printed..]);
                    std::io::stdout().flush()?;
                    printed = text.len();
                }
                GenerationUpdate::Finished(result) => {
                    println!();
                    println!(
                        "{} {} -> {} sandbox ({} file{})",
                        "done:".green().bold(),
                        result.primary.kind.extension(),
                        match result.sandbox.template {
                            domain::sandbox::SandboxTemplate::React => "react",
                            domain::sandbox::SandboxTemplate::Html => "html",
                        },
                        result.sandbox.files.len(),
                        if result.sandbox.files.len() == 1 { "" } else { "s" },
                    );
                    self.session = result.session.clone();
                    self.last_result = Some(result);
                }
                GenerationUpdate::Failed { message, partial } => {
                    println!();
                    if !partial.is_empty() {
                        println!("{}", "(partial output shown above)".dimmed());
                    }
                    println!("{} {}", "error:".red().bold(), message);
                }
            }
        }
        Ok(())
    }

    fn clear_history(&mut self) -> Result<()> {
        if self.session.history.is_empty() {
            println!("{}", "history is already empty".yellow());
            return Ok(());
        }
        let confirmed = Confirm::new()
            .with_prompt("Clear the conversation history?")
            .default(false)
            .interact()?;
        if confirmed {
            self.session.clear();
            println!("{}", "history cleared".green());
        }
        Ok(())
    }

    fn export_last(&self, export_dir: Option<&Path>) -> Result<()> {
        let Some(result) = &self.last_result else {
            println!("{}", "nothing to export yet".yellow());
            return Ok(());
        };
        match export_content(&result.primary.content, ExportFormat::Auto) {
            Some(file) => {
                let dir = export_dir.unwrap_or_else(|| Path::new("."));
                let path = dir.join(&file.filename);
                std::fs::write(&path, &file.content)?;
                println!("{} {}", "exported:".green().bold(), path.display());
            }
            None => println!("{}", "nothing to export yet".yellow()),
        }
        Ok(())
    }
}
