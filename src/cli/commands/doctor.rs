//! Doctor command - verify configuration and connectivity.

use crate::cli::output::{mask_secret, redact_url};
use crate::cli::Output;
use crate::config::{Prompts, Settings};
use crate::store::{PgStore, TranscriptStore};
use console::style;
use std::path::Path;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks.
pub async fn run_doctor(settings: &Settings, config_path: &Path) -> anyhow::Result<()> {
    Output::header("Shopwright Doctor");
    println!();
    println!("Checking configuration and connectivity...\n");

    let mut checks = Vec::new();

    println!("{}", style("API Configuration").bold());
    let api_check = check_openai_api_key(settings.openai.api_key.as_deref());
    api_check.print();
    checks.push(api_check);

    println!();

    println!("{}", style("Database").bold());
    let db_checks = check_database(settings).await;
    for check in &db_checks {
        check.print();
    }
    checks.extend(db_checks);

    println!();

    println!("{}", style("Configuration").bold());
    let config_checks = vec![check_config_file(config_path), check_prompts(settings)];
    for check in &config_checks {
        check.print();
    }
    checks.extend(config_checks);

    println!();

    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before serving requests.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! Shopwright is ready to serve.");
    }

    Ok(())
}

/// Check if an OpenAI API key is configured, preferring the config file.
fn check_openai_api_key(configured: Option<&str>) -> CheckResult {
    let key = match configured.filter(|k| !k.is_empty()) {
        Some(key) => Ok(key.to_string()),
        None => std::env::var("OPENAI_API_KEY"),
    };

    match key {
        Ok(key) if key.starts_with("sk-") && key.len() > 20 => CheckResult::ok(
            "OPENAI_API_KEY",
            &format!("configured ({})", mask_secret(&key)),
        ),
        Ok(key) if key.is_empty() => CheckResult::error(
            "OPENAI_API_KEY",
            "empty",
            "Set with: export OPENAI_API_KEY='sk-...'",
        ),
        Ok(_) => CheckResult::warning(
            "OPENAI_API_KEY",
            "set but format looks unusual",
            "Expected format: sk-... (OpenAI API key)",
        ),
        Err(_) => CheckResult::error(
            "OPENAI_API_KEY",
            "not set",
            "Set with: export OPENAI_API_KEY='sk-...'",
        ),
    }
}

/// Check the database url resolves and the database answers.
async fn check_database(settings: &Settings) -> Vec<CheckResult> {
    let url = match settings.database.resolve_url() {
        Ok(url) => url,
        Err(_) => {
            return vec![CheckResult::error(
                "Database URL",
                "not configured",
                "Set [database] url in the config file, or export DATABASE_URL / POSTGRES_URL",
            )]
        }
    };

    let mut results = vec![CheckResult::ok("Database URL", &redact_url(&url))];

    let mut quick = settings.database.clone();
    quick.connect_retries = 1;
    match PgStore::connect(&quick).await {
        Ok(store) => {
            let health = store.health_check().await;
            store.close().await;
            results.push(match health {
                Ok(()) => CheckResult::ok("Connectivity", "SELECT 1 succeeded"),
                Err(e) => CheckResult::error(
                    "Connectivity",
                    &e.to_string(),
                    "Check the database is running and reachable",
                ),
            });
        }
        Err(e) => results.push(CheckResult::error(
            "Connectivity",
            &e.to_string(),
            "Check the database is running and reachable",
        )),
    }

    results
}

/// Check if the config file exists.
fn check_config_file(config_path: &Path) -> CheckResult {
    if config_path.exists() {
        CheckResult::ok("Config file", &format!("{}", config_path.display()))
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: shopwright config init",
        )
    }
}

/// Check custom prompt templates load and only use known slots.
fn check_prompts(settings: &Settings) -> CheckResult {
    match Prompts::load(
        settings.prompts.custom_dir.as_deref(),
        Some(&settings.prompts.variables),
    ) {
        Ok(_) => {
            let source = settings
                .prompts
                .custom_dir
                .as_deref()
                .unwrap_or("built-in");
            CheckResult::ok("Prompts", source)
        }
        Err(e) => CheckResult::error(
            "Prompts",
            &e.to_string(),
            "Fix the templates in prompts.toml",
        ),
    }
}
