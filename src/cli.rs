use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};

use crate::actions::{ActionFlow, ActionRegistry, ActionRunner, ApiCatalog};
use crate::config::Config;
use crate::context::{Context, StaticResolver};
use crate::interpreter::{Bindings, Val};
use crate::parser::parse_expression;
use crate::template::{self, template_expression, Scope};

#[derive(Parser)]
#[command(name = "actionflow")]
#[command(about = "Evaluate templates and run action flows", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default search)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Evaluate a single template
    Eval {
        /// Template string, e.g. "{{ a + b }}"
        template: String,

        /// JSON file with an object of bindings
        #[arg(short = 's', long = "scope")]
        scope: Option<PathBuf>,
    },

    /// Print the syntax tree of a template as JSON
    Parse {
        /// Template string or bare expression
        template: String,
    },

    /// Run an action flow
    Run {
        /// JSON file containing an array of steps
        flow: PathBuf,

        /// JSON file with `values` and `components` served to `$val` and `$`
        #[arg(short = 'c', long = "components")]
        components: Option<PathBuf>,

        /// JSON file with the initial outputVar object
        #[arg(short = 'o', long = "output-var")]
        output_var: Option<PathBuf>,

        /// outputVar key for steps that don't name one
        #[arg(long = "default-output-var")]
        default_output_var: Option<String>,
    },

    /// List the registered action kinds
    Kinds,
}

/// Contents of a `--components` file
#[derive(Debug, Default, Deserialize)]
struct ComponentsFile {
    #[serde(default)]
    values: HashMap<String, JsonValue>,
    #[serde(default)]
    components: HashMap<String, JsonValue>,
}

impl ComponentsFile {
    fn into_resolver(self) -> StaticResolver {
        let mut resolver = StaticResolver::new();
        for (id, value) in self.values {
            resolver = resolver.with_value(id, Val::from(value));
        }
        for (id, handle) in self.components {
            resolver = resolver.with_component(id, Val::from(handle));
        }
        resolver
    }
}

/// Run the CLI by parsing process arguments
pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    run_cli_with_args(cli).await
}

/// Run the CLI with an explicit argument list
pub async fn run_cli_from_args(args: Vec<String>) -> Result<()> {
    let cli = Cli::parse_from(args);
    run_cli_with_args(cli).await
}

async fn run_cli_with_args(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Eval { template, scope } => {
            let bindings = match scope {
                Some(path) => read_json::<HashMap<String, JsonValue>>(&path)?
                    .into_iter()
                    .map(|(name, value)| (name, Val::from(value)))
                    .collect(),
                None => Bindings::new(),
            };

            let context = Context::empty().with_output_var(bindings);
            let scope = Scope::from_context(&context, None);
            let value = template::evaluate_in_scope(&template, &scope);
            print_json(&value.to_json())?;
        }

        Commands::Parse { template } => {
            let source = template_expression(&template).unwrap_or(&template);
            let expr = parse_expression(source).map_err(|err| match err.span() {
                Some(span) => anyhow::anyhow!(
                    "{} at {}:{}",
                    err.message(),
                    span.start_line + 1,
                    span.start_col + 1
                ),
                None => anyhow::anyhow!("{}", err.message()),
            })?;
            print_json(&serde_json::to_value(&expr)?)?;
        }

        Commands::Run {
            flow,
            components,
            output_var,
            default_output_var,
        } => {
            let config = Config::builder()
                .config_path(cli.config)
                .default_output_var(default_output_var)
                .build()
                .context("Failed to load configuration")?;

            let flow: ActionFlow = read_json(&flow)?;
            let resolver = match components {
                Some(path) => read_json::<ComponentsFile>(&path)?.into_resolver(),
                None => StaticResolver::new(),
            };
            let initial: Bindings = match output_var {
                Some(path) => read_json::<HashMap<String, JsonValue>>(&path)?
                    .into_iter()
                    .map(|(name, value)| (name, Val::from(value)))
                    .collect(),
                None => Bindings::new(),
            };

            let runner = build_runner(&config).await;
            let context = Context::new(Arc::new(resolver)).with_output_var(initial);
            let outcome = runner.execute(&flow, &context).await?;

            let output_var: serde_json::Map<String, JsonValue> = outcome
                .output_var
                .iter()
                .map(|(name, value)| (name.clone(), value.to_json()))
                .collect();
            print_json(&json!({
                "runId": outcome.run_id,
                "result": outcome.result.to_json(),
                "outputVar": output_var,
            }))?;
        }

        Commands::Kinds => {
            let registry = ActionRegistry::with_builtins();
            for kind in registry.kinds() {
                println!("{}", kind);
            }
        }
    }

    Ok(())
}

/// Runner with the built-in actions and the `echo` API, initialized from
/// the `[api]` config section when present
async fn build_runner(config: &Config) -> ActionRunner {
    let api = ApiCatalog::new();
    api.register_fn("echo", |args| async move { Ok(Val::List(args)) })
        .await;
    if let Some(api_config) = config.api.to_api_config() {
        api.initialize(&api_config).await;
    }

    ActionRunner::new(ActionRegistry::with_builtins(), api)
        .with_default_output_var(config.runner.default_output_var.clone())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
}

fn print_json(value: &JsonValue) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
