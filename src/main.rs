//! kubedeploy CLI - render manifest templates and watch resources roll out

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tokio_util::sync::CancellationToken;

use kubedeploy::error::{DeployError, FixSuggestion, RenderErrorKind, TemplateRenderError};
use kubedeploy::{
    from_document, Bindings, DeployAttempt, Kubectl, RenderedTemplate, ResourceWatcher,
    TemplateRenderer, WatchLimits,
};

#[derive(Parser)]
#[command(name = "kubedeploy")]
#[command(about = "kubedeploy - render Kubernetes manifest templates and watch them deploy")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Yaml,
    Json,
}

#[derive(clap::Args)]
struct RenderArgs {
    /// Directory holding the manifest templates
    template_dir: PathBuf,

    /// Git SHA being deployed (exposed as `current_sha`)
    #[arg(long)]
    current_sha: Option<String>,

    /// Extra binding, `name=value` (repeatable)
    #[arg(long = "bindings", value_name = "NAME=VALUE")]
    bindings: Vec<String>,

    /// YAML or JSON mapping of extra bindings
    #[arg(long)]
    bindings_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Render every template and print the documents
    Render {
        #[command(flatten)]
        args: RenderArgs,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: Format,
    },

    /// Render every template, then watch the resources until they settle
    Watch {
        #[command(flatten)]
        args: RenderArgs,

        /// kubectl context
        #[arg(long)]
        context: String,

        /// Target namespace
        #[arg(long)]
        namespace: String,

        /// Stop the whole attempt after this many seconds
        #[arg(long)]
        deadline_secs: Option<u64>,

        /// Maximum concurrent cluster queries
        #[arg(long)]
        concurrency: Option<usize>,

        /// Pause between poll cycles in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Render { args, format } => render(&args, format),
        Commands::Watch {
            args,
            context,
            namespace,
            deadline_secs,
            concurrency,
            interval_ms,
        } => {
            let mut limits = WatchLimits::production();
            if let Some(secs) = deadline_secs {
                limits = limits.with_deadline(Duration::from_secs(secs));
            }
            if let Some(max) = concurrency {
                limits = limits.with_concurrency(max);
            }
            if let Some(ms) = interval_ms {
                limits = limits.with_poll_interval(Duration::from_millis(ms));
            }
            watch(&args, context, namespace, limits).await
        }
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        if let Some(suggestion) = e.fix_suggestion() {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(1);
    }
}

fn load_bindings(args: &RenderArgs) -> Result<Bindings, DeployError> {
    let file = match &args.bindings_file {
        Some(path) => Bindings::from_file(path)?,
        None => Bindings::new(),
    };
    // command-line values win over the file
    let cli = args
        .bindings
        .iter()
        .map(|arg| Bindings::parse_arg(arg))
        .collect::<Result<Bindings, _>>()?;
    Ok(file.layer(&cli))
}

fn render_all(args: &RenderArgs) -> Result<Vec<RenderedTemplate>, DeployError> {
    let attempt = DeployAttempt::new(args.current_sha.clone());
    let bindings = load_bindings(args)?;
    let renderer = TemplateRenderer::new(&attempt, &args.template_dir, bindings);
    renderer.render_dir()
}

fn render(args: &RenderArgs, format: Format) -> Result<(), DeployError> {
    let rendered = render_all(args)?;
    for template in &rendered {
        match format {
            Format::Yaml => {
                for doc in template.document.documents() {
                    print!("---\n{}", serde_yaml::to_string(doc)?);
                }
            }
            Format::Json => {
                let lines = template.document.to_compact().map_err(|details| {
                    TemplateRenderError::new(
                        RenderErrorKind::MalformedOutput { details },
                        &template.filename,
                        &template.text,
                    )
                })?;
                for line in lines {
                    println!("{}", line);
                }
            }
        }
    }
    Ok(())
}

async fn watch(
    args: &RenderArgs,
    context: String,
    namespace: String,
    limits: WatchLimits,
) -> Result<(), DeployError> {
    let rendered = render_all(args)?;

    let kubectl = Kubectl::new(Some(context), Some(namespace));
    if !kubectl.is_available() {
        return Err(DeployError::KubectlUnavailable {
            path: kubectl.cli_path().to_string(),
        });
    }

    let resources: Vec<_> = rendered
        .iter()
        .flat_map(|t| t.document.documents())
        .filter_map(from_document)
        .collect();
    println!(
        "{} Watching {} resources from {}...\n",
        "→".cyan(),
        resources.len(),
        args.template_dir.display()
    );

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let watcher = ResourceWatcher::new(Arc::new(kubectl), limits);
    let summary = watcher.run(resources, cancel).await;
    summary.print();
    summary.into_result(watcher.limits()).map(|_| ())
}
