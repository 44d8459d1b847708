use lumen::render::{HeadlessError, HeadlessRenderer};
use lumen::{LumenConfig, NormalizeReport, normalize_with_report};
use serde::Serialize;
use serde_json::Value;
use std::io::Read;
use std::str::FromStr;

#[derive(Debug)]
enum CliError {
    Usage(&'static str),
    Io(std::io::Error),
    Headless(HeadlessError),
    Json(serde_json::Error),
    Yaml(serde_yaml::Error),
    Config(String),
    CheckFailed(String),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Usage(msg) => write!(f, "{msg}"),
            CliError::Io(err) => write!(f, "I/O error: {err}"),
            CliError::Headless(err) => write!(f, "{err}"),
            CliError::Json(err) => write!(f, "JSON error: {err}"),
            CliError::Yaml(err) => write!(f, "YAML error: {err}"),
            CliError::Config(msg) => write!(f, "Invalid config: {msg}"),
            CliError::CheckFailed(report) => write!(f, "{report}"),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<HeadlessError> for CliError {
    fn from(value: HeadlessError) -> Self {
        Self::Headless(value)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<serde_yaml::Error> for CliError {
    fn from(value: serde_yaml::Error) -> Self {
        Self::Yaml(value)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Command {
    Normalize,
    Check,
    #[default]
    Render,
    Page,
}

#[derive(Debug, Clone, Copy, Default)]
enum RenderFormat {
    #[default]
    Html,
    Json,
}

impl FromStr for RenderFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "html" => Ok(Self::Html),
            "json" => Ok(Self::Json),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Default)]
struct Args {
    command: Command,
    inputs: Vec<String>,
    report: bool,
    format: RenderFormat,
    config: Option<String>,
    no_trace: bool,
    out: Option<String>,
    verbose: bool,
}

#[derive(Serialize)]
struct NormalizeOut<'a> {
    source: &'a str,
    report: &'a NormalizeReport,
}

fn usage() -> &'static str {
    "lumen-cli\n\
\n\
USAGE:\n\
  lumen-cli normalize [--report] [<path>|-]\n\
  lumen-cli check [--config <file>] [<path>|-]\n\
  lumen-cli [render] [--format html|json] [--config <file>] [--no-trace] [--out <path>] [<path>|-]\n\
  lumen-cli page [--config <file>] [--no-trace] [--out <path>] <path>...\n\
\n\
OPTIONS:\n\
  -v, --verbose   debug logging on stderr (LUMEN_LOG overrides the filter)\n\
\n\
NOTES:\n\
  - If <path> is omitted or '-', input is read from stdin.\n\
  - --config accepts JSON, or YAML when the file ends in .yaml/.yml; it is merged over the defaults.\n\
  - render exits 0 whenever the pipeline ran; a failing block renders its error panel.\n\
  - check compiles without executing and exits 1 on a syntax error.\n\
"
}

fn parse_args(argv: &[String]) -> Result<Args, CliError> {
    let mut args = Args::default();

    let mut it = argv.iter().skip(1);
    while let Some(a) = it.next() {
        match a.as_str() {
            "--help" | "-h" => return Err(CliError::Usage(usage())),
            "normalize" if args.inputs.is_empty() => args.command = Command::Normalize,
            "check" if args.inputs.is_empty() => args.command = Command::Check,
            "render" if args.inputs.is_empty() => args.command = Command::Render,
            "page" if args.inputs.is_empty() => args.command = Command::Page,
            "--report" => args.report = true,
            "--no-trace" => args.no_trace = true,
            "--verbose" | "-v" => args.verbose = true,
            "--format" => {
                let Some(fmt) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.format = fmt
                    .parse::<RenderFormat>()
                    .map_err(|_| CliError::Usage(usage()))?;
            }
            "--config" => {
                let Some(path) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.config = Some(path.clone());
            }
            "--out" => {
                let Some(out) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.out = Some(out.clone());
            }
            "--" => args.inputs.extend(it.by_ref().cloned()),
            "-" => args.inputs.push("-".to_string()),
            other if other.starts_with('-') => return Err(CliError::Usage(usage())),
            path => args.inputs.push(path.to_string()),
        }
    }

    let inputs_ok = match args.command {
        Command::Page => !args.inputs.is_empty(),
        _ => args.inputs.len() <= 1,
    };
    if !inputs_ok {
        return Err(CliError::Usage(usage()));
    }
    Ok(args)
}

fn read_input(input: Option<&str>) -> Result<String, CliError> {
    match input {
        None | Some("-") => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
        Some(path) => Ok(std::fs::read_to_string(path)?),
    }
}

fn write_text(text: &str, out: Option<&str>) -> Result<(), CliError> {
    match out {
        None | Some("-") => {
            print!("{text}");
            Ok(())
        }
        Some(path) => {
            std::fs::write(path, text)?;
            Ok(())
        }
    }
}

fn load_config(args: &Args) -> Result<LumenConfig, CliError> {
    let mut config = match args.config.as_deref() {
        None => LumenConfig::default(),
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            let overrides: Value = if path.ends_with(".yaml") || path.ends_with(".yml") {
                serde_yaml::from_str(&text)?
            } else {
                serde_json::from_str(&text)?
            };
            if !overrides.is_object() {
                return Err(CliError::Config(format!(
                    "{path}: expected a mapping at the top level"
                )));
            }
            LumenConfig::with_overrides(&overrides)
        }
    };
    if args.no_trace {
        config.set_value("shell.showTrace", Value::Bool(false));
    }
    Ok(config)
}

fn setup_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env("LUMEN_LOG").unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("lumen=debug,lumen_core=debug,lumen_render=debug,info")
        } else {
            EnvFilter::new("warn")
        }
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .try_init();
}

fn run(args: Args) -> Result<(), CliError> {
    let input = args.inputs.first().map(String::as_str);
    match args.command {
        Command::Normalize => {
            let text = read_input(input)?;
            let (source, report) = normalize_with_report(&text);
            if args.report {
                let out = NormalizeOut {
                    source: source.as_str(),
                    report: &report,
                };
                let mut json = serde_json::to_string_pretty(&out)?;
                json.push('\n');
                write_text(&json, args.out.as_deref())
            } else {
                write_text(source.as_str(), args.out.as_deref())
            }
        }
        Command::Check => {
            let text = read_input(input)?;
            let renderer = HeadlessRenderer::with_config(load_config(&args)?)?;
            match renderer.check(&text) {
                Ok(unit) => {
                    println!("ok {}", unit.parameter_list());
                    Ok(())
                }
                Err(failure) => Err(CliError::CheckFailed(failure.trace)),
            }
        }
        Command::Render => {
            let text = read_input(input)?;
            let renderer = HeadlessRenderer::with_config(load_config(&args)?)?;
            let rendered = match args.format {
                RenderFormat::Html => renderer.render_block_html_sync(&text),
                RenderFormat::Json => renderer.render_block_json_sync(&text)?,
            };
            write_text(&rendered, args.out.as_deref())
        }
        Command::Page => {
            let renderer = HeadlessRenderer::with_config(load_config(&args)?)?;
            let blocks = args
                .inputs
                .iter()
                .map(|path| read_input(Some(path)))
                .collect::<Result<Vec<_>, _>>()?;
            tracing::debug!(blocks = blocks.len(), "rendering page");
            let html = renderer.render_page_html_sync(blocks);
            write_text(&html, args.out.as_deref())
        }
    }
}

fn main() {
    let args = match parse_args(&std::env::args().collect::<Vec<_>>()) {
        Ok(v) => v,
        Err(CliError::Usage(msg)) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };
    setup_tracing(args.verbose);

    if let Err(err) = run(args) {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
