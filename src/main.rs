use anyhow::Context;
use clap::{Arg, Command};
use log::LevelFilter;
use mailsift::{ClassificationEngine, ModelParameters, Verdict};
use std::fs;
use std::io::Read;
use std::process;

/// Characters of input echoed back in the report.
const PREVIEW_CHARS: usize = 300;

fn main() {
    let matches = Command::new("mailsift")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Explainable email spam classification")
        .arg(
            Arg::new("model")
                .short('m')
                .long("model")
                .value_name("FILE")
                .help("Model artifact (YAML); built-in baseline when omitted"),
        )
        .arg(
            Arg::new("generate-model")
                .long("generate-model")
                .value_name("FILE")
                .help("Write the baseline model artifact and exit")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("test-model")
                .long("test-model")
                .help("Validate the model artifact and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("text")
                .short('t')
                .long("text")
                .value_name("TEXT")
                .help("Classify the given text instead of reading a file"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Emit the verdict as JSON")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable debug logging")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("input")
                .value_name("FILE")
                .help("Email file to classify (stdin when omitted)"),
        )
        .get_matches();

    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if let Some(path) = matches.get_one::<String>("generate-model") {
        let model = ModelParameters::default();
        if let Err(e) = fs::write(path, model.to_yaml()) {
            eprintln!("Failed to write model artifact: {e}");
            process::exit(1);
        }
        println!("Wrote baseline model '{}' to {}", model.version, path);
        return;
    }

    let model = match load_model(matches.get_one::<String>("model")) {
        Ok(model) => model,
        Err(e) => {
            eprintln!("Model error: {e:#}");
            process::exit(1);
        }
    };

    if matches.get_flag("test-model") {
        println!(
            "Model '{}' is valid ({} features, thresholds {:.2}/{:.2})",
            model.version,
            model.expected_length,
            model.low_threshold,
            model.high_threshold
        );
        return;
    }

    let engine = match ClassificationEngine::new(model) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Model error: {e}");
            process::exit(1);
        }
    };

    let text = match read_input(
        matches.get_one::<String>("text"),
        matches.get_one::<String>("input"),
    ) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("Input error: {e:#}");
            process::exit(1);
        }
    };

    match engine.classify(&text) {
        Ok(verdict) => {
            if matches.get_flag("json") {
                match serde_json::to_string_pretty(&verdict) {
                    Ok(json) => println!("{json}"),
                    Err(e) => {
                        eprintln!("Failed to encode verdict: {e}");
                        process::exit(1);
                    }
                }
            } else {
                print_report(&text, &verdict);
            }
        }
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(2);
        }
    }
}

fn load_model(path: Option<&String>) -> anyhow::Result<ModelParameters> {
    match path {
        None => Ok(ModelParameters::default()),
        Some(path) => {
            let bytes =
                fs::read(path).with_context(|| format!("failed to read model file {path}"))?;
            let text = String::from_utf8_lossy(&bytes);
            ModelParameters::from_yaml(&text)
                .with_context(|| format!("failed to load model from {path}"))
        }
    }
}

/// `--text` wins; otherwise the input file; otherwise stdin. Bytes are
/// decoded lossily so malformed sequences become U+FFFD instead of an
/// error, per the normalizer's contract.
fn read_input(text: Option<&String>, input: Option<&String>) -> anyhow::Result<String> {
    if let Some(text) = text {
        return Ok(text.clone());
    }
    let bytes = match input {
        Some(path) => {
            fs::read(path).with_context(|| format!("failed to read email file {path}"))?
        }
        None => {
            let mut buffer = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buffer)
                .context("failed to read stdin")?;
            buffer
        }
    };
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn print_report(text: &str, verdict: &Verdict) {
    let preview: String = text.chars().take(PREVIEW_CHARS).collect();
    let truncated = text.chars().count() > PREVIEW_CHARS;
    println!("Email preview:");
    println!("  {}{}", preview, if truncated { "..." } else { "" });
    println!();
    println!("Verdict:    {}", verdict.label);
    println!("Confidence: {:.1}%", verdict.confidence * 100.0);
    println!("Model:      {}", verdict.model_version);
    println!("Rationale:");
    for reason in &verdict.rationale {
        println!("  - {reason}");
    }
}
