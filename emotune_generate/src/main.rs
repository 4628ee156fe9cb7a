// Emotune CLI entry point.
//
// Usage:
//   emotune encode <in.mid> [--emotion Q1] [--out tokens.json] [--config c.json]
//   emotune decode <tokens.json> <out.mid> [--ticks-per-beat N] [--config c.json]
//   emotune fit <model.json> --emotion Q1 [--smoothing K] [--config c.json] <midi...>
//   emotune generate --model <model.json> --emotion Q1 [--out out.mid]
//     [--seed N] [--count N] [--temperature T] [--top-p P] [--max-tokens N]
//     [--config c.json]
//
// Token files are JSON arrays of token ids. `fit` adds to an existing model
// file when one is present, so a corpus is fitted one emotion at a time.
// With `--count N` generation runs N sequences in parallel and writes
// `<out>_0.mid` .. `<out>_{N-1}.mid`. Logging goes through env_logger;
// set RUST_LOG=debug for per-file and per-step detail.

use emotune_codec::decode::decode_with_report;
use emotune_codec::encode::encode_file;
use emotune_codec::frame::{frame_sequence, split_frame};
use emotune_codec::midi::write_midi;
use emotune_codec::{Emotion, Token};
use emotune_generate::batch::{GenerationRequest, generate_batch, requests_for};
use emotune_generate::bigram::BigramScorer;
use emotune_generate::config::EmotuneConfig;
use emotune_generate::{GenerateError, Generation};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Flags that take a value; everything else not starting with `--` is
/// positional.
const VALUE_FLAGS: &[&str] = &[
    "--emotion",
    "--out",
    "--config",
    "--ticks-per-beat",
    "--smoothing",
    "--model",
    "--seed",
    "--count",
    "--temperature",
    "--top-p",
    "--max-tokens",
];

const DEFAULT_SMOOTHING: f64 = 0.01;

fn main() {
    env_logger::init();
    let args: Vec<String> = std::env::args().collect();

    let result = match args.get(1).map(String::as_str) {
        Some("encode") => run_encode(&args[2..]),
        Some("decode") => run_decode(&args[2..]),
        Some("fit") => run_fit(&args[2..]),
        Some("generate") => run_generate(&args[2..]),
        _ => usage(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn usage() -> ! {
    eprintln!("usage:");
    eprintln!("  emotune encode <in.mid> [--emotion Q1] [--out tokens.json]");
    eprintln!("  emotune decode <tokens.json> <out.mid> [--ticks-per-beat N]");
    eprintln!("  emotune fit <model.json> --emotion Q1 [--smoothing K] <midi...>");
    eprintln!("  emotune generate --model <model.json> --emotion Q1 [--out out.mid]");
    eprintln!("                   [--seed N] [--count N] [--temperature T] [--top-p P]");
    eprintln!("                   [--max-tokens N]");
    eprintln!("every subcommand accepts --config <config.json>");
    std::process::exit(1);
}

fn run_encode(args: &[String]) -> Result<(), GenerateError> {
    let config = load_config(args)?;
    let layout = config.codec.layout()?;
    let input = match positional(args).first() {
        Some(p) => PathBuf::from(p),
        None => usage(),
    };

    let body = encode_file(&layout, &input, config.codec.cursor)?;
    let tokens = match parse_flag::<Emotion>(args, "--emotion") {
        Some(emotion) => frame_sequence(&layout, &body, emotion, config.codec.max_seq_len),
        None => body,
    };

    let json = serde_json::to_string(&tokens)?;
    match flag_value(args, "--out") {
        Some(out) => {
            std::fs::write(out, json)?;
            info!("wrote {} tokens to {out}", tokens.len());
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn run_decode(args: &[String]) -> Result<(), GenerateError> {
    let config = load_config(args)?;
    let layout = config.codec.layout()?;
    let paths = positional(args);
    let (input, output) = match paths.as_slice() {
        [input, output, ..] => (Path::new(input), Path::new(output)),
        _ => usage(),
    };
    let ticks_per_beat =
        parse_flag(args, "--ticks-per-beat").unwrap_or(config.codec.output_ticks_per_beat);

    let tokens: Vec<Token> = serde_json::from_str(&std::fs::read_to_string(input)?)?;
    let (emotion, body) = split_frame(&layout, &tokens);
    let (sequence, report) = decode_with_report(&layout, &body, ticks_per_beat);
    if report.skipped > 0 {
        warn!("skipped {} malformed tokens", report.skipped);
    }
    write_midi(&sequence, output)?;
    println!(
        "Decoded {} notes{} to {}",
        sequence.notes.len(),
        emotion.map(|e| format!(" ({e})")).unwrap_or_default(),
        output.display()
    );
    Ok(())
}

fn run_fit(args: &[String]) -> Result<(), GenerateError> {
    let config = load_config(args)?;
    let layout = config.codec.layout()?;
    let paths = positional(args);
    let Some((model_path, inputs)) = paths.split_first() else {
        usage()
    };
    let model_path = Path::new(model_path);
    let Some(emotion) = parse_flag::<Emotion>(args, "--emotion") else {
        usage()
    };

    let mut model = if model_path.exists() {
        BigramScorer::load(model_path, &layout)?
    } else {
        let smoothing = parse_flag(args, "--smoothing").unwrap_or(DEFAULT_SMOOTHING);
        BigramScorer::new(layout, smoothing)?
    };

    let mut fitted = 0;
    for input in inputs {
        match encode_file(&layout, Path::new(input), config.codec.cursor) {
            Ok(body) => {
                model.fit(&frame_sequence(&layout, &body, emotion, config.codec.max_seq_len));
                fitted += 1;
            }
            Err(e) => warn!("skipping {input}: {e}"),
        }
    }
    model.save(model_path)?;
    println!(
        "Fitted {fitted} of {} files as {emotion} ({}); model now covers {} sequences",
        inputs.len(),
        emotion.mood(),
        model.sequences()
    );
    Ok(())
}

fn run_generate(args: &[String]) -> Result<(), GenerateError> {
    let mut config = load_config(args)?;
    if let Some(t) = parse_flag(args, "--temperature") {
        config.generation.temperature = t;
    }
    if let Some(p) = parse_flag(args, "--top-p") {
        config.generation.top_p = p;
    }
    if let Some(n) = parse_flag(args, "--max-tokens") {
        config.generation.max_new_tokens = n;
    }
    config.generation.validate()?;
    let layout = config.codec.layout()?;

    let Some(model_path) = flag_value(args, "--model") else {
        usage()
    };
    let Some(emotion) = parse_flag::<Emotion>(args, "--emotion") else {
        usage()
    };
    let output = PathBuf::from(flag_value(args, "--out").unwrap_or("output.mid"));
    let seed = parse_flag(args, "--seed").unwrap_or_else(clock_seed);
    let count: usize = parse_flag(args, "--count").unwrap_or(1);

    let model = BigramScorer::load(Path::new(model_path), &layout)?;
    let requests = if count == 1 {
        vec![GenerationRequest { emotion, seed }]
    } else {
        requests_for(emotion, count, seed)
    };
    println!(
        "Generating {} sequence(s) for {emotion} ({}), seed {seed}",
        requests.len(),
        emotion.mood()
    );

    let results = generate_batch(&layout, &config.generation, &requests, || model.clone());
    for (i, result) in results.into_iter().enumerate() {
        let generation = result?;
        let path = if count == 1 {
            output.clone()
        } else {
            numbered(&output, i)
        };
        write_generation(&config, &generation, &path)?;
    }
    Ok(())
}

fn write_generation(
    config: &EmotuneConfig,
    generation: &Generation,
    path: &Path,
) -> Result<(), GenerateError> {
    let layout = config.codec.layout()?;
    let (sequence, _) =
        decode_with_report(&layout, &generation.tokens, config.codec.output_ticks_per_beat);
    write_midi(&sequence, path)?;
    println!(
        "  {}: {} tokens, {} notes, stopped on {:?}",
        path.display(),
        generation.tokens.len(),
        sequence.notes.len(),
        generation.stop
    );
    Ok(())
}

fn load_config(args: &[String]) -> Result<EmotuneConfig, GenerateError> {
    match flag_value(args, "--config") {
        Some(path) => EmotuneConfig::load(Path::new(path)),
        None => Ok(EmotuneConfig::default()),
    }
}

/// `out.mid` -> `out_3.mid`.
fn numbered(path: &Path, index: usize) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "mid".to_string());
    path.with_file_name(format!("{stem}_{index}.{ext}"))
}

fn clock_seed() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

fn positional(args: &[String]) -> Vec<&str> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < args.len() {
        let arg = args[i].as_str();
        if VALUE_FLAGS.contains(&arg) {
            i += 2;
            continue;
        }
        if !arg.starts_with("--") {
            out.push(arg);
        }
        i += 1;
    }
    out
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

/// Parse a flag's value, exiting with a message if it is present but
/// malformed.
fn parse_flag<T: FromStr>(args: &[String], flag: &str) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    let value = flag_value(args, flag)?;
    match value.parse() {
        Ok(v) => Some(v),
        Err(e) => {
            eprintln!("invalid value '{value}' for {flag}: {e}");
            std::process::exit(1);
        }
    }
}
