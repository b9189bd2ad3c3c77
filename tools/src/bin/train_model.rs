// Train an n-gram engine from a corpus file and serialize the model.
//
// The corpus is one entry per line; token engines split each line on
// whitespace. The model is written as bincode, with an optional
// pretty-printed JSON dump of the same logical shape.

use anyhow::{bail, Context, Result};
use clap::Parser;
use libngram_core::{
    NgramConfig, NgramStringFuzzy, NgramStringPredict, NgramTokenFuzzy, NgramTokenPredict,
};
use std::path::PathBuf;

#[derive(Parser)]
struct Args {
    /// Corpus file, one entry per line
    #[arg(long)]
    corpus: PathBuf,

    /// Engine kind: string-fuzzy | string-predict | token-fuzzy | token-predict
    #[arg(long, default_value = "string-fuzzy")]
    kind: String,

    /// Optional TOML config (n_gram_min, n_gram_max, max_results, case_sensitive)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output model path (bincode)
    #[arg(long, default_value = "model.bin")]
    out: PathBuf,

    /// Optional JSON dump of the exported model
    #[arg(long)]
    json: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => NgramConfig::load_toml(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => NgramConfig::default(),
    };

    let text = std::fs::read_to_string(&args.corpus)
        .with_context(|| format!("reading corpus {}", args.corpus.display()))?;
    let lines: Vec<String> = text
        .lines()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect();
    let sequences: Vec<Vec<String>> = lines
        .iter()
        .map(|l| l.split_whitespace().map(str::to_string).collect())
        .collect();

    match args.kind.as_str() {
        "string-fuzzy" => {
            let mut engine = NgramStringFuzzy::with_config(&config);
            engine.train(&lines);
            let model = engine.export();
            model.save_bincode(&args.out)?;
            if let Some(path) = &args.json {
                std::fs::write(path, serde_json::to_string_pretty(&model)?)?;
            }
        }
        "string-predict" => {
            let mut engine = NgramStringPredict::with_config(&config);
            engine.train(&lines);
            let model = engine.export();
            model.save_bincode(&args.out)?;
            if let Some(path) = &args.json {
                std::fs::write(path, serde_json::to_string_pretty(&model)?)?;
            }
        }
        "token-fuzzy" => {
            let mut engine: NgramTokenFuzzy<String> = NgramTokenFuzzy::with_config(&config);
            engine.train(&sequences);
            let model = engine.export();
            model.save_bincode(&args.out)?;
            if let Some(path) = &args.json {
                std::fs::write(path, serde_json::to_string_pretty(&model)?)?;
            }
        }
        "token-predict" => {
            let mut engine: NgramTokenPredict<String> = NgramTokenPredict::with_config(&config);
            engine.train(&sequences);
            let model = engine.export();
            model.save_bincode(&args.out)?;
            if let Some(path) = &args.json {
                std::fs::write(path, serde_json::to_string_pretty(&model)?)?;
            }
        }
        other => bail!("unknown engine kind '{other}'"),
    }

    println!(
        "Trained {} on {} corpus entries, wrote {}",
        args.kind,
        lines.len(),
        args.out.display()
    );
    Ok(())
}
