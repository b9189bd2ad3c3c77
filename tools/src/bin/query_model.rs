// Load a serialized model and run a single query against it, printing the
// ranked results with their scores.

use anyhow::{bail, Context, Result};
use clap::Parser;
use libngram_core::{
    NgramStringFuzzy, NgramStringPredict, NgramTokenFuzzy, NgramTokenPredict, StringFuzzyModel,
    StringPredictModel, TokenFuzzyModel, TokenPredictModel,
};
use std::path::PathBuf;

#[derive(Parser)]
struct Args {
    /// Model file written by train_model (bincode)
    #[arg(long)]
    model: PathBuf,

    /// Engine kind: string-fuzzy | string-predict | token-fuzzy | token-predict
    #[arg(long, default_value = "string-fuzzy")]
    kind: String,

    /// Query string; token engines split it on whitespace
    query: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let tokens: Vec<String> = args
        .query
        .split_whitespace()
        .map(str::to_string)
        .collect();

    match args.kind.as_str() {
        "string-fuzzy" => {
            let model = StringFuzzyModel::load_bincode(&args.model)
                .with_context(|| format!("loading {}", args.model.display()))?;
            let mut engine = NgramStringFuzzy::default();
            engine.load(model)?;
            engine.search(&args.query);
            for entry in engine.entries() {
                println!("{:>8.4}  {}", entry.score, entry.value);
            }
        }
        "string-predict" => {
            let model = StringPredictModel::load_bincode(&args.model)
                .with_context(|| format!("loading {}", args.model.display()))?;
            let mut engine = NgramStringPredict::default();
            engine.load(model)?;
            engine.predict(&args.query);
            for entry in engine.entries() {
                println!("{:>8.4}  {:?}", entry.score, entry.value);
            }
        }
        "token-fuzzy" => {
            let model: TokenFuzzyModel<String> = TokenFuzzyModel::load_bincode(&args.model)
                .with_context(|| format!("loading {}", args.model.display()))?;
            let mut engine = NgramTokenFuzzy::default();
            engine.load(model)?;
            engine.search(&tokens);
            for entry in engine.entries() {
                println!("{:>8.4}  {}", entry.score, entry.value.join(" "));
            }
        }
        "token-predict" => {
            let model: TokenPredictModel<String> = TokenPredictModel::load_bincode(&args.model)
                .with_context(|| format!("loading {}", args.model.display()))?;
            let mut engine = NgramTokenPredict::default();
            engine.load(model)?;
            engine.predict(&tokens);
            for entry in engine.entries() {
                println!("{:>8.4}  {}", entry.score, entry.value);
            }
        }
        other => bail!("unknown engine kind '{other}'"),
    }
    Ok(())
}
