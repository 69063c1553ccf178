use std::path::PathBuf;

use serde_json::json;
use shipwatch::{best_match, match_markers, parse_line, SignatureLibrary};

use crate::Error;

#[derive(Debug, clap::Args)]
pub struct CheckArgs {
    /// Signature library file.
    #[arg(long)]
    pub signatures_path: PathBuf,
}

#[derive(Debug, clap::Args)]
pub struct MatchArgs {
    /// Signature library file.
    #[arg(long)]
    pub signatures_path: PathBuf,

    /// A log line, as the game would write it.
    pub line: String,
}

pub fn check(args: CheckArgs) -> Result<(), Error> {
    let library = SignatureLibrary::load(&args.signatures_path)?;
    let stats = library.stats();
    println!(
        "{}: {} ships, {} markers ({} distinct)",
        args.signatures_path.display(),
        stats.ships,
        stats.tokens,
        stats.distinct_tokens
    );
    for ship in library.iter() {
        println!("  {} ({} markers)", ship.name(), ship.len());
    }
    Ok(())
}

pub fn match_line(args: MatchArgs) -> Result<(), Error> {
    let library = SignatureLibrary::load(&args.signatures_path)?;
    println!("{}", serde_json::to_string_pretty(&describe(&args.line, &library))?);
    Ok(())
}

fn describe(line: &str, library: &SignatureLibrary) -> serde_json::Value {
    let Some(event) = parse_line(line) else {
        return json!({ "markers": [], "result": null });
    };

    let score = best_match(&event.markers, library)
        .map(|(_, score)| json!({ "matches": score.matches, "total": score.total }));

    json!({
        "markers": event.markers,
        "is_snapshot": event.is_snapshot,
        "result": match_markers(&event.markers, event.is_snapshot, library),
        "score": score,
    })
}
