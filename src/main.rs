mod backend;
mod cli;
mod logging;
mod model;
mod orchestrator;
mod text_summary;
mod theme;
#[cfg(feature = "tui")]
mod tui;
mod view;

use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let is_headless = args.json || args.text;

    match cli::run(args).await {
        Ok(()) => {
            // Explicitly exit with code 0 on success, especially for headless modes
            if is_headless {
                std::process::exit(0);
            }
            Ok(())
        }
        Err(e) if is_headless => {
            eprintln!("{}", headless_failure(&e));
            std::process::exit(1);
        }
        Err(e) => Err(e),
    }
}

/// The single line a failed `--text`/`--json` run leaves on stderr.
fn headless_failure(e: &anyhow::Error) -> String {
    format!("error: {e:#}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn headless_failure_is_one_line_with_the_cause_chain() {
        let err = Err::<(), _>(anyhow::anyhow!("Search failed. Please try again."))
            .context("fetch did not complete")
            .unwrap_err();
        let msg = headless_failure(&err);
        assert_eq!(
            msg,
            "error: fetch did not complete: Search failed. Please try again."
        );
        assert_eq!(msg.lines().count(), 1);
    }
}
