//! Status command

use crate::app::{directory_arg, OutputFormat, StatusArgs};
use anyhow::Result;
use codeindex_core::db::TagSummary;
use codeindex_core::Database;

pub async fn run(args: StatusArgs, db: &Database, format: OutputFormat) -> Result<()> {
    let summaries: Vec<TagSummary> = if args.dirs.is_empty() {
        db.tag_summaries(None)?
    } else {
        let mut all = Vec::new();
        for dir in &args.dirs {
            all.extend(db.tag_summaries(Some(&directory_arg(dir)))?);
        }
        all
    };

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        }
        OutputFormat::Cli => {
            if summaries.is_empty() {
                println!("Nothing indexed yet");
                return Ok(());
            }

            let mut current: Option<(&str, &str)> = None;
            for summary in &summaries {
                let scope = (summary.tag.directory.as_str(), summary.tag.branch.as_str());
                if current != Some(scope) {
                    println!("{} ({})", scope.0, scope.1);
                    current = Some(scope);
                }
                println!(
                    "  {:<32} files: {:<6} rows: {}",
                    summary.tag.artifact_id, summary.files, summary.rows
                );
            }
        }
    }
    Ok(())
}
