use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tokio::task::block_in_place;

use crate::Searcher;
use crate::cli::SubCommandExtend;
use crate::config::{DetectorOptions, Opts, OutputFormat, SearchOptions};
use crate::detector::build_detector;
use crate::ranker::QueryResult;

#[derive(Parser, Debug, Clone)]
pub struct SearchCommand {
    #[command(flatten)]
    pub detector: DetectorOptions,
    #[command(flatten)]
    pub search: SearchOptions,
    /// 被搜索的图片路径
    pub image: PathBuf,
    /// 输出格式
    #[arg(long, value_name = "FORMAT", value_enum, default_value_t = OutputFormat::Table)]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for SearchCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let detector = build_detector(&self.detector)?;
        let searcher = Searcher::new(detector.as_ref());

        let result = block_in_place(|| {
            searcher.search_file(&self.image, opts.conf_dir.store(), self.search.top_k as usize)
        })?;

        print_result(&result, self.output_format)
    }
}

fn print_result(result: &[QueryResult], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(result)?)
        }
        OutputFormat::Table => {
            for r in result {
                println!("{:.4}\t{}\t{}", r.distance, r.region_index, r.source_id);
            }
        }
    }
    Ok(())
}
