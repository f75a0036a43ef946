use std::path::PathBuf;

use clap::Parser;
use indicatif::ProgressBar;
use log::info;
use tokio::task::block_in_place;

use crate::IndexPipeline;
use crate::cli::SubCommandExtend;
use crate::config::{DetectorOptions, Opts};
use crate::detector::build_detector;
use crate::pipeline::DEFAULT_SUFFIX;
use crate::utils::pb_style;

#[derive(Parser, Debug, Clone)]
pub struct AddCommand {
    #[command(flatten)]
    pub detector: DetectorOptions,
    /// 图片所在目录，会递归扫描子目录
    pub path: PathBuf,
    /// 扫描的文件后缀名，多个后缀用逗号分隔
    #[arg(short, long, default_value = DEFAULT_SUFFIX)]
    pub suffix: String,
}

impl SubCommandExtend for AddCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let detector = build_detector(&self.detector)?;
        let pb = ProgressBar::no_length().with_style(pb_style());

        // NOTE: 同一个索引文件同时只能有一个 add 在运行，否则后保存的会覆盖先保存的
        let report = block_in_place(|| {
            IndexPipeline::new(detector.as_ref())
                .suffix(&self.suffix)
                .progress(pb.clone())
                .index_directory(&self.path, opts.conf_dir.store())
        })?;

        pb.finish_with_message("图片添加完成");

        for (source_id, reason) in &report.skipped {
            pb.println(format!("[SKIP] {source_id}: {reason}"));
        }
        info!(
            "新增 {} 张人脸（{} 张图片），跳过 {} 张图片，索引共 {} 条记录",
            report.added,
            report.indexed_files,
            report.skipped.len(),
            report.total
        );
        println!("{}", report.added);

        Ok(())
    }
}
