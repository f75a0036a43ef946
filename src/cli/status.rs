use anyhow::Result;
use clap::Parser;

use crate::cli::SubCommandExtend;
use crate::config::Opts;
use crate::store;

#[derive(Parser, Debug, Clone)]
pub struct StatusCommand {
    /// 额外显示最后 N 条记录
    #[arg(short = 'n', long, value_name = "N", default_value_t = 5)]
    pub last: usize,
}

impl SubCommandExtend for StatusCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let store_path = opts.conf_dir.store();
        let entries = store::load(&store_path);

        println!("索引文件: {}", store_path.display());
        println!("人脸数量: {}", entries.len());
        if let Some(first) = entries.first() {
            println!("描述符维度: {}", first.descriptor.len());
        }
        for entry in entries.iter().skip(entries.len().saturating_sub(self.last)) {
            println!("{}\t{}", entry.region_index, entry.source_id);
        }
        Ok(())
    }
}
