//! 人脸描述符存储
//!
//! 整个索引序列化为单个 bincode 文件，每次读取和保存都是全量的。
//! 保存时先写入同目录下的临时文件再重命名覆盖，并发读取方只会看到
//! 保存前或保存后的完整快照。
//!
//! 每次索引都会全量重写文件，只适合中小规模的图片集合。同一个存储
//! 同时只允许一个索引操作，否则后保存的一方会覆盖另一方的结果。

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::descriptor::FaceDescriptor;
use crate::error::Result;

/// 索引中的一条人脸记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// 来源图片标识，通常是相对于图片目录的路径
    pub source_id: String,
    /// 人脸在来源图片中的序号，从 0 开始
    pub region_index: usize,
    pub descriptor: FaceDescriptor,
}

/// 读取索引文件
///
/// 文件不存在、无法读取或内容损坏时都返回空序列，不会报错
pub fn load(path: impl AsRef<Path>) -> Vec<IndexEntry> {
    let path = path.as_ref();
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("索引文件不存在，视为空索引: {}", path.display());
            return vec![];
        }
        Err(e) => {
            warn!("无法读取索引文件 {}，视为空索引: {}", path.display(), e);
            return vec![];
        }
    };

    let entries: Vec<IndexEntry> = match bincode::deserialize_from(BufReader::new(file)) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("索引文件已损坏 {}，视为空索引: {}", path.display(), e);
            return vec![];
        }
    };

    if let Some(first) = entries.first() {
        let dim = first.descriptor.len();
        if entries.iter().any(|entry| entry.descriptor.len() != dim) {
            warn!("索引文件中的描述符维度不一致 {}，视为空索引", path.display());
            return vec![];
        }
    }

    debug!("读取索引 {}: {} 条记录", path.display(), entries.len());
    entries
}

/// 原子地保存全部记录到索引文件
pub fn save(entries: &[IndexEntry], path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_file = tmp_path(path);
    let result = write_entries(entries, &tmp_file).and_then(|_| {
        std::fs::rename(&tmp_file, path)?;
        Ok(())
    });
    if result.is_err() {
        let _ = std::fs::remove_file(&tmp_file);
    }
    result?;

    debug!("保存索引 {}: {} 条记录", path.display(), entries.len());
    Ok(())
}

fn write_entries(entries: &[IndexEntry], path: &Path) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    bincode::serialize_into(&mut writer, entries)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|s| s.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// 已索引的来源图片集合
pub fn indexed_sources(entries: &[IndexEntry]) -> HashSet<&str> {
    entries.iter().map(|entry| entry.source_id.as_str()).collect()
}
