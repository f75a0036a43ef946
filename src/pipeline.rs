//! 索引流程：扫描图片 → 检测人脸 → 计算描述符 → 追加到索引
//!
//! 采用增量策略：`source_id` 已存在于索引中的图片会被跳过，
//! 因此对同一目录重复索引不会产生重复记录。

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use indicatif::{ParallelProgressIterator, ProgressBar};
use log::{debug, info, warn};
use rayon::prelude::*;
use regex::Regex;
use walkdir::WalkDir;

use crate::descriptor::{self, FaceDescriptor};
use crate::detector::FaceDetector;
use crate::error::{FaceSearchError, Result};
use crate::metrics;
use crate::store::{self, IndexEntry};
use crate::utils;

/// 默认扫描的图片后缀
pub const DEFAULT_SUFFIX: &str = "jpg,jpeg,png";

/// 跳过一张图片的原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// 已经在索引中
    AlreadyIndexed,
    /// 文件无法读取
    Unreadable(String),
    /// 文件不是有效的图片
    Decode(String),
    /// 人脸检测失败
    Detect(String),
    /// 描述符计算失败
    Extract(String),
    /// 没有检测到可用的人脸区域
    NoFace,
}

impl SkipReason {
    /// 用于日志和指标的简短标签
    pub fn label(&self) -> &'static str {
        match self {
            SkipReason::AlreadyIndexed => "already_indexed",
            SkipReason::Unreadable(_) => "unreadable",
            SkipReason::Decode(_) => "decode",
            SkipReason::Detect(_) => "detect",
            SkipReason::Extract(_) => "extract",
            SkipReason::NoFace => "no_face",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::AlreadyIndexed => write!(f, "已索引"),
            SkipReason::Unreadable(e) => write!(f, "无法读取: {e}"),
            SkipReason::Decode(e) => write!(f, "无法解码: {e}"),
            SkipReason::Detect(e) => write!(f, "人脸检测失败: {e}"),
            SkipReason::Extract(e) => write!(f, "描述符计算失败: {e}"),
            SkipReason::NoFace => write!(f, "未检测到人脸"),
        }
    }
}

/// 单张图片的处理结果
#[derive(Debug, Clone)]
pub enum FileOutcome {
    Indexed { source_id: String, descriptors: Vec<FaceDescriptor> },
    Skipped { source_id: String, reason: SkipReason },
}

/// 一次索引操作的汇总
#[derive(Debug, Default)]
pub struct IndexReport {
    /// 本次新增的描述符数量
    pub added: usize,
    /// 本次新增人脸的图片数量
    pub indexed_files: usize,
    /// 被跳过的图片及原因，按处理顺序排列
    pub skipped: Vec<(String, SkipReason)>,
    /// 保存后索引中的记录总数
    pub total: usize,
}

impl IndexReport {
    /// 统计某一类跳过原因的数量
    pub fn skipped_count(&self, label: &str) -> usize {
        self.skipped.iter().filter(|(_, reason)| reason.label() == label).count()
    }
}

/// 一张待处理的图片
enum Source {
    File { source_id: String, path: PathBuf },
    Bytes { source_id: String, data: Vec<u8> },
}

impl Source {
    fn source_id(&self) -> &str {
        match self {
            Source::File { source_id, .. } | Source::Bytes { source_id, .. } => source_id,
        }
    }
}

pub struct IndexPipeline<'a> {
    detector: &'a dyn FaceDetector,
    suffix: Regex,
    pb: ProgressBar,
}

impl<'a> IndexPipeline<'a> {
    pub fn new(detector: &'a dyn FaceDetector) -> Self {
        Self { detector, suffix: suffix_regex(DEFAULT_SUFFIX), pb: ProgressBar::hidden() }
    }

    /// 设置扫描的文件后缀，多个后缀用逗号分隔
    pub fn suffix(mut self, suffix: &str) -> Self {
        self.suffix = suffix_regex(suffix);
        self
    }

    /// 设置进度条，每处理一张图片前进一格
    pub fn progress(mut self, pb: ProgressBar) -> Self {
        self.pb = pb;
        self
    }

    /// 索引目录下（递归）所有符合后缀的图片
    ///
    /// 目录不存在时会自动创建，并返回新增 0 条的结果
    pub fn index_directory(
        &self,
        source_dir: impl AsRef<Path>,
        store_path: impl AsRef<Path>,
    ) -> Result<IndexReport> {
        let source_dir = source_dir.as_ref();
        let sources = if source_dir.is_dir() {
            self.scan_directory(source_dir)
        } else {
            warn!("图片目录不存在，自动创建: {}", source_dir.display());
            if let Err(e) = std::fs::create_dir_all(source_dir) {
                warn!("创建目录失败 {}: {}", source_dir.display(), e);
            }
            vec![]
        };
        self.run(sources, store_path.as_ref())
    }

    /// 索引一批内存中的图片，每项为 `(source_id, 图片数据)`
    pub fn index_sources(
        &self,
        sources: Vec<(String, Vec<u8>)>,
        store_path: impl AsRef<Path>,
    ) -> Result<IndexReport> {
        let sources = sources
            .into_iter()
            .map(|(source_id, data)| Source::Bytes { source_id, data })
            .collect();
        self.run(sources, store_path.as_ref())
    }

    fn scan_directory(&self, dir: &Path) -> Vec<Source> {
        info!("开始扫描目录: {}", dir.display());
        let sources = WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry
                    .path()
                    .extension()
                    .is_some_and(|ext| self.suffix.is_match(&ext.to_string_lossy()))
            })
            .map(|entry| {
                let path = entry.into_path();
                let source_id = source_id(dir, &path);
                Source::File { source_id, path }
            })
            .collect::<Vec<_>>();
        info!("扫描完成，共 {} 张图片", sources.len());
        sources
    }

    fn run(&self, sources: Vec<Source>, store_path: &Path) -> Result<IndexReport> {
        let mut entries = store::load(store_path);

        // 同一批次中重复出现的 source_id 也视为已索引
        let mut seen = store::indexed_sources(&entries)
            .into_iter()
            .map(str::to_owned)
            .collect::<HashSet<_>>();
        let (known, pending): (Vec<_>, Vec<_>) = sources
            .into_iter()
            .partition(|source| !seen.insert(source.source_id().to_owned()));

        let mut report = IndexReport::default();
        for source in known {
            debug!("跳过已索引图片: {}", source.source_id());
            report.skipped.push((source.source_id().to_owned(), SkipReason::AlreadyIndexed));
        }

        self.pb.set_length(pending.len() as u64);
        // collect 会保持输入顺序，结果与串行处理一致
        let outcomes = pending
            .into_par_iter()
            .progress_with(self.pb.clone())
            .map(|source| self.process(source))
            .collect::<Vec<_>>();

        for outcome in outcomes {
            match outcome {
                FileOutcome::Indexed { source_id, descriptors } => {
                    debug!("{}: {} 张人脸", source_id, descriptors.len());
                    report.added += descriptors.len();
                    report.indexed_files += 1;
                    for (region_index, descriptor) in descriptors.into_iter().enumerate() {
                        entries.push(IndexEntry {
                            source_id: source_id.clone(),
                            region_index,
                            descriptor,
                        });
                    }
                }
                FileOutcome::Skipped { source_id, reason } => {
                    if reason != SkipReason::NoFace {
                        warn!("跳过 {}: {}", source_id, reason);
                    } else {
                        debug!("跳过 {}: {}", source_id, reason);
                    }
                    report.skipped.push((source_id, reason));
                }
            }
        }

        store::save(&entries, store_path)?;
        report.total = entries.len();

        metrics::inc_faces_indexed(report.added);
        for (_, reason) in &report.skipped {
            metrics::inc_files_skipped(reason.label());
        }

        info!(
            "索引完成：新增 {} 张人脸，跳过 {} 张图片，共 {} 条记录",
            report.added,
            report.skipped.len(),
            report.total
        );
        Ok(report)
    }

    /// 处理单张图片，任何错误都只影响这一张
    pub fn process_bytes(&self, source_id: String, data: &[u8]) -> FileOutcome {
        let image = match utils::imdecode(data) {
            Ok(image) => image,
            Err(e) => return skipped(source_id, SkipReason::Decode(reason_message(e))),
        };
        let regions = match self.detector.detect(&image) {
            Ok(regions) => regions,
            Err(e) => return skipped(source_id, SkipReason::Detect(reason_message(e))),
        };
        match descriptor::extract(&image, &regions) {
            Ok(descriptors) if descriptors.is_empty() => skipped(source_id, SkipReason::NoFace),
            Ok(descriptors) => FileOutcome::Indexed { source_id, descriptors },
            Err(e) => skipped(source_id, SkipReason::Extract(reason_message(e))),
        }
    }

    fn process(&self, source: Source) -> FileOutcome {
        match source {
            Source::File { source_id, path } => match std::fs::read(&path) {
                Ok(data) => self.process_bytes(source_id, &data),
                Err(e) => skipped(source_id, SkipReason::Unreadable(e.to_string())),
            },
            Source::Bytes { source_id, data } => self.process_bytes(source_id, &data),
        }
    }
}

fn skipped(source_id: String, reason: SkipReason) -> FileOutcome {
    FileOutcome::Skipped { source_id, reason }
}

fn reason_message(e: FaceSearchError) -> String {
    match e {
        FaceSearchError::Decode(msg) | FaceSearchError::Detector(msg) => msg,
        e => e.to_string(),
    }
}

fn suffix_regex(suffix: &str) -> Regex {
    let re = format!("^(?i)({})$", regex::escape(suffix).replace(',', "|"));
    Regex::new(&re).expect("failed to build regex")
}

/// 图片相对于扫描目录的路径，统一使用 `/` 作为分隔符
fn source_id(dir: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(dir).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
