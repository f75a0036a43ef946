use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

use clap::{Parser, Subcommand, ValueEnum};
use directories::ProjectDirs;

use crate::cli::*;

static CONF_DIR: LazyLock<ConfDir> = LazyLock::new(|| {
    let proj_dirs =
        ProjectDirs::from("", "facesearch", "facesearch").expect("failed to get project dir");
    ConfDir { path: proj_dirs.config_dir().to_path_buf() }
});

fn default_config_dir() -> &'static str {
    CONF_DIR.path().to_str().unwrap()
}

#[derive(Parser, Debug, Clone)]
pub struct DetectorOptions {
    /// OpenCV Haar 级联分类器文件，例如 haarcascade_frontalface_default.xml
    /// 不指定时将整张图片视为一个人脸区域
    #[arg(long, value_name = "XML", verbatim_doc_comment)]
    pub cascade: Option<PathBuf>,
    /// 级联检测时图像金字塔的缩放因子
    #[arg(long, value_name = "SCALE", default_value_t = 1.1)]
    pub scale_factor: f64,
    /// 候选框至少需要的相邻检测数量
    #[arg(long, value_name = "N", default_value_t = 4)]
    pub min_neighbors: i32,
    /// 最小人脸尺寸，单位为像素，0 表示不限制
    #[arg(long, value_name = "PIXELS", default_value_t = 0)]
    pub min_face_size: i32,
}

#[derive(Parser, Debug, Clone)]
pub struct SearchOptions {
    /// 返回的结果数量
    #[arg(
        short = 'k',
        long,
        value_name = "K",
        default_value_t = 5,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub top_k: u64,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "facesearch", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
    /// facesearch 配置文件目录
    #[arg(short, long, default_value = default_config_dir())]
    pub conf_dir: ConfDir,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 扫描目录并将新图片中的人脸加入索引
    Add(AddCommand),
    /// 使用一张图片搜索相似的人脸
    Search(SearchCommand),
    /// 显示索引状态
    Status(StatusCommand),
    /// 启动 HTTP 搜索服务
    Server(ServerCommand),
}

#[derive(Debug, Clone)]
pub struct ConfDir {
    path: PathBuf,
}

impl ConfDir {
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// 返回人脸索引文件的路径
    pub fn store(&self) -> PathBuf {
        self.path.join("faces.bin")
    }

    /// 返回上传图片的保存目录
    pub fn images(&self) -> PathBuf {
        self.path.join("images")
    }
}

impl FromStr for ConfDir {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self { path: PathBuf::from(s) })
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum OutputFormat {
    Json,
    Table,
}
